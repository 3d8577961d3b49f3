use anchor_lang::prelude::{AnchorDeserialize, AnchorSerialize};

use crate::error::DistributorClientError;

/// Borsh-encodes contract call arguments.
pub fn encode_args<T: AnchorSerialize>(args: &T) -> Result<Vec<u8>, DistributorClientError> {
    let mut buf = Vec::new();
    args.serialize(&mut buf)?;
    Ok(buf)
}

/// Decodes a contract return value, rejecting trailing bytes.
pub fn decode_return<T: AnchorDeserialize>(payload: &[u8]) -> Result<T, DistributorClientError> {
    let mut cursor = payload;
    let value = T::deserialize(&mut cursor)?;
    if !cursor.is_empty() {
        return Err(DistributorClientError::Encoding(format!(
            "{} trailing bytes after return value",
            cursor.len()
        )));
    }
    Ok(value)
}

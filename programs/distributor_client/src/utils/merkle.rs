use anchor_lang::solana_program::keccak::hashv;

use crate::state::{Address, ProofNode, RawAmount};

/// Leaf committed to by a balance-map `merkleRoot`:
/// `keccak256(uint256 index ‖ address account ‖ uint256 amount)`, ABI packed
/// and big-endian.
///
/// Returns `None` when `account` is not a 20-byte hex address; such an
/// account cannot appear in a balance-map tree.
pub fn allocation_leaf(index: u64, account: &Address, amount: RawAmount) -> Option<ProofNode> {
    let account = account_bytes(account)?;
    Some(
        hashv(&[
            &u256_be(u128::from(index)),
            &account,
            &u256_be(amount.get()),
        ])
        .to_bytes(),
    )
}

fn account_bytes(account: &Address) -> Option<[u8; 20]> {
    let digits = account.as_str().strip_prefix("0x")?;
    let mut bytes = [0u8; 20];
    hex::decode_to_slice(digits, &mut bytes).ok()?;
    Some(bytes)
}

fn u256_be(value: u128) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[16..].copy_from_slice(&value.to_be_bytes());
    word
}

/// Hashes an intermediate node; children are ordered lexicographically so a
/// proof does not need to carry left/right flags.
pub fn hash_pair(left: &ProofNode, right: &ProofNode) -> ProofNode {
    if left <= right {
        hashv(&[left, right]).to_bytes()
    } else {
        hashv(&[right, left]).to_bytes()
    }
}

/// Walks `proof` from `leaf` and compares the result against `root`.
pub fn verify(proof: &[ProofNode], root: &ProofNode, leaf: ProofNode) -> bool {
    let computed = proof
        .iter()
        .fold(leaf, |node, sibling| hash_pair(&node, sibling));
    computed == *root
}

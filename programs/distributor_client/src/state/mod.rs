pub mod address;
pub mod allocation;
pub mod amount;
pub mod claim_state;
pub mod error_record;

pub use address::*;
pub use allocation::*;
pub use amount::*;
pub use claim_state::*;
pub use error_record::*;

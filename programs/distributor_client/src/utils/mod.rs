pub mod codec;
pub mod merkle;

pub use codec::*;
pub use merkle::*;

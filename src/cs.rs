pub mod ecc;

pub use ecc::*;

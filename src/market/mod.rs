//! Market valuation module - normalization pipeline and valuation engine
//! for transaction-price comparables

pub mod analysis;
pub mod fetch;
pub mod normalize;
pub mod types;

pub use types::*;

//! Property market valuation backend
//!
//! Estimates whether a property is under- or over-priced relative to
//! comparable recent transactions in its municipality. The `market` module
//! holds the whole pipeline: raw-record normalization, the quarter window,
//! market statistics and rank assignment, plus the thin upstream client.

pub mod market;

pub use market::analysis::evaluate;
pub use market::normalize::quarter_window;

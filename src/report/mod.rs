//! Reporting utilities: rounding and display text for calculated centiles.

pub mod format;

pub use format::*;

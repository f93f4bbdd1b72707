//! Input normalization helpers.

pub mod date;

pub use date::normalize;

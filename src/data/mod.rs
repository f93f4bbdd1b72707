//! External data sources.
//!
//! - `growth`: the growth-reference calculation API (one call per metric)

pub mod growth;

pub use growth::*;

//! Turning raw form input into calculator requests.

pub mod builder;

pub use builder::*;

//! `auto-centile` library crate.
//!
//! Growth centile calculation for clinical data-entry forms:
//!
//! - `normalize`: form date text to canonical calendar dates
//! - `request`: raw form input to per-metric calculator requests
//! - `data`: the external growth-reference API client
//! - `app::pipeline`: fan-out, aggregation and partial-failure handling
//! - `server`: the HTTP calculation endpoint
//! - `scheduler`: debounced recomputation driven by form events
//!
//! The binary (`centile`) is a thin wrapper around this library so core
//! logic is testable without spawning processes.

pub mod app;
pub mod cli;
pub mod config;
pub mod data;
pub mod domain;
pub mod error;
pub mod normalize;
pub mod report;
pub mod request;
pub mod scheduler;
pub mod server;

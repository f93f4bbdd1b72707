//! Domain types used throughout the calculation cycle.
//!
//! This module defines:
//!
//! - inbound form input (`RawInput`, `NumericField`)
//! - normalized request values (`CanonicalDate`, `MeasurementRequest`)
//! - per-metric and aggregate outcomes (`MeasurementOutcome`, `AggregateResult`)
//! - the wire response returned to the form (`CalculationResponse`)

pub mod types;

pub use types::*;

//! Formatting of calculated values for form fields and terminal output.
//!
//! We keep formatting code in one place so:
//! - the scheduler and the CLI agree on rounding
//! - output changes are localized

use crate::domain::{AggregateResult, CentileValues, MeasurementOutcome};

/// Centile rounded to 1 decimal place.
pub fn round_centile(centile: f64) -> f64 {
    round_to(centile, 10.0)
}

/// SDS rounded to 2 decimal places.
pub fn round_sds(sds: f64) -> f64 {
    round_to(sds, 100.0)
}

fn round_to(v: f64, scale: f64) -> f64 {
    let r = (v * scale).round() / scale;
    // Avoid writing "-0" into a field.
    if r == 0.0 { 0.0 } else { r }
}

/// Text written into a result field: shortest form, no trailing zeros.
pub fn field_value(v: f64) -> String {
    format!("{v}")
}

/// Inline summary shown next to a source field, e.g. `87.5th centile (SDS: 1.23)`.
pub fn centile_summary(values: &CentileValues) -> Option<String> {
    let centile = round_centile(values.centile?);
    let sds = round_sds(values.sds?);
    Some(format!("{}th centile (SDS: {})", field_value(centile), field_value(sds)))
}

/// Human-readable table of an aggregate result (`centile calc --text`).
pub fn format_aggregate(result: &AggregateResult) -> String {
    let mut out = String::new();
    out.push_str(&format!("{:<8} {:>8} {:>8}  {}\n", "metric", "centile", "sds", "notes"));
    for (metric, outcome) in result.iter() {
        match outcome {
            MeasurementOutcome::Calculated(v) => {
                let centile = v
                    .centile
                    .map(|c| field_value(round_centile(c)))
                    .unwrap_or_else(|| "-".to_string());
                let sds = v.sds.map(|s| field_value(round_sds(s))).unwrap_or_else(|| "-".to_string());
                let notes = v
                    .clinical_advice
                    .as_deref()
                    .or(v.centile_band.as_deref())
                    .unwrap_or("");
                out.push_str(&format!("{:<8} {:>8} {:>8}  {}\n", metric.as_str(), centile, sds, notes));
            }
            MeasurementOutcome::Failed { error } => {
                out.push_str(&format!("{:<8} {:>8} {:>8}  error: {}\n", metric.as_str(), "-", "-", error));
            }
        }
    }
    out
}

//! Shared domain types.
//!
//! These types are kept lightweight and serializable so the same values can be:
//!
//! - decoded from the form's calculation request
//! - handed between the builder, the API client and the orchestrator
//! - encoded back into the response the form consumes

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use clap::ValueEnum;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::CentileError;

/// Growth metric calculated against the reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Weight,
    Height,
    Bmi,
    Ofc,
}

impl Metric {
    /// Emission order used by the request builder.
    pub const ALL: [Metric; 4] = [Metric::Weight, Metric::Height, Metric::Bmi, Metric::Ofc];

    pub fn as_str(self) -> &'static str {
        match self {
            Metric::Weight => "weight",
            Metric::Height => "height",
            Metric::Bmi => "bmi",
            Metric::Ofc => "ofc",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    Male,
    Female,
}

impl Sex {
    pub fn as_str(self) -> &'static str {
        match self {
            Sex::Male => "male",
            Sex::Female => "female",
        }
    }
}

/// Date layout configured on the host form, when known.
///
/// The host framework names these `date_dmy` / `date_mdy` / `date_ymd`; both
/// spellings are accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FormatHint {
    Dmy,
    Mdy,
    Ymd,
}

impl FormatHint {
    pub fn as_str(self) -> &'static str {
        match self {
            FormatHint::Dmy => "dmy",
            FormatHint::Mdy => "mdy",
            FormatHint::Ymd => "ymd",
        }
    }
}

impl FromStr for FormatHint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        let key = lowered.strip_prefix("date_").unwrap_or(&lowered);
        match key {
            "dmy" => Ok(FormatHint::Dmy),
            "mdy" => Ok(FormatHint::Mdy),
            "ymd" => Ok(FormatHint::Ymd),
            _ => Err(format!("Unknown date format hint '{s}'. Expected dmy, mdy or ymd.")),
        }
    }
}

/// A calendar date with no remaining ambiguity.
///
/// Only the date normalizer constructs these; they always render as `YYYY-MM-DD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CanonicalDate(NaiveDate);

impl CanonicalDate {
    pub(crate) fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    pub fn date(self) -> NaiveDate {
        self.0
    }

    pub fn year(self) -> i32 {
        self.0.year()
    }

    pub fn month(self) -> u32 {
        self.0.month()
    }

    pub fn day(self) -> u32 {
        self.0.day()
    }
}

impl fmt::Display for CanonicalDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl Serialize for CanonicalDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A numeric form value that may arrive as a JSON number or as text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NumericField {
    Number(f64),
    Text(String),
}

impl NumericField {
    /// The finite numeric value, or `None` for blank / non-numeric input.
    pub fn as_f64(&self) -> Option<f64> {
        let v = match self {
            NumericField::Number(v) => *v,
            NumericField::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return None;
                }
                trimmed.parse::<f64>().ok()?
            }
        };
        if v.is_finite() { Some(v) } else { None }
    }
}

impl From<&str> for NumericField {
    fn from(value: &str) -> Self {
        NumericField::Text(value.to_string())
    }
}

impl From<f64> for NumericField {
    fn from(value: f64) -> Self {
        NumericField::Number(value)
    }
}

/// Loosely formatted values as entered on the clinical form.
///
/// Everything is optional at this layer; the request builder decides what is
/// required.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub measurement_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<NumericField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<NumericField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ofc: Option<NumericField>,
    /// External sex code from the form's choice field (e.g. `"1"`).
    #[serde(default, deserialize_with = "code_text", skip_serializing_if = "Option::is_none")]
    pub sex: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gestation_weeks: Option<NumericField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gestation_days: Option<NumericField>,
    /// Height protocol override (e.g. `length`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub measurement_method: Option<String>,
    /// Optional date layout hint (`dmy`, `date_dmy`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_format: Option<String>,
}

// Choice codes are usually strings, but some hosts post them as bare numbers.
fn code_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        Some(serde_json::Value::Bool(b)) => Some(if b { "1" } else { "0" }.to_string()),
        Some(other) => {
            return Err(serde::de::Error::custom(format!("invalid sex code: {other}")));
        }
    })
}

/// One well-formed request for the external calculator.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementRequest {
    pub metric: Metric,
    pub birth_date: CanonicalDate,
    pub observation_date: CanonicalDate,
    pub value: f64,
    /// Method sent upstream; equals the metric name except for height overrides.
    pub measurement_method: String,
    pub sex: Sex,
    pub gestation_weeks: i32,
    pub gestation_days: i32,
}

/// Calculated values for one metric. Missing upstream fields stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CentileValues {
    pub centile: Option<f64>,
    pub sds: Option<f64>,
    pub centile_band: Option<String>,
    pub age_error: Option<String>,
    pub corrected_age: Option<f64>,
    pub clinical_advice: Option<String>,
}

/// Per-metric result: calculated values or an error message.
///
/// Serialized untagged, matching `{centile, sds, ...}` / `{error}` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MeasurementOutcome {
    // Listed first so `{error}` objects never decode as empty values.
    Failed { error: String },
    Calculated(CentileValues),
}

impl MeasurementOutcome {
    pub fn values(&self) -> Option<&CentileValues> {
        match self {
            MeasurementOutcome::Calculated(values) => Some(values),
            MeasurementOutcome::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            MeasurementOutcome::Failed { error } => Some(error),
            MeasurementOutcome::Calculated(_) => None,
        }
    }
}

/// Outcomes of one calculation cycle keyed by metric.
///
/// Only metrics for which a request was built appear here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AggregateResult(BTreeMap<Metric, MeasurementOutcome>);

impl AggregateResult {
    pub fn insert(&mut self, metric: Metric, outcome: MeasurementOutcome) {
        self.0.insert(metric, outcome);
    }

    pub fn get(&self, metric: Metric) -> Option<&MeasurementOutcome> {
        self.0.get(&metric)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Metric, &MeasurementOutcome)> {
        self.0.iter().map(|(m, o)| (*m, o))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(Metric, MeasurementOutcome)> for AggregateResult {
    fn from_iter<I: IntoIterator<Item = (Metric, MeasurementOutcome)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Response body of the calculation endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculationResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<AggregateResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CalculationResponse {
    pub fn success(results: AggregateResult) -> Self {
        Self {
            success: true,
            results: Some(results),
            error: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            results: None,
            error: Some(message.into()),
        }
    }

    pub fn from_result(result: &Result<AggregateResult, CentileError>) -> Self {
        match result {
            Ok(results) => Self::success(results.clone()),
            Err(e) => Self::failure(e.to_string()),
        }
    }
}

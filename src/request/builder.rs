//! Measurement request builder.
//!
//! Given one form snapshot, emits at most one request per metric, in the fixed
//! order weight, height, bmi, ofc. Dates are normalized once and shared; a bad
//! date aborts the whole build rather than producing partial requests.

use crate::domain::{FormatHint, MeasurementRequest, Metric, NumericField, RawInput, Sex};
use crate::error::CentileError;
use crate::normalize::normalize;

pub const DEFAULT_GESTATION_WEEKS: i32 = 40;
pub const DEFAULT_GESTATION_DAYS: i32 = 0;

const DEFAULT_HEIGHT_METHOD: &str = "height";

/// How external sex codes are mapped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SexPolicy {
    /// `male_code` maps to male, every other code to female.
    FemaleFallback { male_code: String },
    /// Only the two configured codes are accepted.
    Strict { male_code: String, female_code: String },
}

impl Default for SexPolicy {
    fn default() -> Self {
        SexPolicy::FemaleFallback {
            male_code: "1".to_string(),
        }
    }
}

impl SexPolicy {
    pub fn map(&self, code: &str) -> Result<Sex, CentileError> {
        let code = code.trim();
        match self {
            SexPolicy::FemaleFallback { male_code } => Ok(if code == male_code {
                Sex::Male
            } else {
                Sex::Female
            }),
            SexPolicy::Strict {
                male_code,
                female_code,
            } => {
                if code == male_code {
                    Ok(Sex::Male)
                } else if code == female_code {
                    Ok(Sex::Female)
                } else {
                    Err(CentileError::InvalidSexCode(code.to_string()))
                }
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RequestBuilder {
    sex_policy: SexPolicy,
}

impl RequestBuilder {
    pub fn new(sex_policy: SexPolicy) -> Self {
        Self { sex_policy }
    }

    /// Build the request list for one calculation cycle.
    pub fn build(&self, input: &RawInput) -> Result<Vec<MeasurementRequest>, CentileError> {
        let birth_raw = required_text(input.birth_date.as_deref(), "birth_date")?;
        let observation_raw = required_text(input.measurement_date.as_deref(), "measurement_date")?;
        let sex_code = required_text(input.sex.as_deref(), "sex")?;

        let hint = input
            .date_format
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .and_then(|s| match s.parse::<FormatHint>() {
                Ok(h) => Some(h),
                Err(e) => {
                    tracing::debug!("ignoring date format hint: {e}");
                    None
                }
            });

        let birth_date = normalize(birth_raw, hint)?;
        let observation_date = normalize(observation_raw, hint)?;
        let sex = self.sex_policy.map(sex_code)?;

        let gestation_weeks = gestation(input.gestation_weeks.as_ref(), DEFAULT_GESTATION_WEEKS);
        let gestation_days = gestation(input.gestation_days.as_ref(), DEFAULT_GESTATION_DAYS);

        let weight = numeric(input.weight.as_ref());
        let height = numeric(input.height.as_ref());
        let ofc = numeric(input.ofc.as_ref());

        let request = |metric: Metric, value: f64, method: &str| MeasurementRequest {
            metric,
            birth_date,
            observation_date,
            value,
            measurement_method: method.to_string(),
            sex,
            gestation_weeks,
            gestation_days,
        };

        let mut out = Vec::with_capacity(Metric::ALL.len());

        if let Some(w) = weight {
            out.push(request(Metric::Weight, w, Metric::Weight.as_str()));
        }

        if let Some(h) = height {
            let method = input
                .measurement_method
                .as_deref()
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .unwrap_or(DEFAULT_HEIGHT_METHOD);
            out.push(request(Metric::Height, h, method));
        }

        // Opportunistic: skipped silently when it cannot be derived.
        if let (Some(w), Some(h)) = (weight, height) {
            if let Some(bmi) = derive_bmi(w, h) {
                out.push(request(Metric::Bmi, bmi, Metric::Bmi.as_str()));
            }
        }

        if let Some(c) = ofc {
            out.push(request(Metric::Ofc, c, Metric::Ofc.as_str()));
        }

        if out.is_empty() {
            return Err(CentileError::NoMeasurementsProvided);
        }

        Ok(out)
    }
}

/// BMI from kg and cm, rounded to 2 decimal places.
///
/// Returns `None` when height is not positive.
pub fn derive_bmi(weight_kg: f64, height_cm: f64) -> Option<f64> {
    let height_m = height_cm / 100.0;
    if height_m <= 0.0 {
        return None;
    }
    let bmi = weight_kg / (height_m * height_m);
    if !bmi.is_finite() {
        return None;
    }
    Some((bmi * 100.0).round() / 100.0)
}

fn required_text<'a>(value: Option<&'a str>, field: &'static str) -> Result<&'a str, CentileError> {
    value
        .filter(|s| !s.trim().is_empty())
        .ok_or(CentileError::MissingRequiredField(field))
}

fn numeric(value: Option<&NumericField>) -> Option<f64> {
    value.and_then(NumericField::as_f64)
}

// Fractional input is truncated, as the form's integer fields would be.
fn gestation(value: Option<&NumericField>, default: i32) -> i32 {
    numeric(value)
        .map(f64::trunc)
        .filter(|v| *v >= i32::MIN as f64 && *v <= i32::MAX as f64)
        .map(|v| v as i32)
        .unwrap_or(default)
}

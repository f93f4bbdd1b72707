//! Command-line parsing for the `centile` binary.
//!
//! Parsing lives here; dispatch lives in `app`.

use clap::{Args, Parser, Subcommand};

use crate::domain::{FormatHint, NumericField, RawInput};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "centile", version, about = "Growth centile calculator")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP calculation endpoint.
    Serve(ServeArgs),
    /// Calculate centiles for a single set of measurements.
    Calc(CalcArgs),
    /// Normalize a date and print it as YYYY-MM-DD.
    ParseDate(ParseDateArgs),
}

#[derive(Debug, Args, Clone)]
pub struct ServeArgs {
    /// Bind host (overrides HOST).
    #[arg(long)]
    pub host: Option<String>,

    /// Bind port (overrides PORT).
    #[arg(long)]
    pub port: Option<u16>,
}

/// Measurements for one calculation. Values are passed through as text so
/// validation matches the HTTP endpoint.
#[derive(Debug, Args, Clone)]
pub struct CalcArgs {
    /// Date of birth.
    #[arg(long)]
    pub dob: String,

    /// Measurement date.
    #[arg(long)]
    pub date: String,

    /// Sex code (e.g. 1 = male).
    #[arg(long)]
    pub sex: String,

    /// Weight in kilograms.
    #[arg(long)]
    pub weight: Option<String>,

    /// Height in centimetres.
    #[arg(long)]
    pub height: Option<String>,

    /// Head circumference in centimetres.
    #[arg(long)]
    pub ofc: Option<String>,

    #[arg(long)]
    pub gestation_weeks: Option<String>,

    #[arg(long)]
    pub gestation_days: Option<String>,

    /// Method sent for the height measurement (default: height).
    #[arg(long)]
    pub method: Option<String>,

    /// Layout of ambiguous dates.
    #[arg(long, value_enum)]
    pub date_format: Option<FormatHint>,

    /// Print a table instead of JSON.
    #[arg(long)]
    pub text: bool,
}

impl CalcArgs {
    pub fn to_input(&self) -> RawInput {
        let numeric = |v: &Option<String>| v.as_deref().map(NumericField::from);
        RawInput {
            birth_date: Some(self.dob.clone()),
            measurement_date: Some(self.date.clone()),
            weight: numeric(&self.weight),
            height: numeric(&self.height),
            ofc: numeric(&self.ofc),
            sex: Some(self.sex.clone()),
            gestation_weeks: numeric(&self.gestation_weeks),
            gestation_days: numeric(&self.gestation_days),
            measurement_method: self.method.clone(),
            date_format: self.date_format.map(|h| h.as_str().to_string()),
        }
    }
}

#[derive(Debug, Args, Clone)]
pub struct ParseDateArgs {
    /// Date text as entered on a form.
    pub raw: String,

    /// Layout hint for ambiguous dates.
    #[arg(long, value_enum)]
    pub hint: Option<FormatHint>,
}

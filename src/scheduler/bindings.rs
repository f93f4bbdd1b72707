//! Field-binding table resolved once per rendered form.

/// Logical role of a form field the scheduler reads or writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldRole {
    Weight,
    Height,
    Dob,
    Sex,
    MeasurementDate,
    GestationWeeks,
    GestationDays,
    WeightCentile,
    HeightCentile,
    BmiCentile,
    WeightSds,
    HeightSds,
    BmiSds,
}

impl FieldRole {
    pub const ALL: [FieldRole; 13] = [
        FieldRole::Weight,
        FieldRole::Height,
        FieldRole::Dob,
        FieldRole::Sex,
        FieldRole::MeasurementDate,
        FieldRole::GestationWeeks,
        FieldRole::GestationDays,
        FieldRole::WeightCentile,
        FieldRole::HeightCentile,
        FieldRole::BmiCentile,
        FieldRole::WeightSds,
        FieldRole::HeightSds,
        FieldRole::BmiSds,
    ];

    /// Name of the project setting that overrides this binding.
    pub fn setting_key(self) -> &'static str {
        match self {
            FieldRole::Weight => "weight_field",
            FieldRole::Height => "height_field",
            FieldRole::Dob => "dob_field",
            FieldRole::Sex => "sex_field",
            FieldRole::MeasurementDate => "measurement_date_field",
            FieldRole::GestationWeeks => "gestation_weeks_field",
            FieldRole::GestationDays => "gestation_days_field",
            FieldRole::WeightCentile => "weight_centile_field",
            FieldRole::HeightCentile => "height_centile_field",
            FieldRole::BmiCentile => "bmi_centile_field",
            FieldRole::WeightSds => "weight_sds_field",
            FieldRole::HeightSds => "height_sds_field",
            FieldRole::BmiSds => "bmi_sds_field",
        }
    }

    /// Conventional field name used when the setting is unset.
    pub fn default_name(self) -> &'static str {
        match self {
            FieldRole::Weight => "weight_kg",
            FieldRole::Height => "height_cm",
            FieldRole::Dob => "date_of_birth",
            FieldRole::Sex => "sex",
            FieldRole::MeasurementDate => "measurement_date",
            FieldRole::GestationWeeks => "gestation_weeks",
            FieldRole::GestationDays => "gestation_days",
            FieldRole::WeightCentile => "weight_centile",
            FieldRole::HeightCentile => "height_centile",
            FieldRole::BmiCentile => "bmi_centile",
            FieldRole::WeightSds => "weight_sds",
            FieldRole::HeightSds => "height_sds",
            FieldRole::BmiSds => "bmi_sds",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Immutable role -> field-name table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldBindings {
    names: [String; 13],
}

impl Default for FieldBindings {
    fn default() -> Self {
        Self::resolve(|_| None)
    }
}

impl FieldBindings {
    /// Resolve every role through `setting`, falling back to the conventional
    /// name when the setting is missing or blank.
    pub fn resolve(setting: impl Fn(&str) -> Option<String>) -> Self {
        let names = FieldRole::ALL.map(|role| {
            setting(role.setting_key())
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| role.default_name().to_string())
        });
        Self { names }
    }

    pub fn name(&self, role: FieldRole) -> &str {
        &self.names[role.index()]
    }

    /// Role bound to `field`, if any.
    pub fn role_of(&self, field: &str) -> Option<FieldRole> {
        FieldRole::ALL.into_iter().find(|role| self.name(*role) == field)
    }
}

use serde::{Deserialize, Serialize};

use crate::error::ReconError;
use crate::model::BillingRecord;

// ---------------------------------------------------------------------------
// Rule config
// ---------------------------------------------------------------------------

/// Institution billing rules.
///
/// ```toml
/// base_days = [5, 10, 15]
/// min_expected_value = 1000.0
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleConfig {
    /// Calendar days a due date may fall on. A Monday directly after one of
    /// these landing on a weekend is also accepted.
    #[serde(default = "default_base_days")]
    pub base_days: Vec<u32>,
    /// Billed or minimum amounts below this are flagged as value errors.
    #[serde(default = "default_min_expected_value")]
    pub min_expected_value: f64,
}

fn default_base_days() -> Vec<u32> {
    vec![5, 10, 15]
}

fn default_min_expected_value() -> f64 {
    1000.0
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            base_days: default_base_days(),
            min_expected_value: default_min_expected_value(),
        }
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl RuleConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: RuleConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        if self.base_days.is_empty() {
            return Err(ReconError::ConfigValidation(
                "base_days must list at least one day".into(),
            ));
        }

        if let Some(day) = self.base_days.iter().find(|d| !(1..=31).contains(*d)) {
            return Err(ReconError::ConfigValidation(format!(
                "base_days entries must be between 1 and 31, got {day}"
            )));
        }

        if !self.min_expected_value.is_finite() || self.min_expected_value < 0.0 {
            return Err(ReconError::ConfigValidation(format!(
                "min_expected_value must be a non-negative number, got {}",
                self.min_expected_value
            )));
        }

        Ok(())
    }

    /// Raw value check, before resolutions are applied.
    pub fn has_value_error(&self, record: &BillingRecord) -> bool {
        record.billed < self.min_expected_value || record.minimum < self.min_expected_value
    }

    /// Raw due-date check, before resolutions are applied.
    pub fn has_due_date_error(&self, record: &BillingRecord) -> bool {
        crate::due_date::due_date_error(&record.due_date, &self.base_days)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

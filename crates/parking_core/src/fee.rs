use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use crate::types::{ConfigError, VehicleClass};

/// Rate charged when nothing else is configured, per minute.
pub const DEFAULT_RATE_PER_MINUTE: f64 = 0.05;

/// Billed duration and amount for a closed session
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fee {
    /// Whole minutes billed, never less than one
    pub minutes: i64,
    /// Amount rounded to two decimal places
    pub amount: f64,
}

/// Computes the fee for a stay.
///
/// Elapsed time is rounded up to the next whole minute and at least one minute
/// is always charged. A check-out earlier than the check-in counts as zero.
pub fn calculate_fee(
    check_in_at: DateTime<Utc>,
    check_out_at: DateTime<Utc>,
    rate_per_minute: f64,
) -> Fee {
    let elapsed = (check_out_at - check_in_at).max(Duration::zero());
    let whole_minutes = elapsed.num_minutes();
    let minutes = if elapsed > Duration::minutes(whole_minutes) {
        whole_minutes + 1
    } else {
        whole_minutes
    }
    .max(1);
    Fee {
        minutes,
        amount: round_cents(minutes as f64 * rate_per_minute),
    }
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Rate lookup by vehicle class with a lot-wide default
#[derive(Debug, Clone, PartialEq)]
pub struct RateTable {
    default_rate: f64,
    per_class: HashMap<VehicleClass, f64>,
}

impl Default for RateTable {
    fn default() -> Self {
        Self {
            default_rate: DEFAULT_RATE_PER_MINUTE,
            per_class: HashMap::new(),
        }
    }
}

impl RateTable {
    /// Creates a table charging `default_rate` for every class.
    pub fn flat(default_rate: f64) -> Result<Self, ConfigError> {
        validate_rate("default", default_rate)?;
        Ok(Self {
            default_rate,
            per_class: HashMap::new(),
        })
    }

    /// Overrides the rate for a single class.
    pub fn with_class_rate(mut self, class: VehicleClass, rate: f64) -> Result<Self, ConfigError> {
        validate_rate(class.as_str(), rate)?;
        self.per_class.insert(class, rate);
        Ok(self)
    }

    /// Rate per minute applied to sessions of `class`
    pub fn rate_for(&self, class: VehicleClass) -> f64 {
        self.per_class
            .get(&class)
            .copied()
            .unwrap_or(self.default_rate)
    }

    /// The lot-wide default rate
    pub fn default_rate(&self) -> f64 {
        self.default_rate
    }
}

fn validate_rate(class: &str, rate: f64) -> Result<(), ConfigError> {
    if rate.is_finite() && rate >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidRate {
            class: class.to_string(),
            rate,
        })
    }
}

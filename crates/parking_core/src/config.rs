use crate::fee::{DEFAULT_RATE_PER_MINUTE, RateTable};
use crate::types::{ConfigError, SlotSpec, VehicleClass};

/// Slot codes created when no catalog is configured
pub const DEFAULT_SLOTS: [&str; 5] = ["A01", "A02", "A03", "B01", "B02"];

/// Startup configuration of a parking lot
#[derive(Debug, Clone)]
pub struct LotConfig {
    /// Slot catalog
    pub slots: Vec<SlotSpec>,
    /// Rates by vehicle class
    pub rates: RateTable,
    /// Class assumed when an entry does not name one
    pub default_class: VehicleClass,
}

impl Default for LotConfig {
    fn default() -> Self {
        Self {
            slots: DEFAULT_SLOTS
                .iter()
                .map(|code| SlotSpec::new(*code, VehicleClass::Car))
                .collect(),
            rates: RateTable::default(),
            default_class: VehicleClass::Car,
        }
    }
}

impl LotConfig {
    /// Reads the configuration from the process environment.
    ///
    /// `PARKING_SLOTS`, `PARKING_RATE_PER_MINUTE`, `PARKING_CLASS_RATES` and
    /// `PARKING_DEFAULT_CLASS` are all optional.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let default_class = match lookup("PARKING_DEFAULT_CLASS") {
            Some(raw) => raw.parse()?,
            None => defaults.default_class,
        };

        let slots = match lookup("PARKING_SLOTS") {
            Some(raw) => parse_slot_catalog(&raw, default_class)?,
            None => defaults.slots,
        };

        let default_rate = match lookup("PARKING_RATE_PER_MINUTE") {
            Some(raw) => parse_rate("PARKING_RATE_PER_MINUTE", &raw)?,
            None => DEFAULT_RATE_PER_MINUTE,
        };

        let mut rates = RateTable::flat(default_rate)?;
        if let Some(raw) = lookup("PARKING_CLASS_RATES") {
            for (class, rate) in parse_class_rates(&raw)? {
                rates = rates.with_class_rate(class, rate)?;
            }
        }

        Ok(Self {
            slots,
            rates,
            default_class,
        })
    }
}

/// Parses `CODE[:CLASS]` entries separated by commas. Entries without a
/// class accept `default_class`.
pub fn parse_slot_catalog(
    raw: &str,
    default_class: VehicleClass,
) -> Result<Vec<SlotSpec>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| -> Result<SlotSpec, ConfigError> {
            match entry.split_once(':') {
                Some((code, class)) => Ok(SlotSpec::new(code.trim(), class.parse()?)),
                None => Ok(SlotSpec::new(entry, default_class)),
            }
        })
        .collect()
}

/// Parses `CLASS=RATE` overrides separated by commas.
pub fn parse_class_rates(raw: &str) -> Result<Vec<(VehicleClass, f64)>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| -> Result<(VehicleClass, f64), ConfigError> {
            let (class, rate) = entry.split_once('=').ok_or(ConfigError::InvalidValue {
                key: "PARKING_CLASS_RATES",
                value: entry.to_string(),
            })?;
            Ok((class.parse()?, parse_rate("PARKING_CLASS_RATES", rate)?))
        })
        .collect()
}

fn parse_rate(key: &'static str, raw: &str) -> Result<f64, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: raw.to_string(),
    })
}

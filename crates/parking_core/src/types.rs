use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Class of vehicle a slot accepts and a session is billed for
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum VehicleClass {
    /// Passenger car (the default class)
    #[default]
    #[serde(rename = "CAR")]
    Car,
    /// Motorcycle
    #[serde(rename = "MOTORCYCLE")]
    Motorcycle,
    /// Truck
    #[serde(rename = "TRUCK")]
    Truck,
    /// Bus
    #[serde(rename = "BUS")]
    Bus,
    /// Van
    #[serde(rename = "VAN")]
    Van,
    /// Sport utility vehicle
    #[serde(rename = "SUV")]
    Suv,
    /// Bicycle
    #[serde(rename = "BICYCLE")]
    Bicycle,
    /// Electric bicycle
    #[serde(rename = "ELECTRIC BICYCLE")]
    ElectricBicycle,
    /// Electric scooter
    #[serde(rename = "ELECTRIC SCOOTER")]
    ElectricScooter,
}

impl VehicleClass {
    /// Every known class, in declaration order.
    pub const ALL: [VehicleClass; 9] = [
        VehicleClass::Car,
        VehicleClass::Motorcycle,
        VehicleClass::Truck,
        VehicleClass::Bus,
        VehicleClass::Van,
        VehicleClass::Suv,
        VehicleClass::Bicycle,
        VehicleClass::ElectricBicycle,
        VehicleClass::ElectricScooter,
    ];

    /// Canonical label, as it appears on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleClass::Car => "CAR",
            VehicleClass::Motorcycle => "MOTORCYCLE",
            VehicleClass::Truck => "TRUCK",
            VehicleClass::Bus => "BUS",
            VehicleClass::Van => "VAN",
            VehicleClass::Suv => "SUV",
            VehicleClass::Bicycle => "BICYCLE",
            VehicleClass::ElectricBicycle => "ELECTRIC BICYCLE",
            VehicleClass::ElectricScooter => "ELECTRIC SCOOTER",
        }
    }
}

impl fmt::Display for VehicleClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VehicleClass {
    type Err = ConfigError;

    /// Case-insensitive; `_` and `-` are accepted in place of spaces.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_uppercase().replace(['_', '-'], " ");
        VehicleClass::ALL
            .into_iter()
            .find(|class| class.as_str() == wanted)
            .ok_or_else(|| ConfigError::UnknownVehicleClass(s.trim().to_string()))
    }
}

/// Normalized vehicle plate: trimmed, uppercased and never empty
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Plate(String);

impl Plate {
    /// Normalizes a raw plate, failing with [`ParkingError::PlateRequired`] when nothing is left.
    pub fn normalize(raw: &str) -> Result<Self, ParkingError> {
        let plate = raw.trim().to_uppercase();
        if plate.is_empty() {
            return Err(ParkingError::PlateRequired);
        }
        Ok(Self(plate))
    }

    /// The normalized plate text
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Plate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Catalog entry describing one slot to create at startup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotSpec {
    /// Unique slot code, e.g. "A01"
    pub code: String,
    /// Vehicle class the slot accepts
    pub vehicle_class: VehicleClass,
}

impl SlotSpec {
    /// Creates a catalog entry
    pub fn new(code: impl Into<String>, vehicle_class: VehicleClass) -> Self {
        Self {
            code: code.into(),
            vehicle_class,
        }
    }
}

/// A parking slot and its occupancy state
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Slot {
    /// Unique slot code
    pub code: String,
    /// Vehicle class the slot accepts
    pub vehicle_class: VehicleClass,
    /// Ticket id of the open session occupying the slot
    pub current_ticket: Option<Uuid>,
}

impl Slot {
    /// A slot is occupied exactly when it references an open session.
    pub fn is_occupied(&self) -> bool {
        self.current_ticket.is_some()
    }
}

/// One vehicle's stay, from check-in to check-out (a.k.a. ticket)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Session {
    /// Ticket identifier
    pub ticket: Uuid,
    /// Normalized plate of the parked vehicle
    pub plate: Plate,
    /// Code of the slot the vehicle occupies
    pub slot_code: String,
    /// Vehicle class the session was admitted under
    pub vehicle_class: VehicleClass,
    /// Rate captured at check-in, constant for the whole session
    pub rate_per_minute: f64,
    /// When the vehicle entered
    pub check_in_at: DateTime<Utc>,
    /// When the vehicle left, unset while the session is open
    pub check_out_at: Option<DateTime<Utc>>,
    /// Billed minutes, set together with `check_out_at`
    pub minutes: Option<i64>,
    /// Billed amount, set together with `check_out_at`
    pub amount: Option<f64>,
}

impl Session {
    /// Whether the vehicle is still parked
    pub fn is_open(&self) -> bool {
        self.check_out_at.is_none()
    }
}

/// Ordering of session history by check-in time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Oldest first
    Asc,
    /// Newest first
    #[default]
    Desc,
}

impl FromStr for SortOrder {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(ConfigError::InvalidValue {
                key: "order",
                value: other.to_string(),
            }),
        }
    }
}

/// Result of a successful entry
#[derive(Debug, Clone, PartialEq)]
pub struct EntryOutcome {
    /// The open session for the plate
    pub session: Session,
    /// False when the plate already had an open session and it was returned unchanged
    pub created: bool,
}

/// Billing summary returned by a successful exit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExitReceipt {
    /// Plate of the departing vehicle
    pub plate: Plate,
    /// Slot that was released
    pub slot_code: String,
    /// Billed minutes
    pub minutes: i64,
    /// Billed amount
    pub amount: f64,
    /// Check-out timestamp
    pub check_out_at: DateTime<Utc>,
}

/// Reporting view of a slot, joined with the plate occupying it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlotView {
    /// Slot code
    pub code: String,
    /// Vehicle class the slot accepts
    pub vehicle_class: VehicleClass,
    /// Whether the slot is occupied
    pub occupied: bool,
    /// Plate of the occupying vehicle, if any
    pub plate: Option<Plate>,
}

/// Lot-wide occupancy statistics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Overview {
    /// Total number of slots
    pub total: usize,
    /// Occupied slots
    pub occupied: usize,
    /// Free slots
    pub free: usize,
    /// Distinct plates with an open session
    pub active_vehicles: usize,
    /// Occupied share of the lot, in percent with two decimals
    pub occupancy_percent: f64,
    /// Default rate per minute
    pub rate_per_minute: f64,
}

/// Occupancy counters for a single vehicle class
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ClassOccupancy {
    /// Occupied slots of this class
    pub occupied: usize,
    /// All slots of this class
    pub total: usize,
}

/// Errors surfaced to callers of the allocation engine
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParkingError {
    /// The plate was empty after normalization
    #[error("Plate is required")]
    PlateRequired,

    /// Every slot accepting the vehicle class is occupied
    #[error("No slots available for {vehicle_class}")]
    NoSlotsAvailable {
        /// Class that was requested
        vehicle_class: VehicleClass,
    },

    /// Exit requested for a plate without an open session
    #[error("Active session not found for {plate}")]
    ActiveSessionNotFound {
        /// Plate that was looked up
        plate: Plate,
    },
}

/// Errors raised by the slot registry
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SlotError {
    /// No free slot accepts the requested class
    #[error("Slots exhausted for {0}")]
    SlotsExhausted(VehicleClass),

    /// The slot was not occupied
    #[error("Slot {0} is already free")]
    AlreadyFree(String),

    /// No slot carries this code
    #[error("Unknown slot {0}")]
    UnknownSlot(String),
}

/// Errors raised by the session ledger
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LedgerError {
    /// The plate already has an open session, which is carried along
    #[error("Plate {} already has an active session", .0.plate)]
    DuplicateActiveSession(Box<Session>),

    /// The plate has no open session
    #[error("Active session not found for {0}")]
    ActiveSessionNotFound(Plate),
}

/// Errors raised while loading lot configuration
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// A vehicle class label was not recognized
    #[error("Unknown vehicle class: {0}")]
    UnknownVehicleClass(String),

    /// A rate was negative, NaN or infinite
    #[error("Invalid rate for {class}: {rate}")]
    InvalidRate {
        /// Class the rate was configured for
        class: String,
        /// Offending value
        rate: f64,
    },

    /// A setting could not be parsed
    #[error("Invalid value for {key}: {value}")]
    InvalidValue {
        /// Setting name
        key: &'static str,
        /// Offending value
        value: String,
    },

    /// A slot catalog entry had an empty code
    #[error("Slot code must not be empty")]
    EmptySlotCode,

    /// Two catalog entries share a code
    #[error("Duplicate slot code: {0}")]
    DuplicateSlotCode(String),
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use parking_core::{ExitReceipt, Overview, ParkingError, Plate, Session, SlotView, VehicleClass};

/// Request structure for registering a vehicle entry
#[derive(Debug, Deserialize)]
pub struct EntryRequest {
    /// Plate of the arriving vehicle, normalized by the engine
    #[serde(default)]
    pub plate: String,

    /// Vehicle class label, e.g. "CAR" or "motorcycle"
    #[serde(default)]
    pub vehicle_class: Option<String>,
}

/// Request structure for registering a vehicle exit
#[derive(Debug, Deserialize)]
pub struct ExitRequest {
    /// Plate of the departing vehicle
    #[serde(default)]
    pub plate: String,
}

/// Query parameters for the session history
#[derive(Debug, Deserialize, Validate)]
pub struct SessionsQuery {
    /// How many sessions to return
    #[serde(default = "default_limit")]
    #[validate(range(min = 1, max = 50, message = "Limit must be between 1 and 50"))]
    pub limit: usize,

    /// Check-in ordering, "asc" or "desc"
    #[serde(default = "default_order")]
    #[validate(custom(function = "validate_sort_order"))]
    pub order: String,
}

fn default_limit() -> usize {
    5
}

fn default_order() -> String {
    "desc".to_string()
}

/// Response structure for a registered entry
#[derive(Debug, Serialize)]
pub struct EntryResponse {
    /// Normalized plate
    pub plate: Plate,
    /// Assigned slot
    pub slot_code: String,
    /// Class the vehicle was admitted under
    pub vehicle_class: VehicleClass,
    /// Check-in timestamp
    pub check_in_at: DateTime<Utc>,
}

impl From<Session> for EntryResponse {
    fn from(session: Session) -> Self {
        Self {
            plate: session.plate,
            slot_code: session.slot_code,
            vehicle_class: session.vehicle_class,
            check_in_at: session.check_in_at,
        }
    }
}

/// Response structure for a registered exit
#[derive(Debug, Serialize)]
pub struct ExitResponse {
    /// Normalized plate
    pub plate: Plate,
    /// Released slot
    pub slot_code: String,
    /// Billed minutes
    pub minutes: i64,
    /// Billed amount
    pub amount: f64,
    /// Check-out timestamp
    pub check_out_at: DateTime<Utc>,
}

impl From<ExitReceipt> for ExitResponse {
    fn from(receipt: ExitReceipt) -> Self {
        Self {
            plate: receipt.plate,
            slot_code: receipt.slot_code,
            minutes: receipt.minutes,
            amount: receipt.amount,
            check_out_at: receipt.check_out_at,
        }
    }
}

/// Response structure for a single slot
#[derive(Debug, Serialize)]
pub struct SlotResponse {
    /// Slot code
    pub code: String,
    /// Class the slot accepts
    pub vehicle_class: VehicleClass,
    /// Whether the slot is occupied
    pub occupied: bool,
    /// Plate parked in the slot
    pub plate: Option<Plate>,
}

impl From<SlotView> for SlotResponse {
    fn from(slot: SlotView) -> Self {
        Self {
            code: slot.code,
            vehicle_class: slot.vehicle_class,
            occupied: slot.occupied,
            plate: slot.plate,
        }
    }
}

/// Response structure for lot statistics
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    /// Occupied slots
    pub occupied: usize,
    /// Free slots
    pub free: usize,
    /// Distinct vehicles currently parked
    pub active_vehicles: usize,
    /// Occupied share of the lot, in percent
    pub occupancy_percent: f64,
    /// Default rate per minute
    pub current_rate_per_minute: f64,
}

impl From<Overview> for StatsResponse {
    fn from(overview: Overview) -> Self {
        Self {
            occupied: overview.occupied,
            free: overview.free,
            active_vehicles: overview.active_vehicles,
            occupancy_percent: overview.occupancy_percent,
            current_rate_per_minute: overview.rate_per_minute,
        }
    }
}

/// Response structure for one history entry
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    /// Normalized plate
    pub plate: Plate,
    /// Slot the vehicle occupied
    pub slot_code: String,
    /// Check-in timestamp
    pub check_in_at: DateTime<Utc>,
    /// Check-out timestamp, absent while parked
    pub check_out_at: Option<DateTime<Utc>>,
    /// Billed amount, absent while parked
    pub amount: Option<f64>,
}

impl From<Session> for SessionResponse {
    fn from(session: Session) -> Self {
        Self {
            plate: session.plate,
            slot_code: session.slot_code,
            check_in_at: session.check_in_at,
            check_out_at: session.check_out_at,
            amount: session.amount,
        }
    }
}

/// Response structure for the session history
#[derive(Debug, Serialize)]
pub struct SessionsResponse {
    /// Sessions in the requested order
    pub items: Vec<SessionResponse>,
}

/// Custom error type for parking API operations
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Domain error returned by the allocation engine
    #[error(transparent)]
    Parking(#[from] ParkingError),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

impl actix_web::ResponseError for ApiError {
    fn status_code(&self) -> actix_web::http::StatusCode {
        use actix_web::http::StatusCode;

        match self {
            ApiError::Parking(ParkingError::PlateRequired) => StatusCode::BAD_REQUEST,
            ApiError::Parking(ParkingError::NoSlotsAvailable { .. }) => StatusCode::CONFLICT,
            ApiError::Parking(ParkingError::ActiveSessionNotFound { .. }) => StatusCode::NOT_FOUND,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn error_response(&self) -> actix_web::HttpResponse {
        use actix_web::HttpResponse;

        let kind = match self {
            ApiError::Parking(ParkingError::PlateRequired) => "plate_required",
            ApiError::Parking(ParkingError::NoSlotsAvailable { .. }) => "no_slots_available",
            ApiError::Parking(ParkingError::ActiveSessionNotFound { .. }) => {
                "active_session_not_found"
            }
            ApiError::Validation(_) => "validation_error",
        };

        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "error": kind,
            "message": self.to_string()
        }))
    }
}

/// Custom validation function for the history order
fn validate_sort_order(order: &str) -> Result<(), validator::ValidationError> {
    match order.to_lowercase().as_str() {
        "asc" | "desc" => Ok(()),
        _ => Err(validator::ValidationError::new("invalid_sort_order")),
    }
}

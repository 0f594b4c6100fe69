use actix_web::{HttpResponse, Result, web};
use validator::Validate;

use crate::parking_types::*;
use parking_core::{AllocationEngine, SortOrder, VehicleClass};

/// Registers a vehicle entry and assigns it a slot.
/// Returns 201 Created for a new session, or 200 OK with the unchanged
/// session when the plate is already parked.
pub async fn create_entry(
    engine: web::Data<AllocationEngine>,
    request: web::Json<EntryRequest>,
) -> Result<HttpResponse, ApiError> {
    let vehicle_class = request
        .vehicle_class
        .as_deref()
        .filter(|class| !class.trim().is_empty())
        .map(str::parse::<VehicleClass>)
        .transpose()
        .map_err(|e| {
            log::debug!("Rejected entry for '{}': {}", request.plate, e);
            ApiError::Validation(e.to_string())
        })?;

    let outcome = engine
        .register_entry(&request.plate, vehicle_class)
        .await
        .map_err(|e| {
            log::warn!("Entry refused for '{}': {}", request.plate, e);
            ApiError::from(e)
        })?;
    let response = EntryResponse::from(outcome.session);

    if outcome.created {
        Ok(HttpResponse::Created().json(response))
    } else {
        log::debug!("Plate {} is already parked", response.plate.as_str());
        Ok(HttpResponse::Ok().json(response))
    }
}

/// Registers a vehicle exit, bills the stay and frees the slot.
pub async fn create_exit(
    engine: web::Data<AllocationEngine>,
    request: web::Json<ExitRequest>,
) -> Result<HttpResponse, ApiError> {
    let receipt = engine.register_exit(&request.plate).await.map_err(|e| {
        log::warn!("Exit refused for '{}': {}", request.plate, e);
        ApiError::from(e)
    })?;

    Ok(HttpResponse::Ok().json(ExitResponse::from(receipt)))
}

/// Lists every slot with its occupant
pub async fn list_slots(engine: web::Data<AllocationEngine>) -> Result<HttpResponse, ApiError> {
    let slots: Vec<SlotResponse> = engine
        .list_slots()
        .await
        .into_iter()
        .map(SlotResponse::from)
        .collect();

    Ok(HttpResponse::Ok().json(slots))
}

/// Lot-wide occupancy statistics
pub async fn stats_overview(
    engine: web::Data<AllocationEngine>,
) -> Result<HttpResponse, ApiError> {
    let overview = engine.overview().await;

    Ok(HttpResponse::Ok().json(StatsResponse::from(overview)))
}

/// Occupancy per vehicle class
pub async fn stats_by_class(
    engine: web::Data<AllocationEngine>,
) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(engine.occupancy_by_class().await))
}

/// Most recent sessions, newest first unless `order=asc`
pub async fn recent_sessions(
    engine: web::Data<AllocationEngine>,
    query: web::Query<SessionsQuery>,
) -> Result<HttpResponse, ApiError> {
    query
        .validate()
        .map_err(|e| {
            log::debug!("Rejected session query: {}", e);
            ApiError::Validation(e.to_string())
        })?;

    let order: SortOrder = query
        .order
        .parse()
        .map_err(|e: parking_core::ConfigError| ApiError::Validation(e.to_string()))?;

    let items = engine
        .recent_sessions(query.limit, order)
        .await
        .into_iter()
        .map(SessionResponse::from)
        .collect();

    Ok(HttpResponse::Ok().json(SessionsResponse { items }))
}

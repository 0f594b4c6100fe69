use actix_web::{HttpResponse, Result, web};

use parking_core::AllocationEngine;

/// Health check endpoint for the parking core service
pub async fn core_health(engine: web::Data<AllocationEngine>) -> Result<HttpResponse> {
    let overview = engine.overview().await;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "service": "parking-core",
        "status": "healthy",
        "slots": overview.total,
        "default_class": engine.default_class(),
        "rate_per_minute": engine.rates().default_rate(),
        "timestamp": chrono::Utc::now()
    })))
}

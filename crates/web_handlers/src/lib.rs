//! # Web Handlers for the Parking Lot Tracker
//!
//! This crate provides the HTTP handlers exposing the allocation engine.

use actix_web::web;

/// Health and service handlers
mod admin_handlers;
pub use admin_handlers::*;

/// Handlers for entries, exits, slots, statistics and session history
mod parking_handlers;
pub use parking_handlers::*;

/// Request, response and error types for the parking API
mod parking_types;
pub use parking_types::*;

/// Mounts the parking API under `/api/core`.
/// Bodies and query strings that fail to deserialize are answered with the
/// same `{error, message}` JSON as every other rejected request.
pub fn parking_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/core")
            .app_data(web::JsonConfig::default().error_handler(|err, _req| {
                log::debug!("Rejected request body: {}", err);
                ApiError::Validation(err.to_string()).into()
            }))
            .app_data(web::QueryConfig::default().error_handler(|err, _req| {
                log::debug!("Rejected query string: {}", err);
                ApiError::Validation(err.to_string()).into()
            }))
            .route("/health", web::get().to(core_health))
            .route("/entries", web::post().to(create_entry))
            .route("/exits", web::post().to(create_exit))
            .route("/slots", web::get().to(list_slots))
            .route("/sessions", web::get().to(recent_sessions))
            .service(
                web::scope("/stats")
                    .route("/overview", web::get().to(stats_overview))
                    .route("/by-class", web::get().to(stats_by_class)),
            ),
    );
}

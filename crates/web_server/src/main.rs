//! Main entry point for the Parking Lot Tracker backend server.
//! This crate wires configuration, the allocation engine and the REST API together.

use actix_web::{App, HttpServer, middleware::Logger, web};
use parking_core::{AllocationEngine, LotConfig, SlotSpec};
use postgres::catalog::*;
use postgres::database::*;
use web_handlers::{core_health, parking_routes};

/// Seeds the configured catalog into the database and reads back the stored one.
async fn load_catalog_from_database(
    database_url: &str,
    seed: &[SlotSpec],
) -> Result<Vec<SlotSpec>, CatalogError> {
    let pool = create_connection_pool(database_url).await?;
    log::info!("🗃️ Database pool created successfully");

    ensure_slot_table(&pool).await?;
    let stored = count_slots(&pool).await?;
    log::info!("✅ Database reachable, {} parking slots stored", stored);
    ensure_slots(&pool, seed).await?;
    load_slot_catalog(&pool).await
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    log::info!("🚀 Starting parking lot tracker server...");

    let mut config = match LotConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            log::error!("❌ Invalid parking configuration: {}", e);
            std::process::exit(1);
        }
    };

    if let Ok(database_url) = std::env::var("DATABASE_URL") {
        match load_catalog_from_database(&database_url, &config.slots).await {
            Ok(slots) if !slots.is_empty() => config.slots = slots,
            Ok(_) => log::warn!("⚠️ Stored slot catalog is empty, using configured slots"),
            Err(e) => {
                log::error!("❌ Failed to load slot catalog from database: {}", e);
                log::warn!("🔧 Falling back to the configured slot catalog");
            }
        }
    }

    let engine = match AllocationEngine::new(&config) {
        Ok(engine) => engine,
        Err(e) => {
            log::error!("❌ Invalid slot catalog: {}", e);
            std::process::exit(1);
        }
    };

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    log::info!("🌐 Server will be available at: http://{}", bind_addr);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(engine.clone()))
            .wrap(Logger::default())
            .configure(parking_routes)
            .route("/health", web::get().to(core_health))
    })
    .bind(bind_addr)?
    .run()
    .await
}

use parking_core::{ConfigError, SlotSpec, VehicleClass};
use sqlx::{PgPool, Row};

/// Errors raised while reading or seeding the slot catalog
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored row does not describe a valid slot
    #[error("Invalid slot row: {0}")]
    InvalidRow(#[from] ConfigError),
}

/// Creates the `parking_slots` table if it does not exist yet.
pub async fn ensure_slot_table(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS parking_slots (
            code VARCHAR(10) PRIMARY KEY,
            vehicle_class VARCHAR(20) NOT NULL DEFAULT 'CAR',
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Counts the slots stored in `parking_slots`.
/// Also serves as the startup check that the catalog table is reachable.
pub async fn count_slots(pool: &PgPool) -> Result<i64, sqlx::Error> {
    let row = sqlx::query("SELECT COUNT(*) AS total FROM parking_slots")
        .fetch_one(pool)
        .await?;

    Ok(row.get("total"))
}

/// Inserts every catalog entry whose code is not stored yet, in one transaction.
/// Existing rows are left untouched. Returns the number of slots added.
pub async fn ensure_slots(pool: &PgPool, catalog: &[SlotSpec]) -> Result<u64, sqlx::Error> {
    let mut tx = pool.begin().await?;
    let mut inserted = 0;

    for spec in catalog {
        let result = sqlx::query(
            r#"
            INSERT INTO parking_slots (code, vehicle_class)
            VALUES ($1, $2)
            ON CONFLICT (code) DO NOTHING
            "#,
        )
        .bind(spec.code.trim().to_uppercase())
        .bind(spec.vehicle_class.as_str())
        .execute(&mut *tx)
        .await?;

        inserted += result.rows_affected();
    }

    tx.commit().await?;

    if inserted > 0 {
        log::info!("🅿️ Seeded {} new parking slots", inserted);
    }
    Ok(inserted)
}

/// Loads the stored slot catalog, ordered by code.
pub async fn load_slot_catalog(pool: &PgPool) -> Result<Vec<SlotSpec>, CatalogError> {
    let rows = sqlx::query("SELECT code, vehicle_class FROM parking_slots ORDER BY code")
        .fetch_all(pool)
        .await?;

    let catalog = rows
        .iter()
        .map(|row| -> Result<SlotSpec, CatalogError> {
            let code: String = row.get("code");
            let vehicle_class: VehicleClass = row.get::<String, _>("vehicle_class").parse()?;
            Ok(SlotSpec::new(code, vehicle_class))
        })
        .collect::<Result<Vec<_>, CatalogError>>()?;

    log::info!("🗃️ Loaded {} parking slots from the database", catalog.len());
    Ok(catalog)
}

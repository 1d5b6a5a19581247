//! Common helpers for live PostgreSQL tests

use galaxy_fetch::{GalaxyId, PgGalaxyStore};

/// Connect to `DATABASE_URL` (loaded from `.env` if present) and reset the `galaxies` table
pub async fn fresh_store() -> PgGalaxyStore {
    dotenvy::dotenv().ok();
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for postgres tests");

    let store = PgGalaxyStore::connect(&url).await.unwrap();
    store.ensure_schema().await.unwrap();
    sqlx::query("TRUNCATE galaxies RESTART IDENTITY")
        .execute(store.pool())
        .await
        .unwrap();
    store
}

/// Row to seed into the `galaxies` table
pub struct Seed<'a> {
    pub source_id: &'a str,
    pub gal_prob: i32,
    pub status: &'a str,
    pub failed_attempts: i32,
}

impl<'a> Seed<'a> {
    /// Pending, eligible galaxy with no failures
    pub fn pending(source_id: &'a str) -> Self {
        Self {
            source_id,
            gal_prob: 1,
            status: "Pending",
            failed_attempts: 0,
        }
    }
}

/// Insert galaxies and return their ids in insertion order
pub async fn seed(store: &PgGalaxyStore, rows: &[Seed<'_>]) -> Vec<GalaxyId> {
    let mut ids = Vec::with_capacity(rows.len());
    for (i, row) in rows.iter().enumerate() {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO galaxies (source_id, ra, dec, gal_prob, bin_id, status, failed_attempts)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(row.source_id)
        .bind(10.0 + i as f64)
        .bind(-5.0 - i as f64)
        .bind(row.gal_prob)
        .bind((i % 3) as i64)
        .bind(row.status)
        .bind(row.failed_attempts)
        .fetch_one(store.pool())
        .await
        .unwrap();
        ids.push(GalaxyId(id));
    }
    ids
}

/// Current `(status, failed_attempts)` of a galaxy
pub async fn row_state(store: &PgGalaxyStore, id: GalaxyId) -> (String, i32) {
    sqlx::query_as("SELECT status, failed_attempts FROM galaxies WHERE id = $1")
        .bind(id)
        .fetch_one(store.pool())
        .await
        .unwrap()
}

//! PostgreSQL galaxy store.

use super::{ClaimedBatch, GalaxyStore};
use crate::error::DatabaseError;
use crate::types::{Galaxy, GalaxyStatus, ProcessingResult};
use crate::{Error, Result};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};

/// Maximum pooled connections; one claim transaction is open at a time per coordinator
const MAX_CONNECTIONS: u32 = 5;

/// Opaque eligibility predicate applied on top of `status = 'Pending'`
const ELIGIBILITY_PREDICATE: &str = "gal_prob = 1";

/// Galaxy store backed by the `galaxies` table
#[derive(Clone, Debug)]
pub struct PgGalaxyStore {
    pool: PgPool,
}

impl PgGalaxyStore {
    /// Connect a pool to `database_url`
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect(database_url)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::ConnectionFailed(format!(
                    "Failed to connect to database: {}",
                    e
                )))
            })?;

        Ok(Self { pool })
    }

    /// Underlying connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the `galaxies` table and its claim index if they are missing
    ///
    /// Production tables are created by the catalog loader; this is for
    /// development databases. Safe to run repeatedly.
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS galaxies (
                id BIGSERIAL PRIMARY KEY,
                source_id TEXT NOT NULL,
                ra DOUBLE PRECISION NOT NULL,
                dec DOUBLE PRECISION NOT NULL,
                gal_prob INTEGER NOT NULL DEFAULT 1,
                bin_id BIGINT NOT NULL DEFAULT 0,
                status TEXT NOT NULL DEFAULT 'Pending',
                failed_attempts INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::MigrationFailed(format!(
                "Failed to create galaxies table: {}",
                e
            )))
        })?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_galaxies_status_id ON galaxies(status, id)")
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::MigrationFailed(format!(
                    "Failed to create galaxies status index: {}",
                    e
                )))
            })?;

        Ok(())
    }

    /// Close the pool, waiting for checked-out connections to return
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait::async_trait]
impl GalaxyStore for PgGalaxyStore {
    async fn claim(&self, limit: u32) -> Result<Box<dyn ClaimedBatch>> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            Error::Database(DatabaseError::ConnectionFailed(format!(
                "Failed to begin claim transaction: {}",
                e
            )))
        })?;

        let sql = format!(
            r#"
            SELECT id,
                   source_id::text AS source_id,
                   ra::float8 AS ra,
                   dec::float8 AS dec,
                   bin_id::int8 AS bin_id,
                   status::text AS status,
                   failed_attempts::int4 AS failed_attempts
            FROM galaxies
            WHERE status = $1 AND {ELIGIBILITY_PREDICATE}
            ORDER BY id
            LIMIT $2
            FOR UPDATE SKIP LOCKED
            "#
        );

        let galaxies = sqlx::query_as::<_, Galaxy>(&sql)
            .bind(GalaxyStatus::Pending)
            .bind(i64::from(limit))
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to claim galaxies: {}",
                    e
                )))
            })?;

        tracing::debug!(claimed = galaxies.len(), limit, "claimed galaxy batch");

        Ok(Box::new(PgClaimedBatch { tx, galaxies }))
    }
}

/// Claimed rows plus the transaction holding their locks
struct PgClaimedBatch {
    tx: Transaction<'static, Postgres>,
    galaxies: Vec<Galaxy>,
}

#[async_trait::async_trait]
impl ClaimedBatch for PgClaimedBatch {
    fn galaxies(&self) -> &[Galaxy] {
        &self.galaxies
    }

    async fn reconcile(self: Box<Self>, results: &[ProcessingResult]) -> Result<()> {
        let PgClaimedBatch { mut tx, .. } = *self;

        if !results.is_empty() {
            let ids: Vec<i64> = results.iter().map(|r| r.id.get()).collect();
            let statuses: Vec<String> = results.iter().map(|r| r.status.to_string()).collect();
            let attempts: Vec<i32> = results.iter().map(|r| r.failed_attempts).collect();

            sqlx::query(
                r#"
                UPDATE galaxies AS g
                SET status = data.status,
                    failed_attempts = data.failed_attempts
                FROM UNNEST($1::int8[], $2::text[], $3::int4[])
                     AS data(id, status, failed_attempts)
                WHERE g.id = data.id
                "#,
            )
            .bind(&ids)
            .bind(&statuses)
            .bind(&attempts)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to update galaxy statuses: {}",
                    e
                )))
            })?;
        }

        tx.commit().await.map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to commit galaxy statuses: {}",
                e
            )))
        })
    }

    async fn release(self: Box<Self>) -> Result<()> {
        self.tx.rollback().await.map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to release claim: {}",
                e
            )))
        })
    }
}

//! PostgreSQL implementation of the catalog seam.

use crate::db_error;
use sqlx::{PgPool, Row};
use tomeshop_core::error::{Result, ShopError};
use tomeshop_core::providers::{CatalogProvider, VolumePricing, VolumeReconciliation};
use tomeshop_core::{Money, SeriesId, VolumeId};
use uuid::Uuid;

/// PostgreSQL catalog: live volume pricing and volume-count reconciliation.
#[derive(Clone)]
pub struct PostgresCatalog {
    pool: PgPool,
}

impl PostgresCatalog {
    /// Create a catalog over an existing connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl CatalogProvider for PostgresCatalog {
    async fn volume_pricing(&self, volume_id: VolumeId) -> Result<VolumePricing> {
        let row = sqlx::query(
            "SELECT id, series_id, number, unit_price_cents FROM volumes WHERE id = $1",
        )
        .bind(volume_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("load volume", &e))?
        .ok_or(ShopError::NotFound { resource: "volume" })?;

        let decode = |e| db_error("decode volume", &e);
        let number: i32 = row.try_get("number").map_err(decode)?;
        Ok(VolumePricing {
            volume_id: VolumeId(row.try_get("id").map_err(decode)?),
            series_id: SeriesId(row.try_get("series_id").map_err(decode)?),
            number: u32::try_from(number)
                .map_err(|_| ShopError::database("negative volume number in storage"))?,
            unit_price: Money::from_cents(row.try_get("unit_price_cents").map_err(decode)?),
        })
    }

    async fn reconcile_volume_count(
        &self,
        series_id: SeriesId,
        declared_count: u32,
    ) -> Result<VolumeReconciliation> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("begin reconciliation", &e))?;

        // The series row lock serializes concurrent reconciliations.
        let series = sqlx::query(
            "SELECT default_unit_price_cents FROM series WHERE id = $1 FOR UPDATE",
        )
        .bind(series_id.0)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| db_error("lock series", &e))?
        .ok_or(ShopError::NotFound { resource: "series" })?;
        let default_price: i64 = series
            .try_get("default_unit_price_cents")
            .map_err(|e| db_error("decode series", &e))?;

        let existing = sqlx::query(
            "SELECT id, number FROM volumes WHERE series_id = $1 ORDER BY number",
        )
        .bind(series_id.0)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| db_error("load volumes", &e))?;

        let mut report = VolumeReconciliation::default();
        let current = u32::try_from(existing.len()).unwrap_or(u32::MAX);

        if current < declared_count {
            let next = match existing.last() {
                Some(row) => {
                    let number: i32 = row
                        .try_get("number")
                        .map_err(|e| db_error("decode volume", &e))?;
                    number + 1
                }
                None => 1,
            };
            let missing = i32::try_from(declared_count - current)
                .map_err(|_| ShopError::validation("declared volume count out of range"))?;
            for number in next..next + missing {
                sqlx::query(
                    "INSERT INTO volumes (id, series_id, number, unit_price_cents) \
                     VALUES ($1, $2, $3, $4)",
                )
                .bind(Uuid::new_v4())
                .bind(series_id.0)
                .bind(number)
                .bind(default_price)
                .execute(&mut *tx)
                .await
                .map_err(|e| db_error("create volume", &e))?;
                report.created += 1;
            }
        } else {
            // Prune the highest-numbered surplus volumes.
            for row in existing.iter().skip(declared_count as usize) {
                let id: Uuid = row
                    .try_get("id")
                    .map_err(|e| db_error("decode volume", &e))?;
                sqlx::query("DELETE FROM volumes WHERE id = $1")
                    .bind(id)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| db_error("prune volume", &e))?;
                report.pruned += 1;
            }
        }

        let declared = i32::try_from(declared_count)
            .map_err(|_| ShopError::validation("declared volume count out of range"))?;
        sqlx::query(
            "UPDATE series SET declared_volumes = $2, modified_at = now() WHERE id = $1",
        )
        .bind(series_id.0)
        .bind(declared)
        .execute(&mut *tx)
        .await
        .map_err(|e| db_error("update series", &e))?;

        tx.commit()
            .await
            .map_err(|e| db_error("commit reconciliation", &e))?;
        tracing::info!(
            %series_id,
            declared_count,
            created = report.created,
            pruned = report.pruned,
            "volume count reconciled"
        );
        Ok(report)
    }
}

//! Catalog upsert: keyed by `(mpn, manufacturer)`. The caller is
//! required to hold `enrichment:{mpn}` for the duration of this call — this
//! module does not acquire the lock itself, since the per-line activity that
//! calls it already holds it across the whole enrichment critical section
//! (step 4).

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use sqlx::{FromRow, PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use bomenrich_core::{CatalogComponent, CoreError, LifecycleStatus};

pub struct CatalogStore {
    pool: PgPool,
}

/// Outcome of an upsert attempt, distinguishing "we wrote a new/better row"
/// from "an existing row won and we're pointing the line item at it" — the
/// workflow needs to know which to decide whether to also bump the line
/// item's enrichment event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted(Uuid),
    Overwritten(Uuid),
    KeptExisting(Uuid),
}

impl UpsertOutcome {
    pub fn component_id(&self) -> Uuid {
        match *self {
            UpsertOutcome::Inserted(id) | UpsertOutcome::Overwritten(id) | UpsertOutcome::KeptExisting(id) => id,
        }
    }
}

const SELECT_COLUMNS: &str = "id, mpn, manufacturer, category, quality_score, lifecycle_status, \
datasheet_url, image_url, parameters, rohs_compliant, reach_compliant, last_verified_at";

impl CatalogStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find(&self, mpn: &str, manufacturer: &str) -> Result<Option<CatalogComponent>, CoreError> {
        let row: Option<CatalogRow> = sqlx::query_as(&format!(
                "SELECT {SELECT_COLUMNS} FROM catalog_components WHERE mpn = $1 AND manufacturer = $2"
            ))
            .bind(mpn)
            .bind(manufacturer)
            .fetch_optional(&self.pool)
            .await
            .map_err(CoreError::Database)?;

        Ok(row.map(CatalogRow::into_domain))
    }

    /// Upserts `candidate` against the existing row for `(mpn, manufacturer)`.
    /// Overwrites when the existing row has a lower `quality_score` or is
    /// older than `staleness_window`; otherwise keeps the existing row.
    /// Must run inside the caller's `enrichment:{mpn}` lock to satisfy I3
    /// (at most one catalog insert per idempotent replay).
    pub async fn upsert(
        &self,
        candidate: &CatalogComponent,
        staleness_window: ChronoDuration,
        now: DateTime<Utc>,
    ) -> Result<UpsertOutcome, CoreError> {
        let mut tx = self.pool.begin().await.map_err(CoreError::Database)?;
        let outcome = Self::upsert_in_tx(&mut tx, candidate, staleness_window, now).await?;
        tx.commit().await.map_err(CoreError::Database)?;
        Ok(outcome)
    }

    /// Upserts `candidate` and points `line_item_id` at the resulting catalog
    /// row in one transaction, so a crash between the two writes can never
    /// leave a promoted catalog row with no corresponding line-item link.
    pub async fn upsert_and_link(
        &self,
        candidate: &CatalogComponent,
        staleness_window: ChronoDuration,
        now: DateTime<Utc>,
        line_item_id: Uuid,
    ) -> Result<UpsertOutcome, CoreError> {
        let mut tx = self.pool.begin().await.map_err(CoreError::Database)?;
        let outcome = Self::upsert_in_tx(&mut tx, candidate, staleness_window, now).await?;
        let component_id = outcome.component_id();

        sqlx::query("UPDATE bom_line_items SET component_id = $2 WHERE id = $1")
            .bind(line_item_id)
            .bind(component_id)
            .execute(&mut *tx)
            .await
            .map_err(CoreError::Database)?;

        tx.commit().await.map_err(CoreError::Database)?;
        Ok(outcome)
    }

    async fn upsert_in_tx(
        tx: &mut Transaction<'_, Postgres>,
        candidate: &CatalogComponent,
        staleness_window: ChronoDuration,
        now: DateTime<Utc>,
    ) -> Result<UpsertOutcome, CoreError> {
        let existing: Option<CatalogRow> = sqlx::query_as(&format!(
                "SELECT {SELECT_COLUMNS} FROM catalog_components WHERE mpn = $1 AND manufacturer = $2 FOR UPDATE"
            ))
            .bind(&candidate.mpn)
            .bind(&candidate.manufacturer)
            .fetch_optional(&mut *tx)
            .await
            .map_err(CoreError::Database)?;

        let outcome = match existing {
            None => {
                let row = sqlx::query(
                    "INSERT INTO catalog_components \
                    (id, mpn, manufacturer, category, quality_score, lifecycle_status, \
                        datasheet_url, image_url, parameters, rohs_compliant, reach_compliant, \
                        last_verified_at) \
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
                    RETURNING id",
                )
                    .bind(candidate.id)
                    .bind(&candidate.mpn)
                    .bind(&candidate.manufacturer)
                    .bind(&candidate.category)
                    .bind(candidate.quality_score as i16)
                    .bind(lifecycle_to_str(candidate.lifecycle_status))
                    .bind(&candidate.datasheet_url)
                    .bind(&candidate.image_url)
                    .bind(&candidate.parameters)
                    .bind(candidate.rohs_compliant)
                    .bind(candidate.reach_compliant)
                    .bind(candidate.last_verified_at)
                    .fetch_one(&mut *tx)
                    .await
                    .map_err(CoreError::Database)?;
                UpsertOutcome::Inserted(row.get("id"))
            }
            Some(row) => {
                let is_stale = now - row.last_verified_at > staleness_window;
                let is_better = (candidate.quality_score as i16) > row.quality_score;

                if is_better || is_stale {
                    sqlx::query(
                        "UPDATE catalog_components \
                        SET category = $2, quality_score = $3, lifecycle_status = $4, \
                        datasheet_url = $5, image_url = $6, parameters = $7, \
                        rohs_compliant = $8, reach_compliant = $9, last_verified_at = $10 \
                        WHERE id = $1",
                    )
                        .bind(row.id)
                        .bind(&candidate.category)
                        .bind(candidate.quality_score as i16)
                        .bind(lifecycle_to_str(candidate.lifecycle_status))
                        .bind(&candidate.datasheet_url)
                        .bind(&candidate.image_url)
                        .bind(&candidate.parameters)
                        .bind(candidate.rohs_compliant)
                        .bind(candidate.reach_compliant)
                        .bind(candidate.last_verified_at)
                        .execute(&mut *tx)
                        .await
                        .map_err(CoreError::Database)?;
                    UpsertOutcome::Overwritten(row.id)
                } else {
                    UpsertOutcome::KeptExisting(row.id)
                }
            }
        };

        Ok(outcome)
    }

    /// Points a line item's `component_id` at an already-existing catalog
    /// row — used by the bulk-prefilter fast path, which matches a line
    /// against catalog data that's already committed and has no upsert of
    /// its own to share a transaction with. The production-enrichment path,
    /// which upserts and links in the same call, uses `upsert_and_link`.
    pub async fn link_line_item(&self, line_item_id: Uuid, component_id: Uuid) -> Result<(), CoreError> {
        sqlx::query("UPDATE bom_line_items SET component_id = $2 WHERE id = $1")
            .bind(line_item_id)
            .bind(component_id)
            .execute(&self.pool)
            .await
            .map_err(CoreError::Database)?;
        Ok(())
    }
}

#[derive(FromRow)]
struct CatalogRow {
    id: Uuid,
    mpn: String,
    manufacturer: String,
    category: Option<String>,
    quality_score: i16,
    lifecycle_status: String,
    datasheet_url: Option<String>,
    image_url: Option<String>,
    parameters: serde_json::Value,
    rohs_compliant: Option<bool>,
    reach_compliant: Option<bool>,
    last_verified_at: DateTime<Utc>,
}

impl CatalogRow {
    fn into_domain(self) -> CatalogComponent {
        CatalogComponent {
            id: self.id,
            mpn: self.mpn,
            manufacturer: self.manufacturer,
            category: self.category,
            quality_score: self.quality_score as u8,
            lifecycle_status: str_to_lifecycle(&self.lifecycle_status),
            datasheet_url: self.datasheet_url,
            image_url: self.image_url,
            parameters: self.parameters,
            rohs_compliant: self.rohs_compliant,
            reach_compliant: self.reach_compliant,
            last_verified_at: self.last_verified_at,
        }
    }
}

fn lifecycle_to_str(status: LifecycleStatus) -> &'static str {
    match status {
        LifecycleStatus::Active => "active",
        LifecycleStatus::Nrnd => "nrnd",
        LifecycleStatus::Obsolete => "obsolete",
        LifecycleStatus::Unknown => "unknown",
    }
}

fn str_to_lifecycle(status: &str) -> LifecycleStatus {
    match status {
        "active" => LifecycleStatus::Active,
        "nrnd" => LifecycleStatus::Nrnd,
        "obsolete" => LifecycleStatus::Obsolete,
        _ => LifecycleStatus::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_round_trips_through_its_string_form() {
        for status in [
            LifecycleStatus::Active,
            LifecycleStatus::Nrnd,
            LifecycleStatus::Obsolete,
            LifecycleStatus::Unknown,
        ] {
            assert_eq!(str_to_lifecycle(lifecycle_to_str(status)), status);
        }
    }
}

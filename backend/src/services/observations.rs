//! Observation storage
//!
//! Observations are append-only. PostgreSQL is used when a database URL is
//! configured; otherwise records live in memory for the lifetime of the
//! process.

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{FromRow, PgPool};
use shared::{Observation, Severity};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Read/write source of raw observation rows
#[async_trait]
pub trait ObservationStore: Send + Sync {
    /// Append observations; returns the number stored
    async fn insert_many(&self, observations: &[Observation]) -> AppResult<usize>;

    /// Every stored observation, oldest first
    async fn all(&self) -> AppResult<Vec<Observation>>;

    /// Observations on `date` whose region contains `region` (case-insensitive)
    async fn by_region_and_date(&self, region: &str, date: NaiveDate) -> AppResult<Vec<Observation>>;

    async fn count(&self) -> AppResult<usize>;
}

fn region_matches(candidate: &str, needle: &str) -> bool {
    candidate.to_lowercase().contains(&needle.trim().to_lowercase())
}

// ============================================================================
// In-memory store
// ============================================================================

#[derive(Default)]
pub struct MemoryObservationStore {
    records: RwLock<Vec<Observation>>,
}

impl MemoryObservationStore {
    pub fn new(records: Vec<Observation>) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }
}

#[async_trait]
impl ObservationStore for MemoryObservationStore {
    async fn insert_many(&self, observations: &[Observation]) -> AppResult<usize> {
        let mut records = self.records.write().await;
        records.extend_from_slice(observations);
        Ok(observations.len())
    }

    async fn all(&self) -> AppResult<Vec<Observation>> {
        let mut records = self.records.read().await.clone();
        records.sort_by_key(|r| r.date);
        Ok(records)
    }

    async fn by_region_and_date(&self, region: &str, date: NaiveDate) -> AppResult<Vec<Observation>> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .filter(|r| r.date == date && region_matches(&r.region, region))
            .cloned()
            .collect())
    }

    async fn count(&self) -> AppResult<usize> {
        Ok(self.records.read().await.len())
    }
}

// ============================================================================
// PostgreSQL store
// ============================================================================

#[derive(Debug, FromRow)]
struct ObservationRow {
    station: String,
    region: String,
    coordinate_text: String,
    latitude: f64,
    longitude: f64,
    observed_on: NaiveDate,
    severity: i16,
    severity_text: String,
    tracking: String,
    upkeep: String,
    notes: String,
}

impl TryFrom<ObservationRow> for Observation {
    type Error = AppError;

    fn try_from(row: ObservationRow) -> Result<Self, Self::Error> {
        let severity = u8::try_from(row.severity)
            .ok()
            .and_then(Severity::new)
            .ok_or_else(|| AppError::Internal(format!("stored severity {} out of range", row.severity)))?;

        Ok(Observation {
            station: row.station,
            region: row.region,
            coordinate_text: row.coordinate_text,
            latitude: row.latitude,
            longitude: row.longitude,
            date: row.observed_on,
            severity,
            severity_text: row.severity_text,
            tracking: row.tracking,
            upkeep: row.upkeep,
            notes: row.notes,
        })
    }
}

const SELECT_COLUMNS: &str = "SELECT station, region, coordinate_text, latitude, longitude, observed_on, \
     severity, severity_text, tracking, upkeep, notes FROM observations";

#[derive(Clone)]
pub struct PgObservationStore {
    db: PgPool,
}

impl PgObservationStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ObservationStore for PgObservationStore {
    async fn insert_many(&self, observations: &[Observation]) -> AppResult<usize> {
        let mut tx = self.db.begin().await?;

        for obs in observations {
            sqlx::query(
                r#"
                INSERT INTO observations (id, station, region, coordinate_text, latitude, longitude,
                                          observed_on, severity, severity_text, tracking, upkeep, notes)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(&obs.station)
            .bind(&obs.region)
            .bind(&obs.coordinate_text)
            .bind(obs.latitude)
            .bind(obs.longitude)
            .bind(obs.date)
            .bind(i16::from(obs.severity.level()))
            .bind(&obs.severity_text)
            .bind(&obs.tracking)
            .bind(&obs.upkeep)
            .bind(&obs.notes)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(observations.len())
    }

    async fn all(&self) -> AppResult<Vec<Observation>> {
        let rows = sqlx::query_as::<_, ObservationRow>(&format!(
            "{} ORDER BY observed_on, created_at",
            SELECT_COLUMNS
        ))
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(Observation::try_from).collect()
    }

    async fn by_region_and_date(&self, region: &str, date: NaiveDate) -> AppResult<Vec<Observation>> {
        let rows = sqlx::query_as::<_, ObservationRow>(&format!(
            "{} WHERE observed_on = $1 AND LOWER(region) LIKE '%' || LOWER($2) || '%' ORDER BY station",
            SELECT_COLUMNS
        ))
        .bind(date)
        .bind(region.trim())
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(Observation::try_from).collect()
    }

    async fn count(&self) -> AppResult<usize> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM observations")
            .fetch_one(&self.db)
            .await?;
        Ok(count.max(0) as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(region: &str, day: u32) -> Observation {
        Observation {
            station: "Pyhäjärvi".to_string(),
            region: region.to_string(),
            coordinate_text: String::new(),
            latitude: 61.0,
            longitude: 22.3,
            date: NaiveDate::from_ymd_opt(2024, 7, day).unwrap(),
            severity: Severity::MINOR,
            severity_text: String::new(),
            tracking: String::new(),
            upkeep: String::new(),
            notes: String::new(),
        }
    }

    #[tokio::test]
    async fn test_memory_store_region_filter_is_case_insensitive() {
        let store = MemoryObservationStore::default();
        store
            .insert_many(&[
                obs("Varsinais-Suomen ELY-keskus", 1),
                obs("Hämeen ELY-keskus", 1),
                obs("Varsinais-Suomen ELY-keskus", 2),
            ])
            .await
            .unwrap();

        let found = store
            .by_region_and_date("varsinais", NaiveDate::from_ymd_opt(2024, 7, 1).unwrap())
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(store.count().await.unwrap(), 3);
    }
}

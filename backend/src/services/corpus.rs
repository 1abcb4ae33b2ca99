//! Enriched corpus persistence
//!
//! The enriched corpus is the training set and the source of month-typical
//! weather at prediction time. It is stored as a semicolon-delimited file
//! with one row per observation; weather cells are empty when enrichment
//! failed. The per-day weather behind each row goes to a separate audit file.

use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use shared::{EnrichedObservation, Observation, Severity, WeatherWindow};

use crate::error::{AppError, AppResult};

/// One corpus row as written to disk
#[derive(Debug, Serialize, Deserialize)]
struct CorpusRow {
    station: String,
    region: String,
    coordinates: String,
    date: NaiveDate,
    severity: u8,
    severity_text: String,
    tracking: String,
    upkeep: String,
    notes: String,
    latitude: f64,
    longitude: f64,
    year: i32,
    day_of_year: u32,
    avg_temp_7d: Option<f64>,
    precip_sum_7d: Option<f64>,
    wind_mean_7d: Option<f64>,
}

impl From<&EnrichedObservation> for CorpusRow {
    fn from(record: &EnrichedObservation) -> Self {
        let obs = &record.observation;
        Self {
            station: obs.station.clone(),
            region: obs.region.clone(),
            coordinates: obs.coordinate_text.clone(),
            date: obs.date,
            severity: obs.severity.level(),
            severity_text: obs.severity_text.clone(),
            tracking: obs.tracking.clone(),
            upkeep: obs.upkeep.clone(),
            notes: obs.notes.clone(),
            latitude: obs.latitude,
            longitude: obs.longitude,
            year: obs.year(),
            day_of_year: obs.day_of_year(),
            avg_temp_7d: record.weather.map(|w| w.avg_temp_7d),
            precip_sum_7d: record.weather.map(|w| w.precip_sum_7d),
            wind_mean_7d: record.weather.map(|w| w.wind_mean_7d),
        }
    }
}

impl TryFrom<CorpusRow> for EnrichedObservation {
    type Error = AppError;

    fn try_from(row: CorpusRow) -> Result<Self, Self::Error> {
        let severity = Severity::new(row.severity).ok_or_else(|| {
            AppError::validation(
                "severity",
                format!("severity {} outside 0..=3", row.severity),
                format!("levätilanne {} ei ole välillä 0..3", row.severity),
            )
        })?;

        // A window is only kept when all three aggregates are present
        let weather = match (row.avg_temp_7d, row.precip_sum_7d, row.wind_mean_7d) {
            (Some(t), Some(p), Some(w)) => Some(WeatherWindow::new(t, p, w)).filter(|w| w.is_finite()),
            _ => None,
        };

        Ok(EnrichedObservation {
            observation: Observation {
                station: row.station,
                region: row.region,
                coordinate_text: row.coordinates,
                latitude: row.latitude,
                longitude: row.longitude,
                date: row.date,
                severity,
                severity_text: row.severity_text,
                tracking: row.tracking,
                upkeep: row.upkeep,
                notes: row.notes,
            },
            weather,
            daily: Vec::new(),
        })
    }
}

/// One day of archive weather behind a corpus row
#[derive(Debug, Serialize)]
struct AuditRow<'a> {
    observation_index: usize,
    station: &'a str,
    date: NaiveDate,
    temperature_2m_mean: f64,
    precipitation_sum: f64,
    wind_speed_10m_mean: f64,
}

fn create_parent(path: &Path) -> AppResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

fn writer(path: &Path) -> AppResult<csv::Writer<fs::File>> {
    create_parent(path)?;
    Ok(csv::WriterBuilder::new().delimiter(b';').from_path(path)?)
}

/// Write the enriched corpus
pub fn write_corpus(path: &Path, records: &[EnrichedObservation]) -> AppResult<()> {
    let mut wtr = writer(path)?;
    for record in records {
        wtr.serialize(CorpusRow::from(record))?;
    }
    wtr.flush()?;
    tracing::info!("Wrote {} corpus rows to {}", records.len(), path.display());
    Ok(())
}

/// Read a previously written corpus
pub fn read_corpus(path: &Path) -> AppResult<Vec<EnrichedObservation>> {
    let mut rdr = csv::ReaderBuilder::new().delimiter(b';').from_path(path)?;

    rdr.deserialize::<CorpusRow>()
        .map(|row| EnrichedObservation::try_from(row?))
        .collect()
}

/// Write the per-day weather behind every enriched row; returns the number of rows written
pub fn write_daily_audit(path: &Path, records: &[EnrichedObservation]) -> AppResult<usize> {
    let mut wtr = writer(path)?;
    let mut written = 0;

    for (index, record) in records.iter().enumerate() {
        for day in &record.daily {
            wtr.serialize(AuditRow {
                observation_index: index,
                station: &record.observation.station,
                date: day.date,
                temperature_2m_mean: day.temperature_mean,
                precipitation_sum: day.precipitation_sum,
                wind_speed_10m_mean: day.wind_speed_mean,
            })?;
            written += 1;
        }
    }

    wtr.flush()?;
    tracing::info!("Wrote {} daily weather rows to {}", written, path.display());
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::DailyWeather;

    fn record(station: &str, level: u8, weather: Option<WeatherWindow>) -> EnrichedObservation {
        EnrichedObservation {
            observation: Observation {
                station: station.to_string(),
                region: "Hämeen ELY-keskus".to_string(),
                coordinate_text: "61° 5' 24.14\" N, 24° 57' 26.17\" E".to_string(),
                latitude: 61.09,
                longitude: 24.957,
                date: NaiveDate::from_ymd_opt(2022, 7, 15).unwrap(),
                severity: Severity::new(level).unwrap(),
                severity_text: "Runsaasti levää; pintakukinta".to_string(),
                tracking: String::new(),
                upkeep: String::new(),
                notes: String::new(),
            },
            weather,
            daily: Vec::new(),
        }
    }

    #[test]
    fn test_unenriched_rows_keep_empty_weather() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corpus.csv");
        let records = vec![
            record("Ormajärvi", 2, Some(WeatherWindow::new(18.2, 4.5, 11.0))),
            record("Vesijärvi", 0, None),
        ];

        write_corpus(&path, &records).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("station;region;coordinates;date;severity"));
        assert!(text.lines().nth(2).unwrap().ends_with(";;;"));

        let loaded = read_corpus(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].weather, Some(WeatherWindow::new(18.2, 4.5, 11.0)));
        assert_eq!(loaded[0].observation.severity_text, "Runsaasti levää; pintakukinta");
        assert!(loaded[1].weather.is_none());
    }

    #[test]
    fn test_daily_audit_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("daily.csv");
        let mut enriched = record("Ormajärvi", 1, Some(WeatherWindow::new(15.0, 0.0, 9.0)));
        enriched.daily = vec![
            DailyWeather {
                date: NaiveDate::from_ymd_opt(2022, 7, 14).unwrap(),
                temperature_mean: 14.0,
                precipitation_sum: 0.0,
                wind_speed_mean: 8.0,
            },
            DailyWeather {
                date: NaiveDate::from_ymd_opt(2022, 7, 15).unwrap(),
                temperature_mean: 16.0,
                precipitation_sum: 0.0,
                wind_speed_mean: 10.0,
            },
        ];

        let written = write_daily_audit(&path, &[record("A", 0, None), enriched]).unwrap();
        assert_eq!(written, 2);

        let text = fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "observation_index;station;date;temperature_2m_mean;precipitation_sum;wind_speed_10m_mean"
        );
        assert!(lines.next().unwrap().starts_with("1;Ormajärvi;2022-07-14;14.0"));
    }
}

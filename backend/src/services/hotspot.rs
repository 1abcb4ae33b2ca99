//! Hotspot report service

use std::path::Path;

use serde::Serialize;
use shared::{GpsCoordinates, HotspotReport, StationRisk};

use crate::error::{AppError, AppResult};
use crate::services::observations::ObservationStore;

/// Score every station currently in the store
pub async fn build_report(store: &dyn ObservationStore) -> AppResult<HotspotReport> {
    let observations = store.all().await?;
    let report = HotspotReport::from_observations(&observations);

    tracing::info!(
        "Hotspot report: {} stations over {} years, {} flagged",
        report.stations.len(),
        report.years.len(),
        report.hotspots().count()
    );

    Ok(report)
}

/// Report rows for the map
pub fn list(report: &HotspotReport, include_all: bool) -> Vec<StationRisk> {
    report
        .stations
        .iter()
        .filter(|s| include_all || s.is_hotspot)
        .cloned()
        .collect()
}

/// Station closest to a clicked point
pub fn nearest(report: &HotspotReport, point: GpsCoordinates, hotspots_only: bool) -> AppResult<StationRisk> {
    report
        .nearest(point, hotspots_only)
        .cloned()
        .ok_or_else(|| AppError::NotFound("Station".to_string()))
}

#[derive(Serialize)]
struct HotspotCsvRow<'a> {
    station: &'a str,
    latitude: f64,
    longitude: f64,
    risk_number: u32,
    problem_years: u32,
    years_covered: u32,
    latest_year_max: u8,
    is_hotspot: bool,
    color: &'a str,
}

/// Write the report as a semicolon-delimited table
pub fn write_csv(path: &Path, report: &HotspotReport) -> AppResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut wtr = csv::WriterBuilder::new().delimiter(b';').from_path(path)?;
    for s in &report.stations {
        wtr.serialize(HotspotCsvRow {
            station: &s.station,
            latitude: s.latitude,
            longitude: s.longitude,
            risk_number: s.risk_number,
            problem_years: s.problem_years,
            years_covered: s.years_covered,
            latest_year_max: s.latest_year_max,
            is_hotspot: s.is_hotspot,
            color: &s.color,
        })?;
    }
    wtr.flush()?;
    Ok(())
}

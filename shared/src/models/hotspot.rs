//! Multi-year hotspot scoring for the observation map

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::models::Observation;
use crate::types::GpsCoordinates;

/// Risk number at or above which a station is a hotspot
pub const HOTSPOT_RISK_THRESHOLD: u32 = 4;

/// A single year at this level makes the station a hotspot regardless of its risk number
pub const HOTSPOT_SEVERITY_THRESHOLD: u8 = 3;

/// Marker colour for a risk number
pub fn risk_color(risk_number: u32) -> &'static str {
    match risk_number {
        r if r >= 12 => "#8B0000",
        r if r >= 8 => "red",
        r if r >= 4 => "orange",
        _ => "#FCFC07",
    }
}

/// Recurrence summary for one station
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationRisk {
    pub station: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Highest severity per year; years without observations count as 0
    pub yearly_max: BTreeMap<i32, u8>,
    /// Sum of the yearly maxima
    pub risk_number: u32,
    /// Years with a nonzero maximum
    pub problem_years: u32,
    /// Maximum in the most recent year of the dataset
    pub latest_year_max: u8,
    /// Number of years the dataset spans
    pub years_covered: u32,
    pub is_hotspot: bool,
    pub color: String,
}

impl StationRisk {
    /// Score a station from its per-year maxima.
    ///
    /// `years` is the full set of dataset years; missing entries in
    /// `yearly_max` are filled with 0.
    pub fn from_yearly_max(
        station: impl Into<String>,
        coordinates: GpsCoordinates,
        yearly_max: &BTreeMap<i32, u8>,
        years: &BTreeSet<i32>,
    ) -> Self {
        let filled: BTreeMap<i32, u8> = years
            .iter()
            .map(|year| (*year, yearly_max.get(year).copied().unwrap_or(0)))
            .collect();

        let risk_number: u32 = filled.values().map(|&v| u32::from(v)).sum();
        let problem_years = filled.values().filter(|&&v| v > 0).count() as u32;
        let peak = filled.values().copied().max().unwrap_or(0);
        let latest_year_max = years
            .iter()
            .next_back()
            .and_then(|year| filled.get(year).copied())
            .unwrap_or(0);

        let is_hotspot = risk_number >= HOTSPOT_RISK_THRESHOLD || peak >= HOTSPOT_SEVERITY_THRESHOLD;

        Self {
            station: station.into(),
            latitude: coordinates.latitude,
            longitude: coordinates.longitude,
            yearly_max: filled,
            risk_number,
            problem_years,
            latest_year_max,
            years_covered: years.len() as u32,
            is_hotspot,
            color: risk_color(risk_number).to_string(),
        }
    }

    pub fn coordinates(&self) -> GpsCoordinates {
        GpsCoordinates::new(self.latitude, self.longitude)
    }
}

/// Hotspot scores for every station in a dataset
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HotspotReport {
    pub years: Vec<i32>,
    /// Sorted by risk number, highest first
    pub stations: Vec<StationRisk>,
}

type StationKey = (String, u64, u64);

impl HotspotReport {
    /// Group observations by station and score each station's history
    pub fn from_observations<'a, I>(observations: I) -> Self
    where
        I: IntoIterator<Item = &'a Observation>,
    {
        let mut years = BTreeSet::new();
        let mut per_station: BTreeMap<StationKey, (GpsCoordinates, BTreeMap<i32, u8>)> =
            BTreeMap::new();

        for obs in observations {
            let year = obs.year();
            years.insert(year);

            let key = (
                obs.station.clone(),
                obs.latitude.to_bits(),
                obs.longitude.to_bits(),
            );
            let entry = per_station
                .entry(key)
                .or_insert_with(|| (obs.coordinates(), BTreeMap::new()));
            let slot = entry.1.entry(year).or_insert(0);
            *slot = (*slot).max(obs.severity.level());
        }

        let mut stations: Vec<StationRisk> = per_station
            .into_iter()
            .map(|((name, _, _), (coords, yearly))| {
                StationRisk::from_yearly_max(name, coords, &yearly, &years)
            })
            .collect();

        stations.sort_by(|a, b| {
            b.risk_number
                .cmp(&a.risk_number)
                .then_with(|| a.station.cmp(&b.station))
        });

        Self {
            years: years.into_iter().collect(),
            stations,
        }
    }

    /// Stations flagged for the map
    pub fn hotspots(&self) -> impl Iterator<Item = &StationRisk> {
        self.stations.iter().filter(|s| s.is_hotspot)
    }

    /// Station closest to a clicked point, compared in plain degree space
    pub fn nearest(&self, point: GpsCoordinates, hotspots_only: bool) -> Option<&StationRisk> {
        self.stations
            .iter()
            .filter(|s| !hotspots_only || s.is_hotspot)
            .min_by(|a, b| {
                a.coordinates()
                    .squared_degree_distance(&point)
                    .total_cmp(&b.coordinates().squared_degree_distance(&point))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Severity;
    use chrono::NaiveDate;

    fn obs(station: &str, lat: f64, lon: f64, date: (i32, u32, u32), level: u8) -> Observation {
        Observation {
            station: station.to_string(),
            region: "Hämeen ELY-keskus".to_string(),
            coordinate_text: String::new(),
            latitude: lat,
            longitude: lon,
            date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            severity: Severity::new(level).unwrap(),
            severity_text: String::new(),
            tracking: String::new(),
            upkeep: String::new(),
            notes: String::new(),
        }
    }

    #[test]
    fn test_five_year_history_scoring() {
        let years: BTreeSet<i32> = (2021..=2025).collect();
        let yearly: BTreeMap<i32, u8> = [(2021, 0), (2022, 2), (2023, 3), (2024, 0), (2025, 1)]
            .into_iter()
            .collect();

        let risk = StationRisk::from_yearly_max("Ormajärvi", GpsCoordinates::new(61.09, 24.95), &yearly, &years);

        assert_eq!(risk.risk_number, 6);
        assert_eq!(risk.problem_years, 3);
        assert_eq!(risk.latest_year_max, 1);
        assert_eq!(risk.years_covered, 5);
        assert!(risk.is_hotspot);
        assert_eq!(risk.color, "orange");
    }

    #[test]
    fn test_single_severe_year_is_hotspot() {
        let years: BTreeSet<i32> = (2021..=2025).collect();
        let yearly: BTreeMap<i32, u8> = [(2023, 3)].into_iter().collect();
        let risk = StationRisk::from_yearly_max("Pyhäjärvi", GpsCoordinates::new(61.0, 22.3), &yearly, &years);

        assert_eq!(risk.risk_number, 3);
        assert!(risk.is_hotspot);
        assert_eq!(risk.color, "#FCFC07");
    }

    #[test]
    fn test_quiet_station_is_not_hotspot() {
        let years: BTreeSet<i32> = (2021..=2025).collect();
        let yearly: BTreeMap<i32, u8> = [(2021, 1), (2022, 1), (2025, 1)].into_iter().collect();
        let risk = StationRisk::from_yearly_max("Näsijärvi", GpsCoordinates::new(61.6, 23.7), &yearly, &years);

        assert_eq!(risk.risk_number, 3);
        assert_eq!(risk.problem_years, 3);
        assert!(!risk.is_hotspot);
    }

    #[test]
    fn test_report_takes_yearly_maximum() {
        let observations = vec![
            obs("A", 61.0, 24.0, (2021, 6, 1), 1),
            obs("A", 61.0, 24.0, (2021, 7, 1), 3),
            obs("A", 61.0, 24.0, (2022, 7, 1), 2),
            obs("B", 62.0, 25.0, (2022, 7, 1), 0),
        ];

        let report = HotspotReport::from_observations(&observations);

        assert_eq!(report.years, vec![2021, 2022]);
        assert_eq!(report.stations.len(), 2);
        let a = &report.stations[0];
        assert_eq!(a.station, "A");
        assert_eq!(a.yearly_max.get(&2021), Some(&3));
        assert_eq!(a.risk_number, 5);
        assert_eq!(a.latest_year_max, 2);
        assert!(a.is_hotspot);

        let b = &report.stations[1];
        assert_eq!(b.yearly_max.get(&2021), Some(&0));
        assert!(!b.is_hotspot);
        assert_eq!(report.hotspots().count(), 1);
    }

    #[test]
    fn test_nearest_station() {
        let observations = vec![
            obs("A", 61.0, 24.0, (2021, 6, 1), 3),
            obs("B", 65.0, 25.0, (2021, 6, 1), 0),
        ];
        let report = HotspotReport::from_observations(&observations);

        let near_b = report.nearest(GpsCoordinates::new(64.8, 25.1), false).unwrap();
        assert_eq!(near_b.station, "B");

        let hotspot = report.nearest(GpsCoordinates::new(64.8, 25.1), true).unwrap();
        assert_eq!(hotspot.station, "A");
    }

    #[test]
    fn test_risk_color_bands() {
        assert_eq!(risk_color(0), "#FCFC07");
        assert_eq!(risk_color(4), "orange");
        assert_eq!(risk_color(8), "red");
        assert_eq!(risk_color(12), "#8B0000");
    }
}

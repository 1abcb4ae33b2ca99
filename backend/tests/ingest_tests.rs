//! Ingestion integration tests
//!
//! Tests for loading survey exports from a data directory:
//! - File discovery and ordering
//! - Encoding fallback
//! - Cleaned-row invariants

use std::fs;
use std::path::Path;

use algae_bloom_backend::error::AppError;
use algae_bloom_backend::services::ingest::parse_table;
use algae_bloom_backend::services::RecordIngestor;
use proptest::prelude::*;
use tempfile::TempDir;

const HEADER: &str = "Havaintopaikka;Koordinaatit;Päivämäärä;ELY-keskus;LevätilanneNum;LevätilanneTxt";

fn write(dir: &Path, name: &str, contents: &[u8]) {
    fs::write(dir.join(name), contents).unwrap();
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_only_prefixed_two_digit_files_are_read() {
        let dir = TempDir::new().unwrap();
        let row = "Ormajärvi;61 5 24 N, 24 57 26 E;15.7.2022;Hämeen ELY-keskus;2;Runsaasti levää";
        write(dir.path(), "Havainto22.csv", format!("{HEADER}\n{row}\n").as_bytes());
        write(dir.path(), "havainto21.CSV", format!("{HEADER}\n{row}\n").as_bytes());
        write(dir.path(), "Havainto2023.csv", format!("{HEADER}\n{row}\n").as_bytes());
        write(dir.path(), "notes.csv", b"irrelevant");

        let ingestor = RecordIngestor::new(dir.path(), "Havainto");
        let files = ingestor.source_files().unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();

        assert_eq!(names, vec!["Havainto22.csv", "havainto21.CSV"]);
    }

    #[test]
    fn test_empty_directory_is_an_error() {
        let dir = TempDir::new().unwrap();
        let err = RecordIngestor::new(dir.path(), "Havainto").ingest().unwrap_err();
        assert!(matches!(err, AppError::NoSourceFiles { .. }));
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let dir = TempDir::new().unwrap();
        let err = RecordIngestor::new(dir.path().join("nope"), "Havainto")
            .ingest()
            .unwrap_err();
        assert!(matches!(err, AppError::NoSourceFiles { .. }));
    }

    #[test]
    fn test_unreadable_file_is_skipped() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "Havainto21.csv",
            format!("{HEADER}\nA;60 0 0 N, 24 0 0 E;1.7.2021;X;1;\n").as_bytes(),
        );
        // No coordinate column
        write(dir.path(), "Havainto22.csv", "Päivämäärä;LevätilanneNum\n1.7.2022;1\n".as_bytes());

        let report = RecordIngestor::new(dir.path(), "Havainto").ingest().unwrap();
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.files_read.len(), 1);
        assert_eq!(report.files_skipped.len(), 1);
    }

    #[test]
    fn test_latin1_file_is_decoded() {
        let dir = TempDir::new().unwrap();
        let mut bytes = b"Havaintopaikka;Koordinaatit;P\xe4iv\xe4m\xe4\xe4r\xe4;ELY-keskus;Lev\xe4tilanneNum\n".to_vec();
        bytes.extend_from_slice(b"N\xe4sij\xe4rvi;61 30 0 N, 23 45 0 E;2.8.2023;Pirkanmaan ELY-keskus;3\n");
        write(dir.path(), "Havainto23.csv", &bytes);

        let report = RecordIngestor::new(dir.path(), "Havainto").ingest().unwrap();
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.records[0].station, "Näsijärvi");
        assert_eq!(report.records[0].severity.level(), 3);
    }

    #[test]
    fn test_ingest_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let rows = [
            "A;60 10 0 N, 24 56 0 E;1.7.2021;Uusimaa;0",
            "B;61 0 0 N, 22 17 0 E;2021-07-08;Varsinais-Suomi;2",
            "C;bad;2021-07-08;Varsinais-Suomi;2",
        ];
        write(
            dir.path(),
            "Havainto21.csv",
            format!("{HEADER}\n{}\n", rows.join("\n")).as_bytes(),
        );

        let ingestor = RecordIngestor::new(dir.path(), "Havainto");
        let first = ingestor.ingest().unwrap();
        let second = ingestor.ingest().unwrap();

        assert_eq!(first.records, second.records);
        assert_eq!(first.rows_read, 3);
        assert_eq!(first.rows_dropped, 1);
    }

    #[test]
    fn test_duplicate_rows_are_kept() {
        let row = "A;60 10 0 N, 24 56 0 E;1.7.2021;Uusimaa;1";
        let table = parse_table(&format!("{HEADER}\n{row}\n{row}\n")).unwrap();
        assert_eq!(table.records.len(), 2);
    }
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    /// Every kept row has a valid date, in-range coordinates and a 0-3 level
    #[test]
    fn prop_cleaned_rows_are_complete(
        lat_deg in 0u32..100,
        lon_deg in 0u32..200,
        minutes in 0u32..60,
        level in prop::sample::select(vec!["0", "1", "2", "3", "4", "-1", "1.5", "x", ""]),
        day in 1u32..29,
    ) {
        let text = format!(
            "{HEADER}\nS;{lat_deg} {minutes} 0 N, {lon_deg} {minutes} 0 E;{day}.7.2022;R;{level};\n"
        );
        let table = parse_table(&text).unwrap();

        prop_assert_eq!(table.rows_read, table.records.len() + table.rows_dropped);
        for obs in &table.records {
            prop_assert!((-90.0..=90.0).contains(&obs.latitude));
            prop_assert!((-180.0..=180.0).contains(&obs.longitude));
            prop_assert!(obs.severity.level() <= 3);
            prop_assert_eq!(obs.year(), 2022);
        }
    }
}

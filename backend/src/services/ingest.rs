//! Survey file ingestion
//!
//! Loads the yearly `HavaintoNN.csv` exports, resolves their columns by
//! header name and produces a cleaned record set in which every row has a
//! date, a valid coordinate pair and a severity level.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;
use shared::{parse_flexible_date, parse_severity, split_coordinate_pair, validate_coordinates, Observation};

use crate::config::Config;
use crate::error::{AppError, AppResult};

/// Columns understood by the ingestor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Column {
    Station,
    Coordinates,
    Date,
    Region,
    Severity,
    SeverityText,
    Tracking,
    Upkeep,
    Notes,
}

impl Column {
    /// Resolve a header cell, accepting the Finnish export names and English aliases
    fn from_header(header: &str) -> Option<Self> {
        let normalized = header.trim().trim_start_matches('\u{feff}').trim().to_lowercase();
        let column = match normalized.as_str() {
            "havaintopaikka" | "station" | "location" => Column::Station,
            "koordinaatit" | "coordinates" => Column::Coordinates,
            "päivämäärä" | "paivamaara" | "date" => Column::Date,
            "ely-keskus" | "region" | "operator" => Column::Region,
            "levätilannenum" | "levatilannenum" | "severity" | "level" => Column::Severity,
            "levätilannetxt" | "levatilannetxt" | "severity_text" | "txt" => Column::SeverityText,
            "seuranta" | "tracking" => Column::Tracking,
            "ylläpito" | "yllapito" | "upkeep" => Column::Upkeep,
            "lisätiedot" | "lisatiedot" | "notes" | "description" => Column::Notes,
            _ => return None,
        };
        Some(column)
    }
}

const REQUIRED_COLUMNS: [Column; 3] = [Column::Coordinates, Column::Date, Column::Severity];

/// Outcome of one ingestion run
#[derive(Debug, Clone, Default)]
pub struct IngestReport {
    pub records: Vec<Observation>,
    pub files_read: Vec<PathBuf>,
    pub files_skipped: Vec<PathBuf>,
    pub rows_read: usize,
    pub rows_dropped: usize,
}

/// Rows parsed out of a single file
#[derive(Debug, Default)]
pub struct ParsedTable {
    pub records: Vec<Observation>,
    pub rows_read: usize,
    pub rows_dropped: usize,
}

/// Reads and cleans the survey exports in a directory
#[derive(Debug, Clone)]
pub struct RecordIngestor {
    directory: PathBuf,
    prefix: String,
}

impl RecordIngestor {
    pub fn new(directory: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            prefix: prefix.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.data_directory.clone(), config.file_prefix.clone())
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn no_files(&self) -> AppError {
        AppError::NoSourceFiles {
            directory: self.directory.display().to_string(),
            prefix: self.prefix.clone(),
        }
    }

    /// Matching `<prefix>NN.csv` files, sorted by file name
    pub fn source_files(&self) -> AppResult<Vec<PathBuf>> {
        let pattern = Regex::new(&format!(r"(?i)^{}\d{{2}}\.csv$", regex::escape(&self.prefix)))
            .map_err(|e| AppError::Configuration(format!("file prefix: {}", e)))?;

        let entries = match fs::read_dir(&self.directory) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(self.no_files()),
            Err(e) => return Err(e.into()),
        };

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            let matches = name.to_str().map(|n| pattern.is_match(n)).unwrap_or(false);
            if matches && entry.path().is_file() {
                files.push(entry.path());
            }
        }

        files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        Ok(files)
    }

    /// Load, union and clean every matching file
    pub fn ingest(&self) -> AppResult<IngestReport> {
        let files = self.source_files()?;
        if files.is_empty() {
            return Err(self.no_files());
        }

        let mut report = IngestReport::default();

        for path in files {
            let parsed = fs::read(&path)
                .map_err(AppError::from)
                .and_then(|bytes| parse_table(&decode_text(&bytes)));

            match parsed {
                Ok(table) => {
                    tracing::info!(
                        "Read {} ({} rows, {} dropped)",
                        path.display(),
                        table.rows_read,
                        table.rows_dropped
                    );
                    report.rows_read += table.rows_read;
                    report.rows_dropped += table.rows_dropped;
                    report.records.extend(table.records);
                    report.files_read.push(path);
                }
                Err(e) => {
                    tracing::warn!("Skipping {}: {}", path.display(), e);
                    report.files_skipped.push(path);
                }
            }
        }

        if report.files_read.is_empty() {
            return Err(self.no_files());
        }

        tracing::info!(
            "Combined {} files: {} rows read, {} kept",
            report.files_read.len(),
            report.rows_read,
            report.records.len()
        );

        Ok(report)
    }
}

/// Decode file contents as UTF-8, falling back to Latin-1.
///
/// A leading byte order mark is dropped.
pub fn decode_text(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        // Latin-1 maps every byte to the code point of the same value
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

/// Parse one semicolon-delimited export into cleaned observations
pub fn parse_table(text: &str) -> AppResult<ParsedTable> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let mut columns: HashMap<Column, usize> = HashMap::new();
    for (index, header) in reader.headers()?.iter().enumerate() {
        if let Some(column) = Column::from_header(header) {
            columns.entry(column).or_insert(index);
        }
    }

    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|c| !columns.contains_key(c))
        .map(|c| format!("{:?}", c))
        .collect();
    if !missing.is_empty() {
        return Err(AppError::validation(
            "columns",
            format!("missing required columns: {}", missing.join(", ")),
            format!("pakollisia sarakkeita puuttuu: {}", missing.join(", ")),
        ));
    }

    let mut table = ParsedTable::default();
    for row in reader.records() {
        let row = row?;
        table.rows_read += 1;

        let cell = |column: Column| {
            columns
                .get(&column)
                .and_then(|&i| row.get(i))
                .unwrap_or("")
        };

        match clean_row(cell) {
            Some(observation) => table.records.push(observation),
            None => table.rows_dropped += 1,
        }
    }

    Ok(table)
}

/// Build an observation from a row, or `None` when a required value is missing or invalid
fn clean_row<'a>(cell: impl Fn(Column) -> &'a str) -> Option<Observation> {
    let date = parse_flexible_date(cell(Column::Date))?;

    let coordinate_text = cell(Column::Coordinates);
    let (latitude, longitude) = split_coordinate_pair(coordinate_text);
    let (latitude, longitude) = (latitude?, longitude?);
    validate_coordinates(latitude, longitude).ok()?;

    let severity = parse_severity(cell(Column::Severity))?;

    Some(Observation {
        station: cell(Column::Station).to_string(),
        region: cell(Column::Region).to_string(),
        coordinate_text: coordinate_text.to_string(),
        latitude,
        longitude,
        date,
        severity,
        severity_text: cell(Column::SeverityText).to_string(),
        tracking: cell(Column::Tracking).to_string(),
        upkeep: cell(Column::Upkeep).to_string(),
        notes: cell(Column::Notes).to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const HEADER: &str =
        "Havaintopaikka;Koordinaatit;Päivämäärä;ELY-keskus;LevätilanneNum;LevätilanneTxt;Lisätiedot";

    #[test]
    fn test_parse_table_keeps_valid_rows() {
        let text = format!(
            "{HEADER}\n\
             Ormajärvi;\"61° 5' 24.14\"\" N, 24° 57' 26.17\"\" E\";2022-07-15T10:00:00;Hämeen ELY-keskus;2;Runsaasti levää;\n\
             Vesijärvi;61° 1' 0\" N, 25° 37' 0\" E;15.7.2022;Hämeen ELY-keskus;x;;\n\
             Pyhäjärvi;61° 0' 0\" N, 22° 17' 0\" E;ei päivää;Varsinais-Suomen ELY-keskus;1;;\n"
        );

        let table = parse_table(&text).unwrap();
        assert_eq!(table.rows_read, 3);
        assert_eq!(table.rows_dropped, 2);
        assert_eq!(table.records.len(), 1);

        let obs = &table.records[0];
        assert_eq!(obs.station, "Ormajärvi");
        assert_eq!(obs.date, NaiveDate::from_ymd_opt(2022, 7, 15).unwrap());
        assert!((obs.latitude - 61.0900389).abs() < 1e-6);
        assert_eq!(obs.severity.level(), 2);
        assert_eq!(obs.day_of_year(), 196);
    }

    #[test]
    fn test_english_headers() {
        let text = "location;coordinates;date;operator;level\n\
                    Lake;60 10 0 N, 24 56 0 E;2023-08-01;Uusimaa;3\n";
        let table = parse_table(text).unwrap();
        assert_eq!(table.records.len(), 1);
        assert_eq!(table.records[0].region, "Uusimaa");
    }

    #[test]
    fn test_missing_required_column_is_an_error() {
        let text = "Havaintopaikka;Päivämäärä;LevätilanneNum\nA;1.7.2022;1\n";
        assert!(parse_table(text).is_err());
    }

    #[test]
    fn test_out_of_range_coordinates_dropped() {
        let text = format!("{HEADER}\nA;95 0 0 N, 24 0 0 E;1.7.2022;X;1;;\n");
        let table = parse_table(&text).unwrap();
        assert_eq!(table.rows_dropped, 1);
    }

    #[test]
    fn test_decode_latin1_fallback() {
        let bytes = b"P\xe4iv\xe4m\xe4\xe4r\xe4";
        assert_eq!(decode_text(bytes), "Päivämäärä");
    }

    #[test]
    fn test_decode_strips_bom() {
        let bytes = b"\xEF\xBB\xBFdate";
        assert_eq!(decode_text(bytes), "date");
    }
}

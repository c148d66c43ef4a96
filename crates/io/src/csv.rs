// Machine table CSV store

use std::fs;
use std::path::{Path, PathBuf};

use vendstock_recon::store::validate_table;
use vendstock_recon::{MachineRecord, MachineStore, StoreError};

use crate::document::read_file_as_utf8;

pub const HEADER: [&str; 4] = ["location", "total_items", "threshold", "ready_to_fill"];

/// The machine table as a CSV file on disk.
///
/// Header: `location,total_items,threshold,ready_to_fill`. Headers match
/// case-insensitively, extra columns are ignored and `ready_to_fill` is
/// never read back. Writes go to a sibling `.tmp` file that is renamed over
/// the target.
#[derive(Debug, Clone)]
pub struct CsvTableStore {
    path: PathBuf,
}

impl CsvTableStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Create (or truncate) the file as an empty table.
    pub fn initialize(&mut self) -> Result<(), StoreError> {
        self.write_all(&[])
    }

    fn temp_path(&self) -> PathBuf {
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        PathBuf::from(tmp)
    }

    fn unavailable(&self, e: impl std::fmt::Display) -> StoreError {
        StoreError::Unavailable(format!("{}: {e}", self.path.display()))
    }
}

impl MachineStore for CsvTableStore {
    fn read_all(&self) -> Result<Vec<MachineRecord>, StoreError> {
        let content = read_file_as_utf8(&self.path).map_err(|e| self.unavailable(e))?;
        let records = parse_table(&content)?;
        tracing::debug!(path = %self.path.display(), rows = records.len(), "machine table read");
        Ok(records)
    }

    fn write_all(&mut self, records: &[MachineRecord]) -> Result<(), StoreError> {
        validate_table(records)?;

        let tmp = self.temp_path();
        if let Err(e) = write_table(&tmp, records) {
            let _ = fs::remove_file(&tmp);
            return Err(self.unavailable(e));
        }
        if let Err(e) = fs::rename(&tmp, &self.path) {
            let _ = fs::remove_file(&tmp);
            return Err(self.unavailable(e));
        }

        tracing::debug!(path = %self.path.display(), rows = records.len(), "machine table written");
        Ok(())
    }
}

fn write_table(path: &Path, records: &[MachineRecord]) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(HEADER)?;
    for r in records {
        writer.write_record([
            r.location.as_str(),
            r.total_items.to_string().as_str(),
            r.threshold.to_string().as_str(),
            if r.ready_to_fill() { "true" } else { "false" },
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Decode table content. An empty document is an empty table.
pub fn parse_table(content: &str) -> Result<Vec<MachineRecord>, StoreError> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| StoreError::Malformed {
            row: 1,
            message: e.to_string(),
        })?
        .iter()
        .map(|h| h.trim().to_lowercase())
        .collect();

    let idx = |name: &str| headers.iter().position(|h| h == name);
    let (loc_idx, total_idx, threshold_idx) =
        match (idx("location"), idx("total_items"), idx("threshold")) {
            (Some(l), Some(t), Some(th)) => (l, t, th),
            _ => {
                let missing: Vec<&str> = HEADER[..3]
                    .iter()
                    .copied()
                    .filter(|name| idx(name).is_none())
                    .collect();
                return Err(StoreError::Malformed {
                    row: 1,
                    message: format!("missing column(s): {}", missing.join(", ")),
                });
            }
        };

    let mut records = Vec::new();
    for (i, result) in reader.records().enumerate() {
        let fallback_row = i + 2;
        let record = result.map_err(|e| StoreError::Malformed {
            row: e.position().map(|p| p.line() as usize).unwrap_or(fallback_row),
            message: e.to_string(),
        })?;
        let row = record
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(fallback_row);

        if record.iter().all(|f| f.trim().is_empty()) {
            continue;
        }

        let location = record.get(loc_idx).unwrap_or("").trim();
        if location.is_empty() {
            return Err(StoreError::Malformed {
                row,
                message: "empty location".into(),
            });
        }

        records.push(MachineRecord::new(
            location,
            parse_count(record.get(total_idx), row, "total_items")?,
            parse_count(record.get(threshold_idx), row, "threshold")?,
        ));
    }

    Ok(records)
}

/// Non-negative whole number. Empty reads as 0; integral floats such as
/// `12.0` (spreadsheet round-trips) are accepted.
fn parse_count(field: Option<&str>, row: usize, column: &str) -> Result<u32, StoreError> {
    let raw = field.unwrap_or("").trim();
    if raw.is_empty() {
        return Ok(0);
    }
    if let Ok(n) = raw.parse::<u32>() {
        return Ok(n);
    }

    let malformed = || StoreError::Malformed {
        row,
        message: format!("{column} '{raw}' is not a non-negative whole number"),
    };
    let f: f64 = raw.parse().map_err(|_| malformed())?;
    if f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f <= f64::from(u32::MAX) {
        Ok(f as u32)
    } else {
        Err(malformed())
    }
}

//! Local CSV input and output
//!
//! Daily inputs are `date,close` (or `datetime,close`) for the underlying and
//! `date,vix_close` (or `date,close`) for the VIX. Every backtest output is a
//! slice of serde rows written through the same helpers.

use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::core::{normalize_bars, normalize_vix, Bar, LabError, LabResult, VixBar};

/// Read all rows of a headed CSV
pub fn read_rows<T: DeserializeOwned>(path: &Path) -> LabResult<Vec<T>> {
    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| LabError::data(format!("Cannot open {}: {}", path.display(), e)))?;

    reader
        .deserialize()
        .enumerate()
        .map(|(i, row)| {
            row.map_err(|e| LabError::data(format!("{} row {}: {}", path.display(), i + 1, e)))
        })
        .collect()
}

/// Write rows with a header, creating parent directories
pub fn write_rows<T: Serialize>(path: &Path, rows: &[T]) -> LabResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| LabError::serialization(format!("{}: {}", path.display(), e)))?;
    for row in rows {
        writer
            .serialize(row)
            .map_err(|e| LabError::serialization(format!("{}: {}", path.display(), e)))?;
    }
    writer.flush()?;

    tracing::debug!("Wrote {} rows to {}", rows.len(), path.display());
    Ok(())
}

#[derive(Debug, Deserialize)]
struct PriceRecord {
    #[serde(alias = "datetime")]
    date: NaiveDate,
    #[serde(alias = "vix_close", alias = "Close")]
    close: Option<f64>,
}

fn read_closes(path: &Path) -> LabResult<Vec<Bar>> {
    let records: Vec<PriceRecord> = read_rows(path)?;
    let mut bars: Vec<Bar> = records
        .into_iter()
        .filter_map(|r| r.close.filter(|c| c.is_finite()).map(|c| Bar::new(r.date, c)))
        .collect();
    normalize_bars(&mut bars);

    if bars.is_empty() {
        return Err(LabError::data(format!("No prices in {}", path.display())));
    }
    tracing::info!("Loaded {} rows from {}", bars.len(), path.display());
    Ok(bars)
}

/// Underlying closes from CSV, sorted and deduplicated
pub fn read_bars(path: &Path) -> LabResult<Vec<Bar>> {
    read_closes(path)
}

/// VIX closes from CSV, sorted and deduplicated
pub fn read_vix(path: &Path) -> LabResult<Vec<VixBar>> {
    let mut vix: Vec<VixBar> = read_closes(path)?.into_iter().map(VixBar::from).collect();
    normalize_vix(&mut vix);
    Ok(vix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_read_bars_datetime_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("spy.csv");
        fs::write(
            &path,
            "datetime,open,close\n2024-01-03,470,468.79\n2024-01-02,471,472.65\n2024-01-04,468,\n2024-01-03,470,469.00\n",
        )
        .unwrap();

        let bars = read_bars(&path).unwrap();
        // Sorted, empty close skipped, duplicate date keeps the last row
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].close, 472.65);
        assert_eq!(bars[1].close, 469.0);
    }

    #[test]
    fn test_read_vix_headers() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("vix_a.csv");
        let b = dir.path().join("vix_b.csv");
        fs::write(&a, "date,vix_close\n2024-01-02,13.2\n").unwrap();
        fs::write(&b, "date,close\n2024-01-02,13.2\n").unwrap();

        assert_eq!(read_vix(&a).unwrap(), read_vix(&b).unwrap());
        assert_eq!(read_vix(&a).unwrap()[0].vix_close, 13.2);
    }

    #[test]
    fn test_write_then_read_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("bars.csv");
        let bars = vec![Bar::new(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(), 472.65)];

        write_rows(&path, &bars).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("date,close\n"));

        let back: Vec<Bar> = read_rows(&path).unwrap();
        assert_eq!(back, bars);
    }

    #[test]
    fn test_missing_file_and_empty() {
        let dir = tempdir().unwrap();
        assert!(read_bars(&dir.path().join("nope.csv")).is_err());

        let empty = dir.path().join("empty.csv");
        fs::write(&empty, "date,close\n").unwrap();
        assert!(read_bars(&empty).is_err());
    }
}

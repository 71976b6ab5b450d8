//! CSV feature-row loading.
//!
//! Expected layout: `date,open,high,low,close,volume` plus any number of
//! extra numeric columns, which become indicator fields keyed by their
//! header (lowercased). Blank indicator cells are simply absent — values are
//! never fabricated.

use chrono::NaiveDate;
use log::debug;
use std::path::{Path, PathBuf};
use thiserror::Error;

use tradelab_core::FeatureRow;

const REQUIRED: [&str; 6] = ["date", "open", "high", "low", "close", "volume"];

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to open {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("csv error in {path}: {source}")]
    Csv { path: PathBuf, source: csv::Error },
    #[error("{path} is missing required column '{column}'")]
    MissingColumn { path: PathBuf, column: String },
    #[error("{path} row {row}: {message}")]
    BadRow {
        path: PathBuf,
        row: usize,
        message: String,
    },
}

/// Load one symbol's feature rows, sorted ascending by date.
pub fn load_csv(path: &Path) -> Result<Vec<FeatureRow>, LoadError> {
    let file = std::fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = csv::Reader::from_reader(file);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|source| LoadError::Csv {
            path: path.to_path_buf(),
            source,
        })?
        .iter()
        .map(|h| h.trim().to_lowercase())
        .collect();
    for column in REQUIRED {
        if !headers.iter().any(|h| h == column) {
            return Err(LoadError::MissingColumn {
                path: path.to_path_buf(),
                column: column.to_string(),
            });
        }
    }
    let index_of = |name: &str| headers.iter().position(|h| h == name).unwrap_or(usize::MAX);
    let date_idx = index_of("date");
    let ohlcv_idx = [
        index_of("open"),
        index_of("high"),
        index_of("low"),
        index_of("close"),
        index_of("volume"),
    ];

    let mut rows = Vec::new();
    for (row_number, record) in reader.records().enumerate() {
        let record = record.map_err(|source| LoadError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
        let bad_row = |message: String| LoadError::BadRow {
            path: path.to_path_buf(),
            row: row_number + 2, // 1-based, after the header
            message,
        };

        let date_text = record.get(date_idx).unwrap_or("").trim();
        let date = NaiveDate::parse_from_str(date_text, "%Y-%m-%d")
            .map_err(|e| bad_row(format!("bad date '{date_text}': {e}")))?;

        let mut ohlcv = [0.0f64; 5];
        for (slot, &idx) in ohlcv.iter_mut().zip(&ohlcv_idx) {
            let text = record.get(idx).unwrap_or("").trim();
            *slot = text
                .parse()
                .map_err(|_| bad_row(format!("bad number '{text}' in column {idx}")))?;
        }
        let mut row = FeatureRow::new(date, ohlcv[0], ohlcv[1], ohlcv[2], ohlcv[3], ohlcv[4]);

        for (idx, header) in headers.iter().enumerate() {
            if idx == date_idx || ohlcv_idx.contains(&idx) {
                continue;
            }
            let text = record.get(idx).unwrap_or("").trim();
            if text.is_empty() {
                continue;
            }
            if let Ok(value) = text.parse::<f64>() {
                row.indicators.insert(header.clone(), value);
            }
        }
        rows.push(row);
    }

    rows.sort_by_key(|r| r.date);
    debug!("loaded {} rows from {}", rows.len(), path.display());
    Ok(rows)
}

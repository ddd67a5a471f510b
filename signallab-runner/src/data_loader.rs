//! Bar loading for the runner.
//!
//! Reads OHLCV bars from CSV. Only the timestamp and close columns are
//! required; other columns are optional and matched case-insensitively.
//! Cells that do not parse become missing values and the row is counted as
//! malformed, but kept so the backtest can flag it in place.
//!
//! Synthetic data is a developer-only demo mode: a deterministic random walk
//! seeded from the symbol name.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use signallab_core::domain::Bar;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to open {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("missing required column '{0}'")]
    MissingColumn(&'static str),

    #[error("row {row}: unparseable timestamp '{value}'")]
    BadTimestamp { row: usize, value: String },

    #[error("no rows in input")]
    Empty,
}

/// Where the data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    Csv,
    Synthetic,
}

/// Result of loading bars, including provenance.
#[derive(Debug, Clone)]
pub struct LoadedData {
    /// Bars in file order.
    pub bars: Vec<Bar>,
    /// Rows with at least one unparseable value cell.
    pub malformed_rows: usize,
    pub source: DataSource,
    /// BLAKE3 over all bar data.
    pub dataset_hash: String,
}

impl LoadedData {
    pub fn from_bars(bars: Vec<Bar>, malformed_rows: usize, source: DataSource) -> Self {
        let dataset_hash = compute_dataset_hash(&bars);
        Self {
            bars,
            malformed_rows,
            source,
            dataset_hash,
        }
    }

    pub fn is_synthetic(&self) -> bool {
        self.source == DataSource::Synthetic
    }
}

#[derive(Debug, Default)]
struct Columns {
    timestamp: Option<usize>,
    open: Option<usize>,
    high: Option<usize>,
    low: Option<usize>,
    close: Option<usize>,
    volume: Option<usize>,
}

impl Columns {
    fn from_headers(headers: &csv::StringRecord) -> Self {
        let mut cols = Columns::default();
        for (i, name) in headers.iter().enumerate() {
            match name.trim().to_ascii_lowercase().as_str() {
                "timestamp" | "date" | "datetime" => {
                    cols.timestamp.get_or_insert(i);
                }
                "open" => cols.open = Some(i),
                "high" => cols.high = Some(i),
                "low" => cols.low = Some(i),
                "close" => cols.close = Some(i),
                "volume" => cols.volume = Some(i),
                _ => {}
            }
        }
        cols
    }
}

/// Load bars from a CSV file.
pub fn load_bars_csv(path: impl AsRef<Path>) -> Result<LoadedData, LoadError> {
    let path = path.as_ref();
    let file = std::fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let loaded = read_bars(file)?;
    debug!(
        path = %path.display(),
        rows = loaded.bars.len(),
        malformed = loaded.malformed_rows,
        "loaded CSV"
    );
    Ok(loaded)
}

/// Parse bars from any CSV reader.
pub fn read_bars<R: Read>(reader: R) -> Result<LoadedData, LoadError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let cols = Columns::from_headers(rdr.headers()?);
    let ts_col = cols.timestamp.ok_or(LoadError::MissingColumn("timestamp"))?;
    let close_col = cols.close.ok_or(LoadError::MissingColumn("close"))?;

    let mut bars = Vec::new();
    let mut malformed_rows = 0;

    for (i, record) in rdr.records().enumerate() {
        let record = record?;
        // Header is row 1.
        let row = i + 2;
        let raw_ts = record.get(ts_col).unwrap_or_default();
        let timestamp = parse_timestamp(raw_ts).ok_or_else(|| LoadError::BadTimestamp {
            row,
            value: raw_ts.to_string(),
        })?;

        let mut malformed = false;
        let mut price = |col: Option<usize>| -> Option<f64> {
            let cell = record.get(col?)?;
            let value = cell.parse::<f64>().ok().filter(|v| v.is_finite());
            if value.is_none() {
                malformed = true;
            }
            value
        };
        let open = price(cols.open);
        let high = price(cols.high);
        let low = price(cols.low);
        let close = price(Some(close_col));

        let volume = cols.volume.and_then(|c| record.get(c)).and_then(|cell| {
            let v = parse_volume(cell);
            if v.is_none() {
                malformed = true;
            }
            v
        });

        let bar = Bar {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        };
        if malformed || bar.valid_close().is_none() {
            malformed_rows += 1;
            warn!(row, timestamp = %timestamp, "malformed row");
        }
        bars.push(bar);
    }

    if bars.is_empty() {
        return Err(LoadError::Empty);
    }
    Ok(LoadedData::from_bars(bars, malformed_rows, DataSource::Csv))
}

fn parse_volume(cell: &str) -> Option<u64> {
    cell.parse::<u64>().ok().or_else(|| {
        cell.parse::<f64>()
            .ok()
            .filter(|v| v.is_finite() && *v >= 0.0 && v.fract() == 0.0)
            .map(|v| v as u64)
    })
}

/// Accepts `YYYY-MM-DD`, `YYYY-MM-DD HH:MM:SS` (space or `T`), and RFC 3339.
/// Offsets are converted to UTC.
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return d.and_hms_opt(0, 0, 0);
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(ts);
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%:z")
        .ok()
        .map(|dt| dt.naive_utc())
}

/// Deterministic BLAKE3 hash over timestamps and all OHLCV values.
pub fn compute_dataset_hash(bars: &[Bar]) -> String {
    let mut hasher = blake3::Hasher::new();
    for bar in bars {
        hasher.update(bar.timestamp.to_string().as_bytes());
        for value in [bar.open, bar.high, bar.low, bar.close] {
            hasher.update(&value.unwrap_or(f64::NAN).to_le_bytes());
        }
        hasher.update(&bar.volume.unwrap_or(u64::MAX).to_le_bytes());
    }
    hasher.finalize().to_hex().to_string()
}

/// Synthetic daily bars: a weekday-only random walk from 100.0.
pub fn synthetic_bars(symbol: &str, n: usize) -> LoadedData {
    let seed: [u8; 32] = *blake3::hash(symbol.as_bytes()).as_bytes();
    let mut rng = StdRng::from_seed(seed);

    let mut bars = Vec::with_capacity(n);
    let mut price = 100.0_f64;
    let mut date = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap_or_default();

    while bars.len() < n {
        if matches!(date.weekday(), chrono::Weekday::Sat | chrono::Weekday::Sun) {
            date += Duration::days(1);
            continue;
        }

        let daily_return: f64 = rng.gen_range(-0.03..0.03);
        let open = price;
        let close = price * (1.0 + daily_return);
        let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.01));
        let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.01));
        let volume = rng.gen_range(500_000..5_000_000u64);

        bars.push(Bar {
            timestamp: date.and_time(chrono::NaiveTime::MIN),
            open: Some(open),
            high: Some(high),
            low: Some(low),
            close: Some(close),
            volume: Some(volume),
        });

        price = close;
        date += Duration::days(1);
    }

    LoadedData::from_bars(bars, 0, DataSource::Synthetic)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(csv: &str) -> Result<LoadedData, LoadError> {
        read_bars(csv.as_bytes())
    }

    #[test]
    fn reads_ohlcv_with_mixed_case_headers() {
        let data = load(
            "Date,Open,High,Low,Close,Volume\n\
             2024-01-02,187.1,188.4,183.9,185.6,82488700\n\
             2024-01-03,184.2,185.9,183.4,184.3,58414500\n",
        )
        .unwrap();
        assert_eq!(data.bars.len(), 2);
        assert_eq!(data.malformed_rows, 0);
        assert_eq!(data.source, DataSource::Csv);
        assert_eq!(data.bars[1].close, Some(184.3));
        assert_eq!(data.bars[0].volume, Some(82_488_700));
    }

    #[test]
    fn close_only_file_is_enough() {
        let data = load("timestamp,close\n2024-01-02 09:30:00,10\n").unwrap();
        assert_eq!(data.bars[0].open, None);
        assert_eq!(data.malformed_rows, 0);
    }

    #[test]
    fn bad_cells_become_missing_and_are_counted() {
        let data = load(
            "date,close,volume\n\
             2024-01-02,abc,100\n\
             2024-01-03,,100\n\
             2024-01-04,-3,1.5\n\
             2024-01-05,12,200\n",
        )
        .unwrap();
        assert_eq!(data.bars.len(), 4);
        assert_eq!(data.bars[0].close, None);
        assert_eq!(data.bars[1].close, None);
        // Negative close parses but is not a valid price.
        assert_eq!(data.bars[2].close, Some(-3.0));
        assert_eq!(data.bars[2].volume, None);
        assert_eq!(data.malformed_rows, 3);
    }

    #[test]
    fn missing_close_column_is_fatal() {
        assert!(matches!(
            load("date,open\n2024-01-02,1\n"),
            Err(LoadError::MissingColumn("close"))
        ));
        assert!(matches!(
            load("close\n1\n"),
            Err(LoadError::MissingColumn("timestamp"))
        ));
    }

    #[test]
    fn bad_timestamp_is_fatal() {
        match load("date,close\n2024-01-02,1\nnot-a-date,2\n") {
            Err(LoadError::BadTimestamp { row, value }) => {
                assert_eq!(row, 3);
                assert_eq!(value, "not-a-date");
            }
            other => panic!("expected BadTimestamp, got {other:?}"),
        }
    }

    #[test]
    fn header_only_is_empty() {
        assert!(matches!(load("date,close\n"), Err(LoadError::Empty)));
    }

    #[test]
    fn timestamp_formats() {
        let midnight = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(parse_timestamp("2024-03-01"), Some(midnight));
        assert_eq!(parse_timestamp("2024-03-01 00:00:00"), Some(midnight));
        assert_eq!(parse_timestamp("2024-03-01T00:00:00"), Some(midnight));
        assert_eq!(parse_timestamp("2024-03-01T02:00:00+02:00"), Some(midnight));
        assert_eq!(parse_timestamp("2024-03-01 00:00:00+00:00"), Some(midnight));
        assert_eq!(parse_timestamp("03/01/2024"), None);
    }

    #[test]
    fn synthetic_is_deterministic_per_symbol() {
        let a = synthetic_bars("SPY", 50);
        let b = synthetic_bars("SPY", 50);
        let c = synthetic_bars("QQQ", 50);
        assert_eq!(a.bars.len(), 50);
        assert!(a.is_synthetic());
        assert_eq!(a.dataset_hash, b.dataset_hash);
        assert_ne!(a.dataset_hash, c.dataset_hash);
        assert!(a.bars.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
        assert!(a.bars.iter().all(Bar::is_sane));
    }

    #[test]
    fn dataset_hash_tracks_values() {
        let mut data = synthetic_bars("SPY", 10);
        let before = compute_dataset_hash(&data.bars);
        data.bars[3].close = Some(1.0);
        assert_ne!(before, compute_dataset_hash(&data.bars));
    }
}

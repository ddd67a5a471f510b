//! CSV and JSON artifact generation.
//!
//! A saved run is a directory `<out>/<run_id>/` containing:
//! - `backtest.csv`: the augmented per-step series
//! - `summary.json`: config, provenance, and metrics

use std::io::Write;
use std::path::{Path, PathBuf};

use signallab_core::domain::Bar;
use signallab_core::engine::BacktestResult;
use signallab_core::features::FeatureRow;
use thiserror::Error;

use crate::runner::{BacktestRun, RunSummary, SCHEMA_VERSION};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported schema version {found} (max supported: {max})")]
    UnsupportedSchema { found: u32, max: u32 },
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> ExportError + '_ {
    move |source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    }
}

// ─── Backtest series ────────────────────────────────────────────────

pub const BACKTEST_COLUMNS: [&str; 8] = [
    "timestamp",
    "close",
    "sma",
    "signal",
    "equity",
    "cash",
    "position",
    "error",
];

/// Write the augmented series. Missing values are empty cells.
pub fn write_backtest_csv<W: Write>(result: &BacktestResult, writer: W) -> Result<(), ExportError> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(BACKTEST_COLUMNS)?;
    let opt = |v: Option<f64>| v.map(|x| x.to_string()).unwrap_or_default();
    for step in &result.steps {
        wtr.write_record([
            step.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            opt(step.close),
            opt(step.average),
            step.signal.as_str().to_string(),
            format!("{:.2}", step.equity),
            format!("{:.2}", step.state.cash),
            step.state.position.to_string(),
            step.error.map(|e| e.as_str().to_string()).unwrap_or_default(),
        ])?;
    }
    wtr.flush().map_err(csv::Error::from)?;
    Ok(())
}

pub fn export_backtest_csv(result: &BacktestResult) -> Result<String, ExportError> {
    let mut buf = Vec::new();
    write_backtest_csv(result, &mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

// ─── Summary JSON ───────────────────────────────────────────────────

pub fn export_summary_json(summary: &RunSummary) -> Result<String, ExportError> {
    Ok(serde_json::to_string_pretty(summary)?)
}

/// Parse a summary, rejecting unknown schema versions.
pub fn import_summary_json(json: &str) -> Result<RunSummary, ExportError> {
    let summary: RunSummary = serde_json::from_str(json)?;
    if summary.schema_version > SCHEMA_VERSION {
        return Err(ExportError::UnsupportedSchema {
            found: summary.schema_version,
            max: SCHEMA_VERSION,
        });
    }
    Ok(summary)
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Save `backtest.csv` and `summary.json` under `<output_dir>/<run_id>/`.
///
/// Returns the run directory.
pub fn save_artifacts(run: &BacktestRun, output_dir: &Path) -> Result<PathBuf, ExportError> {
    let run_dir = output_dir.join(&run.summary.run_id);
    std::fs::create_dir_all(&run_dir).map_err(io_err(&run_dir))?;

    let csv_path = run_dir.join("backtest.csv");
    let csv = export_backtest_csv(&run.result)?;
    std::fs::write(&csv_path, csv).map_err(io_err(&csv_path))?;

    let json_path = run_dir.join("summary.json");
    let json = export_summary_json(&run.summary)?;
    std::fs::write(&json_path, json).map_err(io_err(&json_path))?;

    Ok(run_dir)
}

pub fn load_summary(run_dir: &Path) -> Result<RunSummary, ExportError> {
    let path = run_dir.join("summary.json");
    let json = std::fs::read_to_string(&path).map_err(io_err(&path))?;
    import_summary_json(&json)
}

// ─── Bars and features ──────────────────────────────────────────────

/// Write bars with a `timestamp,open,high,low,close,volume` header.
pub fn write_bars_csv(bars: &[Bar], path: &Path) -> Result<(), ExportError> {
    let mut wtr = csv::Writer::from_path(path)?;
    for bar in bars {
        wtr.serialize(bar)?;
    }
    wtr.flush().map_err(io_err(path))?;
    Ok(())
}

/// Write feature rows, one column per field.
pub fn write_features_csv(rows: &[FeatureRow], path: &Path) -> Result<(), ExportError> {
    let mut wtr = csv::Writer::from_path(path)?;
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush().map_err(io_err(path))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};
    use signallab_core::domain::PricePoint;
    use signallab_core::engine::{run_backtest, BacktestConfig};

    fn result() -> BacktestResult {
        let base = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let mut points: Vec<PricePoint> = [100.0, 101.0, 100.0, 99.0]
            .iter()
            .enumerate()
            .map(|(i, &c)| PricePoint::new(base + Duration::days(i as i64), c))
            .collect();
        points[3].close = None;
        run_backtest(
            &points,
            &BacktestConfig {
                window: 2,
                initial_cash: 1000.0,
            },
        )
        .unwrap()
    }

    #[test]
    fn backtest_csv_layout() {
        let csv = export_backtest_csv(&result()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "timestamp,close,sma,signal,equity,cash,position,error");
        assert_eq!(lines[1], "2024-01-01 00:00:00,100,,HOLD,1000.00,1000.00,0,");
        assert_eq!(lines[2], "2024-01-02 00:00:00,101,100.5,BUY,1000.00,91.00,9,");
        assert_eq!(lines[3], "2024-01-03 00:00:00,100,100.5,SELL,991.00,991.00,0,");
        assert_eq!(lines[4], "2024-01-04 00:00:00,,,HOLD,991.00,991.00,0,malformed_price");
        assert_eq!(lines.len(), 5);
    }

    #[test]
    fn unwritable_csv_reports_its_path() {
        use crate::config::BacktestSection;
        use crate::runner::{run_single_backtest, DataSpec};

        let dir = tempfile::tempdir().unwrap();
        let run = run_single_backtest(&BacktestSection::default(), &DataSpec::Synthetic(30)).unwrap();
        // A directory where the CSV should go makes the write fail.
        let run_dir = dir.path().join(&run.summary.run_id);
        std::fs::create_dir_all(run_dir.join("backtest.csv")).unwrap();

        match save_artifacts(&run, dir.path()) {
            Err(ExportError::Io { path, .. }) => assert_eq!(path, run_dir.join("backtest.csv")),
            other => panic!("expected Io error, got {other:?}"),
        }
    }

    #[test]
    fn newer_schema_rejected() {
        let json = r#"{"schema_version": 99}"#;
        assert!(import_summary_json(json).is_err());
    }
}

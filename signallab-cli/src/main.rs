//! SignalLab CLI: backtest, feature preparation, download, signal, and live commands.
//!
//! Commands:
//! - `backtest`: run the moving-average backtest over CSV or synthetic data
//! - `prepare`: compute model features from an OHLCV CSV
//! - `download`: fetch daily bars from Yahoo Finance into a CSV
//! - `signal`: evaluate the decision rule for one price, or for the latest bar of a CSV
//! - `live`: poll Yahoo Finance and trade through the paper broker

mod obs;

use anyhow::{anyhow, bail, Context, Result};
use chrono::{Days, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

use signallab_core::broker::PaperBroker;
use signallab_core::data::{HistoryProvider, YahooProvider};
use signallab_core::domain::decide_raw;
use signallab_core::features::prepare_features;
use signallab_core::model::{LinearModel, Predictor};
use signallab_core::strategy::combine;
use signallab_runner::{
    evaluate_latest, load_bars_csv, run_live, run_single_backtest, save_artifacts,
    write_bars_csv, write_features_csv, AppConfig, BacktestRun, DataSource, DataSpec, LiveConfig,
    LogFormat, TradeLog,
};
use tracing::info;

#[derive(Parser)]
#[command(
    name = "signallab",
    about = "SignalLab CLI: moving-average signals, backtests, and paper trading"
)]
struct Cli {
    /// Path to a TOML config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level or filter directive (overridden by SIGNALLAB_LOG).
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Log output format.
    #[arg(long, global = true, value_enum)]
    log_format: Option<LogFormatArg>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormatArg {
    Text,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Text => LogFormat::Text,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run the moving-average backtest.
    Backtest {
        /// CSV with timestamp/date and close columns (overrides backtest.data).
        #[arg(long)]
        data: Option<PathBuf>,

        /// Symbol label for the run.
        #[arg(long)]
        symbol: Option<String>,

        /// Rolling-average window.
        #[arg(long)]
        window: Option<usize>,

        /// Starting cash.
        #[arg(long)]
        cash: Option<f64>,

        /// Use this many synthetic bars instead of a CSV.
        #[arg(long)]
        synthetic: Option<usize>,

        /// Output directory for run artifacts.
        #[arg(long, default_value = "results")]
        out: PathBuf,
    },
    /// Compute model features from an OHLCV CSV.
    Prepare {
        #[arg(long)]
        input: PathBuf,

        #[arg(long)]
        output: PathBuf,
    },
    /// Download daily bars from Yahoo Finance into a CSV.
    Download {
        /// Symbol to download (e.g., AAPL).
        symbol: String,

        /// Calendar days of history. Defaults to five years.
        #[arg(long, default_value_t = 5 * 365)]
        days: u64,

        /// Output CSV. Defaults to data/<SYMBOL>_daily.csv.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Evaluate the decision rule.
    Signal {
        /// Current price.
        #[arg(long, requires = "average", conflicts_with = "data")]
        price: Option<String>,

        /// Reference average.
        #[arg(long, requires = "price")]
        average: Option<String>,

        /// Predicted next price; may be repeated.
        #[arg(long)]
        prediction: Vec<f64>,

        /// Evaluate the latest bar of this CSV instead.
        #[arg(long)]
        data: Option<PathBuf>,

        /// Rolling-average window for --data.
        #[arg(long)]
        window: Option<usize>,

        /// Linear model JSON applied to --data; may be repeated.
        #[arg(long, requires = "data")]
        model: Vec<PathBuf>,

        /// Print the full evaluation as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Poll the latest price and trade through the paper broker.
    Live {
        #[arg(long)]
        symbol: Option<String>,

        /// Fixed reference average.
        #[arg(long)]
        average: Option<f64>,

        #[arg(long)]
        quantity: Option<u64>,

        #[arg(long)]
        interval_secs: Option<u64>,

        /// Stop after this many cycles (0 = until interrupted).
        #[arg(long)]
        max_cycles: Option<u64>,

        /// Write the trade log here when the session ends.
        #[arg(long)]
        trade_log: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load_or_default(cli.config.as_deref())?;

    let level = cli.log_level.as_deref().unwrap_or(&config.logging.level);
    let format = cli.log_format.map_or(config.logging.format, LogFormat::from);
    obs::init_tracing(level, format).map_err(|e| anyhow!(e))?;

    match cli.command {
        Commands::Backtest {
            data,
            symbol,
            window,
            cash,
            synthetic,
            out,
        } => run_backtest_cmd(config, data, symbol, window, cash, synthetic, &out),
        Commands::Prepare { input, output } => run_prepare(&input, &output),
        Commands::Download {
            symbol,
            days,
            output,
        } => run_download(&symbol, days, output),
        Commands::Signal {
            price,
            average,
            prediction,
            data,
            window,
            model,
            json,
        } => match (price, average, data) {
            (Some(price), Some(average), _) => run_signal_raw(&price, &average, &prediction),
            (_, _, Some(data)) => run_signal_data(
                &data,
                window.unwrap_or(config.backtest.window),
                &model,
                json,
            ),
            _ => bail!("either --price and --average, or --data, is required"),
        },
        Commands::Live {
            symbol,
            average,
            quantity,
            interval_secs,
            max_cycles,
            trade_log,
        } => {
            let mut live = config.live;
            if let Some(s) = symbol {
                live.symbol = s;
            }
            if let Some(a) = average {
                live.moving_average = a;
            }
            if let Some(q) = quantity {
                live.quantity = q;
            }
            if let Some(i) = interval_secs {
                live.interval_secs = i;
            }
            if let Some(m) = max_cycles {
                live.max_cycles = m;
            }
            let config = AppConfig { live, ..config };
            config.validate()?;
            run_live_cmd(LiveConfig::from(&config.live), trade_log.as_deref())
        }
    }
}

fn run_backtest_cmd(
    mut config: AppConfig,
    data: Option<PathBuf>,
    symbol: Option<String>,
    window: Option<usize>,
    cash: Option<f64>,
    synthetic: Option<usize>,
    out: &Path,
) -> Result<()> {
    let bt = &mut config.backtest;
    if data.is_some() {
        bt.data = data;
    }
    if let Some(s) = symbol {
        bt.symbol = s;
    }
    if let Some(w) = window {
        bt.window = w;
    }
    if let Some(c) = cash {
        bt.initial_cash = c;
    }
    config.validate()?;

    let spec = match synthetic {
        Some(n) => DataSpec::Synthetic(n),
        None => DataSpec::Configured,
    };
    let run = run_single_backtest(&config.backtest, &spec)?;
    print_summary(&run);

    let run_dir = save_artifacts(&run, out)?;
    println!("Artifacts saved to: {}", run_dir.display());
    Ok(())
}

fn print_summary(run: &BacktestRun) {
    let s = &run.summary;
    println!();
    println!("=== Backtest Result ===");
    println!("Run:            {}", s.run_id);
    println!("Symbol:         {}", s.symbol);
    println!("Bars:           {} ({} malformed)", s.bar_count, s.metrics.malformed_steps);
    println!("Window:         {}", s.config.window);
    println!("Fills:          {}", s.metrics.trade_count);
    println!();
    println!("--- Performance ---");
    println!("Initial Cash:   {:.2}", s.config.initial_cash);
    println!("Final Equity:   {:.2}", s.metrics.final_equity);
    println!("Total Return:   {:.2}%", s.metrics.total_return * 100.0);
    println!("CAGR:           {:.2}%", s.metrics.cagr * 100.0);
    println!("Sharpe:         {:.3}", s.metrics.sharpe);
    println!("Max Drawdown:   {:.2}%", s.metrics.max_drawdown * 100.0);
    println!(
        "Final State:    cash {:.2}, position {}",
        s.final_state.cash, s.final_state.position
    );
    if s.source == DataSource::Synthetic {
        println!();
        println!("WARNING: Results based on SYNTHETIC data");
    }
}

fn run_prepare(input: &Path, output: &Path) -> Result<()> {
    let loaded = load_bars_csv(input)?;
    let rows = prepare_features(&loaded.bars);
    if rows.is_empty() {
        bail!(
            "no complete feature rows from {} ({} bars); at least 51 valid bars are needed",
            input.display(),
            loaded.bars.len()
        );
    }
    write_features_csv(&rows, output)?;
    println!(
        "Wrote {} feature rows ({} bars in) to {}",
        rows.len(),
        loaded.bars.len(),
        output.display()
    );
    Ok(())
}

fn run_download(symbol: &str, days: u64, output: Option<PathBuf>) -> Result<()> {
    let end = Utc::now().date_naive();
    let start = end
        .checked_sub_days(Days::new(days))
        .context("--days reaches before the supported date range")?;

    let provider = YahooProvider::with_default_breaker()?;
    info!(symbol, %start, %end, "downloading daily bars");
    let bars = provider
        .fetch(symbol, start, end)
        .with_context(|| format!("failed to download {symbol}"))?;

    let output = output.unwrap_or_else(|| PathBuf::from(format!("data/{symbol}_daily.csv")));
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    write_bars_csv(&bars, &output)?;
    println!("Saved {} bars for {symbol} to {}", bars.len(), output.display());
    Ok(())
}

fn run_signal_raw(price: &str, average: &str, predictions: &[f64]) -> Result<()> {
    let sma_signal = decide_raw(price, average);
    let signal = match price.trim().parse::<f64>() {
        Ok(p) if !predictions.is_empty() => {
            let preds: Vec<Option<f64>> = predictions.iter().copied().map(Some).collect();
            combine(sma_signal, &preds, p)
        }
        _ => sma_signal,
    };
    println!("{signal}");
    Ok(())
}

fn run_signal_data(data: &Path, window: usize, models: &[PathBuf], json: bool) -> Result<()> {
    let loaded = load_bars_csv(data)?;
    let linear: Vec<LinearModel> = models
        .iter()
        .map(|p| {
            LinearModel::from_path(p).with_context(|| format!("failed to load {}", p.display()))
        })
        .collect::<Result<_>>()?;
    let predictors: Vec<&dyn Predictor> = linear.iter().map(|m| m as &dyn Predictor).collect();

    let advice = evaluate_latest(&loaded.bars, window, &predictors)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&advice)?);
        return Ok(());
    }

    println!("Timestamp:      {}", advice.timestamp);
    println!("Price:          {:.2}", advice.price);
    match advice.average {
        Some(avg) => println!("SMA({window}):        {avg:.2}"),
        None => println!("SMA({window}):        n/a"),
    }
    println!("SMA Signal:     {}", advice.sma_signal);
    for p in &advice.predictions {
        match p.price {
            Some(price) => println!("{:<15} {price:.2}", format!("{}:", p.model)),
            None => println!("{:<15} n/a", format!("{}:", p.model)),
        }
    }
    println!("Signal:         {}", advice.signal);
    Ok(())
}

fn run_live_cmd(config: LiveConfig, trade_log: Option<&Path>) -> Result<()> {
    let feed = YahooProvider::with_default_breaker()?;
    let mut broker = PaperBroker::new();
    let mut log = TradeLog::new();

    let summary = run_live(&config, &feed, &mut broker, &mut log);

    println!(
        "Cycles: {} (submitted {}, held {}, skipped {}, rejected {})",
        summary.cycles, summary.submitted, summary.held, summary.skipped, summary.rejected
    );
    println!(
        "Net position in {}: {}",
        config.symbol,
        broker.position(&config.symbol)
    );
    if let Some(last) = log.entries().last() {
        println!("Trade log P/L at last fill price: {:.2}", log.pnl(last.price));
    }
    if let Some(path) = trade_log {
        log.write_csv(path)?;
        println!("Trade log saved to: {}", path.display());
    }
    if summary.cycles > 0 && summary.skipped == summary.cycles {
        bail!("no price was available in any cycle");
    }
    Ok(())
}

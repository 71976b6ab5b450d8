//! TradeLab CLI — run, sweep, and generate commands.
//!
//! Commands:
//! - `run` — execute one backtest from a TOML config file (or defaults)
//! - `sweep` — grid-sweep scorer thresholds and print a leaderboard
//! - `generate` — write synthetic feature rows as CSV for offline runs

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tradelab_runner::{run_sweep, BacktestResult, RunConfig, Runner, SignalPreset, SweepGrid};

#[derive(Parser)]
#[command(name = "tradelab", about = "TradeLab CLI — simulated trading engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute one backtest and write its artifacts.
    Run {
        /// Path to a TOML config file. Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Symbols to trade, overriding the config universe.
        #[arg(long, num_args = 1..)]
        symbols: Vec<String>,

        /// Scorer preset: paper or live.
        #[arg(long, value_enum)]
        preset: Option<PresetArg>,

        /// Output directory for artifacts.
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Sweep buy/sell thresholds over a grid and print a leaderboard.
    Sweep {
        /// Path to the base TOML config file. Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Buy thresholds to sweep. Defaults to 2.5..4.5 in 0.5 steps.
        #[arg(long, num_args = 1..)]
        buy: Vec<f64>,

        /// Sell thresholds to sweep. Defaults to 2.0..4.0 in 0.5 steps.
        #[arg(long, num_args = 1..)]
        sell: Vec<f64>,

        /// Rows of the leaderboard to print.
        #[arg(long, default_value_t = 10)]
        top: usize,
    },
    /// Write synthetic feature rows as a CSV file.
    Generate {
        /// Symbol to seed the generator with.
        symbol: String,

        /// Trading days to generate.
        #[arg(long, default_value_t = 252)]
        days: usize,

        /// First bar date (YYYY-MM-DD).
        #[arg(long, default_value = "2023-01-02")]
        start: String,

        /// Generator seed.
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Output path. Defaults to {symbol}.csv.
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum PresetArg {
    Paper,
    Live,
}

impl From<PresetArg> for SignalPreset {
    fn from(arg: PresetArg) -> Self {
        match arg {
            PresetArg::Paper => SignalPreset::Paper,
            PresetArg::Live => SignalPreset::Live,
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            symbols,
            preset,
            output_dir,
        } => run_cmd(config, symbols, preset, output_dir),
        Commands::Sweep {
            config,
            buy,
            sell,
            top,
        } => sweep_cmd(config, buy, sell, top),
        Commands::Generate {
            symbol,
            days,
            start,
            seed,
            out,
        } => generate_cmd(&symbol, days, &start, seed, out),
    }
}

fn load_config(path: Option<PathBuf>) -> Result<RunConfig> {
    match path {
        Some(path) => RunConfig::load(&path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(RunConfig::default()),
    }
}

fn run_cmd(
    config_path: Option<PathBuf>,
    symbols: Vec<String>,
    preset: Option<PresetArg>,
    output_dir: Option<PathBuf>,
) -> Result<()> {
    let mut config = load_config(config_path)?;
    if !symbols.is_empty() {
        config.universe = symbols;
    }
    if let Some(preset) = preset {
        let preset = SignalPreset::from(preset);
        config.preset = Some(preset);
        config.sim.scorer = preset.params();
    }
    if let Some(dir) = output_dir {
        config.output_dir = dir;
    }

    let backtest = Runner::new(config).run().context("backtest failed")?;
    print_summary(&backtest);
    Ok(())
}

fn sweep_cmd(
    config_path: Option<PathBuf>,
    buy: Vec<f64>,
    sell: Vec<f64>,
    top: usize,
) -> Result<()> {
    let base = load_config(config_path)?;
    let mut grid = SweepGrid::default();
    if !buy.is_empty() {
        grid.buy_thresholds = buy;
    }
    if !sell.is_empty() {
        grid.sell_thresholds = sell;
    }

    let entries = run_sweep(&base, &grid).context("sweep failed")?;
    println!();
    println!("=== Sweep Leaderboard ({} runs) ===", entries.len());
    println!(
        "{:<6} {:<6} {:>8} {:>8} {:>8} {:>7} {:<12}",
        "Buy", "Sell", "Return%", "Sharpe", "MaxDD%", "Trades", "Run"
    );
    for entry in entries.iter().take(top) {
        println!(
            "{:<6.1} {:<6.1} {:>8.2} {:>8.3} {:>8.2} {:>7} {:<12}",
            entry.buy_threshold,
            entry.sell_threshold,
            entry.metrics.total_return * 100.0,
            entry.metrics.sharpe,
            entry.metrics.max_drawdown * 100.0,
            entry.metrics.trade_count,
            &entry.run_id[..12],
        );
    }
    println!();
    Ok(())
}

fn generate_cmd(
    symbol: &str,
    days: usize,
    start: &str,
    seed: u64,
    out: Option<PathBuf>,
) -> Result<()> {
    let start = NaiveDate::parse_from_str(start, "%Y-%m-%d")
        .with_context(|| format!("bad start date '{start}'"))?;
    let rows = tradelab_runner::synthetic::generate(symbol, start, days, seed);
    let path = out.unwrap_or_else(|| PathBuf::from(format!("{symbol}.csv")));

    let mut writer = csv_writer(&path)?;
    use std::io::Write;
    writeln!(writer, "date,open,high,low,close,volume")
        .with_context(|| format!("writing {}", path.display()))?;
    for row in &rows {
        writeln!(
            writer,
            "{},{:.4},{:.4},{:.4},{:.4},{:.0}",
            row.date, row.open, row.high, row.low, row.close, row.volume
        )
        .with_context(|| format!("writing {}", path.display()))?;
    }
    println!("Wrote {} rows to {}", rows.len(), path.display());
    Ok(())
}

fn csv_writer(path: &PathBuf) -> Result<std::io::BufWriter<std::fs::File>> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("creating {}", path.display()))?;
    Ok(std::io::BufWriter::new(file))
}

fn print_summary(backtest: &BacktestResult) {
    let metrics = &backtest.metrics;
    let result = &backtest.result;
    println!();
    println!("=== Backtest Result ===");
    println!("Run:            {}", &backtest.run_id[..12]);
    println!("Name:           {}", backtest.name);
    if let (Some(first), Some(last)) = (result.snapshots.first(), result.snapshots.last()) {
        println!("Period:         {} to {}", first.date, last.date);
    }
    println!("Initial:        ${:.2}", result.initial_capital);
    println!("Final:          ${:.2}", result.final_value);
    println!("Trades:         {}", metrics.trade_count);
    println!("Alerts:         {}", result.alerts.len());
    println!();
    println!("--- Performance ---");
    println!("Total Return:   {:.2}%", metrics.total_return * 100.0);
    println!("Annualized:     {:.2}%", metrics.annualized_return * 100.0);
    println!("Sharpe:         {:.3}", metrics.sharpe);
    println!("Sortino:        {:.3}", metrics.sortino);
    println!("Max Drawdown:   {:.2}%", metrics.max_drawdown * 100.0);
    println!("Win Rate:       {:.1}%", metrics.win_rate * 100.0);
    println!("Profit Factor:  {:.2}", metrics.profit_factor);
    println!("Commission:     ${:.2}", metrics.total_commission);
    println!();
}

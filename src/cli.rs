//! CLI definition and dispatch.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::results_writer::CsvResultsWriter;
use crate::adapters::score_model::ScoreFileModel;
use crate::domain::backtest::{BacktestDriver, BacktestResult};
use crate::domain::config::{
    EndOfRunPolicy, RunConfig, DEFAULT_HOLD_TILL, DEFAULT_LOOKBACK_DAYS, DEFAULT_SELL_PERC,
    DEFAULT_STOP_PERC, DEFAULT_THRESHOLD,
};
use crate::domain::config_validation::{
    optional_bool, optional_f64, optional_i64, parse_date, unknown_keys, validate_all, validate_backtest_config,
    validate_data_config, validate_strategy_config,
};
use crate::domain::error::SignalTraderError;
use crate::domain::ledger::SimulatedLedger;
use crate::domain::metrics::{CodeResult, TradeStats};
use crate::domain::universe::resolve_universe;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::model_port::PredictiveModel;
use crate::ports::report_port::{ResultsWriter, RunReport};

pub const DEFAULT_MODEL_NAME: &str = "scores";
pub const DEFAULT_RESULTS_DIR: &str = "results";

#[derive(Parser, Debug)]
#[command(name = "signaltrader", about = "Day-by-day model-driven trading simulator")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Directory for run results (overrides [output] results_dir)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Comma-separated instruments (overrides [backtest] codes)
        #[arg(long)]
        codes: Option<String>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// List instruments available in the price directory
    ListSymbols {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let outcome = match cli.command {
        Command::Backtest {
            config,
            output,
            codes,
            dry_run,
        } => {
            if dry_run {
                run_dry_run(&config, codes.as_deref())
            } else {
                run_backtest(&config, output.as_deref(), codes.as_deref())
            }
        }
        Command::Validate { config } => run_validate(&config),
        Command::ListSymbols { config } => run_list_symbols(&config),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, SignalTraderError> {
    let adapter = FileConfigAdapter::from_file(path)?;
    for (section, key) in unknown_keys(&adapter) {
        warn!("{}: ignoring unknown key [{section}] {key}", adapter.source());
    }
    Ok(adapter)
}

/// Build the run configuration from a validated config file.
pub fn build_run_config(
    adapter: &dyn ConfigPort,
    universe: Vec<String>,
) -> Result<RunConfig, SignalTraderError> {
    let start_date: NaiveDate = parse_date(adapter, "backtest", "start_date")?;
    let end_date: NaiveDate = parse_date(adapter, "backtest", "end_date")?;
    let initial_capital =
        optional_f64(adapter, "backtest", "initial_capital")?.ok_or_else(|| {
            SignalTraderError::ConfigMissing {
                section: "backtest".into(),
                key: "initial_capital".into(),
            }
        })?;

    let end_of_run = match adapter.get_value("backtest", "end_of_run") {
        Some(v) => v
            .parse::<EndOfRunPolicy>()
            .map_err(|reason| SignalTraderError::ConfigInvalid {
                section: "backtest".into(),
                key: "end_of_run".into(),
                reason,
            })?,
        None => EndOfRunPolicy::default(),
    };

    let lookback_days =
        optional_u32(adapter, "backtest", "lookback_days")?.unwrap_or(DEFAULT_LOOKBACK_DAYS);
    let hold_till = optional_u32(adapter, "strategy", "hold_till")?.unwrap_or(DEFAULT_HOLD_TILL);

    let config = RunConfig {
        threshold: optional_f64(adapter, "strategy", "threshold")?.unwrap_or(DEFAULT_THRESHOLD),
        sell_perc: optional_f64(adapter, "strategy", "take_profit")?.unwrap_or(DEFAULT_SELL_PERC),
        hold_till,
        stop_perc: optional_f64(adapter, "strategy", "stop_loss")?.unwrap_or(DEFAULT_STOP_PERC),
        lookback_days,
        buy_fraction: optional_f64(adapter, "backtest", "buy_fraction")?.unwrap_or(1.0),
        end_of_run,
        parallel_scan: optional_bool(adapter, "backtest", "parallel_scan")?.unwrap_or(false),
        ..RunConfig::new(universe, initial_capital, start_date, end_date)
    };
    config.validate()?;
    Ok(config)
}

fn optional_u32(
    adapter: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<u32>, SignalTraderError> {
    optional_i64(adapter, section, key)?
        .map(|v| {
            u32::try_from(v).map_err(|_| SignalTraderError::ConfigInvalid {
                section: section.into(),
                key: key.into(),
                reason: format!("{key} must not be negative"),
            })
        })
        .transpose()
}

pub fn model_name(adapter: &dyn ConfigPort) -> String {
    adapter
        .get_value("strategy", "model_name")
        .unwrap_or_else(|| DEFAULT_MODEL_NAME.to_string())
}

fn required_path(adapter: &dyn ConfigPort, section: &str, key: &str) -> Result<PathBuf, SignalTraderError> {
    adapter
        .get_value(section, key)
        .map(PathBuf::from)
        .ok_or_else(|| SignalTraderError::ConfigMissing {
            section: section.into(),
            key: key.into(),
        })
}

fn universe_source(adapter: &dyn ConfigPort, codes_override: Option<&str>) -> String {
    codes_override
        .map(str::to_string)
        .or_else(|| adapter.get_value("backtest", "codes"))
        .unwrap_or_default()
}

fn run_backtest(
    config_path: &Path,
    output_path: Option<&Path>,
    codes_override: Option<&str>,
) -> Result<(), SignalTraderError> {
    // Stage 1: load and validate config
    eprintln!("Loading config from {}", config_path.display());
    let adapter = load_config(config_path)?;
    validate_all(&adapter)?;

    // Stage 2: price source and universe
    let prices = CsvAdapter::new(required_path(&adapter, "data", "price_dir")?);
    let universe = resolve_universe(&universe_source(&adapter, codes_override), &prices)?;
    let run_config = build_run_config(&adapter, universe)?;

    // Stage 3: model
    let name = model_name(&adapter);
    let scores_path = required_path(&adapter, "data", "scores_file")?;
    eprintln!("Loading scores from {}", scores_path.display());
    let model = ScoreFileModel::from_csv(&name, &scores_path, prices)?;
    info!("loaded {} scores for model {}", model.len(), name);

    // Stage 4: simulate and persist
    let results_dir = output_path
        .map(Path::to_path_buf)
        .or_else(|| adapter.get_value("output", "results_dir").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_RESULTS_DIR));
    let writer = CsvResultsWriter::new(results_dir);

    eprintln!(
        "Running backtest: {} instruments, {} to {}",
        run_config.universe.len(),
        run_config.start_date,
        run_config.end_date
    );
    run_pipeline(&run_config, &model, Some(&writer))?;
    Ok(())
}

/// Simulate one run, print the console summary and hand the result to
/// `writer` when given.
pub fn run_pipeline(
    run_config: &RunConfig,
    model: &dyn PredictiveModel,
    writer: Option<&dyn ResultsWriter>,
) -> Result<BacktestResult, SignalTraderError> {
    let ledger = SimulatedLedger::with_buy_fraction(run_config.initial_capital, run_config.buy_fraction);
    let result = BacktestDriver::new(run_config.clone(), model, ledger)?.run()?;

    print_summary(&result, run_config.end_date);

    if let Some(writer) = writer {
        let location = writer.write(&RunReport {
            result: &result,
            config: run_config,
            model_name: model.name(),
        })?;
        eprintln!("\nResults written to: {location}");
    }
    Ok(result)
}

/// Console report; open positions are aged as of `as_of`.
pub fn print_summary(result: &BacktestResult, as_of: NaiveDate) {
    let stats = TradeStats::compute(&result.trades, result.summary.initial_capital);

    eprintln!("\n=== Results: {} ===", result.run_id);
    eprintln!("Initial Capital:  {:.2}", result.summary.initial_capital);
    eprintln!("Final Cash:       {:.2}", result.summary.cash);
    eprintln!("Total Gain:       {:.2}", result.summary.total_gain);
    eprintln!("Total Return:     {:.2}%", stats.total_return * 100.0);
    eprintln!("Total Trades:     {}", stats.total_trades);
    eprintln!("Win Rate:         {:.1}%", stats.win_rate * 100.0);
    eprintln!("Profit Factor:    {:.2}", stats.profit_factor);
    eprintln!("Avg Holding Days: {:.1}", stats.avg_holding_days);
    eprintln!("Avg Trade Return: {:.2}%", stats.avg_return_pct * 100.0);

    let code_results = CodeResult::compute_per_code(&result.trades);
    if !code_results.is_empty() {
        eprintln!("\n=== Per-Code Summary ===");
        for cr in &code_results {
            let sign = if cr.total_gain >= 0.0 { "+" } else { "" };
            eprintln!(
                "  {}:  {} trades, {} winners, {}{:.2}",
                cr.code, cr.total_trades, cr.winning_trades, sign, cr.total_gain,
            );
        }
    }

    eprintln!("\n=== Open Positions ===");
    if result.open_positions.is_empty() {
        eprintln!("  (none)");
    }
    for p in &result.open_positions {
        eprintln!(
            "  {}: {} @ {:.4} since {}, {} days ({:.2} committed)",
            p.code,
            p.quantity,
            p.entry_price,
            p.entry_date,
            p.days_held(as_of),
            p.allocation
        );
    }
}

pub fn run_dry_run(config_path: &Path, codes_override: Option<&str>) -> Result<(), SignalTraderError> {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = load_config(config_path)?;
    validate_all(&adapter)?;
    eprintln!("Config validated successfully");

    let prices = CsvAdapter::new(required_path(&adapter, "data", "price_dir")?);
    let universe = resolve_universe(&universe_source(&adapter, codes_override), &prices)?;
    let run_config = build_run_config(&adapter, universe)?;

    eprintln!("\nRun:");
    eprintln!("  id:          {}", run_config.run_id(&model_name(&adapter)));
    eprintln!(
        "  dates:       {} to {} ({} days)",
        run_config.start_date,
        run_config.end_date,
        run_config.total_days()
    );
    eprintln!("  capital:     {:.2}", run_config.initial_capital);
    eprintln!("  threshold:   {}", run_config.threshold);
    eprintln!("  take profit: {}", run_config.sell_perc);
    eprintln!("  stop loss:   {}", run_config.stop_perc);
    eprintln!("  hold till:   {} days", run_config.hold_till);
    eprintln!("  end of run:  {:?}", run_config.end_of_run);
    eprintln!("\nUniverse:");
    eprintln!("  codes: {}", run_config.universe.join(", "));

    eprintln!("\nDry run complete: configuration is valid");
    Ok(())
}

fn run_validate(config_path: &Path) -> Result<(), SignalTraderError> {
    eprintln!("Validating config: {}", config_path.display());
    let adapter = load_config(config_path)?;
    validate_backtest_config(&adapter)?;
    eprintln!("  [backtest] ok");
    validate_strategy_config(&adapter)?;
    eprintln!("  [strategy] ok");
    validate_data_config(&adapter)?;
    eprintln!("  [data] ok");
    eprintln!("\nConfiguration is valid");
    Ok(())
}

fn run_list_symbols(config_path: &Path) -> Result<(), SignalTraderError> {
    let adapter = load_config(config_path)?;
    let prices = CsvAdapter::new(required_path(&adapter, "data", "price_dir")?);
    let symbols = prices.list_symbols()?;

    if symbols.is_empty() {
        eprintln!("No symbols found");
    } else {
        for symbol in &symbols {
            println!("{}", symbol);
        }
        eprintln!("{} symbols found", symbols.len());
    }
    Ok(())
}

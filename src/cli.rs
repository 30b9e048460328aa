//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use log::info;
use std::path::PathBuf;
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::results_csv::ResultsCsvAdapter;
use crate::adapters::synthetic_adapter::{SyntheticAdapter, DEFAULT_DAYS, DEFAULT_SEED};
use crate::domain::aggregate::{render_ranking, render_report};
use crate::domain::backtest::{run_backtest, BacktestResult};
use crate::domain::config_validation::{
    validate_backtest_config, validate_risk_config, validate_sweep_config,
};
use crate::domain::error::RoboError;
use crate::domain::run_config::{RunConfig, SweepConfig};
use crate::domain::strategy::create_strategy;
use crate::domain::sweep::{
    default_param_ranges, parameter_combinations, CancelToken, LogObserver, Metric, ParamRange, Sweeper,
    DEFAULT_SYMBOLS,
};
use crate::domain::universe::{load_universe, parse_symbols};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "robo", about = "Signal backtester and parameter sweep")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Sweep strategy parameter grids across symbols
    Sweep {
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Directory of <SYMBOL>.csv files; synthetic data when omitted
        #[arg(short, long)]
        data: Option<PathBuf>,
        #[arg(long)]
        symbols: Option<String>,
        #[arg(long)]
        strategies: Option<String>,
        /// Write every result to this CSV file
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long, default_value_t = 10)]
        top: usize,
        #[arg(long, default_value = "total_return")]
        metric: String,
        #[arg(long, default_value_t = DEFAULT_DAYS)]
        days: usize,
        #[arg(long, default_value_t = DEFAULT_SEED)]
        seed: u64,
    },
    /// Run the configured strategy with ATR brackets and risk limits
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        data: Option<PathBuf>,
        #[arg(long)]
        symbols: Option<String>,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long, default_value_t = DEFAULT_DAYS)]
        days: usize,
        #[arg(long, default_value_t = DEFAULT_SEED)]
        seed: u64,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Sweep {
            config,
            data,
            symbols,
            strategies,
            output,
            top,
            metric,
            days,
            seed,
        } => run_sweep(SweepArgs {
            config,
            data,
            symbols,
            strategies,
            output,
            top,
            metric,
            days,
            seed,
        }),
        Command::Backtest {
            config,
            data,
            symbols,
            output,
            days,
            seed,
        } => run_single(&config, data.as_ref(), symbols.as_deref(), output.as_ref(), days, seed),
        Command::Validate { config } => run_validate(&config),
    }
}

fn fail(err: &RoboError) -> ExitCode {
    eprintln!("error: {err}");
    ExitCode::from(err)
}

pub fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, ExitCode> {
    info!("Loading config from {}", path.display());
    FileConfigAdapter::from_file(path).map_err(|e| fail(&e))
}

/// `--symbols` wins over `[section] symbols`, which wins over the defaults.
pub fn resolve_symbols(
    symbol_override: Option<&str>,
    config: Option<&dyn ConfigPort>,
    section: &str,
) -> Result<Vec<String>, RoboError> {
    if let Some(raw) = symbol_override {
        return Ok(parse_symbols(raw)?);
    }

    if let Some(raw) = config.and_then(|c| c.get_string(section, "symbols")) {
        return Ok(parse_symbols(&raw)?);
    }

    Ok(DEFAULT_SYMBOLS.iter().map(|s| s.to_string()).collect())
}

pub fn data_port(data_dir: Option<&PathBuf>, symbols: &[String], days: usize, seed: u64) -> Box<dyn DataPort> {
    match data_dir {
        Some(dir) => {
            info!("Reading OHLCV files from {}", dir.display());
            Box::new(CsvAdapter::new(dir.clone()))
        }
        None => {
            info!("Generating {} synthetic bars per symbol (seed {})", days, seed);
            Box::new(SyntheticAdapter::new(symbols.to_vec(), days, seed))
        }
    }
}

struct SweepArgs {
    config: Option<PathBuf>,
    data: Option<PathBuf>,
    symbols: Option<String>,
    strategies: Option<String>,
    output: Option<PathBuf>,
    top: usize,
    metric: String,
    days: usize,
    seed: u64,
}

/// Strategy grids for the run: `--strategies` picks names, each keeping its
/// configured grid when there is one.
fn select_grids(config: &SweepConfig, names: Option<&str>) -> Result<Vec<(String, Vec<ParamRange>)>, RoboError> {
    let Some(raw) = names else {
        return Ok(config.ranges.clone());
    };

    let mut grids = Vec::new();
    for name in raw.split(',').map(|s| s.trim().to_lowercase()).filter(|s| !s.is_empty()) {
        let ranges = match config.ranges.iter().find(|(s, _)| *s == name) {
            Some((_, ranges)) => ranges.clone(),
            None => default_param_ranges(&name)?,
        };
        grids.push((name, ranges));
    }
    if grids.is_empty() {
        return Err(RoboError::invalid("sweep", "strategies", "no strategies selected"));
    }
    Ok(grids)
}

fn run_sweep(args: SweepArgs) -> ExitCode {
    let adapter = match args.config.as_ref().map(load_config).transpose() {
        Ok(a) => a,
        Err(code) => return code,
    };
    let config: Option<&dyn ConfigPort> = adapter.as_ref().map(|a| a as &dyn ConfigPort);

    let sweep_config = match config {
        Some(c) => SweepConfig::from_config(c),
        None => Ok(SweepConfig::defaults()),
    };
    let sweep_config = match sweep_config {
        Ok(c) => c,
        Err(e) => return fail(&e),
    };

    let metric: Metric = match args.metric.parse() {
        Ok(m) => m,
        Err(e) => return fail(&e),
    };

    let grids = match select_grids(&sweep_config, args.strategies.as_deref()) {
        Ok(g) => g,
        Err(e) => return fail(&e),
    };

    let symbols = match args.symbols.as_deref() {
        Some(raw) => match resolve_symbols(Some(raw), None, "sweep") {
            Ok(s) => s,
            Err(e) => return fail(&e),
        },
        None => sweep_config.symbols.clone(),
    };

    let port = data_port(args.data.as_ref(), &symbols, args.days, args.seed);
    let universe = match load_universe(port.as_ref(), &symbols) {
        Ok(u) => u,
        Err(e) => return fail(&e),
    };

    let total: usize = grids
        .iter()
        .map(|(_, ranges)| parameter_combinations(ranges).len() * universe.count())
        .sum();
    info!(
        "Running {} backtests: {} strategies over {} symbols",
        total,
        grids.len(),
        universe.count()
    );

    let mut sweeper = Sweeper::signal_mode(
        sweep_config.backtest.initial_capital,
        sweep_config.backtest.commission,
    );
    let observer = LogObserver::default();
    let cancel = CancelToken::new();

    for (strategy, ranges) in &grids {
        if let Err(e) = sweeper.sweep(strategy, ranges, &universe.series, &observer, &cancel) {
            return fail(&e);
        }
    }

    let results = sweeper.results();
    print!("{}", render_report(results, args.top));
    if !matches!(metric, Metric::TotalReturn | Metric::SharpeRatio) && !results.is_empty() {
        println!();
        print!("{}", render_ranking(results, args.top, metric));
    }

    if let Some(path) = &args.output {
        if let Err(e) = ResultsCsvAdapter::new().write_results(results, path) {
            return fail(&e);
        }
        info!("Results written to {}", path.display());
    }

    ExitCode::SUCCESS
}

fn run_single(
    config_path: &PathBuf,
    data_dir: Option<&PathBuf>,
    symbol_override: Option<&str>,
    output_path: Option<&PathBuf>,
    days: usize,
    seed: u64,
) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let run_config = match RunConfig::from_config(&adapter) {
        Ok(c) => c,
        Err(e) => return fail(&e),
    };

    let params = run_config.strategy_parameters();
    let strategy = match create_strategy(&run_config.strategy, &params) {
        Ok(s) => s,
        Err(e) => return fail(&e),
    };
    info!("Strategy: {} ({})", strategy.name(), params);

    let symbols = match resolve_symbols(symbol_override, Some(&adapter), "backtest") {
        Ok(s) => s,
        Err(e) => return fail(&e),
    };

    let port = data_port(data_dir, &symbols, days, seed);
    let universe = match load_universe(port.as_ref(), &symbols) {
        Ok(u) => u,
        Err(e) => return fail(&e),
    };

    let engine = run_config.engine_config();
    let mut results: Vec<BacktestResult> = Vec::with_capacity(universe.count());
    for series in &universe.series {
        match run_backtest(strategy.as_ref(), series, &engine, &run_config.risk) {
            Ok(result) => results.push(result),
            Err(e) => return fail(&e),
        }
    }

    println!("=== {} ({}) ===", run_config.strategy, run_config.trade_direction);
    for r in &results {
        let m = &r.metrics;
        println!("{}:", r.symbol);
        println!("  Total Return:   {:.2}%", m.total_return);
        println!("  Sharpe Ratio:   {:.2}", m.sharpe_ratio);
        println!("  Max Drawdown:   {:.2}%", m.max_drawdown);
        println!(
            "  Trades:         {} ({} won, {} lost, {:.1}% win rate)",
            m.total_trades, m.winning_trades, m.losing_trades, m.win_rate
        );
        println!("  Final Capital:  {:.2}", m.final_capital);
    }

    if let Some(path) = output_path {
        if let Err(e) = ResultsCsvAdapter::new().write_results(&results, path) {
            return fail(&e);
        }
        info!("Results written to {}", path.display());
    }

    ExitCode::SUCCESS
}

fn run_validate(config_path: &PathBuf) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    if let Err(e) = validate_backtest_config(&adapter) {
        return fail(&e);
    }
    if let Err(e) = validate_risk_config(&adapter) {
        return fail(&e);
    }

    if adapter.get_string("strategy", "name").is_some() {
        let run_config = match RunConfig::from_config(&adapter) {
            Ok(c) => c,
            Err(e) => return fail(&e),
        };
        let params = run_config.strategy_parameters();
        if let Err(e) = create_strategy(&run_config.strategy, &params) {
            return fail(&e);
        }
        println!("Strategy: {} ({})", run_config.strategy, params);
        println!("Direction: {}", run_config.trade_direction);
    }

    if let Err(e) = validate_sweep_config(&adapter) {
        return fail(&e);
    }
    let sweep_config = match SweepConfig::from_config(&adapter) {
        Ok(c) => c,
        Err(e) => return fail(&e),
    };
    for (strategy, ranges) in &sweep_config.ranges {
        println!(
            "Sweep {}: {} parameter sets",
            strategy,
            parameter_combinations(ranges).len()
        );
    }
    println!("Symbols: {}", sweep_config.symbols.join(", "));

    println!("Configuration is valid.");
    ExitCode::SUCCESS
}

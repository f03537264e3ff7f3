//! sagres CLI binary.
//!
//! Command-line interface for the sagres factor research pipeline: build
//! factor tables from CSV snapshots, test factor significance, and run
//! selection backtests.

mod data;

use std::path::{Path, PathBuf};
use std::process;

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use polars::prelude::*;
use sagres_eval::{
    BacktestConfig, BacktestSeries, Evaluation, FamaMacbethConfig, Frequency, ScoreTerm,
    Selection, backtest_top_n, evaluate, fama_macbeth, group_return_analysis,
};
use sagres_factors::{WinsorizeConfig, winsorize};
use sagres_panel::days_from_date;
use sagres_traits::{FactorTable, columns};

#[derive(Parser)]
#[command(name = "sagres")]
#[command(about = "Factor research pipeline for equity return prediction", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the factor table from CSV inputs and persist snapshots
    Compute {
        /// Directory holding stk_data.csv, eqy_belongto_parcomsh.csv, and
        /// open_days_data.csv
        #[arg(short, long)]
        data_dir: PathBuf,

        /// Directory for factors.csv and winsorized_factors.csv
        #[arg(short, long, default_value = ".")]
        out_dir: PathBuf,

        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Fama-MacBeth significance tests and group-return analysis
    Test {
        /// Factor-table snapshot to test
        #[arg(short, long)]
        factors: PathBuf,

        /// Number of quantile groups
        #[arg(short, long, default_value = "5")]
        groups: usize,

        /// Start date (YYYY-MM-DD)
        #[arg(long)]
        start: Option<String>,

        /// End date (YYYY-MM-DD)
        #[arg(long)]
        end: Option<String>,

        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Top-N backtest of a single factor
    Backtest {
        /// Factor-table snapshot to test
        #[arg(short, long)]
        factors: PathBuf,

        /// Factor column to rank by
        #[arg(long)]
        factor: String,

        /// Portfolio size per date
        #[arg(short, long, default_value = "100")]
        stocks: usize,

        /// Hold the lowest-ranked stocks instead of the highest
        #[arg(long)]
        ascending: bool,

        /// Observation frequency for annualization
        #[arg(long, default_value = "weekly2yearly")]
        freq: String,

        /// Per-period risk-free rate
        #[arg(long, default_value = "0.0")]
        risk_free: f64,

        /// Start date (YYYY-MM-DD)
        #[arg(long)]
        start: Option<String>,

        /// End date (YYYY-MM-DD)
        #[arg(long)]
        end: Option<String>,

        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Top-N backtest of a factor combination
    Multifactor {
        /// Factor-table snapshot to test
        #[arg(short, long)]
        factors: PathBuf,

        /// Combination method (score or regression)
        #[arg(short, long, default_value = "score")]
        method: String,

        /// Factor terms; a leading '-' flips a term's sign for score ranking
        #[arg(short, long, value_delimiter = ',')]
        terms: Vec<String>,

        /// Portfolio size per date
        #[arg(short, long, default_value = "100")]
        stocks: usize,

        /// Observation frequency for annualization
        #[arg(long, default_value = "weekly2yearly")]
        freq: String,

        /// Per-period risk-free rate
        #[arg(long, default_value = "0.0")]
        risk_free: f64,

        /// Start date (YYYY-MM-DD)
        #[arg(long)]
        start: Option<String>,

        /// End date (YYYY-MM-DD)
        #[arg(long)]
        end: Option<String>,

        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Compute {
            data_dir,
            out_dir,
            format,
        } => run_compute(&data_dir, &out_dir, &format),
        Commands::Test {
            factors,
            groups,
            start,
            end,
            format,
        } => run_test(&factors, groups, start, end, &format),
        Commands::Backtest {
            factors,
            factor,
            stocks,
            ascending,
            freq,
            risk_free,
            start,
            end,
            format,
        } => {
            let selection = Selection::Factor {
                name: factor,
                ascending,
            };
            run_backtest(&factors, &selection, stocks, &freq, risk_free, start, end, &format)
        }
        Commands::Multifactor {
            factors,
            method,
            terms,
            stocks,
            freq,
            risk_free,
            start,
            end,
            format,
        } => {
            let selection = build_selection(&method, &terms)?;
            run_backtest(&factors, &selection, stocks, &freq, risk_free, start, end, &format)
        }
    }
}

fn build_selection(method: &str, terms: &[String]) -> Result<Selection> {
    match method.to_lowercase().as_str() {
        "score" => Ok(Selection::Score {
            terms: terms.iter().map(|t| ScoreTerm::parse(t)).collect(),
        }),
        "regression" => Ok(Selection::Regression {
            factor_names: terms
                .iter()
                .map(|t| t.trim_start_matches('-').to_string())
                .collect(),
        }),
        other => Err(anyhow::anyhow!(
            "unknown combination method '{other}' (use score or regression)"
        )),
    }
}

/// Restricts a factor table to `[start, end]` when either bound is given.
fn filter_range(
    table: FactorTable,
    start: Option<String>,
    end: Option<String>,
) -> Result<FactorTable> {
    if start.is_none() && end.is_none() {
        return Ok(table);
    }
    let to_days = |s: &str| -> Result<i32> { Ok(days_from_date(data::parse_date(s)?)) };

    let mut lf = table.into_inner().lazy();
    if let Some(ref s) = start {
        lf = lf.filter(
            col(columns::DATE)
                .cast(DataType::Int32)
                .gt_eq(lit(to_days(s)?)),
        );
    }
    if let Some(ref e) = end {
        lf = lf.filter(
            col(columns::DATE)
                .cast(DataType::Int32)
                .lt_eq(lit(to_days(e)?)),
        );
    }
    Ok(FactorTable::new(lf.collect()?)?)
}

fn load_range(path: &Path, start: Option<String>, end: Option<String>) -> Result<FactorTable> {
    let table = data::load_factors(path)?;
    filter_range(table, start, end)
}

fn parse_date_span(table: &FactorTable) -> Result<(NaiveDate, NaiveDate)> {
    let dates = table
        .data()
        .column(columns::DATE)?
        .as_materialized_series()
        .date()?
        .clone();
    let days: Vec<i32> = dates.into_iter().flatten().collect();
    let first = days.iter().min().copied().unwrap_or(0);
    let last = days.iter().max().copied().unwrap_or(0);
    Ok((
        sagres_panel::date_from_days(first),
        sagres_panel::date_from_days(last),
    ))
}

fn run_compute(data_dir: &Path, out_dir: &Path, format: &str) -> Result<()> {
    let price = data::load_prices(data_dir)?;
    let equity = data::load_equity(data_dir)?;
    let ohlcv = data::load_ohlcv(data_dir)?;

    let table = sagres_factors::compute_factors(&price, &equity, &ohlcv)?;
    std::fs::create_dir_all(out_dir)?;

    let mut raw = table.data().clone();
    data::write_snapshot(&mut raw, &out_dir.join("factors.csv"))?;

    let config = WinsorizeConfig::default();
    let mut winsorized = table.clone();
    let mut reports = Vec::new();
    for factor in columns::FACTORS {
        let (next, report) = winsorize(&winsorized, factor, &config)?;
        winsorized = next;
        reports.push((factor, report));
    }
    let mut out = winsorized.data().clone();
    data::write_snapshot(&mut out, &out_dir.join("winsorized_factors.csv"))?;

    if format == "json" {
        let json = serde_json::json!({
            "rows": table.len(),
            "winsorize": reports
                .iter()
                .map(|(f, r)| serde_json::json!({ "factor": f, "report": r }))
                .collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&json)?);
        return Ok(());
    }

    let (first, last) = parse_date_span(&table)?;
    println!("\n╔══════════════════════════════════════════════════════════════╗");
    println!("║                     Factor Computation                       ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");
    println!("Rows:     {}", table.len());
    println!("Span:     {first} to {last}");
    println!("Written:  {}", out_dir.join("factors.csv").display());
    println!("          {}", out_dir.join("winsorized_factors.csv").display());
    println!();
    println!("Winsorization ({}..{} quantiles):", config.lower_pct, config.upper_pct);
    for (factor, report) in &reports {
        println!(
            "  {:<10} {:>8} values clipped over {} dates ({} dates skipped)",
            factor, report.values_clipped, report.dates_clipped, report.dates_skipped
        );
    }
    println!();
    Ok(())
}

fn run_test(
    path: &Path,
    groups: usize,
    start: Option<String>,
    end: Option<String>,
    format: &str,
) -> Result<()> {
    let table = load_range(path, start, end)?;
    let config = FamaMacbethConfig::default();

    let mut summaries = Vec::new();
    let mut group_results = Vec::new();
    for factor in columns::FACTORS {
        summaries.push(fama_macbeth(&table, factor, &config)?);
        group_results.push(group_return_analysis(&table, factor, groups)?);
    }

    if format == "json" {
        let json = serde_json::json!({
            "fama_macbeth": summaries,
            "groups": group_results,
        });
        println!("{}", serde_json::to_string_pretty(&json)?);
        return Ok(());
    }

    println!("\n╔══════════════════════════════════════════════════════════════╗");
    println!("║                    Factor Significance                       ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("Fama-MacBeth (cross-sectional slopes, {} factors):", columns::FACTORS.len());
    println!(
        "  {:<10} {:>12} {:>8} {:>7} {:>7} {:>7} {:>8}",
        "Factor", "Mean Coef", "t-stat", "% Pos", "% Neg", "Dates", "Skipped"
    );
    println!("  {}", "-".repeat(64));
    for s in &summaries {
        println!(
            "  {:<10} {:>12.6} {:>8.2} {:>6.1}% {:>6.1}% {:>7} {:>8}",
            s.factor,
            s.mean_coef,
            s.t_stat,
            s.pct_positive * 100.0,
            s.pct_negative * 100.0,
            s.n_dates,
            s.n_skipped
        );
    }
    println!();

    println!("Group returns ({groups} quantile groups, cumulative over the window):");
    for g in &group_results {
        let last = g.cum_returns.last().map_or(&[] as &[f64], Vec::as_slice);
        let cells: Vec<String> = last.iter().map(|c| format!("{:>8.2}%", c * 100.0)).collect();
        println!("  {:<10} {}", g.factor, cells.join(" "));
    }
    println!("  (group 0 holds the lowest factor values)");
    println!();
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn run_backtest(
    path: &Path,
    selection: &Selection,
    stocks: usize,
    freq: &str,
    risk_free: f64,
    start: Option<String>,
    end: Option<String>,
    format: &str,
) -> Result<()> {
    let table = load_range(path, start, end)?;
    let freq: Frequency = freq.parse()?;
    let config = BacktestConfig {
        n_stocks: stocks,
        ..Default::default()
    };

    let series = backtest_top_n(&table, selection, &config)?;
    let eval = evaluate(&series, freq, risk_free)?;

    if format == "json" {
        let json = serde_json::json!({
            "selection": selection,
            "n_stocks": stocks,
            "evaluation": eval,
            "series": series,
        });
        println!("{}", serde_json::to_string_pretty(&json)?);
        return Ok(());
    }

    println!("\n╔══════════════════════════════════════════════════════════════╗");
    println!("║                       Backtesting                            ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");
    match selection {
        Selection::Factor { name, ascending } => {
            let dir = if *ascending { "ascending" } else { "descending" };
            println!("Selection: top {stocks} by {name} ({dir})");
        }
        Selection::Score { terms } => {
            let spec: Vec<String> = terms
                .iter()
                .map(|t| {
                    if t.weight < 0.0 {
                        format!("-{}", t.name)
                    } else {
                        t.name.clone()
                    }
                })
                .collect();
            println!("Selection: top {stocks} by score [{}]", spec.join(", "));
        }
        Selection::Regression { factor_names } => {
            println!(
                "Selection: top {stocks} by regression [{}]",
                factor_names.join(", ")
            );
        }
    }
    println!(
        "Window:    {} to {} ({} periods, {} skipped)",
        series.dates.first().map(ToString::to_string).unwrap_or_default(),
        series.dates.last().map(ToString::to_string).unwrap_or_default(),
        series.dates.len(),
        series.n_skipped
    );
    println!();
    print_evaluation(&eval, &series);
    Ok(())
}

fn print_evaluation(eval: &Evaluation, series: &BacktestSeries) {
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("PERFORMANCE");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n");
    println!(
        "  Cumulative Return: {:>10.2}%",
        series.cum_returns.last().copied().unwrap_or(0.0) * 100.0
    );
    println!("  Annual Return:     {:>10.2}%", eval.annual_return * 100.0);
    println!("  Annual Volatility: {:>10.2}%", eval.annual_volatility * 100.0);
    println!("  Sharpe Ratio:      {:>10.2}", eval.sharpe_ratio);
    println!("  Sortino Ratio:     {:>10.2}", eval.sortino_ratio);
    println!("  Max Drawdown:      {:>10.2}%", eval.max_drawdown * 100.0);
    println!(
        "  Drawdown Window:   {} to {}",
        eval.max_drawdown_start, eval.max_drawdown_end
    );
    println!();
}

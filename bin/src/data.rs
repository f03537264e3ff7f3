//! CSV loading and snapshot persistence for the sagres CLI.

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use polars::prelude::*;
use sagres_traits::FactorTable;

/// Reads a CSV file with date parsing enabled.
fn read_csv(path: &Path) -> Result<DataFrame> {
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_parse_options(CsvParseOptions::default().with_try_parse_dates(true))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .with_context(|| format!("failed to open {}", path.display()))?
        .finish()
        .with_context(|| format!("failed to read {}", path.display()))?;
    Ok(df)
}

/// Casts the named columns to the Date dtype; errors if a column is missing
/// or a value does not parse as a date.
fn with_date_columns(df: DataFrame, date_cols: &[&str]) -> Result<DataFrame> {
    let casts: Vec<Expr> = date_cols
        .iter()
        .map(|c| col(*c).cast(DataType::Date))
        .collect();
    let df = df.lazy().with_columns(casts).collect()?;
    Ok(df)
}

/// Loads the weekly price table (`stk_data.csv`).
pub(crate) fn load_prices(data_dir: &Path) -> Result<DataFrame> {
    let df = read_csv(&data_dir.join("stk_data.csv"))?;
    with_date_columns(df, &["open_date", "close_date"])
}

/// Loads the parent-company equity table (`eqy_belongto_parcomsh.csv`).
pub(crate) fn load_equity(data_dir: &Path) -> Result<DataFrame> {
    let df = read_csv(&data_dir.join("eqy_belongto_parcomsh.csv"))?;
    with_date_columns(df, &["rpt_date"])
}

/// Loads the weekly OHLCV table (`open_days_data.csv`).
pub(crate) fn load_ohlcv(data_dir: &Path) -> Result<DataFrame> {
    let df = read_csv(&data_dir.join("open_days_data.csv"))?;
    with_date_columns(df, &["date"])
}

/// Loads a persisted factor-table snapshot.
pub(crate) fn load_factors(path: &Path) -> Result<FactorTable> {
    let df = read_csv(path)?;
    let df = with_date_columns(df, &[sagres_traits::columns::DATE])?;
    let table = FactorTable::new(df)
        .with_context(|| format!("{} is not a factor-table snapshot", path.display()))?;
    Ok(table)
}

/// Writes a DataFrame as a CSV snapshot.
pub(crate) fn write_snapshot(df: &mut DataFrame, path: &Path) -> Result<()> {
    let mut file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(df)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

/// Parses a date string in YYYY-MM-DD format.
pub(crate) fn parse_date(date_str: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .with_context(|| format!("invalid date: {date_str} (expected YYYY-MM-DD)"))
}

//! The factor engine: raw input tables → persisted factor table.

use ndarray::Array2;
use polars::prelude::*;
use sagres_panel::{OhlcvPanels, Panel, date_from_days, date_series, forward_returns, left_join, period_for};
use sagres_traits::{FactorTable, Result, SagresError, columns};

/// Required columns of the weekly price table.
const PRICE_COLUMNS: [&str; 7] = [
    "stock_code",
    "open_date",
    "close_date",
    "open",
    "close",
    "uadj_close",
    "total_shares",
];

/// Required columns of the book-equity table.
const EQUITY_COLUMNS: [&str; 3] = ["stock_code", "rpt_date", "eqy_belongto_parcomsh"];

/// Required columns of the weekly OHLCV table.
const OHLCV_COLUMNS: [&str; 7] = ["stock_code", "date", "high", "open", "low", "close", "volume"];

fn require_columns(df: &DataFrame, cols: &[&str]) -> Result<()> {
    for col in cols {
        if df.column(col).is_err() {
            return Err(SagresError::MissingColumn((*col).to_string()));
        }
    }
    Ok(())
}

/// Maps every close date of `df` to its report period in a new Date column.
fn report_period_column(df: &DataFrame, date_col: &str, out_col: &str) -> Result<Series> {
    let dates = df
        .column(date_col)?
        .as_materialized_series()
        .cast(&DataType::Date)?;
    let mut periods = Vec::with_capacity(dates.len());
    for days in dates.date()?.into_iter() {
        let Some(days) = days else {
            return Err(SagresError::InvalidData(format!("null {date_col} in price table")));
        };
        periods.push(period_for(date_from_days(days))?);
    }
    Ok(date_series(out_col, periods))
}

/// One-period trailing return of each panel column, aligned on the date axis.
fn trailing_returns(close: &Panel) -> Result<Panel> {
    let (nd, ns) = (close.n_dates(), close.n_stocks());
    let mut values = Array2::from_elem((nd, ns), None);
    for t in 1..nd {
        for s in 0..ns {
            if let (Some(prev), Some(cur)) = (close.get(t - 1, s), close.get(t, s))
                && prev != 0.0
            {
                values[(t, s)] = Some((cur - prev) / prev);
            }
        }
    }
    Panel::from_parts(close.dates().to_vec(), close.stocks().to_vec(), values)
}

/// Builds the factor table from the three raw input tables.
///
/// Pipeline, mirroring the merged-panel data model:
///
/// 1. market cap = `total_shares * uadj_close`;
/// 2. each week's close date is mapped to its disclosed report period and the
///    book-equity table is left-joined on (stock, period);
/// 3. the OHLCV table is pivoted wide, the two-period forward return is built
///    with suspension/limit-lock overrides, and joined back on
///    (stock, open date);
/// 4. `fac_ret` is the one-week close-to-close return, `fac_size` is
///    `ln(market cap / 1e6)` (null when market cap ≤ 0), `fac_bm` is
///    book equity / market cap (null when unmatched or market cap ≤ 0).
///
/// Rows whose forward return is undefined (the final two weeks, unlisted
/// periods) are dropped; factor nulls are kept and propagate downstream.
///
/// # Errors
///
/// Fails on missing columns, duplicate join keys, or null key dates.
pub fn compute_factors(
    price: &DataFrame,
    equity: &DataFrame,
    ohlcv: &DataFrame,
) -> Result<FactorTable> {
    require_columns(price, &PRICE_COLUMNS)?;
    require_columns(equity, &EQUITY_COLUMNS)?;
    require_columns(ohlcv, &OHLCV_COLUMNS)?;

    // Market cap uses the unadjusted close: splits change the share count,
    // not the value of the company.
    let mut merged = price
        .clone()
        .lazy()
        .with_column((col("total_shares") * col("uadj_close")).alias("mkt_cap"))
        .collect()?;

    let rpt = report_period_column(&merged, "close_date", "rpt_date")?;
    merged.with_column(rpt)?;
    let merged = left_join(&merged, equity, &["stock_code", "rpt_date"], "equity")?;

    // Forward returns come from the wide OHLCV grid and key on the week's
    // opening day.
    let panels = OhlcvPanels::pivot(ohlcv, "date", "stock_code")?;
    let pred = forward_returns(&panels)?.unpivot("open_date", "stock_code", columns::PRED_RTN)?;
    let merged = left_join(&merged, &pred, &["stock_code", "open_date"], "pred_rtn")?;

    // Weekly momentum factor from the adjusted close, keyed on the close date.
    let close_panel = Panel::pivot(price, "close_date", "stock_code", "close")?;
    let fac_ret = trailing_returns(&close_panel)?.unpivot(
        "close_date",
        "stock_code",
        columns::FAC_RET,
    )?;
    let merged = left_join(&merged, &fac_ret, &["stock_code", "close_date"], "fac_ret")?;

    let factors = merged
        .lazy()
        .with_column(
            when(col("mkt_cap").gt(lit(0.0)))
                .then((col("mkt_cap") / lit(1_000_000.0)).log(std::f64::consts::E))
                .otherwise(lit(NULL))
                .alias(columns::FAC_SIZE),
        )
        .with_column(
            when(col("mkt_cap").gt(lit(0.0)))
                .then(col("eqy_belongto_parcomsh") / col("mkt_cap"))
                .otherwise(lit(NULL))
                .alias(columns::FAC_BM),
        )
        .filter(col(columns::PRED_RTN).is_not_null())
        .select([
            col("stock_code").alias(columns::STOCK_ID),
            col("close_date").alias(columns::DATE),
            col(columns::PRED_RTN),
            col(columns::FAC_RET),
            col(columns::FAC_SIZE),
            col(columns::FAC_BM),
        ])
        .sort([columns::DATE, columns::STOCK_ID], Default::default())
        .collect()?;

    FactorTable::new(factors)
}

//! Wide date × stock panels and the long↔wide transforms between them.
//!
//! A [`Panel`] is an immutable grid with an ordered date axis and an ordered
//! stock axis. Cells are `Option<f64>`: a `None` cell means no observation
//! for that stock in that period (not listed, not trading), which is distinct
//! from an observed value of zero and must never be coerced to one.

use std::collections::HashMap;

use ndarray::Array2;
use polars::prelude::*;
use sagres_traits::{Date, Result, SagresError, StockId};

// Offset between days-since-CE (chrono) and days-since-epoch (polars Date).
const EPOCH_CE_DAYS: i32 = 719_163;

/// Converts a polars Date value (days since epoch) to a [`Date`].
#[must_use]
pub fn date_from_days(days: i32) -> Date {
    Date::from_num_days_from_ce_opt(days + EPOCH_CE_DAYS).unwrap()
}

/// Converts a [`Date`] to a polars Date value (days since epoch).
#[must_use]
pub fn days_from_date(date: Date) -> i32 {
    use chrono::Datelike;
    date.num_days_from_ce() - EPOCH_CE_DAYS
}

/// Builds a polars Date series from chrono dates.
pub fn date_series(name: &str, dates: impl IntoIterator<Item = Date>) -> Series {
    let days: Vec<i32> = dates.into_iter().map(days_from_date).collect();
    Int32Chunked::from_vec(name.into(), days)
        .into_date()
        .into_series()
}

/// An immutable wide panel: ordered dates × ordered stocks.
#[derive(Debug, Clone)]
pub struct Panel {
    dates: Vec<Date>,
    stocks: Vec<StockId>,
    stock_index: HashMap<StockId, usize>,
    values: Array2<Option<f64>>,
}

impl Panel {
    /// Builds a panel from raw parts. Axes must match the value grid shape.
    pub fn from_parts(
        dates: Vec<Date>,
        stocks: Vec<StockId>,
        values: Array2<Option<f64>>,
    ) -> Result<Self> {
        if values.dim() != (dates.len(), stocks.len()) {
            return Err(SagresError::InvalidData(format!(
                "panel shape {:?} does not match {} dates x {} stocks",
                values.dim(),
                dates.len(),
                stocks.len()
            )));
        }
        let stock_index = stocks
            .iter()
            .enumerate()
            .map(|(i, s)| (s.clone(), i))
            .collect();
        Ok(Self {
            dates,
            stocks,
            stock_index,
            values,
        })
    }

    /// Pivots a long-format frame into a wide panel.
    ///
    /// The axes are taken from the rows of `df`: every (date, stock) key that
    /// appears contributes to both axes, and the cell holds the row's value
    /// (which may itself be null). A key appearing twice is a data error.
    ///
    /// # Errors
    ///
    /// Returns [`SagresError::MissingColumn`] for absent columns and
    /// [`SagresError::DuplicateKey`] when a (date, stock) key repeats.
    pub fn pivot(df: &DataFrame, date_col: &str, stock_col: &str, value_col: &str) -> Result<Self> {
        for col in [date_col, stock_col, value_col] {
            if df.column(col).is_err() {
                return Err(SagresError::MissingColumn(col.to_string()));
            }
        }

        let dates_s = df
            .column(date_col)?
            .as_materialized_series()
            .cast(&DataType::Date)?;
        let dates_ca = dates_s.date()?;
        let stocks_ca = df.column(stock_col)?.as_materialized_series();
        let stocks_ca = stocks_ca.str()?;
        let values_s = df
            .column(value_col)?
            .as_materialized_series()
            .cast(&DataType::Float64)?;
        let values_ca = values_s.f64()?;

        // Axes: sorted unique dates and stocks over all rows.
        let mut dates: Vec<i32> = dates_ca.into_iter().flatten().collect();
        dates.sort_unstable();
        dates.dedup();
        let mut stocks: Vec<StockId> = stocks_ca
            .into_iter()
            .flatten()
            .map(str::to_string)
            .collect();
        stocks.sort_unstable();
        stocks.dedup();

        let date_index: HashMap<i32, usize> =
            dates.iter().enumerate().map(|(i, &d)| (d, i)).collect();
        let stock_index: HashMap<StockId, usize> = stocks
            .iter()
            .enumerate()
            .map(|(i, s)| (s.clone(), i))
            .collect();

        let mut values = Array2::from_elem((dates.len(), stocks.len()), None);
        let mut seen = Array2::from_elem((dates.len(), stocks.len()), false);

        for ((d, s), v) in dates_ca
            .into_iter()
            .zip(stocks_ca.into_iter())
            .zip(values_ca.into_iter())
        {
            let (Some(d), Some(s)) = (d, s) else {
                return Err(SagresError::InvalidData(format!(
                    "null key in ({date_col}, {stock_col})"
                )));
            };
            let (di, si) = (date_index[&d], stock_index[s]);
            if seen[(di, si)] {
                return Err(SagresError::DuplicateKey {
                    table: value_col.to_string(),
                    detail: format!("({}, {s}) appears more than once", date_from_days(d)),
                });
            }
            seen[(di, si)] = true;
            values[(di, si)] = v;
        }

        Ok(Self {
            dates: dates.into_iter().map(date_from_days).collect(),
            stocks,
            stock_index,
            values,
        })
    }

    /// Unpivots the panel back into a long frame of its non-null cells.
    ///
    /// Round-trips with [`Panel::pivot`] modulo row ordering: exactly the
    /// non-null entries are emitted, sorted by date then stock.
    pub fn unpivot(&self, date_col: &str, stock_col: &str, value_col: &str) -> Result<DataFrame> {
        let mut days = Vec::new();
        let mut stocks = Vec::new();
        let mut vals = Vec::new();

        for (di, date) in self.dates.iter().enumerate() {
            for (si, stock) in self.stocks.iter().enumerate() {
                if let Some(v) = self.values[(di, si)] {
                    days.push(days_from_date(*date));
                    stocks.push(stock.clone());
                    vals.push(v);
                }
            }
        }

        let date_s = Int32Chunked::from_vec(date_col.into(), days)
            .into_date()
            .into_series();
        let stock_s = Series::new(stock_col.into(), stocks);
        let value_s = Series::new(value_col.into(), vals);
        Ok(DataFrame::new(vec![
            date_s.into_column(),
            stock_s.into_column(),
            value_s.into_column(),
        ])?)
    }

    /// The ordered date axis.
    #[must_use]
    pub fn dates(&self) -> &[Date] {
        &self.dates
    }

    /// The ordered stock axis.
    #[must_use]
    pub fn stocks(&self) -> &[StockId] {
        &self.stocks
    }

    /// Number of dates (rows).
    #[must_use]
    pub fn n_dates(&self) -> usize {
        self.dates.len()
    }

    /// Number of stocks (columns).
    #[must_use]
    pub fn n_stocks(&self) -> usize {
        self.stocks.len()
    }

    /// Cell value at (date index, stock index).
    #[must_use]
    pub fn get(&self, date_idx: usize, stock_idx: usize) -> Option<f64> {
        self.values[(date_idx, stock_idx)]
    }

    /// Position of a stock on the stock axis.
    #[must_use]
    pub fn stock_pos(&self, stock: &str) -> Option<usize> {
        self.stock_index.get(stock).copied()
    }
}

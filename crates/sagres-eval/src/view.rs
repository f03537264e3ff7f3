//! Crate-internal row-major view of a factor table, grouped by date.

use std::collections::{BTreeMap, HashMap};

use polars::prelude::*;
use sagres_panel::date_from_days;
use sagres_traits::{Date, FactorTable, Result, SagresError, columns};

/// Materialized factor-table columns with per-date row groups.
///
/// The evaluation stages all iterate date by date over (factor, forward
/// return) cross-sections; this view does the polars → Vec materialization
/// once per run.
pub(crate) struct TableView {
    dates: Vec<Date>,
    groups: Vec<Vec<usize>>,
    cols: HashMap<String, Vec<Option<f64>>>,
}

impl TableView {
    /// Materializes `names` (plus the forward return) from `table`.
    pub(crate) fn new(table: &FactorTable, names: &[&str]) -> Result<Self> {
        let df = table.data();

        let mut cols = HashMap::new();
        for name in names.iter().copied().chain([columns::PRED_RTN]) {
            let s = df
                .column(name)
                .map_err(|_| SagresError::MissingColumn(name.to_string()))?
                .as_materialized_series()
                .cast(&DataType::Float64)?;
            let values: Vec<Option<f64>> = s.f64()?.into_iter().collect();
            cols.insert(name.to_string(), values);
        }

        let dates_s = df
            .column(columns::DATE)?
            .as_materialized_series()
            .cast(&DataType::Date)?;
        let mut by_date: BTreeMap<i32, Vec<usize>> = BTreeMap::new();
        for (idx, d) in dates_s.date()?.into_iter().enumerate() {
            let Some(d) = d else {
                return Err(SagresError::InvalidData(
                    "null date in factor table".to_string(),
                ));
            };
            by_date.entry(d).or_default().push(idx);
        }

        let mut dates = Vec::with_capacity(by_date.len());
        let mut groups = Vec::with_capacity(by_date.len());
        for (d, rows) in by_date {
            dates.push(date_from_days(d));
            groups.push(rows);
        }

        Ok(Self { dates, groups, cols })
    }

    /// The ordered unique dates.
    pub(crate) fn dates(&self) -> &[Date] {
        &self.dates
    }

    /// Number of distinct dates.
    pub(crate) fn n_dates(&self) -> usize {
        self.dates.len()
    }

    /// Row indices belonging to the date at `date_idx`.
    pub(crate) fn rows(&self, date_idx: usize) -> &[usize] {
        &self.groups[date_idx]
    }

    /// Cell value of a materialized column at a row index.
    pub(crate) fn value(&self, name: &str, row: usize) -> Option<f64> {
        self.cols[name][row]
    }
}

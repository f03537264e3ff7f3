//! Quantile-group backtest: does the factor order future returns?

use sagres_traits::{Date, FactorTable, Result, SagresError};
use serde::{Deserialize, Serialize};

use crate::view::TableView;

/// Per-group forward-return time series from a quantile sort.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupReturns {
    /// Factor the stocks were sorted by.
    pub factor: String,
    /// Number of quantile groups.
    pub group_num: usize,
    /// Dates that produced a cross-section.
    pub dates: Vec<Date>,
    /// Equal-weighted mean forward return per date per group
    /// (`returns[t][g]`, group 0 holds the lowest factor values).
    pub returns: Vec<Vec<f64>>,
    /// Compounded cumulative return per date per group.
    pub cum_returns: Vec<Vec<f64>>,
    /// Dates skipped for having fewer observations than groups.
    pub n_skipped: usize,
}

/// Sorts stocks into `group_num` quantile buckets by factor value each date
/// and tracks each bucket's equal-weighted mean forward return.
///
/// Buckets come from rank cut-points: after a stable ascending sort of the
/// date's non-null factor values (ties keep their input order), the stock at
/// rank `r` of `n` lands in bucket `r * group_num / n`. Bucket sizes differ
/// by at most one, and 100 stocks over 5 groups give exactly 20 per group.
///
/// Dates with fewer non-null pairs than `group_num` are skipped and counted.
///
/// # Errors
///
/// [`SagresError::InvalidData`] for an unknown factor or `group_num == 0`;
/// [`SagresError::InsufficientData`] when every date was skipped.
pub fn group_return_analysis(
    factors: &FactorTable,
    factor_name: &str,
    group_num: usize,
) -> Result<GroupReturns> {
    if !factors.has_factor(factor_name) {
        return Err(SagresError::InvalidData(format!(
            "{factor_name} is not a factor column"
        )));
    }
    if group_num == 0 {
        return Err(SagresError::InvalidData("group_num must be positive".to_string()));
    }

    let view = TableView::new(factors, &[factor_name])?;
    let mut dates = Vec::new();
    let mut returns: Vec<Vec<f64>> = Vec::new();
    let mut n_skipped = 0usize;

    for date_idx in 0..view.n_dates() {
        let mut pairs: Vec<(f64, f64)> = Vec::new();
        for &row in view.rows(date_idx) {
            if let (Some(f), Some(r)) = (
                view.value(factor_name, row),
                view.value(sagres_traits::columns::PRED_RTN, row),
            ) {
                pairs.push((f, r));
            }
        }
        let n = pairs.len();
        if n < group_num {
            n_skipped += 1;
            continue;
        }

        // Stable sort keeps the original order among tied factor values.
        pairs.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

        let mut sums = vec![0.0; group_num];
        let mut counts = vec![0usize; group_num];
        for (rank, (_, fwd)) in pairs.iter().enumerate() {
            let g = rank * group_num / n;
            sums[g] += fwd;
            counts[g] += 1;
        }

        dates.push(view.dates()[date_idx]);
        returns.push(
            sums.iter()
                .zip(&counts)
                .map(|(s, &c)| s / c as f64)
                .collect(),
        );
    }

    if dates.is_empty() {
        return Err(SagresError::InsufficientData(format!(
            "no date has {group_num} observations for {factor_name}"
        )));
    }

    let mut cum_returns = Vec::with_capacity(returns.len());
    let mut wealth = vec![1.0; group_num];
    for row in &returns {
        for (w, r) in wealth.iter_mut().zip(row) {
            *w *= 1.0 + r;
        }
        cum_returns.push(wealth.iter().map(|w| w - 1.0).collect());
    }

    Ok(GroupReturns {
        factor: factor_name.to_string(),
        group_num,
        dates,
        returns,
        cum_returns,
        n_skipped,
    })
}

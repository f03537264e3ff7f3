//! Top-N stock-selection backtests.
//!
//! Three ways to rank the cross-section each week: a single factor, a signed
//! combination of standardized factors, or a cross-sectional regression whose
//! coefficients are estimated two periods back to avoid look-ahead.

use sagres_traits::{Date, FactorTable, Result, SagresError, columns};
use serde::{Deserialize, Serialize};

use crate::ols::ols;
use crate::view::TableView;

/// One factor term of a score combination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreTerm {
    /// Factor column the term reads.
    pub name: String,
    /// Signed weight applied to the standardized factor.
    pub weight: f64,
}

impl ScoreTerm {
    /// Parses a term spec: a factor name with an optional leading `-` that
    /// flips its sign, e.g. `"-fac_size"` favors small stocks.
    #[must_use]
    pub fn parse(spec: &str) -> Self {
        spec.strip_prefix('-').map_or_else(
            || Self {
                name: spec.to_string(),
                weight: 1.0,
            },
            |name| Self {
                name: name.to_string(),
                weight: -1.0,
            },
        )
    }
}

/// How the tradable portfolio is picked each date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Selection {
    /// Rank by a single (winsorized) factor.
    Factor {
        /// Factor column to rank by.
        name: String,
        /// Hold the lowest-ranked stocks when true, the highest otherwise.
        ascending: bool,
    },
    /// Rank by a signed sum of per-date standardized factors; highest
    /// composite scores are held.
    Score {
        /// The signed factor terms.
        terms: Vec<ScoreTerm>,
    },
    /// Rank by predicted return from a cross-sectional regression fitted two
    /// periods earlier; highest predictions are held.
    Regression {
        /// Regressor factor columns.
        factor_names: Vec<String>,
    },
}

/// Configuration for top-N backtests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestConfig {
    /// Portfolio size per date.
    pub n_stocks: usize,
    /// Minimum usable cross-section for a date (and, for the regression
    /// variant, for the training date) to enter the backtest. A date with no
    /// usable rows at all is skipped whatever the configured minimum.
    pub min_observations: usize,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            n_stocks: 100,
            min_observations: 10,
        }
    }
}

/// A backtested portfolio return series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestSeries {
    /// Dates the portfolio was held.
    pub dates: Vec<Date>,
    /// Equal-weighted portfolio forward return per date.
    pub returns: Vec<f64>,
    /// Compounded cumulative return per date.
    pub cum_returns: Vec<f64>,
    /// Dates skipped for insufficient data.
    pub n_skipped: usize,
}

/// Cross-sectional z-scores; `None` cells stay `None`.
fn standardize(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let observed: Vec<f64> = values.iter().flatten().copied().collect();
    let n = observed.len();
    if n < 2 {
        return vec![None; values.len()];
    }
    let mean = observed.iter().sum::<f64>() / n as f64;
    let var = observed.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    let std = var.sqrt();
    if std <= 1e-12 {
        return vec![None; values.len()];
    }
    values.iter().map(|v| v.map(|v| (v - mean) / std)).collect()
}

/// Picks the top `n_stocks` scores (descending unless `ascending`) and
/// returns the equal-weighted mean forward return.
fn hold_top_n(mut scored: Vec<(f64, f64)>, n_stocks: usize, ascending: bool) -> f64 {
    scored.sort_by(|a, b| {
        let ord = a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal);
        if ascending { ord } else { ord.reverse() }
    });
    let held = &scored[..n_stocks.min(scored.len())];
    held.iter().map(|(_, fwd)| fwd).sum::<f64>() / held.len() as f64
}

/// Runs a top-N selection backtest over the factor table.
///
/// Each date's portfolio is the `n_stocks` best-ranked stocks under the given
/// [`Selection`], held equal-weighted for the forward-return horizon. The
/// regression variant only trades dates whose training cross-section (two
/// periods prior) produced a fit.
///
/// # Errors
///
/// [`SagresError::InvalidData`] for unknown factor names or an empty term
/// list; [`SagresError::InsufficientData`] when no date is tradable.
pub fn backtest_top_n(
    factors: &FactorTable,
    selection: &Selection,
    config: &BacktestConfig,
) -> Result<BacktestSeries> {
    let factor_names: Vec<String> = match selection {
        Selection::Factor { name, .. } => vec![name.clone()],
        Selection::Score { terms } => terms.iter().map(|t| t.name.clone()).collect(),
        Selection::Regression { factor_names } => factor_names.clone(),
    };
    if factor_names.is_empty() {
        return Err(SagresError::InvalidData(
            "selection names no factors".to_string(),
        ));
    }
    for name in &factor_names {
        if !factors.has_factor(name) {
            return Err(SagresError::InvalidData(format!(
                "{name} is not a factor column"
            )));
        }
    }
    if config.n_stocks == 0 {
        return Err(SagresError::InvalidData("n_stocks must be positive".to_string()));
    }

    let name_refs: Vec<&str> = factor_names.iter().map(String::as_str).collect();
    let view = TableView::new(factors, &name_refs)?;

    let mut dates = Vec::new();
    let mut returns = Vec::new();
    let mut n_skipped = 0usize;

    for date_idx in 0..view.n_dates() {
        let picked = match selection {
            Selection::Factor { name, ascending } => {
                rank_by_factor(&view, date_idx, name, *ascending, config)
            }
            Selection::Score { terms } => rank_by_score(&view, date_idx, terms, config),
            Selection::Regression { factor_names } => {
                rank_by_regression(&view, date_idx, factor_names, config)
            }
        };
        match picked {
            Some(ret) => {
                dates.push(view.dates()[date_idx]);
                returns.push(ret);
            }
            None => n_skipped += 1,
        }
    }

    if dates.is_empty() {
        return Err(SagresError::InsufficientData(
            "no tradable date in the backtest window".to_string(),
        ));
    }

    let mut cum_returns = Vec::with_capacity(returns.len());
    let mut wealth = 1.0;
    for r in &returns {
        wealth *= 1.0 + r;
        cum_returns.push(wealth - 1.0);
    }

    Ok(BacktestSeries {
        dates,
        returns,
        cum_returns,
        n_skipped,
    })
}

fn rank_by_factor(
    view: &TableView,
    date_idx: usize,
    name: &str,
    ascending: bool,
    config: &BacktestConfig,
) -> Option<f64> {
    let mut scored = Vec::new();
    for &row in view.rows(date_idx) {
        if let (Some(f), Some(fwd)) = (view.value(name, row), view.value(columns::PRED_RTN, row)) {
            scored.push((f, fwd));
        }
    }
    if scored.len() < config.min_observations.max(1) {
        return None;
    }
    Some(hold_top_n(scored, config.n_stocks, ascending))
}

fn rank_by_score(
    view: &TableView,
    date_idx: usize,
    terms: &[ScoreTerm],
    config: &BacktestConfig,
) -> Option<f64> {
    let rows = view.rows(date_idx);

    // Standardize each term over the date's cross-section, then sum the
    // signed z-scores; a stock missing any term drops out of the ranking.
    let mut composite: Vec<Option<f64>> = vec![Some(0.0); rows.len()];
    for term in terms {
        let raw: Vec<Option<f64>> = rows.iter().map(|&r| view.value(&term.name, r)).collect();
        for (acc, z) in composite.iter_mut().zip(standardize(&raw)) {
            *acc = match (*acc, z) {
                (Some(a), Some(z)) => Some(a + term.weight * z),
                _ => None,
            };
        }
    }

    let mut scored = Vec::new();
    for (i, &row) in rows.iter().enumerate() {
        if let (Some(score), Some(fwd)) = (composite[i], view.value(columns::PRED_RTN, row)) {
            scored.push((score, fwd));
        }
    }
    if scored.len() < config.min_observations.max(1) {
        return None;
    }
    Some(hold_top_n(scored, config.n_stocks, false))
}

fn rank_by_regression(
    view: &TableView,
    date_idx: usize,
    factor_names: &[String],
    config: &BacktestConfig,
) -> Option<f64> {
    // Coefficients come from the cross-section two periods back; predicting
    // with same-date coefficients would leak the very returns being scored.
    if date_idx < 2 {
        return None;
    }
    let coefs = fit_cross_section(view, date_idx - 2, factor_names, config.min_observations)?;

    let mut scored = Vec::new();
    for &row in view.rows(date_idx) {
        let values: Option<Vec<f64>> = factor_names
            .iter()
            .map(|name| view.value(name, row))
            .collect();
        let (Some(values), Some(fwd)) = (values, view.value(columns::PRED_RTN, row)) else {
            continue;
        };
        let predicted = coefs[0]
            + values
                .iter()
                .zip(&coefs[1..])
                .map(|(x, b)| x * b)
                .sum::<f64>();
        scored.push((predicted, fwd));
    }
    if scored.len() < config.min_observations.max(1) {
        return None;
    }
    Some(hold_top_n(scored, config.n_stocks, false))
}

/// OLS of forward return on the factors over one date's cross-section.
fn fit_cross_section(
    view: &TableView,
    date_idx: usize,
    factor_names: &[String],
    min_observations: usize,
) -> Option<Vec<f64>> {
    let mut y = Vec::new();
    let mut xs: Vec<Vec<f64>> = vec![Vec::new(); factor_names.len()];
    for &row in view.rows(date_idx) {
        let values: Option<Vec<f64>> = factor_names
            .iter()
            .map(|name| view.value(name, row))
            .collect();
        if let (Some(values), Some(fwd)) = (values, view.value(columns::PRED_RTN, row)) {
            y.push(fwd);
            for (col, v) in xs.iter_mut().zip(values) {
                col.push(v);
            }
        }
    }
    if y.len() < min_observations {
        return None;
    }
    let x_refs: Vec<&[f64]> = xs.iter().map(Vec::as_slice).collect();
    ols(&y, &x_refs)
}

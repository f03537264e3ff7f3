//! Fama–MacBeth cross-sectional regression test.
//!
//! First pass: for each date, regress the forward return on the factor
//! across stocks and keep the slope. Second pass: average the slopes over
//! time and test whether the mean differs from zero.

use sagres_traits::{FactorTable, Result, SagresError};
use serde::{Deserialize, Serialize};

use crate::ols::ols;
use crate::view::TableView;

/// Configuration for the Fama–MacBeth test.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FamaMacbethConfig {
    /// Minimum non-null (factor, forward return) pairs a date needs to enter
    /// the first pass; thinner dates are skipped and counted.
    pub min_observations: usize,
}

impl Default for FamaMacbethConfig {
    fn default() -> Self {
        Self {
            min_observations: 10,
        }
    }
}

/// One summary row per tested factor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FamaMacbethSummary {
    /// Tested factor column.
    pub factor: String,
    /// Mean per-date slope coefficient.
    pub mean_coef: f64,
    /// `mean / (std / sqrt(n))` over the slope series; non-finite when the
    /// slope series is degenerate, never masked to zero.
    pub t_stat: f64,
    /// Fraction of dates with a positive slope.
    pub pct_positive: f64,
    /// Fraction of dates with a negative slope.
    pub pct_negative: f64,
    /// Dates that entered the average.
    pub n_dates: usize,
    /// Dates skipped for insufficient or degenerate cross-sections.
    pub n_skipped: usize,
}

/// Runs the Fama–MacBeth test of one factor against the forward return.
///
/// # Errors
///
/// [`SagresError::InsufficientData`] when no date at all yields a usable
/// cross-section; per-date insufficiency is merely counted in `n_skipped`.
pub fn fama_macbeth(
    factors: &FactorTable,
    factor_name: &str,
    config: &FamaMacbethConfig,
) -> Result<FamaMacbethSummary> {
    if !factors.has_factor(factor_name) {
        return Err(SagresError::InvalidData(format!(
            "{factor_name} is not a factor column"
        )));
    }
    let view = TableView::new(factors, &[factor_name])?;

    let mut slopes = Vec::with_capacity(view.n_dates());
    let mut n_skipped = 0usize;

    for date_idx in 0..view.n_dates() {
        let mut x = Vec::new();
        let mut y = Vec::new();
        for &row in view.rows(date_idx) {
            if let (Some(f), Some(r)) = (
                view.value(factor_name, row),
                view.value(sagres_traits::columns::PRED_RTN, row),
            ) {
                x.push(f);
                y.push(r);
            }
        }
        if x.len() < config.min_observations {
            n_skipped += 1;
            continue;
        }
        match ols(&y, &[&x]) {
            Some(coefs) => slopes.push(coefs[1]),
            None => n_skipped += 1,
        }
    }

    if slopes.is_empty() {
        return Err(SagresError::InsufficientData(format!(
            "no date has {} usable observations for {factor_name}",
            config.min_observations
        )));
    }

    let n = slopes.len();
    let mean = slopes.iter().sum::<f64>() / n as f64;
    let var = slopes.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / (n as f64 - 1.0).max(1.0);
    let se = (var / n as f64).sqrt();
    let t_stat = mean / se;

    let positive = slopes.iter().filter(|&&s| s > 0.0).count();
    let negative = slopes.iter().filter(|&&s| s < 0.0).count();

    Ok(FamaMacbethSummary {
        factor: factor_name.to_string(),
        mean_coef: mean,
        t_stat,
        pct_positive: positive as f64 / n as f64,
        pct_negative: negative as f64 / n as f64,
        n_dates: n,
        n_skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;
    use sagres_panel::date_series;
    use sagres_traits::{Date, columns};

    /// Builds a factor table where `pred_rtn = slope * factor + noise`.
    fn synthetic(slope: f64, n_dates: usize, n_stocks: usize, noise_scale: f64) -> FactorTable {
        // Deterministic pseudo-noise, cheap LCG so the test has no RNG dep.
        let mut state = 0x2545_f491u64;
        let mut noise = move || {
            state = state.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
            ((state >> 33) as f64 / (u32::MAX as f64) - 0.5) * noise_scale
        };

        let mut stocks = Vec::new();
        let mut dates = Vec::new();
        let mut pred = Vec::new();
        let mut fac = Vec::new();
        let start = Date::from_ymd_opt(2018, 1, 5).unwrap();
        for d in 0..n_dates {
            let date = start + chrono::Duration::weeks(d as i64);
            for s in 0..n_stocks {
                let factor = (s as f64 / n_stocks as f64) - 0.5 + noise();
                stocks.push(format!("S{s:04}"));
                dates.push(date);
                fac.push(factor);
                pred.push(slope * factor + noise());
            }
        }

        let n = stocks.len();
        let df = DataFrame::new(vec![
            Series::new(columns::STOCK_ID.into(), stocks).into_column(),
            date_series(columns::DATE, dates).into_column(),
            Series::new(columns::PRED_RTN.into(), pred).into_column(),
            Series::new(columns::FAC_RET.into(), fac).into_column(),
            Series::new(columns::FAC_SIZE.into(), vec![1.0; n]).into_column(),
            Series::new(columns::FAC_BM.into(), vec![1.0; n]).into_column(),
        ])
        .unwrap();
        FactorTable::new(df).unwrap()
    }

    #[test]
    fn test_recovers_positive_slope_with_significant_t() {
        let factors = synthetic(2.0, 120, 200, 0.2);
        let summary =
            fama_macbeth(&factors, columns::FAC_RET, &FamaMacbethConfig::default()).unwrap();

        assert!(summary.mean_coef > 1.0, "mean_coef = {}", summary.mean_coef);
        assert!(summary.t_stat > 2.0, "t_stat = {}", summary.t_stat);
        assert!(summary.pct_positive > 0.9);
        assert_eq!(summary.n_dates, 120);
        assert_eq!(summary.n_skipped, 0);
    }

    #[test]
    fn test_recovers_negative_slope() {
        let factors = synthetic(-2.0, 120, 200, 0.2);
        let summary =
            fama_macbeth(&factors, columns::FAC_RET, &FamaMacbethConfig::default()).unwrap();

        assert!(summary.mean_coef < -1.0);
        assert!(summary.t_stat < -2.0);
        assert!(summary.pct_negative > 0.9);
    }

    #[test]
    fn test_thin_dates_are_skipped_not_zero_filled() {
        let factors = synthetic(2.0, 10, 5, 0.1);
        let config = FamaMacbethConfig {
            min_observations: 10,
        };
        let err = fama_macbeth(&factors, columns::FAC_RET, &config).unwrap_err();
        assert!(matches!(err, SagresError::InsufficientData(_)));

        let config = FamaMacbethConfig { min_observations: 3 };
        let summary = fama_macbeth(&factors, columns::FAC_RET, &config).unwrap();
        assert_eq!(summary.n_dates, 10);
    }

    #[test]
    fn test_degenerate_factor_counts_as_skipped() {
        // fac_size is constant: the per-date regression is singular.
        let factors = synthetic(2.0, 6, 30, 0.1);
        let config = FamaMacbethConfig { min_observations: 5 };
        let err = fama_macbeth(&factors, columns::FAC_SIZE, &config).unwrap_err();
        assert!(matches!(err, SagresError::InsufficientData(_)));
    }

    #[test]
    fn test_unknown_factor_rejected() {
        let factors = synthetic(1.0, 3, 10, 0.1);
        let err =
            fama_macbeth(&factors, "fac_quality", &FamaMacbethConfig::default()).unwrap_err();
        assert!(matches!(err, SagresError::InvalidData(_)));
    }
}

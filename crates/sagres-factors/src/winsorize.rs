//! Per-date cross-sectional winsorization.

use std::collections::BTreeMap;

use polars::prelude::*;
use sagres_traits::{FactorTable, Result, SagresError, columns};
use serde::{Deserialize, Serialize};

/// Configuration for factor winsorization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WinsorizeConfig {
    /// Lower percentile bound in [0, 1).
    pub lower_pct: f64,
    /// Upper percentile bound in (0, 1].
    pub upper_pct: f64,
    /// Dates with fewer non-null observations than this are left unchanged.
    /// A date with no observations at all is always skipped, whatever the
    /// configured minimum: an empty cross-section has no quantiles.
    pub min_observations: usize,
}

impl Default for WinsorizeConfig {
    fn default() -> Self {
        Self {
            lower_pct: 0.01,
            upper_pct: 0.99,
            min_observations: 20,
        }
    }
}

/// What a winsorization pass did, date by date.
///
/// Skipped dates are a non-fatal condition: the factor values on those dates
/// pass through unchanged, and the caller decides whether the skip count is
/// acceptable. Silence is not an option here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WinsorizeReport {
    /// Dates whose cross-section was clipped.
    pub dates_clipped: usize,
    /// Dates left unchanged for lack of observations.
    pub dates_skipped: usize,
    /// Individual values moved to a bound.
    pub values_clipped: usize,
}

/// Linear-interpolation quantile of an ascending-sorted slice.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        let w = pos - lo as f64;
        sorted[lo] * (1.0 - w) + sorted[hi] * w
    }
}

/// Clips one factor's cross-sectional tails, independently within each date.
///
/// Values below the date's lower-percentile bound are raised to it, values
/// above the upper bound lowered to it. Null cells stay null. Clipping never
/// crosses dates: the whole point of the factor table is cross-sectional
/// comparability within a date.
///
/// The transform is idempotent per date, since clipped values already lie
/// inside the bounds they produced.
///
/// # Errors
///
/// [`SagresError::InvalidData`] if `factor_name` is not a factor column of
/// the table or the percentile bounds are malformed.
pub fn winsorize(
    factors: &FactorTable,
    factor_name: &str,
    config: &WinsorizeConfig,
) -> Result<(FactorTable, WinsorizeReport)> {
    if !factors.has_factor(factor_name) {
        return Err(SagresError::InvalidData(format!(
            "{factor_name} is not a factor column"
        )));
    }
    if !(0.0..1.0).contains(&config.lower_pct)
        || !(0.0..=1.0).contains(&config.upper_pct)
        || config.lower_pct >= config.upper_pct
    {
        return Err(SagresError::InvalidData(format!(
            "bad percentile bounds: {} / {}",
            config.lower_pct, config.upper_pct
        )));
    }

    let df = factors.data();
    let dates_s = df
        .column(columns::DATE)?
        .as_materialized_series()
        .cast(&DataType::Date)?;
    let dates = dates_s.date()?;
    let values_s = df.column(factor_name)?.as_materialized_series();
    let values = values_s.f64()?;

    let mut out: Vec<Option<f64>> = values.into_iter().collect();

    // Row indices per date; BTreeMap for deterministic date order.
    let mut by_date: BTreeMap<i32, Vec<usize>> = BTreeMap::new();
    for (idx, d) in dates.into_iter().enumerate() {
        let Some(d) = d else {
            return Err(SagresError::InvalidData("null date in factor table".to_string()));
        };
        by_date.entry(d).or_default().push(idx);
    }

    let mut report = WinsorizeReport::default();
    for rows in by_date.values() {
        let mut observed: Vec<f64> = rows.iter().filter_map(|&i| out[i]).collect();
        if observed.len() < config.min_observations.max(1) {
            report.dates_skipped += 1;
            continue;
        }
        observed.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let lower = quantile(&observed, config.lower_pct);
        let upper = quantile(&observed, config.upper_pct);

        for &i in rows {
            if let Some(v) = out[i] {
                if v < lower {
                    out[i] = Some(lower);
                    report.values_clipped += 1;
                } else if v > upper {
                    out[i] = Some(upper);
                    report.values_clipped += 1;
                }
            }
        }
        report.dates_clipped += 1;
    }

    let mut clipped = df.clone();
    clipped.with_column(Series::new(factor_name.into(), out))?;
    Ok((FactorTable::new(clipped)?, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use sagres_panel::date_series;
    use sagres_traits::Date;

    /// One date, `values` as fac_size; second date with a tiny cross-section.
    fn table(values: &[f64], small_date_values: &[f64]) -> FactorTable {
        let n = values.len() + small_date_values.len();
        let d1 = Date::from_ymd_opt(2019, 10, 18).unwrap();
        let d2 = Date::from_ymd_opt(2019, 10, 25).unwrap();
        let mut dates = vec![d1; values.len()];
        dates.extend(vec![d2; small_date_values.len()]);
        let stocks: Vec<String> = (0..n).map(|i| format!("S{i:03}")).collect();
        let mut size: Vec<f64> = values.to_vec();
        size.extend_from_slice(small_date_values);

        let df = DataFrame::new(vec![
            Series::new(columns::STOCK_ID.into(), stocks).into_column(),
            date_series(columns::DATE, dates).into_column(),
            Series::new(columns::PRED_RTN.into(), vec![0.01; n]).into_column(),
            Series::new(columns::FAC_RET.into(), vec![0.0; n]).into_column(),
            Series::new(columns::FAC_SIZE.into(), size).into_column(),
            Series::new(columns::FAC_BM.into(), vec![1.0; n]).into_column(),
        ])
        .unwrap();
        FactorTable::new(df).unwrap()
    }

    fn column(table: &FactorTable, name: &str) -> Vec<Option<f64>> {
        table
            .data()
            .column(name)
            .unwrap()
            .as_materialized_series()
            .f64()
            .unwrap()
            .into_iter()
            .collect()
    }

    #[test]
    fn test_tails_are_clipped() {
        // 101 evenly spaced values: 10%/90% bounds land on 10.0 and 90.0.
        let values: Vec<f64> = (0..=100).map(f64::from).collect();
        let factors = table(&values, &[]);
        let config = WinsorizeConfig {
            lower_pct: 0.1,
            upper_pct: 0.9,
            min_observations: 20,
        };

        let (clipped, report) = winsorize(&factors, columns::FAC_SIZE, &config).unwrap();
        let out = column(&clipped, columns::FAC_SIZE);
        assert_relative_eq!(out[0].unwrap(), 10.0);
        assert_relative_eq!(out[100].unwrap(), 90.0);
        assert_relative_eq!(out[50].unwrap(), 50.0);
        assert_eq!(report.dates_clipped, 1);
        assert_eq!(report.values_clipped, 20);
    }

    #[test]
    fn test_idempotent_within_date() {
        let values: Vec<f64> = (0..=100).map(|i| f64::from(i) * 0.37 - 11.0).collect();
        let factors = table(&values, &[]);
        let config = WinsorizeConfig::default();

        let (once, _) = winsorize(&factors, columns::FAC_SIZE, &config).unwrap();
        let (twice, report) = winsorize(&once, columns::FAC_SIZE, &config).unwrap();
        assert_eq!(
            column(&once, columns::FAC_SIZE),
            column(&twice, columns::FAC_SIZE)
        );
        assert_eq!(report.values_clipped, 0);
    }

    #[test]
    fn test_small_dates_left_unchanged() {
        let values: Vec<f64> = (0..=100).map(f64::from).collect();
        let small = [1000.0, -1000.0, 3.0];
        let factors = table(&values, &small);

        let (clipped, report) =
            winsorize(&factors, columns::FAC_SIZE, &WinsorizeConfig::default()).unwrap();
        let out = column(&clipped, columns::FAC_SIZE);
        // The under-populated date keeps its outliers verbatim.
        assert_relative_eq!(out[101].unwrap(), 1000.0);
        assert_relative_eq!(out[102].unwrap(), -1000.0);
        assert_eq!(report.dates_skipped, 1);
        assert_eq!(report.dates_clipped, 1);
    }

    #[test]
    fn test_other_columns_untouched() {
        let values: Vec<f64> = (0..=100).map(f64::from).collect();
        let factors = table(&values, &[]);
        let (clipped, _) =
            winsorize(&factors, columns::FAC_SIZE, &WinsorizeConfig::default()).unwrap();
        assert_eq!(column(&factors, columns::FAC_BM), column(&clipped, columns::FAC_BM));
        assert_eq!(
            column(&factors, columns::PRED_RTN),
            column(&clipped, columns::PRED_RTN)
        );
    }

    #[test]
    fn test_all_null_date_skipped_even_with_zero_minimum() {
        // Second date has rows but every factor cell is null; a zero minimum
        // must not let it through to quantile computation.
        let d1 = Date::from_ymd_opt(2019, 10, 18).unwrap();
        let d2 = Date::from_ymd_opt(2019, 10, 25).unwrap();
        let mut dates = vec![d1; 30];
        dates.extend(vec![d2; 3]);
        let stocks: Vec<String> = (0..33).map(|i| format!("S{i:03}")).collect();
        let mut size: Vec<Option<f64>> = (0..30).map(|i| Some(f64::from(i))).collect();
        size.extend(vec![None; 3]);

        let df = DataFrame::new(vec![
            Series::new(columns::STOCK_ID.into(), stocks).into_column(),
            date_series(columns::DATE, dates).into_column(),
            Series::new(columns::PRED_RTN.into(), vec![0.01; 33]).into_column(),
            Series::new(columns::FAC_RET.into(), vec![0.0; 33]).into_column(),
            Series::new(columns::FAC_SIZE.into(), size).into_column(),
            Series::new(columns::FAC_BM.into(), vec![1.0; 33]).into_column(),
        ])
        .unwrap();
        let factors = FactorTable::new(df).unwrap();

        let config = WinsorizeConfig {
            lower_pct: 0.01,
            upper_pct: 0.99,
            min_observations: 0,
        };
        let (clipped, report) = winsorize(&factors, columns::FAC_SIZE, &config).unwrap();
        assert_eq!(report.dates_skipped, 1);
        assert_eq!(report.dates_clipped, 1);
        assert!(column(&clipped, columns::FAC_SIZE)[30].is_none());
    }

    #[test]
    fn test_non_factor_column_rejected() {
        let factors = table(&[1.0; 30], &[]);
        let err = winsorize(&factors, columns::PRED_RTN, &WinsorizeConfig::default()).unwrap_err();
        assert!(matches!(err, SagresError::InvalidData(_)));
    }

    #[test]
    fn test_bad_bounds_rejected() {
        let factors = table(&[1.0; 30], &[]);
        let config = WinsorizeConfig {
            lower_pct: 0.9,
            upper_pct: 0.1,
            min_observations: 5,
        };
        let err = winsorize(&factors, columns::FAC_SIZE, &config).unwrap_err();
        assert!(matches!(err, SagresError::InvalidData(_)));
    }
}

//! Performance statistics for backtested return series.

use std::str::FromStr;

use sagres_traits::{Date, Result, SagresError};
use serde::{Deserialize, Serialize};

use crate::selection::BacktestSeries;

/// Business days per year.
pub const BDAYS_PER_YEAR: f64 = 252.0;
/// Business days per quarter.
pub const BDAYS_PER_QTR: f64 = 63.0;
/// Business days per month.
pub const BDAYS_PER_MONTH: f64 = 21.0;
/// Business days per week.
pub const BDAYS_PER_WEEK: f64 = 5.0;
/// Months per year.
pub const MONTHS_PER_YEAR: f64 = 12.0;
/// Quarters per year.
pub const QTRS_PER_YEAR: f64 = 4.0;
/// Weeks per year.
pub const WEEKS_PER_YEAR: f64 = 52.0;

/// Observation-frequency label resolving the `period_days` scaling constant.
///
/// The plain variants scale one observation to the named horizon in business
/// days; the `*ToYearly` variants convert a coarser observation frequency to
/// yearly terms (e.g. weekly observations annualize with 52).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    /// Daily observations annualized over 252 business days.
    Yearly,
    /// Scaled to one quarter (63 business days).
    Quarterly,
    /// Scaled to one month (21 business days).
    Monthly,
    /// Scaled to one week (5 business days).
    Weekly,
    /// No scaling.
    Daily,
    /// Monthly observations to yearly terms (12).
    MonthlyToYearly,
    /// Quarterly observations to yearly terms (4).
    QuarterlyToYearly,
    /// Weekly observations to yearly terms (52).
    WeeklyToYearly,
}

impl Frequency {
    /// The scaling constant for this label.
    #[must_use]
    pub const fn period_days(self) -> f64 {
        match self {
            Self::Yearly => BDAYS_PER_YEAR,
            Self::Quarterly => BDAYS_PER_QTR,
            Self::Monthly => BDAYS_PER_MONTH,
            Self::Weekly => BDAYS_PER_WEEK,
            Self::Daily => 1.0,
            Self::MonthlyToYearly => MONTHS_PER_YEAR,
            Self::QuarterlyToYearly => QTRS_PER_YEAR,
            Self::WeeklyToYearly => WEEKS_PER_YEAR,
        }
    }
}

impl FromStr for Frequency {
    type Err = SagresError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "yearly" => Ok(Self::Yearly),
            "quarterly" => Ok(Self::Quarterly),
            "monthly" => Ok(Self::Monthly),
            "weekly" => Ok(Self::Weekly),
            "daily" => Ok(Self::Daily),
            "monthly2yearly" => Ok(Self::MonthlyToYearly),
            "quarterly2yearly" => Ok(Self::QuarterlyToYearly),
            "weekly2yearly" => Ok(Self::WeeklyToYearly),
            other => Err(SagresError::UnknownFrequency(other.to_string())),
        }
    }
}

/// Sample standard deviation (ddof 1).
fn std_sample(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return f64::NAN;
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64).sqrt()
}

/// Population standard deviation (ddof 0).
fn std_population(values: &[f64]) -> f64 {
    let n = values.len();
    if n == 0 {
        return f64::NAN;
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64).sqrt()
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Annualized (or otherwise scaled) return and volatility.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnualInfo {
    /// `(1 + total_return)^(period_days / n) - 1`.
    pub annual_return: f64,
    /// Sample std of per-period returns × `sqrt(period_days)`.
    pub annual_volatility: f64,
}

/// Computes scaled total return and volatility for a return series.
///
/// # Errors
///
/// [`SagresError::InsufficientData`] on an empty series.
pub fn annual_info(returns: &[f64], freq: Frequency) -> Result<AnnualInfo> {
    if returns.is_empty() {
        return Err(SagresError::InsufficientData(
            "empty return series".to_string(),
        ));
    }
    let period_days = freq.period_days();
    let total: f64 = returns.iter().map(|r| 1.0 + r).product();
    Ok(AnnualInfo {
        annual_return: total.powf(period_days / returns.len() as f64) - 1.0,
        annual_volatility: std_sample(returns) * period_days.sqrt(),
    })
}

/// Scaled Sharpe ratio: `(mean - risk_free) * sqrt(period_days) / std`.
///
/// A zero-variance series yields a non-finite ratio; degenerate inputs are
/// surfaced, not masked as zero.
#[must_use]
pub fn sharpe_ratio(returns: &[f64], risk_free: f64, freq: Frequency) -> f64 {
    if returns.is_empty() {
        return f64::NAN;
    }
    (mean(returns) - risk_free) * freq.period_days().sqrt() / std_sample(returns)
}

/// Scaled Sortino ratio: excess return over the downside deviation.
///
/// The denominator is the population std of the strictly negative returns
/// only. With no negative returns the ratio is non-finite.
#[must_use]
pub fn sortino_ratio(returns: &[f64], minimum_acceptable_return: f64, freq: Frequency) -> f64 {
    if returns.is_empty() {
        return f64::NAN;
    }
    let downside: Vec<f64> = returns.iter().copied().filter(|r| *r < 0.0).collect();
    (mean(returns) - minimum_acceptable_return) * freq.period_days().sqrt()
        / std_population(&downside)
}

/// Maximum drawdown with peak/trough attribution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaxDrawdown {
    /// Largest `(peak - wealth) / peak` over the series.
    pub max_drawdown: f64,
    /// Index of the peak the drawdown fell from (first occurrence).
    pub start: usize,
    /// Index of the trough attaining the drawdown (first occurrence).
    pub end: usize,
}

/// Computes the maximum drawdown of a return series.
///
/// Wealth is compounded from the returns; the drawdown at each point is the
/// fractional loss from the running peak. The end is the first index
/// attaining the maximum drawdown, the start is the first index whose wealth
/// equals the peak in force at the end.
///
/// # Errors
///
/// [`SagresError::InsufficientData`] on an empty series.
pub fn maximum_drawdown(returns: &[f64]) -> Result<MaxDrawdown> {
    if returns.is_empty() {
        return Err(SagresError::InsufficientData(
            "empty return series".to_string(),
        ));
    }

    let mut wealth = Vec::with_capacity(returns.len());
    let mut acc = 1.0;
    for r in returns {
        acc *= 1.0 + r;
        wealth.push(acc);
    }

    let mut peaks = Vec::with_capacity(wealth.len());
    let mut peak = f64::MIN;
    for &w in &wealth {
        peak = peak.max(w);
        peaks.push(peak);
    }

    let drawdowns: Vec<f64> = wealth
        .iter()
        .zip(&peaks)
        .map(|(w, p)| (p - w) / p)
        .collect();

    let max_drawdown = drawdowns.iter().copied().fold(f64::MIN, f64::max);
    // First chronological occurrence wins both attributions.
    let end = drawdowns
        .iter()
        .position(|&d| d == max_drawdown)
        .unwrap_or(0);
    let start = wealth
        .iter()
        .position(|&w| w == peaks[end])
        .unwrap_or(end);

    Ok(MaxDrawdown {
        max_drawdown,
        start,
        end,
    })
}

/// Full evaluation of a backtested return series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evaluation {
    /// Scaled total return.
    pub annual_return: f64,
    /// Scaled volatility.
    pub annual_volatility: f64,
    /// Scaled Sharpe ratio.
    pub sharpe_ratio: f64,
    /// Scaled Sortino ratio.
    pub sortino_ratio: f64,
    /// Maximum drawdown depth.
    pub max_drawdown: f64,
    /// Date of the drawdown's peak.
    pub max_drawdown_start: Date,
    /// Date of the drawdown's trough.
    pub max_drawdown_end: Date,
}

/// Evaluates a backtest series at the given frequency.
///
/// # Errors
///
/// [`SagresError::InsufficientData`] on an empty series.
pub fn evaluate(series: &BacktestSeries, freq: Frequency, risk_free: f64) -> Result<Evaluation> {
    let info = annual_info(&series.returns, freq)?;
    let dd = maximum_drawdown(&series.returns)?;
    Ok(Evaluation {
        annual_return: info.annual_return,
        annual_volatility: info.annual_volatility,
        sharpe_ratio: sharpe_ratio(&series.returns, risk_free, freq),
        sortino_ratio: sortino_ratio(&series.returns, risk_free, freq),
        max_drawdown: dd.max_drawdown,
        max_drawdown_start: series.dates[dd.start],
        max_drawdown_end: series.dates[dd.end],
    })
}

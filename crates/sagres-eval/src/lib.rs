#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Factor testing and backtest evaluation.
//!
//! This crate answers the question the rest of the pipeline exists to pose:
//! does a factor predict forward returns? It provides
//!
//! - Fama–MacBeth cross-sectional regression ([`fama_macbeth`]),
//! - quantile-group return analysis ([`group_return_analysis`]),
//! - top-N stock-selection backtests over single factors, score
//!   combinations, and regression combinations ([`backtest_top_n`]),
//! - performance statistics with drawdown attribution ([`evaluate`]).

mod view;

pub mod fama_macbeth;
pub mod grouping;
pub mod metrics;
pub mod ols;
pub mod selection;

pub use fama_macbeth::{FamaMacbethConfig, FamaMacbethSummary, fama_macbeth};
pub use grouping::{GroupReturns, group_return_analysis};
pub use metrics::{
    AnnualInfo, Evaluation, Frequency, MaxDrawdown, annual_info, evaluate, maximum_drawdown,
    sharpe_ratio, sortino_ratio,
};
pub use ols::ols;
pub use selection::{BacktestConfig, BacktestSeries, ScoreTerm, Selection, backtest_top_n};

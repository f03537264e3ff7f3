#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! # sagres
//!
//! Factor research pipeline for equity return prediction.
//!
//! sagres is an umbrella crate that re-exports the sagres sub-crates for
//! convenience. The pipeline runs in three stages:
//!
//! 1. **Panel alignment** ([`panel`]) turns long-format market data into
//!    date-by-stock grids and computes tradability-aware forward returns.
//! 2. **Factor construction** ([`factors`]) builds the factor table
//!    (trailing return, log size, book-to-market) and winsorizes the
//!    cross-sections.
//! 3. **Evaluation** ([`eval`]) tests factors with Fama-MacBeth
//!    regressions, quantile-group analysis, and top-N selection backtests.
//!
//! ## Quick Start
//!
//! ```ignore
//! use sagres::factors::{compute_factors, winsorize, WinsorizeConfig};
//! use sagres::eval::{fama_macbeth, FamaMacbethConfig};
//! use sagres::columns;
//!
//! # fn main() -> sagres::Result<()> {
//! let table = compute_factors(&prices, &equity, &ohlcv)?;
//! let (table, _) = winsorize(&table, columns::FAC_BM, &WinsorizeConfig::default())?;
//! let summary = fama_macbeth(&table, columns::FAC_BM, &FamaMacbethConfig::default())?;
//! println!("t = {:.2}", summary.t_stat);
//! # Ok(())
//! # }
//! ```
//!
//! ## Crate Organization
//!
//! - [`traits`] - Shared types, column names, and the error taxonomy
//! - [`panel`] - Date-by-stock panels, report-period mapping, forward returns
//! - [`factors`] - Factor table construction and winsorization
//! - [`eval`] - Significance tests, group analysis, backtests, metrics

/// Version information for the sagres crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Shared types, column names, and the error taxonomy.
pub mod traits {
    pub use sagres_traits::*;
}

pub use sagres_traits::{Result, SagresError};
pub use sagres_traits::{Date, FactorTable, StockId, columns};

/// Panel alignment and forward-return construction.
pub mod panel {
    pub use sagres_panel::*;
}

/// Factor table construction and cross-sectional winsorization.
pub mod factors {
    pub use sagres_factors::*;
}

/// Factor testing, backtesting, and performance metrics.
pub mod eval {
    pub use sagres_eval::*;
}

/// Prelude module for convenient imports.
///
/// ```ignore
/// use sagres::prelude::*;
/// ```
pub mod prelude {
    pub use crate::eval::{
        BacktestConfig, FamaMacbethConfig, Frequency, Selection, backtest_top_n, evaluate,
        fama_macbeth, group_return_analysis,
    };
    pub use crate::factors::{WinsorizeConfig, compute_factors, winsorize};
    pub use crate::{Date, FactorTable, Result, SagresError, columns};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
        let parts: Vec<&str> = VERSION.split('.').collect();
        assert!(parts.len() >= 2, "Version should have at least major.minor");
    }

    #[test]
    fn test_re_exports() {
        let _result: Result<()> = Ok(());
        let _error: SagresError = SagresError::InvalidData("test".to_string());
        assert_eq!(columns::FACTORS.len(), 3);
    }
}

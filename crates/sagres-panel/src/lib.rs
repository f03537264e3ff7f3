#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Panel alignment for the sagres pipeline.
//!
//! This crate reshapes long-format per-stock-per-date records into wide
//! date × stock grids and back, merges tables keyed by (stock, date) or
//! (stock, report period), maps calendar dates to disclosed fundamental
//! report periods, and builds the tradability-aware two-period forward
//! return that the rest of the pipeline predicts.

pub mod forward;
pub mod merge;
pub mod panel;
pub mod report_period;

pub use forward::{OhlcvPanels, forward_returns};
pub use merge::left_join;
pub use panel::{Panel, date_from_days, date_series, days_from_date};
pub use report_period::period_for;

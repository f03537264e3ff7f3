#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Factor construction and winsorization.
//!
//! [`compute_factors`] aligns the three raw input tables onto a common
//! stock × date grid and derives the momentum, size, and book-to-market
//! factors alongside the forward return. [`winsorize`] clips a factor's
//! cross-sectional tails independently within each date.

pub mod engine;
pub mod winsorize;

pub use engine::compute_factors;
pub use winsorize::{WinsorizeConfig, WinsorizeReport, winsorize};

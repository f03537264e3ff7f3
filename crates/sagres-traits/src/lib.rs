#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Core types and errors for the sagres factor research pipeline.
//!
//! This crate defines the shared vocabulary of the workspace: the
//! [`SagresError`] taxonomy, the [`FactorTable`] snapshot wrapper, and the
//! column names every stage of the pipeline agrees on.

/// The version of the sagres-traits crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod error;
pub mod types;

pub use error::{Result, SagresError};
pub use types::{Date, FactorTable, StockId, columns};

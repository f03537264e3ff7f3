//! Common types used throughout the sagres pipeline.

use crate::error::{Result, SagresError};
use polars::prelude::*;

// Re-export date type from chrono
pub use chrono::NaiveDate as Date;

/// A stock identifier, e.g. an exchange ticker such as "600000.SH".
pub type StockId = String;

/// Column names of the persisted factor-table snapshot.
///
/// Every stage downstream of factor construction keys on these names, so
/// they live here rather than as string literals scattered across crates.
pub mod columns {
    /// Stock identifier column.
    pub const STOCK_ID: &str = "stock_id";
    /// Trading date column (the week's closing date).
    pub const DATE: &str = "date";
    /// Two-period-ahead forward return, the prediction target.
    pub const PRED_RTN: &str = "pred_rtn";
    /// Weekly close-to-close return factor.
    pub const FAC_RET: &str = "fac_ret";
    /// Log market value factor.
    pub const FAC_SIZE: &str = "fac_size";
    /// Book-to-market factor.
    pub const FAC_BM: &str = "fac_bm";

    /// The three raw factor columns, in canonical order.
    pub const FACTORS: [&str; 3] = [FAC_RET, FAC_SIZE, FAC_BM];

    /// The full snapshot schema, in canonical order.
    pub const ALL: [&str; 6] = [STOCK_ID, DATE, PRED_RTN, FAC_RET, FAC_SIZE, FAC_BM];
}

/// A validated factor-table snapshot.
///
/// `FactorTable` wraps a Polars DataFrame holding one row per (stock, date)
/// with the forward return and the raw or winsorized factor values. The
/// constructor enforces the snapshot schema; the forward-return column is
/// never null in a persisted table (rows with an undefined forward return
/// are dropped at construction time by the factor engine).
///
/// # Example
///
/// ```no_run
/// use sagres_traits::FactorTable;
/// use polars::prelude::*;
///
/// let df = df! {
///     "stock_id" => &["600000.SH"],
///     "date" => &[19723i32],
///     "pred_rtn" => &[0.01],
///     "fac_ret" => &[0.02],
///     "fac_size" => &[9.5],
///     "fac_bm" => &[0.8],
/// }.unwrap();
///
/// let factors = FactorTable::new(df).unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct FactorTable {
    data: DataFrame,
}

impl FactorTable {
    /// Creates a new `FactorTable`, validating the snapshot schema.
    ///
    /// # Errors
    ///
    /// Returns [`SagresError::MissingColumn`] if any of the six snapshot
    /// columns is absent.
    pub fn new(data: DataFrame) -> Result<Self> {
        for col in columns::ALL {
            if data.column(col).is_err() {
                return Err(SagresError::MissingColumn(col.to_string()));
            }
        }
        Ok(Self { data })
    }

    /// Returns a reference to the underlying DataFrame.
    pub const fn data(&self) -> &DataFrame {
        &self.data
    }

    /// Consumes self and returns the underlying DataFrame.
    pub fn into_inner(self) -> DataFrame {
        self.data
    }

    /// Returns the number of (stock, date) rows.
    pub fn len(&self) -> usize {
        self.data.height()
    }

    /// Returns whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Checks whether `name` is one of the factor columns of this table.
    pub fn has_factor(&self, name: &str) -> bool {
        columns::FACTORS.contains(&name)
    }
}

impl AsRef<DataFrame> for FactorTable {
    fn as_ref(&self) -> &DataFrame {
        &self.data
    }
}

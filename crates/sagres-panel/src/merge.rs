//! Keyed left joins with duplicate-key detection.

use polars::prelude::*;
use sagres_traits::{Result, SagresError};

/// Left-joins `right` onto `left` over the given key columns.
///
/// Standard relational semantics: unmatched left rows keep all left columns
/// and receive nulls for right columns. The right table's keys must be
/// unique: a duplicate would fan a left row out into several, which is an
/// input-data error here, so it is surfaced rather than deduplicated.
///
/// # Errors
///
/// [`SagresError::MissingColumn`] if a key column is absent from either
/// side; [`SagresError::DuplicateKey`] if the right table repeats a key.
pub fn left_join(
    left: &DataFrame,
    right: &DataFrame,
    keys: &[&str],
    right_name: &str,
) -> Result<DataFrame> {
    for key in keys {
        if left.column(key).is_err() || right.column(key).is_err() {
            return Err(SagresError::MissingColumn((*key).to_string()));
        }
    }

    let key_exprs: Vec<Expr> = keys.iter().map(|k| col(*k)).collect();

    let dups = right
        .clone()
        .lazy()
        .group_by(key_exprs.clone())
        .agg([len().alias("__n")])
        .filter(col("__n").gt(lit(1u32)))
        .collect()?;
    if dups.height() > 0 {
        return Err(SagresError::DuplicateKey {
            table: right_name.to_string(),
            detail: format!(
                "{} key combination(s) over ({}) occur more than once",
                dups.height(),
                keys.join(", ")
            ),
        });
    }

    let merged = left
        .clone()
        .lazy()
        .join(
            right.clone().lazy(),
            key_exprs.clone(),
            key_exprs,
            JoinArgs::new(JoinType::Left),
        )
        .collect()?;
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn left_df() -> DataFrame {
        df! {
            "stock_id" => &["A", "B", "C"],
            "x" => &[1.0, 2.0, 3.0],
        }
        .unwrap()
    }

    #[test]
    fn test_left_join_keeps_unmatched_rows() {
        let right = df! {
            "stock_id" => &["A", "C"],
            "y" => &[10.0, 30.0],
        }
        .unwrap();

        let merged = left_join(&left_df(), &right, &["stock_id"], "right").unwrap();
        assert_eq!(merged.height(), 3);

        let y = merged.column("y").unwrap().as_materialized_series();
        let y = y.f64().unwrap();
        assert_eq!(y.get(0), Some(10.0));
        assert_eq!(y.get(1), None); // B unmatched, null right column
        assert_eq!(y.get(2), Some(30.0));
    }

    #[test]
    fn test_left_join_duplicate_right_key_is_error() {
        let right = df! {
            "stock_id" => &["A", "A"],
            "y" => &[10.0, 11.0],
        }
        .unwrap();

        let err = left_join(&left_df(), &right, &["stock_id"], "equity").unwrap_err();
        assert!(matches!(err, SagresError::DuplicateKey { table, .. } if table == "equity"));
    }

    #[test]
    fn test_left_join_missing_key_column() {
        let right = df! {
            "code" => &["A"],
            "y" => &[10.0],
        }
        .unwrap();

        let err = left_join(&left_df(), &right, &["stock_id"], "right").unwrap_err();
        assert!(matches!(err, SagresError::MissingColumn(c) if c == "stock_id"));
    }

    #[test]
    fn test_left_join_composite_key() {
        let left = df! {
            "stock_id" => &["A", "A", "B"],
            "date" => &[1i32, 2, 1],
            "x" => &[1.0, 2.0, 3.0],
        }
        .unwrap();
        let right = df! {
            "stock_id" => &["A", "B"],
            "date" => &[2i32, 1],
            "y" => &[20.0, 30.0],
        }
        .unwrap();

        let merged = left_join(&left, &right, &["stock_id", "date"], "right").unwrap();
        let y = merged.column("y").unwrap().as_materialized_series();
        let y = y.f64().unwrap();
        assert_eq!(y.get(0), None);
        assert_eq!(y.get(1), Some(20.0));
        assert_eq!(y.get(2), Some(30.0));
    }
}

//! Survivorship-safe forward-return construction.
//!
//! The prediction target is the return an investor could actually realize:
//! buy at the *next* period's open, exit one period after that. Cells where
//! the stock could not be traded at the entry open (suspended, or locked at
//! the up limit) are forced to zero, but only where the raw return exists;
//! a genuinely undefined cell stays undefined.

use ndarray::Array2;
use polars::prelude::*;
use sagres_traits::{Result, SagresError};

use crate::panel::Panel;

/// The five wide OHLCV panels, sharing one date × stock grid.
#[derive(Debug, Clone)]
pub struct OhlcvPanels {
    /// Opening price.
    pub open: Panel,
    /// Highest price.
    pub high: Panel,
    /// Lowest price.
    pub low: Panel,
    /// Closing price.
    pub close: Panel,
    /// Traded volume.
    pub volume: Panel,
}

impl OhlcvPanels {
    /// Pivots a long OHLCV frame into the five wide panels.
    ///
    /// All five panels are pivoted from the same rows, so they share axes:
    /// a (date, stock) key present in the frame appears on every grid, with
    /// null cells where the individual value was null.
    pub fn pivot(df: &DataFrame, date_col: &str, stock_col: &str) -> Result<Self> {
        Ok(Self {
            open: Panel::pivot(df, date_col, stock_col, "open")?,
            high: Panel::pivot(df, date_col, stock_col, "high")?,
            low: Panel::pivot(df, date_col, stock_col, "low")?,
            close: Panel::pivot(df, date_col, stock_col, "close")?,
            volume: Panel::pivot(df, date_col, stock_col, "volume")?,
        })
    }
}

/// Builds the two-period-ahead forward-return panel.
///
/// For each (date t, stock): raw return = `(open[t+2] - open[t+1]) / open[t+1]`,
/// undefined when either open is missing or the entry open is zero. Where the
/// raw return is defined, two overrides apply in order:
///
/// 1. volume at t+1 zero or missing → 0 (suspended, cannot trade);
/// 2. high[t+1] == low[t+1] and the close did not fall from t to t+1 → 0
///    (one-directional up-limit lock, cannot buy).
///
/// A missing close on either side of the t → t+1 comparison counts as no
/// evidence of a down move, so the cell is still treated as locked. The last
/// two dates have no t+1/t+2 and stay undefined; downstream stages drop them.
///
/// # Errors
///
/// Returns [`SagresError::InvalidData`] if the five panels do not share axes.
pub fn forward_returns(ohlcv: &OhlcvPanels) -> Result<Panel> {
    let open = &ohlcv.open;
    for panel in [&ohlcv.high, &ohlcv.low, &ohlcv.close, &ohlcv.volume] {
        if panel.dates() != open.dates() || panel.stocks() != open.stocks() {
            return Err(SagresError::InvalidData(
                "OHLCV panels do not share a common date x stock grid".to_string(),
            ));
        }
    }

    let (nd, ns) = (open.n_dates(), open.n_stocks());
    let mut values = Array2::from_elem((nd, ns), None);

    for t in 0..nd.saturating_sub(2) {
        for s in 0..ns {
            let raw = match (open.get(t + 1, s), open.get(t + 2, s)) {
                (Some(entry), Some(exit)) if entry != 0.0 => (exit - entry) / entry,
                _ => continue,
            };

            let suspended = match ohlcv.volume.get(t + 1, s) {
                None => true,
                Some(v) => v == 0.0,
            };
            if suspended {
                values[(t, s)] = Some(0.0);
                continue;
            }

            let flat_range = matches!(
                (ohlcv.high.get(t + 1, s), ohlcv.low.get(t + 1, s)),
                (Some(h), Some(l)) if h == l
            );
            let down_move = matches!(
                (ohlcv.close.get(t, s), ohlcv.close.get(t + 1, s)),
                (Some(prev), Some(next)) if next < prev
            );
            if flat_range && !down_move {
                values[(t, s)] = Some(0.0);
            } else {
                values[(t, s)] = Some(raw);
            }
        }
    }

    Panel::from_parts(open.dates().to_vec(), open.stocks().to_vec(), values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use sagres_traits::Date;

    fn dates(n: usize) -> Vec<Date> {
        (0..n)
            .map(|i| Date::from_ymd_opt(2020, 1, 3).unwrap() + chrono::Duration::weeks(i as i64))
            .collect()
    }

    fn panel(rows: Vec<Vec<Option<f64>>>) -> Panel {
        let nd = rows.len();
        let ns = rows[0].len();
        let stocks: Vec<String> = (0..ns).map(|i| format!("S{i}")).collect();
        let flat: Vec<Option<f64>> = rows.into_iter().flatten().collect();
        let values = Array2::from_shape_vec((nd, ns), flat).unwrap();
        Panel::from_parts(dates(nd), stocks, values).unwrap()
    }

    fn single_stock(
        open: &[Option<f64>],
        high: &[Option<f64>],
        low: &[Option<f64>],
        close: &[Option<f64>],
        volume: &[Option<f64>],
    ) -> OhlcvPanels {
        let col = |vals: &[Option<f64>]| panel(vals.iter().map(|v| vec![*v]).collect());
        OhlcvPanels {
            open: col(open),
            high: col(high),
            low: col(low),
            close: col(close),
            volume: col(volume),
        }
    }

    const V: Option<f64> = Some(1000.0);

    #[test]
    fn test_raw_forward_return() {
        let ohlcv = single_stock(
            &[Some(10.0), Some(11.0), Some(12.1), Some(13.0)],
            &[Some(10.5), Some(11.5), Some(12.5), Some(13.5)],
            &[Some(9.5), Some(10.5), Some(11.5), Some(12.5)],
            &[Some(10.2), Some(11.2), Some(12.2), Some(13.2)],
            &[V, V, V, V],
        );
        let fwd = forward_returns(&ohlcv).unwrap();

        // (open[2] - open[1]) / open[1]
        assert_relative_eq!(fwd.get(0, 0).unwrap(), (12.1 - 11.0) / 11.0);
        // Last two dates naturally undefined.
        assert!(fwd.get(2, 0).is_none());
        assert!(fwd.get(3, 0).is_none());
    }

    #[test]
    fn test_suspension_zeroes_defined_cells() {
        for entry_volume in [Some(0.0), None] {
            let ohlcv = single_stock(
                &[Some(10.0), Some(11.0), Some(12.1)],
                &[Some(10.5), Some(11.5), Some(12.5)],
                &[Some(9.5), Some(10.5), Some(11.5)],
                &[Some(10.2), Some(11.2), Some(12.2)],
                &[V, entry_volume, V],
            );
            let fwd = forward_returns(&ohlcv).unwrap();
            assert_relative_eq!(fwd.get(0, 0).unwrap(), 0.0);
        }
    }

    #[test]
    fn test_up_limit_lock_zeroes_defined_cells() {
        // Flat high/low at t+1 with close not below close[t]: locked at the
        // up limit, entry impossible.
        let ohlcv = single_stock(
            &[Some(10.0), Some(11.0), Some(12.1)],
            &[Some(10.5), Some(11.5), Some(12.5)],
            &[Some(9.5), Some(11.5), Some(11.5)],
            &[Some(10.2), Some(11.5), Some(12.2)],
            &[V, V, V],
        );
        let fwd = forward_returns(&ohlcv).unwrap();
        assert_relative_eq!(fwd.get(0, 0).unwrap(), 0.0);
    }

    #[test]
    fn test_down_limit_lock_keeps_raw_return() {
        // Flat range but the close fell: a down-limit lock does not prevent
        // buying, so the raw return stands.
        let ohlcv = single_stock(
            &[Some(10.0), Some(11.0), Some(12.1)],
            &[Some(10.5), Some(9.0), Some(12.5)],
            &[Some(9.5), Some(9.0), Some(11.5)],
            &[Some(10.2), Some(9.0), Some(12.2)],
            &[V, V, V],
        );
        let fwd = forward_returns(&ohlcv).unwrap();
        assert_relative_eq!(fwd.get(0, 0).unwrap(), (12.1 - 11.0) / 11.0);
    }

    #[test]
    fn test_unchanged_close_counts_as_locked() {
        // close[t+1] == close[t] with a flat range zeroes the cell. The
        // "not a down move" test is a known approximation of true limit-up
        // detection (a real check needs a price-change threshold); it is
        // reproduced as specified, not corrected.
        let ohlcv = single_stock(
            &[Some(10.0), Some(11.0), Some(12.1)],
            &[Some(10.5), Some(10.2), Some(12.5)],
            &[Some(9.5), Some(10.2), Some(11.5)],
            &[Some(10.2), Some(10.2), Some(12.2)],
            &[V, V, V],
        );
        let fwd = forward_returns(&ohlcv).unwrap();
        assert_relative_eq!(fwd.get(0, 0).unwrap(), 0.0);
    }

    #[test]
    fn test_missing_prior_close_counts_as_locked() {
        // No close[t] means no evidence of a down move; flat range zeroes.
        let ohlcv = single_stock(
            &[Some(10.0), Some(11.0), Some(12.1)],
            &[Some(10.5), Some(10.2), Some(12.5)],
            &[Some(9.5), Some(10.2), Some(11.5)],
            &[None, Some(10.2), Some(12.2)],
            &[V, V, V],
        );
        let fwd = forward_returns(&ohlcv).unwrap();
        assert_relative_eq!(fwd.get(0, 0).unwrap(), 0.0);
    }

    #[test]
    fn test_undefined_cells_never_fabricated() {
        // Missing entry open: no raw return, so neither override may
        // fabricate a zero.
        let ohlcv = single_stock(
            &[Some(10.0), None, Some(12.1)],
            &[Some(10.5), Some(11.5), Some(12.5)],
            &[Some(9.5), Some(10.5), Some(11.5)],
            &[Some(10.2), Some(11.2), Some(12.2)],
            &[V, Some(0.0), V],
        );
        let fwd = forward_returns(&ohlcv).unwrap();
        assert!(fwd.get(0, 0).is_none());
    }

    #[test]
    fn test_zero_entry_open_is_undefined() {
        let ohlcv = single_stock(
            &[Some(10.0), Some(0.0), Some(12.1)],
            &[Some(10.5), Some(11.5), Some(12.5)],
            &[Some(9.5), Some(10.5), Some(11.5)],
            &[Some(10.2), Some(11.2), Some(12.2)],
            &[V, V, V],
        );
        let fwd = forward_returns(&ohlcv).unwrap();
        assert!(fwd.get(0, 0).is_none());
    }

    #[test]
    fn test_mismatched_grids_rejected() {
        let base = single_stock(
            &[Some(10.0), Some(11.0), Some(12.1)],
            &[Some(10.5), Some(11.5), Some(12.5)],
            &[Some(9.5), Some(10.5), Some(11.5)],
            &[Some(10.2), Some(11.2), Some(12.2)],
            &[V, V, V],
        );
        let ohlcv = OhlcvPanels {
            volume: panel(vec![vec![V], vec![V]]),
            ..base
        };
        let err = forward_returns(&ohlcv).unwrap_err();
        assert!(matches!(err, SagresError::InvalidData(_)));
    }
}

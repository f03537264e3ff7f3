//! Small-scale ordinary least squares.
//!
//! The cross-sectional regressions here have at most a handful of
//! regressors, so the normal equations are solved directly with Gaussian
//! elimination rather than pulling in a linear-algebra backend.

use ndarray::{Array1, Array2};

/// Fits `y = b0 + b1*x1 + ... + bk*xk` by OLS.
///
/// `xs` holds one slice per regressor; all slices must have the length of
/// `y`. Returns `[b0, b1, ..., bk]`, or `None` when the system is singular
/// (fewer observations than coefficients, or a degenerate regressor with no
/// cross-sectional variation).
#[must_use]
pub fn ols(y: &[f64], xs: &[&[f64]]) -> Option<Vec<f64>> {
    let n = y.len();
    let k = xs.len() + 1;
    if n < k || xs.iter().any(|x| x.len() != n) {
        return None;
    }

    // Design matrix with an intercept column of ones.
    let mut design = Array2::zeros((n, k));
    for i in 0..n {
        design[(i, 0)] = 1.0;
        for (j, x) in xs.iter().enumerate() {
            design[(i, j + 1)] = x[i];
        }
    }

    // Normal equations: (X'X) b = X'y.
    let mut xtx = Array2::zeros((k, k));
    let mut xty = Array1::zeros(k);
    for i in 0..n {
        for a in 0..k {
            xty[a] += design[(i, a)] * y[i];
            for b in a..k {
                xtx[(a, b)] += design[(i, a)] * design[(i, b)];
            }
        }
    }
    for a in 0..k {
        for b in 0..a {
            xtx[(a, b)] = xtx[(b, a)];
        }
    }

    solve(xtx, xty)
}

/// Solves a small symmetric system by Gaussian elimination with partial
/// pivoting. Returns `None` for (numerically) singular systems.
fn solve(mut a: Array2<f64>, mut b: Array1<f64>) -> Option<Vec<f64>> {
    let k = b.len();

    for col in 0..k {
        let pivot_row = (col..k)
            .max_by(|&r1, &r2| {
                a[(r1, col)]
                    .abs()
                    .partial_cmp(&a[(r2, col)].abs())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .unwrap_or(col);
        if a[(pivot_row, col)].abs() < 1e-12 {
            return None;
        }
        if pivot_row != col {
            for c in 0..k {
                a.swap((col, c), (pivot_row, c));
            }
            b.swap(col, pivot_row);
        }

        for row in (col + 1)..k {
            let factor = a[(row, col)] / a[(col, col)];
            for c in col..k {
                a[(row, c)] -= factor * a[(col, c)];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; k];
    for row in (0..k).rev() {
        let mut acc = b[row];
        for c in (row + 1)..k {
            acc -= a[(row, c)] * x[c];
        }
        x[row] = acc / a[(row, row)];
    }
    Some(x)
}

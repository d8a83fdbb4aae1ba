//! Ridge regression with multiple outputs
//!
//! Solves `(XᵀX + λI) W = XᵀY` in closed form. An intercept column is appended to
//! the design matrix and left unpenalised.

use crate::{MathError, Result};
use serde::{Deserialize, Serialize};

/// Ridge regression estimator
#[derive(Debug, Clone, Copy)]
pub struct RidgeRegression {
    lambda: f64,
}

/// Fitted ridge coefficients, one row of weights per output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RidgeFit {
    weights: Vec<Vec<f64>>,
    intercepts: Vec<f64>,
}

impl RidgeRegression {
    /// Create an estimator with the given L2 penalty
    pub fn new(lambda: f64) -> Result<Self> {
        if !lambda.is_finite() || lambda < 0.0 {
            return Err(MathError::InvalidInput(format!(
                "Ridge penalty must be a non-negative number, got {}",
                lambda
            )));
        }
        Ok(Self { lambda })
    }

    /// Penalty strength
    pub fn lambda(&self) -> f64 {
        self.lambda
    }

    /// Fit coefficients mapping every input row of `x` to the matching row of `y`
    pub fn fit<X: AsRef<[f64]>, Y: AsRef<[f64]>>(&self, x: &[X], y: &[Y]) -> Result<RidgeFit> {
        if x.is_empty() {
            return Err(MathError::InsufficientData(
                "Ridge regression needs at least one sample".to_string(),
            ));
        }
        if x.len() != y.len() {
            return Err(MathError::InvalidInput(format!(
                "Got {} input rows but {} target rows",
                x.len(),
                y.len()
            )));
        }

        let n_inputs = x[0].as_ref().len();
        let n_outputs = y[0].as_ref().len();
        if n_inputs == 0 || n_outputs == 0 {
            return Err(MathError::InvalidInput(
                "Inputs and targets must have at least one column".to_string(),
            ));
        }

        // Normal equations over the design matrix extended with a bias column.
        let dim = n_inputs + 1;
        let mut gram = vec![vec![0.0; dim]; dim];
        let mut rhs = vec![vec![0.0; n_outputs]; dim];

        for (row_x, row_y) in x.iter().zip(y.iter()) {
            let row_x = row_x.as_ref();
            let row_y = row_y.as_ref();
            if row_x.len() != n_inputs || row_y.len() != n_outputs {
                return Err(MathError::InvalidInput(
                    "Ragged input or target rows".to_string(),
                ));
            }

            for i in 0..dim {
                let xi = if i < n_inputs { row_x[i] } else { 1.0 };
                for j in i..dim {
                    let xj = if j < n_inputs { row_x[j] } else { 1.0 };
                    gram[i][j] += xi * xj;
                }
                for (o, &target) in row_y.iter().enumerate() {
                    rhs[i][o] += xi * target;
                }
            }
        }

        for i in 0..dim {
            for j in 0..i {
                gram[i][j] = gram[j][i];
            }
        }
        for (i, row) in gram.iter_mut().enumerate().take(n_inputs) {
            row[i] += self.lambda;
        }

        let solution = solve_linear_system(gram, rhs)?;

        let mut weights = vec![vec![0.0; n_inputs]; n_outputs];
        let mut intercepts = vec![0.0; n_outputs];
        for o in 0..n_outputs {
            for i in 0..n_inputs {
                weights[o][i] = solution[i][o];
            }
            intercepts[o] = solution[n_inputs][o];
        }

        Ok(RidgeFit {
            weights,
            intercepts,
        })
    }
}

impl RidgeFit {
    /// Number of input columns
    pub fn n_inputs(&self) -> usize {
        self.weights.first().map_or(0, Vec::len)
    }

    /// Number of outputs
    pub fn n_outputs(&self) -> usize {
        self.intercepts.len()
    }

    /// Weights of output `o`
    pub fn weights(&self, o: usize) -> Option<&[f64]> {
        self.weights.get(o).map(Vec::as_slice)
    }

    /// Intercepts, one per output
    pub fn intercepts(&self) -> &[f64] {
        &self.intercepts
    }

    /// Predict all outputs for one input row
    pub fn predict(&self, input: &[f64]) -> Result<Vec<f64>> {
        if input.len() != self.n_inputs() {
            return Err(MathError::InvalidInput(format!(
                "Expected {} inputs, got {}",
                self.n_inputs(),
                input.len()
            )));
        }

        Ok(self
            .weights
            .iter()
            .zip(&self.intercepts)
            .map(|(w, b)| w.iter().zip(input).map(|(w, x)| w * x).sum::<f64>() + b)
            .collect())
    }
}

/// Solve `A · X = B` for square `A` by Gaussian elimination with partial pivoting.
///
/// `b` holds one row per row of `a` and any number of right-hand-side columns.
pub fn solve_linear_system(mut a: Vec<Vec<f64>>, mut b: Vec<Vec<f64>>) -> Result<Vec<Vec<f64>>> {
    let n = a.len();
    if n == 0 || b.len() != n || a.iter().any(|row| row.len() != n) {
        return Err(MathError::InvalidInput(
            "System must be square with one right-hand-side row per equation".to_string(),
        ));
    }

    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))
            .unwrap_or(col);
        if a[pivot][col].abs() < 1e-12 {
            return Err(MathError::CalculationError(
                "Matrix is singular or ill-conditioned".to_string(),
            ));
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            for k in 0..b[row].len() {
                b[row][k] -= factor * b[col][k];
            }
        }
    }

    let width = b[0].len();
    let mut x = vec![vec![0.0; width]; n];
    for row in (0..n).rev() {
        for k in 0..width {
            let tail: f64 = (row + 1..n).map(|j| a[row][j] * x[j][k]).sum();
            x[row][k] = (b[row][k] - tail) / a[row][row];
        }
    }

    Ok(x)
}

//! Per-feature min-max scaling
//!
//! The scaler maps every feature column onto `[0, 1]` using the minimum and maximum
//! observed while fitting. A column whose minimum equals its maximum keeps a scale of
//! one, so it maps to zero and inverts back to its constant value.

use crate::{MathError, Result};
use serde::{Deserialize, Serialize};

/// Fitted min-max transform over a fixed number of features
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinMaxScaler {
    data_min: Vec<f64>,
    data_max: Vec<f64>,
}

impl MinMaxScaler {
    /// Fit a scaler over a feature matrix given as rows
    pub fn fit<R: AsRef<[f64]>>(rows: &[R]) -> Result<Self> {
        let first = rows.first().ok_or_else(|| {
            MathError::InsufficientData("Cannot fit a scaler on zero rows".to_string())
        })?;
        let n_features = first.as_ref().len();
        if n_features == 0 {
            return Err(MathError::InvalidInput(
                "Rows must contain at least one feature".to_string(),
            ));
        }

        let mut data_min = vec![f64::INFINITY; n_features];
        let mut data_max = vec![f64::NEG_INFINITY; n_features];

        for (row_idx, row) in rows.iter().enumerate() {
            let row = row.as_ref();
            if row.len() != n_features {
                return Err(MathError::InvalidInput(format!(
                    "Row {} has {} features, expected {}",
                    row_idx,
                    row.len(),
                    n_features
                )));
            }
            for (i, &value) in row.iter().enumerate() {
                if !value.is_finite() {
                    return Err(MathError::InvalidInput(format!(
                        "Non-finite value in row {}, feature {}",
                        row_idx, i
                    )));
                }
                data_min[i] = data_min[i].min(value);
                data_max[i] = data_max[i].max(value);
            }
        }

        Ok(Self { data_min, data_max })
    }

    /// Number of features the scaler was fitted on
    pub fn n_features(&self) -> usize {
        self.data_min.len()
    }

    /// Per-feature minimum seen while fitting
    pub fn data_min(&self) -> &[f64] {
        &self.data_min
    }

    /// Per-feature maximum seen while fitting
    pub fn data_max(&self) -> &[f64] {
        &self.data_max
    }

    fn range(&self, feature: usize) -> f64 {
        let range = self.data_max[feature] - self.data_min[feature];
        if range == 0.0 {
            1.0
        } else {
            range
        }
    }

    fn check_width(&self, row: &[f64]) -> Result<()> {
        if row.len() != self.n_features() {
            return Err(MathError::InvalidInput(format!(
                "Row has {} features, scaler expects {}",
                row.len(),
                self.n_features()
            )));
        }
        Ok(())
    }

    /// Scale a row in place
    pub fn transform_in_place(&self, row: &mut [f64]) -> Result<()> {
        self.check_width(row)?;
        for (i, value) in row.iter_mut().enumerate() {
            *value = (*value - self.data_min[i]) / self.range(i);
        }
        Ok(())
    }

    /// Map a scaled row back to original units in place
    pub fn inverse_transform_in_place(&self, row: &mut [f64]) -> Result<()> {
        self.check_width(row)?;
        for (i, value) in row.iter_mut().enumerate() {
            *value = *value * self.range(i) + self.data_min[i];
        }
        Ok(())
    }

    /// Scale a row, returning a new vector
    pub fn transform(&self, row: &[f64]) -> Result<Vec<f64>> {
        let mut scaled = row.to_vec();
        self.transform_in_place(&mut scaled)?;
        Ok(scaled)
    }

    /// Invert a scaled row, returning a new vector
    pub fn inverse_transform(&self, row: &[f64]) -> Result<Vec<f64>> {
        let mut original = row.to_vec();
        self.inverse_transform_in_place(&mut original)?;
        Ok(original)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn fit_maps_columns_to_unit_range() {
        let rows = vec![[10.0, 100.0], [20.0, 300.0], [30.0, 200.0]];
        let scaler = MinMaxScaler::fit(&rows).unwrap();

        assert_eq!(scaler.data_min(), &[10.0, 100.0]);
        assert_eq!(scaler.data_max(), &[30.0, 300.0]);

        let scaled = scaler.transform(&[20.0, 300.0]).unwrap();
        assert_relative_eq!(scaled[0], 0.5);
        assert_relative_eq!(scaled[1], 1.0);
    }

    #[test]
    fn inverse_restores_original_units() {
        let rows = vec![[1.5, -4.0, 7.0], [3.5, 4.0, 9.0]];
        let scaler = MinMaxScaler::fit(&rows).unwrap();

        let mut row = [2.0, 0.0, 8.5];
        scaler.transform_in_place(&mut row).unwrap();
        scaler.inverse_transform_in_place(&mut row).unwrap();

        assert_relative_eq!(row[0], 2.0, epsilon = 1e-12);
        assert_relative_eq!(row[1], 0.0, epsilon = 1e-12);
        assert_relative_eq!(row[2], 8.5, epsilon = 1e-12);
    }

    #[test]
    fn constant_column_stays_invertible() {
        let rows = vec![[5.0, 1.0], [5.0, 2.0]];
        let scaler = MinMaxScaler::fit(&rows).unwrap();

        let scaled = scaler.transform(&[5.0, 1.0]).unwrap();
        assert_eq!(scaled[0], 0.0);
        let restored = scaler.inverse_transform(&scaled).unwrap();
        assert_eq!(restored[0], 5.0);
    }

    #[test]
    fn values_outside_fit_range_extrapolate() {
        let scaler = MinMaxScaler::fit(&[[0.0], [10.0]]).unwrap();
        let restored = scaler.inverse_transform(&[-0.5]).unwrap();
        assert_relative_eq!(restored[0], -5.0);
    }

    #[test]
    fn rejects_bad_input() {
        let empty: Vec<[f64; 2]> = Vec::new();
        assert!(MinMaxScaler::fit(&empty).is_err());
        assert!(MinMaxScaler::fit(&[vec![1.0, 2.0], vec![1.0]]).is_err());
        assert!(MinMaxScaler::fit(&[[f64::NAN]]).is_err());

        let scaler = MinMaxScaler::fit(&[[1.0, 2.0]]).unwrap();
        assert!(scaler.transform(&[1.0]).is_err());
    }

    #[test]
    fn survives_serde_round_trip() {
        let scaler = MinMaxScaler::fit(&[[0.0, 1.0], [2.0, 3.0]]).unwrap();
        let json = serde_json::to_string(&scaler).unwrap();
        let restored: MinMaxScaler = serde_json::from_str(&json).unwrap();
        assert_eq!(scaler, restored);
    }
}

//! Trailing moving averages
//!
//! Contains the rolling mean used to smooth noisy sensor channels. The window trails
//! the current sample and a minimum-periods rule decides whether a partially filled
//! window already produces a value.

use crate::{MathError, Result};
use std::collections::VecDeque;

/// Trailing rolling mean over the last `window` values
#[derive(Debug, Clone)]
pub struct RollingMean {
    window: usize,
    min_periods: usize,
    values: VecDeque<f64>,
    sum: f64,
}

impl RollingMean {
    /// Create a rolling mean with the given window and minimum number of observations
    pub fn new(window: usize, min_periods: usize) -> Result<Self> {
        if window == 0 {
            return Err(MathError::InvalidInput(
                "Window must be greater than zero".to_string(),
            ));
        }
        if min_periods == 0 || min_periods > window {
            return Err(MathError::InvalidInput(format!(
                "min_periods must be in 1..={}, got {}",
                window, min_periods
            )));
        }

        Ok(Self {
            window,
            min_periods,
            values: VecDeque::with_capacity(window),
            sum: 0.0,
        })
    }

    /// Push a value and return the mean of the current window, if enough values were seen
    pub fn update(&mut self, value: f64) -> Option<f64> {
        self.values.push_back(value);
        self.sum += value;

        if self.values.len() > self.window {
            if let Some(old_value) = self.values.pop_front() {
                self.sum -= old_value;
            }
        }

        self.value()
    }

    /// Current mean, `None` while fewer than `min_periods` values are buffered
    pub fn value(&self) -> Option<f64> {
        if self.values.len() < self.min_periods {
            return None;
        }
        Some(self.sum / self.values.len() as f64)
    }

    /// Window length
    pub fn window(&self) -> usize {
        self.window
    }

    /// Reset the rolling mean, clearing all values
    pub fn reset(&mut self) {
        self.values.clear();
        self.sum = 0.0;
    }
}

/// Trailing rolling mean over a whole slice.
///
/// Entry `i` averages `values[i + 1 - window ..= i]` (clipped at the start of the
/// slice) and is `None` when fewer than `min_periods` values fall in that range.
pub fn rolling_mean(values: &[f64], window: usize, min_periods: usize) -> Result<Vec<Option<f64>>> {
    let mut rolling = RollingMean::new(window, min_periods)?;
    Ok(values.iter().map(|&v| rolling.update(v)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn partial_windows_use_available_values() {
        let smoothed = rolling_mean(&[2.0, 4.0, 6.0, 8.0, 10.0, 12.0], 5, 1).unwrap();

        let expected = [2.0, 3.0, 4.0, 5.0, 6.0, 8.0];
        for (value, expected) in smoothed.iter().zip(expected) {
            assert_relative_eq!(value.unwrap(), expected);
        }
    }

    #[test]
    fn min_periods_hides_early_values() {
        let smoothed = rolling_mean(&[1.0, 2.0, 3.0, 4.0], 3, 3).unwrap();
        assert_eq!(smoothed[0], None);
        assert_eq!(smoothed[1], None);
        assert_relative_eq!(smoothed[2].unwrap(), 2.0);
        assert_relative_eq!(smoothed[3].unwrap(), 3.0);
    }

    #[test]
    fn reset_clears_state() {
        let mut rolling = RollingMean::new(2, 1).unwrap();
        rolling.update(10.0);
        rolling.update(20.0);
        rolling.reset();
        assert_eq!(rolling.value(), None);
        assert_eq!(rolling.update(4.0), Some(4.0));
        assert_eq!(rolling.window(), 2);
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        assert!(RollingMean::new(0, 1).is_err());
        assert!(RollingMean::new(3, 0).is_err());
        assert!(RollingMean::new(3, 4).is_err());
    }
}

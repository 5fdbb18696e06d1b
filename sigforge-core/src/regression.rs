//! Regression backend for the ML prediction strategy.
//!
//! The strategy only depends on the `Regressor` contract. The bundled
//! `RidgeRegressor` is compiled in with the `ml` feature; without it
//! `default_regressor` returns `None` and the strategy never signals.

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RegressionError {
    #[error("training set is empty")]
    EmptyTrainingSet,
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
    #[error("normal equations are singular")]
    Singular,
    #[error("model has not been fitted")]
    NotFitted,
}

/// fit(X, y) / predict(x) contract.
pub trait Regressor: Send + Sync {
    fn name(&self) -> &str;

    /// Fit on rows of `x` (all the same width) against targets `y`.
    fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<(), RegressionError>;

    fn predict(&self, x: &[f64]) -> Result<f64, RegressionError>;

    fn boxed_clone(&self) -> Box<dyn Regressor>;
}

impl Clone for Box<dyn Regressor> {
    fn clone(&self) -> Self {
        self.boxed_clone()
    }
}

impl std::fmt::Debug for dyn Regressor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Regressor").field("name", &self.name()).finish()
    }
}

/// The backend compiled into this build, if any.
pub fn default_regressor(alpha: f64) -> Option<Box<dyn Regressor>> {
    #[cfg(feature = "ml")]
    {
        Some(Box::new(RidgeRegressor::new(alpha)))
    }
    #[cfg(not(feature = "ml"))]
    {
        let _ = alpha;
        None
    }
}

#[cfg(feature = "ml")]
fn check_training_set(x: &[Vec<f64>], y: &[f64]) -> Result<usize, RegressionError> {
    let width = x.first().map(Vec::len).ok_or(RegressionError::EmptyTrainingSet)?;
    if x.len() != y.len() {
        return Err(RegressionError::DimensionMismatch {
            expected: x.len(),
            got: y.len(),
        });
    }
    if let Some(row) = x.iter().find(|r| r.len() != width) {
        return Err(RegressionError::DimensionMismatch {
            expected: width,
            got: row.len(),
        });
    }
    Ok(width)
}

// ─── Standard scaler ─────────────────────────────────────────────────

/// Per-column standardization: (x - mean) / std. Zero-variance columns use std 1.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StandardScaler {
    means: Vec<f64>,
    stds: Vec<f64>,
}

impl StandardScaler {
    pub fn fit(x: &[Vec<f64>]) -> Result<Self, RegressionError> {
        let width = x.first().map(Vec::len).ok_or(RegressionError::EmptyTrainingSet)?;
        let n = x.len() as f64;
        let mut means = vec![0.0; width];
        let mut stds = vec![0.0; width];

        for row in x {
            if row.len() != width {
                return Err(RegressionError::DimensionMismatch {
                    expected: width,
                    got: row.len(),
                });
            }
            for (m, v) in means.iter_mut().zip(row) {
                *m += v / n;
            }
        }
        for row in x {
            for ((s, v), m) in stds.iter_mut().zip(row).zip(&means) {
                *s += (v - m).powi(2) / n;
            }
        }
        for s in &mut stds {
            *s = s.sqrt();
            if *s < 1e-12 {
                *s = 1.0;
            }
        }
        Ok(Self { means, stds })
    }

    pub fn transform(&self, row: &[f64]) -> Result<Vec<f64>, RegressionError> {
        if row.len() != self.means.len() {
            return Err(RegressionError::DimensionMismatch {
                expected: self.means.len(),
                got: row.len(),
            });
        }
        Ok(row
            .iter()
            .zip(&self.means)
            .zip(&self.stds)
            .map(|((v, m), s)| (v - m) / s)
            .collect())
    }
}

// ─── Ridge regression ────────────────────────────────────────────────

/// Closed-form ridge regression with an unpenalized intercept.
///
/// Solves (XcᵀXc + αI) w = Xcᵀ(y - ȳ) on column-centred X by Gaussian
/// elimination with partial pivoting.
#[cfg(feature = "ml")]
#[derive(Debug, Clone)]
pub struct RidgeRegressor {
    alpha: f64,
    coefficients: Vec<f64>,
    column_means: Vec<f64>,
    intercept: f64,
    fitted: bool,
}

#[cfg(feature = "ml")]
impl RidgeRegressor {
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha: alpha.max(0.0),
            coefficients: Vec::new(),
            column_means: Vec::new(),
            intercept: 0.0,
            fitted: false,
        }
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }
}

#[cfg(feature = "ml")]
impl Regressor for RidgeRegressor {
    fn name(&self) -> &str {
        "ridge"
    }

    fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<(), RegressionError> {
        let width = check_training_set(x, y)?;
        let n = x.len() as f64;

        let mut means = vec![0.0; width];
        for row in x {
            for (m, v) in means.iter_mut().zip(row) {
                *m += v / n;
            }
        }
        let y_mean = y.iter().sum::<f64>() / n;

        // Augmented normal-equation matrix [A | b], A = XcᵀXc + αI.
        let mut a = vec![vec![0.0; width + 1]; width];
        for (row, &target) in x.iter().zip(y) {
            let centred: Vec<f64> = row.iter().zip(&means).map(|(v, m)| v - m).collect();
            for i in 0..width {
                for j in 0..width {
                    a[i][j] += centred[i] * centred[j];
                }
                a[i][width] += centred[i] * (target - y_mean);
            }
        }
        for (i, row) in a.iter_mut().enumerate() {
            row[i] += self.alpha;
        }

        let coefficients = solve(a)?;
        self.intercept = y_mean;
        self.column_means = means;
        self.coefficients = coefficients;
        self.fitted = true;
        Ok(())
    }

    fn predict(&self, x: &[f64]) -> Result<f64, RegressionError> {
        if !self.fitted {
            return Err(RegressionError::NotFitted);
        }
        if x.len() != self.coefficients.len() {
            return Err(RegressionError::DimensionMismatch {
                expected: self.coefficients.len(),
                got: x.len(),
            });
        }
        Ok(self.intercept
            + x.iter()
                .zip(&self.column_means)
                .zip(&self.coefficients)
                .map(|((v, m), w)| (v - m) * w)
                .sum::<f64>())
    }

    fn boxed_clone(&self) -> Box<dyn Regressor> {
        Box::new(self.clone())
    }
}

/// Gaussian elimination with partial pivoting on an augmented `n × (n+1)` matrix.
#[cfg(feature = "ml")]
fn solve(mut a: Vec<Vec<f64>>) -> Result<Vec<f64>, RegressionError> {
    let n = a.len();
    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))
            .ok_or(RegressionError::Singular)?;
        if a[pivot][col].abs() < 1e-12 {
            return Err(RegressionError::Singular);
        }
        a.swap(col, pivot);

        for row in (col + 1)..n {
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..=n {
                a[row][k] -= factor * a[col][k];
            }
        }
    }

    let mut solution = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = ((row + 1)..n).map(|k| a[row][k] * solution[k]).sum();
        solution[row] = (a[row][n] - tail) / a[row][row];
    }
    Ok(solution)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaler_standardizes_columns() {
        let x = vec![vec![1.0, 5.0], vec![3.0, 5.0]];
        let scaler = StandardScaler::fit(&x).unwrap();
        assert_eq!(scaler.transform(&[1.0, 5.0]).unwrap(), vec![-1.0, 0.0]);
        assert_eq!(scaler.transform(&[3.0, 7.0]).unwrap(), vec![1.0, 2.0]);
    }

    #[test]
    fn scaler_rejects_wrong_width() {
        let scaler = StandardScaler::fit(&[vec![1.0, 2.0]]).unwrap();
        assert!(matches!(
            scaler.transform(&[1.0]),
            Err(RegressionError::DimensionMismatch { expected: 2, got: 1 })
        ));
        assert_eq!(StandardScaler::fit(&[]), Err(RegressionError::EmptyTrainingSet));
    }

    #[cfg(feature = "ml")]
    #[test]
    fn ridge_recovers_linear_relation() {
        // y = 2 x0 - 3 x1 + 1
        let x: Vec<Vec<f64>> = (0..30)
            .map(|i| vec![i as f64, ((i * 7) % 11) as f64])
            .collect();
        let y: Vec<f64> = x.iter().map(|r| 2.0 * r[0] - 3.0 * r[1] + 1.0).collect();

        let mut model = RidgeRegressor::new(1e-9);
        model.fit(&x, &y).unwrap();
        assert!((model.coefficients()[0] - 2.0).abs() < 1e-6);
        assert!((model.coefficients()[1] + 3.0).abs() < 1e-6);
        assert!((model.predict(&[4.0, 2.0]).unwrap() - 3.0).abs() < 1e-6);
    }

    #[cfg(feature = "ml")]
    #[test]
    fn ridge_penalty_shrinks_coefficients() {
        let x: Vec<Vec<f64>> = (0..20).map(|i| vec![i as f64]).collect();
        let y: Vec<f64> = (0..20).map(|i| i as f64).collect();
        let mut loose = RidgeRegressor::new(0.0);
        let mut tight = RidgeRegressor::new(1_000.0);
        loose.fit(&x, &y).unwrap();
        tight.fit(&x, &y).unwrap();
        assert!(tight.coefficients()[0].abs() < loose.coefficients()[0].abs());
    }

    #[cfg(feature = "ml")]
    #[test]
    fn ridge_errors() {
        let mut model = RidgeRegressor::new(0.0);
        assert_eq!(model.predict(&[1.0]), Err(RegressionError::NotFitted));
        assert_eq!(model.fit(&[], &[]), Err(RegressionError::EmptyTrainingSet));
        // Constant column with no penalty → singular.
        let x = vec![vec![1.0]; 5];
        assert_eq!(model.fit(&x, &[1.0; 5]), Err(RegressionError::Singular));
        assert!(matches!(
            model.fit(&[vec![1.0]], &[1.0, 2.0]),
            Err(RegressionError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn default_regressor_matches_feature() {
        assert_eq!(default_regressor(1.0).is_some(), cfg!(feature = "ml"));
    }
}

use ndarray::{Array1, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::{
    error::{EngineError, Result},
    features::polynomial_row,
    geometry::Point,
    solver::{check_shapes, hypothesis, Solver, StepReport},
};

/// Batch gradient descent for ordinary least squares.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearRegression {
    learning_rate: f64,
}

impl LinearRegression {
    /// Returns a new `LinearRegression`.
    ///
    /// # Arguments
    /// * `learning_rate` - The *length* of the step taken on every call to `step`. No adaptive
    ///   step size or divergence detection is performed, so it must be small enough for the
    ///   dataset at hand.
    pub fn new(learning_rate: f64) -> Self {
        Self { learning_rate }
    }

    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }
}

impl Solver for LinearRegression {
    /// Makes one step in the opposite direction of the gradient of the summed squared error.
    ///
    /// The reported cost is the one of the coefficients *before* the update.
    fn step(
        &self,
        coefficients: &mut Array1<f64>,
        dataset: ArrayView2<f64>,
        output: ArrayView1<f64>,
    ) -> Result<StepReport> {
        check_shapes(coefficients, dataset, output)?;

        let errors: Vec<f64> = dataset
            .rows()
            .into_iter()
            .zip(output)
            .map(|(row, y)| hypothesis(coefficients.view(), row) - y)
            .collect();

        let cost = errors.iter().fold(0.0, |acc, e| acc + e * e);

        let mut grad = vec![0.0; coefficients.len()];
        for (row, e) in dataset.rows().into_iter().zip(&errors) {
            for (g, x) in grad.iter_mut().zip(row) {
                *g += e * x;
            }
        }

        let lr = self.learning_rate;
        for (w, g) in coefficients.iter_mut().zip(&grad) {
            *w -= lr * g;
        }

        Ok(StepReport { cost })
    }
}

/// Upper bound on [`CurveDomain::segments`].
pub const MAX_CURVE_SEGMENTS: usize = 1_000_000;

/// Where a fitted polynomial gets evaluated for drawing, in normalized input space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurveDomain {
    #[serde(default = "CurveDomain::default_from")]
    pub from: f64,
    #[serde(default = "CurveDomain::default_to")]
    pub to: f64,
    #[serde(default = "CurveDomain::default_segments")]
    pub segments: usize,
}

impl CurveDomain {
    fn default_from() -> f64 {
        -10.0
    }

    fn default_to() -> f64 {
        10.0
    }

    fn default_segments() -> usize {
        500
    }

    /// # Errors
    /// `InvalidInput` for a non-finite range, or a sample count of zero or above
    /// [`MAX_CURVE_SEGMENTS`].
    pub fn validate(&self) -> Result<()> {
        if !(self.from.is_finite() && self.to.is_finite()) {
            return Err(EngineError::InvalidInput("curve domain must be finite"));
        }
        if self.segments == 0 || self.segments > MAX_CURVE_SEGMENTS {
            return Err(EngineError::InvalidInput("curve sample count is out of range"));
        }
        Ok(())
    }

    /// The `segments` evenly spaced inputs from `from` to `to`, both ends included.
    pub fn inputs(&self) -> impl Iterator<Item = f64> + '_ {
        let last = self.segments.saturating_sub(1).max(1) as f64;
        (0..self.segments).map(move |i| self.from + (self.to - self.from) * i as f64 / last)
    }
}

impl Default for CurveDomain {
    fn default() -> Self {
        Self {
            from: Self::default_from(),
            to: Self::default_to(),
            segments: Self::default_segments(),
        }
    }
}

/// Evaluates the polynomial described by `coefficients` (constant term first) over `domain`.
pub fn sample_curve(coefficients: ArrayView1<f64>, domain: &CurveDomain) -> Vec<Point> {
    let degree = coefficients.len().saturating_sub(1);

    domain
        .inputs()
        .map(|x| Point::new(x, hypothesis(coefficients, polynomial_row(x, degree).view())))
        .collect()
}

#[cfg(test)]
mod tests {
    use ndarray::{array, Array2};
    use rand::{rngs::StdRng, Rng, SeedableRng};

    use super::*;
    use crate::{error::EngineError, features::polynomial_rows};

    #[test]
    fn test_single_step() {
        let solver = LinearRegression::new(0.1);
        let mut coefficients = array![0., 0.];
        let dataset = array![[1., 1.], [1., 2.]];
        let output = array![3., 5.];

        let report = solver
            .step(&mut coefficients, dataset.view(), output.view())
            .unwrap();

        assert_eq!(report.cost, 34.);
        assert!((coefficients[0] - 0.8).abs() < 1e-12);
        assert!((coefficients[1] - 1.3).abs() < 1e-12);
    }

    #[test]
    fn test_shape_mismatch_fails_loudly() {
        let solver = LinearRegression::new(0.1);
        let mut coefficients = array![0., 0., 0.];
        let dataset = array![[1., 1.]];

        let err = solver
            .step(&mut coefficients, dataset.view(), array![1.].view())
            .unwrap_err();

        assert!(matches!(err, EngineError::ShapeMismatch { what: "coefficients", .. }));
        assert_eq!(coefficients, array![0., 0., 0.]);
    }

    #[test]
    fn test_converges_on_noisy_line() {
        let mut rng = StdRng::seed_from_u64(7);
        let xs = Array1::from_iter((0..20).map(|i| i as f64 / 19.));
        let ys = xs.mapv(|x| 2. * x + 1. + rng.random_range(-0.02..0.02));
        let dataset: Array2<f64> = polynomial_rows(xs.view(), 1);

        let solver = LinearRegression::new(0.01);
        let mut coefficients = Array1::zeros(2);
        let mut last_cost = f64::INFINITY;

        for _ in 0..3000 {
            let report = solver
                .step(&mut coefficients, dataset.view(), ys.view())
                .unwrap();
            assert!(report.cost <= last_cost + 1e-12, "cost went up");
            last_cost = report.cost;
        }

        assert!((coefficients[0] - 1.).abs() < 0.05, "{coefficients}");
        assert!((coefficients[1] - 2.).abs() < 0.05, "{coefficients}");
    }

    #[test]
    fn test_sample_curve() {
        let domain = CurveDomain {
            from: -1.,
            to: 1.,
            segments: 5,
        };
        let curve = sample_curve(array![1., 0., 2.].view(), &domain);

        let xs: Vec<_> = curve.iter().map(|p| p.x).collect();
        let ys: Vec<_> = curve.iter().map(|p| p.y).collect();
        assert_eq!(xs, vec![-1., -0.5, 0., 0.5, 1.]);
        assert_eq!(ys, vec![3., 1.5, 1., 1.5, 3.]);
    }

    #[test]
    fn test_curve_domain_bounds() {
        let domain = |segments| CurveDomain {
            from: -1.,
            to: 1.,
            segments,
        };

        assert!(CurveDomain::default().validate().is_ok());
        assert!(domain(1).validate().is_ok());
        assert!(domain(MAX_CURVE_SEGMENTS).validate().is_ok());
        assert!(matches!(domain(0).validate(), Err(EngineError::InvalidInput(_))));
        assert!(matches!(
            domain(MAX_CURVE_SEGMENTS + 1).validate(),
            Err(EngineError::InvalidInput(_))
        ));
        assert!(CurveDomain {
            from: f64::NEG_INFINITY,
            ..CurveDomain::default()
        }
        .validate()
        .is_err());
    }

    #[test]
    fn test_default_domain() {
        let inputs: Vec<_> = CurveDomain::default().inputs().collect();
        assert_eq!(inputs.len(), 500);
        assert_eq!(inputs[0], -10.);
        assert_eq!(inputs[499], 10.);
    }
}

use ndarray::{Array1, ArrayView1, ArrayView2};
use serde::Serialize;

use crate::error::{ensure_len, Result};

/// What a single solver step reports back. The cost is informative only; no solver stops on it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StepReport {
    pub cost: f64,
}

/// One resumable optimization step over a whole dataset.
pub trait Solver {
    /// Runs exactly one pass over `dataset`, updating `coefficients` in place.
    ///
    /// # Arguments
    /// * `coefficients` - One weight per dataset column.
    /// * `dataset` - One feature row per sample.
    /// * `output` - The expected value of every sample.
    ///
    /// # Errors
    /// `ShapeMismatch` when the three arguments disagree on their lengths.
    fn step(
        &self,
        coefficients: &mut Array1<f64>,
        dataset: ArrayView2<f64>,
        output: ArrayView1<f64>,
    ) -> Result<StepReport>;
}

impl<T: Solver + ?Sized> Solver for Box<T> {
    fn step(
        &self,
        coefficients: &mut Array1<f64>,
        dataset: ArrayView2<f64>,
        output: ArrayView1<f64>,
    ) -> Result<StepReport> {
        (**self).step(coefficients, dataset, output)
    }
}

/// `dot(coefficients, row)`, summed strictly left to right.
///
/// `ndarray`'s own `dot` unrolls the sum, which changes rounding.
pub fn hypothesis(coefficients: ArrayView1<f64>, row: ArrayView1<f64>) -> f64 {
    coefficients
        .iter()
        .zip(row)
        .fold(0.0, |acc, (w, x)| acc + w * x)
}

pub(crate) fn check_shapes(
    coefficients: &Array1<f64>,
    dataset: ArrayView2<f64>,
    output: ArrayView1<f64>,
) -> Result<()> {
    ensure_len("coefficients", coefficients.len(), dataset.ncols())?;
    ensure_len("output", output.len(), dataset.nrows())
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn test_hypothesis() {
        assert_eq!(hypothesis(array![1., 2., 3.].view(), array![1., -1., 2.].view()), 5.);
    }

    #[test]
    fn test_check_shapes() {
        let dataset = array![[1., 2.], [1., 3.]];
        assert!(check_shapes(&array![0., 0.], dataset.view(), array![1., 2.].view()).is_ok());
        assert!(check_shapes(&array![0.], dataset.view(), array![1., 2.].view()).is_err());
        assert!(check_shapes(&array![0., 0.], dataset.view(), array![1.].view()).is_err());
    }
}

use ndarray::{Array1, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::{
    error::Result,
    solver::{check_shapes, hypothesis, Solver, StepReport},
};

/// A class of the binary classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Positive,
    Negative,
}

impl Label {
    /// `+1` or `-1`.
    pub fn value(&self) -> f64 {
        match self {
            Label::Positive => 1.0,
            Label::Negative => -1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerceptronParams {
    pub learning_rate: f64,
    pub margin: f64,
}

/// Decides the class of a raw score, or `None` when it falls inside the margin band.
pub fn classify(score: f64, margin: f64) -> Option<Label> {
    if score >= margin {
        Some(Label::Positive)
    } else if score <= -margin {
        Some(Label::Negative)
    } else {
        None
    }
}

/// A margin perceptron.
///
/// Samples inside the margin band count as misclassified *away* from their own label, so they
/// keep pushing the boundary until they clear the band. Convergence only happens for data that
/// is separable with that margin; otherwise it oscillates and the caller has to bound the number
/// of steps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Perceptron {
    params: PerceptronParams,
}

impl Perceptron {
    pub fn new(params: PerceptronParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> PerceptronParams {
        self.params
    }
}

impl Solver for Perceptron {
    /// Visits every sample once, applying each correction immediately, so later samples are
    /// scored with the coefficients already updated by earlier ones.
    ///
    /// `output` must hold `+1`/`-1` labels. The reported cost is the sum of the squared label
    /// deltas of the pass.
    fn step(
        &self,
        coefficients: &mut Array1<f64>,
        dataset: ArrayView2<f64>,
        output: ArrayView1<f64>,
    ) -> Result<StepReport> {
        check_shapes(coefficients, dataset, output)?;

        let PerceptronParams {
            learning_rate,
            margin,
        } = self.params;
        let mut cost = 0.0;

        for (row, &label) in dataset.rows().into_iter().zip(output) {
            let score = hypothesis(coefficients.view(), row);
            let predicted = match classify(score, margin) {
                Some(class) => class.value(),
                None => -label,
            };

            let delta = predicted - label;
            if delta == 0.0 {
                continue;
            }

            coefficients.scaled_add(-learning_rate * delta, &row);
            cost += delta * delta;
        }

        Ok(StepReport { cost })
    }
}

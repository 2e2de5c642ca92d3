//! Feature row builders.
//!
//! Regression rows are powers of a single input, `[1, x, x², …, x^d]`. Classification rows are
//! `[1, x, y]` followed by the enabled cross terms in [`CrossTerm`] declaration order.

use std::{collections::BTreeSet, fmt, str::FromStr};

use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Number of leading columns every classification row has: bias, x and y.
pub const BASE_COLUMNS: usize = 3;

/// An optional polynomial term of a classification row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CrossTerm {
    #[serde(rename = "x*x")]
    XX,
    #[serde(rename = "x*y")]
    XY,
    #[serde(rename = "y*y")]
    YY,
    #[serde(rename = "x*x*x")]
    XXX,
}

impl CrossTerm {
    pub const ALL: [CrossTerm; 4] = [CrossTerm::XX, CrossTerm::XY, CrossTerm::YY, CrossTerm::XXX];

    pub fn name(&self) -> &'static str {
        match self {
            CrossTerm::XX => "x*x",
            CrossTerm::XY => "x*y",
            CrossTerm::YY => "y*y",
            CrossTerm::XXX => "x*x*x",
        }
    }

    pub fn eval(&self, x: f64, y: f64) -> f64 {
        match self {
            CrossTerm::XX => x * x,
            CrossTerm::XY => x * y,
            CrossTerm::YY => y * y,
            CrossTerm::XXX => x * x * x,
        }
    }
}

impl fmt::Display for CrossTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for CrossTerm {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        CrossTerm::ALL
            .into_iter()
            .find(|term| term.name() == s)
            .ok_or_else(|| EngineError::Config(format!("unknown feature: {s}")))
    }
}

/// The set of cross terms enabled for a classification run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureSet {
    terms: BTreeSet<CrossTerm>,
}

impl FeatureSet {
    /// A set with only the linear `[1, x, y]` columns.
    pub fn linear() -> Self {
        Self::default()
    }

    pub fn contains(&self, term: CrossTerm) -> bool {
        self.terms.contains(&term)
    }

    pub fn is_linear(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn terms(&self) -> impl Iterator<Item = CrossTerm> + '_ {
        self.terms.iter().copied()
    }

    /// Width of the rows built with this set, which is also the coefficient count.
    pub fn row_len(&self) -> usize {
        BASE_COLUMNS + self.terms.len()
    }

    /// Column of `term` in a row, if enabled.
    pub fn column_of(&self, term: CrossTerm) -> Option<usize> {
        self.terms
            .iter()
            .position(|t| *t == term)
            .map(|i| BASE_COLUMNS + i)
    }

    pub fn row(&self, x: f64, y: f64) -> Array1<f64> {
        let mut row = Vec::with_capacity(self.row_len());
        row.extend([1.0, x, y]);
        row.extend(self.terms.iter().map(|term| term.eval(x, y)));
        Array1::from(row)
    }

    /// Builds one row per `(xs[i], ys[i])` pair.
    pub fn rows(&self, xs: ArrayView1<f64>, ys: ArrayView1<f64>) -> Array2<f64> {
        let mut rows = Array2::zeros((xs.len(), self.row_len()));
        for ((mut row, &x), &y) in rows.rows_mut().into_iter().zip(xs).zip(ys) {
            row.assign(&self.row(x, y));
        }
        rows
    }
}

impl FromIterator<CrossTerm> for FeatureSet {
    fn from_iter<I: IntoIterator<Item = CrossTerm>>(iter: I) -> Self {
        Self {
            terms: iter.into_iter().collect(),
        }
    }
}

/// `[1, x, x², …, x^degree]`.
pub fn polynomial_row(x: f64, degree: usize) -> Array1<f64> {
    let mut power = 1.0;
    Array1::from_iter((0..=degree).map(|_| {
        let value = power;
        power *= x;
        value
    }))
}

/// One [`polynomial_row`] per input.
pub fn polynomial_rows(xs: ArrayView1<f64>, degree: usize) -> Array2<f64> {
    let mut rows = Array2::zeros((xs.len(), degree + 1));
    for (mut row, &x) in rows.rows_mut().into_iter().zip(xs) {
        row.assign(&polynomial_row(x, degree));
    }
    rows
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn test_polynomial_row() {
        assert_eq!(polynomial_row(2., 3), array![1., 2., 4., 8.]);
        assert_eq!(polynomial_row(5., 0), array![1.]);
    }

    #[test]
    fn test_polynomial_rows() {
        let rows = polynomial_rows(array![1., -3.].view(), 2);
        assert_eq!(rows, array![[1., 1., 1.], [1., -3., 9.]]);
    }

    #[test]
    fn test_rows_follow_declaration_order() {
        let features: FeatureSet = [CrossTerm::XXX, CrossTerm::YY, CrossTerm::XX]
            .into_iter()
            .collect();

        assert_eq!(features.row(2., 3.), array![1., 2., 3., 4., 9., 8.]);
        assert_eq!(features.column_of(CrossTerm::XX), Some(3));
        assert_eq!(features.column_of(CrossTerm::YY), Some(4));
        assert_eq!(features.column_of(CrossTerm::XXX), Some(5));
        assert_eq!(features.column_of(CrossTerm::XY), None);
    }

    #[test]
    fn test_linear_rows() {
        let features = FeatureSet::linear();
        let rows = features.rows(array![1., 2.].view(), array![3., 4.].view());

        assert!(features.is_linear());
        assert_eq!(rows, array![[1., 1., 3.], [1., 2., 4.]]);
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("x*y".parse::<CrossTerm>().unwrap(), CrossTerm::XY);
        assert_eq!("x*x*x".parse::<CrossTerm>().unwrap(), CrossTerm::XXX);
        assert!("y*y*y".parse::<CrossTerm>().is_err());
    }

    #[test]
    fn test_deserialize_feature_set() {
        let features: FeatureSet = serde_json::from_str(r#"["y*y", "x*x", "y*y"]"#).unwrap();
        assert_eq!(features.row_len(), 5);
        assert!(features.contains(CrossTerm::XX) && features.contains(CrossTerm::YY));
    }
}

//! Min-max feature scaling.
//!
//! Every value `v` of a column is mapped to `(v - min) / (max - min + 1)`. The `+ 1` in the
//! denominator keeps constant columns finite; it also means normalized values never reach `1`.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::Serialize;

use crate::error::{ensure_len, EngineError, Result};

/// The observed range of one column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NormalizationMeta {
    pub min: f64,
    pub max: f64,
}

impl NormalizationMeta {
    /// Computes the range of `values`.
    ///
    /// # Errors
    /// `EmptyDataset` if `values` is empty.
    pub fn of(values: ArrayView1<f64>) -> Result<Self> {
        if values.is_empty() {
            return Err(EngineError::EmptyDataset);
        }

        let (min, max) = values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), &v| {
                (min.min(v), max.max(v))
            });

        Ok(Self { min, max })
    }

    /// The denominator of the transform.
    pub fn scale(&self) -> f64 {
        self.max - self.min + 1.0
    }

    pub fn normalize(&self, value: f64) -> f64 {
        (value - self.min) / self.scale()
    }

    pub fn denormalize(&self, value: f64) -> f64 {
        self.min + value * self.scale()
    }
}

/// Which column of a row, if any, holds the constant bias feature.
///
/// The bias column is never scaled in either direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BiasColumn {
    #[default]
    Absent,
    Leading,
}

impl BiasColumn {
    fn exempts(&self, column: usize) -> bool {
        matches!(self, BiasColumn::Leading) && column == 0
    }
}

/// Per-column ranges of a dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMeta {
    columns: Vec<NormalizationMeta>,
    bias: BiasColumn,
}

impl FeatureMeta {
    /// Computes the range of every column of `dataset`.
    ///
    /// # Errors
    /// `EmptyDataset` if `dataset` has no rows.
    pub fn compute(dataset: ArrayView2<f64>, bias: BiasColumn) -> Result<Self> {
        if dataset.nrows() == 0 {
            return Err(EngineError::EmptyDataset);
        }

        let columns = dataset
            .axis_iter(Axis(1))
            .map(NormalizationMeta::of)
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { columns, bias })
    }

    pub fn column(&self, index: usize) -> Option<&NormalizationMeta> {
        self.columns.get(index)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn bias(&self) -> BiasColumn {
        self.bias
    }

    /// Scales every value of `dataset` into normalized space.
    ///
    /// # Errors
    /// `ShapeMismatch` if the column count differs from the one the meta was computed on.
    pub fn normalize(&self, dataset: ArrayView2<f64>) -> Result<Array2<f64>> {
        self.map(dataset, NormalizationMeta::normalize)
    }

    /// Maps every value of `dataset` back into the original space.
    ///
    /// # Errors
    /// `ShapeMismatch` if the column count differs from the one the meta was computed on.
    pub fn denormalize(&self, dataset: ArrayView2<f64>) -> Result<Array2<f64>> {
        self.map(dataset, NormalizationMeta::denormalize)
    }

    fn map(
        &self,
        dataset: ArrayView2<f64>,
        f: fn(&NormalizationMeta, f64) -> f64,
    ) -> Result<Array2<f64>> {
        ensure_len("dataset columns", dataset.ncols(), self.columns.len())?;

        let mut out = dataset.to_owned();
        for (index, mut column) in out.axis_iter_mut(Axis(1)).enumerate() {
            if self.bias.exempts(index) {
                continue;
            }
            let meta = &self.columns[index];
            column.mapv_inplace(|v| f(meta, v));
        }

        Ok(out)
    }
}

/// The ranges needed to move a dataset, and optionally its output, between spaces.
#[derive(Debug, Clone, PartialEq)]
pub struct Meta {
    pub features: FeatureMeta,
    pub output: Option<NormalizationMeta>,
}

/// Computes the ranges of every feature column and, if supplied, of the output.
///
/// # Errors
/// `EmptyDataset` if `dataset` has no rows, `ShapeMismatch` if `output` is not parallel to it.
pub fn compute_meta(
    dataset: ArrayView2<f64>,
    output: Option<ArrayView1<f64>>,
    bias: BiasColumn,
) -> Result<Meta> {
    let features = FeatureMeta::compute(dataset, bias)?;
    let output = output
        .map(|output| {
            ensure_len("output", output.len(), dataset.nrows())?;
            NormalizationMeta::of(output)
        })
        .transpose()?;

    Ok(Meta { features, output })
}

/// Scales `dataset` and, if supplied, `output` into normalized space.
///
/// # Errors
/// `ShapeMismatch` on a column-count mismatch, `InvalidInput` if an output is given but
/// `meta` holds no output range.
pub fn normalize(
    dataset: ArrayView2<f64>,
    output: Option<ArrayView1<f64>>,
    meta: &Meta,
) -> Result<(Array2<f64>, Option<Array1<f64>>)> {
    transform(dataset, output, meta, NormalizationMeta::normalize)
}

/// Inverse of [`normalize`].
///
/// # Errors
/// Same as [`normalize`].
pub fn denormalize(
    dataset: ArrayView2<f64>,
    output: Option<ArrayView1<f64>>,
    meta: &Meta,
) -> Result<(Array2<f64>, Option<Array1<f64>>)> {
    transform(dataset, output, meta, NormalizationMeta::denormalize)
}

fn transform(
    dataset: ArrayView2<f64>,
    output: Option<ArrayView1<f64>>,
    meta: &Meta,
    f: fn(&NormalizationMeta, f64) -> f64,
) -> Result<(Array2<f64>, Option<Array1<f64>>)> {
    let dataset = meta.features.map(dataset, f)?;
    let output = match (output, &meta.output) {
        (None, _) => None,
        (Some(output), Some(output_meta)) => Some(output.mapv(|v| f(output_meta, v))),
        (Some(_), None) => return Err(EngineError::InvalidInput("no output range to scale with")),
    };

    Ok((dataset, output))
}

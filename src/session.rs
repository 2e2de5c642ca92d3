use std::fmt;

use log::{debug, info, trace, warn};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::{
    boundary::{BoundaryCurve, BoundaryExtractor},
    config::{Task, TrainingConfig},
    error::{EngineError, Result},
    features::{polynomial_row, polynomial_rows, FeatureSet},
    geometry::{NormalLine, Point},
    normalize::{self, BiasColumn, FeatureMeta, Meta},
    perceptron::{self, Label, Perceptron, PerceptronParams},
    regression::{sample_curve, CurveDomain, LinearRegression},
    solver::{hypothesis, Solver},
};

/// Half the length of the segment drawn for a linear classifier, in normalized space.
const LINE_HALF_LENGTH: f64 = 20.0;

/// A point placed by the user, in screen space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    #[serde(flatten)]
    pub point: Point,
    #[serde(default)]
    pub label: Option<Label>,
}

/// Identifies one run of a [`TrainingSession`]. Ids from replaced runs are stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct RunId(u64);

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Finished,
    Cancelled,
}

/// What to draw after a tick, already mapped back to screen space.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Drawing {
    Curve {
        points: Vec<Point>,
    },
    Boundary {
        curves: Vec<BoundaryCurve>,
        /// Only for classifiers without cross terms.
        line: Option<(Point, Point)>,
    },
}

/// The outcome of a single tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickReport {
    pub run: RunId,
    /// 1-based number of the step just taken.
    pub iteration: usize,
    pub iterations_left: usize,
    pub cost: f64,
    /// Normalized-space coefficients after the step.
    pub coefficients: Vec<f64>,
    pub drawing: Drawing,
}

/// How a run moves between screen space and model space.
enum Projection {
    Curve {
        meta: Meta,
        domain: CurveDomain,
    },
    Boundary {
        meta: FeatureMeta,
        features: FeatureSet,
        extractor: BoundaryExtractor,
        margin: f64,
    },
}

impl Projection {
    fn draw(&self, coefficients: ArrayView1<f64>) -> Result<Drawing> {
        match self {
            Projection::Curve { meta, domain } => {
                let curve = sample_curve(coefficients, domain);
                let xs = Array2::from_shape_fn((curve.len(), 1), |(i, _)| curve[i].x);
                let ys = Array1::from_iter(curve.iter().map(|p| p.y));

                let (xs, ys) = normalize::denormalize(xs.view(), Some(ys.view()), meta)?;
                let ys = ys.ok_or(EngineError::InvalidInput("regression meta has no output range"))?;

                let points = xs.column(0).iter().zip(&ys).map(|(&x, &y)| Point::new(x, y)).collect();
                Ok(Drawing::Curve { points })
            }
            Projection::Boundary {
                meta,
                features,
                extractor,
                ..
            } => {
                let boundary = extractor.extract(coefficients, features)?;
                let curves = boundary
                    .curves
                    .into_iter()
                    .map(|curve| to_screen(meta, curve.points()).map(BoundaryCurve::new))
                    .collect::<Result<_>>()?;

                let line = if features.is_linear() {
                    NormalLine::from_weights(coefficients[0], coefficients[1], coefficients[2])
                        .map(|line| {
                            let (from, to) = line.segment(Point::ORIGIN, LINE_HALF_LENGTH);
                            to_screen(meta, &[from, to]).map(|ends| (ends[0], ends[1]))
                        })
                        .transpose()?
                } else {
                    None
                };

                Ok(Drawing::Boundary { curves, line })
            }
        }
    }
}

struct Run {
    id: RunId,
    status: RunStatus,
    solver: Box<dyn Solver + Send>,
    rows: Array2<f64>,
    output: Array1<f64>,
    coefficients: Array1<f64>,
    iteration: usize,
    iterations_left: usize,
    projection: Projection,
}

/// The samples a user placed plus, at most, one training run over them.
///
/// Runs are advanced one step at a time with [`TrainingSession::tick`], so the caller decides the
/// pace. Samples added while a run is active only take part in the next one.
#[derive(Default)]
pub struct TrainingSession {
    samples: Vec<Sample>,
    generation: u64,
    run: Option<Run>,
}

impl TrainingSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_sample(&mut self, sample: Sample) {
        self.samples.push(sample);
    }

    /// Adds an unlabeled point, as used for regression.
    pub fn add_point(&mut self, point: Point) {
        self.add_sample(Sample { point, label: None });
    }

    pub fn add_labeled_point(&mut self, point: Point, label: Label) {
        self.add_sample(Sample {
            point,
            label: Some(label),
        });
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Drops every sample and the current run, if any.
    pub fn reset(&mut self) {
        self.stop();
        self.samples.clear();
        self.run = None;
    }

    /// Starts a new run over the current samples, replacing the previous run.
    ///
    /// Normalization ranges, feature rows and coefficients are all rebuilt from scratch, so
    /// nothing carries over from earlier runs. If the config or the samples are rejected the
    /// previous run is left untouched.
    ///
    /// # Errors
    /// - `EmptyDataset` if there are no samples.
    /// - `UnlabeledSample` or `SingleClass` for a classification over unusable labels.
    /// - `InvalidInput` if a setting is out of its domain.
    pub fn start(&mut self, config: &TrainingConfig) -> Result<RunId> {
        config.validate()?;
        if self.samples.is_empty() {
            return Err(EngineError::EmptyDataset);
        }

        let id = RunId(self.generation + 1);
        let run = match &config.task {
            Task::Regression { degree, curve } => {
                self.regression_run(id, config.learning_rate, *degree, *curve)?
            }
            Task::Classification {
                margin,
                features,
                boundary,
            } => self.classification_run(
                id,
                PerceptronParams {
                    learning_rate: config.learning_rate,
                    margin: *margin,
                },
                features.clone(),
                BoundaryExtractor::new(*boundary),
            )?,
        };

        let run = Run {
            iterations_left: config.iterations,
            ..run
        };

        if let Some(previous) = self.run.as_ref().filter(|r| r.status == RunStatus::Running) {
            info!("run {} replaced by run {id}", previous.id);
        }
        info!(
            "run {id} started: {} samples, {} coefficients, {} iterations",
            run.rows.nrows(),
            run.coefficients.len(),
            config.iterations
        );

        self.generation = id.0;
        self.run = Some(run);
        Ok(id)
    }

    fn regression_run(
        &self,
        id: RunId,
        learning_rate: f64,
        degree: usize,
        domain: CurveDomain,
    ) -> Result<Run> {
        let xs = Array2::from_shape_fn((self.samples.len(), 1), |(i, _)| self.samples[i].point.x);
        let ys = Array1::from_iter(self.samples.iter().map(|s| s.point.y));

        let meta = normalize::compute_meta(xs.view(), Some(ys.view()), BiasColumn::Absent)?;
        let (xs, ys) = normalize::normalize(xs.view(), Some(ys.view()), &meta)?;
        let output = ys.ok_or(EngineError::InvalidInput("regression meta has no output range"))?;
        let rows = polynomial_rows(xs.column(0), degree);

        debug!("run {id}: fitting a degree {degree} polynomial, meta {meta:?}");

        Ok(Run {
            id,
            status: RunStatus::Running,
            solver: Box::new(LinearRegression::new(learning_rate)),
            coefficients: Array1::zeros(rows.ncols()),
            rows,
            output,
            iteration: 0,
            iterations_left: 0,
            projection: Projection::Curve { meta, domain },
        })
    }

    fn classification_run(
        &self,
        id: RunId,
        params: PerceptronParams,
        features: FeatureSet,
        extractor: BoundaryExtractor,
    ) -> Result<Run> {
        let labels = self
            .samples
            .iter()
            .enumerate()
            .map(|(index, s)| s.label.ok_or(EngineError::UnlabeledSample { index }))
            .collect::<Result<Vec<_>>>()?;

        let has = |label| labels.contains(&label);
        if !(has(Label::Positive) && has(Label::Negative)) {
            return Err(EngineError::SingleClass);
        }

        let points: Vec<Point> = self.samples.iter().map(|s| s.point).collect();
        let points = points_to_array(&points);
        let meta = FeatureMeta::compute(points.view(), BiasColumn::Absent)?;
        let normalized = meta.normalize(points.view())?;
        let rows = features.rows(normalized.column(0), normalized.column(1));
        let output = Array1::from_iter(labels.iter().map(Label::value));

        debug!("run {id}: classifying with {features:?}, meta {meta:?}");

        Ok(Run {
            id,
            status: RunStatus::Running,
            solver: Box::new(Perceptron::new(params)),
            coefficients: Array1::zeros(rows.ncols()),
            rows,
            output,
            iteration: 0,
            iterations_left: 0,
            projection: Projection::Boundary {
                meta,
                features,
                extractor,
                margin: params.margin,
            },
        })
    }

    /// Takes exactly one solver step of the run `id`.
    ///
    /// # Returns
    /// `None` if `id` is stale or the run is no longer running.
    ///
    /// # Errors
    /// Only on internal shape inconsistencies, which leave the run cancelled.
    pub fn tick(&mut self, id: RunId) -> Result<Option<TickReport>> {
        let Some(run) = self.run.as_mut().filter(|run| run.id == id) else {
            warn!("tick for stale run {id}");
            return Ok(None);
        };
        if run.status != RunStatus::Running {
            return Ok(None);
        }

        let step = run
            .solver
            .step(&mut run.coefficients, run.rows.view(), run.output.view())
            .and_then(|step| Ok((step, run.projection.draw(run.coefficients.view())?)));
        let (step, drawing) = match step {
            Ok(step) => step,
            Err(e) => {
                run.status = RunStatus::Cancelled;
                return Err(e);
            }
        };

        run.iteration += 1;
        run.iterations_left -= 1;
        trace!("run {id} iteration {}: cost {}", run.iteration, step.cost);

        if run.iterations_left == 0 {
            run.status = RunStatus::Finished;
            info!("run {id} finished with cost {}", step.cost);
        }

        Ok(Some(TickReport {
            run: id,
            iteration: run.iteration,
            iterations_left: run.iterations_left,
            cost: step.cost,
            coefficients: run.coefficients.to_vec(),
            drawing,
        }))
    }

    /// Stops the run `id` if it is still running.
    ///
    /// # Returns
    /// Whether the run was running.
    pub fn cancel(&mut self, id: RunId) -> bool {
        match self.run.as_mut() {
            Some(run) if run.id == id && run.status == RunStatus::Running => {
                run.status = RunStatus::Cancelled;
                info!("run {id} cancelled after {} iterations", run.iteration);
                true
            }
            _ => false,
        }
    }

    /// Stops whatever run is active.
    pub fn stop(&mut self) {
        if let Some(id) = self.current_run() {
            self.cancel(id);
        }
    }

    /// `None` for ids that aren't the latest run.
    pub fn status(&self, id: RunId) -> Option<RunStatus> {
        self.run.as_ref().filter(|run| run.id == id).map(|run| run.status)
    }

    /// The latest run, whatever its status.
    pub fn current_run(&self) -> Option<RunId> {
        self.run.as_ref().map(|run| run.id)
    }

    /// Evaluates the latest regression run at a screen-space `x`.
    pub fn predict(&self, x: f64) -> Option<f64> {
        let run = self.run.as_ref()?;
        let Projection::Curve { meta, .. } = &run.projection else {
            return None;
        };

        let x = meta.features.column(0)?.normalize(x);
        let degree = run.coefficients.len().saturating_sub(1);
        let y = hypothesis(run.coefficients.view(), polynomial_row(x, degree).view());
        Some(meta.output?.denormalize(y))
    }

    /// Classifies a screen-space point with the latest classification run.
    ///
    /// # Returns
    /// `None` for points inside the margin band, or when there is no classification run.
    pub fn classify(&self, point: Point) -> Option<Label> {
        let run = self.run.as_ref()?;
        let Projection::Boundary {
            meta,
            features,
            margin,
            ..
        } = &run.projection
        else {
            return None;
        };

        let normalized = meta.normalize(points_to_array(&[point]).view()).ok()?;
        let row = features.row(normalized[[0, 0]], normalized[[0, 1]]);
        perceptron::classify(hypothesis(run.coefficients.view(), row.view()), *margin)
    }
}

fn points_to_array(points: &[Point]) -> Array2<f64> {
    Array2::from_shape_fn((points.len(), 2), |(i, j)| match j {
        0 => points[i].x,
        _ => points[i].y,
    })
}

fn array_to_points(array: ArrayView2<f64>) -> Vec<Point> {
    array
        .rows()
        .into_iter()
        .map(|row| Point::new(row[0], row[1]))
        .collect()
}

fn to_screen(meta: &FeatureMeta, points: &[Point]) -> Result<Vec<Point>> {
    let screen = meta.denormalize(points_to_array(points).view())?;
    Ok(array_to_points(screen.view()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::CrossTerm;

    fn line_session() -> TrainingSession {
        let mut session = TrainingSession::new();
        for x in [100., 200., 300., 400., 500.] {
            session.add_point(Point::new(x, 0.5 * x + 100.));
        }
        session
    }

    fn two_blobs() -> TrainingSession {
        let mut session = TrainingSession::new();
        for (x, y) in [(400., 100.), (450., 300.), (500., 200.)] {
            session.add_labeled_point(Point::new(x, y), Label::Positive);
        }
        for (x, y) in [(100., 150.), (150., 350.), (200., 50.)] {
            session.add_labeled_point(Point::new(x, y), Label::Negative);
        }
        session
    }

    fn linear_classification(iterations: usize) -> TrainingConfig {
        TrainingConfig::classification(FeatureSet::linear(), 0.05, 0.1, iterations)
    }

    #[test]
    fn test_start_rejects_empty_session() {
        let mut session = TrainingSession::new();
        let err = session.start(&TrainingConfig::regression(1, 0.1, 10)).unwrap_err();
        assert!(matches!(err, EngineError::EmptyDataset));
        assert_eq!(session.current_run(), None);
    }

    #[test]
    fn test_start_rejects_unusable_labels() {
        let mut session = two_blobs();
        session.add_point(Point::new(10., 10.));
        let err = session.start(&linear_classification(10)).unwrap_err();
        assert!(matches!(err, EngineError::UnlabeledSample { index: 6 }));

        let mut session = TrainingSession::new();
        session.add_labeled_point(Point::new(1., 1.), Label::Positive);
        session.add_labeled_point(Point::new(2., 2.), Label::Positive);
        let err = session.start(&linear_classification(10)).unwrap_err();
        assert!(matches!(err, EngineError::SingleClass));
    }

    #[test]
    fn test_rejected_start_keeps_previous_run() {
        let mut session = line_session();
        let id = session.start(&TrainingConfig::regression(1, 0.1, 10)).unwrap();

        assert!(session.start(&TrainingConfig::regression(1, -1., 10)).is_err());
        assert_eq!(session.status(id), Some(RunStatus::Running));
        assert!(session.tick(id).unwrap().is_some());
    }

    #[test]
    fn test_regression_run_finishes_after_its_budget() {
        let mut session = line_session();
        let id = session.start(&TrainingConfig::regression(2, 0.1, 3)).unwrap();

        for i in 1..=3 {
            let report = session.tick(id).unwrap().unwrap();
            assert_eq!(report.iteration, i);
            assert_eq!(report.iterations_left, 3 - i);
            assert_eq!(report.coefficients.len(), 3);
            let Drawing::Curve { points } = report.drawing else {
                panic!("expected a curve");
            };
            assert_eq!(points.len(), 500);
        }

        assert_eq!(session.status(id), Some(RunStatus::Finished));
        assert!(session.tick(id).unwrap().is_none());
    }

    #[test]
    fn test_regression_fits_screen_space_line() {
        let mut session = line_session();
        let id = session.start(&TrainingConfig::regression(1, 0.1, 2000)).unwrap();

        let mut last = None;
        while let Some(report) = session.tick(id).unwrap() {
            last = Some(report);
        }
        let last = last.unwrap();
        assert!(last.cost < 1e-12, "cost {}", last.cost);

        for x in [150., 300., 450.] {
            let y = session.predict(x).unwrap();
            assert!((y - (0.5 * x + 100.)).abs() < 1e-3, "f({x}) = {y}");
        }
        // the drawn curve lives in screen space too
        let Drawing::Curve { points } = last.drawing else {
            panic!("expected a curve");
        };
        for p in points {
            assert!((p.y - (0.5 * p.x + 100.)).abs() < 1e-2, "{p:?}");
        }
    }

    #[test]
    fn test_new_run_makes_previous_id_stale() {
        let mut session = line_session();
        let first = session.start(&TrainingConfig::regression(1, 0.1, 100)).unwrap();
        for _ in 0..10 {
            session.tick(first).unwrap();
        }

        let second = session.start(&TrainingConfig::regression(1, 0.1, 100)).unwrap();
        assert_ne!(first, second);
        assert!(session.tick(first).unwrap().is_none());
        assert_eq!(session.status(first), None);

        let report = session.tick(second).unwrap().unwrap();
        assert_eq!(report.iteration, 1);
        assert_eq!(report.iterations_left, 99);
    }

    #[test]
    fn test_cancel_and_reset() {
        let mut session = line_session();
        let id = session.start(&TrainingConfig::regression(1, 0.1, 100)).unwrap();

        assert!(session.cancel(id));
        assert!(!session.cancel(id));
        assert_eq!(session.status(id), Some(RunStatus::Cancelled));
        assert!(session.tick(id).unwrap().is_none());

        session.reset();
        assert!(session.samples().is_empty());
        assert_eq!(session.current_run(), None);
        assert_eq!(session.predict(100.), None);
    }

    #[test]
    fn test_samples_added_mid_run_wait_for_next_run() {
        let mut session = line_session();
        let id = session.start(&TrainingConfig::regression(1, 0.1, 10)).unwrap();
        session.add_point(Point::new(1000., -1000.));

        let report = session.tick(id).unwrap().unwrap();
        // same step as a run over the five original points
        let mut fresh = line_session();
        let fresh_id = fresh.start(&TrainingConfig::regression(1, 0.1, 10)).unwrap();
        assert_eq!(report.coefficients, fresh.tick(fresh_id).unwrap().unwrap().coefficients);
    }

    #[test]
    fn test_classification_separates_blobs() {
        let mut session = two_blobs();
        let id = session.start(&linear_classification(2000)).unwrap();

        let mut last = None;
        while let Some(report) = session.tick(id).unwrap() {
            last = Some(report);
        }
        let last = last.unwrap();
        assert_eq!(last.cost, 0.);

        for sample in session.samples() {
            assert_eq!(session.classify(sample.point), sample.label);
        }
        let Drawing::Boundary { line, .. } = last.drawing else {
            panic!("expected a boundary");
        };
        let (from, to) = line.unwrap();
        let side = |p: Point| {
            ((to.x - from.x) * (p.y - from.y) - (to.y - from.y) * (p.x - from.x)).signum()
        };
        let positive = side(Point::new(450., 300.));
        for sample in session.samples() {
            let expected = match sample.label {
                Some(Label::Positive) => positive,
                _ => -positive,
            };
            assert_eq!(side(sample.point), expected, "{sample:?}");
        }
    }

    #[test]
    fn test_cross_terms_draw_curves_only() {
        let mut session = two_blobs();
        let features: FeatureSet = [CrossTerm::XX, CrossTerm::YY].into_iter().collect();
        let config = TrainingConfig::classification(features, 0., 0.1, 50);
        let id = session.start(&config).unwrap();

        let report = session.tick(id).unwrap().unwrap();
        assert_eq!(report.coefficients.len(), 5);
        let Drawing::Boundary { line, .. } = report.drawing else {
            panic!("expected a boundary");
        };
        assert!(line.is_none());
    }

    #[test]
    fn test_sample_json_shape() {
        let sample: Sample =
            serde_json::from_str(r#"{ "x": 1.5, "y": -2.0, "label": "negative" }"#).unwrap();
        assert_eq!(sample.point, Point::new(1.5, -2.));
        assert_eq!(sample.label, Some(Label::Negative));

        let sample: Sample = serde_json::from_str(r#"{ "x": 0.0, "y": 0.0 }"#).unwrap();
        assert_eq!(sample.label, None);
    }
}

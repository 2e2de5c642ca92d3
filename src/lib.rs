//! An interactive machine learning playground engine.
//!
//! Users place points on a canvas; the engine fits them either with a polynomial regression or
//! with a margin perceptron, one resumable step at a time, and reports what to draw after every
//! step.

pub mod boundary;
pub mod config;
pub mod driver;
pub mod error;
pub mod features;
pub mod geometry;
pub mod normalize;
pub mod perceptron;
pub mod regression;
pub mod session;
pub mod solver;

pub use boundary::{Boundary, BoundaryCurve, BoundaryDomain, BoundaryExtractor};
pub use config::{SceneConfig, Task, TrainingConfig};
pub use driver::{RunSummary, TickDriver};
pub use error::{EngineError, Result};
pub use features::{CrossTerm, FeatureSet};
pub use geometry::{NormalLine, Point};
pub use perceptron::{Label, Perceptron, PerceptronParams};
pub use regression::{CurveDomain, LinearRegression};
pub use session::{Drawing, RunId, RunStatus, Sample, TickReport, TrainingSession};
pub use solver::{Solver, StepReport};

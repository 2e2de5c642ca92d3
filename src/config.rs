use std::{fs, path::Path, time::Duration};

use serde::Deserialize;

use crate::{
    boundary::BoundaryDomain,
    error::{EngineError, Result},
    features::FeatureSet,
    regression::CurveDomain,
    session::{Sample, TrainingSession},
};

/// What gets fitted during a run.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Task {
    /// A polynomial `y = f(x)` fitted by least squares.
    Regression {
        #[serde(default = "default_degree")]
        degree: usize,
        #[serde(default)]
        curve: CurveDomain,
    },
    /// A two-class margin perceptron over `[1, x, y, <features>]`.
    Classification {
        #[serde(default)]
        margin: f64,
        #[serde(default)]
        features: FeatureSet,
        #[serde(default)]
        boundary: BoundaryDomain,
    },
}

impl Task {
    /// The learning rate used when a scene leaves it out.
    pub fn default_learning_rate(&self) -> f64 {
        match self {
            Task::Regression { .. } => 0.1,
            Task::Classification { .. } => 0.001,
        }
    }
}

/// The settings of a single run.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "TrainingFile")]
pub struct TrainingConfig {
    pub learning_rate: f64,
    pub iterations: usize,
    pub task: Task,
}

/// `training` as written in a scene file, before task-dependent defaults are filled in.
#[derive(Deserialize)]
struct TrainingFile {
    learning_rate: Option<f64>,
    #[serde(default = "default_iterations")]
    iterations: usize,
    task: Task,
}

impl From<TrainingFile> for TrainingConfig {
    fn from(file: TrainingFile) -> Self {
        Self {
            learning_rate: file
                .learning_rate
                .unwrap_or_else(|| file.task.default_learning_rate()),
            iterations: file.iterations,
            task: file.task,
        }
    }
}

impl TrainingConfig {
    pub fn regression(degree: usize, learning_rate: f64, iterations: usize) -> Self {
        Self {
            learning_rate,
            iterations,
            task: Task::Regression {
                degree,
                curve: CurveDomain::default(),
            },
        }
    }

    pub fn classification(
        features: FeatureSet,
        margin: f64,
        learning_rate: f64,
        iterations: usize,
    ) -> Self {
        Self {
            learning_rate,
            iterations,
            task: Task::Classification {
                margin,
                features,
                boundary: BoundaryDomain::default(),
            },
        }
    }

    /// Checks every setting against its domain. Sample-dependent checks happen when a run starts.
    ///
    /// # Errors
    /// `InvalidInput` naming the first offending setting.
    pub fn validate(&self) -> Result<()> {
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(EngineError::InvalidInput("learning rate must be a positive number"));
        }
        if self.iterations == 0 {
            return Err(EngineError::InvalidInput("at least one iteration is needed"));
        }

        match &self.task {
            Task::Regression { curve, .. } => curve.validate()?,
            Task::Classification {
                margin, boundary, ..
            } => {
                if !(margin.is_finite() && *margin >= 0.0) {
                    return Err(EngineError::InvalidInput("margin must be a non-negative number"));
                }
                boundary.validate()?;
            }
        }

        Ok(())
    }
}

/// A scene file: the samples a user placed plus how to fit them.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SceneConfig {
    pub training: TrainingConfig,
    #[serde(default)]
    pub samples: Vec<Sample>,
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

impl SceneConfig {
    /// Loads a [`SceneConfig`] from a JSON file.
    ///
    /// # Errors
    /// `Io` if the file cannot be read, `Config` if it cannot be parsed, `InvalidInput` if a
    /// setting is out of its domain.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// # Errors
    /// Same as [`SceneConfig::load`], minus the I/O.
    pub fn from_json(content: &str) -> Result<Self> {
        let scene: Self = serde_json::from_str(content)?;
        scene.training.validate()?;
        Ok(scene)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    /// A fresh session holding the scene's samples.
    pub fn session(&self) -> TrainingSession {
        let mut session = TrainingSession::new();
        for sample in &self.samples {
            session.add_sample(*sample);
        }
        session
    }
}

fn default_degree() -> usize {
    1
}

fn default_iterations() -> usize {
    10000
}

fn default_tick_interval_ms() -> u64 {
    16
}

use std::path::Path;
use std::sync::OnceLock;

use crate::error::{ModelLoadError, PredictError};
use crate::models::{ClinicalRecord, FeatureVector, PredictionResult};
use crate::tree::{DecisionTreeModel, PathStep, TreeDescription};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredictorState {
    Unloaded,
    Loaded,
}

/// Holds the process-wide classifier.
///
/// Starts unloaded; [`TreePredictor::load`] is the only transition and it
/// happens at most once. After that the model is shared read-only, so the
/// predictor can be used from any number of threads without locking.
#[derive(Debug, Default)]
pub struct TreePredictor {
    model: OnceLock<DecisionTreeModel>,
}

impl TreePredictor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the artifact at `path` and moves to the loaded state. On failure
    /// the predictor stays unloaded.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<&DecisionTreeModel, ModelLoadError> {
        if self.model.get().is_some() {
            return Err(ModelLoadError::AlreadyLoaded);
        }
        let model = DecisionTreeModel::load(path)?;
        self.install(model)
    }

    /// Moves to the loaded state with an already parsed model.
    pub fn install(&self, model: DecisionTreeModel) -> Result<&DecisionTreeModel, ModelLoadError> {
        self.model
            .set(model)
            .map_err(|_| ModelLoadError::AlreadyLoaded)?;
        self.model.get().ok_or(ModelLoadError::AlreadyLoaded)
    }

    pub fn state(&self) -> PredictorState {
        if self.model.get().is_some() {
            PredictorState::Loaded
        } else {
            PredictorState::Unloaded
        }
    }

    pub fn model(&self) -> Result<&DecisionTreeModel, PredictError> {
        self.model.get().ok_or(PredictError::NotLoaded)
    }

    pub fn predict(&self, features: &[f64]) -> Result<PredictionResult, PredictError> {
        self.model()?.predict(features)
    }

    pub fn predict_record(&self, record: &ClinicalRecord) -> Result<PredictionResult, PredictError> {
        self.predict(FeatureVector::from(record).as_slice())
    }

    pub fn decision_path(&self, features: &[f64]) -> Result<Vec<PathStep>, PredictError> {
        self.model()?.decision_path(features)
    }

    pub fn describe(&self) -> Result<TreeDescription<'_>, PredictError> {
        Ok(self.model()?.describe())
    }
}

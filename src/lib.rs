//! Heart failure risk prediction with a pre-trained CART decision tree.
//!
//! Raw form values go through [`validate`] into a [`ClinicalRecord`], are laid
//! out as a [`FeatureVector`] and routed through the tree held by a
//! [`TreePredictor`]. [`TreePredictor::describe`] exposes the tree itself for
//! rendering; [`report`] has text and Graphviz renderers.

pub mod batch;
pub mod error;
pub mod models;
pub mod predictor;
pub mod report;
pub mod tree;
pub mod validate;

#[cfg(test)]
mod test_support;

pub use error::{
    BatchError, ModelLoadError, PredictError, ValidationError, ValidationErrorKind,
};
pub use models::{
    BinaryChoice, ClinicalRecord, FeatureVector, Field, FieldKind, Flag, Outcome,
    PredictionResult, Sex, FEATURE_COUNT,
};
pub use predictor::{PredictorState, TreePredictor};
pub use tree::{DecisionTreeModel, NodeDescriptor, NodeRole, PathStep, Side, TreeDescription};
pub use validate::{to_vector, validate, validate_encoded, RawRecord};

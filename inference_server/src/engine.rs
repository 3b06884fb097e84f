use feature_processing::misc::FeatureVector;
use log::{debug, warn};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::bundle::ModelBundle;
use crate::error::InferenceError;
use crate::model::{Label, argmax};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    #[serde(rename = "class")]
    pub class_name: String,
    pub confidence: f64,
    pub version: String,
}

/// Why the reported class came from the calibrator's argmax instead of the classifier.
#[derive(Debug, Clone, PartialEq)]
pub enum ReconciliationFallback {
    /// Integer code outside the bundle's class list.
    CodeOutOfRange(i64),
    /// Predicted label absent from the calibrator's labels.
    LabelNotCalibrated(Label),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Inference {
    pub recommendation: Recommendation,
    pub fallback: Option<ReconciliationFallback>,
}

/// Holds the resident model bundle. Requests read a shared snapshot, so a
/// bundle swap never affects an evaluation already in progress.
#[derive(Default)]
pub struct InferenceEngine {
    bundle: RwLock<Option<Arc<ModelBundle>>>,
}

impl InferenceEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bundle(bundle: ModelBundle) -> Self {
        let engine = Self::new();
        engine.install(bundle);
        engine
    }

    pub fn install(&self, bundle: ModelBundle) {
        *self.bundle.write() = Some(Arc::new(bundle));
    }

    pub fn bundle(&self) -> Result<Arc<ModelBundle>, InferenceError> {
        self.bundle.read().clone().ok_or(InferenceError::ModelNotLoaded)
    }

    pub fn recommend(&self, features: &FeatureVector) -> Result<Inference, InferenceError> {
        let bundle = self.bundle()?;
        let x = encode(&bundle, features)?;

        let predicted = bundle
            .classifier
            .predict(&x)
            .ok_or_else(|| InferenceError::Evaluation("classifier produced no label".to_string()))?;
        let probs = bundle
            .calibrator
            .predict_proba(&x)
            .ok_or_else(|| InferenceError::Evaluation("calibrator produced no probabilities".to_string()))?;

        let (class_name, confidence, fallback) = reconcile(&bundle, predicted, &probs)?;
        if let Some(reason) = &fallback {
            warn!("Reconciliation fell back to calibrator argmax: {:?}", reason);
        }
        debug!("Predicted {} -> {} ({:.3})", predicted, class_name, confidence);

        Ok(Inference {
            recommendation: Recommendation {
                class_name,
                confidence: clamp_confidence(confidence),
                version: bundle.version.clone(),
            },
            fallback,
        })
    }
}

/// Feature values in the bundle's feature order, booleans as 0.0 / 1.0.
pub fn encode(bundle: &ModelBundle, features: &FeatureVector) -> Result<Vec<f64>, InferenceError> {
    bundle
        .feature_order
        .iter()
        .map(|name| {
            features
                .value_of(name)
                .filter(|v| v.is_finite())
                .ok_or_else(|| InferenceError::InvalidFeature(name.clone()))
        })
        .collect()
}

fn calibrated_index(bundle: &ModelBundle, predicted: &Label, name: &str) -> Option<usize> {
    let labels = &bundle.calibrator.classes;
    labels.iter().position(|l| l == predicted).or_else(|| {
        labels
            .iter()
            .position(|l| bundle.class_name(l).as_deref() == Some(name))
    })
}

/// The classifier decides the class and the calibrator only scores it.
/// When the two disagree on label encoding, both come from the calibrator's argmax.
fn reconcile(
    bundle: &ModelBundle,
    predicted: &Label,
    probs: &[f64],
) -> Result<(String, f64, Option<ReconciliationFallback>), InferenceError> {
    let resolved = bundle.class_name(predicted);
    if let Some(name) = &resolved {
        if let Some(idx) = calibrated_index(bundle, predicted, name) {
            let confidence = probs.get(idx).copied().unwrap_or(0.0);
            return Ok((name.clone(), confidence, None));
        }
    }

    let reason = match (predicted, resolved) {
        (Label::Code(c), None) => ReconciliationFallback::CodeOutOfRange(*c),
        _ => ReconciliationFallback::LabelNotCalibrated(predicted.clone()),
    };
    let best = argmax(probs)
        .ok_or_else(|| InferenceError::Evaluation("calibrator probabilities are empty".to_string()))?;
    let name = bundle
        .calibrator
        .classes
        .get(best)
        .and_then(|l| bundle.class_name(l))
        .ok_or_else(|| InferenceError::Evaluation(format!("calibrator label {best} has no name")))?;
    Ok((name, probs[best], Some(reason)))
}

fn clamp_confidence(c: f64) -> f64 {
    if c.is_nan() { 0.0 } else { c.clamp(0.0, 1.0) }
}

use feature_processing::misc::FEATURE_ORDER;
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::error::BundleError;
use crate::model::{Calibrator, DecisionTree, Label, Node};

/// The single training/serving artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelBundle {
    pub classifier: DecisionTree,
    pub calibrator: Calibrator,
    /// Integer class codes index into this list.
    pub class_names: Vec<String>,
    pub feature_order: Vec<String>,
    pub version: String,
}

fn all_finite(values: &[f64]) -> bool {
    values.iter().all(|v| v.is_finite())
}

fn invalid(msg: impl Into<String>) -> BundleError {
    BundleError::Invalid(msg.into())
}

impl ModelBundle {
    /// Reads a bundle, JSON for `.json` paths and bincode otherwise, and validates it.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, BundleError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let bundle: ModelBundle = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_slice(&bytes)?,
            _ => bincode::deserialize(&bytes)?,
        };
        bundle.validate()?;

        info!(
            "Loaded model bundle {} ({} classes) from {}",
            bundle.version,
            bundle.class_names.len(),
            path.display()
        );
        Ok(bundle)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), BundleError> {
        let path = path.as_ref();
        let bytes = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::to_vec_pretty(self)?,
            _ => bincode::serialize(self)?,
        };
        std::fs::write(path, bytes)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), BundleError> {
        if self.class_names.is_empty() {
            return Err(invalid("class list is empty"));
        }

        let mut seen = HashSet::new();
        for name in &self.feature_order {
            if !FEATURE_ORDER.contains(&name.as_str()) {
                return Err(invalid(format!("unknown feature {name:?}")));
            }
            if !seen.insert(name.as_str()) {
                return Err(invalid(format!("duplicate feature {name:?}")));
            }
        }
        if seen.len() != FEATURE_ORDER.len() {
            return Err(invalid(format!(
                "feature order names {} of {} features",
                seen.len(),
                FEATURE_ORDER.len()
            )));
        }

        // Classifier codes are resolved at prediction time; out-of-range ones fall back there.
        if self.classifier.classes.is_empty() {
            return Err(invalid("classifier has no labels"));
        }
        self.validate_tree("classifier", &self.classifier)?;

        let calibrator = &self.calibrator;
        self.validate_calibrator_labels(&calibrator.classes)?;
        if calibrator.folds.is_empty() {
            return Err(invalid("calibrator has no folds"));
        }
        for (i, fold) in calibrator.folds.iter().enumerate() {
            if fold.estimator.classes.len() != calibrator.classes.len() {
                return Err(invalid(format!("calibrator fold {i} label count mismatch")));
            }
            self.validate_tree("calibrator fold", &fold.estimator)?;
            if fold.curves.len() != calibrator.classes.len() {
                return Err(invalid(format!("calibrator fold {i} needs one curve per class")));
            }
            for curve in &fold.curves {
                if curve.x.is_empty() || curve.x.len() != curve.y.len() {
                    return Err(invalid(format!("calibrator fold {i} has a malformed curve")));
                }
                if !all_finite(&curve.x) || !all_finite(&curve.y) {
                    return Err(invalid(format!("calibrator fold {i} curve has a non-finite point")));
                }
                if curve.x.windows(2).any(|w| w[0] > w[1]) {
                    return Err(invalid(format!("calibrator fold {i} curve is not sorted")));
                }
            }
        }
        Ok(())
    }

    fn validate_calibrator_labels(&self, labels: &[Label]) -> Result<(), BundleError> {
        if labels.is_empty() {
            return Err(invalid("calibrator has no labels"));
        }
        for label in labels {
            if self.class_name(label).is_none() {
                return Err(invalid(format!("calibrator label code {label} outside class list")));
            }
        }
        Ok(())
    }

    fn validate_tree(&self, owner: &str, tree: &DecisionTree) -> Result<(), BundleError> {
        if tree.nodes.is_empty() {
            return Err(invalid(format!("{owner} tree is empty")));
        }
        let width = tree.classes.len();
        for (i, node) in tree.nodes.iter().enumerate() {
            match node {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if !threshold.is_finite() {
                        return Err(invalid(format!("{owner} node {i} has a non-finite threshold")));
                    }
                    if *feature >= self.feature_order.len() {
                        return Err(invalid(format!("{owner} node {i} splits on feature {feature}")));
                    }
                    for child in [*left, *right] {
                        if child <= i || child >= tree.nodes.len() {
                            return Err(invalid(format!("{owner} node {i} has bad child {child}")));
                        }
                    }
                }
                Node::Leaf { value } => {
                    if value.len() != width {
                        return Err(invalid(format!(
                            "{owner} leaf {i} has {} weights for {width} labels",
                            value.len()
                        )));
                    }
                    if !all_finite(value) {
                        return Err(invalid(format!("{owner} leaf {i} has a non-finite weight")));
                    }
                }
            }
        }
        Ok(())
    }

    /// Display name of a label, `None` for out-of-range codes.
    pub fn class_name(&self, label: &Label) -> Option<String> {
        match label {
            Label::Code(c) => usize::try_from(*c)
                .ok()
                .and_then(|i| self.class_names.get(i))
                .cloned(),
            Label::Name(n) => Some(n.clone()),
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::model::{CalibratedFold, IsotonicCurve};

    pub const CLASSES: [&str; 5] = ["NO_ACTION", "IRON_CONDOR", "DEBIT_CALL", "DEBIT_PUT", "COVERED_CALL"];

    pub fn codes() -> Vec<Label> {
        (0..CLASSES.len() as i64).map(Label::Code).collect()
    }

    /// Single leaf predicting `label` with the given leaf weights.
    pub fn constant_tree(classes: Vec<Label>, value: Vec<f64>) -> DecisionTree {
        DecisionTree {
            classes,
            nodes: vec![Node::Leaf { value }],
        }
    }

    /// Calibrator whose output is exactly `probs`.
    pub fn calibrator(classes: Vec<Label>, probs: Vec<f64>) -> Calibrator {
        let identity = IsotonicCurve {
            x: vec![0.0, 1.0],
            y: vec![0.0, 1.0],
        };
        Calibrator {
            folds: vec![CalibratedFold {
                estimator: constant_tree(classes.clone(), probs.clone()),
                curves: vec![identity; classes.len()],
            }],
            classes,
        }
    }

    pub fn bundle(classifier: DecisionTree, calibrator: Calibrator) -> ModelBundle {
        ModelBundle {
            classifier,
            calibrator,
            class_names: CLASSES.iter().map(|c| c.to_string()).collect(),
            feature_order: FEATURE_ORDER.iter().map(|f| f.to_string()).collect(),
            version: "v0001".to_string(),
        }
    }

    pub fn simple() -> ModelBundle {
        let mut weights = vec![0.0; 5];
        weights[2] = 1.0;
        bundle(
            constant_tree(codes(), weights),
            calibrator(codes(), vec![0.1, 0.1, 0.6, 0.1, 0.1]),
        )
    }
}

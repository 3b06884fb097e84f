//! Serving-side tree classifier and isotonic-calibrated probability model.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A class label as fitted: either an integer code into the bundle's
/// class-name list or the class name itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Label {
    Code(i64),
    Name(String),
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Code(c) => write!(f, "{c}"),
            Label::Name(n) => f.write_str(n),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Node {
    /// `x[feature] <= threshold` goes to `left`.
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    /// Per-class weights, aligned with the owning tree's labels.
    Leaf { value: Vec<f64> },
}

/// Binary decision tree stored as a flat node array rooted at index 0.
/// Children always sit after their parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    pub classes: Vec<Label>,
    pub nodes: Vec<Node>,
}

impl DecisionTree {
    /// Leaf weights reached by `x`; `None` on a malformed tree or short input.
    pub fn leaf(&self, x: &[f64]) -> Option<&[f64]> {
        let mut idx = 0;
        for _ in 0..self.nodes.len() {
            match self.nodes.get(idx)? {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if *x.get(*feature)? <= *threshold { *left } else { *right };
                }
                Node::Leaf { value } => return Some(value),
            }
        }
        None
    }

    pub fn predict(&self, x: &[f64]) -> Option<&Label> {
        let weights = self.leaf(x)?;
        self.classes.get(argmax(weights)?)
    }
}

/// Piecewise-linear non-decreasing map, flat beyond its end points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsotonicCurve {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

impl IsotonicCurve {
    /// A NaN input maps to the curve's low end.
    pub fn apply(&self, v: f64) -> f64 {
        let (Some(&x0), Some(&xn), Some(&y0), Some(&yn)) =
            (self.x.first(), self.x.last(), self.y.first(), self.y.last())
        else {
            return v;
        };
        if v.is_nan() || v <= x0 {
            return y0;
        }
        if v >= xn {
            return yn;
        }

        // x[hi - 1] < v < x[hi]
        let hi = self.x.partition_point(|&p| p <= v);
        let Some(lo) = hi.checked_sub(1) else {
            return y0;
        };
        let (Some(&xa), Some(&xb), Some(&ya), Some(&yb)) =
            (self.x.get(lo), self.x.get(hi), self.y.get(lo), self.y.get(hi))
        else {
            return yn;
        };
        if xb == xa {
            return yb;
        }
        ya + (yb - ya) * (v - xa) / (xb - xa)
    }
}

/// One cross-validation fold: an uncalibrated tree plus one curve per class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibratedFold {
    pub estimator: DecisionTree,
    pub curves: Vec<IsotonicCurve>,
}

impl CalibratedFold {
    fn predict_proba(&self, x: &[f64]) -> Option<Vec<f64>> {
        let raw = self.estimator.leaf(x)?;
        let calibrated: Vec<f64> = raw
            .iter()
            .zip(&self.curves)
            .map(|(p, curve)| curve.apply(*p).max(0.0))
            .collect();

        let total: f64 = calibrated.iter().sum();
        if total > 0.0 {
            Some(calibrated.iter().map(|p| p / total).collect())
        } else {
            let k = calibrated.len() as f64;
            Some(vec![1.0 / k; calibrated.len()])
        }
    }
}

/// Probability model over its own label ordering, averaged across folds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Calibrator {
    pub classes: Vec<Label>,
    pub folds: Vec<CalibratedFold>,
}

impl Calibrator {
    pub fn predict_proba(&self, x: &[f64]) -> Option<Vec<f64>> {
        if self.folds.is_empty() {
            return None;
        }
        let mut mean = vec![0.0; self.classes.len()];
        for fold in &self.folds {
            let probs = fold.predict_proba(x)?;
            if probs.len() != mean.len() {
                return None;
            }
            mean.iter_mut().zip(probs).for_each(|(m, p)| *m += p);
        }
        let n = self.folds.len() as f64;
        Some(mean.into_iter().map(|m| m / n).collect())
    }
}

/// Index of the first largest value, NaN ignored.
pub fn argmax(values: &[f64]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .filter(|(_, v)| !v.is_nan())
        .fold(None, |best: Option<(usize, f64)>, (i, &v)| match best {
            Some((_, b)) if b >= v => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stump(threshold: f64, left: Vec<f64>, right: Vec<f64>) -> DecisionTree {
        DecisionTree {
            classes: vec![Label::Code(0), Label::Code(1)],
            nodes: vec![
                Node::Split {
                    feature: 0,
                    threshold,
                    left: 1,
                    right: 2,
                },
                Node::Leaf { value: left },
                Node::Leaf { value: right },
            ],
        }
    }

    #[test]
    fn split_goes_left_on_equal() {
        let tree = stump(0.5, vec![3.0, 1.0], vec![0.0, 2.0]);
        assert_eq!(tree.predict(&[0.5]), Some(&Label::Code(0)));
        assert_eq!(tree.predict(&[0.51]), Some(&Label::Code(1)));
        assert_eq!(tree.leaf(&[]), None);
    }

    #[test]
    fn cyclic_tree_does_not_hang() {
        let tree = DecisionTree {
            classes: vec![Label::Code(0)],
            nodes: vec![Node::Split {
                feature: 0,
                threshold: 0.0,
                left: 0,
                right: 0,
            }],
        };
        assert_eq!(tree.leaf(&[1.0]), None);
    }

    #[test]
    fn isotonic_interpolates_and_clips() {
        let curve = IsotonicCurve {
            x: vec![0.0, 0.5, 1.0],
            y: vec![0.1, 0.3, 0.9],
        };
        assert_eq!(curve.apply(-1.0), 0.1);
        assert_eq!(curve.apply(2.0), 0.9);
        assert_eq!(curve.apply(0.5), 0.3);
        assert!((curve.apply(0.75) - 0.6).abs() < 1e-12);
        assert!((curve.apply(0.25) - 0.2).abs() < 1e-12);
    }

    #[test]
    fn isotonic_tolerates_non_finite_points() {
        let curve = IsotonicCurve {
            x: vec![0.0, 1.0],
            y: vec![0.2, 0.8],
        };
        assert_eq!(curve.apply(f64::NAN), 0.2);
        assert_eq!(curve.apply(f64::NEG_INFINITY), 0.2);
        assert_eq!(curve.apply(f64::INFINITY), 0.8);

        let broken = IsotonicCurve {
            x: vec![f64::NAN, 1.0],
            y: vec![0.0, 1.0],
        };
        assert_eq!(broken.apply(0.5), 0.0);
    }

    #[test]
    fn calibrator_renormalizes_and_averages_folds() {
        let identity = IsotonicCurve {
            x: vec![0.0, 1.0],
            y: vec![0.0, 1.0],
        };
        let fold = |left: Vec<f64>| CalibratedFold {
            estimator: stump(0.0, left, vec![0.5, 0.5]),
            curves: vec![identity.clone(), identity.clone()],
        };
        let calibrator = Calibrator {
            classes: vec![Label::Code(0), Label::Code(1)],
            folds: vec![fold(vec![0.6, 0.2]), fold(vec![0.0, 0.0])],
        };

        // fold 1: 0.75 / 0.25, fold 2 has no mass so falls back to uniform
        let probs = calibrator.predict_proba(&[-1.0]).unwrap();
        assert!((probs[0] - 0.625).abs() < 1e-12);
        assert!((probs[1] - 0.375).abs() < 1e-12);
    }

    #[test]
    fn argmax_prefers_first_and_skips_nan() {
        assert_eq!(argmax(&[0.2, 0.5, 0.5]), Some(1));
        assert_eq!(argmax(&[f64::NAN, 0.1]), Some(1));
        assert_eq!(argmax(&[]), None);
    }
}

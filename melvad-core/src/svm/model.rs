//! Trained C-SVC model and its JSON artifact.
//!
//! ## Artifact layout
//!
//! ```text
//! {
//!   "formatVersion": 1,
//!   "numFeatures": 26,
//!   "kernel": { "kind": "rbf", "degree": 3, "gamma": 0.038, "coef0": 0.0 },
//!   "labels": [1, -1],
//!   "machines": [
//!     { "positive": 0, "negative": 1, "rho": 0.42,
//!       "supportVectors": [{ "coef": 1.0, "nodes": [{"index":1,"value":-3.1}, ..., {"index":-1,"value":0.0}] }],
//!       "sigmoid": { "a": -2.1, "b": 0.03 } }
//!   ]
//! }
//! ```
//!
//! One machine per unordered label pair; `positive`/`negative` index `labels`.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::kernel::Kernel;
use super::probability::{couple, Sigmoid};
use super::sparse::SvmNode;
use crate::error::{Result, VadError};

pub const MODEL_FORMAT_VERSION: u32 = 1;

/// Pairwise probabilities are kept away from 0 and 1 before coupling.
const MIN_PAIR_PROBABILITY: f64 = 1e-7;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportVector {
    /// `αᵢ·yᵢ` for this machine.
    pub coef: f64,
    pub nodes: Vec<SvmNode>,
}

/// One two-class decision function `f(x) = Σ coefᵢ·K(svᵢ, x) − rho`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BinaryMachine {
    pub positive: usize,
    pub negative: usize,
    pub rho: f64,
    pub support_vectors: Vec<SupportVector>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sigmoid: Option<Sigmoid>,
}

impl BinaryMachine {
    pub fn decision_value(&self, kernel: &Kernel, x: &[SvmNode]) -> f64 {
        self.support_vectors
            .iter()
            .map(|sv| sv.coef * kernel.eval(&sv.nodes, x))
            .sum::<f64>()
            - self.rho
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SvmModel {
    pub format_version: u32,
    pub num_features: usize,
    pub kernel: Kernel,
    /// Distinct training labels in order of first appearance.
    pub labels: Vec<i32>,
    pub machines: Vec<BinaryMachine>,
}

impl SvmModel {
    /// Predicted label by one-vs-one majority vote; ties go to the earlier label.
    pub fn predict(&self, x: &[SvmNode]) -> i32 {
        let mut votes = vec![0usize; self.labels.len()];
        for m in &self.machines {
            if m.decision_value(&self.kernel, x) > 0.0 {
                votes[m.positive] += 1;
            } else {
                votes[m.negative] += 1;
            }
        }
        let mut best = 0;
        for (i, &v) in votes.iter().enumerate() {
            if v > votes[best] {
                best = i;
            }
        }
        self.labels[best]
    }

    pub fn has_probability(&self) -> bool {
        !self.machines.is_empty() && self.machines.iter().all(|m| m.sigmoid.is_some())
    }

    /// `(label, probability)` for every label, or `None` without fitted sigmoids.
    pub fn predict_probability(&self, x: &[SvmNode]) -> Option<Vec<(i32, f64)>> {
        if self.labels.len() == 1 {
            return Some(vec![(self.labels[0], 1.0)]);
        }
        if !self.has_probability() {
            return None;
        }

        let k = self.labels.len();
        let mut r = vec![vec![0.0; k]; k];
        for m in &self.machines {
            let sigmoid = m.sigmoid?;
            let p = sigmoid
                .predict(m.decision_value(&self.kernel, x))
                .clamp(MIN_PAIR_PROBABILITY, 1.0 - MIN_PAIR_PROBABILITY);
            r[m.positive][m.negative] = p;
            r[m.negative][m.positive] = 1.0 - p;
        }

        let p = if k == 2 {
            vec![r[0][1], r[1][0]]
        } else {
            couple(&r)
        };
        Some(self.labels.iter().copied().zip(p).collect())
    }

    /// Write the model as pretty JSON, creating parent directories.
    ///
    /// # Errors
    /// `VadError::Persistence` on any I/O or encoding failure, or when a
    /// parameter is non-finite (JSON would store it as `null`).
    pub fn save(&self, path: &Path) -> Result<()> {
        self.check_numbers()
            .map_err(|reason| VadError::persistence(path, reason))?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| VadError::persistence(path, e))?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|e| VadError::persistence(path, e))?;
        fs::write(path, json).map_err(|e| VadError::persistence(path, e))
    }

    /// # Errors
    /// `VadError::Persistence` if the file is missing, malformed or inconsistent.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| VadError::persistence(path, e))?;
        let model: Self = serde_json::from_str(&raw).map_err(|e| VadError::persistence(path, e))?;
        model
            .validate()
            .map_err(|reason| VadError::persistence(path, reason))?;
        Ok(model)
    }

    fn check_numbers(&self) -> std::result::Result<(), String> {
        if !self.kernel.gamma.is_finite() || !self.kernel.coef0.is_finite() {
            return Err("kernel parameters are not finite".into());
        }
        if i32::try_from(self.kernel.degree).is_err() {
            return Err(format!("kernel degree {} out of range", self.kernel.degree));
        }
        for (i, m) in self.machines.iter().enumerate() {
            if !m.rho.is_finite() {
                return Err(format!("machine {i} has a non-finite rho"));
            }
            if m.support_vectors.iter().any(|sv| {
                !sv.coef.is_finite() || sv.nodes.iter().any(|n| !n.value.is_finite())
            }) {
                return Err(format!("machine {i} has a non-finite support vector"));
            }
            if m.sigmoid.is_some_and(|s| !s.a.is_finite() || !s.b.is_finite()) {
                return Err(format!("machine {i} has a non-finite sigmoid"));
            }
        }
        Ok(())
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if self.format_version != MODEL_FORMAT_VERSION {
            return Err(format!(
                "unsupported model format version {} (expected {MODEL_FORMAT_VERSION})",
                self.format_version
            ));
        }
        if self.num_features == 0 {
            return Err("model has zero features".into());
        }
        self.check_numbers()?;
        let k = self.labels.len();
        if k == 0 {
            return Err("model has no labels".into());
        }
        if self.machines.len() != k * (k - 1) / 2 {
            return Err(format!(
                "{} labels need {} machines, found {}",
                k,
                k * (k - 1) / 2,
                self.machines.len()
            ));
        }
        for m in &self.machines {
            if m.positive >= k || m.negative >= k || m.positive == m.negative {
                return Err(format!(
                    "machine refers to labels {} and {} of {k}",
                    m.positive, m.negative
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::svm::params::KernelType;
    use crate::svm::sparse::marshal;

    fn linear_model() -> SvmModel {
        // f(x) = 2·x₁ − 1 between labels 1 (positive) and -1.
        SvmModel {
            format_version: MODEL_FORMAT_VERSION,
            num_features: 2,
            kernel: Kernel {
                kind: KernelType::Linear,
                degree: 3,
                gamma: 0.5,
                coef0: 0.0,
            },
            labels: vec![1, -1],
            machines: vec![BinaryMachine {
                positive: 0,
                negative: 1,
                rho: 1.0,
                support_vectors: vec![SupportVector {
                    coef: 2.0,
                    nodes: marshal(&[1.0, 0.0], 2).unwrap(),
                }],
                sigmoid: Some(Sigmoid { a: -4.0, b: 0.0 }),
            }],
        }
    }

    #[test]
    fn predicts_by_decision_sign() {
        let m = linear_model();
        assert_eq!(m.predict(&marshal(&[0.9, 0.1], 2).unwrap()), 1);
        assert_eq!(m.predict(&marshal(&[0.1, 0.9], 2).unwrap()), -1);
    }

    #[test]
    fn probability_favours_predicted_label() {
        let m = linear_model();
        let probs = m.predict_probability(&marshal(&[0.9, 0.0], 2).unwrap()).unwrap();
        assert_eq!(probs[0].0, 1);
        assert!(probs[0].1 > 0.9);
        approx::assert_abs_diff_eq!(probs[0].1 + probs[1].1, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn no_sigmoid_means_no_probability() {
        let mut m = linear_model();
        m.machines[0].sigmoid = None;
        assert!(m.predict_probability(&marshal(&[0.9, 0.0], 2).unwrap()).is_none());
    }

    #[test]
    fn save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("model.json");
        let m = linear_model();
        m.save(&path).unwrap();
        assert_eq!(SvmModel::load(&path).unwrap(), m);
    }

    #[test]
    fn load_rejects_garbage_and_bad_versions() {
        let dir = tempfile::tempdir().unwrap();
        let garbage = dir.path().join("garbage.json");
        fs::write(&garbage, "not json").unwrap();
        assert!(matches!(SvmModel::load(&garbage), Err(VadError::Persistence { .. })));

        let mut m = linear_model();
        m.format_version = 99;
        let future = dir.path().join("future.json");
        fs::write(&future, serde_json::to_string(&m).unwrap()).unwrap();
        assert!(matches!(SvmModel::load(&future), Err(VadError::Persistence { .. })));

        assert!(matches!(
            SvmModel::load(&dir.path().join("absent.json")),
            Err(VadError::Persistence { .. })
        ));
    }

    #[test]
    fn save_refuses_non_finite_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");

        let mut m = linear_model();
        m.machines[0].rho = f64::NAN;
        assert!(matches!(m.save(&path), Err(VadError::Persistence { .. })));

        let mut m = linear_model();
        m.machines[0].support_vectors[0].coef = f64::INFINITY;
        assert!(matches!(m.save(&path), Err(VadError::Persistence { .. })));

        let mut m = linear_model();
        m.machines[0].sigmoid = Some(Sigmoid { a: f64::NAN, b: 0.0 });
        assert!(matches!(m.save(&path), Err(VadError::Persistence { .. })));

        let mut m = linear_model();
        m.kernel.gamma = f64::INFINITY;
        assert!(matches!(m.save(&path), Err(VadError::Persistence { .. })));

        assert!(!path.exists());
    }

    #[test]
    fn load_rejects_out_of_range_degree() {
        let dir = tempfile::tempdir().unwrap();
        let mut m = linear_model();
        m.kernel.degree = u32::MAX;
        let path = dir.path().join("degree.json");
        fs::write(&path, serde_json::to_string(&m).unwrap()).unwrap();
        assert!(matches!(SvmModel::load(&path), Err(VadError::Persistence { .. })));
    }

    #[test]
    fn load_rejects_inconsistent_machines() {
        let dir = tempfile::tempdir().unwrap();
        let mut m = linear_model();
        m.machines[0].negative = 5;
        let path = dir.path().join("bad.json");
        fs::write(&path, serde_json::to_string(&m).unwrap()).unwrap();
        assert!(matches!(SvmModel::load(&path), Err(VadError::Persistence { .. })));
    }
}

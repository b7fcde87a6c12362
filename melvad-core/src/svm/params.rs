//! Training hyperparameters.

use serde::{Deserialize, Serialize};

/// Kernel family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KernelType {
    Linear,
    Polynomial,
    #[default]
    Rbf,
    Sigmoid,
}

/// C-SVC hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct Hyperparameters {
    pub kernel: KernelType,
    /// Polynomial degree. Default: 3.
    pub degree: u32,
    /// Kernel width. `0.0` means `1 / num_features`, filled in by `resolved`.
    pub gamma: f64,
    pub coef0: f64,
    /// Regularization cost `C`. Default: 1.
    pub cost: f64,
    /// Stopping tolerance on the KKT violation. Default: 1e-3.
    pub tolerance: f64,
    /// Kernel cache budget in MiB. Default: 100.
    pub cache_size_mb: f64,
    pub shrinking: bool,
    /// Fit probability estimates alongside the model.
    pub probability: bool,
    /// Per-label multipliers on `cost`.
    pub class_weights: Vec<(i32, f64)>,
}

impl Default for Hyperparameters {
    fn default() -> Self {
        Self {
            kernel: KernelType::Rbf,
            degree: 3,
            gamma: 0.0,
            coef0: 0.0,
            cost: 1.0,
            tolerance: 1e-3,
            cache_size_mb: 100.0,
            shrinking: true,
            probability: false,
            class_weights: Vec::new(),
        }
    }
}

impl Hyperparameters {
    /// Fill in defaults that depend on the feature dimension.
    pub fn resolved(mut self, num_features: usize) -> Self {
        if self.gamma == 0.0 && num_features > 0 {
            self.gamma = 1.0 / num_features as f64;
        }
        self
    }

    /// Cost multiplier for `label` (1 when unweighted).
    pub fn weight_for(&self, label: i32) -> f64 {
        self.class_weights
            .iter()
            .rev()
            .find(|(l, _)| *l == label)
            .map_or(1.0, |(_, w)| *w)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_rbf_conventions() {
        let p = Hyperparameters::default().resolved(4);
        assert_eq!(p.kernel, KernelType::Rbf);
        assert_eq!(p.gamma, 0.25);
        assert_eq!(p.cost, 1.0);
        assert_eq!(p.tolerance, 1e-3);
    }

    #[test]
    fn explicit_gamma_is_kept() {
        let p = Hyperparameters {
            gamma: 2.0,
            ..Hyperparameters::default()
        }
        .resolved(10);
        assert_eq!(p.gamma, 2.0);
    }

    #[test]
    fn last_weight_wins() {
        let p = Hyperparameters {
            class_weights: vec![(1, 2.0), (-1, 0.5), (1, 3.0)],
            ..Hyperparameters::default()
        };
        assert_eq!(p.weight_for(1), 3.0);
        assert_eq!(p.weight_for(-1), 0.5);
        assert_eq!(p.weight_for(7), 1.0);
    }

    #[test]
    fn json_uses_camel_case_and_defaults() {
        let p: Hyperparameters =
            serde_json::from_str(r#"{"kernel":"linear","cacheSizeMb":8}"#).unwrap();
        assert_eq!(p.kernel, KernelType::Linear);
        assert_eq!(p.cache_size_mb, 8.0);
        assert_eq!(p.degree, 3);
    }
}

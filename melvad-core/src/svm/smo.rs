//! `SmoOptimizer`: bundled pure-Rust C-SVC back-end.

use std::path::Path;

use tracing::{debug, warn};

use super::kernel::Kernel;
use super::model::{BinaryMachine, SupportVector, SvmModel, MODEL_FORMAT_VERSION};
use super::params::Hyperparameters;
use super::probability::Sigmoid;
use super::solver::{solve, QMatrix};
use super::sparse::{active, Problem, SvmNode};
use super::Optimizer;
use crate::error::Result;

/// One-vs-one C-SVC trained with SMO, persisted as JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct SmoOptimizer;

impl SmoOptimizer {
    pub fn new() -> Self {
        Self
    }
}

/// Distinct labels in order of first appearance, and the sample indices of each.
fn group_by_label(labels: &[i32]) -> (Vec<i32>, Vec<Vec<usize>>) {
    let mut distinct: Vec<i32> = Vec::new();
    let mut groups: Vec<Vec<usize>> = Vec::new();
    for (t, &label) in labels.iter().enumerate() {
        match distinct.iter().position(|&l| l == label) {
            Some(g) => groups[g].push(t),
            None => {
                distinct.push(label);
                groups.push(vec![t]);
            }
        }
    }
    (distinct, groups)
}

impl Optimizer for SmoOptimizer {
    type Model = SvmModel;

    fn check_parameter(&self, problem: &Problem, params: &Hyperparameters) -> Option<String> {
        if problem.is_empty() {
            return Some("training set is empty".into());
        }
        let non_finite = problem
            .vectors
            .iter()
            .any(|v| active(v).iter().any(|n| !n.value.is_finite()));
        if non_finite {
            return Some("training set contains non-finite feature values".into());
        }
        if params.gamma < 0.0 {
            return Some("gamma < 0".into());
        }
        if !params.gamma.is_finite() {
            return Some("gamma is not finite".into());
        }
        if i32::try_from(params.degree).is_err() {
            return Some(format!("degree > {}", i32::MAX));
        }
        if !params.coef0.is_finite() {
            return Some("coef0 is not finite".into());
        }
        if !(params.cache_size_mb > 0.0) {
            return Some("cache_size <= 0".into());
        }
        if !(params.tolerance > 0.0) {
            return Some("eps <= 0".into());
        }
        if !(params.cost > 0.0) || !params.cost.is_finite() {
            return Some("C <= 0".into());
        }
        if let Some((label, _)) = params.class_weights.iter().find(|(_, w)| !(*w > 0.0)) {
            return Some(format!("weight for class {label} <= 0"));
        }
        None
    }

    fn train(&self, problem: &Problem, params: &Hyperparameters) -> SvmModel {
        let kernel = Kernel::from_params(params);
        let (labels, groups) = group_by_label(&problem.labels);
        let cache_bytes = (params.cache_size_mb * 1024.0 * 1024.0) as usize;

        for (label, _) in &params.class_weights {
            if !labels.contains(label) {
                warn!(label, "class weight given for a label absent from the training set");
            }
        }

        let mut machines = Vec::with_capacity(labels.len() * labels.len().saturating_sub(1) / 2);
        for a in 0..labels.len() {
            for b in a + 1..labels.len() {
                let members: Vec<usize> = groups[a].iter().chain(&groups[b]).copied().collect();
                let x: Vec<&[SvmNode]> = members.iter().map(|&t| problem.vectors[t].as_slice()).collect();
                let y: Vec<f64> = (0..members.len())
                    .map(|t| if t < groups[a].len() { 1.0 } else { -1.0 })
                    .collect();

                let q = QMatrix::new(kernel, x.clone(), y.clone(), cache_bytes);
                let cp = params.cost * params.weight_for(labels[a]);
                let cn = params.cost * params.weight_for(labels[b]);
                let solution = solve(&q, cp, cn, params.tolerance);

                let sigmoid = params.probability.then(|| {
                    let decisions: Vec<f64> = (0..y.len())
                        .map(|t| solution.training_decision(&y, t))
                        .collect();
                    let positive: Vec<bool> = y.iter().map(|&v| v > 0.0).collect();
                    Sigmoid::fit(&decisions, &positive)
                });

                let support_vectors: Vec<SupportVector> = solution
                    .alpha
                    .iter()
                    .zip(&y)
                    .zip(&x)
                    .filter(|((alpha, _), _)| **alpha > 0.0)
                    .map(|((alpha, y), nodes)| SupportVector {
                        coef: alpha * y,
                        nodes: nodes.to_vec(),
                    })
                    .collect();

                debug!(
                    positive = labels[a],
                    negative = labels[b],
                    samples = y.len(),
                    iterations = solution.iterations,
                    support_vectors = support_vectors.len(),
                    cached = q.is_cached(),
                    "binary machine trained"
                );

                machines.push(BinaryMachine {
                    positive: a,
                    negative: b,
                    rho: solution.rho,
                    support_vectors,
                    sigmoid,
                });
            }
        }

        SvmModel {
            format_version: MODEL_FORMAT_VERSION,
            num_features: problem.num_features,
            kernel,
            labels,
            machines,
        }
    }

    fn predict(&self, model: &SvmModel, x: &[SvmNode]) -> i32 {
        model.predict(x)
    }

    fn predict_probability(&self, model: &SvmModel, x: &[SvmNode]) -> Option<Vec<(i32, f64)>> {
        model.predict_probability(x)
    }

    fn save_model(&self, model: &SvmModel, path: &Path) -> Result<()> {
        model.save(path)
    }

    fn load_model(&self, path: &Path) -> Result<SvmModel> {
        SvmModel::load(path)
    }

    fn model_dimension(&self, model: &SvmModel) -> Option<usize> {
        Some(model.num_features)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::svm::params::KernelType;
    use crate::svm::sparse::marshal;

    fn problem(points: &[(&[f64], i32)]) -> Problem {
        let n = points[0].0.len();
        let mut p = Problem::with_capacity(n, points.len());
        for (x, label) in points {
            p.push(*label, marshal(x, n).unwrap());
        }
        p
    }

    fn clusters() -> Problem {
        problem(&[
            (&[0.0, 0.0], 7),
            (&[0.2, 0.1], 7),
            (&[0.1, 0.3], 7),
            (&[5.0, 0.0], 3),
            (&[5.2, 0.3], 3),
            (&[4.9, 0.1], 3),
            (&[0.0, 5.0], 9),
            (&[0.3, 5.1], 9),
            (&[0.1, 4.8], 9),
        ])
    }

    #[test]
    fn check_parameter_messages() {
        let opt = SmoOptimizer::new();
        let p = clusters();
        let ok = Hyperparameters::default().resolved(2);
        assert_eq!(opt.check_parameter(&p, &ok), None);

        let bad = |f: fn(&mut Hyperparameters)| {
            let mut h = ok.clone();
            f(&mut h);
            opt.check_parameter(&p, &h)
        };
        assert_eq!(bad(|h| h.gamma = -1.0).as_deref(), Some("gamma < 0"));
        assert_eq!(bad(|h| h.gamma = f64::INFINITY).as_deref(), Some("gamma is not finite"));
        assert_eq!(bad(|h| h.gamma = f64::NAN).as_deref(), Some("gamma is not finite"));
        assert_eq!(
            bad(|h| h.degree = u32::MAX).as_deref(),
            Some("degree > 2147483647")
        );
        assert_eq!(bad(|h| h.cost = 0.0).as_deref(), Some("C <= 0"));
        assert_eq!(bad(|h| h.tolerance = 0.0).as_deref(), Some("eps <= 0"));
        assert_eq!(bad(|h| h.cache_size_mb = -5.0).as_deref(), Some("cache_size <= 0"));
        assert_eq!(bad(|h| h.cost = f64::NAN).as_deref(), Some("C <= 0"));
        assert_eq!(
            bad(|h| h.class_weights = vec![(3, 0.0)]).as_deref(),
            Some("weight for class 3 <= 0")
        );

        let empty = Problem::with_capacity(2, 0);
        assert_eq!(
            opt.check_parameter(&empty, &ok).as_deref(),
            Some("training set is empty")
        );
        let nan = problem(&[(&[f64::NAN, 0.0], 1)]);
        assert!(opt.check_parameter(&nan, &ok).is_some());
    }

    #[test]
    fn one_vs_one_multiclass() {
        let opt = SmoOptimizer::new();
        let params = Hyperparameters::default().resolved(2);
        let model = opt.train(&clusters(), &params);
        assert_eq!(model.labels, vec![7, 3, 9]);
        assert_eq!(model.machines.len(), 3);

        let predict = |x: &[f64]| opt.predict(&model, &marshal(x, 2).unwrap());
        assert_eq!(predict(&[0.1, 0.1]), 7);
        assert_eq!(predict(&[5.1, 0.2]), 3);
        assert_eq!(predict(&[0.2, 4.9]), 9);
    }

    #[test]
    fn single_class_always_predicts_it() {
        let opt = SmoOptimizer::new();
        let p = problem(&[(&[1.0], 4), (&[2.0], 4)]);
        let model = opt.train(&p, &Hyperparameters::default().resolved(1));
        assert!(model.machines.is_empty());
        assert_eq!(opt.predict(&model, &marshal(&[-10.0], 1).unwrap()), 4);
        assert_eq!(
            opt.predict_probability(&model, &marshal(&[0.0], 1).unwrap()),
            Some(vec![(4, 1.0)])
        );
    }

    #[test]
    fn probability_estimates_sum_to_one() {
        let opt = SmoOptimizer::new();
        let params = Hyperparameters {
            probability: true,
            ..Hyperparameters::default()
        }
        .resolved(2);
        let model = opt.train(&clusters(), &params);
        assert!(model.has_probability());

        let probs = opt
            .predict_probability(&model, &marshal(&[5.0, 0.1], 2).unwrap())
            .unwrap();
        assert_eq!(probs.len(), 3);
        let total: f64 = probs.iter().map(|(_, p)| p).sum();
        approx::assert_abs_diff_eq!(total, 1.0, epsilon = 1e-6);
        let best = probs.iter().max_by(|a, b| a.1.total_cmp(&b.1)).unwrap();
        assert_eq!(best.0, 3);
    }

    #[test]
    fn class_weights_scale_bounds() {
        let opt = SmoOptimizer::new();
        // Overlapping points: the heavier class wins the contested region.
        let p = problem(&[
            (&[0.0], 1),
            (&[0.1], 1),
            (&[0.2], -1),
            (&[0.05], -1),
        ]);
        let params = Hyperparameters {
            kernel: KernelType::Linear,
            class_weights: vec![(1, 100.0), (-1, 0.01)],
            ..Hyperparameters::default()
        }
        .resolved(1);
        let model = opt.train(&p, &params);
        let machine = &model.machines[0];
        let max_negative = machine
            .support_vectors
            .iter()
            .filter(|sv| sv.coef < 0.0)
            .map(|sv| -sv.coef)
            .fold(0.0, f64::max);
        assert!(max_negative <= 0.01 + 1e-9, "{max_negative}");
    }
}

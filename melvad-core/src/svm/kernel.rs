//! Kernel functions over sparse vectors.

use serde::{Deserialize, Serialize};

use super::params::{Hyperparameters, KernelType};
use super::sparse::SvmNode;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Kernel {
    pub kind: KernelType,
    pub degree: u32,
    pub gamma: f64,
    pub coef0: f64,
}

impl Kernel {
    pub fn from_params(params: &Hyperparameters) -> Self {
        Self {
            kind: params.kernel,
            degree: params.degree,
            gamma: params.gamma,
            coef0: params.coef0,
        }
    }

    pub fn eval(&self, x: &[SvmNode], y: &[SvmNode]) -> f64 {
        match self.kind {
            KernelType::Linear => dot(x, y),
            KernelType::Polynomial => {
                let degree = i32::try_from(self.degree).unwrap_or(i32::MAX);
                (self.gamma * dot(x, y) + self.coef0).powi(degree)
            }
            KernelType::Rbf => (-self.gamma * squared_distance(x, y)).exp(),
            KernelType::Sigmoid => (self.gamma * dot(x, y) + self.coef0).tanh(),
        }
    }
}

/// Walk two index-sorted sparse vectors in lockstep until either hits the sentinel.
fn merge<F: FnMut(Option<f64>, Option<f64>)>(x: &[SvmNode], y: &[SvmNode], mut f: F) {
    let (mut i, mut j) = (0, 0);
    loop {
        let a = x.get(i).filter(|n| !n.is_sentinel());
        let b = y.get(j).filter(|n| !n.is_sentinel());
        match (a, b) {
            (None, None) => break,
            (Some(a), None) => {
                f(Some(a.value), None);
                i += 1;
            }
            (None, Some(b)) => {
                f(None, Some(b.value));
                j += 1;
            }
            (Some(a), Some(b)) if a.index == b.index => {
                f(Some(a.value), Some(b.value));
                i += 1;
                j += 1;
            }
            (Some(a), Some(b)) if a.index < b.index => {
                f(Some(a.value), None);
                i += 1;
            }
            (Some(_), Some(b)) => {
                f(None, Some(b.value));
                j += 1;
            }
        }
    }
}

pub fn dot(x: &[SvmNode], y: &[SvmNode]) -> f64 {
    let mut sum = 0.0;
    merge(x, y, |a, b| {
        if let (Some(a), Some(b)) = (a, b) {
            sum += a * b;
        }
    });
    sum
}

pub fn squared_distance(x: &[SvmNode], y: &[SvmNode]) -> f64 {
    let mut sum = 0.0;
    merge(x, y, |a, b| {
        let d = a.unwrap_or(0.0) - b.unwrap_or(0.0);
        sum += d * d;
    });
    sum
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::svm::sparse::marshal;
    use approx::assert_abs_diff_eq;

    fn kernel(kind: KernelType) -> Kernel {
        Kernel {
            kind,
            degree: 2,
            gamma: 0.5,
            coef0: 1.0,
        }
    }

    #[test]
    fn dot_and_distance_on_dense_nodes() {
        let x = marshal(&[1.0, 2.0, 3.0], 3).unwrap();
        let y = marshal(&[4.0, -5.0, 6.0], 3).unwrap();
        assert_abs_diff_eq!(dot(&x, &y), 12.0);
        assert_abs_diff_eq!(squared_distance(&x, &y), 9.0 + 49.0 + 9.0);
    }

    #[test]
    fn missing_indices_count_as_zero() {
        let x = [
            SvmNode { index: 1, value: 2.0 },
            SvmNode { index: 3, value: 1.0 },
            SvmNode::SENTINEL,
        ];
        let y = [SvmNode { index: 3, value: 4.0 }, SvmNode::SENTINEL];
        assert_abs_diff_eq!(dot(&x, &y), 4.0);
        assert_abs_diff_eq!(squared_distance(&x, &y), 4.0 + 9.0);
    }

    #[test]
    fn kernel_families() {
        let x = marshal(&[1.0, 0.0], 2).unwrap();
        let y = marshal(&[1.0, 1.0], 2).unwrap();
        assert_abs_diff_eq!(kernel(KernelType::Linear).eval(&x, &y), 1.0);
        assert_abs_diff_eq!(kernel(KernelType::Polynomial).eval(&x, &y), 2.25);
        assert_abs_diff_eq!(kernel(KernelType::Rbf).eval(&x, &y), (-0.5f64).exp());
        assert_abs_diff_eq!(kernel(KernelType::Sigmoid).eval(&x, &y), 1.5f64.tanh());
        assert_abs_diff_eq!(kernel(KernelType::Rbf).eval(&x, &x), 1.0);
    }
}

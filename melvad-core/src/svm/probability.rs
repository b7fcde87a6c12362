//! Probability estimates: Platt sigmoids per binary machine, pairwise coupling
//! across machines.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// `P(positive | f) = 1 / (1 + exp(a·f + b))`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sigmoid {
    pub a: f64,
    pub b: f64,
}

impl Sigmoid {
    pub fn predict(&self, decision: f64) -> f64 {
        let f = decision * self.a + self.b;
        // Evaluate on the side that cannot overflow.
        if f >= 0.0 {
            (-f).exp() / (1.0 + (-f).exp())
        } else {
            1.0 / (1.0 + f.exp())
        }
    }

    /// Fit by Newton's method with backtracking on regularized targets.
    ///
    /// `positive[t]` is whether sample `t` belongs to the machine's positive class.
    pub fn fit(decisions: &[f64], positive: &[bool]) -> Self {
        const MAX_ITER: usize = 100;
        const MIN_STEP: f64 = 1e-10;
        const SIGMA: f64 = 1e-12;
        const EPS: f64 = 1e-5;

        let prior1 = positive.iter().filter(|p| **p).count() as f64;
        let prior0 = positive.len() as f64 - prior1;
        let hi = (prior1 + 1.0) / (prior1 + 2.0);
        let lo = 1.0 / (prior0 + 2.0);
        let targets: Vec<f64> = positive.iter().map(|&p| if p { hi } else { lo }).collect();

        let objective = |a: f64, b: f64| -> f64 {
            decisions
                .iter()
                .zip(&targets)
                .map(|(&d, &t)| {
                    let f = d * a + b;
                    if f >= 0.0 {
                        t * f + (1.0 + (-f).exp()).ln()
                    } else {
                        (t - 1.0) * f + (1.0 + f.exp()).ln()
                    }
                })
                .sum()
        };

        let mut a = 0.0;
        let mut b = ((prior0 + 1.0) / (prior1 + 1.0)).ln();
        let mut fval = objective(a, b);

        for _ in 0..MAX_ITER {
            let (mut h11, mut h22, mut h21) = (SIGMA, SIGMA, 0.0);
            let (mut g1, mut g2) = (0.0, 0.0);
            for (&d, &t) in decisions.iter().zip(&targets) {
                let f = d * a + b;
                let (p, q) = if f >= 0.0 {
                    let e = (-f).exp();
                    (e / (1.0 + e), 1.0 / (1.0 + e))
                } else {
                    let e = f.exp();
                    (1.0 / (1.0 + e), e / (1.0 + e))
                };
                let d2 = p * q;
                h11 += d * d * d2;
                h22 += d2;
                h21 += d * d2;
                let d1 = t - p;
                g1 += d * d1;
                g2 += d1;
            }
            if g1.abs() < EPS && g2.abs() < EPS {
                break;
            }

            let det = h11 * h22 - h21 * h21;
            let da = -(h22 * g1 - h21 * g2) / det;
            let db = -(-h21 * g1 + h11 * g2) / det;
            let gd = g1 * da + g2 * db;

            let mut step = 1.0;
            while step >= MIN_STEP {
                let (na, nb) = (a + step * da, b + step * db);
                let nf = objective(na, nb);
                if nf < fval + 1e-4 * step * gd {
                    a = na;
                    b = nb;
                    fval = nf;
                    break;
                }
                step /= 2.0;
            }
            if step < MIN_STEP {
                warn!("sigmoid line search failed");
                break;
            }
        }

        Self { a, b }
    }
}

/// Combine pairwise probabilities `r[i][j] ≈ P(i | i or j)` into class probabilities.
pub fn couple(r: &[Vec<f64>]) -> Vec<f64> {
    let k = r.len();
    if k == 0 {
        return Vec::new();
    }
    let mut q = vec![vec![0.0; k]; k];
    for t in 0..k {
        for j in 0..k {
            if j != t {
                q[t][t] += r[j][t] * r[j][t];
                q[t][j] = -r[j][t] * r[t][j];
            }
        }
    }

    let mut p = vec![1.0 / k as f64; k];
    let mut qp = vec![0.0; k];
    let max_iter = 100.max(k);
    let eps = 0.005 / k as f64;

    for _ in 0..max_iter {
        let mut pqp = 0.0;
        for t in 0..k {
            qp[t] = (0..k).map(|j| q[t][j] * p[j]).sum();
            pqp += p[t] * qp[t];
        }
        let max_error = qp.iter().map(|v| (v - pqp).abs()).fold(0.0, f64::max);
        if max_error < eps {
            break;
        }
        for t in 0..k {
            let diff = (-qp[t] + pqp) / q[t][t];
            p[t] += diff;
            pqp = (pqp + diff * (diff * q[t][t] + 2.0 * qp[t])) / ((1.0 + diff) * (1.0 + diff));
            for j in 0..k {
                qp[j] = (qp[j] + diff * q[t][j]) / (1.0 + diff);
                p[j] /= 1.0 + diff;
            }
        }
    }
    p
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn fitted_sigmoid_is_monotone_towards_positive() {
        let decisions = [-3.0, -2.0, -1.5, -0.5, 0.4, 1.0, 2.0, 2.5];
        let positive = [false, false, false, false, true, true, true, true];
        let s = Sigmoid::fit(&decisions, &positive);
        assert!(s.a < 0.0, "a = {}", s.a);
        assert!(s.predict(2.0) > 0.8);
        assert!(s.predict(-2.0) < 0.2);
        assert!(s.predict(1.0) > s.predict(0.0));
    }

    #[test]
    fn sigmoid_is_stable_at_extremes() {
        let s = Sigmoid { a: -5.0, b: 0.0 };
        assert_abs_diff_eq!(s.predict(1e6), 1.0);
        assert_abs_diff_eq!(s.predict(-1e6), 0.0);
        assert_abs_diff_eq!(s.predict(0.0), 0.5);
    }

    #[test]
    fn coupling_sums_to_one_and_ranks() {
        let r = vec![
            vec![0.0, 0.9, 0.8],
            vec![0.1, 0.0, 0.6],
            vec![0.2, 0.4, 0.0],
        ];
        let p = couple(&r);
        assert_abs_diff_eq!(p.iter().sum::<f64>(), 1.0, epsilon = 1e-9);
        assert!(p[0] > p[1] && p[0] > p[2], "{p:?}");
    }

    #[test]
    fn coupling_two_classes_reproduces_pair() {
        let p = couple(&[vec![0.0, 0.7], vec![0.3, 0.0]]);
        assert_abs_diff_eq!(p[0], 0.7, epsilon = 1e-3);
        assert_abs_diff_eq!(p[1], 0.3, epsilon = 1e-3);
    }
}

//! SMO solver for the two-class C-SVC dual.
//!
//! ```text
//! min  ½ αᵀQα − eᵀα
//! s.t. yᵀα = 0,  0 ≤ αₜ ≤ Cₜ,  Qₛₜ = yₛ yₜ K(xₛ, xₜ)
//! ```
//!
//! Working pairs are picked with second-order selection; the loop stops once
//! the maximal KKT violation drops below the tolerance.

use tracing::warn;

use super::kernel::Kernel;
use super::sparse::SvmNode;

const TAU: f64 = 1e-12;

/// Rows of `Q` for one binary subproblem.
///
/// The full matrix is precomputed when it fits in the cache budget; otherwise
/// each row is evaluated on demand.
pub(crate) struct QMatrix<'a> {
    kernel: Kernel,
    x: Vec<&'a [SvmNode]>,
    y: Vec<f64>,
    diag: Vec<f64>,
    cached: Option<Vec<f64>>,
}

impl<'a> QMatrix<'a> {
    pub(crate) fn new(kernel: Kernel, x: Vec<&'a [SvmNode]>, y: Vec<f64>, cache_bytes: usize) -> Self {
        let l = x.len();
        let diag = x.iter().map(|xi| kernel.eval(xi, xi)).collect();
        let mut q = Self {
            kernel,
            x,
            y,
            diag,
            cached: None,
        };
        let needed = l.saturating_mul(l).saturating_mul(std::mem::size_of::<f64>());
        if needed <= cache_bytes {
            let mut full = vec![0.0; l * l];
            for (i, row) in full.chunks_mut(l.max(1)).enumerate().take(l) {
                q.compute_row(i, row);
            }
            q.cached = Some(full);
        }
        q
    }

    pub(crate) fn len(&self) -> usize {
        self.y.len()
    }

    pub(crate) fn y(&self) -> &[f64] {
        &self.y
    }

    pub(crate) fn diag(&self, i: usize) -> f64 {
        self.diag[i]
    }

    pub(crate) fn is_cached(&self) -> bool {
        self.cached.is_some()
    }

    pub(crate) fn row(&self, i: usize, out: &mut [f64]) {
        match &self.cached {
            Some(full) => {
                let l = self.len();
                out.copy_from_slice(&full[i * l..(i + 1) * l]);
            }
            None => self.compute_row(i, out),
        }
    }

    fn compute_row(&self, i: usize, out: &mut [f64]) {
        for (t, slot) in out.iter_mut().enumerate() {
            *slot = self.y[i] * self.y[t] * self.kernel.eval(self.x[i], self.x[t]);
        }
    }
}

/// Result of one binary solve.
#[derive(Debug, Clone)]
pub(crate) struct Solution {
    pub alpha: Vec<f64>,
    /// Final gradient `Qα − e`.
    pub grad: Vec<f64>,
    pub rho: f64,
    pub iterations: usize,
}

impl Solution {
    /// Decision value of training point `t`: `Σ αₛ yₛ K(xₛ, xₜ) − ρ`.
    pub(crate) fn training_decision(&self, y: &[f64], t: usize) -> f64 {
        y[t] * (self.grad[t] + 1.0) - self.rho
    }
}

/// Solve the dual with per-class upper bounds `cp` (y = +1) and `cn` (y = −1).
pub(crate) fn solve(q: &QMatrix<'_>, cp: f64, cn: f64, eps: f64) -> Solution {
    let y = q.y();
    let l = q.len();
    let bound = |t: usize| if y[t] > 0.0 { cp } else { cn };

    let mut alpha = vec![0.0; l];
    let mut grad = vec![-1.0; l];
    let mut q_i = vec![0.0; l];
    let mut q_j = vec![0.0; l];

    let max_iter = 10_000_000usize.max(l.saturating_mul(100));
    let mut iterations = 0;

    while iterations < max_iter {
        let Some((i, j)) = select_working_set(q, &alpha, &grad, &bound, eps, &mut q_i) else {
            break;
        };
        iterations += 1;
        q.row(j, &mut q_j);

        let (c_i, c_j) = (bound(i), bound(j));
        let (old_i, old_j) = (alpha[i], alpha[j]);

        if y[i] != y[j] {
            let mut quad = q.diag(i) + q.diag(j) + 2.0 * q_i[j];
            if quad <= 0.0 {
                quad = TAU;
            }
            let delta = (-grad[i] - grad[j]) / quad;
            let diff = alpha[i] - alpha[j];
            alpha[i] += delta;
            alpha[j] += delta;

            if diff > 0.0 {
                if alpha[j] < 0.0 {
                    alpha[j] = 0.0;
                    alpha[i] = diff;
                }
            } else if alpha[i] < 0.0 {
                alpha[i] = 0.0;
                alpha[j] = -diff;
            }
            if diff > c_i - c_j {
                if alpha[i] > c_i {
                    alpha[i] = c_i;
                    alpha[j] = c_i - diff;
                }
            } else if alpha[j] > c_j {
                alpha[j] = c_j;
                alpha[i] = c_j + diff;
            }
        } else {
            let mut quad = q.diag(i) + q.diag(j) - 2.0 * q_i[j];
            if quad <= 0.0 {
                quad = TAU;
            }
            let delta = (grad[i] - grad[j]) / quad;
            let sum = alpha[i] + alpha[j];
            alpha[i] -= delta;
            alpha[j] += delta;

            if sum > c_i {
                if alpha[i] > c_i {
                    alpha[i] = c_i;
                    alpha[j] = sum - c_i;
                }
            } else if alpha[j] < 0.0 {
                alpha[j] = 0.0;
                alpha[i] = sum;
            }
            if sum > c_j {
                if alpha[j] > c_j {
                    alpha[j] = c_j;
                    alpha[i] = sum - c_j;
                }
            } else if alpha[i] < 0.0 {
                alpha[i] = 0.0;
                alpha[j] = sum;
            }
        }

        let (d_i, d_j) = (alpha[i] - old_i, alpha[j] - old_j);
        for (k, g) in grad.iter_mut().enumerate() {
            *g += q_i[k] * d_i + q_j[k] * d_j;
        }
    }

    if iterations >= max_iter {
        warn!(max_iter, "SMO reached the iteration cap before converging");
    }

    let rho = compute_rho(y, &alpha, &grad, &bound);
    Solution {
        alpha,
        grad,
        rho,
        iterations,
    }
}

/// Pick the maximal violating pair `(i, j)`, or `None` once optimal within `eps`.
///
/// Leaves row `i` of `Q` in `q_i`.
fn select_working_set(
    q: &QMatrix<'_>,
    alpha: &[f64],
    grad: &[f64],
    bound: &impl Fn(usize) -> f64,
    eps: f64,
    q_i: &mut [f64],
) -> Option<(usize, usize)> {
    let y = q.y();

    let mut gmax = f64::NEG_INFINITY;
    let mut i = None;
    for t in 0..y.len() {
        if y[t] > 0.0 {
            if alpha[t] < bound(t) && -grad[t] >= gmax {
                gmax = -grad[t];
                i = Some(t);
            }
        } else if alpha[t] > 0.0 && grad[t] >= gmax {
            gmax = grad[t];
            i = Some(t);
        }
    }
    let i = i?;
    q.row(i, q_i);

    let mut gmax2 = f64::NEG_INFINITY;
    let mut j = None;
    let mut obj_min = f64::INFINITY;
    let second_order = |grad_diff: f64, quad: f64| {
        let quad = if quad > 0.0 { quad } else { TAU };
        -(grad_diff * grad_diff) / quad
    };

    for t in 0..y.len() {
        if y[t] > 0.0 {
            if alpha[t] > 0.0 {
                gmax2 = gmax2.max(grad[t]);
                let grad_diff = gmax + grad[t];
                if grad_diff > 0.0 {
                    let obj = second_order(grad_diff, q.diag(i) + q.diag(t) - 2.0 * y[i] * q_i[t]);
                    if obj <= obj_min {
                        obj_min = obj;
                        j = Some(t);
                    }
                }
            }
        } else if alpha[t] < bound(t) {
            gmax2 = gmax2.max(-grad[t]);
            let grad_diff = gmax - grad[t];
            if grad_diff > 0.0 {
                let obj = second_order(grad_diff, q.diag(i) + q.diag(t) + 2.0 * y[i] * q_i[t]);
                if obj <= obj_min {
                    obj_min = obj;
                    j = Some(t);
                }
            }
        }
    }

    if gmax + gmax2 < eps {
        return None;
    }
    j.map(|j| (i, j))
}

fn compute_rho(y: &[f64], alpha: &[f64], grad: &[f64], bound: &impl Fn(usize) -> f64) -> f64 {
    let mut ub = f64::INFINITY;
    let mut lb = f64::NEG_INFINITY;
    let mut free = 0usize;
    let mut free_sum = 0.0;

    for t in 0..y.len() {
        let yg = y[t] * grad[t];
        let at_upper = alpha[t] >= bound(t);
        let at_lower = alpha[t] <= 0.0;
        if at_upper {
            if y[t] < 0.0 {
                ub = ub.min(yg);
            } else {
                lb = lb.max(yg);
            }
        } else if at_lower {
            if y[t] > 0.0 {
                ub = ub.min(yg);
            } else {
                lb = lb.max(yg);
            }
        } else {
            free += 1;
            free_sum += yg;
        }
    }

    if free > 0 {
        free_sum / free as f64
    } else {
        (ub + lb) / 2.0
    }
}

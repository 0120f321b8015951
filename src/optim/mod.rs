//! Levenberg-Marquardt over products of Lie groups
//!
//! Variables are a slice of group elements updated on the right,
//! `x_i ← x_i · exp(δ_i)`. Jacobians are taken with respect to these right
//! perturbations and may be sparse.

use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::factorization::CscCholesky;
use nalgebra_sparse::{CooMatrix, CscMatrix};
use serde::{Deserialize, Serialize};

use crate::lie::{LieGroup, Tangent};

/// Residual vector and Jacobian of a least squares problem.
pub trait LeastSquaresProblem<G: LieGroup> {
    fn residuals(&self, x: &[G]) -> DVector<f64>;

    /// Jacobian of [`LeastSquaresProblem::residuals`] with respect to right
    /// perturbations of the variables, stacked in variable order.
    fn jacobian(&self, x: &[G]) -> CscMatrix<f64>;
}

/// Stopping criteria for [`minimize`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinimizeOptions {
    /// Stop when the step norm falls below this value.
    pub ptol: f64,
    /// Stop when the relative cost decrease falls below this value.
    pub ftol: f64,
    pub max_iter: usize,
    /// Report every iteration at info level.
    pub verbose: bool,
}

impl Default for MinimizeOptions {
    fn default() -> Self {
        MinimizeOptions {
            ptol: 1e-6,
            ftol: 1e-6,
            max_iter: 100,
            verbose: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    StepTolerance,
    CostTolerance,
    MaxIterations,
    /// Damping grew without finding a decrease.
    Stalled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MinimizeSummary {
    pub iterations: usize,
    pub initial_cost: f64,
    pub final_cost: f64,
    pub termination: Termination,
}

const LAMBDA_INIT: f64 = 1e-3;
const LAMBDA_UP: f64 = 10.0;
const LAMBDA_DOWN: f64 = 0.1;
const LAMBDA_MAX: f64 = 1e10;
const DIAG_FLOOR: f64 = 1e-12;

fn retract<G: LieGroup>(x: &[G], delta: &DVector<f64>) -> Vec<G> {
    let mut offset = 0;
    x.iter()
        .map(|g| {
            let n = g.dof();
            let step: Tangent = delta.rows(offset, n).clone_owned();
            offset += n;
            g.rplus(&step)
        })
        .collect()
}

/// Minimize `½ |r(x)|²` starting from `x`, which is overwritten with the
/// result.
pub fn minimize<G, P>(problem: &P, x: &mut [G], opts: &MinimizeOptions) -> MinimizeSummary
where
    G: LieGroup,
    P: LeastSquaresProblem<G>,
{
    let mut r = problem.residuals(x);
    let mut cost = 0.5 * r.norm_squared();
    let initial_cost = cost;
    let mut lambda = LAMBDA_INIT;
    let mut iterations = 0;
    let mut termination = Termination::MaxIterations;

    'outer: while iterations < opts.max_iter {
        iterations += 1;
        let jac = problem.jacobian(x);
        let jt = jac.transpose();
        let jtj = &jt * &jac;
        let grad = DMatrix::from_column_slice(r.len(), 1, r.as_slice());
        let grad = &jt * &grad;
        let n = jtj.ncols();
        let mut diag = vec![0.0; n];
        for (i, j, v) in jtj.triplet_iter() {
            if i == j {
                diag[i] = *v;
            }
        }

        loop {
            // Marquardt scaling keeps JᵀJ + λ·diag(JᵀJ) sparse and positive definite
            let mut damping = CooMatrix::new(n, n);
            for (i, d) in diag.iter().enumerate() {
                damping.push(i, i, lambda * d.max(DIAG_FLOOR));
            }
            let lhs = &jtj + &CscMatrix::from(&damping);
            let step: DVector<f64> = match CscCholesky::factor(&lhs) {
                Ok(chol) => -chol.solve(&grad).column(0).clone_owned(),
                Err(_) => {
                    lambda *= LAMBDA_UP;
                    if lambda > LAMBDA_MAX {
                        termination = Termination::Stalled;
                        break 'outer;
                    }
                    continue;
                }
            };

            let candidate = retract(x, &step);
            let r_new = problem.residuals(&candidate);
            let cost_new = 0.5 * r_new.norm_squared();

            if cost_new < cost {
                let decrease = (cost - cost_new) / cost.max(f64::MIN_POSITIVE);
                x.clone_from_slice(&candidate);
                r = r_new;
                cost = cost_new;
                lambda = (lambda * LAMBDA_DOWN).max(DIAG_FLOOR);

                if opts.verbose {
                    log::info!(
                        "iteration {}: cost {:.6e}, step {:.3e}, lambda {:.1e}",
                        iterations,
                        cost,
                        step.norm(),
                        lambda
                    );
                } else {
                    log::trace!("iteration {}: cost {:.6e}", iterations, cost);
                }

                if step.norm() < opts.ptol {
                    termination = Termination::StepTolerance;
                    break 'outer;
                }
                if decrease < opts.ftol {
                    termination = Termination::CostTolerance;
                    break 'outer;
                }
                break;
            }

            if step.norm() < opts.ptol {
                termination = Termination::StepTolerance;
                break 'outer;
            }
            lambda *= LAMBDA_UP;
            if lambda > LAMBDA_MAX {
                termination = Termination::Stalled;
                break 'outer;
            }
        }
    }

    log::debug!(
        "minimize finished after {} iterations ({:?}): cost {:.6e} -> {:.6e}",
        iterations,
        termination,
        initial_cost,
        cost
    );

    MinimizeSummary {
        iterations,
        initial_cost,
        final_cost: cost,
        termination,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lie::{Rn, SO3};

    /// Distance of each variable to a fixed target.
    struct Anchor<G> {
        targets: Vec<G>,
    }

    impl<G: LieGroup> LeastSquaresProblem<G> for Anchor<G> {
        fn residuals(&self, x: &[G]) -> DVector<f64> {
            let parts: Vec<Tangent> = x.iter().zip(&self.targets).map(|(g, t)| g.rminus(t)).collect();
            DVector::from_vec(parts.iter().flat_map(|p| p.iter().copied()).collect())
        }

        fn jacobian(&self, x: &[G]) -> CscMatrix<f64> {
            let n: usize = x.iter().map(|g| g.dof()).sum();
            let mut coo = CooMatrix::new(n, n);
            let mut offset = 0;
            for (g, t) in x.iter().zip(&self.targets) {
                let d = g.dof();
                let block = G::dr_expinv(&g.rminus(t));
                for r in 0..d {
                    for c in 0..d {
                        coo.push(offset + r, offset + c, block[(r, c)]);
                    }
                }
                offset += d;
            }
            CscMatrix::from(&coo)
        }
    }

    /// Fit of `y = a · exp(b · x)` to exact data.
    struct Exponential {
        xs: Vec<f64>,
        ys: Vec<f64>,
    }

    impl LeastSquaresProblem<Rn> for Exponential {
        fn residuals(&self, p: &[Rn]) -> DVector<f64> {
            let (a, b) = (p[0].coords()[0], p[0].coords()[1]);
            DVector::from_iterator(
                self.xs.len(),
                self.xs.iter().zip(&self.ys).map(|(x, y)| a * (b * x).exp() - y),
            )
        }

        fn jacobian(&self, p: &[Rn]) -> CscMatrix<f64> {
            let (a, b) = (p[0].coords()[0], p[0].coords()[1]);
            let mut coo = CooMatrix::new(self.xs.len(), 2);
            for (i, x) in self.xs.iter().enumerate() {
                coo.push(i, 0, (b * x).exp());
                coo.push(i, 1, a * x * (b * x).exp());
            }
            CscMatrix::from(&coo)
        }
    }

    #[test]
    fn test_exponential_fit() {
        let xs: Vec<f64> = (0..10).map(|i| i as f64 * 0.5).collect();
        let ys = xs.iter().map(|x| 2.0 * (-0.5 * x).exp()).collect();
        let problem = Exponential { xs, ys };
        let mut p = vec![Rn::from_slice(&[1.0, 0.0])];
        let opts = MinimizeOptions {
            ptol: 1e-10,
            ftol: 1e-14,
            ..Default::default()
        };
        let summary = minimize(&problem, &mut p, &opts);
        assert!(summary.final_cost < 1e-12);
        assert!((p[0].coords()[0] - 2.0).abs() < 1e-5);
        assert!((p[0].coords()[1] + 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_so3_anchor() {
        use rand::rngs::StdRng;
        use rand::SeedableRng;

        let mut rng = StdRng::seed_from_u64(1);
        let targets: Vec<SO3> = (0..3).map(|_| SO3::random(&mut rng, 3)).collect();
        let problem = Anchor {
            targets: targets.clone(),
        };
        let mut x = vec![SO3::identity(3); 3];
        let summary = minimize(&problem, &mut x, &MinimizeOptions::default());
        assert!(summary.final_cost < summary.initial_cost);
        for (g, t) in x.iter().zip(&targets) {
            assert!(g.is_approx(t, 1e-6));
        }
    }

    #[test]
    fn test_many_variables() {
        use rand::rngs::StdRng;
        use rand::SeedableRng;

        // 12000 unknowns with a block diagonal Jacobian
        let mut rng = StdRng::seed_from_u64(4);
        let targets: Vec<SO3> = (0..4000).map(|_| SO3::random(&mut rng, 3)).collect();
        let problem = Anchor {
            targets: targets.clone(),
        };
        let mut x = vec![SO3::identity(3); targets.len()];
        let opts = MinimizeOptions {
            ptol: 1e-10,
            ftol: 1e-14,
            ..Default::default()
        };
        let summary = minimize(&problem, &mut x, &opts);
        assert!(summary.final_cost < 1e-12);
        assert_ne!(summary.termination, Termination::Stalled);
        for (g, t) in x.iter().zip(&targets) {
            assert!(g.is_approx(t, 1e-6));
        }
    }
}

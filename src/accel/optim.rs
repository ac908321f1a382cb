// This file is part of LensKit.
// Copyright (C) 2018-2023 Boise State University.
// Copyright (C) 2023-2025 Drexel University.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

//! Interface to gradient-based optimizers, and a default minimizer.
//!
//! Optimizers only ever see flat parameter vectors: they ask an [Objective]
//! for the cost and gradient at a point, and hand back an improved point.
use log::*;
use ndarray::{Array1, ArrayView1};

use crate::errors::{CofiError, Result};

/// A differentiable function of a flat parameter vector.
pub trait Objective {
    /// Length of the parameter vector.
    fn dimension(&self) -> usize;

    /// Compute the cost and its gradient at `x`.
    fn evaluate(&self, x: ArrayView1<f64>) -> Result<(f64, Array1<f64>)>;
}

/// Outcome of a minimization run.
#[derive(Clone, Debug)]
pub struct Minimized {
    pub parameters: Array1<f64>,
    pub cost: f64,
    pub iterations: usize,
    pub converged: bool,
}

/// An unconstrained minimizer.
pub trait Minimizer {
    fn minimize(&self, objective: &dyn Objective, initial: Array1<f64>) -> Result<Minimized>;
}

/// Nonlinear conjugate gradient (Polak-Ribière+) with a backtracking line search.
#[derive(Clone, Debug)]
pub struct ConjugateGradient {
    pub max_iterations: usize,
    /// Stop when the gradient norm or the relative cost decrease falls below this.
    pub tolerance: f64,
}

const ARMIJO: f64 = 1e-4;
const MAX_BACKTRACK: usize = 60;

impl ConjugateGradient {
    pub fn new(max_iterations: usize, tolerance: f64) -> Self {
        ConjugateGradient {
            max_iterations,
            tolerance,
        }
    }

    /// Backtrack from `step` until the Armijo condition holds.
    fn line_search(
        &self,
        objective: &dyn Objective,
        x: &Array1<f64>,
        cost: f64,
        dir: &Array1<f64>,
        slope: f64,
        mut step: f64,
    ) -> Result<Option<(f64, Array1<f64>, f64, Array1<f64>)>> {
        for _ in 0..MAX_BACKTRACK {
            let mut candidate = x.clone();
            candidate.scaled_add(step, dir);
            let (c_cost, c_grad) = objective.evaluate(candidate.view())?;
            if c_cost.is_finite() && c_cost <= cost + ARMIJO * step * slope {
                return Ok(Some((step, candidate, c_cost, c_grad)));
            }
            step *= 0.5;
        }
        Ok(None)
    }
}

impl Default for ConjugateGradient {
    fn default() -> Self {
        ConjugateGradient::new(100, 1e-6)
    }
}

impl Minimizer for ConjugateGradient {
    fn minimize(&self, objective: &dyn Objective, initial: Array1<f64>) -> Result<Minimized> {
        let n = objective.dimension();
        if initial.len() != n {
            return Err(CofiError::ParameterLength {
                expected: n,
                actual: initial.len(),
            });
        }

        let mut x = initial;
        let (mut cost, mut grad) = objective.evaluate(x.view())?;
        let mut dir = -&grad;
        let mut step = 1.0 / (1.0 + grad.dot(&grad).sqrt());
        let mut converged = false;
        let mut iterations = 0;
        debug!(
            "starting conjugate gradient on {} parameters, initial cost {:.6}",
            n, cost
        );

        while iterations < self.max_iterations {
            let gnorm2 = grad.dot(&grad);
            if gnorm2.sqrt() <= self.tolerance {
                converged = true;
                break;
            }

            let mut slope = grad.dot(&dir);
            if slope >= 0.0 {
                // not a descent direction, restart along the gradient
                dir = -&grad;
                slope = -gnorm2;
            }

            let Some((taken, x_new, c_new, g_new)) =
                self.line_search(objective, &x, cost, &dir, slope, step)?
            else {
                warn!("line search failed after {} iterations", iterations);
                break;
            };
            iterations += 1;

            let beta = (g_new.dot(&(&g_new - &grad)) / gnorm2).max(0.0);
            dir *= beta;
            dir -= &g_new;

            let decrease = cost - c_new;
            trace!(
                "iteration {}: cost {:.6}, step {:.3e}, beta {:.3}",
                iterations,
                c_new,
                taken,
                beta
            );
            x = x_new;
            grad = g_new;
            cost = c_new;
            step = (taken * 2.0).min(1.0);

            if decrease <= self.tolerance * (1.0 + cost.abs()) {
                converged = true;
                break;
            }
        }

        if !converged {
            warn!(
                "conjugate gradient stopped after {} iterations without converging",
                iterations
            );
        }
        debug!(
            "finished conjugate gradient after {} iterations, cost {:.6}",
            iterations, cost
        );

        Ok(Minimized {
            parameters: x,
            cost,
            iterations,
            converged,
        })
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    use super::*;

    /// f(x) = Σ w_i (x_i − c_i)²
    struct Quadratic {
        center: Array1<f64>,
        weights: Array1<f64>,
    }

    impl Objective for Quadratic {
        fn dimension(&self) -> usize {
            self.center.len()
        }

        fn evaluate(&self, x: ArrayView1<f64>) -> Result<(f64, Array1<f64>)> {
            let d = &x - &self.center;
            let cost = (&d * &d * &self.weights).sum();
            let grad = &d * &self.weights * 2.0;
            Ok((cost, grad))
        }
    }

    #[test]
    fn test_quadratic_minimum() {
        let obj = Quadratic {
            center: array![1.0, -2.0, 0.5],
            weights: array![1.0, 10.0, 0.1],
        };
        let cg = ConjugateGradient::new(500, 1e-10);
        let res = cg.minimize(&obj, Array1::zeros(3)).unwrap();
        assert!(res.converged);
        for i in 0..3 {
            assert_abs_diff_eq!(res.parameters[i], obj.center[i], epsilon = 1e-3);
        }
    }

    #[test]
    fn test_wrong_dimension() {
        let obj = Quadratic {
            center: array![1.0, 2.0],
            weights: array![1.0, 1.0],
        };
        let res = ConjugateGradient::default().minimize(&obj, Array1::zeros(3));
        assert!(matches!(
            res,
            Err(CofiError::ParameterLength {
                expected: 2,
                actual: 3
            })
        ));
    }

    #[test]
    fn test_already_optimal() {
        let obj = Quadratic {
            center: array![1.0],
            weights: array![1.0],
        };
        let res = ConjugateGradient::default()
            .minimize(&obj, array![1.0])
            .unwrap();
        assert!(res.converged);
        assert_eq!(res.iterations, 0);
        assert_eq!(res.cost, 0.0);
    }
}

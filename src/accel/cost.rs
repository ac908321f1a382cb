// This file is part of LensKit.
// Copyright (C) 2018-2023 Boise State University.
// Copyright (C) 2023-2025 Drexel University.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

//! Regularized squared-error cost and its gradient.
//!
//! With item factors `P`, user factors `Q`, ratings `R`, mask `M` and
//! regularization `λ`, the residual is `E = (P · Qᵗ − R) ⊙ M` and
//!
//! ```text
//! J     = ½ ΣE² + ½λ ΣQ² + ½λ ΣP²
//! ∂J/∂P = E · Q + λP
//! ∂J/∂Q = Eᵗ · P + λQ
//! ```
use ndarray::ArrayView2;

use crate::errors::{check_shape, Result};
use crate::factors::Factors;
use crate::kernels;

/// Result of a cost evaluation.
#[derive(Clone, Debug)]
pub struct Evaluation {
    pub cost: f64,
    /// Gradients, laid out like the factors; only present when requested.
    pub gradients: Option<Factors>,
}

/// Evaluate the cost, and optionally its gradient, at the given factors.
///
/// None of the inputs are modified.  Inconsistent shapes are reported as
/// errors rather than producing a truncated result.
pub fn evaluate(
    factors: &Factors,
    ratings: ArrayView2<f64>,
    mask: ArrayView2<f64>,
    lambda: f64,
    with_gradient: bool,
) -> Result<Evaluation> {
    check_shape("availability mask", ratings.dim(), mask.dim())?;
    factors.check()?;
    factors.check_ratings(ratings)?;

    let p = factors.items.view();
    let q = factors.users.view();

    let residual = kernels::masked_residual(p, q, ratings, mask);
    let cost = kernels::sum_squares(residual.view()) / 2.0
        + lambda / 2.0 * kernels::sum_squares(q)
        + lambda / 2.0 * kernels::sum_squares(p);

    let gradients = if with_gradient {
        Some(Factors {
            items: kernels::item_gradient(residual.view(), p, q, lambda),
            users: kernels::user_gradient(residual.view(), p, q, lambda),
        })
    } else {
        None
    };

    Ok(Evaluation { cost, gradients })
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array2};
    use rand::{Rng, SeedableRng};
    use rand_pcg::Pcg64;

    use super::*;
    use crate::codec::ParameterLayout;
    use crate::errors::CofiError;
    use crate::factors::InitPolicy;

    fn random_problem(seed: u64) -> (Factors, Array2<f64>, Array2<f64>) {
        let mut rng = Pcg64::seed_from_u64(seed);
        let factors = Factors::new(
            InitPolicy::Uniform.fill(4, 3, &mut rng),
            InitPolicy::Uniform.fill(5, 3, &mut rng),
        )
        .unwrap();
        let ratings = Array2::from_shape_simple_fn((4, 5), || rng.random_range(1.0..5.0));
        let mask = Array2::from_shape_simple_fn((4, 5), || {
            if rng.random::<f64>() < 0.6 {
                1.0
            } else {
                0.0
            }
        });
        (factors, ratings, mask)
    }

    #[test]
    fn test_exact_fit_zero_cost() {
        let r = array![[5.0, 0.0], [0.0, 4.0]];
        let m = array![[1.0, 0.0], [0.0, 1.0]];
        let factors = Factors::new(array![[5.0, 0.0], [0.0, 4.0]], array![[1.0, 0.0], [0.0, 1.0]])
            .unwrap();
        let eval = evaluate(&factors, r.view(), m.view(), 0.0, true).unwrap();
        assert_eq!(eval.cost, 0.0);
        let grad = eval.gradients.unwrap();
        assert!(grad.items.iter().all(|g| *g == 0.0));
        assert!(grad.users.iter().all(|g| *g == 0.0));
    }

    #[test]
    fn test_known_cost() {
        let r = array![[1.0, 2.0]];
        let m = array![[1.0, 0.0]];
        let factors = Factors::new(array![[2.0]], array![[1.0], [3.0]]).unwrap();
        // residual 1, unobserved cell ignored; ΣQ² = 10, ΣP² = 4
        let eval = evaluate(&factors, r.view(), m.view(), 0.5, false).unwrap();
        assert_abs_diff_eq!(eval.cost, 0.5 + 2.5 + 1.0, epsilon = 1e-12);
        assert!(eval.gradients.is_none());
    }

    #[test]
    fn test_cost_nonnegative_and_monotone() {
        let (factors, r, m) = random_problem(1);
        let mut last = -1.0;
        for lambda in [0.0, 0.1, 1.0, 10.0] {
            let cost = evaluate(&factors, r.view(), m.view(), lambda, false)
                .unwrap()
                .cost;
            assert!(cost >= 0.0);
            assert!(cost >= last);
            last = cost;
        }
    }

    #[test]
    fn test_does_not_mutate() {
        let (factors, r, m) = random_problem(2);
        let (f0, r0, m0) = (factors.clone(), r.clone(), m.clone());
        evaluate(&factors, r.view(), m.view(), 1.5, true).unwrap();
        assert_eq!(factors, f0);
        assert_eq!(r, r0);
        assert_eq!(m, m0);
    }

    #[test]
    fn test_gradient_check() {
        let (factors, r, m) = random_problem(3);
        let lambda = 0.7;
        let layout = ParameterLayout::of(&factors);
        let eval = evaluate(&factors, r.view(), m.view(), lambda, true).unwrap();
        let analytic = layout.pack(&eval.gradients.unwrap()).unwrap();

        let x = layout.pack(&factors).unwrap();
        let eps = 1e-5;
        for k in 0..x.len() {
            let mut plus = x.clone();
            plus[k] += eps;
            let mut minus = x.clone();
            minus[k] -= eps;
            let fp = layout.unpack(plus.view()).unwrap();
            let fm = layout.unpack(minus.view()).unwrap();
            let jp = evaluate(&fp, r.view(), m.view(), lambda, false).unwrap().cost;
            let jm = evaluate(&fm, r.view(), m.view(), lambda, false).unwrap().cost;
            let numeric = (jp - jm) / (2.0 * eps);
            assert_abs_diff_eq!(analytic[k], numeric, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_rating_shape_mismatch() {
        let (factors, _r, _m) = random_problem(4);
        let r = Array2::zeros((4, 6));
        let m = Array2::zeros((4, 6));
        let res = evaluate(&factors, r.view(), m.view(), 1.0, true);
        assert!(matches!(res, Err(CofiError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_mask_shape_mismatch() {
        let (factors, r, _m) = random_problem(5);
        let m = Array2::zeros((5, 4));
        let res = evaluate(&factors, r.view(), m.view(), 1.0, false);
        assert!(matches!(res, Err(CofiError::ShapeMismatch { .. })));
    }
}

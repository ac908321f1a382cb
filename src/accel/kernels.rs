// This file is part of LensKit.
// Copyright (C) 2018-2023 Boise State University.
// Copyright (C) 2023-2025 Drexel University.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

//! Row-parallel dense kernels used by the evaluator and predictor.
//!
//! Every output row is computed sequentially by one worker, and reductions
//! are summed in row order, so results do not depend on the thread count.
use ndarray::{Array2, ArrayView2, Zip};
use rayon::prelude::*;

/// Compute `P · Qᵗ`.
pub(crate) fn product(p: ArrayView2<f64>, q: ArrayView2<f64>) -> Array2<f64> {
    let mut out = Array2::zeros((p.nrows(), q.nrows()));
    Zip::from(out.rows_mut())
        .and(p.rows())
        .par_for_each(|mut row, p_row| row.assign(&q.dot(&p_row)));
    out
}

/// Compute the masked residual `(P · Qᵗ − R) ⊙ M`.
///
/// Unobserved cells are exactly zero, whatever placeholder `R` holds there.
pub(crate) fn masked_residual(
    p: ArrayView2<f64>,
    q: ArrayView2<f64>,
    ratings: ArrayView2<f64>,
    mask: ArrayView2<f64>,
) -> Array2<f64> {
    let mut out = Array2::zeros(ratings.raw_dim());
    Zip::from(out.rows_mut())
        .and(p.rows())
        .and(ratings.rows())
        .and(mask.rows())
        .par_for_each(|mut e_row, p_row, r_row, m_row| {
            let predicted = q.dot(&p_row);
            Zip::from(&mut e_row)
                .and(&predicted)
                .and(&r_row)
                .and(&m_row)
                .for_each(|e, &y, &r, &m| {
                    *e = if m != 0.0 { (y - r) * m } else { 0.0 };
                });
        });
    out
}

/// Sum of squared entries.
pub(crate) fn sum_squares(a: ArrayView2<f64>) -> f64 {
    let partials: Vec<f64> = a
        .outer_iter()
        .into_par_iter()
        .map(|row| row.iter().map(|v| v * v).sum::<f64>())
        .collect();
    partials.iter().sum()
}

/// Compute `E · Q + λP`, the gradient with respect to the item factors.
pub(crate) fn item_gradient(
    residual: ArrayView2<f64>,
    p: ArrayView2<f64>,
    q: ArrayView2<f64>,
    lambda: f64,
) -> Array2<f64> {
    let mut grad = Array2::zeros(p.raw_dim());
    let qt = q.t();
    Zip::from(grad.rows_mut())
        .and(residual.rows())
        .and(p.rows())
        .par_for_each(|mut g, e_row, p_row| {
            g.assign(&qt.dot(&e_row));
            g.scaled_add(lambda, &p_row);
        });
    grad
}

/// Compute `Eᵗ · P + λQ`, the gradient with respect to the user factors.
pub(crate) fn user_gradient(
    residual: ArrayView2<f64>,
    p: ArrayView2<f64>,
    q: ArrayView2<f64>,
    lambda: f64,
) -> Array2<f64> {
    let mut grad = Array2::zeros(q.raw_dim());
    let pt = p.t();
    Zip::from(grad.rows_mut())
        .and(residual.columns())
        .and(q.rows())
        .par_for_each(|mut g, e_col, q_row| {
            g.assign(&pt.dot(&e_col));
            g.scaled_add(lambda, &q_row);
        });
    grad
}

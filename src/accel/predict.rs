// This file is part of LensKit.
// Copyright (C) 2018-2023 Boise State University.
// Copyright (C) 2023-2025 Drexel University.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

//! Rating reconstruction from trained factors.
use std::cmp::Reverse;

use ndarray::{Array1, Array2, ArrayView1, Axis};
use ordered_float::NotNan;

use crate::errors::{check_shape, CofiError, Result};
use crate::factors::Factors;
use crate::kernels;

/// Reconstruct the full item × user prediction matrix, `P · Qᵗ` plus item means.
pub fn reconstruct_all(factors: &Factors, means: ArrayView1<f64>) -> Result<Array2<f64>> {
    factors.check()?;
    check_shape("item means", (factors.n_items(), 1), (means.len(), 1))?;
    let mut preds = kernels::product(factors.items.view(), factors.users.view());
    preds += &means.insert_axis(Axis(1));
    Ok(preds)
}

/// Predict every item for a single user without building the full matrix.
pub fn predictions_for_user(
    factors: &Factors,
    means: ArrayView1<f64>,
    user: usize,
) -> Result<Array1<f64>> {
    factors.check()?;
    check_shape("item means", (factors.n_items(), 1), (means.len(), 1))?;
    let n_users = factors.n_users();
    if user >= n_users {
        return Err(CofiError::UserOutOfRange { user, n_users });
    }
    let preds = factors.items.dot(&factors.users.row(user));
    Ok(preds + &means)
}

/// Select the `n` highest-scoring items, skipping those `exclude` rejects.
///
/// NaN scores are never selected.  Ties keep item order.
pub fn top_n<F>(scores: ArrayView1<f64>, n: usize, exclude: F) -> Vec<(usize, f64)>
where
    F: Fn(usize) -> bool,
{
    let mut ranked: Vec<(usize, NotNan<f64>)> = scores
        .iter()
        .enumerate()
        .filter(|(i, _)| !exclude(*i))
        .filter_map(|(i, s)| NotNan::new(*s).ok().map(|s| (i, s)))
        .collect();
    ranked.sort_by_key(|(_i, s)| Reverse(*s));
    ranked.truncate(n);
    ranked.into_iter().map(|(i, s)| (i, s.into_inner())).collect()
}

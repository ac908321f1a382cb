// This file is part of LensKit.
// Copyright (C) 2018-2023 Boise State University.
// Copyright (C) 2023-2025 Drexel University.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

//! Latent factor matrices and their random initialization.
use log::*;
use ndarray::{Array1, Array2, ArrayView2};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::errors::{check_shape, CofiError, Result};

/// Policy for drawing initial factor values.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitPolicy {
    /// One uniform draw over (-1, 1).
    #[default]
    Uniform,
    /// Draw a coin; keep a fresh [0, 1) draw on heads, negate one on tails.
    SignFlip,
}

impl InitPolicy {
    /// Draw a single initial value.
    pub fn draw<R: Rng>(&self, rng: &mut R) -> f64 {
        match self {
            InitPolicy::Uniform => loop {
                let v: f64 = rng.random_range(-1.0..1.0);
                if v > -1.0 {
                    break v;
                }
            },
            InitPolicy::SignFlip => {
                if rng.random::<f64>() > 0.5 {
                    rng.random::<f64>()
                } else {
                    -rng.random::<f64>()
                }
            }
        }
    }

    /// Create a matrix filled with random draws.
    pub fn fill<R: Rng>(&self, rows: usize, cols: usize, rng: &mut R) -> Array2<f64> {
        Array2::from_shape_simple_fn((rows, cols), || self.draw(rng))
    }
}

/// Item and user factor matrices, by name.
///
/// Used both for the model parameters and for their gradients.
#[derive(Clone, Debug, PartialEq)]
pub struct Factors {
    /// Item factors, one row per item.
    pub items: Array2<f64>,
    /// User factors, one row per user.
    pub users: Array2<f64>,
}

impl Factors {
    /// Pair up factor matrices, checking that they share a feature count.
    pub fn new(items: Array2<f64>, users: Array2<f64>) -> Result<Self> {
        let factors = Factors { items, users };
        factors.check()?;
        Ok(factors)
    }

    /// Check that the item and user factors share a feature count.
    pub fn check(&self) -> Result<()> {
        check_shape(
            "user factors",
            (self.n_users(), self.features()),
            self.users.dim(),
        )
    }

    pub fn n_items(&self) -> usize {
        self.items.nrows()
    }

    pub fn n_users(&self) -> usize {
        self.users.nrows()
    }

    pub fn features(&self) -> usize {
        self.items.ncols()
    }

    /// Check that these factors fit a rating matrix of the given shape.
    pub(crate) fn check_ratings(&self, ratings: ArrayView2<f64>) -> Result<()> {
        let (n_items, n_users) = ratings.dim();
        let nf = self.features();
        check_shape("item factors", (n_items, nf), self.items.dim())?;
        check_shape("user factors", (n_users, nf), self.users.dim())
    }
}

/// The factor model: current factors plus their initialization policy.
#[derive(Clone, Debug)]
pub struct FactorModel {
    features: usize,
    init: InitPolicy,
    factors: Factors,
}

impl FactorModel {
    /// Randomly initialize factors for a rating matrix.
    pub fn random<R: Rng>(
        n_items: usize,
        n_users: usize,
        features: usize,
        init: InitPolicy,
        rng: &mut R,
    ) -> Result<Self> {
        if features == 0 {
            return Err(CofiError::InvalidFeatures(features));
        }
        debug!(
            "initializing {} features for {} items and {} users ({:?})",
            features, n_items, n_users, init
        );
        let items = init.fill(n_items, features, rng);
        let users = init.fill(n_users, features, rng);
        Ok(FactorModel {
            features,
            init,
            factors: Factors { items, users },
        })
    }

    /// Wrap existing factors, e.g. ones loaded from disk.
    pub fn from_factors(factors: Factors, init: InitPolicy) -> Result<Self> {
        factors.check()?;
        let features = factors.features();
        if features == 0 {
            return Err(CofiError::InvalidFeatures(features));
        }
        Ok(FactorModel {
            features,
            init,
            factors,
        })
    }

    pub fn features(&self) -> usize {
        self.features
    }

    pub fn init_policy(&self) -> InitPolicy {
        self.init
    }

    pub fn factors(&self) -> &Factors {
        &self.factors
    }

    pub fn item_factors(&self) -> ArrayView2<'_, f64> {
        self.factors.items.view()
    }

    pub fn user_factors(&self) -> ArrayView2<'_, f64> {
        self.factors.users.view()
    }

    /// Replace the factors with updated ones of the same shape.
    pub fn set_factors(&mut self, factors: Factors) -> Result<()> {
        check_shape("item factors", self.factors.items.dim(), factors.items.dim())?;
        check_shape("user factors", self.factors.users.dim(), factors.users.dim())?;
        self.factors = factors;
        Ok(())
    }

    /// Append a freshly randomized row for a new user and return its index.
    pub fn add_user_factors<R: Rng>(&mut self, rng: &mut R) -> Result<usize> {
        let row: Array1<f64> = (0..self.features).map(|_| self.init.draw(rng)).collect();
        let user = self.factors.n_users();
        self.factors
            .users
            .push_row(row.view())
            .map_err(|_| CofiError::ShapeMismatch {
                what: "new user factors",
                expected: (1, self.features),
                actual: (1, row.len()),
            })?;
        Ok(user)
    }
}

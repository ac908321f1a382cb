// This file is part of LensKit.
// Copyright (C) 2018-2023 Boise State University.
// Copyright (C) 2023-2025 Drexel University.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

//! The collaborative filter: ratings, factors and their training state.
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use log::*;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use rand::SeedableRng;
use rand_pcg::Pcg64;

use crate::codec::ParameterLayout;
use crate::config::CofiConfig;
use crate::cost::{self, Evaluation};
use crate::errors::{CofiError, Result};
use crate::factors::{FactorModel, Factors};
use crate::loader::load_matrix;
use crate::optim::{Minimized, Minimizer, Objective};
use crate::predict;
use crate::ratings::RatingStore;

/// Matrix-factorization collaborative filter.
///
/// Factors are trained against the mean-centered ratings; predictions add
/// the item means back.
pub struct CollaborativeFilter {
    config: CofiConfig,
    store: RatingStore,
    model: Option<FactorModel>,
    rng: Pcg64,
    /// Centered training target, cached until the ratings change.
    target: Option<Array2<f64>>,
    /// Dense predictions, cached until the factors or ratings change.
    predictions: Option<Array2<f64>>,
}

/// Cost and gradient of a filter's factors as a function of a flat vector.
pub struct FactorObjective<'a> {
    target: ArrayView2<'a, f64>,
    mask: ArrayView2<'a, f64>,
    layout: ParameterLayout,
    lambda: f64,
}

impl Objective for FactorObjective<'_> {
    fn dimension(&self) -> usize {
        self.layout.len()
    }

    fn evaluate(&self, x: ArrayView1<f64>) -> Result<(f64, Array1<f64>)> {
        let factors = self.layout.unpack(x)?;
        let Evaluation { cost, gradients } =
            cost::evaluate(&factors, self.target, self.mask, self.lambda, true)?;
        let grad = gradients.ok_or(CofiError::NotInitialized)?;
        Ok((cost, self.layout.pack(&grad)?))
    }
}

fn clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

impl CollaborativeFilter {
    /// Create a filter over a rating matrix and its availability mask.
    ///
    /// Factors are not initialized; call [Self::initialize_factors] or
    /// [Self::with_factors] before training.
    pub fn new(ratings: Array2<f64>, mask: Array2<f64>, config: CofiConfig) -> Result<Self> {
        config.validate()?;
        let store = RatingStore::new(ratings, mask)?;
        let seed = config.seed.unwrap_or_else(clock_seed);
        debug!("seeding collaborative filter RNG with {}", seed);
        Ok(CollaborativeFilter {
            config,
            store,
            model: None,
            rng: Pcg64::seed_from_u64(seed),
            target: None,
            predictions: None,
        })
    }

    /// Load ratings, mask and optionally pre-trained factors from text files.
    ///
    /// A missing factor file is replaced by random factors, with the feature
    /// count taken from the other file or, if neither is given, the config.
    pub fn load<P: AsRef<Path>>(
        ratings: P,
        mask: P,
        item_factors: Option<P>,
        user_factors: Option<P>,
        config: CofiConfig,
    ) -> Result<Self> {
        let mut cf = CollaborativeFilter::new(load_matrix(ratings)?, load_matrix(mask)?, config)?;
        let items = item_factors.map(load_matrix).transpose()?;
        let users = user_factors.map(load_matrix).transpose()?;
        let features = match (&items, &users) {
            (None, None) => {
                cf.initialize_factors(cf.config.features)?;
                return Ok(cf);
            }
            (Some(m), _) | (None, Some(m)) => m.ncols(),
        };

        let init = cf.config.init;
        let items = match items {
            Some(m) => m,
            None => {
                debug!("no item factor file, initializing {} features", features);
                init.fill(cf.store.n_items(), features, &mut cf.rng)
            }
        };
        let users = match users {
            Some(m) => m,
            None => {
                debug!("no user factor file, initializing {} features", features);
                init.fill(cf.store.n_users(), features, &mut cf.rng)
            }
        };
        cf.with_factors(items, users)
    }

    /// Use existing factor matrices instead of random initialization.
    pub fn with_factors(mut self, items: Array2<f64>, users: Array2<f64>) -> Result<Self> {
        let factors = Factors::new(items, users)?;
        factors.check_ratings(self.store.ratings())?;
        self.model = Some(FactorModel::from_factors(factors, self.config.init)?);
        self.predictions = None;
        Ok(self)
    }

    /// Randomly initialize factors with the given number of features.
    pub fn initialize_factors(&mut self, features: usize) -> Result<()> {
        let model = FactorModel::random(
            self.store.n_items(),
            self.store.n_users(),
            features,
            self.config.init,
            &mut self.rng,
        )?;
        self.model = Some(model);
        self.predictions = None;
        Ok(())
    }

    pub fn config(&self) -> &CofiConfig {
        &self.config
    }

    pub fn n_items(&self) -> usize {
        self.store.n_items()
    }

    pub fn n_users(&self) -> usize {
        self.store.n_users()
    }

    /// Number of features, if factors exist.
    pub fn features(&self) -> Option<usize> {
        self.model.as_ref().map(|m| m.features())
    }

    pub fn store(&self) -> &RatingStore {
        &self.store
    }

    pub fn model(&self) -> Option<&FactorModel> {
        self.model.as_ref()
    }

    pub fn factors(&self) -> Result<&Factors> {
        self.model
            .as_ref()
            .map(|m| m.factors())
            .ok_or(CofiError::NotInitialized)
    }

    /// Per-item mean of the observed ratings.
    pub fn means(&mut self) -> Result<&Array1<f64>> {
        self.store.means()
    }

    /// Mean-centered ratings.
    pub fn normalized(&mut self) -> Result<Array2<f64>> {
        self.store.normalize()
    }

    /// Layout of the flat parameter vector for the current factors.
    pub fn layout(&self) -> Result<ParameterLayout> {
        Ok(ParameterLayout::of(self.factors()?))
    }

    /// Current factors as a flat parameter vector.
    pub fn parameters(&self) -> Result<Array1<f64>> {
        let factors = self.factors()?;
        ParameterLayout::of(factors).pack(factors)
    }

    /// Replace the factors with the contents of a flat parameter vector.
    pub fn set_parameters(&mut self, flat: ArrayView1<f64>) -> Result<()> {
        let layout = self.layout()?;
        let factors = layout.unpack(flat)?;
        let model = self.model.as_mut().ok_or(CofiError::NotInitialized)?;
        model.set_factors(factors)?;
        self.predictions = None;
        Ok(())
    }

    /// Build the training objective over the centered ratings.
    pub fn objective(&mut self) -> Result<FactorObjective<'_>> {
        self.prepare_target()?;
        self.prepared_objective()
    }

    fn prepare_target(&mut self) -> Result<()> {
        if self.target.is_none() {
            self.target = Some(self.store.normalize()?);
        }
        Ok(())
    }

    fn prepared_objective(&self) -> Result<FactorObjective<'_>> {
        let layout = self.layout()?;
        let target = self.target.as_ref().ok_or(CofiError::NotInitialized)?;
        Ok(FactorObjective {
            target: target.view(),
            mask: self.store.mask(),
            layout,
            lambda: self.config.regularization,
        })
    }

    /// Cost and gradient at a flat parameter vector.  Does not change the factors.
    pub fn evaluate(&mut self, flat: ArrayView1<f64>) -> Result<(f64, Array1<f64>)> {
        self.objective()?.evaluate(flat)
    }

    /// Cost at the current factors.
    pub fn cost(&mut self) -> Result<f64> {
        self.prepare_target()?;
        let objective = self.prepared_objective()?;
        let eval = cost::evaluate(
            self.factors()?,
            objective.target,
            objective.mask,
            objective.lambda,
            false,
        )?;
        Ok(eval.cost)
    }

    /// Train the factors with a minimizer and store the result.
    pub fn fit<M: Minimizer + ?Sized>(&mut self, minimizer: &M) -> Result<Minimized> {
        let initial = self.parameters()?;
        let result = {
            let objective = self.objective()?;
            minimizer.minimize(&objective, initial)?
        };
        self.set_parameters(result.parameters.view())?;
        info!(
            "trained {} features in {} iterations, cost {:.6}",
            self.features().unwrap_or(0),
            result.iterations,
            result.cost
        );
        Ok(result)
    }

    /// Train with the minimizer described by the configuration.
    pub fn fit_default(&mut self) -> Result<Minimized> {
        let minimizer = self.config.minimizer();
        self.fit(&minimizer)
    }

    /// Compute and cache the full prediction matrix.
    pub fn make_predictions(&mut self) -> Result<&Array2<f64>> {
        let preds = match self.predictions.take() {
            Some(p) => p,
            None => {
                let means = self.store.means()?.clone();
                predict::reconstruct_all(self.factors()?, means.view())?
            }
        };
        Ok(self.predictions.insert(preds))
    }

    /// Predictions for every item for one user.
    pub fn predictions_for(&mut self, user: usize) -> Result<Array1<f64>> {
        let n_users = self.n_users();
        if user >= n_users {
            return Err(CofiError::UserOutOfRange { user, n_users });
        }
        if let Some(preds) = &self.predictions {
            return Ok(preds.column(user).to_owned());
        }
        let means = self.store.means()?.clone();
        predict::predictions_for_user(self.factors()?, means.view(), user)
    }

    /// Predict a single rating.
    pub fn predict(&mut self, item: usize, user: usize) -> Result<f64> {
        let n_items = self.n_items();
        if item >= n_items {
            return Err(CofiError::ItemOutOfRange { item, n_items });
        }
        Ok(self.predictions_for(user)?[item])
    }

    /// Recommend the `n` best items the user has not rated.
    pub fn recommend(&mut self, user: usize, n: usize) -> Result<Vec<(usize, f64)>> {
        let preds = self.predictions_for(user)?;
        let store = &self.store;
        Ok(predict::top_n(preds.view(), n, |i| store.is_observed(i, user)))
    }

    /// Add a new user's ratings, growing the ratings and the user factors together.
    ///
    /// Returns the new user's column index.  On error nothing is changed.
    pub fn add_user<I>(&mut self, votes: I) -> Result<usize>
    where
        I: IntoIterator<Item = (usize, f64)>,
    {
        let user = self.store.add_user(votes)?;
        if let Some(model) = self.model.as_mut() {
            match model.add_user_factors(&mut self.rng) {
                Ok(u) => debug_assert_eq!(u, user),
                Err(e) => {
                    self.store.remove_last_user();
                    return Err(e);
                }
            }
        }
        self.target = None;
        self.predictions = None;
        Ok(user)
    }
}

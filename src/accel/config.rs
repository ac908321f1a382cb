// This file is part of LensKit.
// Copyright (C) 2018-2023 Boise State University.
// Copyright (C) 2023-2025 Drexel University.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

//! Collaborative filter configuration.
use serde::{Deserialize, Serialize};

use crate::errors::{CofiError, Result};
use crate::factors::InitPolicy;
use crate::optim::ConjugateGradient;

/// Training configuration for a collaborative filter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CofiConfig {
    /// Number of latent features.
    pub features: usize,
    /// L2 regularization weight (λ).
    pub regularization: f64,
    /// Random seed; drawn from the clock when absent.
    pub seed: Option<u64>,
    pub init: InitPolicy,
    pub max_iterations: usize,
    pub tolerance: f64,
}

impl Default for CofiConfig {
    fn default() -> Self {
        CofiConfig {
            features: 10,
            regularization: 1.0,
            seed: None,
            init: InitPolicy::default(),
            max_iterations: 100,
            tolerance: 1e-6,
        }
    }
}

impl CofiConfig {
    /// Parse a configuration from JSON.  Missing fields take default values.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: CofiConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Reject settings the engine cannot train with.
    pub fn validate(&self) -> Result<()> {
        if self.features == 0 {
            return Err(CofiError::InvalidFeatures(self.features));
        }
        if !self.regularization.is_finite() || self.regularization < 0.0 {
            return Err(CofiError::InvalidRegularization(self.regularization));
        }
        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return Err(CofiError::InvalidTolerance(self.tolerance));
        }
        Ok(())
    }

    pub fn with_features(mut self, features: usize) -> Self {
        self.features = features;
        self
    }

    pub fn with_regularization(mut self, regularization: f64) -> Self {
        self.regularization = regularization;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_init(mut self, init: InitPolicy) -> Self {
        self.init = init;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// The default minimizer for this configuration.
    pub fn minimizer(&self) -> ConjugateGradient {
        ConjugateGradient::new(self.max_iterations, self.tolerance)
    }
}

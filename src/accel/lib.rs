// This file is part of LensKit.
// Copyright (C) 2018-2023 Boise State University.
// Copyright (C) 2023-2025 Drexel University.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

//! Matrix-factorization collaborative filtering.
//!
//! Learns item and user factor matrices whose product approximates the
//! observed entries of an item × user rating matrix, and predicts the rest.

#[cfg(feature = "python")]
use pyo3::prelude::*;

pub mod codec;
pub mod config;
pub mod cost;
pub mod errors;
pub mod factors;
pub mod filter;
mod kernels;
pub mod loader;
pub mod optim;
pub mod parallel;
pub mod predict;
#[cfg(feature = "python")]
mod python;
pub mod ratings;

pub use codec::ParameterLayout;
pub use config::CofiConfig;
pub use errors::{CofiError, Result};
pub use factors::{FactorModel, Factors, InitPolicy};
pub use filter::{CollaborativeFilter, FactorObjective};
pub use optim::{ConjugateGradient, Minimized, Minimizer, Objective};
pub use ratings::RatingStore;

/// Entry point for the collaborative filtering accelerator module.
#[cfg(feature = "python")]
#[pymodule]
fn _cofi(m: &Bound<'_, PyModule>) -> PyResult<()> {
    pyo3_log::init();
    python::register(m)
}

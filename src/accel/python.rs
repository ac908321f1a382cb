// This file is part of LensKit.
// Copyright (C) 2018-2023 Boise State University.
// Copyright (C) 2023-2025 Drexel University.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

//! Python bindings.
//!
//! The filter exposes `evaluate(params) -> (cost, grad)` over flat NumPy
//! vectors, so it can be driven by `scipy.optimize.minimize(..., jac=True)`.
use std::collections::HashMap;

use numpy::{IntoPyArray, PyArray1, PyArray2, PyReadonlyArray1, PyReadonlyArray2, ToPyArray};
use pyo3::prelude::*;

use crate::config::CofiConfig;
use crate::filter::CollaborativeFilter;
use crate::parallel;

/// Matrix-factorization collaborative filter.
#[pyclass(name = "CollaborativeFilter")]
pub struct PyCollaborativeFilter {
    inner: CollaborativeFilter,
}

#[pymethods]
impl PyCollaborativeFilter {
    /// Create a filter and randomly initialize its factors.
    ///
    /// `config` is a JSON object; keyword arguments override its fields.
    #[new]
    #[pyo3(signature = (ratings, mask, *, config=None, features=None, regularization=None, seed=None))]
    fn new<'py>(
        ratings: PyReadonlyArray2<'py, f64>,
        mask: PyReadonlyArray2<'py, f64>,
        config: Option<&str>,
        features: Option<usize>,
        regularization: Option<f64>,
        seed: Option<u64>,
    ) -> PyResult<Self> {
        let mut cfg = match config {
            Some(json) => CofiConfig::from_json(json)?,
            None => CofiConfig::default(),
        };
        if let Some(f) = features {
            cfg = cfg.with_features(f);
        }
        if let Some(r) = regularization {
            cfg = cfg.with_regularization(r);
        }
        if let Some(s) = seed {
            cfg = cfg.with_seed(s);
        }

        let features = cfg.features;
        let mut inner = CollaborativeFilter::new(
            ratings.as_array().to_owned(),
            mask.as_array().to_owned(),
            cfg,
        )?;
        inner.initialize_factors(features)?;
        Ok(PyCollaborativeFilter { inner })
    }

    #[getter]
    fn n_items(&self) -> usize {
        self.inner.n_items()
    }

    #[getter]
    fn n_users(&self) -> usize {
        self.inner.n_users()
    }

    /// Replace the factors with existing matrices.
    fn set_factors<'py>(
        &mut self,
        items: PyReadonlyArray2<'py, f64>,
        users: PyReadonlyArray2<'py, f64>,
    ) -> PyResult<()> {
        let flat = {
            let factors = crate::factors::Factors::new(
                items.as_array().to_owned(),
                users.as_array().to_owned(),
            )?;
            let layout = crate::codec::ParameterLayout::of(&factors);
            layout.pack(&factors)?
        };
        self.inner.set_parameters(flat.view())?;
        Ok(())
    }

    fn item_factors<'py>(&self, py: Python<'py>) -> PyResult<Bound<'py, PyArray2<f64>>> {
        Ok(self.inner.factors()?.items.to_pyarray(py))
    }

    fn user_factors<'py>(&self, py: Python<'py>) -> PyResult<Bound<'py, PyArray2<f64>>> {
        Ok(self.inner.factors()?.users.to_pyarray(py))
    }

    /// Get the factors as a flat parameter vector.
    fn parameters<'py>(&self, py: Python<'py>) -> PyResult<Bound<'py, PyArray1<f64>>> {
        Ok(self.inner.parameters()?.into_pyarray(py))
    }

    /// Set the factors from a flat parameter vector.
    fn set_parameters<'py>(&mut self, params: PyReadonlyArray1<'py, f64>) -> PyResult<()> {
        self.inner.set_parameters(params.as_array())?;
        Ok(())
    }

    /// Compute the cost and gradient at a flat parameter vector.
    fn evaluate<'py>(
        &mut self,
        py: Python<'py>,
        params: PyReadonlyArray1<'py, f64>,
    ) -> PyResult<(f64, Bound<'py, PyArray1<f64>>)> {
        let params = params.as_array();
        let inner = &mut self.inner;
        let (cost, grad) = py.allow_threads(|| inner.evaluate(params))?;
        Ok((cost, grad.into_pyarray(py)))
    }

    fn means<'py>(&mut self, py: Python<'py>) -> PyResult<Bound<'py, PyArray1<f64>>> {
        Ok(self.inner.means()?.to_pyarray(py))
    }

    fn normalized<'py>(&mut self, py: Python<'py>) -> PyResult<Bound<'py, PyArray2<f64>>> {
        Ok(self.inner.normalized()?.into_pyarray(py))
    }

    /// Train with the built-in conjugate gradient minimizer.
    ///
    /// Returns the final cost, iteration count and whether it converged.
    fn fit(&mut self, py: Python<'_>) -> PyResult<(f64, usize, bool)> {
        let inner = &mut self.inner;
        let result = py.allow_threads(|| inner.fit_default())?;
        Ok((result.cost, result.iterations, result.converged))
    }

    /// Add a user from a dict of item index to score; returns the user index.
    fn add_user(&mut self, votes: HashMap<usize, f64>) -> PyResult<usize> {
        Ok(self.inner.add_user(votes)?)
    }

    fn predictions<'py>(&mut self, py: Python<'py>) -> PyResult<Bound<'py, PyArray2<f64>>> {
        let inner = &mut self.inner;
        let preds = py.allow_threads(|| inner.make_predictions().map(|p| p.clone()))?;
        Ok(preds.into_pyarray(py))
    }

    fn predictions_for<'py>(
        &mut self,
        py: Python<'py>,
        user: usize,
    ) -> PyResult<Bound<'py, PyArray1<f64>>> {
        Ok(self.inner.predictions_for(user)?.into_pyarray(py))
    }

    fn recommend(&mut self, user: usize, n: usize) -> PyResult<Vec<(usize, f64)>> {
        Ok(self.inner.recommend(user, n)?)
    }
}

/// Configure the accelerator thread pool.
#[pyfunction]
pub fn init_accel_pool(n_threads: usize) -> PyResult<()> {
    Ok(parallel::init_pool(n_threads)?)
}

#[pyfunction]
pub fn thread_count() -> PyResult<usize> {
    Ok(parallel::thread_count())
}

/// Register the Python classes and functions.
pub fn register(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyCollaborativeFilter>()?;
    m.add_function(wrap_pyfunction!(init_accel_pool, m)?)?;
    m.add_function(wrap_pyfunction!(thread_count, m)?)?;
    Ok(())
}

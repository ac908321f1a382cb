// This file is part of LensKit.
// Copyright (C) 2018-2023 Boise State University.
// Copyright (C) 2023-2025 Drexel University.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

//! Error types for the collaborative filter.
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the factorization engine.
#[derive(Error, Debug)]
pub enum CofiError {
    #[error("shape mismatch for {what}: expected {expected:?}, found {actual:?}")]
    ShapeMismatch {
        what: &'static str,
        expected: (usize, usize),
        actual: (usize, usize),
    },
    #[error("parameter vector has length {actual}, expected {expected}")]
    ParameterLength { expected: usize, actual: usize },
    #[error("mean undefined for item {item}: no observed ratings")]
    UndefinedMean { item: usize },
    #[error("item index {item} out of range for {n_items} items")]
    ItemOutOfRange { item: usize, n_items: usize },
    #[error("user index {user} out of range for {n_users} users")]
    UserOutOfRange { user: usize, n_users: usize },
    #[error("invalid mask value {value} at ({row}, {col}), expected 0 or 1")]
    InvalidMask { row: usize, col: usize, value: f64 },
    #[error("factors have not been initialized")]
    NotInitialized,
    #[error("invalid feature count {0}")]
    InvalidFeatures(usize),
    #[error("invalid regularization {0}")]
    InvalidRegularization(f64),
    #[error("invalid convergence tolerance {0}")]
    InvalidTolerance(f64),
    #[error("parse error at line {line}, field {field}: {message}")]
    Parse {
        line: usize,
        field: usize,
        message: String,
    },
    #[error("cannot read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
    #[error("thread pool initialization error: {0}")]
    ThreadPool(String),
}

pub type Result<T> = std::result::Result<T, CofiError>;

/// Check that a matrix has the shape we expect.
pub(crate) fn check_shape(
    what: &'static str,
    expected: (usize, usize),
    actual: (usize, usize),
) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(CofiError::ShapeMismatch {
            what,
            expected,
            actual,
        })
    }
}

#[cfg(feature = "python")]
impl From<CofiError> for pyo3::PyErr {
    fn from(value: CofiError) -> Self {
        use pyo3::exceptions::{PyIndexError, PyOSError, PyRuntimeError, PyValueError};

        let msg = format!("{}", value);
        match value {
            CofiError::ItemOutOfRange { .. } | CofiError::UserOutOfRange { .. } => {
                PyIndexError::new_err(msg)
            }
            CofiError::Io { .. } => PyOSError::new_err(msg),
            CofiError::NotInitialized | CofiError::ThreadPool(_) => PyRuntimeError::new_err(msg),
            _ => PyValueError::new_err(msg),
        }
    }
}

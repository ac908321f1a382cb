// This file is part of LensKit.
// Copyright (C) 2018-2023 Boise State University.
// Copyright (C) 2023-2025 Drexel University.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

//! Thread pool management for the row-parallel kernels.
use log::*;
use rayon::{current_num_threads, ThreadPoolBuilder};

use crate::errors::{CofiError, Result};

/// Configure the global thread pool.  Can only succeed once per process.
pub fn init_pool(n_threads: usize) -> Result<()> {
    debug!(
        "initializing accelerator thread pool with {} threads",
        n_threads
    );
    ThreadPoolBuilder::new()
        .num_threads(n_threads)
        .build_global()
        .map_err(|e| CofiError::ThreadPool(e.to_string()))
}

/// Number of threads available to the kernels.
pub fn thread_count() -> usize {
    current_num_threads()
}

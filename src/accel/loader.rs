// This file is part of LensKit.
// Copyright (C) 2018-2023 Boise State University.
// Copyright (C) 2023-2025 Drexel University.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

//! Loading dense matrices from whitespace-separated text files.
//!
//! Each line holds one row.  Reading stops at the first blank line, so
//! trailing newlines and footers are ignored.
use std::fs;
use std::path::Path;

use log::*;
use ndarray::Array2;

use crate::errors::{CofiError, Result};

/// Parse a matrix from text.
pub fn parse_matrix(text: &str) -> Result<Array2<f64>> {
    let mut values = Vec::new();
    let mut width = None;
    let mut rows = 0;

    for (lno, line) in text.lines().enumerate() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            break;
        }

        let mut n = 0;
        for (field, tok) in line.split_whitespace().enumerate() {
            let v: f64 = tok.parse().map_err(|e| CofiError::Parse {
                line: lno + 1,
                field: field + 1,
                message: format!("invalid number {:?}: {}", tok, e),
            })?;
            values.push(v);
            n += 1;
        }

        match width {
            None => width = Some(n),
            Some(w) if w != n => {
                return Err(CofiError::Parse {
                    line: lno + 1,
                    field: n,
                    message: format!("row has {} values, expected {}", n, w),
                })
            }
            _ => (),
        }
        rows += 1;
    }

    let cols = width.unwrap_or(0);
    Array2::from_shape_vec((rows, cols), values).map_err(|e| CofiError::Parse {
        line: rows,
        field: cols,
        message: e.to_string(),
    })
}

/// Load a matrix from a file.
pub fn load_matrix<P: AsRef<Path>>(path: P) -> Result<Array2<f64>> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| CofiError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let matrix = parse_matrix(&text)?;
    debug!(
        "loaded {}x{} matrix from {}",
        matrix.nrows(),
        matrix.ncols(),
        path.display()
    );
    Ok(matrix)
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn test_parse_simple() {
        let m = parse_matrix("5 0 3\n0 4 0\n").unwrap();
        assert_eq!(m, array![[5.0, 0.0, 3.0], [0.0, 4.0, 0.0]]);
    }

    #[test]
    fn test_stops_at_blank_line() {
        let m = parse_matrix("1 2\r\n3 4\r\n\r\nnot a row\n").unwrap();
        assert_eq!(m, array![[1.0, 2.0], [3.0, 4.0]]);
    }

    #[test]
    fn test_empty() {
        let m = parse_matrix("").unwrap();
        assert_eq!(m.dim(), (0, 0));
    }

    #[test]
    fn test_bad_number() {
        match parse_matrix("1 2\n3 x\n") {
            Err(CofiError::Parse { line, field, .. }) => {
                assert_eq!(line, 2);
                assert_eq!(field, 2);
            }
            r => panic!("unexpected result {:?}", r),
        }
    }

    #[test]
    fn test_ragged() {
        match parse_matrix("1 2 3\n4 5\n") {
            Err(CofiError::Parse { line, .. }) => assert_eq!(line, 2),
            r => panic!("unexpected result {:?}", r),
        }
    }

    #[test]
    fn test_missing_file() {
        let r = load_matrix("/nonexistent/cofi/ratings.txt");
        assert!(matches!(r, Err(CofiError::Io { .. })));
    }

    #[test]
    fn test_load_file() {
        let path = std::env::temp_dir().join(format!("cofi-load-{}.txt", std::process::id()));
        fs::write(&path, "0.5 -1.25\n2 3e-1\n").unwrap();
        let m = load_matrix(&path).unwrap();
        fs::remove_file(&path).unwrap();
        assert_eq!(m, array![[0.5, -1.25], [2.0, 0.3]]);
    }
}

// This file is part of LensKit.
// Copyright (C) 2018-2023 Boise State University.
// Copyright (C) 2023-2025 Drexel University.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

//! Flat parameter vectors for generic optimizers.
//!
//! A flat vector holds all item factors in row-major order, followed by all
//! user factors in row-major order.  Gradients use the same layout.
use ndarray::{s, Array1, Array2, ArrayView1};

use crate::errors::{check_shape, CofiError, Result};
use crate::factors::Factors;

/// Dimensions needed to split and reshape a flat parameter vector.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParameterLayout {
    pub n_items: usize,
    pub n_users: usize,
    pub features: usize,
}

impl ParameterLayout {
    pub fn new(n_items: usize, n_users: usize, features: usize) -> Self {
        ParameterLayout {
            n_items,
            n_users,
            features,
        }
    }

    /// Get the layout that matches a set of factors.
    pub fn of(factors: &Factors) -> Self {
        ParameterLayout::new(factors.n_items(), factors.n_users(), factors.features())
    }

    /// Position where the user factors begin.
    pub fn split(&self) -> usize {
        self.n_items * self.features
    }

    /// Total vector length.
    pub fn len(&self) -> usize {
        self.split() + self.n_users * self.features
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check(&self, factors: &Factors) -> Result<()> {
        check_shape(
            "item factors",
            (self.n_items, self.features),
            factors.items.dim(),
        )?;
        check_shape(
            "user factors",
            (self.n_users, self.features),
            factors.users.dim(),
        )
    }

    /// Flatten factors (or gradients) into one vector.
    pub fn pack(&self, factors: &Factors) -> Result<Array1<f64>> {
        self.check(factors)?;
        let mut flat = Vec::with_capacity(self.len());
        // logical iteration order is row-major whatever the memory layout
        flat.extend(factors.items.iter());
        flat.extend(factors.users.iter());
        Ok(Array1::from(flat))
    }

    /// Reshape a flat vector into item and user factors.
    pub fn unpack(&self, flat: ArrayView1<f64>) -> Result<Factors> {
        if flat.len() != self.len() {
            return Err(CofiError::ParameterLength {
                expected: self.len(),
                actual: flat.len(),
            });
        }
        let split = self.split();
        let items = reshape(flat.slice(s![..split]), self.n_items, self.features)?;
        let users = reshape(flat.slice(s![split..]), self.n_users, self.features)?;
        Ok(Factors { items, users })
    }
}

fn reshape(flat: ArrayView1<f64>, rows: usize, cols: usize) -> Result<Array2<f64>> {
    Array2::from_shape_vec((rows, cols), flat.to_vec()).map_err(|_| CofiError::ParameterLength {
        expected: rows * cols,
        actual: flat.len(),
    })
}

#[cfg(test)]
mod tests {
    use ndarray::{array, ShapeBuilder};
    use rand::SeedableRng;
    use rand_pcg::Pcg64;

    use super::*;
    use crate::factors::InitPolicy;

    #[test]
    fn test_layout_len() {
        let layout = ParameterLayout::new(3, 5, 2);
        assert_eq!(layout.split(), 6);
        assert_eq!(layout.len(), 16);
    }

    #[test]
    fn test_pack_order() {
        let factors = Factors::new(array![[1.0, 2.0], [3.0, 4.0]], array![[5.0, 6.0]]).unwrap();
        let layout = ParameterLayout::of(&factors);
        let flat = layout.pack(&factors).unwrap();
        assert_eq!(flat, array![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_pack_column_major_input() {
        // factors grown by push_row / push_column may not be in standard layout
        let items = Array2::from_shape_vec((2, 2).f(), vec![1.0, 3.0, 2.0, 4.0]).unwrap();
        assert_eq!(items, array![[1.0, 2.0], [3.0, 4.0]]);
        let users = Array2::from_shape_vec((1, 2), vec![5.0, 6.0]).unwrap();
        let factors = Factors::new(items, users).unwrap();
        let flat = ParameterLayout::of(&factors).pack(&factors).unwrap();
        assert_eq!(flat, array![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_unpack_pack_identity() {
        let mut rng = Pcg64::seed_from_u64(20);
        for (m, n, f) in [(1, 1, 1), (4, 7, 3), (10, 2, 5)] {
            let factors = Factors::new(
                InitPolicy::Uniform.fill(m, f, &mut rng),
                InitPolicy::Uniform.fill(n, f, &mut rng),
            )
            .unwrap();
            let layout = ParameterLayout::of(&factors);
            let flat = layout.pack(&factors).unwrap();
            assert_eq!(flat.len(), m * f + n * f);
            let back = layout.unpack(flat.view()).unwrap();
            assert_eq!(back, factors);
        }
    }

    #[test]
    fn test_unpack_wrong_length() {
        let layout = ParameterLayout::new(2, 2, 2);
        let flat = Array1::zeros(7);
        match layout.unpack(flat.view()) {
            Err(CofiError::ParameterLength { expected, actual }) => {
                assert_eq!(expected, 8);
                assert_eq!(actual, 7);
            }
            r => panic!("unexpected result {:?}", r),
        }
    }

    #[test]
    fn test_pack_wrong_shape() {
        let layout = ParameterLayout::new(3, 2, 2);
        let factors = Factors::new(Array2::zeros((2, 2)), Array2::zeros((2, 2))).unwrap();
        assert!(matches!(
            layout.pack(&factors),
            Err(CofiError::ShapeMismatch { .. })
        ));
    }
}

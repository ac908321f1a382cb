// This file is part of LensKit.
// Copyright (C) 2018-2023 Boise State University.
// Copyright (C) 2023-2025 Drexel University.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

//! Rating storage with an explicit availability mask.
use log::*;
use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2, Axis, Zip};

use crate::errors::{check_shape, CofiError, Result};

/// Item × user rating matrix and its availability mask.
///
/// The mask is the only source of truth for whether a rating was observed;
/// the value stored in an unobserved cell is never interpreted.
#[derive(Clone, Debug)]
pub struct RatingStore {
    ratings: Array2<f64>,
    mask: Array2<f64>,
    means: Option<Array1<f64>>,
}

impl RatingStore {
    /// Create a rating store, checking that the mask matches the ratings.
    pub fn new(ratings: Array2<f64>, mask: Array2<f64>) -> Result<Self> {
        check_shape("availability mask", ratings.dim(), mask.dim())?;
        for ((row, col), &value) in mask.indexed_iter() {
            if value != 0.0 && value != 1.0 {
                return Err(CofiError::InvalidMask { row, col, value });
            }
        }
        debug!(
            "created rating store with {} items and {} users",
            ratings.nrows(),
            ratings.ncols()
        );
        Ok(RatingStore {
            ratings,
            mask,
            means: None,
        })
    }

    pub fn n_items(&self) -> usize {
        self.ratings.nrows()
    }

    pub fn n_users(&self) -> usize {
        self.ratings.ncols()
    }

    pub fn ratings(&self) -> ArrayView2<'_, f64> {
        self.ratings.view()
    }

    pub fn mask(&self) -> ArrayView2<'_, f64> {
        self.mask.view()
    }

    /// Query whether a rating was observed.
    pub fn is_observed(&self, item: usize, user: usize) -> bool {
        self.mask.get((item, user)).is_some_and(|m| *m == 1.0)
    }

    /// Get the item means if they have already been computed.
    pub fn cached_means(&self) -> Option<&Array1<f64>> {
        self.means.as_ref()
    }

    /// Recompute the per-item means and cache them.
    pub fn compute_means(&mut self) -> Result<&Array1<f64>> {
        let means = item_means(self.ratings.view(), self.mask.view())?;
        Ok(self.means.insert(means))
    }

    /// Get the per-item means, computing them on first use.
    pub fn means(&mut self) -> Result<&Array1<f64>> {
        let means = match self.means.take() {
            Some(m) => m,
            None => item_means(self.ratings.view(), self.mask.view())?,
        };
        Ok(self.means.insert(means))
    }

    /// Get a mean-centered copy of the ratings.  Unobserved cells are 0.
    pub fn normalize(&mut self) -> Result<Array2<f64>> {
        let means = self.means()?.clone();
        center(self.ratings.view(), self.mask.view(), means.view())
    }

    /// Append a column for a new user and return its index.
    ///
    /// Every vote is checked before anything is modified, so a bad item index
    /// leaves the store untouched.  A repeated item keeps its last score.
    pub fn add_user<I>(&mut self, votes: I) -> Result<usize>
    where
        I: IntoIterator<Item = (usize, f64)>,
    {
        let n_items = self.n_items();
        let mut scores = Array1::zeros(n_items);
        let mut avail = Array1::zeros(n_items);
        for (item, score) in votes {
            if item >= n_items {
                return Err(CofiError::ItemOutOfRange { item, n_items });
            }
            scores[item] = score;
            avail[item] = 1.0;
        }

        let user = self.n_users();
        push_column(&mut self.ratings, scores.view())?;
        if let Err(e) = push_column(&mut self.mask, avail.view()) {
            self.ratings = self.ratings.slice(s![.., ..user]).to_owned();
            return Err(e);
        }
        self.means = None;

        debug!(
            "added user {} with {} ratings",
            user,
            avail.iter().filter(|m| **m == 1.0).count()
        );
        Ok(user)
    }

    /// Drop the most recently added user column.
    pub(crate) fn remove_last_user(&mut self) {
        let n = self.n_users();
        if n > 0 {
            self.ratings = self.ratings.slice(s![.., ..n - 1]).to_owned();
            self.mask = self.mask.slice(s![.., ..n - 1]).to_owned();
            self.means = None;
        }
    }
}

fn push_column(matrix: &mut Array2<f64>, column: ArrayView1<f64>) -> Result<()> {
    let (rows, cols) = matrix.dim();
    matrix
        .push_column(column)
        .map_err(|_| CofiError::ShapeMismatch {
            what: "new user column",
            expected: (rows, 1),
            actual: (column.len(), 1),
        })?;
    debug_assert_eq!(matrix.ncols(), cols + 1);
    Ok(())
}

/// Compute the mean of the observed ratings in each item row.
pub fn item_means(ratings: ArrayView2<f64>, mask: ArrayView2<f64>) -> Result<Array1<f64>> {
    check_shape("availability mask", ratings.dim(), mask.dim())?;
    let mut means = Array1::zeros(ratings.nrows());
    for (item, (r_row, m_row)) in ratings
        .axis_iter(Axis(0))
        .zip(mask.axis_iter(Axis(0)))
        .enumerate()
    {
        let mut sum = 0.0;
        let mut count = 0usize;
        Zip::from(&r_row).and(&m_row).for_each(|&r, &m| {
            if m == 1.0 {
                sum += r;
                count += 1;
            }
        });
        if count == 0 {
            return Err(CofiError::UndefinedMean { item });
        }
        means[item] = sum / count as f64;
    }
    Ok(means)
}

/// Subtract the item mean from every observed rating.
pub fn center(
    ratings: ArrayView2<f64>,
    mask: ArrayView2<f64>,
    means: ArrayView1<f64>,
) -> Result<Array2<f64>> {
    check_shape("availability mask", ratings.dim(), mask.dim())?;
    check_shape("item means", (ratings.nrows(), 1), (means.len(), 1))?;
    let mut out = Array2::zeros(ratings.raw_dim());
    Zip::from(out.rows_mut())
        .and(ratings.rows())
        .and(mask.rows())
        .and(&means)
        .for_each(|mut o_row, r_row, m_row, &mean| {
            Zip::from(&mut o_row)
                .and(&r_row)
                .and(&m_row)
                .for_each(|o, &r, &m| {
                    if m == 1.0 {
                        *o = r - mean;
                    }
                });
        });
    Ok(out)
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    use super::*;

    fn example() -> RatingStore {
        RatingStore::new(array![[5.0, 0.0], [0.0, 4.0]], array![[1.0, 0.0], [0.0, 1.0]])
            .expect("valid store")
    }

    #[test]
    fn test_means_example() {
        let mut store = example();
        assert_eq!(store.means().unwrap(), &array![5.0, 4.0]);
    }

    #[test]
    fn test_normalize_example() {
        let mut store = example();
        assert_eq!(store.normalize().unwrap(), Array2::<f64>::zeros((2, 2)));
    }

    #[test]
    fn test_normalize_round_trip() {
        let ratings = array![[4.0, 2.5, 0.0, 1.0], [3.0, 0.0, 3.5, 0.0], [0.0, 5.0, 1.0, 2.0]];
        let mask = array![[1.0, 1.0, 0.0, 1.0], [1.0, 0.0, 1.0, 0.0], [0.0, 1.0, 1.0, 1.0]];
        let mut store = RatingStore::new(ratings.clone(), mask.clone()).unwrap();
        let norm = store.normalize().unwrap();
        let means = store.cached_means().unwrap().clone();

        for ((i, j), &v) in norm.indexed_iter() {
            if mask[[i, j]] == 1.0 {
                assert_abs_diff_eq!(v + means[i], ratings[[i, j]], epsilon = 1e-12);
            } else {
                assert_eq!(v, 0.0);
            }
        }
    }

    #[test]
    fn test_normalize_does_not_mutate() {
        let mut store = example();
        let before = store.ratings().to_owned();
        let _ = store.normalize().unwrap();
        assert_eq!(store.ratings(), before);
        assert_eq!(store.mask(), array![[1.0, 0.0], [0.0, 1.0]]);
    }

    #[test]
    fn test_mean_ignores_placeholder() {
        // an unobserved cell holding a nonzero value must not leak into the mean
        let mut store = RatingStore::new(array![[2.0, 9.0]], array![[1.0, 0.0]]).unwrap();
        assert_eq!(store.means().unwrap(), &array![2.0]);
    }

    #[test]
    fn test_undefined_mean() {
        let mut store =
            RatingStore::new(array![[1.0, 2.0], [0.0, 0.0]], array![[1.0, 1.0], [0.0, 0.0]])
                .unwrap();
        match store.compute_means() {
            Err(CofiError::UndefinedMean { item }) => assert_eq!(item, 1),
            r => panic!("unexpected result {:?}", r),
        }
    }

    #[test]
    fn test_mask_shape_mismatch() {
        let r = RatingStore::new(Array2::zeros((2, 3)), Array2::zeros((2, 2)));
        assert!(matches!(r, Err(CofiError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_mask_bad_value() {
        let r = RatingStore::new(Array2::zeros((1, 2)), array![[1.0, 0.5]]);
        assert!(matches!(
            r,
            Err(CofiError::InvalidMask { row: 0, col: 1, .. })
        ));
    }

    #[test]
    fn test_add_user_example() {
        let mut store = example();
        let user = store.add_user([(0, 3.0)]).unwrap();
        assert_eq!(user, 2);
        assert_eq!(store.ratings(), array![[5.0, 0.0, 3.0], [0.0, 4.0, 0.0]]);
        assert_eq!(store.mask(), array![[1.0, 0.0, 1.0], [0.0, 1.0, 0.0]]);
    }

    #[test]
    fn test_add_user_empty() {
        let mut store = example();
        store.add_user(std::iter::empty::<(usize, f64)>()).unwrap();
        assert_eq!(store.n_users(), 3);
        assert_eq!(store.ratings().column(2), array![0.0, 0.0]);
        assert_eq!(store.mask().column(2), array![0.0, 0.0]);
    }

    #[test]
    fn test_add_user_updates_means() {
        let mut store = example();
        store.means().unwrap();
        store.add_user([(0, 3.0)]).unwrap();
        assert!(store.cached_means().is_none());
        assert_eq!(store.means().unwrap(), &array![4.0, 4.0]);
    }

    #[test]
    fn test_add_user_bad_item() {
        let mut store = example();
        let r = store.add_user([(0, 3.0), (2, 1.0)]);
        assert!(matches!(
            r,
            Err(CofiError::ItemOutOfRange {
                item: 2,
                n_items: 2
            })
        ));
        assert_eq!(store.n_users(), 2);
        assert_eq!(store.mask().dim(), (2, 2));
    }

    #[test]
    fn test_remove_last_user() {
        let mut store = example();
        store.add_user([(1, 2.0)]).unwrap();
        store.remove_last_user();
        assert_eq!(store.ratings(), array![[5.0, 0.0], [0.0, 4.0]]);
        assert_eq!(store.mask(), array![[1.0, 0.0], [0.0, 1.0]]);
    }
}

// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Sorted lane × azimuth grids exported from a [`crate::frame::Frame`].
//!
//! Both grids have [`LANES`] rows in export order (see
//! [`EXPORT_ROW_TO_LANE`]) and one column per azimuth held by the frame.
//! The obstacle detector consumes them by value and marks cells as it
//! visits them, so a grid is single-use.
//!
//! ```text
//!            col 0        col 1               col n-1
//! row 0  ┌────────────┬────────────┬─────┬────────────┐  lane 15
//! row 1  │            │            │     │            │  lane 13
//!  ...   │            │            │ ... │            │
//! row 15 └────────────┴────────────┴─────┴────────────┘  lane 0
//! ```

use crate::{
    lidar::{Error, LANES, Point3},
    tables::EXPORT_ROW_TO_LANE,
};
use ndarray::{Array2, ArrayView1};

/// One cell of a [`DistanceGrid`].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DistanceSample {
    /// Stored (vehicle frame) azimuth in hundredths of a degree.
    pub azimuth: u16,
    /// Measured distance minus the calibration distance, in meters.
    pub residual: f64,
}

/// Point cloud grid, each row sorted ascending by X.
#[derive(Clone, Debug)]
pub struct PointGrid {
    cells: Array2<Point3>,
}

impl PointGrid {
    /// Build from row-major data of `LANES * width` points.
    pub fn from_rows(width: usize, data: Vec<Point3>) -> Result<Self, Error> {
        Ok(Self {
            cells: Array2::from_shape_vec((LANES, width), data)?,
        })
    }

    /// Number of azimuth columns.
    #[inline]
    pub fn width(&self) -> usize {
        self.cells.ncols()
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> Point3 {
        self.cells[[row, col]]
    }

    #[inline]
    pub fn get_mut(&mut self, row: usize, col: usize) -> &mut Point3 {
        &mut self.cells[[row, col]]
    }

    pub fn row(&self, row: usize) -> ArrayView1<'_, Point3> {
        self.cells.row(row)
    }

    /// Physical lane stored in an export row.
    #[inline]
    pub fn lane(&self, row: usize) -> usize {
        EXPORT_ROW_TO_LANE[row]
    }
}

/// Residual distance grid, each row sorted by rotation-corrected azimuth.
#[derive(Clone, Debug)]
pub struct DistanceGrid {
    cells: Array2<DistanceSample>,
}

impl DistanceGrid {
    /// Build from row-major data of `LANES * width` samples.
    pub fn from_rows(width: usize, data: Vec<DistanceSample>) -> Result<Self, Error> {
        Ok(Self {
            cells: Array2::from_shape_vec((LANES, width), data)?,
        })
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.cells.ncols()
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> DistanceSample {
        self.cells[[row, col]]
    }

    #[inline]
    pub fn get_mut(&mut self, row: usize, col: usize) -> &mut DistanceSample {
        &mut self.cells[[row, col]]
    }

    pub fn row(&self, row: usize) -> ArrayView1<'_, DistanceSample> {
        self.cells.row(row)
    }

    #[inline]
    pub fn lane(&self, row: usize) -> usize {
        EXPORT_ROW_TO_LANE[row]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_grid_shape() {
        let data = (0..LANES * 3)
            .map(|i| Point3::new(i as f64, 0.0, 0.0))
            .collect();
        let mut grid = PointGrid::from_rows(3, data).unwrap();
        assert_eq!(grid.width(), 3);
        assert_eq!(grid.get(1, 2).x, 5.0);
        assert_eq!(grid.row(15).len(), 3);
        assert_eq!(grid.lane(0), 15);

        grid.get_mut(0, 0).z = 2.0;
        assert_eq!(grid.get(0, 0).z, 2.0);
    }

    #[test]
    fn test_shape_mismatch() {
        let data = vec![DistanceSample::default(); LANES * 3 - 1];
        assert!(matches!(
            DistanceGrid::from_rows(3, data),
            Err(Error::Shape(_))
        ));
    }
}

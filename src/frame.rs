// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Sparse per-rotation accumulator of decoded samples.
//!
//! A [`Frame`] stores one row of [`LANES`] values per azimuth key, in two
//! independent maps: distances (always) and cartesian points (point cloud
//! mode only). Keys are vehicle frame azimuths in `0..AZIMUTH_DOMAIN`.
//!
//! Missing distances are linearly interpolated from the nearest present
//! keys. Completed frames are exported as sorted lane × azimuth grids for
//! the obstacle detector.

use crate::{
    grid::{DistanceGrid, DistanceSample, PointGrid},
    lidar::{AZIMUTH_DOMAIN, Error, LANES, Point3, ROTATION_OFFSET},
    tables::EXPORT_ROW_TO_LANE,
};
use std::{collections::BTreeMap, ops::Bound};
use tracing::warn;

#[derive(Clone, Debug, Default)]
pub struct Frame {
    points: BTreeMap<u16, [Point3; LANES]>,
    distances: BTreeMap<u16, [f64; LANES]>,
    azimuths: usize,
    /// Host timestamp in nanoseconds when the frame was handed out.
    pub timestamp: u64,
    /// Frame sequence ID (wraps at u32::MAX)
    pub frame_id: u32,
}

impl Frame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct azimuth keys holding any sample.
    #[inline]
    pub fn azimuths(&self) -> usize {
        self.azimuths
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.azimuths == 0
    }

    /// True when the point cloud map holds samples.
    #[inline]
    pub fn has_points(&self) -> bool {
        !self.points.is_empty()
    }

    pub fn add_point(&mut self, lane: usize, azimuth: u16, point: Point3) -> Result<(), Error> {
        check_key(lane, azimuth)?;
        let fresh = !self.points.contains_key(&azimuth) && !self.distances.contains_key(&azimuth);
        self.points.entry(azimuth).or_default()[lane] = point;
        if fresh {
            self.azimuths += 1;
        }
        Ok(())
    }

    pub fn add_distance(&mut self, lane: usize, azimuth: u16, distance: f64) -> Result<(), Error> {
        check_key(lane, azimuth)?;
        let fresh = !self.points.contains_key(&azimuth) && !self.distances.contains_key(&azimuth);
        self.distances.entry(azimuth).or_insert([0.0; LANES])[lane] = distance;
        if fresh {
            self.azimuths += 1;
        }
        Ok(())
    }

    /// Stored point, no interpolation.
    pub fn point(&self, lane: usize, azimuth: u16) -> Option<Point3> {
        self.points.get(&azimuth).and_then(|row| row.get(lane)).copied()
    }

    /// Stored distance, no interpolation.
    pub fn stored_distance(&self, lane: usize, azimuth: u16) -> Option<f64> {
        self.distances
            .get(&azimuth)
            .and_then(|row| row.get(lane))
            .copied()
    }

    /// Distance for `(lane, azimuth)`, interpolated between the nearest
    /// present keys when the azimuth itself is missing.
    ///
    /// Returns `None` for an invalid lane, or when fewer than two azimuths
    /// are present and the key is missing. With neighbors on only one side
    /// the nearest neighbor's value is returned.
    pub fn distance(&self, lane: usize, azimuth: u16) -> Option<f64> {
        if lane >= LANES {
            return None;
        }
        if let Some(row) = self.distances.get(&azimuth) {
            return Some(row[lane]);
        }
        if self.distances.len() < 2 {
            return None;
        }

        let below = self.distances.range(..azimuth).next_back();
        let above = self
            .distances
            .range((Bound::Excluded(azimuth), Bound::Unbounded))
            .next();

        match (below, above) {
            (Some((&lower, low)), Some((&upper, high))) => {
                let (low, high) = (low[lane], high[lane]);
                let slope = (low - high) / (lower as f64 - upper as f64);
                Some(low + slope * (azimuth as f64 - lower as f64))
            }
            (Some((_, row)), None) | (None, Some((_, row))) => Some(row[lane]),
            (None, None) => None,
        }
    }

    /// Fill `out` with every point of `lane`, sorted ascending by X.
    pub fn point_row(&self, lane: usize, out: &mut [Point3]) -> Result<(), Error> {
        if lane >= LANES {
            return Err(Error::InvalidLane(lane));
        }
        self.check_export(out.len(), self.points.len())?;

        for (slot, row) in out.iter_mut().zip(self.points.values()) {
            *slot = row[lane];
        }
        out.sort_by(|a, b| a.x.total_cmp(&b.x));
        Ok(())
    }

    /// Fill `out` with `(azimuth, residual)` for `lane`, sorted by
    /// rotation-corrected azimuth.
    ///
    /// The residual is the stored distance minus the calibration distance
    /// for the same key, or zero when no calibration data is available.
    pub fn distance_row(
        &self,
        lane: usize,
        calibration: Option<&Frame>,
        out: &mut [DistanceSample],
    ) -> Result<(), Error> {
        if lane >= LANES {
            return Err(Error::InvalidLane(lane));
        }
        self.check_export(out.len(), self.distances.len())?;

        let calibration = calibration.filter(|c| !c.distances.is_empty());
        for (slot, (&azimuth, row)) in out.iter_mut().zip(self.distances.iter()) {
            let reference = calibration.and_then(|c| c.distance(lane, azimuth));
            *slot = DistanceSample {
                azimuth,
                residual: reference.map_or(0.0, |r| row[lane] - r),
            };
        }
        out.sort_by_key(|s| corrected_azimuth(s.azimuth));
        Ok(())
    }

    /// Export all lanes as a point grid of `azimuths` columns.
    pub fn sorted_point_cloud(&self, azimuths: usize) -> Result<PointGrid, Error> {
        self.check_export(azimuths, self.points.len())?;

        let mut data = vec![Point3::default(); LANES * azimuths];
        if azimuths > 0 {
            for (row, out) in data.chunks_exact_mut(azimuths).enumerate() {
                self.point_row(EXPORT_ROW_TO_LANE[row], out)?;
            }
        }
        PointGrid::from_rows(azimuths, data)
    }

    /// Export all lanes as a residual distance grid of `azimuths` columns.
    pub fn sorted_distances(
        &self,
        azimuths: usize,
        calibration: Option<&Frame>,
    ) -> Result<DistanceGrid, Error> {
        self.check_export(azimuths, self.distances.len())?;

        let mut data = vec![DistanceSample::default(); LANES * azimuths];
        if azimuths > 0 {
            for (row, out) in data.chunks_exact_mut(azimuths).enumerate() {
                self.distance_row(EXPORT_ROW_TO_LANE[row], calibration, out)?;
            }
        }
        DistanceGrid::from_rows(azimuths, data)
    }

    fn check_export(&self, actual: usize, stored: usize) -> Result<(), Error> {
        if actual != self.azimuths || stored != self.azimuths {
            warn!(
                requested = actual,
                azimuths = self.azimuths,
                stored,
                "export buffer does not match frame, skipping"
            );
            return Err(Error::BufferSize {
                expected: self.azimuths,
                actual,
            });
        }
        Ok(())
    }
}

/// Azimuth ordering key that starts at the vehicle's reference direction
/// so a rotation sorts monotonically across the wrap.
#[inline]
pub fn corrected_azimuth(azimuth: u16) -> i32 {
    if azimuth > ROTATION_OFFSET {
        azimuth as i32 - AZIMUTH_DOMAIN as i32
    } else {
        azimuth as i32
    }
}

fn check_key(lane: usize, azimuth: u16) -> Result<(), Error> {
    if lane >= LANES {
        return Err(Error::InvalidLane(lane));
    }
    if azimuth >= AZIMUTH_DOMAIN {
        return Err(Error::InvalidAzimuth(azimuth));
    }
    Ok(())
}

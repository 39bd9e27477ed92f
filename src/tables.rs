// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Precomputed trigonometry and mounting corrections for the VLP-16.
//!
//! Every table is indexed by azimuth in hundredths of a degree over
//! `0..=36000`. The elevation tables are additionally indexed by physical
//! lane and carry the azimuth dependent drift of the mounted sensor, so the
//! per-return geometry is a handful of multiplications.
//!
//! Tables are built once and shared read-only through an [`Arc`]; see
//! [`LookupTables::shared`].

use crate::lidar::{AZIMUTH_STEPS, LANES, Point3, ROTATION_OFFSET};
use std::sync::{Arc, OnceLock};

/// Nominal elevation per physical lane in hundredths of a degree.
pub const NOMINAL_ELEVATION: [i32; LANES] = [
    1500, -100, 1300, -300, 1100, -500, 900, -700, 700, -900, 500, -1100, 300, -1300, 100, -1500,
];

/// Export row to physical lane.
pub const EXPORT_ROW_TO_LANE: [usize; LANES] = [15, 13, 11, 9, 7, 5, 3, 1, 14, 12, 10, 8, 6, 4, 2, 0];

/// Mounting height of the sensor above ground at azimuth 0, in meters.
const MOUNT_HEIGHT: f64 = 0.383;
const HEIGHT_SLOPE_FRONT: f64 = 2.285714285714286e-5;
const HEIGHT_SLOPE_REAR: f64 = -3.7142857142857143e-5;

const DRIFT_SLOPE: f64 = 0.16;
const DRIFT_OFFSET: f64 = 3760.0;

/// Immutable lookup tables for azimuth/elevation geometry.
pub struct LookupTables {
    az_cos: Vec<f64>,
    az_sin: Vec<f64>,
    height_compensation: Vec<f64>,
    el_cos: Vec<Vec<f64>>,
    el_sin: Vec<Vec<f64>>,
}

impl LookupTables {
    /// Build all tables. Roughly 10 MB of `f64`, prefer [`Self::shared`].
    pub fn new() -> Self {
        let mut az_cos = Vec::with_capacity(AZIMUTH_STEPS);
        let mut az_sin = Vec::with_capacity(AZIMUTH_STEPS);
        let mut height_compensation = Vec::with_capacity(AZIMUTH_STEPS);

        for az in 0..AZIMUTH_STEPS {
            let rad = (az as f64 / 100.0).to_radians();
            az_cos.push(rad.cos());
            az_sin.push(rad.sin());
            height_compensation.push(height_curve(az));
        }

        let mut el_cos = Vec::with_capacity(LANES);
        let mut el_sin = Vec::with_capacity(LANES);
        for nominal in NOMINAL_ELEVATION {
            let (cos, sin): (Vec<f64>, Vec<f64>) = (0..AZIMUTH_STEPS)
                .map(|az| {
                    let rad = (elevation(nominal, az) as f64 / 100.0).to_radians();
                    (rad.cos(), rad.sin())
                })
                .unzip();
            el_cos.push(cos);
            el_sin.push(sin);
        }

        Self {
            az_cos,
            az_sin,
            height_compensation,
            el_cos,
            el_sin,
        }
    }

    /// Process-wide tables, built on first use.
    pub fn shared() -> Arc<LookupTables> {
        static TABLES: OnceLock<Arc<LookupTables>> = OnceLock::new();
        TABLES.get_or_init(|| Arc::new(LookupTables::new())).clone()
    }

    #[inline]
    pub fn az_cos(&self, az: u16) -> f64 {
        self.az_cos[az as usize]
    }

    #[inline]
    pub fn az_sin(&self, az: u16) -> f64 {
        self.az_sin[az as usize]
    }

    #[inline]
    pub fn el_cos(&self, lane: usize, az: u16) -> f64 {
        self.el_cos[lane][az as usize]
    }

    #[inline]
    pub fn el_sin(&self, lane: usize, az: u16) -> f64 {
        self.el_sin[lane][az as usize]
    }

    /// Height of the sensor above flat ground for the given azimuth.
    #[inline]
    pub fn height_compensation(&self, az: u16) -> f64 {
        self.height_compensation[az as usize]
    }

    /// Project a polar return onto sensor-frame cartesian coordinates.
    ///
    /// `lane` must be `< LANES` and `az` must be `<= 36000`.
    #[inline]
    pub fn project(&self, lane: usize, az: u16, distance: f64) -> Point3 {
        let xy = distance * self.el_cos(lane, az);
        Point3 {
            x: xy * self.az_sin(az),
            y: xy * self.az_cos(az),
            z: distance * self.el_sin(lane, az),
        }
    }

    /// Like [`Self::project`] with Z shifted by the mounting height, so a
    /// sample on flat ground lands near `z = 0`.
    #[inline]
    pub fn to_ground(&self, lane: usize, az: u16, distance: f64) -> Point3 {
        let mut point = self.project(lane, az, distance);
        point.z += self.height_compensation(az);
        point
    }
}

impl Default for LookupTables {
    fn default() -> Self {
        Self::new()
    }
}

fn height_curve(az: usize) -> f64 {
    let az = az as f64;
    if az < ROTATION_OFFSET as f64 {
        HEIGHT_SLOPE_FRONT * az + MOUNT_HEIGHT
    } else {
        HEIGHT_SLOPE_REAR * (az - 36000.0) + MOUNT_HEIGHT
    }
}

/// Drift corrected elevation in hundredths of a degree. The drift is
/// truncated toward zero.
fn elevation(nominal: i32, az: usize) -> i32 {
    let az = az as f64;
    let drift = if az < ROTATION_OFFSET as f64 {
        -DRIFT_SLOPE * az + DRIFT_OFFSET
    } else {
        DRIFT_SLOPE * (az - 36000.0) + DRIFT_OFFSET
    };
    nominal - drift as i32
}

// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Bounding-box descriptors for detected terrain obstacles.
//!
//! An [`Obstacle`] is seeded from a single sample and grown with
//! [`Obstacle::update_bounds`] while the detector floods its region. Boulders
//! track their highest point, craters their lowest.

use crate::{lidar::Point3, tables::LookupTables};
use serde::Serialize;
use std::fmt;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ObstacleKind {
    /// Protrusion above the ground reference.
    Boulder,
    /// Depression below the ground reference.
    Crater,
}

impl fmt::Display for ObstacleKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ObstacleKind::Boulder => write!(f, "Boulder"),
            ObstacleKind::Crater => write!(f, "Crater"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Obstacle {
    kind: ObstacleKind,
    left_most: Point3,
    right_most: Point3,
    farthest: Point3,
    closest: Point3,
    height: f64,
    ground_ref: f64,
    hits: usize,
}

impl Obstacle {
    /// Seed an obstacle from a cartesian sample.
    pub fn new(kind: ObstacleKind, seed: Point3, ground_ref: f64) -> Self {
        Self {
            kind,
            left_most: seed,
            right_most: seed,
            farthest: seed,
            closest: seed,
            height: seed.z,
            ground_ref,
            hits: 1,
        }
    }

    /// Seed an obstacle from a polar sample, projected with the mounting
    /// height compensation applied.
    pub fn from_polar(
        kind: ObstacleKind,
        tables: &LookupTables,
        lane: usize,
        azimuth: u16,
        distance: f64,
        ground_ref: f64,
    ) -> Self {
        Self::new(kind, tables.to_ground(lane, azimuth, distance), ground_ref)
    }

    /// Grow the bounding box to include `point`.
    pub fn update_bounds(&mut self, point: Point3) {
        if point.x < self.left_most.x {
            self.left_most = point;
        }
        if point.x > self.right_most.x {
            self.right_most = point;
        }
        if point.y > self.farthest.y {
            self.farthest = point;
        }
        if point.y < self.closest.y {
            self.closest = point;
        }
        match self.kind {
            ObstacleKind::Boulder if point.z > self.height => self.height = point.z,
            ObstacleKind::Crater if point.z < self.height => self.height = point.z,
            _ => {}
        }
    }

    pub fn update_bounds_polar(
        &mut self,
        tables: &LookupTables,
        lane: usize,
        azimuth: u16,
        distance: f64,
    ) {
        self.update_bounds(tables.to_ground(lane, azimuth, distance));
    }

    /// Fold another obstacle's extremal points into this one.
    pub fn combine(&mut self, other: &Obstacle) {
        for point in other.extremes() {
            self.update_bounds(point);
        }
    }

    /// True when both obstacles have the same kind and any extremal point of
    /// `other` lies strictly inside this obstacle's XY rectangle.
    pub fn is_same_as(&self, other: &Obstacle) -> bool {
        self.kind == other.kind && other.extremes().iter().any(|p| self.contains_xy(p))
    }

    fn contains_xy(&self, p: &Point3) -> bool {
        self.right_most.x > p.x
            && self.left_most.x < p.x
            && self.farthest.y > p.y
            && self.closest.y < p.y
    }

    fn extremes(&self) -> [Point3; 4] {
        [self.left_most, self.right_most, self.farthest, self.closest]
    }

    pub fn kind(&self) -> ObstacleKind {
        self.kind
    }

    pub fn left_most(&self) -> Point3 {
        self.left_most
    }

    pub fn right_most(&self) -> Point3 {
        self.right_most
    }

    pub fn farthest(&self) -> Point3 {
        self.farthest
    }

    pub fn closest(&self) -> Point3 {
        self.closest
    }

    /// Highest Z for a boulder, lowest Z for a crater.
    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn ground_ref(&self) -> f64 {
        self.ground_ref
    }

    /// Number of positive hits that formed this obstacle.
    pub fn hits(&self) -> usize {
        self.hits
    }

    pub(crate) fn set_hits(&mut self, hits: usize) {
        self.hits = hits;
    }

    pub fn width(&self) -> f64 {
        self.right_most.x - self.left_most.x
    }

    pub fn length(&self) -> f64 {
        self.farthest.y - self.closest.y
    }

    /// Boulders report their frontal area (height × width), craters their
    /// footprint (length × width).
    pub fn area(&self) -> f64 {
        match self.kind {
            ObstacleKind::Boulder => self.height * self.width(),
            ObstacleKind::Crater => self.length() * self.width(),
        }
    }

    /// Box midpoint in X/Y, half the height above the ground reference in Z.
    pub fn center(&self) -> Point3 {
        Point3 {
            x: (self.right_most.x + self.left_most.x) / 2.0,
            y: (self.farthest.y + self.closest.y) / 2.0,
            z: (self.height - self.ground_ref) / 2.0,
        }
    }
}

impl fmt::Display for Obstacle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let extent = match self.kind {
            ObstacleKind::Boulder => "height",
            ObstacleKind::Crater => "depth",
        };
        write!(
            f,
            "{} at {} {} {:.2}",
            self.kind,
            self.center(),
            extent,
            self.height
        )
    }
}

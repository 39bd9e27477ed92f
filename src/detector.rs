// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Flood-fill obstacle detection over sorted lane × azimuth grids.
//!
//! The detector scans a grid in lane-major order. The first cell whose value
//! departs from the reference by more than the height tolerance seeds a
//! candidate, which is grown breadth-first over the 4-connected neighborhood
//! (lane ± 1, column ± 1). Every visited neighbor is folded into the
//! candidate's bounding box; neighbors that also exceed the tolerance are
//! counted, reset to the reference so they are never counted twice, and
//! queued for expansion. Candidates with more hits than the configured
//! threshold are kept.
//!
//! Two grid flavours are supported:
//!
//! - cartesian ([`PointGrid`]): value is Z, reference is the ground
//!   reference. Seeds with a raw Z below zero are craters.
//! - polar ([`DistanceGrid`]): value is the residual distance against the
//!   calibration frame, reference is zero. Seeds nearer than the calibrated
//!   surface are boulders.

use crate::{
    frame::Frame,
    grid::{DistanceGrid, PointGrid},
    lidar::{Error, LANES, Point3},
    obstacle::{Obstacle, ObstacleKind},
    tables::LookupTables,
};
use std::sync::Arc;
use tracing::{debug, instrument, trace};

/// Detection parameters, fixed for the lifetime of a detector.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DetectorConfig {
    /// Departure from the reference, in meters, that marks a positive hit.
    pub height_tolerance: f64,
    /// Z of the ground plane in meters.
    pub ground_ref: f64,
    /// A candidate is kept when its hit count is strictly greater.
    pub positive_hits_threshold: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            height_tolerance: 0.07,
            ground_ref: 0.0,
            positive_hits_threshold: 100,
        }
    }
}

/// Reusable detector state.
///
/// Holds the BFS queue between runs to avoid reallocating after the first
/// frame, and the ordered list of accepted obstacles.
pub struct ObstacleDetector {
    config: DetectorConfig,
    tables: Arc<LookupTables>,
    found: Vec<Obstacle>,
    queue: Vec<(usize, usize)>,
}

impl ObstacleDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self::with_tables(config, LookupTables::shared())
    }

    pub fn with_tables(config: DetectorConfig, tables: Arc<LookupTables>) -> Self {
        Self {
            config,
            tables,
            found: Vec::new(),
            queue: Vec::new(),
        }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Export the frame's point cloud and search it. Returns the number of
    /// obstacles added.
    pub fn detect_cartesian(&mut self, frame: &Frame) -> Result<usize, Error> {
        let grid = frame.sorted_point_cloud(frame.azimuths())?;
        Ok(self.find_cartesian(grid))
    }

    /// Export the frame's residual distances against `calibration` and
    /// search them. Returns the number of obstacles added.
    pub fn detect_polar(&mut self, frame: &Frame, calibration: &Frame) -> Result<usize, Error> {
        let grid = frame.sorted_distances(frame.azimuths(), Some(calibration))?;
        Ok(self.find_polar(frame, grid))
    }

    /// Search a point grid. Cells are consumed as they are visited.
    #[instrument(skip_all, fields(width = grid.width()))]
    pub fn find_cartesian(&mut self, mut grid: PointGrid) -> usize {
        self.fill_cartesian(&mut grid)
    }

    /// Cartesian search in place. Hits are reset to the ground reference;
    /// the seed itself is only reset when a neighbor's expansion revisits
    /// it.
    pub(crate) fn fill_cartesian(&mut self, grid: &mut PointGrid) -> usize {
        let before = self.found.len();
        let DetectorConfig {
            height_tolerance,
            ground_ref,
            ..
        } = self.config;
        let exceeds = |p: &Point3| (p.z - ground_ref).abs() > height_tolerance;

        for row in 0..LANES {
            for col in 0..grid.width() {
                let seed = grid.get(row, col);
                if !exceeds(&seed) {
                    continue;
                }

                let kind = if seed.z < 0.0 {
                    ObstacleKind::Crater
                } else {
                    ObstacleKind::Boulder
                };
                let mut candidate = Obstacle::new(kind, seed, ground_ref);
                let mut hits = 1;

                self.queue.clear();
                self.queue.push((row, col));
                let mut qi = 0;
                while qi < self.queue.len() {
                    let (r, c) = self.queue[qi];
                    qi += 1;

                    for (nr, nc) in neighbors(r, c, grid.width()) {
                        let point = grid.get(nr, nc);
                        candidate.update_bounds(point);
                        if !exceeds(&point) {
                            continue;
                        }
                        grid.get_mut(nr, nc).z = ground_ref;
                        // the seed is left in place at seeding time and is
                        // already counted
                        if (nr, nc) != (row, col) {
                            hits += 1;
                            self.queue.push((nr, nc));
                        }
                    }
                }

                self.accept(candidate, hits);
            }
        }

        self.found.len() - before
    }

    /// Search a residual distance grid exported from `frame`. Bounds are
    /// projected from the frame's stored distances.
    #[instrument(skip_all, fields(width = grid.width()))]
    pub fn find_polar(&mut self, frame: &Frame, mut grid: DistanceGrid) -> usize {
        self.fill_polar(frame, &mut grid)
    }

    /// Polar search in place. The seed and every hit are reset to a zero
    /// residual as soon as they are reached.
    pub(crate) fn fill_polar(&mut self, frame: &Frame, grid: &mut DistanceGrid) -> usize {
        let before = self.found.len();
        let DetectorConfig {
            height_tolerance,
            ground_ref,
            ..
        } = self.config;
        let tables = self.tables.clone();
        let exceeds = |residual: f64| residual.abs() > height_tolerance;

        for row in 0..LANES {
            for col in 0..grid.width() {
                let seed = grid.get(row, col);
                if !exceeds(seed.residual) {
                    continue;
                }

                let kind = if seed.residual < 0.0 {
                    ObstacleKind::Boulder
                } else {
                    ObstacleKind::Crater
                };
                let lane = grid.lane(row);
                let distance = frame.stored_distance(lane, seed.azimuth).unwrap_or(0.0);
                let mut candidate =
                    Obstacle::from_polar(kind, &tables, lane, seed.azimuth, distance, ground_ref);
                grid.get_mut(row, col).residual = 0.0;
                let mut hits = 1;

                self.queue.clear();
                self.queue.push((row, col));
                let mut qi = 0;
                while qi < self.queue.len() {
                    let (r, c) = self.queue[qi];
                    qi += 1;

                    for (nr, nc) in neighbors(r, c, grid.width()) {
                        let sample = grid.get(nr, nc);
                        let lane = grid.lane(nr);
                        let distance = frame.stored_distance(lane, sample.azimuth).unwrap_or(0.0);
                        candidate.update_bounds_polar(&tables, lane, sample.azimuth, distance);
                        if !exceeds(sample.residual) {
                            continue;
                        }
                        grid.get_mut(nr, nc).residual = 0.0;
                        hits += 1;
                        self.queue.push((nr, nc));
                    }
                }

                self.accept(candidate, hits);
            }
        }

        self.found.len() - before
    }

    fn accept(&mut self, mut candidate: Obstacle, hits: usize) {
        if hits > self.config.positive_hits_threshold {
            candidate.set_hits(hits);
            debug!(%candidate, hits, "obstacle found");
            self.found.push(candidate);
        } else {
            trace!(hits, "candidate discarded");
        }
    }

    /// Obstacles found so far, in detection order.
    pub fn obstacles(&self) -> &[Obstacle] {
        &self.found
    }

    pub fn len(&self) -> usize {
        self.found.len()
    }

    pub fn is_empty(&self) -> bool {
        self.found.is_empty()
    }

    /// Remove and return the most recently found obstacle.
    pub fn pop_latest(&mut self) -> Option<Obstacle> {
        self.found.pop()
    }

    /// Remove and return all obstacles in detection order.
    pub fn take_obstacles(&mut self) -> Vec<Obstacle> {
        std::mem::take(&mut self.found)
    }

    pub fn clear(&mut self) {
        self.found.clear();
    }
}

/// In-bounds 4-connected neighbors of `(row, col)` in a `LANES × width`
/// grid, in the order up, down, left, right.
fn neighbors(row: usize, col: usize, width: usize) -> impl Iterator<Item = (usize, usize)> {
    let up = (row > 0).then(|| (row - 1, col));
    let down = (row + 1 < LANES).then(|| (row + 1, col));
    let left = (col > 0).then(|| (row, col - 1));
    let right = (col + 1 < width).then(|| (row, col + 1));
    [up, down, left, right].into_iter().flatten()
}

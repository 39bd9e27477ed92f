// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! VLP-16 packet decoder.
//!
//! The decoder turns raw data packets into samples of the live [`Frame`] (or
//! of the calibration frame while a flat reference surface is sampled).
//! Completion is driven by the caller: [`PacketDecoder::latest_frame`] hands
//! out the live frame once it holds enough azimuths and swaps in an empty
//! one, so decoding never writes into a frame a consumer is reading.
//!
//! # Example
//!
//! ```ignore
//! use edgefirst_terrainpub::decoder::{DecoderConfig, PacketDecoder};
//!
//! let mut decoder = PacketDecoder::new(DecoderConfig::default());
//! loop {
//!     let len = socket.recv(&mut buf).await?;
//!     decoder.decode(&buf[..len])?;
//!     if let Some(frame) = decoder.latest_frame(5000) {
//!         // frame is owned by the caller
//!     }
//! }
//! ```

use crate::{
    frame::Frame,
    lidar::{AZIMUTH_DOMAIN, Error, LANES, Point3, ROTATION_OFFSET, timestamp},
    packet::{LaserReturn, PACKET_SIZE, PacketSlice},
    tables::LookupTables,
};
use std::{collections::VecDeque, sync::Arc};
use tracing::{debug, trace, warn};

/// Azimuth offset of the second firing sequence in a block (0.10°).
const SECOND_FIRING_OFFSET: u32 = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecoderConfig {
    /// Compute cartesian points in addition to distances.
    pub point_cloud: bool,
    /// Capacity of the completed frame archive.
    pub max_frames: usize,
    /// Archive the live frame whenever the raw azimuth wraps around.
    pub split_on_wrap: bool,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            point_cloud: false,
            max_frames: 3,
            split_on_wrap: false,
        }
    }
}

/// Convert a raw sensor azimuth into the vehicle frame, result in
/// `0..AZIMUTH_DOMAIN`.
#[inline]
pub fn normalize_azimuth(raw: u16) -> u16 {
    (ROTATION_OFFSET as i32 - raw as i32).rem_euclid(AZIMUTH_DOMAIN as i32) as u16
}

/// Convert a vehicle frame azimuth back to the sensor frame. The rotation is
/// a reflection, so this is the same mapping as [`normalize_azimuth`].
#[inline]
pub fn denormalize_azimuth(azimuth: u16) -> u16 {
    normalize_azimuth(azimuth)
}

/// Vehicle frame azimuth of return `channel` (0..32) in a block.
#[inline]
pub fn firing_azimuth(raw: u16, channel: usize) -> u16 {
    if channel >= LANES {
        let shifted = (raw as u32 + SECOND_FIRING_OFFSET) % AZIMUTH_DOMAIN as u32;
        normalize_azimuth(shifted as u16)
    } else {
        normalize_azimuth(raw)
    }
}

pub struct PacketDecoder {
    config: DecoderConfig,
    tables: Arc<LookupTables>,
    frame: Frame,
    calibration: Frame,
    frames: VecDeque<Frame>,
    last_azimuth: u16,
    frame_id: u32,
}

impl PacketDecoder {
    pub fn new(config: DecoderConfig) -> Self {
        Self::with_tables(config, LookupTables::shared())
    }

    pub fn with_tables(config: DecoderConfig, tables: Arc<LookupTables>) -> Self {
        Self {
            config,
            tables,
            frame: Frame::new(),
            calibration: Frame::new(),
            frames: VecDeque::with_capacity(config.max_frames),
            last_azimuth: 0,
            frame_id: 0,
        }
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    pub fn tables(&self) -> Arc<LookupTables> {
        self.tables.clone()
    }

    /// Decode one packet into the live frame.
    ///
    /// Packets that are not exactly [`PACKET_SIZE`] bytes are logged and
    /// rejected without touching any frame.
    pub fn decode(&mut self, data: &[u8]) -> Result<(), Error> {
        let packet = self.validate(data)?;

        for block in packet.blocks() {
            if self.config.split_on_wrap {
                if block.azimuth() < self.last_azimuth {
                    self.split_frame();
                }
                self.last_azimuth = block.azimuth();
            }

            for (channel, ret) in block.returns().enumerate() {
                let azimuth = firing_azimuth(block.azimuth(), channel);
                self.push_return(channel % LANES, azimuth, ret, false)?;
            }
        }

        Ok(())
    }

    /// Decode one packet of a flat reference surface into the calibration
    /// frame.
    pub fn add_to_calibration(&mut self, data: &[u8]) -> Result<(), Error> {
        let packet = self.validate(data)?;

        for block in packet.blocks() {
            for (channel, ret) in block.returns().enumerate() {
                let azimuth = firing_azimuth(block.azimuth(), channel);
                self.push_return(channel % LANES, azimuth, ret, true)?;
            }
        }

        Ok(())
    }

    /// Feed a blob of concatenated packets into the calibration frame.
    /// Returns the number of packets accepted.
    pub fn load_calibration(&mut self, blob: &[u8]) -> usize {
        let chunks = blob.chunks_exact(PACKET_SIZE);
        if !chunks.remainder().is_empty() {
            warn!(
                trailing = chunks.remainder().len(),
                "calibration blob is not a whole number of packets"
            );
        }

        let mut accepted = 0;
        for chunk in chunks {
            match self.add_to_calibration(chunk) {
                Ok(()) => accepted += 1,
                Err(e) => warn!("calibration packet skipped: {}", e),
            }
        }
        debug!(
            accepted,
            azimuths = self.calibration.azimuths(),
            "calibration loaded"
        );
        accepted
    }

    pub fn is_calibrated(&self) -> bool {
        !self.calibration.is_empty()
    }

    pub fn calibration(&self) -> &Frame {
        &self.calibration
    }

    pub fn clear_calibration(&mut self) {
        self.calibration = Frame::new();
    }

    /// Frame currently being filled.
    pub fn current_frame(&self) -> &Frame {
        &self.frame
    }

    /// Take the live frame if it holds at least `min_azimuths` azimuths,
    /// leaving a fresh frame in its place.
    pub fn latest_frame(&mut self, min_azimuths: usize) -> Option<Frame> {
        if self.frame.azimuths() < min_azimuths {
            return None;
        }
        let mut frame = std::mem::take(&mut self.frame);
        self.stamp(&mut frame);
        Some(frame)
    }

    /// Completed frames archived on azimuth wrap, oldest first.
    pub fn frames(&self) -> &VecDeque<Frame> {
        &self.frames
    }

    pub fn clear_frames(&mut self) {
        self.frames.clear();
    }

    pub fn set_max_frames(&mut self, max_frames: usize) -> Result<(), Error> {
        if max_frames == 0 {
            return Err(Error::Config("max_frames must be at least 1".to_owned()));
        }
        self.config.max_frames = max_frames;
        while self.frames.len() > max_frames {
            self.frames.pop_front();
        }
        Ok(())
    }

    /// Archive the live frame and start a new one.
    pub fn split_frame(&mut self) {
        let mut frame = std::mem::take(&mut self.frame);
        self.stamp(&mut frame);
        while self.frames.len() >= self.config.max_frames.max(1) {
            self.frames.pop_front();
        }
        trace!(
            frame_id = frame.frame_id,
            azimuths = frame.azimuths(),
            "frame archived"
        );
        self.frames.push_back(frame);
    }

    /// Drop the live frame and the archive, keeping calibration.
    pub fn reset(&mut self) {
        self.frame = Frame::new();
        self.frames.clear();
        self.last_azimuth = 0;
    }

    /// Drop all decoded state including calibration.
    pub fn unload(&mut self) {
        self.reset();
        self.clear_calibration();
    }

    fn validate<'a>(&self, data: &'a [u8]) -> Result<PacketSlice<'a>, Error> {
        PacketSlice::from_slice(data).inspect_err(|e| {
            warn!(len = data.len(), "dropping malformed packet: {}", e);
        })
    }

    fn push_return(
        &mut self,
        lane: usize,
        azimuth: u16,
        ret: LaserReturn,
        calibration: bool,
    ) -> Result<(), Error> {
        let distance = ret.meters();

        if self.config.point_cloud {
            let mut point = self.tables.project(lane, azimuth, distance);
            if !calibration {
                point.z = self.ground_compensate(lane, azimuth, point.z);
            }
            let target = if calibration {
                &mut self.calibration
            } else {
                &mut self.frame
            };
            target.add_point(lane, azimuth, point)?;
        }

        let target = if calibration {
            &mut self.calibration
        } else {
            &mut self.frame
        };
        target.add_distance(lane, azimuth, distance)
    }

    /// Shift Z so flat ground reads near zero: relative to the calibrated
    /// surface when available, else by the mounting height model.
    fn ground_compensate(&self, lane: usize, azimuth: u16, z: f64) -> f64 {
        match self.calibration.point(lane, azimuth) {
            Some(Point3 { z: reference, .. }) => z - reference,
            None => z + self.tables.height_compensation(azimuth),
        }
    }

    fn stamp(&mut self, frame: &mut Frame) {
        frame.frame_id = self.frame_id;
        self.frame_id = self.frame_id.wrapping_add(1);
        frame.timestamp = match timestamp() {
            Ok(t) => t,
            Err(e) => {
                warn!("frame timestamp unavailable: {}", e);
                0
            }
        };
    }
}

// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Scan orchestration: decode packets until a frame is complete, then run
//! obstacle detection over it.

use crate::{
    decoder::{DecoderConfig, PacketDecoder},
    detector::{DetectorConfig, ObstacleDetector},
    frame::Frame,
    lidar::{Error, MIN_AZIMUTHS_PER_FRAME},
    obstacle::Obstacle,
    packet_source::PacketSource,
    tables::LookupTables,
};
use tracing::{debug, info, instrument, trace, warn};

/// Receive buffer size, larger than any datagram the sensor emits.
const RECV_BUFFER_SIZE: usize = 2048;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScannerConfig {
    pub decoder: DecoderConfig,
    pub detector: DetectorConfig,
    /// Azimuths a frame must hold before it is analyzed.
    pub min_azimuths: usize,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            decoder: DecoderConfig::default(),
            detector: DetectorConfig::default(),
            min_azimuths: 5000,
        }
    }
}

/// Owns a decoder and a detector sharing one set of lookup tables.
pub struct TerrainScanner {
    decoder: PacketDecoder,
    detector: ObstacleDetector,
    min_azimuths: usize,
}

impl TerrainScanner {
    pub fn new(config: ScannerConfig) -> Self {
        let tables = LookupTables::shared();
        Self {
            decoder: PacketDecoder::with_tables(config.decoder, tables.clone()),
            detector: ObstacleDetector::with_tables(config.detector, tables),
            min_azimuths: config.min_azimuths.max(MIN_AZIMUTHS_PER_FRAME),
        }
    }

    pub fn decoder(&self) -> &PacketDecoder {
        &self.decoder
    }

    pub fn decoder_mut(&mut self) -> &mut PacketDecoder {
        &mut self.decoder
    }

    pub fn detector(&self) -> &ObstacleDetector {
        &self.detector
    }

    /// Load a recorded flat-surface blob as the calibration frame. Returns
    /// the number of packets accepted.
    pub fn calibrate(&mut self, blob: &[u8]) -> usize {
        let accepted = self.decoder.load_calibration(blob);
        info!(
            packets = accepted,
            azimuths = self.decoder.calibration().azimuths(),
            "calibration loaded"
        );
        accepted
    }

    pub fn is_calibrated(&self) -> bool {
        self.decoder.is_calibrated()
    }

    /// Configured frame size, never below [`MIN_AZIMUTHS_PER_FRAME`].
    pub fn effective_min_azimuths(&self) -> usize {
        self.min_azimuths
    }

    /// Change the frame size. Values at or below the floor are ignored.
    pub fn set_min_azimuths(&mut self, azimuths: usize) {
        if azimuths > MIN_AZIMUTHS_PER_FRAME {
            self.min_azimuths = azimuths;
        } else {
            debug!(azimuths, "frame size at or below floor, ignored");
        }
    }

    /// Read and decode packets from `source` until the live frame holds at
    /// least `azimuths` azimuths (raised to the floor), then hand it out.
    ///
    /// Malformed packets are skipped. Errors from the source end the scan.
    pub async fn scan<S: PacketSource + ?Sized>(
        &mut self,
        source: &mut S,
        azimuths: usize,
    ) -> Result<Frame, Error> {
        let azimuths = azimuths.max(MIN_AZIMUTHS_PER_FRAME);
        self.decoder.clear_frames();

        let mut buf = [0u8; RECV_BUFFER_SIZE];
        loop {
            if let Some(frame) = self.decoder.latest_frame(azimuths) {
                debug!(
                    frame_id = frame.frame_id,
                    azimuths = frame.azimuths(),
                    "frame ready"
                );
                return Ok(frame);
            }
            let len = source.recv(&mut buf).await?;
            if let Err(e) = self.decoder.decode(&buf[..len]) {
                trace!(len, "packet skipped: {}", e);
            }
        }
    }

    /// Take the live frame if it holds at least `azimuths` azimuths (raised
    /// to the floor), without reading any packets.
    pub fn update_latest_frame(&mut self, azimuths: usize) -> Option<Frame> {
        self.decoder.latest_frame(azimuths.max(MIN_AZIMUTHS_PER_FRAME))
    }

    /// Run detection over `frame`, most recently found obstacle first.
    ///
    /// Point cloud mode searches Z directly. Otherwise distances are compared
    /// with the calibration frame, which yields nothing useful when no
    /// calibration was loaded.
    #[instrument(skip_all, fields(frame_id = frame.frame_id))]
    pub fn analyze(&mut self, frame: &Frame) -> Result<Vec<Obstacle>, Error> {
        self.detector.clear();
        let found = if self.decoder.config().point_cloud {
            self.detector.detect_cartesian(frame)?
        } else {
            if !self.decoder.is_calibrated() {
                warn!("polar detection without calibration");
            }
            self.detector.detect_polar(frame, self.decoder.calibration())?
        };
        debug!(found, "detection done");

        let mut obstacles = Vec::with_capacity(found);
        while let Some(obstacle) = self.detector.pop_latest() {
            obstacles.push(obstacle);
        }
        Ok(obstacles)
    }

    /// Drop decoded frames and detection results. Calibration is kept.
    pub fn reset(&mut self) {
        self.decoder.reset();
        self.detector.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        lidar::AZIMUTH_DOMAIN,
        obstacle::ObstacleKind,
        packet::Packet,
        packet_source::{LoopingTestSource, TestSource},
    };

    /// Packet whose blocks step 0.20° from `first`, every return at
    /// `distance` raw units.
    fn packet(first: u16, distance: u16) -> Vec<u8> {
        let mut packet = Packet::default();
        for (i, block) in packet.blocks.iter_mut().enumerate() {
            block.azimuth = (first + i as u16 * 20) % AZIMUTH_DOMAIN;
            for ret in block.returns.iter_mut() {
                ret.distance = distance;
                ret.intensity = 50;
            }
        }
        packet.encode()
    }

    fn sweep(packets: usize, distance: u16) -> Vec<Vec<u8>> {
        (0..packets)
            .map(|p| packet((p * 240) as u16 % AZIMUTH_DOMAIN, distance))
            .collect()
    }

    #[tokio::test]
    async fn test_scan_raises_request_to_floor() {
        let mut scanner = TerrainScanner::new(ScannerConfig::default());
        let mut source = LoopingTestSource::new(sweep(150, 1000));

        let frame = scanner.scan(&mut source, 100).await.unwrap();
        assert!(frame.azimuths() >= MIN_AZIMUTHS_PER_FRAME);
        // 24 azimuths per packet
        assert_eq!(source.current_index(), 15);
    }

    #[tokio::test]
    async fn test_scan_skips_malformed() {
        let mut scanner = TerrainScanner::new(ScannerConfig::default());
        let mut packets = sweep(15, 1000);
        packets.insert(3, vec![0u8; 1205]);
        let mut source = TestSource::new(packets);

        let frame = scanner.scan(&mut source, 0).await.unwrap();
        assert_eq!(frame.azimuths(), 360);
        assert!(!source.has_more());
    }

    #[tokio::test]
    async fn test_scan_source_exhausted() {
        let mut scanner = TerrainScanner::new(ScannerConfig::default());
        let mut source = TestSource::new(sweep(2, 1000));
        assert!(scanner.scan(&mut source, 400).await.is_err());
    }

    #[test]
    fn test_set_min_azimuths() {
        let mut scanner = TerrainScanner::new(ScannerConfig {
            min_azimuths: 10,
            ..Default::default()
        });
        assert_eq!(scanner.effective_min_azimuths(), MIN_AZIMUTHS_PER_FRAME);
        scanner.set_min_azimuths(350);
        assert_eq!(scanner.effective_min_azimuths(), MIN_AZIMUTHS_PER_FRAME);
        scanner.set_min_azimuths(1200);
        assert_eq!(scanner.effective_min_azimuths(), 1200);
    }

    #[test]
    fn test_update_latest_frame() {
        let mut scanner = TerrainScanner::new(ScannerConfig::default());
        for p in sweep(16, 1000) {
            scanner.decoder_mut().decode(&p).unwrap();
        }
        assert!(scanner.update_latest_frame(400).is_none());
        for p in sweep(17, 1000).iter().skip(16) {
            scanner.decoder_mut().decode(p).unwrap();
        }
        let frame = scanner.update_latest_frame(400).unwrap();
        assert_eq!(frame.azimuths(), 408);
        assert!(scanner.decoder().current_frame().is_empty());
    }

    #[tokio::test]
    async fn test_flat_surface_has_no_obstacles() {
        let mut scanner = TerrainScanner::new(ScannerConfig::default());
        let flat: Vec<u8> = sweep(20, 2000).concat();
        assert_eq!(scanner.calibrate(&flat), 20);
        assert!(scanner.is_calibrated());

        let mut source = TestSource::new(sweep(20, 2000));
        let frame = scanner.scan(&mut source, 480).await.unwrap();
        assert!(scanner.analyze(&frame).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_polar_boulder() {
        let mut scanner = TerrainScanner::new(ScannerConfig {
            detector: DetectorConfig {
                positive_hits_threshold: 50,
                ..Default::default()
            },
            ..Default::default()
        });
        scanner.calibrate(&sweep(20, 2000).concat());

        // a surface 0.5 m nearer than calibration over the whole sweep
        let mut source = TestSource::new(sweep(20, 1750));
        let frame = scanner.scan(&mut source, 480).await.unwrap();
        let obstacles = scanner.analyze(&frame).unwrap();
        assert_eq!(obstacles.len(), 1);
        assert_eq!(obstacles[0].kind(), ObstacleKind::Boulder);
        assert!(scanner.detector().is_empty());
    }

    #[tokio::test]
    async fn test_reset_keeps_calibration() {
        let mut scanner = TerrainScanner::new(ScannerConfig::default());
        scanner.calibrate(&sweep(2, 2000).concat());
        scanner.decoder_mut().decode(&packet(0, 1000)).unwrap();
        scanner.reset();
        assert!(scanner.decoder().current_frame().is_empty());
        assert!(scanner.is_calibrated());
    }
}

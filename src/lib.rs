// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! EdgeFirst Terrain Publisher Library
//!
//! This library decodes Velodyne VLP-16 data packets and searches the
//! resulting frames for terrain obstacles (boulders and craters).
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌───────────────┐     ┌─────────────────┐
//! │  PacketSource   │ ──► │ PacketDecoder │ ──► │  Frame          │
//! │  (UDP/pcap/test)│     │  (VLP-16)     │     │  (owned swap)   │
//! └─────────────────┘     └───────────────┘     └─────────────────┘
//!                                                       │ sorted export
//!                                                       ▼
//!                               ┌─────────────────────────────────────┐
//!                               │  ObstacleDetector                   │
//!                               │  (flood fill, cartesian or polar)   │
//!                               └─────────────────────────────────────┘
//! ```
//!
//! The decoder fills a live frame keyed by azimuth. Once the frame holds
//! enough azimuths the client takes it with
//! [`PacketDecoder::latest_frame`](decoder::PacketDecoder::latest_frame) and
//! the decoder continues into a fresh one. The frame is then exported into
//! a lane × azimuth grid and flood-filled by the detector.
//!
//! Detection runs in one of two modes:
//! 1. Cartesian: points are projected to X/Y/Z and Z is compared with the
//!    ground reference.
//! 2. Polar: distances are compared with a calibration frame recorded over
//!    a flat surface.
//!
//! # Modules
//!
//! - [`lidar`]: Common types, constants and error handling
//! - [`tables`]: Precomputed trigonometry and height compensation
//! - [`packet`]: VLP-16 data packet layout
//! - [`decoder`]: Packet decoder, calibration and frame archive
//! - [`frame`]: Frame storage, interpolation and sorted export
//! - [`grid`]: Lane × azimuth export grids
//! - [`obstacle`]: Obstacle bounding boxes
//! - [`detector`]: Flood-fill obstacle detection
//! - [`scanner`]: Decode-then-detect orchestration
//! - [`manager`]: Background scan worker
//! - [`packet_source`]: Packet source abstraction for testing
//!
//! # Example
//!
//! ```ignore
//! use edgefirst_terrainpub::{ScannerConfig, TerrainScanner, packet_source::UdpSource};
//!
//! let mut scanner = TerrainScanner::new(ScannerConfig::default());
//! scanner.calibrate(&std::fs::read("flat.bin")?);
//!
//! let mut source = UdpSource::bind("0.0.0.0:2368").await?;
//! let frame = scanner.scan(&mut source, 5000).await?;
//! for obstacle in scanner.analyze(&frame)? {
//!     println!("{}", obstacle);
//! }
//! ```

pub mod decoder;
pub mod detector;
pub mod frame;
pub mod grid;
pub mod lidar;
pub mod manager;
pub mod obstacle;
pub mod packet;
pub mod packet_source;
#[cfg(feature = "pcap")]
pub mod pcap_source;
pub mod scanner;
pub mod tables;

// Re-exports for convenience
pub use decoder::{DecoderConfig, PacketDecoder};
pub use detector::{DetectorConfig, ObstacleDetector};
pub use frame::Frame;
pub use lidar::{Error, Point3};
pub use obstacle::{Obstacle, ObstacleKind};
#[cfg(feature = "pcap")]
pub use pcap_source::PcapSource;
pub use scanner::{ScannerConfig, TerrainScanner};

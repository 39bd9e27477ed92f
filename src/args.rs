// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use clap::Parser;
use edgefirst_terrainpub::{
    decoder::DecoderConfig, detector::DetectorConfig, packet_source::DEFAULT_PORT,
    scanner::ScannerConfig,
};
use serde_json::json;
use std::path::PathBuf;
use tracing::level_filters::LevelFilter;
use zenoh::config::{Config, WhatAmI};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Listen address of the VLP-16 data stream or a pcap file.  If target
    /// is an existing file it is replayed, otherwise it is used as the
    /// local address to bind.
    #[arg(env, default_value = "0.0.0.0")]
    pub target: String,

    /// VLP-16 data port
    #[arg(long, env, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Departure from the ground reference, in meters, counted as a hit
    #[arg(long, env, default_value = "0.07")]
    pub height_tolerance: f64,

    /// Height of the ground plane in meters
    #[arg(long, env, default_value = "0.0")]
    pub ground_ref: f64,

    /// Hits a candidate must exceed to be reported as an obstacle
    #[arg(long, env, default_value = "100")]
    pub positive_hits: usize,

    /// Azimuths collected per scan, at least 350
    #[arg(long, env, default_value = "5000")]
    pub azimuths: usize,

    /// Detect on cartesian points instead of calibrated distances
    #[arg(long, env)]
    pub point_cloud: bool,

    /// Flat-surface calibration blob of concatenated data packets
    #[arg(long, env)]
    pub calibration: Option<PathBuf>,

    /// Completed frames kept in the archive
    #[arg(long, env, default_value = "3")]
    pub max_frames: usize,

    /// Application log level
    #[arg(long, env, default_value = "info")]
    pub rust_log: LevelFilter,

    /// The name of the lidar frame
    #[arg(long, env, default_value = "lidar")]
    pub frame_id: String,

    /// obstacle topic
    #[arg(long, env, default_value = "rt/lidar/obstacles")]
    pub obstacles_topic: String,

    /// zenoh connection mode
    #[arg(long, env, default_value = "peer")]
    mode: WhatAmI,

    /// connect to zenoh endpoints
    #[arg(long, env)]
    connect: Vec<String>,

    /// listen to zenoh endpoints
    #[arg(long, env)]
    listen: Vec<String>,

    /// disable zenoh multicast scouting
    #[arg(long, env)]
    no_multicast_scouting: bool,
}

impl Args {
    pub fn scanner_config(&self) -> ScannerConfig {
        ScannerConfig {
            decoder: DecoderConfig {
                point_cloud: self.point_cloud,
                max_frames: self.max_frames.max(1),
                ..Default::default()
            },
            detector: DetectorConfig {
                height_tolerance: self.height_tolerance,
                ground_ref: self.ground_ref,
                positive_hits_threshold: self.positive_hits,
            },
            min_azimuths: self.azimuths,
        }
    }

    pub fn zenoh_config(&self) -> Result<Config, zenoh::Error> {
        let mut config = Config::default();

        config.insert_json5("mode", &json!(self.mode).to_string())?;

        if !self.connect.is_empty() {
            config.insert_json5("connect/endpoints", &json!(self.connect).to_string())?;
        }

        if !self.listen.is_empty() {
            config.insert_json5("listen/endpoints", &json!(self.listen).to_string())?;
        }

        if self.no_multicast_scouting {
            config.insert_json5("scouting/multicast/enabled", &json!(false).to_string())?;
        }

        Ok(config)
    }
}

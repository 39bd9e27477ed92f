// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Integration tests for the VLP-16 decoder using PCAP data.
//!
//! These tests require the `pcap` feature and a real sensor capture at
//! `testdata/vlp16.pcap`.

#![cfg(feature = "pcap")]

use edgefirst_terrainpub::{
    DecoderConfig, PacketDecoder, ScannerConfig, TerrainScanner,
    lidar::{AZIMUTH_DOMAIN, LANES},
    packet::PACKET_SIZE,
    packet_source::{DEFAULT_PORT, PacketSource},
    pcap_source::PcapSource,
};
use std::path::Path;

/// Path to VLP-16 PCAP test data
const VLP16_PCAP: &str = "testdata/vlp16.pcap";

/// Check if test data is available
fn test_data_available() -> bool {
    Path::new(VLP16_PCAP).exists()
}

/// Skip test if data not available
macro_rules! require_test_data {
    () => {
        if !test_data_available() {
            eprintln!("Skipping test: {} not found", VLP16_PCAP);
            return;
        }
    };
}

#[tokio::test]
async fn test_vlp16_decode_capture() {
    require_test_data!();

    let mut source =
        PcapSource::from_file(VLP16_PCAP, Some(DEFAULT_PORT)).expect("Failed to load PCAP file");
    assert!(!source.is_empty(), "capture holds no data packets");

    let mut decoder = PacketDecoder::new(DecoderConfig {
        point_cloud: true,
        split_on_wrap: true,
        ..Default::default()
    });
    let mut buf = [0u8; 2048];
    let mut decoded = 0;

    while source.has_more() {
        let len = source.recv(&mut buf).await.expect("Failed to read packet");
        if len != PACKET_SIZE {
            continue;
        }
        decoder.decode(&buf[..len]).expect("Failed to decode packet");
        decoded += 1;
    }

    assert!(decoded > 0);
    for frame in decoder.frames() {
        assert!(frame.azimuths() <= AZIMUTH_DOMAIN as usize);
        // a full rotation at 10 Hz holds roughly 1800 firings
        if frame.azimuths() > 1000 {
            for lane in 0..LANES {
                let d = frame.distance(lane, 0);
                assert!(d.is_none_or(|d| (0.0..=131.0).contains(&d)));
            }
        }
    }
}

#[tokio::test]
async fn test_vlp16_scan_capture() {
    require_test_data!();

    let mut source =
        PcapSource::from_file(VLP16_PCAP, Some(DEFAULT_PORT)).expect("Failed to load PCAP file");
    let mut scanner = TerrainScanner::new(ScannerConfig {
        decoder: DecoderConfig {
            point_cloud: true,
            ..Default::default()
        },
        ..Default::default()
    });

    let Ok(frame) = scanner.scan(&mut source, 1000).await else {
        eprintln!("Skipping test: capture shorter than one scan");
        return;
    };
    assert!(frame.azimuths() >= 1000);

    let obstacles = scanner.analyze(&frame).expect("Failed to analyze frame");
    for obstacle in &obstacles {
        assert!(obstacle.hits() > scanner.detector().config().positive_hits_threshold);
        assert!(obstacle.width() >= 0.0);
        assert!(obstacle.length() >= 0.0);
    }
}

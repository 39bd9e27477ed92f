// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! End-to-end tests over synthetic VLP-16 packets: calibrate on a flat
//! surface, scan a frame containing a raised and a sunken patch, detect.

use edgefirst_terrainpub::{
    DecoderConfig, ObstacleKind, ScannerConfig, TerrainScanner,
    lidar::{AZIMUTH_DOMAIN, MIN_AZIMUTHS_PER_FRAME},
    manager::{STOP, collect_reply, spawn_manager},
    packet::{PACKET_SIZE, Packet},
    packet_source::{LoopingTestSource, TestSource},
};

/// Raw distance units of the flat surface (4 m).
const FLAT: u16 = 2000;

/// Packets covering `packets * 240` hundredths of a degree of raw azimuth,
/// 24 azimuths per packet. `distance` gives the raw distance for a block's
/// raw azimuth.
fn sweep(packets: usize, distance: impl Fn(u16) -> u16) -> Vec<Vec<u8>> {
    (0..packets)
        .map(|p| {
            let mut packet = Packet::default();
            for (i, block) in packet.blocks.iter_mut().enumerate() {
                block.azimuth = ((p * 240 + i * 20) % AZIMUTH_DOMAIN as usize) as u16;
                let d = distance(block.azimuth);
                for ret in block.returns.iter_mut() {
                    ret.distance = d;
                    ret.intensity = 80;
                }
            }
            packet.encode()
        })
        .collect()
}

/// Flat surface with a patch 1 m nearer at raw 10.00°..14.00° and a patch
/// 1 m farther at raw 30.00°..34.00°.
fn scene(raw: u16) -> u16 {
    match raw {
        1000..1400 => FLAT - 500,
        3000..3400 => FLAT + 500,
        _ => FLAT,
    }
}

fn calibrated_scanner(config: ScannerConfig) -> TerrainScanner {
    let mut scanner = TerrainScanner::new(config);
    let blob = sweep(20, |_| FLAT).concat();
    assert_eq!(blob.len(), 20 * PACKET_SIZE);
    assert_eq!(scanner.calibrate(&blob), 20);
    scanner
}

#[tokio::test]
async fn test_polar_boulder_and_crater() {
    let mut scanner = calibrated_scanner(ScannerConfig::default());
    let mut source = TestSource::new(sweep(20, scene));

    let frame = scanner.scan(&mut source, 480).await.unwrap();
    assert_eq!(frame.azimuths(), 480);

    let obstacles = scanner.analyze(&frame).unwrap();
    assert_eq!(obstacles.len(), 2);

    // sorted rows run from high raw azimuth to low, so the crater is found
    // first and reported last
    assert_eq!(obstacles[0].kind(), ObstacleKind::Boulder);
    assert_eq!(obstacles[1].kind(), ObstacleKind::Crater);
    for obstacle in &obstacles {
        assert!(obstacle.hits() > 100);
        assert!(obstacle.width() > 0.0);
        assert!(obstacle.length() > 0.0);
    }
    assert!(!obstacles[0].is_same_as(&obstacles[1]));
}

#[tokio::test]
async fn test_threshold_discards_small_patches() {
    let mut scanner = calibrated_scanner(ScannerConfig {
        detector: edgefirst_terrainpub::DetectorConfig {
            positive_hits_threshold: 1000,
            ..Default::default()
        },
        ..Default::default()
    });
    let mut source = TestSource::new(sweep(20, scene));

    let frame = scanner.scan(&mut source, 480).await.unwrap();
    assert!(scanner.analyze(&frame).unwrap().is_empty());
}

#[tokio::test]
async fn test_cartesian_flat_ground() {
    let mut scanner = calibrated_scanner(ScannerConfig {
        decoder: DecoderConfig {
            point_cloud: true,
            ..Default::default()
        },
        ..Default::default()
    });
    let mut source = TestSource::new(sweep(20, |_| FLAT));

    let frame = scanner.scan(&mut source, 480).await.unwrap();
    assert!(frame.has_points());
    assert!(scanner.analyze(&frame).unwrap().is_empty());
}

#[tokio::test]
async fn test_worker_serves_requests() {
    let scanner = calibrated_scanner(ScannerConfig::default());
    let (requests, events, handle) = spawn_manager(scanner, LoopingTestSource::new(sweep(20, scene)));

    // the first request starts on a fresh frame aligned with the sweep
    requests.send(480).await.unwrap();
    let reply = collect_reply(&events).await.unwrap();
    assert_eq!(reply.frame_id, 0);
    assert_eq!(reply.azimuths, 480);
    assert_eq!(reply.obstacles.len(), 2);

    requests.send(100).await.unwrap();
    let reply = collect_reply(&events).await.unwrap();
    assert_eq!(reply.frame_id, 1);
    assert!(reply.azimuths >= MIN_AZIMUTHS_PER_FRAME);

    requests.send(STOP).await.unwrap();
    handle.await.unwrap().unwrap();
}

// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

mod args;

use args::Args;
use clap::Parser as _;
use edgefirst_terrainpub::{
    lidar::{Error, Point3},
    manager::{STOP_GRACE, ScanEvent, ScanReply, collect_reply, spawn_manager, stop_manager},
    obstacle::{Obstacle, ObstacleKind},
    packet_source::UdpSource,
    scanner::TerrainScanner,
};
use kanal::{AsyncReceiver, AsyncSender};
use serde::Serialize;
use std::pin::pin;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use zenoh::bytes::{Encoding, ZBytes};

#[derive(Serialize)]
struct ObstacleMsg {
    kind: ObstacleKind,
    center: Point3,
    height: f64,
    width: f64,
    length: f64,
    area: f64,
    hits: usize,
}

impl From<&Obstacle> for ObstacleMsg {
    fn from(obstacle: &Obstacle) -> Self {
        Self {
            kind: obstacle.kind(),
            center: obstacle.center(),
            height: obstacle.height(),
            width: obstacle.width(),
            length: obstacle.length(),
            area: obstacle.area(),
            hits: obstacle.hits(),
        }
    }
}

#[derive(Serialize)]
struct ObstaclesMsg<'a> {
    frame_id: &'a str,
    scan: u32,
    timestamp: u64,
    azimuths: usize,
    obstacles: Vec<ObstacleMsg>,
}

type Manager = (
    AsyncSender<i64>,
    AsyncReceiver<ScanEvent>,
    JoinHandle<Result<(), Error>>,
);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(args.rust_log)
        .init();

    let mut scanner = TerrainScanner::new(args.scanner_config());
    if let Some(path) = &args.calibration {
        match std::fs::read(path) {
            Ok(blob) => {
                scanner.calibrate(&blob);
            }
            Err(e) => warn!("calibration {} unavailable: {}", path.display(), e),
        }
    }
    if !args.point_cloud && !scanner.is_calibrated() {
        warn!("running polar detection without a calibration surface");
    }
    let azimuths = scanner.effective_min_azimuths();

    let session = zenoh::open(args.zenoh_config()?).await?;
    let publisher = session
        .declare_publisher(args.obstacles_topic.clone())
        .await?;

    let (requests, events, handle) = start_manager(scanner, &args).await?;

    let mut ctrl_c = pin!(tokio::signal::ctrl_c());
    let mut interrupted = false;
    loop {
        requests.send(azimuths as i64).await?;

        tokio::select! {
            reply = collect_reply(&events) => {
                let Ok(reply) = reply else {
                    debug!("scan worker ended");
                    break;
                };
                let (msg, enc) = format_obstacles(&reply, &args.frame_id)?;
                match publisher.put(msg).encoding(enc).await {
                    Ok(_) => {}
                    Err(e) => error!("obstacle publish error: {:?}", e),
                }
            }
            _ = &mut ctrl_c => {
                info!("interrupted, stopping scan worker");
                interrupted = true;
                break;
            }
        }
    }

    let result = if interrupted {
        stop_manager(&requests, handle, STOP_GRACE).await
    } else {
        handle.await?
    };
    match result {
        Ok(()) => Ok(()),
        Err(e) => {
            error!("scan worker failed: {}", e);
            Err(e.into())
        }
    }
}

async fn start_manager(scanner: TerrainScanner, args: &Args) -> Result<Manager, Error> {
    #[cfg(feature = "pcap")]
    {
        if std::path::Path::new(&args.target).is_file() {
            let source =
                edgefirst_terrainpub::PcapSource::from_file(&args.target, Some(args.port))?;
            info!("replaying {} packets from {}", source.len(), args.target);
            return Ok(spawn_manager(scanner, source));
        }
    }

    let source = UdpSource::bind(&format!("{}:{}", args.target, args.port)).await?;
    Ok(spawn_manager(scanner, source))
}

fn format_obstacles(
    reply: &ScanReply,
    frame_id: &str,
) -> Result<(ZBytes, Encoding), serde_json::Error> {
    for obstacle in &reply.obstacles {
        info!("{}", obstacle);
    }

    let msg = ObstaclesMsg {
        frame_id,
        scan: reply.frame_id,
        timestamp: reply.timestamp,
        azimuths: reply.azimuths,
        obstacles: reply.obstacles.iter().map(ObstacleMsg::from).collect(),
    };

    let msg = ZBytes::from(serde_json::to_vec(&msg)?);
    Ok((msg, Encoding::APPLICATION_JSON))
}

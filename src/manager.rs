// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Background scan worker.
//!
//! The worker waits for scan requests on a channel. Each request carries the
//! number of azimuths the next frame must hold; a negative value stops the
//! worker. For every request the worker reads packets until a frame is
//! complete, runs detection and replies with one [`ScanEvent::Obstacle`] per
//! obstacle followed by [`ScanEvent::End`]. Requests are served one at a
//! time and a scan in progress cannot be cancelled.

use crate::{
    lidar::Error, obstacle::Obstacle, packet_source::PacketSource, scanner::TerrainScanner,
};
use kanal::{AsyncReceiver, AsyncSender};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{Instrument as _, debug, error, info, info_span, warn};

/// Request value that stops the worker.
pub const STOP: i64 = -1;

/// Time a scan in progress gets to finish after a stop request.
pub const STOP_GRACE: Duration = Duration::from_secs(2);

#[derive(Clone, Debug, PartialEq)]
pub enum ScanEvent {
    Obstacle(Obstacle),
    /// Marks the end of the reply to one request.
    End {
        frame_id: u32,
        timestamp: u64,
        azimuths: usize,
    },
}

/// Reply to one request, gathered by [`collect_reply`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ScanReply {
    pub obstacles: Vec<Obstacle>,
    pub frame_id: u32,
    pub timestamp: u64,
    pub azimuths: usize,
}

/// Serve scan requests until a negative request arrives or either channel
/// closes.
pub async fn scan_worker<S: PacketSource>(
    mut scanner: TerrainScanner,
    mut source: S,
    requests: AsyncReceiver<i64>,
    events: AsyncSender<ScanEvent>,
) -> Result<(), Error> {
    while let Ok(request) = requests.recv().await {
        if request < 0 {
            info!("scan worker stopping");
            return Ok(());
        }

        let frame = match scanner
            .scan(&mut source, request as usize)
            .instrument(info_span!("scan", request))
            .await
        {
            Ok(frame) => frame,
            Err(e) => {
                error!("scan failed: {}", e);
                return Err(e);
            }
        };

        let obstacles = info_span!("detect").in_scope(|| scanner.analyze(&frame))?;
        debug!(
            frame_id = frame.frame_id,
            obstacles = obstacles.len(),
            "scan complete"
        );

        for obstacle in obstacles {
            events.send(ScanEvent::Obstacle(obstacle)).await?;
        }
        events
            .send(ScanEvent::End {
                frame_id: frame.frame_id,
                timestamp: frame.timestamp,
                azimuths: frame.azimuths(),
            })
            .await?;
    }

    debug!("request channel closed");
    Ok(())
}

/// Run [`scan_worker`] on the tokio runtime. Returns the request sender, the
/// event receiver and the worker handle.
pub fn spawn_manager<S: PacketSource + 'static>(
    scanner: TerrainScanner,
    source: S,
) -> (
    AsyncSender<i64>,
    AsyncReceiver<ScanEvent>,
    JoinHandle<Result<(), Error>>,
) {
    let (request_tx, request_rx) = kanal::bounded_async(1);
    let (event_tx, event_rx) = kanal::unbounded_async();
    let handle = tokio::spawn(scan_worker(scanner, source, request_rx, event_tx));
    (request_tx, event_rx, handle)
}

/// Send the stop request and wait up to `grace` for the worker to exit.
///
/// A worker blocked on a silent source never reads the request, so it is
/// aborted once `grace` has elapsed.
pub async fn stop_manager(
    requests: &AsyncSender<i64>,
    mut handle: JoinHandle<Result<(), Error>>,
    grace: Duration,
) -> Result<(), Error> {
    let stopped = tokio::time::timeout(grace, async {
        if requests.send(STOP).await.is_err() {
            debug!("scan worker already gone");
        }
        (&mut handle).await
    })
    .await;

    match stopped {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => Err(Error::Io(std::io::Error::other(e))),
        Err(_) => {
            warn!("scan worker still busy after {:?}, aborting", grace);
            handle.abort();
            Ok(())
        }
    }
}

/// Receive events up to and including the next end marker.
pub async fn collect_reply(events: &AsyncReceiver<ScanEvent>) -> Result<ScanReply, Error> {
    let mut obstacles = Vec::new();
    loop {
        match events.recv().await? {
            ScanEvent::Obstacle(obstacle) => obstacles.push(obstacle),
            ScanEvent::End {
                frame_id,
                timestamp,
                azimuths,
            } => {
                return Ok(ScanReply {
                    obstacles,
                    frame_id,
                    timestamp,
                    azimuths,
                });
            }
        }
    }
}

// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Packet source abstraction for the VLP-16 decoder.
//!
//! This module provides a [`PacketSource`] trait that abstracts where data
//! packets come from:
//!
//! - **Live operation**: Reading from the sensor's UDP data port
//! - **Testing**: Replaying pre-recorded or synthetic packets
//! - **Pcap replay**: Reading from pcap files (with feature flag)
//!
//! # Example
//!
//! ```ignore
//! use edgefirst_terrainpub::packet_source::{PacketSource, TestSource};
//!
//! let mut source = TestSource::from_blob(&calibration_bytes);
//!
//! let mut buf = [0u8; 2048];
//! while source.has_more() {
//!     let len = source.recv(&mut buf).await?;
//!     decoder.add_to_calibration(&buf[..len])?;
//! }
//! ```

use crate::{lidar::Error, packet::PACKET_SIZE};
use std::{future::Future, pin::Pin, time::Duration};
use tracing::{info, warn};

/// Default VLP-16 data port.
pub const DEFAULT_PORT: u16 = 2368;

/// Delay before the single bind retry.
const BIND_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Trait for packet sources.
///
/// Implementations provide packets from various sources (UDP, pcap, test data).
pub trait PacketSource: Send {
    /// Receive the next packet into the provided buffer.
    ///
    /// # Returns
    /// - `Ok(len)` - Number of bytes received
    /// - `Err` - I/O or source error
    fn recv<'a>(
        &'a mut self,
        buf: &'a mut [u8],
    ) -> Pin<Box<dyn Future<Output = Result<usize, Error>> + Send + 'a>>;

    /// Check if more packets are available.
    ///
    /// For infinite sources (like UDP), always returns `true`.
    /// For finite sources (test, pcap), returns `false` when exhausted.
    fn has_more(&self) -> bool;
}

/// UDP socket packet source for live sensor operation.
pub struct UdpSource {
    socket: tokio::net::UdpSocket,
}

impl UdpSource {
    /// Create a new UDP source from an existing socket.
    pub fn new(socket: tokio::net::UdpSocket) -> Self {
        Self { socket }
    }

    /// Bind to an address and create a UDP source. A failed bind is retried
    /// once before the error is returned.
    pub async fn bind(addr: &str) -> Result<Self, Error> {
        let socket = match tokio::net::UdpSocket::bind(addr).await {
            Ok(socket) => socket,
            Err(e) => {
                warn!("bind {} failed, retrying: {}", addr, e);
                tokio::time::sleep(BIND_RETRY_DELAY).await;
                tokio::net::UdpSocket::bind(addr).await?
            }
        };
        info!("listening for VLP-16 packets on {}", socket.local_addr()?);
        Ok(Self { socket })
    }
}

impl PacketSource for UdpSource {
    fn recv<'a>(
        &'a mut self,
        buf: &'a mut [u8],
    ) -> Pin<Box<dyn Future<Output = Result<usize, Error>> + Send + 'a>> {
        Box::pin(async move {
            let len = self.socket.recv(buf).await?;
            Ok(len)
        })
    }

    fn has_more(&self) -> bool {
        true // UDP sources are infinite
    }
}

/// Replays a fixed list of datagrams once, then reports end of input.
pub struct TestSource {
    packets: Vec<Vec<u8>>,
    index: usize,
}

impl TestSource {
    pub fn new(packets: Vec<Vec<u8>>) -> Self {
        Self { packets, index: 0 }
    }

    /// Split a blob of concatenated data packets, such as a recorded
    /// calibration surface. A trailing partial packet is kept as-is so the
    /// decoder can reject it.
    pub fn from_blob(blob: &[u8]) -> Self {
        Self::new(blob.chunks(PACKET_SIZE).map(<[u8]>::to_vec).collect())
    }

    /// Source that fails on the first read.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Rewind to the first datagram.
    pub fn reset(&mut self) {
        self.index = 0;
    }

    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    /// Datagrams handed out so far.
    pub fn current_index(&self) -> usize {
        self.index
    }
}

impl PacketSource for TestSource {
    fn recv<'a>(
        &'a mut self,
        buf: &'a mut [u8],
    ) -> Pin<Box<dyn Future<Output = Result<usize, Error>> + Send + 'a>> {
        Box::pin(async move {
            if self.index >= self.packets.len() {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "no more packets",
                )));
            }

            let packet = &self.packets[self.index];
            let len = packet.len().min(buf.len());
            buf[..len].copy_from_slice(&packet[..len]);
            self.index += 1;
            Ok(len)
        })
    }

    fn has_more(&self) -> bool {
        self.index < self.packets.len()
    }
}

/// Sensor spinning forever over the same scene: the datagram list is
/// replayed from the start each time it runs out.
pub struct LoopingTestSource {
    packets: Vec<Vec<u8>>,
    index: usize,
}

impl LoopingTestSource {
    pub fn new(packets: Vec<Vec<u8>>) -> Self {
        Self { packets, index: 0 }
    }

    /// Datagrams handed out so far, across all passes.
    pub fn current_index(&self) -> usize {
        self.index
    }
}

impl PacketSource for LoopingTestSource {
    fn recv<'a>(
        &'a mut self,
        buf: &'a mut [u8],
    ) -> Pin<Box<dyn Future<Output = Result<usize, Error>> + Send + 'a>> {
        Box::pin(async move {
            if self.packets.is_empty() {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "no packets to loop",
                )));
            }

            let packet = &self.packets[self.index % self.packets.len()];
            let len = packet.len().min(buf.len());
            buf[..len].copy_from_slice(&packet[..len]);
            self.index += 1;
            Ok(len)
        })
    }

    fn has_more(&self) -> bool {
        !self.packets.is_empty()
    }
}

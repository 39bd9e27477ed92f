// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! PCAP replay of recorded VLP-16 traffic.
//!
//! [`PcapSource`] loads a PCAP or PCAPNG capture, keeps the UDP payloads
//! sent to or from the data port, and replays them through the
//! [`PacketSource`] trait. Payloads are not length-checked here; the
//! decoder rejects anything that is not a data packet.
//!
//! # Example
//!
//! ```ignore
//! use edgefirst_terrainpub::{PcapSource, packet_source::{DEFAULT_PORT, PacketSource}};
//!
//! let mut source = PcapSource::from_file("vlp16_drive.pcap", Some(DEFAULT_PORT))?;
//! let mut buf = [0u8; 2048];
//! while source.has_more() {
//!     let len = source.recv(&mut buf).await?;
//!     decoder.decode(&buf[..len])?;
//! }
//! ```

use crate::{lidar::Error, packet_source::PacketSource};
use etherparse::{SlicedPacket, TransportSlice};
use pcap_parser::{
    Block, LegacyPcapReader, PcapBlockOwned, PcapError, PcapNGReader,
    traits::PcapReaderIterator,
};
use std::{future::Future, path::Path, pin::Pin};
use tracing::debug;

/// Section Header Block magic of a PCAPNG file.
const PCAPNG_MAGIC: [u8; 4] = [0x0a, 0x0d, 0x0d, 0x0a];

/// In-memory replay of UDP payloads from a capture file.
pub struct PcapSource {
    packets: Vec<Vec<u8>>,
    index: usize,
}

impl PcapSource {
    /// Load a capture from disk, keeping only UDP datagrams whose source or
    /// destination port matches `port` when given.
    pub fn from_file<P: AsRef<Path>>(path: P, port: Option<u16>) -> Result<Self, Error> {
        let data = std::fs::read(path.as_ref())?;
        let source = Self::from_bytes(&data, port)?;
        debug!(
            path = %path.as_ref().display(),
            packets = source.len(),
            "capture loaded"
        );
        Ok(source)
    }

    /// Parse an in-memory capture.
    pub fn from_bytes(data: &[u8], port: Option<u16>) -> Result<Self, Error> {
        let mut packets = Vec::new();

        // Reader capacity covers the whole capture so nothing is left
        // incomplete.
        if data.starts_with(&PCAPNG_MAGIC) {
            let reader = PcapNGReader::new(data.len(), data)
                .map_err(|e| Error::InvalidPacket(format!("pcapng reader: {:?}", e)))?;
            drain(reader, port, &mut packets)?;
        } else {
            let reader = LegacyPcapReader::new(data.len(), data)
                .map_err(|e| Error::InvalidPacket(format!("pcap reader: {:?}", e)))?;
            drain(reader, port, &mut packets)?;
        }

        Ok(Self { packets, index: 0 })
    }

    /// Rewind to the first packet.
    pub fn reset(&mut self) {
        self.index = 0;
    }

    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    pub fn current_index(&self) -> usize {
        self.index
    }

    pub fn remaining(&self) -> usize {
        self.packets.len().saturating_sub(self.index)
    }
}

fn drain<R: PcapReaderIterator>(
    mut reader: R,
    port: Option<u16>,
    packets: &mut Vec<Vec<u8>>,
) -> Result<(), Error> {
    loop {
        match reader.next() {
            Ok((offset, block)) => {
                let frame = match block {
                    PcapBlockOwned::Legacy(b) => Some(b.data),
                    PcapBlockOwned::NG(Block::EnhancedPacket(b)) => Some(b.data),
                    PcapBlockOwned::NG(Block::SimplePacket(b)) => Some(b.data),
                    _ => None,
                };
                if let Some(payload) = frame.and_then(|data| udp_payload(data, port)) {
                    packets.push(payload);
                }
                reader.consume(offset);
            }
            Err(PcapError::Eof) | Err(PcapError::Incomplete(_)) => break,
            Err(e) => return Err(Error::InvalidPacket(format!("pcap parse error: {:?}", e))),
        }
    }
    Ok(())
}

/// Non-empty UDP payload of an Ethernet frame, filtered by port.
fn udp_payload(data: &[u8], port: Option<u16>) -> Option<Vec<u8>> {
    let packet = SlicedPacket::from_ethernet(data).ok()?;
    let udp = match packet.transport {
        Some(TransportSlice::Udp(udp)) => udp,
        _ => return None,
    };

    if let Some(port) = port {
        if udp.source_port() != port && udp.destination_port() != port {
            return None;
        }
    }

    let payload = udp.payload();
    (!payload.is_empty()).then(|| payload.to_vec())
}

impl PacketSource for PcapSource {
    fn recv<'a>(
        &'a mut self,
        buf: &'a mut [u8],
    ) -> Pin<Box<dyn Future<Output = Result<usize, Error>> + Send + 'a>> {
        Box::pin(async move {
            let Some(packet) = self.packets.get(self.index) else {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "no more packets in capture",
                )));
            };
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::PACKET_SIZE;
    use crate::packet_source::DEFAULT_PORT;

    // Minimal valid legacy PCAP header (little-endian)
    const PCAP_HEADER: [u8; 24] = [
        0xd4, 0xc3, 0xb2, 0xa1, // Magic number (little-endian)
        0x02, 0x00, // Major version
        0x04, 0x00, // Minor version
        0x00, 0x00, 0x00, 0x00, // Timezone
        0x00, 0x00, 0x00, 0x00, // Timestamp accuracy
        0xff, 0xff, 0x00, 0x00, // Snap length
        0x01, 0x00, 0x00, 0x00, // Network type (Ethernet)
    ];

    // Create a minimal UDP packet with Ethernet + IP + UDP headers
    fn make_udp_packet(src_port: u16, dst_port: u16, payload: &[u8]) -> Vec<u8> {
        let udp_len = 8 + payload.len();
        let ip_len = 20 + udp_len;
        let total_len = 14 + ip_len; // Ethernet header is 14 bytes

        let mut packet = Vec::with_capacity(total_len);

        // Ethernet header (14 bytes)
        packet.extend_from_slice(&[0x00; 6]); // Dst MAC
        packet.extend_from_slice(&[0x00; 6]); // Src MAC
        packet.extend_from_slice(&[0x08, 0x00]); // EtherType: IPv4

        // IPv4 header (20 bytes, no options)
        packet.push(0x45); // Version + IHL
        packet.push(0x00); // DSCP + ECN
        packet.extend_from_slice(&(ip_len as u16).to_be_bytes()); // Total length
        packet.extend_from_slice(&[0x00, 0x00]); // Identification
        packet.extend_from_slice(&[0x00, 0x00]); // Flags + Fragment offset
        packet.push(0x40); // TTL
        packet.push(0x11); // Protocol: UDP
        packet.extend_from_slice(&[0x00, 0x00]); // Checksum (0 for test)
        packet.extend_from_slice(&[192, 168, 1, 1]); // Src IP
        packet.extend_from_slice(&[192, 168, 1, 2]); // Dst IP

        // UDP header (8 bytes)
        packet.extend_from_slice(&src_port.to_be_bytes());
        packet.extend_from_slice(&dst_port.to_be_bytes());
        packet.extend_from_slice(&(udp_len as u16).to_be_bytes());
        packet.extend_from_slice(&[0x00, 0x00]); // Checksum (0 for test)

        // Payload
        packet.extend_from_slice(payload);

        packet
    }

    // Create a PCAP packet record
    fn make_pcap_record(data: &[u8]) -> Vec<u8> {
        let len = data.len() as u32;
        let mut record = Vec::with_capacity(16 + data.len());

        // Packet record header (16 bytes)
        record.extend_from_slice(&[0x00; 4]); // Timestamp seconds
        record.extend_from_slice(&[0x00; 4]); // Timestamp microseconds
        record.extend_from_slice(&len.to_le_bytes()); // Captured length
        record.extend_from_slice(&len.to_le_bytes()); // Original length

        // Packet data
        record.extend_from_slice(data);

        record
    }

    fn capture(records: &[Vec<u8>]) -> Vec<u8> {
        let mut data = PCAP_HEADER.to_vec();
        for r in records {
            data.extend_from_slice(&make_pcap_record(r));
        }
        data
    }

    #[test]
    fn test_udp_payload_port_filter() {
        let frame = make_udp_packet(DEFAULT_PORT, 40000, b"vlp");
        assert_eq!(udp_payload(&frame, None).unwrap(), b"vlp");
        assert_eq!(udp_payload(&frame, Some(DEFAULT_PORT)).unwrap(), b"vlp");
        assert_eq!(udp_payload(&frame, Some(40000)).unwrap(), b"vlp");
        assert!(udp_payload(&frame, Some(8308)).is_none());
        assert!(udp_payload(&make_udp_packet(DEFAULT_PORT, 1, b""), None).is_none());
    }

    #[test]
    fn test_keeps_data_port_only() {
        let data = vec![0x11u8; PACKET_SIZE];
        // position packets go to 8308 on a real sensor
        let position = vec![0x22u8; 512];
        let pcap = capture(&[
            make_udp_packet(DEFAULT_PORT, 50000, &data),
            make_udp_packet(8308, 50000, &position),
            make_udp_packet(DEFAULT_PORT, 50000, &data),
        ]);

        let source = PcapSource::from_bytes(&pcap, Some(DEFAULT_PORT)).unwrap();
        assert_eq!(source.len(), 2);
        let all = PcapSource::from_bytes(&pcap, None).unwrap();
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn test_replay() {
        let data: Vec<u8> = (0..PACKET_SIZE).map(|i| i as u8).collect();
        let pcap = capture(&[make_udp_packet(DEFAULT_PORT, 50000, &data)]);
        let mut source = PcapSource::from_bytes(&pcap, Some(DEFAULT_PORT)).unwrap();
        assert_eq!(source.remaining(), 1);

        let mut buf = [0u8; 2048];
        let len = source.recv(&mut buf).await.unwrap();
        assert_eq!(&buf[..len], &data[..]);
        assert!(!source.has_more());
        assert!(source.recv(&mut buf).await.is_err());

        source.reset();
        assert_eq!(source.current_index(), 0);
        assert!(source.has_more());
    }

    #[test]
    fn test_empty_capture() {
        let source = PcapSource::from_bytes(&PCAP_HEADER, None).unwrap();
        assert!(source.is_empty());
        assert_eq!(source.remaining(), 0);
    }
}

// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! VLP-16 data packet layout.
//!
//! A data packet is 1206 bytes: twelve 100 byte firing blocks followed by a
//! 4 byte timestamp and two factory bytes.
//!
//! ```text
//! block n (100 bytes)
//! ┌──────────┬───────────┬──────────────────────────────────────────┐
//! │ 0xFFEE   │ azimuth   │ 32 × (distance u16 LE, intensity u8)     │
//! │ 2 bytes  │ u16 LE    │ 96 bytes                                 │
//! └──────────┴───────────┴──────────────────────────────────────────┘
//! ```
//!
//! Returns 0..16 are the first firing sequence of lanes 0..16, returns
//! 16..32 the second sequence, fired 0.10° later.
//!
//! [`PacketSlice`] and [`BlockSlice`] are zero-copy views used on the decode
//! path. The owned [`Packet`] is mostly useful to build synthetic data.

use crate::lidar::Error;

/// Size of a VLP-16 data packet in bytes.
pub const PACKET_SIZE: usize = 1206;
pub const BLOCKS_PER_PACKET: usize = 12;
pub const BLOCK_SIZE: usize = 100;
pub const RETURNS_PER_BLOCK: usize = 32;
pub const RETURN_SIZE: usize = 3;
/// Marker at the start of every firing block (upper block).
pub const BLOCK_FLAG: u16 = 0xFFEE;
/// Meters per raw distance unit.
pub const DISTANCE_RESOLUTION: f64 = 0.002;

const BLOCK_HEADER: usize = 4;
const TIMESTAMP_OFFSET: usize = PACKET_SIZE - 6;
const FACTORY_OFFSET: usize = PACKET_SIZE - 2;

/// Single laser return.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct LaserReturn {
    /// Raw distance in 2 mm units, 0 means no return.
    pub distance: u16,
    pub intensity: u8,
}

impl LaserReturn {
    /// Distance in meters.
    #[inline]
    pub fn meters(&self) -> f64 {
        self.distance as f64 * DISTANCE_RESOLUTION
    }
}

/// One firing block: two firing sequences of all 16 lanes.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FiringBlock {
    pub flag: u16,
    /// Raw azimuth in hundredths of a degree.
    pub azimuth: u16,
    pub returns: [LaserReturn; RETURNS_PER_BLOCK],
}

impl Default for FiringBlock {
    fn default() -> Self {
        Self {
            flag: BLOCK_FLAG,
            azimuth: 0,
            returns: [LaserReturn::default(); RETURNS_PER_BLOCK],
        }
    }
}

/// Return mode reported in the first factory byte.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReturnMode {
    Strongest,
    Last,
    Dual,
    Unknown(u8),
}

impl From<u8> for ReturnMode {
    fn from(val: u8) -> Self {
        match val {
            0x37 => ReturnMode::Strongest,
            0x38 => ReturnMode::Last,
            0x39 => ReturnMode::Dual,
            val => ReturnMode::Unknown(val),
        }
    }
}

/// Owned data packet.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Packet {
    pub blocks: [FiringBlock; BLOCKS_PER_PACKET],
    pub timestamp: u32,
    pub return_mode: u8,
    pub product_id: u8,
}

impl Packet {
    /// Serialize into the 1206 byte wire layout.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; PACKET_SIZE];
        for (block, out) in self.blocks.iter().zip(buf.chunks_exact_mut(BLOCK_SIZE)) {
            out[0..2].copy_from_slice(&block.flag.to_be_bytes());
            out[2..4].copy_from_slice(&block.azimuth.to_le_bytes());
            for (ret, slot) in block
                .returns
                .iter()
                .zip(out[BLOCK_HEADER..].chunks_exact_mut(RETURN_SIZE))
            {
                slot[0..2].copy_from_slice(&ret.distance.to_le_bytes());
                slot[2] = ret.intensity;
            }
        }
        buf[TIMESTAMP_OFFSET..FACTORY_OFFSET].copy_from_slice(&self.timestamp.to_be_bytes());
        buf[FACTORY_OFFSET] = self.return_mode;
        buf[FACTORY_OFFSET + 1] = self.product_id;
        buf
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PacketSlice<'a> {
    slice: &'a [u8],
}

impl<'a> PacketSlice<'a> {
    /// Wrap a datagram, rejecting anything that is not exactly
    /// [`PACKET_SIZE`] bytes.
    pub fn from_slice(slice: &'a [u8]) -> Result<PacketSlice<'a>, Error> {
        if slice.len() < PACKET_SIZE {
            return Err(Error::UnexpectedEnd(slice.len()));
        }
        if slice.len() != PACKET_SIZE {
            return Err(Error::InvalidPacket(format!(
                "expected {} bytes, got {}",
                PACKET_SIZE,
                slice.len()
            )));
        }
        Ok(PacketSlice { slice })
    }

    pub fn block(&self, index: usize) -> BlockSlice<'a> {
        let start = index * BLOCK_SIZE;
        let slice: &'a [u8] = self.slice;
        BlockSlice {
            slice: &slice[start..start + BLOCK_SIZE],
        }
    }

    pub fn blocks(&self) -> impl Iterator<Item = BlockSlice<'a>> + 'a {
        let slice: &'a [u8] = self.slice;
        slice[..BLOCKS_PER_PACKET * BLOCK_SIZE]
            .chunks_exact(BLOCK_SIZE)
            .map(|slice| BlockSlice { slice })
    }

    /// Sensor timestamp, microseconds past the hour.
    pub fn timestamp(&self) -> u32 {
        let s = &self.slice[TIMESTAMP_OFFSET..FACTORY_OFFSET];
        u32::from_be_bytes([s[0], s[1], s[2], s[3]])
    }

    pub fn return_mode(&self) -> ReturnMode {
        ReturnMode::from(self.slice[FACTORY_OFFSET])
    }

    pub fn product_id(&self) -> u8 {
        self.slice[FACTORY_OFFSET + 1]
    }

    pub fn to_packet(&self) -> Packet {
        let mut packet = Packet {
            timestamp: self.timestamp(),
            return_mode: self.slice[FACTORY_OFFSET],
            product_id: self.product_id(),
            ..Default::default()
        };
        for (out, block) in packet.blocks.iter_mut().zip(self.blocks()) {
            *out = block.to_block();
        }
        packet
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BlockSlice<'a> {
    slice: &'a [u8],
}

impl<'a> BlockSlice<'a> {
    pub fn flag(&self) -> u16 {
        u16::from_be_bytes([self.slice[0], self.slice[1]])
    }

    /// Raw azimuth in hundredths of a degree.
    pub fn azimuth(&self) -> u16 {
        u16::from_le_bytes([self.slice[2], self.slice[3]])
    }

    pub fn laser_return(&self, index: usize) -> LaserReturn {
        let o = BLOCK_HEADER + index * RETURN_SIZE;
        LaserReturn {
            distance: u16::from_le_bytes([self.slice[o], self.slice[o + 1]]),
            intensity: self.slice[o + 2],
        }
    }

    pub fn returns(&self) -> impl Iterator<Item = LaserReturn> + 'a {
        let slice: &'a [u8] = self.slice;
        slice[BLOCK_HEADER..]
            .chunks_exact(RETURN_SIZE)
            .map(|r| LaserReturn {
                distance: u16::from_le_bytes([r[0], r[1]]),
                intensity: r[2],
            })
    }

    pub fn to_block(&self) -> FiringBlock {
        let mut block = FiringBlock {
            flag: self.flag(),
            azimuth: self.azimuth(),
            ..Default::default()
        };
        for (out, ret) in block.returns.iter_mut().zip(self.returns()) {
            *out = ret;
        }
        block
    }
}

// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Common types shared by the decoder, the frame and the obstacle detector.
//!
//! The VLP-16 fires 16 lasers ("lanes") per firing sequence. Azimuths are
//! expressed in hundredths of a degree throughout the crate, so a full
//! rotation spans `0..AZIMUTH_DOMAIN`.

use serde::Serialize;
use std::fmt;

/// Number of physical lasers (lanes) on the sensor.
pub const LANES: usize = 16;

/// Azimuth keys live in `0..AZIMUTH_DOMAIN` (hundredths of a degree).
pub const AZIMUTH_DOMAIN: u16 = 36000;

/// Number of lookup table entries per azimuth axis (0.00° through 360.00°).
pub const AZIMUTH_STEPS: usize = AZIMUTH_DOMAIN as usize + 1;

/// Azimuth offset applied to move the sensor's 0° onto the robot's forward
/// axis.
pub const ROTATION_OFFSET: u16 = 9000;

/// Smallest number of azimuths a scan request may ask for.
pub const MIN_AZIMUTHS_PER_FRAME: usize = 350;

/// Cartesian sample in meters, sensor frame (X right, Y forward, Z up).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

impl fmt::Display for Point3 {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({:.2}, {:.2}, {:.2})", self.x, self.y, self.z)
    }
}

/// Common error type for packet decoding, frame export and detection.
#[derive(Debug)]
pub enum Error {
    /// I/O error (socket, file operations)
    Io(std::io::Error),
    /// Invalid packet data
    InvalidPacket(String),
    /// Unexpected end of data at given byte position
    UnexpectedEnd(usize),
    /// Caller-provided buffer does not match the frame's azimuth count
    BufferSize { expected: usize, actual: usize },
    /// Shape error from ndarray operations
    Shape(ndarray::ShapeError),
    /// Lane index outside `0..LANES`
    InvalidLane(usize),
    /// Azimuth outside `0..AZIMUTH_DOMAIN`
    InvalidAzimuth(u16),
    /// Configuration error
    Config(String),
    /// The peer side of a worker channel was dropped
    ChannelClosed,
    /// System time error
    SystemTime(std::time::SystemTimeError),
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "I/O error: {}", err),
            Error::InvalidPacket(msg) => write!(f, "invalid packet: {}", msg),
            Error::UnexpectedEnd(len) => write!(f, "unexpected end of data at {} bytes", len),
            Error::BufferSize { expected, actual } => write!(
                f,
                "buffer holds {} azimuths but frame has {}",
                actual, expected
            ),
            Error::Shape(err) => write!(f, "shape error: {}", err),
            Error::InvalidLane(lane) => write!(f, "invalid lane: {}", lane),
            Error::InvalidAzimuth(az) => write!(f, "invalid azimuth: {}", az),
            Error::Config(msg) => write!(f, "configuration error: {}", msg),
            Error::ChannelClosed => write!(f, "channel closed"),
            Error::SystemTime(err) => write!(f, "system time error: {}", err),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<ndarray::ShapeError> for Error {
    fn from(err: ndarray::ShapeError) -> Self {
        Error::Shape(err)
    }
}

impl From<std::time::SystemTimeError> for Error {
    fn from(err: std::time::SystemTimeError) -> Self {
        Error::SystemTime(err)
    }
}

impl From<kanal::SendError> for Error {
    fn from(_: kanal::SendError) -> Self {
        Error::ChannelClosed
    }
}

impl From<kanal::ReceiveError> for Error {
    fn from(_: kanal::ReceiveError) -> Self {
        Error::ChannelClosed
    }
}

/// Get current timestamp in nanoseconds.
///
/// On Linux, uses `CLOCK_MONOTONIC_RAW` for best accuracy.
/// On other platforms, falls back to `SystemTime`.
#[cfg(target_os = "linux")]
pub fn timestamp() -> Result<u64, Error> {
    let mut tp = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    let err = unsafe { libc::clock_gettime(libc::CLOCK_MONOTONIC_RAW, &mut tp) };
    if err != 0 {
        return Err(std::io::Error::last_os_error().into());
    }

    Ok(tp.tv_sec as u64 * 1_000_000_000 + tp.tv_nsec as u64)
}

#[cfg(not(target_os = "linux"))]
pub fn timestamp() -> Result<u64, Error> {
    let now = std::time::SystemTime::now();
    let duration = now.duration_since(std::time::UNIX_EPOCH)?;
    Ok(duration.as_nanos() as u64)
}

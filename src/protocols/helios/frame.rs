//! Point records and frames in the layout `libHeliosDacAPI` expects.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};
use std::ops::BitOr;

use super::{MAX_COORDINATE, MAX_POINTS};
use crate::types::PointColor;

/// Size of one point record on the wire.
pub const POINT_SIZE_BYTES: usize = 8;

/// A single DAC point: two 16-bit coordinates then four 8-bit channels.
///
/// The field order and widths are fixed by the vendor driver. There is no
/// padding: the struct is 2-byte aligned and exactly 8 bytes long.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Pod, Zeroable)]
pub struct HeliosPoint {
    /// X coordinate, 0-4095
    pub x: u16,
    /// Y coordinate, 0-4095
    pub y: u16,
    pub r: u8,
    pub g: u8,
    pub b: u8,
    /// Intensity
    pub i: u8,
}

const _: () = assert!(std::mem::size_of::<HeliosPoint>() == POINT_SIZE_BYTES);
const _: () = assert!(std::mem::align_of::<HeliosPoint>() == 2);

impl HeliosPoint {
    /// Creates a point, clamping coordinates into the 12-bit range.
    pub fn new(x: u16, y: u16, color: PointColor) -> Self {
        Self {
            x: x.min(MAX_COORDINATE),
            y: y.min(MAX_COORDINATE),
            r: color.r,
            g: color.g,
            b: color.b,
            i: color.intensity,
        }
    }

    /// Creates a blanked point (laser off) at the given position.
    pub fn blanked(x: u16, y: u16) -> Self {
        Self::new(x, y, PointColor::BLANK)
    }

    pub fn color(&self) -> PointColor {
        PointColor::new(self.r, self.g, self.b, self.i)
    }

    /// Serialize to the little-endian wire layout.
    pub fn to_bytes(&self) -> [u8; POINT_SIZE_BYTES] {
        let x = self.x.to_le_bytes();
        let y = self.y.to_le_bytes();
        [x[0], x[1], y[0], y[1], self.r, self.g, self.b, self.i]
    }

    /// Parse from the little-endian wire layout.
    pub fn from_bytes(bytes: [u8; POINT_SIZE_BYTES]) -> Self {
        Self {
            x: u16::from_le_bytes([bytes[0], bytes[1]]),
            y: u16::from_le_bytes([bytes[2], bytes[3]]),
            r: bytes[4],
            g: bytes[5],
            b: bytes[6],
            i: bytes[7],
        }
    }
}

/// Flags byte passed alongside each frame write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WriteFlags(u8);

impl WriteFlags {
    /// Default behaviour: wait for the previous frame, then loop this one.
    pub const NONE: WriteFlags = WriteFlags(0);
    /// Start the new frame without waiting for the current one to finish.
    pub const START_IMMEDIATELY: WriteFlags = WriteFlags(1 << 0);
    /// Play the frame once instead of looping it.
    pub const SINGLE_MODE: WriteFlags = WriteFlags(1 << 1);
    /// Return immediately instead of blocking on the USB transfer.
    pub const DONT_BLOCK: WriteFlags = WriteFlags(1 << 2);

    pub const fn from_bits(bits: u8) -> Self {
        WriteFlags(bits)
    }

    pub const fn bits(&self) -> u8 {
        self.0
    }

    pub const fn contains(&self, other: WriteFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for WriteFlags {
    type Output = WriteFlags;

    fn bitor(self, rhs: WriteFlags) -> WriteFlags {
        WriteFlags(self.0 | rhs.0)
    }
}

/// A sequence of points submitted atomically to one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Point rate in points per second.
    pub pps: u32,
    pub flags: WriteFlags,
    pub points: Vec<HeliosPoint>,
}

impl Frame {
    /// Creates a frame with default flags.
    ///
    /// Frames longer than [`MAX_POINTS`] are truncated.
    pub fn new(pps: u32, mut points: Vec<HeliosPoint>) -> Self {
        if points.len() > MAX_POINTS {
            log::warn!(
                "frame has {} points, truncating to {}",
                points.len(),
                MAX_POINTS
            );
            points.truncate(MAX_POINTS);
        }
        Self {
            pps,
            flags: WriteFlags::NONE,
            points,
        }
    }

    /// Sets the write flags (builder pattern).
    pub fn with_flags(mut self, flags: WriteFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// The point buffer exactly as it sits in memory for the driver.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.points)
    }
}

//! Camera-to-laser coordinate mapping.
//!
//! The projector and the camera do not share a lens, so a linear scale puts
//! the beam in the wrong place towards the frame edges. Each axis is mapped
//! independently:
//!
//! ```text
//! norm   = max(v / (frame_dim * boost), 0)
//! scaled = laser_max * gain * norm ^ exponent + offset
//! out    = trunc(clamp(scaled, 0, laser_max))
//! out    = laser_max - out                 (if the axis is inverted)
//! ```
//!
//! The camera origin is top-left while the DAC origin is bottom-left, so
//! the vertical axis is inverted by default. All coefficients are tuned per
//! installation and come from [`MappingConfig`].

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::protocols::helios::MAX_COORDINATE;
use crate::types::{AxisPair, CameraPoint};

/// A point in DAC coordinate space (0..=laser_max on both axes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct DevicePoint {
    pub x: u16,
    pub y: u16,
}

impl DevicePoint {
    pub fn new(x: u16, y: u16) -> Self {
        Self { x, y }
    }
}

/// Tuning coefficients for [`CoordinateMapper`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MappingConfig {
    /// Camera frame width in pixels.
    pub frame_width: u32,
    /// Camera frame height in pixels.
    pub frame_height: u32,
    /// Largest device coordinate.
    pub laser_max: u16,
    /// Power-law exponent per axis. 1.0 is linear.
    pub exponent: AxisPair,
    /// Multiplier on the scaled value.
    pub gain: AxisPair,
    /// Divisor applied to the frame dimension before normalizing.
    pub boost: AxisPair,
    /// Device-space offset added after scaling.
    pub offset: AxisPair,
    pub invert_x: bool,
    pub invert_y: bool,
}

impl Default for MappingConfig {
    fn default() -> Self {
        Self {
            frame_width: 800,
            frame_height: 600,
            laser_max: MAX_COORDINATE,
            exponent: AxisPair::new(0.93, 0.5),
            gain: AxisPair::splat(1.0),
            boost: AxisPair::splat(1.0),
            offset: AxisPair::new(100.0, -400.0),
            invert_x: false,
            invert_y: true,
        }
    }
}

impl MappingConfig {
    /// A plain proportional mapping with a vertical flip.
    pub fn linear(frame_width: u32, frame_height: u32) -> Self {
        Self {
            frame_width,
            frame_height,
            exponent: AxisPair::splat(1.0),
            offset: AxisPair::splat(0.0),
            ..Self::default()
        }
    }

    /// Set the camera frame dimensions (builder pattern).
    pub fn with_frame_size(mut self, width: u32, height: u32) -> Self {
        self.frame_width = width;
        self.frame_height = height;
        self
    }

    /// Check that every coefficient is usable.
    pub fn validate(&self) -> Result<()> {
        if self.frame_width == 0 || self.frame_height == 0 {
            return Err(Error::invalid_config(format!(
                "frame size must be positive, got {}x{}",
                self.frame_width, self.frame_height
            )));
        }
        if self.laser_max == 0 || self.laser_max > MAX_COORDINATE {
            return Err(Error::invalid_config(format!(
                "laser_max must be in 1..={}, got {}",
                MAX_COORDINATE, self.laser_max
            )));
        }
        check_axis("exponent", self.exponent, |v| v > 0.0)?;
        check_axis("boost", self.boost, |v| v > 0.0)?;
        check_axis("gain", self.gain, |_| true)?;
        check_axis("offset", self.offset, |_| true)?;
        Ok(())
    }
}

fn check_axis(name: &str, pair: AxisPair, ok: impl Fn(f64) -> bool) -> Result<()> {
    for (axis, v) in [("x", pair.x), ("y", pair.y)] {
        if !v.is_finite() || !ok(v) {
            return Err(Error::invalid_config(format!(
                "mapping.{}.{} is out of range: {}",
                name, axis, v
            )));
        }
    }
    Ok(())
}

/// Maps camera pixels to DAC coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinateMapper {
    config: MappingConfig,
}

impl CoordinateMapper {
    /// Create a mapper from a validated configuration.
    pub fn new(config: MappingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &MappingConfig {
        &self.config
    }

    /// Map a camera point into device space. Always within `[0, laser_max]`.
    pub fn map(&self, point: CameraPoint) -> DevicePoint {
        let c = &self.config;
        let max = c.laser_max;
        let x = self.map_axis(point.x as f64, Axis::X);
        let y = self.map_axis(point.y as f64, Axis::Y);
        DevicePoint {
            x: if c.invert_x { invert(x, max) } else { x },
            y: if c.invert_y { invert(y, max) } else { y },
        }
    }

    /// Map a camera point without applying the axis inversion.
    pub fn map_unflipped(&self, point: CameraPoint) -> DevicePoint {
        DevicePoint {
            x: self.map_axis(point.x as f64, Axis::X),
            y: self.map_axis(point.y as f64, Axis::Y),
        }
    }

    /// Scaled value before clamping and truncation.
    pub fn scale(&self, value: f64, axis: Axis) -> f64 {
        let c = &self.config;
        let (dim, exponent, gain, boost, offset) = match axis {
            Axis::X => (c.frame_width, c.exponent.x, c.gain.x, c.boost.x, c.offset.x),
            Axis::Y => (c.frame_height, c.exponent.y, c.gain.y, c.boost.y, c.offset.y),
        };
        // NaN and negative inputs collapse to zero so powf stays real.
        let norm = (value / (dim as f64 * boost)).max(0.0);
        c.laser_max as f64 * gain * norm.powf(exponent) + offset
    }

    fn map_axis(&self, value: f64, axis: Axis) -> u16 {
        let max = self.config.laser_max as f64;
        let scaled = self.scale(value, axis);
        // `as` saturates and maps NaN to 0.
        scaled.clamp(0.0, max) as u16
    }
}

/// Which axis a coefficient applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

/// Flip a device coordinate about the middle of the range.
pub fn invert(value: u16, laser_max: u16) -> u16 {
    laser_max - value.min(laser_max)
}

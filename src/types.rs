//! Shared types for detections, colors and run results.
//!
//! Camera-space values use the detector's convention: origin at the top-left
//! corner of the frame, x to the right, y downwards, in pixels.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A point in camera pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CameraPoint {
    pub x: f32,
    pub y: f32,
}

impl CameraPoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// A single object detection produced by the external detector.
///
/// Read-only to the pipeline and valid for one capture cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Left edge of the bounding box.
    pub left: f32,
    /// Top edge of the bounding box.
    pub top: f32,
    /// Right edge of the bounding box.
    pub right: f32,
    /// Bottom edge of the bounding box.
    pub bottom: f32,
    /// Detector confidence in `[0, 1]`.
    pub confidence: f32,
    /// Class index reported by the network.
    #[serde(default)]
    pub class_id: u32,
}

impl Detection {
    /// Creates a detection from box edges and a confidence score.
    pub fn new(left: f32, top: f32, right: f32, bottom: f32, confidence: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
            confidence,
            class_id: 0,
        }
    }

    /// Sets the class index (builder pattern).
    pub fn with_class(mut self, class_id: u32) -> Self {
        self.class_id = class_id;
        self
    }

    /// Center of the bounding box.
    pub fn center(&self) -> CameraPoint {
        CameraPoint::new(
            (self.left + self.right) / 2.0,
            (self.top + self.bottom) / 2.0,
        )
    }

    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    /// The four box corners: top-left, top-right, bottom-left, bottom-right.
    pub fn corners(&self) -> [CameraPoint; 4] {
        [
            CameraPoint::new(self.left, self.top),
            CameraPoint::new(self.right, self.top),
            CameraPoint::new(self.left, self.bottom),
            CameraPoint::new(self.right, self.bottom),
        ]
    }

    /// A closed loop around the box: TL, TR, BR, BL and back to TL.
    pub fn outline(&self) -> [CameraPoint; 5] {
        let tl = CameraPoint::new(self.left, self.top);
        [
            tl,
            CameraPoint::new(self.right, self.top),
            CameraPoint::new(self.right, self.bottom),
            CameraPoint::new(self.left, self.bottom),
            tl,
        ]
    }
}

/// An 8-bit laser color with a separate intensity channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub intensity: u8,
}

impl PointColor {
    /// Laser off.
    pub const BLANK: PointColor = PointColor::new(0, 0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8, intensity: u8) -> Self {
        Self { r, g, b, intensity }
    }

    /// Returns true if no channel would emit light.
    pub fn is_blank(&self) -> bool {
        self.intensity == 0 || (self.r == 0 && self.g == 0 && self.b == 0)
    }
}

impl Default for PointColor {
    /// Dim red at a quarter intensity.
    fn default() -> Self {
        Self::new(50, 0, 0, 63)
    }
}

impl fmt::Display for PointColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rgb({}, {}, {}) i={}",
            self.r, self.g, self.b, self.intensity
        )
    }
}

/// A per-axis pair of tuning coefficients.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisPair {
    pub x: f64,
    pub y: f64,
}

impl AxisPair {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Same value on both axes.
    pub const fn splat(v: f64) -> Self {
        Self { x: v, y: v }
    }
}

/// How a pipeline run ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunExit {
    /// Input or output reported end of stream.
    EndOfStream,
    /// Stop was requested through a `StopHandle`.
    Stopped,
    /// The configured frame limit was reached.
    FrameLimit,
}

impl fmt::Display for RunExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunExit::EndOfStream => write!(f, "end of stream"),
            RunExit::Stopped => write!(f, "stopped"),
            RunExit::FrameLimit => write!(f, "frame limit reached"),
        }
    }
}

/// Counters collected over a pipeline run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Frames returned by the source.
    pub frames_captured: u64,
    /// Capture calls that timed out.
    pub capture_timeouts: u64,
    /// Detections that passed the region-of-interest filter.
    pub detections: u64,
    /// Frames written, counted once per frame (not per device).
    pub frames_dispatched: u64,
    /// Idle park frames written.
    pub idle_frames: u64,
}

/// Result of a completed pipeline run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunSummary {
    pub exit: RunExit,
    pub stats: RunStats,
}

//! Tracker configuration.
//!
//! Everything that varied between tuning sessions lives in [`TrackerConfig`]:
//! mapping coefficients, the point pattern, beam color, output rate and
//! flags, an optional region of interest and an optional idle park point.
//! The JSON form may omit any field; missing fields take their defaults.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::dispatch::MAX_STATUS_ATTEMPTS;
use crate::error::{Error, Result};
use crate::mapping::{DevicePoint, MappingConfig};
use crate::pattern::{ColorPolicy, PointPattern};
use crate::protocols::helios::{WriteFlags, MAX_COORDINATE, MAX_PPS, MIN_PPS};
use crate::types::{CameraPoint, Detection};

/// Default output point rate.
pub const DEFAULT_POINT_RATE: u32 = 64_000;

/// Default detector network label.
pub const DEFAULT_NETWORK: &str = "ssd-mobilenet-v2";

/// Camera-space rectangle; detections centered outside it are skipped.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegionOfInterest {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl RegionOfInterest {
    pub fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// A band of columns spanning the full frame height.
    pub fn columns(left: f32, right: f32) -> Self {
        Self::new(left, f32::MIN, right, f32::MAX)
    }

    /// Exclusive bounds on every edge.
    pub fn contains(&self, p: CameraPoint) -> bool {
        p.x > self.left && p.x < self.right && p.y > self.top && p.y < self.bottom
    }

    pub fn accepts(&self, detection: &Detection) -> bool {
        self.contains(detection.center())
    }
}

/// Where the beam is parked, blanked, when nothing was dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdlePoint {
    pub x: u16,
    pub y: u16,
    #[serde(default = "IdlePoint::default_pps")]
    pub pps: u32,
}

impl IdlePoint {
    fn default_pps() -> u32 {
        3000
    }

    pub fn new(x: u16, y: u16) -> Self {
        Self {
            x,
            y,
            pps: Self::default_pps(),
        }
    }

    pub fn position(&self) -> DevicePoint {
        DevicePoint::new(self.x, self.y)
    }
}

/// Device output settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Points per second for detection frames.
    pub point_rate: u32,
    /// Flags byte passed to every write.
    pub write_flags: WriteFlags,
    /// Status queries per device per frame before writing anyway.
    pub status_attempts: u32,
    pub idle_point: Option<IdlePoint>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            point_rate: DEFAULT_POINT_RATE,
            write_flags: WriteFlags::NONE,
            status_attempts: MAX_STATUS_ATTEMPTS,
            idle_point: None,
        }
    }
}

/// Full pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Network label shown in the status line.
    pub network: String,
    /// Minimum detector confidence.
    pub threshold: f32,
    pub mapping: MappingConfig,
    pub pattern: PointPattern,
    pub color: ColorPolicy,
    pub output: OutputConfig,
    pub roi: Option<RegionOfInterest>,
    /// Stop after this many captured frames.
    pub max_frames: Option<u64>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            network: DEFAULT_NETWORK.to_string(),
            threshold: 0.5,
            mapping: MappingConfig::default(),
            pattern: PointPattern::default(),
            color: ColorPolicy::default(),
            output: OutputConfig::default(),
            roi: None,
            max_frames: None,
        }
    }
}

impl TrackerConfig {
    /// Read a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| Error::context(format!("reading {}", path.display()), e))?;
        let config: TrackerConfig = serde_json::from_str(&text)
            .map_err(|e| Error::config(path.display().to_string(), e))?;
        log::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::config("serializing", e))
    }

    pub fn validate(&self) -> Result<()> {
        self.mapping.validate()?;
        self.color.validate()?;

        check_pps("output.point_rate", self.output.point_rate)?;
        if !(1..=MAX_STATUS_ATTEMPTS).contains(&self.output.status_attempts) {
            return Err(Error::invalid_config(format!(
                "output.status_attempts must be in 1..={}, got {}",
                MAX_STATUS_ATTEMPTS, self.output.status_attempts
            )));
        }
        if let Some(idle) = &self.output.idle_point {
            check_pps("output.idle_point.pps", idle.pps)?;
            if idle.x > MAX_COORDINATE || idle.y > MAX_COORDINATE {
                return Err(Error::invalid_config(format!(
                    "output.idle_point ({}, {}) is outside 0..={}",
                    idle.x, idle.y, MAX_COORDINATE
                )));
            }
        }

        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(Error::invalid_config(format!(
                "threshold must be in 0..=1, got {}",
                self.threshold
            )));
        }
        if let Some(roi) = &self.roi {
            if roi.left.is_nan() || roi.top.is_nan() || roi.right.is_nan() || roi.bottom.is_nan() {
                return Err(Error::invalid_config("roi must not contain NaN"));
            }
            if roi.left >= roi.right || roi.top >= roi.bottom {
                return Err(Error::invalid_config(format!(
                    "roi is empty: {:?}",
                    roi
                )));
            }
        }
        if self.max_frames == Some(0) {
            return Err(Error::invalid_config("max_frames must be at least 1"));
        }
        Ok(())
    }
}

fn check_pps(field: &str, pps: u32) -> Result<()> {
    if !(MIN_PPS..=MAX_PPS).contains(&pps) {
        return Err(Error::invalid_config(format!(
            "{} must be in {}..={}, got {}",
            field, MIN_PPS, MAX_PPS, pps
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = TrackerConfig::default();
        config.validate().unwrap();
        assert_eq!(config.output.point_rate, 64_000);
        assert_eq!(config.output.status_attempts, 512);
        assert_eq!(config.output.write_flags, WriteFlags::NONE);
        assert_eq!(config.network, "ssd-mobilenet-v2");
    }

    #[test]
    fn empty_json_is_the_default() {
        let config: TrackerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, TrackerConfig::default());
    }

    #[test]
    fn nested_sections_parse() {
        let json = r#"{
            "pattern": "outline",
            "threshold": 0.7,
            "output": { "point_rate": 30000, "write_flags": 3, "idle_point": { "x": 100, "y": 100 } },
            "roi": { "left": 240, "top": 0, "right": 1000, "bottom": 720 },
            "mapping": { "frame_width": 1280, "frame_height": 720 }
        }"#;
        let config: TrackerConfig = serde_json::from_str(json).unwrap();
        config.validate().unwrap();
        assert_eq!(config.pattern, PointPattern::Outline);
        assert_eq!(config.output.write_flags.bits(), 3);
        assert_eq!(config.output.status_attempts, 512);
        assert_eq!(config.output.idle_point, Some(IdlePoint::new(100, 100)));
        assert_eq!(config.output.idle_point.map(|p| p.pps), Some(3000));
        assert_eq!(config.mapping.frame_width, 1280);
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let mut config = TrackerConfig::default();
        config.output.point_rate = 6;
        assert!(config.validate().is_err());

        let mut config = TrackerConfig::default();
        config.output.point_rate = 70_000;
        assert!(config.validate().is_err());

        let mut config = TrackerConfig::default();
        config.output.status_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = TrackerConfig::default();
        config.threshold = 1.5;
        assert!(config.validate().is_err());

        let mut config = TrackerConfig::default();
        config.roi = Some(RegionOfInterest::new(500.0, 0.0, 100.0, 600.0));
        assert!(config.validate().is_err());

        let mut config = TrackerConfig::default();
        config.output.idle_point = Some(IdlePoint::new(5000, 0));
        assert!(config.validate().is_err());

        let mut config = TrackerConfig::default();
        config.max_frames = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn roi_uses_detection_center() {
        let roi = RegionOfInterest::columns(240.0, 1000.0);
        assert!(roi.accepts(&Detection::new(200.0, 0.0, 400.0, 100.0, 0.9)));
        assert!(!roi.accepts(&Detection::new(0.0, 0.0, 200.0, 100.0, 0.9)));
        assert!(!roi.contains(CameraPoint::new(240.0, 10.0)));
    }

    #[test]
    fn load_reads_file_and_reports_bad_json() {
        let dir = std::env::temp_dir();
        let good = dir.join(format!("laser-tracker-config-{}.json", std::process::id()));
        let mut f = fs::File::create(&good).unwrap();
        f.write_all(br#"{"pattern":"center","max_frames":10}"#).unwrap();
        drop(f);
        let config = TrackerConfig::load(&good).unwrap();
        assert_eq!(config.pattern, PointPattern::Center);
        assert_eq!(config.max_frames, Some(10));

        fs::write(&good, b"{ not json").unwrap();
        let err = TrackerConfig::load(&good).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
        fs::remove_file(&good).unwrap();

        let missing = TrackerConfig::load(dir.join("laser-tracker-no-such-file.json"));
        assert!(missing.is_err());
    }

    #[test]
    fn json_round_trip_preserves_config() {
        let mut config = TrackerConfig::default();
        config.color = ColorPolicy::three_band();
        config.output.idle_point = Some(IdlePoint::new(100, 100));
        let json = config.to_json().unwrap();
        let back: TrackerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn column_roi_survives_save_and_load() {
        let mut config = TrackerConfig::default();
        config.roi = Some(RegionOfInterest::columns(240.0, 1000.0));
        let json = config.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(value["roi"]["top"].is_number(), "{}", json);
        assert!(value["roi"]["bottom"].is_number(), "{}", json);

        let path = std::env::temp_dir().join(format!(
            "laser-tracker-roi-{}.json",
            std::process::id()
        ));
        fs::write(&path, &json).unwrap();
        let back = TrackerConfig::load(&path).unwrap();
        fs::remove_file(&path).unwrap();
        assert_eq!(back, config);
        let roi = back.roi.unwrap();
        assert!(roi.contains(CameraPoint::new(500.0, -10_000.0)));
        assert!(roi.contains(CameraPoint::new(500.0, 10_000.0)));
    }
}

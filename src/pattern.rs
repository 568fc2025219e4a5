//! Turning detections into device frames.
//!
//! A [`PointPattern`] picks which camera points of a detection are sent, a
//! [`ColorPolicy`] picks the beam color, and [`FrameBuilder`] combines both
//! with a [`CoordinateMapper`] into ready-to-write [`Frame`]s.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::mapping::CoordinateMapper;
use crate::protocols::helios::{Frame, HeliosPoint, WriteFlags};
use crate::types::{CameraPoint, Detection, PointColor};

// =============================================================================
// Point patterns
// =============================================================================

/// Which points of a detection are projected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointPattern {
    /// One point at the box center.
    Center,
    /// Four corners, each written as its own single-point frame.
    #[default]
    Corners,
    /// Closed five-point loop around the box, in one frame.
    Outline,
}

impl PointPattern {
    pub const ALL: [PointPattern; 3] = [
        PointPattern::Center,
        PointPattern::Corners,
        PointPattern::Outline,
    ];

    /// Camera points grouped per frame.
    pub fn frames_for(&self, detection: &Detection) -> Vec<Vec<CameraPoint>> {
        match self {
            PointPattern::Center => vec![vec![detection.center()]],
            PointPattern::Corners => detection.corners().iter().map(|&c| vec![c]).collect(),
            PointPattern::Outline => vec![detection.outline().to_vec()],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PointPattern::Center => "center",
            PointPattern::Corners => "corners",
            PointPattern::Outline => "outline",
        }
    }
}

impl fmt::Display for PointPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PointPattern {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                Error::invalid_config(format!(
                    "unknown pattern '{}', expected center, corners or outline",
                    s
                ))
            })
    }
}

// =============================================================================
// Color policy
// =============================================================================

/// A color used for detections at or above a confidence level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorBand {
    pub min_confidence: f32,
    pub color: PointColor,
}

/// How the beam color is chosen per detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ColorPolicy {
    Fixed {
        color: PointColor,
    },
    /// The band with the highest `min_confidence` not above the detection's
    /// confidence wins. Below every band the fallback is used.
    ConfidenceBands {
        bands: Vec<ColorBand>,
        fallback: PointColor,
    },
}

impl Default for ColorPolicy {
    fn default() -> Self {
        ColorPolicy::Fixed {
            color: PointColor::default(),
        }
    }
}

impl ColorPolicy {
    /// Balloon tracking colors: red below 0.7, blue from 0.7 and green from
    /// 0.8 upward. All at intensity 3.
    pub fn three_band() -> Self {
        ColorPolicy::ConfidenceBands {
            bands: vec![
                ColorBand {
                    min_confidence: 0.7,
                    color: PointColor::new(0, 0, 10, 3),
                },
                ColorBand {
                    min_confidence: 0.8,
                    color: PointColor::new(0, 10, 0, 3),
                },
            ],
            fallback: PointColor::new(10, 0, 0, 3),
        }
    }

    pub fn color_for(&self, confidence: f32) -> PointColor {
        match self {
            ColorPolicy::Fixed { color } => *color,
            ColorPolicy::ConfidenceBands { bands, fallback } => bands
                .iter()
                .filter(|b| b.min_confidence <= confidence)
                .max_by(|a, b| a.min_confidence.total_cmp(&b.min_confidence))
                .map(|b| b.color)
                .unwrap_or(*fallback),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if let ColorPolicy::ConfidenceBands { bands, .. } = self {
            for band in bands {
                if !(0.0..=1.0).contains(&band.min_confidence) {
                    return Err(Error::invalid_config(format!(
                        "color band min_confidence must be in 0..=1, got {}",
                        band.min_confidence
                    )));
                }
            }
        }
        Ok(())
    }
}

// =============================================================================
// Frame builder
// =============================================================================

/// Builds device frames for detections.
#[derive(Debug, Clone)]
pub struct FrameBuilder {
    mapper: CoordinateMapper,
    pattern: PointPattern,
    color: ColorPolicy,
    pps: u32,
    flags: WriteFlags,
}

impl FrameBuilder {
    pub fn new(mapper: CoordinateMapper, pattern: PointPattern, pps: u32) -> Self {
        Self {
            mapper,
            pattern,
            color: ColorPolicy::default(),
            pps,
            flags: WriteFlags::NONE,
        }
    }

    /// Set the color policy (builder pattern).
    pub fn with_color(mut self, color: ColorPolicy) -> Self {
        self.color = color;
        self
    }

    /// Set the write flags (builder pattern).
    pub fn with_flags(mut self, flags: WriteFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn mapper(&self) -> &CoordinateMapper {
        &self.mapper
    }

    pub fn pattern(&self) -> PointPattern {
        self.pattern
    }

    /// Frames to write for one detection, in dispatch order.
    pub fn build(&self, detection: &Detection) -> Vec<Frame> {
        let color = self.color.color_for(detection.confidence);
        self.pattern
            .frames_for(detection)
            .into_iter()
            .map(|group| {
                let points = group
                    .into_iter()
                    .map(|cam| {
                        let dev = self.mapper.map(cam);
                        log::debug!(
                            "({:.1}, {:.1}) -> ({}, {}) {}",
                            cam.x,
                            cam.y,
                            dev.x,
                            dev.y,
                            color
                        );
                        HeliosPoint::new(dev.x, dev.y, color)
                    })
                    .collect();
                Frame::new(self.pps, points).with_flags(self.flags)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::MappingConfig;

    fn builder(pattern: PointPattern) -> FrameBuilder {
        let mapper = CoordinateMapper::new(MappingConfig::default()).unwrap();
        FrameBuilder::new(mapper, pattern, 64_000)
    }

    fn detection() -> Detection {
        Detection::new(100.0, 100.0, 300.0, 200.0, 0.85)
    }

    #[test]
    fn center_is_one_single_point_frame() {
        let frames = builder(PointPattern::Center).build(&detection());
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].len(), 1);
        assert_eq!(frames[0].pps, 64_000);
    }

    #[test]
    fn corners_are_four_single_point_frames_in_order() {
        let b = builder(PointPattern::Corners);
        let frames = b.build(&detection());
        assert_eq!(frames.len(), 4);
        assert!(frames.iter().all(|f| f.len() == 1));

        let expected: Vec<_> = detection()
            .corners()
            .iter()
            .map(|&c| b.mapper().map(c))
            .collect();
        for (frame, dev) in frames.iter().zip(expected) {
            assert_eq!((frame.points[0].x, frame.points[0].y), (dev.x, dev.y));
        }
    }

    #[test]
    fn outline_is_closed_five_point_frame() {
        let frames = builder(PointPattern::Outline).build(&detection());
        assert_eq!(frames.len(), 1);
        let points = &frames[0].points;
        assert_eq!(points.len(), 5);
        assert_eq!(points[0], points[4]);
        assert_ne!(points[0], points[2]);
    }

    #[test]
    fn flags_and_color_are_applied() {
        let flags = WriteFlags::START_IMMEDIATELY | WriteFlags::SINGLE_MODE;
        let color = PointColor::new(0, 200, 0, 255);
        let frames = builder(PointPattern::Center)
            .with_flags(flags)
            .with_color(ColorPolicy::Fixed { color })
            .build(&detection());
        assert_eq!(frames[0].flags, flags);
        assert_eq!(frames[0].points[0].color(), color);
    }

    #[test]
    fn confidence_bands_pick_highest_reached() {
        let policy = ColorPolicy::three_band();
        let red = PointColor::new(10, 0, 0, 3);
        let blue = PointColor::new(0, 0, 10, 3);
        let green = PointColor::new(0, 10, 0, 3);
        assert_eq!(policy.color_for(0.5), red);
        assert_eq!(policy.color_for(0.69), red);
        assert_eq!(policy.color_for(0.75), blue);
        assert_eq!(policy.color_for(0.85), green);
        // Nothing above green.
        assert_eq!(policy.color_for(0.95), green);
    }

    #[test]
    fn bands_need_not_be_sorted() {
        let policy = ColorPolicy::ConfidenceBands {
            bands: vec![
                ColorBand {
                    min_confidence: 0.9,
                    color: PointColor::new(1, 0, 0, 1),
                },
                ColorBand {
                    min_confidence: 0.5,
                    color: PointColor::new(2, 0, 0, 1),
                },
            ],
            fallback: PointColor::BLANK,
        };
        assert_eq!(policy.color_for(0.95).r, 1);
        assert_eq!(policy.color_for(0.6).r, 2);
    }

    #[test]
    fn pattern_parses_from_str_and_json() {
        assert_eq!("Outline".parse::<PointPattern>().unwrap(), PointPattern::Outline);
        assert!("spiral".parse::<PointPattern>().is_err());
        let p: PointPattern = serde_json::from_str("\"center\"").unwrap();
        assert_eq!(p, PointPattern::Center);
    }

    #[test]
    fn color_policy_json_shape() {
        let json = r#"{"mode":"confidence_bands","bands":[{"min_confidence":0.7,"color":{"r":10,"g":0,"b":0,"intensity":255}}],"fallback":{"r":0,"g":0,"b":0,"intensity":0}}"#;
        let policy: ColorPolicy = serde_json::from_str(json).unwrap();
        assert_eq!(policy.color_for(0.75), PointColor::new(10, 0, 0, 255));
        assert!(ColorPolicy::Fixed {
            color: PointColor::default()
        }
        .validate()
        .is_ok());
    }
}

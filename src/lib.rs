//! Point a laser at what the camera sees.
//!
//! This crate takes object detections from a camera pipeline, maps their
//! bounding boxes from camera pixels into the 12-bit coordinate space of a
//! Helios laser DAC, and writes point frames to every attached device
//! through the vendor's `libHeliosDacAPI` shared library.
//!
//! # Getting Started
//!
//! Capture, inference and display are external; they plug in through the
//! [`FrameSource`], [`Detector`] and [`FrameSink`] traits. The crate ships a
//! replay back end that reads recorded detections from a JSON-lines file:
//!
//! ```no_run
//! use laser_tracker::{
//!     DeviceSet, LogSink, Pipeline, ReplayDetector, ReplaySource, SimulatedDriver,
//!     TrackerConfig,
//! };
//!
//! fn main() -> laser_tracker::Result<()> {
//!     let config = TrackerConfig::default();
//!     let pipeline = Pipeline::new(config)?;
//!
//!     let mut devices = DeviceSet::open(SimulatedDriver::new(1))?;
//!     let mut source = ReplaySource::open("detections.jsonl")?;
//!     let mut detector = ReplayDetector::new(pipeline.config().threshold);
//!     let mut sink = LogSink::new();
//!
//!     let summary = pipeline.run(&mut source, &mut detector, &mut sink, &mut devices)?;
//!     println!("{}: {} frame(s)", summary.exit, summary.stats.frames_captured);
//!
//!     devices.close()
//! }
//! ```
//!
//! # Coordinate System
//!
//! - Camera: pixels, origin top-left, y down.
//! - Device: 0..=4095 on both axes, origin bottom-left, y up.
//!
//! [`CoordinateMapper`] converts between the two with a per-axis power-law
//! warp, gain, offset and optional inversion.
//!
//! # Features
//!
//! - `helios` (default): load the vendor library at runtime
//! - `cli` (default): the `laser-track` command-line tool

pub mod backend;
pub mod config;
pub mod devices;
pub mod dispatch;
mod error;
pub mod mapping;
pub mod pattern;
pub mod pipeline;
pub mod protocols;
pub mod types;
pub mod vision;

// Crate-level error types
pub use error::{Error, Result};

// Device access
pub use backend::DeviceDriver;
pub use devices::DeviceSet;
pub use dispatch::{DispatchReport, FrameDispatcher, MAX_STATUS_ATTEMPTS};
pub use protocols::helios::{DeviceStatus, Frame, HeliosPoint, WriteFlags};
pub use protocols::simulated::{Readiness, SimulatedDriver, SimulatorHandle};

// Mapping and frame construction
pub use mapping::{CoordinateMapper, DevicePoint, MappingConfig};
pub use pattern::{ColorBand, ColorPolicy, FrameBuilder, PointPattern};

// Configuration and the tracking loop
pub use config::{IdlePoint, OutputConfig, RegionOfInterest, TrackerConfig};
pub use pipeline::{Pipeline, StepOutcome, StopHandle};
pub use vision::{
    Detector, FrameSink, FrameSource, JsonlSink, LogSink, ReplayDetector, ReplayFrame,
    ReplaySource,
};

// Core types
pub use types::{AxisPair, CameraPoint, Detection, PointColor, RunExit, RunStats, RunSummary};

// Helios
#[cfg(feature = "helios")]
pub use backend::HeliosBackend;
#[cfg(feature = "helios")]
pub use protocols::helios;

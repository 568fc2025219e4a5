//! Device driver trait for laser DAC output.
//!
//! This module provides the [`DeviceDriver`] trait that every output back end
//! implements: the vendor Helios library, the in-process simulator, and test
//! fakes. It mirrors the four calls the vendor API exposes (open, status,
//! write, close) plus two optional extras.

use crate::protocols::helios::{DeviceStatus, Frame};

pub use crate::error::{Error, Result};

// =============================================================================
// DeviceDriver Trait
// =============================================================================

/// Low-level access to a set of attached DACs, addressed by index.
///
/// # Contract
///
/// - `open_devices` is called once before any other method and returns the
///   number of attached devices; valid indices are `0..count`.
/// - `status` and `write_frame` never fail at the Rust level: readiness and
///   write results are raw device answers, and callers decide how much to
///   trust them.
/// - `close_devices` is called exactly once, after the last write.
pub trait DeviceDriver {
    /// Short name for log messages.
    fn name(&self) -> &str;

    /// Open all attached devices and return how many were found.
    fn open_devices(&mut self) -> Result<usize>;

    /// Release all devices.
    fn close_devices(&mut self) -> Result<()>;

    /// Query whether a device can take a new frame.
    fn status(&mut self, device: usize) -> DeviceStatus;

    /// Submit a frame to a device and return the raw result code.
    fn write_frame(&mut self, device: usize, frame: &Frame) -> i32;

    /// Stop output on a device, if supported.
    fn stop(&mut self, _device: usize) -> Option<i32> {
        None
    }

    /// Human-readable device name, if the driver can report one.
    fn device_name(&mut self, _device: usize) -> Option<String> {
        None
    }
}

impl<D: DeviceDriver + ?Sized> DeviceDriver for Box<D> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn open_devices(&mut self) -> Result<usize> {
        (**self).open_devices()
    }

    fn close_devices(&mut self) -> Result<()> {
        (**self).close_devices()
    }

    fn status(&mut self, device: usize) -> DeviceStatus {
        (**self).status(device)
    }

    fn write_frame(&mut self, device: usize, frame: &Frame) -> i32 {
        (**self).write_frame(device, frame)
    }

    fn stop(&mut self, device: usize) -> Option<i32> {
        (**self).stop(device)
    }

    fn device_name(&mut self, device: usize) -> Option<String> {
        (**self).device_name(device)
    }
}

// =============================================================================
// Re-exports from protocol-specific backends
// =============================================================================

#[cfg(feature = "helios")]
pub use crate::protocols::helios::HeliosBackend;

pub use crate::protocols::simulated::SimulatedDriver;

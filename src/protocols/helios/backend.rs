//! Helios DAC driver backed by the vendor shared library.

use std::path::Path;

use crate::backend::DeviceDriver;
use crate::error::Result;
use crate::protocols::helios::error::Error as HeliosError;
use crate::protocols::helios::{DeviceStatus, Frame, HeliosLibrary};

/// Helios DAC backend (USB, through `libHeliosDacAPI`).
pub struct HeliosBackend {
    lib: HeliosLibrary,
}

impl HeliosBackend {
    /// Load the vendor library from `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::from_library(HeliosLibrary::load(path)?))
    }

    /// Create a backend from an already-loaded library.
    pub fn from_library(lib: HeliosLibrary) -> Self {
        Self { lib }
    }

    pub fn library(&self) -> &HeliosLibrary {
        &self.lib
    }
}

impl DeviceDriver for HeliosBackend {
    fn name(&self) -> &str {
        "Helios"
    }

    fn open_devices(&mut self) -> Result<usize> {
        let code = self.lib.open_devices();
        if code < 0 {
            return Err(HeliosError::OpenFailed(code).into());
        }
        Ok(code as usize)
    }

    fn close_devices(&mut self) -> Result<()> {
        let code = self.lib.close_devices();
        log::trace!("Helios: CloseDevices returned {}", code);
        Ok(())
    }

    fn status(&mut self, device: usize) -> DeviceStatus {
        DeviceStatus::from_code(self.lib.get_status(device as u32))
    }

    fn write_frame(&mut self, device: usize, frame: &Frame) -> i32 {
        self.lib
            .write_frame(device as u32, frame.pps, frame.flags.bits(), &frame.points)
    }

    fn stop(&mut self, device: usize) -> Option<i32> {
        self.lib.stop(device as u32)
    }

    fn device_name(&mut self, device: usize) -> Option<String> {
        self.lib.name(device as u32)
    }
}

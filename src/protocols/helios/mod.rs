//! Helios laser DAC protocol types and vendor library binding.
//!
//! Helios DACs are driven through the vendor's `libHeliosDacAPI` shared
//! library. The point and frame types in this module match the memory layout
//! the library expects; the binding itself is behind the `helios` feature.
//!
//! # Example
//!
//! ```no_run
//! use laser_tracker::protocols::helios::{Frame, HeliosBackend, HeliosPoint};
//! use laser_tracker::{DeviceSet, FrameDispatcher, PointColor};
//!
//! fn main() -> laser_tracker::Result<()> {
//!     let backend = HeliosBackend::load("./libHeliosDacAPI.so")?;
//!     let mut devices = DeviceSet::open(backend)?;
//!
//!     let point = HeliosPoint::new(2048, 2048, PointColor::default());
//!     let frame = Frame::new(30_000, vec![point]);
//!     FrameDispatcher::default().dispatch(&mut devices, &frame);
//!
//!     devices.close()
//! }
//! ```

mod frame;

#[cfg(feature = "helios")]
pub mod backend;
#[cfg(feature = "helios")]
pub mod error;
#[cfg(feature = "helios")]
mod native;

pub use frame::*;

#[cfg(feature = "helios")]
pub use backend::HeliosBackend;
#[cfg(feature = "helios")]
pub use native::HeliosLibrary;

/// Largest coordinate value on either axis (12-bit DAC).
pub const MAX_COORDINATE: u16 = 0x0FFF;

/// Largest number of points accepted in one frame.
pub const MAX_POINTS: usize = 0x1000;

/// Lowest point rate the hardware accepts.
pub const MIN_PPS: u32 = 7;

/// Highest point rate the hardware accepts.
pub const MAX_PPS: u32 = 0xFFFF;

/// Size of the buffer `GetName` writes into.
pub const NAME_BUFFER_LEN: usize = 32;

/// Where the vendor library is looked up by default.
pub const DEFAULT_LIBRARY_PATH: &str = "./libHeliosDacAPI.so";

/// Device status returned by the Helios DAC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceStatus {
    /// Device is ready to receive frame
    Ready,
    /// Device is not ready to receive frame
    NotReady,
    /// The library reported an error code (negative value).
    Failed(i32),
}

impl DeviceStatus {
    /// Interpret a raw `GetStatus` return code.
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => DeviceStatus::Ready,
            c if c < 0 => DeviceStatus::Failed(c),
            _ => DeviceStatus::NotReady,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, DeviceStatus::Ready)
    }
}

//! Runtime binding to the vendor `libHeliosDacAPI` shared library.
//!
//! The library keeps its own process-global device table, so only one
//! `HeliosLibrary` should be live at a time.

use std::ffi::{c_char, c_int, c_uint, CStr};
use std::path::{Path, PathBuf};

use super::error::{Error, Result};
use super::{HeliosPoint, NAME_BUFFER_LEN};

type OpenDevicesFn = unsafe extern "C" fn() -> c_int;
type CloseDevicesFn = unsafe extern "C" fn() -> c_int;
type GetStatusFn = unsafe extern "C" fn(c_uint) -> c_int;
type WriteFrameFn = unsafe extern "C" fn(c_uint, c_int, u8, *const HeliosPoint, c_int) -> c_int;
type StopFn = unsafe extern "C" fn(c_uint) -> c_int;
type GetNameFn = unsafe extern "C" fn(c_uint, *mut c_char) -> c_int;

/// Loaded vendor library with its entry points resolved.
pub struct HeliosLibrary {
    open_devices: OpenDevicesFn,
    close_devices: CloseDevicesFn,
    get_status: GetStatusFn,
    write_frame: WriteFrameFn,
    stop: Option<StopFn>,
    get_name: Option<GetNameFn>,
    path: PathBuf,
    // Keeps the function pointers above valid.
    _lib: libloading::Library,
}

impl HeliosLibrary {
    /// Load the library and resolve its entry points.
    ///
    /// `OpenDevices`, `CloseDevices`, `GetStatus` and `WriteFrame` are
    /// required; `Stop` and `GetName` are used when present.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        // SAFETY: loading runs the library's initializers; the vendor library
        // has none with preconditions.
        let lib = unsafe { libloading::Library::new(&path) }.map_err(|source| Error::Load {
            path: path.clone(),
            source,
        })?;

        // SAFETY: the declared signatures match HeliosDacAPI.h.
        unsafe {
            let open_devices = required::<OpenDevicesFn>(&lib, "OpenDevices")?;
            let close_devices = required::<CloseDevicesFn>(&lib, "CloseDevices")?;
            let get_status = required::<GetStatusFn>(&lib, "GetStatus")?;
            let write_frame = required::<WriteFrameFn>(&lib, "WriteFrame")?;
            let stop = optional::<StopFn>(&lib, "Stop");
            let get_name = optional::<GetNameFn>(&lib, "GetName");

            log::info!("Helios: loaded device library from {}", path.display());

            Ok(Self {
                open_devices,
                close_devices,
                get_status,
                write_frame,
                stop,
                get_name,
                path,
                _lib: lib,
            })
        }
    }

    /// Path the library was loaded from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Scan for and open all attached DACs. Returns the device count.
    pub fn open_devices(&self) -> i32 {
        unsafe { (self.open_devices)() }
    }

    pub fn close_devices(&self) -> i32 {
        unsafe { (self.close_devices)() }
    }

    /// 1 when the device can take a new frame, 0 when busy, negative on error.
    pub fn get_status(&self, dac: u32) -> i32 {
        unsafe { (self.get_status)(dac) }
    }

    /// Write a frame of points to one device.
    pub fn write_frame(&self, dac: u32, pps: u32, flags: u8, points: &[HeliosPoint]) -> i32 {
        let pps = pps.min(c_int::MAX as u32) as c_int;
        let count = points.len().min(c_int::MAX as usize) as c_int;
        // SAFETY: `points` is a live slice of repr(C) records and `count` never
        // exceeds its length. The library only reads from the buffer.
        unsafe { (self.write_frame)(dac, pps, flags, points.as_ptr(), count) }
    }

    /// Stop output on one device. `None` if the library has no `Stop`.
    pub fn stop(&self, dac: u32) -> Option<i32> {
        self.stop.map(|stop| unsafe { stop(dac) })
    }

    /// Device name as reported by `GetName`.
    pub fn name(&self, dac: u32) -> Option<String> {
        let get_name = self.get_name?;
        let mut buf = [0 as c_char; NAME_BUFFER_LEN];
        // SAFETY: the library writes at most NAME_BUFFER_LEN bytes including
        // the terminator.
        let code = unsafe { get_name(dac, buf.as_mut_ptr()) };
        if code != 1 {
            return None;
        }
        buf[NAME_BUFFER_LEN - 1] = 0;
        // SAFETY: buffer is NUL-terminated above.
        let name = unsafe { CStr::from_ptr(buf.as_ptr()) };
        Some(name.to_string_lossy().into_owned())
    }
}

unsafe fn required<T: Copy>(lib: &libloading::Library, name: &'static str) -> Result<T> {
    let symbol: libloading::Symbol<T> = lib
        .get(name.as_bytes())
        .map_err(|source| Error::MissingSymbol { name, source })?;
    Ok(*symbol)
}

unsafe fn optional<T: Copy>(lib: &libloading::Library, name: &'static str) -> Option<T> {
    match lib.get::<T>(name.as_bytes()) {
        Ok(symbol) => Some(*symbol),
        Err(_) => {
            log::debug!("Helios: optional symbol `{}` not found", name);
            None
        }
    }
}

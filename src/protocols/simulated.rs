//! In-process simulated DAC driver.
//!
//! Stands in for the vendor library during dry runs and tests: it reports a
//! configurable number of devices, answers status queries according to a
//! readiness rule, and records every frame it is handed. A
//! [`SimulatorHandle`] stays usable after the driver has been moved into a
//! `DeviceSet`, so callers can inspect what was written.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::backend::{DeviceDriver, Result};
use crate::protocols::helios::{DeviceStatus, Frame};

/// Return code the simulator gives for every write.
pub const SIMULATED_WRITE_OK: i32 = 1;

/// When a simulated device reports `Ready`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// Ready on every status query.
    Always,
    /// Ready once this many queries have been answered `NotReady` since the
    /// last write.
    AfterPolls(u32),
    /// Never ready.
    Never,
}

/// A frame captured by the simulator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenFrame {
    pub device: usize,
    pub frame: Frame,
    /// Status queries the device answered since the previous write.
    pub status_queries: u32,
}

/// Everything the simulator has observed.
#[derive(Debug, Clone, Default)]
pub struct SimulatorLog {
    pub open_calls: u32,
    pub close_calls: u32,
    pub stopped: Vec<usize>,
    pub writes: Vec<WrittenFrame>,
    pub status_queries: u64,
}

/// Shared view of a simulator's log.
#[derive(Clone, Debug, Default)]
pub struct SimulatorHandle {
    log: Arc<Mutex<SimulatorLog>>,
}

impl SimulatorHandle {
    fn lock(&self) -> MutexGuard<'_, SimulatorLog> {
        // A panic while holding the lock leaves the log usable.
        self.log.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// A copy of the full log.
    pub fn snapshot(&self) -> SimulatorLog {
        self.lock().clone()
    }

    /// All frames written so far.
    pub fn writes(&self) -> Vec<WrittenFrame> {
        self.lock().writes.clone()
    }

    pub fn write_count(&self) -> usize {
        self.lock().writes.len()
    }

    pub fn close_calls(&self) -> u32 {
        self.lock().close_calls
    }

    pub fn is_closed(&self) -> bool {
        let log = self.lock();
        log.open_calls > 0 && log.close_calls >= log.open_calls
    }
}

/// Simulated Helios-like driver.
#[derive(Debug)]
pub struct SimulatedDriver {
    devices: usize,
    readiness: Readiness,
    polls_since_write: Vec<u32>,
    handle: SimulatorHandle,
}

impl SimulatedDriver {
    /// Create a simulator reporting `devices` attached DACs, always ready.
    pub fn new(devices: usize) -> Self {
        Self {
            devices,
            readiness: Readiness::Always,
            polls_since_write: vec![0; devices],
            handle: SimulatorHandle::default(),
        }
    }

    /// Set the readiness rule (builder pattern).
    pub fn with_readiness(mut self, readiness: Readiness) -> Self {
        self.readiness = readiness;
        self
    }

    /// Handle for inspecting the log after the driver has been moved.
    pub fn handle(&self) -> SimulatorHandle {
        self.handle.clone()
    }

    fn polls_mut(&mut self, device: usize) -> Option<&mut u32> {
        self.polls_since_write.get_mut(device)
    }
}

impl DeviceDriver for SimulatedDriver {
    fn name(&self) -> &str {
        "Simulator"
    }

    fn open_devices(&mut self) -> Result<usize> {
        self.handle.lock().open_calls += 1;
        self.polls_since_write = vec![0; self.devices];
        log::info!("Simulator: reporting {} device(s)", self.devices);
        Ok(self.devices)
    }

    fn close_devices(&mut self) -> Result<()> {
        self.handle.lock().close_calls += 1;
        Ok(())
    }

    fn status(&mut self, device: usize) -> DeviceStatus {
        self.handle.lock().status_queries += 1;
        let readiness = self.readiness;
        let Some(polls) = self.polls_mut(device) else {
            return DeviceStatus::Failed(-1);
        };
        let ready = match readiness {
            Readiness::Always => true,
            Readiness::Never => false,
            Readiness::AfterPolls(n) => *polls >= n,
        };
        *polls = polls.saturating_add(1);
        if ready {
            DeviceStatus::Ready
        } else {
            DeviceStatus::NotReady
        }
    }

    fn write_frame(&mut self, device: usize, frame: &Frame) -> i32 {
        let status_queries = match self.polls_mut(device) {
            Some(polls) => std::mem::take(polls),
            None => return -1,
        };
        log::debug!(
            "Simulator: device {} <- {} point(s) at {} pps",
            device,
            frame.len(),
            frame.pps
        );
        self.handle.lock().writes.push(WrittenFrame {
            device,
            frame: frame.clone(),
            status_queries,
        });
        SIMULATED_WRITE_OK
    }

    fn stop(&mut self, device: usize) -> Option<i32> {
        self.handle.lock().stopped.push(device);
        Some(1)
    }

    fn device_name(&mut self, device: usize) -> Option<String> {
        (device < self.devices).then(|| format!("Simulated DAC {}", device))
    }
}

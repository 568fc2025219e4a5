//! Best-effort frame delivery to every attached device.
//!
//! For each device the dispatcher spins on the status query until the device
//! reports ready or the attempt ceiling is hit, then writes the frame either
//! way. A busy or unplugged DAC therefore costs at most
//! [`MAX_STATUS_ATTEMPTS`] status calls per frame and never stalls the
//! capture loop. Write codes are reported back but never treated as errors.

use crate::backend::DeviceDriver;
use crate::devices::DeviceSet;
use crate::protocols::helios::{DeviceStatus, Frame};

/// Upper bound on status queries per device per frame.
pub const MAX_STATUS_ATTEMPTS: u32 = 512;

/// What happened when a frame was handed to one device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReport {
    pub device: usize,
    /// Status queries issued before writing.
    pub status_attempts: u32,
    /// Whether the device reported ready before the write.
    pub ready: bool,
    /// Last status seen.
    pub last_status: DeviceStatus,
    /// Raw return code of the write call.
    pub write_code: i32,
}

/// Writes frames to all devices of a [`DeviceSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameDispatcher {
    status_attempts: u32,
}

impl Default for FrameDispatcher {
    fn default() -> Self {
        Self {
            status_attempts: MAX_STATUS_ATTEMPTS,
        }
    }
}

impl FrameDispatcher {
    /// Create a dispatcher with a custom attempt ceiling.
    ///
    /// The value is clamped into `1..=MAX_STATUS_ATTEMPTS`.
    pub fn new(status_attempts: u32) -> Self {
        Self {
            status_attempts: status_attempts.clamp(1, MAX_STATUS_ATTEMPTS),
        }
    }

    pub fn status_attempts(&self) -> u32 {
        self.status_attempts
    }

    /// Deliver `frame` to every device, in index order.
    pub fn dispatch<D: DeviceDriver>(
        &self,
        devices: &mut DeviceSet<D>,
        frame: &Frame,
    ) -> Vec<DispatchReport> {
        devices
            .indices()
            .map(|device| self.dispatch_to(devices.driver_mut(), device, frame))
            .collect()
    }

    /// Deliver `frame` to a single device index.
    pub fn dispatch_to<D: DeviceDriver + ?Sized>(
        &self,
        driver: &mut D,
        device: usize,
        frame: &Frame,
    ) -> DispatchReport {
        let (status_attempts, last_status) = self.wait_ready(driver, device);
        let ready = last_status.is_ready();
        if !ready {
            log::debug!(
                "{}: device {} not ready after {} status queries ({:?}), writing anyway",
                driver.name(),
                device,
                status_attempts,
                last_status
            );
        }

        let write_code = driver.write_frame(device, frame);
        log::trace!(
            "{}: WriteFrame(device={}, pps={}, flags={:#04x}, points={}) returned {}",
            driver.name(),
            device,
            frame.pps,
            frame.flags.bits(),
            frame.len(),
            write_code
        );

        DispatchReport {
            device,
            status_attempts,
            ready,
            last_status,
            write_code,
        }
    }

    /// Spin on the status query. Returns the number of queries and the last
    /// status seen.
    fn wait_ready<D: DeviceDriver + ?Sized>(
        &self,
        driver: &mut D,
        device: usize,
    ) -> (u32, DeviceStatus) {
        let mut last = DeviceStatus::NotReady;
        for attempt in 1..=self.status_attempts {
            last = driver.status(device);
            if last.is_ready() {
                return (attempt, last);
            }
        }
        (self.status_attempts, last)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Result;
    use crate::protocols::helios::HeliosPoint;
    use crate::protocols::simulated::{Readiness, SimulatedDriver};
    use crate::types::PointColor;

    /// Driver that counts calls per device and never becomes ready.
    struct StubbornDriver {
        status_calls: Vec<u32>,
        written: Vec<(usize, usize)>,
    }

    impl DeviceDriver for StubbornDriver {
        fn name(&self) -> &str {
            "Stubborn"
        }

        fn open_devices(&mut self) -> Result<usize> {
            Ok(self.status_calls.len())
        }

        fn close_devices(&mut self) -> Result<()> {
            Ok(())
        }

        fn status(&mut self, device: usize) -> DeviceStatus {
            self.status_calls[device] += 1;
            DeviceStatus::NotReady
        }

        fn write_frame(&mut self, device: usize, frame: &Frame) -> i32 {
            self.written.push((device, frame.len()));
            -1
        }
    }

    fn single_point_frame() -> Frame {
        Frame::new(64_000, vec![HeliosPoint::new(100, 4095, PointColor::default())])
    }

    #[test]
    fn poll_ceiling_is_512_and_write_still_happens() {
        let mut driver = StubbornDriver {
            status_calls: vec![0, 0],
            written: Vec::new(),
        };
        let dispatcher = FrameDispatcher::default();

        let reports: Vec<_> = (0..2)
            .map(|d| dispatcher.dispatch_to(&mut driver, d, &single_point_frame()))
            .collect();

        assert_eq!(driver.status_calls, vec![512, 512]);
        assert_eq!(driver.written, vec![(0, 1), (1, 1)]);
        assert!(reports.iter().all(|r| !r.ready && r.status_attempts == 512));
        assert!(reports.iter().all(|r| r.write_code == -1));
    }

    #[test]
    fn stops_polling_once_ready() {
        let sim = SimulatedDriver::new(1).with_readiness(Readiness::AfterPolls(3));
        let handle = sim.handle();
        let mut devices = DeviceSet::open(sim).unwrap();

        let reports = FrameDispatcher::default().dispatch(&mut devices, &single_point_frame());

        assert_eq!(reports.len(), 1);
        assert!(reports[0].ready);
        assert_eq!(reports[0].status_attempts, 4);
        assert_eq!(handle.snapshot().status_queries, 4);
    }

    #[test]
    fn every_device_receives_the_full_buffer() {
        let sim = SimulatedDriver::new(3);
        let handle = sim.handle();
        let mut devices = DeviceSet::open(sim).unwrap();
        let points = vec![HeliosPoint::blanked(0, 0); 5];
        let frame = Frame::new(64_000, points);

        FrameDispatcher::default().dispatch(&mut devices, &frame);

        let writes = handle.writes();
        assert_eq!(
            writes.iter().map(|w| w.device).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
        assert!(writes.iter().all(|w| w.frame.len() == 5));
    }

    #[test]
    fn never_ready_device_still_gets_written() {
        let sim = SimulatedDriver::new(1).with_readiness(Readiness::Never);
        let handle = sim.handle();
        let mut devices = DeviceSet::open(sim).unwrap();

        let reports = FrameDispatcher::new(8).dispatch(&mut devices, &single_point_frame());

        assert_eq!(reports[0].status_attempts, 8);
        assert_eq!(reports[0].last_status, DeviceStatus::NotReady);
        assert_eq!(handle.write_count(), 1);
        assert_eq!(handle.writes()[0].status_queries, 8);
    }

    #[test]
    fn attempt_ceiling_is_clamped() {
        assert_eq!(FrameDispatcher::new(0).status_attempts(), 1);
        assert_eq!(FrameDispatcher::new(10_000).status_attempts(), 512);
    }
}

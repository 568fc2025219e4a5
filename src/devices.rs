//! Owned set of opened output devices.
//!
//! A [`DeviceSet`] is acquired once with [`DeviceSet::open`] and released
//! exactly once, either through [`DeviceSet::close`] or when it is dropped.
//! Dropping covers early returns, `?` propagation and unwinding panics, so
//! the vendor library always sees its `CloseDevices` call.

use std::ops::Range;

use crate::backend::{DeviceDriver, Error, Result};

/// Opened devices behind a driver.
pub struct DeviceSet<D: DeviceDriver> {
    driver: D,
    count: usize,
    names: Vec<Option<String>>,
    closed: bool,
}

impl<D: DeviceDriver> DeviceSet<D> {
    /// Open every device the driver can see.
    ///
    /// Fails with [`Error::NoDevices`] when none are found; the driver is
    /// closed again before returning.
    pub fn open(mut driver: D) -> Result<Self> {
        let count = driver.open_devices()?;
        if count == 0 {
            if let Err(e) = driver.close_devices() {
                log::warn!("{}: close after empty scan failed: {}", driver.name(), e);
            }
            return Err(Error::NoDevices);
        }

        let names: Vec<Option<String>> = (0..count).map(|i| driver.device_name(i)).collect();
        log::info!("Found {} {} DAC(s)", count, driver.name());
        for (i, name) in names.iter().enumerate() {
            match name {
                Some(name) => log::info!("  [{}] {}", i, name),
                None => log::info!("  [{}] (unnamed)", i),
            }
        }

        Ok(Self {
            driver,
            count,
            names,
            closed: false,
        })
    }

    /// Number of attached devices.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Valid device indices.
    pub fn indices(&self) -> Range<usize> {
        0..self.count
    }

    /// Name reported for a device at open time.
    pub fn device_name(&self, device: usize) -> Option<&str> {
        self.names.get(device).and_then(|n| n.as_deref())
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    /// Stop every device and release them.
    pub fn close(mut self) -> Result<()> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        for device in 0..self.count {
            if let Some(code) = self.driver.stop(device) {
                log::trace!("{}: Stop({}) returned {}", self.driver.name(), device, code);
            }
        }
        log::info!("Closing {} {} DAC(s)", self.count, self.driver.name());
        self.driver.close_devices()
    }
}

impl<D: DeviceDriver> Drop for DeviceSet<D> {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            log::error!("failed to close devices: {}", e);
        }
    }
}

//! hidapi-backed channel implementation

use std::thread;
use std::time::Duration;

use hidapi::{HidApi, HidDevice};
use tracing::{debug, info};

use crate::error::TransportError;
use crate::Channel;

/// Input report read buffer. The surface's vendor reports are well under
/// this; hidapi truncates to the actual transfer length.
const READ_BUF_LEN: usize = 64;

/// Poll interval while waiting for the device to enumerate
const OPEN_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Exclusive blocking connection to the control surface.
pub struct HidChannel {
    device: HidDevice,
}

impl HidChannel {
    /// Open the device, blocking until it is present.
    ///
    /// The driver is typically started before the surface is plugged in,
    /// so an absent device is polled for once a second rather than
    /// reported as an error. Permission failures are surfaced immediately:
    /// retrying those would spin forever against a udev rule problem.
    pub fn open(vid: u16, pid: u16) -> Result<Self, TransportError> {
        let mut api = HidApi::new()?;
        let mut waiting = false;
        loop {
            match api.open(vid, pid) {
                Ok(device) => {
                    info!("Opened device {:04x}:{:04x}", vid, pid);
                    device.set_blocking_mode(true)?;
                    return Ok(Self { device });
                }
                Err(e) => {
                    let err = TransportError::from(e);
                    if matches!(err, TransportError::PermissionDenied(_)) {
                        return Err(err);
                    }
                    if !waiting {
                        info!("Waiting for device {:04x}:{:04x}...", vid, pid);
                        debug!("open failed: {}", err);
                        waiting = true;
                    }
                }
            }
            thread::sleep(OPEN_RETRY_DELAY);
            api.refresh_devices()?;
        }
    }
}

impl Channel for HidChannel {
    fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        self.device.write(data)?;
        Ok(())
    }

    fn send_feature_report(&self, data: &[u8]) -> Result<(), TransportError> {
        self.device.send_feature_report(data)?;
        Ok(())
    }

    fn get_feature_report(&self, id: u8, len: usize) -> Result<Vec<u8>, TransportError> {
        let mut buf = vec![0u8; len];
        buf[0] = id;
        let n = self.device.get_feature_report(&mut buf)?;
        buf.truncate(n);
        Ok(buf)
    }

    fn read_timeout(&self, timeout_ms: i32) -> Result<Option<Vec<u8>>, TransportError> {
        let mut buf = [0u8; READ_BUF_LEN];
        let n = self.device.read_timeout(&mut buf, timeout_ms)?;
        if n == 0 {
            return Ok(None);
        }
        Ok(Some(buf[..n].to_vec()))
    }
}

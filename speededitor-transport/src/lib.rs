//! Blocking HID channel for the Speed Editor driver
//!
//! The control surface is a single exclusively-owned USB HID device. This
//! crate provides the `Channel` capability the driver consumes and one
//! backend implementing it over hidapi. Keeping the trait here lets the
//! session logic run against scripted channels in tests.

pub mod error;

mod hid;

pub use error::TransportError;
pub use hid::HidChannel;

/// A blocking, exclusively-owned channel to the control surface.
///
/// All calls block the current thread; the driver is strictly sequential
/// and never issues concurrent operations on one channel. `read_timeout`
/// returns `Ok(None)` when no report arrived within the window: a timeout
/// is a normal protocol signal here, not a failure.
pub trait Channel {
    /// Write an output report (interrupt endpoint).
    fn send(&self, data: &[u8]) -> Result<(), TransportError>;

    /// Write a feature report.
    fn send_feature_report(&self, data: &[u8]) -> Result<(), TransportError>;

    /// Read a feature report by ID. `len` is the full report length
    /// including the report ID byte.
    fn get_feature_report(&self, id: u8, len: usize) -> Result<Vec<u8>, TransportError>;

    /// Read one input report, waiting at most `timeout_ms`.
    fn read_timeout(&self, timeout_ms: i32) -> Result<Option<Vec<u8>>, TransportError>;
}

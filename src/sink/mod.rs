//! Synthetic input backends
//!
//! One `InputSink` interface, two implementations: a uinput virtual
//! device (preferred) and XTest fake events for hosts where uinput is
//! not accessible. The backend is chosen once at startup; the session
//! logic never branches on it.

mod uinput;
mod x11;

pub use uinput::UinputSink;
pub use x11::X11Sink;

use clap::ValueEnum;
use thiserror::Error;
use tracing::info;

use crate::keymap::KeyMapping;

/// Errors from input injection
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to create uinput device: {0}")]
    Uinput(#[source] std::io::Error),

    #[error("failed to emit input event: {0}")]
    Emit(#[source] std::io::Error),

    #[error("X11 error: {0}")]
    X11(String),

    #[error("no host key for keysym {0:#06x} on this backend")]
    UnmappedSym(u32),
}

/// Scroll step direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDirection {
    Up,
    Down,
}

/// Synthetic input injection capability.
///
/// Implementations flush events before returning, so every call is
/// visible to the host as soon as it completes.
pub trait InputSink {
    fn press_key(&mut self, mapping: KeyMapping) -> Result<(), SinkError>;
    fn release_key(&mut self, mapping: KeyMapping) -> Result<(), SinkError>;

    /// Press or release the whole modifier chord.
    fn set_modifiers(&mut self, down: bool) -> Result<(), SinkError>;

    /// Emit one discrete scroll step.
    fn scroll(&mut self, direction: ScrollDirection) -> Result<(), SinkError>;
}

/// Input backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// Try uinput first, fall back to X11
    Auto,
    /// evdev/uinput virtual device
    Uinput,
    /// XTest fake events on the current display
    X11,
}

/// Open the requested backend.
pub fn open(backend: Backend) -> Result<Box<dyn InputSink>, SinkError> {
    match backend {
        Backend::Uinput => Ok(Box::new(UinputSink::new()?)),
        Backend::X11 => Ok(Box::new(X11Sink::connect()?)),
        Backend::Auto => match UinputSink::new() {
            Ok(sink) => {
                info!("Using uinput backend");
                Ok(Box::new(sink))
            }
            Err(e) => {
                info!("uinput unavailable ({}), falling back to X11", e);
                Ok(Box::new(X11Sink::connect()?))
            }
        },
    }
}

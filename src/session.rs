//! Device session orchestration
//!
//! One `DeviceSession` owns a connected surface for its whole lifetime:
//! the channel, the input sink, and every piece of mutable state. The
//! receive loop is strictly sequential; the only blocking point is the
//! channel read.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use speededitor_transport::{Channel, TransportError};
use thiserror::Error;
use tracing::{debug, info, trace, warn};

use crate::auth::{AuthError, Authenticator};
use crate::keymap::KeyMap;
use crate::keystate::KeyStateTracker;
use crate::protocol::{self, report};
use crate::sink::{InputSink, SinkError};
use crate::wheel::WheelAccumulator;

/// Encrypted-session lifetime: the device stops streaming unless the
/// handshake is repeated within this window. Hand-tuned against the
/// stock firmware.
pub const TIMEOUT_MS: i64 = 60_000;

/// Default cap for one receive call, so the shutdown flag is polled even
/// while the surface is idle.
const RECV_SLICE_MS: i64 = 500;

/// Errors that end a session
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Sink(#[from] SinkError),
}

/// Receive-loop tuning. The defaults are the production values; tests
/// shrink the slice so scripted channels drive the loop deterministically.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Budget between handshakes (ms)
    pub timeout_ms: i64,
    /// Upper bound for one receive call (ms)
    pub recv_slice_ms: i64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout_ms: TIMEOUT_MS,
            recv_slice_ms: RECV_SLICE_MS,
        }
    }
}

/// Owns one connected surface and drives its receive loop.
pub struct DeviceSession {
    channel: Box<dyn Channel>,
    sink: Box<dyn InputSink>,
    keymap: KeyMap,
    config: SessionConfig,
    authenticator: Authenticator,
    tracker: KeyStateTracker,
    wheel: WheelAccumulator,
    shutdown: Arc<AtomicBool>,
}

impl DeviceSession {
    pub fn new(
        channel: Box<dyn Channel>,
        sink: Box<dyn InputSink>,
        keymap: KeyMap,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        Self::with_config(channel, sink, keymap, shutdown, SessionConfig::default())
    }

    pub fn with_config(
        channel: Box<dyn Channel>,
        sink: Box<dyn InputSink>,
        keymap: KeyMap,
        shutdown: Arc<AtomicBool>,
        config: SessionConfig,
    ) -> Self {
        Self {
            channel,
            sink,
            keymap,
            config,
            authenticator: Authenticator::new(),
            tracker: KeyStateTracker::new(),
            wheel: WheelAccumulator::new(),
            shutdown,
        }
    }

    /// Authenticate, enable the surface, and pump reports until shutdown.
    ///
    /// Held keys are released before returning on every path, error or
    /// not, so nothing stays stuck down on the host.
    pub fn run(&mut self) -> Result<(), SessionError> {
        let result = self.run_inner();
        if let Err(e) = self.tracker.release_all(&self.keymap, self.sink.as_mut()) {
            warn!("Failed to release held keys on exit: {}", e);
        }
        result
    }

    fn run_inner(&mut self) -> Result<(), SessionError> {
        self.authenticator.run(self.channel.as_ref())?;
        self.channel.send(&protocol::JOG_ENABLE)?;
        self.channel.send(&protocol::led_command(protocol::LED_ALL))?;

        let mut remaining = self.config.timeout_ms;
        while !self.shutdown.load(Ordering::SeqCst) {
            let wait = remaining.clamp(1, self.config.recv_slice_ms);
            let before = Instant::now();
            let outcome = self.channel.read_timeout(wait as i32)?;
            let elapsed = before.elapsed().as_millis() as i64;

            match outcome {
                Some(data) => {
                    remaining -= elapsed;
                    self.dispatch(&data)?;
                }
                // Nothing within the last slice of the budget: the whole
                // window elapsed without data
                None if wait >= remaining => remaining = 0,
                // Poll tick while the budget still has room
                None => remaining -= elapsed,
            }

            if remaining <= 0 {
                debug!("Session budget elapsed, re-authenticating");
                remaining = self.config.timeout_ms;
                self.authenticator.run(self.channel.as_ref())?;
            }
        }

        info!("Shutdown requested, releasing held keys");
        Ok(())
    }

    fn dispatch(&mut self, data: &[u8]) -> Result<(), SessionError> {
        match data.first().copied() {
            Some(report::WHEEL) if data.len() >= 6 => {
                let delta = protocol::wheel_delta(data);
                trace!(
                    "Wheel {} delta {}",
                    protocol::jog_mode::name(protocol::wheel_mode(data)),
                    delta
                );
                self.wheel.accumulate(delta, self.sink.as_mut())?;
            }
            Some(report::KEYS) if data.len() >= 1 + 2 * protocol::KEY_SLOTS => {
                let keys = protocol::decode_key_slots(data);
                trace!("Keys: {:04x?}", keys);
                self.tracker.update(keys, &self.keymap, self.sink.as_mut())?;
            }
            _ => warn!(
                "Unhandled {} report: {:02x?}",
                report::name(data.first().copied().unwrap_or(0)),
                data
            ),
        }
        Ok(())
    }
}

impl Drop for DeviceSession {
    fn drop(&mut self) {
        // Backstop for abnormal unwinds; `run` already did this on the
        // ordinary paths and the tracker is empty by then.
        let _ = self.tracker.release_all(&self.keymap, self.sink.as_mut());
    }
}

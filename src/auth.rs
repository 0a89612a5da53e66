//! Device authentication
//!
//! The surface refuses to stream input reports until the host completes a
//! challenge/response handshake over feature report 6, and silently stops
//! delivering them unless the handshake is repeated about once a minute.
//! The response transform is the fixed keyboard cipher from the device
//! firmware; it proves protocol compliance to the firmware and has no
//! other security role.

use speededitor_transport::{Channel, TransportError};
use thiserror::Error;
use tracing::{debug, info};

use crate::protocol::{self, AUTH_REPORT_ID, AUTH_REPORT_LEN};

/// Errors from the authentication handshake
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("transport failure during handshake: {0}")]
    Transport(#[from] TransportError),

    #[error("short handshake report ({0} bytes)")]
    ShortReport(usize),

    #[error("unexpected handshake report header [{0:#04x}, {1:#04x}]")]
    UnexpectedHeader(u8, u8),

    #[error("device rejected the authentication response")]
    Rejected,
}

// ---------------------------------------------------------------------------
// Challenge cipher
// ---------------------------------------------------------------------------

// Fixed tables and mask from the device firmware. These must match the
// firmware bit for bit or the handshake is rejected.
const AUTH_EVEN_TBL: [u64; 8] = [
    0x3ae1206f97c10bc8,
    0x2a9ab32bebf244c6,
    0x20a6f8b8df9adf0a,
    0xaf80ece52cfc1719,
    0xec2ee2f7414fd151,
    0xb055adfd73344a15,
    0xa63d2e3059001187,
    0x751bf623f42e0dde,
];

const AUTH_ODD_TBL: [u64; 8] = [
    0x3e22b34f502e7fde,
    0x24656b981875ab1c,
    0xa17f3456df7bf8c3,
    0x6df72e1941aef698,
    0x72226f011e66ab94,
    0x3831a3c606296b42,
    0xfd7ff81881332c89,
    0x61a3f6474ff236c6,
];

const AUTH_MASK: u64 = 0xa79a63f585d37bf0;

/// Rotate one whole byte, low byte toward the top.
fn rotate_byte(v: u64) -> u64 {
    (v << 56) | (v >> 8)
}

/// Apply `rotate_byte` n times (n <= 7).
fn rotate_bytes(v: u64, n: u64) -> u64 {
    v.rotate_right(8 * n as u32)
}

/// Compute the response the device expects for `challenge`.
///
/// Deterministic and stateless: byte rotation plus two fixed lookup
/// tables selected by the challenge's low three bits.
pub fn keyboard_response(challenge: u64) -> u64 {
    let n = challenge & 7;
    let mut v = rotate_bytes(challenge, n);
    let k = if (v & 1) == ((0x78 >> n) & 1) {
        AUTH_EVEN_TBL[n as usize]
    } else {
        v ^= rotate_byte(v);
        AUTH_ODD_TBL[n as usize]
    };
    v ^ (rotate_byte(v) & AUTH_MASK) ^ k
}

// ---------------------------------------------------------------------------
// Handshake state machine
// ---------------------------------------------------------------------------

/// Handshake progress, tracked for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Idle,
    ChallengeSent,
    ChallengeAckSent,
    ResponseSent,
    Authenticated,
    Failed,
}

/// Drives the challenge/response handshake over a channel.
///
/// The device drops its session periodically, so the session loop replays
/// the same sequence on the same channel; `run` resets the machine first
/// and is safe to call any number of times.
pub struct Authenticator {
    state: AuthState,
}

impl Default for Authenticator {
    fn default() -> Self {
        Self::new()
    }
}

impl Authenticator {
    pub fn new() -> Self {
        Self {
            state: AuthState::Idle,
        }
    }

    pub fn state(&self) -> AuthState {
        self.state
    }

    /// Run the four-step handshake.
    ///
    /// Returns the session-timeout hint (seconds) the device reports in
    /// its final status report. The driver's re-auth interval is a fixed
    /// constant; the hint is only logged.
    pub fn run(&mut self, channel: &dyn Channel) -> Result<u16, AuthError> {
        self.state = AuthState::Idle;
        match self.handshake(channel) {
            Ok(hint) => {
                self.state = AuthState::Authenticated;
                info!("Authenticated (device timeout hint: {}s)", hint);
                Ok(hint)
            }
            Err(e) => {
                self.state = AuthState::Failed;
                Err(e)
            }
        }
    }

    fn handshake(&mut self, channel: &dyn Channel) -> Result<u16, AuthError> {
        // Step 1: request a challenge
        channel.send_feature_report(&[AUTH_REPORT_ID, 0, 0, 0, 0, 0, 0, 0, 0, 0])?;
        self.state = AuthState::ChallengeSent;
        let reply = read_auth_report(channel)?;
        expect_header(&reply, 0)?;
        let challenge = protocol::read_u64(&reply, 2);
        debug!("Challenge: {:#018x}", challenge);

        // Step 2: the device wants a (zero) challenge from us; its own
        // response value is read and discarded
        channel.send_feature_report(&[AUTH_REPORT_ID, 1, 0, 0, 0, 0, 0, 0, 0, 0])?;
        self.state = AuthState::ChallengeAckSent;
        let reply = read_auth_report(channel)?;
        expect_header(&reply, 2)?;

        // Step 3: answer the challenge
        let mut response = [0u8; AUTH_REPORT_LEN];
        response[0] = AUTH_REPORT_ID;
        response[1] = 3;
        protocol::write_u64(&mut response, 2, keyboard_response(challenge));
        channel.send_feature_report(&response)?;
        self.state = AuthState::ResponseSent;

        // Step 4: final status
        let reply = read_auth_report(channel)?;
        if reply[0] != AUTH_REPORT_ID || reply[1] != 4 {
            return Err(AuthError::Rejected);
        }
        Ok(protocol::read_u16(&reply, 2))
    }
}

fn read_auth_report(channel: &dyn Channel) -> Result<Vec<u8>, AuthError> {
    let reply = channel.get_feature_report(AUTH_REPORT_ID, AUTH_REPORT_LEN)?;
    if reply.len() < AUTH_REPORT_LEN {
        return Err(AuthError::ShortReport(reply.len()));
    }
    Ok(reply)
}

fn expect_header(reply: &[u8], step: u8) -> Result<(), AuthError> {
    if reply[0] != AUTH_REPORT_ID || reply[1] != step {
        return Err(AuthError::UnexpectedHeader(reply[0], reply[1]));
    }
    Ok(())
}

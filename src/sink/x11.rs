//! X11/XTest backend
//!
//! Fakes key and button events through the XTEST extension. Keysyms are
//! resolved against the server's keyboard mapping once at connect time;
//! scroll steps are button 4/5 pulses, per X convention.

use std::collections::HashMap;

use tracing::{debug, warn};
use x11rb::connection::Connection;
use x11rb::protocol::xproto::{
    ConnectionExt as _, BUTTON_PRESS_EVENT, BUTTON_RELEASE_EVENT, KEY_PRESS_EVENT,
    KEY_RELEASE_EVENT,
};
use x11rb::protocol::xtest::ConnectionExt as _;
use x11rb::rust_connection::RustConnection;

use super::{InputSink, ScrollDirection, SinkError};
use crate::keymap::{keysym, KeyMapping, MODIFIER_SYMS};

/// Scroll wheel button numbers
const BUTTON_SCROLL_UP: u8 = 4;
const BUTTON_SCROLL_DOWN: u8 = 5;

/// XTest-based sink for X11 sessions.
pub struct X11Sink {
    conn: RustConnection,
    root: u32,
    keycodes: HashMap<u32, u8>,
    shift_keycode: u8,
}

impl X11Sink {
    /// Connect to the display and resolve the keycodes this driver needs.
    pub fn connect() -> Result<Self, SinkError> {
        let (conn, screen_num) = x11rb::connect(None).map_err(x11_err)?;
        let setup = conn.setup();
        let root = setup.roots[screen_num].root;
        let min = setup.min_keycode;
        let max = setup.max_keycode;

        let mapping = conn
            .get_keyboard_mapping(min, max - min + 1)
            .map_err(x11_err)?
            .reply()
            .map_err(x11_err)?;

        // First keycode producing each keysym wins, matching how the
        // server itself resolves lookups
        let per = mapping.keysyms_per_keycode as usize;
        let mut keycodes = HashMap::new();
        for (i, syms) in mapping.keysyms.chunks(per).enumerate() {
            let keycode = min + i as u8;
            for &sym in syms {
                if sym != 0 {
                    keycodes.entry(sym).or_insert(keycode);
                }
            }
        }
        debug!("Resolved {} keysyms from the server mapping", keycodes.len());

        let shift_keycode = *keycodes
            .get(&keysym::SHIFT_L)
            .ok_or(SinkError::UnmappedSym(keysym::SHIFT_L))?;

        Ok(Self {
            conn,
            root,
            keycodes,
            shift_keycode,
        })
    }

    fn keycode(&self, sym: u32) -> Result<u8, SinkError> {
        self.keycodes
            .get(&sym)
            .copied()
            .ok_or(SinkError::UnmappedSym(sym))
    }

    fn fake_key(&self, keycode: u8, down: bool) -> Result<(), SinkError> {
        let kind = if down { KEY_PRESS_EVENT } else { KEY_RELEASE_EVENT };
        self.conn
            .xtest_fake_input(kind, keycode, x11rb::CURRENT_TIME, self.root, 0, 0, 0)
            .map_err(x11_err)?;
        Ok(())
    }

    fn fake_button(&self, button: u8, down: bool) -> Result<(), SinkError> {
        let kind = if down {
            BUTTON_PRESS_EVENT
        } else {
            BUTTON_RELEASE_EVENT
        };
        self.conn
            .xtest_fake_input(kind, button, x11rb::CURRENT_TIME, self.root, 0, 0, 0)
            .map_err(x11_err)?;
        Ok(())
    }

    fn flush(&self) -> Result<(), SinkError> {
        self.conn.flush().map_err(x11_err)
    }
}

fn x11_err<E: std::fmt::Display>(e: E) -> SinkError {
    SinkError::X11(e.to_string())
}

impl InputSink for X11Sink {
    fn press_key(&mut self, mapping: KeyMapping) -> Result<(), SinkError> {
        if mapping.shift {
            self.fake_key(self.shift_keycode, true)?;
        }
        self.fake_key(self.keycode(mapping.sym)?, true)?;
        self.flush()
    }

    fn release_key(&mut self, mapping: KeyMapping) -> Result<(), SinkError> {
        self.fake_key(self.keycode(mapping.sym)?, false)?;
        if mapping.shift {
            self.fake_key(self.shift_keycode, false)?;
        }
        self.flush()
    }

    fn set_modifiers(&mut self, down: bool) -> Result<(), SinkError> {
        for &sym in MODIFIER_SYMS {
            // Not every server maps the whole chord; skip the holes
            match self.keycode(sym) {
                Ok(keycode) => self.fake_key(keycode, down)?,
                Err(_) => warn!("Modifier keysym {:#06x} not mapped on this server", sym),
            }
        }
        self.flush()
    }

    fn scroll(&mut self, direction: ScrollDirection) -> Result<(), SinkError> {
        let button = match direction {
            ScrollDirection::Up => BUTTON_SCROLL_UP,
            ScrollDirection::Down => BUTTON_SCROLL_DOWN,
        };
        self.fake_button(button, true)?;
        self.fake_button(button, false)?;
        self.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[ignore] // Requires an X display (run with: cargo test -- --ignored)
    fn connect_to_display() {
        assert!(X11Sink::connect().is_ok());
    }
}

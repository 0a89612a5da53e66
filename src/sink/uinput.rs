//! uinput virtual device backend
//!
//! Registers a virtual keyboard-plus-wheel device and injects events
//! through it. Works on any Linux session type (X11, Wayland, console)
//! but needs write access to /dev/uinput.

use evdev::{
    uinput::{VirtualDevice, VirtualDeviceBuilder},
    AttributeSet, EventType, InputEvent, Key, RelativeAxisType,
};

use super::{InputSink, ScrollDirection, SinkError};
use crate::keymap::{keysym, KeyMapping, MODIFIER_SYMS};

/// Device name (shown in /proc/bus/input/devices and libinput logs)
const DEVICE_NAME: &str = "Speed Editor (virtual)";

/// Every key the virtual device may emit
const ALL_KEYS: &[Key] = &[
    Key::KEY_F1,
    Key::KEY_F2,
    Key::KEY_F3,
    Key::KEY_F4,
    Key::KEY_F5,
    Key::KEY_F6,
    Key::KEY_F7,
    Key::KEY_F8,
    Key::KEY_F9,
    Key::KEY_F10,
    Key::KEY_F11,
    Key::KEY_F12,
    Key::KEY_F13,
    Key::KEY_F14,
    Key::KEY_F15,
    Key::KEY_F16,
    Key::KEY_F17,
    Key::KEY_F18,
    Key::KEY_F19,
    Key::KEY_F20,
    Key::KEY_F21,
    Key::KEY_F22,
    Key::KEY_F23,
    Key::KEY_F24,
    Key::KEY_UP,
    Key::KEY_DOWN,
    Key::KEY_LEFT,
    Key::KEY_RIGHT,
    Key::KEY_LEFTSHIFT,
    Key::KEY_LEFTALT,
    Key::KEY_LEFTMETA,
];

/// Virtual keyboard+wheel device injecting events through uinput.
pub struct UinputSink {
    device: VirtualDevice,
}

impl UinputSink {
    pub fn new() -> Result<Self, SinkError> {
        let mut keys = AttributeSet::<Key>::new();
        for key in ALL_KEYS {
            keys.insert(*key);
        }
        let mut axes = AttributeSet::<RelativeAxisType>::new();
        axes.insert(RelativeAxisType::REL_WHEEL);

        let device = VirtualDeviceBuilder::new()
            .map_err(SinkError::Uinput)?
            .name(DEVICE_NAME)
            .with_keys(&keys)
            .map_err(SinkError::Uinput)?
            .with_relative_axes(&axes)
            .map_err(SinkError::Uinput)?
            .build()
            .map_err(SinkError::Uinput)?;

        Ok(Self { device })
    }

    fn emit_key(&mut self, key: Key, down: bool) -> Result<(), SinkError> {
        let event = InputEvent::new_now(EventType::KEY, key.code(), i32::from(down));
        self.device.emit(&[event]).map_err(SinkError::Emit)
    }
}

/// evdev code for a keysym handled by this driver.
fn key_for_sym(sym: u32) -> Result<Key, SinkError> {
    let key = match sym {
        keysym::F1 => Key::KEY_F1,
        keysym::F2 => Key::KEY_F2,
        keysym::F3 => Key::KEY_F3,
        keysym::F4 => Key::KEY_F4,
        keysym::F5 => Key::KEY_F5,
        keysym::F6 => Key::KEY_F6,
        keysym::F7 => Key::KEY_F7,
        keysym::F8 => Key::KEY_F8,
        keysym::F9 => Key::KEY_F9,
        keysym::F10 => Key::KEY_F10,
        keysym::F11 => Key::KEY_F11,
        keysym::F12 => Key::KEY_F12,
        keysym::F13 => Key::KEY_F13,
        keysym::F14 => Key::KEY_F14,
        keysym::F15 => Key::KEY_F15,
        keysym::F16 => Key::KEY_F16,
        keysym::F17 => Key::KEY_F17,
        keysym::F18 => Key::KEY_F18,
        keysym::F19 => Key::KEY_F19,
        keysym::F20 => Key::KEY_F20,
        keysym::F21 => Key::KEY_F21,
        keysym::F22 => Key::KEY_F22,
        keysym::F23 => Key::KEY_F23,
        keysym::F24 => Key::KEY_F24,
        keysym::UP => Key::KEY_UP,
        keysym::DOWN => Key::KEY_DOWN,
        keysym::LEFT => Key::KEY_LEFT,
        keysym::RIGHT => Key::KEY_RIGHT,
        keysym::SHIFT_L => Key::KEY_LEFTSHIFT,
        keysym::ALT_L => Key::KEY_LEFTALT,
        // Meta and Super share one evdev code
        keysym::META_L | keysym::SUPER_L => Key::KEY_LEFTMETA,
        _ => return Err(SinkError::UnmappedSym(sym)),
    };
    Ok(key)
}

impl InputSink for UinputSink {
    fn press_key(&mut self, mapping: KeyMapping) -> Result<(), SinkError> {
        if mapping.shift {
            self.emit_key(Key::KEY_LEFTSHIFT, true)?;
        }
        self.emit_key(key_for_sym(mapping.sym)?, true)
    }

    fn release_key(&mut self, mapping: KeyMapping) -> Result<(), SinkError> {
        self.emit_key(key_for_sym(mapping.sym)?, false)?;
        if mapping.shift {
            self.emit_key(Key::KEY_LEFTSHIFT, false)?;
        }
        Ok(())
    }

    fn set_modifiers(&mut self, down: bool) -> Result<(), SinkError> {
        // Adjacent chord entries may collapse to the same evdev key
        let mut last = None;
        for &sym in MODIFIER_SYMS {
            let key = key_for_sym(sym)?;
            if last == Some(key) {
                continue;
            }
            self.emit_key(key, down)?;
            last = Some(key);
        }
        Ok(())
    }

    fn scroll(&mut self, direction: ScrollDirection) -> Result<(), SinkError> {
        let value = match direction {
            ScrollDirection::Up => 1,
            ScrollDirection::Down => -1,
        };
        let event = InputEvent::new_now(EventType::RELATIVE, RelativeAxisType::REL_WHEEL.0, value);
        self.device.emit(&[event]).map_err(SinkError::Emit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keymap::KeyMap;

    #[test]
    fn builtin_keymap_is_fully_expressible() {
        // Every built-in binding must resolve to an evdev key
        let keymap = KeyMap::builtin();
        for (code, mapping) in keymap.entries() {
            assert!(
                key_for_sym(mapping.sym).is_ok(),
                "key {code:#04x} has no evdev mapping"
            );
        }
    }

    #[test]
    #[ignore] // Requires uinput access (run with: cargo test -- --ignored)
    fn create_virtual_device() {
        assert!(UinputSink::new().is_ok());
    }
}

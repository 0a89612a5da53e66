//! Device keymap
//!
//! Maps the surface's internal key codes to host key bindings. The
//! built-in table mirrors the stock layout; a TOML file can override or
//! extend individual entries. This is configuration data: the driver only
//! ever consumes it as a lookup.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

/// X11 keysym values for the host keys the surface can be bound to. The
/// uinput backend translates these to evdev codes; the X11 backend uses
/// them directly.
pub mod keysym {
    pub const F1: u32 = 0xffbe;
    pub const F2: u32 = 0xffbf;
    pub const F3: u32 = 0xffc0;
    pub const F4: u32 = 0xffc1;
    pub const F5: u32 = 0xffc2;
    pub const F6: u32 = 0xffc3;
    pub const F7: u32 = 0xffc4;
    pub const F8: u32 = 0xffc5;
    pub const F9: u32 = 0xffc6;
    pub const F10: u32 = 0xffc7;
    pub const F11: u32 = 0xffc8;
    pub const F12: u32 = 0xffc9;
    pub const F13: u32 = 0xffca;
    pub const F14: u32 = 0xffcb;
    pub const F15: u32 = 0xffcc;
    pub const F16: u32 = 0xffcd;
    pub const F17: u32 = 0xffce;
    pub const F18: u32 = 0xffcf;
    pub const F19: u32 = 0xffd0;
    pub const F20: u32 = 0xffd1;
    pub const F21: u32 = 0xffd2;
    pub const F22: u32 = 0xffd3;
    pub const F23: u32 = 0xffd4;
    pub const F24: u32 = 0xffd5;
    pub const LEFT: u32 = 0xff51;
    pub const UP: u32 = 0xff52;
    pub const RIGHT: u32 = 0xff53;
    pub const DOWN: u32 = 0xff54;
    pub const SHIFT_L: u32 = 0xffe1;
    pub const META_L: u32 = 0xffe7;
    pub const ALT_L: u32 = 0xffe9;
    pub const SUPER_L: u32 = 0xffeb;
}

/// The modifier chord held around mapped key activity, so the bindings
/// stay clear of ordinary application shortcuts.
pub const MODIFIER_SYMS: &[u32] = &[keysym::ALT_L, keysym::META_L, keysym::SUPER_L];

/// Host binding for one device key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyMapping {
    /// X11 keysym of the bound host key
    pub sym: u32,
    /// Hold Shift around the key event
    pub shift: bool,
}

const fn plain(sym: u32) -> KeyMapping {
    KeyMapping { sym, shift: false }
}

const fn shifted(sym: u32) -> KeyMapping {
    KeyMapping { sym, shift: true }
}

/// Panel label for a device key code (diagnostics only).
pub fn key_name(code: u16) -> &'static str {
    match code {
        0x01 => "SMART INSRT",
        0x02 => "APPND",
        0x03 => "RIPL O/WR",
        0x04 => "CLOSE UP",
        0x05 => "PLACE ON TOP",
        0x06 => "SRC O/WR",
        0x07 => "IN",
        0x08 => "OUT",
        0x09 => "TRIM IN",
        0x0a => "TRIM OUT",
        0x0b => "ROLL",
        0x0c => "SLIP SRC",
        0x0d => "SLIP DEST",
        0x0e => "TRANS DUR",
        0x0f => "CUT",
        0x10 => "DIS",
        0x11 => "SMTH CUT",
        0x1a => "SOURCE",
        0x1b => "TIMELINE",
        0x1c => "SHTL",
        0x1d => "JOG",
        0x1e => "SCRL",
        0x1f => "SYNC BIN",
        0x22 => "TRANS",
        0x25 => "VIDEO ONLY",
        0x26 => "AUDIO ONLY",
        0x2b => "RIPL DEL",
        0x2c => "AUDIO LEVEL",
        0x2d => "FULL VIEW",
        0x2e => "SNAP",
        0x2f => "SPLIT",
        0x30 => "LIVE O/WR",
        0x31 => "ESC",
        0x33 => "CAM1",
        0x34 => "CAM2",
        0x35 => "CAM3",
        0x36 => "CAM4",
        0x37 => "CAM5",
        0x38 => "CAM6",
        0x39 => "CAM7",
        0x3a => "CAM8",
        0x3b => "CAM9",
        0x3c => "STOP/PLAY",
        _ => "?",
    }
}

/// Device key code for a panel label (used by override files).
pub fn key_code_from_name(name: &str) -> Option<u16> {
    let code = match name {
        "SMART INSRT" => 0x01,
        "APPND" => 0x02,
        "RIPL O/WR" => 0x03,
        "CLOSE UP" => 0x04,
        "PLACE ON TOP" => 0x05,
        "SRC O/WR" => 0x06,
        "IN" => 0x07,
        "OUT" => 0x08,
        "TRIM IN" => 0x09,
        "TRIM OUT" => 0x0a,
        "ROLL" => 0x0b,
        "SLIP SRC" => 0x0c,
        "SLIP DEST" => 0x0d,
        "TRANS DUR" => 0x0e,
        "CUT" => 0x0f,
        "DIS" => 0x10,
        "SMTH CUT" => 0x11,
        "SOURCE" => 0x1a,
        "TIMELINE" => 0x1b,
        "SHTL" => 0x1c,
        "JOG" => 0x1d,
        "SCRL" => 0x1e,
        "SYNC BIN" => 0x1f,
        "TRANS" => 0x22,
        "VIDEO ONLY" => 0x25,
        "AUDIO ONLY" => 0x26,
        "RIPL DEL" => 0x2b,
        "AUDIO LEVEL" => 0x2c,
        "FULL VIEW" => 0x2d,
        "SNAP" => 0x2e,
        "SPLIT" => 0x2f,
        "LIVE O/WR" => 0x30,
        "ESC" => 0x31,
        "CAM1" => 0x33,
        "CAM2" => 0x34,
        "CAM3" => 0x35,
        "CAM4" => 0x36,
        "CAM5" => 0x37,
        "CAM6" => 0x38,
        "CAM7" => 0x39,
        "CAM8" => 0x3a,
        "CAM9" => 0x3b,
        "STOP/PLAY" => 0x3c,
        _ => return None,
    };
    Some(code)
}

/// Stock layout: each mapped panel key lands on an F-key or arrow so the
/// bindings are easy to pick up in application shortcut editors. Keys not
/// listed here (mode selectors, unused buttons) are deliberately unbound.
const BUILTIN: &[(u16, KeyMapping)] = &[
    (0x01, plain(keysym::F1)),     // SMART INSRT
    (0x02, plain(keysym::F2)),     // APPND
    (0x03, plain(keysym::F3)),     // RIPL O/WR
    (0x04, plain(keysym::F4)),     // CLOSE UP
    (0x05, plain(keysym::F5)),     // PLACE ON TOP
    (0x06, plain(keysym::F6)),     // SRC O/WR
    (0x07, plain(keysym::F7)),     // IN
    (0x08, plain(keysym::F8)),     // OUT
    (0x09, plain(keysym::F9)),     // TRIM IN
    (0x0a, plain(keysym::UP)),     // TRIM OUT
    (0x0b, plain(keysym::F11)),    // ROLL
    (0x0c, shifted(keysym::LEFT)), // SLIP SRC
    (0x0d, plain(keysym::DOWN)),   // SLIP DEST
    (0x0e, shifted(keysym::RIGHT)), // TRANS DUR
    (0x0f, plain(keysym::F15)),    // CUT
    (0x10, plain(keysym::F16)),    // DIS
    (0x11, plain(keysym::F17)),    // SMTH CUT
    (0x1a, plain(keysym::F18)),    // SOURCE
    (0x1b, plain(keysym::F19)),    // TIMELINE
    (0x1c, plain(keysym::F20)),    // SHTL
    (0x1d, plain(keysym::F21)),    // JOG
    (0x1e, plain(keysym::F22)),    // SCRL
    (0x1f, shifted(keysym::F2)),   // SYNC BIN
    (0x22, shifted(keysym::F5)),   // TRANS
    (0x25, shifted(keysym::F20)),  // VIDEO ONLY
    (0x26, shifted(keysym::F21)),  // AUDIO ONLY
    (0x2b, shifted(keysym::F8)),   // RIPL DEL
    (0x2c, shifted(keysym::F3)),   // AUDIO LEVEL
    (0x2d, shifted(keysym::F4)),   // FULL VIEW
    (0x2e, shifted(keysym::F7)),   // SNAP
    (0x2f, shifted(keysym::F6)),   // SPLIT
    (0x31, shifted(keysym::F1)),   // ESC
    (0x33, shifted(keysym::F10)),  // CAM1
    (0x34, shifted(keysym::F11)),  // CAM2
    (0x35, shifted(keysym::F12)),  // CAM3
    (0x36, shifted(keysym::F13)),  // CAM4
    (0x37, shifted(keysym::F14)),  // CAM5
    (0x38, shifted(keysym::F15)),  // CAM6
    (0x39, shifted(keysym::F16)),  // CAM7
    (0x3a, shifted(keysym::F17)),  // CAM8
    (0x3b, shifted(keysym::F18)),  // CAM9
    (0x3c, shifted(keysym::F22)),  // STOP/PLAY
];

/// Errors from keymap override loading
#[derive(Debug, Error)]
pub enum KeymapError {
    #[error("failed to read keymap file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse keymap file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("unknown device key {0:?}")]
    UnknownKey(String),
}

/// One `[[key]]` entry of an override file.
#[derive(Debug, Deserialize)]
struct KeyOverride {
    /// Panel label ("CAM1") or numeric device code ("0x33" / "51")
    key: String,
    /// X11 keysym to bind
    sym: u32,
    #[serde(default)]
    shift: bool,
}

#[derive(Debug, Deserialize)]
struct KeymapFile {
    #[serde(default)]
    key: Vec<KeyOverride>,
}

/// Key lookup table: the built-in layout plus optional user overrides.
pub struct KeyMap {
    entries: HashMap<u16, KeyMapping>,
}

impl KeyMap {
    /// The stock layout.
    pub fn builtin() -> Self {
        Self {
            entries: BUILTIN.iter().copied().collect(),
        }
    }

    /// The stock layout with overrides from a TOML file applied on top.
    pub fn with_overrides(path: &Path) -> Result<Self, KeymapError> {
        let mut keymap = Self::builtin();
        keymap.apply_overrides(&fs::read_to_string(path)?)?;
        Ok(keymap)
    }

    /// Parse override entries and merge them over the current table.
    fn apply_overrides(&mut self, text: &str) -> Result<(), KeymapError> {
        let file: KeymapFile = toml::from_str(text)?;
        for entry in file.key {
            let code = key_code_from_name(&entry.key)
                .or_else(|| parse_key_code(&entry.key))
                .ok_or_else(|| KeymapError::UnknownKey(entry.key.clone()))?;
            self.entries.insert(
                code,
                KeyMapping {
                    sym: entry.sym,
                    shift: entry.shift,
                },
            );
        }
        Ok(())
    }

    /// Host binding for a device key, if one exists.
    pub fn lookup(&self, code: u16) -> Option<KeyMapping> {
        self.entries.get(&code).copied()
    }

    /// All bindings (diagnostics and tests).
    pub fn entries(&self) -> impl Iterator<Item = (u16, KeyMapping)> + '_ {
        self.entries.iter().map(|(&code, &mapping)| (code, mapping))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn parse_key_code(text: &str) -> Option<u16> {
    if let Some(hex) = text.strip_prefix("0x") {
        u16::from_str_radix(hex, 16).ok()
    } else {
        text.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_lookup() {
        let keymap = KeyMap::builtin();
        assert_eq!(keymap.lookup(0x33), Some(shifted(keysym::F10))); // CAM1
        assert_eq!(keymap.lookup(0x0a), Some(plain(keysym::UP))); // TRIM OUT
        assert_eq!(keymap.lookup(0x1d), Some(plain(keysym::F21))); // JOG
    }

    #[test]
    fn unmapped_keys_are_absent() {
        let keymap = KeyMap::builtin();
        assert_eq!(keymap.lookup(0x30), None); // LIVE O/WR has no stock binding
        assert_eq!(keymap.lookup(0xffff), None);
    }

    #[test]
    fn key_names_round_trip() {
        for &(code, _) in BUILTIN {
            let name = key_name(code);
            assert_ne!(name, "?", "missing name for {code:#04x}");
            assert_eq!(key_code_from_name(name), Some(code));
        }
    }

    #[test]
    fn overrides_replace_and_extend() {
        let mut keymap = KeyMap::builtin();
        keymap
            .apply_overrides(
                r#"
                [[key]]
                key = "CAM1"
                sym = 0xffc9
                shift = false

                [[key]]
                key = "0x30"
                sym = 0xffd4
                shift = true
                "#,
            )
            .unwrap();

        assert_eq!(keymap.lookup(0x33), Some(plain(keysym::F12)));
        assert_eq!(keymap.lookup(0x30), Some(shifted(keysym::F23)));
    }

    #[test]
    fn unknown_override_key_is_rejected() {
        let mut keymap = KeyMap::builtin();
        let err = keymap
            .apply_overrides("[[key]]\nkey = \"NOPE\"\nsym = 1\n")
            .unwrap_err();
        assert!(matches!(err, KeymapError::UnknownKey(_)));
    }
}

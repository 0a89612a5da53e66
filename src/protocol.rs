//! Speed Editor wire protocol
//!
//! Report layouts and vendor commands for the control surface. All
//! multi-byte integers on the wire are little-endian.

use std::collections::BTreeSet;

/// Device identification
pub const VENDOR_ID: u16 = 0x1edb;
pub const PRODUCT_ID: u16 = 0xda0e;

/// Feature report ID carrying the authentication handshake
pub const AUTH_REPORT_ID: u8 = 6;
/// Authentication feature reports are 10 bytes including the report ID
pub const AUTH_REPORT_LEN: usize = 10;

/// Number of key slots in a key report
pub const KEY_SLOTS: usize = 6;

/// Input report types (first byte of an interrupt transfer)
pub mod report {
    /// Jog wheel motion: mode at byte 1, signed delta at bytes 2-5
    pub const WHEEL: u8 = 3;
    /// Key state: six u16 key slots at bytes 1-12
    pub const KEYS: u8 = 4;

    pub fn name(t: u8) -> &'static str {
        match t {
            WHEEL => "WHEEL",
            KEYS => "KEYS",
            _ => "UNKNOWN",
        }
    }
}

/// Jog wheel operating modes (byte 1 of a wheel report)
pub mod jog_mode {
    pub const JOG: u8 = 0;
    pub const SHTL: u8 = 1;
    pub const SCRL: u8 = 2;

    pub fn name(mode: u8) -> &'static str {
        match mode {
            JOG => "JOG",
            SHTL => "SHTL",
            SCRL => "SCRL",
            _ => "?",
        }
    }
}

// ---------------------------------------------------------------------------
// Report codec: fixed-width little-endian fields at explicit offsets
// ---------------------------------------------------------------------------

/// Read a u16 at `offset`. The caller guarantees the buffer is long enough.
pub fn read_u16(buf: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([buf[offset], buf[offset + 1]])
}

/// Read an i32 at `offset`.
pub fn read_i32(buf: &[u8], offset: usize) -> i32 {
    i32::from_le_bytes([buf[offset], buf[offset + 1], buf[offset + 2], buf[offset + 3]])
}

/// Read a u64 at `offset`.
pub fn read_u64(buf: &[u8], offset: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[offset..offset + 8]);
    u64::from_le_bytes(bytes)
}

/// Write a u64 at `offset`.
pub fn write_u64(buf: &mut [u8], offset: usize, value: u64) {
    buf[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
}

/// Decode the six key slots of a key report into the set of held keys.
/// Empty slots read as zero and are dropped.
pub fn decode_key_slots(report: &[u8]) -> BTreeSet<u16> {
    let mut keys = BTreeSet::new();
    for slot in 0..KEY_SLOTS {
        let code = read_u16(report, 1 + slot * 2);
        if code != 0 {
            keys.insert(code);
        }
    }
    keys
}

/// Signed jog delta of a wheel report.
pub fn wheel_delta(report: &[u8]) -> i32 {
    read_i32(report, 2)
}

/// Jog mode byte of a wheel report.
pub fn wheel_mode(report: &[u8]) -> u8 {
    report[1]
}

// ---------------------------------------------------------------------------
// Vendor commands (opaque payloads, captured from the stock software)
// ---------------------------------------------------------------------------

/// Output report enabling jog and key reporting after authentication
pub const JOG_ENABLE: [u8; 7] = [3, 0, 0, 0, 0, 0, 0];

/// All key backlight LEDs lit
pub const LED_ALL: u32 = 0xffff_ffff;

/// Output report setting the key backlight LEDs from a bitmask.
pub fn led_command(mask: u32) -> [u8; 5] {
    let mut buf = [2, 0, 0, 0, 0];
    buf[1..5].copy_from_slice(&mask.to_le_bytes());
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn u64_round_trip() {
        let mut buf = [0u8; 10];
        write_u64(&mut buf, 2, 0x0000_0000_0000_0001);
        assert_eq!(&buf[2..10], &[1, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(read_u64(&buf, 2), 0x0000_0000_0000_0001);

        write_u64(&mut buf, 2, 0x0102_0304_0506_0708);
        assert_eq!(&buf[2..10], &[8, 7, 6, 5, 4, 3, 2, 1]);
        assert_eq!(read_u64(&buf, 2), 0x0102_0304_0506_0708);
    }

    #[test]
    fn key_slots_drop_zeros() {
        // One key in slot 0, one in slot 3, rest empty
        let report = [4, 0x33, 0, 0, 0, 0, 0, 0x0a, 0, 0, 0, 0, 0, 0];
        let keys = decode_key_slots(&report);
        assert_eq!(keys.into_iter().collect::<Vec<_>>(), vec![0x0a, 0x33]);
    }

    #[test]
    fn key_slots_dedup() {
        let report = [4, 0x01, 0, 0x01, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0];
        assert_eq!(decode_key_slots(&report).len(), 1);
    }

    #[test]
    fn wheel_delta_is_signed() {
        let mut report = [0u8; 14];
        report[0] = report::WHEEL;
        report[1] = jog_mode::SHTL;
        report[2..6].copy_from_slice(&(-30000i32).to_le_bytes());
        assert_eq!(wheel_delta(&report), -30000);
        assert_eq!(wheel_mode(&report), jog_mode::SHTL);
    }

    #[test]
    fn led_command_layout() {
        assert_eq!(led_command(LED_ALL), [2, 0xff, 0xff, 0xff, 0xff]);
        assert_eq!(led_command(0x0000_0001), [2, 1, 0, 0, 0]);
    }
}

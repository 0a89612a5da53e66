//! Key-state tracking
//!
//! The surface reports the complete set of held keys in every key report;
//! the tracker diffs consecutive reports into press/release events and
//! brackets device-key activity in the modifier chord so the mapped host
//! bindings stay out of the way of ordinary typing.

use std::collections::BTreeSet;

use tracing::debug;

use crate::keymap::{self, KeyMap};
use crate::sink::{InputSink, SinkError};

/// Tracks which device keys are currently held.
#[derive(Debug, Default)]
pub struct KeyStateTracker {
    held: BTreeSet<u16>,
}

impl KeyStateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Currently held device keys.
    pub fn held(&self) -> &BTreeSet<u16> {
        &self.held
    }

    /// Apply a freshly decoded key set.
    ///
    /// Emits, in order: the modifier chord (down) when the first key goes
    /// down, presses for keys new in this report, releases for keys gone
    /// from it, and the chord (up) when the last key comes up. Both diffs
    /// iterate in sorted key order, so emission is deterministic for a
    /// given input. Keys without a binding are skipped.
    pub fn update(
        &mut self,
        new: BTreeSet<u16>,
        keymap: &KeyMap,
        sink: &mut dyn InputSink,
    ) -> Result<(), SinkError> {
        let pressed: Vec<u16> = new.difference(&self.held).copied().collect();
        let released: Vec<u16> = self.held.difference(&new).copied().collect();

        if self.held.is_empty() && !new.is_empty() {
            sink.set_modifiers(true)?;
        }
        for code in pressed {
            match keymap.lookup(code) {
                Some(mapping) => sink.press_key(mapping)?,
                None => debug!(
                    "Ignoring unmapped key {:#04x} ({})",
                    code,
                    keymap::key_name(code)
                ),
            }
        }
        for code in released {
            if let Some(mapping) = keymap.lookup(code) {
                sink.release_key(mapping)?;
            }
        }
        if !self.held.is_empty() && new.is_empty() {
            sink.set_modifiers(false)?;
        }
        self.held = new;
        Ok(())
    }

    /// Release everything currently held, chord included. Called on every
    /// driver exit path so no synthetic key stays stuck down.
    pub fn release_all(
        &mut self,
        keymap: &KeyMap,
        sink: &mut dyn InputSink,
    ) -> Result<(), SinkError> {
        if self.held.is_empty() {
            return Ok(());
        }
        for code in std::mem::take(&mut self.held) {
            if let Some(mapping) = keymap.lookup(code) {
                sink.release_key(mapping)?;
            }
        }
        sink.set_modifiers(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keymap::KeyMapping;
    use crate::sink::ScrollDirection;

    #[derive(Debug, PartialEq, Eq, Clone, Copy)]
    enum Event {
        Press(u32, bool),
        Release(u32, bool),
        Modifiers(bool),
    }

    #[derive(Default)]
    struct RecordingSink {
        events: Vec<Event>,
    }

    impl InputSink for RecordingSink {
        fn press_key(&mut self, mapping: KeyMapping) -> Result<(), SinkError> {
            self.events.push(Event::Press(mapping.sym, mapping.shift));
            Ok(())
        }

        fn release_key(&mut self, mapping: KeyMapping) -> Result<(), SinkError> {
            self.events.push(Event::Release(mapping.sym, mapping.shift));
            Ok(())
        }

        fn set_modifiers(&mut self, down: bool) -> Result<(), SinkError> {
            self.events.push(Event::Modifiers(down));
            Ok(())
        }

        fn scroll(&mut self, _direction: ScrollDirection) -> Result<(), SinkError> {
            Ok(())
        }
    }

    fn keys(codes: &[u16]) -> BTreeSet<u16> {
        codes.iter().copied().collect()
    }

    use crate::keymap::keysym;

    #[test]
    fn press_then_release_brackets_with_modifiers() {
        let keymap = KeyMap::builtin();
        let mut sink = RecordingSink::default();
        let mut tracker = KeyStateTracker::new();

        // CAM1 (0x33) goes down, then all keys come up
        tracker.update(keys(&[0x33]), &keymap, &mut sink).unwrap();
        tracker.update(keys(&[]), &keymap, &mut sink).unwrap();

        assert_eq!(
            sink.events,
            vec![
                Event::Modifiers(true),
                Event::Press(keysym::F10, true),
                Event::Release(keysym::F10, true),
                Event::Modifiers(false),
            ]
        );
        assert!(tracker.held().is_empty());
    }

    #[test]
    fn overlapping_reports_diff_correctly() {
        let keymap = KeyMap::builtin();
        let mut sink = RecordingSink::default();
        let mut tracker = KeyStateTracker::new();

        tracker
            .update(keys(&[0x07, 0x08]), &keymap, &mut sink)
            .unwrap();
        sink.events.clear();

        // 0x07 released, 0x09 pressed, 0x08 still held: no chord events
        tracker
            .update(keys(&[0x08, 0x09]), &keymap, &mut sink)
            .unwrap();

        assert_eq!(
            sink.events,
            vec![
                Event::Press(keysym::F9, false),   // 0x09 TRIM IN
                Event::Release(keysym::F7, false), // 0x07 IN
            ]
        );
        assert_eq!(tracker.held(), &keys(&[0x08, 0x09]));
    }

    #[test]
    fn update_is_idempotent() {
        let keymap = KeyMap::builtin();
        let mut sink = RecordingSink::default();
        let mut tracker = KeyStateTracker::new();

        tracker.update(keys(&[0x01]), &keymap, &mut sink).unwrap();
        let after_first = sink.events.len();
        tracker.update(keys(&[0x01]), &keymap, &mut sink).unwrap();
        assert_eq!(sink.events.len(), after_first);
    }

    #[test]
    fn unmapped_keys_are_silently_ignored() {
        let keymap = KeyMap::builtin();
        let mut sink = RecordingSink::default();
        let mut tracker = KeyStateTracker::new();

        // 0x30 (LIVE O/WR) has no stock binding; chord still brackets
        tracker.update(keys(&[0x30]), &keymap, &mut sink).unwrap();
        tracker.update(keys(&[]), &keymap, &mut sink).unwrap();

        assert_eq!(
            sink.events,
            vec![Event::Modifiers(true), Event::Modifiers(false)]
        );
    }

    #[test]
    fn multi_key_emission_is_sorted() {
        let keymap = KeyMap::builtin();
        let mut sink = RecordingSink::default();
        let mut tracker = KeyStateTracker::new();

        tracker
            .update(keys(&[0x08, 0x01, 0x05]), &keymap, &mut sink)
            .unwrap();

        assert_eq!(
            sink.events,
            vec![
                Event::Modifiers(true),
                Event::Press(keysym::F1, false),
                Event::Press(keysym::F5, false),
                Event::Press(keysym::F8, false),
            ]
        );
    }

    #[test]
    fn release_all_clears_held_state() {
        let keymap = KeyMap::builtin();
        let mut sink = RecordingSink::default();
        let mut tracker = KeyStateTracker::new();

        tracker
            .update(keys(&[0x01, 0x02]), &keymap, &mut sink)
            .unwrap();
        sink.events.clear();

        tracker.release_all(&keymap, &mut sink).unwrap();
        assert_eq!(
            sink.events,
            vec![
                Event::Release(keysym::F1, false),
                Event::Release(keysym::F2, false),
                Event::Modifiers(false),
            ]
        );
        assert!(tracker.held().is_empty());

        // Second call is a no-op
        sink.events.clear();
        tracker.release_all(&keymap, &mut sink).unwrap();
        assert!(sink.events.is_empty());
    }
}

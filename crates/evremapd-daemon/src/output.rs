//! Output state tracking
//!
//! [`Output`] is the single source of truth for what is currently down on
//! one sink. Every write goes through it, so `active_keys` is the sink's
//! real state rather than a cache, and `activated_keys` (keys held down by a
//! remap, not by pass-through) can never outlive the down-state that backs
//! it. One instance per sink identity, shared between the session loop and
//! its repeat tasks.

use std::collections::HashSet;
use std::sync::Arc;

use evdev::EventType;
use tokio::sync::Mutex;

use crate::error::RemapError;
use crate::sink::EventSink;

pub type SharedOutput = Arc<Mutex<Output>>;

pub struct Output {
    sink: Box<dyn EventSink>,
    /// Keys currently down on the sink.
    active_keys: HashSet<u16>,
    /// Subset of `active_keys` held down by a remap action.
    activated_keys: HashSet<u16>,
}

impl Output {
    pub fn new(sink: Box<dyn EventSink>) -> Self {
        Self {
            sink,
            active_keys: HashSet::new(),
            activated_keys: HashSet::new(),
        }
    }

    pub fn shared(sink: Box<dyn EventSink>) -> SharedOutput {
        Arc::new(Mutex::new(Self::new(sink)))
    }

    pub fn active_keys(&self) -> &HashSet<u16> {
        &self.active_keys
    }

    pub fn activated_keys(&self) -> &HashSet<u16> {
        &self.activated_keys
    }

    /// Write one event, recording key down/up state. Releasing a key always
    /// clears its activation mark, whichever path wrote the release.
    pub fn write(&mut self, event_type: EventType, code: u16, value: i32) -> Result<(), RemapError> {
        if event_type == EventType::KEY {
            match value {
                0 => {
                    self.active_keys.remove(&code);
                    self.activated_keys.remove(&code);
                }
                1 => {
                    self.active_keys.insert(code);
                }
                _ => {}
            }
        }
        self.sink
            .write(event_type, code, value)
            .map_err(RemapError::SinkWrite)
    }

    /// Emit the batch-flush marker.
    pub fn flush(&mut self) -> Result<(), RemapError> {
        self.sink.flush().map_err(RemapError::SinkWrite)
    }

    /// Write a mapped value sequence with down/up suppression.
    ///
    /// For key outputs: a down is suppressed when the code is already
    /// active (otherwise it is written and marked activated); an up is
    /// suppressed unless the code is active and either was activated by a
    /// remap or is the triggering key itself. Non-binary values, and any
    /// non-key output type, write unconditionally. Repeat-task ticks use
    /// this same path so bookkeeping never diverges.
    pub fn emit_mapped(
        &mut self,
        event_type: EventType,
        code: u16,
        values: &[i32],
        trigger_code: u16,
    ) -> Result<(), RemapError> {
        for &value in values {
            if event_type != EventType::KEY {
                self.write(event_type, code, value)?;
                continue;
            }
            match value {
                1 => {
                    if !self.active_keys.contains(&code) {
                        self.activated_keys.insert(code);
                        self.write(event_type, code, 1)?;
                    }
                }
                0 => {
                    if self.active_keys.contains(&code)
                        && (self.activated_keys.contains(&code) || code == trigger_code)
                    {
                        self.write(event_type, code, 0)?;
                    }
                }
                _ => self.write(event_type, code, value)?,
            }
        }
        Ok(())
    }

    /// Release keys left over from a previous remap before a new one
    /// activates: combo input keys and previously activated outputs that
    /// are still down, except the triggering key and anything the new
    /// mapping is about to hold itself.
    pub fn release_overlapping(
        &mut self,
        combo_codes: &[u16],
        trigger_code: u16,
        new_outputs: &HashSet<u16>,
    ) -> Result<(), RemapError> {
        let mut to_release: Vec<u16> = combo_codes
            .iter()
            .copied()
            .chain(self.activated_keys.iter().copied())
            .filter(|code| {
                *code != trigger_code
                    && !new_outputs.contains(code)
                    && self.active_keys.contains(code)
            })
            .collect();
        to_release.sort_unstable();
        to_release.dedup();

        for code in to_release {
            self.write(EventType::KEY, code, 0)?;
        }
        Ok(())
    }

    /// Re-press input keys that are logically down but absent from the
    /// sink, except the event currently being forwarded. Keeps a partially
    /// consumed combo press from losing its modifier keys.
    pub fn press_missing(
        &mut self,
        input_active: &HashSet<u16>,
        current_code: u16,
    ) -> Result<(), RemapError> {
        let mut missing: Vec<u16> = input_active
            .iter()
            .copied()
            .filter(|code| *code != current_code && !self.active_keys.contains(code))
            .collect();
        missing.sort_unstable();

        for code in missing {
            self.write(EventType::KEY, code, 1)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::testing::MemorySink;

    fn output() -> (Output, MemorySink) {
        let sink = MemorySink::new();
        (Output::new(Box::new(sink.clone())), sink)
    }

    #[test]
    fn active_keys_mirror_writes_exactly() {
        let (mut out, _sink) = output();
        out.write(EventType::KEY, 30, 1).unwrap();
        out.write(EventType::KEY, 31, 1).unwrap();
        out.write(EventType::KEY, 30, 0).unwrap();
        let expected: HashSet<u16> = [31].into_iter().collect();
        assert_eq!(out.active_keys(), &expected);

        // Non-key and repeat values leave the sets alone
        out.write(EventType::RELATIVE, 8, 1).unwrap();
        out.write(EventType::KEY, 31, 2).unwrap();
        assert_eq!(out.active_keys(), &expected);
    }

    #[test]
    fn redundant_down_is_suppressed() {
        let (mut out, sink) = output();
        out.write(EventType::KEY, 30, 1).unwrap();
        out.emit_mapped(EventType::KEY, 30, &[1], 99).unwrap();
        assert_eq!(sink.key_events(), vec![(30, 1)]);
        // Pass-through down: not marked as activated
        assert!(out.activated_keys().is_empty());
    }

    #[test]
    fn up_requires_activation_or_trigger() {
        let (mut out, sink) = output();
        // Not active at all: suppressed
        out.emit_mapped(EventType::KEY, 30, &[0], 30).unwrap();
        assert!(sink.key_events().is_empty());

        // Active via pass-through but not activated, and not the trigger:
        // suppressed
        out.write(EventType::KEY, 30, 1).unwrap();
        out.emit_mapped(EventType::KEY, 30, &[0], 99).unwrap();
        assert_eq!(sink.key_events(), vec![(30, 1)]);

        // Same but it is the triggering key: released
        out.emit_mapped(EventType::KEY, 30, &[0], 30).unwrap();
        assert_eq!(sink.key_events(), vec![(30, 1), (30, 0)]);
    }

    #[test]
    fn activated_up_is_written_and_unmarked() {
        let (mut out, sink) = output();
        out.emit_mapped(EventType::KEY, 30, &[1], 99).unwrap();
        assert!(out.activated_keys().contains(&30));
        out.emit_mapped(EventType::KEY, 30, &[0], 99).unwrap();
        assert_eq!(sink.key_events(), vec![(30, 1), (30, 0)]);
        assert!(out.activated_keys().is_empty());
    }

    #[test]
    fn non_binary_values_write_unconditionally() {
        let (mut out, sink) = output();
        out.emit_mapped(EventType::KEY, 30, &[2, 2], 30).unwrap();
        assert_eq!(sink.key_events(), vec![(30, 2), (30, 2)]);
        assert!(out.active_keys().is_empty());
    }

    #[test]
    fn activated_is_always_subset_of_active() {
        let (mut out, _sink) = output();
        out.emit_mapped(EventType::KEY, 30, &[1], 99).unwrap();
        out.emit_mapped(EventType::KEY, 31, &[1], 99).unwrap();
        // Pass-through release of an activated key clears its mark too
        out.write(EventType::KEY, 30, 0).unwrap();
        assert!(out.activated_keys().is_subset(out.active_keys()));
        let expected: HashSet<u16> = [31].into_iter().collect();
        assert_eq!(out.activated_keys(), &expected);
    }

    #[test]
    fn release_overlapping_spares_trigger_and_new_outputs() {
        let (mut out, sink) = output();
        // Keys down: 10 (pass-through), 20 and 21 (activated)
        out.write(EventType::KEY, 10, 1).unwrap();
        out.emit_mapped(EventType::KEY, 20, &[1], 99).unwrap();
        out.emit_mapped(EventType::KEY, 21, &[1], 99).unwrap();

        let new_outputs: HashSet<u16> = [21].into_iter().collect();
        out.release_overlapping(&[10, 11], 11, &new_outputs).unwrap();

        // 10 released (combo member), 20 released (stale activation),
        // 21 kept (re-used by the new mapping), 11 spared (trigger, and
        // not down anyway)
        assert_eq!(
            sink.key_events(),
            vec![(10, 1), (20, 1), (21, 1), (10, 0), (20, 0)]
        );
        let expected: HashSet<u16> = [21].into_iter().collect();
        assert_eq!(out.active_keys(), &expected);
    }

    #[test]
    fn press_missing_skips_current_event_and_held_keys() {
        let (mut out, sink) = output();
        out.write(EventType::KEY, 10, 1).unwrap();

        let input_active: HashSet<u16> = [10, 11, 12].into_iter().collect();
        out.press_missing(&input_active, 12).unwrap();

        // 10 already down, 12 is the event being forwarded: only 11 synthesized
        assert_eq!(sink.key_events(), vec![(10, 1), (11, 1)]);
    }
}

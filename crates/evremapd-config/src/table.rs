//! Resolved remap table
//!
//! The immutable, fully resolved form of the configuration. Built once at
//! startup and shared read-only with every session for its lifetime.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use evdev::EventType;

/// Fully resolved configuration: one entry per configured device.
#[derive(Debug)]
pub struct Config {
    pub devices: Vec<ResolvedDevice>,
}

/// A configured device with its remap table.
#[derive(Debug)]
pub struct ResolvedDevice {
    pub input_name: Option<String>,
    pub input_phys: Option<String>,
    pub input_path: Option<PathBuf>,
    pub output_name: String,
    pub table: RemapTable,
}

impl ResolvedDevice {
    /// Human-readable identifier for log messages.
    pub fn describe(&self) -> String {
        self.input_name
            .clone()
            .or_else(|| self.input_phys.clone())
            .or_else(|| self.input_path.as_ref().map(|p| p.display().to_string()))
            .unwrap_or_else(|| "<unidentified>".to_string())
    }
}

/// How a single output mapping is emitted.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionMode {
    /// Write immediately, with down/up suppression bookkeeping.
    Immediate,
    /// Spawn a timer that rewrites the value sequence every `rate`,
    /// `count` times, or until cancelled if `count == 0`.
    Repeat { rate: Duration, count: u32 },
    /// Forward only every `count`-th activation.
    Delay { count: u32 },
}

/// One resolved output mapping of a combo.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionMapping {
    /// Output event code.
    pub code: u16,
    /// Output event type; `None` means keep the source event's type.
    pub event_type: Option<EventType>,
    /// Output value sequence; `None` means pass the source value through.
    pub values: Option<Vec<i32>>,
    pub mode: ActionMode,
}

impl ActionMapping {
    /// The event type this mapping emits for a source event of `source_type`.
    pub fn output_type(&self, source_type: EventType) -> EventType {
        self.event_type.unwrap_or(source_type)
    }
}

/// A declared combo: all of `codes` (plus the focused window's class, when
/// `window_class` is set) must be down for the rule to match.
#[derive(Debug, Clone, PartialEq)]
pub struct ComboRule {
    /// Ordered, unique input key codes.
    pub codes: Vec<u16>,
    /// Optional window-class qualifier.
    pub window_class: Option<String>,
    pub actions: Vec<ActionMapping>,
}

impl ComboRule {
    /// Member count used for longest-match selection. The window class
    /// counts as one member, so a class-qualified combo beats an otherwise
    /// identical unqualified one.
    pub fn weight(&self) -> usize {
        self.codes.len() + usize::from(self.window_class.is_some())
    }

    /// True if every key of this combo is in the candidate set and the
    /// window-class qualifier (if any) matches the fetched label.
    pub fn matches(&self, candidate: &HashSet<u16>, label: Option<&str>) -> bool {
        if !self.codes.iter().all(|c| candidate.contains(c)) {
            return false;
        }
        match &self.window_class {
            Some(class) => label == Some(class.as_str()),
            None => true,
        }
    }

    pub fn contains_code(&self, code: u16) -> bool {
        self.codes.contains(&code)
    }
}

/// The remap table for one device.
///
/// Rules are stored sorted by descending [`ComboRule::weight`]; the sort is
/// stable, so equally long combos keep declaration order and the first
/// declared one wins a tie. A rule's index in the sorted table is its stable
/// identity for repeat/delay bookkeeping.
#[derive(Debug, Default)]
pub struct RemapTable {
    rules: Vec<ComboRule>,
}

impl RemapTable {
    pub fn new(mut rules: Vec<ComboRule>) -> Self {
        rules.sort_by(|a, b| b.weight().cmp(&a.weight()));
        Self { rules }
    }

    pub fn rules(&self) -> &[ComboRule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Cost-control gate: true if any rule's numeric codes are a subset of
    /// the candidate set. Only then is a window-class lookup worth paying
    /// for.
    pub fn any_codes_subset_of(&self, candidate: &HashSet<u16>) -> bool {
        self.rules
            .iter()
            .any(|rule| rule.codes.iter().all(|c| candidate.contains(c)))
    }

    /// All output codes that are emitted as EV_KEY events. The sink's key
    /// capability set is the input device's native keys union these, so
    /// codes absent from the physical device can still be written.
    pub fn output_key_codes(&self) -> HashSet<u16> {
        self.rules
            .iter()
            .flat_map(|rule| rule.actions.iter())
            .filter(|action| action.event_type.map_or(true, |t| t == EventType::KEY))
            .map(|action| action.code)
            .collect()
    }

    /// Output codes emitted with an explicit EV_REL type override.
    pub fn output_rel_codes(&self) -> HashSet<u16> {
        self.rules
            .iter()
            .flat_map(|rule| rule.actions.iter())
            .filter(|action| action.event_type == Some(EventType::RELATIVE))
            .map(|action| action.code)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(codes: &[u16], class: Option<&str>) -> ComboRule {
        ComboRule {
            codes: codes.to_vec(),
            window_class: class.map(String::from),
            actions: vec![ActionMapping {
                code: 30,
                event_type: None,
                values: None,
                mode: ActionMode::Immediate,
            }],
        }
    }

    #[test]
    fn table_sorts_by_descending_weight() {
        let table = RemapTable::new(vec![
            rule(&[1], None),
            rule(&[1, 2, 3], None),
            rule(&[1, 2], None),
        ]);
        let weights: Vec<usize> = table.rules().iter().map(|r| r.weight()).collect();
        assert_eq!(weights, vec![3, 2, 1]);
    }

    #[test]
    fn equal_weight_keeps_declaration_order() {
        let table = RemapTable::new(vec![
            rule(&[1, 2], None),
            rule(&[3, 4], None),
            rule(&[5], Some("term")),
        ]);
        // All three have weight 2; order must be exactly as declared.
        assert_eq!(table.rules()[0].codes, vec![1, 2]);
        assert_eq!(table.rules()[1].codes, vec![3, 4]);
        assert_eq!(table.rules()[2].codes, vec![5]);
    }

    #[test]
    fn window_class_counts_as_a_member() {
        assert_eq!(rule(&[1], Some("term")).weight(), 2);
        assert_eq!(rule(&[1], None).weight(), 1);
    }

    #[test]
    fn class_qualified_rule_needs_matching_label() {
        let r = rule(&[1], Some("term"));
        let candidate: HashSet<u16> = [1].into_iter().collect();
        assert!(r.matches(&candidate, Some("term")));
        assert!(!r.matches(&candidate, Some("browser")));
        assert!(!r.matches(&candidate, None));
    }

    #[test]
    fn subset_gate_ignores_window_class() {
        let table = RemapTable::new(vec![rule(&[1, 2], Some("term"))]);
        let candidate: HashSet<u16> = [1, 2, 9].into_iter().collect();
        assert!(table.any_codes_subset_of(&candidate));
        let partial: HashSet<u16> = [1].into_iter().collect();
        assert!(!table.any_codes_subset_of(&partial));
    }

    #[test]
    fn output_key_codes_skip_rel_overrides() {
        let mut r = rule(&[1], None);
        r.actions.push(ActionMapping {
            code: 8,
            event_type: Some(EventType::RELATIVE),
            values: Some(vec![1]),
            mode: ActionMode::Immediate,
        });
        let table = RemapTable::new(vec![r]);
        assert!(table.output_key_codes().contains(&30));
        assert!(!table.output_key_codes().contains(&8));
        assert!(table.output_rel_codes().contains(&8));
    }
}

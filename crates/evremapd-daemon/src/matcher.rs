//! Combo matching
//!
//! The table is pre-sorted by descending member count with declaration
//! order as the stable secondary order, so the first rule whose key set is
//! a subset of the candidate set is the longest match, and an equal-length
//! tie deterministically goes to the first-declared combo.

use std::collections::HashSet;

use evremapd_config::{ComboRule, RemapTable};

/// Stable identity of a rule within its table, used to key repeat tasks and
/// delay counters.
pub type RuleId = usize;

/// Select the best-matching combo for the candidate key set and the fetched
/// window-class label, if any rule matches at all.
pub fn best_match<'a>(
    table: &'a RemapTable,
    candidate: &HashSet<u16>,
    label: Option<&str>,
) -> Option<(RuleId, &'a ComboRule)> {
    table
        .rules()
        .iter()
        .enumerate()
        .find(|(_, rule)| rule.matches(candidate, label))
}

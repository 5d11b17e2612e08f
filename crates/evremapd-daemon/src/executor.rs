//! Remap execution
//!
//! Applies a winning combo's ordered action mappings to the triggering
//! event: immediate writes through the suppression path, delay-counter
//! gating, and repeat-task scheduling. Owns the per-session delay counters
//! and the repeat task manager.

use std::collections::{HashMap, HashSet};

use evdev::InputEvent;
use evremapd_config::{ActionMode, ComboRule};
use tokio::sync::mpsc::UnboundedSender;

use crate::error::RemapError;
use crate::matcher::RuleId;
use crate::output::SharedOutput;
use crate::tasks::{RepeatTasks, RepeatTemplate};

pub struct Executor {
    /// Delay gate per combo: counts down on each activation, wrapping back
    /// to the configured count. Forwarding happens only while the counter
    /// sits at the count, so every count-th activation passes.
    delay_counters: HashMap<RuleId, u32>,
    tasks: RepeatTasks,
}

impl Executor {
    pub fn new(errors: UnboundedSender<RemapError>) -> Self {
        Self {
            delay_counters: HashMap::new(),
            tasks: RepeatTasks::new(errors),
        }
    }

    /// Apply one matched combo to the triggering event.
    pub async fn apply(
        &mut self,
        output: &SharedOutput,
        rule_id: RuleId,
        rule: &ComboRule,
        event: &InputEvent,
    ) -> Result<(), RemapError> {
        let key_down = event.value() == 1;
        let key_up = event.value() == 0;

        if key_down {
            // A new activation may supersede an overlapping remap that is
            // still holding keys; drop those before pressing anything.
            let new_outputs: HashSet<u16> = rule.actions.iter().map(|a| a.code).collect();
            output
                .lock()
                .await
                .release_overlapping(&rule.codes, event.code(), &new_outputs)?;
        }

        for action in &rule.actions {
            let out_type = action.output_type(event.event_type());
            match action.mode {
                ActionMode::Immediate => {
                    let values = action
                        .values
                        .clone()
                        .unwrap_or_else(|| vec![event.value()]);
                    output
                        .lock()
                        .await
                        .emit_mapped(out_type, action.code, &values, event.code())?;
                }
                ActionMode::Delay { count } => {
                    // Only clean downs and ups participate in the gate
                    if !key_down && !key_up {
                        return Ok(());
                    }
                    let counter = self.delay_counters.entry(rule_id).or_insert(count);
                    if key_down {
                        if *counter > 0 {
                            *counter -= 1;
                        }
                        if *counter == 0 {
                            *counter = count;
                        }
                    }
                    if *counter == count {
                        output
                            .lock()
                            .await
                            .write(out_type, action.code, event.value())?;
                    }
                }
                ActionMode::Repeat { rate, count } => {
                    // Only clean downs and ups touch the task; an
                    // auto-repeat value must not kill a live timer
                    if !key_down && !key_up {
                        return Ok(());
                    }
                    // Finite repeats trigger on downs only
                    if count > 0 && key_up {
                        return Ok(());
                    }
                    self.tasks.cancel(rule_id).await;
                    if key_down {
                        let values = action
                            .values
                            .clone()
                            .unwrap_or_else(|| vec![event.value()]);
                        self.tasks.spawn(
                            rule_id,
                            RepeatTemplate {
                                event_type: out_type,
                                code: action.code,
                                trigger_code: event.code(),
                                rate,
                                count,
                                values,
                            },
                            output.clone(),
                        );
                    }
                }
            }
        }
        Ok(())
    }

    /// Cancel all outstanding repeat tasks; called on session teardown.
    pub async fn shutdown(&mut self) {
        self.tasks.shutdown().await;
        self.delay_counters.clear();
    }
}

//! Repeat task lifecycle
//!
//! One cancellable timer task per combo, writing synthesized value cycles
//! through the shared output's suppression path. Replacing a combo's task
//! always awaits the old one first, so there are never two live timers for
//! the same combo.

use std::collections::HashMap;
use std::time::Duration;

use evdev::EventType;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

use crate::error::RemapError;
use crate::matcher::RuleId;
use crate::output::SharedOutput;

/// Bound on how long session teardown waits for in-flight tick writes.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

/// Everything a repeat task captures at spawn time.
#[derive(Debug, Clone)]
pub struct RepeatTemplate {
    pub event_type: EventType,
    pub code: u16,
    /// Input code that triggered the combo; governs up-suppression in ticks.
    pub trigger_code: u16,
    pub rate: Duration,
    /// Number of cycles; 0 repeats until cancelled.
    pub count: u32,
    pub values: Vec<i32>,
}

pub struct RepeatTasks {
    tasks: HashMap<RuleId, JoinHandle<()>>,
    errors: UnboundedSender<RemapError>,
}

impl RepeatTasks {
    pub fn new(errors: UnboundedSender<RemapError>) -> Self {
        Self {
            tasks: HashMap::new(),
            errors,
        }
    }

    /// Cancel the combo's task if one exists, awaiting its termination so
    /// no tick can land after this returns. A task that already completed
    /// on its own is indistinguishable here, and that is fine.
    pub async fn cancel(&mut self, rule_id: RuleId) {
        if let Some(handle) = self.tasks.remove(&rule_id) {
            handle.abort();
            match handle.await {
                Ok(()) => {}
                Err(err) if err.is_cancelled() => {}
                Err(err) => std::panic::resume_unwind(err.into_panic()),
            }
        }
    }

    /// Start a timer for the combo. Callers cancel first; spawning over a
    /// live task would orphan it.
    pub fn spawn(&mut self, rule_id: RuleId, template: RepeatTemplate, output: SharedOutput) {
        let errors = self.errors.clone();
        let handle = tokio::spawn(async move {
            if let Err(err) = run_repeat(template, output).await {
                // The session loop turns this into session termination
                let _ = errors.send(err);
            }
        });
        self.tasks.insert(rule_id, handle);
    }

    /// Abort everything at session teardown, waiting out in-flight writes
    /// up to the grace period.
    pub async fn shutdown(&mut self) {
        for (_, handle) in self.tasks.drain() {
            handle.abort();
            let _ = tokio::time::timeout(SHUTDOWN_GRACE, handle).await;
        }
    }
}

/// Write one full value cycle per tick, the first one a full `rate` after
/// activation, through the same suppression path as live events.
async fn run_repeat(template: RepeatTemplate, output: SharedOutput) -> Result<(), RemapError> {
    let mut remaining = template.count;
    loop {
        tokio::time::sleep(template.rate).await;
        {
            let mut out = output.lock().await;
            out.emit_mapped(
                template.event_type,
                template.code,
                &template.values,
                template.trigger_code,
            )?;
            out.flush()?;
        }
        if template.count > 0 {
            remaining -= 1;
            if remaining == 0 {
                return Ok(());
            }
        }
    }
}

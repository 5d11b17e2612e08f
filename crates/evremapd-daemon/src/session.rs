//! Device sessions
//!
//! One session per configured device: it owns the grabbed input stream,
//! the remap table, the shared output, and the repeat machinery, and runs
//! an event loop until shutdown or a fatal session error. Sessions are
//! fully independent; one going down never touches another.

use std::collections::HashSet;

use evdev::{EventStream, EventType, InputEvent};
use evremapd_config::RemapTable;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::context::WindowContext;
use crate::error::RemapError;
use crate::executor::Executor;
use crate::matcher::best_match;
use crate::output::SharedOutput;

/// Per-session remapping engine, separate from the I/O loop so it can be
/// driven directly by tests.
pub struct EventDispatcher {
    table: RemapTable,
    /// Keys currently down on the physical device.
    active_input_keys: HashSet<u16>,
    executor: Executor,
    output: SharedOutput,
    context: Box<dyn WindowContext>,
    /// False when no rule carries a window-class qualifier; lets the loop
    /// skip context lookups entirely for such tables.
    wants_context: bool,
}

impl EventDispatcher {
    pub fn new(
        table: RemapTable,
        output: SharedOutput,
        context: Box<dyn WindowContext>,
        errors: UnboundedSender<RemapError>,
    ) -> Self {
        let wants_context = table.rules().iter().any(|r| r.window_class.is_some());
        Self {
            table,
            active_input_keys: HashSet::new(),
            executor: Executor::new(errors),
            output,
            context,
            wants_context,
        }
    }

    /// Process one event from the grabbed device.
    ///
    /// Key events go through combo matching; SYN markers become sink
    /// flushes; everything else passes straight through.
    pub async fn handle_event(&mut self, event: InputEvent) -> Result<(), RemapError> {
        match event.event_type() {
            EventType::SYNCHRONIZATION => self.output.lock().await.flush(),
            EventType::KEY => self.handle_key(event).await,
            _ => self
                .output
                .lock()
                .await
                .write(event.event_type(), event.code(), event.value()),
        }
    }

    async fn handle_key(&mut self, event: InputEvent) -> Result<(), RemapError> {
        match event.value() {
            1 => {
                self.active_input_keys.insert(event.code());
            }
            0 => {
                self.active_input_keys.remove(&event.code());
            }
            _ => {}
        }

        // The candidate set always includes the current code, so the up of
        // a combo key still selects the combo that consumed its down.
        let mut candidate = self.active_input_keys.clone();
        candidate.insert(event.code());

        // Context lookups can be expensive; pay for one only when a rule
        // could actually use the answer.
        let label = if self.wants_context && self.table.any_codes_subset_of(&candidate) {
            self.context.focused_window_class()
        } else {
            None
        };

        // A winning combo only consumes events for its own keys: an
        // unrelated key pressed while a combo is held passes through.
        let matched = best_match(&self.table, &candidate, label.as_deref())
            .filter(|(_, rule)| rule.contains_code(event.code()));

        if let Some((rule_id, rule)) = matched {
            debug!(code = event.code(), value = event.value(), rule_id, "combo matched");
            self.executor
                .apply(&self.output, rule_id, rule, &event)
                .await
        } else {
            let mut out = self.output.lock().await;
            // A partially consumed combo may have released keys the user
            // still holds; restore them, but only ahead of a fresh down.
            if event.value() == 1 {
                out.press_missing(&self.active_input_keys, event.code())?;
            }
            out.write(EventType::KEY, event.code(), event.value())
        }
    }

    pub async fn shutdown(&mut self) {
        self.executor.shutdown().await;
    }
}

/// The I/O loop around an [`EventDispatcher`].
pub struct Session {
    name: String,
    stream: EventStream,
    dispatcher: EventDispatcher,
    errors: UnboundedReceiver<RemapError>,
    shutdown: watch::Receiver<bool>,
}

impl Session {
    pub fn new(
        name: String,
        stream: EventStream,
        table: RemapTable,
        output: SharedOutput,
        context: Box<dyn WindowContext>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            name,
            stream,
            dispatcher: EventDispatcher::new(table, output, context, tx),
            errors: rx,
            shutdown,
        }
    }

    /// Run until shutdown is signalled or the session fails. Repeat tasks
    /// are torn down on every exit path.
    pub async fn run(mut self) -> Result<(), RemapError> {
        info!(session = %self.name, "session started");
        let result = self.run_loop().await;
        self.dispatcher.shutdown().await;
        match &result {
            Ok(()) => info!(session = %self.name, "session stopped"),
            Err(err) => error!(session = %self.name, error = %err, "session terminated"),
        }
        result
    }

    async fn run_loop(&mut self) -> Result<(), RemapError> {
        loop {
            tokio::select! {
                _ = self.shutdown.changed() => return Ok(()),
                // A failed repeat tick is as fatal as a failed inline write
                Some(err) = self.errors.recv() => return Err(err),
                event = self.stream.next_event() => {
                    let event = event.map_err(RemapError::DeviceLost)?;
                    self.dispatcher.handle_event(event).await?;
                }
            }
        }
    }
}

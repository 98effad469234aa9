//! `tracing` layer that copies events into the active run's log table.
//!
//! The layer is installed once at startup; a [`RunLogSink`] is attached to
//! a store and run id while a run is in progress and detached afterwards.
//! Write failures are reported on stderr and otherwise swallowed.

use std::cell::Cell;
use std::fmt::Write as _;
use std::sync::{Arc, Mutex};

use safeguard_state::ModerationStore;
use safeguard_types::state::RunId;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

thread_local! {
    static IN_LAYER: Cell<bool> = const { Cell::new(false) };
}

#[derive(Clone)]
struct Attachment {
    store: Arc<dyn ModerationStore>,
    run_id: RunId,
}

/// Shared handle selecting where run logs go.
#[derive(Clone, Default)]
pub struct RunLogSink {
    target: Arc<Mutex<Option<Attachment>>>,
}

impl std::fmt::Debug for RunLogSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunLogSink")
            .field("run_id", &self.attached_run())
            .finish()
    }
}

impl RunLogSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Route subsequent events to `run_id` in `store`.
    pub fn attach(&self, store: Arc<dyn ModerationStore>, run_id: RunId) {
        if let Ok(mut target) = self.target.lock() {
            *target = Some(Attachment { store, run_id });
        }
    }

    pub fn detach(&self) {
        if let Ok(mut target) = self.target.lock() {
            *target = None;
        }
    }

    #[must_use]
    pub fn attached_run(&self) -> Option<RunId> {
        self.target
            .lock()
            .ok()
            .and_then(|target| target.as_ref().map(|a| a.run_id))
    }

    /// A layer forwarding events at `max_level` or more severe.
    #[must_use]
    pub fn layer(&self, max_level: Level) -> RunLogLayer {
        RunLogLayer {
            sink: self.clone(),
            max_level,
        }
    }

    fn write(&self, level: &str, message: &str) {
        let attachment = match self.target.lock() {
            Ok(target) => target.clone(),
            Err(_) => return,
        };
        let Some(Attachment { store, run_id }) = attachment else {
            return;
        };
        if let Err(e) = store.persist_log(run_id, level, message) {
            eprintln!("failed to persist log for run {run_id}: {e}");
        }
    }
}

/// See the module docs.
pub struct RunLogLayer {
    sink: RunLogSink,
    max_level: Level,
}

impl<S: Subscriber> Layer<S> for RunLogLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let level = *event.metadata().level();
        if level > self.max_level {
            return;
        }
        // Events raised while persisting must not recurse into the store.
        if IN_LAYER.with(|flag| flag.replace(true)) {
            return;
        }

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        self.sink.write(level.as_str(), &visitor.finish());

        IN_LAYER.with(|flag| flag.set(false));
    }
}

/// Renders an event as `message key=value ...`.
#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: String,
}

impl MessageVisitor {
    fn push_field(&mut self, name: &str, value: &dyn std::fmt::Display) {
        if !self.fields.is_empty() {
            self.fields.push(' ');
        }
        let _ = write!(self.fields, "{name}={value}");
    }

    fn finish(self) -> String {
        match (self.message.is_empty(), self.fields.is_empty()) {
            (_, true) => self.message,
            (true, false) => self.fields,
            (false, false) => format!("{} {}", self.message, self.fields),
        }
    }
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.push_field(field.name(), &value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            self.push_field(field.name(), &format_args!("{value:?}"));
        }
    }
}

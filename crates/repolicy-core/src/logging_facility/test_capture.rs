//! In-memory log capture for assertions
//!
//! The capture layer is installed once as the global subscriber and shared
//! by every test in the process, so tests filter on values unique to their
//! own fixtures (usually a repository name).

use repolicy_core_types::schema::{event, field};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, OnceLock};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

/// One event with every field rendered as a string
#[derive(Clone, Debug)]
pub struct CapturedEvent {
    pub level: Level,
    fields: BTreeMap<String, String>,
}

impl CapturedEvent {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn op(&self) -> Option<&str> {
        self.field(field::OP)
    }

    pub fn event(&self) -> Option<&str> {
        self.field(field::EVENT)
    }

    /// Module that emitted the event through the logging macros
    pub fn component(&self) -> Option<&str> {
        self.field(field::COMPONENT)
    }

    pub fn is(&self, op: &str, event: &str) -> bool {
        self.op() == Some(op) && self.event() == Some(event)
    }

    pub fn is_terminal(&self) -> bool {
        self.event().map_or(false, event::is_terminal)
    }
}

#[derive(Default)]
struct FieldRecorder(BTreeMap<String, String>);

impl Visit for FieldRecorder {
    // Numbers and bools fall back to their Debug rendering
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.0.insert(field.name().to_string(), format!("{:?}", value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.0.insert(field.name().to_string(), value.to_string());
    }
}

struct CaptureLayer {
    sink: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl<S: Subscriber> Layer<S> for CaptureLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut recorder = FieldRecorder::default();
        event.record(&mut recorder);
        let captured = CapturedEvent {
            level: *event.metadata().level(),
            fields: recorder.0,
        };
        if let Ok(mut sink) = self.sink.lock() {
            sink.push(captured);
        }
    }
}

/// Read handle over everything captured so far
#[derive(Clone)]
pub struct TestCapture {
    sink: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl TestCapture {
    pub fn events(&self) -> Vec<CapturedEvent> {
        self.sink
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Events carrying `name = value`
    pub fn events_with_field(&self, name: &str, value: &str) -> Vec<CapturedEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.field(name) == Some(value))
            .collect()
    }

    /// The last `end` or `end_error` event of `op` for one repository
    pub fn outcome(&self, op: &str, repo: &str) -> Option<CapturedEvent> {
        self.events_with_field(field::REPO, repo)
            .into_iter()
            .rev()
            .find(|e| e.op() == Some(op) && e.is_terminal())
    }

    /// # Panics
    ///
    /// Panics if no captured event has this `op` and `event`
    pub fn assert_event_exists(&self, op: &str, event: &str) {
        let events = self.events();
        assert!(
            events.iter().any(|e| e.is(op, event)),
            "no op={} event={} among {} captured events",
            op,
            event,
            events.len()
        );
    }
}

static CAPTURE: OnceLock<TestCapture> = OnceLock::new();

/// Install the capture layer as the global subscriber on first use
///
/// ```
/// use repolicy_core::logging_facility::test_capture::init_test_capture;
/// use repolicy_core::log_op_start;
///
/// let capture = init_test_capture();
/// log_op_start!("resolve", repo = "doc-probe");
/// capture.assert_event_exists("resolve", "start");
/// ```
pub fn init_test_capture() -> TestCapture {
    CAPTURE
        .get_or_init(|| {
            let sink = Arc::new(Mutex::new(Vec::new()));
            let layer = CaptureLayer { sink: sink.clone() };
            // A subscriber installed earlier by `init` keeps precedence
            let _ = tracing_subscriber::registry().with(layer).try_init();
            TestCapture { sink }
        })
        .clone()
}

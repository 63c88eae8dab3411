//! Property-based tests for output reconciliation.
//!
//! Uses proptest to generate event sequences and verify transcript and
//! paint invariants.

use proptest::prelude::*;
use std::sync::{Arc, Mutex};

use agentrix_core::{ActivitySettings, ReconcileMode, SessionSummary, WorktreeKey};
use agentrix_session::{
    ActivityTracker, AttachState, ChannelEvent, ManualClock, OutputSink, Readiness, Reconciler,
    ServerEvent,
};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Paint {
    Replace(Vec<u8>),
    Append(Vec<u8>),
}

#[derive(Clone, Default)]
struct Recorder(Arc<Mutex<Vec<Paint>>>);

impl Recorder {
    fn paints(&self) -> Vec<Paint> {
        self.0.lock().unwrap().clone()
    }

    /// What a widget fed these paints would show.
    fn view(&self) -> Vec<u8> {
        let mut view = Vec::new();
        for paint in self.paints() {
            match paint {
                Paint::Replace(bytes) => view = bytes,
                Paint::Append(bytes) => view.extend_from_slice(&bytes),
            }
        }
        view
    }
}

impl OutputSink for Recorder {
    fn replace(&mut self, bytes: &[u8]) {
        self.0.lock().unwrap().push(Paint::Replace(bytes.to_vec()));
    }

    fn append(&mut self, bytes: &[u8]) {
        self.0.lock().unwrap().push(Paint::Append(bytes.to_vec()));
    }
}

fn reconciler(mode: ReconcileMode) -> (Reconciler, Recorder) {
    let recorder = Recorder::default();
    let mut reconciler = Reconciler::with_mode(mode);
    reconciler.set_output_handler(Box::new(recorder.clone()));
    (reconciler, recorder)
}

fn output(bytes: &[u8]) -> ChannelEvent {
    ChannelEvent::Frame(ServerEvent::Output(bytes.to_vec()))
}

fn init(log: &str) -> ChannelEvent {
    ChannelEvent::Frame(ServerEvent::Init {
        log: Some(log.to_string()),
        closed: false,
    })
}

#[derive(Debug, Clone)]
enum Input {
    Init(String),
    Output(Vec<u8>),
}

/// Terminal-ish text: letters, spaces, newlines and escape fragments.
fn log_text() -> impl Strategy<Value = String> {
    "[a-z \\n\\x1b\\[;0-9]{0,24}"
}

fn chunk() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..32)
}

fn stream_event() -> impl Strategy<Value = Input> {
    prop_oneof![
        1 => log_text().prop_map(Input::Init),
        4 => chunk().prop_map(Input::Output),
    ]
}

fn summary(branch: &str, idle: bool, last_activity: Option<i64>) -> SessionSummary {
    SessionSummary {
        org: "acme".to_string(),
        repo: "api".to_string(),
        branch: branch.to_string(),
        idle,
        last_activity_at_ms: last_activity,
        created_at_ms: None,
        session_id: None,
        tool: None,
    }
}

proptest! {
    /// The transcript follows "init replaces, output appends" and the
    /// painted view always matches it.
    #[test]
    fn direct_transcript_follows_concatenation_rule(
        initial in log_text(),
        events in prop::collection::vec(stream_event(), 0..24),
    ) {
        let (mut reconciler, recorder) = reconciler(ReconcileMode::Direct);
        let generation = reconciler.attach_session("s1".into(), initial.as_bytes());
        let mut model = initial.clone().into_bytes();

        for event in events {
            let applied = match event {
                Input::Init(log) => {
                    model = log.clone().into_bytes();
                    reconciler.apply(generation, init(&log))
                }
                Input::Output(bytes) => {
                    model.extend_from_slice(&bytes);
                    reconciler.apply(generation, output(&bytes))
                }
            };
            prop_assert!(applied);
        }

        prop_assert_eq!(reconciler.transcript(), model.as_slice());
        prop_assert_eq!(recorder.view(), model);
    }

    /// Gated mode paints at most one replace, before any append, and the
    /// replace carries everything accepted so far.
    #[test]
    fn gated_replay_is_one_replace(
        initial_init in prop::option::of(log_text()),
        chunks in prop::collection::vec(chunk(), 0..24),
        ready_at in prop::option::of(0usize..24),
    ) {
        let (mut reconciler, recorder) = reconciler(ReconcileMode::Gated);
        let generation = reconciler.attach_session("s1".into(), b"");
        if let Some(log) = &initial_init {
            reconciler.apply(generation, init(log));
        }
        for (i, bytes) in chunks.iter().enumerate() {
            if ready_at == Some(i) {
                reconciler.apply(generation, ChannelEvent::Frame(ServerEvent::Ready));
            }
            reconciler.apply(generation, output(bytes));
        }

        let paints = recorder.paints();
        let replaces: Vec<usize> = paints
            .iter()
            .enumerate()
            .filter(|(_, paint)| matches!(paint, Paint::Replace(_)))
            .map(|(i, _)| i)
            .collect();
        prop_assert!(replaces.len() <= 1);
        if let Some(first_append) = paints
            .iter()
            .position(|paint| matches!(paint, Paint::Append(_)))
        {
            prop_assert_eq!(replaces.first().copied(), Some(0));
            prop_assert!(first_append > 0);
        }
        if reconciler.is_ready() {
            prop_assert_eq!(recorder.view(), reconciler.transcript().to_vec());
        } else {
            prop_assert!(paints.is_empty());
        }
    }

    /// Events tagged with a superseded generation never touch the new
    /// attach cycle.
    #[test]
    fn stale_generation_is_isolated(
        mode in prop_oneof![Just(ReconcileMode::Direct), Just(ReconcileMode::Gated)],
        stale in prop::collection::vec(stream_event(), 1..16),
    ) {
        let (mut reconciler, _recorder) = reconciler(mode);
        let gen_a = reconciler.attach_session("a".into(), b"");
        let gen_b = reconciler.attach_session("b".into(), b"log of b");
        prop_assert_ne!(gen_a, gen_b);

        for event in stale {
            let event = match event {
                Input::Init(log) => init(&log),
                Input::Output(bytes) => output(&bytes),
            };
            prop_assert!(!reconciler.apply(gen_a, event));
        }
        prop_assert_eq!(reconciler.transcript(), b"log of b".as_slice());
        prop_assert_eq!(reconciler.session_id().map(|id| id.as_str()), Some("b"));
        prop_assert_eq!(reconciler.state(), &AttachState::Connecting);
    }

    /// Acknowledgements survive activity within the tolerance and are
    /// invalidated beyond it.
    #[test]
    fn acknowledgement_tolerance(t in 1_600_000_000_000i64..1_900_000_000_000, offset in 0i64..5_000) {
        let settings = ActivitySettings::default();
        let tolerance = settings.ack_tolerance_ms;
        let mut tracker = ActivityTracker::with_clock(&settings, Arc::new(ManualClock::new(t)));
        let key = WorktreeKey::new("acme", "api", "main");

        tracker.sync_known_sessions(&[summary("main", true, Some(t))]);
        prop_assert!(tracker.acknowledge_idle(&key));
        prop_assert!(tracker.is_acknowledged(&key));

        tracker.sync_known_sessions(&[summary("main", true, Some(t + offset))]);
        prop_assert_eq!(tracker.is_acknowledged(&key), offset <= tolerance);
    }
}

#[test]
fn test_filter_forwards_flipping_delta_in_full() {
    let (mut reconciler, recorder) = reconciler(ReconcileMode::Gated);
    let generation = reconciler.attach_session("s1".into(), b"");

    let mut delta = vec![0x1b; 40];
    delta.extend_from_slice(b"ok");
    assert!(reconciler.apply(generation, output(&delta)));

    assert!(reconciler.has_visible_glyph());
    assert_eq!(recorder.paints(), vec![Paint::Replace(delta.clone())]);
    assert_eq!(reconciler.transcript(), delta.as_slice());
    assert_eq!(
        reconciler.state(),
        &AttachState::Attached(Readiness::Ready)
    );
}

#[test]
fn test_filter_drops_control_only_delta() {
    let (mut reconciler, recorder) = reconciler(ReconcileMode::Gated);
    let generation = reconciler.attach_session("s1".into(), b"");

    assert!(reconciler.apply(generation, output(&[0x07, 0x1b, 0x0e, 0x0f])));

    assert!(!reconciler.has_visible_glyph());
    assert!(reconciler.transcript().is_empty());
    assert!(recorder.paints().is_empty());
    assert_eq!(
        reconciler.state(),
        &AttachState::Attached(Readiness::Buffering)
    );
}

#[test]
fn test_reattach_same_id_replaces_view() {
    let (mut reconciler, recorder) = reconciler(ReconcileMode::Direct);
    let generation = reconciler.attach_session("s1".into(), b"hello\n");
    reconciler.apply(generation, output(b"world"));
    assert_eq!(reconciler.transcript(), b"hello\nworld");

    reconciler.attach_session("s1".into(), b"fresh");
    assert_eq!(reconciler.transcript(), b"fresh");
    assert_eq!(recorder.view(), b"fresh".to_vec());
    assert_eq!(recorder.paints().last(), Some(&Paint::Replace(b"fresh".to_vec())));
}

#[test]
fn test_duplicate_entries_aggregate() {
    let t1 = 1_700_000_000_000;
    let t2 = t1 + 60_000;
    let mut tracker = ActivityTracker::with_clock(
        &ActivitySettings::default(),
        Arc::new(ManualClock::new(t2)),
    );
    tracker.sync_known_sessions(&[summary("main", true, Some(t1)), summary("main", false, Some(t2))]);

    let meta = tracker
        .metadata(&WorktreeKey::new("acme", "api", "main"))
        .unwrap();
    assert!(!meta.idle);
    assert_eq!(meta.last_activity_at_ms, Some(t2));
}

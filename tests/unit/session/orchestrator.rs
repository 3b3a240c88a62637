use super::*;
use crate::cache::preview::PreviewCache;
use crate::engine::{Artifact, EngineStats};
use crate::schema::value::ParamValue;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Clone, Copy, Debug)]
enum Script {
    Respond(u64),
    Fail(u64),
    Twice(u64),
    Hang,
}

#[derive(Default)]
struct Log {
    submits: Vec<EngineJob>,
    cancels: Vec<RequestId>,
}

#[derive(Clone, Default)]
struct MockEngine {
    log: Arc<Mutex<Log>>,
    plan: Arc<Mutex<VecDeque<Script>>>,
    init_results: Arc<Mutex<VecDeque<bool>>>,
}

impl MockEngine {
    fn with_plan(plan: &[Script]) -> Self {
        let engine = Self::default();
        engine.plan.lock().unwrap().extend(plan.iter().copied());
        engine
    }

    fn submits(&self) -> usize {
        self.log.lock().unwrap().submits.len()
    }

    fn last_job(&self) -> EngineJob {
        self.log.lock().unwrap().submits.last().cloned().unwrap()
    }

    fn cancels(&self) -> Vec<RequestId> {
        self.log.lock().unwrap().cancels.clone()
    }
}

impl GeometryEngine for MockEngine {
    async fn initialize(&mut self, _assets: EngineAssets) -> ParamcadResult<()> {
        let ok = self.init_results.lock().unwrap().pop_front().unwrap_or(true);
        if ok {
            Ok(())
        } else {
            Err(ParamcadError::engine("engine binary missing"))
        }
    }

    fn submit(&mut self, job: EngineJob, events: mpsc::UnboundedSender<EngineEvent>) {
        let script = self
            .plan
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Script::Respond(10));
        let id = job.request_id;
        let body = format!("solid w={}", job.parameters["w"]);
        self.log.lock().unwrap().submits.push(job);

        let (after, outcome) = match script {
            Script::Hang => return,
            Script::Respond(ms) | Script::Twice(ms) => (
                ms,
                EngineEventKind::Complete {
                    artifact: Artifact::from(body.into_bytes()),
                    stats: EngineStats {
                        elapsed_ms: ms,
                        ..EngineStats::default()
                    },
                },
            ),
            Script::Fail(ms) => (
                ms,
                EngineEventKind::Error {
                    kind: "syntax".into(),
                    message: "parse error in line 3".into(),
                },
            ),
        };
        let repeat = if matches!(script, Script::Twice(_)) { 2 } else { 1 };
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(after)).await;
            let _ = events.send(EngineEvent {
                request_id: id,
                kind: EngineEventKind::Progress(50),
            });
            for _ in 0..repeat {
                let _ = events.send(EngineEvent {
                    request_id: id,
                    kind: outcome.clone(),
                });
            }
        });
    }

    fn cancel(&mut self, request_id: RequestId) {
        self.log.lock().unwrap().cancels.push(request_id);
    }
}

type Events = mpsc::UnboundedReceiver<RenderEvent>;

const SOURCE: &str = "\
w = 50; // [10:100]
$fn = 64; // [8:128]
shape = \"round\"; // [round, square]
";

fn document() -> Document {
    Document::from_source(SOURCE).0
}

fn start(engine: &MockEngine) -> (RenderHandle, Events) {
    RenderOrchestrator::spawn(
        engine.clone(),
        PreviewCache::default(),
        OrchestratorConfig::default(),
        EngineAssets::default(),
    )
}

fn values(w: ParamValue) -> ParamSnapshot {
    [("w".to_owned(), w)].into()
}

async fn next_event(rx: &mut Events) -> RenderEvent {
    tokio::time::timeout(Duration::from_secs(3600), rx.recv())
        .await
        .expect("no event within an hour of virtual time")
        .expect("orchestrator stopped")
}

async fn next_state(rx: &mut Events) -> (RenderState, Option<StateDetail>) {
    loop {
        if let RenderEvent::StateChanged { state, detail } = next_event(rx).await {
            return (state, detail);
        }
    }
}

async fn next_full(rx: &mut Events) -> Result<RenderOutput, RenderFailure> {
    loop {
        if let RenderEvent::FullQuality(result) = next_event(rx).await {
            return result;
        }
    }
}

async fn expect_states(rx: &mut Events, expected: &[RenderState]) -> Option<StateDetail> {
    let mut last = None;
    for want in expected {
        let (state, detail) = next_state(rx).await;
        assert_eq!(state, *want);
        last = detail;
    }
    last
}

/// Let virtual time run and return every state change that happened meanwhile.
async fn drain_states(rx: &mut Events, wait: Duration) -> Vec<RenderState> {
    tokio::time::sleep(wait).await;
    let mut out = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let RenderEvent::StateChanged { state, .. } = event {
            out.push(state);
        }
    }
    out
}

async fn load_and_settle(handle: &RenderHandle, rx: &mut Events) {
    handle.load_document(document()).unwrap();
    expect_states(
        rx,
        &[
            RenderState::Pending,
            RenderState::Rendering,
            RenderState::Current,
        ],
    )
    .await;
}

fn rendered(detail: Option<StateDetail>) -> RenderOutput {
    match detail {
        Some(StateDetail::Rendered(out)) => out,
        other => panic!("expected a rendered detail, got {other:?}"),
    }
}

fn failure(detail: Option<StateDetail>) -> RenderFailure {
    match detail {
        Some(StateDetail::Failure(f)) => f,
        other => panic!("expected a failure detail, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn load_renders_defaults_with_preview_caps() {
    let engine = MockEngine::default();
    let (handle, mut rx) = start(&engine);
    load_and_settle(&handle, &mut rx).await;

    let job = engine.last_job();
    assert_eq!(job.tier, Tier::Preview);
    assert_eq!(job.parameters["w"], ParamValue::Integer(50));
    assert_eq!(job.parameters["$fn"], ParamValue::Integer(32));
    assert_eq!(job.timeout, Duration::from_secs(15));
}

#[tokio::test(start_paused = true)]
async fn burst_of_edits_yields_one_submit() {
    let engine = MockEngine::default();
    let (handle, mut rx) = start(&engine);
    load_and_settle(&handle, &mut rx).await;
    assert_eq!(engine.submits(), 1);

    handle.edit(values(ParamValue::Integer(60))).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    handle.edit(values(ParamValue::Integer(70))).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    handle.edit(values(ParamValue::Integer(80))).unwrap();

    let detail = expect_states(
        &mut rx,
        &[
            RenderState::Stale,
            RenderState::Pending,
            RenderState::Rendering,
            RenderState::Current,
        ],
    )
    .await;
    assert_eq!(engine.submits(), 2);
    assert_eq!(engine.last_job().parameters["w"], ParamValue::Integer(80));
    let out = rendered(detail);
    assert!(!out.from_cache);
    assert_eq!(out.artifact.bytes(), b"solid w=80");
}

#[tokio::test(start_paused = true)]
async fn timeout_surfaces_error_then_recovers() {
    let engine = MockEngine::with_plan(&[Script::Respond(10), Script::Hang, Script::Respond(10)]);
    let (handle, mut rx) = start(&engine);
    load_and_settle(&handle, &mut rx).await;

    handle.edit(values(ParamValue::Integer(60))).unwrap();
    let detail = expect_states(
        &mut rx,
        &[
            RenderState::Stale,
            RenderState::Pending,
            RenderState::Rendering,
            RenderState::Error,
        ],
    )
    .await;
    assert_eq!(failure(detail).kind, FailureKind::Timeout);
    assert_eq!(engine.cancels(), vec![RequestId(2)]);

    handle.edit(values(ParamValue::Integer(70))).unwrap();
    let detail = expect_states(
        &mut rx,
        &[
            RenderState::Pending,
            RenderState::Rendering,
            RenderState::Current,
        ],
    )
    .await;
    assert_eq!(rendered(detail).artifact.bytes(), b"solid w=70");
}

#[tokio::test(start_paused = true)]
async fn superseded_response_never_overrides_newer_request() {
    let engine = MockEngine::with_plan(&[
        Script::Respond(10),
        Script::Respond(2_000),
        Script::Respond(5_000),
    ]);
    let (handle, mut rx) = start(&engine);
    load_and_settle(&handle, &mut rx).await;

    handle.edit(values(ParamValue::Integer(20))).unwrap();
    expect_states(
        &mut rx,
        &[
            RenderState::Stale,
            RenderState::Pending,
            RenderState::Rendering,
        ],
    )
    .await;
    // Request A (id 2) is in flight until +2s; request B replaces it before then.
    handle.edit(values(ParamValue::Integer(30))).unwrap();
    let detail = expect_states(
        &mut rx,
        &[
            RenderState::Stale,
            RenderState::Pending,
            RenderState::Rendering,
            RenderState::Current,
        ],
    )
    .await;
    let out = rendered(detail);
    assert_eq!(out.request_id, Some(RequestId(3)));
    assert_eq!(out.artifact.bytes(), b"solid w=30");
    assert_eq!(engine.cancels(), vec![RequestId(2)]);
    assert!(drain_states(&mut rx, Duration::from_secs(10)).await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn identical_snapshots_are_served_from_cache() {
    let engine = MockEngine::default();
    let (handle, mut rx) = start(&engine);
    load_and_settle(&handle, &mut rx).await;

    handle.edit(values(ParamValue::Integer(60))).unwrap();
    expect_states(
        &mut rx,
        &[
            RenderState::Stale,
            RenderState::Pending,
            RenderState::Rendering,
            RenderState::Current,
        ],
    )
    .await;
    assert_eq!(engine.submits(), 2);

    // "50" and 50.0 are the defaults rendered at load time.
    for w in [ParamValue::from("50"), ParamValue::Number(50.0)] {
        handle.edit(values(w)).unwrap();
        let detail = expect_states(
            &mut rx,
            &[RenderState::Stale, RenderState::Pending, RenderState::Current],
        )
        .await;
        let out = rendered(detail);
        assert!(out.from_cache);
        assert_eq!(out.artifact.bytes(), b"solid w=50");
    }
    assert_eq!(engine.submits(), 2);
}

#[tokio::test(start_paused = true)]
async fn result_during_newer_debounce_is_cached_but_stale() {
    let engine = MockEngine::with_plan(&[
        Script::Respond(10),
        Script::Respond(1_000),
        Script::Respond(10),
    ]);
    let (handle, mut rx) = start(&engine);
    load_and_settle(&handle, &mut rx).await;

    handle.edit(values(ParamValue::Integer(20))).unwrap();
    expect_states(
        &mut rx,
        &[
            RenderState::Stale,
            RenderState::Pending,
            RenderState::Rendering,
        ],
    )
    .await;
    tokio::time::sleep(Duration::from_millis(700)).await;
    handle.edit(values(ParamValue::Integer(30))).unwrap();

    assert_eq!(next_state(&mut rx).await.0, RenderState::Stale);
    let (state, detail) = next_state(&mut rx).await;
    assert_eq!(state, RenderState::Stale);
    assert_eq!(rendered(detail).artifact.bytes(), b"solid w=20");

    let detail = expect_states(
        &mut rx,
        &[
            RenderState::Pending,
            RenderState::Rendering,
            RenderState::Current,
        ],
    )
    .await;
    assert_eq!(rendered(detail).artifact.bytes(), b"solid w=30");
    assert!(engine.cancels().is_empty());
}

#[tokio::test(start_paused = true)]
async fn engine_error_is_surfaced_and_duplicates_dropped() {
    let engine = MockEngine::with_plan(&[Script::Twice(10), Script::Fail(10)]);
    let (handle, mut rx) = start(&engine);
    load_and_settle(&handle, &mut rx).await;
    assert!(drain_states(&mut rx, Duration::from_secs(1)).await.is_empty());

    handle.edit(values(ParamValue::Integer(90))).unwrap();
    let detail = expect_states(
        &mut rx,
        &[
            RenderState::Stale,
            RenderState::Pending,
            RenderState::Rendering,
            RenderState::Error,
        ],
    )
    .await;
    let f = failure(detail);
    assert_eq!(f.kind, FailureKind::EngineError);
    assert!(f.message.contains("syntax"));
}

#[tokio::test(start_paused = true)]
async fn cancel_current_drops_outstanding_work() {
    let engine = MockEngine::with_plan(&[Script::Hang]);
    let (handle, mut rx) = start(&engine);
    handle.load_document(document()).unwrap();
    expect_states(&mut rx, &[RenderState::Pending, RenderState::Rendering]).await;

    handle.cancel_current().unwrap();
    let detail = expect_states(&mut rx, &[RenderState::Error]).await;
    assert_eq!(failure(detail).kind, FailureKind::Cancelled);
    assert_eq!(engine.cancels(), vec![RequestId(1)]);
    // The cancelled request's deadline no longer applies.
    assert!(drain_states(&mut rx, Duration::from_secs(60)).await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn init_failure_is_sticky_until_reinitialized() {
    let engine = MockEngine::default();
    engine.init_results.lock().unwrap().extend([false, false, true]);
    let (handle, mut rx) = start(&engine);

    let detail = expect_states(&mut rx, &[RenderState::Error]).await;
    assert_eq!(failure(detail).kind, FailureKind::BoundaryInitFailed);

    handle.load_document(document()).unwrap();
    handle.edit(values(ParamValue::Integer(70))).unwrap();
    handle.request_full_quality().unwrap();
    let err = next_full(&mut rx).await.unwrap_err();
    assert_eq!(err.kind, FailureKind::BoundaryInitFailed);
    assert_eq!(engine.submits(), 0);

    handle.reinitialize(EngineAssets::default()).unwrap();
    let detail = expect_states(&mut rx, &[RenderState::Error]).await;
    assert_eq!(failure(detail).kind, FailureKind::BoundaryInitFailed);
    assert_eq!(engine.submits(), 0);

    handle.reinitialize(EngineAssets::default()).unwrap();
    let detail = expect_states(
        &mut rx,
        &[
            RenderState::Pending,
            RenderState::Rendering,
            RenderState::Current,
        ],
    )
    .await;
    assert_eq!(rendered(detail).artifact.bytes(), b"solid w=70");
    assert_eq!(engine.submits(), 1);
}

#[tokio::test(start_paused = true)]
async fn full_tier_runs_beside_preview_without_touching_its_state() {
    let engine = MockEngine::default();
    let (handle, mut rx) = start(&engine);
    load_and_settle(&handle, &mut rx).await;

    handle.edit(values(ParamValue::Integer(70))).unwrap();
    handle.request_full_quality().unwrap();

    let mut states = Vec::new();
    let mut full = None;
    while states.last() != Some(&RenderState::Current) {
        match next_event(&mut rx).await {
            RenderEvent::StateChanged { state, .. } => states.push(state),
            RenderEvent::FullQuality(result) => full = Some(result.unwrap()),
            RenderEvent::Progress { .. } => {}
        }
    }
    assert_eq!(
        states,
        vec![
            RenderState::Stale,
            RenderState::Pending,
            RenderState::Rendering,
            RenderState::Current,
        ]
    );
    let full = full.expect("full-quality result before the preview finished");
    assert_eq!(full.tier, Tier::Full);
    assert_eq!(full.artifact.bytes(), b"solid w=70");
    assert!(engine.cancels().is_empty());

    let full_job = engine
        .log
        .lock()
        .unwrap()
        .submits
        .iter()
        .find(|j| j.tier == Tier::Full)
        .cloned()
        .unwrap();
    assert_eq!(full_job.parameters["$fn"], ParamValue::Integer(64));
    assert_eq!(full_job.timeout, Duration::from_secs(300));

    handle.request_full_quality().unwrap();
    let again = next_full(&mut rx).await.unwrap();
    assert!(again.from_cache);
    assert_eq!(engine.submits(), 3);
}

#[tokio::test(start_paused = true)]
async fn edits_without_document_are_ignored() {
    let engine = MockEngine::default();
    let (handle, mut rx) = start(&engine);
    handle.edit(values(ParamValue::Integer(70))).unwrap();
    handle.request_full_quality().unwrap();
    assert!(drain_states(&mut rx, Duration::from_secs(5)).await.is_empty());
    assert_eq!(engine.submits(), 0);

    handle.shutdown().unwrap();
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert!(handle.is_closed());
    assert!(handle.edit(ParamSnapshot::new()).is_err());
}

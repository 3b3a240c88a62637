use std::collections::BTreeMap;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::{Instant, Sleep};

use crate::annotate::parse;
use crate::cache::fingerprint::CacheKey;
use crate::cache::store::{ArtifactStore, CacheEntry};
use crate::engine::{EngineAssets, EngineEvent, EngineEventKind, EngineJob, GeometryEngine};
use crate::foundation::core::{RequestId, RequestIdGen, Tier};
use crate::foundation::error::{ParamcadError, ParamcadResult};
use crate::schema::diagnostic::Diagnostic;
use crate::schema::model::SchemaModel;
use crate::schema::value::ParamSnapshot;
use crate::session::config::OrchestratorConfig;
use crate::session::state::{
    FailureKind, RenderEvent, RenderFailure, RenderOutput, RenderState, StateDetail,
};

/// A design source together with its extracted schema.
#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    /// Design source text handed to the engine.
    pub source: String,
    /// Files the source includes, keyed by relative path.
    pub auxiliary_files: BTreeMap<String, Vec<u8>>,
    /// Schema used to sanitize edits.
    pub schema: SchemaModel,
}

impl Document {
    /// Document with an already extracted schema.
    pub fn new(source: impl Into<String>, schema: SchemaModel) -> Self {
        Self {
            source: source.into(),
            auxiliary_files: BTreeMap::new(),
            schema,
        }
    }

    /// Parse `source` and build the document from the resulting schema.
    pub fn from_source(source: impl Into<String>) -> (Self, Vec<Diagnostic>) {
        let source = source.into();
        let parsed = parse(&source);
        (Self::new(source, parsed.schema), parsed.diagnostics)
    }

    /// Attach an auxiliary file.
    pub fn with_auxiliary_file(mut self, path: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.auxiliary_files.insert(path.into(), bytes);
        self
    }
}

#[derive(Debug)]
enum Command {
    Load(Box<Document>),
    Edit(ParamSnapshot),
    FullQuality,
    Cancel,
    Reinitialize(EngineAssets),
    Shutdown,
}

/// Caller side of a running orchestrator. Cheap to clone; every method returns immediately.
#[derive(Clone, Debug)]
pub struct RenderHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl RenderHandle {
    fn send(&self, cmd: Command) -> ParamcadResult<()> {
        self.tx
            .send(cmd)
            .map_err(|_| ParamcadError::engine("render orchestrator has stopped"))
    }

    /// Replace the current document and render its defaults.
    pub fn load_document(&self, doc: Document) -> ParamcadResult<()> {
        self.send(Command::Load(Box::new(doc)))
    }

    /// Report the caller's current parameter values. Bursts are debounced.
    pub fn edit(&self, snapshot: ParamSnapshot) -> ParamcadResult<()> {
        self.send(Command::Edit(snapshot))
    }

    /// Render the latest values at full quality. The outcome arrives as
    /// [`RenderEvent::FullQuality`].
    pub fn request_full_quality(&self) -> ParamcadResult<()> {
        self.send(Command::FullQuality)
    }

    /// Drop the pending edit and every in-flight request.
    pub fn cancel_current(&self) -> ParamcadResult<()> {
        self.send(Command::Cancel)
    }

    /// Re-run engine initialization; clears a sticky init failure on success.
    pub fn reinitialize(&self, assets: EngineAssets) -> ParamcadResult<()> {
        self.send(Command::Reinitialize(assets))
    }

    /// Stop the orchestrator. In-flight requests are cancelled.
    pub fn shutdown(&self) -> ParamcadResult<()> {
        self.send(Command::Shutdown)
    }

    /// `true` once the orchestrator task has exited.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

struct LoadedDocument {
    source: Arc<str>,
    auxiliary_files: Arc<BTreeMap<String, Vec<u8>>>,
    schema: SchemaModel,
}

#[derive(Debug)]
struct InFlight {
    id: RequestId,
    key: CacheKey,
    deadline: Instant,
}

/// Actor turning parameter edits into debounced, tiered, cached engine requests.
///
/// All state lives inside one task and is only touched from its event loop. Engine responses are
/// matched to the latest outstanding request id of their tier; anything else is dropped.
pub struct RenderOrchestrator<E, S> {
    engine: E,
    store: S,
    config: OrchestratorConfig,
    ids: RequestIdGen,

    doc: Option<LoadedDocument>,
    latest: ParamSnapshot,
    state: RenderState,
    has_success: bool,
    init_failure: Option<String>,

    debounce: Option<Pin<Box<Sleep>>>,
    preview: Option<InFlight>,
    full: Option<InFlight>,

    engine_tx: mpsc::UnboundedSender<EngineEvent>,
    out: mpsc::UnboundedSender<RenderEvent>,
}

impl<E: GeometryEngine, S: ArtifactStore> RenderOrchestrator<E, S> {
    /// Start the orchestrator on the current tokio runtime.
    ///
    /// The engine is initialized with `assets` first; a failure is reported as
    /// `error{boundaryInitFailed}` and blocks submissions until [`RenderHandle::reinitialize`]
    /// succeeds.
    pub fn spawn(
        engine: E,
        store: S,
        config: OrchestratorConfig,
        assets: EngineAssets,
    ) -> (RenderHandle, mpsc::UnboundedReceiver<RenderEvent>) {
        let (tx, commands) = mpsc::unbounded_channel();
        let (out, events) = mpsc::unbounded_channel();
        let (engine_tx, engine_rx) = mpsc::unbounded_channel();
        let actor = Self {
            engine,
            store,
            config,
            ids: RequestIdGen::default(),
            doc: None,
            latest: ParamSnapshot::new(),
            state: RenderState::Idle,
            has_success: false,
            init_failure: None,
            debounce: None,
            preview: None,
            full: None,
            engine_tx,
            out,
        };
        tokio::spawn(actor.run(assets, commands, engine_rx));
        (RenderHandle { tx }, events)
    }

    async fn run(
        mut self,
        assets: EngineAssets,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut engine_rx: mpsc::UnboundedReceiver<EngineEvent>,
    ) {
        self.initialize(assets).await;

        loop {
            let deadline = self.next_deadline();
            tokio::select! {
                cmd = commands.recv() => match cmd {
                    Some(Command::Shutdown) | None => break,
                    Some(cmd) => self.on_command(cmd).await,
                },
                Some(event) = engine_rx.recv() => self.on_engine_event(event).await,
                _ = debounce_elapsed(&mut self.debounce), if self.debounce.is_some() => {
                    self.debounce = None;
                    self.flush().await;
                }
                _ = deadline_elapsed(deadline), if deadline.is_some() => self.on_deadline(),
            }
        }

        self.abandon_in_flight();
        tracing::debug!("render orchestrator stopped");
    }

    async fn on_command(&mut self, cmd: Command) {
        match cmd {
            Command::Load(doc) => self.load(*doc).await,
            Command::Edit(snapshot) => self.edit(snapshot),
            Command::FullQuality => self.full_quality().await,
            Command::Cancel => self.cancel_current(),
            Command::Reinitialize(assets) => self.reinitialize(assets).await,
            Command::Shutdown => {}
        }
    }

    async fn initialize(&mut self, assets: EngineAssets) -> bool {
        match self.engine.initialize(assets).await {
            Ok(()) => {
                self.init_failure = None;
                true
            }
            Err(e) => {
                let message = e.to_string();
                tracing::error!(error = %message, "geometry engine initialization failed");
                self.init_failure = Some(message.clone());
                self.set_state(
                    RenderState::Error,
                    Some(StateDetail::Failure(RenderFailure::new(
                        FailureKind::BoundaryInitFailed,
                        message,
                    ))),
                );
                false
            }
        }
    }

    async fn reinitialize(&mut self, assets: EngineAssets) {
        self.debounce = None;
        self.abandon_in_flight();
        if !self.initialize(assets).await {
            return;
        }
        tracing::info!("geometry engine reinitialized");
        if self.doc.is_some() {
            self.set_state(RenderState::Pending, None);
            self.flush().await;
        } else {
            self.set_state(RenderState::Idle, None);
        }
    }

    async fn load(&mut self, doc: Document) {
        self.debounce = None;
        self.abandon_in_flight();
        self.latest = doc.schema.defaults();
        self.has_success = false;
        tracing::info!(
            parameters = doc.schema.parameters.len(),
            aux_files = doc.auxiliary_files.len(),
            "document loaded"
        );
        self.doc = Some(LoadedDocument {
            source: doc.source.into(),
            auxiliary_files: Arc::new(doc.auxiliary_files),
            schema: doc.schema,
        });
        if self.refused() {
            return;
        }
        self.set_state(RenderState::Pending, None);
        self.flush().await;
    }

    fn edit(&mut self, snapshot: ParamSnapshot) {
        let Some(doc) = &self.doc else {
            tracing::warn!("edit ignored: no document loaded");
            return;
        };
        self.latest = doc.schema.sanitize(&snapshot);
        if self.refused() {
            return;
        }
        self.debounce = Some(Box::pin(tokio::time::sleep(self.config.debounce())));
        let next = if self.has_success {
            RenderState::Stale
        } else {
            RenderState::Pending
        };
        self.set_state(next, None);
    }

    async fn flush(&mut self) {
        if self.doc.is_none() || self.refused() {
            return;
        }
        tracing::debug!("debounce elapsed; issuing preview");
        self.set_state(RenderState::Pending, None);
        let snapshot = self.latest.clone();
        self.issue(Tier::Preview, snapshot).await;
    }

    async fn full_quality(&mut self) {
        if self.doc.is_none() {
            tracing::warn!("full-quality request ignored: no document loaded");
            return;
        }
        if let Some(message) = &self.init_failure {
            let failure = RenderFailure::new(FailureKind::BoundaryInitFailed, message.clone());
            self.emit(RenderEvent::FullQuality(Err(failure)));
            return;
        }
        let snapshot = self.latest.clone();
        self.issue(Tier::Full, snapshot).await;
    }

    async fn issue(&mut self, tier: Tier, mut params: ParamSnapshot) {
        let (source, auxiliary_files) = match &self.doc {
            Some(d) => (d.source.clone(), d.auxiliary_files.clone()),
            None => return,
        };
        let tier_cfg = self.config.tier(tier);
        tier_cfg.apply_caps(&mut params);
        let timeout = tier_cfg.timeout();
        let key = CacheKey::new(tier, &params);

        if let Some(lane) = self.lane(tier)
            && lane.key == key
        {
            tracing::debug!(%tier, request = %lane.id, "identical request already in flight");
            if tier == Tier::Preview {
                self.set_state(RenderState::Rendering, None);
            }
            return;
        }
        if let Some(old) = self.lane_mut(tier).take() {
            tracing::debug!(%tier, superseded = %old.id, "superseding in-flight request");
            self.engine.cancel(old.id);
        }

        if let Some(hit) = self.store.get(&key).await {
            tracing::debug!(%tier, %key, "cache hit");
            self.deliver(RenderOutput {
                tier,
                request_id: None,
                artifact: hit.artifact,
                stats: hit.stats,
                from_cache: true,
            });
            return;
        }

        let id = self.ids.next_id();
        tracing::info!(%tier, request = %id, %key, "cache miss; submitting render request");
        let job = EngineJob {
            request_id: id,
            tier,
            source,
            auxiliary_files,
            parameters: params,
            timeout,
        };
        self.engine.submit(job, self.engine_tx.clone());
        *self.lane_mut(tier) = Some(InFlight {
            id,
            key,
            deadline: Instant::now() + timeout,
        });
        if tier == Tier::Preview {
            self.set_state(RenderState::Rendering, None);
        }
    }

    async fn on_engine_event(&mut self, event: EngineEvent) {
        let tier = Tier::ALL
            .into_iter()
            .find(|t| self.lane(*t).is_some_and(|l| l.id == event.request_id));
        let Some(tier) = tier else {
            tracing::trace!(request = %event.request_id, "dropping response for superseded request");
            return;
        };

        match event.kind {
            EngineEventKind::Progress(percent) => self.emit(RenderEvent::Progress {
                tier,
                percent: percent.min(100),
            }),
            EngineEventKind::Complete { artifact, stats } => {
                let Some(lane) = self.lane_mut(tier).take() else {
                    return;
                };
                tracing::info!(
                    %tier,
                    request = %lane.id,
                    bytes = artifact.len(),
                    elapsed_ms = stats.elapsed_ms,
                    "render complete"
                );
                self.store
                    .put(CacheEntry {
                        key: lane.key,
                        artifact: artifact.clone(),
                        stats: stats.clone(),
                    })
                    .await;
                self.deliver(RenderOutput {
                    tier,
                    request_id: Some(lane.id),
                    artifact,
                    stats,
                    from_cache: false,
                });
            }
            EngineEventKind::Error { kind, message } => {
                self.lane_mut(tier).take();
                self.fail(
                    tier,
                    RenderFailure::new(FailureKind::EngineError, format!("{kind}: {message}")),
                );
            }
        }
    }

    fn on_deadline(&mut self) {
        let now = Instant::now();
        for tier in Tier::ALL {
            if !self.lane(tier).is_some_and(|l| l.deadline <= now) {
                continue;
            }
            let Some(lane) = self.lane_mut(tier).take() else {
                continue;
            };
            self.engine.cancel(lane.id);
            let timeout_ms = self.config.tier(tier).timeout_ms;
            tracing::warn!(%tier, request = %lane.id, timeout_ms, "render request timed out");
            self.fail(
                tier,
                RenderFailure::new(
                    FailureKind::Timeout,
                    format!("no response from the engine within {timeout_ms} ms"),
                ),
            );
        }
    }

    fn cancel_current(&mut self) {
        let debouncing = self.debounce.take().is_some();
        let preview = self.preview.take();
        let full = self.full.take();
        for lane in preview.iter().chain(full.iter()) {
            self.engine.cancel(lane.id);
        }
        if full.is_some() {
            self.emit(RenderEvent::FullQuality(Err(RenderFailure::new(
                FailureKind::Cancelled,
                "full-quality render cancelled",
            ))));
        }
        if debouncing || preview.is_some() {
            tracing::info!("render cancelled by caller");
            self.set_state(
                RenderState::Error,
                Some(StateDetail::Failure(RenderFailure::new(
                    FailureKind::Cancelled,
                    "render cancelled",
                ))),
            );
        }
    }

    /// Cancel in-flight work without touching the preview state.
    fn abandon_in_flight(&mut self) {
        if let Some(lane) = self.preview.take() {
            self.engine.cancel(lane.id);
        }
        if let Some(lane) = self.full.take() {
            self.engine.cancel(lane.id);
            self.emit(RenderEvent::FullQuality(Err(RenderFailure::new(
                FailureKind::Cancelled,
                "full-quality render abandoned",
            ))));
        }
    }

    fn deliver(&mut self, output: RenderOutput) {
        match output.tier {
            Tier::Full => self.emit(RenderEvent::FullQuality(Ok(output))),
            Tier::Preview => {
                // A newer edit is still debouncing: keep the result but do not claim it is current.
                let state = if self.debounce.is_some() {
                    RenderState::Stale
                } else {
                    RenderState::Current
                };
                self.set_state(state, Some(StateDetail::Rendered(output)));
                self.has_success = true;
            }
        }
    }

    fn fail(&mut self, tier: Tier, failure: RenderFailure) {
        match tier {
            Tier::Full => self.emit(RenderEvent::FullQuality(Err(failure))),
            Tier::Preview => {
                if self.debounce.is_some() {
                    tracing::debug!(kind = %failure.kind, "preview failure discarded; newer edit pending");
                    return;
                }
                tracing::warn!(kind = %failure.kind, message = %failure.message, "preview render failed");
                self.set_state(RenderState::Error, Some(StateDetail::Failure(failure)));
            }
        }
    }

    fn refused(&self) -> bool {
        if self.init_failure.is_some() {
            tracing::warn!("submission refused: geometry engine not initialized");
            return true;
        }
        false
    }

    fn set_state(&mut self, state: RenderState, detail: Option<StateDetail>) {
        if state == self.state && detail.is_none() {
            return;
        }
        tracing::debug!(from = %self.state, to = %state, "render state");
        self.state = state;
        if state == RenderState::Error {
            self.has_success = false;
        }
        self.emit(RenderEvent::StateChanged { state, detail });
    }

    fn emit(&self, event: RenderEvent) {
        if self.out.send(event).is_err() {
            tracing::trace!("render event receiver dropped");
        }
    }

    fn next_deadline(&self) -> Option<Instant> {
        [&self.preview, &self.full]
            .into_iter()
            .flatten()
            .map(|l| l.deadline)
            .min()
    }

    fn lane(&self, tier: Tier) -> Option<&InFlight> {
        match tier {
            Tier::Preview => self.preview.as_ref(),
            Tier::Full => self.full.as_ref(),
        }
    }

    fn lane_mut(&mut self, tier: Tier) -> &mut Option<InFlight> {
        match tier {
            Tier::Preview => &mut self.preview,
            Tier::Full => &mut self.full,
        }
    }
}

async fn debounce_elapsed(timer: &mut Option<Pin<Box<Sleep>>>) {
    if let Some(timer) = timer.as_mut() {
        timer.await;
    }
}

async fn deadline_elapsed(deadline: Option<Instant>) {
    match deadline {
        Some(d) => tokio::time::sleep_until(d).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
#[path = "../../tests/unit/session/orchestrator.rs"]
mod tests;

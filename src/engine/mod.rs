//! Asynchronous boundary to the external geometry engine.
//!
//! The orchestrator only talks to an engine through [`GeometryEngine`]: jobs go in, and
//! [`EngineEvent`]s come back on a channel tagged with the job's [`RequestId`]. Engines may emit
//! events late, out of order, or more than once; the orchestrator copes with all three.

pub(crate) mod command;

use std::collections::BTreeMap;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::foundation::core::{RequestId, Tier};
use crate::foundation::error::ParamcadResult;
use crate::schema::value::ParamSnapshot;

/// Immutable rendered output. Cloning shares the bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Artifact(Arc<[u8]>);

impl Artifact {
    /// Raw artifact bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.0
    }

    /// Byte length.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// `true` if the engine produced no bytes.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for Artifact {
    fn from(v: Vec<u8>) -> Self {
        Self(v.into())
    }
}

impl From<&[u8]> for Artifact {
    fn from(v: &[u8]) -> Self {
        Self(v.into())
    }
}

/// Statistics reported by the engine alongside an artifact.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStats {
    /// Wall time the engine spent on the job.
    pub elapsed_ms: u64,
    /// Size of the artifact.
    pub artifact_bytes: u64,
    /// Engine console warnings, if any.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// What an engine needs before it can accept jobs.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EngineAssets {
    /// Engine program override; adapters fall back to their own default.
    pub program: Option<PathBuf>,
    /// Library directories made visible to the engine.
    pub library_paths: Vec<PathBuf>,
}

/// One render job handed to the engine.
#[derive(Clone, Debug)]
pub struct EngineJob {
    /// Correlation id; every event for this job carries it.
    pub request_id: RequestId,
    /// Tier the job was issued for.
    pub tier: Tier,
    /// Design source text.
    pub source: Arc<str>,
    /// Files the source may include, keyed by relative path.
    pub auxiliary_files: Arc<BTreeMap<String, Vec<u8>>>,
    /// Sanitized values, with the tier's resolution caps already applied.
    pub parameters: ParamSnapshot,
    /// Deadline the orchestrator will enforce.
    pub timeout: Duration,
}

/// Engine response for one job.
#[derive(Clone, Debug, PartialEq)]
pub struct EngineEvent {
    /// Job this event belongs to.
    pub request_id: RequestId,
    /// Payload.
    pub kind: EngineEventKind,
}

/// Engine response payloads.
#[derive(Clone, Debug, PartialEq)]
pub enum EngineEventKind {
    /// Percent complete, `0..=100`.
    Progress(u8),
    /// Terminal success.
    Complete {
        /// Rendered output.
        artifact: Artifact,
        /// Engine statistics.
        stats: EngineStats,
    },
    /// Terminal failure.
    Error {
        /// Engine-defined machine-readable kind.
        kind: String,
        /// Human-readable message.
        message: String,
    },
}

impl EngineEvent {
    /// `true` for `Complete` and `Error`.
    pub fn is_terminal(&self) -> bool {
        !matches!(self.kind, EngineEventKind::Progress(_))
    }
}

/// Contract toward an external geometry engine.
///
/// `submit` and `cancel` must not block: real work happens elsewhere and reports back through
/// the events channel. `cancel` is best-effort.
pub trait GeometryEngine: Send + 'static {
    /// Prepare the engine. Failure makes the orchestrator refuse submissions until the next
    /// successful call.
    fn initialize(&mut self, assets: EngineAssets) -> impl Future<Output = ParamcadResult<()>> + Send;

    /// Start `job`, reporting progress and the terminal outcome on `events`.
    fn submit(&mut self, job: EngineJob, events: mpsc::UnboundedSender<EngineEvent>);

    /// Ask the engine to stop working on `request_id`.
    fn cancel(&mut self, request_id: RequestId);
}

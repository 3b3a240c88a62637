use std::fmt;

use crate::engine::{Artifact, EngineStats};
use crate::foundation::core::{RequestId, Tier};

/// Observable orchestrator state. Exactly one is active at a time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderState {
    /// No document loaded.
    Idle,
    /// An edit is debouncing or a request is about to be issued.
    Pending,
    /// A preview request is in flight.
    Rendering,
    /// The latest preview matches the latest snapshot.
    Current,
    /// A preview exists but a newer edit is waiting.
    Stale,
    /// The latest preview request failed.
    Error,
}

impl RenderState {
    /// Stable lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            RenderState::Idle => "idle",
            RenderState::Pending => "pending",
            RenderState::Rendering => "rendering",
            RenderState::Current => "current",
            RenderState::Stale => "stale",
            RenderState::Error => "error",
        }
    }
}

impl fmt::Display for RenderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Machine-readable failure kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FailureKind {
    /// No response within the tier timeout.
    Timeout,
    /// The engine reported an error.
    EngineError,
    /// Outstanding work was cancelled by the caller.
    Cancelled,
    /// The engine could not be initialized; sticky until reinitialization succeeds.
    BoundaryInitFailed,
}

impl FailureKind {
    /// Stable camelCase name.
    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::Timeout => "timeout",
            FailureKind::EngineError => "engineError",
            FailureKind::Cancelled => "cancelled",
            FailureKind::BoundaryInitFailed => "boundaryInitFailed",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed render request.
#[derive(thiserror::Error, Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[error("{kind}: {message}")]
pub struct RenderFailure {
    /// Machine-readable kind.
    pub kind: FailureKind,
    /// Human-readable explanation.
    pub message: String,
}

impl RenderFailure {
    pub(crate) fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// A successful render, fresh or served from the cache.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderOutput {
    /// Tier the output was rendered at.
    pub tier: Tier,
    /// Request that produced it; `None` for cache hits.
    pub request_id: Option<RequestId>,
    /// Rendered bytes.
    pub artifact: Artifact,
    /// Engine statistics of the original render.
    pub stats: EngineStats,
    /// `true` when no engine request was made.
    pub from_cache: bool,
}

/// Payload attached to a state change.
#[derive(Clone, Debug, PartialEq)]
pub enum StateDetail {
    /// The preview that made the state `current` (or that arrived while `stale`).
    Rendered(RenderOutput),
    /// Why the state is `error`.
    Failure(RenderFailure),
}

/// Outbound orchestrator notifications.
#[derive(Clone, Debug, PartialEq)]
pub enum RenderEvent {
    /// The preview state changed.
    StateChanged {
        /// New state.
        state: RenderState,
        /// Stats/artifact or failure, when the state carries one.
        detail: Option<StateDetail>,
    },
    /// Engine progress for an in-flight request.
    Progress {
        /// Tier of the request.
        tier: Tier,
        /// Percent complete.
        percent: u8,
    },
    /// Outcome of a full-quality request. Never changes the preview state.
    FullQuality(Result<RenderOutput, RenderFailure>),
}

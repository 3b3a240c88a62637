//! Parameter extraction and render orchestration for annotated parametric CAD sources.
//!
//! Two halves:
//!
//! - [`parse`] reads design source whose top-level assignments carry customizer annotations and
//!   produces a normalized [`SchemaModel`] plus [`Diagnostic`]s. [`emit_source`] writes a schema
//!   back out as annotated source.
//! - [`RenderOrchestrator`] turns a stream of parameter edits into debounced, tiered, cached
//!   requests against a [`GeometryEngine`], and reports progress as [`RenderEvent`]s.
#![forbid(unsafe_code)]

mod annotate;
mod cache;
mod engine;
mod expression;
mod foundation;
mod schema;
mod session;

pub use annotate::{ParsedSchema, parse, parse_bytes};
pub use cache::fingerprint::{CacheKey, CanonicalSnapshot, CanonicalValue, Fingerprint, canonicalize};
pub use cache::preview::{DEFAULT_CACHE_CAPACITY, PreviewCache};
pub use cache::store::{ArtifactStore, CacheEntry};
pub use engine::command::{CommandEngine, DEFAULT_ENGINE_PROGRAM};
pub use engine::{
    Artifact, EngineAssets, EngineEvent, EngineEventKind, EngineJob, EngineStats, GeometryEngine,
};
pub use foundation::core::{RequestId, Tier};
pub use foundation::error::{ParamcadError, ParamcadResult};
pub use schema::dependency::Condition;
pub use schema::diagnostic::{Diagnostic, DiagnosticCategory, DiagnosticKind};
pub use schema::emit::emit_source;
pub use schema::model::{
    Constraints, DEFAULT_GROUP_ID, DEFAULT_GROUP_LABEL, Group, HIDDEN_GROUP_LABEL, ParamType,
    Parameter, SchemaModel, UiHint, slugify,
};
pub use schema::normalize::normalize;
pub use schema::value::{ParamSnapshot, ParamValue};
pub use session::config::{CapBound, OrchestratorConfig, ResolutionCap, TierConfig};
pub use session::orchestrator::{Document, RenderHandle, RenderOrchestrator};
pub use session::state::{
    FailureKind, RenderEvent, RenderFailure, RenderOutput, RenderState, StateDetail,
};

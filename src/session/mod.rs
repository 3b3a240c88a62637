//! Render orchestration: debounced, tiered, cached requests against a geometry engine.

pub(crate) mod config;
pub(crate) mod orchestrator;
pub(crate) mod state;

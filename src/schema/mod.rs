//! Normalized parameter schema: data model, dependency conditions, normalization, and emission
//! back to annotated source.

pub(crate) mod dependency;
pub(crate) mod diagnostic;
pub(crate) mod emit;
pub(crate) mod model;
pub(crate) mod normalize;
pub(crate) mod value;

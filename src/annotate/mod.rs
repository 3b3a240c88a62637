//! Extraction of a parameter schema from annotated design source.
//!
//! The scan is line-oriented: each line is classified as a group header, a comment or directive,
//! a top-level assignment, or ignored code. Malformed annotations degrade to diagnostics and never
//! abort extraction.

pub(crate) mod hint;
pub(crate) mod line;
pub(crate) mod scan;

use crate::foundation::error::{ParamcadError, ParamcadResult};
use crate::schema::diagnostic::Diagnostic;
use crate::schema::model::SchemaModel;

/// A normalized schema together with every diagnostic recorded while producing it.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ParsedSchema {
    /// Normalized, sorted schema.
    pub schema: SchemaModel,
    /// Parse diagnostics first (in line order), then validation warnings.
    pub diagnostics: Vec<Diagnostic>,
}

/// Parse annotated source text into a normalized schema.
///
/// Never fails: at worst the schema has no parameters and the diagnostics explain why.
#[tracing::instrument(level = "debug", skip(source), fields(bytes = source.len()))]
pub fn parse(source: &str) -> ParsedSchema {
    let text = line::unify_line_endings(source);
    let mut scanner = scan::Scanner::new();
    for (idx, l) in text.split('\n').enumerate() {
        scanner.feed_line(idx + 1, l);
    }
    let (schema, diagnostics) = scanner.finish();
    tracing::debug!(
        groups = schema.groups.len(),
        parameters = schema.parameters.len(),
        diagnostics = diagnostics.len(),
        "schema extracted"
    );
    ParsedSchema {
        schema,
        diagnostics,
    }
}

/// Parse raw bytes. Input that is not UTF-8 is the only hard error.
pub fn parse_bytes(bytes: &[u8]) -> ParamcadResult<ParsedSchema> {
    let text = std::str::from_utf8(bytes).map_err(|e| {
        ParamcadError::encoding(format!(
            "source is not UTF-8 (invalid byte at offset {})",
            e.valid_up_to()
        ))
    })?;
    Ok(parse(text))
}

#[cfg(test)]
#[path = "../../tests/unit/annotate/scan.rs"]
mod tests;

use std::fmt;

/// What went wrong (and was recovered from) while extracting or normalizing a schema.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DiagnosticKind {
    /// A bracket hint that is neither a range nor an enum; kept as description text.
    MalformedHint,
    /// A later assignment replaced an earlier one with the same id.
    DuplicateParameter,
    /// Two group headers produced the same explicit id with conflicting settings.
    DuplicateGroup,
    /// A parameter referenced a group id that was never declared.
    UnresolvedGroup,
    /// A quoted value without a closing quote; the rest of the line was consumed.
    UnterminatedString,
    /// An assignment whose value is an expression rather than a literal.
    UnsupportedValue,
    /// A numeric enum containing non-numeric elements; those elements were dropped.
    MixedEnum,
    /// A hint that does not apply to the default's type.
    HintTypeMismatch,
    /// A `@depends` condition that could not be parsed.
    MalformedDependency,
    /// A dependency naming an unknown parameter; the dependency was dropped.
    UnresolvedDependency,
    /// A constraint that was repaired (inverted bounds, non-positive step, empty enum).
    InvalidConstraint,
    /// A numeric default moved into `[minimum, maximum]`.
    ClampedDefault,
    /// An invalid default replaced by a valid one.
    SubstitutedDefault,
}

/// Coarse split between extraction problems and normalization repairs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DiagnosticCategory {
    /// Raised while reading source text.
    Parse,
    /// Raised while normalizing a schema.
    Validation,
}

impl DiagnosticKind {
    /// Category this kind belongs to.
    pub fn category(self) -> DiagnosticCategory {
        match self {
            DiagnosticKind::MalformedHint
            | DiagnosticKind::DuplicateParameter
            | DiagnosticKind::UnterminatedString
            | DiagnosticKind::UnsupportedValue
            | DiagnosticKind::MixedEnum
            | DiagnosticKind::HintTypeMismatch
            | DiagnosticKind::MalformedDependency => DiagnosticCategory::Parse,
            DiagnosticKind::DuplicateGroup
            | DiagnosticKind::UnresolvedGroup
            | DiagnosticKind::UnresolvedDependency
            | DiagnosticKind::InvalidConstraint
            | DiagnosticKind::ClampedDefault
            | DiagnosticKind::SubstitutedDefault => DiagnosticCategory::Validation,
        }
    }
}

/// A recovered, non-fatal problem attached to an extracted schema.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    /// Machine-readable kind.
    pub kind: DiagnosticKind,
    /// Human-readable explanation.
    pub message: String,
    /// 1-based source line, when the problem is tied to one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_number: Option<usize>,
}

impl Diagnostic {
    pub(crate) fn at(line: usize, kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            line_number: Some(line),
        }
    }

    pub(crate) fn unplaced(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            line_number: None,
        }
    }

    /// `true` for normalization repairs (clamped or substituted defaults and the like).
    pub fn is_validation_warning(&self) -> bool {
        self.kind.category() == DiagnosticCategory::Validation
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line_number {
            Some(line) => write!(f, "line {line}: {:?}: {}", self.kind, self.message),
            None => write!(f, "{:?}: {}", self.kind, self.message),
        }
    }
}

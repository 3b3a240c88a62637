use std::fmt;

/// Identity of one render submission. Unique per orchestrator, strictly increasing.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req#{}", self.0)
    }
}

/// Monotonic request id source.
#[derive(Debug, Default)]
pub(crate) struct RequestIdGen {
    next: u64,
}

impl RequestIdGen {
    pub(crate) fn next_id(&mut self) -> RequestId {
        self.next = self.next.saturating_add(1);
        RequestId(self.next)
    }
}

/// Quality tier trading fidelity for turnaround time.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Cheap, capped resolution; issued on every debounced edit.
    Preview,
    /// Uncapped; issued only on explicit request.
    Full,
}

impl Tier {
    /// All tiers in a fixed order.
    pub const ALL: [Tier; 2] = [Tier::Preview, Tier::Full];

    /// Stable lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Preview => "preview",
            Tier::Full => "full",
        }
    }

    pub(crate) fn tag(self) -> u8 {
        match self {
            Tier::Preview => 0,
            Tier::Full => 1,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

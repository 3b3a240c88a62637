//! Tier-partitioned artifact cache keyed by canonical parameter snapshots.

pub(crate) mod fingerprint;
pub(crate) mod preview;
pub(crate) mod store;

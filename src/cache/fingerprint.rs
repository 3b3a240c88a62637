use std::collections::BTreeMap;
use std::fmt;

use xxhash_rust::xxh3::Xxh3;

use crate::foundation::core::Tier;
use crate::schema::value::{ParamSnapshot, ParamValue};

const XXH3_SEED: u64 = 0x5f3c_9a1e_d27b_4c60;

/// 128-bit digest of a canonical snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Fingerprint {
    /// High 64 bits.
    pub hi: u64,
    /// Low 64 bits.
    pub lo: u64,
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}{:016x}", self.hi, self.lo)
    }
}

/// Cache key: the tier plus the fingerprint of the canonical snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CacheKey {
    /// Quality tier; keys of different tiers never compare equal.
    pub tier: Tier,
    /// Snapshot digest.
    pub fingerprint: Fingerprint,
}

impl CacheKey {
    /// Key for `snapshot` rendered at `tier`.
    pub fn new(tier: Tier, snapshot: &ParamSnapshot) -> Self {
        let mut h = StableHasher::new();
        h.write_u8(tier.tag());
        write_canonical(&mut h, &canonicalize(snapshot));
        Self {
            tier,
            fingerprint: h.finish(),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.tier, self.fingerprint)
    }
}

/// Value form used for hashing: every numeric spelling collapses to one normalized `f64`.
#[derive(Clone, Debug, PartialEq)]
pub enum CanonicalValue {
    /// Integers, decimals and numeric-looking strings.
    Number(f64),
    /// Booleans.
    Boolean(bool),
    /// Any other string.
    Text(String),
}

/// Snapshot with sorted keys and normalized values.
pub type CanonicalSnapshot = BTreeMap<String, CanonicalValue>;

/// Canonicalize a snapshot so that value-equal snapshots compare (and hash) equal.
///
/// `50`, `50.0` and `"50"` all become `Number(50.0)`; `-0.0` becomes `0.0`.
pub fn canonicalize(snapshot: &ParamSnapshot) -> CanonicalSnapshot {
    snapshot
        .iter()
        .map(|(k, v)| (k.clone(), canonical_value(v)))
        .collect()
}

fn canonical_value(v: &ParamValue) -> CanonicalValue {
    match v {
        ParamValue::Boolean(b) => CanonicalValue::Boolean(*b),
        other => match other.coerce_f64() {
            Some(x) => CanonicalValue::Number(if x == 0.0 { 0.0 } else { x }),
            None => CanonicalValue::Text(other.to_string()),
        },
    }
}

fn write_canonical(h: &mut StableHasher, snapshot: &CanonicalSnapshot) {
    h.write_u32(snapshot.len() as u32);
    for (k, v) in snapshot {
        h.write_str(k);
        match v {
            CanonicalValue::Number(x) => {
                h.write_u8(0);
                h.write_f64(*x);
            }
            CanonicalValue::Boolean(b) => {
                h.write_u8(1);
                h.write_bool(*b);
            }
            CanonicalValue::Text(s) => {
                h.write_u8(2);
                h.write_str(s);
            }
        }
    }
}

struct StableHasher {
    inner: Xxh3,
}

impl StableHasher {
    fn new() -> Self {
        Self {
            inner: Xxh3::with_seed(XXH3_SEED),
        }
    }

    fn write_bytes(&mut self, b: &[u8]) {
        self.inner.update(b);
    }

    fn write_u8(&mut self, v: u8) {
        self.write_bytes(&[v]);
    }

    fn write_bool(&mut self, v: bool) {
        self.write_u8(u8::from(v));
    }

    fn write_u32(&mut self, v: u32) {
        self.write_bytes(&v.to_le_bytes());
    }

    fn write_f64(&mut self, v: f64) {
        self.write_bytes(&v.to_bits().to_le_bytes());
    }

    // Length prefix keeps `("ab", "c")` distinct from `("a", "bc")`.
    fn write_str(&mut self, s: &str) {
        self.write_u32(s.len() as u32);
        self.write_bytes(s.as_bytes());
    }

    fn finish(self) -> Fingerprint {
        let v = self.inner.digest128();
        Fingerprint {
            hi: (v >> 64) as u64,
            lo: v as u64,
        }
    }
}

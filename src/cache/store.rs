use std::future::Future;

use crate::cache::fingerprint::CacheKey;
use crate::engine::{Artifact, EngineStats};

/// A cached render result.
#[derive(Clone, Debug, PartialEq)]
pub struct CacheEntry {
    /// Tier and canonical snapshot fingerprint.
    pub key: CacheKey,
    /// Shared artifact bytes.
    pub artifact: Artifact,
    /// Engine statistics of the render that produced the artifact.
    pub stats: EngineStats,
}

/// Artifact storage consulted before every engine submission.
///
/// Lookups may suspend so that persisted stores fit behind the same seam; the in-memory
/// [`PreviewCache`](crate::PreviewCache) resolves immediately.
pub trait ArtifactStore: Send + 'static {
    /// Look up `key`, refreshing its recency on a hit.
    fn get(&mut self, key: &CacheKey) -> impl Future<Output = Option<CacheEntry>> + Send;

    /// Store `entry`, evicting as needed.
    fn put(&mut self, entry: CacheEntry) -> impl Future<Output = ()> + Send;
}

//! Metadata enrichment hook run before a new entry is inserted

use async_trait::async_trait;
use shelf_core::FileEntry;

/// Metadata blobs attached to a catalog entry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    /// From the file itself (embedded tags, OPF, ...)
    pub local: Option<String>,
    /// From an online lookup
    pub web: Option<String>,
}

/// Looks up metadata for a freshly scanned entry
///
/// Failures are logged by the caller and never block insertion.
#[async_trait]
pub trait MetadataEnricher: Send + Sync {
    async fn enrich(&self, entry: &FileEntry) -> anyhow::Result<Metadata>;
}

/// Enricher that attaches nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEnricher;

#[async_trait]
impl MetadataEnricher for NoopEnricher {
    async fn enrich(&self, _entry: &FileEntry) -> anyhow::Result<Metadata> {
        Ok(Metadata::default())
    }
}

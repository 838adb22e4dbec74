use async_trait::async_trait;
use sekolah_utils::{RawRecords, SekolahResult};

/// A data source that extracts the complete raw record collection.
#[async_trait]
pub trait Source: Send + Sync {
    /// Human-readable name for logging and run history
    fn name(&self) -> &str;

    /// Read the whole collection. Must not filter or coerce anything.
    async fn extract(&self) -> SekolahResult<RawRecords>;
}

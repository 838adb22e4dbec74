use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sekolah_utils::error::Error;
use sekolah_utils::{RawRecords, SekolahResult};

use super::decode::decode_records;
use super::Source;

/// Reads the record collection from a JSON file on local disk.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Source for JsonFileSource {
    fn name(&self) -> &str { "json_file" }

    async fn extract(&self) -> SekolahResult<RawRecords> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(Error::NotFound(self.path.display().to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let records = decode_records(&bytes)?;
        tracing::debug!(path = %self.path.display(), records = records.len(), "extracted records");
        Ok(records)
    }
}

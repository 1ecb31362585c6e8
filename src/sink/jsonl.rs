//! JSON Lines sink
//!
//! Writes `<dir>/<resource>.jsonl`, one record per line. Records are first
//! written to a staging file next to the target; the target only changes
//! once the stream has been drained without error.

use super::types::{Sink, SinkOutcome};
use crate::error::{Error, Result, ResultExt};
use crate::types::{RecordStream, WriteDisposition};
use async_trait::async_trait;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::debug;

/// Sink writing JSON Lines files
#[derive(Debug, Clone)]
pub struct JsonlSink {
    dir: PathBuf,
}

impl JsonlSink {
    /// Sink writing below `dir`, created if missing
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create output directory '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    /// File holding `resource`
    pub fn path_for(&self, resource: &str) -> PathBuf {
        self.dir.join(format!("{resource}.jsonl"))
    }

    async fn stage(&self, staging: &Path, mut records: RecordStream) -> Result<u64> {
        let mut writer = BufWriter::new(File::create(staging).await?);
        let mut written = 0u64;

        while let Some(record) = records.next().await {
            let mut line = serde_json::to_vec(&record?)?;
            line.push(b'\n');
            writer.write_all(&line).await?;
            written += 1;
        }
        writer.flush().await?;
        Ok(written)
    }
}

#[async_trait]
impl Sink for JsonlSink {
    fn name(&self) -> &str {
        "jsonl"
    }

    async fn put(
        &self,
        resource: &str,
        disposition: WriteDisposition,
        records: RecordStream,
    ) -> Result<SinkOutcome> {
        if resource.is_empty() || resource.contains(['/', '\\', '.']) {
            return Err(Error::sink(format!("Invalid resource file name: '{resource}'")));
        }

        let target = self.path_for(resource);
        let staging = self.dir.join(format!(".{resource}.jsonl.staging"));

        let written = match self.stage(&staging, records).await {
            Ok(written) => written,
            Err(e) => {
                let _ = fs::remove_file(&staging).await;
                return Err(e);
            }
        };

        match disposition {
            WriteDisposition::Replace => fs::rename(&staging, &target).await?,
            // No key index on plain files: incremental loads append
            WriteDisposition::Append | WriteDisposition::Incremental => {
                let mut staged = File::open(&staging).await?;
                let mut out = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&target)
                    .await?;
                tokio::io::copy(&mut staged, &mut out).await?;
                out.flush().await?;
                fs::remove_file(&staging).await?;
            }
        }

        debug!(resource, path = %target.display(), written, "JSONL write complete");
        Ok(SinkOutcome::new(resource, disposition, written))
    }
}

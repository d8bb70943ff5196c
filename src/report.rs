//! Report writer: persists summaries as timestamped markdown files
//!
//! Reports are append-only. Concurrent writers never share a file name:
//! names carry the process id and a per-process sequence number, and files
//! are opened create-new so a clash moves on to the next sequence.

use chrono::{DateTime, Local, SecondsFormat, Utc};
use log::{debug, info, warn};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::digest::Digest;
use crate::error::{Result, ScopeError};

const MAX_NAME_ATTEMPTS: u32 = 64;

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// A generated summary together with the digest it came from
#[derive(Debug, Clone, Serialize)]
pub struct SummaryArtifact {
    /// Heading of the markdown document
    pub title: String,
    /// File name prefix
    pub slug: String,
    pub digest: Digest,
    pub generated_text: String,
    pub created_at: DateTime<Utc>,
}

impl SummaryArtifact {
    pub fn new(
        title: impl Into<String>,
        slug: impl Into<String>,
        digest: Digest,
        generated_text: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            slug: slug.into(),
            digest,
            generated_text: generated_text.into(),
            created_at: Utc::now(),
        }
    }

    /// Markdown document written to disk
    pub fn to_markdown(&self) -> String {
        let local: DateTime<Local> = self.created_at.into();
        format!(
            "# {}\n\n**Generated:** {}\n\n{}\n\n---\n\n## Source data\n\n```text\n{}\n```\n",
            self.title,
            local.format("%Y-%m-%d %H:%M:%S"),
            self.generated_text.trim(),
            self.digest.as_str().trim_end()
        )
    }
}

/// Timestamp safe for file names on every platform
pub fn sanitize_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
        .chars()
        .map(|c| match c {
            ':' | '.' | '/' | '\\' | '+' => '-',
            c => c,
        })
        .collect()
}

fn file_name(artifact: &SummaryArtifact, sequence: u64) -> String {
    format!(
        "{}_{}_{}-{:04}.md",
        artifact.slug,
        sanitize_timestamp(&artifact.created_at),
        std::process::id(),
        sequence
    )
}

/// Write `content` to a freshly created `path`, removing it if the write fails
async fn write_or_discard<W: AsyncWrite + Unpin>(out: &mut W, path: &Path, content: &[u8]) -> Result<()> {
    let written = match out.write_all(content).await {
        Ok(()) => out.flush().await,
        Err(e) => Err(e),
    };
    if let Err(e) = written {
        if let Err(rm) = tokio::fs::remove_file(path).await {
            warn!("Could not remove partial report {}: {}", path.display(), rm);
        }
        return Err(ScopeError::Storage(format!("cannot write {}: {}", path.display(), e)));
    }
    Ok(())
}

/// Writes artifacts into one flat directory
#[derive(Debug, Clone)]
pub struct ReportWriter {
    dir: PathBuf,
}

impl ReportWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persist `artifact` and return the path written
    pub async fn write(&self, artifact: &SummaryArtifact) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| ScopeError::Storage(format!("cannot create {}: {}", self.dir.display(), e)))?;

        let content = artifact.to_markdown();
        for _ in 0..MAX_NAME_ATTEMPTS {
            let path = self.dir.join(file_name(artifact, SEQUENCE.fetch_add(1, Ordering::Relaxed)));
            let open = tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await;

            let mut file = match open {
                Ok(file) => file,
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    debug!("Report name {} taken, trying next", path.display());
                    continue;
                }
                Err(e) => {
                    return Err(ScopeError::Storage(format!("cannot create {}: {}", path.display(), e)));
                }
            };

            write_or_discard(&mut file, &path, content.as_bytes()).await?;

            info!("Report saved to {}", path.display());
            return Ok(path);
        }

        Err(ScopeError::Storage(format!(
            "no free report name in {} after {} attempts",
            self.dir.display(),
            MAX_NAME_ATTEMPTS
        )))
    }
}

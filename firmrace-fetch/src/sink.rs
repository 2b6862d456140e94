//! Artifact sinks.
//!
//! A winning body streams into an [`ArtifactSink`], which writes to a
//! hidden temporary location. Finishing a sink yields a [`StagedArtifact`];
//! only the race coordinator commits one staged artifact under the final
//! name, so no partial or redundant download is ever visible there.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::error::SinkError;

// ============================================================================
// Sink Traits
// ============================================================================

/// A writable artifact destination for one attempt.
#[async_trait]
pub trait ArtifactSink: Send {
    /// Appends a chunk.
    async fn write(&mut self, chunk: &[u8]) -> Result<(), SinkError>;

    /// Completes the write and stages the artifact for commit.
    async fn finish(self: Box<Self>) -> Result<Box<dyn StagedArtifact>, SinkError>;

    /// Drops the partial output. Best effort; never fails.
    async fn discard(self: Box<Self>);
}

/// A fully written artifact awaiting commit or discard.
#[async_trait]
pub trait StagedArtifact: Send {
    /// Total bytes written.
    fn bytes_written(&self) -> u64;

    /// Publishes the artifact under its final name.
    ///
    /// Returns the final path for disk-backed sinks, `None` otherwise.
    async fn commit(self: Box<Self>) -> Result<Option<PathBuf>, SinkError>;

    /// Drops the staged output. Best effort; never fails.
    async fn discard(self: Box<Self>);
}

/// Opens sinks for attempts.
#[async_trait]
pub trait SinkFactory: Send + Sync {
    /// Opens a sink for the artifact `name`.
    async fn open(&self, name: &str) -> Result<Box<dyn ArtifactSink>, SinkError>;
}

// ============================================================================
// File Sink
// ============================================================================

/// Disk-backed sink factory writing into a target directory.
///
/// Each sink writes to `.{name}.part{n}` and a commit renames it to
/// `{name}`, so a previously completed artifact of the same name is
/// replaced atomically and never corrupted by a cancelled attempt.
#[derive(Debug)]
pub struct FileSinkFactory {
    dir: PathBuf,
    sequence: AtomicU64,
}

impl FileSinkFactory {
    /// Creates a factory writing into `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            sequence: AtomicU64::new(0),
        }
    }
}

#[async_trait]
impl SinkFactory for FileSinkFactory {
    async fn open(&self, name: &str) -> Result<Box<dyn ArtifactSink>, SinkError> {
        if name.is_empty() || name.contains(['/', '\\']) {
            return Err(SinkError::InvalidName(name.to_string()));
        }

        fs::create_dir_all(&self.dir).await?;

        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        let temp_path = self.dir.join(format!(".{name}.part{seq}"));
        let final_path = self.dir.join(name);
        let file = fs::File::create(&temp_path).await?;

        debug!(temp = %temp_path.display(), "Opened artifact sink");

        Ok(Box::new(FileSink {
            file,
            temp_path,
            final_path,
            bytes_written: 0,
        }))
    }
}

struct FileSink {
    file: fs::File,
    temp_path: PathBuf,
    final_path: PathBuf,
    bytes_written: u64,
}

#[async_trait]
impl ArtifactSink for FileSink {
    async fn write(&mut self, chunk: &[u8]) -> Result<(), SinkError> {
        self.file.write_all(chunk).await?;
        self.bytes_written += chunk.len() as u64;
        Ok(())
    }

    async fn finish(mut self: Box<Self>) -> Result<Box<dyn StagedArtifact>, SinkError> {
        self.file.flush().await?;
        self.file.sync_all().await?;
        Ok(Box::new(StagedFile {
            temp_path: self.temp_path,
            final_path: self.final_path,
            bytes_written: self.bytes_written,
        }))
    }

    async fn discard(self: Box<Self>) {
        drop(self.file);
        if let Err(e) = fs::remove_file(&self.temp_path).await {
            warn!(path = %self.temp_path.display(), error = %e, "Failed to remove partial file");
        }
    }
}

struct StagedFile {
    temp_path: PathBuf,
    final_path: PathBuf,
    bytes_written: u64,
}

#[async_trait]
impl StagedArtifact for StagedFile {
    fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    async fn commit(self: Box<Self>) -> Result<Option<PathBuf>, SinkError> {
        fs::rename(&self.temp_path, &self.final_path).await?;
        debug!(path = %self.final_path.display(), "Committed artifact");
        Ok(Some(self.final_path))
    }

    async fn discard(self: Box<Self>) {
        if let Err(e) = fs::remove_file(&self.temp_path).await {
            warn!(path = %self.temp_path.display(), error = %e, "Failed to remove staged file");
        }
    }
}

// ============================================================================
// Memory Sink
// ============================================================================

/// In-memory sink factory for tests and dry runs.
///
/// Counts commits and discards so tests can assert the at-most-one-winner
/// property without touching the filesystem.
#[derive(Debug, Default)]
pub struct MemorySinkFactory {
    commits: Arc<AtomicUsize>,
    discards: Arc<AtomicUsize>,
}

impl MemorySinkFactory {
    /// Creates a new in-memory sink factory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of staged artifacts committed so far.
    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    /// Number of sinks or staged artifacts discarded so far.
    pub fn discard_count(&self) -> usize {
        self.discards.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SinkFactory for MemorySinkFactory {
    async fn open(&self, _name: &str) -> Result<Box<dyn ArtifactSink>, SinkError> {
        Ok(Box::new(MemorySink {
            bytes_written: 0,
            commits: Arc::clone(&self.commits),
            discards: Arc::clone(&self.discards),
        }))
    }
}

struct MemorySink {
    bytes_written: u64,
    commits: Arc<AtomicUsize>,
    discards: Arc<AtomicUsize>,
}

#[async_trait]
impl ArtifactSink for MemorySink {
    async fn write(&mut self, chunk: &[u8]) -> Result<(), SinkError> {
        self.bytes_written += chunk.len() as u64;
        Ok(())
    }

    async fn finish(self: Box<Self>) -> Result<Box<dyn StagedArtifact>, SinkError> {
        Ok(Box::new(StagedMemory {
            bytes_written: self.bytes_written,
            commits: self.commits,
            discards: self.discards,
        }))
    }

    async fn discard(self: Box<Self>) {
        self.discards.fetch_add(1, Ordering::SeqCst);
    }
}

struct StagedMemory {
    bytes_written: u64,
    commits: Arc<AtomicUsize>,
    discards: Arc<AtomicUsize>,
}

#[async_trait]
impl StagedArtifact for StagedMemory {
    fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    async fn commit(self: Box<Self>) -> Result<Option<PathBuf>, SinkError> {
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(None)
    }

    async fn discard(self: Box<Self>) {
        self.discards.fetch_add(1, Ordering::SeqCst);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_file_sink_commit_renames() {
        let dir = tempfile::tempdir().unwrap();
        let factory = FileSinkFactory::new(dir.path());

        let mut sink = factory.open("fw.zip").await.unwrap();
        sink.write(b"hello ").await.unwrap();
        sink.write(b"world").await.unwrap();
        let staged = sink.finish().await.unwrap();
        assert_eq!(staged.bytes_written(), 11);

        // Not visible under the final name until commit.
        assert!(!dir.path().join("fw.zip").exists());

        let path = staged.commit().await.unwrap().unwrap();
        assert_eq!(path, dir.path().join("fw.zip"));
        assert_eq!(std::fs::read(&path).unwrap(), b"hello world");
    }

    #[tokio::test]
    async fn test_file_sink_discard_removes_partial() {
        let dir = tempfile::tempdir().unwrap();
        let factory = FileSinkFactory::new(dir.path());

        let mut sink = factory.open("fw.zip").await.unwrap();
        sink.write(b"partial").await.unwrap();
        sink.discard().await;

        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert!(entries.is_empty(), "partial file left behind");
    }

    #[tokio::test]
    async fn test_staged_discard_keeps_prior_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let factory = FileSinkFactory::new(dir.path());

        // First winner commits.
        let mut sink = factory.open("fw.zip").await.unwrap();
        sink.write(b"winner").await.unwrap();
        let staged = sink.finish().await.unwrap();
        staged.commit().await.unwrap();

        // A redundant success is staged then discarded.
        let mut sink = factory.open("fw.zip").await.unwrap();
        sink.write(b"redundant").await.unwrap();
        let staged = sink.finish().await.unwrap();
        staged.discard().await;

        assert_eq!(
            std::fs::read(dir.path().join("fw.zip")).unwrap(),
            b"winner"
        );
    }

    #[tokio::test]
    async fn test_rejects_path_separators_in_name() {
        let dir = tempfile::tempdir().unwrap();
        let factory = FileSinkFactory::new(dir.path());
        assert!(factory.open("../evil.zip").await.is_err());
        assert!(factory.open("").await.is_err());
    }

    #[tokio::test]
    async fn test_memory_sink_counts() {
        let factory = MemorySinkFactory::new();

        let mut sink = factory.open("fw.zip").await.unwrap();
        sink.write(&[0u8; 100]).await.unwrap();
        let staged = sink.finish().await.unwrap();
        assert_eq!(staged.bytes_written(), 100);
        staged.commit().await.unwrap();

        let sink = factory.open("fw.zip").await.unwrap();
        sink.discard().await;

        assert_eq!(factory.commit_count(), 1);
        assert_eq!(factory.discard_count(), 1);
    }
}

///! Card export orchestration
///!
///! Renders cards in export mode, snapshots them and either hands back a
///! single PNG or bundles every card of the directory into one zip.

use futures::{StreamExt, TryStreamExt, stream};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use super::archive::CardArchive;
use super::busy::{BusyFlag, ExportProgress, ExportStatus};
use crate::config::ExportConfig;
use crate::module::card::{CardRenderer, Snapshotter};
use crate::module::member::MemberRecord;

/// Shown to users when an export fails; the cause goes to the log.
pub const EXPORT_FAILED_MESSAGE: &str = "Export failed, please try again.";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("an export is already in progress")]
    Busy,

    #[error("no member is selected")]
    NothingSelected,

    #[error("the member directory is empty")]
    EmptyDirectory,

    #[error("snapshot of {name} failed: {reason}")]
    Snapshot { name: String, reason: String },

    #[error("archive serialization failed: {0}")]
    Archive(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Upper bound on cards being snapshotted at once; 1 is strictly sequential
    pub concurrency: usize,
    pub settle_delay: Duration,
    pub single_file_prefix: String,
    pub archive_name: String,
    pub compress: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self::from(&ExportConfig::default())
    }
}

impl From<&ExportConfig> for ExportOptions {
    fn from(config: &ExportConfig) -> Self {
        Self {
            concurrency: config.concurrency.max(1),
            settle_delay: Duration::from_millis(config.settle_delay_ms),
            single_file_prefix: config.single_file_prefix.clone(),
            archive_name: config.archive_name.clone(),
            compress: config.compress,
        }
    }
}

/// A finished export, ready to be saved or downloaded
#[derive(Debug, Clone)]
pub struct ExportArtifact {
    pub file_name: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

impl ExportArtifact {
    /// Write into `dir`, creating it if needed
    pub async fn save_to(&self, dir: impl AsRef<Path>) -> Result<PathBuf, ExportError> {
        let dir = dir.as_ref();
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(&self.file_name);
        tokio::fs::write(&path, &self.bytes).await?;
        tracing::info!("Saved {:?} ({} bytes)", path, self.bytes.len());
        Ok(path)
    }
}

/// Export orchestrator
pub struct ExportOrchestrator {
    renderer: Arc<CardRenderer>,
    snapshotter: Arc<dyn Snapshotter>,
    busy: BusyFlag,
    progress: ExportProgress,
    options: ExportOptions,
}

impl ExportOrchestrator {
    pub fn new(renderer: Arc<CardRenderer>, snapshotter: Arc<dyn Snapshotter>, options: ExportOptions) -> Self {
        Self {
            renderer,
            snapshotter,
            busy: BusyFlag::new(),
            progress: ExportProgress::default(),
            options,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.is_busy()
    }

    pub fn status(&self) -> ExportStatus {
        self.progress.status(self.busy.is_busy())
    }

    pub fn options(&self) -> &ExportOptions {
        &self.options
    }

    /// Export one member's card as `<prefix><displayName>.png`, with path
    /// separators in the name replaced
    pub async fn export_one(&self, record: &MemberRecord) -> Result<ExportArtifact, ExportError> {
        let _guard = self.busy.try_acquire().ok_or(ExportError::Busy)?;
        let job = Uuid::now_v7();
        tracing::info!(%job, "Exporting card for {}", record.display_name);

        self.progress.start(1);
        let result = self.capture(record).await.map(|png| {
            self.progress.advance();
            ExportArtifact {
                file_name: format!(
                    "{}{}",
                    self.options.single_file_prefix,
                    CardArchive::entry_name(&record.display_name)
                ),
                content_type: "image/png",
                bytes: png,
            }
        });

        self.conclude(job, result)
    }

    /// Export every member into one zip, entries in directory order.
    ///
    /// At most `concurrency` cards are in flight; results are consumed in
    /// order, so the archive never depends on completion order. The first
    /// failure stops the run.
    pub async fn export_all(&self, records: &[MemberRecord]) -> Result<ExportArtifact, ExportError> {
        if records.is_empty() {
            return Err(ExportError::EmptyDirectory);
        }
        let _guard = self.busy.try_acquire().ok_or(ExportError::Busy)?;
        let job = Uuid::now_v7();
        tracing::info!(
            %job,
            "Exporting {} cards (concurrency {})",
            records.len(),
            self.options.concurrency
        );

        self.progress.start(records.len());
        let result = self.build_archive(records).await.map(|bytes| ExportArtifact {
            file_name: self.options.archive_name.clone(),
            content_type: "application/zip",
            bytes,
        });

        self.conclude(job, result)
    }

    async fn build_archive(&self, records: &[MemberRecord]) -> Result<Vec<u8>, ExportError> {
        let mut snapshots = stream::iter(records.iter().cloned())
            .map(|record| async move {
                let png = self.capture(&record).await?;
                Ok::<_, ExportError>((record, png))
            })
            .buffered(self.options.concurrency.max(1));

        let mut archive = CardArchive::new(self.options.compress);
        while let Some((record, png)) = snapshots.try_next().await? {
            archive.insert(CardArchive::entry_name(&record.display_name), png);
            self.progress.advance();
        }
        tracing::debug!("Serializing archive with {} entries", archive.len());

        tokio::task::spawn_blocking(move || archive.finish())
            .await
            .map_err(|e| ExportError::Archive(e.to_string()))?
            .map_err(|e| ExportError::Archive(e.to_string()))
    }

    /// Render in export mode (photo embedded) and snapshot
    async fn capture(&self, record: &MemberRecord) -> Result<Vec<u8>, ExportError> {
        let view = self.renderer.render_export(record).await;

        if !self.options.settle_delay.is_zero() {
            tokio::time::sleep(self.options.settle_delay).await;
        }

        self.snapshotter
            .snapshot(&view)
            .await
            .map_err(|e| ExportError::Snapshot {
                name: record.display_name.clone(),
                reason: e.to_string(),
            })
    }

    fn conclude(&self, job: Uuid, result: Result<ExportArtifact, ExportError>) -> Result<ExportArtifact, ExportError> {
        match &result {
            Ok(artifact) => {
                tracing::info!(%job, "Export finished: {} ({} bytes)", artifact.file_name, artifact.bytes.len());
            }
            Err(e) => {
                tracing::error!(%job, "Export failed: {}", e);
                self.progress.fail(EXPORT_FAILED_MESSAGE);
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CardConfig;
    use crate::module::card::{CardView, RenderMode, SnapshotError};
    use async_trait::async_trait;
    use std::io::{Cursor, Read};
    use std::sync::Mutex;

    /// Records snapshot order and returns the display name as image bytes.
    #[derive(Default)]
    struct RecordingSnapshotter {
        calls: Mutex<Vec<String>>,
        fail_on: Option<String>,
        /// Earlier cards take longer, to expose completion-order bugs
        staggered: bool,
    }

    #[async_trait]
    impl Snapshotter for RecordingSnapshotter {
        async fn snapshot(&self, card: &CardView) -> Result<Vec<u8>, SnapshotError> {
            assert_eq!(card.mode, RenderMode::Export);
            let position = {
                let mut calls = self.calls.lock().unwrap();
                calls.push(card.display_name.clone());
                calls.len()
            };
            if self.staggered {
                tokio::time::sleep(Duration::from_millis(40 / position as u64)).await;
            }
            if self.fail_on.as_deref() == Some(card.display_name.as_str()) {
                return Err(SnapshotError::Encode("stub failure".to_string()));
            }
            Ok(card.display_name.as_bytes().to_vec())
        }
    }

    fn record(name: &str) -> MemberRecord {
        MemberRecord {
            display_name: name.to_string(),
            reading: String::new(),
            accent_color: String::new(),
            cohort: "1期".to_string(),
            region: "関東".to_string(),
            image_file_name: String::new(),
            ability_text: String::new(),
            team: false,
        }
    }

    fn orchestrator(snapshotter: Arc<RecordingSnapshotter>, concurrency: usize) -> ExportOrchestrator {
        let renderer = Arc::new(CardRenderer::new(&CardConfig::default()).unwrap());
        let options = ExportOptions {
            concurrency,
            ..Default::default()
        };
        ExportOrchestrator::new(renderer, snapshotter, options)
    }

    fn zip_entries(bytes: Vec<u8>) -> Vec<(String, String)> {
        let mut zip = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        (0..zip.len())
            .map(|i| {
                let mut entry = zip.by_index(i).unwrap();
                let mut content = String::new();
                entry.read_to_string(&mut content).unwrap();
                (entry.name().to_string(), content)
            })
            .collect()
    }

    #[tokio::test]
    async fn test_export_all_in_directory_order() {
        let snap = Arc::new(RecordingSnapshotter::default());
        let orch = orchestrator(snap.clone(), 1);
        let records = vec![record("あおい"), record("ひかり"), record("みるく")];

        let artifact = orch.export_all(&records).await.unwrap();
        assert_eq!(artifact.file_name, "student_ids.zip");
        assert_eq!(artifact.content_type, "application/zip");

        assert_eq!(*snap.calls.lock().unwrap(), vec!["あおい", "ひかり", "みるく"]);
        assert_eq!(
            zip_entries(artifact.bytes),
            vec![
                ("あおい.png".to_string(), "あおい".to_string()),
                ("ひかり.png".to_string(), "ひかり".to_string()),
                ("みるく.png".to_string(), "みるく".to_string()),
            ]
        );
        assert!(!orch.is_busy());
        assert_eq!(orch.status().done, 3);
    }

    #[tokio::test]
    async fn test_concurrent_export_keeps_order() {
        let snap = Arc::new(RecordingSnapshotter {
            staggered: true,
            ..Default::default()
        });
        let orch = orchestrator(snap, 3);
        let records = vec![record("a"), record("b"), record("c"), record("d")];

        let artifact = orch.export_all(&records).await.unwrap();
        let names: Vec<String> = zip_entries(artifact.bytes).into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["a.png", "b.png", "c.png", "d.png"]);
    }

    #[tokio::test]
    async fn test_duplicate_names_collapse() {
        let snap = Arc::new(RecordingSnapshotter::default());
        let orch = orchestrator(snap, 1);
        let artifact = orch
            .export_all(&[record("a"), record("b"), record("a")])
            .await
            .unwrap();
        assert_eq!(zip_entries(artifact.bytes).len(), 2);
    }

    #[tokio::test]
    async fn test_failure_clears_busy_and_stops() {
        let snap = Arc::new(RecordingSnapshotter {
            fail_on: Some("b".to_string()),
            ..Default::default()
        });
        let orch = orchestrator(snap.clone(), 1);

        let err = orch
            .export_all(&[record("a"), record("b"), record("c")])
            .await
            .unwrap_err();
        assert!(matches!(err, ExportError::Snapshot { ref name, .. } if name == "b"));

        assert!(!orch.is_busy());
        assert_eq!(*snap.calls.lock().unwrap(), vec!["a", "b"]);

        let status = orch.status();
        assert_eq!(status.done, 1);
        assert_eq!(status.last_error.as_deref(), Some(EXPORT_FAILED_MESSAGE));
    }

    #[tokio::test]
    async fn test_export_one() {
        let snap = Arc::new(RecordingSnapshotter::default());
        let orch = orchestrator(snap.clone(), 1);

        let artifact = orch.export_one(&record("みるく")).await.unwrap();
        assert_eq!(artifact.file_name, "student-id-みるく.png");
        assert_eq!(artifact.content_type, "image/png");
        assert_eq!(artifact.bytes, "みるく".as_bytes());
        assert_eq!(orch.status().last_error, None);
    }

    #[tokio::test]
    async fn test_busy_rejects_second_export() {
        let snap = Arc::new(RecordingSnapshotter::default());
        let orch = orchestrator(snap.clone(), 1);

        let guard = orch.busy.try_acquire().unwrap();
        assert!(matches!(orch.export_one(&record("a")).await, Err(ExportError::Busy)));
        assert!(matches!(orch.export_all(&[record("a")]).await, Err(ExportError::Busy)));
        assert!(snap.calls.lock().unwrap().is_empty());
        drop(guard);

        assert!(orch.export_one(&record("a")).await.is_ok());
    }

    #[tokio::test]
    async fn test_empty_directory() {
        let orch = orchestrator(Arc::new(RecordingSnapshotter::default()), 1);
        assert!(matches!(orch.export_all(&[]).await, Err(ExportError::EmptyDirectory)));
        assert!(!orch.is_busy());
    }

    #[tokio::test]
    async fn test_artifact_save_to() {
        let tmp = tempfile::tempdir().unwrap();
        let artifact = ExportArtifact {
            file_name: "student-id-a.png".to_string(),
            content_type: "image/png",
            bytes: vec![1, 2, 3],
        };
        let path = artifact.save_to(tmp.path().join("out")).await.unwrap();
        assert_eq!(tokio::fs::read(path).await.unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_save_to_unwritable_dir_is_io_error() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("not-a-dir");
        tokio::fs::write(&blocker, b"x").await.unwrap();

        let artifact = ExportArtifact {
            file_name: "a.png".to_string(),
            content_type: "image/png",
            bytes: vec![1],
        };
        assert!(matches!(artifact.save_to(&blocker).await, Err(ExportError::Io(_))));
    }

    #[tokio::test]
    async fn test_export_one_name_with_separators() {
        let snap = Arc::new(RecordingSnapshotter::default());
        let orch = orchestrator(snap, 1);

        let artifact = orch.export_one(&record("AC/DC\\live")).await.unwrap();
        assert_eq!(artifact.file_name, "student-id-AC_DC_live.png");

        let tmp = tempfile::tempdir().unwrap();
        let path = artifact.save_to(tmp.path()).await.unwrap();
        assert_eq!(path, tmp.path().join("student-id-AC_DC_live.png"));
        assert!(path.exists());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_export_all_runs_on_spawned_task() {
        let snap = Arc::new(RecordingSnapshotter {
            staggered: true,
            ..Default::default()
        });
        let orch = Arc::new(orchestrator(snap, 2));
        let records = vec![record("a"), record("b"), record("c")];

        let handle = tokio::spawn({
            let orch = orch.clone();
            async move { orch.export_all(&records).await }
        });
        let artifact = handle.await.unwrap().unwrap();

        let names: Vec<String> = zip_entries(artifact.bytes).into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["a.png", "b.png", "c.png"]);
        assert!(!orch.is_busy());
    }
}

// s3-offload/src/upload/mod.rs
pub mod s3_upload;
pub mod scanner;
pub mod skip;
pub mod store;

use std::sync::Arc;

use crate::config::UploadSettings;
use crate::errors::{AppError, Result};
use crate::output::Output;
use s3_upload::S3Store;
use scanner::{FileCandidate, Scanner, parse_size_threshold};
use skip::SkipEvaluator;
use store::{ObjectAcl, ObjectStore};

/// Lifecycle of an [`Uploader`]. `Idle` means nothing is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Scanning,
    Uploading,
    Done,
    Failed,
}

/// Counters reported at the end of an upload pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub queued: usize,
    pub uploaded: usize,
    pub skipped: usize,
    pub deleted: usize,
}

/// Scans a directory into a queue, then pushes the queue to an [`ObjectStore`].
pub struct Uploader {
    settings: UploadSettings,
    store: Arc<dyn ObjectStore>,
    output: Output,
    queue: Vec<FileCandidate>,
    state: RunState,
}

impl Uploader {
    pub fn new(settings: UploadSettings, store: Arc<dyn ObjectStore>, output: Output) -> Self {
        Self {
            settings,
            store,
            output,
            queue: Vec::new(),
            state: RunState::Idle,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn queue(&self) -> &[FileCandidate] {
        &self.queue
    }

    /// Empties the queue and returns how many candidates it held.
    pub fn clear(&mut self) -> usize {
        let cleared = self.queue.len();
        self.queue.clear();
        self.output.debug(format!(
            "Cleared {{count:{cleared}}} queued {{pluralize:{cleared}:file}}"
        ));
        cleared
    }

    /// Appends every candidate found under the configured path to the queue.
    ///
    /// Returns the number of candidates this scan added.
    pub fn scan(&mut self) -> Result<usize> {
        self.state = RunState::Scanning;
        match self.enqueue_candidates() {
            Ok(found) => {
                self.state = RunState::Idle;
                Ok(found)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    fn enqueue_candidates(&mut self) -> Result<usize> {
        let settings = &self.settings;
        self.output
            .debug(format!("Scanning {} for large files", settings.path.display()));
        self.output
            .debug(format!("Size threshold: {}", settings.size_threshold));
        if let Some(limit) = settings.limit {
            self.output
                .debug(format!("Limit: {{count:{limit}}} {{pluralize:{limit}:file}}"));
        }

        let min_size = parse_size_threshold(&settings.size_threshold)?;
        let scan = Scanner::new(&settings.path, min_size, settings.limit).scan();

        let mut found = 0;
        for candidate in self.output.track_progress(scan) {
            let candidate = candidate?;
            self.output.debug(format!(
                "Queued {} ({{count:{}}} bytes)",
                candidate.relative_path, candidate.size
            ));
            self.queue.push(candidate);
            found += 1;
        }

        self.output.success(format!(
            "Found {{count:{found}}} {{pluralize:{found}:file}} of at least {}",
            settings.size_threshold
        ));
        Ok(found)
    }

    /// Uploads the queue in order, stopping at the first failure.
    ///
    /// Files that are skipped as up to date are still deleted locally when deletion is on.
    pub async fn upload(&mut self) -> Result<RunSummary> {
        self.state = RunState::Uploading;
        match self.transfer_queue().await {
            Ok(summary) => {
                self.state = RunState::Done;
                Ok(summary)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    async fn transfer_queue(&self) -> Result<RunSummary> {
        let bucket = self.settings.s3.bucket_name.as_str();
        let skip = SkipEvaluator::new(self.settings.skip_up_to_date);
        let queued = self.queue.len();
        let mut summary = RunSummary {
            queued,
            ..RunSummary::default()
        };

        self.output.debug(format!(
            "Uploading {{count:{queued}}} {{pluralize:{queued}:file}} to bucket {bucket}"
        ));
        let mut progress = self.output.progress(Some(queued as u64));

        for candidate in &self.queue {
            if skip.should_skip(self.store.as_ref(), bucket, candidate).await? {
                self.output
                    .debug(format!("Skipped {}: remote copy is up to date", candidate.relative_path));
                summary.skipped += 1;
            } else {
                let url = self
                    .store
                    .put_object(bucket, &candidate.relative_path, &candidate.path, ObjectAcl::PublicRead)
                    .await?;
                self.output
                    .success(format!("Uploaded {} to {}", candidate.relative_path, url));
                summary.uploaded += 1;
            }

            if self.settings.delete {
                self.delete_local(candidate).await?;
                summary.deleted += 1;
            }
            progress.advance();
        }
        progress.finish();

        self.output.success(format!(
            "Uploaded {{count:{}}} {{pluralize:{}:file}}, skipped {{count:{}}}, deleted {{count:{}}} of {{count:{}}} queued",
            summary.uploaded, summary.uploaded, summary.skipped, summary.deleted, summary.queued
        ));
        Ok(summary)
    }

    async fn delete_local(&self, candidate: &FileCandidate) -> Result<()> {
        tokio::fs::remove_file(&candidate.path)
            .await
            .map_err(|source| AppError::CouldNotDeleteFile {
                path: candidate.relative_path.clone(),
                source,
            })?;
        self.output
            .debug(format!("Deleted local file {}", candidate.path.display()));
        Ok(())
    }

    fn fail(&mut self, err: AppError) -> AppError {
        self.state = RunState::Failed;
        self.output.exception(&err);
        err
    }
}

/// Scans and uploads with an S3 backend built from `settings`.
pub async fn run_upload_flow(settings: UploadSettings, output: Output) -> Result<RunSummary> {
    let store = S3Store::connect(&settings.s3).await;
    let mut uploader = Uploader::new(settings, Arc::new(store), output);
    uploader.scan()?;
    uploader.upload().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::S3Config;
    use crate::errors::StorageError;
    use crate::output::{LogLevel, LogSink};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// In-memory store that records every call.
    #[derive(Default)]
    struct RecordingStore {
        objects: Mutex<HashMap<String, i64>>,
        puts: Mutex<Vec<String>>,
        heads: Mutex<Vec<String>>,
        fail_puts: bool,
        /// Removes the local file during upload, so a later delete fails.
        consume_sources: bool,
    }

    impl RecordingStore {
        fn with_object(self, key: &str, length: i64) -> Self {
            self.objects.lock().unwrap().insert(key.to_string(), length);
            self
        }

        fn puts(&self) -> Vec<String> {
            self.puts.lock().unwrap().clone()
        }

        fn heads(&self) -> Vec<String> {
            self.heads.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ObjectStore for RecordingStore {
        async fn put_object(
            &self,
            bucket: &str,
            key: &str,
            source: &Path,
            acl: ObjectAcl,
        ) -> std::result::Result<String, StorageError> {
            assert_eq!(acl, ObjectAcl::PublicRead);
            if self.fail_puts {
                return Err(format!("upload of {} refused", key).into());
            }
            let length = fs::metadata(source)?.len() as i64;
            if self.consume_sources {
                fs::remove_file(source)?;
            }
            self.objects.lock().unwrap().insert(key.to_string(), length);
            self.puts.lock().unwrap().push(key.to_string());
            Ok(format!("https://{}.example/{}", bucket, key))
        }

        async fn object_exists(
            &self,
            _bucket: &str,
            key: &str,
        ) -> std::result::Result<bool, StorageError> {
            Ok(self.objects.lock().unwrap().contains_key(key))
        }

        async fn head_object_length(
            &self,
            _bucket: &str,
            key: &str,
        ) -> std::result::Result<Option<i64>, StorageError> {
            self.heads.lock().unwrap().push(key.to_string());
            Ok(self.objects.lock().unwrap().get(key).copied())
        }
    }

    #[derive(Clone, Default)]
    struct CapturedLog {
        entries: Arc<Mutex<Vec<(LogLevel, String)>>>,
    }

    impl CapturedLog {
        fn messages(&self, level: LogLevel) -> Vec<String> {
            self.entries
                .lock()
                .unwrap()
                .iter()
                .filter(|(l, _)| *l == level)
                .map(|(_, m)| m.clone())
                .collect()
        }
    }

    impl LogSink for CapturedLog {
        fn log(&self, level: LogLevel, message: &str) {
            self.entries
                .lock()
                .unwrap()
                .push((level, message.to_string()));
        }
    }

    fn write_sized(dir: &Path, name: &str, size: usize) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, vec![7u8; size]).unwrap();
        path
    }

    fn settings(root: &Path, size_threshold: &str) -> UploadSettings {
        UploadSettings {
            path: root.to_path_buf(),
            size_threshold: size_threshold.to_string(),
            delete: false,
            limit: None,
            skip_up_to_date: false,
            s3: S3Config {
                region: "us-east-1".to_string(),
                bucket_name: "media".to_string(),
                access_key_id: "AKIDEXAMPLE".to_string(),
                secret_access_key: "secret".to_string(),
            },
        }
    }

    fn uploader(settings: UploadSettings, store: &Arc<RecordingStore>) -> (Uploader, CapturedLog) {
        let log = CapturedLog::default();
        let output = Output::new(None, Some(Box::new(log.clone())));
        let store: Arc<dyn ObjectStore> = store.clone();
        (Uploader::new(settings, store, output), log)
    }

    #[tokio::test]
    async fn test_uploads_only_files_over_threshold() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        write_sized(dir.path(), "big.bin", 2 * 1024 * 1024);
        write_sized(dir.path(), "small.bin", 500 * 1024);

        let store = Arc::new(RecordingStore::default());
        let (mut uploader, log) = uploader(settings(dir.path(), "1m"), &store);

        assert_eq!(uploader.scan()?, 1);
        assert_eq!(uploader.state(), RunState::Idle);
        assert_eq!(uploader.queue().len(), 1);

        let summary = uploader.upload().await?;
        assert_eq!(
            summary,
            RunSummary {
                queued: 1,
                uploaded: 1,
                skipped: 0,
                deleted: 0
            }
        );
        assert_eq!(uploader.state(), RunState::Done);
        assert_eq!(store.puts(), vec!["big.bin"]);
        assert!(dir.path().join("big.bin").exists());
        assert!(
            log.messages(LogLevel::Info)
                .contains(&"Uploaded big.bin to https://media.example/big.bin".to_string())
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_uploads_in_queue_order() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        fs::create_dir(dir.path().join("nested"))?;
        write_sized(dir.path(), "b.bin", 10);
        write_sized(dir.path(), "a.bin", 10);
        write_sized(&dir.path().join("nested"), "c.bin", 10);

        let store = Arc::new(RecordingStore::default());
        let (mut uploader, _log) = uploader(settings(dir.path(), "1"), &store);
        uploader.scan()?;
        uploader.upload().await?;

        assert_eq!(store.puts(), vec!["a.bin", "b.bin", "nested/c.bin"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_removes_uploaded_files() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let big = write_sized(dir.path(), "big.bin", 2_000);
        let small = write_sized(dir.path(), "small.bin", 20);

        let mut settings = settings(dir.path(), "1k");
        settings.delete = true;
        let store = Arc::new(RecordingStore::default());
        let (mut uploader, _log) = uploader(settings, &store);
        uploader.scan()?;
        let summary = uploader.upload().await?;

        assert_eq!(summary.uploaded, 1);
        assert_eq!(summary.deleted, 1);
        assert!(!big.exists());
        assert!(small.exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_skip_up_to_date_compares_lengths() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        write_sized(dir.path(), "same.bin", 300);
        write_sized(dir.path(), "stale.bin", 300);

        let store = Arc::new(
            RecordingStore::default()
                .with_object("same.bin", 300)
                .with_object("stale.bin", 299),
        );
        let mut settings = settings(dir.path(), "100");
        settings.skip_up_to_date = true;
        let (mut uploader, _log) = uploader(settings, &store);
        uploader.scan()?;
        let summary = uploader.upload().await?;

        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.uploaded, 1);
        assert_eq!(store.puts(), vec!["stale.bin"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_summary_reports_queued_total() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        write_sized(dir.path(), "same.bin", 300);
        write_sized(dir.path(), "new.bin", 300);
        write_sized(dir.path(), "other.bin", 300);

        let store = Arc::new(RecordingStore::default().with_object("same.bin", 300));
        let mut settings = settings(dir.path(), "100");
        settings.skip_up_to_date = true;
        let (mut uploader, log) = uploader(settings, &store);
        uploader.scan()?;
        let summary = uploader.upload().await?;

        assert_eq!(summary.queued, 3);
        assert_eq!(
            log.messages(LogLevel::Info).last().map(String::as_str),
            Some("Uploaded 2 files, skipped 1, deleted 0 of 3 queued")
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_skipped_files_are_still_deleted() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let same = write_sized(dir.path(), "same.bin", 300);

        let store = Arc::new(RecordingStore::default().with_object("same.bin", 300));
        let mut settings = settings(dir.path(), "100");
        settings.skip_up_to_date = true;
        settings.delete = true;
        let (mut uploader, _log) = uploader(settings, &store);
        uploader.scan()?;
        let summary = uploader.upload().await?;

        assert_eq!(
            summary,
            RunSummary {
                queued: 1,
                uploaded: 0,
                skipped: 1,
                deleted: 1
            }
        );
        assert!(store.puts().is_empty());
        assert!(!same.exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_skip_disabled_never_queries_metadata() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        write_sized(dir.path(), "same.bin", 300);

        let store = Arc::new(RecordingStore::default().with_object("same.bin", 300));
        let (mut uploader, _log) = uploader(settings(dir.path(), "100"), &store);
        uploader.scan()?;
        let summary = uploader.upload().await?;

        assert_eq!(summary.uploaded, 1);
        assert!(store.heads().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_delete_stops_the_run() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        write_sized(dir.path(), "a.bin", 100);
        let second = write_sized(dir.path(), "b.bin", 100);

        let mut settings = settings(dir.path(), "100");
        settings.delete = true;
        let store = Arc::new(RecordingStore {
            consume_sources: true,
            ..RecordingStore::default()
        });
        let (mut uploader, log) = uploader(settings, &store);
        uploader.scan()?;

        match uploader.upload().await {
            Err(AppError::CouldNotDeleteFile { path, .. }) => assert_eq!(path, "a.bin"),
            other => panic!("expected CouldNotDeleteFile, got {other:?}"),
        }
        assert_eq!(uploader.state(), RunState::Failed);
        assert_eq!(store.puts(), vec!["a.bin"]);
        assert!(second.exists());
        assert_eq!(log.messages(LogLevel::Error).len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_storage_failure_is_reported_and_propagated() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let file = write_sized(dir.path(), "a.bin", 100);

        let mut settings = settings(dir.path(), "100");
        settings.delete = true;
        let store = Arc::new(RecordingStore {
            fail_puts: true,
            ..RecordingStore::default()
        });
        let (mut uploader, log) = uploader(settings, &store);
        uploader.scan()?;

        assert!(matches!(uploader.upload().await, Err(AppError::Storage(_))));
        assert_eq!(uploader.state(), RunState::Failed);
        assert!(file.exists());
        assert_eq!(
            log.messages(LogLevel::Error),
            vec!["Remote storage error: upload of a.bin refused"]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_empty_queue_still_reports_summary() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        write_sized(dir.path(), "tiny.bin", 1);

        let store = Arc::new(RecordingStore::default());
        let (mut uploader, log) = uploader(settings(dir.path(), "1k"), &store);
        assert_eq!(uploader.scan()?, 0);
        let summary = uploader.upload().await?;

        assert_eq!(summary, RunSummary::default());
        assert_eq!(uploader.state(), RunState::Done);
        assert!(
            log.messages(LogLevel::Info)
                .contains(&"Uploaded 0 files, skipped 0, deleted 0 of 0 queued".to_string())
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_scan_appends_and_clear_empties() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        write_sized(dir.path(), "a.bin", 100);
        write_sized(dir.path(), "b.bin", 100);

        let mut settings = settings(dir.path(), "100");
        settings.limit = Some(1);
        let store = Arc::new(RecordingStore::default());
        let (mut uploader, _log) = uploader(settings, &store);

        assert_eq!(uploader.scan()?, 1);
        assert_eq!(uploader.scan()?, 1);
        assert_eq!(uploader.queue().len(), 2);
        assert_eq!(uploader.clear(), 2);
        assert_eq!(uploader.clear(), 0);
        assert!(uploader.queue().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_invalid_threshold_fails_the_scan() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(RecordingStore::default());
        let (mut uploader, log) = uploader(settings(dir.path(), "huge"), &store);

        assert!(matches!(uploader.scan(), Err(AppError::Config(_))));
        assert_eq!(uploader.state(), RunState::Failed);
        assert_eq!(log.messages(LogLevel::Error).len(), 1);
    }
}

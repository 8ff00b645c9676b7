use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::error::AppError;
use crate::mirror::{Mirror, MirrorRecord, CURRENT_DATA_KEY};
use crate::model::Document;

pub const EXPORT_VERSION: &str = "1.0";
pub const MIRROR_SOURCE_TAG: &str = "auto_sync";

const MIRROR_WRITE_TIMEOUT: Duration = Duration::from_secs(5);
const MIRROR_INTERNAL_FIELDS: [&str; 3] = ["_id", "_backup_timestamp", "_backup_source"];

pub struct Store {
    data_file: PathBuf,
    mirror: Option<Mirror>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExportEnvelope {
    pub export_timestamp: String,
    pub export_version: String,
    pub data: Document,
}

#[derive(Serialize)]
struct MirrorPayload<'a> {
    #[serde(flatten)]
    document: &'a Document,
    #[serde(rename = "_backup_timestamp")]
    backup_timestamp: &'a str,
    #[serde(rename = "_backup_source")]
    backup_source: &'a str,
}

#[derive(Debug)]
pub enum RestoreOutcome {
    Restored(Document),
    NoBackup,
    Unavailable,
    Failed(String),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BackupInfo {
    pub primary_exists: bool,
    pub primary_size: u64,
    pub mirror_enabled: bool,
    pub mirror_last_backup: Option<String>,
}

impl Store {
    pub fn new(data_file: PathBuf, mirror: Option<Mirror>) -> Self {
        Self { data_file, mirror }
    }

    pub fn data_file(&self) -> &Path {
        &self.data_file
    }

    pub fn mirror_enabled(&self) -> bool {
        self.mirror.is_some()
    }

    pub fn open_lock(&self) -> Result<fd_lock::RwLock<File>, AppError> {
        ensure_parent_dir(&self.data_file)?;
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(self.data_file.with_extension("lock"))?;
        Ok(fd_lock::RwLock::new(file))
    }

    pub fn load(&self) -> Result<Document, AppError> {
        if !self.data_file.exists() {
            info!(path = %self.data_file.display(), "no data file yet, starting empty");
            return Ok(Document::default());
        }
        let content = fs::read_to_string(&self.data_file)?;
        let document: Document = serde_json::from_str(&content).map_err(|err| {
            error!(path = %self.data_file.display(), %err, "data file is corrupt");
            AppError::Storage(format!(
                "{} is not a valid document: {err}",
                self.data_file.display()
            ))
        })?;
        debug!(
            goals = document.goals.len(),
            activities = document.activities.len(),
            "loaded document"
        );
        Ok(document)
    }

    pub async fn save(&self, document: &Document) -> Result<(), AppError> {
        let content = serde_json::to_string_pretty(document)?;
        if let Err(err) = atomic_write(&self.data_file, &content) {
            error!(path = %self.data_file.display(), %err, "failed to write data file");
            return Err(err);
        }
        info!(path = %self.data_file.display(), "saved document");
        self.sync_mirror(document).await;
        Ok(())
    }

    async fn sync_mirror(&self, document: &Document) {
        let Some(mirror) = &self.mirror else {
            return;
        };
        let backup_timestamp = Local::now().to_rfc3339();
        let payload = MirrorPayload {
            document,
            backup_timestamp: &backup_timestamp,
            backup_source: MIRROR_SOURCE_TAG,
        };
        let payload = match serde_json::to_string(&payload) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(%err, "mirror sync skipped, payload did not serialize");
                return;
            }
        };
        let record = MirrorRecord {
            key: CURRENT_DATA_KEY.to_string(),
            payload,
            backup_timestamp,
            backup_source: MIRROR_SOURCE_TAG.to_string(),
        };
        match tokio::time::timeout(MIRROR_WRITE_TIMEOUT, mirror.upsert(record)).await {
            Ok(Ok(())) => info!("synced document to mirror"),
            Ok(Err(err)) => warn!(%err, "mirror sync failed"),
            Err(_) => warn!(
                timeout_secs = MIRROR_WRITE_TIMEOUT.as_secs(),
                "mirror sync timed out"
            ),
        }
    }

    pub fn export_snapshot(&self, path: Option<&Path>) -> Result<PathBuf, AppError> {
        let now = Local::now();
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => self.data_dir().join(format!(
                "backup_export_{}.json",
                file_timestamp(now.naive_local())
            )),
        };
        let envelope = ExportEnvelope {
            export_timestamp: now.to_rfc3339(),
            export_version: EXPORT_VERSION.to_string(),
            data: self.load()?,
        };
        let content = serde_json::to_string_pretty(&envelope)?;
        atomic_write(&path, &content)?;
        info!(path = %path.display(), "exported snapshot");
        Ok(path)
    }

    pub async fn import_snapshot(&self, path: &Path) -> bool {
        match self.read_snapshot(path) {
            Ok(document) => match self.save(&document).await {
                Ok(()) => {
                    info!(path = %path.display(), "imported snapshot");
                    true
                }
                Err(err) => {
                    error!(path = %path.display(), %err, "import failed while saving");
                    false
                }
            },
            Err(err) => {
                error!(path = %path.display(), %err, "import failed");
                false
            }
        }
    }

    fn read_snapshot(&self, path: &Path) -> Result<Document, AppError> {
        let content = fs::read_to_string(path)?;
        let mut value: Value = serde_json::from_str(&content)?;
        if let Some(data) = value.as_object_mut().and_then(|object| object.remove("data")) {
            value = data;
        }
        Ok(serde_json::from_value(value)?)
    }

    pub async fn restore_from_mirror(&self) -> RestoreOutcome {
        let Some(mirror) = &self.mirror else {
            warn!("restore requested but mirror is unavailable");
            return RestoreOutcome::Unavailable;
        };
        let record = match mirror.find(CURRENT_DATA_KEY).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                warn!("no mirrored backup found");
                return RestoreOutcome::NoBackup;
            }
            Err(err) => {
                error!(%err, "mirror lookup failed");
                return RestoreOutcome::Failed(err.to_string());
            }
        };
        match strip_mirror_fields(&record.payload) {
            Ok(document) => {
                info!(backup_timestamp = %record.backup_timestamp, "restored from mirror");
                RestoreOutcome::Restored(document)
            }
            Err(err) => {
                error!(%err, "mirrored payload is not a valid document");
                RestoreOutcome::Failed(err.to_string())
            }
        }
    }

    pub async fn backup_info(&self) -> BackupInfo {
        let (primary_exists, primary_size) = match fs::metadata(&self.data_file) {
            Ok(meta) => (true, meta.len()),
            Err(_) => (false, 0),
        };
        let mut mirror_last_backup = None;
        if let Some(mirror) = &self.mirror {
            match mirror.find(CURRENT_DATA_KEY).await {
                Ok(record) => mirror_last_backup = record.map(|record| record.backup_timestamp),
                Err(err) => debug!(%err, "mirror status lookup failed"),
            }
        }
        BackupInfo {
            primary_exists,
            primary_size,
            mirror_enabled: self.mirror.is_some(),
            mirror_last_backup,
        }
    }

    pub fn copy_primary(&self, dest_dir: &Path) -> Result<PathBuf, AppError> {
        if !self.data_file.exists() {
            return Err(AppError::NotFound(format!(
                "data file {}",
                self.data_file.display()
            )));
        }
        fs::create_dir_all(dest_dir)?;
        let name = format!(
            "goals_backup_{}.json",
            file_timestamp(Local::now().naive_local())
        );
        let dest = dest_dir.join(name);
        fs::copy(&self.data_file, &dest)?;
        info!(path = %dest.display(), "copied data file");
        Ok(dest)
    }

    fn data_dir(&self) -> PathBuf {
        match self.data_file.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }
}

pub fn file_timestamp(now: NaiveDateTime) -> String {
    now.format("%Y%m%d_%H%M%S").to_string()
}

fn strip_mirror_fields(payload: &str) -> Result<Document, AppError> {
    let mut value: Value = serde_json::from_str(payload)?;
    if let Some(object) = value.as_object_mut() {
        for field in MIRROR_INTERNAL_FIELDS {
            object.remove(field);
        }
    }
    Ok(serde_json::from_value(value)?)
}

fn ensure_parent_dir(path: &Path) -> Result<(), AppError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

fn atomic_write(path: &Path, content: &str) -> Result<(), AppError> {
    ensure_parent_dir(path)?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut temp = tempfile::NamedTempFile::new_in(dir)?;
    temp.write_all(content.as_bytes())?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|err| AppError::Io(err.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mirror::sqlite_url;
    use crate::model::{ActivityInput, GoalChanges, GoalInput, GoalStatus};
    use sea_orm::{ConnectionTrait, Database, DatabaseBackend, Statement};
    use tempfile::TempDir;

    fn now() -> NaiveDateTime {
        NaiveDateTime::parse_from_str("2026-05-06 07:08:09", "%Y-%m-%d %H:%M:%S").expect("now")
    }

    fn plain_store(dir: &TempDir) -> Store {
        Store::new(dir.path().join("data").join("goals_data.json"), None)
    }

    async fn mirrored_store(dir: &TempDir) -> (Store, PathBuf) {
        let mirror_path = dir.path().join("mirror.db");
        let mirror = Mirror::connect(
            mirror_path.to_str().expect("utf8"),
            Duration::from_secs(3),
        )
        .await
        .expect("connect mirror");
        (
            Store::new(dir.path().join("data").join("goals_data.json"), Some(mirror)),
            mirror_path,
        )
    }

    fn sample_document() -> Document {
        let mut doc = Document::default();
        doc.add_goal(
            GoalInput {
                title: "Learn X".to_string(),
                description: "ünïcode stays".to_string(),
                target_date: None,
            },
            now(),
        );
        doc.add_goal(
            GoalInput {
                title: "Run".to_string(),
                description: String::new(),
                target_date: None,
            },
            now(),
        );
        doc.add_activity(
            1,
            ActivityInput {
                title: "Read ch.1".to_string(),
                note: "notes".to_string(),
            },
            now(),
        )
        .expect("activity");
        doc
    }

    #[test]
    fn load_missing_file_is_empty_document() {
        let dir = TempDir::new().expect("temp dir");
        let store = plain_store(&dir);
        assert_eq!(store.load().expect("load"), Document::default());
    }

    #[test]
    fn load_corrupt_file_is_an_error() {
        let dir = TempDir::new().expect("temp dir");
        let store = plain_store(&dir);
        fs::create_dir_all(dir.path().join("data")).expect("mkdir");
        fs::write(store.data_file(), "{ not json").expect("write");
        let err = store.load().expect_err("corrupt");
        assert!(matches!(err, AppError::Storage(_)));
    }

    #[test]
    fn load_normalizes_partial_document() {
        let dir = TempDir::new().expect("temp dir");
        let store = plain_store(&dir);
        fs::create_dir_all(dir.path().join("data")).expect("mkdir");
        fs::write(store.data_file(), r#"{"goals": []}"#).expect("write");
        let doc = store.load().expect("load");
        assert!(doc.activities.is_empty());
        assert!(doc.progress_logs.is_empty());
    }

    #[test]
    fn load_accepts_goal_without_target_date() {
        let dir = TempDir::new().expect("temp dir");
        let store = plain_store(&dir);
        fs::create_dir_all(dir.path().join("data")).expect("mkdir");
        fs::write(
            store.data_file(),
            r#"{"goals": [{"id": 7, "title": "Read", "target_date": null, "created_at": "2026-01-05"}]}"#,
        )
        .expect("write");
        let doc = store.load().expect("load");
        assert_eq!(doc.goals[0].id, 7);
        assert_eq!(
            doc.goals[0].target_date,
            chrono::NaiveDate::from_ymd_opt(2026, 12, 31).expect("date")
        );
    }

    #[tokio::test]
    async fn save_then_load_round_trips_after_each_change() {
        let dir = TempDir::new().expect("temp dir");
        let store = plain_store(&dir);

        let mut doc = sample_document();
        store.save(&doc).await.expect("save");
        assert_eq!(store.load().expect("load"), doc);

        doc.update_goal(
            2,
            GoalChanges {
                status: Some(GoalStatus::Completed),
                ..Default::default()
            },
        )
        .expect("update");
        store.save(&doc).await.expect("save");
        assert_eq!(store.load().expect("load"), doc);

        doc.remove_goal(1).expect("remove");
        store.save(&doc).await.expect("save");
        let reloaded = store.load().expect("load");
        assert_eq!(reloaded, doc);
        assert!(reloaded.activities.is_empty());
    }

    #[tokio::test]
    async fn saved_file_is_pretty_and_keeps_unicode() {
        let dir = TempDir::new().expect("temp dir");
        let store = plain_store(&dir);
        store.save(&sample_document()).await.expect("save");
        let content = fs::read_to_string(store.data_file()).expect("read");
        assert!(content.contains("\n  \"goals\": ["));
        assert!(content.contains("ünïcode stays"));
        assert!(content.contains("\"sub_tasks\""));
    }

    #[tokio::test]
    async fn save_mirrors_and_restore_strips_metadata() {
        let dir = TempDir::new().expect("temp dir");
        let (store, _) = mirrored_store(&dir).await;
        let doc = sample_document();
        store.save(&doc).await.expect("save");

        match store.restore_from_mirror().await {
            RestoreOutcome::Restored(restored) => assert_eq!(restored, doc),
            other => panic!("unexpected outcome: {other:?}"),
        }
        let info = store.backup_info().await;
        assert!(info.mirror_enabled);
        assert!(info.mirror_last_backup.is_some());
    }

    #[tokio::test]
    async fn mirror_failure_does_not_fail_save() {
        let dir = TempDir::new().expect("temp dir");
        let (store, mirror_path) = mirrored_store(&dir).await;

        let other = Database::connect(sqlite_url(&mirror_path).expect("url"))
            .await
            .expect("second connection");
        other
            .execute(Statement::from_string(
                DatabaseBackend::Sqlite,
                "DROP TABLE mirror_records;".to_string(),
            ))
            .await
            .expect("drop table");

        let doc = sample_document();
        store.save(&doc).await.expect("save succeeds without mirror");
        assert_eq!(store.load().expect("load"), doc);
        assert!(matches!(
            store.restore_from_mirror().await,
            RestoreOutcome::Failed(_)
        ));
    }

    #[tokio::test]
    async fn restore_distinguishes_unavailable_from_missing() {
        let dir = TempDir::new().expect("temp dir");
        assert!(matches!(
            plain_store(&dir).restore_from_mirror().await,
            RestoreOutcome::Unavailable
        ));

        let other = TempDir::new().expect("temp dir");
        let (store, _) = mirrored_store(&other).await;
        assert!(matches!(
            store.restore_from_mirror().await,
            RestoreOutcome::NoBackup
        ));
    }

    #[tokio::test]
    async fn export_wraps_document_with_metadata() {
        let dir = TempDir::new().expect("temp dir");
        let store = plain_store(&dir);
        let doc = sample_document();
        store.save(&doc).await.expect("save");

        let path = store.export_snapshot(None).expect("export");
        assert_eq!(path.parent(), Some(dir.path().join("data").as_path()));
        let name = path.file_name().and_then(|n| n.to_str()).expect("name");
        assert!(name.starts_with("backup_export_"));

        let envelope: ExportEnvelope =
            serde_json::from_str(&fs::read_to_string(&path).expect("read")).expect("parse");
        assert_eq!(envelope.export_version, EXPORT_VERSION);
        assert_eq!(envelope.data, doc);
    }

    #[tokio::test]
    async fn import_accepts_wrapped_and_bare_documents() {
        let source = TempDir::new().expect("temp dir");
        let exporter = plain_store(&source);
        let doc = sample_document();
        exporter.save(&doc).await.expect("save");
        let wrapped = exporter
            .export_snapshot(Some(&source.path().join("wrapped.json")))
            .expect("export");
        let bare = exporter.data_file().to_path_buf();

        let first = TempDir::new().expect("temp dir");
        let from_wrapped = plain_store(&first);
        assert!(from_wrapped.import_snapshot(&wrapped).await);

        let second = TempDir::new().expect("temp dir");
        let from_bare = plain_store(&second);
        assert!(from_bare.import_snapshot(&bare).await);

        assert_eq!(from_wrapped.load().expect("load"), doc);
        assert_eq!(from_bare.load().expect("load"), doc);
    }

    #[tokio::test]
    async fn import_of_malformed_file_reports_failure() {
        let dir = TempDir::new().expect("temp dir");
        let store = plain_store(&dir);
        let bad = dir.path().join("bad.json");
        fs::write(&bad, "[1, 2, 3]").expect("write");
        assert!(!store.import_snapshot(&bad).await);
        assert!(!store.import_snapshot(&dir.path().join("missing.json")).await);
        assert!(!store.data_file().exists());
    }

    #[tokio::test]
    async fn backup_info_reports_primary_file() {
        let dir = TempDir::new().expect("temp dir");
        let store = plain_store(&dir);
        let before = store.backup_info().await;
        assert!(!before.primary_exists);
        assert_eq!(before.primary_size, 0);
        assert!(!before.mirror_enabled);
        assert_eq!(before.mirror_last_backup, None);

        store.save(&sample_document()).await.expect("save");
        let after = store.backup_info().await;
        assert!(after.primary_exists);
        assert_eq!(
            after.primary_size,
            fs::metadata(store.data_file()).expect("meta").len()
        );
    }

    #[tokio::test]
    async fn copy_primary_requires_existing_file() {
        let dir = TempDir::new().expect("temp dir");
        let store = plain_store(&dir);
        let dest = dir.path().join("downloads");
        assert!(matches!(
            store.copy_primary(&dest),
            Err(AppError::NotFound(_))
        ));

        store.save(&sample_document()).await.expect("save");
        let copied = store.copy_primary(&dest).expect("copy");
        assert_eq!(
            fs::read_to_string(&copied).expect("copy"),
            fs::read_to_string(store.data_file()).expect("primary")
        );
    }
}

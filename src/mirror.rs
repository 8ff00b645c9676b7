use std::fs;
use std::path::Path;
use std::time::Duration;

use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, EntityTrait, Schema, Set,
};
use url::Url;

use crate::entities::mirror_record;
use crate::error::AppError;

/// Key of the single record holding the mirrored document.
pub const CURRENT_DATA_KEY: &str = "current_data";

/// Secondary key-value store holding a best-effort copy of the document.
#[derive(Clone, Debug)]
pub struct Mirror {
    db: DatabaseConnection,
}

#[derive(Clone, Debug)]
pub struct MirrorRecord {
    pub key: String,
    pub payload: String,
    pub backup_timestamp: String,
    pub backup_source: String,
}

impl Mirror {
    /// Connects once with a bounded timeout. Callers treat an error as
    /// "mirror unavailable" for the rest of the process.
    pub async fn connect(uri: &str, timeout: Duration) -> Result<Self, AppError> {
        let url = resolve_mirror_url(uri)?;
        let mut options = ConnectOptions::new(url);
        options
            .connect_timeout(timeout)
            .acquire_timeout(timeout)
            .sqlx_logging(false);
        let db = tokio::time::timeout(timeout, Database::connect(options))
            .await
            .map_err(|_| {
                AppError::Storage(format!(
                    "mirror connect timed out after {}s",
                    timeout.as_secs()
                ))
            })??;
        db.ping().await?;
        ensure_schema(&db).await?;
        Ok(Self { db })
    }

    pub async fn upsert(&self, record: MirrorRecord) -> Result<(), AppError> {
        let active = mirror_record::ActiveModel {
            key: Set(record.key),
            payload: Set(record.payload),
            backup_timestamp: Set(record.backup_timestamp),
            backup_source: Set(record.backup_source),
        };
        mirror_record::Entity::insert(active)
            .on_conflict(
                OnConflict::column(mirror_record::Column::Key)
                    .update_columns([
                        mirror_record::Column::Payload,
                        mirror_record::Column::BackupTimestamp,
                        mirror_record::Column::BackupSource,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;
        Ok(())
    }

    pub async fn find(&self, key: &str) -> Result<Option<MirrorRecord>, AppError> {
        let model = mirror_record::Entity::find_by_id(key.to_string())
            .one(&self.db)
            .await?;
        Ok(model.map(|model| MirrorRecord {
            key: model.key,
            payload: model.payload,
            backup_timestamp: model.backup_timestamp,
            backup_source: model.backup_source,
        }))
    }
}

/// Accepts either a full connection URL or a bare SQLite file path.
pub fn resolve_mirror_url(uri: &str) -> Result<String, AppError> {
    let trimmed = uri.trim();
    if trimmed.is_empty() {
        return Err(AppError::InvalidInput("mirror uri cannot be empty".to_string()));
    }
    if trimmed.contains("://") {
        return Ok(trimmed.to_string());
    }
    let path = Path::new(trimmed);
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    sqlite_url(path)
}

pub fn sqlite_url(path: &Path) -> Result<String, AppError> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };
    let mut url = Url::from_file_path(&absolute)
        .map_err(|_| AppError::InvalidInput(format!("invalid sqlite path: {}", path.display())))?;
    url.set_query(Some("mode=rwc"));
    Ok(url.as_str().replacen("file://", "sqlite://", 1))
}

async fn ensure_schema(db: &DatabaseConnection) -> Result<(), AppError> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);
    let mut stmt = schema.create_table_from_entity(mirror_record::Entity);
    stmt.if_not_exists();
    db.execute(builder.build(&stmt)).await?;
    Ok(())
}

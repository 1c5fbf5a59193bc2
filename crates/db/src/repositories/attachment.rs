//! Attachment repository for database operations.
//!
//! Implements the attachment record store using SeaORM.

use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, Set};

use crate::entities::attachments;
use chatdrop_core::attachment::{
    AttachmentRecord, AttachmentRepository as AttachmentRepoTrait, AttachmentStatus, FileType,
    NewDraft, Publication, UploadError,
};

/// Attachment repository implementation.
#[derive(Debug, Clone)]
pub struct AttachmentRepository {
    db: DatabaseConnection,
}

impl AttachmentRepository {
    /// Create a new attachment repository.
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

impl AttachmentRepoTrait for AttachmentRepository {
    async fn insert_draft(&self, draft: NewDraft) -> Result<bool, UploadError> {
        let size = i64::try_from(draft.size)
            .map_err(|_| UploadError::repository(format!("size {} out of range", draft.size)))?;

        let active_model = attachments::ActiveModel {
            hash: Set(draft.hash),
            channel: Set(draft.channel),
            nickname: Set(draft.nickname),
            ip: Set(draft.ip),
            name: Set(draft.name),
            path: Set(draft.path),
            size: Set(size),
            mime: Set(None),
            file_type: Set(None),
            width: Set(None),
            height: Set(None),
            status: Set(AttachmentStatus::Draft.as_str().to_string()),
            reg_date: Set(draft.reg_date.into()),
            exp_date: Set(draft.exp_date.map(Into::into)),
        };

        // The primary key decides races between concurrent registrations.
        let inserted = attachments::Entity::insert(active_model)
            .on_conflict(
                OnConflict::column(attachments::Column::Hash)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await
            .map_err(|e| UploadError::repository(e.to_string()))?;

        Ok(inserted == 1)
    }

    async fn exists(&self, hash: &str) -> Result<bool, UploadError> {
        let count: u64 = attachments::Entity::find_by_id(hash.to_string())
            .count(&self.db)
            .await
            .map_err(|e| UploadError::repository(e.to_string()))?;

        Ok(count > 0)
    }

    async fn find_by_hash(&self, hash: &str) -> Result<Option<AttachmentRecord>, UploadError> {
        let model = attachments::Entity::find_by_id(hash.to_string())
            .one(&self.db)
            .await
            .map_err(|e| UploadError::repository(e.to_string()))?;

        model.map(to_domain).transpose()
    }

    async fn publish(&self, hash: &str, publication: Publication) -> Result<bool, UploadError> {
        let result = attachments::Entity::update_many()
            .col_expr(attachments::Column::Path, Expr::value(publication.path))
            .col_expr(attachments::Column::Mime, Expr::value(publication.mime))
            .col_expr(
                attachments::Column::FileType,
                Expr::value(publication.file_type.as_str()),
            )
            .col_expr(
                attachments::Column::Width,
                Expr::value(to_db_dimension(publication.width)?),
            )
            .col_expr(
                attachments::Column::Height,
                Expr::value(to_db_dimension(publication.height)?),
            )
            .col_expr(
                attachments::Column::Status,
                Expr::value(AttachmentStatus::Published.as_str()),
            )
            .filter(attachments::Column::Hash.eq(hash))
            .filter(attachments::Column::Status.eq(AttachmentStatus::Draft.as_str()))
            .exec(&self.db)
            .await
            .map_err(|e| UploadError::repository(e.to_string()))?;

        Ok(result.rows_affected > 0)
    }

    async fn delete_by_hash(&self, hash: &str) -> Result<bool, UploadError> {
        let result = attachments::Entity::delete_by_id(hash.to_string())
            .exec(&self.db)
            .await
            .map_err(|e| UploadError::repository(e.to_string()))?;

        Ok(result.rows_affected > 0)
    }
}

/// Convert a pixel dimension to its column type.
fn to_db_dimension(value: Option<u32>) -> Result<Option<i32>, UploadError> {
    value
        .map(|v| i32::try_from(v).map_err(|_| UploadError::repository(format!("dimension {v} out of range"))))
        .transpose()
}

/// Convert database model to domain model.
fn to_domain(model: attachments::Model) -> Result<AttachmentRecord, UploadError> {
    let status = AttachmentStatus::parse(&model.status)
        .ok_or_else(|| UploadError::repository(format!("unknown status '{}'", model.status)))?;
    let size = u64::try_from(model.size)
        .map_err(|_| UploadError::repository(format!("negative size {}", model.size)))?;

    Ok(AttachmentRecord {
        hash: model.hash,
        channel: model.channel,
        nickname: model.nickname,
        ip: model.ip,
        name: model.name,
        path: model.path,
        size,
        mime: model.mime,
        file_type: model.file_type.as_deref().and_then(FileType::parse),
        width: model.width.and_then(|v| u32::try_from(v).ok()),
        height: model.height.and_then(|v| u32::try_from(v).ok()),
        status,
        reg_date: model.reg_date.with_timezone(&chrono::Utc),
        exp_date: model.exp_date.map(|d| d.with_timezone(&chrono::Utc)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn model() -> attachments::Model {
        let reg = Utc.with_ymd_and_hms(2026, 1, 15, 9, 30, 0).single().expect("date");
        attachments::Model {
            hash: "h".to_string(),
            channel: "general".to_string(),
            nickname: "alice".to_string(),
            ip: "127.0.0.1".to_string(),
            name: "a.png".to_string(),
            path: "202601/d.x.png".to_string(),
            size: 10,
            mime: Some("image/png".to_string()),
            file_type: Some("image".to_string()),
            width: Some(3),
            height: Some(2),
            status: "published".to_string(),
            reg_date: reg.into(),
            exp_date: None,
        }
    }

    #[test]
    fn test_to_domain() {
        let record = to_domain(model()).expect("record");
        assert!(record.is_published());
        assert_eq!(record.size, 10);
        assert_eq!(record.file_type, Some(FileType::Image));
        assert_eq!((record.width, record.height), (Some(3), Some(2)));
        assert_eq!(record.reg_date.to_rfc3339(), "2026-01-15T09:30:00+00:00");
    }

    #[test]
    fn test_to_domain_rejects_corrupt_rows() {
        let mut bad_status = model();
        bad_status.status = "gone".to_string();
        assert!(matches!(to_domain(bad_status), Err(UploadError::Repository(_))));

        let mut bad_size = model();
        bad_size.size = -1;
        assert!(matches!(to_domain(bad_size), Err(UploadError::Repository(_))));
    }

    #[test]
    fn test_to_db_dimension() {
        assert_eq!(to_db_dimension(None).expect("none"), None);
        assert_eq!(to_db_dimension(Some(640)).expect("fits"), Some(640));
        assert!(to_db_dimension(Some(u32::MAX)).is_err());
    }
}

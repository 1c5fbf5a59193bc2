//! Attachments migration.
//!
//! Creates the attachment record table shared by draft registration and
//! finalization.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(ATTACHMENTS_SQL).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared("DROP TABLE IF EXISTS attachments CASCADE;")
            .await?;
        Ok(())
    }
}

const ATTACHMENTS_SQL: &str = r"
-- One row per upload, keyed by the allocated hash
CREATE TABLE attachments (
    hash VARCHAR(64) PRIMARY KEY,
    channel VARCHAR(255) NOT NULL,
    nickname VARCHAR(255) NOT NULL,
    ip VARCHAR(45) NOT NULL,
    name TEXT NOT NULL,
    path TEXT NOT NULL,
    size BIGINT NOT NULL,
    mime VARCHAR(255),
    file_type VARCHAR(16),
    width INTEGER,
    height INTEGER,
    status VARCHAR(16) NOT NULL DEFAULT 'draft',
    reg_date TIMESTAMPTZ NOT NULL DEFAULT now(),
    exp_date TIMESTAMPTZ,
    CONSTRAINT chk_size_non_negative CHECK (size >= 0),
    CONSTRAINT chk_status CHECK (status IN ('draft', 'published')),
    CONSTRAINT chk_published_fields CHECK (
        status = 'draft' OR (mime IS NOT NULL AND file_type IS NOT NULL)
    )
);

-- Index for per-channel listings
CREATE INDEX idx_attachments_channel ON attachments(channel, reg_date DESC);

-- Index for the retention sweep
CREATE INDEX idx_attachments_exp_date ON attachments(exp_date) WHERE exp_date IS NOT NULL;

-- Index for abandoned draft cleanup
CREATE INDEX idx_attachments_drafts ON attachments(reg_date) WHERE status = 'draft';
";

//! SQLite storage for annotations
//!
//! Backs the bundled annotation server. Regions are kept as a JSON column.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use uuid::Uuid;

use super::{check_draft, AnnotationStore};
use crate::annotations::{Annotation, AnnotationDraft, FractionalRect, HighlightColor};
use crate::error::StoreError;

/// Open (or create) the database and make sure the schema exists
pub async fn create_pool(database_url: &str) -> Result<SqlitePool, StoreError> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    SqliteStore::new(pool.clone()).init().await?;

    Ok(pool)
}

#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

const SELECT_COLUMNS: &str = r#"
    SELECT id, article_id, author_id, author_display_name, page_number,
           highlighted_text, comment_text, regions_json, color,
           created_at, updated_at
    FROM annotations
"#;

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Initialize the annotations table
    pub async fn init(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS annotations (
                id TEXT PRIMARY KEY,
                article_id TEXT NOT NULL,
                author_id TEXT NOT NULL,
                author_display_name TEXT NOT NULL DEFAULT '',
                page_number INTEGER NOT NULL,
                highlighted_text TEXT NOT NULL,
                comment_text TEXT NOT NULL DEFAULT '',
                regions_json TEXT NOT NULL,
                color TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_annotations_article ON annotations(article_id);
            CREATE INDEX IF NOT EXISTS idx_annotations_author ON annotations(author_id);
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn fetch_where(&self, column: &str, value: &str, order: &str) -> Result<Vec<Annotation>, StoreError> {
        let sql = format!("{} WHERE {} = ? ORDER BY created_at {}", SELECT_COLUMNS, column, order);
        let rows = sqlx::query_as::<_, AnnotationRow>(&sql)
            .bind(value)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(|r| r.into_annotation()).collect()
    }
}

/// Fixed-width timestamps so text ordering matches time ordering
fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[async_trait]
impl AnnotationStore for SqliteStore {
    async fn list(&self, article_id: &str) -> Result<Vec<Annotation>, StoreError> {
        self.fetch_where("article_id", article_id, "ASC").await
    }

    async fn list_for_author(&self, author_id: &str) -> Result<Vec<Annotation>, StoreError> {
        self.fetch_where("author_id", author_id, "DESC").await
    }

    async fn create(&self, draft: AnnotationDraft) -> Result<Annotation, StoreError> {
        check_draft(&draft)?;

        let annotation = draft.into_annotation(Uuid::new_v4().to_string(), Utc::now());
        let regions_json = serde_json::to_string(&annotation.highlight_regions)?;

        sqlx::query(
            r#"
            INSERT INTO annotations (
                id, article_id, author_id, author_display_name, page_number,
                highlighted_text, comment_text, regions_json, color,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&annotation.id)
        .bind(&annotation.article_id)
        .bind(&annotation.author_id)
        .bind(&annotation.author_display_name)
        .bind(i64::from(annotation.page_number))
        .bind(&annotation.highlighted_text)
        .bind(&annotation.comment_text)
        .bind(&regions_json)
        .bind(annotation.color.as_str())
        .bind(timestamp(&annotation.created_at))
        .bind(annotation.updated_at.as_ref().map(timestamp))
        .execute(&self.pool)
        .await?;

        tracing::debug!(id = %annotation.id, article = %annotation.article_id, "Stored annotation");
        Ok(annotation)
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM annotations WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }
}

/// Internal row type for SQLite queries
#[derive(sqlx::FromRow)]
struct AnnotationRow {
    id: String,
    article_id: String,
    author_id: String,
    author_display_name: String,
    page_number: i64,
    highlighted_text: String,
    comment_text: String,
    regions_json: String,
    color: String,
    created_at: String,
    updated_at: Option<String>,
}

impl AnnotationRow {
    fn into_annotation(self) -> Result<Annotation, StoreError> {
        let highlight_regions: Vec<FractionalRect> = serde_json::from_str(&self.regions_json)?;
        // unknown colors fall back to the default highlighter
        let color = HighlightColor::from_str(&self.color).unwrap_or_default();
        let page_number = u32::try_from(self.page_number)
            .map_err(|_| StoreError::InvalidResponse(format!("bad page number {}", self.page_number)))?;

        let created_at = parse_timestamp(&self.created_at)?;
        let updated_at = self.updated_at.as_deref().map(parse_timestamp).transpose()?;

        Ok(Annotation {
            id: self.id,
            article_id: self.article_id,
            author_id: self.author_id,
            author_display_name: self.author_display_name,
            page_number,
            highlighted_text: self.highlighted_text,
            comment_text: self.comment_text,
            highlight_regions,
            color,
            created_at,
            updated_at,
        })
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::InvalidResponse(format!("bad timestamp {}: {}", value, e)))
}

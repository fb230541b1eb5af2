//! SQLite-backed record store.
//!
//! Holds the complete crawl history, targets and non-targets alike, so a
//! restarted process can rebuild its counters and dedup claims from here.

use std::path::Path;

use sqlx::SqlitePool;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous,
};

use super::{RecordStore, StoreError};
use crate::model::Video;

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS videos (
    url TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    date TEXT NOT NULL,
    is_target INTEGER NOT NULL
);

-- Date index for ad hoc reporting; correctness never depends on it.
CREATE INDEX IF NOT EXISTS idx_videos_date ON videos(date);
"#;

/// Record store on a single SQLite database in WAL mode.
#[derive(Clone)]
pub struct SqliteRecords {
    pool: SqlitePool,
}

impl SqliteRecords {
    /// Open the database at `path`, creating file and schema if missing.
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        sqlx::query(SCHEMA_SQL).execute(&pool).await?;

        Ok(Self { pool })
    }

    /// Close the connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

impl RecordStore for SqliteRecords {
    async fn upsert(&self, video: &Video) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO videos (url, title, date, is_target)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(url) DO UPDATE SET
                title = excluded.title,
                date = excluded.date,
                is_target = excluded.is_target
            "#,
        )
        .bind(&video.url)
        .bind(&video.title)
        .bind(&video.date)
        .bind(video.is_target)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_all(&self) -> Result<Vec<Video>, StoreError> {
        let videos = sqlx::query_as::<_, Video>("SELECT url, title, date, is_target FROM videos")
            .fetch_all(&self.pool)
            .await?;
        Ok(videos)
    }

    async fn find_targets(&self) -> Result<Vec<Video>, StoreError> {
        let videos = sqlx::query_as::<_, Video>(
            "SELECT url, title, date, is_target FROM videos WHERE is_target = 1",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(videos)
    }

    async fn clear(&self) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM videos").execute(&self.pool).await?;
        Ok(())
    }
}

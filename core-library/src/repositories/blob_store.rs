//! Durable keyed storage of cached track records.
//!
//! Records are addressed by track id. Each record carries its full audio
//! payload, so listing operations that only need structured fields go
//! through [`BlobStore::list_summaries`] and never touch the payload column.

use crate::error::{LibraryError, Result};
use crate::models::{CachedTrackRecord, CachedTrackSummary};
use async_trait::async_trait;
use bytes::Bytes;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::{debug, instrument};

/// Keyed persistence for cached tracks.
///
/// Writes are whole-record: `put` with an existing id replaces every field.
/// A record whose payload has been lost is treated as absent.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Fetch the full record, including the payload.
    async fn get(&self, id: &str) -> Result<Option<CachedTrackRecord>>;

    /// Insert or fully replace a record.
    async fn put(&self, record: &CachedTrackRecord) -> Result<()>;

    /// Remove a record. Returns `false` when nothing was stored under `id`.
    async fn delete(&self, id: &str) -> Result<bool>;

    /// Whether a record with a non-empty payload exists for `id`.
    async fn has_payload(&self, id: &str) -> Result<bool>;

    /// Every stored record, payloads included.
    async fn list_all(&self) -> Result<Vec<CachedTrackRecord>>;

    /// Every stored record without its payload.
    async fn list_summaries(&self) -> Result<Vec<CachedTrackSummary>>;

    /// Sum of `file_size` over all records.
    async fn total_size(&self) -> Result<u64>;

    /// Set `last_played_at`. Returns `false` when the record does not exist.
    async fn set_last_played(&self, id: &str, timestamp_ms: i64) -> Result<bool>;

    /// Replace the stored cover art. Returns `false` when the record does not exist.
    async fn update_cover_art(&self, id: &str, cover_art: Option<String>) -> Result<bool>;

    /// Stored cover art for `id`, without loading the payload.
    async fn cover_art(&self, id: &str) -> Result<Option<String>>;

    /// Delete every record. Returns the number of records removed.
    async fn clear(&self) -> Result<u64>;
}

// ============================================================================
// SQLite implementation
// ============================================================================

const SUMMARY_COLUMNS: &str = "id, channel_id, channel_name, file_name, file_size, duration, \
     title, artist, album, stream_url, cached_at, last_played_at, \
     cover_art IS NOT NULL AS has_cover_art";

const RECORD_COLUMNS: &str = "id, channel_id, channel_name, file_name, file_size, duration, \
     title, artist, album, stream_url, cached_at, last_played_at, cover_art, payload";

/// [`BlobStore`] backed by the `cached_tracks` table.
#[derive(Clone)]
pub struct SqliteBlobStore {
    pool: SqlitePool,
}

impl SqliteBlobStore {
    /// Create a store over an already migrated pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_record(row: &SqliteRow) -> Result<CachedTrackRecord> {
        let file_size: i64 = row.try_get("file_size")?;
        let payload: Vec<u8> = row.try_get("payload")?;

        Ok(CachedTrackRecord {
            id: row.try_get("id")?,
            channel_id: row.try_get("channel_id")?,
            channel_name: row.try_get("channel_name")?,
            file_name: row.try_get("file_name")?,
            file_size: file_size.max(0) as u64,
            duration: row.try_get("duration")?,
            title: row.try_get("title")?,
            artist: row.try_get("artist")?,
            album: row.try_get("album")?,
            stream_url: row.try_get("stream_url")?,
            cached_at: row.try_get("cached_at")?,
            last_played_at: row.try_get("last_played_at")?,
            cover_art: row.try_get("cover_art")?,
            payload: Bytes::from(payload),
        })
    }

    fn row_to_summary(row: &SqliteRow) -> Result<CachedTrackSummary> {
        let file_size: i64 = row.try_get("file_size")?;
        let has_cover_art: i64 = row.try_get("has_cover_art")?;

        Ok(CachedTrackSummary {
            id: row.try_get("id")?,
            channel_id: row.try_get("channel_id")?,
            channel_name: row.try_get("channel_name")?,
            file_name: row.try_get("file_name")?,
            file_size: file_size.max(0) as u64,
            duration: row.try_get("duration")?,
            title: row.try_get("title")?,
            artist: row.try_get("artist")?,
            album: row.try_get("album")?,
            stream_url: row.try_get("stream_url")?,
            cached_at: row.try_get("cached_at")?,
            last_played_at: row.try_get("last_played_at")?,
            has_cover_art: has_cover_art != 0,
        })
    }
}

#[async_trait]
impl BlobStore for SqliteBlobStore {
    #[instrument(skip(self))]
    async fn get(&self, id: &str) -> Result<Option<CachedTrackRecord>> {
        let sql = format!("SELECT {} FROM cached_tracks WHERE id = ?", RECORD_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let record = Self::row_to_record(&row)?;
                if record.payload.is_empty() {
                    debug!(track_id = id, "Stored record has no payload");
                    return Ok(None);
                }
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    #[instrument(skip(self, record), fields(track_id = %record.id, bytes = record.file_size))]
    async fn put(&self, record: &CachedTrackRecord) -> Result<()> {
        record
            .validate()
            .map_err(|message| LibraryError::InvalidInput {
                field: "cached_track".to_string(),
                message,
            })?;

        sqlx::query(
            r#"
            INSERT OR REPLACE INTO cached_tracks (
                id, channel_id, channel_name, file_name, file_size, duration,
                title, artist, album, stream_url, cached_at, last_played_at,
                cover_art, payload
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(&record.channel_id)
        .bind(&record.channel_name)
        .bind(&record.file_name)
        .bind(record.file_size as i64)
        .bind(record.duration)
        .bind(&record.title)
        .bind(&record.artist)
        .bind(&record.album)
        .bind(&record.stream_url)
        .bind(record.cached_at)
        .bind(record.last_played_at)
        .bind(&record.cover_art)
        .bind(record.payload.as_ref())
        .execute(&self.pool)
        .await?;

        debug!("Stored cached track");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM cached_tracks WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn has_payload(&self, id: &str) -> Result<bool> {
        let exists: i64 = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM cached_tracks WHERE id = ? AND length(payload) > 0)",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists != 0)
    }

    #[instrument(skip(self))]
    async fn list_all(&self) -> Result<Vec<CachedTrackRecord>> {
        let sql = format!(
            "SELECT {} FROM cached_tracks ORDER BY cached_at DESC",
            RECORD_COLUMNS
        );
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

        rows.iter().map(Self::row_to_record).collect()
    }

    #[instrument(skip(self))]
    async fn list_summaries(&self) -> Result<Vec<CachedTrackSummary>> {
        let sql = format!(
            "SELECT {} FROM cached_tracks ORDER BY cached_at DESC",
            SUMMARY_COLUMNS
        );
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

        rows.iter().map(Self::row_to_summary).collect()
    }

    #[instrument(skip(self))]
    async fn total_size(&self) -> Result<u64> {
        let total: i64 = sqlx::query_scalar("SELECT COALESCE(SUM(file_size), 0) FROM cached_tracks")
            .fetch_one(&self.pool)
            .await?;

        Ok(total.max(0) as u64)
    }

    #[instrument(skip(self))]
    async fn set_last_played(&self, id: &str, timestamp_ms: i64) -> Result<bool> {
        let result = sqlx::query("UPDATE cached_tracks SET last_played_at = ? WHERE id = ?")
            .bind(timestamp_ms)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, cover_art))]
    async fn update_cover_art(&self, id: &str, cover_art: Option<String>) -> Result<bool> {
        let result = sqlx::query("UPDATE cached_tracks SET cover_art = ? WHERE id = ?")
            .bind(cover_art)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn cover_art(&self, id: &str) -> Result<Option<String>> {
        let cover: Option<Option<String>> =
            sqlx::query_scalar("SELECT cover_art FROM cached_tracks WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(cover.flatten())
    }

    #[instrument(skip(self))]
    async fn clear(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM cached_tracks")
            .execute(&self.pool)
            .await?;

        debug!(removed = result.rows_affected(), "Cleared cached tracks");
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;
    use crate::models::Track;

    async fn store() -> SqliteBlobStore {
        SqliteBlobStore::new(create_test_pool().await.unwrap())
    }

    fn record(id: &str, payload: &'static [u8], cached_at: i64) -> CachedTrackRecord {
        let mut track = Track::new(
            id,
            "chan-1",
            "Road Trip",
            format!("{}.mp3", id),
            format!("https://cdn.example.com/{}", id),
        );
        track.title = Some(format!("Title {}", id));
        track.duration = Some(180.5);
        CachedTrackRecord::from_download(&track, Bytes::from_static(payload), None, cached_at)
    }

    #[tokio::test]
    async fn test_put_and_get_roundtrip() {
        let store = store().await;
        let record = record("t1", b"payload-bytes", 1_000);

        store.put(&record).await.unwrap();
        let loaded = store.get("t1").await.unwrap().unwrap();

        assert_eq!(loaded, record);
        assert_eq!(loaded.payload.as_ref(), b"payload-bytes");
    }

    #[tokio::test]
    async fn test_get_missing_returns_none() {
        let store = store().await;
        assert!(store.get("missing").await.unwrap().is_none());
        assert!(!store.has_payload("missing").await.unwrap());
    }

    #[tokio::test]
    async fn test_put_replaces_existing_record() {
        let store = store().await;
        store.put(&record("t1", b"old", 1)).await.unwrap();
        store.put(&record("t1", b"newer", 2)).await.unwrap();

        let loaded = store.get("t1").await.unwrap().unwrap();
        assert_eq!(loaded.payload.as_ref(), b"newer");
        assert_eq!(loaded.file_size, 5);
        assert_eq!(store.list_summaries().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_put_rejects_invalid_record() {
        let store = store().await;
        let mut bad = record("t1", b"abc", 1);
        bad.file_size = 10;

        let result = store.put(&bad).await;
        assert!(matches!(result, Err(LibraryError::InvalidInput { .. })));
        assert!(store.get("t1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_reports_presence() {
        let store = store().await;
        store.put(&record("t1", b"abc", 1)).await.unwrap();

        assert!(store.delete("t1").await.unwrap());
        assert!(!store.delete("t1").await.unwrap());
        assert!(store.get("t1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_total_size_and_summaries() {
        let store = store().await;
        store.put(&record("a", b"0123456789", 1)).await.unwrap();
        store.put(&record("b", b"01234", 2)).await.unwrap();

        assert_eq!(store.total_size().await.unwrap(), 15);

        let summaries = store.list_summaries().await.unwrap();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].id, "b");
        assert!(!summaries[0].has_cover_art);

        let all = store.list_all().await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_last_played_and_cover_art_updates() {
        let store = store().await;
        store.put(&record("t1", b"abc", 1)).await.unwrap();

        assert!(store.set_last_played("t1", 42).await.unwrap());
        assert!(!store.set_last_played("nope", 42).await.unwrap());

        let art = "data:image/png;base64,AAAA".to_string();
        assert!(store.update_cover_art("t1", Some(art.clone())).await.unwrap());
        assert_eq!(store.cover_art("t1").await.unwrap(), Some(art));
        assert_eq!(store.cover_art("nope").await.unwrap(), None);

        let summary = store.list_summaries().await.unwrap().remove(0);
        assert_eq!(summary.last_played_at, Some(42));
        assert!(summary.has_cover_art);
    }

    #[tokio::test]
    async fn test_clear_removes_everything() {
        let store = store().await;
        store.put(&record("a", b"1", 1)).await.unwrap();
        store.put(&record("b", b"2", 2)).await.unwrap();

        assert_eq!(store.clear().await.unwrap(), 2);
        assert_eq!(store.total_size().await.unwrap(), 0);
        assert!(store.list_summaries().await.unwrap().is_empty());
    }
}

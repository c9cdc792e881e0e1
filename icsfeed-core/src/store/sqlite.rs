//! SQLite-backed store using sqlx.

use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

use crate::error::{CoreError, CoreResult};
use crate::event::{EventKey, EventRow, EventStatus, StoredEvent, wire_time};
use crate::feed::{CalendarFeed, NewFeed, SyncOutcome};
use crate::store::{CalendarStore, EventQuery};

/// Upper bound on bound parameters per DELETE statement.
const DELETE_CHUNK: usize = 500;

/// SQLite persistence for feeds and events.
///
/// Timestamps are stored as wire-format text, which sorts chronologically.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if needed) the database file at `path` and run migrations.
    pub async fn open(path: &Path) -> CoreResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        Self::with_pool(pool).await
    }

    /// A private in-memory database. The single connection is never
    /// recycled, since closing it would discard the data.
    pub async fn in_memory() -> CoreResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Self::with_pool(pool).await
    }

    /// Use an existing pool, running migrations first.
    pub async fn with_pool(pool: SqlitePool) -> CoreResult<Self> {
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(SqliteStore { pool })
    }
}

fn timestamp(row: &SqliteRow, column: &str) -> CoreResult<DateTime<Utc>> {
    let raw: String = row.try_get(column)?;
    wire_time::parse(&raw)
        .ok_or_else(|| CoreError::Persistence(format!("invalid {column} '{raw}'")))
}

fn optional_timestamp(row: &SqliteRow, column: &str) -> CoreResult<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.try_get(column)?;
    raw.map(|raw| {
        wire_time::parse(&raw)
            .ok_or_else(|| CoreError::Persistence(format!("invalid {column} '{raw}'")))
    })
    .transpose()
}

fn feed_from_row(row: &SqliteRow) -> CoreResult<CalendarFeed> {
    Ok(CalendarFeed {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        name: row.try_get("name")?,
        ics_url: row.try_get("ics_url")?,
        color: row.try_get("color")?,
        is_visible: row.try_get("is_visible")?,
        last_synced_at: optional_timestamp(row, "last_synced_at")?,
        last_sync_error: row.try_get("last_sync_error")?,
        created_at: timestamp(row, "created_at")?,
        updated_at: timestamp(row, "updated_at")?,
    })
}

fn event_from_row(row: &SqliteRow) -> CoreResult<StoredEvent> {
    let status: Option<String> = row.try_get("status")?;
    Ok(StoredEvent {
        id: row.try_get("id")?,
        feed_id: row.try_get("feed_id")?,
        user_id: row.try_get("user_id")?,
        uid: row.try_get("uid")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        location: row.try_get("location")?,
        start_time: timestamp(row, "start_time")?,
        end_time: timestamp(row, "end_time")?,
        all_day: row.try_get("all_day")?,
        status: status.as_deref().and_then(EventStatus::from_ics_str),
        recurrence_rule: row.try_get("recurrence_rule")?,
        created_at: timestamp(row, "created_at")?,
        updated_at: timestamp(row, "updated_at")?,
    })
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[async_trait]
impl CalendarStore for SqliteStore {
    async fn create_feed(&self, feed: NewFeed) -> CoreResult<CalendarFeed> {
        let feed = feed.into_feed(Utc::now())?;

        let result = sqlx::query(
            "INSERT INTO calendar_feeds
                (id, user_id, name, ics_url, color, is_visible, last_synced_at, last_sync_error, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, NULL, NULL, ?, ?)",
        )
        .bind(&feed.id)
        .bind(&feed.user_id)
        .bind(&feed.name)
        .bind(&feed.ics_url)
        .bind(&feed.color)
        .bind(feed.is_visible)
        .bind(wire_time::format(&feed.created_at))
        .bind(wire_time::format(&feed.updated_at))
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(feed),
            Err(e) if is_unique_violation(&e) => Err(CoreError::DuplicateFeed(feed.ics_url)),
            Err(e) => Err(e.into()),
        }
    }

    async fn feed(&self, user_id: &str, feed_id: &str) -> CoreResult<CalendarFeed> {
        let row = sqlx::query("SELECT * FROM calendar_feeds WHERE id = ? AND user_id = ?")
            .bind(feed_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| CoreError::FeedNotFound(feed_id.to_string()))?;

        feed_from_row(&row)
    }

    async fn feeds_for_user(&self, user_id: &str) -> CoreResult<Vec<CalendarFeed>> {
        let rows = sqlx::query(
            "SELECT * FROM calendar_feeds WHERE user_id = ? ORDER BY created_at ASC, rowid ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(feed_from_row).collect()
    }

    async fn delete_feed(&self, user_id: &str, feed_id: &str) -> CoreResult<()> {
        let result = sqlx::query("DELETE FROM calendar_feeds WHERE id = ? AND user_id = ?")
            .bind(feed_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::FeedNotFound(feed_id.to_string()));
        }
        Ok(())
    }

    async fn record_sync_outcome(&self, feed_id: &str, outcome: &SyncOutcome) -> CoreResult<()> {
        let result = match outcome {
            SyncOutcome::Succeeded { at } => {
                let at = wire_time::format(at);
                sqlx::query(
                    "UPDATE calendar_feeds
                     SET last_synced_at = ?, last_sync_error = NULL, updated_at = ?
                     WHERE id = ?",
                )
                .bind(&at)
                .bind(&at)
                .bind(feed_id)
                .execute(&self.pool)
                .await?
            }
            SyncOutcome::Failed { error } => {
                sqlx::query(
                    "UPDATE calendar_feeds SET last_sync_error = ?, updated_at = ? WHERE id = ?",
                )
                .bind(error)
                .bind(wire_time::format(&Utc::now()))
                .bind(feed_id)
                .execute(&self.pool)
                .await?
            }
        };

        if result.rows_affected() == 0 {
            return Err(CoreError::FeedNotFound(feed_id.to_string()));
        }
        Ok(())
    }

    async fn event_keys(&self, feed_id: &str) -> CoreResult<Vec<EventKey>> {
        let rows = sqlx::query("SELECT id, uid FROM events WHERE feed_id = ?")
            .bind(feed_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| {
                Ok(EventKey {
                    id: row.try_get("id")?,
                    uid: row.try_get("uid")?,
                })
            })
            .collect()
    }

    async fn upsert_event(&self, row: &EventRow) -> CoreResult<()> {
        let now = wire_time::format(&Utc::now());

        sqlx::query(
            "INSERT INTO events
                (id, feed_id, user_id, uid, title, description, location, start_time, end_time,
                 all_day, status, recurrence_rule, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(feed_id, uid) DO UPDATE SET
                title = excluded.title,
                description = excluded.description,
                location = excluded.location,
                start_time = excluded.start_time,
                end_time = excluded.end_time,
                all_day = excluded.all_day,
                status = excluded.status,
                recurrence_rule = excluded.recurrence_rule,
                updated_at = excluded.updated_at",
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(&row.feed_id)
        .bind(&row.user_id)
        .bind(&row.uid)
        .bind(&row.title)
        .bind(&row.description)
        .bind(&row.location)
        .bind(wire_time::format(&row.start_time))
        .bind(wire_time::format(&row.end_time))
        .bind(row.all_day)
        .bind(row.status.map(|s| s.as_str()))
        .bind(&row.recurrence_rule)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| CoreError::Persistence(e.to_string()))?;

        Ok(())
    }

    async fn delete_events(&self, feed_id: &str, uids: &[String]) -> CoreResult<()> {
        if uids.is_empty() {
            return Ok(());
        }

        let batch_delete = |e: sqlx::Error| CoreError::BatchDelete(e.to_string());
        let mut tx = self.pool.begin().await.map_err(batch_delete)?;

        for chunk in uids.chunks(DELETE_CHUNK) {
            let mut query = QueryBuilder::<Sqlite>::new("DELETE FROM events WHERE feed_id = ");
            query.push_bind(feed_id);
            query.push(" AND uid IN (");
            let mut separated = query.separated(", ");
            for uid in chunk {
                separated.push_bind(uid);
            }
            separated.push_unseparated(")");

            query.build().execute(&mut *tx).await.map_err(batch_delete)?;
        }

        tx.commit().await.map_err(batch_delete)?;
        Ok(())
    }

    async fn events(&self, query: &EventQuery) -> CoreResult<Vec<StoredEvent>> {
        let mut sql = QueryBuilder::<Sqlite>::new("SELECT * FROM events WHERE user_id = ");
        sql.push_bind(&query.user_id);

        if let Some(from) = &query.from {
            sql.push(" AND start_time >= ");
            sql.push_bind(wire_time::format(from));
        }
        if let Some(to) = &query.to {
            sql.push(" AND end_time <= ");
            sql.push_bind(wire_time::format(to));
        }
        if !query.feed_ids.is_empty() {
            sql.push(" AND feed_id IN (");
            let mut separated = sql.separated(", ");
            for feed_id in &query.feed_ids {
                separated.push_bind(feed_id);
            }
            separated.push_unseparated(")");
        }
        sql.push(" ORDER BY start_time ASC, uid ASC");

        let rows = sql.build().fetch_all(&self.pool).await?;
        rows.iter().map(event_from_row).collect()
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::ParsedEvent;
    use chrono::{Duration, TimeZone};

    async fn make_store() -> SqliteStore {
        SqliteStore::in_memory().await.unwrap()
    }

    fn parsed(uid: &str, day: u32) -> ParsedEvent {
        let start = Utc.with_ymd_and_hms(2024, 3, day, 9, 0, 0).unwrap();
        ParsedEvent {
            uid: uid.to_string(),
            title: format!("Event {uid}"),
            description: Some("Notes".to_string()),
            location: None,
            start_time: start,
            end_time: start + Duration::hours(1),
            all_day: false,
            status: Some(EventStatus::Tentative),
            recurrence_rule: Some("FREQ=DAILY".to_string()),
        }
    }

    #[tokio::test]
    async fn test_feed_roundtrip_and_outcomes() {
        let store = make_store().await;
        let feed = store
            .create_feed(NewFeed::new("u1", "Work", "https://example.com/a.ics"))
            .await
            .unwrap();

        let loaded = store.feed("u1", &feed.id).await.unwrap();
        assert_eq!(loaded.name, "Work");
        assert!(loaded.last_synced_at.is_none());

        store
            .record_sync_outcome(&feed.id, &SyncOutcome::Failed { error: "boom".into() })
            .await
            .unwrap();
        let failed = store.feed("u1", &feed.id).await.unwrap();
        assert_eq!(failed.last_sync_error.as_deref(), Some("boom"));
        assert!(failed.last_synced_at.is_none());

        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        store
            .record_sync_outcome(&feed.id, &SyncOutcome::Succeeded { at })
            .await
            .unwrap();
        let synced = store.feed("u1", &feed.id).await.unwrap();
        assert_eq!(synced.last_synced_at, Some(at));
        assert!(synced.last_sync_error.is_none());

        assert!(matches!(
            store.feed("someone-else", &feed.id).await,
            Err(CoreError::FeedNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_duplicate_feed_url() {
        let store = make_store().await;
        store
            .create_feed(NewFeed::new("u1", "Work", "https://example.com/a.ics"))
            .await
            .unwrap();

        let dup = store
            .create_feed(NewFeed::new("u1", "Again", "https://example.com/a.ics"))
            .await;
        assert!(matches!(dup, Err(CoreError::DuplicateFeed(_))));
    }

    #[tokio::test]
    async fn test_upsert_preserves_identity() {
        let store = make_store().await;
        let feed = store
            .create_feed(NewFeed::new("u1", "Work", "https://example.com/a.ics"))
            .await
            .unwrap();

        store.upsert_event(&EventRow::new(&feed, &parsed("a", 1))).await.unwrap();
        let before = store.event_keys(&feed.id).await.unwrap();

        let mut changed = parsed("a", 2);
        changed.title = "Moved".to_string();
        changed.status = None;
        store.upsert_event(&EventRow::new(&feed, &changed)).await.unwrap();

        let after = store.event_keys(&feed.id).await.unwrap();
        assert_eq!(before, after);

        let events = store.events(&EventQuery::for_user("u1")).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].title, "Moved");
        assert_eq!(events[0].status, None);
        assert_eq!(events[0].start_time, changed.start_time);
        assert_eq!(events[0].recurrence_rule.as_deref(), Some("FREQ=DAILY"));
    }

    #[tokio::test]
    async fn test_batch_delete_and_cascade() {
        let store = make_store().await;
        let feed = store
            .create_feed(NewFeed::new("u1", "Work", "https://example.com/a.ics"))
            .await
            .unwrap();
        for (uid, day) in [("a", 1), ("b", 2), ("c", 3)] {
            store.upsert_event(&EventRow::new(&feed, &parsed(uid, day))).await.unwrap();
        }

        store.delete_events(&feed.id, &["b".to_string()]).await.unwrap();
        let mut uids: Vec<_> = store
            .event_keys(&feed.id)
            .await
            .unwrap()
            .into_iter()
            .map(|k| k.uid)
            .collect();
        uids.sort();
        assert_eq!(uids, vec!["a", "c"]);

        store.delete_feed("u1", &feed.id).await.unwrap();
        assert!(store.event_keys(&feed.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_events_filtered_by_range_and_feed() {
        let store = make_store().await;
        let work = store
            .create_feed(NewFeed::new("u1", "Work", "https://example.com/a.ics"))
            .await
            .unwrap();
        let home = store
            .create_feed(NewFeed::new("u1", "Home", "https://example.com/b.ics"))
            .await
            .unwrap();
        store.upsert_event(&EventRow::new(&work, &parsed("w1", 5))).await.unwrap();
        store.upsert_event(&EventRow::new(&work, &parsed("w2", 25))).await.unwrap();
        store.upsert_event(&EventRow::new(&home, &parsed("h1", 6))).await.unwrap();

        let mut query = EventQuery::for_user("u1");
        query.from = Some(Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap());
        query.to = Some(Utc.with_ymd_and_hms(2024, 3, 10, 0, 0, 0).unwrap());
        let ranged: Vec<_> = store
            .events(&query)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.uid)
            .collect();
        assert_eq!(ranged, vec!["w1", "h1"]);

        let work_only = store
            .events(&EventQuery::for_user("u1").in_feeds(vec![work.id.clone()]))
            .await
            .unwrap();
        assert_eq!(work_only.len(), 2);
    }
}

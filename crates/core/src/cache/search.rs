//! Durable search cache operations.
//!
//! Implements [`CacheStore`] for [`CacheDb`] on the `search_cache` table.
//! Timestamps are stored as fixed-width RFC 3339 strings so expiry filters
//! can compare them lexically.

use super::connection::CacheDb;
use super::pattern::KeyPattern;
use super::store::{CacheEntry, CacheStore, StoreStats};
use crate::Error;
use crate::model::Listing;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use tokio_rusqlite::{params, rusqlite};

/// Format a timestamp for storage.
pub(crate) fn ts(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a stored timestamp.
pub(crate) fn parse_ts(raw: &str) -> Result<DateTime<Utc>, Error> {
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("bad stored timestamp {raw:?}: {e}")))
}

struct EntryRow {
    key: String,
    payload: String,
    created_at: String,
    expires_at: String,
    access_count: i64,
    last_accessed: Option<String>,
}

impl EntryRow {
    fn into_entry(self) -> Result<CacheEntry, Error> {
        let listings: Vec<Listing> = serde_json::from_str(&self.payload)?;
        Ok(CacheEntry {
            key: self.key,
            listings,
            created_at: parse_ts(&self.created_at)?,
            expires_at: parse_ts(&self.expires_at)?,
            access_count: u64::try_from(self.access_count).unwrap_or(0),
            last_accessed: self.last_accessed.as_deref().map(parse_ts).transpose()?,
        })
    }
}

#[async_trait]
impl CacheStore for CacheDb {
    fn name(&self) -> &'static str {
        "durable"
    }

    /// Get a live entry and record the access in the same statement batch.
    async fn get(&self, key: &str, now: DateTime<Utc>) -> Result<Option<CacheEntry>, Error> {
        let key = key.to_string();
        let now = ts(now);

        let row = self
            .conn
            .call(move |conn| -> Result<Option<EntryRow>, Error> {
                let updated = conn.execute(
                    "UPDATE search_cache
                     SET access_count = access_count + 1, last_accessed = ?2
                     WHERE key = ?1 AND expires_at > ?2",
                    params![key, now],
                )?;
                if updated == 0 {
                    return Ok(None);
                }

                let mut stmt = conn.prepare(
                    "SELECT key, payload, created_at, expires_at, access_count, last_accessed
                     FROM search_cache WHERE key = ?1",
                )?;
                let result = stmt.query_row(params![key], |row| {
                    Ok(EntryRow {
                        key: row.get(0)?,
                        payload: row.get(1)?,
                        created_at: row.get(2)?,
                        expires_at: row.get(3)?,
                        access_count: row.get(4)?,
                        last_accessed: row.get(5)?,
                    })
                });

                match result {
                    Ok(row) => Ok(Some(row)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)?;

        row.map(EntryRow::into_entry).transpose()
    }

    /// Insert or update a cached search result.
    ///
    /// Uses UPSERT semantics; a rewrite resets the access counters.
    async fn put(&self, entry: CacheEntry) -> Result<(), Error> {
        let payload = serde_json::to_string(&entry.listings)?;
        let count = entry.listings.len() as i64;
        let created_at = ts(entry.created_at);
        let expires_at = ts(entry.expires_at);
        let last_accessed = entry.last_accessed.map(ts);
        let access_count = i64::try_from(entry.access_count).unwrap_or(i64::MAX);
        let key = entry.key;

        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO search_cache
                        (key, payload, result_count, created_at, expires_at, access_count, last_accessed)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                    ON CONFLICT(key) DO UPDATE SET
                        payload = excluded.payload,
                        result_count = excluded.result_count,
                        created_at = excluded.created_at,
                        expires_at = excluded.expires_at,
                        access_count = excluded.access_count,
                        last_accessed = excluded.last_accessed",
                    params![key, payload, count, created_at, expires_at, access_count, last_accessed],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn delete_matching(&self, pattern: &KeyPattern) -> Result<u64, Error> {
        let like = pattern.to_sql_like();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute(r"DELETE FROM search_cache WHERE key LIKE ?1 ESCAPE '\'", params![like])?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete expired search cache entries.
    ///
    /// Returns the number of deleted entries.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, Error> {
        let now = ts(now);
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute("DELETE FROM search_cache WHERE expires_at <= ?1", params![now])?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    async fn health_check(&self) -> Result<(), Error> {
        self.ping().await
    }

    async fn stats(&self, now: DateTime<Utc>) -> Result<StoreStats, Error> {
        let now = ts(now);
        self.conn
            .call(move |conn| -> Result<StoreStats, Error> {
                let (entries, expired, total_access): (i64, i64, i64) = conn.query_row(
                    "SELECT COUNT(*),
                            COALESCE(SUM(CASE WHEN expires_at <= ?1 THEN 1 ELSE 0 END), 0),
                            COALESCE(SUM(access_count), 0)
                     FROM search_cache",
                    params![now],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                )?;
                Ok(StoreStats {
                    entries: entries.max(0) as u64,
                    expired_entries: expired.max(0) as u64,
                    total_access: total_access.max(0) as u64,
                })
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Features, Portal, PropertyType};
    use chrono::TimeZone;
    use std::time::Duration;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn listing(id: &str) -> Listing {
        Listing {
            id: id.into(),
            source: Portal::WgGesucht,
            external_id: None,
            url: format!("https://www.wg-gesucht.de/{id}.html"),
            title: format!("Zimmer {id}"),
            price: None,
            area_sqm: Some(18.5),
            main_image: None,
            location: Some("Berlin".into()),
            property_type: PropertyType::Room,
            published_at: None,
            rooms: Some(1),
            features: Features::default(),
            description: None,
        }
    }

    #[tokio::test]
    async fn test_put_and_get_search() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let entry = CacheEntry::new("search:a", vec![listing("1"), listing("2")], t0(), Duration::from_secs(1800));

        db.put(entry.clone()).await.unwrap();

        let retrieved = db.get("search:a", t0()).await.unwrap().unwrap();
        assert_eq!(retrieved.listings, entry.listings);
        assert_eq!(retrieved.created_at, entry.created_at);
        assert_eq!(retrieved.expires_at, entry.expires_at);
        assert_eq!(retrieved.access_count, 1);
        assert_eq!(retrieved.last_accessed, Some(t0()));
    }

    #[tokio::test]
    async fn test_get_missing_search() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let result = db.get("nonexistent", t0()).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_expired_entry_not_returned() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.put(CacheEntry::new("search:a", vec![], t0(), Duration::from_secs(60))).await.unwrap();

        assert!(db.get("search:a", t0() + chrono::Duration::seconds(59)).await.unwrap().is_some());
        assert!(db.get("search:a", t0() + chrono::Duration::seconds(60)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_access_count_accumulates() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.put(CacheEntry::new("search:a", vec![], t0(), Duration::from_secs(60))).await.unwrap();

        for _ in 0..3 {
            db.get("search:a", t0()).await.unwrap();
        }
        let stats = db.stats(t0()).await.unwrap();
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.total_access, 3);
    }

    #[tokio::test]
    async fn test_purge_expired_search() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.put(CacheEntry::new("expiring", vec![], t0(), Duration::from_secs(1))).await.unwrap();
        db.put(CacheEntry::new("fresh", vec![], t0(), Duration::from_secs(3600))).await.unwrap();

        let later = t0() + chrono::Duration::seconds(2);
        let deleted = db.purge_expired(later).await.unwrap();
        assert_eq!(deleted, 1);
        assert!(db.get("expiring", later).await.unwrap().is_none());
        assert!(db.get("fresh", later).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_upsert_search() {
        let db = CacheDb::open_in_memory().await.unwrap();

        db.put(CacheEntry::new("search:a", vec![listing("old")], t0(), Duration::from_secs(3600))).await.unwrap();
        db.put(CacheEntry::new("search:a", vec![listing("new")], t0(), Duration::from_secs(3600))).await.unwrap();

        let retrieved = db.get("search:a", t0()).await.unwrap().unwrap();
        assert_eq!(retrieved.listings, vec![listing("new")]);
    }

    #[tokio::test]
    async fn test_delete_matching_uses_wildcards() {
        let db = CacheDb::open_in_memory().await.unwrap();
        for key in [r#"search:{"city":"berlin"}"#, r#"search:{"city":"berlin","min_rooms":2}"#, r#"search:{"city":"hamburg"}"#] {
            db.put(CacheEntry::new(key, vec![], t0(), Duration::from_secs(60))).await.unwrap();
        }

        let deleted = db.delete_matching(&KeyPattern::new("search:*berlin*").unwrap()).await.unwrap();
        assert_eq!(deleted, 2);
        assert!(db.get(r#"search:{"city":"hamburg"}"#, t0()).await.unwrap().is_some());
    }
}

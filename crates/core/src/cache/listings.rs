//! Permanent storage of normalized listings, upserted by id.

use chrono::{DateTime, Utc};
use tokio_rusqlite::{params, rusqlite};

use super::connection::CacheDb;
use super::search::ts;
use crate::Error;
use crate::model::{Listing, Portal};

impl CacheDb {
    /// Insert or refresh listings by their stable id.
    ///
    /// `first_seen` is kept from the original insert; `last_seen` and the
    /// payload are replaced. Returns the number of rows written.
    pub async fn upsert_listings(&self, listings: &[Listing], now: DateTime<Utc>) -> Result<u64, Error> {
        let rows = listings
            .iter()
            .map(|l| Ok((l.id.clone(), l.source.id().to_string(), l.url.clone(), serde_json::to_string(l)?)))
            .collect::<Result<Vec<_>, Error>>()?;
        let now = ts(now);

        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let tx = conn.transaction()?;
                let mut written = 0u64;
                {
                    let mut stmt = tx.prepare(
                        "INSERT INTO listings (id, source, url, payload, first_seen, last_seen)
                        VALUES (?1, ?2, ?3, ?4, ?5, ?5)
                        ON CONFLICT(id) DO UPDATE SET
                            source = excluded.source,
                            url = excluded.url,
                            payload = excluded.payload,
                            last_seen = excluded.last_seen",
                    )?;
                    for (id, source, url, payload) in &rows {
                        written += stmt.execute(params![id, source, url, payload, now])? as u64;
                    }
                }
                tx.commit()?;
                Ok(written)
            })
            .await
            .map_err(Error::from)
    }

    /// Get a stored listing by id.
    pub async fn get_listing(&self, id: &str) -> Result<Option<Listing>, Error> {
        let id = id.to_string();
        let payload = self
            .conn
            .call(move |conn| -> Result<Option<String>, Error> {
                let result = conn.query_row("SELECT payload FROM listings WHERE id = ?1", params![id], |row| row.get(0));

                match result {
                    Ok(json) => Ok(Some(json)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)?;

        payload.map(|json| serde_json::from_str(&json).map_err(Error::from)).transpose()
    }

    /// Count stored listings, optionally for a single portal.
    pub async fn count_listings(&self, source: Option<Portal>) -> Result<u64, Error> {
        let source = source.map(|p| p.id().to_string());
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 = match source {
                    Some(source) => {
                        conn.query_row("SELECT COUNT(*) FROM listings WHERE source = ?1", params![source], |row| {
                            row.get(0)
                        })?
                    }
                    None => conn.query_row("SELECT COUNT(*) FROM listings", [], |row| row.get(0))?,
                };
                Ok(count.max(0) as u64)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Features, Price, PropertyType};
    use chrono::TimeZone;

    fn listing(id: &str, source: Portal, title: &str) -> Listing {
        Listing {
            id: id.into(),
            source,
            external_id: Some(id.into()),
            url: format!("{}/{id}", source.base_url()),
            title: title.into(),
            price: Some(Price::eur(650.0)),
            area_sqm: None,
            main_image: None,
            location: None,
            property_type: PropertyType::Apartment,
            published_at: None,
            rooms: Some(2),
            features: Features::default(),
            description: None,
        }
    }

    #[tokio::test]
    async fn test_upsert_and_get_listing() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let first = listing("wg-gesucht:abc", Portal::WgGesucht, "Altbau");

        assert_eq!(db.upsert_listings(std::slice::from_ref(&first), now).await.unwrap(), 1);
        assert_eq!(db.get_listing("wg-gesucht:abc").await.unwrap(), Some(first));

        let renamed = listing("wg-gesucht:abc", Portal::WgGesucht, "Altbau mit Balkon");
        db.upsert_listings(std::slice::from_ref(&renamed), now).await.unwrap();
        assert_eq!(db.get_listing("wg-gesucht:abc").await.unwrap(), Some(renamed));
        assert_eq!(db.count_listings(None).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_count_by_source() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let listings = vec![
            listing("wg-gesucht:1", Portal::WgGesucht, "A"),
            listing("wg-gesucht:2", Portal::WgGesucht, "B"),
            listing("immobilienscout24:1", Portal::ImmobilienScout24, "C"),
        ];
        db.upsert_listings(&listings, now).await.unwrap();

        assert_eq!(db.count_listings(None).await.unwrap(), 3);
        assert_eq!(db.count_listings(Some(Portal::WgGesucht)).await.unwrap(), 2);
        assert_eq!(db.count_listings(Some(Portal::Immowelt)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_get_missing_listing() {
        let db = CacheDb::open_in_memory().await.unwrap();
        assert!(db.get_listing("nope").await.unwrap().is_none());
    }
}

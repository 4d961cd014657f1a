//! SQLite-backed [`OfferStore`].

use std::str::FromStr;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection, SqlitePool};
use tracing::{debug, info};

use super::domain::{from_epoch, Image, NewOffer, Offer, Site};
use super::fields::{ImageField, OfferField};
use super::filter::{Condition, OfferFilter};
use super::repository::{OfferStore, PageRequest, StoreError};
use crate::config::DatabaseConfig;

const OFFER_TABLE: &str = "hsearch_apartment";
const IMAGE_TABLE: &str = "hsearch_image";

// Keeps every IN (...) list below SQLite's bound-parameter limit.
const PREFETCH_CHUNK: usize = 500;

const SCHEMA: [&str; 5] = [
    r#"
    CREATE TABLE IF NOT EXISTS hsearch_apartment (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        external_id INTEGER NOT NULL DEFAULT 0,
        url TEXT NOT NULL DEFAULT '',
        topic TEXT NOT NULL DEFAULT '',
        phone TEXT NOT NULL DEFAULT '',
        rooms INTEGER NOT NULL DEFAULT 0,
        body TEXT NOT NULL DEFAULT '',
        images_count INTEGER NOT NULL DEFAULT 0,
        price INTEGER NOT NULL DEFAULT 0,
        currency INTEGER NOT NULL DEFAULT 0,
        area INTEGER NOT NULL DEFAULT 0,
        city TEXT NOT NULL DEFAULT '',
        room_type TEXT NOT NULL DEFAULT '',
        site TEXT NOT NULL CHECK (site IN ('diesel', 'lalafo', 'house')),
        floor INTEGER NOT NULL DEFAULT 0,
        max_floor INTEGER NOT NULL DEFAULT 0,
        district TEXT NOT NULL DEFAULT '',
        lat REAL NOT NULL DEFAULT 0,
        lon REAL NOT NULL DEFAULT 0,
        created INTEGER NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS hsearch_apartment_created_idx ON hsearch_apartment (created)",
    "CREATE INDEX IF NOT EXISTS hsearch_apartment_site_idx ON hsearch_apartment (site)",
    r#"
    CREATE TABLE IF NOT EXISTS hsearch_image (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        apartment_id INTEGER NOT NULL REFERENCES hsearch_apartment (id) ON DELETE CASCADE,
        path TEXT NOT NULL UNIQUE,
        created INTEGER NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS hsearch_image_apartment_idx ON hsearch_image (apartment_id)",
];

#[derive(Clone)]
pub struct SqliteOfferStore {
    pool: SqlitePool,
}

impl SqliteOfferStore {
    /// Opens (creating if needed) the database named by `config.url`.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(&config.url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .with_regexp();

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await?;

        info!(url = %config.url, "offer store connected");
        Ok(Self { pool })
    }

    /// A private in-memory database with the schema applied.
    ///
    /// Pinned to a single connection that never expires, since every SQLite
    /// memory connection is a separate database.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?
            .foreign_keys(true)
            .with_regexp();
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.initialize_schema().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn initialize_schema(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        debug!("offer schema ready");
        Ok(())
    }

    pub async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl OfferStore for SqliteOfferStore {
    async fn count(&self, filter: &OfferFilter) -> Result<i64, StoreError> {
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM ");
        builder.push(OFFER_TABLE);
        push_filter(&mut builder, filter);

        let total = builder
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;
        Ok(total)
    }

    async fn fetch_page(&self, request: &PageRequest) -> Result<Vec<Offer>, StoreError> {
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT id");
        for field in request.fields.iter().filter(|field| **field != OfferField::Id) {
            builder.push(", ").push(field.column());
        }
        builder.push(" FROM ").push(OFFER_TABLE);
        push_filter(&mut builder, &request.filter);

        builder
            .push(" ORDER BY ")
            .push(request.order.field.column())
            .push(if request.order.descending { " DESC" } else { " ASC" });
        // Ties on the sort column would otherwise shuffle rows between pages.
        if request.order.field != OfferField::Id {
            builder.push(", id ASC");
        }
        builder
            .push(" LIMIT ")
            .push_bind(request.limit)
            .push(" OFFSET ")
            .push_bind(request.offset);

        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| offer_from_row(row, &request.fields))
            .collect()
    }

    async fn fetch_images(
        &self,
        offer_ids: &[i64],
        fields: &[ImageField],
    ) -> Result<Vec<Image>, StoreError> {
        let mut images = Vec::new();
        for chunk in offer_ids.chunks(PREFETCH_CHUNK) {
            let mut builder = QueryBuilder::<Sqlite>::new("SELECT id, apartment_id");
            for field in fields.iter().filter(|field| **field != ImageField::ApartmentId) {
                builder.push(", ").push(field.column());
            }
            builder
                .push(" FROM ")
                .push(IMAGE_TABLE)
                .push(" WHERE apartment_id IN (");
            let mut ids = builder.separated(", ");
            for id in chunk {
                ids.push_bind(*id);
            }
            builder.push(") ORDER BY apartment_id ASC, id ASC");

            let rows = builder.build().fetch_all(&self.pool).await?;
            for row in &rows {
                images.push(image_from_row(row, fields)?);
            }
        }
        Ok(images)
    }

    async fn fetch(&self, id: i64) -> Result<Option<Offer>, StoreError> {
        let row = sqlx::query(
            "SELECT id, external_id, url, topic, phone, rooms, body, images_count, price, \
             currency, area, city, room_type, site, floor, max_floor, district, lat, lon, created \
             FROM hsearch_apartment WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut offer = offer_from_row(&row, &OfferField::ALL)?;
        offer.external_id = row.try_get("external_id")?;
        offer.max_floor = row.try_get("max_floor")?;
        offer.lat = row.try_get("lat")?;
        offer.lon = row.try_get("lon")?;
        Ok(Some(offer))
    }

    async fn insert_offer(&self, offer: NewOffer) -> Result<Offer, StoreError> {
        let created = offer.created.unwrap_or_else(Utc::now).timestamp();
        let mut tx = self.pool.begin().await?;

        let id = sqlx::query(
            "INSERT INTO hsearch_apartment (external_id, created, site, url, topic, price, \
             currency, phone, rooms, area, floor, max_floor, district, city, room_type, body, \
             images_count, lat, lon) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?)",
        )
        .bind(offer.external_id)
        .bind(created)
        .bind(offer.site.as_str())
        .bind(&offer.url)
        .bind(&offer.topic)
        .bind(offer.price)
        .bind(offer.currency)
        .bind(&offer.phone)
        .bind(offer.rooms)
        .bind(offer.area)
        .bind(offer.floor)
        .bind(offer.max_floor)
        .bind(&offer.district)
        .bind(&offer.city)
        .bind(&offer.room_type)
        .bind(&offer.body)
        .bind(offer.lat)
        .bind(offer.lon)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        for path in &offer.images {
            sqlx::query(
                "INSERT OR IGNORE INTO hsearch_image (apartment_id, path, created) VALUES (?, ?, ?)",
            )
            .bind(id)
            .bind(path)
            .bind(created)
            .execute(&mut *tx)
            .await?;
        }

        let images_count = sync_images_count(&mut tx, id).await?;
        tx.commit().await?;

        debug!(offer_id = id, images_count, "offer stored");
        self.fetch(id).await?.ok_or(StoreError::NotFound)
    }

    async fn add_image(&self, offer_id: i64, path: &str) -> Result<Image, StoreError> {
        let created = Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;

        let exists = sqlx::query("SELECT 1 FROM hsearch_apartment WHERE id = ?")
            .bind(offer_id)
            .fetch_optional(&mut *tx)
            .await?
            .is_some();
        if !exists {
            return Err(StoreError::NotFound);
        }

        let id = sqlx::query("INSERT INTO hsearch_image (apartment_id, path, created) VALUES (?, ?, ?)")
            .bind(offer_id)
            .bind(path)
            .bind(created)
            .execute(&mut *tx)
            .await?
            .last_insert_rowid();

        sync_images_count(&mut tx, offer_id).await?;
        tx.commit().await?;

        Ok(Image {
            id,
            apartment_id: offer_id,
            path: path.to_string(),
            created: timestamp(created)?,
        })
    }

    async fn delete_image(&self, image_id: i64) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        let offer_id: i64 = sqlx::query_scalar("SELECT apartment_id FROM hsearch_image WHERE id = ?")
            .bind(image_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(StoreError::NotFound)?;

        sqlx::query("DELETE FROM hsearch_image WHERE id = ?")
            .bind(image_id)
            .execute(&mut *tx)
            .await?;

        sync_images_count(&mut tx, offer_id).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn delete_offer(&self, id: i64) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM hsearch_apartment WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn recount_images(&self) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "UPDATE hsearch_apartment \
             SET images_count = (SELECT COUNT(*) FROM hsearch_image i WHERE i.apartment_id = hsearch_apartment.id) \
             WHERE images_count <> (SELECT COUNT(*) FROM hsearch_image i WHERE i.apartment_id = hsearch_apartment.id)",
        )
        .execute(&self.pool)
        .await?;

        let repaired = result.rows_affected();
        if repaired > 0 {
            info!(repaired, "image counters repaired");
        }
        Ok(repaired)
    }
}

/// Recomputes `images_count` for one offer from its rows.
async fn sync_images_count(conn: &mut SqliteConnection, offer_id: i64) -> Result<i64, StoreError> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM hsearch_image WHERE apartment_id = ?")
        .bind(offer_id)
        .fetch_one(&mut *conn)
        .await?;

    sqlx::query("UPDATE hsearch_apartment SET images_count = ? WHERE id = ?")
        .bind(count)
        .bind(offer_id)
        .execute(&mut *conn)
        .await?;

    Ok(count)
}

fn push_filter(builder: &mut QueryBuilder<'_, Sqlite>, filter: &OfferFilter) {
    for (index, condition) in filter.conditions().iter().enumerate() {
        builder.push(if index == 0 { " WHERE " } else { " AND " });
        match condition {
            Condition::Contains { field, needle } => {
                builder
                    .push(field.column())
                    .push(" REGEXP ")
                    .push_bind(contains_pattern(needle));
            }
            Condition::EqualsInt { field, value } => {
                builder.push(field.column()).push(" = ").push_bind(*value);
            }
            Condition::EqualsText { field, value } => {
                builder.push(field.column()).push(" = ").push_bind(value.clone());
            }
            Condition::Between { field, low, high } => {
                builder
                    .push(field.column())
                    .push(" BETWEEN ")
                    .push_bind(*low)
                    .push(" AND ")
                    .push_bind(*high);
            }
            Condition::HasImages(true) => {
                builder.push("images_count > 0");
            }
            Condition::HasImages(false) => {
                builder.push("images_count < 1");
            }
            Condition::Nothing => {
                builder.push("1 = 0");
            }
        }
    }
}

/// Unicode case-insensitive literal match, evaluated by the connection's REGEXP function.
fn contains_pattern(needle: &str) -> String {
    format!("(?i){}", regex::escape(needle))
}

fn offer_from_row(row: &SqliteRow, fields: &[OfferField]) -> Result<Offer, StoreError> {
    let mut offer = Offer {
        id: row.try_get("id")?,
        ..Offer::default()
    };

    for field in fields {
        match field {
            OfferField::Id => {}
            OfferField::Url => offer.url = row.try_get("url")?,
            OfferField::Topic => offer.topic = row.try_get("topic")?,
            OfferField::Phone => offer.phone = row.try_get("phone")?,
            OfferField::Rooms => offer.rooms = row.try_get("rooms")?,
            OfferField::Body => offer.body = row.try_get("body")?,
            OfferField::ImagesCount => offer.images_count = row.try_get("images_count")?,
            OfferField::Price => offer.price = row.try_get("price")?,
            OfferField::Currency => offer.currency = row.try_get("currency")?,
            OfferField::Area => offer.area = row.try_get("area")?,
            OfferField::City => offer.city = row.try_get("city")?,
            OfferField::RoomType => offer.room_type = row.try_get("room_type")?,
            OfferField::Site => {
                let raw: String = row.try_get("site")?;
                offer.site = Site::parse(&raw)
                    .ok_or_else(|| StoreError::InvalidData(format!("unknown site '{raw}'")))?;
            }
            OfferField::Floor => offer.floor = row.try_get("floor")?,
            OfferField::District => offer.district = row.try_get("district")?,
            OfferField::Created => offer.created = timestamp(row.try_get("created")?)?,
        }
    }

    Ok(offer)
}

fn image_from_row(row: &SqliteRow, fields: &[ImageField]) -> Result<Image, StoreError> {
    let mut image = Image {
        id: row.try_get("id")?,
        apartment_id: row.try_get("apartment_id")?,
        ..Image::default()
    };

    for field in fields {
        match field {
            ImageField::ApartmentId => {}
            ImageField::Path => image.path = row.try_get("path")?,
            ImageField::Created => image.created = timestamp(row.try_get("created")?)?,
        }
    }

    Ok(image)
}

fn timestamp(seconds: i64) -> Result<chrono::DateTime<Utc>, StoreError> {
    from_epoch(seconds)
        .ok_or_else(|| StoreError::InvalidData(format!("timestamp {seconds} out of range")))
}

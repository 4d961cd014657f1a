use std::sync::Arc;

use async_trait::async_trait;
use axum::response::Response;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::config::ListingConfig;
use crate::offers::domain::{Image, NewOffer, Offer, Site};
use crate::offers::fields::ImageField;
use crate::offers::filter::OfferFilter;
use crate::offers::repository::{OfferStore, PageRequest, StoreError};
use crate::offers::service::OfferListingService;
use crate::offers::sqlite::SqliteOfferStore;

pub(super) const BASE_TIMESTAMP: i64 = 1_700_000_000;

pub(super) fn created_at(offset: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(BASE_TIMESTAMP + offset, 0).expect("valid timestamp")
}

pub(super) fn new_offer(external_id: i64) -> NewOffer {
    NewOffer {
        external_id,
        site: Site::Diesel,
        url: format!("https://diesel.elcat.kg/topic/{external_id}"),
        topic: format!("Offer {external_id}"),
        phone: "+996555000111".to_string(),
        rooms: 2,
        body: "Sunny flat with a balcony".to_string(),
        price: 400,
        currency: 1,
        area: 54,
        city: "Bishkek".to_string(),
        room_type: "separate".to_string(),
        floor: 3,
        max_floor: 9,
        district: "Asanbai".to_string(),
        created: Some(created_at(external_id)),
        ..NewOffer::default()
    }
}

pub(super) async fn memory_store() -> Arc<SqliteOfferStore> {
    Arc::new(
        SqliteOfferStore::in_memory()
            .await
            .expect("in-memory store opens"),
    )
}

/// Store holding `count` offers with ids `1..=count` and no images.
pub(super) async fn seeded_store(count: i64) -> Arc<SqliteOfferStore> {
    let store = memory_store().await;
    for external_id in 1..=count {
        store
            .insert_offer(new_offer(external_id))
            .await
            .expect("offer stored");
    }
    store
}

pub(super) fn build_service<S>(store: Arc<S>) -> OfferListingService<S>
where
    S: OfferStore + 'static,
{
    OfferListingService::new(store, ListingConfig::default())
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 1 << 20)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

pub(super) struct UnavailableStore;

fn offline() -> StoreError {
    StoreError::Unavailable("database offline".to_string())
}

#[async_trait]
impl OfferStore for UnavailableStore {
    async fn count(&self, _filter: &OfferFilter) -> Result<i64, StoreError> {
        Err(offline())
    }

    async fn fetch_page(&self, _request: &PageRequest) -> Result<Vec<Offer>, StoreError> {
        Err(offline())
    }

    async fn fetch_images(
        &self,
        _offer_ids: &[i64],
        _fields: &[ImageField],
    ) -> Result<Vec<Image>, StoreError> {
        Err(offline())
    }

    async fn fetch(&self, _id: i64) -> Result<Option<Offer>, StoreError> {
        Err(offline())
    }

    async fn insert_offer(&self, _offer: NewOffer) -> Result<Offer, StoreError> {
        Err(offline())
    }

    async fn add_image(&self, _offer_id: i64, _path: &str) -> Result<Image, StoreError> {
        Err(offline())
    }

    async fn delete_image(&self, _image_id: i64) -> Result<(), StoreError> {
        Err(offline())
    }

    async fn delete_offer(&self, _id: i64) -> Result<(), StoreError> {
        Err(offline())
    }

    async fn recount_images(&self) -> Result<u64, StoreError> {
        Err(offline())
    }
}

use async_trait::async_trait;

use super::domain::{Image, NewOffer, Offer};
use super::fields::{ImageField, OfferField};
use super::filter::OfferFilter;
use super::params::SortOrder;

/// One ordered, projected slice of the offers matching a filter.
#[derive(Debug, Clone)]
pub struct PageRequest {
    pub filter: OfferFilter,
    pub order: SortOrder,
    /// Columns to load. The primary key is always loaded.
    pub fields: Vec<OfferField>,
    pub limit: i64,
    pub offset: i64,
}

/// Persistence seam for offers and their images.
///
/// Implementations keep `Offer::images_count` equal to the number of stored
/// images for that offer after every write that adds or removes an image.
#[async_trait]
pub trait OfferStore: Send + Sync {
    async fn count(&self, filter: &OfferFilter) -> Result<i64, StoreError>;

    async fn fetch_page(&self, request: &PageRequest) -> Result<Vec<Offer>, StoreError>;

    /// Images of all given offers, ordered by offer then image id.
    /// `apartment_id` is always populated so callers can group the rows.
    async fn fetch_images(
        &self,
        offer_ids: &[i64],
        fields: &[ImageField],
    ) -> Result<Vec<Image>, StoreError>;

    async fn fetch(&self, id: i64) -> Result<Option<Offer>, StoreError>;

    /// Writes the offer and its images atomically. Image paths already in the
    /// store are skipped.
    async fn insert_offer(&self, offer: NewOffer) -> Result<Offer, StoreError>;

    async fn add_image(&self, offer_id: i64, path: &str) -> Result<Image, StoreError>;

    async fn delete_image(&self, image_id: i64) -> Result<(), StoreError>;

    /// Removes the offer together with its images.
    async fn delete_offer(&self, id: i64) -> Result<(), StoreError>;

    /// Fixes offers whose image counter drifted from their rows, returning how many changed.
    async fn recount_images(&self) -> Result<u64, StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("record already exists")]
    Conflict,
    #[error("stored data is invalid: {0}")]
    InvalidData(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(value: sqlx::Error) -> Self {
        match &value {
            sqlx::Error::Database(db) if db.is_unique_violation() => Self::Conflict,
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                Self::Unavailable(value.to_string())
            }
            _ => Self::Database(value),
        }
    }
}

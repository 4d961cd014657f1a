use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use super::domain::Image;
use super::fields::{FieldSelection, ImageField, Relation};
use super::params::{ListingParams, ListingRequest, ParamError};
use super::repository::{OfferStore, PageRequest, StoreError};
use crate::config::ListingConfig;

/// One page of the offer listing, serialized as the endpoint's response body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListingPage {
    pub results: Vec<Map<String, Value>>,
    pub total: i64,
    pub per_page: i64,
    pub total_pages: i64,
    pub current_page: i64,
    pub order: String,
}

/// Read-only query service over an [`OfferStore`].
pub struct OfferListingService<S> {
    store: Arc<S>,
    defaults: ListingConfig,
}

impl<S> OfferListingService<S>
where
    S: OfferStore + 'static,
{
    pub fn new(store: Arc<S>, defaults: ListingConfig) -> Self {
        Self { store, defaults }
    }

    /// Validates raw query parameters and returns the requested page.
    pub async fn list(&self, params: &ListingParams) -> Result<ListingPage, ListingError> {
        let request = ListingRequest::from_params(params, self.defaults)?;
        self.page(&request).await
    }

    pub async fn page(&self, request: &ListingRequest) -> Result<ListingPage, ListingError> {
        let total = self.store.count(&request.filter).await?;
        let total_pages = total_pages(total, request.per_page);

        debug!(
            page = request.page,
            per_page = request.per_page,
            order = %request.order,
            total,
            filtered = !request.filter.is_empty(),
            "listing offers"
        );

        let results = if request.page >= 1 && request.page <= total_pages {
            self.load_page(request).await?
        } else {
            Vec::new()
        };

        Ok(ListingPage {
            results,
            total,
            per_page: request.per_page,
            total_pages,
            current_page: request.page,
            order: request.order.to_string(),
        })
    }

    /// Every allow-listed field of one offer, images included.
    pub async fn detail(&self, id: i64) -> Result<Map<String, Value>, ListingError> {
        let offer = self
            .store
            .fetch(id)
            .await?
            .ok_or(ListingError::NotFound(id))?;

        let images = self.store.fetch_images(&[id], &ImageField::ALL).await?;
        Ok(FieldSelection::everything().shape(&offer, &group_by_offer(images)))
    }

    async fn load_page(
        &self,
        request: &ListingRequest,
    ) -> Result<Vec<Map<String, Value>>, ListingError> {
        let offers = self
            .store
            .fetch_page(&PageRequest {
                filter: request.filter.clone(),
                order: request.order,
                fields: request.fields.offer_fields(),
                limit: request.per_page,
                offset: request.offset(),
            })
            .await?;

        let images = if request.fields.wants_relation(Relation::Images) && !offers.is_empty() {
            let ids: Vec<i64> = offers.iter().map(|offer| offer.id).collect();
            let rows = self
                .store
                .fetch_images(&ids, &request.fields.image_fields())
                .await?;
            group_by_offer(rows)
        } else {
            HashMap::new()
        };

        Ok(offers
            .iter()
            .map(|offer| request.fields.shape(offer, &images))
            .collect())
    }
}

fn group_by_offer(images: Vec<Image>) -> HashMap<i64, Vec<Image>> {
    let mut grouped: HashMap<i64, Vec<Image>> = HashMap::new();
    for image in images {
        grouped.entry(image.apartment_id).or_default().push(image);
    }
    grouped
}

/// Zero rows give zero pages.
pub(crate) fn total_pages(total: i64, per_page: i64) -> i64 {
    if total <= 0 || per_page <= 0 {
        return 0;
    }
    total / per_page + i64::from(total % per_page != 0)
}

/// Error raised by the listing service.
#[derive(Debug, thiserror::Error)]
pub enum ListingError {
    #[error(transparent)]
    Params(#[from] ParamError),
    #[error("Offer {0} not found.")]
    NotFound(i64),
    #[error(transparent)]
    Store(#[from] StoreError),
}

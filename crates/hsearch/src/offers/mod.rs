//! Offer listing: field allow-lists, request validation, filtering, persistence
//! and the HTTP surface.
//!
//! Requests flow `router` -> `service` -> [`OfferStore`]. The service never
//! writes; the write operations on the store exist for ingestion tooling and
//! keep each offer's image counter in step with its image rows.

pub mod domain;
pub mod fields;
pub mod filter;
pub mod params;
pub mod repository;
pub mod router;
pub mod service;
pub mod sqlite;

#[cfg(test)]
mod tests;

pub use domain::{Image, NewOffer, Offer, Site};
pub use fields::{FieldSelection, ImageField, OfferField, Relation, RELATION_SEPARATOR};
pub use filter::{Condition, OfferFilter, OfferFilterParams};
pub use params::{ListingParams, ListingRequest, ParamError, SortOrder};
pub use repository::{OfferStore, PageRequest, StoreError};
pub use router::offer_router;
pub use service::{ListingError, ListingPage, OfferListingService};
pub use sqlite::SqliteOfferStore;

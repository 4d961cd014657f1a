use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use tracing::error;

use super::params::ListingParams;
use super::repository::OfferStore;
use super::service::{ListingError, OfferListingService};

pub const LIST_PATH: &str = "/api/v1/offers/list/";
pub const DETAIL_PATH: &str = "/api/v1/offers/:offer_id";

/// Router exposing the offer listing and detail endpoints.
pub fn offer_router<S>(service: Arc<OfferListingService<S>>) -> Router
where
    S: OfferStore + 'static,
{
    Router::new()
        .route(LIST_PATH, get(list_handler::<S>))
        .route("/api/v1/offers/list", get(list_handler::<S>))
        .route(DETAIL_PATH, get(detail_handler::<S>))
        .with_state(service)
}

pub(crate) async fn list_handler<S>(
    State(service): State<Arc<OfferListingService<S>>>,
    query: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> Response
where
    S: OfferStore + 'static,
{
    let pairs = match query {
        Ok(Query(pairs)) => pairs,
        Err(rejection) => return message(StatusCode::BAD_REQUEST, rejection.body_text()),
    };

    match service.list(&ListingParams::from_pairs(pairs)).await {
        Ok(page) => (StatusCode::OK, Json(page)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn detail_handler<S>(
    State(service): State<Arc<OfferListingService<S>>>,
    Path(offer_id): Path<String>,
) -> Response
where
    S: OfferStore + 'static,
{
    let Ok(id) = offer_id.trim().parse::<i64>() else {
        return message(
            StatusCode::BAD_REQUEST,
            "The offer id must be an integer.".to_string(),
        );
    };

    match service.detail(id).await {
        Ok(offer) => (StatusCode::OK, Json(offer)).into_response(),
        Err(err) => error_response(err),
    }
}

fn error_response(err: ListingError) -> Response {
    match err {
        ListingError::Params(err) => message(StatusCode::BAD_REQUEST, err.to_string()),
        ListingError::NotFound(_) => message(StatusCode::NOT_FOUND, err.to_string()),
        ListingError::Store(err) => {
            error!(error = %err, "offer store failure");
            message(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error.".to_string(),
            )
        }
    }
}

fn message(status: StatusCode, message: String) -> Response {
    (status, Json(json!({ "message": message }))).into_response()
}

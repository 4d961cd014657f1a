use super::common::*;
use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{Request, StatusCode};
use serde_json::json;
use std::sync::Arc;
use tower::ServiceExt;

use crate::offers::fields::OfferField;
use crate::offers::repository::OfferStore;
use crate::offers::router::{detail_handler, list_handler, offer_router};
use crate::offers::sqlite::SqliteOfferStore;

async fn get(router: axum::Router, uri: &str) -> axum::response::Response {
    router
        .oneshot(Request::get(uri).body(Body::empty()).expect("request builds"))
        .await
        .expect("route executes")
}

#[tokio::test]
async fn list_route_returns_the_page_envelope() {
    let router = offer_router(Arc::new(build_service(seeded_store(3).await)));

    let response = get(router, "/api/v1/offers/list/?page=1&per_page=2&order=id").await;

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["total"], json!(3));
    assert_eq!(payload["per_page"], json!(2));
    assert_eq!(payload["total_pages"], json!(2));
    assert_eq!(payload["current_page"], json!(1));
    assert_eq!(payload["order"], json!("id"));
    assert_eq!(payload["results"][0]["id"], json!(1));
    assert_eq!(payload["results"][1]["id"], json!(2));
}

#[tokio::test]
async fn list_route_without_trailing_slash() {
    let router = offer_router(Arc::new(build_service(seeded_store(1).await)));

    let response = get(router, "/api/v1/offers/list").await;

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn non_integer_page_is_a_bad_request() {
    let router = offer_router(Arc::new(build_service(seeded_store(1).await)));

    let response = get(router, "/api/v1/offers/list/?page=abc").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let payload = read_json_body(response).await;
    assert_eq!(
        payload,
        json!({ "message": "The 'page' parameter must be an integer." })
    );
}

#[tokio::test]
async fn non_integer_per_page_is_a_bad_request() {
    let router = offer_router(Arc::new(build_service(seeded_store(1).await)));

    let response = get(router, "/api/v1/offers/list/?per_page=1.5").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let payload = read_json_body(response).await;
    assert_eq!(
        payload["message"],
        json!("The 'per_page' parameter must be an integer.")
    );
}

#[tokio::test]
async fn repeated_query_keys_keep_the_last_value() {
    let router = offer_router(Arc::new(build_service(seeded_store(2).await)));

    let response = get(
        router,
        "/api/v1/offers/list/?fields=id&fields=price&per_page=1&order=id",
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["results"], json!([{ "price": 400 }]));
    assert_eq!(payload["total_pages"], json!(2));
}

#[tokio::test]
async fn oversized_page_is_an_empty_page() {
    let router = offer_router(Arc::new(build_service(seeded_store(2).await)));

    let response = get(router, "/api/v1/offers/list/?page=99999999999999999999").await;

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["results"], json!([]));
    assert_eq!(payload["total"], json!(2));
    assert_eq!(payload["current_page"], json!(i64::MAX));
}

#[tokio::test]
async fn invalid_order_lists_allowed_fields() {
    let service = Arc::new(build_service(seeded_store(1).await));

    let response = list_handler::<SqliteOfferStore>(
        State(service),
        Ok(Query(vec![(
            "order".to_string(),
            "nonexistent_field".to_string(),
        )])),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let payload = read_json_body(response).await;
    let message = payload["message"].as_str().expect("message present");
    assert!(message.contains(&OfferField::allowed_names()));
}

#[tokio::test]
async fn fields_and_filters_travel_through_the_query_string() {
    let store = memory_store().await;
    let mut cheap = new_offer(1);
    cheap.price = 250;
    cheap.topic = "Cosy studio".to_string();
    store.insert_offer(cheap).await.expect("offer stored");
    store.insert_offer(new_offer(2)).await.expect("offer stored");
    let router = offer_router(Arc::new(build_service(store)));

    let response = get(
        router,
        "/api/v1/offers/list/?fields=id,topic,images__path&price=200,300&topic=STUDIO",
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["total"], json!(1));
    assert_eq!(
        payload["results"],
        json!([{ "id": 1, "topic": "Cosy studio", "images": [] }])
    );
}

#[tokio::test]
async fn detail_route_returns_offer() {
    let router = offer_router(Arc::new(build_service(seeded_store(2).await)));

    let response = get(router, "/api/v1/offers/2").await;

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["id"], json!(2));
    assert_eq!(payload["site"], json!("diesel"));
    assert_eq!(payload["images"], json!([]));
}

#[tokio::test]
async fn detail_handler_maps_missing_and_malformed_ids() {
    let service = Arc::new(build_service(seeded_store(1).await));

    let missing =
        detail_handler::<SqliteOfferStore>(State(service.clone()), Path("404".to_string())).await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        read_json_body(missing).await,
        json!({ "message": "Offer 404 not found." })
    );

    let malformed =
        detail_handler::<SqliteOfferStore>(State(service), Path("abc".to_string())).await;
    assert_eq!(malformed.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn store_outage_is_an_internal_error() {
    let service = Arc::new(build_service(Arc::new(UnavailableStore)));

    let response = list_handler::<UnavailableStore>(
        State(service),
        Ok(Query(Vec::new())),
    )
    .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let payload = read_json_body(response).await;
    assert_eq!(payload, json!({ "message": "Internal server error." }));
}

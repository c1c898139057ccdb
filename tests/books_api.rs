//! End-to-end tests of the HTTP surface over the in-memory store.

use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use bookshelf_api::{
    app,
    middleware::{build_limiter, Permission, StaticTokens},
    AppState, BookStore, InMemoryBookStore, LimiterConfig,
};
use chrono::Datelike;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

const WRITER: &str = "writer-token";
const READER: &str = "reader-token";

fn tokens() -> Arc<StaticTokens> {
    Arc::new(
        StaticTokens::default()
            .with_token(WRITER, &[Permission::BooksRead, Permission::BooksWrite])
            .with_token(READER, &[Permission::BooksRead]),
    )
}

fn test_app() -> (Router, Arc<InMemoryBookStore>) {
    let store = Arc::new(InMemoryBookStore::new());
    let state = AppState::new(store.clone()).with_tokens(tokens());
    (app(state, &[]), store)
}

struct Reply {
    status: StatusCode,
    headers: HeaderMap,
    body: Value,
}

async fn send(
    router: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    extra: &[(&str, &str)],
    body: Option<String>,
) -> Reply {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    for (name, value) in extra {
        builder = builder.header(*name, *value);
    }
    let request = builder
        .body(body.map(Body::from).unwrap_or_else(Body::empty))
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    Reply { status, headers, body }
}

async fn get(router: &Router, uri: &str) -> Reply {
    send(router, Method::GET, uri, Some(READER), &[], None).await
}

async fn create(router: &Router, body: Value) -> Reply {
    send(router, Method::POST, "/v1/books", Some(WRITER), &[], Some(body.to_string())).await
}

async fn patch(router: &Router, uri: &str, extra: &[(&str, &str)], body: Value) -> Reply {
    send(router, Method::PATCH, uri, Some(WRITER), extra, Some(body.to_string())).await
}

async fn seed(router: &Router) {
    for (title, year, pages) in [
        ("Dune", 1965, 412),
        ("The Left Hand of Darkness", 1969, 304),
        ("Dune Messiah", 1969, 256),
    ] {
        let reply = create(router, json!({"title": title, "year": year, "pages": pages})).await;
        assert_eq!(reply.status, StatusCode::CREATED);
    }
}

#[tokio::test]
async fn test_healthcheck_is_public() {
    let (router, _) = test_app();
    let reply = send(&router, Method::GET, "/v1/healthcheck", None, &[], None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["status"], "available");
    assert_eq!(reply.body["system_info"]["environment"], "development");
    assert_eq!(reply.body["system_info"]["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(reply.headers[header::VARY], "Authorization");
}

#[tokio::test]
async fn test_create_then_show() {
    let (router, store) = test_app();
    let reply = create(&router, json!({"title": "Dune", "year": 1965, "pages": 412})).await;
    assert_eq!(reply.status, StatusCode::CREATED);
    assert_eq!(reply.headers[header::LOCATION], "/v1/books/1");
    assert_eq!(
        reply.body,
        json!({"books": {"id": 1, "title": "Dune", "year": 1965, "pages": "412 pages", "version": 1}})
    );
    assert_eq!(store.count().await, 1);

    let shown = get(&router, "/v1/books/1").await;
    assert_eq!(shown.status, StatusCode::OK);
    assert_eq!(shown.body, reply.body);
}

#[tokio::test]
async fn test_create_accepts_pages_string_form() {
    let (router, _) = test_app();
    let reply = create(&router, json!({"title": "Dune", "year": 1965, "pages": "412 pages"})).await;
    assert_eq!(reply.status, StatusCode::CREATED);
    assert_eq!(reply.body["books"]["pages"], "412 pages");

    let bad = create(&router, json!({"title": "Dune", "year": 1965, "pages": "many"})).await;
    assert_eq!(bad.status, StatusCode::BAD_REQUEST);
    assert_eq!(bad.body["error"]["code"], "bad_request");
}

#[tokio::test]
async fn test_create_reports_every_failing_field() {
    let (router, store) = test_app();
    let reply = create(&router, json!({})).await;
    assert_eq!(reply.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(reply.body["error"]["code"], "failed_validation");
    assert_eq!(
        reply.body["error"]["details"],
        json!({"title": "must be provided", "year": "must be provided", "pages": "must be provided"})
    );

    let next_year = chrono::Utc::now().year() + 1;
    let reply = create(&router, json!({"title": "Later", "year": next_year, "pages": -1})).await;
    assert_eq!(reply.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        reply.body["error"]["details"],
        json!({"year": "must not be in the future", "pages": "must be a positive integer"})
    );
    assert_eq!(store.count().await, 0);
}

#[tokio::test]
async fn test_create_rejects_malformed_bodies() {
    let (router, _) = test_app();
    let unknown = create(&router, json!({"title": "Dune", "year": 1965, "pages": 412, "rating": 5})).await;
    assert_eq!(unknown.status, StatusCode::BAD_REQUEST);

    let empty = send(&router, Method::POST, "/v1/books", Some(WRITER), &[], None).await;
    assert_eq!(empty.status, StatusCode::BAD_REQUEST);
    assert_eq!(empty.body["error"]["message"], "bad request: body must not be empty");

    let broken = send(&router, Method::POST, "/v1/books", Some(WRITER), &[], Some("{\"title\":".into())).await;
    assert_eq!(broken.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_show_unknown_or_malformed_id_is_not_found() {
    let (router, _) = test_app();
    for uri in ["/v1/books/999", "/v1/books/abc", "/v1/books/0", "/v1/books/-4", "/v1/books/%FF"] {
        let reply = get(&router, uri).await;
        assert_eq!(reply.status, StatusCode::NOT_FOUND, "{uri}");
        assert_eq!(reply.body["error"]["code"], "not_found");
    }
}

#[tokio::test]
async fn test_update_merges_patch_and_bumps_version() {
    let (router, _) = test_app();
    create(&router, json!({"title": "Dune", "year": 1965, "pages": 412})).await;

    let reply = patch(&router, "/v1/books/1", &[("X-Expected-Version", "1")], json!({"title": "Dune (Deluxe)", "pages": null})).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(
        reply.body,
        json!({"books": {"id": 1, "title": "Dune (Deluxe)", "year": 1965, "pages": "412 pages", "version": 2}})
    );

    let again = patch(&router, "/v1/books/1", &[], json!({"year": 1966})).await;
    assert_eq!(again.body["books"]["version"], 3);
    assert_eq!(again.body["books"]["title"], "Dune (Deluxe)");
}

#[tokio::test]
async fn test_update_with_stale_expected_version_conflicts() {
    let (router, _) = test_app();
    create(&router, json!({"title": "Dune", "year": 1965, "pages": 412})).await;
    patch(&router, "/v1/books/1", &[], json!({"pages": 500})).await;

    let reply = patch(&router, "/v1/books/1", &[("X-Expected-Version", "1")], json!({"pages": 600})).await;
    assert_eq!(reply.status, StatusCode::CONFLICT);
    assert_eq!(reply.body["error"]["code"], "edit_conflict");

    let shown = get(&router, "/v1/books/1").await;
    assert_eq!(shown.body["books"]["pages"], "500 pages");
    assert_eq!(shown.body["books"]["version"], 2);
}

#[tokio::test]
async fn test_update_with_non_ascii_expected_version_conflicts() {
    let (router, _) = test_app();
    create(&router, json!({"title": "Dune", "year": 1965, "pages": 412})).await;

    let reply = patch(&router, "/v1/books/1", &[("X-Expected-Version", "v\u{e9}rsion")], json!({"pages": 999})).await;
    assert_eq!(reply.status, StatusCode::CONFLICT);
    assert_eq!(reply.body["error"]["code"], "edit_conflict");

    let shown = get(&router, "/v1/books/1").await;
    assert_eq!(shown.body["books"]["pages"], "412 pages");
    assert_eq!(shown.body["books"]["version"], 1);
}

#[tokio::test]
async fn test_malformed_id_is_not_found_for_every_verb() {
    let (router, _) = test_app();
    create(&router, json!({"title": "Dune", "year": 1965, "pages": 412})).await;

    let patched = patch(&router, "/v1/books/%FF", &[], json!({"pages": 999})).await;
    assert_eq!(patched.status, StatusCode::NOT_FOUND);
    assert_eq!(patched.body["error"]["code"], "not_found");

    let deleted = send(&router, Method::DELETE, "/v1/books/%FF", Some(WRITER), &[], None).await;
    assert_eq!(deleted.status, StatusCode::NOT_FOUND);
    assert_eq!(deleted.body["error"]["code"], "not_found");
}

#[tokio::test]
async fn test_update_validates_merged_record() {
    let (router, _) = test_app();
    create(&router, json!({"title": "Dune", "year": 1965, "pages": 412})).await;

    let reply = patch(&router, "/v1/books/1", &[], json!({"year": 1500})).await;
    assert_eq!(reply.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(reply.body["error"]["details"], json!({"year": "must be greater than 1888"}));

    let shown = get(&router, "/v1/books/1").await;
    assert_eq!(shown.body["books"]["year"], 1965);
    assert_eq!(shown.body["books"]["version"], 1);
}

#[tokio::test]
async fn test_update_missing_book_is_not_found_before_body_is_read() {
    let (router, _) = test_app();
    let reply = send(&router, Method::PATCH, "/v1/books/7", Some(WRITER), &[], Some("not json".into())).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_removes_book() {
    let (router, store) = test_app();
    create(&router, json!({"title": "Dune", "year": 1965, "pages": 412})).await;

    let reply = send(&router, Method::DELETE, "/v1/books/1", Some(WRITER), &[], None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body, json!({"message": "books successfully deleted"}));
    assert_eq!(store.count().await, 0);
    assert!(store.get(1).await.is_err());

    assert_eq!(get(&router, "/v1/books/1").await.status, StatusCode::NOT_FOUND);
    let again = send(&router, Method::DELETE, "/v1/books/1", Some(WRITER), &[], None).await;
    assert_eq!(again.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_orders_and_paginates() {
    let (router, _) = test_app();
    seed(&router).await;

    let reply = get(&router, "/v1/books?sort=-year&page_size=2").await;
    assert_eq!(reply.status, StatusCode::OK);
    let ids: Vec<i64> = reply.body["books"]
        .as_array()
        .unwrap()
        .iter()
        .map(|b| b["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![2, 3]);
    assert_eq!(
        reply.body["metadata"],
        json!({"current_page": 1, "page_size": 2, "first_page": 1, "last_page": 2, "total_records": 3})
    );

    let second = get(&router, "/v1/books?sort=-year&page_size=2&page=2").await;
    assert_eq!(second.body["books"][0]["id"], 1);
    assert_eq!(second.body["metadata"]["current_page"], 2);
}

#[tokio::test]
async fn test_list_filters_by_title_and_year() {
    let (router, _) = test_app();
    seed(&router).await;

    let by_title = get(&router, "/v1/books?title=dune").await;
    assert_eq!(by_title.body["books"].as_array().unwrap().len(), 2);
    assert_eq!(by_title.body["metadata"]["total_records"], 2);

    let by_both = get(&router, "/v1/books?title=dune&year=1969").await;
    assert_eq!(by_both.body["books"].as_array().unwrap().len(), 1);
    assert_eq!(by_both.body["books"][0]["title"], "Dune Messiah");
}

#[tokio::test]
async fn test_list_past_last_page_is_empty() {
    let (router, _) = test_app();
    seed(&router).await;

    let reply = get(&router, "/v1/books?page=5").await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["books"], json!([]));
    assert_eq!(reply.body["metadata"]["total_records"], 0);
}

#[tokio::test]
async fn test_list_rejects_bad_query_before_querying() {
    let (router, _) = test_app();
    let reply = get(&router, "/v1/books?sort=created_at&page=0&page_size=500&year=recent").await;
    assert_eq!(reply.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        reply.body["error"]["details"],
        json!({
            "sort": "invalid sort value",
            "page": "must be greater than zero",
            "page_size": "must be a maximum of 100",
            "year": "must be an integer value"
        })
    );
}

#[tokio::test]
async fn test_protected_routes_require_authentication() {
    let (router, _) = test_app();
    let anonymous = send(&router, Method::GET, "/v1/books", None, &[], None).await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);
    assert_eq!(anonymous.body["error"]["code"], "authentication_required");

    let unknown = send(&router, Method::GET, "/v1/books", Some("nope"), &[], None).await;
    assert_eq!(unknown.status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown.body["error"]["code"], "invalid_token");
    assert_eq!(unknown.headers[header::WWW_AUTHENTICATE], "Bearer");

    let basic = send(&router, Method::GET, "/v1/books", None, &[("authorization", "Basic dXNlcjpwYXNz")], None).await;
    assert_eq!(basic.status, StatusCode::UNAUTHORIZED);
    assert_eq!(basic.body["error"]["code"], "invalid_token");
}

#[tokio::test]
async fn test_write_requires_write_permission() {
    let (router, store) = test_app();
    let body = json!({"title": "Dune", "year": 1965, "pages": 412}).to_string();
    let reply = send(&router, Method::POST, "/v1/books", Some(READER), &[], Some(body)).await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
    assert_eq!(reply.body["error"]["code"], "not_permitted");
    assert_eq!(store.count().await, 0);
}

#[tokio::test]
async fn test_unknown_routes_and_methods() {
    let (router, _) = test_app();
    let missing = get(&router, "/v1/authors").await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
    assert_eq!(missing.body["error"]["code"], "not_found");

    let wrong = send(&router, Method::PUT, "/v1/books", None, &[], None).await;
    assert_eq!(wrong.status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(wrong.body["error"]["code"], "method_not_allowed");
    assert_eq!(wrong.body["error"]["message"], "the PUT method is not supported for this resource");
}

#[tokio::test]
async fn test_rate_limit_is_per_client() {
    let store = Arc::new(InMemoryBookStore::new());
    let limiter = build_limiter(&LimiterConfig {
        enabled: true,
        rps: 1,
        burst: 2,
    });
    let router = app(AppState::new(store).with_tokens(tokens()).with_limiter(limiter), &[]);

    let from = |ip: &'static str| [("x-forwarded-for", ip)];
    for _ in 0..2 {
        let ok = send(&router, Method::GET, "/v1/healthcheck", None, &from("203.0.113.5"), None).await;
        assert_eq!(ok.status, StatusCode::OK);
    }
    let limited = send(&router, Method::GET, "/v1/healthcheck", None, &from("203.0.113.5"), None).await;
    assert_eq!(limited.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(limited.body["error"]["code"], "rate_limit_exceeded");

    let other = send(&router, Method::GET, "/v1/healthcheck", None, &from("203.0.113.6"), None).await;
    assert_eq!(other.status, StatusCode::OK);
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let (router, store) = test_app();
    let title = "x".repeat(bookshelf_api::extractors::MAX_BODY_BYTES);
    let body = json!({"title": title, "year": 1965, "pages": 412}).to_string();
    let reply = send(&router, Method::POST, "/v1/books", Some(WRITER), &[], Some(body)).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(store.count().await, 0);
}

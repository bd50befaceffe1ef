// Each test binary uses a different subset of these helpers
#![allow(dead_code)]

use agronet_backend::services::auth::StaticAuthProvider;
use agronet_backend::services::crop_service::{CropService, QuantityPolicy};
use agronet_backend::services::crop_store::MemoryCropStore;
use agronet_backend::{routes, AppState};
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use migration::{Migrator, MigratorTrait};
use sea_orm::{Database, DatabaseConnection};
use serde_json::Value;
use std::env;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tower::ServiceExt;

pub const OWNER_TOKEN: &str = "owner-token";
pub const OWNER_EMAIL: &str = "farmer@example.com";
pub const BUYER_TOKEN: &str = "buyer-token";
pub const BUYER_EMAIL: &str = "buyer@example.com";

static MIGRATED: OnceCell<()> = OnceCell::const_new();

/// Connect to TEST_DATABASE_URL and bring the schema up to date.
/// `None` when the variable is unset; callers skip in that case.
pub async fn setup_test_db() -> Option<DatabaseConnection> {
    let Ok(database_url) = env::var("TEST_DATABASE_URL") else {
        eprintln!("TEST_DATABASE_URL not set, skipping database test");
        return None;
    };

    let db = Database::connect(&database_url)
        .await
        .expect("Test database connection should succeed");
    MIGRATED
        .get_or_init(|| async {
            Migrator::up(&db, None)
                .await
                .expect("Migrations should apply to the test database");
        })
        .await;
    Some(db)
}

/// Router over a fresh in-memory store with two known tokens
pub fn build_test_router(policy: QuantityPolicy) -> (Router, MemoryCropStore) {
    let store = MemoryCropStore::new();
    let auth = StaticAuthProvider::new()
        .with_token(OWNER_TOKEN, OWNER_EMAIL)
        .with_token(BUYER_TOKEN, BUYER_EMAIL);

    let state = AppState {
        crops: CropService::new(Arc::new(store.clone()), policy),
        auth: Arc::new(auth),
    };
    (routes::router(state), store)
}

/// Send one request and return status plus decoded JSON body (Null when empty)
pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

/// Create a listing as the owner and return its id
pub async fn create_listing(app: &Router, name: &str, quantity: f64) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/crops",
        Some(OWNER_TOKEN),
        Some(serde_json::json!({
            "name": name,
            "quantity": quantity,
            "ownerEmail": OWNER_EMAIL,
            "ownerName": "Ama",
            "unit": "kg"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["insertedId"].as_str().unwrap().to_string()
}

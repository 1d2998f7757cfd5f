#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, Response},
    Router,
};
use serde_json::{json, Value};
use storefront_api::{
    config::AppConfig,
    db::{self, DbConfig},
    events::{self, EventSender},
    handlers::AppServices,
    payments::InMemoryGateway,
    AppState,
};
use tokio::sync::mpsc;
use tower::ServiceExt;

pub const STOREFRONT: &str = "https://shop.test";

/// Helper harness for spinning up an application state backed by an in-memory SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub gateway: InMemoryGateway,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    /// Construct a new test application with fresh database state.
    pub async fn new() -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.payment_gateway = "in-memory".to_string();
        cfg.payment_publishable_key = Some("pk_test_storefront".to_string());
        cfg.storefront_origin = STOREFRONT.to_string();
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        // One pooled connection keeps the in-memory database alive and shared
        let pool = db::establish_connection_with_config(&DbConfig::from(&cfg))
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let db_arc = Arc::new(pool);
        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = EventSender::new(event_tx);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let gateway = InMemoryGateway::new(cfg.api_origin.clone());
        let services = AppServices::new(
            db_arc.clone(),
            event_sender.clone(),
            Arc::new(gateway.clone()),
            &cfg,
        );

        let state = AppState {
            db: db_arc,
            config: cfg,
            services,
            event_sender,
        };

        let router = storefront_api::app_router(state.clone()).layer(
            axum::middleware::from_fn(storefront_api::middleware_helpers::request_id_middleware),
        );

        Self {
            router,
            state,
            gateway,
            _event_task: event_task,
        }
    }

    /// Send a request against the router.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        headers: &[(&str, &str)],
    ) -> Response<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        self.request(Method::GET, uri, None, &[]).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> Response<Body> {
        self.request(Method::POST, uri, Some(body), &[]).await
    }

    pub async fn put(&self, uri: &str, body: Value) -> Response<Body> {
        self.request(Method::PUT, uri, Some(body), &[]).await
    }

    pub async fn delete(&self, uri: &str) -> Response<Body> {
        self.request(Method::DELETE, uri, None, &[]).await
    }

    /// Posts a cart and returns the response body.
    pub async fn checkout(&self, payload: Value) -> (u16, Value) {
        let response = self
            .request(
                Method::POST,
                "/create-checkout-session",
                Some(payload),
                &[("origin", STOREFRONT)],
            )
            .await;
        let status = response.status().as_u16();
        (status, response_json(response).await)
    }

    /// Every order currently stored, via the admin listing.
    pub async fn all_orders(&self) -> Vec<Value> {
        let response = self.get("/orders").await;
        let body = response_json(response).await;
        body["data"].as_array().cloned().unwrap_or_default()
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

pub async fn response_json(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read response body");
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&bytes).expect("response body is not json")
}

/// The cart from the storefront's happy path: two Sarees at 500.
pub fn saree_cart() -> Value {
    json!({
        "products": [{
            "_id": "p1",
            "productName": "Saree",
            "productPrice": 500,
            "quantity": 2
        }],
        "userId": "u1",
        "customerName": "Asha Rao",
        "customerContactNumber": "9876543210",
        "address": "12 MG Road, Pune, MH",
        "pinCode": "411001"
    })
}

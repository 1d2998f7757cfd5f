//! Storefront API library
//!
//! Catalog, accounts, hosted checkout and the order status workflow behind
//! the fashion storefront.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod client;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod middleware_helpers;
pub mod migrator;
pub mod payments;
pub mod services;
pub mod tracing;

use axum::{
    response::Json,
    routing::{get, post, put},
    Router,
};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use std::sync::Arc;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub services: handlers::AppServices,
    pub event_sender: events::EventSender,
}

// Common response wrappers
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub errors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }
}

/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

/// Every route the storefront and admin screens call. Cross-cutting layers
/// (tracing, CORS, compression, request ids) are added by the binary.
pub fn app_router(state: AppState) -> Router {
    let checkout = Router::new()
        .route(
            "/create-checkout-session",
            post(handlers::checkout::create_checkout_session),
        )
        .route("/paymentsuccess", get(handlers::checkout::payment_success))
        .route("/payment-config", get(handlers::checkout::payment_config));

    let orders = Router::new()
        .route("/orders", get(handlers::orders::list_orders))
        .route("/orders/user/:user_id", get(handlers::orders::list_user_orders))
        .route(
            "/orders/:id",
            get(handlers::orders::get_order).delete(handlers::orders::cancel_order),
        )
        .route(
            "/orders/:id/status",
            put(handlers::orders::update_order_status),
        )
        .route(
            "/orders/:id/items/:item_id/status",
            put(handlers::orders::update_item_status),
        );

    let products = Router::new()
        .route(
            "/products",
            get(handlers::products::list_products).post(handlers::products::create_product),
        )
        .route(
            "/products/category/:category",
            get(handlers::products::list_products_by_category),
        )
        .route(
            "/products/:id",
            get(handlers::products::get_product)
                .put(handlers::products::update_product)
                .delete(handlers::products::delete_product),
        );

    let users = Router::new()
        .route("/users/signup", post(handlers::users::signup))
        .route("/users/login", post(handlers::users::login))
        .route("/users", get(handlers::users::list_users))
        .route(
            "/users/:id",
            get(handlers::users::get_user)
                .put(handlers::users::update_user)
                .delete(handlers::users::delete_user),
        )
        .route("/users/:id/profile", put(handlers::users::update_profile));

    Router::new()
        .merge(handlers::health::health_routes())
        .merge(checkout)
        .merge(orders)
        .merge(products)
        .merge(users)
        .with_state(state)
}

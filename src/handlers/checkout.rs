use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Redirect, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::error;

use super::common::resolve_origin;
use crate::{services::checkout::PaymentConfirmation, AppState};

/// Creates a hosted checkout session for the posted cart.
///
/// Bodies keep the storefront's historical shape rather than the
/// `ApiResponse` envelope: `{success, message, id, session_url}` on success
/// and `{error, message?}` on failure.
pub async fn create_checkout_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> Response {
    let origin = resolve_origin(&headers, &state.config);

    match state
        .services
        .checkout
        .create_checkout_session(payload, &origin)
        .await
    {
        Ok(outcome) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "message": "Order placed successfully with Stripe",
                "id": outcome.session_id,
                "session_url": outcome.session_url,
            })),
        )
            .into_response(),
        Err(err) if err.is_client_error() => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": err.response_message() })),
        )
            .into_response(),
        Err(err) => {
            error!("Checkout failed: {}", err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "Failed to create checkout session",
                    "message": err.to_string(),
                })),
            )
                .into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PaymentSuccessQuery {
    pub session_id: Option<String>,
}

/// Landing point of the gateway redirect. Sends the browser on to the
/// storefront's success or cancel screen.
pub async fn payment_success(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<PaymentSuccessQuery>,
) -> Response {
    let Some(session_id) = query.session_id.filter(|id| !id.trim().is_empty()) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "session_id is required" })),
        )
            .into_response();
    };

    let origin = resolve_origin(&headers, &state.config);
    match state.services.checkout.confirm_payment(&session_id).await {
        Ok(PaymentConfirmation::Paid { .. }) => {
            Redirect::to(&format!("{}/paymentsuccess", origin)).into_response()
        }
        Ok(PaymentConfirmation::NotPaid { .. }) => {
            Redirect::to(&format!("{}/paymentcancel", origin)).into_response()
        }
        Err(err) => {
            error!("Payment confirmation failed for {}: {}", session_id, err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to process payment" })),
            )
                .into_response()
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentConfigResponse {
    pub publishable_key: Option<String>,
    pub api_origin: String,
    pub currency: String,
}

/// Browser-side settings for the payment SDK.
pub async fn payment_config(State(state): State<AppState>) -> Json<PaymentConfigResponse> {
    Json(PaymentConfigResponse {
        publishable_key: state.config.payment_publishable_key.clone(),
        api_origin: state.config.api_origin.clone(),
        currency: state.config.checkout_currency.clone(),
    })
}

use axum::{
    extract::{Path, State},
    response::Json,
};
use serde::Serialize;
use uuid::Uuid;

use super::common::StatusUpdateRequest;
use crate::{
    entities::order_item,
    services::{order_status::parse_status, orders::OrderDetails},
    ApiResponse, ApiResult, AppState,
};

/// Admin orders table.
pub async fn list_orders(State(state): State<AppState>) -> ApiResult<Vec<OrderDetails>> {
    let orders = state.services.order.list_orders().await?;
    Ok(Json(ApiResponse::success(orders)))
}

/// A customer's "My Orders" screen.
pub async fn list_user_orders(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Vec<OrderDetails>> {
    let orders = state.services.order.list_orders_for_user(&user_id).await?;
    Ok(Json(ApiResponse::success(orders)))
}

pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<OrderDetails> {
    let order = state.services.order.get_order(id).await?;
    Ok(Json(ApiResponse::success(order)))
}

/// Process / Approve / Ship for a whole order.
pub async fn update_order_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<StatusUpdateRequest>,
) -> ApiResult<OrderDetails> {
    let status = parse_status(&body.status)?;
    state.services.order_status.advance_order(id, status).await?;
    let order = state.services.order.get_order(id).await?;
    Ok(Json(ApiResponse::success(order)))
}

pub async fn update_item_status(
    State(state): State<AppState>,
    Path((id, item_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<StatusUpdateRequest>,
) -> ApiResult<order_item::Model> {
    let status = parse_status(&body.status)?;
    let item = state
        .services
        .order_status
        .advance_line_item(id, item_id, status)
        .await?;
    Ok(Json(ApiResponse::success(item)))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelledOrder {
    pub order_id: Uuid,
}

/// Customer cancellation. The order is removed, not marked.
pub async fn cancel_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<CancelledOrder> {
    state.services.order_status.cancel_order(id).await?;
    let mut response = ApiResponse::success(CancelledOrder { order_id: id });
    response.message = Some("Order cancelled".to_string());
    Ok(Json(response))
}

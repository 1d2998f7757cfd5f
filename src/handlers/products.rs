use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use uuid::Uuid;

use crate::{
    entities::product,
    errors::ServiceError,
    services::products::{CreateProductRequest, UpdateProductRequest},
    ApiResponse, ApiResult, AppState,
};

pub async fn list_products(State(state): State<AppState>) -> ApiResult<Vec<product::Model>> {
    let products = state.services.product.list_products().await?;
    Ok(Json(ApiResponse::success(products)))
}

pub async fn list_products_by_category(
    State(state): State<AppState>,
    Path(category): Path<String>,
) -> ApiResult<Vec<product::Model>> {
    let products = state.services.product.list_by_category(&category).await?;
    Ok(Json(ApiResponse::success(products)))
}

pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<product::Model> {
    let product = state.services.product.get_product(id).await?;
    Ok(Json(ApiResponse::success(product)))
}

pub async fn create_product(
    State(state): State<AppState>,
    Json(payload): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<ApiResponse<product::Model>>), ServiceError> {
    let product = state.services.product.create_product(payload).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(product))))
}

pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProductRequest>,
) -> ApiResult<product::Model> {
    let product = state.services.product.update_product(id, payload).await?;
    Ok(Json(ApiResponse::success(product)))
}

pub async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Uuid> {
    state.services.product.delete_product(id).await?;
    Ok(Json(ApiResponse::success(id)))
}

use axum::{
    extract::{Path, State},
    response::{Json, Response},
};
use uuid::Uuid;

use super::common::{created_response, success_response};
use crate::{
    entities::user,
    errors::ServiceError,
    services::users::{
        AdminUpdateUserRequest, LoginRequest, ProfileUpdateRequest, SignupRequest,
    },
    ApiResponse, ApiResult, AppState,
};

/// Registers a customer. The hash never appears in the response.
pub async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<SignupRequest>,
) -> Result<Response, ServiceError> {
    let user = state.services.user.signup(payload).await?;
    Ok(created_response(user))
}

/// Checks credentials and returns the account. Tokens are issued elsewhere.
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Response, ServiceError> {
    let user = state.services.user.login(payload).await?;
    Ok(success_response(user))
}

pub async fn list_users(State(state): State<AppState>) -> ApiResult<Vec<user::Model>> {
    let users = state.services.user.list_users().await?;
    Ok(Json(ApiResponse::success(users)))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<user::Model> {
    let user = state.services.user.get_user(id).await?;
    Ok(Json(ApiResponse::success(user)))
}

pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AdminUpdateUserRequest>,
) -> ApiResult<user::Model> {
    let user = state.services.user.admin_update(id, payload).await?;
    Ok(Json(ApiResponse::success(user)))
}

pub async fn update_profile(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ProfileUpdateRequest>,
) -> ApiResult<user::Model> {
    let user = state.services.user.update_profile(id, payload).await?;
    Ok(Json(ApiResponse::success(user)))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Uuid> {
    state.services.user.delete_user(id).await?;
    Ok(Json(ApiResponse::success(id)))
}

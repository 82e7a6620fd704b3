use axum::{
    extract::{Json, Query, State},
    http::StatusCode,
};

use crate::{AppState, error::UserDataError, models::UserData};

use super::model::{GetUserQuery, GetUsersQuery, GetValueQuery, SetValueRequest};

#[axum::debug_handler]
pub async fn get_user(
    State(state): State<AppState>,
    Query(query): Query<GetUserQuery>,
) -> Result<Json<Option<UserData>>, UserDataError> {
    let user = state
        .service
        .get_user(&query.user_id, &query.user_type)
        .await?;
    Ok(Json(user))
}

#[axum::debug_handler]
pub async fn get_users(
    State(state): State<AppState>,
    Query(query): Query<GetUsersQuery>,
) -> Result<Json<Vec<UserData>>, UserDataError> {
    let users = state.service.get_users_by_type(&query.user_type).await?;
    Ok(Json(users))
}

#[axum::debug_handler]
pub async fn get_value(
    State(state): State<AppState>,
    Query(query): Query<GetValueQuery>,
) -> Result<Json<Option<serde_json::Value>>, UserDataError> {
    let value = state
        .service
        .get_value(&query.user_id, &query.user_type, &query.key)
        .await?;
    Ok(Json(value))
}

#[axum::debug_handler]
pub async fn set_value(
    State(state): State<AppState>,
    Json(req): Json<SetValueRequest>,
) -> Result<StatusCode, UserDataError> {
    state
        .service
        .set_value(&req.user_id, &req.user_type, &req.key, req.value.as_ref())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[axum::debug_handler]
pub async fn set_user(
    State(state): State<AppState>,
    Json(user_data): Json<UserData>,
) -> Result<StatusCode, UserDataError> {
    state.service.set_user(&user_data).await?;
    Ok(StatusCode::NO_CONTENT)
}

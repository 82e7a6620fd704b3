use axum::Json;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// 用户数据子系统的错误分类
#[derive(Debug, Error)]
pub enum UserDataError {
    /// 身份参数为空，在访问缓存或存储之前同步失败
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// 持久化层错误，原样向调用方传播，不做重试
    #[error("storage failure: {0}")]
    Storage(#[from] sqlx::Error),

    /// 子系统尚未完成启动（配置缺失或数据库不可达），启动阶段的致命错误
    #[error("subsystem not loaded: {0}")]
    NotLoaded(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    code: i32,
    error_message: String,
}

impl IntoResponse for UserDataError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            UserDataError::InvalidArgument(name) => {
                (StatusCode::BAD_REQUEST, format!("参数无效: {}", name))
            }
            UserDataError::Storage(e) => {
                tracing::error!("Storage failure: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "存储访问失败".to_string())
            }
            UserDataError::NotLoaded(reason) => {
                tracing::error!("Subsystem not loaded: {}", reason);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "子系统尚未完成启动".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse {
            code: status.as_u16() as i32,
            error_message,
        });

        (status, body).into_response()
    }
}

//! 业务错误
//!
//! 由服务端产生，经 HTTP 响应体 `{"error": ..., "code": ...}` 传回客户端

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::code::ErrorCode;

/// 用户服务的业务错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("inconsistent IDs")]
    InconsistentIds,

    #[error("already exists")]
    AlreadyExists,

    #[error("not found")]
    NotFound,

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// 获取错误代码
    pub fn code(&self) -> ErrorCode {
        match self {
            ServiceError::InconsistentIds => ErrorCode::InconsistentIds,
            ServiceError::AlreadyExists => ErrorCode::UserAlreadyExists,
            ServiceError::NotFound => ErrorCode::UserNotFound,
            ServiceError::Unauthorized(_) => ErrorCode::Unauthorized,
            ServiceError::BadRequest(_) => ErrorCode::BadRequest,
            ServiceError::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// 转换为线上传输的错误体
    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            error: self.to_string(),
            code: Some(self.code()),
        }
    }

    /// 从 HTTP 状态码和错误体还原业务错误
    ///
    /// 优先使用 `code` 字段，缺失时按状态码推断
    pub fn from_body(status: u16, body: ErrorBody) -> Self {
        let code = body.code.unwrap_or(match status {
            404 => ErrorCode::UserNotFound,
            401 | 403 => ErrorCode::Unauthorized,
            400..=499 => ErrorCode::BadRequest,
            _ => ErrorCode::InternalError,
        });

        match code {
            ErrorCode::UserNotFound => ServiceError::NotFound,
            ErrorCode::UserAlreadyExists => ServiceError::AlreadyExists,
            ErrorCode::InconsistentIds => ServiceError::InconsistentIds,
            ErrorCode::Unauthorized => ServiceError::Unauthorized(strip_prefix(&body.error, "unauthorized: ")),
            ErrorCode::BadRequest => ServiceError::BadRequest(strip_prefix(&body.error, "bad request: ")),
            _ => ServiceError::Internal(strip_prefix(&body.error, "internal error: ")),
        }
    }
}

fn strip_prefix(message: &str, prefix: &str) -> String {
    message.strip_prefix(prefix).unwrap_or(message).to_string()
}

/// HTTP 错误响应体
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
}

//! 错误代码和错误类别定义

use serde::{Deserialize, Serialize};
use std::fmt;

/// 错误代码枚举
///
/// 错误代码按类别分组，每个类别占用1000个代码范围：
/// - 1000-1999: 注册中心相关错误
/// - 2000-2999: 端点/实例相关错误
/// - 3000-3999: 调用相关错误
/// - 4000-4999: 用户相关错误
/// - 5000-5999: 认证相关错误
/// - 6000-6999: 系统相关错误
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u32)]
pub enum ErrorCode {
    // ============================================================
    // 注册中心相关错误 (1000-1999)
    // ============================================================
    RegistryUnavailable = 1000,
    RegistryInvalidQuery = 1001,

    // ============================================================
    // 端点/实例相关错误 (2000-2999)
    // ============================================================
    InvalidInstance = 2000,
    InstanceUnreachable = 2001,
    NoEndpointsAvailable = 2002,
    AttemptTimeout = 2003,

    // ============================================================
    // 调用相关错误 (3000-3999)
    // ============================================================
    AttemptsExhausted = 3000,
    CallerCancelled = 3001,

    // ============================================================
    // 用户相关错误 (4000-4999)
    // ============================================================
    UserNotFound = 4000,
    UserAlreadyExists = 4001,
    InconsistentIds = 4002,
    BadRequest = 4003,

    // ============================================================
    // 认证相关错误 (5000-5999)
    // ============================================================
    Unauthorized = 5000,

    // ============================================================
    // 系统相关错误 (6000-6999)
    // ============================================================
    InternalError = 6000,
    SerializationError = 6001,
    ConfigurationError = 6002,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl ErrorCode {
    /// 获取错误代码的数字值
    #[inline]
    pub fn as_u32(&self) -> u32 {
        *self as u32
    }

    /// 从数字值创建错误代码
    pub fn from_u32(code: u32) -> Option<Self> {
        match code {
            1000 => Some(ErrorCode::RegistryUnavailable),
            1001 => Some(ErrorCode::RegistryInvalidQuery),
            2000 => Some(ErrorCode::InvalidInstance),
            2001 => Some(ErrorCode::InstanceUnreachable),
            2002 => Some(ErrorCode::NoEndpointsAvailable),
            2003 => Some(ErrorCode::AttemptTimeout),
            3000 => Some(ErrorCode::AttemptsExhausted),
            3001 => Some(ErrorCode::CallerCancelled),
            4000 => Some(ErrorCode::UserNotFound),
            4001 => Some(ErrorCode::UserAlreadyExists),
            4002 => Some(ErrorCode::InconsistentIds),
            4003 => Some(ErrorCode::BadRequest),
            5000 => Some(ErrorCode::Unauthorized),
            6000 => Some(ErrorCode::InternalError),
            6001 => Some(ErrorCode::SerializationError),
            6002 => Some(ErrorCode::ConfigurationError),
            _ => None,
        }
    }

    /// 获取错误代码的字符串表示
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::RegistryUnavailable => "REGISTRY_UNAVAILABLE",
            ErrorCode::RegistryInvalidQuery => "REGISTRY_INVALID_QUERY",
            ErrorCode::InvalidInstance => "INVALID_INSTANCE",
            ErrorCode::InstanceUnreachable => "INSTANCE_UNREACHABLE",
            ErrorCode::NoEndpointsAvailable => "NO_ENDPOINTS_AVAILABLE",
            ErrorCode::AttemptTimeout => "ATTEMPT_TIMEOUT",
            ErrorCode::AttemptsExhausted => "ATTEMPTS_EXHAUSTED",
            ErrorCode::CallerCancelled => "CALLER_CANCELLED",
            ErrorCode::UserNotFound => "USER_NOT_FOUND",
            ErrorCode::UserAlreadyExists => "USER_ALREADY_EXISTS",
            ErrorCode::InconsistentIds => "INCONSISTENT_IDS",
            ErrorCode::BadRequest => "BAD_REQUEST",
            ErrorCode::Unauthorized => "UNAUTHORIZED",
            ErrorCode::InternalError => "INTERNAL_ERROR",
            ErrorCode::SerializationError => "SERIALIZATION_ERROR",
            ErrorCode::ConfigurationError => "CONFIGURATION_ERROR",
        }
    }

    /// 获取错误类别
    pub fn category(&self) -> ErrorCategory {
        match self.as_u32() / 1000 {
            1 => ErrorCategory::Registry,
            2 => ErrorCategory::Endpoint,
            3 => ErrorCategory::Call,
            4 => ErrorCategory::User,
            5 => ErrorCategory::Authentication,
            _ => ErrorCategory::System,
        }
    }

    /// 单次尝试失败后是否值得换一个实例再试
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorCode::RegistryUnavailable
                | ErrorCode::InvalidInstance
                | ErrorCode::InstanceUnreachable
                | ErrorCode::NoEndpointsAvailable
                | ErrorCode::AttemptTimeout
                | ErrorCode::SerializationError
                | ErrorCode::InternalError
        )
    }

    /// 映射为 HTTP 状态码
    pub fn http_status(&self) -> u16 {
        match self {
            ErrorCode::UserNotFound => 404,
            ErrorCode::UserAlreadyExists | ErrorCode::InconsistentIds | ErrorCode::BadRequest => {
                400
            }
            ErrorCode::Unauthorized => 401,
            ErrorCode::NoEndpointsAvailable | ErrorCode::RegistryUnavailable => 503,
            ErrorCode::AttemptTimeout => 504,
            _ => 500,
        }
    }
}

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Registry,
    Endpoint,
    Call,
    User,
    Authentication,
    System,
}

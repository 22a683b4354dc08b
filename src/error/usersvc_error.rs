//! usersvc 统一错误类型

use std::time::Duration;
use thiserror::Error;

use super::code::ErrorCode;
use super::service::ServiceError;

/// usersvc 统一错误类型
///
/// 只有 `AttemptsExhausted`、`CallerCancelled`、`RegistryInvalidQuery` 以及业务错误
/// 会穿过客户端边界到达调用方，其余变体在流水线内部被吸收
#[derive(Error, Debug, Clone)]
pub enum UserSvcError {
    /// 注册中心暂时不可达（watcher 保留旧实例集并在后台重试）
    #[error("注册中心不可用: {0}")]
    RegistryUnavailable(String),

    /// 注册中心查询无效（永久错误）
    #[error("无效的注册中心查询: {0}")]
    RegistryInvalidQuery(String),

    /// 实例地址无法解析为网络目标
    #[error("无效的实例地址 {instance}: {reason}")]
    InvalidInstance { instance: String, reason: String },

    /// 单次调用失败
    #[error("实例 {instance} 不可达: {reason}")]
    InstanceUnreachable { instance: String, reason: String },

    /// 选择时端点集合为空
    #[error("没有可用的端点")]
    NoEndpointsAvailable,

    /// 单次调用超过每次尝试的超时时间
    #[error("实例 {instance} 调用超时 ({timeout:?})")]
    AttemptTimeout { instance: String, timeout: Duration },

    /// 达到最大尝试次数，`last` 为最后一次失败的原因
    #[error("重试 {attempts} 次后仍然失败: {last}")]
    AttemptsExhausted {
        attempts: usize,
        last: Box<UserSvcError>,
    },

    /// 调用方取消或调用方截止时间已到
    #[error("调用方已取消")]
    CallerCancelled,

    /// 服务端返回的业务错误
    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("序列化错误: {0}")]
    Serialization(String),

    #[error("配置错误: {0}")]
    Config(String),

    #[error("系统错误: {0}")]
    System(String),
}

impl UserSvcError {
    pub fn registry_unavailable(reason: impl Into<String>) -> Self {
        UserSvcError::RegistryUnavailable(reason.into())
    }

    pub fn invalid_query(reason: impl Into<String>) -> Self {
        UserSvcError::RegistryInvalidQuery(reason.into())
    }

    pub fn invalid_instance(instance: impl Into<String>, reason: impl Into<String>) -> Self {
        UserSvcError::InvalidInstance {
            instance: instance.into(),
            reason: reason.into(),
        }
    }

    pub fn unreachable(instance: impl Into<String>, reason: impl Into<String>) -> Self {
        UserSvcError::InstanceUnreachable {
            instance: instance.into(),
            reason: reason.into(),
        }
    }

    pub fn system(msg: impl Into<String>) -> Self {
        UserSvcError::System(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        UserSvcError::Config(msg.into())
    }

    /// 获取错误代码
    pub fn code(&self) -> ErrorCode {
        match self {
            UserSvcError::RegistryUnavailable(_) => ErrorCode::RegistryUnavailable,
            UserSvcError::RegistryInvalidQuery(_) => ErrorCode::RegistryInvalidQuery,
            UserSvcError::InvalidInstance { .. } => ErrorCode::InvalidInstance,
            UserSvcError::InstanceUnreachable { .. } => ErrorCode::InstanceUnreachable,
            UserSvcError::NoEndpointsAvailable => ErrorCode::NoEndpointsAvailable,
            UserSvcError::AttemptTimeout { .. } => ErrorCode::AttemptTimeout,
            UserSvcError::AttemptsExhausted { .. } => ErrorCode::AttemptsExhausted,
            UserSvcError::CallerCancelled => ErrorCode::CallerCancelled,
            UserSvcError::Service(err) => err.code(),
            UserSvcError::Serialization(_) => ErrorCode::SerializationError,
            UserSvcError::Config(_) => ErrorCode::ConfigurationError,
            UserSvcError::System(_) => ErrorCode::InternalError,
        }
    }

    /// 判断是否为可重试的错误
    pub fn is_retryable(&self) -> bool {
        self.code().is_retryable()
    }

    /// 注册中心的永久错误，watcher 遇到后停止重试
    pub fn is_permanent(&self) -> bool {
        matches!(self, UserSvcError::RegistryInvalidQuery(_))
    }

    /// 沿 `AttemptsExhausted` 链找到最底层的原因
    ///
    /// 调用方据此区分“没有实例”与“所有实例都失败”
    pub fn root_cause(&self) -> &UserSvcError {
        match self {
            UserSvcError::AttemptsExhausted { last, .. } => last.root_cause(),
            other => other,
        }
    }
}

impl From<serde_json::Error> for UserSvcError {
    fn from(err: serde_json::Error) -> Self {
        UserSvcError::Serialization(format!("JSON 序列化错误: {}", err))
    }
}

impl From<toml::de::Error> for UserSvcError {
    fn from(err: toml::de::Error) -> Self {
        UserSvcError::Config(err.to_string())
    }
}

impl From<std::io::Error> for UserSvcError {
    fn from(err: std::io::Error) -> Self {
        UserSvcError::System(err.to_string())
    }
}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, UserSvcError>;

//! 重试策略

use std::time::Duration;

use crate::error::{Result, UserSvcError};

/// 默认最大尝试次数
pub const DEFAULT_MAX_ATTEMPTS: usize = 3;

/// 默认单次尝试超时
pub const DEFAULT_PER_ATTEMPT_TIMEOUT: Duration = Duration::from_millis(500);

/// 重试策略
///
/// 尝试之间没有退避；每次尝试由负载均衡器重新选择端点。只能经 `new` 校验后构造
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: usize,
    per_attempt_timeout: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, per_attempt_timeout: Duration) -> Result<Self> {
        if max_attempts == 0 {
            return Err(UserSvcError::config("max_attempts must be at least 1"));
        }
        if per_attempt_timeout.is_zero() {
            return Err(UserSvcError::config("per_attempt_timeout must be positive"));
        }
        Ok(Self {
            max_attempts,
            per_attempt_timeout,
        })
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    pub fn per_attempt_timeout(&self) -> Duration {
        self.per_attempt_timeout
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            per_attempt_timeout: DEFAULT_PER_ATTEMPT_TIMEOUT,
        }
    }
}

//! 重试模块
//!
//! 每次尝试都从负载均衡器重新选择端点，单次尝试受超时约束，
//! 调用方取消或截止时间到达时立即返回

pub mod policy;

pub use policy::{DEFAULT_MAX_ATTEMPTS, DEFAULT_PER_ATTEMPT_TIMEOUT, RetryPolicy};

use tracing::{debug, warn};

use crate::balancer::Balancer;
use crate::context::CallContext;
use crate::error::{Result, UserSvcError};
use crate::types::{UserRequest, UserResponse};

/// 带重试的调用器
pub struct Retry<B> {
    policy: RetryPolicy,
    balancer: B,
}

impl<B: Balancer> Retry<B> {
    pub fn new(policy: RetryPolicy, balancer: B) -> Self {
        Self { policy, balancer }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// 执行调用
    ///
    /// 第一次成功即返回；所有尝试失败后返回 `AttemptsExhausted`，
    /// 其中 `last` 为最后一次失败的原因。不可重试的错误原样返回
    pub async fn call(&self, ctx: &CallContext, request: UserRequest) -> Result<UserResponse> {
        let method = request.method();
        let max_attempts = self.policy.max_attempts();
        let timeout = self.policy.per_attempt_timeout();
        let mut last = UserSvcError::NoEndpointsAvailable;

        for attempt in 1..=max_attempts {
            if ctx.is_done() {
                debug!(%method, attempt, "caller cancelled before attempt");
                return Err(UserSvcError::CallerCancelled);
            }

            let endpoint = match self.balancer.endpoint() {
                Ok(endpoint) => endpoint,
                Err(e) => {
                    debug!(%method, attempt, error = %e, "no endpoint selected");
                    last = e;
                    continue;
                }
            };
            let instance = endpoint.instance().clone();

            let outcome = tokio::select! {
                _ = ctx.done() => {
                    debug!(%method, attempt, instance = %instance, "caller cancelled during attempt");
                    return Err(UserSvcError::CallerCancelled);
                }
                outcome = tokio::time::timeout(timeout, endpoint.call(request.clone())) => outcome,
            };

            match outcome {
                Ok(Ok(response)) => {
                    debug!(%method, attempt, instance = %instance, "attempt succeeded");
                    return Ok(response);
                }
                Ok(Err(e)) if !e.is_retryable() => {
                    // 换一个实例也会得到同样的错误
                    warn!(%method, attempt, instance = %instance, error = %e, "attempt failed, not retrying");
                    return Err(e);
                }
                Ok(Err(e)) => {
                    debug!(%method, attempt, instance = %instance, error = %e, "attempt failed");
                    last = e;
                }
                Err(_) => {
                    debug!(%method, attempt, instance = %instance, ?timeout, "attempt timed out");
                    last = UserSvcError::AttemptTimeout {
                        instance: instance.to_string(),
                        timeout,
                    };
                }
            }
        }

        warn!(%method, attempts = max_attempts, error = %last, "all attempts failed");
        Err(UserSvcError::AttemptsExhausted {
            attempts: max_attempts,
            last: Box::new(last),
        })
    }
}

//! 调用上下文
//!
//! 携带调用方自己的取消信号和截止时间，重试循环据此提前终止

use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// 调用上下文
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl CallContext {
    /// 创建不带截止时间的上下文
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建从现在起 `timeout` 后到期的上下文
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new().deadline(Instant::now() + timeout)
    }

    /// 设置截止时间
    pub fn deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// 使用外部的取消令牌
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// 取消令牌（可克隆后在其他任务中调用 `cancel()`）
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn get_deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// 主动取消
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// 是否已取消或已过截止时间
    pub fn is_done(&self) -> bool {
        self.cancel.is_cancelled() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// 等待直到被取消或到达截止时间
    pub async fn done(&self) {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.cancel.cancelled() => {}
                    _ = tokio::time::sleep_until(deadline) => {}
                }
            }
            None => self.cancel.cancelled().await,
        }
    }
}

//! 服务发现配置

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Result, UserSvcError};

/// 实例查询条件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceQuery {
    /// 服务名
    pub service: String,

    /// 要求的标签（必须全部匹配）
    #[serde(default)]
    pub tags: Vec<String>,

    /// 只返回通过健康检查的实例
    #[serde(default = "default_passing_only")]
    pub passing_only: bool,
}

fn default_passing_only() -> bool {
    true
}

impl InstanceQuery {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            tags: Vec::new(),
            passing_only: true,
        }
    }

    /// 添加要求的标签
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn with_passing_only(mut self, passing_only: bool) -> Self {
        self.passing_only = passing_only;
        self
    }

    /// 校验查询条件，无效的查询是永久错误
    pub fn validate(&self) -> Result<()> {
        if self.service.trim().is_empty() {
            return Err(UserSvcError::invalid_query("service name is empty"));
        }
        if !self
            .service
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        {
            return Err(UserSvcError::invalid_query(format!(
                "invalid service name: {:?}",
                self.service
            )));
        }
        if let Some(tag) = self.tags.iter().find(|t| t.trim().is_empty()) {
            return Err(UserSvcError::invalid_query(format!("invalid tag: {:?}", tag)));
        }
        Ok(())
    }
}

/// watcher 后台任务配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchConfig {
    /// 阻塞查询的最长等待时间
    pub wait: Duration,

    /// 暂时失败后的首次重试间隔
    pub retry_min: Duration,

    /// 重试间隔上限（指数退避）
    pub retry_max: Duration,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            wait: Duration::from_secs(10),
            retry_min: Duration::from_millis(10),
            retry_max: Duration::from_secs(60),
        }
    }
}

impl WatchConfig {
    /// 重试间隔为 0 会让失败的查询空转
    pub fn validate(&self) -> Result<()> {
        if self.retry_min.is_zero() {
            return Err(UserSvcError::config("watch retry_min must be positive"));
        }
        if self.retry_max < self.retry_min {
            return Err(UserSvcError::config("watch retry_max must not be below retry_min"));
        }
        Ok(())
    }

    /// 下一次重试间隔
    pub fn next_backoff(&self, current: Duration) -> Duration {
        current.saturating_mul(2).clamp(self.retry_min, self.retry_max)
    }
}

//! 负载均衡模块
//!
//! 从 endpointer 的当前快照中为每次尝试选出一个端点

pub mod random;
pub mod round_robin;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::discovery::Endpointer;
use crate::endpoint::BoxEndpoint;
use crate::error::{Result, UserSvcError};

pub use random::Random;
pub use round_robin::RoundRobin;

/// 负载均衡器
///
/// 快照为空时返回 `NoEndpointsAvailable`，集合恢复后立即可以继续选择
pub trait Balancer: Send + Sync {
    fn endpoint(&self) -> Result<BoxEndpoint>;
}

impl<B: Balancer + ?Sized> Balancer for Arc<B> {
    fn endpoint(&self) -> Result<BoxEndpoint> {
        (**self).endpoint()
    }
}

impl Balancer for Box<dyn Balancer> {
    fn endpoint(&self) -> Result<BoxEndpoint> {
        (**self).endpoint()
    }
}

/// 负载均衡策略
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadBalanceStrategy {
    /// 轮询（Round Robin）
    #[default]
    RoundRobin,
    /// 随机（Random）
    Random,
}

impl LoadBalanceStrategy {
    /// 按策略创建负载均衡器
    pub fn build(self, endpointer: Arc<Endpointer>) -> Box<dyn Balancer> {
        match self {
            LoadBalanceStrategy::RoundRobin => Box::new(RoundRobin::new(endpointer)),
            LoadBalanceStrategy::Random => Box::new(Random::new(endpointer)),
        }
    }
}

impl fmt::Display for LoadBalanceStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadBalanceStrategy::RoundRobin => f.write_str("round_robin"),
            LoadBalanceStrategy::Random => f.write_str("random"),
        }
    }
}

impl FromStr for LoadBalanceStrategy {
    type Err = UserSvcError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "round_robin" | "roundrobin" | "rr" => Ok(LoadBalanceStrategy::RoundRobin),
            "random" => Ok(LoadBalanceStrategy::Random),
            other => Err(UserSvcError::config(format!(
                "unknown load balance strategy: {}",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_parse() {
        assert_eq!(LoadBalanceStrategy::default(), LoadBalanceStrategy::RoundRobin);
        assert_eq!(
            "Random".parse::<LoadBalanceStrategy>().unwrap(),
            LoadBalanceStrategy::Random
        );
        assert_eq!(
            "rr".parse::<LoadBalanceStrategy>().unwrap(),
            LoadBalanceStrategy::RoundRobin
        );
        assert!("least_conn".parse::<LoadBalanceStrategy>().is_err());
    }

    #[test]
    fn test_build_empty_balancer() {
        let endpointer = Arc::new(Endpointer::fixed(vec![]));
        for strategy in [LoadBalanceStrategy::RoundRobin, LoadBalanceStrategy::Random] {
            let balancer = strategy.build(endpointer.clone());
            assert!(matches!(
                balancer.endpoint(),
                Err(UserSvcError::NoEndpointsAvailable)
            ));
        }
    }
}

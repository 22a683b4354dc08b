//! 注册中心后端抽象和实现

pub mod consul;
pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::discovery::{InstanceQuery, ServiceEntry};
use crate::error::Result;

/// 一次阻塞查询的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryUpdate {
    /// 注册中心返回的服务记录（尚未按健康状态和标签过滤）
    pub entries: Vec<ServiceEntry>,

    /// 注册中心索引，作为下一次阻塞查询的起点
    pub index: u64,
}

/// 服务注册信息（服务端自注册时使用）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRegistration {
    /// 实例 ID（唯一标识）
    pub id: String,

    /// 服务名
    pub name: String,

    /// 对外地址
    pub address: String,

    pub port: u16,

    pub tags: Vec<String>,

    /// HTTP 健康检查地址
    pub health_check_url: Option<String>,
}

/// 注册中心后端 trait
///
/// 由于需要动态分发（dyn），使用 async-trait
#[async_trait]
pub trait RegistryBackend: Send + Sync {
    /// 查询服务实例
    ///
    /// 阻塞直到注册中心索引超过 `last_index` 或等待超时；`last_index` 为 0 时立即返回。
    ///
    /// # 错误
    /// * `RegistryInvalidQuery` - 永久错误，查询本身无效
    /// * `RegistryUnavailable` - 暂时错误，可以重试
    async fn healthy_instances(&self, query: &InstanceQuery, last_index: u64) -> Result<RegistryUpdate>;

    /// 注册服务实例
    async fn register(&self, registration: &ServiceRegistration) -> Result<()>;

    /// 注销服务实例
    async fn deregister(&self, id: &str) -> Result<()>;
}

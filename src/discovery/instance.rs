//! 服务实例定义

use serde::{Deserialize, Serialize};
use std::fmt;

/// 服务实例地址
///
/// 不透明的地址字符串（`host:port` 或完整 URL），由 watcher 产生和淘汰，从不修改
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Instance(String);

impl Instance {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Instance {
    fn from(address: &str) -> Self {
        Self::new(address)
    }
}

impl From<String> for Instance {
    fn from(address: String) -> Self {
        Self(address)
    }
}

/// 注册中心返回的一条服务记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceEntry {
    /// 实例地址
    pub address: Instance,

    /// 实例标签
    pub tags: Vec<String>,

    /// 是否通过全部健康检查
    pub passing: bool,
}

impl ServiceEntry {
    /// 创建健康的服务记录
    pub fn new(address: impl Into<Instance>) -> Self {
        Self {
            address: address.into(),
            tags: Vec::new(),
            passing: true,
        }
    }

    /// 添加标签
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// 设置健康状态
    pub fn with_passing(mut self, passing: bool) -> Self {
        self.passing = passing;
        self
    }

    /// 检查是否携带全部要求的标签
    pub fn matches_tags(&self, required: &[String]) -> bool {
        required.iter().all(|tag| self.tags.iter().any(|t| t == tag))
    }
}

/// 当前健康的实例集合
///
/// 只包含通过健康检查并且携带全部要求标签的实例，按地址排序并去重
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InstanceSet {
    pub service: String,
    pub tags: Vec<String>,
    instances: Vec<Instance>,
}

impl InstanceSet {
    /// 创建空集合
    pub fn empty(service: impl Into<String>, tags: Vec<String>) -> Self {
        Self {
            service: service.into(),
            tags,
            instances: Vec::new(),
        }
    }

    /// 从实例列表创建集合（排序 + 去重）
    pub fn new(service: impl Into<String>, tags: Vec<String>, instances: Vec<Instance>) -> Self {
        let mut instances = instances;
        instances.sort();
        instances.dedup();
        Self {
            service: service.into(),
            tags,
            instances,
        }
    }

    pub fn instances(&self) -> &[Instance] {
        &self.instances
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn contains(&self, instance: &Instance) -> bool {
        self.instances.binary_search(instance).is_ok()
    }

    /// 成员是否与另一个集合相同
    pub fn same_members(&self, other: &InstanceSet) -> bool {
        self.instances == other.instances
    }
}

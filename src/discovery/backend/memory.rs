//! 进程内注册中心
//!
//! 用于静态配置（不依赖 Consul）以及测试中模拟实例上下线、健康状态变化和注册中心故障

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tracing::debug;

use super::{RegistryBackend, RegistryUpdate, ServiceRegistration};
use crate::discovery::{InstanceQuery, ServiceEntry};
use crate::error::{Result, UserSvcError};

#[derive(Default)]
struct State {
    /// service -> (id -> entry)
    services: HashMap<String, BTreeMap<String, ServiceEntry>>,
    unavailable: bool,
    rejected: bool,
}

/// 进程内注册中心
pub struct MemoryBackend {
    state: Mutex<State>,
    /// 注册中心索引，每次变更加一
    version: watch::Sender<u64>,
    wait: Duration,
    queries: AtomicUsize,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::with_wait(Duration::from_secs(10))
    }

    /// 指定阻塞查询的最长等待时间
    pub fn with_wait(wait: Duration) -> Self {
        let (version, _) = watch::channel(1);
        Self {
            state: Mutex::new(State::default()),
            version,
            wait,
            queries: AtomicUsize::new(0),
        }
    }

    /// 从静态地址列表创建（所有实例健康并携带给定标签）
    pub fn from_static(service: &str, tags: &[String], addresses: &[String]) -> Self {
        let backend = Self::new();
        let entries = addresses
            .iter()
            .map(|addr| ServiceEntry {
                address: addr.as_str().into(),
                tags: tags.to_vec(),
                passing: true,
            })
            .collect();
        backend.set_service(service, entries);
        backend
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn bump(&self) {
        self.version.send_modify(|v| *v += 1);
    }

    /// 替换服务的全部记录（以地址作为实例 ID）
    pub fn set_service(&self, service: &str, entries: Vec<ServiceEntry>) {
        {
            let mut state = self.lock();
            let map = entries
                .into_iter()
                .map(|e| (e.address.to_string(), e))
                .collect();
            state.services.insert(service.to_string(), map);
        }
        self.bump();
    }

    /// 新增或更新一条记录
    pub fn upsert(&self, service: &str, id: &str, entry: ServiceEntry) {
        {
            let mut state = self.lock();
            state
                .services
                .entry(service.to_string())
                .or_default()
                .insert(id.to_string(), entry);
        }
        self.bump();
    }

    /// 删除一条记录
    pub fn remove(&self, service: &str, id: &str) {
        {
            let mut state = self.lock();
            if let Some(entries) = state.services.get_mut(service) {
                entries.remove(id);
            }
        }
        self.bump();
    }

    /// 模拟注册中心不可达（暂时错误）
    pub fn set_unavailable(&self, unavailable: bool) {
        self.lock().unavailable = unavailable;
        self.bump();
    }

    /// 模拟注册中心拒绝查询（永久错误）
    pub fn set_rejected(&self, rejected: bool) {
        self.lock().rejected = rejected;
        self.bump();
    }

    /// 已收到的查询次数
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RegistryBackend for MemoryBackend {
    async fn healthy_instances(&self, query: &InstanceQuery, last_index: u64) -> Result<RegistryUpdate> {
        self.queries.fetch_add(1, Ordering::SeqCst);

        let mut rx = self.version.subscribe();
        let current = *rx.borrow_and_update();
        if last_index > 0 && current <= last_index {
            // 阻塞直到索引变化或等待超时
            let _ = tokio::time::timeout(self.wait, rx.changed()).await;
        }

        let state = self.lock();
        if state.rejected {
            return Err(UserSvcError::invalid_query(format!(
                "memory registry rejected query for {}",
                query.service
            )));
        }
        if state.unavailable {
            return Err(UserSvcError::registry_unavailable("memory registry is unavailable"));
        }

        let entries: Vec<ServiceEntry> = state
            .services
            .get(&query.service)
            .map(|entries| {
                entries
                    .values()
                    .filter(|e| !query.passing_only || e.passing)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        let index = *self.version.borrow();

        debug!(service = %query.service, index, count = entries.len(), "memory registry query");
        Ok(RegistryUpdate { entries, index })
    }

    async fn register(&self, registration: &ServiceRegistration) -> Result<()> {
        let entry = ServiceEntry {
            address: format!("{}:{}", registration.address, registration.port).into(),
            tags: registration.tags.clone(),
            passing: true,
        };
        self.upsert(&registration.name, &registration.id, entry);
        Ok(())
    }

    async fn deregister(&self, id: &str) -> Result<()> {
        {
            let mut state = self.lock();
            for entries in state.services.values_mut() {
                entries.remove(id);
            }
        }
        self.bump();
        Ok(())
    }
}

//! 注册中心监听器
//!
//! 后台任务持续对注册中心做阻塞查询，维护一个实时、去重的健康实例集合，
//! 通过单槽的 `watch` 通道把完整的新集合推送给所有订阅者

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, error, info, warn};

use crate::discovery::backend::{RegistryBackend, RegistryUpdate};
use crate::discovery::{InstanceQuery, InstanceSet, WatchConfig};
use crate::error::Result;

/// 注册中心监听器
///
/// 可廉价克隆；最后一个克隆被释放时后台任务停止
#[derive(Clone)]
pub struct RegistryWatcher {
    query: Arc<InstanceQuery>,
    rx: watch::Receiver<Arc<InstanceSet>>,
    _shutdown: Arc<DropGuard>,
}

impl RegistryWatcher {
    /// 启动监听
    ///
    /// 查询无效或注册中心返回永久错误时直接失败；暂时错误只记录日志，
    /// 以空集合启动并在后台继续重试
    pub async fn spawn(
        backend: Arc<dyn RegistryBackend>,
        query: InstanceQuery,
        config: WatchConfig,
    ) -> Result<Self> {
        query.validate()?;
        config.validate()?;

        let (initial, index) = match backend.healthy_instances(&query, 0).await {
            Ok(update) => {
                let index = update.index;
                (build_set(&query, update), index)
            }
            Err(e) if e.is_permanent() => return Err(e),
            Err(e) => {
                warn!(
                    service = %query.service,
                    error = %e,
                    "Registry unavailable at startup, starting with empty instance set"
                );
                (InstanceSet::empty(&query.service, query.tags.clone()), 0)
            }
        };

        info!(
            service = %query.service,
            tags = ?query.tags,
            instances = initial.len(),
            "Registry watcher started"
        );

        let (tx, rx) = watch::channel(Arc::new(initial));
        let shutdown = CancellationToken::new();
        tokio::spawn(watch_loop(
            backend,
            query.clone(),
            config,
            tx,
            index,
            shutdown.clone(),
        ));

        Ok(Self {
            query: Arc::new(query),
            rx,
            _shutdown: Arc::new(shutdown.drop_guard()),
        })
    }

    /// 当前实例集合快照
    pub fn snapshot(&self) -> Arc<InstanceSet> {
        self.rx.borrow().clone()
    }

    /// 订阅实例集合变化
    pub fn subscribe(&self) -> watch::Receiver<Arc<InstanceSet>> {
        self.rx.clone()
    }

    pub fn query(&self) -> &InstanceQuery {
        &self.query
    }

    /// 等待至少 `min` 个实例出现，超时返回 false
    pub async fn wait_for_instances(&self, min: usize, timeout: Duration) -> bool {
        let mut rx = self.subscribe();
        wait_for(&mut rx, timeout, |set| set.len() >= min).await
    }
}

/// 按健康状态和标签过滤，排序去重
fn build_set(query: &InstanceQuery, update: RegistryUpdate) -> InstanceSet {
    let instances = update
        .entries
        .into_iter()
        .filter(|e| !query.passing_only || e.passing)
        .filter(|e| e.matches_tags(&query.tags))
        .map(|e| e.address)
        .collect();
    InstanceSet::new(&query.service, query.tags.clone(), instances)
}

async fn watch_loop(
    backend: Arc<dyn RegistryBackend>,
    query: InstanceQuery,
    config: WatchConfig,
    tx: watch::Sender<Arc<InstanceSet>>,
    mut index: u64,
    shutdown: CancellationToken,
) {
    let mut backoff = config.retry_min;

    loop {
        let result = tokio::select! {
            _ = shutdown.cancelled() => break,
            result = backend.healthy_instances(&query, index) => result,
        };

        match result {
            Ok(update) => {
                backoff = config.retry_min;
                // 索引回退时从头开始（Consul 语义）
                index = if update.index < index { 0 } else { update.index };

                let set = build_set(&query, update);
                let changed = tx.send_if_modified(|current| {
                    if current.same_members(&set) {
                        false
                    } else {
                        *current = Arc::new(set);
                        true
                    }
                });
                if changed {
                    let current = tx.borrow().clone();
                    info!(
                        service = %query.service,
                        instances = ?current.instances(),
                        "Instance set changed"
                    );
                } else {
                    debug!(service = %query.service, index, "Instance set unchanged");
                }
            }
            Err(e) if e.is_permanent() => {
                // 保留最后一个可用集合
                error!(service = %query.service, error = %e, "Registry watch stopped");
                break;
            }
            Err(e) => {
                warn!(
                    service = %query.service,
                    error = %e,
                    retry_in = ?backoff,
                    "Registry watch failed, keeping last known instances"
                );
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(backoff) => {}
                }
                backoff = config.next_backoff(backoff);
                // 注册中心恢复后先做一次非阻塞查询
                index = 0;
            }
        }

        // 订阅者全部离开后没有继续监听的必要
        if tx.is_closed() {
            break;
        }
    }

    debug!(service = %query.service, "Registry watch loop exited");
}

/// 等待集合满足条件
pub async fn wait_for(
    rx: &mut watch::Receiver<Arc<InstanceSet>>,
    timeout: Duration,
    mut predicate: impl FnMut(&InstanceSet) -> bool,
) -> bool {
    tokio::time::timeout(timeout, rx.wait_for(|set| predicate(set)))
        .await
        .is_ok_and(|r| r.is_ok())
}

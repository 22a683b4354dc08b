//! Endpointer
//!
//! 订阅 watcher 的实例集合，为每个健康实例维护一个绑定到某个方法的端点。
//! 每次更新都生成一份完整的新列表并整体替换，读者只会看到旧列表或新列表

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, warn};

use crate::discovery::factory::EndpointFactory;
use crate::discovery::{Instance, InstanceSet, RegistryWatcher};
use crate::endpoint::{BoxEndpoint, Release};

struct CacheEntry {
    endpoint: BoxEndpoint,
    release: Option<Release>,
}

/// 实例 -> 端点缓存，只由后台任务修改
struct EndpointCache {
    factory: Arc<dyn EndpointFactory>,
    entries: HashMap<Instance, CacheEntry>,
}

impl EndpointCache {
    fn new(factory: Arc<dyn EndpointFactory>) -> Self {
        Self {
            factory,
            entries: HashMap::new(),
        }
    }

    /// 按新集合更新缓存，返回按集合顺序排列的端点列表
    fn update(&mut self, set: &InstanceSet) -> Arc<Vec<BoxEndpoint>> {
        let mut next = HashMap::with_capacity(set.len());
        let mut endpoints = Vec::with_capacity(set.len());

        for instance in set.instances() {
            if let Some(entry) = self.entries.remove(instance) {
                endpoints.push(entry.endpoint.clone());
                next.insert(instance.clone(), entry);
                continue;
            }

            match self.factory.make(instance) {
                Ok((endpoint, release)) => {
                    debug!(instance = %instance, "Endpoint created");
                    endpoints.push(endpoint.clone());
                    next.insert(instance.clone(), CacheEntry { endpoint, release });
                }
                Err(e) => {
                    warn!(instance = %instance, error = %e, "Failed to create endpoint, skipping instance");
                }
            }
        }

        // 剩下的都是已经离开集合的实例
        for (instance, entry) in self.entries.drain() {
            debug!(instance = %instance, "Endpoint released");
            if let Some(release) = entry.release {
                release();
            }
        }

        self.entries = next;
        Arc::new(endpoints)
    }

    fn close(&mut self) {
        for (_, entry) in self.entries.drain() {
            if let Some(release) = entry.release {
                release();
            }
        }
    }
}

/// Endpointer
pub struct Endpointer {
    rx: watch::Receiver<Arc<Vec<BoxEndpoint>>>,
    // 保持 watcher 存活
    _watcher: Option<RegistryWatcher>,
    _shutdown: Option<DropGuard>,
}

impl Endpointer {
    /// 创建 endpointer
    ///
    /// 立即按 watcher 当前快照生成端点，之后的更新由后台任务应用；必须在 Tokio 运行时内调用
    pub fn new(watcher: &RegistryWatcher, factory: Arc<dyn EndpointFactory>) -> Self {
        let mut updates = watcher.subscribe();
        let mut cache = EndpointCache::new(factory);

        let current = updates.borrow_and_update().clone();
        let (tx, rx) = watch::channel(cache.update(&current));

        let shutdown = CancellationToken::new();
        let token = shutdown.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    changed = updates.changed() => {
                        if changed.is_err() {
                            // watcher 已停止：保留最后一份端点，直到 endpointer 被丢弃
                            debug!("Watcher stopped, keeping last endpoint set");
                            token.cancelled().await;
                            break;
                        }
                        let set = updates.borrow_and_update().clone();
                        tx.send_replace(cache.update(&set));
                    }
                }
            }
            cache.close();
        });

        Self {
            rx,
            _watcher: Some(watcher.clone()),
            _shutdown: Some(shutdown.drop_guard()),
        }
    }

    /// 固定端点列表，不订阅注册中心
    pub fn fixed(endpoints: Vec<BoxEndpoint>) -> Self {
        let (_, rx) = watch::channel(Arc::new(endpoints));
        Self {
            rx,
            _watcher: None,
            _shutdown: None,
        }
    }

    /// 当前端点列表快照
    pub fn endpoints(&self) -> Arc<Vec<BoxEndpoint>> {
        self.rx.borrow().clone()
    }

    /// 订阅端点列表变化
    pub fn subscribe(&self) -> watch::Receiver<Arc<Vec<BoxEndpoint>>> {
        self.rx.clone()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::discovery::backend::memory::MemoryBackend;
    use crate::discovery::{InstanceQuery, ServiceEntry, WatchConfig};
    use crate::endpoint::Endpoint;
    use crate::error::{Result, UserSvcError};
    use crate::types::{Method, UserRequest, UserResponse};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    pub(crate) struct StaticEndpoint {
        pub instance: Instance,
    }

    #[async_trait]
    impl Endpoint for StaticEndpoint {
        fn instance(&self) -> &Instance {
            &self.instance
        }

        fn method(&self) -> Method {
            Method::ListUsers
        }

        async fn call(&self, _request: UserRequest) -> Result<UserResponse> {
            Ok(UserResponse::Users(vec![]))
        }
    }

    fn config() -> WatchConfig {
        WatchConfig {
            wait: Duration::from_millis(200),
            retry_min: Duration::from_millis(5),
            retry_max: Duration::from_millis(20),
        }
    }

    fn addrs(endpoints: &[BoxEndpoint]) -> Vec<String> {
        endpoints.iter().map(|e| e.instance().to_string()).collect()
    }

    async fn wait_len(endpointer: &Endpointer, len: usize) -> bool {
        let mut rx = endpointer.subscribe();
        tokio::time::timeout(Duration::from_secs(2), rx.wait_for(|eps| eps.len() == len))
            .await
            .is_ok_and(|r| r.is_ok())
    }

    #[tokio::test]
    async fn test_diff_creates_and_releases() {
        let backend = Arc::new(MemoryBackend::with_wait(Duration::from_millis(200)));
        backend.set_service(
            "usersvc",
            vec![ServiceEntry::new("a:80"), ServiceEntry::new("b:80")],
        );
        let watcher = RegistryWatcher::spawn(backend.clone(), InstanceQuery::new("usersvc"), config())
            .await
            .unwrap();

        let created = Arc::new(AtomicUsize::new(0));
        let released = Arc::new(Mutex::new(Vec::<String>::new()));
        let factory = {
            let created = created.clone();
            let released = released.clone();
            move |instance: &Instance| -> Result<(BoxEndpoint, Option<Release>)> {
                created.fetch_add(1, Ordering::SeqCst);
                let released = released.clone();
                let name = instance.to_string();
                let release: Release = Box::new(move || released.lock().unwrap().push(name));
                Ok((
                    Arc::new(StaticEndpoint {
                        instance: instance.clone(),
                    }) as BoxEndpoint,
                    Some(release),
                ))
            }
        };

        let endpointer = Endpointer::new(&watcher, Arc::new(factory));
        assert_eq!(addrs(&endpointer.endpoints()), vec!["a:80", "b:80"]);
        assert_eq!(created.load(Ordering::SeqCst), 2);

        // b 下线，c 上线：a 复用，c 新建，b 释放
        backend.set_service(
            "usersvc",
            vec![ServiceEntry::new("a:80"), ServiceEntry::new("c:80")],
        );
        let mut rx = endpointer.subscribe();
        tokio::time::timeout(
            Duration::from_secs(2),
            rx.wait_for(|eps| addrs(eps) == vec!["a:80", "c:80"]),
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(created.load(Ordering::SeqCst), 3);
        assert_eq!(*released.lock().unwrap(), vec!["b:80".to_string()]);
    }

    #[tokio::test]
    async fn test_factory_failure_skips_instance() {
        let backend = Arc::new(MemoryBackend::with_wait(Duration::from_millis(200)));
        backend.set_service(
            "usersvc",
            vec![ServiceEntry::new("good:80"), ServiceEntry::new("bad:80")],
        );
        let watcher = RegistryWatcher::spawn(backend, InstanceQuery::new("usersvc"), config())
            .await
            .unwrap();

        let factory = |instance: &Instance| -> Result<(BoxEndpoint, Option<Release>)> {
            if instance.as_str().starts_with("bad") {
                return Err(UserSvcError::invalid_instance(instance.as_str(), "unparseable"));
            }
            Ok((
                Arc::new(StaticEndpoint {
                    instance: instance.clone(),
                }) as BoxEndpoint,
                None,
            ))
        };

        let endpointer = Endpointer::new(&watcher, Arc::new(factory));
        assert_eq!(addrs(&endpointer.endpoints()), vec!["good:80"]);
    }

    #[tokio::test]
    async fn test_concurrent_reads_never_see_torn_update() {
        let backend = Arc::new(MemoryBackend::with_wait(Duration::from_millis(200)));
        let old: Vec<String> = (0..8).map(|i| format!("old-{}:80", i)).collect();
        let new: Vec<String> = (0..8).map(|i| format!("new-{}:80", i)).collect();
        let shared = "shared:80".to_string();

        let entries = |names: &[String]| {
            names
                .iter()
                .chain(std::iter::once(&shared))
                .map(|n| ServiceEntry::new(n.as_str()))
                .collect::<Vec<_>>()
        };
        backend.set_service("usersvc", entries(old.as_slice()));

        let watcher = RegistryWatcher::spawn(backend.clone(), InstanceQuery::new("usersvc"), config())
            .await
            .unwrap();
        let factory = |instance: &Instance| -> Result<(BoxEndpoint, Option<Release>)> {
            Ok((
                Arc::new(StaticEndpoint {
                    instance: instance.clone(),
                }) as BoxEndpoint,
                None,
            ))
        };
        let endpointer = Arc::new(Endpointer::new(&watcher, Arc::new(factory)));

        let mut old_set = addrs(&endpointer.endpoints());
        old_set.sort();
        let mut new_set: Vec<String> = new.iter().cloned().chain(std::iter::once(shared.clone())).collect();
        new_set.sort();

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let endpointer = endpointer.clone();
                let old_set = old_set.clone();
                let new_set = new_set.clone();
                tokio::spawn(async move {
                    for _ in 0..500 {
                        let mut seen = addrs(&endpointer.endpoints());
                        seen.sort();
                        assert!(seen == old_set || seen == new_set, "torn snapshot: {:?}", seen);
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect();

        for i in 0..10 {
            let names = if i % 2 == 0 { &new } else { &old };
            backend.set_service("usersvc", entries(names.as_slice()));
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        for reader in readers {
            reader.await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_permanent_watch_error_keeps_endpoints_until_drop() {
        let backend = Arc::new(MemoryBackend::with_wait(Duration::from_millis(200)));
        backend.set_service("usersvc", vec![ServiceEntry::new("a:80")]);
        let watcher = RegistryWatcher::spawn(backend.clone(), InstanceQuery::new("usersvc"), config())
            .await
            .unwrap();

        let released = Arc::new(AtomicUsize::new(0));
        let factory = {
            let released = released.clone();
            move |instance: &Instance| -> Result<(BoxEndpoint, Option<Release>)> {
                let released = released.clone();
                let release: Release = Box::new(move || {
                    released.fetch_add(1, Ordering::SeqCst);
                });
                Ok((
                    Arc::new(StaticEndpoint {
                        instance: instance.clone(),
                    }) as BoxEndpoint,
                    Some(release),
                ))
            }
        };
        let endpointer = Endpointer::new(&watcher, Arc::new(factory));

        // 永久错误使 watcher 停止，端点集合保持不变且不释放
        backend.set_rejected(true);
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(released.load(Ordering::SeqCst), 0);
        assert_eq!(addrs(&endpointer.endpoints()), vec!["a:80"]);

        drop(endpointer);
        for _ in 0..100 {
            if released.load(Ordering::SeqCst) == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_fixed_endpointer() {
        let endpoints: Vec<BoxEndpoint> = vec![Arc::new(StaticEndpoint {
            instance: "a:80".into(),
        })];
        let endpointer = Endpointer::fixed(endpoints);
        assert_eq!(addrs(&endpointer.endpoints()), vec!["a:80"]);
    }

    #[tokio::test]
    async fn test_empty_then_repopulated() {
        let backend = Arc::new(MemoryBackend::with_wait(Duration::from_millis(200)));
        backend.set_service("usersvc", vec![ServiceEntry::new("a:80")]);
        let watcher = RegistryWatcher::spawn(backend.clone(), InstanceQuery::new("usersvc"), config())
            .await
            .unwrap();
        let factory = |instance: &Instance| -> Result<(BoxEndpoint, Option<Release>)> {
            Ok((
                Arc::new(StaticEndpoint {
                    instance: instance.clone(),
                }) as BoxEndpoint,
                None,
            ))
        };
        let endpointer = Endpointer::new(&watcher, Arc::new(factory));

        backend.set_service("usersvc", vec![]);
        assert!(wait_len(&endpointer, 0).await);
        backend.set_service("usersvc", vec![ServiceEntry::new("b:80")]);
        assert!(wait_len(&endpointer, 1).await);
    }
}

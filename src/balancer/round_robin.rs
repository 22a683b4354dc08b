//! 轮询

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::Balancer;
use crate::discovery::Endpointer;
use crate::endpoint::BoxEndpoint;
use crate::error::{Result, UserSvcError};

/// 轮询负载均衡器
///
/// 游标单调递增，对当前快照长度取模；集合变化后下一次选择自然落到新集合上
pub struct RoundRobin {
    endpointer: Arc<Endpointer>,
    cursor: AtomicUsize,
}

impl RoundRobin {
    pub fn new(endpointer: Arc<Endpointer>) -> Self {
        Self {
            endpointer,
            cursor: AtomicUsize::new(0),
        }
    }
}

impl Balancer for RoundRobin {
    fn endpoint(&self) -> Result<BoxEndpoint> {
        let endpoints = self.endpointer.endpoints();
        if endpoints.is_empty() {
            return Err(UserSvcError::NoEndpointsAvailable);
        }
        let index = self.cursor.fetch_add(1, Ordering::Relaxed);
        Ok(endpoints[index % endpoints.len()].clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::endpointer::tests::StaticEndpoint;
    use std::collections::HashSet;

    fn endpoints(addrs: &[&str]) -> Vec<BoxEndpoint> {
        addrs
            .iter()
            .map(|a| {
                Arc::new(StaticEndpoint {
                    instance: (*a).into(),
                }) as BoxEndpoint
            })
            .collect()
    }

    fn pick(balancer: &RoundRobin) -> String {
        balancer.endpoint().unwrap().instance().to_string()
    }

    #[test]
    fn test_visits_endpoints_in_list_order() {
        let balancer = RoundRobin::new(Arc::new(Endpointer::fixed(endpoints(&["a:1", "b:1", "c:1"]))));

        let order: Vec<String> = (0..7).map(|_| pick(&balancer)).collect();
        assert_eq!(order, vec!["a:1", "b:1", "c:1", "a:1", "b:1", "c:1", "a:1"]);

        for _ in 0..3 {
            let seen: HashSet<String> = (0..3).map(|_| pick(&balancer)).collect();
            assert_eq!(seen.len(), 3);
        }
    }

    #[test]
    fn test_empty_set() {
        let balancer = RoundRobin::new(Arc::new(Endpointer::fixed(vec![])));
        assert!(matches!(
            balancer.endpoint(),
            Err(UserSvcError::NoEndpointsAvailable)
        ));
    }

    #[tokio::test]
    async fn test_resumes_after_repopulation() {
        use crate::discovery::backend::memory::MemoryBackend;
        use crate::discovery::{Instance, InstanceQuery, RegistryWatcher, ServiceEntry, WatchConfig};
        use crate::endpoint::Release;
        use std::time::Duration;

        let backend = Arc::new(MemoryBackend::with_wait(Duration::from_millis(200)));
        let config = WatchConfig {
            wait: Duration::from_millis(200),
            retry_min: Duration::from_millis(5),
            retry_max: Duration::from_millis(20),
        };
        let watcher = RegistryWatcher::spawn(backend.clone(), InstanceQuery::new("usersvc"), config)
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
        let balancer = RoundRobin::new(endpointer.clone());

        assert!(matches!(
            balancer.endpoint(),
            Err(UserSvcError::NoEndpointsAvailable)
        ));

        backend.set_service("usersvc", vec![ServiceEntry::new("a:80")]);
        let mut rx = endpointer.subscribe();
        tokio::time::timeout(Duration::from_secs(2), rx.wait_for(|eps| !eps.is_empty()))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(balancer.endpoint().unwrap().instance().as_str(), "a:80");
    }

    #[tokio::test]
    async fn test_cursor_taken_modulo_new_size() {
        use crate::discovery::backend::memory::MemoryBackend;
        use crate::discovery::{Instance, InstanceQuery, RegistryWatcher, ServiceEntry, WatchConfig};
        use crate::endpoint::Release;
        use std::time::Duration;

        let backend = Arc::new(MemoryBackend::with_wait(Duration::from_millis(200)));
        backend.set_service(
            "usersvc",
            vec![
                ServiceEntry::new("a:80"),
                ServiceEntry::new("b:80"),
                ServiceEntry::new("c:80"),
            ],
        );
        let config = WatchConfig {
            wait: Duration::from_millis(200),
            retry_min: Duration::from_millis(5),
            retry_max: Duration::from_millis(20),
        };
        let watcher = RegistryWatcher::spawn(backend.clone(), InstanceQuery::new("usersvc"), config)
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
        let balancer = RoundRobin::new(endpointer.clone());

        // 游标推进到 4
        let order: Vec<String> = (0..4).map(|_| pick(&balancer)).collect();
        assert_eq!(order, vec!["a:80", "b:80", "c:80", "a:80"]);

        backend.set_service("usersvc", vec![ServiceEntry::new("a:80"), ServiceEntry::new("c:80")]);
        let mut rx = endpointer.subscribe();
        tokio::time::timeout(Duration::from_secs(2), rx.wait_for(|eps| eps.len() == 2))
            .await
            .unwrap()
            .unwrap();

        // 4 % 2 = 0，5 % 2 = 1
        assert_eq!(pick(&balancer), "a:80");
        assert_eq!(pick(&balancer), "c:80");
        assert_eq!(pick(&balancer), "a:80");
    }
}

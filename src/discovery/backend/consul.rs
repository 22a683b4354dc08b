//! Consul 注册中心后端
//!
//! 使用 Consul 的阻塞查询（`index` + `wait`）监听 `/v1/health/service/:service`

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{Client as HttpClient, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::{RegistryBackend, RegistryUpdate, ServiceRegistration};
use crate::discovery::{Instance, InstanceQuery, ServiceEntry};
use crate::error::{Result, UserSvcError};

/// 默认 Consul 地址
pub const DEFAULT_CONSUL_URL: &str = "http://localhost:8500";

/// 健康检查通过的状态值
const CHECK_PASSING: &str = "passing";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct HealthEntry {
    #[serde(default)]
    node: NodeInfo,
    service: AgentService,
    #[serde(default)]
    checks: Vec<HealthCheck>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct NodeInfo {
    #[serde(default)]
    address: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AgentService {
    #[serde(default)]
    address: String,
    port: u16,
    #[serde(default)]
    tags: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct HealthCheck {
    status: String,
}

impl HealthEntry {
    fn into_service_entry(self) -> ServiceEntry {
        // 服务未单独声明地址时使用节点地址
        let host = if self.service.address.is_empty() {
            self.node.address
        } else {
            self.service.address
        };
        let address = if host.contains(':') {
            format!("[{}]:{}", host, self.service.port)
        } else {
            format!("{}:{}", host, self.service.port)
        };

        ServiceEntry {
            address: Instance::new(address),
            tags: self.service.tags.unwrap_or_default(),
            passing: self.checks.iter().all(|c| c.status == CHECK_PASSING),
        }
    }
}

/// Consul 注册中心后端
pub struct ConsulBackend {
    http_client: HttpClient,
    consul_url: String,
    /// 阻塞查询的最长等待时间
    wait: Duration,
}

impl ConsulBackend {
    /// 创建新的 Consul 后端
    pub fn new(consul_url: impl Into<String>, wait: Duration) -> Result<Self> {
        let mut consul_url = consul_url.into();
        if consul_url.trim().is_empty() {
            consul_url = DEFAULT_CONSUL_URL.to_string();
        }
        if !consul_url.starts_with("http") {
            consul_url = format!("http://{}", consul_url);
        }
        let consul_url = consul_url.trim_end_matches('/').to_string();

        let http_client = HttpClient::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| UserSvcError::config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            consul_url,
            wait,
        })
    }

    pub fn url(&self) -> &str {
        &self.consul_url
    }

    fn classify_status(status: StatusCode, body: String) -> UserSvcError {
        match status {
            StatusCode::BAD_REQUEST | StatusCode::FORBIDDEN => {
                UserSvcError::invalid_query(format!("Consul rejected query ({}): {}", status, body))
            }
            _ => UserSvcError::registry_unavailable(format!("Consul returned {}: {}", status, body)),
        }
    }
}

/// 读取 `X-Consul-Index`
///
/// 成功查询后的索引至少为 1，缺失或为 0 时按 1 处理，否则后续查询不会阻塞
fn consul_index(headers: &HeaderMap) -> u64 {
    headers
        .get("X-Consul-Index")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(0)
        .max(1)
}

#[async_trait]
impl RegistryBackend for ConsulBackend {
    async fn healthy_instances(&self, query: &InstanceQuery, last_index: u64) -> Result<RegistryUpdate> {
        let url = format!("{}/v1/health/service/{}", self.consul_url, query.service);

        // Consul 只支持按一个标签过滤，其余标签由 watcher 在客户端过滤
        let mut params: Vec<(&str, String)> = Vec::new();
        if let Some(tag) = query.tags.first() {
            params.push(("tag", tag.clone()));
        }
        if query.passing_only {
            params.push(("passing", "1".to_string()));
        }
        if last_index > 0 {
            params.push(("index", last_index.to_string()));
            params.push(("wait", format!("{}ms", self.wait.as_millis())));
        }

        let resp = self
            .http_client
            .get(&url)
            .query(&params)
            .timeout(self.wait + Duration::from_secs(5))
            .send()
            .await
            .map_err(|e| UserSvcError::registry_unavailable(format!("Consul request failed: {}", e)))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Self::classify_status(status, body));
        }

        let index = consul_index(resp.headers());

        let entries: Vec<HealthEntry> = resp
            .json()
            .await
            .map_err(|e| UserSvcError::registry_unavailable(format!("invalid Consul response: {}", e)))?;

        debug!(
            service = %query.service,
            index,
            count = entries.len(),
            "Consul health query returned"
        );

        Ok(RegistryUpdate {
            entries: entries.into_iter().map(HealthEntry::into_service_entry).collect(),
            index,
        })
    }

    async fn register(&self, registration: &ServiceRegistration) -> Result<()> {
        let url = format!("{}/v1/agent/service/register", self.consul_url);

        let mut payload = serde_json::json!({
            "ID": registration.id,
            "Name": registration.name,
            "Tags": registration.tags,
            "Address": registration.address,
            "Port": registration.port,
        });
        if let Some(check_url) = &registration.health_check_url {
            payload["Check"] = serde_json::json!({
                "HTTP": check_url,
                "Interval": "10s",
                "Timeout": "5s",
                "DeregisterCriticalServiceAfter": "90s"
            });
        }

        let resp = self
            .http_client
            .put(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| UserSvcError::registry_unavailable(format!("Consul register failed: {}", e)))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Self::classify_status(status, body));
        }
        Ok(())
    }

    async fn deregister(&self, id: &str) -> Result<()> {
        let url = format!("{}/v1/agent/service/deregister/{}", self.consul_url, id);
        let resp = self
            .http_client
            .put(&url)
            .send()
            .await
            .map_err(|e| UserSvcError::registry_unavailable(format!("Consul deregister failed: {}", e)))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Self::classify_status(status, body));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_entry_parsing() {
        let body = r#"[
            {
                "Node": {"Node": "n1", "Address": "10.0.0.1"},
                "Service": {"ID": "usersvc-1", "Service": "usersvc", "Address": "", "Port": 8080, "Tags": ["prod"]},
                "Checks": [{"Status": "passing"}, {"Status": "passing"}]
            },
            {
                "Node": {"Node": "n2", "Address": "10.0.0.2"},
                "Service": {"ID": "usersvc-2", "Service": "usersvc", "Address": "10.0.1.2", "Port": 8081, "Tags": null},
                "Checks": [{"Status": "critical"}]
            }
        ]"#;
        let entries: Vec<HealthEntry> = serde_json::from_str(body).unwrap();
        let entries: Vec<ServiceEntry> = entries.into_iter().map(HealthEntry::into_service_entry).collect();

        assert_eq!(entries[0].address.as_str(), "10.0.0.1:8080");
        assert!(entries[0].passing);
        assert_eq!(entries[0].tags, vec!["prod".to_string()]);

        assert_eq!(entries[1].address.as_str(), "10.0.1.2:8081");
        assert!(!entries[1].passing);
        assert!(entries[1].tags.is_empty());
    }

    #[test]
    fn test_index_is_at_least_one() {
        let mut headers = HeaderMap::new();
        assert_eq!(consul_index(&headers), 1);

        headers.insert("X-Consul-Index", "0".parse().unwrap());
        assert_eq!(consul_index(&headers), 1);

        headers.insert("X-Consul-Index", "not-a-number".parse().unwrap());
        assert_eq!(consul_index(&headers), 1);

        headers.insert("X-Consul-Index", "4821".parse().unwrap());
        assert_eq!(consul_index(&headers), 4821);
    }

    #[test]
    fn test_ipv6_address_is_bracketed() {
        let entry = HealthEntry {
            node: NodeInfo::default(),
            service: AgentService {
                address: "::1".to_string(),
                port: 9000,
                tags: None,
            },
            checks: vec![],
        };
        assert_eq!(entry.into_service_entry().address.as_str(), "[::1]:9000");
    }

    #[test]
    fn test_new_normalizes_url() {
        let backend = ConsulBackend::new("127.0.0.1:8500/", Duration::from_secs(1)).unwrap();
        assert_eq!(backend.url(), "http://127.0.0.1:8500");
        let backend = ConsulBackend::new("", Duration::from_secs(1)).unwrap();
        assert_eq!(backend.url(), DEFAULT_CONSUL_URL);
    }

    #[test]
    fn test_status_classification() {
        let err = ConsulBackend::classify_status(StatusCode::BAD_REQUEST, "bad".to_string());
        assert!(err.is_permanent());
        let err = ConsulBackend::classify_status(StatusCode::INTERNAL_SERVER_ERROR, String::new());
        assert!(matches!(err, UserSvcError::RegistryUnavailable(_)));
    }
}

//! 用户服务客户端
//!
//! 一个共享的 watcher，四条 endpointer → 负载均衡 → 重试 流水线（每个方法一条）

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::balancer::{Balancer, LoadBalanceStrategy};
use crate::context::CallContext;
use crate::discovery::backend::consul::{ConsulBackend, DEFAULT_CONSUL_URL};
use crate::discovery::backend::memory::MemoryBackend;
use crate::discovery::{
    EndpointFactory, Endpointer, HttpEndpointFactory, InstanceQuery, RegistryBackend, RegistryWatcher,
    WatchConfig,
};
use crate::error::{Result, UserSvcError};
use crate::retry::{DEFAULT_MAX_ATTEMPTS, Retry, RetryPolicy};
use crate::transport::{HttpTransport, Transport};
use crate::types::{CreatedUser, Method, NewUser, User, UserRequest, UserResponse};

/// 客户端配置
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Consul 地址
    pub consul_url: String,

    /// 静态实例列表，非空时不连接 Consul
    pub static_instances: Vec<String>,

    pub service: String,
    pub tags: Vec<String>,
    pub passing_only: bool,

    pub max_attempts: usize,
    pub per_attempt_timeout_ms: u64,
    pub balance_strategy: LoadBalanceStrategy,

    /// 阻塞查询的最长等待时间
    pub watch_wait_ms: u64,
    pub watch_retry_min_ms: u64,
    pub watch_retry_max_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            consul_url: DEFAULT_CONSUL_URL.to_string(),
            static_instances: Vec::new(),
            service: "usersvc".to_string(),
            tags: vec!["prod".to_string()],
            passing_only: true,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            per_attempt_timeout_ms: 500,
            balance_strategy: LoadBalanceStrategy::RoundRobin,
            watch_wait_ms: 10_000,
            watch_retry_min_ms: 10,
            watch_retry_max_ms: 60_000,
        }
    }
}

impl ClientConfig {
    pub fn query(&self) -> InstanceQuery {
        InstanceQuery {
            service: self.service.clone(),
            tags: self.tags.clone(),
            passing_only: self.passing_only,
        }
    }

    pub fn watch_config(&self) -> Result<WatchConfig> {
        let config = WatchConfig {
            wait: Duration::from_millis(self.watch_wait_ms),
            retry_min: Duration::from_millis(self.watch_retry_min_ms),
            retry_max: Duration::from_millis(self.watch_retry_max_ms.max(self.watch_retry_min_ms)),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn retry_policy(&self) -> Result<RetryPolicy> {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_millis(self.per_attempt_timeout_ms),
        )
    }
}

/// 用户服务客户端
pub struct UserClient {
    watcher: RegistryWatcher,
    create: Retry<Box<dyn Balancer>>,
    get: Retry<Box<dyn Balancer>>,
    patch: Retry<Box<dyn Balancer>>,
    list: Retry<Box<dyn Balancer>>,
}

impl UserClient {
    /// 使用给定的注册中心和传输层创建客户端
    pub async fn new(
        backend: Arc<dyn RegistryBackend>,
        transport: Arc<dyn Transport>,
        config: &ClientConfig,
    ) -> Result<Self> {
        Self::with_factory(backend, config, |method| {
            Arc::new(HttpEndpointFactory::new(transport.clone(), method)) as Arc<dyn EndpointFactory>
        })
        .await
    }

    /// 按配置连接 Consul（或静态实例列表）并使用 HTTP 传输
    pub async fn connect(config: &ClientConfig) -> Result<Self> {
        let backend: Arc<dyn RegistryBackend> = if config.static_instances.is_empty() {
            Arc::new(ConsulBackend::new(
                config.consul_url.clone(),
                Duration::from_millis(config.watch_wait_ms),
            )?)
        } else {
            Arc::new(MemoryBackend::from_static(
                &config.service,
                &config.tags,
                &config.static_instances,
            ))
        };
        let transport = Arc::new(HttpTransport::new()?);
        Self::new(backend, transport, config).await
    }

    /// 为每个方法使用自定义端点工厂
    pub async fn with_factory<F>(
        backend: Arc<dyn RegistryBackend>,
        config: &ClientConfig,
        factory_for: F,
    ) -> Result<Self>
    where
        F: Fn(Method) -> Arc<dyn EndpointFactory>,
    {
        let policy = config.retry_policy()?;
        let watcher = RegistryWatcher::spawn(backend, config.query(), config.watch_config()?).await?;

        let pipeline = |method: Method| {
            let endpointer = Arc::new(Endpointer::new(&watcher, factory_for(method)));
            Retry::new(policy, config.balance_strategy.build(endpointer))
        };

        let client = Self {
            create: pipeline(Method::CreateUser),
            get: pipeline(Method::GetUser),
            patch: pipeline(Method::PatchUser),
            list: pipeline(Method::ListUsers),
            watcher,
        };

        info!(
            service = %config.service,
            tags = ?config.tags,
            strategy = %config.balance_strategy,
            max_attempts = policy.max_attempts(),
            per_attempt_timeout = ?policy.per_attempt_timeout(),
            "User client ready"
        );
        Ok(client)
    }

    pub fn watcher(&self) -> &RegistryWatcher {
        &self.watcher
    }

    /// 等待至少 `min` 个实例被发现
    pub async fn wait_ready(&self, min: usize, timeout: Duration) -> bool {
        self.watcher.wait_for_instances(min, timeout).await
    }

    pub async fn create_user(&self, ctx: &CallContext, user: NewUser) -> Result<CreatedUser> {
        match self.create.call(ctx, UserRequest::Create(user)).await? {
            UserResponse::Created(created) => Ok(created),
            other => Err(unexpected(Method::CreateUser, other)),
        }
    }

    pub async fn get_user(&self, ctx: &CallContext, id: &str, token: &str) -> Result<User> {
        let request = UserRequest::Get {
            id: id.to_string(),
            token: Some(token.to_string()),
        };
        match self.get.call(ctx, request).await? {
            UserResponse::User(user) => Ok(user),
            other => Err(unexpected(Method::GetUser, other)),
        }
    }

    /// 返回被修改用户的 ID
    pub async fn patch_user(&self, ctx: &CallContext, id: &str, user: User, token: &str) -> Result<String> {
        let request = UserRequest::Patch {
            id: id.to_string(),
            user,
            token: Some(token.to_string()),
        };
        match self.patch.call(ctx, request).await? {
            UserResponse::Patched { id } => Ok(id),
            other => Err(unexpected(Method::PatchUser, other)),
        }
    }

    pub async fn list_users(&self, ctx: &CallContext) -> Result<Vec<User>> {
        match self.list.call(ctx, UserRequest::List).await? {
            UserResponse::Users(users) => Ok(users),
            other => Err(unexpected(Method::ListUsers, other)),
        }
    }
}

fn unexpected(method: Method, response: UserResponse) -> UserSvcError {
    match response {
        UserResponse::Failed(err) => UserSvcError::Service(err),
        other => UserSvcError::system(format!("unexpected response for {}: {:?}", method, other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::{Instance, ServiceEntry};
    use crate::endpoint::{BoxEndpoint, Endpoint, Release};
    use crate::error::ServiceError;
    use async_trait::async_trait;

    /// 按方法返回固定响应
    struct CannedEndpoint {
        instance: Instance,
        method: Method,
    }

    #[async_trait]
    impl Endpoint for CannedEndpoint {
        fn instance(&self) -> &Instance {
            &self.instance
        }

        fn method(&self) -> Method {
            self.method
        }

        async fn call(&self, request: UserRequest) -> Result<UserResponse> {
            Ok(match request {
                UserRequest::Create(user) => UserResponse::Created(CreatedUser {
                    id: format!("id-{}", user.name),
                    token: "token".to_string(),
                }),
                UserRequest::Get { id, .. } if id == "42" => {
                    UserResponse::User(User::new("42", "alice", "", ""))
                }
                UserRequest::Get { .. } => UserResponse::Failed(ServiceError::NotFound),
                // 故意返回错误的变体
                UserRequest::Patch { .. } => UserResponse::Users(vec![]),
                UserRequest::List => UserResponse::Users(vec![User::new("42", "alice", "", "")]),
            })
        }
    }

    async fn client() -> UserClient {
        let backend = Arc::new(MemoryBackend::with_wait(Duration::from_millis(200)));
        backend.set_service("usersvc", vec![ServiceEntry::new("a:80").with_tag("prod")]);

        UserClient::with_factory(backend, &ClientConfig::default(), |method| {
            let factory = move |instance: &Instance| -> Result<(BoxEndpoint, Option<Release>)> {
                Ok((
                    Arc::new(CannedEndpoint {
                        instance: instance.clone(),
                        method,
                    }) as BoxEndpoint,
                    None,
                ))
            };
            Arc::new(factory) as Arc<dyn EndpointFactory>
        })
        .await
        .unwrap()
    }

    #[test]
    fn test_config_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.query(), InstanceQuery::new("usersvc").with_tag("prod"));
        let policy = config.retry_policy().unwrap();
        assert_eq!(policy.max_attempts(), 3);
        assert_eq!(policy.per_attempt_timeout(), Duration::from_millis(500));
        assert!(config.watch_config().is_ok());
    }

    #[tokio::test]
    async fn test_zero_watch_retry_rejected() {
        let config = ClientConfig {
            watch_retry_min_ms: 0,
            ..Default::default()
        };
        assert!(matches!(config.watch_config(), Err(UserSvcError::Config(_))));

        let backend = Arc::new(MemoryBackend::new());
        let result = UserClient::new(backend, Arc::new(HttpTransport::new().unwrap()), &config).await;
        assert!(matches!(result, Err(UserSvcError::Config(_))));
    }

    #[tokio::test]
    async fn test_typed_operations() {
        let client = client().await;
        let ctx = CallContext::new();

        let created = client
            .create_user(
                &ctx,
                NewUser {
                    name: "bob".to_string(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(created.id, "id-bob");

        assert_eq!(client.get_user(&ctx, "42", "t").await.unwrap().name, "alice");
        assert_eq!(client.list_users(&ctx).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_business_error_and_wrong_variant() {
        let client = client().await;
        let ctx = CallContext::new();

        let err = client.get_user(&ctx, "7", "t").await.unwrap_err();
        assert!(matches!(err, UserSvcError::Service(ServiceError::NotFound)));

        let err = client
            .patch_user(&ctx, "42", User::default(), "t")
            .await
            .unwrap_err();
        assert!(matches!(err, UserSvcError::System(_)));
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let backend = Arc::new(MemoryBackend::new());
        let transport = Arc::new(HttpTransport::new().unwrap());

        let config = ClientConfig {
            max_attempts: 0,
            ..Default::default()
        };
        assert!(UserClient::new(backend.clone(), transport.clone(), &config).await.is_err());

        let config = ClientConfig {
            service: String::new(),
            ..Default::default()
        };
        let err = UserClient::new(backend, transport, &config).await.err().unwrap();
        assert!(matches!(err, UserSvcError::RegistryInvalidQuery(_)));
    }
}

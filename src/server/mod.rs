//! HTTP 服务端模块
//!
//! 绑定端口后向注册中心自注册，优雅关闭后注销

use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::auth::TokenService;
use crate::config::{Config, ServiceConfig};
use crate::discovery::backend::consul::ConsulBackend;
use crate::discovery::{RegistryBackend, ServiceRegistration};
use crate::error::Result;
use crate::service::{InMemoryUserService, LoggingMiddleware};
use crate::transport::{AppState, router};

/// 用户服务 HTTP 服务器
pub struct UserServer {
    listener: TcpListener,
    router: Router,
    registration: Option<(Arc<dyn RegistryBackend>, ServiceRegistration)>,
}

impl UserServer {
    /// 绑定地址（端口为 0 时由系统分配）
    pub async fn bind(addr: &str, state: AppState) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            router: router(state),
            registration: None,
        })
    }

    /// 按配置组装：内存服务 + 日志中间件 + JWT，注册中心启用时向 Consul 自注册
    pub async fn from_config(config: &Config) -> Result<Self> {
        let service = Arc::new(LoggingMiddleware::new(Arc::new(InMemoryUserService::new())));
        let tokens = Arc::new(TokenService::new(
            config.auth.secret.as_bytes(),
            config.auth.issuer.clone(),
            config.auth.ttl_secs,
        ));
        let addr = format!("{}:{}", config.server.address, config.server.port);
        let server = Self::bind(&addr, AppState::new(service, tokens)).await?;

        if !config.registry.enabled {
            return Ok(server);
        }
        let backend = Arc::new(ConsulBackend::new(
            config.registry.consul_url.clone(),
            Duration::from_secs(10),
        )?);
        let advertise = config
            .server
            .advertise_address
            .clone()
            .unwrap_or_else(|| config.server.address.clone());
        server.with_registration(backend, &config.service, &advertise)
    }

    /// 启用自注册，注册信息使用实际绑定的端口
    pub fn with_registration(
        mut self,
        backend: Arc<dyn RegistryBackend>,
        service: &ServiceConfig,
        advertise_address: &str,
    ) -> Result<Self> {
        let port = self.local_addr()?.port();
        let id = service
            .instance_id
            .clone()
            .unwrap_or_else(|| format!("{}-{}-{}", service.name, advertise_address, port));
        let registration = ServiceRegistration {
            id,
            name: service.name.clone(),
            address: advertise_address.to_string(),
            port,
            tags: service.tags.clone(),
            health_check_url: Some(format!("http://{}:{}/health", advertise_address, port)),
        };
        self.registration = Some((backend, registration));
        Ok(self)
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// 运行直到 `shutdown` 被取消
    pub async fn serve(self, shutdown: CancellationToken) -> Result<()> {
        let addr = self.local_addr()?;

        if let Some((backend, registration)) = &self.registration {
            backend.register(registration).await.inspect_err(|e| {
                error!(id = %registration.id, error = %e, "Failed to register service");
            })?;
            info!(
                id = %registration.id,
                service = %registration.name,
                tags = ?registration.tags,
                "Service registered"
            );
        }

        info!(%addr, "User service listening");
        let result = axum::serve(self.listener, self.router)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await;

        if let Some((backend, registration)) = &self.registration {
            match backend.deregister(&registration.id).await {
                Ok(()) => info!(id = %registration.id, "Service deregistered"),
                Err(e) => warn!(id = %registration.id, error = %e, "Failed to deregister service"),
            }
        }

        info!(%addr, "User service stopped");
        Ok(result?)
    }
}

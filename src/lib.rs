//! usersvc
//!
//! 用户 CRUD 服务，以及一个基于注册中心发现、负载均衡和重试的客户端。
//!
//! 客户端流水线：注册中心监听 → 实例集合 → 每实例端点 → 负载均衡 → 重试。

pub mod auth;
pub mod config;
pub mod context;
pub mod endpoint;
pub mod error;
pub mod types;

// 客户端流水线
pub mod balancer;
pub mod client;
pub mod discovery;
pub mod retry;

// 服务端
pub mod server;
pub mod service;
pub mod transport;

pub mod telemetry;

// Re-exports
pub use auth::{TokenClaims, TokenService};
pub use balancer::{Balancer, LoadBalanceStrategy, Random, RoundRobin};
pub use client::{ClientConfig, UserClient};
pub use config::{AuthConfig, Config, LogConfig, RegistryConfig, ServerConfig, ServiceConfig};
pub use context::CallContext;
pub use discovery::{
    EndpointFactory, Endpointer, HttpEndpointFactory, Instance, InstanceQuery, InstanceSet,
    RegistryBackend, RegistryWatcher, ServiceEntry, ServiceRegistration, WatchConfig,
};
pub use endpoint::{BoxEndpoint, Endpoint, Release};
pub use error::{ErrorBody, ErrorCategory, ErrorCode, Result, ServiceError, UserSvcError};
pub use retry::{Retry, RetryPolicy};
pub use server::UserServer;
pub use service::{InMemoryUserService, LoggingMiddleware, UserService};
pub use telemetry::init_tracing;
pub use transport::{AppState, HttpTransport, Transport};
pub use types::{CreatedUser, Method, NewUser, User, UserRequest, UserResponse};

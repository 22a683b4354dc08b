//! 服务发现模块
//!
//! 注册中心监听 → 实例集合 → 每个实例一个端点。后端可以是 Consul，也可以是进程内注册中心。

pub mod backend;
pub mod config;
pub mod endpointer;
pub mod factory;
pub mod instance;
pub mod watcher;

pub use backend::{RegistryBackend, RegistryUpdate, ServiceRegistration};
pub use config::{InstanceQuery, WatchConfig};
pub use endpointer::Endpointer;
pub use factory::{EndpointFactory, HttpEndpoint, HttpEndpointFactory, parse_target};
pub use instance::{Instance, InstanceSet, ServiceEntry};
pub use watcher::RegistryWatcher;

//! 用户服务
//!
//! 服务端业务逻辑，传输层只负责编解码

pub mod inmem;
pub mod logging;

use async_trait::async_trait;

use crate::error::ServiceError;
use crate::types::User;

pub use inmem::InMemoryUserService;
pub use logging::LoggingMiddleware;

/// 用户服务 trait
#[async_trait]
pub trait UserService: Send + Sync {
    /// 新增用户，ID 已存在时返回 `AlreadyExists`
    async fn post_user(&self, user: User) -> Result<(), ServiceError>;

    async fn get_user(&self, id: &str) -> Result<User, ServiceError>;

    /// 整体替换用户记录
    ///
    /// 请求体中的 ID 非空且与路径 ID 不同时返回 `InconsistentIds`
    async fn patch_user(&self, id: &str, user: User) -> Result<(), ServiceError>;

    async fn get_users(&self) -> Result<Vec<User>, ServiceError>;
}

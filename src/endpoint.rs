//! 可调用端点
//!
//! 一个端点绑定一个实例和一个逻辑方法，构建后不可变，可被多个调用方并发调用

use async_trait::async_trait;
use std::sync::Arc;

use crate::discovery::Instance;
use crate::error::Result;
use crate::types::{Method, UserRequest, UserResponse};

/// 可调用端点
#[async_trait]
pub trait Endpoint: Send + Sync {
    /// 端点所绑定的实例
    fn instance(&self) -> &Instance;

    /// 端点所绑定的逻辑方法
    fn method(&self) -> Method;

    /// 对该实例发起一次调用
    async fn call(&self, request: UserRequest) -> Result<UserResponse>;
}

/// 共享的端点对象
pub type BoxEndpoint = Arc<dyn Endpoint>;

/// 资源释放句柄，实例离开集合时执行一次
pub type Release = Box<dyn FnOnce() + Send + Sync>;

//! 传输层
//!
//! 客户端把通用请求编码为 HTTP 调用，服务端把 HTTP 路由解码回服务方法

pub mod http_client;
pub mod http_server;
pub mod wire;

use async_trait::async_trait;
use reqwest::Url;

use crate::error::Result;
use crate::types::{UserRequest, UserResponse};

pub use http_client::HttpTransport;
pub use http_server::{AppState, router};

/// 客户端传输抽象
///
/// 返回 `Err` 表示本次尝试失败（会被重试）；服务端的业务错误以
/// `UserResponse::Failed` 返回
#[async_trait]
pub trait Transport: Send + Sync {
    async fn invoke(&self, target: &Url, request: UserRequest) -> Result<UserResponse>;
}

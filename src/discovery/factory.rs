//! 端点工厂
//!
//! 把实例地址转换为绑定到某个逻辑方法的可调用端点

use async_trait::async_trait;
use reqwest::Url;
use std::sync::Arc;

use crate::discovery::Instance;
use crate::endpoint::{BoxEndpoint, Endpoint, Release};
use crate::error::{Result, UserSvcError};
use crate::transport::Transport;
use crate::types::{Method, UserRequest, UserResponse};

/// 端点工厂
///
/// 失败时 endpointer 跳过该实例，不影响其他实例
pub trait EndpointFactory: Send + Sync {
    fn make(&self, instance: &Instance) -> Result<(BoxEndpoint, Option<Release>)>;
}

impl<F> EndpointFactory for F
where
    F: Fn(&Instance) -> Result<(BoxEndpoint, Option<Release>)> + Send + Sync,
{
    fn make(&self, instance: &Instance) -> Result<(BoxEndpoint, Option<Release>)> {
        self(instance)
    }
}

/// 把实例地址解析为 HTTP 目标（缺少 scheme 时补 `http://`，去掉路径）
pub fn parse_target(instance: &Instance) -> Result<Url> {
    let raw = instance.as_str().trim();
    let with_scheme = if raw.starts_with("http") {
        raw.to_string()
    } else {
        format!("http://{}", raw)
    };

    let mut url = Url::parse(&with_scheme)
        .map_err(|e| UserSvcError::invalid_instance(instance.as_str(), e.to_string()))?;
    if url.host_str().is_none_or(str::is_empty) {
        return Err(UserSvcError::invalid_instance(instance.as_str(), "missing host"));
    }
    url.set_path("");
    url.set_query(None);
    Ok(url)
}

/// 通过 HTTP 传输层调用的端点
pub struct HttpEndpoint {
    instance: Instance,
    method: Method,
    target: Url,
    transport: Arc<dyn Transport>,
}

impl HttpEndpoint {
    pub fn target(&self) -> &Url {
        &self.target
    }
}

#[async_trait]
impl Endpoint for HttpEndpoint {
    fn instance(&self) -> &Instance {
        &self.instance
    }

    fn method(&self) -> Method {
        self.method
    }

    async fn call(&self, request: UserRequest) -> Result<UserResponse> {
        if request.method() != self.method {
            return Err(UserSvcError::system(format!(
                "endpoint for {} received {} request",
                self.method,
                request.method()
            )));
        }
        self.transport.invoke(&self.target, request).await
    }
}

/// HTTP 端点工厂
pub struct HttpEndpointFactory {
    transport: Arc<dyn Transport>,
    method: Method,
}

impl HttpEndpointFactory {
    pub fn new(transport: Arc<dyn Transport>, method: Method) -> Self {
        Self { transport, method }
    }
}

impl EndpointFactory for HttpEndpointFactory {
    fn make(&self, instance: &Instance) -> Result<(BoxEndpoint, Option<Release>)> {
        let target = parse_target(instance)?;
        let endpoint = HttpEndpoint {
            instance: instance.clone(),
            method: self.method,
            target,
            transport: self.transport.clone(),
        };
        // reqwest 的连接池由传输层共享，无需单独释放
        Ok((Arc::new(endpoint), None))
    }
}

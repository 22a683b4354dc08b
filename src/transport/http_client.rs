//! 基于 reqwest 的 HTTP 传输

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::{Client as HttpClient, Method as HttpMethod, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::trace;

use super::Transport;
use super::wire::{CreateUserResponse, GetUserResponse, ListUsersResponse, PatchUserResponse};
use crate::error::{ErrorBody, Result, ServiceError, UserSvcError};
use crate::types::{CreatedUser, UserRequest, UserResponse};

/// HTTP 传输，所有端点共享同一个连接池
#[derive(Clone)]
pub struct HttpTransport {
    client: HttpClient,
}

impl HttpTransport {
    pub fn new() -> Result<Self> {
        let client = HttpClient::builder()
            .connect_timeout(Duration::from_secs(2))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| UserSvcError::config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    pub fn with_client(client: HttpClient) -> Self {
        Self { client }
    }

    fn request(&self, method: HttpMethod, target: &Url, id: Option<&str>) -> Result<RequestBuilder> {
        let mut url = target.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| UserSvcError::invalid_instance(target.as_str(), "cannot be a base URL"))?;
            segments.clear().push("users");
            // 集合路由带结尾斜杠：/users/
            segments.push(id.unwrap_or(""));
        }
        Ok(self.client.request(method, url))
    }
}

fn bearer(builder: RequestBuilder, token: Option<&str>) -> RequestBuilder {
    match token {
        Some(token) if !token.is_empty() => builder.header(AUTHORIZATION, format!("Bearer {}", token)),
        _ => builder,
    }
}

/// 发送请求并按状态码分类
///
/// 成功时返回解码后的响应体；4xx 以业务错误返回 `Ok(Err(..))`
async fn send<T: DeserializeOwned>(
    target: &Url,
    builder: RequestBuilder,
) -> Result<std::result::Result<T, ServiceError>> {
    let instance = target.as_str().trim_end_matches('/');
    let resp = builder
        .send()
        .await
        .map_err(|e| UserSvcError::unreachable(instance, e.to_string()))?;

    let status = resp.status();
    let body = resp
        .bytes()
        .await
        .map_err(|e| UserSvcError::unreachable(instance, format!("failed to read body: {}", e)))?;
    trace!(instance, %status, len = body.len(), "HTTP response received");

    if status.is_server_error() {
        return Err(UserSvcError::unreachable(instance, format!("server returned {}", status)));
    }
    if status.is_client_error() {
        return Ok(Err(decode_error(status, &body)));
    }
    if !status.is_success() {
        return Err(UserSvcError::unreachable(instance, format!("unexpected status {}", status)));
    }

    let value = serde_json::from_slice(&body)
        .map_err(|e| UserSvcError::Serialization(format!("invalid response from {}: {}", instance, e)))?;
    Ok(Ok(value))
}

fn decode_error(status: StatusCode, body: &[u8]) -> ServiceError {
    let body = serde_json::from_slice::<ErrorBody>(body).unwrap_or_else(|_| ErrorBody {
        error: String::from_utf8_lossy(body).trim().to_string(),
        code: None,
    });
    ServiceError::from_body(status.as_u16(), body)
}

#[async_trait]
impl Transport for HttpTransport {
    async fn invoke(&self, target: &Url, request: UserRequest) -> Result<UserResponse> {
        let response = match request {
            UserRequest::Create(new_user) => {
                let builder = self.request(HttpMethod::POST, target, None)?.json(&new_user);
                send::<CreateUserResponse>(target, builder)
                    .await?
                    .map(|r| UserResponse::Created(CreatedUser { id: r.id, token: r.token }))
            }
            UserRequest::Get { id, token } => {
                let builder = bearer(self.request(HttpMethod::GET, target, Some(&id))?, token.as_deref());
                send::<GetUserResponse>(target, builder)
                    .await?
                    .map(|r| UserResponse::User(r.user))
            }
            UserRequest::Patch { id, user, token } => {
                let builder = bearer(self.request(HttpMethod::PATCH, target, Some(&id))?, token.as_deref())
                    .json(&user);
                send::<PatchUserResponse>(target, builder)
                    .await?
                    .map(|r| UserResponse::Patched { id: r.id })
            }
            UserRequest::List => {
                let builder = self.request(HttpMethod::GET, target, None)?;
                send::<ListUsersResponse>(target, builder)
                    .await?
                    .map(|r| UserResponse::Users(r.users))
            }
        };

        Ok(response.unwrap_or_else(UserResponse::Failed))
    }
}

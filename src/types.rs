//! 用户记录与通用请求/响应结构

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ServiceError;

/// 用户记录
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl User {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            email: email.into(),
            password: password.into(),
        }
    }
}

/// 创建用户的请求体（id 由服务端生成）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// 创建用户成功后的结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedUser {
    pub id: String,
    pub token: String,
}

/// 逻辑 RPC 方法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    CreateUser,
    GetUser,
    PatchUser,
    ListUsers,
}

impl Method {
    pub const ALL: [Method; 4] = [
        Method::CreateUser,
        Method::GetUser,
        Method::PatchUser,
        Method::ListUsers,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::CreateUser => "create_user",
            Method::GetUser => "get_user",
            Method::PatchUser => "patch_user",
            Method::ListUsers => "list_users",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 所有端点共享的通用请求结构
///
/// `token` 为可选的 Bearer 凭证，服务端对 get/patch 要求提供
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserRequest {
    Create(NewUser),
    Get {
        id: String,
        token: Option<String>,
    },
    Patch {
        id: String,
        user: User,
        token: Option<String>,
    },
    List,
}

impl UserRequest {
    /// 请求对应的逻辑方法
    pub fn method(&self) -> Method {
        match self {
            UserRequest::Create(_) => Method::CreateUser,
            UserRequest::Get { .. } => Method::GetUser,
            UserRequest::Patch { .. } => Method::PatchUser,
            UserRequest::List => Method::ListUsers,
        }
    }
}

/// 所有端点共享的通用响应结构
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserResponse {
    Created(CreatedUser),
    User(User),
    Patched { id: String },
    Users(Vec<User>),
    /// 服务端返回的业务错误（不触发重试）
    Failed(ServiceError),
}

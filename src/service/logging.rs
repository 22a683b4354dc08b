//! 日志中间件

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use super::UserService;
use crate::error::ServiceError;
use crate::types::User;

/// 为每次服务调用记录方法名、ID、耗时和错误
pub struct LoggingMiddleware {
    next: Arc<dyn UserService>,
}

impl LoggingMiddleware {
    pub fn new(next: Arc<dyn UserService>) -> Self {
        Self { next }
    }
}

fn log_call<T>(method: &str, id: Option<&str>, begin: Instant, result: &Result<T, ServiceError>) {
    let took = begin.elapsed();
    match result {
        Ok(_) => info!(method, id = id.unwrap_or(""), took = ?took, "service call"),
        Err(err) => warn!(method, id = id.unwrap_or(""), took = ?took, err = %err, "service call failed"),
    }
}

#[async_trait]
impl UserService for LoggingMiddleware {
    async fn post_user(&self, user: User) -> Result<(), ServiceError> {
        let begin = Instant::now();
        let id = user.id.clone();
        let result = self.next.post_user(user).await;
        log_call("post_user", Some(&id), begin, &result);
        result
    }

    async fn get_user(&self, id: &str) -> Result<User, ServiceError> {
        let begin = Instant::now();
        let result = self.next.get_user(id).await;
        log_call("get_user", Some(id), begin, &result);
        result
    }

    async fn patch_user(&self, id: &str, user: User) -> Result<(), ServiceError> {
        let begin = Instant::now();
        let result = self.next.patch_user(id, user).await;
        log_call("patch_user", Some(id), begin, &result);
        result
    }

    async fn get_users(&self) -> Result<Vec<User>, ServiceError> {
        let begin = Instant::now();
        let result = self.next.get_users().await;
        log_call("get_users", None, begin, &result);
        result
    }
}

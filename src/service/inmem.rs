//! 内存实现

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::UserService;
use crate::error::ServiceError;
use crate::types::User;

/// 基于内存的用户服务
#[derive(Default)]
pub struct InMemoryUserService {
    users: RwLock<HashMap<String, User>>,
}

impl InMemoryUserService {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserService for InMemoryUserService {
    async fn post_user(&self, user: User) -> Result<(), ServiceError> {
        let mut users = self.users.write().await;
        if users.contains_key(&user.id) {
            return Err(ServiceError::AlreadyExists);
        }
        users.insert(user.id.clone(), user);
        Ok(())
    }

    async fn get_user(&self, id: &str) -> Result<User, ServiceError> {
        self.users
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or(ServiceError::NotFound)
    }

    async fn patch_user(&self, id: &str, user: User) -> Result<(), ServiceError> {
        if !user.id.is_empty() && user.id != id {
            return Err(ServiceError::InconsistentIds);
        }

        let mut users = self.users.write().await;
        match users.get_mut(id) {
            Some(existing) => {
                *existing = user;
                Ok(())
            }
            None => Err(ServiceError::NotFound),
        }
    }

    async fn get_users(&self) -> Result<Vec<User>, ServiceError> {
        let mut users: Vec<User> = self.users.read().await.values().cloned().collect();
        users.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(users)
    }
}

//! 随机

use rand::Rng;
use std::sync::Arc;

use super::Balancer;
use crate::discovery::Endpointer;
use crate::endpoint::BoxEndpoint;
use crate::error::{Result, UserSvcError};

/// 随机负载均衡器
pub struct Random {
    endpointer: Arc<Endpointer>,
}

impl Random {
    pub fn new(endpointer: Arc<Endpointer>) -> Self {
        Self { endpointer }
    }
}

impl Balancer for Random {
    fn endpoint(&self) -> Result<BoxEndpoint> {
        let endpoints = self.endpointer.endpoints();
        if endpoints.is_empty() {
            return Err(UserSvcError::NoEndpointsAvailable);
        }
        let index = rand::thread_rng().gen_range(0..endpoints.len());
        Ok(endpoints[index].clone())
    }
}

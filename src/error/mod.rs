//! usersvc 错误处理模块
//!
//! 提供统一的错误类型、错误代码分类以及线上传输的业务错误

pub mod code;
pub mod service;
pub mod usersvc_error;

// 重新导出公共类型
pub use code::{ErrorCategory, ErrorCode};
pub use service::{ErrorBody, ServiceError};
pub use usersvc_error::{Result, UserSvcError};

//! 安全防护模块
//!
//! - **rate_limit**: 验证码发送频率限制

pub mod rate_limit;

pub use rate_limit::{IssuanceLimiter, RateLimitConfig, RateLimitInfo};

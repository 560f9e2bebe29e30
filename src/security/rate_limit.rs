//! 发送频率限制模块
//!
//! 按身份统计滚动窗口内的验证码发送次数，超过上限即拒绝。
//! 计数来自当前生效的存储后端，因此持久存储与降级存储切换后限流依然有效。
//!
//! ## 示例
//!
//! ```rust
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! use otpgate::security::rate_limit::{IssuanceLimiter, RateLimitConfig};
//! use otpgate::storage::FallbackBackend;
//! use otpgate::OpContext;
//! use std::sync::Arc;
//!
//! let limiter = IssuanceLimiter::new(
//!     RateLimitConfig::for_email_verification(),
//!     Arc::new(FallbackBackend::in_memory()),
//! );
//!
//! let info = limiter.allow(&OpContext::background(), "user@example.com").await.unwrap();
//! assert_eq!(info.remaining, 5);
//! # });
//! ```

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::context::OpContext;
use crate::error::{ConfigError, Error, Result};
use crate::storage::OtpBackend;

/// 发送频率限制配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// 窗口内允许的最大发送次数
    pub max_issuances: u32,

    /// 滚动窗口大小
    #[serde(with = "crate::config_serde::seconds")]
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::for_email_verification()
    }
}

impl RateLimitConfig {
    /// 创建新的配置
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置最大发送次数
    pub fn with_max_issuances(mut self, max: u32) -> Self {
        self.max_issuances = max;
        self
    }

    /// 设置窗口
    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// 邮箱验证场景
    ///
    /// 每 24 小时最多 5 次
    pub fn for_email_verification() -> Self {
        Self {
            max_issuances: 5,
            window: Duration::from_secs(24 * 60 * 60),
        }
    }

    /// 校验配置
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.window.is_zero() {
            return Err(ConfigError::invalid("rate_limit.window", "must be non-zero"));
        }
        Ok(())
    }
}

/// 限流检查结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitInfo {
    /// 本次发送前的剩余次数
    pub remaining: u32,
    /// 总限制次数
    pub limit: u32,
    /// 窗口大小
    pub window: Duration,
}

/// 发送频率限制器
///
/// 只读取计数，不做记录：发送记录由存储后端在写入验证码时追加，
/// 因此被拒绝的请求不会产生任何副作用。
pub struct IssuanceLimiter {
    config: RateLimitConfig,
    backend: Arc<dyn OtpBackend>,
}

impl IssuanceLimiter {
    /// 创建限制器
    pub fn new(config: RateLimitConfig, backend: Arc<dyn OtpBackend>) -> Self {
        Self { config, backend }
    }

    /// 检查该身份是否还可以发送
    ///
    /// # Errors
    ///
    /// - [`Error::RateLimited`]: 窗口内发送次数已达上限
    /// - 计数查询失败时原样返回存储错误，绝不放行
    pub async fn allow(&self, ctx: &OpContext, identity: &str) -> Result<RateLimitInfo> {
        let info = self.status(ctx, identity).await?;
        if info.remaining == 0 {
            debug!(identity, limit = info.limit, "otp issuance rate limited");
            return Err(Error::rate_limited(self.config.window));
        }
        Ok(info)
    }

    /// 当前状态
    pub async fn status(&self, ctx: &OpContext, identity: &str) -> Result<RateLimitInfo> {
        let count = self
            .backend
            .count_since(ctx, identity, self.config.window)
            .await?;
        Ok(RateLimitInfo {
            remaining: self.config.max_issuances.saturating_sub(count),
            limit: self.config.max_issuances,
            window: self.config.window,
        })
    }

    /// 获取配置
    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }
}

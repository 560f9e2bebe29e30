//! 验证码存储模块
//!
//! 定义验证码记录与存储后端接口，并提供两种实现：
//!
//! - **持久存储** ([`durable::SqliteBackend`]): 基于关系型数据库
//! - **降级存储** ([`fallback::FallbackBackend`]): 基于进程内键值存储
//!
//! [`selector::BackendSelector`] 负责在两者之间做一次性探测与永久切换。
//!
//! ## 发送计数
//!
//! 发送次数独立于记录是否存活：验证成功或过期删除记录后，
//! 该次发送仍计入滚动窗口。

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::context::OpContext;
use crate::error::{ConfigError, Result};

#[cfg(feature = "sqlite")]
pub mod durable;
pub mod fallback;
pub mod selector;

#[cfg(feature = "sqlite")]
pub use durable::SqliteBackend;
pub use fallback::{FallbackBackend, InMemoryKeyValueStore, KeyValueStore};
pub use selector::{ActiveBackend, BackendSelector, SelectorState};

// ============================================================================
// 数据结构
// ============================================================================

/// 验证码记录
///
/// 记录不可变：重新发送时整体替换，而不是原地更新。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtpRecord {
    /// 关联的身份（通常是邮箱，区分大小写）
    pub identity: String,

    /// 验证码
    pub code: String,

    /// 发送时间
    pub issued_at: DateTime<Utc>,

    /// 过期时间
    pub expires_at: DateTime<Utc>,
}

impl OtpRecord {
    /// 以 `issued_at + ttl` 为过期时间创建记录
    pub fn new(
        identity: impl Into<String>,
        code: impl Into<String>,
        issued_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<Self> {
        Ok(Self {
            identity: identity.into(),
            code: code.into(),
            issued_at,
            expires_at: issued_at + to_chrono(ttl, "ttl")?,
        })
    }

    /// 在 `now` 时刻是否已过期
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// 当前是否已过期
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

pub(crate) fn to_chrono(duration: Duration, key: &str) -> Result<chrono::Duration> {
    chrono::Duration::from_std(duration)
        .map_err(|e| ConfigError::invalid(key, e.to_string()).into())
}

// ============================================================================
// 存储接口
// ============================================================================

/// 验证码存储后端接口
///
/// 持久存储与降级存储以相同的语义实现此 trait。
///
/// 实现方需遵守传入的 [`OpContext`]：写操作（`put`、`delete`、`take`、
/// `cleanup_expired`）要么在上下文失效时不执行，要么执行完毕后如实返回结果。
#[async_trait]
pub trait OtpBackend: Send + Sync {
    /// 后端名称，用于日志
    fn name(&self) -> &'static str;

    /// 删除该身份已有的记录，然后保存新记录并记一次发送
    async fn put(&self, ctx: &OpContext, identity: &str, code: &str, ttl: Duration) -> Result<()>;

    /// 读取该身份当前的记录（不做过期判断）
    async fn get(&self, ctx: &OpContext, identity: &str) -> Result<Option<OtpRecord>>;

    /// 删除该身份的记录；记录不存在不是错误
    async fn delete(&self, ctx: &OpContext, identity: &str) -> Result<()>;

    /// 原子地删除并返回该身份的记录
    ///
    /// 并发调用时至多一个调用方能拿到记录。
    async fn take(&self, ctx: &OpContext, identity: &str) -> Result<Option<OtpRecord>>;

    /// 最近 `window` 内该身份的发送次数
    async fn count_since(&self, ctx: &OpContext, identity: &str, window: Duration)
    -> Result<u32>;

    /// 一次轻量读取，用于确认后端可用
    async fn probe(&self, ctx: &OpContext) -> Result<()>;

    /// 清理过期记录，返回删除数量
    async fn cleanup_expired(&self, ctx: &OpContext) -> Result<usize>;

    /// 后端自身维护的计数窗口；按查询窗口精确计数的后端返回 `None`
    fn counter_window(&self) -> Option<Duration> {
        None
    }
}

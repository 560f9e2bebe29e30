//! # otpgate
//!
//! 邮箱一次性验证码 (OTP) 的发送与验证库，用于注册时的邮箱确认与找回登录。
//!
//! ## 功能特性
//!
//! - **验证码生成**: 使用操作系统 CSPRNG 生成定长数字验证码
//! - **一次性验证**: 记录在比较前被原子取出，成功或失败都会失效
//! - **过期处理**: 读取时惰性检测过期，不依赖后台清理
//! - **发送限流**: 按身份统计 24 小时滚动窗口内的发送次数
//! - **双后端存储**: 持久存储（SQLite）表结构缺失时永久切换到进程内存储
//! - **取消与超时**: 所有存储调用都受 [`OpContext`] 约束
//!
//! ## Features
//!
//! - `sqlite` - 启用基于 SQLite 的持久存储（默认启用）
//! - `full` - 启用所有功能
//!
//! ## 示例
//!
#![cfg_attr(feature = "sqlite", doc = "```rust")]
#![cfg_attr(not(feature = "sqlite"), doc = "```rust,ignore")]
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! use otpgate::{OtpConfig, OtpManager, SqliteBackend};
//! use std::sync::Arc;
//!
//! let durable = SqliteBackend::open_in_memory().unwrap();
//! durable.migrate().await.unwrap();
//!
//! let manager = OtpManager::builder()
//!     .config(OtpConfig::default())
//!     .durable(Arc::new(durable))
//!     .build()
//!     .unwrap();
//!
//! manager.request_code("user@example.com").await.unwrap();
//! # });
//! ```

pub mod context;
pub mod error;
pub mod passwordless;
pub mod random;
pub mod security;
pub mod storage;

mod config_serde;

pub use context::OpContext;
pub use error::{Error, Result};

// ============================================================================
// 验证码相关导出
// ============================================================================

pub use passwordless::{
    CodeTransport, OtpConfig, OtpIssued, OtpManager, OtpManagerBuilder, TracingTransport,
};
pub use random::{CodeGenerator, OsCodeGenerator, generate_numeric_code};

// ============================================================================
// 存储相关导出
// ============================================================================

#[cfg(feature = "sqlite")]
pub use storage::SqliteBackend;
pub use storage::{
    ActiveBackend, BackendSelector, FallbackBackend, InMemoryKeyValueStore, KeyValueStore,
    OtpBackend, OtpRecord, SelectorState,
};

// ============================================================================
// 限流相关导出
// ============================================================================

pub use security::rate_limit::{IssuanceLimiter, RateLimitConfig, RateLimitInfo};

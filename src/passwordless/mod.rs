//! 无密码认证模块
//!
//! 提供邮箱一次性验证码 (OTP) 的发送与验证，用于注册时的邮箱确认与找回登录。
//!
//! ## 设计原则
//!
//! 本模块只负责验证码的生成、存储、限流与验证，**不包含**实际的邮件发送功能。
//! 投递由应用层实现 [`CodeTransport`] 完成。
//!
//! ## 示例
//!
//! ```rust
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! use otpgate::passwordless::{OtpConfig, OtpManager};
//!
//! let manager = OtpManager::in_memory(OtpConfig::default()).unwrap();
//!
//! // 发送验证码
//! let issued = manager.request_code("user@example.com").await.unwrap();
//! println!("有效期至: {}", issued.expires_at);
//!
//! // 用户输入验证码后验证
//! match manager.confirm_code("user@example.com", "123456").await {
//!     Ok(()) => println!("验证成功"),
//!     Err(e) => println!("验证失败: {}", e),
//! }
//! # });
//! ```
//!
//! ## 安全考虑
//!
//! - 验证码使用操作系统 CSPRNG 生成
//! - 验证使用常量时间比较，防止时序攻击
//! - 验证码一次性使用，错误尝试同样使其失效
//! - 发送次数按 24 小时滚动窗口限流，计数不受记录删除影响

mod locks;
pub mod otp;

pub use locks::{IdentityGuard, IdentityLocks};
pub use otp::{
    CodeTransport, OtpConfig, OtpIssued, OtpManager, OtpManagerBuilder, TracingTransport,
};

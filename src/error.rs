//! 统一错误类型模块
//!
//! 提供 otpgate 中所有操作的错误类型定义。错误分类与调用方 API 一一对应：
//!
//! - `request_code`: [`Error::RateLimited`]、[`Error::Transport`]、[`Error::Storage`]
//! - `confirm_code`: [`Error::NoPendingCode`]、[`Error::Expired`]、[`Error::Mismatch`]

use std::time::Duration;

use thiserror::Error;

/// otpgate 的统一结果类型
pub type Result<T> = std::result::Result<T, Error>;

/// otpgate 的错误类型
#[derive(Debug, Error)]
pub enum Error {
    /// 发送次数超出配额
    #[error("rate limit exceeded, retry after {retry_after:?}")]
    RateLimited {
        /// 重试等待时间
        retry_after: Duration,
    },

    /// 验证码已存储，但投递失败
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// 存储错误
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// 没有待验证的验证码（已消费、已过期清理或从未发送）
    #[error("no pending code for this identity")]
    NoPendingCode,

    /// 验证码已过期
    #[error("code has expired")]
    Expired,

    /// 验证码不匹配
    #[error("code does not match")]
    Mismatch,

    /// 配置错误
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 加密错误
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// 操作被取消
    #[error("operation cancelled")]
    Cancelled,

    /// 操作超过截止时间
    #[error("operation deadline exceeded")]
    DeadlineExceeded,

    /// 内部错误
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// 创建一个内部错误
    pub fn internal(msg: impl Into<String>) -> Self {
        Error::Internal(msg.into())
    }

    /// 创建一个速率限制错误
    pub fn rate_limited(retry_after: Duration) -> Self {
        Error::RateLimited { retry_after }
    }

    /// 创建一个存储操作错误
    pub fn storage(msg: impl Into<String>) -> Self {
        Error::Storage(StorageError::OperationFailed(msg.into()))
    }

    /// 创建一个投递错误
    pub fn transport(msg: impl Into<String>) -> Self {
        Error::Transport(TransportError::DeliveryFailed(msg.into()))
    }

    /// 是否为"表结构不存在"类存储错误
    ///
    /// 只有这一类错误会触发持久存储到降级存储的永久切换。
    pub fn is_schema_missing(&self) -> bool {
        matches!(self, Error::Storage(StorageError::SchemaMissing(_)))
    }

    /// 是否应作为 `StorageFailure` 呈现给调用方
    ///
    /// 取消与超时均属于存储 I/O 未完成，归入此类。
    pub fn is_storage_failure(&self) -> bool {
        matches!(
            self,
            Error::Storage(_) | Error::Cancelled | Error::DeadlineExceeded
        )
    }

    /// 是否为面向最终用户的错误（需要提示重新发送或稍后重试）
    pub fn is_user_visible(&self) -> bool {
        matches!(
            self,
            Error::RateLimited { .. } | Error::NoPendingCode | Error::Expired | Error::Mismatch
        )
    }
}

/// 存储相关错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// 表结构/关系不存在
    #[error("schema missing: {0}")]
    SchemaMissing(String),
    /// 连接失败
    #[error("storage connection failed: {0}")]
    ConnectionFailed(String),
    /// 操作失败
    #[error("storage operation failed: {0}")]
    OperationFailed(String),
    /// 存储值无法解析
    #[error("corrupted value under key '{0}'")]
    Corrupted(String),
}

/// 投递相关错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// 投递失败
    #[error("delivery failed: {0}")]
    DeliveryFailed(String),
    /// 收件人被拒绝
    #[error("recipient rejected: {0}")]
    RecipientRejected(String),
}

/// 配置相关错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// 无效的配置值
    #[error("invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },
}

impl ConfigError {
    pub(crate) fn invalid(key: &str, message: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            key: key.to_string(),
            message: message.into(),
        }
    }
}

/// 加密相关错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// 随机数生成失败
    #[error("random number generation failed: {0}")]
    RngFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Storage(StorageError::SchemaMissing("no such table: otp_codes".into()));
        assert_eq!(
            err.to_string(),
            "storage error: schema missing: no such table: otp_codes"
        );
        assert_eq!(Error::NoPendingCode.to_string(), "no pending code for this identity");
    }

    #[test]
    fn test_schema_missing_predicate() {
        assert!(Error::Storage(StorageError::SchemaMissing("x".into())).is_schema_missing());
        assert!(!Error::storage("disk full").is_schema_missing());
        assert!(!Error::Cancelled.is_schema_missing());
    }

    #[test]
    fn test_storage_failure_classification() {
        assert!(Error::storage("io").is_storage_failure());
        assert!(Error::DeadlineExceeded.is_storage_failure());
        assert!(Error::Cancelled.is_storage_failure());
        assert!(!Error::transport("smtp down").is_storage_failure());
        assert!(!Error::Mismatch.is_storage_failure());
    }

    #[test]
    fn test_user_visible() {
        assert!(Error::rate_limited(Duration::from_secs(1)).is_user_visible());
        assert!(Error::Expired.is_user_visible());
        assert!(!Error::internal("boom").is_user_visible());
    }

    #[test]
    fn test_from_transport_error() {
        let err: Error = TransportError::RecipientRejected("a@x.com".into()).into();
        assert!(matches!(err, Error::Transport(_)));
    }
}

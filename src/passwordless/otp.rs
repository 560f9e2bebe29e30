//! 邮箱验证码（OTP）实现
//!
//! 服务端生成随机数字验证码，交由投递通道发送给用户，用户提交后校验。
//!
//! ## 状态机
//!
//! ```text
//! NoCode --request--> Pending --confirm--> Verified | Mismatch | Expired --> NoCode
//!                        ^  |
//!                        +--+ request（替换旧验证码）
//! ```
//!
//! - 同一身份任意时刻至多一条有效记录
//! - 记录只能验证一次：无论成功还是失败，验证后即删除
//! - 过期记录在读取时删除并报告过期
//!
//! ## 示例
//!
//! ```rust
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! use otpgate::passwordless::{OtpConfig, OtpManager};
//! use otpgate::Error;
//!
//! let manager = OtpManager::in_memory(OtpConfig::default()).unwrap();
//!
//! // 发送验证码（默认投递通道只记录日志）
//! manager.request_code("user@example.com").await.unwrap();
//!
//! // 错误的验证码会消耗掉记录
//! let err = manager.confirm_code("user@example.com", "not-it").await.unwrap_err();
//! assert!(matches!(err, Error::Mismatch));
//! # });
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::locks::{IdentityGuard, IdentityLocks};
use crate::context::OpContext;
use crate::error::{ConfigError, Error, Result, TransportError};
use crate::random::{CodeGenerator, OsCodeGenerator, constant_time_compare_str};
use crate::security::rate_limit::{IssuanceLimiter, RateLimitConfig};
use crate::storage::{
    ActiveBackend, BackendSelector, FallbackBackend, OtpBackend, SelectorState, to_chrono,
};

// ============================================================================
// 配置
// ============================================================================

/// OTP 配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtpConfig {
    /// 验证码长度（数字位数）
    pub code_length: usize,

    /// 验证码有效期
    #[serde(with = "crate::config_serde::seconds")]
    pub ttl: Duration,

    /// 调用方未指定截止时间时，单次操作的存储超时
    #[serde(with = "crate::config_serde::seconds")]
    pub io_timeout: Duration,

    /// 发送频率限制
    pub rate_limit: RateLimitConfig,
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            code_length: 6,
            ttl: Duration::from_secs(10 * 60),
            io_timeout: Duration::from_secs(5),
            rate_limit: RateLimitConfig::for_email_verification(),
        }
    }
}

impl OtpConfig {
    /// 创建新配置
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置验证码长度
    pub fn with_code_length(mut self, length: usize) -> Self {
        self.code_length = length;
        self
    }

    /// 设置有效期
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// 设置存储超时
    pub fn with_io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = timeout;
        self
    }

    /// 设置发送频率限制
    pub fn with_rate_limit(mut self, rate_limit: RateLimitConfig) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    /// 高安全性配置
    ///
    /// - 8 位验证码
    /// - 5 分钟过期
    /// - 每 24 小时最多 3 次
    pub fn high_security() -> Self {
        Self {
            code_length: 8,
            ttl: Duration::from_secs(5 * 60),
            rate_limit: RateLimitConfig::for_email_verification().with_max_issuances(3),
            ..Self::default()
        }
    }

    /// 宽松配置（适用于开发/测试）
    ///
    /// - 4 位验证码
    /// - 30 分钟过期
    /// - 每小时最多 20 次
    pub fn relaxed() -> Self {
        Self {
            code_length: 4,
            ttl: Duration::from_secs(30 * 60),
            rate_limit: RateLimitConfig::new()
                .with_max_issuances(20)
                .with_window(Duration::from_secs(60 * 60)),
            ..Self::default()
        }
    }

    /// 校验配置
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if !(4..=10).contains(&self.code_length) {
            return Err(ConfigError::invalid(
                "code_length",
                "must be between 4 and 10",
            ));
        }
        if self.ttl.is_zero() {
            return Err(ConfigError::invalid("ttl", "must be non-zero"));
        }
        if self.io_timeout.is_zero() {
            return Err(ConfigError::invalid("io_timeout", "must be non-zero"));
        }
        self.rate_limit.validate()
    }
}

// ============================================================================
// 投递通道
// ============================================================================

/// 验证码投递通道（邮件、短信等）
///
/// 由应用层实现；本库不重试投递失败。
#[async_trait]
pub trait CodeTransport: Send + Sync {
    /// 将验证码投递给 `identity`
    async fn deliver(&self, identity: &str, code: &str) -> std::result::Result<(), TransportError>;
}

/// 只记录日志的投递通道
///
/// 不会输出验证码本身，仅用于开发环境占位。
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTransport;

#[async_trait]
impl CodeTransport for TracingTransport {
    async fn deliver(&self, identity: &str, code: &str) -> std::result::Result<(), TransportError> {
        info!(identity, digits = code.len(), "otp delivery requested");
        Ok(())
    }
}

// ============================================================================
// 数据结构
// ============================================================================

/// 发送成功的回执
///
/// 不包含验证码本身。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtpIssued {
    /// 关联的身份
    pub identity: String,

    /// 过期时间
    pub expires_at: DateTime<Utc>,

    /// 窗口内剩余发送次数
    pub remaining_issuances: u32,

    /// 写入的后端
    pub backend: ActiveBackend,
}

impl OtpIssued {
    /// 获取剩余有效时间（秒）
    pub fn remaining_seconds(&self) -> i64 {
        let remaining = self.expires_at - Utc::now();
        remaining.num_seconds().max(0)
    }
}

// ============================================================================
// OTP 管理器
// ============================================================================

/// OTP 管理器
///
/// 负责发送与验证一次性验证码。可通过 `Arc` 在多个请求间共享。
pub struct OtpManager {
    config: OtpConfig,
    storage: Arc<BackendSelector>,
    limiter: IssuanceLimiter,
    generator: Arc<dyn CodeGenerator>,
    transport: Arc<dyn CodeTransport>,
    locks: IdentityLocks,
}

impl OtpManager {
    /// 创建构建器
    pub fn builder() -> OtpManagerBuilder {
        OtpManagerBuilder::default()
    }

    /// 仅使用进程内存储创建管理器
    pub fn in_memory(config: OtpConfig) -> Result<Self> {
        Self::builder().config(config).build()
    }

    fn scoped(&self, ctx: &OpContext) -> OpContext {
        match ctx.deadline() {
            Some(_) => ctx.clone(),
            None => ctx.clone().with_timeout(self.config.io_timeout),
        }
    }

    /// 在上下文约束下等待身份锁
    async fn lock(&self, ctx: &OpContext, identity: &str) -> Result<IdentityGuard<'_>> {
        ctx.run(async { Ok(self.locks.acquire(identity).await) })
            .await
    }

    /// 为身份发送验证码
    ///
    /// # Errors
    ///
    /// - [`Error::RateLimited`]: 窗口内发送次数已达上限，且未产生任何副作用
    /// - [`Error::Transport`]: 验证码已保存但投递失败，在有效期内仍可使用
    /// - 存储错误（含超时与取消），见 [`Error::is_storage_failure`]
    ///
    /// 身份锁在写入完成后即释放，投递期间同一身份的验证不会被阻塞。
    /// 投递不受默认存储超时约束，只受调用方上下文的截止时间与取消约束。
    pub async fn request_code(&self, identity: &str) -> Result<OtpIssued> {
        self.request_code_with(&OpContext::background(), identity)
            .await
    }

    /// 在指定上下文中发送验证码
    pub async fn request_code_with(&self, ctx: &OpContext, identity: &str) -> Result<OtpIssued> {
        let scoped = self.scoped(ctx);
        let guard = self.lock(&scoped, identity).await?;

        let info = self.limiter.allow(&scoped, identity).await?;

        let code = self.generator.generate(self.config.code_length)?;
        let backend = self.storage.resolve(&scoped).await?;
        self.storage
            .put(&scoped, identity, &code, self.config.ttl)
            .await?;
        let expires_at = Utc::now() + to_chrono(self.config.ttl, "ttl")?;
        // 写入过程中可能发生切换
        let backend = self.storage.state().active().unwrap_or(backend);
        drop(guard);

        let delivered = ctx
            .run(async { Ok(self.transport.deliver(identity, &code).await) })
            .await
            .unwrap_or_else(|e| Err(TransportError::DeliveryFailed(format!("interrupted: {e}"))));
        if let Err(e) = delivered {
            warn!(identity, error = %e, "otp stored but delivery failed");
            return Err(Error::Transport(e));
        }

        info!(identity, %backend, "otp issued");
        Ok(OtpIssued {
            identity: identity.to_string(),
            expires_at,
            remaining_issuances: info.remaining.saturating_sub(1),
            backend,
        })
    }

    /// 验证身份提交的验证码
    ///
    /// 记录在比较之前就被原子地取出删除，因此同一验证码至多验证成功一次，
    /// 错误的验证码同样会使记录失效。
    ///
    /// # Errors
    ///
    /// - [`Error::NoPendingCode`]: 没有待验证的验证码
    /// - [`Error::Expired`]: 验证码已过期（记录已删除）
    /// - [`Error::Mismatch`]: 验证码不匹配（记录已删除）
    pub async fn confirm_code(&self, identity: &str, code: &str) -> Result<()> {
        self.confirm_code_with(&OpContext::background(), identity, code)
            .await
    }

    /// 在指定上下文中验证验证码
    pub async fn confirm_code_with(
        &self,
        ctx: &OpContext,
        identity: &str,
        code: &str,
    ) -> Result<()> {
        let ctx = self.scoped(ctx);
        let _guard = self.lock(&ctx, identity).await?;

        let Some(record) = self.storage.take(&ctx, identity).await? else {
            debug!(identity, "no pending otp");
            return Err(Error::NoPendingCode);
        };

        if record.is_expired() {
            debug!(identity, "otp expired");
            return Err(Error::Expired);
        }

        if !constant_time_compare_str(code, &record.code) {
            debug!(identity, "otp mismatch");
            return Err(Error::Mismatch);
        }

        info!(identity, "otp verified");
        Ok(())
    }

    /// 撤销该身份待验证的验证码
    pub async fn revoke(&self, identity: &str) -> Result<()> {
        let ctx = self.scoped(&OpContext::background());
        let _guard = self.lock(&ctx, identity).await?;
        self.storage.delete(&ctx, identity).await
    }

    /// 清理过期记录
    ///
    /// 仅用于存储整洁，正确性不依赖于此。
    pub async fn cleanup(&self) -> Result<usize> {
        let ctx = self.scoped(&OpContext::background());
        let removed = self.storage.cleanup_expired(&ctx).await?;
        if removed > 0 {
            debug!(removed, "removed expired otp records");
        }
        Ok(removed)
    }

    /// 当前生效的存储后端
    pub async fn backend(&self) -> Result<ActiveBackend> {
        self.storage.resolve(&self.scoped(&OpContext::background())).await
    }

    /// 后端选择器
    pub fn storage(&self) -> &Arc<BackendSelector> {
        &self.storage
    }

    /// 获取配置
    pub fn config(&self) -> &OtpConfig {
        &self.config
    }
}

// ============================================================================
// 构建器
// ============================================================================

/// [`OtpManager`] 构建器
#[derive(Default)]
pub struct OtpManagerBuilder {
    config: Option<OtpConfig>,
    durable: Option<Arc<dyn OtpBackend>>,
    fallback: Option<Arc<dyn OtpBackend>>,
    state: Option<Arc<SelectorState>>,
    generator: Option<Arc<dyn CodeGenerator>>,
    transport: Option<Arc<dyn CodeTransport>>,
}

impl OtpManagerBuilder {
    /// 设置配置
    pub fn config(mut self, config: OtpConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// 设置持久存储
    pub fn durable(mut self, backend: Arc<dyn OtpBackend>) -> Self {
        self.durable = Some(backend);
        self
    }

    /// 设置降级存储（默认为进程内存储）
    pub fn fallback(mut self, backend: Arc<dyn OtpBackend>) -> Self {
        self.fallback = Some(backend);
        self
    }

    /// 共享选择器状态
    pub fn selector_state(mut self, state: Arc<SelectorState>) -> Self {
        self.state = Some(state);
        self
    }

    /// 设置验证码生成器
    pub fn generator(mut self, generator: Arc<dyn CodeGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// 设置投递通道（默认为 [`TracingTransport`]）
    pub fn transport(mut self, transport: Arc<dyn CodeTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// 构建管理器
    pub fn build(self) -> Result<OtpManager> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let fallback = self.fallback.unwrap_or_else(|| {
            Arc::new(
                FallbackBackend::in_memory().with_counter_window(config.rate_limit.window),
            )
        });

        // 自行维护计数窗口的后端必须与限流窗口一致，否则计数会失真
        for backend in self.durable.iter().chain(Some(&fallback)) {
            if let Some(window) = backend.counter_window()
                && window != config.rate_limit.window
            {
                return Err(ConfigError::invalid(
                    "rate_limit.window",
                    format!(
                        "{} backend counts issuances over {:?}, limiter uses {:?}",
                        backend.name(),
                        window,
                        config.rate_limit.window
                    ),
                )
                .into());
            }
        }

        let storage = Arc::new(match self.durable {
            Some(durable) => BackendSelector::new(
                durable,
                fallback,
                self.state.unwrap_or_default(),
            ),
            None => BackendSelector::fallback_only(fallback),
        });

        Ok(OtpManager {
            limiter: IssuanceLimiter::new(config.rate_limit.clone(), storage.clone()),
            storage,
            generator: self
                .generator
                .unwrap_or_else(|| Arc::new(OsCodeGenerator)),
            transport: self.transport.unwrap_or_else(|| Arc::new(TracingTransport)),
            locks: IdentityLocks::new(),
            config,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// 依次输出预设验证码
    struct SequenceGenerator {
        codes: Vec<&'static str>,
        next: AtomicUsize,
    }

    impl SequenceGenerator {
        fn new(codes: Vec<&'static str>) -> Arc<Self> {
            Arc::new(Self {
                codes,
                next: AtomicUsize::new(0),
            })
        }
    }

    impl CodeGenerator for SequenceGenerator {
        fn generate(&self, _length: usize) -> Result<String> {
            let i = self.next.fetch_add(1, Ordering::SeqCst);
            Ok(self.codes[i % self.codes.len()].to_string())
        }
    }

    struct FailingTransport;

    #[async_trait]
    impl CodeTransport for FailingTransport {
        async fn deliver(&self, _identity: &str, _code: &str) -> std::result::Result<(), TransportError> {
            Err(TransportError::DeliveryFailed("smtp unavailable".into()))
        }
    }

    /// 投递前先等待一段时间
    struct SlowTransport(Duration);

    #[async_trait]
    impl CodeTransport for SlowTransport {
        async fn deliver(&self, _identity: &str, _code: &str) -> std::result::Result<(), TransportError> {
            tokio::time::sleep(self.0).await;
            Ok(())
        }
    }

    fn manager(codes: Vec<&'static str>) -> OtpManager {
        OtpManager::builder()
            .generator(SequenceGenerator::new(codes))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_request_and_confirm() {
        let manager = manager(vec!["482913"]);

        let issued = manager.request_code("a@x.com").await.unwrap();
        assert_eq!(issued.identity, "a@x.com");
        assert_eq!(issued.remaining_issuances, 4);
        assert_eq!(issued.backend, ActiveBackend::Fallback);
        assert!(issued.remaining_seconds() > 590);

        manager.confirm_code("a@x.com", "482913").await.unwrap();
    }

    #[tokio::test]
    async fn test_confirm_is_single_use() {
        let manager = manager(vec!["482913"]);
        manager.request_code("a@x.com").await.unwrap();

        manager.confirm_code("a@x.com", "482913").await.unwrap();
        let err = manager.confirm_code("a@x.com", "482913").await.unwrap_err();
        assert!(matches!(err, Error::NoPendingCode));
    }

    #[tokio::test]
    async fn test_mismatch_consumes_record() {
        let manager = manager(vec!["482913"]);
        manager.request_code("a@x.com").await.unwrap();

        let err = manager.confirm_code("a@x.com", "000000").await.unwrap_err();
        assert!(matches!(err, Error::Mismatch));
        let err = manager.confirm_code("a@x.com", "482913").await.unwrap_err();
        assert!(matches!(err, Error::NoPendingCode));
    }

    #[tokio::test]
    async fn test_new_request_supersedes_previous() {
        let manager = manager(vec!["111111", "222222"]);
        manager.request_code("a@x.com").await.unwrap();
        manager.request_code("a@x.com").await.unwrap();

        let err = manager.confirm_code("a@x.com", "111111").await.unwrap_err();
        assert!(matches!(err, Error::Mismatch));
    }

    #[tokio::test]
    async fn test_expired_then_no_pending() {
        let manager = OtpManager::builder()
            .config(OtpConfig::default().with_ttl(Duration::from_millis(20)))
            .generator(SequenceGenerator::new(vec!["482913"]))
            .build()
            .unwrap();

        manager.request_code("a@x.com").await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let err = manager.confirm_code("a@x.com", "482913").await.unwrap_err();
        assert!(matches!(err, Error::Expired));
        let err = manager.confirm_code("a@x.com", "482913").await.unwrap_err();
        assert!(matches!(err, Error::NoPendingCode));
    }

    #[tokio::test]
    async fn test_transport_failure_keeps_code() {
        let manager = OtpManager::builder()
            .generator(SequenceGenerator::new(vec!["482913"]))
            .transport(Arc::new(FailingTransport))
            .build()
            .unwrap();

        let err = manager.request_code("a@x.com").await.unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
        assert!(!err.is_storage_failure());

        // 验证码已保存，在有效期内仍可验证
        manager.confirm_code("a@x.com", "482913").await.unwrap();
    }

    #[tokio::test]
    async fn test_revoke() {
        let manager = manager(vec!["482913"]);
        manager.request_code("a@x.com").await.unwrap();
        manager.revoke("a@x.com").await.unwrap();

        let err = manager.confirm_code("a@x.com", "482913").await.unwrap_err();
        assert!(matches!(err, Error::NoPendingCode));
    }

    #[tokio::test]
    async fn test_cleanup() {
        let manager = OtpManager::builder()
            .config(OtpConfig::default().with_ttl(Duration::from_millis(10)))
            .build()
            .unwrap();
        manager.request_code("a@x.com").await.unwrap();
        manager.request_code("b@x.com").await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(manager.cleanup().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_context_is_storage_failure() {
        let manager = manager(vec!["482913"]);
        let token = tokio_util::sync::CancellationToken::new();
        token.cancel();
        let ctx = OpContext::background().with_cancellation(token);

        let err = manager
            .request_code_with(&ctx, "a@x.com")
            .await
            .unwrap_err();
        assert!(err.is_storage_failure());
    }

    #[tokio::test]
    async fn test_fallback_window_must_match_limiter() {
        let err = OtpManager::builder()
            .config(OtpConfig::relaxed())
            .fallback(Arc::new(FallbackBackend::in_memory()))
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, Error::Config(_)));

        OtpManager::builder()
            .config(OtpConfig::relaxed())
            .fallback(Arc::new(
                FallbackBackend::in_memory().with_counter_window(Duration::from_secs(60 * 60)),
            ))
            .build()
            .unwrap();
    }

    #[tokio::test]
    async fn test_rate_limit_holds_in_each_window() {
        let window = Duration::from_millis(200);
        let manager = OtpManager::builder()
            .config(OtpConfig::default().with_rate_limit(
                RateLimitConfig::new().with_max_issuances(2).with_window(window),
            ))
            .fallback(Arc::new(FallbackBackend::in_memory().with_counter_window(window)))
            .build()
            .unwrap();

        for _ in 0..2 {
            let mut sent = 0;
            for _ in 0..5 {
                match manager.request_code("a@x.com").await {
                    Ok(_) => sent += 1,
                    Err(Error::RateLimited { .. }) => {}
                    Err(e) => panic!("unexpected error: {e}"),
                }
            }
            assert_eq!(sent, 2);
            tokio::time::sleep(Duration::from_millis(300)).await;
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_slow_delivery_does_not_block_confirm() {
        let manager = Arc::new(
            OtpManager::builder()
                .generator(SequenceGenerator::new(vec!["482913"]))
                .transport(Arc::new(SlowTransport(Duration::from_secs(2))))
                .build()
                .unwrap(),
        );

        let sending = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.request_code("a@x.com").await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;

        // 验证码在投递前已写入，投递期间即可验证
        let ctx = OpContext::background().with_timeout(Duration::from_millis(300));
        let started = std::time::Instant::now();
        manager
            .confirm_code_with(&ctx, "a@x.com", "482913")
            .await
            .unwrap();
        assert!(started.elapsed() < Duration::from_millis(300));

        sending.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_delivery_respects_caller_deadline() {
        let manager = OtpManager::builder()
            .generator(SequenceGenerator::new(vec!["482913"]))
            .transport(Arc::new(SlowTransport(Duration::from_secs(2))))
            .build()
            .unwrap();

        let ctx = OpContext::background().with_timeout(Duration::from_millis(100));
        let err = manager
            .request_code_with(&ctx, "a@x.com")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Transport(_)));

        manager.confirm_code("a@x.com", "482913").await.unwrap();
    }

    #[tokio::test]
    async fn test_lock_wait_respects_deadline() {
        let manager = manager(vec!["482913"]);
        manager.request_code("a@x.com").await.unwrap();

        let held = manager.locks.acquire("a@x.com").await;
        let ctx = OpContext::background().with_timeout(Duration::from_millis(50));
        let err = manager
            .confirm_code_with(&ctx, "a@x.com", "482913")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DeadlineExceeded));
        drop(held);

        // 超时的验证没有消耗记录
        manager.confirm_code("a@x.com", "482913").await.unwrap();
    }

    #[test]
    fn test_config_validation() {
        assert!(OtpConfig::default().validate().is_ok());
        assert!(OtpConfig::high_security().validate().is_ok());
        assert!(OtpConfig::relaxed().validate().is_ok());
        assert!(OtpConfig::default().with_code_length(3).validate().is_err());
        assert!(OtpConfig::default().with_code_length(11).validate().is_err());
        assert!(OtpConfig::default().with_ttl(Duration::ZERO).validate().is_err());

        let err = OtpManager::in_memory(OtpConfig::default().with_code_length(2))
            .err()
            .unwrap();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_config_serde() {
        let json = serde_json::to_value(OtpConfig::default()).unwrap();
        assert_eq!(json["code_length"], 6);
        assert_eq!(json["ttl"], 600);
        assert_eq!(json["rate_limit"]["max_issuances"], 5);
        assert_eq!(json["rate_limit"]["window"], 86_400);

        let config: OtpConfig = serde_json::from_value(json).unwrap();
        assert_eq!(config, OtpConfig::default());
    }

    #[test]
    fn test_high_security_config() {
        let config = OtpConfig::high_security();
        assert_eq!(config.code_length, 8);
        assert_eq!(config.ttl, Duration::from_secs(300));
        assert_eq!(config.rate_limit.max_issuances, 3);
    }
}

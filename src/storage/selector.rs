//! 后端选择器
//!
//! 第一次使用时对持久存储做一次轻量读取：
//!
//! - 成功：之后始终使用持久存储
//! - 表结构不存在：永久切换到降级存储（进程生命周期内不会切回）
//! - 其他错误：原样返回给调用方，下次调用重新探测
//!
//! 切换状态保存在可注入的 [`SelectorState`] 中，而不是进程级全局变量。

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{OtpBackend, OtpRecord};
use crate::context::OpContext;
use crate::error::Result;

const UNPROBED: u8 = 0;
const DURABLE: u8 = 1;
const FAILED_OVER: u8 = 2;

/// 当前生效的后端
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActiveBackend {
    /// 持久存储
    Durable,
    /// 降级存储
    Fallback,
}

impl std::fmt::Display for ActiveBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActiveBackend::Durable => write!(f, "durable"),
            ActiveBackend::Fallback => write!(f, "fallback"),
        }
    }
}

/// 选择器状态
///
/// 只会发生 `Unprobed → Durable`、`Unprobed → FailedOver`、
/// `Durable → FailedOver` 三种转换；一旦切换到降级存储即不可逆。
#[derive(Debug, Default)]
pub struct SelectorState {
    state: AtomicU8,
}

impl SelectorState {
    /// 创建未探测的状态
    pub fn new() -> Self {
        Self::default()
    }

    /// 已确定的后端；尚未探测时返回 `None`
    pub fn active(&self) -> Option<ActiveBackend> {
        match self.state.load(Ordering::Acquire) {
            DURABLE => Some(ActiveBackend::Durable),
            FAILED_OVER => Some(ActiveBackend::Fallback),
            _ => None,
        }
    }

    /// 是否已切换到降级存储
    pub fn is_failed_over(&self) -> bool {
        self.state.load(Ordering::Acquire) == FAILED_OVER
    }

    /// 永久切换到降级存储；返回本次调用是否完成了切换
    pub fn fail_over(&self) -> bool {
        self.state.swap(FAILED_OVER, Ordering::AcqRel) != FAILED_OVER
    }

    fn mark_durable(&self) {
        // 仅从未探测状态转换，避免覆盖已发生的切换
        let _ = self.state.compare_exchange(
            UNPROBED,
            DURABLE,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }
}

/// 后端选择器
///
/// 自身实现 [`OtpBackend`]：每个操作转发给当前生效的后端；
/// 持久存储在操作中途报告表结构不存在时，切换并在降级存储上重试一次。
///
/// 只读操作在 [`OpContext::run`] 下执行；写操作交由后端自行遵守上下文，
/// 不在中途丢弃，避免已提交的写入被报告为超时。
pub struct BackendSelector {
    durable: Option<Arc<dyn OtpBackend>>,
    fallback: Arc<dyn OtpBackend>,
    state: Arc<SelectorState>,
}

impl BackendSelector {
    /// 创建选择器
    pub fn new(
        durable: Arc<dyn OtpBackend>,
        fallback: Arc<dyn OtpBackend>,
        state: Arc<SelectorState>,
    ) -> Self {
        Self {
            durable: Some(durable),
            fallback,
            state,
        }
    }

    /// 只使用降级存储
    pub fn fallback_only(fallback: Arc<dyn OtpBackend>) -> Self {
        let state = Arc::new(SelectorState::new());
        state.fail_over();
        Self {
            durable: None,
            fallback,
            state,
        }
    }

    /// 共享的选择器状态
    pub fn state(&self) -> &Arc<SelectorState> {
        &self.state
    }

    /// 确定当前生效的后端
    pub async fn resolve(&self, ctx: &OpContext) -> Result<ActiveBackend> {
        if let Some(active) = self.state.active() {
            return Ok(active);
        }
        let Some(durable) = &self.durable else {
            self.fail_over("no durable backend configured");
            return Ok(ActiveBackend::Fallback);
        };

        match ctx.run(durable.probe(ctx)).await {
            Ok(()) => {
                self.state.mark_durable();
                debug!(backend = durable.name(), "durable backend available");
            }
            Err(e) if e.is_schema_missing() => {
                self.fail_over(&e.to_string());
            }
            Err(e) => {
                debug!(error = %e, "durable backend probe failed, will retry");
                return Err(e);
            }
        }

        Ok(self.state.active().unwrap_or(ActiveBackend::Fallback))
    }

    /// 当前生效的后端实例
    pub fn backend(&self, active: ActiveBackend) -> &Arc<dyn OtpBackend> {
        match (active, &self.durable) {
            (ActiveBackend::Durable, Some(durable)) => durable,
            _ => &self.fallback,
        }
    }

    fn fail_over(&self, reason: &str) {
        if self.state.fail_over() {
            warn!(
                reason,
                fallback = self.fallback.name(),
                "durable otp store unavailable, failing over for the rest of the process lifetime"
            );
        }
    }

    /// 判断是否需要切换后端；需要时执行切换
    fn should_retry_on_fallback<T>(&self, active: ActiveBackend, result: &Result<T>) -> bool {
        match result {
            Err(e) if active == ActiveBackend::Durable && e.is_schema_missing() => {
                self.fail_over(&e.to_string());
                true
            }
            _ => false,
        }
    }
}

#[async_trait]
impl OtpBackend for BackendSelector {
    fn name(&self) -> &'static str {
        "selector"
    }

    async fn put(&self, ctx: &OpContext, identity: &str, code: &str, ttl: Duration) -> Result<()> {
        let active = self.resolve(ctx).await?;
        let result = self.backend(active).put(ctx, identity, code, ttl).await;
        if self.should_retry_on_fallback(active, &result) {
            return self.fallback.put(ctx, identity, code, ttl).await;
        }
        result
    }

    async fn get(&self, ctx: &OpContext, identity: &str) -> Result<Option<OtpRecord>> {
        let active = self.resolve(ctx).await?;
        let result = ctx.run(self.backend(active).get(ctx, identity)).await;
        if self.should_retry_on_fallback(active, &result) {
            return ctx.run(self.fallback.get(ctx, identity)).await;
        }
        result
    }

    async fn delete(&self, ctx: &OpContext, identity: &str) -> Result<()> {
        let active = self.resolve(ctx).await?;
        let result = self.backend(active).delete(ctx, identity).await;
        if self.should_retry_on_fallback(active, &result) {
            return self.fallback.delete(ctx, identity).await;
        }
        result
    }

    async fn take(&self, ctx: &OpContext, identity: &str) -> Result<Option<OtpRecord>> {
        let active = self.resolve(ctx).await?;
        let result = self.backend(active).take(ctx, identity).await;
        if self.should_retry_on_fallback(active, &result) {
            return self.fallback.take(ctx, identity).await;
        }
        result
    }

    async fn count_since(
        &self,
        ctx: &OpContext,
        identity: &str,
        window: Duration,
    ) -> Result<u32> {
        let active = self.resolve(ctx).await?;
        let result = ctx
            .run(self.backend(active).count_since(ctx, identity, window))
            .await;
        if self.should_retry_on_fallback(active, &result) {
            return ctx
                .run(self.fallback.count_since(ctx, identity, window))
                .await;
        }
        result
    }

    async fn probe(&self, ctx: &OpContext) -> Result<()> {
        let active = self.resolve(ctx).await?;
        ctx.run(self.backend(active).probe(ctx)).await
    }

    async fn cleanup_expired(&self, ctx: &OpContext) -> Result<usize> {
        let active = self.resolve(ctx).await?;
        let result = self.backend(active).cleanup_expired(ctx).await;
        if self.should_retry_on_fallback(active, &result) {
            return self.fallback.cleanup_expired(ctx).await;
        }
        result
    }
}

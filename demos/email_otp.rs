//! 邮箱验证码示例
//!
//! 展示注册确认流程：发送验证码、用户提交、错误验证码与发送限流。
//! 持久存储未初始化表结构时自动切换到进程内存储。
//!
//! 运行: RUST_LOG=otpgate=debug cargo run --example email_otp

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use otpgate::error::TransportError;
use otpgate::{CodeTransport, Error, OtpConfig, OtpManager, SqliteBackend};
use parking_lot::Mutex;
use tracing_subscriber::EnvFilter;

/// 模拟邮件发送：把验证码放进“收件箱”
#[derive(Default)]
struct Outbox {
    inbox: Mutex<HashMap<String, String>>,
}

impl Outbox {
    fn latest(&self, email: &str) -> Option<String> {
        self.inbox.lock().get(email).cloned()
    }
}

#[async_trait]
impl CodeTransport for Outbox {
    async fn deliver(&self, identity: &str, code: &str) -> Result<(), TransportError> {
        if !identity.contains('@') {
            return Err(TransportError::RecipientRejected(identity.to_string()));
        }
        self.inbox
            .lock()
            .insert(identity.to_string(), code.to_string());
        Ok(())
    }
}

async fn build_manager(outbox: Arc<Outbox>, migrate: bool) -> otpgate::Result<OtpManager> {
    let durable = SqliteBackend::open_in_memory()?;
    if migrate {
        durable.migrate().await?;
    }

    OtpManager::builder()
        .config(OtpConfig::default())
        .durable(Arc::new(durable))
        .transport(outbox)
        .build()
}

#[tokio::main]
async fn main() -> otpgate::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("otpgate=info")),
        )
        .init();

    println!("=== 邮箱验证码示例 ===\n");

    // ========================================================================
    // 1. 正常流程
    // ========================================================================
    println!("--- 1. 发送与验证 ---");
    let outbox = Arc::new(Outbox::default());
    let manager = build_manager(outbox.clone(), true).await?;

    let issued = manager.request_code("alice@example.com").await?;
    println!(
        "已发送: 后端={}, 剩余 {} 秒有效, 今日还可发送 {} 次",
        issued.backend,
        issued.remaining_seconds(),
        issued.remaining_issuances
    );

    let code = outbox.latest("alice@example.com").unwrap_or_default();
    manager.confirm_code("alice@example.com", &code).await?;
    println!("✓ 验证成功");

    match manager.confirm_code("alice@example.com", &code).await {
        Err(Error::NoPendingCode) => println!("✓ 重复提交被拒绝: 没有待验证的验证码"),
        other => println!("✗ 意外结果: {:?}", other),
    }

    // ========================================================================
    // 2. 错误验证码
    // ========================================================================
    println!("\n--- 2. 错误验证码 ---");
    manager.request_code("bob@example.com").await?;
    let real = outbox.latest("bob@example.com").unwrap_or_default();

    match manager.confirm_code("bob@example.com", "000000").await {
        Err(Error::Mismatch) => println!("✓ 错误验证码被拒绝"),
        other => println!("✗ 意外结果: {:?}", other),
    }
    match manager.confirm_code("bob@example.com", &real).await {
        Err(Error::NoPendingCode) => println!("✓ 失败一次后原验证码也已失效"),
        other => println!("✗ 意外结果: {:?}", other),
    }

    // ========================================================================
    // 3. 发送限流
    // ========================================================================
    println!("\n--- 3. 发送限流 ---");
    for attempt in 1..=6 {
        match manager.request_code("carol@example.com").await {
            Ok(issued) => println!(
                "第 {} 次: 已发送, 还可发送 {} 次",
                attempt, issued.remaining_issuances
            ),
            Err(Error::RateLimited { retry_after }) => println!(
                "第 {} 次: 已达上限, {} 小时后重试",
                attempt,
                retry_after.as_secs() / 3600
            ),
            Err(e) => return Err(e),
        }
    }

    // ========================================================================
    // 4. 投递失败
    // ========================================================================
    println!("\n--- 4. 投递失败 ---");
    match manager.request_code("not-an-email").await {
        Err(Error::Transport(e)) => println!("✓ 投递失败: {}", e),
        other => println!("✗ 意外结果: {:?}", other),
    }

    // ========================================================================
    // 5. 持久存储不可用
    // ========================================================================
    println!("\n--- 5. 降级存储 ---");
    let outbox = Arc::new(Outbox::default());
    let manager = build_manager(outbox.clone(), false).await?;

    let issued = manager.request_code("dave@example.com").await?;
    println!("表结构缺失, 当前后端: {}", issued.backend);

    let code = outbox.latest("dave@example.com").unwrap_or_default();
    manager.confirm_code("dave@example.com", &code).await?;
    println!("✓ 降级存储上验证成功");

    println!("\n=== 示例完成 ===");
    Ok(())
}

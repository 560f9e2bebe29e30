//! 降级存储实现
//!
//! 当持久存储的表结构不存在时使用。数据保存在任意键值存储中：
//!
//! - `otp:<identity>` → `{"code", "expiry", "issuedAt"}`（毫秒时间戳）
//! - `otp-ratelimit:<identity>` → `{"count", "windowStart"}`
//!
//! 计数器采用固定窗口：`now - windowStart > window` 时重置。
//! 计数查询发现计数器过期时会将其删除，下一次写入从新窗口开始计数，
//! 因此窗口长度以查询方传入的为准。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{OtpBackend, OtpRecord, to_chrono};
use crate::context::OpContext;
use crate::error::{Error, Result, StorageError};

const RECORD_PREFIX: &str = "otp:";
const RATE_LIMIT_PREFIX: &str = "otp-ratelimit:";

/// 默认的计数窗口（24 小时）
pub const DEFAULT_COUNTER_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

// ============================================================================
// 键值存储接口
// ============================================================================

/// 键值存储接口
///
/// 只需支持按字符串键读写删除。
pub trait KeyValueStore: Send + Sync {
    /// 读取
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// 写入（覆盖）
    fn put(&self, key: &str, value: String) -> Result<()>;

    /// 删除；键不存在不是错误
    fn delete(&self, key: &str) -> Result<()>;

    /// 列出以 `prefix` 开头的键
    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>>;
}

/// 进程内键值存储
#[derive(Debug, Clone, Default)]
pub struct InMemoryKeyValueStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl InMemoryKeyValueStore {
    /// 创建新的内存存储
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前条目数量
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl KeyValueStore for InMemoryKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn put(&self, key: &str, value: String) -> Result<()> {
        self.entries.lock().insert(key.to_string(), value);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.entries.lock().remove(key);
        Ok(())
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .entries
            .lock()
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect())
    }
}

// ============================================================================
// 存储格式
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredCode {
    code: String,
    expiry: i64,
    issued_at: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IssuanceCounter {
    count: u32,
    window_start: i64,
}

impl IssuanceCounter {
    fn is_stale(&self, now_ms: i64, window_ms: i64) -> bool {
        now_ms - self.window_start > window_ms
    }
}

fn from_millis(ms: i64, key: &str) -> Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| StorageError::Corrupted(key.to_string()).into())
}

// ============================================================================
// 降级存储
// ============================================================================

/// 基于键值存储的降级后端
///
/// 复合操作（写入、取出、计数）在内部锁下执行，`take` 因此是原子的。
pub struct FallbackBackend<K: KeyValueStore = InMemoryKeyValueStore> {
    kv: K,
    counter_window: Duration,
    op_lock: Mutex<()>,
}

impl FallbackBackend<InMemoryKeyValueStore> {
    /// 使用进程内存储创建
    pub fn in_memory() -> Self {
        Self::new(InMemoryKeyValueStore::new())
    }
}

impl Default for FallbackBackend<InMemoryKeyValueStore> {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl<K: KeyValueStore> FallbackBackend<K> {
    /// 使用自定义键值存储创建
    pub fn new(kv: K) -> Self {
        Self {
            kv,
            counter_window: DEFAULT_COUNTER_WINDOW,
            op_lock: Mutex::new(()),
        }
    }

    /// 设置计数器的窗口长度
    pub fn with_counter_window(mut self, window: Duration) -> Self {
        self.counter_window = window;
        self
    }

    /// 底层键值存储
    pub fn store(&self) -> &K {
        &self.kv
    }

    fn record_key(identity: &str) -> String {
        format!("{RECORD_PREFIX}{identity}")
    }

    fn counter_key(identity: &str) -> String {
        format!("{RATE_LIMIT_PREFIX}{identity}")
    }

    fn load_record(&self, identity: &str) -> Result<Option<OtpRecord>> {
        let key = Self::record_key(identity);
        let Some(raw) = self.kv.get(&key)? else {
            return Ok(None);
        };

        let stored: StoredCode = match serde_json::from_str(&raw) {
            Ok(stored) => stored,
            Err(e) => {
                warn!(key = %key, error = %e, "dropping undecodable otp record");
                self.kv.delete(&key)?;
                return Err(StorageError::Corrupted(key).into());
            }
        };

        Ok(Some(OtpRecord {
            identity: identity.to_string(),
            code: stored.code,
            issued_at: from_millis(stored.issued_at, &key)?,
            expires_at: from_millis(stored.expiry, &key)?,
        }))
    }

    fn load_counter(&self, identity: &str) -> Result<Option<IssuanceCounter>> {
        let key = Self::counter_key(identity);
        match self.kv.get(&key)? {
            Some(raw) => match serde_json::from_str(&raw) {
                Ok(counter) => Ok(Some(counter)),
                Err(e) => {
                    // 删除后重新计数；本次调用仍报告损坏，不借此放行
                    warn!(key = %key, error = %e, "dropping undecodable issuance counter");
                    self.kv.delete(&key)?;
                    Err(StorageError::Corrupted(key).into())
                }
            },
            None => Ok(None),
        }
    }

    fn encode<T: Serialize>(value: &T) -> Result<String> {
        serde_json::to_string(value).map_err(|e| Error::storage(e.to_string()))
    }
}

#[async_trait]
impl<K: KeyValueStore> OtpBackend for FallbackBackend<K> {
    fn name(&self) -> &'static str {
        "fallback"
    }

    async fn put(&self, ctx: &OpContext, identity: &str, code: &str, ttl: Duration) -> Result<()> {
        ctx.check()?;
        let _guard = self.op_lock.lock();

        let now = Utc::now();
        let now_ms = now.timestamp_millis();
        let expiry = now + to_chrono(ttl, "ttl")?;

        // 先记账再写记录：计数失败时不会留下未计数的验证码
        let window_ms = to_chrono(self.counter_window, "counter_window")?.num_milliseconds();
        let counter = match self.load_counter(identity) {
            Ok(Some(counter)) if !counter.is_stale(now_ms, window_ms) => IssuanceCounter {
                count: counter.count.saturating_add(1),
                window_start: counter.window_start,
            },
            Ok(_) | Err(Error::Storage(StorageError::Corrupted(_))) => IssuanceCounter {
                count: 1,
                window_start: now_ms,
            },
            Err(e) => return Err(e),
        };
        self.kv
            .put(&Self::counter_key(identity), Self::encode(&counter)?)?;

        let record_key = Self::record_key(identity);
        self.kv.delete(&record_key)?;
        self.kv.put(
            &record_key,
            Self::encode(&StoredCode {
                code: code.to_string(),
                expiry: expiry.timestamp_millis(),
                issued_at: now_ms,
            })?,
        )?;

        Ok(())
    }

    async fn get(&self, ctx: &OpContext, identity: &str) -> Result<Option<OtpRecord>> {
        ctx.check()?;
        let _guard = self.op_lock.lock();
        self.load_record(identity)
    }

    async fn delete(&self, ctx: &OpContext, identity: &str) -> Result<()> {
        ctx.check()?;
        let _guard = self.op_lock.lock();
        self.kv.delete(&Self::record_key(identity))
    }

    async fn take(&self, ctx: &OpContext, identity: &str) -> Result<Option<OtpRecord>> {
        ctx.check()?;
        let _guard = self.op_lock.lock();
        let record = self.load_record(identity)?;
        if record.is_some() {
            self.kv.delete(&Self::record_key(identity))?;
        }
        Ok(record)
    }

    async fn count_since(
        &self,
        ctx: &OpContext,
        identity: &str,
        window: Duration,
    ) -> Result<u32> {
        ctx.check()?;
        let _guard = self.op_lock.lock();

        let now_ms = Utc::now().timestamp_millis();
        let window_ms = to_chrono(window, "window")?.num_milliseconds();
        match self.load_counter(identity)? {
            Some(counter) if !counter.is_stale(now_ms, window_ms) => Ok(counter.count),
            Some(_) => {
                self.kv.delete(&Self::counter_key(identity))?;
                Ok(0)
            }
            None => Ok(0),
        }
    }

    fn counter_window(&self) -> Option<Duration> {
        Some(self.counter_window)
    }

    async fn probe(&self, ctx: &OpContext) -> Result<()> {
        ctx.check()?;
        self.kv.get(RECORD_PREFIX).map(|_| ())
    }

    async fn cleanup_expired(&self, ctx: &OpContext) -> Result<usize> {
        ctx.check()?;
        let _guard = self.op_lock.lock();

        let now = Utc::now();
        let mut removed = 0;
        for key in self.kv.keys_with_prefix(RECORD_PREFIX)? {
            let identity = &key[RECORD_PREFIX.len()..];
            let expired = match self.load_record(identity) {
                Ok(Some(record)) => record.is_expired_at(now),
                Ok(None) => false,
                // 损坏的记录已在读取时删除
                Err(Error::Storage(StorageError::Corrupted(_))) => {
                    removed += 1;
                    continue;
                }
                Err(e) => return Err(e),
            };
            if expired {
                self.kv.delete(&key)?;
                removed += 1;
            }
        }

        let window_ms = to_chrono(self.counter_window, "counter_window")?.num_milliseconds();
        for key in self.kv.keys_with_prefix(RATE_LIMIT_PREFIX)? {
            let identity = &key[RATE_LIMIT_PREFIX.len()..];
            match self.load_counter(identity) {
                Ok(Some(counter)) if counter.is_stale(now.timestamp_millis(), window_ms) => {
                    self.kv.delete(&key)?;
                }
                // 损坏的计数器已在读取时删除
                Ok(_) | Err(Error::Storage(StorageError::Corrupted(_))) => {}
                Err(e) => return Err(e),
            }
        }

        Ok(removed)
    }
}

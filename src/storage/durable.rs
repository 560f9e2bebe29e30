//! 持久存储实现（SQLite）
//!
//! 表结构：
//!
//! ```sql
//! CREATE TABLE otp_codes (
//!     identity   TEXT    PRIMARY KEY,
//!     code       TEXT    NOT NULL,
//!     issued_at  INTEGER NOT NULL,
//!     expires_at INTEGER NOT NULL
//! );
//! CREATE TABLE otp_issuances (
//!     identity   TEXT    NOT NULL,
//!     issued_at  INTEGER NOT NULL
//! );
//! ```
//!
//! 打开数据库时不会自动建表，调用方需显式执行 [`SqliteBackend::migrate`]。
//! 表不存在时的错误映射为 [`StorageError::SchemaMissing`]，
//! 由 [`BackendSelector`](super::BackendSelector) 据此切换到降级存储。

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params};
use tracing::debug;

use super::{OtpBackend, OtpRecord, to_chrono};
use crate::context::OpContext;
use crate::error::{Error, Result, StorageError};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS otp_codes (
        identity    TEXT    PRIMARY KEY,
        code        TEXT    NOT NULL,
        issued_at   INTEGER NOT NULL,
        expires_at  INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS otp_issuances (
        identity    TEXT    NOT NULL,
        issued_at   INTEGER NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_otp_issuances_identity_issued_at
    ON otp_issuances (identity, issued_at);
";

/// 将 SQLite 错误映射为存储错误
fn map_db_err(err: &rusqlite::Error) -> Error {
    let message = err.to_string();
    if message.contains("no such table") {
        StorageError::SchemaMissing(message).into()
    } else {
        StorageError::OperationFailed(message).into()
    }
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| StorageError::Corrupted(format!("timestamp {ms}")).into())
}

/// 基于 SQLite 的持久存储
///
/// 连接由互斥锁保护，阻塞操作在 `spawn_blocking` 中执行。
#[derive(Debug, Clone)]
pub struct SqliteBackend {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteBackend {
    /// 打开数据库文件
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path).map_err(|e| {
            Error::Storage(StorageError::ConnectionFailed(e.to_string()))
        })?;
        Ok(Self::from_connection(conn))
    }

    /// 打开内存数据库
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| {
            Error::Storage(StorageError::ConnectionFailed(e.to_string()))
        })?;
        Ok(Self::from_connection(conn))
    }

    /// 使用已有连接
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// 创建表结构（幂等）
    pub async fn migrate(&self) -> Result<()> {
        self.with_conn(&OpContext::background(), |conn| {
            conn.execute_batch(SCHEMA).map_err(|e| map_db_err(&e))
        })
        .await
    }

    /// 删除早于 `older_than` 的发送日志，返回删除条数
    pub async fn prune_issuances(&self, older_than: Duration) -> Result<usize> {
        let cutoff = (Utc::now() - to_chrono(older_than, "older_than")?).timestamp_millis();
        self.with_conn(&OpContext::background(), move |conn| {
            conn.execute(
                "DELETE FROM otp_issuances WHERE issued_at < ?1",
                params![cutoff],
            )
            .map_err(|e| map_db_err(&e))
        })
        .await
    }

    /// 在阻塞线程上执行 `f`
    ///
    /// 拿到连接后与调用方竞争执行权：调用方先因截止时间或取消放弃时，`f` 不会执行；
    /// `f` 一旦开始执行，就等待其完成并如实返回结果，不会出现已提交但报告超时的情况。
    async fn with_conn<T, F>(&self, ctx: &OpContext, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        ctx.check()?;

        let conn = Arc::clone(&self.conn);
        let claimed = Arc::new(AtomicBool::new(false));
        let worker_claimed = Arc::clone(&claimed);
        let mut handle = tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock();
            if worker_claimed.swap(true, Ordering::AcqRel) {
                return Err(Error::Cancelled);
            }
            f(&mut conn)
        });

        match ctx.run(async { Ok((&mut handle).await) }).await {
            Ok(joined) => joined.map_err(join_error)?,
            Err(e) => {
                if claimed.swap(true, Ordering::AcqRel) {
                    debug!(error = %e, "sqlite work already started, waiting for completion");
                    handle.await.map_err(join_error)?
                } else {
                    Err(e)
                }
            }
        }
    }
}

fn join_error(e: tokio::task::JoinError) -> Error {
    Error::internal(format!("sqlite task failed: {e}"))
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<(String, i64, i64)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
}

fn into_record(identity: &str, raw: Option<(String, i64, i64)>) -> Result<Option<OtpRecord>> {
    raw.map(|(code, issued_at, expires_at)| {
        Ok(OtpRecord {
            identity: identity.to_string(),
            code,
            issued_at: from_millis(issued_at)?,
            expires_at: from_millis(expires_at)?,
        })
    })
    .transpose()
}

#[async_trait]
impl OtpBackend for SqliteBackend {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn put(&self, ctx: &OpContext, identity: &str, code: &str, ttl: Duration) -> Result<()> {
        let issued_at = Utc::now();
        let expires_at = issued_at + to_chrono(ttl, "ttl")?;
        let identity = identity.to_string();
        let code = code.to_string();

        self.with_conn(ctx, move |conn| {
            let tx = conn.transaction().map_err(|e| map_db_err(&e))?;
            tx.execute("DELETE FROM otp_codes WHERE identity = ?1", params![identity])
                .map_err(|e| map_db_err(&e))?;
            tx.execute(
                "INSERT INTO otp_codes (identity, code, issued_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    identity,
                    code,
                    issued_at.timestamp_millis(),
                    expires_at.timestamp_millis()
                ],
            )
            .map_err(|e| map_db_err(&e))?;
            tx.execute(
                "INSERT INTO otp_issuances (identity, issued_at) VALUES (?1, ?2)",
                params![identity, issued_at.timestamp_millis()],
            )
            .map_err(|e| map_db_err(&e))?;
            tx.commit().map_err(|e| map_db_err(&e))?;
            debug!(identity = %identity, "stored otp record");
            Ok(())
        })
        .await
    }

    async fn get(&self, ctx: &OpContext, identity: &str) -> Result<Option<OtpRecord>> {
        let owned = identity.to_string();
        let raw = self
            .with_conn(ctx, move |conn| {
                conn.query_row(
                    "SELECT code, issued_at, expires_at FROM otp_codes WHERE identity = ?1",
                    params![owned],
                    read_row,
                )
                .optional()
                .map_err(|e| map_db_err(&e))
            })
            .await?;
        into_record(identity, raw)
    }

    async fn delete(&self, ctx: &OpContext, identity: &str) -> Result<()> {
        let identity = identity.to_string();
        self.with_conn(ctx, move |conn| {
            conn.execute("DELETE FROM otp_codes WHERE identity = ?1", params![identity])
                .map(|_| ())
                .map_err(|e| map_db_err(&e))
        })
        .await
    }

    async fn take(&self, ctx: &OpContext, identity: &str) -> Result<Option<OtpRecord>> {
        let owned = identity.to_string();
        let raw = self
            .with_conn(ctx, move |conn| {
                conn.query_row(
                    "DELETE FROM otp_codes WHERE identity = ?1
                     RETURNING code, issued_at, expires_at",
                    params![owned],
                    read_row,
                )
                .optional()
                .map_err(|e| map_db_err(&e))
            })
            .await?;
        into_record(identity, raw)
    }

    async fn count_since(
        &self,
        ctx: &OpContext,
        identity: &str,
        window: Duration,
    ) -> Result<u32> {
        let since = (Utc::now() - to_chrono(window, "window")?).timestamp_millis();
        let identity = identity.to_string();
        let count: i64 = self
            .with_conn(ctx, move |conn| {
                conn.query_row(
                    "SELECT COUNT(*) FROM otp_issuances
                     WHERE identity = ?1 AND issued_at >= ?2",
                    params![identity, since],
                    |row| row.get(0),
                )
                .map_err(|e| map_db_err(&e))
            })
            .await?;
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    async fn probe(&self, ctx: &OpContext) -> Result<()> {
        self.with_conn(ctx, |conn| {
            conn.query_row("SELECT 1 FROM otp_codes LIMIT 1", [], |_| Ok(()))
                .optional()
                .map(|_| ())
                .map_err(|e| map_db_err(&e))
        })
        .await
    }

    async fn cleanup_expired(&self, ctx: &OpContext) -> Result<usize> {
        let now = Utc::now().timestamp_millis();
        self.with_conn(ctx, move |conn| {
            conn.execute("DELETE FROM otp_codes WHERE expires_at < ?1", params![now])
                .map_err(|e| map_db_err(&e))
        })
        .await
    }
}

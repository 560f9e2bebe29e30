//! 按身份加锁
//!
//! 同一身份的发送与验证互斥执行，不同身份之间互不影响。
//! 锁条目在最后一个持有者释放后移除。

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// 身份锁表
#[derive(Debug, Default)]
pub struct IdentityLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl IdentityLocks {
    /// 创建空锁表
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取该身份的锁
    pub async fn acquire(&self, identity: &str) -> IdentityGuard<'_> {
        let lock = {
            let mut locks = self.locks.lock();
            Arc::clone(
                locks
                    .entry(identity.to_string())
                    .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
            )
        };

        let guard = lock.lock_owned().await;
        IdentityGuard {
            locks: self,
            identity: identity.to_string(),
            guard: Some(guard),
        }
    }

    /// 当前锁条目数量
    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    /// 是否没有锁条目
    pub fn is_empty(&self) -> bool {
        self.locks.lock().is_empty()
    }
}

/// 身份锁守卫，释放时清理无人引用的条目
#[derive(Debug)]
pub struct IdentityGuard<'a> {
    locks: &'a IdentityLocks,
    identity: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for IdentityGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());

        let mut locks = self.locks.locks.lock();
        if let Some(lock) = locks.get(&self.identity)
            && Arc::strong_count(lock) == 1
        {
            locks.remove(&self.identity);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_entries_are_pruned() {
        let locks = IdentityLocks::new();
        {
            let _a = locks.acquire("a@x.com").await;
            let _b = locks.acquire("b@x.com").await;
            assert_eq!(locks.len(), 2);
        }
        assert!(locks.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_same_identity_is_serialized() {
        let locks = Arc::new(IdentityLocks::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let locks = locks.clone();
            let inside = inside.clone();
            let max_inside = max_inside.clone();
            handles.push(tokio::spawn(async move {
                let _guard = locks.acquire("a@x.com").await;
                let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                max_inside.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                inside.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
        assert!(locks.is_empty());
    }
}

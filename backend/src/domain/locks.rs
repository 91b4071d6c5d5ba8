use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Registry of per-entity async mutexes.
///
/// Mutations on the same id serialize; mutations on different ids proceed
/// concurrently. Idle entries are pruned whenever a new lock is handed out.
#[derive(Clone, Default)]
pub struct EntityLocks {
    locks: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl EntityLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `id`. The guard releases on drop.
    pub async fn acquire(&self, id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            locks.retain(|key, lock| key == id || Arc::strong_count(lock) > 1);
            locks
                .entry(id.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    #[cfg(test)]
    pub fn tracked(&self) -> usize {
        self.locks.lock().map(|locks| locks.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_id_serializes() {
        let locks = EntityLocks::new();
        let in_section = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let locks = locks.clone();
            let in_section = in_section.clone();
            let max_seen = max_seen.clone();
            handles.push(tokio::spawn(async move {
                let _guard = locks.acquire("child::a").await;
                let now = in_section.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                in_section.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_different_ids_do_not_block() {
        let locks = EntityLocks::new();
        let _a = locks.acquire("child::a").await;
        let b = tokio::time::timeout(Duration::from_millis(100), locks.acquire("child::b")).await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn test_idle_locks_are_pruned() {
        let locks = EntityLocks::new();
        {
            let _a = locks.acquire("child::a").await;
        }
        let _b = locks.acquire("child::b").await;
        assert_eq!(locks.tracked(), 1);
    }
}

//! 엔티티별 락 관리.
//!
//! 같은 엔티티에 대한 동시 요청이 원격 fetch를 중복 수행하지 않도록
//! 엔티티당 하나의 비동기 락을 제공합니다. 락 테이블 자체의 동기화(RwLock)는
//! 엔티티 데이터 락과 별개이며, 항목 생성 순간에만 짧게 잡힙니다.

use findata_core::EntityKey;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

type LockMap = Arc<RwLock<HashMap<EntityKey, Arc<Mutex<()>>>>>;

/// 엔티티 키 → 비동기 Mutex 테이블.
///
/// 락 항목은 첫 요청 시 원자적으로 생성되고 이후 재사용됩니다.
/// 평생 요청되는 엔티티 수는 유한하므로 항목을 회수하지 않습니다.
#[derive(Debug, Default)]
pub struct EntityLockManager {
    locks: LockMap,
}

impl EntityLockManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// 해당 엔티티의 락을 가져오거나 없으면 생성합니다.
    ///
    /// 두 태스크가 동시에 없는 항목을 요청해도 같은 락을 받도록
    /// 읽기 확인 후 쓰기 잠금에서 `entry().or_insert_with()`로 생성합니다.
    pub async fn lock_for(&self, key: &EntityKey) -> Arc<Mutex<()>> {
        // 먼저 읽기 잠금으로 확인
        {
            let locks = self.locks.read().await;
            if let Some(lock) = locks.get(key) {
                return lock.clone();
            }
        }

        // 없으면 쓰기 잠금으로 생성
        let mut locks = self.locks.write().await;
        locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// 현재 테이블에 등록된 락 수.
    pub async fn lock_count(&self) -> usize {
        self.locks.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_same_key_returns_same_lock() {
        let manager = EntityLockManager::new();
        let key = EntityKey::asset("AAPL");

        let a = manager.lock_for(&key).await;
        let b = manager.lock_for(&key).await;

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(manager.lock_count().await, 1);
    }

    #[tokio::test]
    async fn test_different_keys_get_distinct_locks() {
        let manager = EntityLockManager::new();

        let a = manager.lock_for(&EntityKey::asset("AAPL")).await;
        let b = manager.lock_for(&EntityKey::macro_metric("M_CPI")).await;

        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(manager.lock_count().await, 2);
    }

    #[tokio::test]
    async fn test_held_lock_blocks_second_acquirer() {
        let manager = EntityLockManager::new();
        let key = EntityKey::asset("AAPL");

        let lock = manager.lock_for(&key).await;
        let _guard = lock.lock().await;

        let same = manager.lock_for(&key).await;
        assert!(same.try_lock().is_err(), "보유 중인 락은 즉시 획득될 수 없어야 함");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_concurrent_creation_yields_single_entry() {
        let manager = Arc::new(EntityLockManager::new());
        let key = EntityKey::asset("TSLA");

        let mut handles = Vec::new();
        for _ in 0..16 {
            let manager = manager.clone();
            let key = key.clone();
            handles.push(tokio::spawn(async move { manager.lock_for(&key).await }));
        }

        let mut locks = Vec::new();
        for handle in handles {
            locks.push(handle.await.unwrap());
        }

        assert_eq!(manager.lock_count().await, 1);
        for lock in &locks[1..] {
            assert!(Arc::ptr_eq(&locks[0], lock));
        }
    }
}

//! Cache store - `CacheMedium` 위에 `CacheEntry` 직렬화를 얹은 얇은 래퍼
//!
//! 저장소는 만료를 판단하지 않는다. 읽기 실패(매체 에러, 손상된 JSON)는
//! 모두 캐시 미스로 강등되고 `warn!` 로그만 남는다.

use super::entry::CacheEntry;
use super::medium::{CacheMedium, MemoryCacheMedium};
use crate::Result;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{trace, warn};

/// 캐시 저장소
#[derive(Clone)]
pub struct CacheStore {
    medium: Arc<dyn CacheMedium>,
    /// 컨테이너별 직렬화 락
    locks: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl std::fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore")
            .field("medium", &self.medium.name())
            .finish()
    }
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::memory()
    }
}

impl CacheStore {
    pub fn new(medium: Arc<dyn CacheMedium>) -> Self {
        Self {
            medium,
            locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// 세션 범위 메모리 저장소
    pub fn memory() -> Self {
        Self::new(Arc::new(MemoryCacheMedium::new()))
    }

    pub fn medium(&self) -> &Arc<dyn CacheMedium> {
        &self.medium
    }

    /// 엔트리 조회
    ///
    /// 손상되었거나 읽을 수 없는 엔트리는 `None`.
    pub async fn get<T: DeserializeOwned>(
        &self,
        container: &str,
        key: &str,
    ) -> Option<CacheEntry<T>> {
        let raw = match self.medium.get(container, key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(cache_name = container, cache_key = key, error = %e, "Cache read failed, treating as miss");
                return None;
            }
        };

        match serde_json::from_str::<CacheEntry<T>>(&raw) {
            Ok(entry) => {
                trace!(cache_name = container, cache_key = key, "Cache entry loaded");
                Some(entry)
            }
            Err(e) => {
                warn!(cache_name = container, cache_key = key, error = %e, "Corrupt cache entry, treating as miss");
                None
            }
        }
    }

    /// 엔트리 저장 (무조건 덮어쓰기)
    pub async fn put<T: Serialize>(&self, container: &str, entry: &CacheEntry<T>) -> Result<()> {
        let raw = serde_json::to_string(entry)?;
        self.medium.put(container, &entry.key, raw).await?;
        trace!(cache_name = container, cache_key = %entry.key, expires_at = %entry.expires_at, "Cache entry stored");
        Ok(())
    }

    /// 엔트리 삭제 (없으면 no-op)
    pub async fn delete(&self, container: &str, key: &str) -> Result<()> {
        self.medium.delete(container, key).await
    }

    /// 영구 엔트리가 아니면 삭제
    ///
    /// 엔트리가 없거나 읽을 수 없으면 아무것도 하지 않는다. 삭제했으면 true.
    pub async fn purge_non_persistent(&self, container: &str, key: &str) -> Result<bool> {
        let Some(entry) = self.get::<serde_json::Value>(container, key).await else {
            return Ok(false);
        };
        if entry.persistent {
            return Ok(false);
        }
        self.medium.delete(container, key).await?;
        trace!(cache_name = container, cache_key = key, "Non-persistent cache entry purged");
        Ok(true)
    }

    /// 컨테이너 단위 비동기 락
    ///
    /// 멀티스레드 런타임에서 같은 컨테이너의 read-check-write 를 직렬화한다.
    pub async fn lock(&self, container: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .lock()
            .entry(container.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone();
        lock.lock_owned().await
    }
}

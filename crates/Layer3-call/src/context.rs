//! Call context - 코디네이터들이 공유하는 환경
//!
//! 캐시 저장소, 세션 지문을 담은 보안 저장소, 시계, 포커스 알림을 묶는다.

use callkit_foundation::{
    CacheStore, Clock, CoreConfig, FileCacheMedium, Result, SecureStorage, SystemClock,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, warn};

const FOCUS_CHANNEL_CAPACITY: usize = 16;

/// 호스트 포커스 이벤트 브로드캐스터
#[derive(Debug, Clone)]
pub struct FocusNotifier {
    sender: broadcast::Sender<()>,
}

impl Default for FocusNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl FocusNotifier {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(FOCUS_CHANNEL_CAPACITY);
        Self { sender }
    }

    /// 호스트가 포커스를 되찾았음을 알림
    pub fn notify_focus(&self) {
        let listeners = self.sender.send(()).unwrap_or(0);
        debug!(listeners, "Focus regained");
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.sender.subscribe()
    }
}

/// 코디네이터 공유 환경
#[derive(Clone)]
pub struct CallContext {
    cache: CacheStore,
    clock: Arc<dyn Clock>,
    storage: Option<SecureStorage>,
    storage_key: Option<String>,
    focus: FocusNotifier,
    default_cache_timeout: Duration,
}

impl std::fmt::Debug for CallContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallContext")
            .field("cache", &self.cache)
            .field("clock", &self.clock)
            .field("storage_key", &self.storage_key)
            .field("default_cache_timeout", &self.default_cache_timeout)
            .finish_non_exhaustive()
    }
}

impl Default for CallContext {
    fn default() -> Self {
        Self::new()
    }
}

impl CallContext {
    /// 메모리 캐시 + 시스템 시계
    pub fn new() -> Self {
        Self {
            cache: CacheStore::memory(),
            clock: Arc::new(SystemClock),
            storage: None,
            storage_key: None,
            focus: FocusNotifier::new(),
            default_cache_timeout: Duration::from_secs(
                callkit_foundation::DEFAULT_CACHE_TIMEOUT_SECS,
            ),
        }
    }

    /// 파일 설정으로부터 생성
    ///
    /// `cacheDir` 가 있으면 파일 캐시, `passphrase` 와 `storageKey` 가
    /// 모두 있으면 세션 저장소를 연결한다.
    pub fn from_core(core: &CoreConfig) -> Result<Self> {
        let mut ctx = Self::new().default_cache_timeout(Duration::from_secs(
            core.default_cache_timeout_secs,
        ));
        if let Some(dir) = &core.cache_dir {
            ctx.cache = CacheStore::new(Arc::new(FileCacheMedium::new(dir)));
        }
        if let (Some(passphrase), Some(key)) = (&core.passphrase, &core.storage_key) {
            ctx = ctx.with_storage(SecureStorage::open_default(Some(passphrase))?, key.clone());
        }
        Ok(ctx)
    }

    pub fn with_cache(mut self, cache: CacheStore) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// 세션 지문 저장소 연결
    pub fn with_storage(mut self, storage: SecureStorage, key: impl Into<String>) -> Self {
        self.storage = Some(storage);
        self.storage_key = Some(key.into());
        self
    }

    pub fn with_focus(mut self, focus: FocusNotifier) -> Self {
        self.focus = focus;
        self
    }

    pub fn default_cache_timeout(mut self, timeout: Duration) -> Self {
        self.default_cache_timeout = timeout;
        self
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn focus(&self) -> &FocusNotifier {
        &self.focus
    }

    pub fn storage(&self) -> Option<&SecureStorage> {
        self.storage.as_ref()
    }

    pub fn cache_timeout(&self) -> Duration {
        self.default_cache_timeout
    }

    /// 현재 세션 지문 (저장소에 저장된 값)
    ///
    /// 파일 읽기와 키 유도는 blocking 풀에서 수행한다.
    pub async fn session(&self) -> Option<String> {
        let (Some(storage), Some(key)) = (self.storage.clone(), self.storage_key.clone()) else {
            return None;
        };
        match tokio::task::spawn_blocking(move || storage.get::<String>(&key)).await {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, "Session lookup failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use callkit_foundation::{Crypto, JsonStore};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_session_from_storage() {
        let temp = TempDir::new().unwrap();
        let storage = SecureStorage::new(
            JsonStore::new(temp.path()),
            Crypto::new(Some("k")).unwrap(),
        );
        let ctx = CallContext::new();
        assert!(ctx.session().await.is_none());

        storage.save("session", "user-42").unwrap();
        let ctx = ctx.with_storage(storage.clone(), "session");
        assert_eq!(ctx.session().await.as_deref(), Some("user-42"));

        // 저장소 변경이 바로 반영된다
        storage.save("session", "user-7").unwrap();
        assert_eq!(ctx.session().await.as_deref(), Some("user-7"));
        storage.clear(Some("session")).unwrap();
        assert!(ctx.session().await.is_none());
    }

    #[tokio::test]
    async fn test_focus_broadcast() {
        let focus = FocusNotifier::new();
        let mut a = focus.subscribe();
        let mut b = focus.subscribe();

        focus.notify_focus();
        assert!(a.recv().await.is_ok());
        assert!(b.recv().await.is_ok());
    }
}

//! Shared store - 구독 가능한 단일 값 컨테이너
//!
//! 상태는 `Arc<T>` 스냅샷으로 보관되고 `set_state` 시 통째로 교체된다.
//! 읽는 쪽은 항상 완전히 커밋된 스냅샷만 본다.

use parking_lot::{Mutex, ReentrantMutex, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::trace;

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Inner<T> {
    state: RwLock<Arc<T>>,
    /// 등록 순서 유지
    listeners: Mutex<Vec<(u64, Listener<T>)>>,
    /// set + notify 직렬화 (리스너 안에서의 재진입 허용)
    publish: ReentrantMutex<()>,
    next_id: AtomicU64,
}

/// 구독 가능한 공유 상태
///
/// ```ignore
/// let store = SharedStore::new(0u32);
/// let _sub = store.subscribe(|v| println!("now {v}"));
/// store.set_state(1);
/// store.update(|v| v + 1);
/// assert_eq!(*store.read(), 2);
/// ```
pub struct SharedStore<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for SharedStore<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> std::fmt::Debug for SharedStore<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedStore")
            .field("listeners", &self.inner.listeners.lock().len())
            .finish()
    }
}

impl<T: Default + Send + Sync + 'static> Default for SharedStore<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Send + Sync + 'static> SharedStore<T> {
    pub fn new(initial: T) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: RwLock::new(Arc::new(initial)),
                listeners: Mutex::new(Vec::new()),
                publish: ReentrantMutex::new(()),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// 현재 스냅샷
    pub fn read(&self) -> Arc<T> {
        self.inner.state.read().clone()
    }

    /// 스냅샷의 투영
    pub fn select<U>(&self, selector: impl FnOnce(&T) -> U) -> U {
        selector(&self.read())
    }

    /// 상태 교체 후 모든 구독자에게 등록 순서대로 동기 통지
    pub fn set_state(&self, next: T) {
        let _publish = self.inner.publish.lock();
        self.commit(Arc::new(next));
    }

    /// 현재 상태로부터 다음 상태 계산
    pub fn update(&self, updater: impl FnOnce(&T) -> T) {
        let _publish = self.inner.publish.lock();
        let next = updater(&self.read());
        self.commit(Arc::new(next));
    }

    fn commit(&self, next: Arc<T>) {
        *self.inner.state.write() = next.clone();

        // 통지 중 구독/해제가 가능하도록 목록을 복사해서 호출
        let listeners: Vec<Listener<T>> = self
            .inner
            .listeners
            .lock()
            .iter()
            .map(|(_, l)| l.clone())
            .collect();
        trace!(listeners = listeners.len(), "Shared store updated");
        for listener in listeners {
            listener(&next);
        }
    }

    /// 구독 등록
    ///
    /// 반환된 `Subscription` 을 drop 하면 해제된다.
    pub fn subscribe(&self, listener: impl Fn(&T) + Send + Sync + 'static) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        self.inner.listeners.lock().push((id, Arc::new(listener)));

        let weak: Weak<Inner<T>> = Arc::downgrade(&self.inner);
        Subscription {
            detach: Some(Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.listeners.lock().retain(|(lid, _)| *lid != id);
                }
            })),
        }
    }

    /// 현재 구독자 수
    pub fn subscriber_count(&self) -> usize {
        self.inner.listeners.lock().len()
    }
}

/// 구독 핸들
#[must_use = "dropping the subscription unsubscribes immediately"]
pub struct Subscription {
    detach: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub fn unsubscribe(mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.detach.is_some())
            .finish()
    }
}

//! Shared call - 키로 코디네이터 결과를 공유
//!
//! `CallOptions::share(key)` 로 만든 코디네이터는 상태가 바뀔 때마다
//! 프로세스 전역 store 에 스냅샷을 미러링한다. 다른 호출부는
//! `use_shared_call(key)` 로 같은 결과를 구독하고 제어할 수 있다.

use crate::state::{CallResponse, CallSnapshot};
use callkit_foundation::{get_api_store, NormalizedResult, Result, SharedStore, Subscription};
use futures::future::BoxFuture;
use std::sync::{Arc, Weak};

/// 공유 store 에서 코디네이터를 제어하기 위한 핸들
pub(crate) trait SharedControls: Send + Sync {
    fn shared_refresh(self: Arc<Self>) -> BoxFuture<'static, Result<()>>;
    fn shared_abort(&self);
    fn shared_clear(&self);
}

/// 공유 store 에 저장되는 상태
pub struct SharedCallState<Res> {
    pub snapshot: CallSnapshot<Res>,
    /// 순환 참조를 피하기 위해 약한 참조
    controls: Option<Weak<dyn SharedControls>>,
}

impl<Res> Default for SharedCallState<Res> {
    fn default() -> Self {
        Self {
            snapshot: CallSnapshot::default(),
            controls: None,
        }
    }
}

impl<Res> SharedCallState<Res> {
    pub(crate) fn new(snapshot: CallSnapshot<Res>, controls: Weak<dyn SharedControls>) -> Self {
        Self {
            snapshot,
            controls: Some(controls),
        }
    }

    fn controls(&self) -> Option<Arc<dyn SharedControls>> {
        self.controls.as_ref().and_then(Weak::upgrade)
    }
}

/// 공유 store 의 스냅샷 타입으로 store 조회
pub(crate) fn shared_store<Res: CallResponse>(key: &str) -> Result<SharedStore<SharedCallState<Res>>> {
    get_api_store::<SharedCallState<Res>>(key)
}

/// 공유 결과 뷰
pub struct SharedCall<Res> {
    key: String,
    store: SharedStore<SharedCallState<Res>>,
}

impl<Res> Clone for SharedCall<Res> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            store: self.store.clone(),
        }
    }
}

impl<Res> std::fmt::Debug for SharedCall<Res> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedCall").field("key", &self.key).finish()
    }
}

/// 키에 해당하는 공유 결과 뷰
///
/// 아직 코디네이터가 없으면 빈 상태를 보고, 나중에 연결된다.
/// 같은 키를 다른 응답 타입으로 요청하면 설정 에러.
pub fn use_shared_call<Res: CallResponse>(key: &str) -> Result<SharedCall<Res>> {
    Ok(SharedCall {
        key: key.to_string(),
        store: shared_store::<Res>(key)?,
    })
}

impl<Res: CallResponse> SharedCall<Res> {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn snapshot(&self) -> CallSnapshot<Res> {
        self.store.select(|s| s.snapshot.clone())
    }

    pub fn data(&self) -> Option<Res> {
        self.store.select(|s| s.snapshot.data().cloned())
    }

    pub fn response(&self) -> Option<Arc<NormalizedResult<Res>>> {
        self.store.select(|s| s.snapshot.response().cloned())
    }

    pub fn loading(&self) -> bool {
        self.store.select(|s| s.snapshot.loading)
    }

    /// 살아있는 코디네이터가 연결되어 있는지
    pub fn is_connected(&self) -> bool {
        self.store.select(|s| s.controls().is_some())
    }

    /// 연결된 코디네이터 refresh (없으면 false)
    pub async fn refresh(&self) -> Result<bool> {
        let Some(controls) = self.store.select(|s| s.controls()) else {
            return Ok(false);
        };
        controls.shared_refresh().await?;
        Ok(true)
    }

    pub fn abort(&self) {
        if let Some(controls) = self.store.select(|s| s.controls()) {
            controls.shared_abort();
        }
    }

    pub fn clear(&self) {
        if let Some(controls) = self.store.select(|s| s.controls()) {
            controls.shared_clear();
        }
    }

    /// 스냅샷 변경 구독
    pub fn subscribe(
        &self,
        listener: impl Fn(&CallSnapshot<Res>) + Send + Sync + 'static,
    ) -> Subscription {
        self.store.subscribe(move |state| listener(&state.snapshot))
    }
}

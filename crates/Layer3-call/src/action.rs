//! Action / Send - 캐시 없는 단발 요청
//!
//! `execute()` 는 이전 실행을 취소하고 새 요청을 하나 보낸다. 진행률은
//! 전송 계층의 업로드/다운로드 이벤트로부터 계산되며 한 실행 안에서
//! 감소하지 않는다.

use crate::options::ActionOptions;
use crate::state::ResultSlot;
use callkit_client::{ApiMethod, Progress, ProgressFn};
use callkit_foundation::{NormalizedResult, Result};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// 액션 상태 스냅샷
#[derive(Debug)]
pub struct ActionSnapshot<Res> {
    pub loading: bool,
    /// 0..=100
    pub progress: u8,
    pub result: ResultSlot<Res>,
}

impl<Res> Clone for ActionSnapshot<Res> {
    fn clone(&self) -> Self {
        Self {
            loading: self.loading,
            progress: self.progress,
            result: self.result.clone(),
        }
    }
}

impl<Res> Default for ActionSnapshot<Res> {
    fn default() -> Self {
        Self {
            loading: false,
            progress: 0,
            result: ResultSlot::Unset,
        }
    }
}

impl<Res> ActionSnapshot<Res> {
    pub fn response(&self) -> Option<&Arc<NormalizedResult<Res>>> {
        self.result.as_result()
    }

    pub fn data(&self) -> Option<&Res> {
        self.response().and_then(|r| r.payload.as_ref())
    }
}

struct Inner<Req, Res> {
    api: Arc<dyn ApiMethod<Req, Res>>,
    options: ActionOptions<Req, Res>,
    state: watch::Sender<ActionSnapshot<Res>>,
    cancel: Mutex<Option<CancellationToken>>,
    generation: AtomicU64,
}

impl<Req, Res> Inner<Req, Res> {
    fn current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// 현재 실행일 때만 게시
    fn publish_if(&self, generation: u64, f: impl FnOnce(&mut ActionSnapshot<Res>)) -> bool {
        let _cancel = self.cancel.lock();
        if !self.current(generation) {
            return false;
        }
        self.state.send_modify(f);
        true
    }

    fn begin(&self) -> (u64, CancellationToken) {
        let mut cancel = self.cancel.lock();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let token = CancellationToken::new();
        if let Some(previous) = cancel.replace(token.clone()) {
            previous.cancel();
        }
        (generation, token)
    }

    fn abort(&self) {
        {
            let mut cancel = self.cancel.lock();
            self.generation.fetch_add(1, Ordering::SeqCst);
            if let Some(token) = cancel.take() {
                token.cancel();
            }
        }
        self.state.send_modify(|s| {
            s.loading = false;
            s.progress = 0;
        });
    }
}

impl<Req, Res> Drop for Inner<Req, Res> {
    fn drop(&mut self) {
        if !self.options.abort_on_drop {
            return;
        }
        if let Some(token) = self.cancel.get_mut().take() {
            token.cancel();
        }
    }
}

/// 단발 요청 핸들
pub struct ApiAction<Req, Res> {
    inner: Arc<Inner<Req, Res>>,
}

impl<Req, Res> Clone for ApiAction<Req, Res> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<Req, Res> std::fmt::Debug for ApiAction<Req, Res> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiAction")
            .field("api", &self.inner.api.name())
            .finish_non_exhaustive()
    }
}

/// 액션 생성
pub fn use_action<Req, Res>(
    api: Arc<dyn ApiMethod<Req, Res>>,
    options: ActionOptions<Req, Res>,
) -> ApiAction<Req, Res>
where
    Req: Send + 'static,
    Res: Send + Sync + 'static,
{
    let (state, _) = watch::channel(ActionSnapshot::default());
    ApiAction {
        inner: Arc::new(Inner {
            api,
            options,
            state,
            cancel: Mutex::new(None),
            generation: AtomicU64::new(0),
        }),
    }
}

impl<Req, Res> ApiAction<Req, Res>
where
    Req: Send + 'static,
    Res: Send + Sync + 'static,
{
    /// 요청 실행
    ///
    /// 반환값은 요청 함수가 돌려준 결과 그대로다. 다른 실행에 밀려났거나
    /// 취소된 경우 상태와 콜백에는 반영되지 않는다.
    pub async fn execute(&self, payload: Req) -> Result<Arc<NormalizedResult<Res>>> {
        let inner = &self.inner;
        let (generation, token) = inner.begin();
        inner.publish_if(generation, |s| {
            s.loading = true;
            s.progress = 0;
        });

        let payload = match &inner.options.before_request {
            Some(transform) => transform(payload),
            None => payload,
        };

        let mut request = inner.options.request.clone();
        request.signal = Some(token);
        request.on_progress = Some(progress_tracker(
            Arc::downgrade(inner),
            generation,
            request.on_progress.take(),
        ));

        trace!(api = inner.api.name(), generation, "Executing action");
        let result = match inner.api.call(payload, request).await {
            Ok(result) => Arc::new(result),
            Err(e) => {
                inner.publish_if(generation, |s| {
                    s.loading = false;
                    s.progress = 0;
                });
                return Err(e);
            }
        };

        if result.is_cancel {
            debug!(api = inner.api.name(), generation, "Action cancelled");
            inner.publish_if(generation, |s| {
                s.loading = false;
                s.progress = 0;
            });
            return Ok(result);
        }

        let settled = result.clone();
        if !inner.publish_if(generation, move |s| {
            s.loading = false;
            s.progress = 0;
            s.result = ResultSlot::Ready(settled);
        }) {
            trace!(generation, "Discarding superseded action result");
            return Ok(result);
        }

        let options = &inner.options;
        let callback = if result.success {
            &options.on_success
        } else {
            &options.on_error
        };
        if let Some(callback) = callback {
            callback(&result);
        }
        if let Some(after_response) = &options.after_response {
            after_response(&result);
        }
        Ok(result)
    }

    /// 진행 중 실행 취소. 콜백은 호출되지 않는다.
    pub fn abort(&self) {
        debug!(api = self.inner.api.name(), "Action aborted");
        self.inner.abort();
    }

    /// 결과 초기화 (진행 중 실행은 유지)
    pub fn reset(&self) {
        self.inner.state.send_modify(|s| {
            s.loading = false;
            s.progress = 0;
            s.result = ResultSlot::Cleared;
        });
    }

    pub fn loading(&self) -> bool {
        self.inner.state.borrow().loading
    }

    pub fn progress(&self) -> u8 {
        self.inner.state.borrow().progress
    }

    pub fn response(&self) -> Option<Arc<NormalizedResult<Res>>> {
        self.inner.state.borrow().response().cloned()
    }

    pub fn snapshot(&self) -> ActionSnapshot<Res> {
        self.inner.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ActionSnapshot<Res>> {
        self.inner.state.subscribe()
    }
}

/// 진행률 콜백: 현재 실행일 때만, 증가하는 경우에만 반영
fn progress_tracker<Req, Res>(
    inner: Weak<Inner<Req, Res>>,
    generation: u64,
    forward: Option<ProgressFn>,
) -> ProgressFn
where
    Req: Send + 'static,
    Res: Send + Sync + 'static,
{
    Arc::new(move |progress: Progress| {
        if let Some(forward) = &forward {
            forward(progress);
        }
        let Some(inner) = inner.upgrade() else {
            return;
        };
        let percent = progress.percent();
        let _cancel = inner.cancel.lock();
        if !inner.current(generation) {
            return;
        }
        inner.state.send_if_modified(|s| {
            if s.loading && percent > s.progress {
                s.progress = percent;
                true
            } else {
                false
            }
        });
    })
}

// ============================================================================
// Send (parameterless)
// ============================================================================

/// 파라미터 없는 요청 핸들
pub struct ApiSend<Res> {
    action: ApiAction<(), Res>,
}

impl<Res> Clone for ApiSend<Res> {
    fn clone(&self) -> Self {
        Self {
            action: self.action.clone(),
        }
    }
}

impl<Res> std::fmt::Debug for ApiSend<Res> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ApiSend").field(&self.action).finish()
    }
}

pub fn use_send<Res>(
    api: Arc<dyn ApiMethod<(), Res>>,
    options: ActionOptions<(), Res>,
) -> ApiSend<Res>
where
    Res: Send + Sync + 'static,
{
    ApiSend {
        action: use_action(api, options),
    }
}

impl<Res> ApiSend<Res>
where
    Res: Send + Sync + 'static,
{
    pub async fn execute(&self) -> Result<Arc<NormalizedResult<Res>>> {
        self.action.execute(()).await
    }

    pub fn abort(&self) {
        self.action.abort();
    }

    pub fn reset(&self) {
        self.action.reset();
    }

    pub fn loading(&self) -> bool {
        self.action.loading()
    }

    pub fn progress(&self) -> u8 {
        self.action.progress()
    }

    pub fn response(&self) -> Option<Arc<NormalizedResult<Res>>> {
        self.action.response()
    }

    pub fn subscribe(&self) -> watch::Receiver<ActionSnapshot<Res>> {
        self.action.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_defaults() {
        let snapshot = ActionSnapshot::<u32>::default();
        assert!(!snapshot.loading);
        assert_eq!(snapshot.progress, 0);
        assert!(snapshot.result.is_unset());
        assert!(snapshot.data().is_none());
    }
}

//! Call coordinator - 언제 요청할지 결정하고 결과를 캐시/게시
//!
//! ## 상태 전이
//!
//! ```text
//! Idle ──refresh──▶ Loading ──settle──▶ Settled(Success|Error)
//!                      ▲                        │
//!                      └──── payload 변경 / refresh ┘
//! ```
//!
//! ## Flight
//!
//! `refresh()` 는 시작할 때 새 flight 를 연다. generation 카운터를 올리고
//! 이전 취소 토큰을 취소한다. 모든 상태 게시는 게시 직전에 generation 을
//! 확인하므로, 늦게 도착한 이전 응답은 새 상태를 덮어쓰지 못한다.
//!
//! ## 캐시
//!
//! 성공했고 취소되지 않은 결과만 저장한다. 저장되는 것은 `after_response`
//! 적용 전의 결과이며, 적중 시 `after_response` 를 다시 적용한다.
//!
//! ## 수명
//!
//! 종료는 핸들 쪽에서 일어난다. 모든 핸들이 공유하는 가드가 drop 되면
//! 진행 중 요청을 취소하고 백그라운드 작업을 중단한다. 백그라운드 refresh 가
//! 내부 상태를 잠시 붙잡고 있어도 종료는 늦춰지지 않는다.

use crate::context::CallContext;
use crate::options::CallOptions;
use crate::shared::{shared_store, SharedCallState, SharedControls};
use crate::state::{CallPayload, CallResponse, CallSnapshot, ResultSlot};
use callkit_client::ApiMethod;
use callkit_foundation::cache::key::serialize_canonical;
use callkit_foundation::{
    cache_key, CacheEntry, CacheSettings, Error, NormalizedResult, Result, SharedStore, TimeSpan,
};
use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// 캐시 대상 (컨테이너, 키, 설정)
struct CacheTarget {
    name: String,
    key: String,
    settings: CacheSettings,
}

/// 가변 상태 (락 안에서만 접근)
struct Core<Req, Res> {
    payload: Req,
    /// 마지막으로 요청을 트리거한 페이로드 (canonical). None = 아직 없음
    prev_payload: Option<String>,
    options: CallOptions<Req, Res>,
    cancel: Option<CancellationToken>,
    /// 해제 시 정리할 마지막 캐시 위치
    last_cache: Option<(String, String)>,
    interval_task: Option<JoinHandle<()>>,
    focus_task: Option<JoinHandle<()>>,
    disposed: bool,
}

struct Inner<Req, Res> {
    api: Arc<dyn ApiMethod<Req, Res>>,
    ctx: CallContext,
    state: watch::Sender<CallSnapshot<Res>>,
    core: Mutex<Core<Req, Res>>,
    generation: AtomicU64,
    shared: Option<SharedStore<SharedCallState<Res>>>,
    this: Weak<Inner<Req, Res>>,
}

/// 종료 대상 (제네릭을 지운 Inner)
trait Teardown: Send + Sync {
    /// 종료 처리. 이미 종료되었으면 None, 아니면 정리할 캐시 위치.
    fn teardown(&self) -> Option<Option<(String, String)>>;
    fn context(&self) -> &CallContext;
}

/// 핸들 수명 가드. 마지막 핸들과 함께 drop 된다.
struct HandleGuard {
    target: Arc<dyn Teardown>,
}

impl Drop for HandleGuard {
    fn drop(&mut self) {
        let Some(Some((name, key))) = self.target.teardown() else {
            return;
        };
        // 런타임 밖에서 drop 되면 정리를 건너뛴다
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let ctx = self.target.context().clone();
            handle.spawn(async move {
                purge(&ctx, &name, &key).await;
            });
        }
    }
}

/// 코디네이터 핸들
///
/// 복제본은 같은 코디네이터를 가리킨다. 마지막 핸들이 drop 되면 진행 중
/// 요청과 백그라운드 작업이 중단된다. 독립된 인스턴스는 `clone_with` 로 만든다.
pub struct CallCoordinator<Req, Res> {
    inner: Arc<Inner<Req, Res>>,
    _guard: Arc<HandleGuard>,
}

impl<Req, Res> Clone for CallCoordinator<Req, Res> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            _guard: self._guard.clone(),
        }
    }
}

impl<Req, Res> std::fmt::Debug for CallCoordinator<Req, Res> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallCoordinator")
            .field("api", &self.inner.api.name())
            .field("generation", &self.inner.generation.load(Ordering::SeqCst))
            .finish()
    }
}

/// 코디네이터 생성 후 첫 평가(최초 마운트) 수행
///
/// `hold` 가 아니면 첫 요청이 끝날 때까지 기다린다. 첫 요청 중에도 핸들이
/// 필요하면 `CallCoordinator::new` 후 `mount` 를 따로 호출한다.
pub async fn use_call<Req, Res>(
    api: Arc<dyn ApiMethod<Req, Res>>,
    payload: Req,
    options: CallOptions<Req, Res>,
    ctx: &CallContext,
) -> Result<CallCoordinator<Req, Res>>
where
    Req: CallPayload,
    Res: CallResponse,
{
    let coordinator = CallCoordinator::new(api, payload, options, ctx)?;
    coordinator.mount().await?;
    Ok(coordinator)
}

impl<Req, Res> CallCoordinator<Req, Res>
where
    Req: CallPayload,
    Res: CallResponse,
{
    /// 요청 없이 코디네이터만 생성
    ///
    /// 백그라운드 작업을 띄우므로 tokio 런타임 안에서 호출해야 한다.
    pub fn new(
        api: Arc<dyn ApiMethod<Req, Res>>,
        payload: Req,
        options: CallOptions<Req, Res>,
        ctx: &CallContext,
    ) -> Result<Self> {
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(Error::config("CallCoordinator requires a tokio runtime"));
        }
        let shared = match &options.share {
            Some(key) => Some(shared_store::<Res>(key)?),
            None => None,
        };

        let (state, _) = watch::channel(CallSnapshot::default());
        let inner = Arc::new_cyclic(|this| Inner {
            api,
            ctx: ctx.clone(),
            state,
            core: Mutex::new(Core {
                payload,
                prev_payload: None,
                options,
                cancel: None,
                last_cache: None,
                interval_task: None,
                focus_task: None,
                disposed: false,
            }),
            generation: AtomicU64::new(0),
            shared,
            this: this.clone(),
        });

        debug!(api = inner.api.name(), "Call coordinator created");
        inner.mirror();
        inner.schedule_interval();
        inner.schedule_focus();

        let target: Arc<dyn Teardown> = inner.clone();
        Ok(Self {
            inner,
            _guard: Arc::new(HandleGuard { target }),
        })
    }

    /// 첫 평가 (최초 마운트)
    ///
    /// 다시 호출해도 페이로드가 그대로면 요청하지 않는다.
    pub async fn mount(&self) -> Result<()> {
        self.inner.evaluate().await
    }

    // ========================================================================
    // Controls
    // ========================================================================

    /// 캐시 확인 후 필요하면 요청
    pub async fn refresh(&self) -> Result<()> {
        self.inner.refresh_flight().await
    }

    /// 진행 중 요청 취소 (이전 결과는 유지)
    pub fn abort(&self) {
        self.inner.abort();
    }

    /// 결과 비우기 (진행 중 요청은 유지)
    pub fn clear(&self) {
        self.inner.clear();
    }

    /// 페이로드 변경 후 평가
    pub async fn set_payload(&self, payload: Req) -> Result<()> {
        self.inner.core.lock().payload = payload;
        self.inner.evaluate().await
    }

    /// hold 변경 후 평가
    pub async fn set_hold(&self, hold: bool) -> Result<()> {
        self.inner.core.lock().options.hold = hold;
        self.inner.evaluate().await
    }

    /// 추가 의존성 변경. 값이 바뀌었을 때만 평가한다.
    pub async fn set_trigger<T: serde::Serialize + ?Sized>(&self, deps: &T) -> Result<()> {
        let next = serialize_canonical(deps);
        let changed = {
            let mut core = self.inner.core.lock();
            let changed = core.options.trigger.as_deref() != Some(next.as_str());
            core.options.trigger = Some(next);
            changed
        };
        if changed {
            self.inner.evaluate().await?;
        }
        Ok(())
    }

    /// refresh 주기 변경 (같은 값이면 재예약하지 않음)
    pub fn set_refresh_interval(&self, interval: Option<TimeSpan>) {
        let changed = {
            let mut core = self.inner.core.lock();
            let changed = core.options.refresh_interval.map(TimeSpan::to_duration)
                != interval.map(TimeSpan::to_duration);
            core.options.refresh_interval = interval;
            changed
        };
        if changed {
            self.inner.schedule_interval();
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn snapshot(&self) -> CallSnapshot<Res> {
        self.inner.state.borrow().clone()
    }

    pub fn data(&self) -> Option<Res> {
        self.inner.state.borrow().data().cloned()
    }

    pub fn response(&self) -> Option<Arc<NormalizedResult<Res>>> {
        self.inner.state.borrow().response().cloned()
    }

    pub fn loading(&self) -> bool {
        self.inner.state.borrow().loading
    }

    pub fn payload(&self) -> Req {
        self.inner.core.lock().payload.clone()
    }

    /// 상태 변경 수신기
    pub fn subscribe(&self) -> watch::Receiver<CallSnapshot<Res>> {
        self.inner.state.subscribe()
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// 같은 요청 함수/컨텍스트로 독립된 코디네이터 생성
    pub async fn clone_with(
        &self,
        payload: Req,
        options: CallOptions<Req, Res>,
    ) -> Result<CallCoordinator<Req, Res>> {
        use_call(self.inner.api.clone(), payload, options, &self.inner.ctx).await
    }

    /// 요청 취소, 백그라운드 작업 중단, 영구가 아닌 캐시 엔트리 삭제
    pub async fn dispose(&self) {
        let Some(target) = self.inner.shutdown() else {
            return;
        };
        if let Some((name, key)) = target {
            purge(&self.inner.ctx, &name, &key).await;
        }
    }
}

// ============================================================================
// Inner
// ============================================================================

impl<Req, Res> Inner<Req, Res>
where
    Req: CallPayload,
    Res: CallResponse,
{
    fn current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// 상태 게시
    ///
    /// `generation` 이 주어지면 현재 flight 일 때만 게시한다. 확인과 게시는
    /// core 락 안에서 일어나므로 새 flight 시작과 엇갈리지 않는다.
    fn publish(&self, generation: Option<u64>, f: impl FnOnce(&mut CallSnapshot<Res>)) -> bool {
        {
            let _core = self.core.lock();
            if let Some(generation) = generation {
                if !self.current(generation) {
                    return false;
                }
            }
            self.state.send_modify(f);
        }
        self.mirror();
        true
    }

    /// 공유 store 로 최신 스냅샷 복사
    fn mirror(&self) {
        let Some(store) = &self.shared else {
            return;
        };
        let snapshot = self.state.borrow().clone();
        let controls: Weak<dyn SharedControls> = self.this.clone();
        store.set_state(SharedCallState::new(snapshot, controls));
    }

    /// 평가 시점
    async fn evaluate(&self) -> Result<()> {
        let (fetch, payload, on_change) = {
            let mut core = self.core.lock();
            if core.disposed {
                return Ok(());
            }
            let current = serialize_canonical(&core.payload);
            let is_initial = core.prev_payload.is_none();
            let changed = core.prev_payload.as_deref() != Some(current.as_str());
            let fetch = (is_initial || changed) && !core.options.hold;
            if fetch {
                core.prev_payload = Some(current);
            }
            (fetch, core.payload.clone(), core.options.on_change.clone())
        };

        if fetch {
            trace!(api = self.api.name(), "Payload changed, clearing result");
            self.publish(None, |s| s.result = ResultSlot::Cleared);
        }

        if let Some(on_change) = on_change {
            let snapshot = self.state.borrow().clone();
            on_change(&payload, &snapshot);
        }

        if fetch {
            self.refresh_flight().await?;
        }
        Ok(())
    }

    /// 새 flight 시작: generation 증가 + 이전 토큰 취소
    fn begin_flight(&self) -> Option<(u64, CancellationToken, Req, CallOptions<Req, Res>)> {
        let mut core = self.core.lock();
        if core.disposed {
            return None;
        }
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let token = CancellationToken::new();
        if let Some(previous) = core.cancel.replace(token.clone()) {
            previous.cancel();
        }
        Some((generation, token, core.payload.clone(), core.options.clone()))
    }

    async fn cache_target(
        &self,
        payload: &Req,
        options: &CallOptions<Req, Res>,
    ) -> Option<CacheTarget> {
        let settings = options
            .cache
            .as_ref()?
            .normalize_with(self.ctx.cache_timeout())?;
        let name = settings
            .name
            .clone()
            .unwrap_or_else(|| self.api.name().to_string());
        let session = self.ctx.session().await;
        let key = cache_key(payload, settings.key.as_deref(), session.as_deref());
        Some(CacheTarget {
            name,
            key,
            settings,
        })
    }

    async fn refresh_flight(&self) -> Result<()> {
        let Some((generation, token, payload, options)) = self.begin_flight() else {
            return Ok(());
        };

        // 1. before_request
        let payload = match &options.before_request {
            Some(transform) => transform(payload),
            None => payload,
        };

        // 2. cache name / key
        let target = self.cache_target(&payload, &options).await;
        if let Some(target) = &target {
            self.core.lock().last_cache = Some((target.name.clone(), target.key.clone()));
        }

        if !self.publish(Some(generation), |s| s.loading = true) {
            return Ok(());
        }
        if let Some(on_before_request) = &options.on_before_request {
            on_before_request(&payload);
        }

        // 3. cache lookup
        if let Some(target) = &target {
            if let Some(cached) = self.read_cache(target).await {
                if !self.current(generation) {
                    return Ok(());
                }
                debug!(
                    cache_name = %target.name,
                    cache_key = %target.key,
                    generation,
                    "Serving from cache"
                );
                self.settle(generation, cached, &options);
                return Ok(());
            }
        }
        if !self.current(generation) {
            return Ok(());
        }

        // 4, 5. network
        let mut request = options.request.clone();
        request.signal = Some(token.clone());
        trace!(api = self.api.name(), generation, "Issuing request");
        // 취소를 무시하는 요청 함수라도 flight 는 토큰과 함께 끝난다
        let outcome = tokio::select! {
            biased;
            _ = token.cancelled() => {
                trace!(generation, "Flight cancelled before completion");
                return Ok(());
            }
            outcome = self.api.call(payload, request) => outcome,
        };
        let result = match outcome {
            Ok(result) => result,
            Err(e) => {
                self.publish(Some(generation), |s| s.loading = false);
                return Err(e);
            }
        };

        if !self.current(generation) {
            trace!(generation, "Discarding superseded response");
            return Ok(());
        }
        if result.is_cancel {
            self.publish(Some(generation), |s| s.loading = false);
            return Ok(());
        }

        // 6. publish
        let raw = result.clone();
        if !self.settle(generation, result, &options) {
            return Ok(());
        }

        // 7. cache write
        if let Some(target) = target {
            if raw.success {
                self.write_cache(&target, raw).await;
            }
        }
        Ok(())
    }

    /// after_response 적용 후 게시
    fn settle(
        &self,
        generation: u64,
        result: NormalizedResult<Res>,
        options: &CallOptions<Req, Res>,
    ) -> bool {
        let result = match &options.after_response {
            Some(transform) => result.map_payload(|p| transform(p)),
            None => result,
        };
        if !self.current(generation) {
            return false;
        }
        if let Some(on_after_response) = &options.on_after_response {
            on_after_response(&result);
        }
        let result = Arc::new(result);
        self.publish(Some(generation), move |s| {
            s.loading = false;
            s.result = ResultSlot::Ready(result);
        })
    }

    /// 유효한 캐시 엔트리 조회 (만료되었으면 삭제)
    async fn read_cache(&self, target: &CacheTarget) -> Option<NormalizedResult<Res>> {
        let cache = self.ctx.cache();
        let _guard = cache.lock(&target.name).await;
        let entry = cache.get::<Res>(&target.name, &target.key).await?;

        if !entry.is_expired(self.ctx.clock().now()) {
            return Some(entry.value);
        }

        debug!(cache_name = %target.name, cache_key = %target.key, "Cache entry expired");
        if let Err(e) = cache.delete(&target.name, &target.key).await {
            warn!(cache_name = %target.name, error = %e, "Failed to delete expired cache entry");
        }
        None
    }

    async fn write_cache(&self, target: &CacheTarget, result: NormalizedResult<Res>) {
        let entry = CacheEntry::new(
            target.key.clone(),
            result,
            self.ctx.clock().now(),
            target.settings.timeout,
            target.settings.persistent,
        );
        let cache = self.ctx.cache();
        let _guard = cache.lock(&target.name).await;
        match cache.put(&target.name, &entry).await {
            Ok(()) => trace!(
                cache_name = %target.name,
                cache_key = %target.key,
                "Cached response"
            ),
            Err(e) => warn!(cache_name = %target.name, error = %e, "Failed to write cache"),
        }
    }

    /// 종료 처리. 이미 종료되었으면 None, 아니면 정리할 캐시 위치.
    fn shutdown(&self) -> Option<Option<(String, String)>> {
        let (token, tasks, target) = {
            let mut core = self.core.lock();
            if core.disposed {
                return None;
            }
            core.disposed = true;
            self.generation.fetch_add(1, Ordering::SeqCst);
            (
                core.cancel.take(),
                [core.interval_task.take(), core.focus_task.take()],
                core.last_cache.take(),
            )
        };

        if let Some(token) = token {
            token.cancel();
        }
        for task in tasks.into_iter().flatten() {
            task.abort();
        }
        self.state.send_modify(|s| s.loading = false);
        self.mirror();
        debug!(api = self.api.name(), "Call coordinator disposed");
        Some(target)
    }

    fn abort(&self) {
        {
            let mut core = self.core.lock();
            self.generation.fetch_add(1, Ordering::SeqCst);
            if let Some(token) = core.cancel.take() {
                token.cancel();
            }
        }
        debug!(api = self.api.name(), "Request aborted");
        self.publish(None, |s| s.loading = false);
    }

    fn clear(&self) {
        self.publish(None, |s| {
            s.loading = false;
            s.result = ResultSlot::Cleared;
        });
    }

    // ========================================================================
    // Background tasks
    // ========================================================================

    fn schedule_interval(&self) {
        let mut core = self.core.lock();
        if let Some(task) = core.interval_task.take() {
            task.abort();
        }
        if core.disposed {
            return;
        }
        let Some(period) = core.options.refresh_interval.map(TimeSpan::to_duration) else {
            return;
        };
        if period.is_zero() {
            return;
        }

        let this = self.this.clone();
        core.interval_task = Some(tokio::spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut ticker = tokio::time::interval_at(start, period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let Some(inner) = this.upgrade() else {
                    break;
                };
                trace!(api = inner.api.name(), "Interval refresh");
                if let Err(e) = inner.refresh_flight().await {
                    warn!(error = %e, "Interval refresh failed");
                }
            }
        }));
    }

    fn schedule_focus(&self) {
        let mut core = self.core.lock();
        if let Some(task) = core.focus_task.take() {
            task.abort();
        }
        if core.disposed || !core.options.refetch_on_window_focus {
            return;
        }

        let this = self.this.clone();
        let mut focus = self.ctx.focus().subscribe();
        core.focus_task = Some(tokio::spawn(async move {
            loop {
                match focus.recv().await {
                    Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => break,
                }
                let Some(inner) = this.upgrade() else {
                    break;
                };
                if let Err(e) = inner.refresh_flight().await {
                    warn!(error = %e, "Focus refresh failed");
                }
            }
        }));
    }
}

async fn purge(ctx: &CallContext, name: &str, key: &str) {
    let cache = ctx.cache();
    let _guard = cache.lock(name).await;
    match cache.purge_non_persistent(name, key).await {
        Ok(true) => debug!(cache_name = name, cache_key = key, "Purged non-persistent cache entry"),
        Ok(false) => {}
        Err(e) => warn!(cache_name = name, error = %e, "Failed to purge cache entry"),
    }
}

impl<Req, Res> Teardown for Inner<Req, Res>
where
    Req: CallPayload,
    Res: CallResponse,
{
    fn teardown(&self) -> Option<Option<(String, String)>> {
        self.shutdown()
    }

    fn context(&self) -> &CallContext {
        &self.ctx
    }
}

impl<Req, Res> SharedControls for Inner<Req, Res>
where
    Req: CallPayload,
    Res: CallResponse,
{
    fn shared_refresh(self: Arc<Self>) -> BoxFuture<'static, Result<()>> {
        Box::pin(async move { self.refresh_flight().await })
    }

    fn shared_abort(&self) {
        self.abort();
    }

    fn shared_clear(&self) {
        self.clear();
    }
}

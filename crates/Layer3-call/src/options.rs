//! Coordinator / action options

use crate::state::CallSnapshot;
use callkit_client::RequestOptions;
use callkit_foundation::cache::key::serialize_canonical;
use callkit_foundation::{CacheOption, NormalizedResult, TimeSpan};
use serde::Serialize;
use std::sync::Arc;

/// 페이로드 변환
pub type Transform<T> = Arc<dyn Fn(T) -> T + Send + Sync>;

/// 결과 관찰 콜백
pub type ResultCallback<Res> = Arc<dyn Fn(&NormalizedResult<Res>) + Send + Sync>;

/// 페이로드 관찰 콜백
pub type PayloadCallback<Req> = Arc<dyn Fn(&Req) + Send + Sync>;

/// 평가 시점 콜백
pub type ChangeCallback<Req, Res> = Arc<dyn Fn(&Req, &CallSnapshot<Res>) + Send + Sync>;

// ============================================================================
// CallOptions
// ============================================================================

/// 코디네이터 옵션
pub struct CallOptions<Req, Res> {
    /// 요청 전 페이로드 변환 (캐시 키도 변환된 페이로드 기준)
    pub before_request: Option<Transform<Req>>,
    /// 결과 페이로드 변환 (캐시 적중 시에도 적용)
    pub after_response: Option<Transform<Res>>,
    pub on_before_request: Option<PayloadCallback<Req>>,
    pub on_after_response: Option<ResultCallback<Res>>,
    /// 모든 평가 시점에서 호출
    pub on_change: Option<ChangeCallback<Req, Res>>,
    /// 추가 평가 의존성 (canonical JSON)
    pub trigger: Option<String>,
    /// true 면 자동 요청 억제
    pub hold: bool,
    pub cache: Option<CacheOption>,
    pub refresh_interval: Option<TimeSpan>,
    pub refetch_on_window_focus: bool,
    pub request: RequestOptions,
    /// 공유 store 키
    pub share: Option<String>,
}

impl<Req, Res> Clone for CallOptions<Req, Res> {
    fn clone(&self) -> Self {
        Self {
            before_request: self.before_request.clone(),
            after_response: self.after_response.clone(),
            on_before_request: self.on_before_request.clone(),
            on_after_response: self.on_after_response.clone(),
            on_change: self.on_change.clone(),
            trigger: self.trigger.clone(),
            hold: self.hold,
            cache: self.cache.clone(),
            refresh_interval: self.refresh_interval,
            refetch_on_window_focus: self.refetch_on_window_focus,
            request: self.request.clone(),
            share: self.share.clone(),
        }
    }
}

impl<Req, Res> Default for CallOptions<Req, Res> {
    fn default() -> Self {
        Self {
            before_request: None,
            after_response: None,
            on_before_request: None,
            on_after_response: None,
            on_change: None,
            trigger: None,
            hold: false,
            cache: None,
            refresh_interval: None,
            refetch_on_window_focus: false,
            request: RequestOptions::default(),
            share: None,
        }
    }
}

impl<Req, Res> std::fmt::Debug for CallOptions<Req, Res> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallOptions")
            .field("hold", &self.hold)
            .field("cache", &self.cache)
            .field("refresh_interval", &self.refresh_interval)
            .field("refetch_on_window_focus", &self.refetch_on_window_focus)
            .field("share", &self.share)
            .finish_non_exhaustive()
    }
}

impl<Req, Res> CallOptions<Req, Res> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn before_request(mut self, f: impl Fn(Req) -> Req + Send + Sync + 'static) -> Self {
        self.before_request = Some(Arc::new(f));
        self
    }

    pub fn after_response(mut self, f: impl Fn(Res) -> Res + Send + Sync + 'static) -> Self {
        self.after_response = Some(Arc::new(f));
        self
    }

    pub fn on_before_request(mut self, f: impl Fn(&Req) + Send + Sync + 'static) -> Self {
        self.on_before_request = Some(Arc::new(f));
        self
    }

    pub fn on_after_response(
        mut self,
        f: impl Fn(&NormalizedResult<Res>) + Send + Sync + 'static,
    ) -> Self {
        self.on_after_response = Some(Arc::new(f));
        self
    }

    pub fn on_change(
        mut self,
        f: impl Fn(&Req, &CallSnapshot<Res>) + Send + Sync + 'static,
    ) -> Self {
        self.on_change = Some(Arc::new(f));
        self
    }

    pub fn trigger<T: Serialize + ?Sized>(mut self, deps: &T) -> Self {
        self.trigger = Some(serialize_canonical(deps));
        self
    }

    pub fn hold(mut self, hold: bool) -> Self {
        self.hold = hold;
        self
    }

    pub fn cache(mut self, cache: impl Into<CacheOption>) -> Self {
        self.cache = Some(cache.into());
        self
    }

    pub fn refresh_interval(mut self, interval: impl Into<TimeSpan>) -> Self {
        self.refresh_interval = Some(interval.into());
        self
    }

    pub fn refetch_on_window_focus(mut self, enabled: bool) -> Self {
        self.refetch_on_window_focus = enabled;
        self
    }

    pub fn request(mut self, request: RequestOptions) -> Self {
        self.request = request;
        self
    }

    pub fn share(mut self, key: impl Into<String>) -> Self {
        self.share = Some(key.into());
        self
    }
}

// ============================================================================
// ActionOptions
// ============================================================================

/// 액션 옵션
pub struct ActionOptions<Req, Res> {
    pub before_request: Option<Transform<Req>>,
    pub on_success: Option<ResultCallback<Res>>,
    pub on_error: Option<ResultCallback<Res>>,
    /// 성공/실패와 무관하게 마지막에 호출
    pub after_response: Option<ResultCallback<Res>>,
    /// 핸들이 모두 drop 되면 진행 중 요청 취소
    pub abort_on_drop: bool,
    pub request: RequestOptions,
}

impl<Req, Res> Clone for ActionOptions<Req, Res> {
    fn clone(&self) -> Self {
        Self {
            before_request: self.before_request.clone(),
            on_success: self.on_success.clone(),
            on_error: self.on_error.clone(),
            after_response: self.after_response.clone(),
            abort_on_drop: self.abort_on_drop,
            request: self.request.clone(),
        }
    }
}

impl<Req, Res> Default for ActionOptions<Req, Res> {
    fn default() -> Self {
        Self {
            before_request: None,
            on_success: None,
            on_error: None,
            after_response: None,
            abort_on_drop: false,
            request: RequestOptions::default(),
        }
    }
}

impl<Req, Res> ActionOptions<Req, Res> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn before_request(mut self, f: impl Fn(Req) -> Req + Send + Sync + 'static) -> Self {
        self.before_request = Some(Arc::new(f));
        self
    }

    pub fn on_success(mut self, f: impl Fn(&NormalizedResult<Res>) + Send + Sync + 'static) -> Self {
        self.on_success = Some(Arc::new(f));
        self
    }

    pub fn on_error(mut self, f: impl Fn(&NormalizedResult<Res>) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }

    pub fn after_response(
        mut self,
        f: impl Fn(&NormalizedResult<Res>) + Send + Sync + 'static,
    ) -> Self {
        self.after_response = Some(Arc::new(f));
        self
    }

    pub fn abort_on_drop(mut self, enabled: bool) -> Self {
        self.abort_on_drop = enabled;
        self
    }

    pub fn request(mut self, request: RequestOptions) -> Self {
        self.request = request;
        self
    }
}

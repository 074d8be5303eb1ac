//! Per-call request options

use crate::transport::ProgressFn;
use callkit_foundation::NormalizedResult;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// 결과 콜백 (unauthorized handler, notifier 등)
pub type ResultHook = Arc<dyn Fn(&NormalizedResult<Value>) + Send + Sync>;

/// Authorization 헤더 결정
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TokenOption {
    /// 전역 설정 토큰 사용 (없으면 헤더 생략)
    #[default]
    Global,
    /// 지정 토큰 사용
    Bearer(String),
    /// 헤더 생략
    Omit,
}

impl From<bool> for TokenOption {
    fn from(enabled: bool) -> Self {
        if enabled {
            TokenOption::Global
        } else {
            TokenOption::Omit
        }
    }
}

impl From<&str> for TokenOption {
    fn from(token: &str) -> Self {
        TokenOption::Bearer(token.to_string())
    }
}

impl From<String> for TokenOption {
    fn from(token: String) -> Self {
        TokenOption::Bearer(token)
    }
}

/// 요청별 암호화 설정 (전역 설정보다 우선)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CryptoOverride {
    /// 이 요청은 암호화하지 않음
    Off,
    /// core 기본 passphrase 사용
    UseCore,
    /// 지정 passphrase 사용
    Passphrase(String),
}

impl From<bool> for CryptoOverride {
    fn from(enabled: bool) -> Self {
        if enabled {
            CryptoOverride::UseCore
        } else {
            CryptoOverride::Off
        }
    }
}

/// 요청별 옵션
#[derive(Clone)]
pub struct RequestOptions {
    pub token: TokenOption,
    pub headers: BTreeMap<String, String>,
    /// 성공 시 notifier 호출 (None 이면 요청 종류의 기본값: 업로드는 false)
    pub info_success: Option<bool>,
    /// 실패 시 notifier 호출
    pub info_error: bool,
    pub encrypt_request: Option<CryptoOverride>,
    pub encrypt_response: Option<CryptoOverride>,
    pub disable_unauthorized_handler: bool,
    pub on_unauthorized: Option<ResultHook>,
    /// 취소된 요청에도 notifier / unauthorized handler 실행
    pub effects_on_cancel: bool,
    pub signal: Option<CancellationToken>,
    pub on_progress: Option<ProgressFn>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            token: TokenOption::Global,
            headers: BTreeMap::new(),
            info_success: None,
            info_error: true,
            encrypt_request: None,
            encrypt_response: None,
            disable_unauthorized_handler: false,
            on_unauthorized: None,
            effects_on_cancel: false,
            signal: None,
            on_progress: None,
        }
    }
}

impl std::fmt::Debug for RequestOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestOptions")
            .field("token", &self.token)
            .field("headers", &self.headers)
            .field("info_success", &self.info_success)
            .field("info_error", &self.info_error)
            .field("encrypt_request", &self.encrypt_request)
            .field("encrypt_response", &self.encrypt_response)
            .field("disable_unauthorized_handler", &self.disable_unauthorized_handler)
            .field("effects_on_cancel", &self.effects_on_cancel)
            .field("signal", &self.signal.is_some())
            .finish_non_exhaustive()
    }
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token(mut self, token: impl Into<TokenOption>) -> Self {
        self.token = token.into();
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn info_success(mut self, enabled: bool) -> Self {
        self.info_success = Some(enabled);
        self
    }

    pub fn info_error(mut self, enabled: bool) -> Self {
        self.info_error = enabled;
        self
    }

    pub fn encrypt_request(mut self, mode: impl Into<CryptoOverride>) -> Self {
        self.encrypt_request = Some(mode.into());
        self
    }

    pub fn encrypt_response(mut self, mode: impl Into<CryptoOverride>) -> Self {
        self.encrypt_response = Some(mode.into());
        self
    }

    pub fn disable_unauthorized_handler(mut self) -> Self {
        self.disable_unauthorized_handler = true;
        self
    }

    pub fn on_unauthorized(
        mut self,
        handler: impl Fn(&NormalizedResult<Value>) + Send + Sync + 'static,
    ) -> Self {
        self.on_unauthorized = Some(Arc::new(handler));
        self
    }

    pub fn effects_on_cancel(mut self, enabled: bool) -> Self {
        self.effects_on_cancel = enabled;
        self
    }

    pub fn signal(mut self, token: CancellationToken) -> Self {
        self.signal = Some(token);
        self
    }

    pub fn on_progress(mut self, progress: ProgressFn) -> Self {
        self.on_progress = Some(progress);
        self
    }
}

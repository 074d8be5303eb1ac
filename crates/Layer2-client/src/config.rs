//! Client configuration
//!
//! `CoreConfig` 는 파일로 저장되는 값만 담고, 여기서는 클로저와
//! 정규화기처럼 런타임에만 존재하는 구성 요소를 더한다.

use crate::normalize::{DefaultNormalizer, ResponseNormalizer};
use crate::options::{RequestOptions, ResultHook};
use callkit_foundation::{CoreConfig, NormalizedResult};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// 요청 본문 변환 (암호화 이전에 적용)
pub type BodyTransform = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// 인증 여부 판정
pub type AuthorizationCheck =
    Arc<dyn Fn(&NormalizedResult<Value>, &RequestOptions) -> bool + Send + Sync>;

/// 성공/실패 알림 채널 (toast 등)
pub trait Notifier: Send + Sync {
    fn notify(&self, result: &NormalizedResult<Value>);
}

impl<F> Notifier for F
where
    F: Fn(&NormalizedResult<Value>) + Send + Sync,
{
    fn notify(&self, result: &NormalizedResult<Value>) {
        self(result)
    }
}

/// 런타임 클라이언트 설정
#[derive(Clone)]
pub struct ClientConfig {
    pub headers: BTreeMap<String, String>,
    pub token: Option<String>,
    /// 클라이언트 기본 passphrase
    pub passphrase: Option<String>,
    /// core 기본 passphrase (`CryptoOverride::UseCore`)
    pub core_passphrase: Option<String>,
    pub encrypt_request: bool,
    pub encrypt_response: bool,
    pub before_request: Option<BodyTransform>,
    pub on_unauthorized: Option<ResultHook>,
    pub handle_authorization: Option<AuthorizationCheck>,
    pub normalizer: Arc<dyn ResponseNormalizer>,
    pub notifier: Option<Arc<dyn Notifier>>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            headers: BTreeMap::new(),
            token: None,
            passphrase: None,
            core_passphrase: None,
            encrypt_request: false,
            encrypt_response: false,
            before_request: None,
            on_unauthorized: None,
            handle_authorization: None,
            normalizer: Arc::new(DefaultNormalizer),
            notifier: None,
        }
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("headers", &self.headers)
            .field("token", &self.token.as_ref().map(|_| "***"))
            .field("encrypt_request", &self.encrypt_request)
            .field("encrypt_response", &self.encrypt_response)
            .field("notifier", &self.notifier.is_some())
            .finish_non_exhaustive()
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// 파일 설정으로부터 생성
    pub fn from_core(core: &CoreConfig) -> Self {
        Self {
            headers: core.headers.clone(),
            token: core.token.clone(),
            passphrase: core.passphrase.clone(),
            core_passphrase: core.passphrase.clone(),
            encrypt_request: core.encrypt_request,
            encrypt_response: core.encrypt_response,
            ..Self::default()
        }
    }

    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn passphrase(mut self, passphrase: impl Into<String>) -> Self {
        self.passphrase = Some(passphrase.into());
        self
    }

    pub fn core_passphrase(mut self, passphrase: impl Into<String>) -> Self {
        self.core_passphrase = Some(passphrase.into());
        self
    }

    pub fn encrypt(mut self, request: bool, response: bool) -> Self {
        self.encrypt_request = request;
        self.encrypt_response = response;
        self
    }

    pub fn before_request(mut self, transform: impl Fn(Value) -> Value + Send + Sync + 'static) -> Self {
        self.before_request = Some(Arc::new(transform));
        self
    }

    pub fn on_unauthorized(
        mut self,
        handler: impl Fn(&NormalizedResult<Value>) + Send + Sync + 'static,
    ) -> Self {
        self.on_unauthorized = Some(Arc::new(handler));
        self
    }

    pub fn handle_authorization(
        mut self,
        check: impl Fn(&NormalizedResult<Value>, &RequestOptions) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.handle_authorization = Some(Arc::new(check));
        self
    }

    pub fn normalizer(mut self, normalizer: impl ResponseNormalizer + 'static) -> Self {
        self.normalizer = Arc::new(normalizer);
        self
    }

    pub fn notifier(mut self, notifier: impl Notifier + 'static) -> Self {
        self.notifier = Some(Arc::new(notifier));
        self
    }
}

//! ApiClient - 요청 봉투
//!
//! 하나의 요청은 다음 순서로 처리된다.
//!
//! 1. 헤더 병합 (기본 < 클라이언트 < 요청별)
//! 2. Authorization 결정 (`TokenOption`)
//! 3. `before_request` 본문 변환
//! 4. 요청 본문 암호화 (요청별 설정 우선)
//! 5. transport 호출 (취소 토큰 전달)
//! 6. 암호화된 응답 본문 복호화
//! 7. `NormalizedResult` 로 정규화 (취소는 별도 결과)
//! 8. 인증 실패 처리
//! 9. 알림
//!
//! 요청 라이프사이클 실패는 모두 `Ok(NormalizedResult { success: false })` 이고
//! `Err` 는 passphrase 누락 같은 설정 오류뿐이다.

use crate::config::ClientConfig;
use crate::error::TransportError;
use crate::options::{CryptoOverride, RequestOptions, TokenOption};
use crate::transport::{
    FormData, HttpMethod, ReqwestTransport, RequestBody, Transport, TransportRequest,
    TransportResponse,
};
use callkit_foundation::crypto::{self, EncryptedPayload};
use callkit_foundation::{CoreConfig, Error, NormalizedResult, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};

const CONTENT_TYPE: &str = "Content-Type";
const AUTHORIZATION: &str = "Authorization";

/// 요청 봉투 클라이언트
#[derive(Clone)]
pub struct ApiClient {
    config: Arc<ClientConfig>,
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    pub fn new(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            config: Arc::new(config),
            transport,
        }
    }

    /// 파일 설정 + reqwest transport
    pub fn from_core(core: &CoreConfig) -> Result<Self> {
        let transport = ReqwestTransport::new(
            core.base_url.clone(),
            Duration::from_secs(core.request_timeout_secs),
        )?;
        Ok(Self::new(ClientConfig::from_core(core), Arc::new(transport)))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// 봉투를 거치지 않는 transport
    pub fn raw_client(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    // ========================================================================
    // Verbs
    // ========================================================================

    pub async fn get<T: DeserializeOwned>(
        &self,
        url: &str,
        options: RequestOptions,
    ) -> Result<NormalizedResult<T>> {
        self.request(HttpMethod::Get, url, RequestBody::Empty, options)
            .await
    }

    pub async fn delete<T: DeserializeOwned>(
        &self,
        url: &str,
        options: RequestOptions,
    ) -> Result<NormalizedResult<T>> {
        self.request(HttpMethod::Delete, url, RequestBody::Empty, options)
            .await
    }

    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
        options: RequestOptions,
    ) -> Result<NormalizedResult<T>> {
        self.request(HttpMethod::Post, url, json_body(body)?, options)
            .await
    }

    pub async fn put<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
        options: RequestOptions,
    ) -> Result<NormalizedResult<T>> {
        self.request(HttpMethod::Put, url, json_body(body)?, options)
            .await
    }

    pub async fn patch<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
        options: RequestOptions,
    ) -> Result<NormalizedResult<T>> {
        self.request(HttpMethod::Patch, url, json_body(body)?, options)
            .await
    }

    /// multipart 업로드 (성공 알림은 명시적으로 켜지 않으면 생략)
    pub async fn upload<T: DeserializeOwned>(
        &self,
        url: &str,
        form: FormData,
        mut options: RequestOptions,
    ) -> Result<NormalizedResult<T>> {
        options.info_success.get_or_insert(false);
        self.request(HttpMethod::Post, url, RequestBody::Multipart(form), options)
            .await
    }

    /// 타입 디코딩 포함 요청
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: HttpMethod,
        url: &str,
        body: RequestBody,
        options: RequestOptions,
    ) -> Result<NormalizedResult<T>> {
        Ok(self.send(method, url, body, options).await?.decode())
    }

    // ========================================================================
    // Envelope
    // ========================================================================

    /// 봉투 처리 후 JSON 결과 반환
    pub async fn send(
        &self,
        method: HttpMethod,
        url: &str,
        mut body: RequestBody,
        options: RequestOptions,
    ) -> Result<NormalizedResult<Value>> {
        // 4, 6 의 passphrase 는 전송 전에 확정해서 설정 오류를 즉시 드러낸다
        let request_passphrase = self.resolve_passphrase(
            self.config.encrypt_request,
            options.encrypt_request.as_ref(),
        )?;
        let response_passphrase = self.resolve_passphrase(
            self.config.encrypt_response,
            options.encrypt_response.as_ref(),
        )?;

        // 1. headers
        let headers = self.merge_headers(&body, &options);

        // 3. before_request
        if let (Some(transform), RequestBody::Json(value)) = (&self.config.before_request, &mut body) {
            *value = transform(std::mem::take(value));
        }

        // 4. 요청 암호화
        if let Some(passphrase) = &request_passphrase {
            match &mut body {
                RequestBody::Json(value) => {
                    *value = crypto::encrypt(&*value, passphrase)?.to_value();
                    trace!(url, "Request body encrypted");
                }
                RequestBody::Multipart(_) => {
                    debug!(url, "Multipart bodies are sent unencrypted");
                }
                RequestBody::Empty => {}
            }
        }

        // 5. dispatch
        let cancel = options.signal.clone().unwrap_or_default();
        let request = TransportRequest {
            method,
            url: url.to_string(),
            headers,
            body,
        };
        debug!(method = %method, url, "Dispatching request");
        let outcome = self
            .transport
            .send(request, cancel.clone(), options.on_progress.clone())
            .await;

        // 토큰이 취소된 뒤 도착한 응답도 취소로 취급
        let cancelled =
            cancel.is_cancelled() || matches!(outcome, Err(TransportError::Cancelled));

        // 6, 7. 복호화 + 정규화
        let result = if cancelled {
            NormalizedResult::cancelled()
        } else {
            match outcome {
                Ok(response) => self.open_response(response, response_passphrase.as_deref()),
                Err(error) => {
                    debug!(method = %method, url, error = %error, "Transport failed");
                    self.config.normalizer.normalize_error(&error)
                }
            }
        };
        trace!(url, success = result.success, status = result.status_code, "Request settled");

        let effects = !result.is_cancel || options.effects_on_cancel;

        // 8. authorization
        let authorized = self
            .config
            .handle_authorization
            .as_ref()
            .map(|check| check(&result, &options))
            .unwrap_or(true);
        if !authorized && !options.disable_unauthorized_handler && effects {
            let handler = options
                .on_unauthorized
                .as_ref()
                .or(self.config.on_unauthorized.as_ref());
            if let Some(handler) = handler {
                debug!(url, status = result.status_code, "Invoking unauthorized handler");
                handler(&result);
            }
        }

        // 9. notify
        let info_success = options.info_success.unwrap_or(true);
        let wants_notice =
            (info_success && result.success) || (options.info_error && !result.success);
        if wants_notice && effects {
            if let Some(notifier) = &self.config.notifier {
                notifier.notify(&result);
            }
        }

        Ok(result)
    }

    fn merge_headers(&self, body: &RequestBody, options: &RequestOptions) -> BTreeMap<String, String> {
        let mut headers = BTreeMap::new();
        if !matches!(body, RequestBody::Multipart(_)) {
            set_header(&mut headers, CONTENT_TYPE, "application/json");
        }
        for (name, value) in self.config.headers.iter().chain(options.headers.iter()) {
            set_header(&mut headers, name, value);
        }
        // multipart 는 transport 가 boundary 포함 Content-Type 을 붙인다
        if matches!(body, RequestBody::Multipart(_)) {
            headers.retain(|k, _| !k.eq_ignore_ascii_case(CONTENT_TYPE));
        }

        // 2. Authorization
        let bearer = match &options.token {
            TokenOption::Global => self.config.token.clone(),
            TokenOption::Bearer(token) => Some(token.clone()),
            TokenOption::Omit => None,
        };
        headers.retain(|k, _| !k.eq_ignore_ascii_case(AUTHORIZATION));
        if let Some(token) = bearer {
            headers.insert(AUTHORIZATION.to_string(), format!("Bearer {}", token));
        }
        headers
    }

    /// 요청별 설정 > 전역 설정
    ///
    /// passphrase 우선순위: 요청별 지정 > `UseCore` 의 core 기본값 > 클라이언트 기본값
    fn resolve_passphrase(
        &self,
        enabled: bool,
        override_mode: Option<&CryptoOverride>,
    ) -> Result<Option<String>> {
        let resolved = match override_mode {
            Some(CryptoOverride::Off) => return Ok(None),
            Some(CryptoOverride::Passphrase(passphrase)) => Some(passphrase.clone()),
            Some(CryptoOverride::UseCore) => self
                .config
                .core_passphrase
                .clone()
                .or_else(|| self.config.passphrase.clone()),
            None if enabled => self
                .config
                .passphrase
                .clone()
                .or_else(|| self.config.core_passphrase.clone()),
            None => return Ok(None),
        };

        match resolved {
            Some(passphrase) if !passphrase.is_empty() => Ok(Some(passphrase)),
            _ => Err(Error::config("Passphrase is required")),
        }
    }

    fn open_response(
        &self,
        mut response: TransportResponse,
        passphrase: Option<&str>,
    ) -> NormalizedResult<Value> {
        if let Some(passphrase) = passphrase {
            if let Some(sealed) = EncryptedPayload::from_value(&response.body) {
                match crypto::decrypt::<Value>(&sealed, passphrase) {
                    Ok(plain) => response.body = plain,
                    Err(e) => {
                        warn!(error = %e, "Failed to decrypt response");
                        return NormalizedResult::failure("failed to decrypt response", response.status);
                    }
                }
            }
        }
        self.config.normalizer.normalize_response(response)
    }
}

fn json_body<B: Serialize + ?Sized>(body: &B) -> Result<RequestBody> {
    Ok(RequestBody::Json(serde_json::to_value(body)?))
}

/// 대소문자 무시 덮어쓰기
fn set_header(headers: &mut BTreeMap<String, String>, name: &str, value: &str) {
    headers.retain(|k, _| !k.eq_ignore_ascii_case(name));
    headers.insert(name.to_string(), value.to_string());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::{MockResponse, MockTransport};
    use parking_lot::Mutex;
    use serde::Deserialize;
    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    #[derive(Debug, Deserialize, PartialEq)]
    struct User {
        id: u32,
        name: String,
    }

    fn client(config: ClientConfig) -> (ApiClient, Arc<MockTransport>) {
        let transport = Arc::new(MockTransport::new());
        (ApiClient::new(config, transport.clone()), transport)
    }

    fn counter() -> (Arc<Mutex<usize>>, impl Fn(&NormalizedResult<Value>) + Send + Sync) {
        let count = Arc::new(Mutex::new(0));
        let c = count.clone();
        (count, move |_: &NormalizedResult<Value>| *c.lock() += 1)
    }

    #[tokio::test]
    async fn test_typed_get() {
        let (client, transport) = client(ClientConfig::new());
        transport.push(MockResponse::json(
            200,
            json!({"status": true, "data": {"id": 1, "name": "A"}}),
        ));

        let result: NormalizedResult<User> =
            client.get("/users/1", RequestOptions::new()).await.unwrap();
        assert!(result.success);
        assert_eq!(result.payload.unwrap().name, "A");

        let sent = transport.last_request().unwrap();
        assert_eq!(sent.method, HttpMethod::Get);
        assert_eq!(sent.header("content-type"), Some("application/json"));
    }

    #[tokio::test]
    async fn test_header_precedence_and_token() {
        let (client, transport) = client(
            ClientConfig::new()
                .token("global")
                .header("X-Source", "client")
                .header("X-Keep", "yes"),
        );
        transport.fallback(MockResponse::json(200, json!({})));

        let opts = RequestOptions::new().header("x-source", "call");
        let _: NormalizedResult<Value> = client.get("/a", opts).await.unwrap();
        let sent = transport.last_request().unwrap();
        assert_eq!(sent.header("x-source"), Some("call"));
        assert_eq!(sent.header("x-keep"), Some("yes"));
        assert_eq!(sent.header("authorization"), Some("Bearer global"));

        let _: NormalizedResult<Value> = client
            .get("/a", RequestOptions::new().token("override"))
            .await
            .unwrap();
        assert_eq!(
            transport.last_request().unwrap().header("authorization"),
            Some("Bearer override")
        );

        let _: NormalizedResult<Value> = client
            .get("/a", RequestOptions::new().token(false))
            .await
            .unwrap();
        assert_eq!(transport.last_request().unwrap().header("authorization"), None);
    }

    #[tokio::test]
    async fn test_before_request_then_encrypt() {
        let (client, transport) = client(
            ClientConfig::new()
                .passphrase("k")
                .encrypt(true, true)
                .before_request(|mut v| {
                    v["stamped"] = json!(true);
                    v
                }),
        );
        let sealed = crypto::encrypt(&json!({"status": true, "data": 7}), "k").unwrap();
        transport.push(MockResponse::json(200, sealed.to_value()));

        let result: NormalizedResult<u32> = client
            .post("/x", &json!({"id": 1}), RequestOptions::new())
            .await
            .unwrap();
        assert_eq!(result.payload, Some(7));

        let sent = transport.last_request().unwrap();
        let envelope = EncryptedPayload::from_value(sent.body.as_json().unwrap()).unwrap();
        let plain: Value = crypto::decrypt(&envelope, "k").unwrap();
        assert_eq!(plain, json!({"id": 1, "stamped": true}));
    }

    #[tokio::test]
    async fn test_passphrase_resolution() {
        let (client, transport) = client(ClientConfig::new().core_passphrase("core"));
        transport.fallback(MockResponse::json(200, json!({})));

        // 요청별 지정이 우선
        let _: NormalizedResult<Value> = client
            .post(
                "/x",
                &json!(1),
                RequestOptions::new().encrypt_request(CryptoOverride::Passphrase("mine".into())),
            )
            .await
            .unwrap();
        let envelope =
            EncryptedPayload::from_value(transport.last_request().unwrap().body.as_json().unwrap())
                .unwrap();
        assert!(crypto::decrypt::<Value>(&envelope, "mine").is_ok());

        // true = core 기본값
        let _: NormalizedResult<Value> = client
            .post("/x", &json!(1), RequestOptions::new().encrypt_request(true))
            .await
            .unwrap();
        let envelope =
            EncryptedPayload::from_value(transport.last_request().unwrap().body.as_json().unwrap())
                .unwrap();
        assert!(crypto::decrypt::<Value>(&envelope, "core").is_ok());
    }

    #[tokio::test]
    async fn test_missing_passphrase_is_config_error() {
        let (client, transport) = client(ClientConfig::new().encrypt(true, false));
        let err = client
            .post::<_, Value>("/x", &json!(1), RequestOptions::new())
            .await
            .unwrap_err();
        assert!(err.is_configuration());
        assert_eq!(transport.send_count(), 0);
    }

    #[tokio::test]
    async fn test_undecryptable_response() {
        let (client, transport) = client(ClientConfig::new().passphrase("right").encrypt(false, true));
        let sealed = crypto::encrypt(&json!({"status": true}), "wrong").unwrap();
        transport.push(MockResponse::json(200, sealed.to_value()));

        let result: NormalizedResult<Value> = client.get("/x", RequestOptions::new()).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.error_message.as_deref(), Some("failed to decrypt response"));
    }

    #[tokio::test]
    async fn test_unauthorized_and_notifier() {
        let (unauth, on_unauth) = counter();
        let (notices, notify) = counter();
        let (client, transport) = client(
            ClientConfig::new()
                .handle_authorization(|r, _| r.status_code != 401)
                .on_unauthorized(on_unauth)
                .notifier(notify),
        );
        transport
            .push(MockResponse::json(401, json!({"message": "expired"})))
            .push(MockResponse::json(200, json!({"status": true, "data": 1})));

        let failed: NormalizedResult<Value> = client.get("/x", RequestOptions::new()).await.unwrap();
        assert!(!failed.success);
        assert_eq!(*unauth.lock(), 1);
        assert_eq!(*notices.lock(), 1);

        let _: NormalizedResult<Value> = client
            .get("/x", RequestOptions::new().info_success(false))
            .await
            .unwrap();
        assert_eq!(*notices.lock(), 1);
    }

    #[tokio::test]
    async fn test_per_call_unauthorized_handler_wins() {
        let (global, on_global) = counter();
        let (local, on_local) = counter();
        let (client, transport) = client(
            ClientConfig::new()
                .handle_authorization(|r, _| r.success)
                .on_unauthorized(on_global),
        );
        transport.fallback(MockResponse::json(403, Value::Null));

        let _: NormalizedResult<Value> = client
            .get("/x", RequestOptions::new().on_unauthorized(on_local))
            .await
            .unwrap();
        let _: NormalizedResult<Value> = client
            .get("/x", RequestOptions::new().disable_unauthorized_handler())
            .await
            .unwrap();

        assert_eq!(*local.lock(), 1);
        assert_eq!(*global.lock(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_suppresses_effects() {
        let (unauth, on_unauth) = counter();
        let (notices, notify) = counter();
        let (client, transport) = client(
            ClientConfig::new()
                .handle_authorization(|_, _| false)
                .on_unauthorized(on_unauth)
                .notifier(notify),
        );
        transport.fallback(
            MockResponse::json(500, json!("boom"))
                .delay(Duration::from_secs(1))
                .ignore_cancel(),
        );

        let signal = CancellationToken::new();
        let pending = {
            let client = client.clone();
            let signal = signal.clone();
            tokio::spawn(async move {
                client
                    .get::<Value>("/x", RequestOptions::new().signal(signal))
                    .await
            })
        };
        tokio::task::yield_now().await;
        signal.cancel();

        // 취소 후 늦게 도착한 응답도 취소 결과
        let result = pending.await.unwrap().unwrap();
        assert!(result.is_cancel);
        assert_eq!(*unauth.lock(), 0);
        assert_eq!(*notices.lock(), 0);

        // effects_on_cancel 이면 실행
        let cancelled = CancellationToken::new();
        cancelled.cancel();
        let _ = client
            .get::<Value>(
                "/x",
                RequestOptions::new().signal(cancelled).effects_on_cancel(true),
            )
            .await
            .unwrap();
        assert_eq!(*unauth.lock(), 1);
        assert_eq!(*notices.lock(), 1);
    }

    #[tokio::test]
    async fn test_upload_defaults() {
        let (notices, notify) = counter();
        let (client, transport) = client(ClientConfig::new().notifier(notify));
        transport.fallback(MockResponse::json(200, json!({"status": true, "data": "ok"})));

        let form = FormData::new().text("name", "report");
        let result: NormalizedResult<String> = client
            .upload("/files", form.clone(), RequestOptions::new())
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(*notices.lock(), 0);

        let sent = transport.last_request().unwrap();
        assert_eq!(sent.body, RequestBody::Multipart(form.clone()));
        assert_eq!(sent.header("content-type"), None);

        // 명시적으로 다시 켜면 알림
        let _: NormalizedResult<String> = client
            .upload("/files", form, RequestOptions::new().info_success(true))
            .await
            .unwrap();
        assert_eq!(*notices.lock(), 1);
    }

    #[tokio::test]
    async fn test_network_failure_is_result() {
        let (client, transport) = client(ClientConfig::new());
        transport.push(MockResponse::error(TransportError::Network("refused".into())));

        let result: NormalizedResult<Value> = client.get("/x", RequestOptions::new()).await.unwrap();
        assert!(!result.success);
        assert!(!result.is_cancel);
        assert_eq!(result.status_code, 0);
    }
}

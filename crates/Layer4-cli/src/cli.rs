//! Non-interactive command runners
//!
//! 각 명령은 `ApiClient` / `CallContext` 를 받아 실행되므로 테스트에서는
//! mock transport 를 주입한다.

use anyhow::{anyhow, Context};
use callkit_call::{use_action, ActionOptions, CallContext, CallCoordinator, CallOptions};
use callkit_client::{
    api_method, ApiClient, ApiMethod, FormData, HttpMethod, RequestBody, RequestOptions,
};
use callkit_foundation::{CacheProps, NormalizedResult, SecureStorage, TimeSpan};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

// ============================================================================
// Request flags
// ============================================================================

/// 요청별 플래그
#[derive(clap::Args, Debug, Clone, Default)]
pub struct RequestFlags {
    /// Bearer token for this request (overrides the configured one)
    #[arg(long, conflicts_with = "no_token")]
    pub token: Option<String>,

    /// Send without an Authorization header
    #[arg(long)]
    pub no_token: bool,

    /// Encrypt the request body and decrypt the response
    #[arg(long)]
    pub encrypt: bool,
}

impl RequestFlags {
    pub fn to_options(&self) -> RequestOptions {
        let mut options = RequestOptions::new();
        if let Some(token) = &self.token {
            options = options.token(token.as_str());
        } else if self.no_token {
            options = options.token(false);
        }
        if self.encrypt {
            options = options.encrypt_request(true).encrypt_response(true);
        }
        options
    }
}

/// `--data` JSON 파싱
pub fn parse_data(data: Option<&str>) -> anyhow::Result<Value> {
    match data {
        Some(raw) => serde_json::from_str(raw).context("--data must be valid JSON"),
        None => Ok(Value::Object(Default::default())),
    }
}

/// `key=value` 파싱
pub fn parse_pair(raw: &str) -> anyhow::Result<(String, String)> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("expected key=value, got '{}'", raw))?;
    if key.is_empty() {
        return Err(anyhow!("empty key in '{}'", raw));
    }
    Ok((key.to_string(), value.to_string()))
}

// ============================================================================
// Commands
// ============================================================================

/// 단일 요청
pub async fn run_request(
    client: &ApiClient,
    method: HttpMethod,
    url: &str,
    data: Option<Value>,
    flags: &RequestFlags,
) -> anyhow::Result<NormalizedResult<Value>> {
    let body = match data {
        Some(value) => RequestBody::Json(value),
        None => RequestBody::Empty,
    };
    debug!(method = %method, url, "Running request command");
    Ok(client.send(method, url, body, flags.to_options()).await?)
}

/// watch 설정
#[derive(Debug, Clone)]
pub struct WatchPlan {
    pub url: String,
    /// 0 이면 캐시 없음
    pub cache_secs: u64,
    pub interval_secs: u64,
    /// 0 이면 중단될 때까지
    pub times: usize,
}

fn get_method(client: &ApiClient, url: &str) -> Arc<dyn ApiMethod<(), Value>> {
    let client = client.clone();
    let path = url.to_string();
    api_method(format!("GET {}", url), move |(): (), opts: RequestOptions| {
        let client = client.clone();
        let path = path.clone();
        Box::pin(async move { client.get::<Value>(&path, opts).await })
    })
}

/// 코디네이터로 주기 요청, 정착된 결과마다 `emit` 호출
///
/// 반환값은 출력한 결과 수.
pub async fn run_watch(
    client: &ApiClient,
    ctx: &CallContext,
    plan: &WatchPlan,
    flags: &RequestFlags,
    mut emit: impl FnMut(&NormalizedResult<Value>),
) -> anyhow::Result<usize> {
    let mut options = CallOptions::new()
        .refresh_interval(TimeSpan::secs(plan.interval_secs))
        .request(flags.to_options());
    if plan.cache_secs > 0 {
        options = options.cache(CacheProps::new().timeout(TimeSpan::secs(plan.cache_secs)));
    }

    let call = CallCoordinator::new(get_method(client, &plan.url), (), options, ctx)?;

    // 첫 요청 중에도 중단할 수 있다
    tokio::select! {
        mounted = call.mount() => mounted?,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted");
            call.dispose().await;
            return Ok(0);
        }
    }
    let mut updates = call.subscribe();
    let mut emitted = 0;

    if let Some(result) = call.response() {
        emit(&result);
        emitted += 1;
    }

    while plan.times == 0 || emitted < plan.times {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = updates.borrow_and_update().clone();
                if snapshot.loading {
                    continue;
                }
                if let Some(result) = snapshot.response() {
                    emit(result);
                    emitted += 1;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }

    call.dispose().await;
    Ok(emitted)
}

/// 업로드 폼 구성
pub async fn build_form(fields: &[String], files: &[String]) -> anyhow::Result<FormData> {
    let mut form = FormData::new();
    for raw in fields {
        let (key, value) = parse_pair(raw)?;
        form = form.text(key, value);
    }
    for raw in files {
        let (key, path) = parse_pair(raw)?;
        let path = PathBuf::from(path);
        form = form
            .file_from_path(key, &path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
    }
    Ok(form)
}

/// 멀티파트 업로드, 진행률마다 `on_progress` 호출
pub async fn run_upload(
    client: &ApiClient,
    url: &str,
    form: FormData,
    flags: &RequestFlags,
    on_progress: impl Fn(u8) + Send + 'static,
) -> anyhow::Result<Arc<NormalizedResult<Value>>> {
    let upload = {
        let client = client.clone();
        let path = url.to_string();
        api_method(format!("POST {}", url), move |form: FormData, opts: RequestOptions| {
            let client = client.clone();
            let path = path.clone();
            Box::pin(async move { client.upload::<Value>(&path, form, opts).await })
        })
    };

    let action = use_action(upload, ActionOptions::new().request(flags.to_options()));
    let mut updates = action.subscribe();
    let reporter = tokio::spawn(async move {
        let mut last = 0;
        while updates.changed().await.is_ok() {
            let progress = updates.borrow_and_update().progress;
            if progress > last {
                on_progress(progress);
                last = progress;
            }
        }
    });

    let result = action.execute(form).await;
    drop(action);
    reporter.abort();
    Ok(result?)
}

/// `storage` 하위 명령
#[derive(clap::Subcommand, Debug, Clone)]
pub enum StorageAction {
    /// Store a value (parsed as JSON when possible)
    Set { value: String },
    /// Print the stored value
    Get,
    /// Remove the stored value
    Clear {
        /// Remove every key, not only the selected one
        #[arg(long)]
        all: bool,
    },
}

pub fn run_storage(
    storage: &SecureStorage,
    key: &str,
    action: &StorageAction,
) -> anyhow::Result<Option<Value>> {
    match action {
        StorageAction::Set { value } => {
            let value =
                serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.clone()));
            storage.save(key, &value)?;
            Ok(Some(value))
        }
        StorageAction::Get => Ok(storage.get::<Value>(key)),
        StorageAction::Clear { all } => {
            storage.clear(if *all { None } else { Some(key) })?;
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use callkit_client::mock::{MockResponse, MockTransport};
    use callkit_client::ClientConfig;
    use callkit_foundation::{Crypto, JsonStore};
    use serde_json::json;

    fn client(config: ClientConfig) -> (ApiClient, Arc<MockTransport>) {
        let transport = Arc::new(MockTransport::new());
        (ApiClient::new(config, transport.clone()), transport)
    }

    #[test]
    fn test_parse_pair() {
        assert_eq!(
            parse_pair("name=report=v2").unwrap(),
            ("name".to_string(), "report=v2".to_string())
        );
        assert!(parse_pair("novalue").is_err());
        assert!(parse_pair("=x").is_err());
    }

    #[test]
    fn test_parse_data() {
        assert_eq!(parse_data(Some(r#"{"a":1}"#)).unwrap(), json!({"a": 1}));
        assert_eq!(parse_data(None).unwrap(), json!({}));
        assert!(parse_data(Some("{oops")).is_err());
    }

    #[tokio::test]
    async fn test_run_request_applies_flags() {
        let (client, transport) = client(ClientConfig::new().token("global"));
        transport.fallback(MockResponse::json(200, json!({"status": true, "data": 1})));

        let flags = RequestFlags {
            token: Some("cli".into()),
            ..Default::default()
        };
        let result = run_request(&client, HttpMethod::Post, "/items", Some(json!({"x": 1})), &flags)
            .await
            .unwrap();
        assert!(result.success);
        let sent = transport.last_request().unwrap();
        assert_eq!(sent.header("authorization"), Some("Bearer cli"));
        assert_eq!(sent.body.as_json(), Some(&json!({"x": 1})));

        let flags = RequestFlags {
            no_token: true,
            ..Default::default()
        };
        run_request(&client, HttpMethod::Get, "/items", None, &flags)
            .await
            .unwrap();
        assert_eq!(transport.last_request().unwrap().header("authorization"), None);
    }

    #[tokio::test]
    async fn test_encrypt_without_passphrase_fails() {
        let (client, transport) = client(ClientConfig::new());
        let flags = RequestFlags {
            encrypt: true,
            ..Default::default()
        };
        let err = run_request(&client, HttpMethod::Get, "/secret", None, &flags)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Passphrase is required"));
        assert_eq!(transport.send_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_watch_emits_each_settled_result() {
        let (client, transport) = client(ClientConfig::new());
        for n in 1..=3 {
            transport.push(MockResponse::json(200, json!({"status": true, "data": n})));
        }

        let plan = WatchPlan {
            url: "/counter".into(),
            cache_secs: 0,
            interval_secs: 5,
            times: 3,
        };
        let mut seen = Vec::new();
        let emitted = run_watch(
            &client,
            &CallContext::new(),
            &plan,
            &RequestFlags::default(),
            |r| seen.push(r.payload.clone()),
        )
        .await
        .unwrap();

        assert_eq!(emitted, 3);
        assert_eq!(seen, vec![Some(json!(1)), Some(json!(2)), Some(json!(3))]);
        assert_eq!(transport.send_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_watch_with_cache_reuses_result() {
        let (client, transport) = client(ClientConfig::new());
        transport.fallback(MockResponse::json(200, json!({"status": true, "data": "x"})));

        let plan = WatchPlan {
            url: "/cached".into(),
            cache_secs: 60,
            interval_secs: 5,
            times: 3,
        };
        let emitted = run_watch(
            &client,
            &CallContext::new(),
            &plan,
            &RequestFlags::default(),
            |_| {},
        )
        .await
        .unwrap();
        assert_eq!(emitted, 3);
        assert_eq!(transport.send_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_upload_reports_progress() {
        let (client, transport) = client(ClientConfig::new());
        transport.push(
            MockResponse::json(200, json!({"status": true, "data": {"id": 7}}))
                .delay(std::time::Duration::from_millis(40))
                .progress(vec![(50, 100), (100, 100)]),
        );

        let reported = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let r = reported.clone();
        let form = build_form(&["kind=report".to_string()], &[]).await.unwrap();
        let result = run_upload(&client, "/files", form, &RequestFlags::default(), move |p| {
            r.lock().push(p)
        })
        .await
        .unwrap();

        assert!(result.success);
        assert_eq!(*reported.lock(), vec![50, 100]);
        assert!(matches!(
            transport.last_request().unwrap().body,
            RequestBody::Multipart(_)
        ));
    }

    #[test]
    fn test_storage_commands() {
        let temp = tempfile::TempDir::new().unwrap();
        let storage = SecureStorage::new(
            JsonStore::new(temp.path()),
            Crypto::new(Some("k")).unwrap(),
        );

        let stored = run_storage(&storage, "session", &StorageAction::Set { value: "abc".into() })
            .unwrap();
        assert_eq!(stored, Some(json!("abc")));
        assert_eq!(
            run_storage(&storage, "session", &StorageAction::Get).unwrap(),
            Some(json!("abc"))
        );

        run_storage(&storage, "session", &StorageAction::Clear { all: false }).unwrap();
        assert_eq!(run_storage(&storage, "session", &StorageAction::Get).unwrap(), None);
    }
}

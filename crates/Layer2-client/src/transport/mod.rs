//! Transport - 실제 HTTP 호출 추상화
//!
//! 요청 봉투(`ApiClient`)는 이 trait 만 알고, 구현은 교체 가능하다.
//!
//! - `ReqwestTransport`: reqwest 기반 실제 구현
//! - `MockTransport`: 스크립트 기반 테스트 구현 (feature `mock`)

mod http;
pub mod multipart;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use http::ReqwestTransport;
pub use multipart::{FormData, FormPart};

use crate::error::TransportError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// HTTP 메서드
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 요청 본문
#[derive(Debug, Clone, PartialEq, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(serde_json::Value),
    Multipart(FormData),
}

impl RequestBody {
    pub fn is_empty(&self) -> bool {
        matches!(self, RequestBody::Empty)
    }

    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            RequestBody::Json(value) => Some(value),
            _ => None,
        }
    }
}

/// 전송 요청
#[derive(Debug, Clone, PartialEq)]
pub struct TransportRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub body: RequestBody,
}

impl TransportRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: BTreeMap::new(),
            body: RequestBody::Empty,
        }
    }

    /// 대소문자 무시 헤더 조회
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// 전송 응답
///
/// JSON 이 아닌 본문은 문자열, 빈 본문은 `Null` 로 들어온다.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: serde_json::Value,
}

impl TransportResponse {
    pub fn new(status: u16, body: serde_json::Value) -> Self {
        Self { status, body }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// 업로드/다운로드 진행 이벤트
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub loaded: u64,
    pub total: Option<u64>,
}

impl Progress {
    /// `round(loaded * 100 / max(total, 1))`, 0..=100
    pub fn percent(&self) -> u8 {
        let total = self.total.unwrap_or(0).max(1);
        let pct = (self.loaded as f64 * 100.0 / total as f64).round();
        pct.clamp(0.0, 100.0) as u8
    }
}

/// 진행 콜백
pub type ProgressFn = Arc<dyn Fn(Progress) + Send + Sync>;

/// 전송 계층
#[async_trait]
pub trait Transport: Send + Sync {
    /// 요청 전송
    ///
    /// 토큰이 취소되면 가능한 한 빨리 `TransportError::Cancelled` 를 반환한다.
    async fn send(
        &self,
        request: TransportRequest,
        cancel: CancellationToken,
        progress: Option<ProgressFn>,
    ) -> Result<TransportResponse, TransportError>;
}

/// 응답 바이트 → JSON 값
pub(crate) fn parse_body(bytes: &[u8]) -> serde_json::Value {
    if bytes.iter().all(|b| b.is_ascii_whitespace()) {
        return serde_json::Value::Null;
    }
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| serde_json::Value::String(String::from_utf8_lossy(bytes).into_owned()))
}

//! Response normalization
//!
//! 서버 응답 형태는 애플리케이션마다 다르므로 `ResponseNormalizer` 를
//! 교체할 수 있게 둔다. 기본 구현은 다음 형태를 이해한다.
//!
//! ```text
//! { "status": bool, "data": any, "message": string,
//!   "paging": { limit, page, totalItems, totalPages }, "code": number }
//! ```

use crate::error::TransportError;
use crate::transport::TransportResponse;
use callkit_foundation::{NormalizedResult, Pagination};
use serde_json::Value;

/// 전송 결과 → `NormalizedResult` 변환기
pub trait ResponseNormalizer: Send + Sync {
    /// 응답을 받은 경우 (status 와 무관)
    fn normalize_response(&self, response: TransportResponse) -> NormalizedResult<Value>;

    /// 응답을 받지 못한 경우
    fn normalize_error(&self, error: &TransportError) -> NormalizedResult<Value> {
        match error {
            TransportError::Cancelled => NormalizedResult::cancelled(),
            other => NormalizedResult::failure(other.to_string(), 0),
        }
    }
}

/// 기본 정규화
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultNormalizer;

impl ResponseNormalizer for DefaultNormalizer {
    fn normalize_response(&self, response: TransportResponse) -> NormalizedResult<Value> {
        let http_ok = response.is_success();
        let status = response.status;

        let Value::Object(mut body) = response.body else {
            return plain(http_ok, status, response.body);
        };

        // 봉투 형태가 아니면 본문 전체가 페이로드
        let Some(flag) = body.get("status").and_then(Value::as_bool) else {
            return plain(http_ok, status, Value::Object(body));
        };

        let status_code = body
            .get("code")
            .and_then(Value::as_u64)
            .and_then(|c| u16::try_from(c).ok())
            .unwrap_or(status);
        let message = body
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string);
        let pagination = body
            .remove("paging")
            .and_then(|p| serde_json::from_value::<Pagination>(p).ok());
        let data = body.remove("data").filter(|d| !d.is_null());

        let mut result = if flag && http_ok {
            let mut ok = NormalizedResult::ok(data.unwrap_or(Value::Null), status_code);
            ok.error_message = message;
            ok
        } else {
            let mut failed = NormalizedResult::failure(
                message.unwrap_or_else(|| default_message(status)),
                status_code,
            );
            failed.payload = data;
            failed
        };
        result.pagination = pagination;
        result
    }
}

fn plain(http_ok: bool, status: u16, body: Value) -> NormalizedResult<Value> {
    if http_ok {
        return NormalizedResult::ok(body, status);
    }
    let message = match &body {
        Value::String(s) if !s.is_empty() => s.clone(),
        Value::Object(obj) => obj
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| default_message(status)),
        _ => default_message(status),
    };
    let mut failed = NormalizedResult::failure(message, status);
    if !body.is_null() {
        failed.payload = Some(body);
    }
    failed
}

fn default_message(status: u16) -> String {
    format!("Request failed with status code {}", status)
}

//! Normalized result - 모든 요청 결과의 공통 형태
//!
//! 전송 계층의 성공/실패/취소는 모두 `NormalizedResult` 하나로 변환되어
//! 애플리케이션 코드에 전달된다. 호출자는 에러를 catch 하는 대신
//! `success` 로 분기한다.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// 페이지네이션 메타데이터
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub limit: u64,
    pub page: u64,
    pub total_items: u64,
    pub total_pages: u64,
}

/// 정규화된 요청 결과
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedResult<T> {
    pub success: bool,

    pub payload: Option<T>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    pub status_code: u16,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,

    /// 취소된 요청 (실패가 아닌 별도 결과)
    #[serde(default)]
    pub is_cancel: bool,
}

impl<T> NormalizedResult<T> {
    /// 성공 결과
    pub fn ok(payload: T, status_code: u16) -> Self {
        Self {
            success: true,
            payload: Some(payload),
            error_message: None,
            status_code,
            pagination: None,
            is_cancel: false,
        }
    }

    /// 실패 결과
    pub fn failure(message: impl Into<String>, status_code: u16) -> Self {
        Self {
            success: false,
            payload: None,
            error_message: Some(message.into()),
            status_code,
            pagination: None,
            is_cancel: false,
        }
    }

    /// 취소 결과
    pub fn cancelled() -> Self {
        Self {
            success: false,
            payload: None,
            error_message: Some("Request cancelled".to_string()),
            status_code: 0,
            pagination: None,
            is_cancel: true,
        }
    }

    pub fn with_pagination(mut self, pagination: Option<Pagination>) -> Self {
        self.pagination = pagination;
        self
    }

    /// 페이로드 변환 (메타데이터 유지)
    pub fn map_payload<U>(self, f: impl FnOnce(T) -> U) -> NormalizedResult<U> {
        NormalizedResult {
            success: self.success,
            payload: self.payload.map(f),
            error_message: self.error_message,
            status_code: self.status_code,
            pagination: self.pagination,
            is_cancel: self.is_cancel,
        }
    }

    /// 페이로드를 버린 동일 메타데이터 결과
    fn without_payload<U>(&self) -> NormalizedResult<U> {
        NormalizedResult {
            success: self.success,
            payload: None,
            error_message: self.error_message.clone(),
            status_code: self.status_code,
            pagination: self.pagination,
            is_cancel: self.is_cancel,
        }
    }
}

impl NormalizedResult<serde_json::Value> {
    /// JSON 페이로드를 타입으로 디코딩
    ///
    /// 디코딩 실패는 에러가 아니라 실패 결과로 변환된다.
    pub fn decode<U: DeserializeOwned>(self) -> NormalizedResult<U> {
        let mut typed = self.without_payload::<U>();
        let Some(value) = self.payload else {
            return typed;
        };
        match serde_json::from_value::<U>(value) {
            Ok(payload) => typed.payload = Some(payload),
            // 실패 응답의 에러 본문은 타입이 맞지 않을 수 있음
            Err(_) if !typed.success => {}
            Err(e) => {
                typed.success = false;
                typed.error_message = Some(format!("Failed to decode response payload: {}", e));
            }
        }
        typed
    }
}

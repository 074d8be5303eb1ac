//! Transport error types
//!
//! `TransportError` 는 응답 자체를 받지 못한 경우만 표현한다.
//! non-2xx 응답은 에러가 아니라 `TransportResponse` 로 전달되고,
//! 정규화 단계에서 실패 결과가 된다.

use callkit_foundation::Error as FoundationError;
use thiserror::Error;

/// 전송 계층 에러
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// 연결 실패, DNS, 타임아웃 등
    #[error("Network error: {0}")]
    Network(String),

    /// 취소 토큰에 의해 중단
    #[error("Request cancelled")]
    Cancelled,

    /// 응답을 읽거나 해석할 수 없음
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl TransportError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, TransportError::Cancelled)
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() || err.is_body() {
            TransportError::InvalidResponse(err.to_string())
        } else {
            TransportError::Network(err.to_string())
        }
    }
}

// ============================================================================
// callkit_foundation::Error 변환
// ============================================================================

impl From<TransportError> for FoundationError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Network(msg) => FoundationError::Internal(format!("Network: {}", msg)),
            TransportError::Cancelled => FoundationError::Internal("Request cancelled".to_string()),
            TransportError::InvalidResponse(msg) => FoundationError::Serialization(msg),
        }
    }
}

//! Error types for callkit
//!
//! 모든 에러를 중앙에서 관리
//!
//! 요청 라이프사이클 실패(네트워크, 서버 에러, 취소)는 에러가 아니라
//! `NormalizedResult { success: false }` 로 표현된다. 여기 정의된 에러는
//! 설정 오류처럼 즉시 드러나야 하는 경우에만 호출자에게 전파된다.

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// callkit 에러 타입
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // 설정 관련
    // ========================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    // ========================================================================
    // 암호화 관련
    // ========================================================================
    #[error("Crypto error: {0}")]
    Crypto(String),

    // ========================================================================
    // 저장소 / 캐시 관련
    // ========================================================================
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Cache error: {0}")]
    Cache(String),

    // ========================================================================
    // 일반
    // ========================================================================
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    // ========================================================================
    // 외부 에러 변환
    // ========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ========================================================================
    // 기타
    // ========================================================================
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// 프로그래머 실수(설정 오류)인지 확인
    ///
    /// 이 카테고리는 런타임 조건이 아니므로 삼키지 않고 즉시 실패시킨다.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Error::Config(_))
    }

    /// 캐시 미스로 강등해도 되는 에러인지 확인
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::Cache(_) | Error::Storage(_) | Error::Json(_) | Error::Io(_) | Error::Crypto(_)
        )
    }

    /// 설정 에러 생성 헬퍼
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config(message.into())
    }

    /// 암호화 에러 생성 헬퍼
    pub fn crypto(message: impl Into<String>) -> Self {
        Error::Crypto(message.into())
    }
}

// ============================================================================
// From 구현 (추가 변환)
// ============================================================================

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Internal(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Internal(s.to_string())
    }
}

//! Storage module for callkit
//!
//! - `json`: JSON - 범용 파일 저장/로드
//! - `secure`: 암호화 키-값 저장소 (세션 토큰)

mod json;
mod secure;

// JSON Storage (범용)
pub use json::JsonStore;

// Secure Storage (암호화)
pub use secure::SecureStorage;

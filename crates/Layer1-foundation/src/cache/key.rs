//! Hashing utilities for cache keys
//!
//! 캐시 키 규칙:
//!
//! ```text
//! <session-ns>:<digest>
//!   session-ns = sha256(session)[..16]   (세션이 없으면 "anon")
//!   digest     = sha256(canonical(payload) + "\0" + explicit_key)
//! ```
//!
//! canonical JSON 은 객체 키를 정렬하므로 필드 순서가 달라도 같은 키가 된다.
//! 영구 매체에 저장되는 키이므로 프로세스마다 달라지는 `DefaultHasher` 대신
//! SHA-256 을 사용한다.

use serde::Serialize;
use sha2::{Digest, Sha256};

/// 세션이 없을 때의 네임스페이스
pub const ANONYMOUS_NAMESPACE: &str = "anon";

const SESSION_NS_LEN: usize = 16;

/// JSON 값을 키 정렬된 문자열로 직렬화
pub fn canonical_json(value: &serde_json::Value) -> String {
    use serde_json::Value;

    match value {
        Value::Object(obj) => {
            let mut keys: Vec<_> = obj.keys().collect();
            keys.sort();
            let body = keys
                .into_iter()
                .map(|key| {
                    format!(
                        "{}:{}",
                        serde_json::to_string(key).unwrap_or_default(),
                        canonical_json(&obj[key])
                    )
                })
                .collect::<Vec<_>>()
                .join(",");
            format!("{{{}}}", body)
        }
        Value::Array(arr) => {
            let body = arr.iter().map(canonical_json).collect::<Vec<_>>().join(",");
            format!("[{}]", body)
        }
        other => other.to_string(),
    }
}

/// 임의 직렬화 가능 값의 canonical JSON
///
/// 직렬화 실패 시 `null` 로 취급한다.
pub fn serialize_canonical<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_value(value)
        .map(|v| canonical_json(&v))
        .unwrap_or_else(|_| "null".to_string())
}

/// SHA-256 hex
pub fn sha256_hex(input: &[u8]) -> String {
    hex::encode(Sha256::digest(input))
}

/// JSON 값 해시 (키 순서 무관)
pub fn hash_json(value: &serde_json::Value) -> String {
    sha256_hex(canonical_json(value).as_bytes())
}

/// 캐시 키 생성
pub fn cache_key<T: Serialize + ?Sized>(
    payload: &T,
    explicit_key: Option<&str>,
    session: Option<&str>,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(serialize_canonical(payload).as_bytes());
    hasher.update([0u8]);
    hasher.update(explicit_key.unwrap_or_default().as_bytes());
    let digest = hex::encode(hasher.finalize());

    format!("{}:{}", session_namespace(session), digest)
}

/// 세션 지문 → 네임스페이스
pub fn session_namespace(session: Option<&str>) -> String {
    match session {
        Some(s) if !s.is_empty() => {
            let mut ns = sha256_hex(s.as_bytes());
            ns.truncate(SESSION_NS_LEN);
            ns
        }
        _ => ANONYMOUS_NAMESPACE.to_string(),
    }
}

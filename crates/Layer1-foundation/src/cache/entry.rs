//! Cache entry

use crate::result::NormalizedResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 캐시에 저장되는 응답
///
/// 만료 판정은 저장소가 아니라 읽는 쪽(코디네이터)이 `is_expired` 로 한다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry<T> {
    pub key: String,
    pub value: NormalizedResult<T>,
    pub expires_at: DateTime<Utc>,
    /// false 면 소유자 해제 시 삭제 대상
    #[serde(default)]
    pub persistent: bool,
}

impl<T> CacheEntry<T> {
    /// `now + ttl` 에 만료되는 엔트리
    pub fn new(
        key: impl Into<String>,
        value: NormalizedResult<T>,
        now: DateTime<Utc>,
        ttl: Duration,
        persistent: bool,
    ) -> Self {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
        Self {
            key: key.into(),
            value,
            expires_at: now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC),
            persistent,
        }
    }

    /// 만료 여부 (`now` 가 만료 시각 이후)
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

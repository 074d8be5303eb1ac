//! Cache configuration
//!
//! 호출부 옵션은 `bool` 또는 객체 두 형태를 받지만, 검증 직후
//! `CacheSettings` 하나로 정규화해서 내부 로직에는 유니온을 들고 가지 않는다.

use crate::config::{TimeSpan, DEFAULT_CACHE_TIMEOUT_SECS};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 호출부에서 받는 캐시 옵션 (`true` 또는 `{ ... }`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CacheOption {
    Enabled(bool),
    Config(CacheProps),
}

/// 객체 형태 캐시 옵션
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheProps {
    /// 캐시 컨테이너 이름 (기본: 요청 함수 이름)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_name: Option<String>,

    /// 명시적 키 (페이로드 해시와 함께 사용)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_key: Option<String>,

    /// 만료 시간 (숫자 = 초)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<TimeSpan>,

    /// false 면 소유자 해제 시 삭제
    #[serde(default)]
    pub persistence: bool,
}

impl CacheProps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timeout(mut self, timeout: impl Into<TimeSpan>) -> Self {
        self.timeout = Some(timeout.into());
        self
    }

    pub fn cache_name(mut self, name: impl Into<String>) -> Self {
        self.cache_name = Some(name.into());
        self
    }

    pub fn cache_key(mut self, key: impl Into<String>) -> Self {
        self.cache_key = Some(key.into());
        self
    }

    pub fn persistent(mut self, persistence: bool) -> Self {
        self.persistence = persistence;
        self
    }
}

impl From<bool> for CacheOption {
    fn from(enabled: bool) -> Self {
        CacheOption::Enabled(enabled)
    }
}

impl From<CacheProps> for CacheOption {
    fn from(props: CacheProps) -> Self {
        CacheOption::Config(props)
    }
}

/// 정규화된 캐시 설정
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    pub name: Option<String>,
    pub key: Option<String>,
    pub timeout: Duration,
    pub persistent: bool,
}

impl CacheOption {
    /// 기본 만료 시간으로 정규화 (비활성이면 None)
    pub fn normalize(&self) -> Option<CacheSettings> {
        self.normalize_with(Duration::from_secs(DEFAULT_CACHE_TIMEOUT_SECS))
    }

    pub fn normalize_with(&self, default_timeout: Duration) -> Option<CacheSettings> {
        match self {
            CacheOption::Enabled(false) => None,
            CacheOption::Enabled(true) => Some(CacheSettings {
                name: None,
                key: None,
                timeout: default_timeout,
                persistent: false,
            }),
            CacheOption::Config(props) => Some(CacheSettings {
                name: props.cache_name.clone(),
                key: props.cache_key.clone(),
                timeout: props
                    .timeout
                    .map(TimeSpan::to_duration)
                    .unwrap_or(default_timeout),
                persistent: props.persistence,
            }),
        }
    }
}

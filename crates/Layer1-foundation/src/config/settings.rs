//! Core Config - 통합 설정
//!
//! 클라이언트/캐시/암호화 기본값을 하나의 JSON 파일로 관리하는 CoreConfig

use crate::storage::JsonStore;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// 설정 파일명
pub const CORE_CONFIG_FILE: &str = "callkit.json";

/// 기본 캐시 만료 시간 (초)
pub const DEFAULT_CACHE_TIMEOUT_SECS: u64 = 60 * 5;

/// 기본 HTTP 요청 타임아웃 (초)
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

// 환경 변수
pub const ENV_BASE_URL: &str = "CALLKIT_BASE_URL";
pub const ENV_TOKEN: &str = "CALLKIT_TOKEN";
pub const ENV_PASSPHRASE: &str = "CALLKIT_PASSPHRASE";

// ============================================================================
// Core Config
// ============================================================================

/// callkit 통합 설정
///
/// 글로벌(`~/.config/callkit/`) + 프로젝트(`.callkit/`) 파일을 병합한 뒤
/// 환경 변수로 덮어쓴다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoreConfig {
    /// API 기본 URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// 모든 요청에 붙는 기본 헤더
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,

    /// 글로벌 Bearer 토큰
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// 암호화 기본 passphrase
    #[serde(skip_serializing_if = "Option::is_none")]
    pub passphrase: Option<String>,

    /// 세션 토큰이 저장된 보안 저장소 키
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_key: Option<String>,

    /// 요청 본문 암호화
    #[serde(default)]
    pub encrypt_request: bool,

    /// 응답 본문 복호화
    #[serde(default)]
    pub encrypt_response: bool,

    /// 영구 캐시 디렉토리 (없으면 메모리 캐시)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,

    /// 기본 캐시 만료 시간 (초)
    #[serde(default = "default_cache_timeout")]
    pub default_cache_timeout_secs: u64,

    /// HTTP 요청 타임아웃 (초)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl CoreConfig {
    pub fn new() -> Self {
        Self {
            default_cache_timeout_secs: DEFAULT_CACHE_TIMEOUT_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            ..Default::default()
        }
    }

    // ========================================================================
    // Load / Save
    // ========================================================================

    /// 글로벌 + 프로젝트 병합 로드, 환경 변수 적용
    pub fn load() -> Result<Self> {
        let mut config = Self::new();

        // 1. 글로벌 설정
        if let Ok(global) = JsonStore::global() {
            if let Some(global_config) = global.load_optional::<CoreConfig>(CORE_CONFIG_FILE)? {
                config.merge(global_config);
            }
        }

        // 2. 프로젝트 설정
        if let Ok(project) = JsonStore::current_project() {
            if let Some(project_config) = project.load_optional::<CoreConfig>(CORE_CONFIG_FILE)? {
                config.merge(project_config);
            }
        }

        // 3. 환경 변수
        config.apply_env();

        Ok(config)
    }

    /// 특정 파일에서 로드 (환경 변수 적용)
    pub fn load_from(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let dir = path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));
        let filename = path
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or(CORE_CONFIG_FILE)
            .to_string();

        let mut config = Self::new();
        config.merge(JsonStore::new(dir).load::<CoreConfig>(&filename)?);
        config.apply_env();
        Ok(config)
    }

    /// 환경 변수 덮어쓰기
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(ENV_BASE_URL) {
            self.base_url = Some(url);
        }
        if let Ok(token) = std::env::var(ENV_TOKEN) {
            self.token = Some(token);
        }
        if let Ok(passphrase) = std::env::var(ENV_PASSPHRASE) {
            self.passphrase = Some(passphrase);
        }
    }

    // ========================================================================
    // Merge
    // ========================================================================

    /// 다른 설정과 병합 (other가 우선)
    pub fn merge(&mut self, other: CoreConfig) {
        if other.base_url.is_some() {
            self.base_url = other.base_url;
        }
        self.headers.extend(other.headers);
        if other.token.is_some() {
            self.token = other.token;
        }
        if other.passphrase.is_some() {
            self.passphrase = other.passphrase;
        }
        if other.storage_key.is_some() {
            self.storage_key = other.storage_key;
        }
        self.encrypt_request |= other.encrypt_request;
        self.encrypt_response |= other.encrypt_response;
        if other.cache_dir.is_some() {
            self.cache_dir = other.cache_dir;
        }
        if other.default_cache_timeout_secs != DEFAULT_CACHE_TIMEOUT_SECS {
            self.default_cache_timeout_secs = other.default_cache_timeout_secs;
        }
        if other.request_timeout_secs != DEFAULT_REQUEST_TIMEOUT_SECS {
            self.request_timeout_secs = other.request_timeout_secs;
        }
    }

    // ========================================================================
    // Builder
    // ========================================================================

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn passphrase(mut self, passphrase: impl Into<String>) -> Self {
        self.passphrase = Some(passphrase.into());
        self
    }

    pub fn storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = Some(key.into());
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

fn default_cache_timeout() -> u64 {
    DEFAULT_CACHE_TIMEOUT_SECS
}

fn default_request_timeout() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

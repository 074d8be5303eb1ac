//! # callkit-foundation
//!
//! Foundation layer for callkit:
//! - Error: 중앙 에러 타입 (설정 오류만 호출자에게 전파)
//! - Config: `CoreConfig` (global + project JSON, env override), `TimeSpan`
//! - Crypto: passphrase 기반 AES-256-GCM 봉투
//! - Storage: JsonStore (범용), SecureStorage (암호화 세션 저장)
//! - Cache: 교체 가능한 매체 위의 만료형 캐시
//! - Store: 키별 공유 결과 store 레지스트리
//!
//! ## 아키텍처
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  Layer3-call   CallCoordinator / ApiAction / SharedCall │
//! │                     │                                   │
//! │  Layer2-client ApiClient ── Transport (reqwest | mock)  │
//! │                     │                                   │
//! │  Layer1-foundation                                      │
//! │   ├── CacheStore ── CacheMedium (memory | file)         │
//! │   ├── SharedStore registry                              │
//! │   ├── Crypto / SecureStorage                            │
//! │   └── CoreConfig / NormalizedResult / Clock             │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod cache;
pub mod clock;
pub mod config;
pub mod crypto;
pub mod error;
pub mod result;
pub mod storage;
pub mod store;

// ============================================================================
// Error
// ============================================================================
pub use error::{Error, Result};

// ============================================================================
// Config (설정)
// ============================================================================
pub use config::{
    CoreConfig, TimeSpan, TimeUnit, CORE_CONFIG_FILE, DEFAULT_CACHE_TIMEOUT_SECS,
    DEFAULT_REQUEST_TIMEOUT_SECS, ENV_BASE_URL, ENV_PASSPHRASE, ENV_TOKEN,
};

// ============================================================================
// Clock / Result
// ============================================================================
pub use clock::{Clock, ManualClock, SystemClock};
pub use result::{NormalizedResult, Pagination};

// ============================================================================
// Crypto / Storage
// ============================================================================
pub use crypto::{Crypto, EncryptedPayload};
pub use storage::{JsonStore, SecureStorage};

// ============================================================================
// Cache (캐시)
// ============================================================================
pub use cache::{
    cache_key, CacheEntry, CacheMedium, CacheOption, CacheProps, CacheSettings, CacheStore,
    FileCacheMedium, MemoryCacheMedium,
};

// ============================================================================
// Shared store (공유 결과)
// ============================================================================
pub use store::{get_api_store, SharedStore, Subscription};

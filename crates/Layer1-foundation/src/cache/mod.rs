//! # Cache
//!
//! 요청 결과 캐시. 매체(`CacheMedium`)는 교체 가능하고,
//! 만료 판정은 코디네이터가 `CacheEntry::is_expired` 로 수행한다.
//!
//! ```text
//! CacheOption ──normalize──▶ CacheSettings { name, key, timeout, persistent }
//!                                │
//! payload + key + session ──▶ cache_key() = "<ns>:<sha256>"
//!                                │
//!                    CacheStore ─┴─▶ CacheMedium (memory | file)
//! ```
//!
//! - [`config`] - 옵션 정규화
//! - [`key`] - 캐시 키 유도
//! - [`entry`] - 저장 단위
//! - [`medium`] - 저장 매체
//! - [`store`] - 저장소

pub mod config;
pub mod entry;
pub mod key;
pub mod medium;
pub mod store;

pub use config::{CacheOption, CacheProps, CacheSettings};
pub use entry::CacheEntry;
pub use key::{cache_key, canonical_json, hash_json, serialize_canonical, session_namespace};
pub use medium::{CacheMedium, FileCacheMedium, MemoryCacheMedium};
pub use store::CacheStore;

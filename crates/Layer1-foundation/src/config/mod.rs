//! Config - 통합 설정 관리
//!
//! - `settings.rs` - CoreConfig 통합 설정 (파일 + 환경 변수)
//! - `time.rs` - TimeSpan (초 또는 `{value, unit}`)

mod settings;
mod time;

pub use settings::{
    CoreConfig, CORE_CONFIG_FILE, DEFAULT_CACHE_TIMEOUT_SECS, DEFAULT_REQUEST_TIMEOUT_SECS,
    ENV_BASE_URL, ENV_PASSPHRASE, ENV_TOKEN,
};
pub use time::{TimeSpan, TimeUnit};

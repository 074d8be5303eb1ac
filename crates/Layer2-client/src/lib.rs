//! # callkit-client
//!
//! 요청 봉투 레이어:
//! - Transport: HTTP 추상화 (reqwest 구현, 테스트용 mock)
//! - ApiClient: 헤더/토큰/암호화/정규화/인증/알림을 한 번에 처리
//! - ApiMethod: 코디네이터가 호출하는 요청 함수 계약
//!
//! ```ignore
//! let client = ApiClient::from_core(&CoreConfig::load()?)?;
//! let user: NormalizedResult<User> = client.get("/users/1", RequestOptions::new()).await?;
//! if user.success { ... }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod method;
pub mod normalize;
pub mod options;
pub mod transport;

#[cfg(any(test, feature = "mock"))]
pub use transport::mock;

pub use client::ApiClient;
pub use config::{AuthorizationCheck, BodyTransform, ClientConfig, Notifier};
pub use error::TransportError;
pub use method::{api_method, ApiMethod, FnApiMethod};
pub use normalize::{DefaultNormalizer, ResponseNormalizer};
pub use options::{CryptoOverride, RequestOptions, ResultHook, TokenOption};
pub use transport::{
    FormData, FormPart, HttpMethod, Progress, ProgressFn, ReqwestTransport, RequestBody,
    Transport, TransportRequest, TransportResponse,
};

// Foundation 재노출
pub use callkit_foundation::{Error, NormalizedResult, Pagination, Result};

//! Shared result store
//!
//! 여러 호출부가 같은 키의 결과를 구독하는 최소 pub/sub 컨테이너.

mod registry;
mod shared;

pub use registry::{api_store_keys, get_api_store};
pub use shared::{SharedStore, Subscription};

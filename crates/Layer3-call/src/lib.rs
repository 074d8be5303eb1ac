//! # callkit-call
//!
//! 요청 조율 레이어:
//! - CallCoordinator: 페이로드 변화에 따른 요청, 캐시, 단일 flight 보장
//! - ApiAction / ApiSend: 캐시 없는 단발 요청 + 진행률
//! - SharedCall: 키로 공유되는 코디네이터 결과
//!
//! ```ignore
//! let ctx = CallContext::from_core(&config)?;
//! let user = use_call(fetch_user, UserQuery { id: 1 }, CallOptions::new().cache(true), &ctx).await?;
//! println!("{:?}", user.data());
//!
//! user.set_payload(UserQuery { id: 2 }).await?;
//! ```

pub mod action;
pub mod context;
pub mod coordinator;
pub mod options;
pub mod shared;
pub mod state;

pub use action::{use_action, use_send, ActionSnapshot, ApiAction, ApiSend};
pub use context::{CallContext, FocusNotifier};
pub use coordinator::{use_call, CallCoordinator};
pub use options::{
    ActionOptions, CallOptions, ChangeCallback, PayloadCallback, ResultCallback, Transform,
};
pub use shared::{use_shared_call, SharedCall, SharedCallState};
pub use state::{CallPayload, CallResponse, CallSnapshot, ResultSlot};

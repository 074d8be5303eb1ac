//! Call state

use callkit_foundation::NormalizedResult;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

/// 코디네이터 입력 페이로드
pub trait CallPayload: Serialize + Clone + Send + Sync + 'static {}
impl<T: Serialize + Clone + Send + Sync + 'static> CallPayload for T {}

/// 코디네이터 응답 페이로드 (캐시 직렬화 포함)
pub trait CallResponse: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}
impl<T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static> CallResponse for T {}

/// 결과 슬롯
///
/// `Unset` 은 한 번도 요청하지 않은 상태, `Cleared` 는 명시적으로 비운 상태.
#[derive(Debug)]
pub enum ResultSlot<Res> {
    Unset,
    Cleared,
    Ready(Arc<NormalizedResult<Res>>),
}

impl<Res> Clone for ResultSlot<Res> {
    fn clone(&self) -> Self {
        match self {
            ResultSlot::Unset => ResultSlot::Unset,
            ResultSlot::Cleared => ResultSlot::Cleared,
            ResultSlot::Ready(result) => ResultSlot::Ready(result.clone()),
        }
    }
}

impl<Res> Default for ResultSlot<Res> {
    fn default() -> Self {
        ResultSlot::Unset
    }
}

impl<Res> ResultSlot<Res> {
    pub fn as_result(&self) -> Option<&Arc<NormalizedResult<Res>>> {
        match self {
            ResultSlot::Ready(result) => Some(result),
            _ => None,
        }
    }

    pub fn is_unset(&self) -> bool {
        matches!(self, ResultSlot::Unset)
    }

    pub fn is_cleared(&self) -> bool {
        matches!(self, ResultSlot::Cleared)
    }
}

/// 구독자에게 전달되는 상태 스냅샷
#[derive(Debug)]
pub struct CallSnapshot<Res> {
    pub loading: bool,
    pub result: ResultSlot<Res>,
}

impl<Res> Clone for CallSnapshot<Res> {
    fn clone(&self) -> Self {
        Self {
            loading: self.loading,
            result: self.result.clone(),
        }
    }
}

impl<Res> Default for CallSnapshot<Res> {
    fn default() -> Self {
        Self {
            loading: false,
            result: ResultSlot::Unset,
        }
    }
}

impl<Res> CallSnapshot<Res> {
    /// 정규화 결과
    pub fn response(&self) -> Option<&Arc<NormalizedResult<Res>>> {
        self.result.as_result()
    }

    /// 결과 페이로드
    pub fn data(&self) -> Option<&Res> {
        self.response().and_then(|r| r.payload.as_ref())
    }

    pub fn success(&self) -> bool {
        self.response().map(|r| r.success).unwrap_or(false)
    }
}

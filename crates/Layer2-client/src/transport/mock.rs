//! 스크립트 기반 mock transport
//!
//! 응답을 순서대로 큐에 넣고, 각 응답마다 지연/진행 이벤트/취소 무시를
//! 지정할 수 있다. `tokio::time::pause()` 와 함께 쓰면 결정적이다.
//!
//! ```ignore
//! let transport = Arc::new(MockTransport::new());
//! transport.push(MockResponse::json(200, json!({"status": true, "data": 1})).delay(ms(100)));
//! ```

use super::{Progress, ProgressFn, Transport, TransportRequest, TransportResponse};
use crate::error::TransportError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// 스크립트된 응답 하나
#[derive(Debug, Clone)]
pub struct MockResponse {
    outcome: Result<TransportResponse, TransportError>,
    delay: Duration,
    ignore_cancel: bool,
    progress: Vec<(u64, u64)>,
}

impl MockResponse {
    pub fn json(status: u16, body: serde_json::Value) -> Self {
        Self::outcome(Ok(TransportResponse::new(status, body)))
    }

    pub fn error(error: TransportError) -> Self {
        Self::outcome(Err(error))
    }

    fn outcome(outcome: Result<TransportResponse, TransportError>) -> Self {
        Self {
            outcome,
            delay: Duration::ZERO,
            ignore_cancel: false,
            progress: Vec::new(),
        }
    }

    /// 응답까지의 지연
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// 취소되어도 지연 후 응답 (늦게 도착하는 응답 재현)
    pub fn ignore_cancel(mut self) -> Self {
        self.ignore_cancel = true;
        self
    }

    /// 지연 구간에 균등하게 배치되는 `(loaded, total)` 진행 이벤트
    pub fn progress(mut self, events: Vec<(u64, u64)>) -> Self {
        self.progress = events;
        self
    }
}

/// mock transport
#[derive(Debug, Default)]
pub struct MockTransport {
    queue: Mutex<VecDeque<MockResponse>>,
    fallback: Mutex<Option<MockResponse>>,
    requests: Mutex<Vec<TransportRequest>>,
    sends: AtomicUsize,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// 응답 예약 (FIFO)
    pub fn push(&self, response: MockResponse) -> &Self {
        self.queue.lock().push_back(response);
        self
    }

    /// 큐가 비었을 때 반복 사용할 응답
    pub fn fallback(&self, response: MockResponse) -> &Self {
        *self.fallback.lock() = Some(response);
        self
    }

    /// `send` 호출 횟수
    pub fn send_count(&self) -> usize {
        self.sends.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<TransportRequest> {
        self.requests.lock().clone()
    }

    pub fn last_request(&self) -> Option<TransportRequest> {
        self.requests.lock().last().cloned()
    }

    fn next_response(&self) -> Option<MockResponse> {
        self.queue.lock()
            .pop_front()
            .or_else(|| self.fallback.lock().clone())
    }
}

/// 지연 대기. 취소되면 true.
async fn wait(step: Duration, cancel: &CancellationToken, ignore_cancel: bool) -> bool {
    if ignore_cancel {
        tokio::time::sleep(step).await;
        return false;
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => true,
        _ = tokio::time::sleep(step) => false,
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(
        &self,
        request: TransportRequest,
        cancel: CancellationToken,
        progress: Option<ProgressFn>,
    ) -> Result<TransportResponse, TransportError> {
        self.sends.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request);

        let Some(response) = self.next_response() else {
            return Err(TransportError::InvalidResponse(
                "no scripted response".to_string(),
            ));
        };

        let step = response.delay / (response.progress.len() as u32 + 1);
        for (loaded, total) in &response.progress {
            if wait(step, &cancel, response.ignore_cancel).await {
                return Err(TransportError::Cancelled);
            }
            if let Some(progress) = &progress {
                progress(Progress {
                    loaded: *loaded,
                    total: Some(*total),
                });
            }
        }
        if wait(step, &cancel, response.ignore_cancel).await {
            return Err(TransportError::Cancelled);
        }

        response.outcome
    }
}

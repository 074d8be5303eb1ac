//! 통합 테스트 공용 헬퍼
#![allow(dead_code)]

use callkit_call::CallContext;
use callkit_client::mock::{MockResponse, MockTransport};
use callkit_client::{api_method, ApiClient, ApiMethod, ClientConfig};
use callkit_foundation::{CacheStore, ManualClock, NormalizedResult};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: u32,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserQuery {
    pub id: u32,
}

pub struct Harness {
    pub client: ApiClient,
    pub transport: Arc<MockTransport>,
    pub clock: ManualClock,
    pub ctx: CallContext,
}

pub fn harness() -> Harness {
    harness_with(ClientConfig::new())
}

pub fn harness_with(config: ClientConfig) -> Harness {
    let transport = Arc::new(MockTransport::new());
    let clock = ManualClock::starting_now();
    let ctx = CallContext::new()
        .with_cache(CacheStore::memory())
        .with_clock(Arc::new(clock.clone()));
    Harness {
        client: ApiClient::new(config, transport.clone()),
        transport,
        clock,
        ctx,
    }
}

/// `GET /users/{id}`
pub fn fetch_user(client: &ApiClient) -> Arc<dyn ApiMethod<UserQuery, User>> {
    let client = client.clone();
    api_method("fetch_user", move |q: UserQuery, opts| {
        let client = client.clone();
        Box::pin(async move { client.get::<User>(&format!("/users/{}", q.id), opts).await })
    })
}

pub fn user_body(id: u32, name: &str) -> Value {
    json!({"status": true, "data": {"id": id, "name": name}})
}

pub fn user_response(id: u32, name: &str) -> MockResponse {
    MockResponse::json(200, user_body(id, name))
}

pub fn user(id: u32, name: &str) -> User {
    User {
        id,
        name: name.to_string(),
    }
}

pub fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

pub fn secs(secs: u64) -> Duration {
    Duration::from_secs(secs)
}

/// 호출 횟수 카운터
pub fn counter<T: ?Sized>() -> (Arc<Mutex<usize>>, impl Fn(&T) + Send + Sync + 'static) {
    let count = Arc::new(Mutex::new(0));
    let c = count.clone();
    (count, move |_: &T| *c.lock() += 1)
}

/// 전송 계층을 거치지 않고 지연 후 값을 돌려주는 요청 함수 (취소 무시)
pub fn slow_echo(delays: Vec<Duration>) -> Arc<dyn ApiMethod<u32, u32>> {
    let delays = Arc::new(Mutex::new(delays.into_iter()));
    api_method("slow_echo", move |n: u32, _opts| {
        let delay = delays.lock().next().unwrap_or_default();
        Box::pin(async move {
            tokio::time::sleep(delay).await;
            Ok(NormalizedResult::ok(n, 200))
        })
    })
}

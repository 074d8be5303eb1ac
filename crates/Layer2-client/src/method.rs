//! Request function 계약
//!
//! 코디네이터와 액션은 HTTP 를 직접 알지 않고 `ApiMethod` 만 호출한다.
//! 파라미터가 없는 요청은 `ApiMethod<(), Res>` 로 표현한다.

use crate::options::RequestOptions;
use async_trait::async_trait;
use callkit_foundation::{NormalizedResult, Result};
use futures::future::BoxFuture;
use std::sync::Arc;

/// 요청 함수
#[async_trait]
pub trait ApiMethod<Req, Res>: Send + Sync {
    /// 기본 캐시 컨테이너 이름으로도 쓰인다
    fn name(&self) -> &str;

    async fn call(&self, payload: Req, options: RequestOptions) -> Result<NormalizedResult<Res>>;
}

/// 클로저 기반 요청 함수
pub struct FnApiMethod<F> {
    name: String,
    f: F,
}

#[async_trait]
impl<Req, Res, F> ApiMethod<Req, Res> for FnApiMethod<F>
where
    Req: Send + 'static,
    Res: Send + 'static,
    F: Fn(Req, RequestOptions) -> BoxFuture<'static, Result<NormalizedResult<Res>>>
        + Send
        + Sync
        + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn call(&self, payload: Req, options: RequestOptions) -> Result<NormalizedResult<Res>> {
        (self.f)(payload, options).await
    }
}

/// 클로저를 요청 함수로 변환
///
/// ```ignore
/// let fetch_user = api_method("fetch_user", move |q: UserQuery, opts| {
///     let client = client.clone();
///     Box::pin(async move { client.get(&format!("/users/{}", q.id), opts).await })
/// });
/// ```
pub fn api_method<Req, Res, F>(name: impl Into<String>, f: F) -> Arc<dyn ApiMethod<Req, Res>>
where
    Req: Send + 'static,
    Res: Send + 'static,
    F: Fn(Req, RequestOptions) -> BoxFuture<'static, Result<NormalizedResult<Res>>>
        + Send
        + Sync
        + 'static,
{
    Arc::new(FnApiMethod {
        name: name.into(),
        f,
    })
}

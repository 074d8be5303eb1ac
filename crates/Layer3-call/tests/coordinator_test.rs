//! CallCoordinator 통합 테스트
//!
//! `cargo test -p callkit-call --test coordinator_test`

mod common;

use callkit_call::{use_call, CallCoordinator, CallOptions, ResultSlot};
use callkit_client::mock::MockResponse;
use callkit_client::TransportError;
use callkit_foundation::cache::session_namespace;
use callkit_foundation::{
    cache_key, CacheEntry, CacheMedium, CacheProps, CacheStore, Crypto, FileCacheMedium,
    JsonStore, NormalizedResult, SecureStorage, TimeSpan,
};
use common::*;
use parking_lot::Mutex;
use std::sync::Arc;

fn cached(timeout: u64) -> CacheProps {
    CacheProps::new().timeout(TimeSpan::secs(timeout))
}

// ============================================================================
// Triggering
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_initial_mount_fetches() {
    let h = harness();
    h.transport.push(user_response(1, "A"));

    let call = use_call(fetch_user(&h.client), UserQuery { id: 1 }, CallOptions::new(), &h.ctx)
        .await
        .unwrap();

    assert_eq!(h.transport.send_count(), 1);
    assert_eq!(call.data(), Some(user(1, "A")));
    assert!(!call.loading());
    assert_eq!(h.transport.last_request().unwrap().url, "/users/1");
}

#[tokio::test(start_paused = true)]
async fn test_payload_change_refetches_once() {
    let h = harness();
    h.transport.fallback(user_response(1, "A"));

    let call = use_call(fetch_user(&h.client), UserQuery { id: 1 }, CallOptions::new(), &h.ctx)
        .await
        .unwrap();
    assert_eq!(h.transport.send_count(), 1);

    // 같은 값이면 요청하지 않음
    call.set_payload(UserQuery { id: 1 }).await.unwrap();
    assert_eq!(h.transport.send_count(), 1);

    call.set_payload(UserQuery { id: 2 }).await.unwrap();
    assert_eq!(h.transport.send_count(), 2);
    assert_eq!(h.transport.last_request().unwrap().url, "/users/2");
}

#[tokio::test(start_paused = true)]
async fn test_hold_suppresses_fetch() {
    let h = harness();
    h.transport.fallback(user_response(1, "A"));

    let call = use_call(
        fetch_user(&h.client),
        UserQuery { id: 1 },
        CallOptions::new().hold(true),
        &h.ctx,
    )
    .await
    .unwrap();
    assert_eq!(h.transport.send_count(), 0);
    assert!(call.snapshot().result.is_unset());

    call.set_payload(UserQuery { id: 2 }).await.unwrap();
    assert_eq!(h.transport.send_count(), 0);

    // 수동 refresh 는 가능
    call.refresh().await.unwrap();
    assert_eq!(h.transport.send_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_releasing_hold_triggers_initial_fetch() {
    let h = harness();
    h.transport.fallback(user_response(7, "G"));

    let call = use_call(
        fetch_user(&h.client),
        UserQuery { id: 7 },
        CallOptions::new().hold(true),
        &h.ctx,
    )
    .await
    .unwrap();
    assert_eq!(h.transport.send_count(), 0);

    call.set_hold(false).await.unwrap();
    assert_eq!(h.transport.send_count(), 1);
    assert_eq!(call.data(), Some(user(7, "G")));

    // 이미 요청한 페이로드는 다시 hold 를 풀어도 요청하지 않음
    call.set_hold(true).await.unwrap();
    call.set_hold(false).await.unwrap();
    assert_eq!(h.transport.send_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_on_change_fires_at_every_evaluation() {
    let h = harness();
    h.transport.fallback(user_response(1, "A"));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let s = seen.clone();

    let call = use_call(
        fetch_user(&h.client),
        UserQuery { id: 1 },
        CallOptions::new().on_change(move |q: &UserQuery, snapshot| {
            s.lock().push((q.id, snapshot.result.is_cleared()));
        }),
        &h.ctx,
    )
    .await
    .unwrap();

    call.set_payload(UserQuery { id: 1 }).await.unwrap();
    call.set_trigger(&["tab", "b"]).await.unwrap();
    call.set_trigger(&["tab", "b"]).await.unwrap();

    // 최초 마운트, 동일 페이로드, trigger 변경 (같은 trigger 는 평가하지 않음)
    assert_eq!(*seen.lock(), vec![(1, true), (1, false), (1, false)]);
    assert_eq!(h.transport.send_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_hooks_and_transforms() {
    let h = harness();
    h.transport.push(user_response(2, "b"));
    let (before, on_before) = counter::<UserQuery>();
    let (after, on_after) = counter::<NormalizedResult<User>>();

    let call = use_call(
        fetch_user(&h.client),
        UserQuery { id: 1 },
        CallOptions::new()
            .before_request(|q: UserQuery| UserQuery { id: q.id + 1 })
            .after_response(|u: User| User {
                name: u.name.to_uppercase(),
                ..u
            })
            .on_before_request(on_before)
            .on_after_response(on_after),
        &h.ctx,
    )
    .await
    .unwrap();

    assert_eq!(h.transport.last_request().unwrap().url, "/users/2");
    assert_eq!(call.data(), Some(user(2, "B")));
    assert_eq!(*before.lock(), 1);
    assert_eq!(*after.lock(), 1);
}

// ============================================================================
// Single flight
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_superseded_response_is_discarded() {
    let h = harness();
    h.transport
        .push(user_response(1, "old").delay(ms(100)).ignore_cancel())
        .push(user_response(1, "new").delay(ms(10)));

    let call = use_call(
        fetch_user(&h.client),
        UserQuery { id: 1 },
        CallOptions::new().hold(true),
        &h.ctx,
    )
    .await
    .unwrap();

    let first = call.clone();
    let second = call.clone();
    let (a, b) = tokio::join!(first.refresh(), async move {
        tokio::time::sleep(ms(10)).await;
        second.refresh().await
    });
    a.unwrap();
    b.unwrap();

    assert_eq!(h.transport.send_count(), 2);
    assert_eq!(call.data(), Some(user(1, "new")));
    assert!(!call.loading());
}

#[tokio::test(start_paused = true)]
async fn test_late_arrival_never_overwrites_newer_state() {
    let h = harness();
    // 요청 함수가 취소 신호를 전혀 보지 않는 경우
    let api = slow_echo(vec![ms(200), ms(10)]);
    let call = use_call(api, 1, CallOptions::new().hold(true), &h.ctx)
        .await
        .unwrap();

    let first = call.clone();
    let handle = tokio::spawn(async move { first.refresh().await });
    tokio::time::sleep(ms(5)).await;

    call.set_payload(2).await.unwrap();
    call.refresh().await.unwrap();
    assert_eq!(call.data(), Some(2));

    // t=200 에 도착한 이전 응답은 버려진다
    handle.await.unwrap().unwrap();
    assert_eq!(call.data(), Some(2));
    assert!(!call.loading());
}

#[tokio::test(start_paused = true)]
async fn test_abort_keeps_settled_result() {
    let h = harness();
    h.transport
        .push(user_response(1, "A"))
        .push(user_response(1, "B").delay(ms(100)));

    let call = use_call(fetch_user(&h.client), UserQuery { id: 1 }, CallOptions::new(), &h.ctx)
        .await
        .unwrap();

    let pending = call.clone();
    let handle = tokio::spawn(async move { pending.refresh().await });
    tokio::time::sleep(ms(10)).await;
    assert!(call.loading());

    call.abort();
    assert!(!call.loading());
    handle.await.unwrap().unwrap();

    assert_eq!(call.data(), Some(user(1, "A")));
    assert!(!call.loading());
}

#[tokio::test(start_paused = true)]
async fn test_clear_does_not_cancel_in_flight() {
    let h = harness();
    h.transport
        .push(user_response(1, "A"))
        .push(user_response(1, "B").delay(ms(100)));

    let call = use_call(fetch_user(&h.client), UserQuery { id: 1 }, CallOptions::new(), &h.ctx)
        .await
        .unwrap();

    let pending = call.clone();
    let handle = tokio::spawn(async move { pending.refresh().await });
    tokio::time::sleep(ms(10)).await;

    call.clear();
    assert!(!call.loading());
    assert!(call.snapshot().result.is_cleared());

    handle.await.unwrap().unwrap();
    assert_eq!(call.data(), Some(user(1, "B")));
}

#[tokio::test(start_paused = true)]
async fn test_failure_is_a_result_not_an_error() {
    let h = harness();
    h.transport
        .push(MockResponse::error(TransportError::Network("connection reset".into())));

    let call = use_call(fetch_user(&h.client), UserQuery { id: 1 }, CallOptions::new(), &h.ctx)
        .await
        .unwrap();

    let response = call.response().unwrap();
    assert!(!response.success);
    assert!(response.error_message.as_deref().unwrap().contains("connection reset"));
}

// ============================================================================
// Cache
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_cache_scenario_hit_then_expiry() {
    let h = harness();
    h.transport
        .push(user_response(1, "A"))
        .push(user_response(1, "A2"));

    // t=0
    let call = use_call(
        fetch_user(&h.client),
        UserQuery { id: 1 },
        CallOptions::new().cache(cached(5)),
        &h.ctx,
    )
    .await
    .unwrap();
    assert_eq!(h.transport.send_count(), 1);

    // t=2: 캐시 적중
    h.clock.advance(secs(2));
    call.refresh().await.unwrap();
    assert_eq!(h.transport.send_count(), 1);
    assert_eq!(call.data(), Some(user(1, "A")));

    // t=6: 만료
    h.clock.advance(secs(4));
    call.refresh().await.unwrap();
    assert_eq!(h.transport.send_count(), 2);
    assert_eq!(call.data(), Some(user(1, "A2")));
}

#[tokio::test(start_paused = true)]
async fn test_expired_entry_deleted_before_fetch() {
    let h = harness();
    h.transport.push(user_response(1, "A")).push(MockResponse::json(
        500,
        serde_json::json!({"status": false, "message": "boom"}),
    ));

    let call = use_call(
        fetch_user(&h.client),
        UserQuery { id: 1 },
        CallOptions::new().cache(cached(5)),
        &h.ctx,
    )
    .await
    .unwrap();

    let key = cache_key(&UserQuery { id: 1 }, None, None);
    assert!(h.ctx.cache().get::<User>("fetch_user", &key).await.is_some());

    h.clock.advance(secs(6));
    call.refresh().await.unwrap();

    // 실패 결과는 저장되지 않으므로 만료 엔트리가 지워진 채로 남는다
    assert_eq!(h.transport.send_count(), 2);
    assert!(h.ctx.cache().get::<User>("fetch_user", &key).await.is_none());
    assert!(!call.snapshot().success());
}

#[tokio::test(start_paused = true)]
async fn test_after_response_applied_once_on_cache_hit() {
    let h = harness();
    h.transport.push(user_response(1, "a"));
    let options = CallOptions::new().cache(cached(60)).after_response(|u: User| User {
        name: format!("{}!", u.name),
        ..u
    });

    let call = use_call(fetch_user(&h.client), UserQuery { id: 1 }, options, &h.ctx)
        .await
        .unwrap();
    assert_eq!(call.data().unwrap().name, "a!");

    call.refresh().await.unwrap();
    assert_eq!(h.transport.send_count(), 1);
    assert_eq!(call.data().unwrap().name, "a!");
}

#[tokio::test(start_paused = true)]
async fn test_corrupt_entry_is_a_miss() {
    let h = harness();
    h.transport.push(user_response(1, "A"));

    let key = cache_key(&UserQuery { id: 1 }, None, None);
    h.ctx
        .cache()
        .medium()
        .put("fetch_user", &key, "{not json".to_string())
        .await
        .unwrap();

    let call = use_call(
        fetch_user(&h.client),
        UserQuery { id: 1 },
        CallOptions::new().cache(true),
        &h.ctx,
    )
    .await
    .unwrap();

    assert_eq!(h.transport.send_count(), 1);
    assert_eq!(call.data(), Some(user(1, "A")));
}

#[tokio::test(start_paused = true)]
async fn test_cache_name_and_key_override() {
    let h = harness();
    h.transport.fallback(user_response(1, "A"));
    let props = cached(60).cache_name("people").cache_key("v2");

    let _call = use_call(
        fetch_user(&h.client),
        UserQuery { id: 1 },
        CallOptions::new().cache(props.clone()),
        &h.ctx,
    )
    .await
    .unwrap();

    let key = cache_key(&UserQuery { id: 1 }, Some("v2"), None);
    let entry: CacheEntry<User> = h.ctx.cache().get("people", &key).await.unwrap();
    assert_eq!(entry.value.payload, Some(user(1, "A")));

    // 같은 이름/키를 쓰는 다른 코디네이터는 캐시를 공유
    let other = use_call(
        fetch_user(&h.client),
        UserQuery { id: 1 },
        CallOptions::new().cache(props),
        &h.ctx,
    )
    .await
    .unwrap();
    assert_eq!(h.transport.send_count(), 1);
    assert_eq!(other.data(), Some(user(1, "A")));
}

#[tokio::test(start_paused = true)]
async fn test_dispose_purges_non_persistent_entry() {
    let h = harness();
    h.transport.fallback(user_response(1, "A"));
    let key = cache_key(&UserQuery { id: 1 }, None, None);

    let temporary = use_call(
        fetch_user(&h.client),
        UserQuery { id: 1 },
        CallOptions::new().cache(cached(60)),
        &h.ctx,
    )
    .await
    .unwrap();
    assert!(h.ctx.cache().get::<User>("fetch_user", &key).await.is_some());
    temporary.dispose().await;
    assert!(h.ctx.cache().get::<User>("fetch_user", &key).await.is_none());

    let persistent = use_call(
        fetch_user(&h.client),
        UserQuery { id: 1 },
        CallOptions::new().cache(cached(60).persistent(true)),
        &h.ctx,
    )
    .await
    .unwrap();
    persistent.dispose().await;
    assert!(h.ctx.cache().get::<User>("fetch_user", &key).await.is_some());

    // 해제 후에는 요청하지 않음
    let before = h.transport.send_count();
    persistent.refresh().await.unwrap();
    assert_eq!(h.transport.send_count(), before);
}

// ============================================================================
// Background refresh
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_refresh_interval() {
    let h = harness();
    h.transport.fallback(user_response(1, "A"));

    let call = use_call(
        fetch_user(&h.client),
        UserQuery { id: 1 },
        CallOptions::new().refresh_interval(TimeSpan::secs(10)),
        &h.ctx,
    )
    .await
    .unwrap();
    assert_eq!(h.transport.send_count(), 1);

    tokio::time::sleep(secs(25)).await;
    assert_eq!(h.transport.send_count(), 3);

    call.set_refresh_interval(None);
    tokio::time::sleep(secs(30)).await;
    assert_eq!(h.transport.send_count(), 3);

    call.set_refresh_interval(Some(TimeSpan::secs(5)));
    tokio::time::sleep(secs(6)).await;
    assert_eq!(h.transport.send_count(), 4);

    drop(call);
    tokio::time::sleep(secs(30)).await;
    assert_eq!(h.transport.send_count(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_dropping_last_handle_ends_interval_refresh() {
    let h = harness();
    h.transport
        .push(user_response(1, "A"))
        .push(user_response(1, "A2").delay(secs(100)).ignore_cancel());

    let call = use_call(
        fetch_user(&h.client),
        UserQuery { id: 1 },
        CallOptions::new().refresh_interval(TimeSpan::secs(5)),
        &h.ctx,
    )
    .await
    .unwrap();
    let mut rx = call.subscribe();

    tokio::time::sleep(secs(6)).await;
    assert_eq!(h.transport.send_count(), 2);
    assert!(call.loading());

    drop(call);
    tokio::time::sleep(secs(1)).await;
    assert!(!rx.borrow_and_update().loading);
    // 내부 상태까지 해제되어 채널이 닫힌다
    assert!(rx.changed().await.is_err());
    assert_eq!(h.transport.send_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_refetch_on_window_focus() {
    let h = harness();
    h.transport.fallback(user_response(1, "A"));

    let _watching = use_call(
        fetch_user(&h.client),
        UserQuery { id: 1 },
        CallOptions::new().refetch_on_window_focus(true),
        &h.ctx,
    )
    .await
    .unwrap();
    let _ignoring = use_call(fetch_user(&h.client), UserQuery { id: 2 }, CallOptions::new(), &h.ctx)
        .await
        .unwrap();
    assert_eq!(h.transport.send_count(), 2);

    h.ctx.focus().notify_focus();
    tokio::time::sleep(ms(10)).await;
    assert_eq!(h.transport.send_count(), 3);
    assert_eq!(h.transport.last_request().unwrap().url, "/users/1");
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_controls_available_during_initial_fetch() {
    let h = harness();
    h.transport.push(user_response(1, "A").delay(secs(30)));

    let call = CallCoordinator::new(
        fetch_user(&h.client),
        UserQuery { id: 1 },
        CallOptions::new(),
        &h.ctx,
    )
    .unwrap();
    assert!(!call.loading());
    assert_eq!(h.transport.send_count(), 0);

    let mounting = call.clone();
    let mount = tokio::spawn(async move { mounting.mount().await });
    tokio::time::sleep(ms(10)).await;
    assert!(call.loading());

    call.abort();
    assert!(!call.loading());
    mount.await.unwrap().unwrap();
    assert!(call.data().is_none());
    assert!(call.snapshot().result.is_cleared());
    assert_eq!(h.transport.send_count(), 1);
}

#[test]
fn test_new_outside_runtime_is_configuration_error() {
    let h = harness();
    let err = CallCoordinator::new(
        fetch_user(&h.client),
        UserQuery { id: 1 },
        CallOptions::new(),
        &h.ctx,
    )
    .unwrap_err();
    assert!(err.is_configuration());
}

#[tokio::test(start_paused = true)]
async fn test_clone_with_is_independent() {
    let h = harness();
    h.transport
        .push(user_response(1, "A"))
        .push(user_response(2, "B"));

    let first = use_call(fetch_user(&h.client), UserQuery { id: 1 }, CallOptions::new(), &h.ctx)
        .await
        .unwrap();
    let second = first
        .clone_with(UserQuery { id: 2 }, CallOptions::new())
        .await
        .unwrap();

    assert_eq!(first.data(), Some(user(1, "A")));
    assert_eq!(second.data(), Some(user(2, "B")));

    second.clear();
    assert_eq!(first.data(), Some(user(1, "A")));
    assert_eq!(second.payload(), UserQuery { id: 2 });
}

#[tokio::test(start_paused = true)]
async fn test_subscribe_observes_loading_then_result() {
    let h = harness();
    h.transport
        .push(user_response(1, "A"))
        .push(user_response(1, "B").delay(ms(50)));

    let call = use_call(fetch_user(&h.client), UserQuery { id: 1 }, CallOptions::new(), &h.ctx)
        .await
        .unwrap();
    let mut rx = call.subscribe();
    rx.borrow_and_update();

    let pending = call.clone();
    let handle = tokio::spawn(async move { pending.refresh().await });

    rx.changed().await.unwrap();
    assert!(rx.borrow_and_update().loading);

    rx.changed().await.unwrap();
    let settled = rx.borrow_and_update().clone();
    assert!(!settled.loading);
    assert!(matches!(settled.result, ResultSlot::Ready(_)));
    assert_eq!(settled.data(), Some(&user(1, "B")));
    handle.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_cache_is_namespaced_by_session() {
    let temp = tempfile::TempDir::new().unwrap();
    let h = harness();
    h.transport
        .push(user_response(1, "alice"))
        .push(user_response(1, "bob"));
    let storage = SecureStorage::new(
        JsonStore::new(temp.path()),
        Crypto::new(Some("k")).unwrap(),
    );
    storage.save("session", "alice-token").unwrap();
    let ctx = h.ctx.clone().with_storage(storage.clone(), "session");

    let options = || CallOptions::new().cache(cached(60));
    let _alice = use_call(fetch_user(&h.client), UserQuery { id: 1 }, options(), &ctx)
        .await
        .unwrap();

    // 세션이 바뀌면 같은 페이로드라도 다른 키
    storage.save("session", "bob-token").unwrap();
    let bob = use_call(fetch_user(&h.client), UserQuery { id: 1 }, options(), &ctx)
        .await
        .unwrap();
    assert_eq!(h.transport.send_count(), 2);
    assert_eq!(bob.data(), Some(user(1, "bob")));

    let key = cache_key(&UserQuery { id: 1 }, None, Some("alice-token"));
    assert!(key.starts_with(&session_namespace(Some("alice-token"))));
    assert!(ctx.cache().get::<User>("fetch_user", &key).await.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_persistent_file_cache_survives_context() {
    let temp = tempfile::TempDir::new().unwrap();
    let h = harness();
    h.transport.push(user_response(1, "A"));
    let file_cache = || CacheStore::new(Arc::new(FileCacheMedium::new(temp.path())));
    let options = || CallOptions::new().cache(cached(60).persistent(true));

    let first_ctx = h.ctx.clone().with_cache(file_cache());
    let first = use_call(fetch_user(&h.client), UserQuery { id: 1 }, options(), &first_ctx)
        .await
        .unwrap();
    first.dispose().await;

    let second_ctx = h.ctx.clone().with_cache(file_cache());
    let second = use_call(fetch_user(&h.client), UserQuery { id: 1 }, options(), &second_ctx)
        .await
        .unwrap();
    assert_eq!(h.transport.send_count(), 1);
    assert_eq!(second.data(), Some(user(1, "A")));
}

//! 프로세스 전역 store 레지스트리
//!
//! 키당 store 는 정확히 하나이며 첫 접근 시 생성되고 제거되지 않는다.
//! 동적으로 생성되는 대량의 키에는 적합하지 않다.

use super::shared::SharedStore;
use crate::{Error, Result};
use parking_lot::Mutex;
use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use tracing::debug;

type AnyStore = Arc<dyn Any + Send + Sync>;

static API_STORES: OnceLock<Mutex<HashMap<String, AnyStore>>> = OnceLock::new();

fn stores() -> &'static Mutex<HashMap<String, AnyStore>> {
    API_STORES.get_or_init(|| Mutex::new(HashMap::new()))
}

/// 키에 해당하는 store 조회 (없으면 `T::default()` 로 생성)
///
/// 같은 키를 다른 타입으로 요청하면 설정 에러.
pub fn get_api_store<T>(key: &str) -> Result<SharedStore<T>>
where
    T: Default + Send + Sync + 'static,
{
    let mut stores = stores().lock();
    let entry = stores.entry(key.to_string()).or_insert_with(|| {
        debug!(store_key = key, "Creating shared store");
        Arc::new(SharedStore::<T>::default()) as AnyStore
    });

    entry
        .downcast_ref::<SharedStore<T>>()
        .cloned()
        .ok_or_else(|| {
            Error::config(format!(
                "Shared store '{}' already exists with a different state type",
                key
            ))
        })
}

/// 등록된 키 목록
pub fn api_store_keys() -> Vec<String> {
    let mut keys: Vec<String> = stores().lock().keys().cloned().collect();
    keys.sort();
    keys
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_key_same_store() {
        let a = get_api_store::<u32>("registry-test-same").unwrap();
        let b = get_api_store::<u32>("registry-test-same").unwrap();

        a.set_state(7);
        assert_eq!(*b.read(), 7);
        assert!(api_store_keys().contains(&"registry-test-same".to_string()));
    }

    #[test]
    fn test_type_mismatch_is_config_error() {
        get_api_store::<u32>("registry-test-mismatch").unwrap();
        let err = get_api_store::<String>("registry-test-mismatch").unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_initial_state_is_default() {
        let store = get_api_store::<Option<String>>("registry-test-initial").unwrap();
        assert!(store.read().is_none());
    }
}

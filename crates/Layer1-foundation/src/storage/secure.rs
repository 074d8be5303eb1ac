//! 암호화 영구 저장소
//!
//! 세션 토큰처럼 작은 값을 passphrase 로 암호화해 파일에 보관한다.
//! 읽기 실패(파일 없음, 손상, 복호화 실패)는 모두 `None` 으로 처리한다.

use super::JsonStore;
use crate::crypto::{Crypto, EncryptedPayload};
use crate::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

/// 암호화 키-값 저장소
#[derive(Debug, Clone)]
pub struct SecureStorage {
    store: JsonStore,
    crypto: Crypto,
}

impl SecureStorage {
    pub fn new(store: JsonStore, crypto: Crypto) -> Self {
        Self { store, crypto }
    }

    /// 기본 데이터 디렉토리 (`<data_dir>/callkit/storage`)
    pub fn open_default(passphrase: Option<&str>) -> Result<Self> {
        let crypto = Crypto::new(passphrase)?;
        let base = JsonStore::data()?;
        Ok(Self::new(
            JsonStore::new(base.base_dir().join("storage")),
            crypto,
        ))
    }

    fn filename(key: &str) -> String {
        format!("{}.json", sanitize_key(key))
    }

    /// 암호화 후 저장
    pub fn save<T: Serialize + ?Sized>(&self, key: &str, data: &T) -> Result<()> {
        let sealed = self.crypto.encrypt(data)?;
        self.store.save(&Self::filename(key), &sealed)?;
        debug!(key, "Saved encrypted entry");
        Ok(())
    }

    /// 복호화 후 반환 (실패 시 None)
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let sealed = match self
            .store
            .load_optional::<EncryptedPayload>(&Self::filename(key))
        {
            Ok(Some(sealed)) => sealed,
            Ok(None) => return None,
            Err(e) => {
                warn!(key, error = %e, "Failed to get from storage");
                return None;
            }
        };

        match self.crypto.decrypt(&sealed) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, error = %e, "Failed to decrypt storage entry");
                None
            }
        }
    }

    /// 키 하나 또는 전체 삭제
    pub fn clear(&self, key: Option<&str>) -> Result<()> {
        match key {
            Some(key) => self.store.remove(&Self::filename(key)),
            None => {
                for name in self.store.list()? {
                    self.store.remove(&format!("{}.json", name))?;
                }
                Ok(())
            }
        }
    }
}

/// 파일명으로 안전한 키
fn sanitize_key(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn storage(temp: &TempDir, passphrase: &str) -> SecureStorage {
        SecureStorage::new(
            JsonStore::new(temp.path()),
            Crypto::new(Some(passphrase)).unwrap(),
        )
    }

    #[test]
    fn test_save_and_get() {
        let temp = TempDir::new().unwrap();
        let storage = storage(&temp, "k");

        storage.save("session", "token-123").unwrap();
        assert_eq!(storage.get::<String>("session").as_deref(), Some("token-123"));

        // 디스크에는 평문이 남지 않음
        let raw = std::fs::read_to_string(temp.path().join("session.json")).unwrap();
        assert!(!raw.contains("token-123"));
    }

    #[test]
    fn test_wrong_passphrase_reads_none() {
        let temp = TempDir::new().unwrap();
        storage(&temp, "a").save("session", "t").unwrap();
        assert!(storage(&temp, "b").get::<String>("session").is_none());
    }

    #[test]
    fn test_clear() {
        let temp = TempDir::new().unwrap();
        let storage = storage(&temp, "k");
        storage.save("one", &1).unwrap();
        storage.save("two", &2).unwrap();

        storage.clear(Some("one")).unwrap();
        assert!(storage.get::<i32>("one").is_none());
        assert_eq!(storage.get::<i32>("two"), Some(2));

        storage.clear(None).unwrap();
        assert!(storage.get::<i32>("two").is_none());
    }
}

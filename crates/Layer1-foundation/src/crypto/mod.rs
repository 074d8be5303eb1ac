//! Crypto - passphrase 기반 대칭 암호화
//!
//! PBKDF2-HMAC-SHA256 으로 passphrase 에서 키를 유도하고 AES-256-GCM 으로
//! JSON 직렬화 결과를 암호화한다. GCM 인증 태그 덕분에 잘못된 passphrase 로
//! 복호화하면 엉뚱한 데이터가 아니라 에러가 반환된다.
//!
//! ```ignore
//! use callkit_foundation::crypto::{encrypt, decrypt};
//!
//! let sealed = encrypt(&json!({"id": 1}), "secret")?;
//! let value: serde_json::Value = decrypt(&sealed, "secret")?;
//! ```

use crate::{Error, Result};
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::RngCore;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;
const PBKDF2_ROUNDS: u32 = 10_000;

/// 암호화된 페이로드 (wire 포맷)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedPayload {
    pub salt: String,
    pub iv: String,
    pub encrypted: String,
}

impl EncryptedPayload {
    /// JSON 값이 암호화 봉투 형태인지 확인
    pub fn from_value(value: &serde_json::Value) -> Option<Self> {
        let obj = value.as_object()?;
        if obj.len() != 3 {
            return None;
        }
        serde_json::from_value(value.clone()).ok()
    }

    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "salt": self.salt,
            "iv": self.iv,
            "encrypted": self.encrypted,
        })
    }
}

fn derive_key(passphrase: &str, salt: &[u8]) -> [u8; KEY_LEN] {
    let mut key = [0u8; KEY_LEN];
    pbkdf2::pbkdf2_hmac::<Sha256>(passphrase.as_bytes(), salt, PBKDF2_ROUNDS, &mut key);
    key
}

fn decode_field(name: &str, value: &str) -> Result<Vec<u8>> {
    BASE64
        .decode(value)
        .map_err(|e| Error::crypto(format!("invalid {} encoding: {}", name, e)))
}

/// 페이로드 암호화
pub fn encrypt<T: Serialize + ?Sized>(payload: &T, passphrase: &str) -> Result<EncryptedPayload> {
    let plain = serde_json::to_vec(payload)?;

    let mut rng = rand::thread_rng();
    let mut salt = [0u8; SALT_LEN];
    let mut iv = [0u8; NONCE_LEN];
    rng.fill_bytes(&mut salt);
    rng.fill_bytes(&mut iv);

    let key = derive_key(passphrase, &salt);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));
    let encrypted = cipher
        .encrypt(Nonce::from_slice(&iv), plain.as_ref())
        .map_err(|_| Error::crypto("encryption failed"))?;

    Ok(EncryptedPayload {
        salt: BASE64.encode(salt),
        iv: BASE64.encode(iv),
        encrypted: BASE64.encode(encrypted),
    })
}

/// 페이로드 복호화
///
/// passphrase 가 다르거나 데이터가 변조되면 `Error::Crypto`.
pub fn decrypt<T: DeserializeOwned>(sealed: &EncryptedPayload, passphrase: &str) -> Result<T> {
    let salt = decode_field("salt", &sealed.salt)?;
    let iv = decode_field("iv", &sealed.iv)?;
    let encrypted = decode_field("ciphertext", &sealed.encrypted)?;

    if iv.len() != NONCE_LEN {
        return Err(Error::crypto(format!(
            "invalid iv length: expected {}, got {}",
            NONCE_LEN,
            iv.len()
        )));
    }

    let key = derive_key(passphrase, &salt);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));
    let plain = cipher
        .decrypt(Nonce::from_slice(&iv), encrypted.as_ref())
        .map_err(|_| Error::crypto("decryption failed: wrong passphrase or corrupted data"))?;

    Ok(serde_json::from_slice(&plain)?)
}

/// 문자열 암호화 (JSON 문자열로 반환)
pub fn encrypt_string(plain: &str, passphrase: &str) -> Result<String> {
    Ok(serde_json::to_string(&encrypt(plain, passphrase)?)?)
}

/// `encrypt_string` 의 역연산
pub fn decrypt_string(sealed_json: &str, passphrase: &str) -> Result<String> {
    let sealed: EncryptedPayload = serde_json::from_str(sealed_json)?;
    decrypt(&sealed, passphrase)
}

// ============================================================================
// Crypto handle
// ============================================================================

/// passphrase 가 바인딩된 암호화 핸들
#[derive(Clone)]
pub struct Crypto {
    passphrase: String,
}

impl std::fmt::Debug for Crypto {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Crypto").field("passphrase", &"***").finish()
    }
}

impl Crypto {
    /// passphrase 없이 생성하면 설정 에러
    pub fn new(passphrase: Option<&str>) -> Result<Self> {
        match passphrase {
            Some(p) if !p.is_empty() => Ok(Self {
                passphrase: p.to_string(),
            }),
            _ => Err(Error::config("Passphrase is required")),
        }
    }

    pub fn passphrase(&self) -> &str {
        &self.passphrase
    }

    pub fn encrypt<T: Serialize + ?Sized>(&self, payload: &T) -> Result<EncryptedPayload> {
        encrypt(payload, &self.passphrase)
    }

    pub fn decrypt<T: DeserializeOwned>(&self, sealed: &EncryptedPayload) -> Result<T> {
        decrypt(sealed, &self.passphrase)
    }

    pub fn encrypt_string(&self, plain: &str) -> Result<String> {
        encrypt_string(plain, &self.passphrase)
    }

    pub fn decrypt_string(&self, sealed_json: &str) -> Result<String> {
        decrypt_string(sealed_json, &self.passphrase)
    }
}

//! Cache medium - `(container, key)` 로 주소 지정되는 비동기 저장 매체
//!
//! - `MemoryCacheMedium`: 프로세스 수명 동안만 유지 (세션 범위)
//! - `FileCacheMedium`: `<dir>/<container>/<key>.json` 영구 저장

use crate::{Error, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// 캐시 저장 매체
#[async_trait]
pub trait CacheMedium: Send + Sync {
    /// 매체 이름 (디버깅용)
    fn name(&self) -> &str;

    async fn get(&self, container: &str, key: &str) -> Result<Option<String>>;

    /// 기존 값을 무조건 덮어쓴다
    async fn put(&self, container: &str, key: &str, value: String) -> Result<()>;

    /// 없으면 no-op
    async fn delete(&self, container: &str, key: &str) -> Result<()>;

    async fn keys(&self, container: &str) -> Result<Vec<String>>;
}

// ============================================================================
// Memory
// ============================================================================

/// 메모리 매체
#[derive(Debug, Default)]
pub struct MemoryCacheMedium {
    containers: RwLock<HashMap<String, HashMap<String, String>>>,
}

impl MemoryCacheMedium {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheMedium for MemoryCacheMedium {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get(&self, container: &str, key: &str) -> Result<Option<String>> {
        Ok(self
            .containers
            .read()
            .get(container)
            .and_then(|c| c.get(key))
            .cloned())
    }

    async fn put(&self, container: &str, key: &str, value: String) -> Result<()> {
        self.containers
            .write()
            .entry(container.to_string())
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, container: &str, key: &str) -> Result<()> {
        if let Some(c) = self.containers.write().get_mut(container) {
            c.remove(key);
        }
        Ok(())
    }

    async fn keys(&self, container: &str) -> Result<Vec<String>> {
        let mut keys: Vec<String> = self
            .containers
            .read()
            .get(container)
            .map(|c| c.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        Ok(keys)
    }
}

// ============================================================================
// File
// ============================================================================

/// 파일 매체
#[derive(Debug, Clone)]
pub struct FileCacheMedium {
    base_dir: PathBuf,
}

impl FileCacheMedium {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn container_dir(&self, container: &str) -> PathBuf {
        self.base_dir.join(encode_segment(container))
    }

    fn entry_path(&self, container: &str, key: &str) -> PathBuf {
        self.container_dir(container)
            .join(format!("{}.json", encode_segment(key)))
    }
}

#[async_trait]
impl CacheMedium for FileCacheMedium {
    fn name(&self) -> &str {
        "file"
    }

    async fn get(&self, container: &str, key: &str) -> Result<Option<String>> {
        match tokio::fs::read_to_string(self.entry_path(container, key)).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Cache(format!("Failed to read cache entry: {}", e))),
        }
    }

    async fn put(&self, container: &str, key: &str, value: String) -> Result<()> {
        tokio::fs::create_dir_all(self.container_dir(container))
            .await
            .map_err(|e| Error::Cache(format!("Failed to create cache container: {}", e)))?;
        tokio::fs::write(self.entry_path(container, key), value)
            .await
            .map_err(|e| Error::Cache(format!("Failed to write cache entry: {}", e)))
    }

    async fn delete(&self, container: &str, key: &str) -> Result<()> {
        match tokio::fs::remove_file(self.entry_path(container, key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Cache(format!("Failed to delete cache entry: {}", e))),
        }
    }

    async fn keys(&self, container: &str) -> Result<Vec<String>> {
        let mut dir = match tokio::fs::read_dir(self.container_dir(container)).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::Cache(format!("Failed to list cache container: {}", e))),
        };

        let mut keys = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if let Some(key) = decode_segment(stem) {
                    keys.push(key);
                }
            }
        }
        keys.sort();
        Ok(keys)
    }
}

/// 파일명으로 쓸 수 있게 hex 인코딩 (`:` 등 포함 키 대응)
fn encode_segment(segment: &str) -> String {
    hex::encode(segment.as_bytes())
}

fn decode_segment(encoded: &str) -> Option<String> {
    hex::decode(encoded)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
}

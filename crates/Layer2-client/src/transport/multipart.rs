//! multipart/form-data 인코딩
//!
//! reqwest 의 multipart 기능 대신 직접 인코딩해서 업로드 진행률을
//! 바이트 단위로 측정할 수 있게 한다.

use rand::distributions::Alphanumeric;
use rand::Rng;
use std::path::Path;

const BOUNDARY_LEN: usize = 24;

/// 폼 파트
#[derive(Debug, Clone, PartialEq)]
pub enum FormPart {
    Text(String),
    File {
        filename: String,
        content_type: String,
        bytes: Vec<u8>,
    },
}

/// 폼 데이터 (필드 순서 유지)
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FormData {
    fields: Vec<(String, FormPart)>,
}

impl FormData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), FormPart::Text(value.into())));
        self
    }

    pub fn file(
        mut self,
        name: impl Into<String>,
        filename: impl Into<String>,
        content_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        self.fields.push((
            name.into(),
            FormPart::File {
                filename: filename.into(),
                content_type: content_type.into(),
                bytes,
            },
        ));
        self
    }

    /// 파일을 읽어 파트로 추가
    pub async fn file_from_path(
        self,
        name: impl Into<String>,
        path: impl AsRef<Path>,
    ) -> std::io::Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "file".to_string());
        Ok(self.file(name, filename, "application/octet-stream", bytes))
    }

    /// JSON 객체의 최상위 필드를 텍스트 파트로 변환
    pub fn from_json(value: &serde_json::Value) -> Self {
        let mut form = Self::new();
        if let Some(obj) = value.as_object() {
            for (key, value) in obj {
                let text = match value {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                form = form.text(key.clone(), text);
            }
        }
        form
    }

    pub fn fields(&self) -> &[(String, FormPart)] {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// 인코딩된 본문
    pub fn encode(&self, boundary: &str) -> Vec<u8> {
        let mut out = Vec::new();
        for (name, part) in &self.fields {
            out.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
            match part {
                FormPart::Text(value) => {
                    out.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{}\"\r\n\r\n",
                            escape(name)
                        )
                        .as_bytes(),
                    );
                    out.extend_from_slice(value.as_bytes());
                }
                FormPart::File {
                    filename,
                    content_type,
                    bytes,
                } => {
                    out.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                            escape(name),
                            escape(filename),
                            content_type
                        )
                        .as_bytes(),
                    );
                    out.extend_from_slice(bytes);
                }
            }
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());
        out
    }
}

/// 랜덤 boundary
pub fn boundary() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(BOUNDARY_LEN)
        .map(char::from)
        .collect();
    format!("callkit-{}", suffix)
}

pub fn content_type(boundary: &str) -> String {
    format!("multipart/form-data; boundary={}", boundary)
}

fn escape(value: &str) -> String {
    value.replace('"', "%22").replace('\r', "%0D").replace('\n', "%0A")
}

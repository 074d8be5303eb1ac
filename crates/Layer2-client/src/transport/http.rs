//! reqwest 기반 transport

use super::{multipart, parse_body, Progress, ProgressFn, RequestBody, Transport};
use super::{HttpMethod, TransportRequest, TransportResponse};
use crate::error::TransportError;
use async_trait::async_trait;
use callkit_foundation::{Error, Result};
use futures::StreamExt;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Client, Method};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// 업로드 스트리밍 청크 크기
const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

/// reqwest transport
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
    base_url: Option<String>,
}

impl ReqwestTransport {
    pub fn new(base_url: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client, base_url })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// 상대 경로면 base URL 과 결합
    pub fn resolve_url(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            return url.to_string();
        }
        match &self.base_url {
            Some(base) => format!(
                "{}/{}",
                base.trim_end_matches('/'),
                url.trim_start_matches('/')
            ),
            None => url.to_string(),
        }
    }

    async fn exchange(
        &self,
        request: TransportRequest,
        progress: Option<ProgressFn>,
    ) -> std::result::Result<TransportResponse, TransportError> {
        let url = self.resolve_url(&request.url);
        let mut builder = self.client.request(to_reqwest(request.method), &url);

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let encoded = match request.body {
            RequestBody::Empty => None,
            RequestBody::Json(value) => Some(
                serde_json::to_vec(&value)
                    .map_err(|e| TransportError::InvalidResponse(e.to_string()))?,
            ),
            RequestBody::Multipart(form) => {
                let boundary = multipart::boundary();
                builder = builder.header(CONTENT_TYPE, multipart::content_type(&boundary));
                Some(form.encode(&boundary))
            }
        };

        if let Some(bytes) = encoded {
            builder = builder
                .header(CONTENT_LENGTH, bytes.len())
                .body(upload_body(bytes, progress.clone()));
        }

        debug!(method = %request.method, url = %url, "Sending request");
        let response = builder.send().await?;
        let status = response.status().as_u16();
        let total = response.content_length();

        let mut stream = response.bytes_stream();
        let mut buf = Vec::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            buf.extend_from_slice(&chunk);
            if let (Some(progress), Some(_)) = (&progress, total) {
                progress(Progress {
                    loaded: buf.len() as u64,
                    total,
                });
            }
        }

        trace!(status, bytes = buf.len(), "Response received");
        Ok(TransportResponse::new(status, parse_body(&buf)))
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(
        &self,
        request: TransportRequest,
        cancel: CancellationToken,
        progress: Option<ProgressFn>,
    ) -> std::result::Result<TransportResponse, TransportError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Request cancelled");
                Err(TransportError::Cancelled)
            }
            result = self.exchange(request, progress) => result,
        }
    }
}

fn to_reqwest(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Delete => Method::DELETE,
    }
}

/// 청크 단위로 흘려보내며 업로드 진행률 보고
fn upload_body(bytes: Vec<u8>, progress: Option<ProgressFn>) -> reqwest::Body {
    let total = bytes.len() as u64;
    let chunks: Vec<Vec<u8>> = bytes
        .chunks(UPLOAD_CHUNK_SIZE)
        .map(<[u8]>::to_vec)
        .collect();

    let mut loaded = 0u64;
    let stream = futures::stream::iter(chunks).map(move |chunk| {
        loaded += chunk.len() as u64;
        if let Some(progress) = &progress {
            progress(Progress {
                loaded,
                total: Some(total),
            });
        }
        Ok::<_, std::io::Error>(chunk)
    });
    reqwest::Body::wrap_stream(stream)
}

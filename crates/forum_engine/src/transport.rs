use std::time::Duration;

use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use reqwest::header::CONTENT_TYPE;

use crate::{EngineError, FailureKind, FetchFailure};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportSettings {
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub redirect_limit: usize,
    pub max_bytes: u64,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(15),
            read_timeout: Duration::from_secs(30),
            redirect_limit: 5,
            max_bytes: 8 * 1024 * 1024,
        }
    }
}

/// One GET request as the fetcher wants it sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
}

/// Whatever the server answered, success or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub final_url: String,
    pub content_type: Option<String>,
    pub body: Bytes,
}

/// A single HTTP attempt. Retry policy lives above this.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, request: &TransportRequest) -> Result<RawResponse, FetchFailure>;
}

#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    max_bytes: u64,
}

impl ReqwestTransport {
    pub fn new(settings: &TransportSettings) -> Result<Self, EngineError> {
        let redirect_limit = settings.redirect_limit;
        let policy = reqwest::redirect::Policy::custom(move |attempt| {
            if attempt.previous().len() >= redirect_limit {
                attempt.error("redirect limit exceeded")
            } else {
                attempt.follow()
            }
        });

        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .read_timeout(settings.read_timeout)
            .redirect(policy)
            .build()?;

        Ok(Self {
            client,
            max_bytes: settings.max_bytes,
        })
    }
}

#[async_trait::async_trait]
impl Transport for ReqwestTransport {
    async fn get(&self, request: &TransportRequest) -> Result<RawResponse, FetchFailure> {
        let url = &request.url;
        let parsed = reqwest::Url::parse(url)
            .map_err(|err| FetchFailure::new(url, FailureKind::InvalidUrl, err.to_string()))?;

        let mut builder = self.client.get(parsed);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        let response = builder
            .send()
            .await
            .map_err(|err| map_reqwest_error(url, err))?;

        let status = response.status().as_u16();
        let too_large = |actual| {
            FetchFailure::new(
                url,
                FailureKind::TooLarge {
                    max_bytes: self.max_bytes,
                    actual: Some(actual),
                },
                "response too large",
            )
            .with_status(status)
        };

        if let Some(content_len) = response.content_length() {
            if content_len > self.max_bytes {
                return Err(too_large(content_len));
            }
        }

        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        let mut body = BytesMut::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|err| map_reqwest_error(url, err).with_status(status))?;
            let next_len = body.len() as u64 + chunk.len() as u64;
            if next_len > self.max_bytes {
                return Err(too_large(next_len));
            }
            body.extend_from_slice(&chunk);
        }

        Ok(RawResponse {
            status,
            final_url,
            content_type,
            body: body.freeze(),
        })
    }
}

fn map_reqwest_error(url: &str, err: reqwest::Error) -> FetchFailure {
    let kind = if err.is_timeout() {
        FailureKind::Timeout
    } else if err.is_redirect() {
        FailureKind::RedirectLimitExceeded
    } else if err.is_builder() {
        FailureKind::InvalidUrl
    } else {
        FailureKind::Network
    };
    FetchFailure::new(url, kind, err.to_string())
}

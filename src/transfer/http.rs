//! HTTP transfer source backed by `reqwest`
//!
//! - `HEAD` for the remote length (read from the `Content-Length` header)
//! - `GET` with `Range: bytes=<offset>-` for resumable streaming
//! - plain `GET` for manifest documents

use super::{RangedBody, TransferSource};
use crate::config::HttpConfig;
use crate::error::{Error, Result, TransferError};
use async_trait::async_trait;
use futures::TryStreamExt;
use reqwest::StatusCode;
use reqwest::header::{CONTENT_LENGTH, HeaderMap, RANGE};
use tokio_util::io::StreamReader;

/// Default [`TransferSource`] speaking HTTP(S)
#[derive(Debug, Clone)]
pub struct HttpTransferSource {
    client: reqwest::Client,
}

impl HttpTransferSource {
    /// Build a source whose client uses the given timeouts and user agent
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| {
                Error::config("http", format!("failed to create HTTP client: {e}"))
            })?;

        Ok(Self { client })
    }

    /// Wrap an existing client
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn request_failed(url: &str, e: reqwest::Error) -> Error {
    let reason = if e.is_timeout() {
        format!("timed out: {e}")
    } else if e.is_connect() {
        format!("connection failed: {e}")
    } else {
        e.to_string()
    };
    TransferError::RequestFailed {
        url: url.to_string(),
        reason,
    }
    .into()
}

fn bad_status(url: &str, status: StatusCode) -> Error {
    TransferError::BadStatus {
        url: url.to_string(),
        status: status.as_u16(),
    }
    .into()
}

fn parse_content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
}

#[async_trait]
impl TransferSource for HttpTransferSource {
    async fn head_length(&self, url: &str) -> Result<u64> {
        let response = self
            .client
            .head(url)
            .send()
            .await
            .map_err(|e| request_failed(url, e))?;

        if !response.status().is_success() {
            return Err(bad_status(url, response.status()));
        }

        // Response::content_length() reflects the (empty) HEAD body, not the header
        parse_content_length(response.headers()).ok_or_else(|| {
            TransferError::UnknownLength {
                url: url.to_string(),
            }
            .into()
        })
    }

    async fn ranged_read(&self, url: &str, offset: u64) -> Result<RangedBody> {
        let mut request = self.client.get(url);
        if offset > 0 {
            request = request.header(RANGE, format!("bytes={offset}-"));
        }

        let response = request.send().await.map_err(|e| request_failed(url, e))?;

        let status = response.status();
        let start = match status {
            StatusCode::PARTIAL_CONTENT => offset,
            // Server ignored the range and is sending the whole resource
            StatusCode::OK => {
                if offset > 0 {
                    tracing::warn!(url, offset, "server ignored range request, restarting");
                }
                0
            }
            _ => return Err(bad_status(url, status)),
        };

        let stream = response.bytes_stream().map_err(std::io::Error::other);
        Ok(RangedBody {
            offset: start,
            reader: Box::new(StreamReader::new(Box::pin(stream))),
        })
    }

    async fn fetch_text(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| request_failed(url, e))?;

        if !response.status().is_success() {
            return Err(bad_status(url, response.status()));
        }

        response.text().await.map_err(|e| request_failed(url, e))
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

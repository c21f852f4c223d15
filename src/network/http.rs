use std::io::Write;
use std::time::Duration;

use async_trait::async_trait;
use flate2::write::GzEncoder;
use flate2::Compression;
use tracing::debug;

use super::CollectorApi;
use super::DecideRequest;
use super::DecideResponse;
use crate::config::NetworkConfig;
use crate::NetworkError;
use crate::Result;

/// reqwest-backed collector client. Batch bodies are gzip-compressed;
/// decide bodies are small and sent as plain JSON.
pub struct HttpCollector {
    client: reqwest::Client,
    batch_url: String,
    decide_url: String,
}

impl HttpCollector {
    pub fn new(config: &NetworkConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()?;
        Ok(HttpCollector {
            client,
            batch_url: config.batch_url(),
            decide_url: config.decide_url(),
        })
    }
}

#[async_trait]
impl CollectorApi for HttpCollector {
    async fn post_batch(
        &self,
        body: Vec<u8>,
    ) -> Result<u16> {
        let compressed = gzip(&body)?;
        debug!(
            "Posting batch: {} bytes ({} compressed)",
            body.len(),
            compressed.len()
        );

        let response = self
            .client
            .post(&self.batch_url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(reqwest::header::CONTENT_ENCODING, "gzip")
            .body(compressed)
            .send()
            .await?;

        Ok(response.status().as_u16())
    }

    async fn post_decide(
        &self,
        request: DecideRequest,
    ) -> Result<DecideResponse> {
        let body = serde_json::to_vec(&request)?;
        let response = self
            .client
            .post(&self.decide_url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            return Err(NetworkError::Unavailable { status }.into());
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes)
            .map_err(|e| NetworkError::MalformedResponse(e.to_string()).into())
    }
}

pub(crate) fn gzip(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes)?;
    Ok(encoder.finish()?)
}

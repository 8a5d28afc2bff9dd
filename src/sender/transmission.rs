use super::serialization::{BatchSerializer, SerializationError};
use super::{ClientError, HttpClient};
use crate::domain::LogEventBatch;
use bytes::Bytes;
use reqwest::header::{CONTENT_ENCODING, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

const DOMAIN_HEADER: HeaderName = HeaderName::from_static("x-domain");
const BATCH_SIZE_HEADER: HeaderName = HeaderName::from_static("x-batch-size");

#[derive(Error, Debug)]
pub enum TransmissionError {
    #[error("Serialization failed: {0}")]
    SerializationFailed(#[from] SerializationError),
    #[error("Client error: {0}")]
    ClientError(#[from] ClientError),
    #[error("Request error: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("Invalid header value: {0}")]
    InvalidHeaderValue(String),
}

#[derive(Debug, Clone)]
pub struct TransmissionResult {
    pub success: bool,
    pub status_code: u16,
    pub latency: Duration,
    pub bytes_sent: usize,
    pub event_count: usize,
}

/// Posts serialized batches to `{base}/api/sink`.
#[derive(Debug, Clone)]
pub struct BatchTransmitter {
    pub client: HttpClient,
    serializer: BatchSerializer,
}

impl BatchTransmitter {
    pub fn new(client: HttpClient, serializer: BatchSerializer) -> Self {
        Self { client, serializer }
    }

    pub fn serializer(&self) -> &BatchSerializer {
        &self.serializer
    }

    pub async fn send_batch(
        &self,
        batch: &LogEventBatch,
    ) -> Result<TransmissionResult, TransmissionError> {
        let start = Instant::now();
        let payload = Bytes::from(self.serializer.encode(batch)?);
        let bytes_sent = payload.len();
        let headers = self.build_headers(batch)?;

        let response = self
            .client
            .client
            .post(self.client.sink_url.clone())
            .headers(headers)
            .body(payload)
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                self.client.stats.record_request(false, start.elapsed());
                return Err(e.into());
            }
        };

        let latency = start.elapsed();
        let status_code = response.status().as_u16();
        let success = response.status().is_success();
        self.client.stats.record_request(success, latency);

        debug!(
            domain = %batch.domain,
            events = batch.len(),
            bytes = bytes_sent,
            status = status_code,
            "Posted batch in {:?}",
            latency
        );

        Ok(TransmissionResult {
            success,
            status_code,
            latency,
            bytes_sent,
            event_count: batch.len(),
        })
    }

    pub fn build_headers(&self, batch: &LogEventBatch) -> Result<HeaderMap, TransmissionError> {
        let format = self.serializer.format();
        let mut headers = HeaderMap::new();

        headers.insert(CONTENT_TYPE, HeaderValue::from_static(format.content_type()));
        if let Some(encoding) = format.content_encoding() {
            headers.insert(CONTENT_ENCODING, HeaderValue::from_static(encoding));
        }

        headers.insert(
            DOMAIN_HEADER,
            HeaderValue::from_str(&batch.domain).map_err(|e| {
                TransmissionError::InvalidHeaderValue(format!("Invalid domain: {}", e))
            })?,
        );
        headers.insert(BATCH_SIZE_HEADER, HeaderValue::from(batch.len()));

        Ok(headers)
    }
}

use crate::domain::LogEventBatch;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use thiserror::Error;

// Guards decompression of untrusted bodies
const MAX_DECODED_SIZE: u64 = 100 * 1024 * 1024; // 100MB
const ESTIMATED_EVENT_SIZE: usize = 256; // bytes per event

#[derive(Error, Debug)]
pub enum SerializationError {
    #[error("JSON serialization failed: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Binary encoding failed: {0}")]
    EncodeError(#[from] bincode::error::EncodeError),
    #[error("Binary decoding failed: {0}")]
    DecodeError(#[from] bincode::error::DecodeError),
    #[error("IO error during serialization: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Decoded payload exceeds {0} bytes")]
    TooLarge(u64),
    #[error("Batch is empty")]
    EmptyBatch,
}

/// Body format of `POST /api/sink`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireFormat {
    /// bincode (standard config) wrapped in gzip.
    #[default]
    Binary,
    Json,
}

impl WireFormat {
    pub fn content_type(self) -> &'static str {
        match self {
            WireFormat::Binary => "application/octet-stream",
            WireFormat::Json => "application/json",
        }
    }

    pub fn content_encoding(self) -> Option<&'static str> {
        match self {
            WireFormat::Binary => Some("gzip"),
            WireFormat::Json => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BatchSerializer {
    format: WireFormat,
}

impl BatchSerializer {
    pub fn new(format: WireFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> WireFormat {
        self.format
    }

    pub fn encode(&self, batch: &LogEventBatch) -> Result<Vec<u8>, SerializationError> {
        if batch.is_empty() {
            return Err(SerializationError::EmptyBatch);
        }

        match self.format {
            WireFormat::Json => Ok(serde_json::to_vec(batch)?),
            WireFormat::Binary => {
                let encoded = bincode::serde::encode_to_vec(batch, bincode::config::standard())?;

                let mut encoder = GzEncoder::new(
                    Vec::with_capacity(batch.len().saturating_mul(ESTIMATED_EVENT_SIZE) / 4),
                    Compression::fast(),
                );
                encoder.write_all(&encoded)?;
                Ok(encoder.finish()?)
            }
        }
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<LogEventBatch, SerializationError> {
        match self.format {
            WireFormat::Json => Ok(serde_json::from_slice(bytes)?),
            WireFormat::Binary => {
                let mut decoded = Vec::new();
                GzDecoder::new(bytes)
                    .take(MAX_DECODED_SIZE + 1)
                    .read_to_end(&mut decoded)?;
                if decoded.len() as u64 > MAX_DECODED_SIZE {
                    return Err(SerializationError::TooLarge(MAX_DECODED_SIZE));
                }

                let (batch, _) =
                    bincode::serde::decode_from_slice(&decoded, bincode::config::standard())?;
                Ok(batch)
            }
        }
    }
}

pub mod client;
pub mod serialization;
pub mod transmission;

pub use client::{ClientConfig, ClientError, ClientStats, ConnectionStats, HttpClient};
pub use serialization::{BatchSerializer, SerializationError, WireFormat};
pub use transmission::{BatchTransmitter, TransmissionError, TransmissionResult};

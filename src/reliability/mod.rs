pub mod circuit;
pub mod critical;

pub use circuit::{CircuitBreaker, CircuitConfig, CircuitSnapshot};
pub use critical::CriticalBuffer;

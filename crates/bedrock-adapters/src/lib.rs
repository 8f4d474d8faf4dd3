//! # Bedrock Adapters
//!
//! Concrete implementations of the capability interfaces in `bedrock-core`:
//!
//! - [`TokioExecutor`]: runs blocking tasks on a private tokio runtime
//! - [`TracingLogger`]: forwards log records to `tracing`
//! - [`InMemoryMonitor`]: keeps metric samples in memory
//! - [`NullLogger`] / [`NullMonitor`]: fallbacks when a capability is disabled

mod executor;
mod logger;
mod monitor;

pub use executor::*;
pub use logger::*;
pub use monitor::*;

//! # Bedrock Resilience
//!
//! Resilience patterns for Bedrock.
//! Provides a circuit breaker that trips on failures counted inside a
//! sliding time window.

pub mod circuit_breaker;

pub use circuit_breaker::*;

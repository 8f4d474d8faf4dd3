//! # Bedrock Core
//!
//! Error model, error code registry, and capability interfaces for the
//! Bedrock foundation layer. Every other Bedrock crate depends on this one;
//! it depends on none of them.

pub mod codes;
pub mod error;
pub mod registry;
pub mod result;
pub mod telemetry;
pub mod traits;

pub use error::*;
pub use registry::*;
pub use result::*;
pub use traits::*;

// Re-export shaku's interface bound for capability traits
pub use shaku::Interface;

//! # Bedrock Config
//!
//! Options that drive the bootstrapper, loaded from layered TOML files and
//! `BEDROCK_*` environment variables.

mod loader;
mod options;
mod validation;

pub use loader::*;
pub use options::*;
pub use validation::*;

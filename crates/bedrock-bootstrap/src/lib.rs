//! # Bedrock Bootstrap
//!
//! Brings a Bedrock process up and down.
//!
//! A [`Bootstrapper`] owns the service container and the event bus. On
//! [`initialize`](Bootstrapper::initialize) it registers the core services,
//! then every added [`ServiceModule`] in [`Tier`] order, skipping modules
//! whose [`Capability`](bedrock_config::Capability) is switched off. On
//! [`shutdown`](Bootstrapper::shutdown) it runs the shutdown hooks in
//! reverse registration order inside a shared time budget.

mod bootstrapper;
mod hooks;
mod module;
mod modules;
mod state;

pub use bootstrapper::*;
pub use hooks::{HookFailure, HookOverrun, ShutdownHook, ShutdownReport};
pub use module::*;
pub use modules::*;
pub use state::*;

/// Module name carried by errors raised here.
pub const MODULE: &str = "bootstrapper";

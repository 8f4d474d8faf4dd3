//! # Bedrock DI
//!
//! Runtime service container. Modules register implementations of the
//! capability interfaces from `bedrock-core` and other modules resolve them
//! as `Arc<dyn Trait>` without depending on the implementing crate.
//!
//! Compile-time wiring with `shaku` modules remains available; components
//! of a `shaku` module can be published into the container with
//! [`ServiceContainer::register_module_component`].

mod container;
mod descriptor;
mod resolution;

pub use container::ServiceContainer;
pub use descriptor::{ServiceDescriptor, ServiceLifetime};

/// Module name used in errors issued by the container.
pub const MODULE: &str = "service_container";

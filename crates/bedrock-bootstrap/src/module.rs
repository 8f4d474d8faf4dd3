//! Service modules and the context they register into.

use bedrock_config::{BootstrapOptions, Capability};
use bedrock_core::codes::common;
use bedrock_core::{ErrorCodeRegistry, ErrorInfo, VoidResult};
use bedrock_di::ServiceContainer;
use bedrock_events::SystemEventBus;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::hooks::HookEntry;
use crate::MODULE;

/// Registration tier. Modules register in ascending tier order; within a
/// tier, in the order they were added.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Primitives everything else builds on.
    Foundation,
    /// Execution and storage (executors, databases).
    Core,
    /// Logging and monitoring.
    Service,
    /// Network and external integrations.
    Integration,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Foundation => "foundation",
            Self::Core => "core",
            Self::Service => "service",
            Self::Integration => "integration",
        })
    }
}

/// A unit of services added to a [`Bootstrapper`](crate::Bootstrapper).
///
/// `register` may run once per lifecycle; after a `reset()` the same module
/// registers again on the next `initialize`.
pub trait ServiceModule: Send + Sync {
    /// Unique name, used in logs, events and errors.
    fn name(&self) -> &str;

    /// Tier the module registers in.
    fn tier(&self) -> Tier {
        Tier::Service
    }

    /// Option flag gating this module. `None` means always registered.
    fn capability(&self) -> Option<Capability> {
        None
    }

    /// Registers services and shutdown hooks.
    ///
    /// # Errors
    ///
    /// Any error aborts initialization and rolls back every registration.
    fn register(&self, context: &mut BootstrapContext<'_>) -> VoidResult;
}

/// What a [`ServiceModule`] sees while registering.
pub struct BootstrapContext<'a> {
    pub(crate) module: &'a str,
    pub(crate) services: &'a Arc<ServiceContainer>,
    pub(crate) options: &'a BootstrapOptions,
    pub(crate) registry: &'a Arc<ErrorCodeRegistry>,
    pub(crate) bus: &'a Arc<SystemEventBus>,
    pub(crate) hooks: &'a mut Vec<HookEntry>,
    pub(crate) taken_hook_names: &'a HashSet<String>,
}

impl BootstrapContext<'_> {
    /// Name of the module currently registering.
    #[must_use]
    pub fn module_name(&self) -> &str {
        self.module
    }

    #[must_use]
    pub fn services(&self) -> &Arc<ServiceContainer> {
        self.services
    }

    #[must_use]
    pub fn options(&self) -> &BootstrapOptions {
        self.options
    }

    /// Error-code registry, still open for `register_range` until
    /// initialization completes.
    #[must_use]
    pub fn error_registry(&self) -> &Arc<ErrorCodeRegistry> {
        self.registry
    }

    #[must_use]
    pub fn event_bus(&self) -> &Arc<SystemEventBus> {
        self.bus
    }

    /// Queues a shutdown hook. It only becomes active if initialization
    /// succeeds.
    ///
    /// # Errors
    ///
    /// `ALREADY_EXISTS` if a hook with this name is registered or queued.
    pub fn add_shutdown_hook<F>(&mut self, name: &str, hook: F) -> VoidResult
    where
        F: FnOnce(Duration) + Send + 'static,
    {
        if self.taken_hook_names.contains(name) || self.hooks.iter().any(|entry| entry.name == name) {
            return Err(ErrorInfo::new(
                common::ALREADY_EXISTS,
                format!("shutdown hook already registered: {name}"),
                MODULE,
            ));
        }
        self.hooks.push(HookEntry::new(name, Box::new(hook)));
        Ok(())
    }
}

impl fmt::Debug for BootstrapContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BootstrapContext")
            .field("module", &self.module)
            .field("queued_hooks", &self.hooks.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_order() {
        let mut tiers = vec![Tier::Integration, Tier::Foundation, Tier::Service, Tier::Core];
        tiers.sort();
        assert_eq!(tiers, vec![Tier::Foundation, Tier::Core, Tier::Service, Tier::Integration]);
        assert_eq!(Tier::Core.to_string(), "core");
    }

    #[test]
    fn test_context_rejects_duplicate_hooks() {
        let services = Arc::new(ServiceContainer::new());
        let options = BootstrapOptions::default();
        let registry = Arc::new(ErrorCodeRegistry::with_ecosystem_ranges());
        let bus = Arc::new(SystemEventBus::default());
        let mut hooks = Vec::new();
        let taken: HashSet<String> = ["app.flush".to_string()].into_iter().collect();

        let mut context = BootstrapContext {
            module: "cache",
            services: &services,
            options: &options,
            registry: &registry,
            bus: &bus,
            hooks: &mut hooks,
            taken_hook_names: &taken,
        };

        assert_eq!(context.module_name(), "cache");
        context.add_shutdown_hook("cache.evict", |_| {}).unwrap();
        assert_eq!(
            context.add_shutdown_hook("cache.evict", |_| {}).unwrap_err().code(),
            common::ALREADY_EXISTS
        );
        assert_eq!(
            context.add_shutdown_hook("app.flush", |_| {}).unwrap_err().code(),
            common::ALREADY_EXISTS
        );
        assert_eq!(hooks.len(), 1);
    }
}

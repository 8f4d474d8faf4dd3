//! Bootstrapper state machine.

use bedrock_config::BootstrapOptions;
use bedrock_core::codes::common;
use bedrock_core::telemetry::init_telemetry;
use bedrock_core::{ErrorCodeRegistry, ErrorInfo, Result, VoidResult};
use bedrock_di::ServiceContainer;
use bedrock_events::{ErrorOccurred, EventBus, ModuleStarted, ModuleStopped, SystemEventBus};
use parking_lot::{Mutex, RwLock};
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::hooks::{run_hooks, HookEntry, ShutdownReport};
use crate::module::{BootstrapContext, ServiceModule};
use crate::state::BootstrapState;
use crate::MODULE;

/// Orchestrates ordered initialization and LIFO shutdown.
///
/// The container and the event bus live as long as the bootstrapper; the
/// container is emptied at shutdown and on a failed initialization, and
/// bus subscriptions survive both. A fresh [`ErrorCodeRegistry`] is built
/// on every `initialize` and frozen once all modules have registered.
pub struct Bootstrapper {
    state: AtomicU8,
    shutdown_requested: AtomicBool,
    container: Arc<ServiceContainer>,
    bus: Arc<SystemEventBus>,
    registry: RwLock<Arc<ErrorCodeRegistry>>,
    options: RwLock<BootstrapOptions>,
    modules: Mutex<Vec<Arc<dyn ServiceModule>>>,
    started_modules: Mutex<Vec<String>>,
    hooks: Mutex<Vec<HookEntry>>,
}

impl Default for Bootstrapper {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Bootstrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bootstrapper")
            .field("state", &self.state())
            .field("modules", &self.modules.lock().len())
            .field("hooks", &self.hooks.lock().len())
            .finish_non_exhaustive()
    }
}

impl Bootstrapper {
    /// Creates a bootstrapper with an empty container.
    #[must_use]
    pub fn new() -> Self {
        Self::with_container(Arc::new(ServiceContainer::new()))
    }

    /// Creates a bootstrapper around an existing container.
    #[must_use]
    pub fn with_container(container: Arc<ServiceContainer>) -> Self {
        Self {
            state: AtomicU8::new(BootstrapState::Uninitialized as u8),
            shutdown_requested: AtomicBool::new(false),
            container,
            bus: Arc::new(SystemEventBus::default()),
            registry: RwLock::new(Arc::new(ErrorCodeRegistry::with_ecosystem_ranges())),
            options: RwLock::new(BootstrapOptions::default()),
            modules: Mutex::new(Vec::new()),
            started_modules: Mutex::new(Vec::new()),
            hooks: Mutex::new(Vec::new()),
        }
    }

    /// Builder form of [`add_module`](Self::add_module).
    ///
    /// # Errors
    ///
    /// Same as [`add_module`](Self::add_module).
    pub fn with_module(self, module: impl ServiceModule + 'static) -> Result<Self> {
        self.add_module(Arc::new(module))?;
        Ok(self)
    }

    /// Adds a module for the next `initialize`.
    ///
    /// # Errors
    ///
    /// * `INVALID_STATE` unless the bootstrapper is `Uninitialized` or `Shutdown`.
    /// * `ALREADY_EXISTS` if a module with the same name was added.
    pub fn add_module(&self, module: Arc<dyn ServiceModule>) -> VoidResult {
        let state = self.state();
        if !matches!(state, BootstrapState::Uninitialized | BootstrapState::Shutdown) {
            return Err(ErrorInfo::invalid_state(
                format!("cannot add module '{}' while {state}", module.name()),
                MODULE,
            ));
        }

        let mut modules = self.modules.lock();
        if modules.iter().any(|existing| existing.name() == module.name()) {
            return Err(ErrorInfo::new(
                common::ALREADY_EXISTS,
                format!("module already added: {}", module.name()),
                MODULE,
            ));
        }
        debug!(module = %module.name(), tier = %module.tier(), "Module added");
        modules.push(module);
        Ok(())
    }

    /// Names of the added modules, in the order they were added.
    #[must_use]
    pub fn module_names(&self) -> Vec<String> {
        self.modules.lock().iter().map(|module| module.name().to_string()).collect()
    }

    // ============ Lifecycle ============

    /// Registers the core services and every enabled module.
    ///
    /// Core services are the [`ErrorCodeRegistry`], the event bus and the
    /// options. Modules follow in [`Tier`](crate::Tier) order; a module whose
    /// capability is disabled in `options` is skipped. Once every module
    /// has registered, the error-code registry is frozen, the state becomes
    /// `Running` and a [`ModuleStarted`] event is published per module.
    ///
    /// # Errors
    ///
    /// * `ALREADY_EXISTS` if already initializing or running.
    /// * `INVALID_STATE` while shutting down, or after shutdown until
    ///   [`reset`](Self::reset) is called.
    /// * `CANCELLED` if a concurrent `shutdown` aborted the initialization.
    /// * The first error raised by a core registration or a module. The
    ///   container is cleared, queued module hooks are dropped and the
    ///   state returns to `Uninitialized`.
    pub fn initialize(&self, options: BootstrapOptions) -> VoidResult {
        if let Err(current) = self.transition(BootstrapState::Uninitialized, BootstrapState::Initializing) {
            return Err(match current {
                BootstrapState::Initializing | BootstrapState::Running => {
                    ErrorInfo::new(common::ALREADY_EXISTS, "already initialized", MODULE)
                }
                BootstrapState::ShuttingDown => ErrorInfo::invalid_state("shutdown in progress", MODULE),
                _ => ErrorInfo::invalid_state("reset required before initializing again", MODULE),
            });
        }

        self.shutdown_requested.store(false, Ordering::Release);
        info!(
            environment = %options.environment,
            capabilities = ?options.enabled_capabilities(),
            "Initializing"
        );

        let result = self
            .register_all(&options)
            .and_then(|(pending_hooks, started)| self.finish_initialize(options, pending_hooks, started));
        if let Err(err) = &result {
            self.roll_back(err);
        }
        result
    }

    fn register_all(&self, options: &BootstrapOptions) -> Result<(Vec<HookEntry>, Vec<String>)> {
        if options.enable_logging {
            init_telemetry(&options.telemetry)?;
        }

        let registry = Arc::new(ErrorCodeRegistry::with_ecosystem_ranges());
        *self.registry.write() = Arc::clone(&registry);

        self.container.register_instance::<ErrorCodeRegistry>(Arc::clone(&registry))?;
        self.container.register_instance::<SystemEventBus>(Arc::clone(&self.bus))?;
        self.container.register_instance::<BootstrapOptions>(Arc::new(options.clone()))?;

        let mut modules = self.modules.lock().clone();
        modules.sort_by_key(|module| module.tier());

        let taken_hook_names: HashSet<String> = self.hooks.lock().iter().map(|entry| entry.name.clone()).collect();
        let mut pending_hooks = Vec::new();
        let mut started = Vec::new();

        for module in &modules {
            if let Some(capability) = module.capability() {
                if !options.is_enabled(capability) {
                    debug!(module = %module.name(), capability = %capability, "Capability disabled, skipping module");
                    continue;
                }
            }

            if self.state() != BootstrapState::Initializing {
                return Err(cancelled());
            }

            debug!(module = %module.name(), tier = %module.tier(), "Registering module");
            let mut context = BootstrapContext {
                module: module.name(),
                services: &self.container,
                options,
                registry: &registry,
                bus: &self.bus,
                hooks: &mut pending_hooks,
                taken_hook_names: &taken_hook_names,
            };
            module.register(&mut context).map_err(|err| {
                error!(module = %module.name(), error = %err, "Module registration failed");
                err
            })?;
            started.push(module.name().to_string());
        }

        registry.freeze();
        Ok((pending_hooks, started))
    }

    fn finish_initialize(&self, options: BootstrapOptions, pending_hooks: Vec<HookEntry>, started: Vec<String>) -> VoidResult {
        {
            let mut hooks = self.hooks.lock();
            if self.state() != BootstrapState::Initializing {
                // A concurrent shutdown already took the hooks.
                return Err(cancelled());
            }
            hooks.extend(pending_hooks);
        }
        *self.options.write() = options;
        *self.started_modules.lock() = started.clone();

        if self.transition(BootstrapState::Initializing, BootstrapState::Running).is_err() {
            return Err(cancelled());
        }

        for name in &started {
            self.bus.publish(&ModuleStarted::new(name.clone()));
        }
        info!(modules = started.len(), services = self.container.len(), "Initialization complete");
        Ok(())
    }

    /// Drops everything registered by the failed attempt. When a concurrent
    /// shutdown cancelled it, that shutdown may have cleared the container
    /// before the last module returned, so the container is cleared again.
    fn roll_back(&self, err: &ErrorInfo) {
        warn!(error = %err, "Initialization failed, rolling back");
        self.container.clear();
        self.started_modules.lock().clear();
        if self.transition(BootstrapState::Initializing, BootstrapState::Uninitialized).is_err() {
            debug!(state = %self.state(), "Initialization cancelled by shutdown");
        }
        self.bus.publish(&ErrorOccurred::new(err.clone()));
    }

    /// Runs the shutdown hooks last-registered first, then clears the
    /// container.
    ///
    /// Each hook receives what is left of `timeout`. A hook that runs long
    /// is not interrupted; it is logged and listed in the report, as is a
    /// hook that panics. Hooks still run, with a zero budget, after the
    /// budget is spent. A [`ModuleStopped`] event is published per started
    /// module, in reverse start order.
    ///
    /// Shutting down an already shut down bootstrapper returns an empty
    /// report and runs nothing. Called while `Initializing`, it aborts the
    /// initialization.
    ///
    /// # Errors
    ///
    /// `NOT_INITIALIZED` if the bootstrapper was never initialized.
    pub fn shutdown(&self, timeout: Duration) -> Result<ShutdownReport> {
        let from = loop {
            let current = self.state();
            match current {
                BootstrapState::Uninitialized => {
                    return Err(ErrorInfo::new(common::NOT_INITIALIZED, "system is not initialized", MODULE));
                }
                BootstrapState::ShuttingDown | BootstrapState::Shutdown => {
                    debug!(state = %current, "Shutdown already performed");
                    return Ok(ShutdownReport::empty());
                }
                BootstrapState::Initializing | BootstrapState::Running => {
                    if self.transition(current, BootstrapState::ShuttingDown).is_ok() {
                        break current;
                    }
                }
            }
        };

        self.shutdown_requested.store(true, Ordering::Release);
        info!(from = %from, timeout_ms = timeout.as_millis(), "Shutting down...");

        let hooks = std::mem::take(&mut *self.hooks.lock());
        let report = run_hooks(hooks, timeout);

        for failure in &report.failures {
            self.bus.publish(&ErrorOccurred::new(
                ErrorInfo::internal(format!("shutdown hook '{}' panicked", failure.name), MODULE)
                    .with_details(failure.message.clone()),
            ));
        }

        let started = std::mem::take(&mut *self.started_modules.lock());
        for name in started.into_iter().rev() {
            self.bus.publish(&ModuleStopped::new(name));
        }

        self.container.clear();
        self.state.store(BootstrapState::Shutdown as u8, Ordering::Release);

        info!(
            hooks = report.hooks_run.len(),
            overruns = report.overruns.len(),
            failures = report.failures.len(),
            elapsed_ms = report.elapsed.as_millis(),
            "Shutdown complete"
        );
        Ok(report)
    }

    /// [`shutdown`](Self::shutdown) with the configured
    /// `shutdown_timeout_ms`.
    ///
    /// # Errors
    ///
    /// Same as [`shutdown`](Self::shutdown).
    pub fn shutdown_with_configured_timeout(&self) -> Result<ShutdownReport> {
        let timeout = self.options.read().shutdown_timeout();
        self.shutdown(timeout)
    }

    /// Returns to `Uninitialized` so `initialize` can run again. Added
    /// modules are kept.
    ///
    /// # Errors
    ///
    /// `INVALID_STATE` unless the bootstrapper is `Shutdown` or
    /// `Uninitialized`.
    pub fn reset(&self) -> VoidResult {
        match self.transition(BootstrapState::Shutdown, BootstrapState::Uninitialized) {
            Ok(()) | Err(BootstrapState::Uninitialized) => {
                self.shutdown_requested.store(false, Ordering::Release);
                *self.options.write() = BootstrapOptions::default();
                debug!("Bootstrapper reset");
                Ok(())
            }
            Err(current) => Err(ErrorInfo::invalid_state(format!("cannot reset while {current}"), MODULE)),
        }
    }

    // ============ Shutdown hooks ============

    /// Adds a hook to run at shutdown.
    ///
    /// The name is only used in logs and in the [`ShutdownReport`]; hooks
    /// run strictly last-registered first.
    ///
    /// # Errors
    ///
    /// * `INVALID_STATE` during or after shutdown.
    /// * `ALREADY_EXISTS` if a hook with this name is registered.
    pub fn register_shutdown_hook<F>(&self, name: &str, hook: F) -> VoidResult
    where
        F: FnOnce(Duration) + Send + 'static,
    {
        let mut hooks = self.hooks.lock();

        let state = self.state();
        if matches!(state, BootstrapState::ShuttingDown | BootstrapState::Shutdown) {
            return Err(ErrorInfo::invalid_state(
                format!("cannot register shutdown hook '{name}' while {state}"),
                MODULE,
            ));
        }
        if hooks.iter().any(|entry| entry.name == name) {
            return Err(ErrorInfo::new(
                common::ALREADY_EXISTS,
                format!("shutdown hook already registered: {name}"),
                MODULE,
            ));
        }

        hooks.push(HookEntry::new(name, Box::new(hook)));
        debug!(hook = %name, "Shutdown hook registered");
        Ok(())
    }

    /// Removes a hook by name.
    ///
    /// # Errors
    ///
    /// `NOT_FOUND` if no hook has this name.
    pub fn unregister_shutdown_hook(&self, name: &str) -> VoidResult {
        let mut hooks = self.hooks.lock();
        let Some(index) = hooks.iter().position(|entry| entry.name == name) else {
            return Err(ErrorInfo::not_found(format!("shutdown hook not found: {name}"), MODULE));
        };
        hooks.remove(index);
        debug!(hook = %name, "Shutdown hook removed");
        Ok(())
    }

    /// Names of the registered hooks, in registration order.
    #[must_use]
    pub fn shutdown_hook_names(&self) -> Vec<String> {
        self.hooks.lock().iter().map(|entry| entry.name.clone()).collect()
    }

    // ============ Accessors ============

    #[must_use]
    pub fn state(&self) -> BootstrapState {
        BootstrapState::from(self.state.load(Ordering::Acquire))
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state() == BootstrapState::Running
    }

    /// The shared service container.
    #[must_use]
    pub fn services(&self) -> Arc<ServiceContainer> {
        Arc::clone(&self.container)
    }

    #[must_use]
    pub fn event_bus(&self) -> Arc<SystemEventBus> {
        Arc::clone(&self.bus)
    }

    /// Registry built by the last `initialize`.
    #[must_use]
    pub fn error_registry(&self) -> Arc<ErrorCodeRegistry> {
        Arc::clone(&self.registry.read())
    }

    /// Options passed to the last successful `initialize`.
    #[must_use]
    pub fn options(&self) -> BootstrapOptions {
        self.options.read().clone()
    }

    /// Flags that the application should stop. The flag is only a signal
    /// for the application's main loop; call [`shutdown`](Self::shutdown)
    /// to actually stop.
    pub fn request_shutdown(&self) {
        if !self.shutdown_requested.swap(true, Ordering::AcqRel) {
            info!("Shutdown requested");
        }
    }

    #[must_use]
    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown_requested.load(Ordering::Acquire)
    }

    /// Moves `from` to `to`, returning the actual state on mismatch.
    fn transition(&self, from: BootstrapState, to: BootstrapState) -> std::result::Result<(), BootstrapState> {
        match self
            .state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => {
                debug!(from = %from, to = %to, "State transition");
                Ok(())
            }
            Err(actual) => Err(BootstrapState::from(actual)),
        }
    }
}

fn cancelled() -> ErrorInfo {
    ErrorInfo::new(common::CANCELLED, "initialization aborted by shutdown", MODULE)
}

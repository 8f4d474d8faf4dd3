//! The service container.

use bedrock_core::codes::common;
use bedrock_core::{panic_message, ErrorInfo, Interface, Result, VoidResult};
use parking_lot::{Mutex, RwLock};
use std::any::{type_name, Any};
use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::descriptor::{ServiceDescriptor, ServiceKey, ServiceLifetime};
use crate::resolution::ResolutionGuard;
use crate::MODULE;

/// Type-erased `Arc<I>`.
type ErasedService = Arc<dyn Any + Send + Sync>;
type ErasedFactory = Arc<dyn Fn(&ServiceContainer) -> Result<ErasedService> + Send + Sync>;

static NEXT_CONTAINER_ID: AtomicU64 = AtomicU64::new(1);

enum Provider {
    Singleton {
        factory: ErasedFactory,
        cell: Mutex<Option<ErasedService>>,
    },
    Transient {
        factory: ErasedFactory,
    },
    Instance(ErasedService),
}

struct ServiceEntry {
    type_name: &'static str,
    provider: Provider,
}

impl ServiceEntry {
    fn lifetime(&self) -> ServiceLifetime {
        match self.provider {
            Provider::Singleton { .. } => ServiceLifetime::Singleton,
            Provider::Transient { .. } => ServiceLifetime::Transient,
            Provider::Instance(_) => ServiceLifetime::Instance,
        }
    }

    fn instantiated(&self) -> bool {
        match &self.provider {
            // A cell locked by an in-flight factory is not built yet.
            Provider::Singleton { cell, .. } => cell.try_lock().is_some_and(|value| value.is_some()),
            Provider::Transient { .. } => false,
            Provider::Instance(_) => true,
        }
    }
}

/// Registry of capability implementations, keyed by interface type.
///
/// Interfaces are usually trait objects (`dyn Logger`), registered and
/// resolved as `Arc<dyn Logger>`. Factories receive the container so they
/// can resolve their own dependencies.
///
/// The table is guarded by a read-write lock; factories always run with the
/// table lock released. Each singleton has its own construction lock, so two
/// threads racing on the first resolve see one factory call and the same
/// `Arc`. Re-entrant resolution of a service that is still being built on
/// the same thread fails with `CIRCULAR_DEPENDENCY`. A cycle spread across
/// threads (A built on one thread needing B, B built on another needing A)
/// is not detected and blocks.
pub struct ServiceContainer {
    id: u64,
    services: RwLock<HashMap<ServiceKey, Arc<ServiceEntry>>>,
    frozen: AtomicBool,
}

impl Default for ServiceContainer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ServiceContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceContainer")
            .field("services", &self.len())
            .field("frozen", &self.is_frozen())
            .finish()
    }
}

impl ServiceContainer {
    /// Creates an empty container.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: NEXT_CONTAINER_ID.fetch_add(1, Ordering::Relaxed),
            services: RwLock::new(HashMap::new()),
            frozen: AtomicBool::new(false),
        }
    }

    // ============ Registration ============

    /// Registers a factory whose result is built once and shared.
    ///
    /// # Errors
    ///
    /// `REGISTRY_FROZEN` after [`freeze`](Self::freeze).
    pub fn register_singleton<I, F>(&self, factory: F) -> VoidResult
    where
        I: ?Sized + Interface,
        F: Fn(&ServiceContainer) -> Result<Arc<I>> + Send + Sync + 'static,
    {
        self.insert::<I>(None, singleton(erase_factory(factory)))
    }

    /// Registers a factory invoked on every resolve.
    ///
    /// # Errors
    ///
    /// `REGISTRY_FROZEN` after [`freeze`](Self::freeze).
    pub fn register_transient<I, F>(&self, factory: F) -> VoidResult
    where
        I: ?Sized + Interface,
        F: Fn(&ServiceContainer) -> Result<Arc<I>> + Send + Sync + 'static,
    {
        self.insert::<I>(
            None,
            Provider::Transient {
                factory: erase_factory(factory),
            },
        )
    }

    /// Registers an already built instance.
    ///
    /// # Errors
    ///
    /// `REGISTRY_FROZEN` after [`freeze`](Self::freeze).
    pub fn register_instance<I>(&self, instance: Arc<I>) -> VoidResult
    where
        I: ?Sized + Interface,
    {
        self.insert::<I>(None, Provider::Instance(Arc::new(instance)))
    }

    /// Named variant of [`register_singleton`](Self::register_singleton).
    ///
    /// # Errors
    ///
    /// `REGISTRY_FROZEN` after [`freeze`](Self::freeze).
    pub fn register_named_singleton<I, F>(&self, name: &str, factory: F) -> VoidResult
    where
        I: ?Sized + Interface,
        F: Fn(&ServiceContainer) -> Result<Arc<I>> + Send + Sync + 'static,
    {
        self.insert::<I>(Some(name), singleton(erase_factory(factory)))
    }

    /// Named variant of [`register_transient`](Self::register_transient).
    ///
    /// # Errors
    ///
    /// `REGISTRY_FROZEN` after [`freeze`](Self::freeze).
    pub fn register_named_transient<I, F>(&self, name: &str, factory: F) -> VoidResult
    where
        I: ?Sized + Interface,
        F: Fn(&ServiceContainer) -> Result<Arc<I>> + Send + Sync + 'static,
    {
        self.insert::<I>(
            Some(name),
            Provider::Transient {
                factory: erase_factory(factory),
            },
        )
    }

    /// Named variant of [`register_instance`](Self::register_instance).
    ///
    /// # Errors
    ///
    /// `REGISTRY_FROZEN` after [`freeze`](Self::freeze).
    pub fn register_named_instance<I>(&self, name: &str, instance: Arc<I>) -> VoidResult
    where
        I: ?Sized + Interface,
    {
        self.insert::<I>(Some(name), Provider::Instance(Arc::new(instance)))
    }

    /// Resolves `I` from a compile-time wired `shaku` module and registers
    /// the component as an instance.
    ///
    /// # Errors
    ///
    /// `REGISTRY_FROZEN` after [`freeze`](Self::freeze).
    pub fn register_module_component<I, M>(&self, module: &M) -> VoidResult
    where
        I: ?Sized + Interface,
        M: shaku::HasComponent<I> + ?Sized,
    {
        self.register_instance::<I>(module.resolve())
    }

    fn insert<I: ?Sized + 'static>(&self, name: Option<&str>, provider: Provider) -> VoidResult {
        let key = ServiceKey::of::<I>(name);
        let entry = Arc::new(ServiceEntry {
            type_name: type_name::<I>(),
            provider,
        });
        let lifetime = entry.lifetime();

        let replaced = {
            let mut services = self.services.write();
            if self.frozen.load(Ordering::Acquire) {
                return Err(ErrorInfo::new(
                    common::REGISTRY_FROZEN,
                    format!("cannot register {}: container is frozen", type_name::<I>()),
                    MODULE,
                ));
            }
            services.insert(key, entry)
        };

        match replaced {
            Some(_) => debug!(
                service = type_name::<I>(),
                name = ?name,
                lifetime = %lifetime,
                "Service registration replaced"
            ),
            None => debug!(service = type_name::<I>(), name = ?name, lifetime = %lifetime, "Service registered"),
        }
        Ok(())
    }

    // ============ Resolution ============

    /// Resolves the default registration of `I`.
    ///
    /// # Errors
    ///
    /// * `SERVICE_NOT_REGISTERED` if nothing is registered for `I`.
    /// * `CIRCULAR_DEPENDENCY` if `I` is already being built on this thread.
    /// * `FACTORY_ERROR` if the factory panicked.
    /// * Any error returned by the factory, unchanged.
    pub fn resolve<I>(&self) -> Result<Arc<I>>
    where
        I: ?Sized + Interface,
    {
        self.resolve_key::<I>(None)
    }

    /// Resolves the registration of `I` under `name`.
    ///
    /// # Errors
    ///
    /// Same as [`resolve`](Self::resolve).
    pub fn resolve_named<I>(&self, name: &str) -> Result<Arc<I>>
    where
        I: ?Sized + Interface,
    {
        self.resolve_key::<I>(Some(name))
    }

    /// Resolves `I`, returning `None` on any failure.
    #[must_use]
    pub fn try_resolve<I>(&self) -> Option<Arc<I>>
    where
        I: ?Sized + Interface,
    {
        self.resolve::<I>().ok()
    }

    /// Resolves `I`, falling back to `fallback()` on any failure.
    ///
    /// The usual pattern for optional capabilities:
    /// `container.resolve_or_else::<dyn Logger, _>(|| Arc::new(NullLogger::default()))`.
    pub fn resolve_or_else<I, F>(&self, fallback: F) -> Arc<I>
    where
        I: ?Sized + Interface,
        F: FnOnce() -> Arc<I>,
    {
        match self.resolve::<I>() {
            Ok(service) => service,
            Err(err) => {
                debug!(service = type_name::<I>(), code = err.code(), "Using fallback service");
                fallback()
            }
        }
    }

    fn resolve_key<I>(&self, name: Option<&str>) -> Result<Arc<I>>
    where
        I: ?Sized + Interface,
    {
        let key = ServiceKey::of::<I>(name);
        let entry = self.services.read().get(&key).cloned().ok_or_else(|| {
            let service = match name {
                Some(name) => format!("{} [{name}]", type_name::<I>()),
                None => type_name::<I>().to_string(),
            };
            ErrorInfo::new(
                common::SERVICE_NOT_REGISTERED,
                format!("service not registered: {service}"),
                MODULE,
            )
        })?;

        let erased = match &entry.provider {
            Provider::Instance(value) => Arc::clone(value),
            Provider::Transient { factory } => {
                let _guard = ResolutionGuard::enter(self.id, &key, entry.type_name)?;
                self.invoke_factory(factory, entry.type_name)?
            }
            Provider::Singleton { factory, cell } => {
                let _guard = ResolutionGuard::enter(self.id, &key, entry.type_name)?;
                let mut cell = cell.lock();
                match cell.as_ref() {
                    Some(value) => Arc::clone(value),
                    None => {
                        let value = self.invoke_factory(factory, entry.type_name)?;
                        *cell = Some(Arc::clone(&value));
                        value
                    }
                }
            }
        };

        erased.downcast_ref::<Arc<I>>().cloned().ok_or_else(|| {
            ErrorInfo::new(
                common::TYPE_MISMATCH,
                format!("registration for {} holds an unexpected type", entry.type_name),
                MODULE,
            )
        })
    }

    fn invoke_factory(&self, factory: &ErasedFactory, service: &'static str) -> Result<ErasedService> {
        match panic::catch_unwind(AssertUnwindSafe(|| factory(self))) {
            Ok(result) => result,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!(service, panic = %message, "Service factory panicked");
                Err(ErrorInfo::new(
                    common::FACTORY_ERROR,
                    format!("factory for {service} panicked"),
                    MODULE,
                )
                .with_details(message))
            }
        }
    }

    // ============ Introspection & lifecycle ============

    /// Whether `I` has a default registration.
    #[must_use]
    pub fn is_registered<I: ?Sized + Interface>(&self) -> bool {
        self.services.read().contains_key(&ServiceKey::of::<I>(None))
    }

    /// Whether `I` is registered under `name`.
    #[must_use]
    pub fn is_registered_named<I: ?Sized + Interface>(&self, name: &str) -> bool {
        self.services.read().contains_key(&ServiceKey::of::<I>(Some(name)))
    }

    /// Removes the default registration of `I`. Returns whether one existed.
    ///
    /// Ignores the frozen flag; removal never adds capabilities.
    pub fn unregister<I: ?Sized + Interface>(&self) -> bool {
        let removed = self.services.write().remove(&ServiceKey::of::<I>(None));
        if removed.is_some() {
            debug!(service = type_name::<I>(), "Service unregistered");
        }
        removed.is_some()
    }

    /// Describes every registration, sorted by type name then name.
    #[must_use]
    pub fn registered_services(&self) -> Vec<ServiceDescriptor> {
        let entries: Vec<_> = self
            .services
            .read()
            .iter()
            .map(|(key, entry)| (key.name.clone(), Arc::clone(entry)))
            .collect();

        let mut descriptors: Vec<_> = entries
            .into_iter()
            .map(|(name, entry)| ServiceDescriptor {
                type_name: entry.type_name,
                name,
                lifetime: entry.lifetime(),
                instantiated: entry.instantiated(),
            })
            .collect();
        descriptors.sort_by(|a, b| a.type_name.cmp(b.type_name).then_with(|| a.name.cmp(&b.name)));
        descriptors
    }

    /// Number of registrations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.services.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.services.read().is_empty()
    }

    /// Rejects every later registration. Resolution keeps working.
    pub fn freeze(&self) {
        let services = self.services.write();
        if !self.frozen.swap(true, Ordering::AcqRel) {
            info!(services = services.len(), "Service container frozen");
        }
    }

    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::Acquire)
    }

    /// Drops every registration and cached singleton.
    ///
    /// Works on a frozen container too. Handles already resolved by callers
    /// stay valid; the container only releases its own references.
    pub fn clear(&self) {
        let drained = std::mem::take(&mut *self.services.write());
        let count = drained.len();
        drop(drained);
        if count > 0 {
            info!(services = count, "Service container cleared");
        }
    }
}

fn erase_factory<I, F>(factory: F) -> ErasedFactory
where
    I: ?Sized + Interface,
    F: Fn(&ServiceContainer) -> Result<Arc<I>> + Send + Sync + 'static,
{
    Arc::new(move |container: &ServiceContainer| factory(container).map(|service| Arc::new(service) as ErasedService))
}

fn singleton(factory: ErasedFactory) -> Provider {
    Provider::Singleton {
        factory,
        cell: Mutex::new(None),
    }
}

//! Registration metadata.

use serde::Serialize;
use std::any::TypeId;
use std::fmt;

/// How a registered service is produced on `resolve`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceLifetime {
    /// Built once by its factory, then shared.
    Singleton,
    /// Built by its factory on every resolve.
    Transient,
    /// A value supplied at registration time.
    Instance,
}

impl fmt::Display for ServiceLifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Singleton => "singleton",
            Self::Transient => "transient",
            Self::Instance => "instance",
        })
    }
}

/// Identity of a registration: the interface type plus an optional name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct ServiceKey {
    pub type_id: TypeId,
    pub name: Option<String>,
}

impl ServiceKey {
    pub fn of<I: ?Sized + 'static>(name: Option<&str>) -> Self {
        Self {
            type_id: TypeId::of::<I>(),
            name: name.map(str::to_string),
        }
    }
}

/// Read-only view of one registration, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceDescriptor {
    pub type_name: &'static str,
    pub name: Option<String>,
    pub lifetime: ServiceLifetime,
    /// Whether a singleton has been built yet. Always true for instances.
    pub instantiated: bool,
}

impl fmt::Display for ServiceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} [{}] ({})", self.type_name, name, self.lifetime),
            None => write!(f, "{} ({})", self.type_name, self.lifetime),
        }
    }
}

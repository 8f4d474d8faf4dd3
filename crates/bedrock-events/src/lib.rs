//! # Bedrock Events
//!
//! Process-local, synchronous publish/subscribe.
//!
//! Two implementations share the [`EventBus`] contract: [`ActiveEventBus`]
//! (feature `active-bus`, on by default) and the no-op [`NullEventBus`].
//! [`SystemEventBus`] names whichever one the build selected; there is no
//! runtime switch.

mod bus;
mod events;
mod null;

#[cfg(feature = "active-bus")]
mod active;

pub use bus::{ErrorHandler, Event, EventBus, HandlerFailure, Subscription, SubscriptionId};
pub use events::{ErrorOccurred, MetricRecorded, ModuleStarted, ModuleStopped};
pub use null::NullEventBus;

#[cfg(feature = "active-bus")]
pub use active::ActiveEventBus;

/// The event bus selected at build time.
#[cfg(feature = "active-bus")]
pub type SystemEventBus = ActiveEventBus;

/// The event bus selected at build time.
#[cfg(not(feature = "active-bus"))]
pub type SystemEventBus = NullEventBus;

//! The event bus contract and subscription handles.

use std::any::TypeId;
use std::fmt;
use std::sync::Weak;

/// Any value that can travel over the bus.
pub trait Event: Send + Sync + 'static {}

impl<T: Send + Sync + 'static> Event for T {}

/// Identifier of one subscription, unique per bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub(crate) u64);

impl SubscriptionId {
    /// Id handed out by buses that never deliver anything.
    pub const INERT: SubscriptionId = SubscriptionId(0);

    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Report passed to the bus error handler when a handler or filter panics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerFailure {
    pub subscription: SubscriptionId,
    pub event_type: TypeId,
    pub event_type_name: &'static str,
    pub message: String,
}

/// Callback invoked for every [`HandlerFailure`].
pub type ErrorHandler = Box<dyn Fn(&HandlerFailure) + Send + Sync + 'static>;

/// Publish/subscribe contract.
///
/// Delivery is synchronous: `publish` returns once every matching handler
/// has run on the publishing thread, in subscription order. Handler panics
/// never reach the publisher.
///
/// The implementation is chosen at build time (see
/// [`SystemEventBus`](crate::SystemEventBus)); the trait is generic and not
/// meant to be used as a trait object.
pub trait EventBus: Send + Sync + 'static {
    /// Delivers `event` to every subscriber of `E` whose filter accepts it.
    fn publish<E: Event>(&self, event: &E);

    /// Subscribes to every `E`. Dropping the returned handle unsubscribes.
    #[must_use = "dropping the subscription unsubscribes immediately"]
    fn subscribe<E, H>(&self, handler: H) -> Subscription
    where
        E: Event,
        H: Fn(&E) + Send + Sync + 'static;

    /// Subscribes to the `E` values for which `predicate` returns true.
    #[must_use = "dropping the subscription unsubscribes immediately"]
    fn subscribe_filtered<E, P, H>(&self, predicate: P, handler: H) -> Subscription
    where
        E: Event,
        P: Fn(&E) -> bool + Send + Sync + 'static,
        H: Fn(&E) + Send + Sync + 'static;

    /// Removes a subscription. Returns false if it was not registered.
    fn unsubscribe(&self, id: SubscriptionId) -> bool;

    /// Number of subscribers for `E`.
    fn subscriber_count<E: Event>(&self) -> usize;

    /// Number of subscribers over all event types.
    fn total_subscribers(&self) -> usize;

    /// False for the no-op bus.
    fn is_active(&self) -> bool;

    /// Installs the callback told about handler and filter panics,
    /// replacing any previous one.
    fn set_error_handler(&self, handler: ErrorHandler);

    /// Removes the error callback.
    fn clear_error_handler(&self);
}

/// Bus side of a subscription handle.
pub(crate) trait SubscriptionOwner: Send + Sync {
    fn remove(&self, id: SubscriptionId) -> bool;
    fn contains(&self, id: SubscriptionId) -> bool;
}

/// RAII handle for a subscription.
///
/// Dropping the handle removes the subscription. Call
/// [`detach`](Self::detach) to keep the subscription alive for the life of
/// the bus and remove it later with [`EventBus::unsubscribe`]. The handle
/// holds only a weak reference, so it never keeps a bus alive.
#[must_use = "dropping the subscription unsubscribes immediately"]
pub struct Subscription {
    id: SubscriptionId,
    owner: Option<Weak<dyn SubscriptionOwner>>,
}

impl Subscription {
    pub(crate) fn new(id: SubscriptionId, owner: Weak<dyn SubscriptionOwner>) -> Self {
        Self { id, owner: Some(owner) }
    }

    /// A handle attached to no bus.
    pub fn inert() -> Self {
        Self {
            id: SubscriptionId::INERT,
            owner: None,
        }
    }

    #[must_use]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Whether the subscription is still registered on a live bus.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.owner
            .as_ref()
            .and_then(Weak::upgrade)
            .is_some_and(|owner| owner.contains(self.id))
    }

    /// Removes the subscription now. Returns false if it was already gone.
    pub fn unsubscribe(mut self) -> bool {
        self.release()
    }

    /// Releases the handle without unsubscribing and returns the id.
    pub fn detach(mut self) -> SubscriptionId {
        self.owner = None;
        self.id
    }

    fn release(&mut self) -> bool {
        self.owner
            .take()
            .and_then(|owner| owner.upgrade())
            .is_some_and(|owner| owner.remove(self.id))
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("attached", &self.owner.is_some())
            .finish()
    }
}

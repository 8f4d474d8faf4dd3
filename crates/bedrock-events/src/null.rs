//! No-op event bus.

use crate::bus::{ErrorHandler, Event, EventBus, Subscription, SubscriptionId};

/// Bus that drops every event and accepts subscriptions without ever
/// invoking them. Selected when the `active-bus` feature is off.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullEventBus;

impl NullEventBus {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl EventBus for NullEventBus {
    fn publish<E: Event>(&self, _event: &E) {}

    fn subscribe<E, H>(&self, _handler: H) -> Subscription
    where
        E: Event,
        H: Fn(&E) + Send + Sync + 'static,
    {
        Subscription::inert()
    }

    fn subscribe_filtered<E, P, H>(&self, _predicate: P, _handler: H) -> Subscription
    where
        E: Event,
        P: Fn(&E) -> bool + Send + Sync + 'static,
        H: Fn(&E) + Send + Sync + 'static,
    {
        Subscription::inert()
    }

    fn unsubscribe(&self, _id: SubscriptionId) -> bool {
        false
    }

    fn subscriber_count<E: Event>(&self) -> usize {
        0
    }

    fn total_subscribers(&self) -> usize {
        0
    }

    fn is_active(&self) -> bool {
        false
    }

    fn set_error_handler(&self, _handler: ErrorHandler) {}

    fn clear_error_handler(&self) {}
}

//! In-process event bus that delivers events synchronously.

use bedrock_core::panic_message;
use parking_lot::RwLock;
use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, warn};

use crate::bus::{ErrorHandler, Event, EventBus, HandlerFailure, Subscription, SubscriptionId, SubscriptionOwner};

type ErasedFilter = Box<dyn Fn(&dyn Any) -> bool + Send + Sync>;
type ErasedHandler = Box<dyn Fn(&dyn Any) + Send + Sync>;

struct HandlerEntry {
    id: SubscriptionId,
    filter: Option<ErasedFilter>,
    handler: ErasedHandler,
}

struct BusInner {
    /// Subscribers per event type, in subscription order.
    handlers: RwLock<HashMap<TypeId, Vec<Arc<HandlerEntry>>>>,
    error_handler: RwLock<Option<Arc<ErrorHandler>>>,
    next_id: AtomicU64,
    events_published: AtomicU64,
    handler_failures: AtomicU64,
}

impl SubscriptionOwner for BusInner {
    fn remove(&self, id: SubscriptionId) -> bool {
        let removed = {
            let mut handlers = self.handlers.write();
            let found = handlers.iter_mut().find_map(|(type_id, entries)| {
                let position = entries.iter().position(|entry| entry.id == id)?;
                Some((*type_id, entries.remove(position), entries.is_empty()))
            });
            if let Some((type_id, _, true)) = &found {
                handlers.remove(type_id);
            }
            found
        };

        // The entry is dropped here, outside the lock.
        match removed {
            Some(_) => {
                debug!(subscription = %id, "Subscription removed");
                true
            }
            None => false,
        }
    }

    fn contains(&self, id: SubscriptionId) -> bool {
        self.handlers
            .read()
            .values()
            .any(|entries| entries.iter().any(|entry| entry.id == id))
    }
}

/// The active event bus.
///
/// Subscriber lists live under a read-write lock. `publish` copies the list
/// for the event type, releases the lock, then calls each handler, so
/// handlers may publish, subscribe, or unsubscribe without deadlocking. A
/// subscription removed while an event is being delivered may still see that
/// one event.
///
/// Each filter and handler runs inside `catch_unwind`. A panic is counted,
/// logged at `warn`, reported to the error handler if one is set, and
/// delivery continues with the next subscriber.
pub struct ActiveEventBus {
    inner: Arc<BusInner>,
}

impl ActiveEventBus {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BusInner {
                handlers: RwLock::new(HashMap::new()),
                error_handler: RwLock::new(None),
                next_id: AtomicU64::new(1),
                events_published: AtomicU64::new(0),
                handler_failures: AtomicU64::new(0),
            }),
        }
    }

    /// Total events published.
    #[must_use]
    pub fn events_published(&self) -> u64 {
        self.inner.events_published.load(Ordering::Relaxed)
    }

    /// Total handler and filter panics caught.
    #[must_use]
    pub fn handler_failures(&self) -> u64 {
        self.inner.handler_failures.load(Ordering::Relaxed)
    }

    /// Removes every subscription.
    pub fn clear(&self) {
        let drained = std::mem::take(&mut *self.inner.handlers.write());
        debug!(event_types = drained.len(), "Event bus cleared");
    }

    fn add<E: Event>(&self, filter: Option<ErasedFilter>, handler: ErasedHandler) -> Subscription {
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.inner
            .handlers
            .write()
            .entry(TypeId::of::<E>())
            .or_default()
            .push(Arc::new(HandlerEntry { id, filter, handler }));
        debug!(subscription = %id, event = type_name::<E>(), "Subscription created");

        let owner: Weak<dyn SubscriptionOwner> = Arc::downgrade(&self.inner) as Weak<dyn SubscriptionOwner>;
        Subscription::new(id, owner)
    }

    fn report_failure<E: Event>(&self, id: SubscriptionId, stage: &str, payload: &(dyn Any + Send)) {
        self.inner.handler_failures.fetch_add(1, Ordering::Relaxed);
        let message = panic_message(payload);
        warn!(
            subscription = %id,
            event = type_name::<E>(),
            stage,
            panic = %message,
            "Event subscriber panicked"
        );

        let callback = self.inner.error_handler.read().clone();
        if let Some(callback) = callback {
            let failure = HandlerFailure {
                subscription: id,
                event_type: TypeId::of::<E>(),
                event_type_name: type_name::<E>(),
                message,
            };
            if panic::catch_unwind(AssertUnwindSafe(|| callback(&failure))).is_err() {
                warn!(subscription = %id, "Event bus error handler panicked");
            }
        }
    }
}

impl Default for ActiveEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus for ActiveEventBus {
    fn publish<E: Event>(&self, event: &E) {
        self.inner.events_published.fetch_add(1, Ordering::Relaxed);

        let snapshot: Vec<Arc<HandlerEntry>> = match self.inner.handlers.read().get(&TypeId::of::<E>()) {
            Some(entries) => entries.clone(),
            None => return,
        };

        let erased: &dyn Any = event;
        for entry in snapshot {
            if let Some(filter) = &entry.filter {
                match panic::catch_unwind(AssertUnwindSafe(|| filter(erased))) {
                    Ok(true) => {}
                    Ok(false) => continue,
                    Err(payload) => {
                        self.report_failure::<E>(entry.id, "filter", payload.as_ref());
                        continue;
                    }
                }
            }
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| (entry.handler)(erased))) {
                self.report_failure::<E>(entry.id, "handler", payload.as_ref());
            }
        }
    }

    fn subscribe<E, H>(&self, handler: H) -> Subscription
    where
        E: Event,
        H: Fn(&E) + Send + Sync + 'static,
    {
        self.add::<E>(None, erase_handler(handler))
    }

    fn subscribe_filtered<E, P, H>(&self, predicate: P, handler: H) -> Subscription
    where
        E: Event,
        P: Fn(&E) -> bool + Send + Sync + 'static,
        H: Fn(&E) + Send + Sync + 'static,
    {
        let filter: ErasedFilter = Box::new(move |event: &dyn Any| event.downcast_ref::<E>().is_some_and(|event| predicate(event)));
        self.add::<E>(Some(filter), erase_handler(handler))
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.remove(id)
    }

    fn subscriber_count<E: Event>(&self) -> usize {
        self.inner.handlers.read().get(&TypeId::of::<E>()).map_or(0, Vec::len)
    }

    fn total_subscribers(&self) -> usize {
        self.inner.handlers.read().values().map(Vec::len).sum()
    }

    fn is_active(&self) -> bool {
        true
    }

    fn set_error_handler(&self, handler: ErrorHandler) {
        *self.inner.error_handler.write() = Some(Arc::new(handler));
    }

    fn clear_error_handler(&self) {
        *self.inner.error_handler.write() = None;
    }
}

fn erase_handler<E, H>(handler: H) -> ErasedHandler
where
    E: Event,
    H: Fn(&E) + Send + Sync + 'static,
{
    Box::new(move |event: &dyn Any| {
        if let Some(event) = event.downcast_ref::<E>() {
            handler(event);
        }
    })
}

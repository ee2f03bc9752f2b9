//! Synchronous typed pub/sub hub.
//!
//! The bus is the one object every component shares. Services publish
//! domain events; any number of handlers subscribe per [`EventKind`], plus
//! wildcard handlers that see everything. Delivery is synchronous on the
//! publisher's thread, FIFO per kind, typed handlers before wildcards.
//!
//! Two rules make this safe under contention:
//!
//! 1. `publish` snapshots the handler list under a short read lock and
//!    releases it before invoking anything. No lock is ever held across a
//!    handler call, so handlers are free to call back into the bus (or
//!    into the service that published).
//! 2. A panicking handler is contained with `catch_unwind`, logged, and
//!    delivery continues to the remaining handlers. Panicking handlers
//!    stay subscribed.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::events::{Event, EventKind, EventPayload};

type Handler = Arc<dyn Fn(&Event) + Send + Sync + 'static>;

/// Token returned by subscribe, required to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscription {
    id: SubscriptionId,
    handler: Handler,
}

#[derive(Default)]
struct Tables {
    typed: HashMap<EventKind, Vec<Subscription>>,
    wildcard: Vec<Subscription>,
    next_id: u64,
    closed: bool,
}

impl Tables {
    fn mint_id(&mut self) -> SubscriptionId {
        self.next_id += 1;
        SubscriptionId(self.next_id)
    }
}

/// Thread-safe synchronous event bus.
pub struct EventBus {
    tables: RwLock<Tables>,
}

impl EventBus {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            tables: RwLock::new(Tables::default()),
        })
    }

    /// Register a handler for one event kind. Handlers for the same kind
    /// run in subscription order.
    ///
    /// # Panics
    ///
    /// Subscribing to a closed bus is a programming error and panics.
    pub fn subscribe(
        &self,
        kind: EventKind,
        handler: impl Fn(&Event) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let mut tables = self.tables.write();
        assert!(!tables.closed, "subscribe on closed event bus");
        let id = tables.mint_id();
        tables.typed.entry(kind).or_default().push(Subscription {
            id,
            handler: Arc::new(handler),
        });
        id
    }

    /// Register a wildcard handler that receives every event.
    ///
    /// # Panics
    ///
    /// Subscribing to a closed bus is a programming error and panics.
    pub fn subscribe_all(
        &self,
        handler: impl Fn(&Event) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let mut tables = self.tables.write();
        assert!(!tables.closed, "subscribe_all on closed event bus");
        let id = tables.mint_id();
        tables.wildcard.push(Subscription {
            id,
            handler: Arc::new(handler),
        });
        id
    }

    /// Remove a subscription. Unknown ids are silently ignored.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        let mut tables = self.tables.write();
        for subs in tables.typed.values_mut() {
            if let Some(pos) = subs.iter().position(|s| s.id == id) {
                subs.remove(pos);
                return;
            }
        }
        if let Some(pos) = tables.wildcard.iter().position(|s| s.id == id) {
            tables.wildcard.remove(pos);
        }
    }

    /// True when any handler (typed for `kind`, or wildcard) would see an
    /// event of this kind. Lets producers skip building expensive payloads.
    pub fn has_subscribers(&self, kind: EventKind) -> bool {
        let tables = self.tables.read();
        if !tables.wildcard.is_empty() {
            return true;
        }
        tables.typed.get(&kind).is_some_and(|subs| !subs.is_empty())
    }

    /// Stamp and deliver a payload to every matching handler, typed
    /// handlers first, then wildcards, each list in subscription order.
    ///
    /// Publishing on a closed bus is a no-op.
    pub fn publish(&self, payload: EventPayload) {
        let event = Event::new(payload);

        // Snapshot the handlers, then release the lock: handlers may call
        // back into the bus or into the publishing service.
        let handlers: Vec<Handler> = {
            let tables = self.tables.read();
            if tables.closed {
                return;
            }
            let typed = tables
                .typed
                .get(&event.kind())
                .into_iter()
                .flatten()
                .map(|s| Arc::clone(&s.handler));
            let wildcard = tables.wildcard.iter().map(|s| Arc::clone(&s.handler));
            typed.chain(wildcard).collect()
        };

        for handler in handlers {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler(&event)));
            if let Err(cause) = outcome {
                tracing::error!(
                    target: "bus::publish",
                    event = event.payload.describe(),
                    "event handler panicked: {}",
                    panic_message(&cause)
                );
            }
        }
    }

    /// Drop every subscription and refuse further activity.
    ///
    /// Double close is a well-defined error.
    pub fn close(&self) -> Result<()> {
        let mut tables = self.tables.write();
        if tables.closed {
            return Err(Error::BusClosed);
        }
        tables.typed.clear();
        tables.wildcard.clear();
        tables.closed = true;
        Ok(())
    }

    /// True once `close` has run.
    pub fn is_closed(&self) -> bool {
        self.tables.read().closed
    }
}

fn panic_message(cause: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = cause.downcast_ref::<&str>() {
        s
    } else if let Some(s) = cause.downcast_ref::<String>() {
        s
    } else {
        "<non-string panic payload>"
    }
}

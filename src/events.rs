//! Pushed-event fan-out.
//!
//! Any inbound message that does not answer a pending request is an
//! [`Event`]. The [`EventDispatcher`] keys handlers by originating service
//! and event name and invokes every match, in registration order.
//!
//! # Reentrancy
//!
//! The registry lock is never held while a handler runs. `dispatch` takes a
//! snapshot of the matching entries, then checks each entry is still
//! registered right before invoking it. A handler may therefore register or
//! deregister handlers (including itself) without deadlocking:
//!
//! - a handler removed mid-dispatch is not invoked afterwards
//! - a handler added mid-dispatch only sees later events
//! - no other handler is skipped or invoked twice
//!
//! Handler errors and panics are logged and do not affect other handlers.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::sync::lock_ignore_poison;
use crate::{Message, Result, RpcError};

/// An unsolicited message pushed by a service.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Service that emitted the event (`chia_farmer`, `chia_wallet`, ...).
    pub origin: String,
    /// Event name, carried in the message's `command` field.
    pub command: String,
    /// Event payload.
    pub data: Value,
}

impl Event {
    // ---

    /// Event name.
    pub fn name(&self) -> &str {
        &self.command
    }

    /// Deserialize the payload.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::Protocol`] if `data` does not have the shape of `T`.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T> {
        // ---
        T::deserialize(&self.data).map_err(|err| {
            RpcError::Protocol(format!(
                "event {}/{} has unexpected payload: {err}",
                self.origin, self.command
            ))
        })
    }
}

impl From<Message> for Event {
    fn from(message: Message) -> Self {
        Self {
            origin: message.origin,
            command: message.command,
            data: message.data,
        }
    }
}

/// Callback invoked for matching events.
///
/// Handlers run on the channel's drain task and must not block. Any
/// `Fn(&Event) -> Result<()>` closure is a handler.
pub trait EventHandler: Send + Sync {
    fn handle(&self, event: &Event) -> Result<()>;
}

impl<F> EventHandler for F
where
    F: Fn(&Event) -> Result<()> + Send + Sync,
{
    fn handle(&self, event: &Event) -> Result<()> {
        self(event)
    }
}

/// Identifies one registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Returned by registration; pass it to
/// [`EventDispatcher::deregister`] to remove the handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionHandle {
    // ---
    id: SubscriptionId,
    service: String,
    event: Option<String>,
}

impl SubscriptionHandle {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    /// `None` for handlers registered for every event of the service.
    pub fn event(&self) -> Option<&str> {
        self.event.as_deref()
    }
}

struct Registration {
    // ---
    id: SubscriptionId,
    service: String,
    event: Option<String>,
    handler: Box<dyn EventHandler>,
    active: AtomicBool,
}

impl Registration {
    fn matches(&self, event: &Event) -> bool {
        // ---
        self.service == event.origin
            && self
                .event
                .as_deref()
                .map_or(true, |name| name == event.command)
    }
}

/// Registry of event handlers for one channel.
pub struct EventDispatcher {
    // ---
    next_id: AtomicU64,
    entries: Mutex<Vec<Arc<Registration>>>,
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl EventDispatcher {
    // ---

    pub fn new() -> Self {
        // ---
        Self {
            next_id: AtomicU64::new(1),
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Invoke `handler` for every `event` pushed by `service`.
    pub fn register<H>(&self, service: &str, event: &str, handler: H) -> SubscriptionHandle
    where
        H: EventHandler + 'static,
    {
        self.insert(service, Some(event), Box::new(handler))
    }

    /// Invoke `handler` for every event pushed by `service`.
    pub fn register_all<H>(&self, service: &str, handler: H) -> SubscriptionHandle
    where
        H: EventHandler + 'static,
    {
        self.insert(service, None, Box::new(handler))
    }

    fn insert(
        &self,
        service: &str,
        event: Option<&str>,
        handler: Box<dyn EventHandler>,
    ) -> SubscriptionHandle {
        // ---
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let entry = Arc::new(Registration {
            id,
            service: service.to_string(),
            event: event.map(str::to_string),
            handler,
            active: AtomicBool::new(true),
        });

        lock_ignore_poison(&self.entries).push(entry);
        log_trace!("{id}: subscribed to {service}/{}", event.unwrap_or("*"));

        SubscriptionHandle {
            id,
            service: service.to_string(),
            event: event.map(str::to_string),
        }
    }

    /// Remove a handler. Returns `false` if it was not registered.
    ///
    /// Safe to call from inside a running handler.
    pub fn deregister(&self, handle: &SubscriptionHandle) -> bool {
        // ---
        let mut entries = lock_ignore_poison(&self.entries);
        let Some(pos) = entries.iter().position(|entry| entry.id == handle.id) else {
            return false;
        };

        let entry = entries.remove(pos);
        entry.active.store(false, Ordering::Release);
        log_trace!("{}: unsubscribed", handle.id);
        true
    }

    /// Invoke every handler registered for `event`.
    ///
    /// Returns the number of handlers invoked.
    pub fn dispatch(&self, event: &Event) -> usize {
        // ---
        let matching: Vec<Arc<Registration>> = lock_ignore_poison(&self.entries)
            .iter()
            .filter(|entry| entry.matches(event))
            .cloned()
            .collect();

        if matching.is_empty() {
            log_trace!("no handler for event {}/{}", event.origin, event.command);
            return 0;
        }

        let mut invoked = 0;
        for entry in matching {
            if !entry.active.load(Ordering::Acquire) {
                continue;
            }
            invoked += 1;

            match catch_unwind(AssertUnwindSafe(|| entry.handler.handle(event))) {
                Ok(Ok(())) => {}
                Ok(Err(_err)) => {
                    log_warn!(
                        "{}: handler for {}/{} failed: {_err}",
                        entry.id,
                        event.origin,
                        event.command
                    );
                }
                Err(_panic) => {
                    log_error!(
                        "{}: handler for {}/{} panicked",
                        entry.id,
                        event.origin,
                        event.command
                    );
                }
            }
        }
        invoked
    }

    /// Remove every handler.
    pub fn clear(&self) {
        // ---
        let entries = std::mem::take(&mut *lock_ignore_poison(&self.entries));
        for entry in &entries {
            entry.active.store(false, Ordering::Release);
        }
    }

    pub fn handler_count(&self) -> usize {
        lock_ignore_poison(&self.entries).len()
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use serde::Deserialize;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    fn event(origin: &str, command: &str) -> Event {
        Event {
            origin: origin.into(),
            command: command.into(),
            data: json!({}),
        }
    }

    fn counter() -> (Arc<AtomicUsize>, impl Fn(&Event) -> Result<()> + Send + Sync + 'static) {
        // ---
        let count = Arc::new(AtomicUsize::new(0));
        let handler = {
            let count = Arc::clone(&count);
            move |_: &Event| -> Result<()> {
                count.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        };
        (count, handler)
    }

    #[test]
    fn test_handler_matches_service_and_event() {
        // ---
        let dispatcher = EventDispatcher::new();
        let (count, handler) = counter();
        dispatcher.register("chia_farmer", "new_signage_point", handler);

        assert_eq!(dispatcher.dispatch(&event("chia_farmer", "new_signage_point")), 1);
        assert_eq!(dispatcher.dispatch(&event("chia_farmer", "new_farming_info")), 0);
        assert_eq!(dispatcher.dispatch(&event("chia_wallet", "new_signage_point")), 0);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_register_all_receives_every_event_of_service() {
        // ---
        let dispatcher = EventDispatcher::new();
        let (count, handler) = counter();
        let handle = dispatcher.register_all("chia_farmer", handler);
        assert_eq!(handle.event(), None);

        dispatcher.dispatch(&event("chia_farmer", "a"));
        dispatcher.dispatch(&event("chia_farmer", "b"));
        dispatcher.dispatch(&event("chia_wallet", "a"));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_invocation_follows_registration_order() {
        // ---
        let dispatcher = EventDispatcher::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for i in 0..4 {
            let order = Arc::clone(&order);
            dispatcher.register("svc", "ev", move |_: &Event| -> Result<()> {
                order.lock().unwrap().push(i);
                Ok(())
            });
        }

        dispatcher.dispatch(&event("svc", "ev"));
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_self_deregistration_does_not_skip_others() {
        // ---
        let dispatcher = Arc::new(EventDispatcher::new());
        let (before, before_handler) = counter();
        let (after, after_handler) = counter();
        let own_calls = Arc::new(AtomicUsize::new(0));
        let own_handle: Arc<Mutex<Option<SubscriptionHandle>>> = Arc::new(Mutex::new(None));

        dispatcher.register("svc", "ev", before_handler);
        let handle = {
            let weak = Arc::downgrade(&dispatcher);
            let own_handle = Arc::clone(&own_handle);
            let own_calls = Arc::clone(&own_calls);
            dispatcher.register("svc", "ev", move |_: &Event| -> Result<()> {
                own_calls.fetch_add(1, Ordering::SeqCst);
                let handle = own_handle.lock().unwrap().clone();
                if let (Some(dispatcher), Some(handle)) = (weak.upgrade(), handle) {
                    assert!(dispatcher.deregister(&handle));
                }
                Ok(())
            })
        };
        *own_handle.lock().unwrap() = Some(handle);
        dispatcher.register("svc", "ev", after_handler);

        assert_eq!(dispatcher.dispatch(&event("svc", "ev")), 3);
        assert_eq!(dispatcher.dispatch(&event("svc", "ev")), 2);

        assert_eq!(own_calls.load(Ordering::SeqCst), 1);
        assert_eq!(before.load(Ordering::SeqCst), 2);
        assert_eq!(after.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_handler_removed_mid_dispatch_is_not_invoked() {
        // ---
        let dispatcher = Arc::new(EventDispatcher::new());
        let victim_handle: Arc<Mutex<Option<SubscriptionHandle>>> = Arc::new(Mutex::new(None));
        let (victim, victim_handler) = counter();

        {
            let weak = Arc::downgrade(&dispatcher);
            let victim_handle = Arc::clone(&victim_handle);
            dispatcher.register("svc", "ev", move |_: &Event| -> Result<()> {
                let handle = victim_handle.lock().unwrap().clone();
                if let (Some(dispatcher), Some(handle)) = (weak.upgrade(), handle) {
                    dispatcher.deregister(&handle);
                }
                Ok(())
            });
        }
        let handle = dispatcher.register("svc", "ev", victim_handler);
        *victim_handle.lock().unwrap() = Some(handle);

        assert_eq!(dispatcher.dispatch(&event("svc", "ev")), 1);
        assert_eq!(victim.load(Ordering::SeqCst), 0);
        assert_eq!(dispatcher.handler_count(), 1);
    }

    #[test]
    fn test_handler_added_mid_dispatch_sees_only_later_events() {
        // ---
        let dispatcher = Arc::new(EventDispatcher::new());
        let (late, late_handler) = counter();
        let late_handler = Mutex::new(Some(late_handler));

        {
            let weak = Arc::downgrade(&dispatcher);
            dispatcher.register("svc", "ev", move |_: &Event| -> Result<()> {
                if let (Some(dispatcher), Some(handler)) =
                    (weak.upgrade(), late_handler.lock().unwrap().take())
                {
                    dispatcher.register("svc", "ev", handler);
                }
                Ok(())
            });
        }

        assert_eq!(dispatcher.dispatch(&event("svc", "ev")), 1);
        assert_eq!(late.load(Ordering::SeqCst), 0);

        assert_eq!(dispatcher.dispatch(&event("svc", "ev")), 2);
        assert_eq!(late.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_errors_and_panics_are_isolated() {
        // ---
        let dispatcher = EventDispatcher::new();
        let (count, handler) = counter();

        dispatcher.register("svc", "ev", |_: &Event| -> Result<()> {
            Err(RpcError::Protocol("bad payload".into()))
        });
        dispatcher.register("svc", "ev", |_: &Event| -> Result<()> { panic!("handler bug") });
        dispatcher.register("svc", "ev", handler);

        assert_eq!(dispatcher.dispatch(&event("svc", "ev")), 3);
        assert_eq!(dispatcher.dispatch(&event("svc", "ev")), 3);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_deregister_and_clear() {
        // ---
        let dispatcher = EventDispatcher::new();
        let (count, handler) = counter();
        let handle = dispatcher.register("svc", "ev", handler);
        dispatcher.register_all("svc", |_: &Event| -> Result<()> { Ok(()) });

        assert!(dispatcher.deregister(&handle));
        assert!(!dispatcher.deregister(&handle));
        assert_eq!(dispatcher.handler_count(), 1);

        dispatcher.clear();
        assert_eq!(dispatcher.handler_count(), 0);
        assert_eq!(dispatcher.dispatch(&event("svc", "ev")), 0);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_parse_payload() {
        // ---
        #[derive(Deserialize)]
        struct Info {
            total_plots: u32,
        }

        let mut ev = event("chia_farmer", "new_farming_info");
        ev.data = json!({"total_plots": 12});
        assert_eq!(ev.parse::<Info>().unwrap().total_plots, 12);

        ev.data = json!({"total_plots": "many"});
        assert!(matches!(ev.parse::<Info>(), Err(RpcError::Protocol(_))));
    }
}

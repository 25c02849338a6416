// Copyright 2026 the Veneer Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Minimal named-event dispatch.
//!
//! [`EventHub`] is a plain value that owning types embed by composition (a
//! page has one, the frame clock has one) or that the application constructs
//! once and shares behind an [`Rc`] for cross-component signals. Both uses
//! have identical semantics:
//!
//! - Handlers for the same event name run in registration order.
//! - [`emit`](EventHub::emit) dispatches to a snapshot of the handler list
//!   taken when the emit starts. Handlers added or removed while the emit is
//!   running take effect on the next emit, not this one.
//! - A handler may be registered under a namespace. [`off`](EventHub::off)
//!   with a namespace and no handler removes exactly that namespace's
//!   handlers for the event.
//! - [`once`](EventHub::once) handlers run at most one time, including when
//!   the event is re-emitted from inside a handler.
//!
//! All methods take `&self`, so handlers are free to call back into the hub
//! that is dispatching them.

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::rc::Rc;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};
use core::fmt;

/// Identifies one registration, returned by [`EventHub::on`] and friends.
///
/// Pass it back to [`EventHub::off`] to remove that exact handler.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HandlerId(u64);

struct Entry<P> {
    id: HandlerId,
    namespace: Option<String>,
    once: bool,
    fired: Cell<bool>,
    handler: Box<dyn Fn(&P)>,
}

/// A set of named events, each with an ordered list of handlers.
///
/// `P` is the payload type passed by reference to every handler.
pub struct EventHub<P = ()> {
    handlers: RefCell<BTreeMap<String, Vec<Rc<Entry<P>>>>>,
    next_id: Cell<u64>,
}

impl<P> Default for EventHub<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> fmt::Debug for EventHub<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let handlers = self.handlers.borrow();
        f.debug_struct("EventHub")
            .field("events", &handlers.len())
            .field(
                "handlers",
                &handlers.values().map(Vec::len).sum::<usize>(),
            )
            .finish()
    }
}

impl<P> EventHub<P> {
    /// Creates a hub with no handlers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: RefCell::new(BTreeMap::new()),
            next_id: Cell::new(0),
        }
    }

    /// Registers `handler` for `event`.
    pub fn on(&self, event: &str, handler: impl Fn(&P) + 'static) -> HandlerId {
        self.register(event, None, false, Box::new(handler))
    }

    /// Registers `handler` for `event` under `namespace`.
    pub fn on_ns(
        &self,
        event: &str,
        namespace: &str,
        handler: impl Fn(&P) + 'static,
    ) -> HandlerId {
        self.register(event, Some(namespace), false, Box::new(handler))
    }

    /// Registers a handler that unregisters itself after its first call.
    pub fn once(&self, event: &str, handler: impl Fn(&P) + 'static) -> HandlerId {
        self.register(event, None, true, Box::new(handler))
    }

    /// Like [`once`](Self::once), but registered under `namespace`.
    pub fn once_ns(
        &self,
        event: &str,
        namespace: &str,
        handler: impl Fn(&P) + 'static,
    ) -> HandlerId {
        self.register(event, Some(namespace), true, Box::new(handler))
    }

    /// Removes handlers for `event`.
    ///
    /// - `handler: Some(id)` removes that registration (if `namespace` is
    ///   also given it must match).
    /// - `handler: None, namespace: Some(ns)` removes every handler
    ///   registered under `ns` for this event.
    /// - `handler: None, namespace: None` removes every handler for this
    ///   event.
    pub fn off(&self, event: &str, handler: Option<HandlerId>, namespace: Option<&str>) {
        let mut handlers = self.handlers.borrow_mut();
        let Some(list) = handlers.get_mut(event) else {
            return;
        };
        match (handler, namespace) {
            (Some(id), ns) => list.retain(|e| {
                !(e.id == id && ns.is_none_or(|ns| e.namespace.as_deref() == Some(ns)))
            }),
            (None, Some(ns)) => list.retain(|e| e.namespace.as_deref() != Some(ns)),
            (None, None) => list.clear(),
        }
        if list.is_empty() {
            handlers.remove(event);
        }
    }

    /// Invokes every handler registered for `event` at the time of the call.
    pub fn emit(&self, event: &str, payload: &P) {
        let snapshot: Vec<Rc<Entry<P>>> = match self.handlers.borrow().get(event) {
            Some(list) => list.clone(),
            None => return,
        };
        for entry in snapshot {
            if entry.once {
                if entry.fired.replace(true) {
                    continue;
                }
                self.off(event, Some(entry.id), entry.namespace.as_deref());
            }
            (entry.handler)(payload);
        }
    }

    /// Removes every handler for every event.
    pub fn clear(&self) {
        self.handlers.borrow_mut().clear();
    }

    /// Returns the number of handlers currently registered for `event`.
    #[must_use]
    pub fn handler_count(&self, event: &str) -> usize {
        self.handlers.borrow().get(event).map_or(0, Vec::len)
    }

    fn register(
        &self,
        event: &str,
        namespace: Option<&str>,
        once: bool,
        handler: Box<dyn Fn(&P)>,
    ) -> HandlerId {
        let id = HandlerId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        let entry = Rc::new(Entry {
            id,
            namespace: namespace.map(ToString::to_string),
            once,
            fired: Cell::new(false),
            handler,
        });
        self.handlers
            .borrow_mut()
            .entry(event.to_string())
            .or_default()
            .push(entry);
        id
    }
}

impl EventHub<()> {
    /// Emits a payload-less event.
    pub fn notify(&self, event: &str) {
        self.emit(event, &());
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use super::*;

    fn recorder() -> (Rc<RefCell<Vec<&'static str>>>, impl Fn(&'static str) -> Box<dyn Fn(&())>) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let log2 = Rc::clone(&log);
        let make = move |tag: &'static str| -> Box<dyn Fn(&())> {
            let log = Rc::clone(&log2);
            Box::new(move |_: &()| log.borrow_mut().push(tag))
        };
        (log, make)
    }

    #[test]
    fn handlers_run_in_registration_order() {
        let hub: EventHub = EventHub::new();
        let (log, make) = recorder();
        hub.on("e", make("a"));
        hub.on("e", make("b"));
        hub.on("e", make("c"));
        hub.notify("e");
        assert_eq!(*log.borrow(), vec!["a", "b", "c"]);
    }

    #[test]
    fn namespace_off_removes_only_that_namespace() {
        let hub: EventHub = EventHub::new();
        let (log, make) = recorder();
        hub.on_ns("e", "x", make("a"));
        hub.on_ns("e", "x", make("b"));
        hub.on("e", make("c"));

        hub.off("e", None, Some("x"));
        assert_eq!(hub.handler_count("e"), 1);

        hub.notify("e");
        assert_eq!(*log.borrow(), vec!["c"]);
    }

    #[test]
    fn off_by_id_removes_single_handler() {
        let hub: EventHub = EventHub::new();
        let (log, make) = recorder();
        let a = hub.on("e", make("a"));
        hub.on("e", make("b"));
        hub.off("e", Some(a), None);
        hub.notify("e");
        assert_eq!(*log.borrow(), vec!["b"]);
    }

    #[test]
    fn off_by_id_with_wrong_namespace_keeps_handler() {
        let hub: EventHub = EventHub::new();
        let (log, make) = recorder();
        let a = hub.on_ns("e", "x", make("a"));
        hub.off("e", Some(a), Some("y"));
        hub.notify("e");
        assert_eq!(*log.borrow(), vec!["a"]);
    }

    #[test]
    fn off_without_selector_clears_event() {
        let hub: EventHub = EventHub::new();
        let (log, make) = recorder();
        hub.on("e", make("a"));
        hub.on_ns("e", "x", make("b"));
        hub.on("other", make("c"));
        hub.off("e", None, None);
        hub.notify("e");
        hub.notify("other");
        assert_eq!(*log.borrow(), vec!["c"]);
    }

    #[test]
    fn handler_added_during_emit_waits_for_next_emit() {
        let hub = Rc::new(EventHub::<()>::new());
        let log = Rc::new(RefCell::new(Vec::new()));

        let hub2 = Rc::clone(&hub);
        let log2 = Rc::clone(&log);
        hub.once("e", move |_: &()| {
            log2.borrow_mut().push("outer");
            let log3 = Rc::clone(&log2);
            hub2.on("e", move |_: &()| log3.borrow_mut().push("late"));
        });

        hub.notify("e");
        assert_eq!(*log.borrow(), vec!["outer"], "late handler must not run yet");

        hub.notify("e");
        assert_eq!(*log.borrow(), vec!["outer", "late"]);
    }

    #[test]
    fn handler_removed_during_emit_still_runs_this_pass() {
        let hub = Rc::new(EventHub::<()>::new());
        let log = Rc::new(RefCell::new(Vec::new()));

        let hub2 = Rc::clone(&hub);
        let log2 = Rc::clone(&log);
        hub.on("e", move |_: &()| {
            log2.borrow_mut().push("first");
            hub2.off("e", None, Some("victim"));
        });
        let log3 = Rc::clone(&log);
        hub.on_ns("e", "victim", move |_: &()| log3.borrow_mut().push("victim"));

        hub.notify("e");
        assert_eq!(*log.borrow(), vec!["first", "victim"]);
        hub.notify("e");
        assert_eq!(*log.borrow(), vec!["first", "victim", "first"]);
    }

    #[test]
    fn once_runs_exactly_once_under_reentrant_emit() {
        let hub = Rc::new(EventHub::<()>::new());
        let count = Rc::new(Cell::new(0));

        let hub2 = Rc::clone(&hub);
        let count2 = Rc::clone(&count);
        hub.once("e", move |_: &()| {
            count2.set(count2.get() + 1);
            // Re-entrant emit from inside the once handler.
            hub2.notify("e");
        });

        hub.notify("e");
        hub.notify("e");
        assert_eq!(count.get(), 1, "once handler ran more than once");
        assert_eq!(hub.handler_count("e"), 0);
    }

    #[test]
    fn once_ns_unregisters_with_its_namespace() {
        let hub: EventHub = EventHub::new();
        let (log, make) = recorder();
        hub.once_ns("e", "x", make("a"));
        hub.on_ns("e", "x", make("b"));
        hub.notify("e");
        hub.notify("e");
        assert_eq!(*log.borrow(), vec!["a", "b", "b"]);
    }

    #[test]
    fn payload_reaches_handlers() {
        let hub: EventHub<u32> = EventHub::new();
        let seen = Rc::new(Cell::new(0));
        let seen2 = Rc::clone(&seen);
        hub.on("n", move |v| seen2.set(*v));
        hub.emit("n", &7);
        assert_eq!(seen.get(), 7);
    }

    #[test]
    fn clear_drops_everything() {
        let hub: EventHub = EventHub::new();
        let (log, make) = recorder();
        hub.on("a", make("a"));
        hub.on("b", make("b"));
        hub.clear();
        hub.notify("a");
        hub.notify("b");
        assert!(log.borrow().is_empty());
    }
}

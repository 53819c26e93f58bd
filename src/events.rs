//! Events and listener bookkeeping.
//!
//! Dispatch is purely in-memory and synchronous: listeners run in
//! registration order, and bubbling is an explicit walk up the parent
//! chain performed by [`Node::dispatch_event`](crate::Node::dispatch_event).

use crate::node::Node;
use crate::value::Value;
use core::fmt;
use indexmap::IndexMap;
use std::cell::RefCell;
use std::rc::Rc;

/// A property change record, carried by `*-changed` notifications and by
/// the change queue.
#[derive(Clone, Debug, PartialEq)]
pub struct PropertyChange {
    pub property: String,
    pub value: Value,
    pub old_value: Value,
}

/// Event payload.
#[derive(Clone, Debug)]
pub enum EventDetail {
    /// A property changed (`{prop}-changed`, `{prop}-set`).
    Change(PropertyChange),
    /// An object-valued property was mutated in place (`object-mutated`,
    /// `{prop}-mutated`).
    Mutation { object: Node },
    /// Arbitrary payload for application events.
    Custom(Value),
    Empty,
}

impl EventDetail {
    pub fn change(&self) -> Option<&PropertyChange> {
        match self {
            EventDetail::Change(c) => Some(c),
            _ => None,
        }
    }
}

/// The envelope passed to every listener.
#[derive(Clone, Debug)]
pub struct Event {
    /// Event name, e.g. `"value-changed"`.
    pub kind: String,
    pub detail: EventDetail,
    /// The node the event originated from.
    pub target: Node,
    /// Nodes visited so far, origin first. Grows as the event bubbles.
    pub path: Vec<Node>,
}

impl Event {
    pub(crate) fn new(kind: impl Into<String>, detail: EventDetail, target: &Node) -> Event {
        Event {
            kind: kind.into(),
            detail,
            target: target.clone(),
            path: vec![target.clone()],
        }
    }
}

/// A shared, single-threaded event handler closure.
#[derive(Clone)]
pub struct EventHandler(Rc<RefCell<dyn FnMut(&Event)>>);

impl EventHandler {
    pub fn new<F: FnMut(&Event) + 'static>(handler: F) -> EventHandler {
        EventHandler(Rc::new(RefCell::new(handler)))
    }

    /// Invokes the handler. A handler that is already on the stack is
    /// skipped with a warning rather than re-entered.
    pub fn call(&self, event: &Event) {
        match self.0.try_borrow_mut() {
            Ok(mut f) => f(event),
            Err(_) => {
                tracing::warn!(kind = %event.kind, "re-entrant event handler call skipped");
            }
        }
    }

    pub fn ptr_eq(a: &EventHandler, b: &EventHandler) -> bool {
        Rc::ptr_eq(&a.0, &b.0)
    }
}

impl fmt::Debug for EventHandler {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "EventHandler(..)")
    }
}

/// A registered listener: either a behavior method dispatched by name, or
/// an inline handler closure.
#[derive(Clone, Debug)]
pub enum Listener {
    Method(String),
    Handler(EventHandler),
}

impl Listener {
    /// Identity used for idempotent (de)registration.
    pub(crate) fn same(&self, other: &Listener) -> bool {
        match (self, other) {
            (Listener::Method(a), Listener::Method(b)) => a == b,
            (Listener::Handler(a), Listener::Handler(b)) => EventHandler::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Interprets an `on-*` prop value: a string names a behavior method on
    /// the owning node; a handler value is attached directly. Anything else
    /// is not a listener.
    pub(crate) fn from_value(value: &Value) -> Option<Listener> {
        match value {
            Value::String(s) => Some(Listener::Method(s.clone())),
            Value::Handler(h) => Some(Listener::Handler(h.clone())),
            _ => None,
        }
    }
}

/// Statically declared listeners (`event -> behavior method name`), merged
/// across a class chain base to derived at registration time.
#[derive(Clone, Debug, Default)]
pub struct ListenerTable {
    entries: IndexMap<String, String>,
}

impl ListenerTable {
    /// Folds one class's declarations into the accumulated table. Derived
    /// declarations win per event.
    pub(crate) fn merge(&mut self, declarations: &[(String, String)]) {
        for (event, method) in declarations {
            self.entries.insert(event.clone(), method.clone());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Per-instance listener registry: insertion-ordered lists per event type.
#[derive(Debug, Default)]
pub(crate) struct ActiveListeners {
    entries: IndexMap<String, Vec<Listener>>,
}

impl ActiveListeners {
    /// Adds a listener unless the same listener is already registered for
    /// this event.
    pub(crate) fn add(&mut self, event: &str, listener: Listener) {
        let list = self.entries.entry(event.to_string()).or_default();
        if !list.iter().any(|l| l.same(&listener)) {
            list.push(listener);
        }
    }

    pub(crate) fn remove(&mut self, event: &str, listener: &Listener) {
        if let Some(list) = self.entries.get_mut(event) {
            list.retain(|l| !l.same(listener));
        }
    }

    /// A snapshot of the listeners for one event, in registration order.
    /// Dispatch iterates the snapshot so handlers may (de)register
    /// listeners without invalidating the walk.
    pub(crate) fn snapshot(&self, event: &str) -> Vec<Listener> {
        self.entries.get(event).cloned().unwrap_or_default()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_is_idempotent_for_methods() {
        let mut active = ActiveListeners::default();
        active.add("click", Listener::Method("on_click".into()));
        active.add("click", Listener::Method("on_click".into()));
        assert_eq!(active.snapshot("click").len(), 1);
    }

    #[test]
    fn add_distinguishes_handlers_by_identity() {
        let mut active = ActiveListeners::default();
        let a = EventHandler::new(|_| {});
        let b = EventHandler::new(|_| {});
        active.add("click", Listener::Handler(a.clone()));
        active.add("click", Listener::Handler(a.clone()));
        active.add("click", Listener::Handler(b));
        assert_eq!(active.snapshot("click").len(), 2);
        active.remove("click", &Listener::Handler(a));
        assert_eq!(active.snapshot("click").len(), 1);
    }

    #[test]
    fn listener_table_merge_derived_wins() {
        let mut table = ListenerTable::default();
        table.merge(&[("click".into(), "base_click".into())]);
        table.merge(&[("click".into(), "derived_click".into())]);
        let entries: Vec<_> = table.iter().collect();
        assert_eq!(entries, vec![("click", "derived_click")]);
    }
}

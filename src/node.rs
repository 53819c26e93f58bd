//! The reactive object core.
//!
//! Every component instance is a [`Node`]: a cheap-clone handle over shared
//! state holding the instance property table, active listeners, the change
//! queue, bindings, and (for element-backed nodes) the attribute/style maps,
//! text content, children, and the `$` id-lookup table.
//!
//! Writes follow one path: mutate, reflect to attribute, enqueue, flush when
//! connected. A flush is two-phase: every pending observer runs first (plus
//! one trailing `changed()`), then every notification event dispatches. A
//! change enqueued by an observer during a flush waits for the next flush.

use crate::app::App;
use crate::binding::{Binding, NodeBindings};
use crate::events::{
    ActiveListeners, Event, EventDetail, Listener, PropertyChange,
};
use crate::property::PropertyTable;
use crate::registry::ResolvedClass;
use crate::value::{value_eq, Value};
use core::fmt;
use indexmap::IndexMap;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use uuid::Uuid;

/// A unique identifier for a node.
///
/// (this is just a UUID)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u32, u16, u16, [u8; 8]);

impl NodeId {
    pub(crate) fn new() -> NodeId {
        let uuid = Uuid::new_v4();
        let (a, b, c, d) = uuid.as_fields();
        NodeId(a, b, c, *d)
    }
}

/// External behavior attached to a component instance: named observer and
/// listener methods, the generic change hook, and the render hook. All
/// default to no-ops so a behavior implements only what it cares about.
pub trait Behavior {
    /// Dispatch of a named method (declared listeners and observers).
    fn call(&mut self, node: &Node, method: &str, event: &Event) {
        let _ = (node, method, event);
    }

    /// Generic per-property hook, invoked for every flushed change.
    fn property_changed(&mut self, node: &Node, change: &PropertyChange) {
        let _ = (node, change);
    }

    /// Render hook, invoked once per flush that had any pending change.
    fn changed(&mut self, node: &Node) {
        let _ = node;
    }
}

/// Behavior of a registered class with no factory.
struct NoopBehavior;

impl Behavior for NoopBehavior {}

/// Per-property coalesced pending changes: the first old value is the
/// baseline, the last written value wins, insertion order is preserved.
#[derive(Debug, Default)]
struct ChangeQueue {
    entries: IndexMap<String, PropertyChange>,
}

impl ChangeQueue {
    fn queue(&mut self, property: &str, value: Value, old_value: Value) {
        match self.entries.get_mut(property) {
            Some(pending) => pending.value = value,
            None => {
                self.entries.insert(
                    property.to_string(),
                    PropertyChange {
                        property: property.to_string(),
                        value,
                        old_value,
                    },
                );
            }
        }
    }

    fn take(&mut self) -> Vec<PropertyChange> {
        self.entries.drain(..).map(|(_, change)| change).collect()
    }

    fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn clear(&mut self) {
        self.entries.clear();
    }
}

/// A reactive component instance.
#[derive(Clone)]
pub struct Node {
    inner: Rc<NodeInner>,
}

#[derive(Clone)]
pub(crate) struct WeakNode(Weak<NodeInner>);

impl WeakNode {
    pub(crate) fn upgrade(&self) -> Option<Node> {
        self.0.upgrade().map(|inner| Node { inner })
    }
}

struct NodeInner {
    id: NodeId,
    tag: String,
    /// Element-backed nodes carry attributes, children and text; plain
    /// reactive objects participate in the mutation broadcast instead.
    is_element: bool,
    class: Option<Rc<ResolvedClass>>,
    app: App,
    behavior: RefCell<Option<Box<dyn Behavior>>>,
    props: RefCell<PropertyTable>,
    listeners: RefCell<ActiveListeners>,
    /// Current inline `on-*` listeners, keyed by event name.
    inline_listeners: RefCell<IndexMap<String, Listener>>,
    queue: RefCell<ChangeQueue>,
    flushing: Cell<bool>,
    bindings: RefCell<NodeBindings>,
    connected: Cell<bool>,
    disposed: Cell<bool>,
    owners: RefCell<Vec<NodeId>>,
    parent: RefCell<Option<WeakNode>>,
    attributes: RefCell<IndexMap<String, String>>,
    style: RefCell<IndexMap<String, String>>,
    text: RefCell<String>,
    children: RefCell<Vec<Node>>,
    /// `$` scoped id lookup, rebuilt by every render of this host.
    scoped: RefCell<IndexMap<String, Node>>,
    rendering: Cell<bool>,
}

impl Node {
    pub(crate) fn construct(
        app: &App,
        tag: &str,
        class: Option<Rc<ResolvedClass>>,
        init: Vec<(String, Value)>,
    ) -> Node {
        let props = class
            .as_ref()
            .map(|c| c.properties.clone_for_instance())
            .unwrap_or_default();
        let is_element = class.as_ref().map(|c| c.is_element).unwrap_or(true);
        let behavior = class.as_ref().map(|c| match &c.factory {
            Some(factory) => factory(),
            None => Box::new(NoopBehavior) as Box<dyn Behavior>,
        });
        let node = Node {
            inner: Rc::new(NodeInner {
                id: NodeId::new(),
                tag: tag.to_string(),
                is_element,
                class,
                app: app.clone(),
                behavior: RefCell::new(behavior),
                props: RefCell::new(props),
                listeners: RefCell::new(ActiveListeners::default()),
                inline_listeners: RefCell::new(IndexMap::new()),
                queue: RefCell::new(ChangeQueue::default()),
                flushing: Cell::new(false),
                bindings: RefCell::new(NodeBindings::default()),
                connected: Cell::new(false),
                disposed: Cell::new(false),
                owners: RefCell::new(Vec::new()),
                parent: RefCell::new(None),
                attributes: RefCell::new(IndexMap::new()),
                style: RefCell::new(IndexMap::new()),
                text: RefCell::new(String::new()),
                children: RefCell::new(Vec::new()),
                scoped: RefCell::new(IndexMap::new()),
                rendering: Cell::new(false),
            }),
        };
        // Node-valued defaults connect to this instance and announce
        // themselves on the first flush.
        let node_defaults: Vec<(String, Node)> = node
            .inner
            .props
            .borrow()
            .iter()
            .filter_map(|(name, prop)| {
                prop.value
                    .as_node()
                    .map(|n| (name.to_string(), n.clone()))
            })
            .collect();
        for (name, default) in node_defaults {
            default.connect(&node);
            node.inner.queue.borrow_mut().queue(
                &name,
                Value::Node(default.clone()),
                Value::Undefined,
            );
        }
        node.set_prop_listeners(&init);
        node.set_properties(init);
        node
    }

    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    pub fn tag(&self) -> &str {
        &self.inner.tag
    }

    pub fn is_element(&self) -> bool {
        self.inner.is_element
    }

    /// True for generic elements with no registered class.
    pub fn is_plain(&self) -> bool {
        self.inner.class.is_none()
    }

    pub fn app(&self) -> &App {
        &self.inner.app
    }

    pub fn is_connected(&self) -> bool {
        self.inner.connected.get()
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }

    pub fn ptr_eq(a: &Node, b: &Node) -> bool {
        Rc::ptr_eq(&a.inner, &b.inner)
    }

    pub(crate) fn downgrade(&self) -> WeakNode {
        WeakNode(Rc::downgrade(&self.inner))
    }

    pub fn has_property(&self, prop: &str) -> bool {
        self.inner.props.borrow().contains(prop)
    }

    /// The property's current value, or `Undefined` for unknown names.
    pub fn get(&self, prop: &str) -> Value {
        self.inner
            .props
            .borrow()
            .get(prop)
            .map(|p| p.value.clone())
            .unwrap_or(Value::Undefined)
    }

    /// Writes one property and flushes when connected. Identical values
    /// (under the NaN-equal rule) are a no-op.
    pub fn set_property(&self, prop: &str, value: Value) {
        if self.write_property(prop, value) && self.inner.connected.get() {
            self.flush();
        }
    }

    /// User-action setter: like [`Node::set_property`], and additionally
    /// dispatches `{prop}-set` when the value actually changed.
    pub fn set(&self, prop: &str, value: Value) {
        let old_value = self.get(prop);
        if self.write_property(prop, value.clone()) {
            if self.inner.connected.get() {
                self.flush();
            }
            self.dispatch_event(
                &format!("{prop}-set"),
                EventDetail::Change(PropertyChange {
                    property: prop.to_string(),
                    value,
                    old_value,
                }),
                false,
            );
        }
    }

    /// Batched multi-property set with one flush at the end. Unknown names
    /// and `on-*` entries are skipped; `className` and `style` apply
    /// directly to the attribute/style maps.
    pub fn set_properties<I>(&self, props: I)
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        for (name, value) in props {
            if name == "className" {
                if let Value::String(class) = value {
                    self.inner.attributes.borrow_mut().insert("class".to_string(), class);
                }
            } else if name == "style" {
                if let Value::Map(entries) = value {
                    let mut style = self.inner.style.borrow_mut();
                    for (key, entry) in entries {
                        style.insert(key, style_string(&entry));
                    }
                }
            } else if name.starts_with("on-") {
                // handled by set_prop_listeners
            } else if self.has_property(&name) {
                self.write_property(&name, value);
            } else {
                tracing::debug!(tag = %self.inner.tag, prop = %name, "unknown property skipped");
            }
        }
        if self.inner.connected.get() {
            self.flush();
        }
    }

    /// Replaces the inline `on-*` listeners with the ones present in
    /// `props`: events no longer listed lose their previous handler.
    /// Re-applying the same set is a no-op, so reconciliation can call this
    /// every pass.
    pub fn set_prop_listeners(&self, props: &[(String, Value)]) {
        let mut next: IndexMap<String, Listener> = IndexMap::new();
        for (name, value) in props {
            let Some(event) = name.strip_prefix("on-") else { continue };
            let Some(listener) = Listener::from_value(value) else { continue };
            next.insert(event.to_string(), listener);
        }
        let previous = self.inner.inline_listeners.replace(next.clone());
        if self.inner.connected.get() {
            let mut active = self.inner.listeners.borrow_mut();
            for (event, listener) in &previous {
                let kept = next.get(event).is_some_and(|l| l.same(listener));
                if !kept {
                    active.remove(event, listener);
                }
            }
            for (event, listener) in next {
                active.add(&event, listener);
            }
        }
    }

    fn write_property(&self, prop: &str, value: Value) -> bool {
        let (old_value, reflect) = {
            let mut props = self.inner.props.borrow_mut();
            let Some(descriptor) = props.get_mut(prop) else {
                tracing::debug!(tag = %self.inner.tag, prop, "write to unknown property skipped");
                return false;
            };
            if value_eq(&descriptor.value, &value) {
                return false;
            }
            let old_value = std::mem::replace(&mut descriptor.value, value.clone());
            (old_value, descriptor.reflect)
        };
        // Node-valued properties follow this node's lifecycle.
        if let Value::Node(old) = &old_value {
            old.disconnect(self);
        }
        if let Value::Node(new) = &value {
            new.connect(self);
        }
        if reflect {
            self.reflect_attribute(prop, &value);
        }
        if !prop.starts_with('_') {
            self.inner.queue.borrow_mut().queue(prop, value, old_value);
        }
        true
    }

    /// Creates (or returns the cached) binding with this node's `prop` as
    /// the source.
    pub fn bind(&self, prop: &str) -> Binding {
        self.inner.bindings.borrow_mut().bind(self, prop)
    }

    /// Makes `prop` a target of `binding`: replaces any previous binding on
    /// the descriptor, registers the target, and receives the source's
    /// current value.
    pub fn set_binding(&self, prop: &str, binding: &Binding) {
        let previous = {
            let mut props = self.inner.props.borrow_mut();
            let Some(descriptor) = props.get_mut(prop) else {
                tracing::warn!(tag = %self.inner.tag, prop, "set_binding on unknown property, ignoring");
                return;
            };
            descriptor.binding.replace(binding.clone())
        };
        if let Some(previous) = previous {
            if !Binding::ptr_eq(&previous, binding) {
                previous.remove_target(self, Some(prop));
            }
        }
        binding.add_target(self, prop);
    }

    // -- flush --------------------------------------------------------------

    /// Runs all pending observers, one trailing `changed()`, then dispatches
    /// all pending notifications. Re-entrant flushes are no-ops; changes
    /// enqueued during the flush wait for the next one.
    pub fn flush(&self) {
        if self.inner.flushing.get() || self.inner.queue.borrow().is_empty() {
            return;
        }
        self.inner.flushing.set(true);
        let changes = self.inner.queue.borrow_mut().take();
        for change in &changes {
            match mutation_subject(change) {
                Some(object) => {
                    let event = Event::new(
                        format!("{}-mutated", change.property),
                        EventDetail::Mutation { object },
                        self,
                    );
                    self.call_behavior(&format!("{}_mutated", change.property), &event);
                }
                None => {
                    let observer = self
                        .inner
                        .props
                        .borrow()
                        .get(&change.property)
                        .and_then(|p| p.observer.clone());
                    if let Some(method) = observer {
                        let event = Event::new(
                            format!("{}-changed", change.property),
                            EventDetail::Change(change.clone()),
                            self,
                        );
                        self.call_behavior(&method, &event);
                    }
                    self.with_behavior(|behavior, node| behavior.property_changed(node, change));
                }
            }
        }
        self.with_behavior(|behavior, node| behavior.changed(node));
        for change in changes {
            match mutation_subject(&change) {
                Some(object) => self.dispatch_event(
                    &format!("{}-mutated", change.property),
                    EventDetail::Mutation { object },
                    false,
                ),
                None => {
                    let kind = format!("{}-changed", change.property);
                    self.dispatch_event(&kind, EventDetail::Change(change), false);
                }
            }
        }
        self.inner.flushing.set(false);
        if !self.inner.is_element {
            self.inner.app.broadcast_object_mutated(self);
        }
    }

    /// Broadcast receiver: if any object-typed property holds `subject` by
    /// identity, run the mutation hook for the first match.
    pub(crate) fn on_object_mutation(&self, subject: &Node) {
        let Some(class) = self.inner.class.clone() else { return };
        for prop in &class.object_props {
            let matched = self
                .get(prop)
                .as_node()
                .is_some_and(|held| Node::ptr_eq(held, subject));
            if matched {
                self.notify_object_mutated(prop, subject);
                return;
            }
        }
    }

    /// Entry point for the app's mutation broadcast: `prop` holds `object`
    /// by identity and `object` just flushed.
    pub(crate) fn notify_object_mutated(&self, prop: &str, object: &Node) {
        self.inner.queue.borrow_mut().queue(
            prop,
            Value::Node(object.clone()),
            Value::Node(object.clone()),
        );
        self.flush();
    }

    // -- events -------------------------------------------------------------

    pub(crate) fn add_listener(&self, event: &str, listener: Listener) {
        self.inner.listeners.borrow_mut().add(event, listener);
    }

    pub(crate) fn remove_listener(&self, event: &str, listener: &Listener) {
        self.inner.listeners.borrow_mut().remove(event, listener);
    }

    /// Dispatches an event to this node's listeners, then, when `bubbles`,
    /// walks the parent chain re-dispatching on each ancestor until the
    /// parent is unset.
    pub fn dispatch_event(&self, kind: &str, detail: EventDetail, bubbles: bool) {
        if self.inner.disposed.get() {
            return;
        }
        let mut event = Event::new(kind, detail, self);
        self.invoke_listeners(&event);
        if bubbles {
            let mut current = self.parent();
            while let Some(ancestor) = current {
                event.path.push(ancestor.clone());
                ancestor.invoke_listeners(&event);
                current = ancestor.parent();
            }
        }
    }

    fn invoke_listeners(&self, event: &Event) {
        let snapshot = self.inner.listeners.borrow().snapshot(&event.kind);
        for listener in snapshot {
            match listener {
                Listener::Method(method) => self.call_behavior(&method, event),
                Listener::Handler(handler) => handler.call(event),
            }
        }
    }

    fn call_behavior(&self, method: &str, event: &Event) {
        self.with_behavior(|behavior, node| behavior.call(node, method, event));
    }

    /// Take-the-slot behavior invocation: a re-entrant call into a behavior
    /// already on the stack is skipped. Plain nodes have no behavior and
    /// skip silently.
    fn with_behavior(&self, f: impl FnOnce(&mut dyn Behavior, &Node)) {
        if self.inner.class.is_none() {
            return;
        }
        let taken = self.inner.behavior.borrow_mut().take();
        match taken {
            Some(mut behavior) => {
                f(behavior.as_mut(), self);
                *self.inner.behavior.borrow_mut() = Some(behavior);
            }
            None => {
                tracing::debug!(tag = %self.inner.tag, "re-entrant behavior invocation skipped");
            }
        }
    }

    // -- lifecycle ----------------------------------------------------------

    /// Adds `owner` to the owner list; the first owner connects the node.
    pub fn connect(&self, owner: &Node) {
        self.connect_owner(owner.id());
    }

    pub(crate) fn connect_owner(&self, owner: NodeId) {
        if self.inner.disposed.get() {
            tracing::warn!(tag = %self.inner.tag, "connect on a disposed node, ignoring");
            return;
        }
        {
            let mut owners = self.inner.owners.borrow_mut();
            if owners.contains(&owner) {
                return;
            }
            owners.push(owner);
        }
        if !self.inner.connected.get() {
            self.connected_callback();
        }
    }

    /// Removes `owner` from the owner list; removing the last owner
    /// disconnects the node.
    pub fn disconnect(&self, owner: &Node) {
        self.disconnect_owner(owner.id());
    }

    pub(crate) fn disconnect_owner(&self, owner: NodeId) {
        let now_empty = {
            let mut owners = self.inner.owners.borrow_mut();
            owners.retain(|id| *id != owner);
            owners.is_empty()
        };
        if now_empty && self.inner.connected.get() {
            self.disconnected_callback();
        }
    }

    fn connected_callback(&self) {
        self.inner.connected.set(true);
        {
            let mut active = self.inner.listeners.borrow_mut();
            if let Some(class) = &self.inner.class {
                for (event, method) in class.listeners.iter() {
                    active.add(event, Listener::Method(method.to_string()));
                }
            }
            for (event, listener) in self.inner.inline_listeners.borrow().iter() {
                active.add(event, listener.clone());
            }
        }
        // Bound properties re-attach to their bindings.
        let bound: Vec<(String, Binding)> = self
            .inner
            .props
            .borrow()
            .iter()
            .filter_map(|(name, p)| p.binding.clone().map(|b| (name.to_string(), b)))
            .collect();
        for (prop, binding) in bound {
            binding.add_target(self, &prop);
        }
        let reflected: Vec<(String, Value)> = self
            .inner
            .props
            .borrow()
            .iter()
            .filter(|(_, p)| p.reflect)
            .map(|(name, p)| (name.to_string(), p.value.clone()))
            .collect();
        for (prop, value) in reflected {
            self.reflect_attribute(&prop, &value);
        }
        self.inner.app.register_node(self);
        let children: Vec<Node> = self.inner.children.borrow().clone();
        for child in children {
            child.connect(self);
        }
        self.flush();
    }

    fn disconnected_callback(&self) {
        self.inner.connected.set(false);
        {
            let mut active = self.inner.listeners.borrow_mut();
            if let Some(class) = &self.inner.class {
                for (event, method) in class.listeners.iter() {
                    active.remove(event, &Listener::Method(method.to_string()));
                }
            }
            for (event, listener) in self.inner.inline_listeners.borrow().iter() {
                active.remove(event, listener);
            }
        }
        let bound: Vec<(String, Binding)> = self
            .inner
            .props
            .borrow()
            .iter()
            .filter_map(|(name, p)| p.binding.clone().map(|b| (name.to_string(), b)))
            .collect();
        for (prop, binding) in bound {
            binding.remove_target(self, Some(&prop));
        }
        self.inner.app.unregister_node(self);
        let children: Vec<Node> = self.inner.children.borrow().clone();
        for child in children {
            child.disconnect(self);
        }
    }

    /// Terminal teardown: disconnects, disposes owned bindings, drops all
    /// listener registrations, and recursively disposes children. A
    /// disposed node must not be reused.
    pub fn dispose(&self) {
        if self.inner.disposed.replace(true) {
            return;
        }
        if self.inner.connected.get() {
            self.disconnected_callback();
        }
        self.inner.queue.borrow_mut().clear();
        self.inner.bindings.borrow_mut().dispose_all();
        // Drop target registrations this node holds on foreign bindings.
        let bound: Vec<(String, Binding)> = {
            let mut props = self.inner.props.borrow_mut();
            let names: Vec<String> = props.names().map(str::to_string).collect();
            names
                .into_iter()
                .filter_map(|name| {
                    props
                        .get_mut(&name)
                        .and_then(|p| p.binding.take())
                        .map(|b| (name, b))
                })
                .collect()
        };
        for (prop, binding) in bound {
            binding.remove_target(self, Some(&prop));
        }
        self.inner.listeners.borrow_mut().clear();
        self.inner.inline_listeners.borrow_mut().clear();
        let children = std::mem::take(&mut *self.inner.children.borrow_mut());
        for child in children {
            child.dispose();
        }
        self.inner.scoped.borrow_mut().clear();
        *self.inner.parent.borrow_mut() = None;
    }

    // -- tree ---------------------------------------------------------------

    pub fn parent(&self) -> Option<Node> {
        self.inner.parent.borrow().as_ref().and_then(WeakNode::upgrade)
    }

    pub(crate) fn set_parent(&self, parent: Option<&Node>) {
        *self.inner.parent.borrow_mut() = parent.map(Node::downgrade);
    }

    pub fn children(&self) -> Vec<Node> {
        self.inner.children.borrow().clone()
    }

    pub fn child_count(&self) -> usize {
        self.inner.children.borrow().len()
    }

    pub fn child(&self, index: usize) -> Option<Node> {
        self.inner.children.borrow().get(index).cloned()
    }

    pub(crate) fn push_child(&self, child: Node) {
        self.inner.children.borrow_mut().push(child);
    }

    pub(crate) fn insert_child(&self, index: usize, child: Node) {
        self.inner.children.borrow_mut().insert(index, child);
    }

    pub(crate) fn remove_child(&self, index: usize) -> Node {
        self.inner.children.borrow_mut().remove(index)
    }

    pub(crate) fn pop_child(&self) -> Option<Node> {
        self.inner.children.borrow_mut().pop()
    }

    /// Marks this node as mid-render; false when a render is already in
    /// progress (re-entrant reconciliation of one host is a caller error).
    pub(crate) fn begin_render(&self) -> bool {
        if self.inner.rendering.get() {
            return false;
        }
        self.inner.rendering.set(true);
        true
    }

    pub(crate) fn end_render(&self) {
        self.inner.rendering.set(false);
    }

    /// Scoped `$` lookup by the `id` prop of the last render. Entries are
    /// rebuilt every render and must not be cached across renders.
    pub fn by_id(&self, id: &str) -> Option<Node> {
        self.inner.scoped.borrow().get(id).cloned()
    }

    pub(crate) fn register_scoped(&self, id: &str, node: &Node) {
        self.inner
            .scoped
            .borrow_mut()
            .insert(id.to_string(), node.clone());
    }

    pub(crate) fn clear_scoped(&self) {
        self.inner.scoped.borrow_mut().clear();
    }

    // -- element surface ----------------------------------------------------

    pub fn text(&self) -> String {
        self.inner.text.borrow().clone()
    }

    pub fn set_text(&self, text: &str) {
        if *self.inner.text.borrow() != text {
            *self.inner.text.borrow_mut() = text.to_string();
        }
    }

    pub fn attribute(&self, name: &str) -> Option<String> {
        self.inner.attributes.borrow().get(name).cloned()
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.inner.attributes.borrow().contains_key(name)
    }

    /// Imperative attribute write (used for plain children). Idempotent.
    pub fn set_attribute(&self, name: &str, value: &str) {
        let mut attributes = self.inner.attributes.borrow_mut();
        if attributes.get(name).map(String::as_str) != Some(value) {
            attributes.insert(name.to_string(), value.to_string());
        }
    }

    pub fn remove_attribute(&self, name: &str) {
        self.inner.attributes.borrow_mut().shift_remove(name);
    }

    pub fn style_value(&self, key: &str) -> Option<String> {
        self.inner.style.borrow().get(key).cloned()
    }

    pub fn set_style(&self, key: &str, value: &str) {
        self.inner
            .style
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
    }

    /// Mirrors a reflected property to the attribute map. `true` means the
    /// attribute is present with an empty value; `false`, the empty string,
    /// and `Undefined` remove it; strings and numbers are set verbatim,
    /// skipped when already identical.
    fn reflect_attribute(&self, prop: &str, value: &Value) {
        if !self.inner.is_element {
            return;
        }
        let mut attributes = self.inner.attributes.borrow_mut();
        match value {
            Value::Bool(true) => {
                attributes.insert(prop.to_string(), String::new());
            }
            Value::Bool(false) | Value::Undefined => {
                attributes.shift_remove(prop);
            }
            Value::String(s) if s.is_empty() => {
                attributes.shift_remove(prop);
            }
            Value::String(s) => {
                if attributes.get(prop).map(String::as_str) != Some(s.as_str()) {
                    attributes.insert(prop.to_string(), s.clone());
                }
            }
            Value::Number(n) => {
                let formatted = format_number(*n);
                if attributes.get(prop) != Some(&formatted) {
                    attributes.insert(prop.to_string(), formatted);
                }
            }
            _ => {}
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Node")
            .field("tag", &self.inner.tag)
            .field("id", &self.inner.id)
            .field("connected", &self.inner.connected.get())
            .finish()
    }
}

/// A queued change whose old and new values are the same node identity is
/// an in-place mutation, announced as `{prop}-mutated`.
fn mutation_subject(change: &PropertyChange) -> Option<Node> {
    match (&change.value, &change.old_value) {
        (Value::Node(new), Value::Node(old)) if Node::ptr_eq(new, old) => Some(new.clone()),
        _ => None,
    }
}

pub(crate) fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

pub(crate) fn style_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => format_number(*n),
        Value::Bool(b) => b.to_string(),
        other => format!("{:?}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::App;
    use crate::events::EventHandler;
    use crate::property::Prop;
    use crate::registry::ClassDecl;
    use crate::value::TypeTag;

    fn recording_app() -> App {
        let app = App::new();
        app.register(
            ClassDecl::new("x-item")
                .prop("value", Prop::value(0))
                .prop("_cache", Prop::value(0)),
        )
        .unwrap();
        app
    }

    fn record_events(node: &Node, kind: &str) -> Rc<RefCell<Vec<Event>>> {
        let log: Rc<RefCell<Vec<Event>>> = Rc::default();
        let sink = log.clone();
        node.add_listener(
            kind,
            Listener::Handler(EventHandler::new(move |event| {
                sink.borrow_mut().push(event.clone());
            })),
        );
        log
    }

    #[test]
    fn no_op_write_enqueues_nothing() {
        let app = recording_app();
        let node = app.create("x-item", &[]);
        app.connect(&node);
        let log = record_events(&node, "value-changed");
        node.set_property("value", Value::from(0));
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn write_then_flush_dispatches_once_with_baseline_old_value() {
        let app = recording_app();
        let node = app.create("x-item", &[]);
        let log = record_events(&node, "value-changed");
        node.set_property("value", Value::from(5));
        assert!(log.borrow().is_empty());
        app.connect(&node);
        let events = log.borrow();
        assert_eq!(events.len(), 1);
        let change = events[0].detail.change().unwrap();
        assert_eq!(change.value, Value::from(5));
        assert_eq!(change.old_value, Value::from(0));
        assert_eq!(node.get("value"), Value::from(5));
    }

    #[test]
    fn batched_writes_coalesce_to_one_notification() {
        let app = recording_app();
        let node = app.create("x-item", &[]);
        let log = record_events(&node, "value-changed");
        node.set_properties([("value".to_string(), Value::from(1))]);
        node.set_properties([("value".to_string(), Value::from(2))]);
        app.connect(&node);
        let events = log.borrow();
        assert_eq!(events.len(), 1);
        let change = events[0].detail.change().unwrap();
        assert_eq!(change.old_value, Value::from(0));
        assert_eq!(change.value, Value::from(2));
    }

    #[test]
    fn private_properties_mutate_silently() {
        struct Probe {
            changed_calls: Rc<Cell<usize>>,
        }
        impl Behavior for Probe {
            fn changed(&mut self, _node: &Node) {
                self.changed_calls.set(self.changed_calls.get() + 1);
            }
        }
        let changed_calls: Rc<Cell<usize>> = Rc::default();
        let probe_calls = changed_calls.clone();
        let app = App::new();
        app.register(
            ClassDecl::new("x-private")
                .prop("_cache", Prop::value(0))
                .behavior(move || {
                    Box::new(Probe {
                        changed_calls: probe_calls.clone(),
                    })
                }),
        )
        .unwrap();
        let node = app.create("x-private", &[]);
        app.connect(&node);
        let log = record_events(&node, "_cache-changed");
        node.set_property("_cache", Value::from(9));
        assert_eq!(node.get("_cache"), Value::from(9));
        assert!(log.borrow().is_empty());
        assert_eq!(changed_calls.get(), 0);
    }

    #[test]
    fn observers_run_before_notifications() {
        let order: Rc<RefCell<Vec<&'static str>>> = Rc::default();
        struct Ordered {
            order: Rc<RefCell<Vec<&'static str>>>,
        }
        impl Behavior for Ordered {
            fn call(&mut self, _node: &Node, method: &str, _event: &Event) {
                if method == "value_changed" {
                    self.order.borrow_mut().push("observer");
                }
            }
            fn changed(&mut self, _node: &Node) {
                self.order.borrow_mut().push("changed");
            }
        }
        let app = App::new();
        let behavior_order = order.clone();
        app.register(
            ClassDecl::new("x-ordered")
                .prop("value", Prop::value(0).observe("value_changed"))
                .behavior(move || {
                    Box::new(Ordered {
                        order: behavior_order.clone(),
                    })
                }),
        )
        .unwrap();
        let node = app.create("x-ordered", &[]);
        app.connect(&node);
        let listener_order = order.clone();
        node.add_listener(
            "value-changed",
            Listener::Handler(EventHandler::new(move |_| {
                listener_order.borrow_mut().push("notification");
            })),
        );
        node.set_property("value", Value::from(1));
        assert_eq!(*order.borrow(), vec!["observer", "changed", "notification"]);
    }

    #[test]
    fn set_dispatches_user_action_event() {
        let app = recording_app();
        let node = app.create("x-item", &[]);
        app.connect(&node);
        let set_log = record_events(&node, "value-set");
        let changed_log = record_events(&node, "value-changed");
        node.set("value", Value::from(3));
        assert_eq!(set_log.borrow().len(), 1);
        assert_eq!(changed_log.borrow().len(), 1);
        // Setting the same value again is a no-op in both channels.
        node.set("value", Value::from(3));
        assert_eq!(set_log.borrow().len(), 1);
        assert_eq!(changed_log.borrow().len(), 1);
    }

    #[test]
    fn reflected_properties_mirror_to_attributes() {
        let app = App::new();
        app.register(
            ClassDecl::new("x-reflect")
                .prop("label", Prop::value("").reflect())
                .prop("active", Prop::typed(TypeTag::Bool).reflect())
                .prop("count", Prop::value(0).reflect()),
        )
        .unwrap();
        let node = app.create("x-reflect", &[]);
        app.connect(&node);

        node.set_property("label", Value::from("hi"));
        assert_eq!(node.attribute("label").as_deref(), Some("hi"));
        node.set_property("label", Value::from(""));
        assert!(!node.has_attribute("label"));

        node.set_property("active", Value::from(true));
        assert_eq!(node.attribute("active").as_deref(), Some(""));
        node.set_property("active", Value::from(false));
        assert!(!node.has_attribute("active"));

        node.set_property("count", Value::from(4));
        assert_eq!(node.attribute("count").as_deref(), Some("4"));
    }

    #[test]
    fn bubbling_walks_the_parent_chain() {
        let app = recording_app();
        let parent = app.create("x-item", &[]);
        let child = app.create("x-item", &[]);
        child.set_parent(Some(&parent));
        let log = record_events(&parent, "ping");
        child.dispatch_event("ping", EventDetail::Empty, true);
        let events = log.borrow();
        assert_eq!(events.len(), 1);
        assert!(Node::ptr_eq(&events[0].target, &child));
        assert_eq!(events[0].path.len(), 2);
        // Non-bubbling events stay local.
        drop(events);
        child.dispatch_event("ping", EventDetail::Empty, false);
        assert_eq!(log.borrow().len(), 1);
    }

    #[test]
    fn disconnect_defers_notifications_until_reconnect() {
        let app = recording_app();
        let node = app.create("x-item", &[]);
        app.connect(&node);
        let log = record_events(&node, "value-changed");
        app.disconnect(&node);
        node.set_property("value", Value::from(8));
        assert!(log.borrow().is_empty());
        app.connect(&node);
        assert_eq!(log.borrow().len(), 1);
    }

    #[test]
    fn bound_descriptors_follow_connection() {
        let app = recording_app();
        let src = app.create("x-item", &[]);
        let dst = app.create("x-item", &[]);
        app.connect(&src);
        app.connect(&dst);

        let binding = src.bind("value");
        dst.set_binding("value", &binding);
        src.set_property("value", Value::from(2));
        assert_eq!(dst.get("value"), Value::from(2));

        // A disconnected target stops receiving updates and catches up on
        // reconnect, when its descriptor re-attaches to the binding.
        app.disconnect(&dst);
        src.set_property("value", Value::from(3));
        assert_eq!(dst.get("value"), Value::from(2));
        app.connect(&dst);
        assert_eq!(dst.get("value"), Value::from(3));
    }

    #[test]
    fn dispose_is_terminal() {
        let app = recording_app();
        let node = app.create("x-item", &[]);
        app.connect(&node);
        let child = app.create("x-item", &[]);
        node.push_child(child.clone());
        node.dispose();
        assert!(node.is_disposed());
        assert!(child.is_disposed());
        assert!(!node.is_connected());
        assert_eq!(node.child_count(), 0);
    }
}

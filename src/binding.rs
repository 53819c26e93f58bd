//! Cross-component value bindings.
//!
//! A [`Binding`] relays one source property to any number of target
//! properties on other nodes, and mirrors target edits back to the source.
//! Both directions go through the ordinary property setters, so observers
//! and notifications fire as for any other write. Oscillation is prevented
//! by the change-detection equality rule: a relay never writes a value the
//! receiver already holds, and `NaN` compares equal to `NaN`.
//!
//! Bindings are owned by their source node and live until [`Binding::dispose`]
//! runs (the source node's own dispose calls it). Targets only hold listener
//! registrations; removing a target simply stops its updates.

use crate::events::{EventHandler, Listener};
use crate::node::Node;
use crate::value::{value_eq, Value};
use core::fmt;
use indexmap::IndexMap;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

/// A shared handle to one source-property binding.
#[derive(Clone)]
pub struct Binding {
    inner: Rc<BindingInner>,
}

struct BindingInner {
    source: Node,
    source_prop: String,
    targets: RefCell<Vec<BindingTarget>>,
    /// Relay registered for the source's `{prop}-changed`.
    update_targets: EventHandler,
    /// Relay registered for every target's `{prop}-changed`.
    update_source: EventHandler,
    disposed: Cell<bool>,
}

#[derive(Clone)]
struct BindingTarget {
    node: Node,
    props: Vec<String>,
}

impl Binding {
    pub(crate) fn new(source: &Node, source_prop: &str) -> Binding {
        let inner = Rc::new_cyclic(|weak: &Weak<BindingInner>| {
            let update_targets = {
                let weak = weak.clone();
                EventHandler::new(move |event| {
                    let Some(inner) = weak.upgrade() else { return };
                    if inner.disposed.get() {
                        return;
                    }
                    if !Node::ptr_eq(&event.target, &inner.source) {
                        tracing::warn!(
                            kind = %event.kind,
                            "binding source relay fired for a foreign node, ignoring"
                        );
                        return;
                    }
                    let Some(change) = event.detail.change() else { return };
                    // Snapshot: a target that (un)registers while the fanout
                    // runs is picked up by the next change, not this one.
                    let snapshot: Vec<BindingTarget> = inner.targets.borrow().clone();
                    for target in &snapshot {
                        for prop in &target.props {
                            if !value_eq(&target.node.get(prop), &change.value) {
                                target.node.set_property(prop, change.value.clone());
                            }
                        }
                    }
                })
            };
            let update_source = {
                let weak = weak.clone();
                EventHandler::new(move |event| {
                    let Some(inner) = weak.upgrade() else { return };
                    if inner.disposed.get() {
                        return;
                    }
                    let Some(change) = event.detail.change() else { return };
                    let registered = inner.targets.borrow().iter().any(|t| {
                        Node::ptr_eq(&t.node, &event.target)
                            && t.props.iter().any(|p| *p == change.property)
                    });
                    if !registered {
                        tracing::warn!(
                            kind = %event.kind,
                            "binding target relay fired for an unregistered target, ignoring"
                        );
                        return;
                    }
                    if !value_eq(&inner.source.get(&inner.source_prop), &change.value) {
                        inner
                            .source
                            .set_property(&inner.source_prop, change.value.clone());
                    }
                })
            };
            BindingInner {
                source: source.clone(),
                source_prop: source_prop.to_string(),
                targets: RefCell::new(Vec::new()),
                update_targets,
                update_source,
                disposed: Cell::new(false),
            }
        });
        source.add_listener(
            &format!("{source_prop}-changed"),
            Listener::Handler(inner.update_targets.clone()),
        );
        Binding { inner }
    }

    pub fn source(&self) -> &Node {
        &self.inner.source
    }

    pub fn source_prop(&self) -> &str {
        &self.inner.source_prop
    }

    /// The source property's current value.
    pub fn value(&self) -> Value {
        self.inner.source.get(&self.inner.source_prop)
    }

    pub fn ptr_eq(a: &Binding, b: &Binding) -> bool {
        Rc::ptr_eq(&a.inner, &b.inner)
    }

    /// Registers `(node, prop)` as a binding target and pushes the source's
    /// current value into it. No-op for an already-registered pair.
    pub fn add_target(&self, node: &Node, prop: &str) {
        if self.inner.disposed.get() {
            tracing::warn!(
                prop = self.inner.source_prop,
                "add_target on a disposed binding, ignoring"
            );
            return;
        }
        {
            let mut targets = self.inner.targets.borrow_mut();
            match targets.iter_mut().find(|t| Node::ptr_eq(&t.node, node)) {
                Some(t) if t.props.iter().any(|p| p == prop) => return,
                Some(t) => t.props.push(prop.to_string()),
                None => targets.push(BindingTarget {
                    node: node.clone(),
                    props: vec![prop.to_string()],
                }),
            }
        }
        node.add_listener(
            &format!("{prop}-changed"),
            Listener::Handler(self.inner.update_source.clone()),
        );
        let value = self.value();
        if !value_eq(&node.get(prop), &value) {
            node.set_property(prop, value);
        }
    }

    /// Unregisters one target property, or with `prop = None` every
    /// property registered for `node`. A node with no remaining properties
    /// leaves the target list.
    pub fn remove_target(&self, node: &Node, prop: Option<&str>) {
        let mut removed: Vec<String> = Vec::new();
        {
            let mut targets = self.inner.targets.borrow_mut();
            if let Some(pos) = targets.iter().position(|t| Node::ptr_eq(&t.node, node)) {
                match prop {
                    Some(p) => {
                        targets[pos].props.retain(|q| {
                            if q == p {
                                removed.push(q.clone());
                                false
                            } else {
                                true
                            }
                        });
                        if targets[pos].props.is_empty() {
                            targets.remove(pos);
                        }
                    }
                    None => removed = targets.remove(pos).props,
                }
            }
        }
        for p in removed {
            node.remove_listener(
                &format!("{p}-changed"),
                &Listener::Handler(self.inner.update_source.clone()),
            );
        }
    }

    pub fn target_count(&self) -> usize {
        self.inner.targets.borrow().len()
    }

    #[cfg(test)]
    pub(crate) fn has_target(&self, node: &Node, prop: &str) -> bool {
        self.inner
            .targets
            .borrow()
            .iter()
            .any(|t| Node::ptr_eq(&t.node, node) && t.props.iter().any(|p| p == prop))
    }

    /// Tears the binding down: drops the source relay and every target
    /// registration. Idempotent.
    pub fn dispose(&self) {
        if self.inner.disposed.replace(true) {
            return;
        }
        self.inner.source.remove_listener(
            &format!("{}-changed", self.inner.source_prop),
            &Listener::Handler(self.inner.update_targets.clone()),
        );
        let targets = self.inner.targets.take();
        for target in targets {
            for prop in target.props {
                target.node.remove_listener(
                    &format!("{prop}-changed"),
                    &Listener::Handler(self.inner.update_source.clone()),
                );
            }
        }
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Binding")
            .field("source", &self.inner.source.tag())
            .field("source_prop", &self.inner.source_prop)
            .field("targets", &self.inner.targets.borrow().len())
            .field("disposed", &self.inner.disposed.get())
            .finish()
    }
}

/// Per-node cache of source bindings, keyed by property name. Makes
/// [`Node::bind`] idempotent per property.
#[derive(Debug, Default)]
pub(crate) struct NodeBindings {
    entries: IndexMap<String, Binding>,
}

impl NodeBindings {
    pub(crate) fn bind(&mut self, source: &Node, prop: &str) -> Binding {
        if let Some(binding) = self.entries.get(prop) {
            return binding.clone();
        }
        let binding = Binding::new(source, prop);
        self.entries.insert(prop.to_string(), binding.clone());
        binding
    }

    pub(crate) fn dispose_all(&mut self) {
        for (_, binding) in self.entries.drain(..) {
            binding.dispose();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::App;
    use crate::property::Prop;
    use crate::registry::ClassDecl;

    fn counter_app() -> App {
        let app = App::new();
        app.register(ClassDecl::new("x-counter").prop("value", Prop::value(0)))
            .unwrap();
        app
    }

    #[test]
    fn bind_is_idempotent_per_property() {
        let app = counter_app();
        let a = app.create("x-counter", &[]);
        let first = a.bind("value");
        let second = a.bind("value");
        assert!(Binding::ptr_eq(&first, &second));
    }

    #[test]
    fn add_target_pushes_current_value_and_relays_changes() {
        let app = counter_app();
        let a = app.create("x-counter", &[]);
        let b = app.create("x-counter", &[]);
        app.connect(&a);
        app.connect(&b);
        a.set_property("value", Value::from(5));

        let binding = a.bind("value");
        binding.add_target(&b, "value");
        assert!(binding.has_target(&b, "value"));
        assert_eq!(b.get("value"), Value::from(5));

        a.set_property("value", Value::from(7));
        assert_eq!(b.get("value"), Value::from(7));
    }

    #[test]
    fn target_edits_mirror_back_to_source_and_other_targets() {
        let app = counter_app();
        let a = app.create("x-counter", &[]);
        let b = app.create("x-counter", &[]);
        let c = app.create("x-counter", &[]);
        app.connect(&a);
        app.connect(&b);
        app.connect(&c);

        let binding = a.bind("value");
        binding.add_target(&b, "value");
        binding.add_target(&c, "value");

        b.set_property("value", Value::from(3));
        assert_eq!(a.get("value"), Value::from(3));
        assert_eq!(c.get("value"), Value::from(3));
    }

    #[test]
    fn nan_does_not_oscillate() {
        let app = counter_app();
        let a = app.create("x-counter", &[]);
        let b = app.create("x-counter", &[]);
        app.connect(&a);
        app.connect(&b);

        let binding = a.bind("value");
        binding.add_target(&b, "value");

        a.set_property("value", Value::Number(f64::NAN));
        assert!(b.get("value").as_number().unwrap().is_nan());
        // A second NaN write on either side is a no-op under the
        // change-detection rule, so nothing relays.
        b.set_property("value", Value::Number(f64::NAN));
        assert!(a.get("value").as_number().unwrap().is_nan());
    }

    #[test]
    fn dispose_stops_propagation() {
        let app = counter_app();
        let a = app.create("x-counter", &[]);
        let b = app.create("x-counter", &[]);
        app.connect(&a);
        app.connect(&b);

        let binding = a.bind("value");
        binding.add_target(&b, "value");
        binding.dispose();

        a.set_property("value", Value::from(9));
        assert_eq!(b.get("value"), Value::from(0));
    }

    #[test]
    fn remove_target_drops_only_that_property() {
        let app = counter_app();
        app.register(
            ClassDecl::new("x-pair")
                .prop("left", Prop::value(0))
                .prop("right", Prop::value(0)),
        )
        .unwrap();
        let src = app.create("x-counter", &[]);
        let dst = app.create("x-pair", &[]);
        app.connect(&src);
        app.connect(&dst);

        let binding = src.bind("value");
        binding.add_target(&dst, "left");
        binding.add_target(&dst, "right");
        binding.remove_target(&dst, Some("left"));

        src.set_property("value", Value::from(4));
        assert_eq!(dst.get("left"), Value::from(0));
        assert_eq!(dst.get("right"), Value::from(4));
        assert_eq!(binding.target_count(), 1);

        binding.remove_target(&dst, None);
        assert_eq!(binding.target_count(), 0);
    }
}

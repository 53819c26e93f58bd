//! The application context.
//!
//! One [`App`] exists per running application and is passed explicitly to
//! everything that needs it: it owns the class [`Registry`], the installed
//! [`StyleSheets`], the index of connected nodes, and the object-mutation
//! broadcast that lets components react to in-place changes of plain
//! reactive objects they hold by reference.

use crate::node::{Node, NodeId, WeakNode};
use crate::registry::{ClassDecl, RegisterError, Registry};
use crate::style::StyleSheets;
use crate::value::Value;
use indexmap::IndexMap;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

#[derive(Clone)]
pub struct App {
    inner: Rc<AppInner>,
}

struct AppInner {
    /// Owner token used when the app itself holds a node (root ownership).
    token: NodeId,
    registry: Registry,
    styles: StyleSheets,
    /// Connected nodes, by id. Weak: the index never keeps a node alive.
    nodes: RefCell<IndexMap<NodeId, WeakNode>>,
    /// True while a mutation broadcast is running. Receivers flush during
    /// the broadcast, and their flushes must not broadcast again: two
    /// objects holding each other would otherwise recurse forever.
    broadcasting: Cell<bool>,
}

impl App {
    pub fn new() -> App {
        App {
            inner: Rc::new(AppInner {
                token: NodeId::new(),
                registry: Registry::default(),
                styles: StyleSheets::default(),
                nodes: RefCell::new(IndexMap::new()),
                broadcasting: Cell::new(false),
            }),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    pub fn styles(&self) -> &StyleSheets {
        &self.inner.styles
    }

    pub fn register(&self, decl: ClassDecl) -> Result<(), RegisterError> {
        self.inner.registry.register(decl)
    }

    /// Constructs an instance of `tag`. Unknown tags fall back to a generic
    /// plain element, never an error, so a partially-registered widget set
    /// still renders its known parts.
    pub fn create(&self, tag: &str, props: &[(&str, Value)]) -> Node {
        self.create_node(
            tag,
            props
                .iter()
                .map(|(name, value)| (name.to_string(), value.clone()))
                .collect(),
        )
    }

    pub(crate) fn create_node(&self, tag: &str, props: Vec<(String, Value)>) -> Node {
        let class = self.inner.registry.get(tag);
        if let Some(class) = &class {
            for css in &class.styles {
                self.inner.styles.install(tag, css);
            }
        }
        Node::construct(self, tag, class, props)
    }

    /// Connects `node` with the app as its owner.
    pub fn connect(&self, node: &Node) {
        node.connect_owner(self.inner.token);
    }

    pub fn disconnect(&self, node: &Node) {
        node.disconnect_owner(self.inner.token);
    }

    pub fn node_by_id(&self, id: NodeId) -> Option<Node> {
        self.inner
            .nodes
            .borrow()
            .get(&id)
            .and_then(WeakNode::upgrade)
    }

    pub(crate) fn register_node(&self, node: &Node) {
        self.inner
            .nodes
            .borrow_mut()
            .insert(node.id(), node.downgrade());
    }

    pub(crate) fn unregister_node(&self, node: &Node) {
        self.inner.nodes.borrow_mut().shift_remove(&node.id());
    }

    /// A plain reactive object flushed: every connected node holding it in
    /// an object-typed property re-runs its mutation hook. Flushes caused
    /// by the broadcast itself do not broadcast again.
    pub(crate) fn broadcast_object_mutated(&self, subject: &Node) {
        if self.inner.broadcasting.replace(true) {
            return;
        }
        let receivers: Vec<Node> = self
            .inner
            .nodes
            .borrow()
            .values()
            .filter_map(WeakNode::upgrade)
            .collect();
        for receiver in receivers {
            if Node::ptr_eq(&receiver, subject) {
                continue;
            }
            receiver.on_object_mutation(subject);
        }
        self.inner.broadcasting.set(false);
    }
}

impl Default for App {
    fn default() -> App {
        App::new()
    }
}

//! Tree reconciliation.
//!
//! [`Node::template`] diffs a declarative child description against the
//! host's live children, order-positionally, with no keyed reordering:
//! surplus children are trimmed from the tail and disposed, missing ones
//! are constructed and appended in one batch, a wrong-tag child is replaced
//! (never mutated in place), and matching children are updated cheaply.
//! Children named by an `id` prop land in the template root's `$` lookup,
//! which is rebuilt from scratch on every render.

use crate::node::{format_number, style_string, Node};
use crate::value::Value;
use crate::vdom::{Children, VNode};

impl Node {
    /// Renders `description` as this node's subtree and rebuilds the `$`
    /// lookup. Typically called from a behavior's `changed()`.
    pub fn template(&self, description: Vec<VNode>) {
        self.clear_scoped();
        reconcile(self, self, description);
    }
}

fn reconcile(root: &Node, host: &Node, description: Vec<VNode>) {
    if !host.begin_render() {
        tracing::warn!(tag = %host.tag(), "re-entrant render of one host skipped");
        return;
    }
    let description: Vec<VNode> = description.into_iter().map(VNode::normalize).collect();

    // Trim surplus children from the tail, disposing their subtrees.
    while host.child_count() > description.len() {
        if let Some(surplus) = host.pop_child() {
            surplus.set_parent(None);
            surplus.dispose();
        }
    }

    // Construct missing children and append them in one batch.
    let existing = host.child_count();
    if existing < description.len() {
        let appended: Vec<Node> = description[existing..]
            .iter()
            .map(|vnode| construct_child(host, vnode))
            .collect();
        for child in appended {
            host.push_child(child.clone());
            child.set_parent(Some(host));
            if host.is_connected() {
                child.connect(host);
            }
        }
    }

    // Update the positions present on both sides.
    for (index, vnode) in description.iter().enumerate().take(existing) {
        let Some(child) = host.child(index) else { break };
        if child.tag() != vnode.tag {
            // Wrong tag: insert a replacement before the old child, then
            // dispose and remove the old one.
            let replacement = construct_child(host, vnode);
            host.insert_child(index, replacement.clone());
            replacement.set_parent(Some(host));
            if host.is_connected() {
                replacement.connect(host);
            }
            let old = host.remove_child(index + 1);
            old.set_parent(None);
            old.dispose();
        } else if !child.is_plain() {
            child.set_prop_listeners(&vnode.props);
            child.set_properties(vnode.props.iter().cloned());
        } else {
            apply_plain_props(&child, &vnode.props);
        }
    }

    // Post pass: `$` registration, text content, recursion.
    for (index, vnode) in description.iter().enumerate() {
        let Some(child) = host.child(index) else { break };
        if let Some(id) = prop_str(vnode, "id") {
            root.register_scoped(id, &child);
        }
        match &vnode.children {
            Children::Text(text) => child.set_text(text),
            Children::Nodes(nodes) => reconcile(root, &child, nodes.clone()),
            Children::Empty => {}
        }
    }
    host.end_render();
}

fn construct_child(host: &Node, vnode: &VNode) -> Node {
    let child = host.app().create_node(&vnode.tag, vnode.props.clone());
    if child.is_plain() {
        apply_plain_props(&child, &vnode.props);
    }
    child
}

/// Imperative prop application for generic elements: attributes verbatim,
/// `style` exploded key by key, inline `on-*` listeners re-registered.
fn apply_plain_props(node: &Node, props: &[(String, Value)]) {
    node.set_prop_listeners(props);
    for (name, value) in props {
        if name.starts_with("on-") {
            continue;
        }
        if name == "style" {
            if let Value::Map(entries) = value {
                for (key, entry) in entries {
                    node.set_style(key, &style_string(entry));
                }
            }
        } else if name == "className" {
            if let Value::String(class) = value {
                node.set_attribute("class", class);
            }
        } else {
            match value {
                Value::String(s) => node.set_attribute(name, s),
                Value::Number(n) => node.set_attribute(name, &format_number(*n)),
                Value::Bool(true) => node.set_attribute(name, ""),
                Value::Bool(false) | Value::Undefined => node.remove_attribute(name),
                _ => {}
            }
        }
    }
}

fn prop_str<'a>(vnode: &'a VNode, name: &str) -> Option<&'a str> {
    vnode
        .props
        .iter()
        .find(|(prop, _)| prop == name)
        .and_then(|(_, value)| value.as_str())
}

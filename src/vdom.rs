//! Declarative tree literals.
//!
//! A [`VNode`] describes one desired child: a tag, props, and either
//! nothing to reconcile, text content, or a list of child descriptions.
//! An explicit empty list is not the same as no list: empty removes every
//! live child, [`Children::Empty`] leaves the subtree alone. Trees are
//! passed through [`VNode::normalize`] before diffing; normalizing an
//! already normalized tree is a no-op.
//!
//! The [`node!`] and [`tree!`] macros give the literal syntax:
//!
//! ```
//! # use perch::{node, tree};
//! let description = tree![
//!     node!("h1", "Title"),
//!     node!("div", { "class" => "row" }, [
//!         node!("x-button", { "label" => "ok" }),
//!     ]),
//! ];
//! ```

use crate::value::Value;

#[derive(Clone, Debug, PartialEq)]
pub struct VNode {
    pub tag: String,
    pub props: Vec<(String, Value)>,
    pub children: Children,
}

#[derive(Clone, Debug, PartialEq, Default)]
pub enum Children {
    #[default]
    Empty,
    /// Text content, terminal: no recursion below this node.
    Text(String),
    Nodes(Vec<VNode>),
}

impl VNode {
    pub fn new(tag: impl Into<String>) -> VNode {
        VNode {
            tag: tag.into(),
            props: Vec::new(),
            children: Children::Empty,
        }
    }

    pub fn prop(mut self, name: impl Into<String>, value: impl Into<Value>) -> VNode {
        self.props.push((name.into(), value.into()));
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> VNode {
        self.children = Children::Text(text.into());
        self
    }

    pub fn children(mut self, children: Vec<VNode>) -> VNode {
        self.children = Children::Nodes(children);
        self
    }

    /// Normalizes child lists recursively. An explicit empty list stays
    /// [`Children::Nodes`], distinct from [`Children::Empty`]: empty trims
    /// a live subtree, `Empty` never touches it. Idempotent.
    pub fn normalize(mut self) -> VNode {
        self.children = match self.children {
            Children::Nodes(nodes) => {
                Children::Nodes(nodes.into_iter().map(VNode::normalize).collect())
            }
            other => other,
        };
        self
    }
}

/// Child-slot entries for the [`tree!`]/[`node!`] macros: a `VNode`, or an
/// `Option<VNode>` whose `None` is a pruned hole.
pub trait IntoChild {
    fn into_child(self) -> Option<VNode>;
}

impl IntoChild for VNode {
    fn into_child(self) -> Option<VNode> {
        Some(self)
    }
}

impl IntoChild for Option<VNode> {
    fn into_child(self) -> Option<VNode> {
        self
    }
}

/// One tree-literal node: `node!(tag)`, `node!(tag, "text")`,
/// `node!(tag, { props })`, `node!(tag, [ children ])`, and the
/// props-plus-children combinations.
#[macro_export]
macro_rules! node {
    ($tag:expr) => {
        $crate::VNode::new($tag)
    };
    ($tag:expr, { $($name:literal => $value:expr),* $(,)? }) => {
        $crate::VNode {
            tag: ::std::string::String::from($tag),
            props: ::std::vec![$((::std::string::String::from($name), $crate::Value::from($value))),*],
            children: $crate::Children::Empty,
        }
    };
    ($tag:expr, { $($name:literal => $value:expr),* $(,)? }, [ $($child:expr),* $(,)? ]) => {
        $crate::VNode {
            tag: ::std::string::String::from($tag),
            props: ::std::vec![$((::std::string::String::from($name), $crate::Value::from($value))),*],
            children: $crate::Children::Nodes($crate::tree![$($child),*]),
        }
    };
    ($tag:expr, { $($name:literal => $value:expr),* $(,)? }, $text:expr) => {
        $crate::VNode {
            tag: ::std::string::String::from($tag),
            props: ::std::vec![$((::std::string::String::from($name), $crate::Value::from($value))),*],
            children: $crate::Children::Text(::std::string::String::from($text)),
        }
    };
    ($tag:expr, [ $($child:expr),* $(,)? ]) => {
        $crate::VNode {
            tag: ::std::string::String::from($tag),
            props: ::std::vec::Vec::new(),
            children: $crate::Children::Nodes($crate::tree![$($child),*]),
        }
    };
    ($tag:expr, $text:expr) => {
        $crate::VNode {
            tag: ::std::string::String::from($tag),
            props: ::std::vec::Vec::new(),
            children: $crate::Children::Text(::std::string::String::from($text)),
        }
    };
}

/// A child list; `None` entries are pruned.
#[macro_export]
macro_rules! tree {
    ($($child:expr),* $(,)?) => {{
        let children: ::std::vec::Vec<::std::option::Option<$crate::VNode>> = ::std::vec![
            $($crate::vdom::IntoChild::into_child($child)),*
        ];
        children
            .into_iter()
            .flatten()
            .collect::<::std::vec::Vec<$crate::VNode>>()
    }};
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn literal_forms() {
        let n = node!("div");
        assert_eq!(n.tag, "div");
        assert_eq!(n.children, Children::Empty);

        let n = node!("h1", "hello");
        assert_eq!(n.children, Children::Text("hello".into()));

        let n = node!("div", { "class" => "row", "count" => 3 });
        assert_eq!(
            n.props,
            vec![
                ("class".to_string(), Value::from("row")),
                ("count".to_string(), Value::from(3)),
            ]
        );

        let n = node!("div", [node!("span", "a"), node!("span", "b")]);
        match n.children {
            Children::Nodes(nodes) => assert_eq!(nodes.len(), 2),
            other => panic!("expected nodes, got {:?}", other),
        }
    }

    #[test]
    fn holes_are_pruned() {
        let show = false;
        let children = tree![
            node!("a"),
            if show { Some(node!("b")) } else { None },
            node!("c"),
        ];
        let tags: Vec<&str> = children.iter().map(|c| c.tag.as_str()).collect();
        assert_eq!(tags, vec!["a", "c"]);
    }

    #[test]
    fn empty_child_list_stays_explicit() {
        let n = node!("div", []).normalize();
        assert_eq!(n.children, Children::Nodes(Vec::new()));
        assert_ne!(n.children, Children::Empty);
        let none: Vec<VNode> = tree![];
        assert!(none.is_empty());
    }

    fn arb_vnode() -> impl Strategy<Value = VNode> {
        let leaf = "[a-z]{1,6}".prop_map(VNode::new);
        leaf.prop_recursive(3, 24, 4, |inner| {
            (
                "[a-z]{1,6}",
                prop_oneof![
                    Just(Children::Empty),
                    "[ a-z]{0,10}".prop_map(Children::Text),
                    prop::collection::vec(inner, 0..4).prop_map(Children::Nodes),
                ],
            )
                .prop_map(|(tag, children)| VNode {
                    tag,
                    props: Vec::new(),
                    children,
                })
        })
    }

    proptest! {
        #[test]
        fn normalize_is_idempotent(node in arb_vnode()) {
            let once = node.normalize();
            prop_assert_eq!(once.clone(), once.normalize());
        }
    }
}

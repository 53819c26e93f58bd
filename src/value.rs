//! Dynamic property values and their type tags.

use crate::events::EventHandler;
use crate::node::Node;
use core::fmt;
use indexmap::IndexMap;

/// A dynamically typed property value.
///
/// Values are cheap to clone: containers are plain owned collections and
/// node/handler variants are reference-counted handles.
#[derive(Clone)]
pub enum Value {
    /// No value. Properties without a default and without a synthesizable
    /// type default start out undefined.
    Undefined,
    Bool(bool),
    Number(f64),
    String(String),
    List(Vec<Value>),
    Map(IndexMap<String, Value>),
    /// A reference to another reactive node.
    Node(Node),
    /// An inline event handler (used by `on-*` props in tree literals).
    Handler(EventHandler),
}

impl Value {
    /// Infers a type tag from a concrete value, if one applies.
    pub fn type_tag(&self) -> Option<TypeTag> {
        match self {
            Value::Undefined => None,
            Value::Bool(_) => Some(TypeTag::Bool),
            Value::Number(_) => Some(TypeTag::Number),
            Value::String(_) => Some(TypeTag::String),
            Value::List(_) => Some(TypeTag::List),
            Value::Map(_) => Some(TypeTag::Map),
            Value::Node(node) => Some(TypeTag::Object(node.tag().to_string())),
            Value::Handler(_) => Some(TypeTag::Function),
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_node(&self) -> Option<&Node> {
        match self {
            Value::Node(n) => Some(n),
            _ => None,
        }
    }
}

/// The change-detection equality rule.
///
/// `NaN` is equal to `NaN` (prevents binding oscillation between two nodes
/// that both hold `NaN`). Nodes and handlers compare by identity; lists and
/// maps compare structurally, recursing with the same rule.
pub fn value_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Undefined, Value::Undefined) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Number(a), Value::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
        (Value::String(a), Value::String(b)) => a == b,
        (Value::List(a), Value::List(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| value_eq(x, y))
        }
        (Value::Map(a), Value::Map(b)) => {
            a.len() == b.len()
                && a.iter()
                    .zip(b)
                    .all(|((ka, va), (kb, vb))| ka == kb && value_eq(va, vb))
        }
        (Value::Node(a), Value::Node(b)) => Node::ptr_eq(a, b),
        (Value::Handler(a), Value::Handler(b)) => EventHandler::ptr_eq(a, b),
        _ => false,
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        value_eq(self, other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "Undefined"),
            Value::Bool(b) => write!(f, "{:?}", b),
            Value::Number(n) => write!(f, "{:?}", n),
            Value::String(s) => write!(f, "{:?}", s),
            Value::List(l) => f.debug_list().entries(l).finish(),
            Value::Map(m) => f.debug_map().entries(m).finish(),
            Value::Node(n) => write!(f, "Node({})", n.tag()),
            Value::Handler(_) => write!(f, "Handler(..)"),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Value {
        Value::Bool(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Value {
        Value::Number(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Value {
        Value::Number(v as f64)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Value {
        Value::Number(v as f64)
    }
}

impl From<usize> for Value {
    fn from(v: usize) -> Value {
        Value::Number(v as f64)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Value {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Value {
        Value::String(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Value {
        Value::List(v)
    }
}

impl From<IndexMap<String, Value>> for Value {
    fn from(v: IndexMap<String, Value>) -> Value {
        Value::Map(v)
    }
}

impl From<Node> for Value {
    fn from(v: Node) -> Value {
        Value::Node(v)
    }
}

impl From<EventHandler> for Value {
    fn from(v: EventHandler) -> Value {
        Value::Handler(v)
    }
}

/// Declared property types.
///
/// Types are advisory: they drive default synthesis and attribute
/// reflection, but a write whose value doesn't match the declared type is
/// accepted as-is.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeTag {
    Bool,
    String,
    Number,
    List,
    Map,
    /// A reactive object type, named by its registered class tag.
    Object(String),
    /// An opaque host-element reference. Never receives a synthesized
    /// default.
    HostElement,
    /// A function/handler slot. Never receives a synthesized default.
    Function,
}

impl TypeTag {
    /// The default value substituted when a typed property has no explicit
    /// value. Object, host-element, and function types stay undefined:
    /// object-typed properties are not auto-constructed.
    pub fn default_value(&self) -> Value {
        match self {
            TypeTag::Bool => Value::Bool(false),
            TypeTag::String => Value::String(String::new()),
            TypeTag::Number => Value::Number(0.0),
            TypeTag::List => Value::List(Vec::new()),
            TypeTag::Map => Value::Map(IndexMap::new()),
            TypeTag::Object(_) | TypeTag::HostElement | TypeTag::Function => Value::Undefined,
        }
    }

    /// True for types whose instances are tracked for the "object mutated"
    /// broadcast (everything except primitives and the two sentinels).
    pub(crate) fn is_object_like(&self) -> bool {
        matches!(self, TypeTag::List | TypeTag::Map | TypeTag::Object(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nan_is_equal_to_nan() {
        assert!(value_eq(&Value::Number(f64::NAN), &Value::Number(f64::NAN)));
        assert!(!value_eq(&Value::Number(f64::NAN), &Value::Number(0.0)));
    }

    #[test]
    fn lists_compare_structurally() {
        let a = Value::List(vec![Value::Number(1.0), Value::Number(f64::NAN)]);
        let b = Value::List(vec![Value::Number(1.0), Value::Number(f64::NAN)]);
        assert!(value_eq(&a, &b));
    }

    #[test]
    fn defaults_for_sentinel_types_stay_undefined() {
        assert_eq!(TypeTag::HostElement.default_value(), Value::Undefined);
        assert_eq!(TypeTag::Function.default_value(), Value::Undefined);
        assert_eq!(
            TypeTag::Object("x-thing".into()).default_value(),
            Value::Undefined
        );
        assert_eq!(TypeTag::Number.default_value(), Value::Number(0.0));
        assert_eq!(TypeTag::String.default_value(), Value::String(String::new()));
    }

    #[test]
    fn type_inference_from_values() {
        assert_eq!(Value::from(true).type_tag(), Some(TypeTag::Bool));
        assert_eq!(Value::from(3).type_tag(), Some(TypeTag::Number));
        assert_eq!(Value::from("x").type_tag(), Some(TypeTag::String));
        assert_eq!(Value::Undefined.type_tag(), None);
    }
}

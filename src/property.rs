//! Property declarations, resolved descriptors, and descriptor tables.
//!
//! A class declares its properties with the [`Prop`] shorthand forms. At
//! registration time the declarations of the whole class chain are merged
//! into one [`PropertyTable`], cached on the resolved class. Each instance
//! then clones the table, at which point typed defaults are synthesized.

use crate::binding::Binding;
use crate::value::{TypeTag, Value};
use indexmap::IndexMap;

/// Property names that collide with a component's structural fields and are
/// rejected at class-registration time.
const RESERVED_NAMES: &[&str] = &[
    "style",
    "class",
    "className",
    "listeners",
    "children",
    "parent",
    "tag",
];

/// True if a property name may not be declared.
pub(crate) fn is_reserved(name: &str) -> bool {
    RESERVED_NAMES.contains(&name) || name.starts_with("on-")
}

/// A property declaration. Only explicitly-set fields participate in the
/// chain merge, so a derived class overrides per field, not per descriptor.
#[derive(Clone, Debug, Default)]
pub struct Prop {
    value: Option<Value>,
    declared_type: Option<TypeTag>,
    reflect: Option<bool>,
    observer: Option<String>,
    enumerable: Option<bool>,
}

impl Prop {
    /// Bare-value shorthand: the declared type is inferred from the value.
    pub fn value(value: impl Into<Value>) -> Prop {
        let value = value.into();
        Prop {
            declared_type: value.type_tag(),
            value: Some(value),
            ..Prop::default()
        }
    }

    /// Constructor shorthand: a type with no explicit value. The instance
    /// receives the type default (or stays undefined for sentinel types).
    pub fn typed(declared_type: TypeTag) -> Prop {
        Prop {
            declared_type: Some(declared_type),
            ..Prop::default()
        }
    }

    /// List-literal shorthand: a `List` type with a copy of the items as
    /// the default value.
    pub fn list(items: Vec<Value>) -> Prop {
        Prop {
            declared_type: Some(TypeTag::List),
            value: Some(Value::List(items)),
            ..Prop::default()
        }
    }

    /// Mirror this property to an external attribute.
    pub fn reflect(mut self) -> Prop {
        self.reflect = Some(true);
        self
    }

    /// Name of the behavior method invoked when this property changes.
    pub fn observe(mut self, method: impl Into<String>) -> Prop {
        self.observer = Some(method.into());
        self
    }

    pub fn non_enumerable(mut self) -> Prop {
        self.enumerable = Some(false);
        self
    }

    /// Folds a more-derived declaration into this one. Later declarations
    /// win, but only for the fields they explicitly set.
    fn merge(&mut self, derived: &Prop) {
        if let Some(value) = &derived.value {
            self.value = Some(value.clone());
        }
        if let Some(ty) = &derived.declared_type {
            self.declared_type = Some(ty.clone());
        }
        if let Some(reflect) = derived.reflect {
            self.reflect = Some(reflect);
        }
        if let Some(observer) = &derived.observer {
            self.observer = Some(observer.clone());
        }
        if let Some(enumerable) = derived.enumerable {
            self.enumerable = Some(enumerable);
        }
    }

    fn into_property(self) -> Property {
        let declared_type = self
            .declared_type
            .or_else(|| self.value.as_ref().and_then(Value::type_tag));
        Property {
            value: self.value.unwrap_or(Value::Undefined),
            declared_type,
            reflect: self.reflect.unwrap_or(false),
            observer: self.observer,
            enumerable: self.enumerable.unwrap_or(true),
            binding: None,
        }
    }
}

/// A resolved property descriptor.
///
/// Class-level descriptors are shared and immutable after registration;
/// each instance owns an independent clone (see
/// [`PropertyTable::clone_for_instance`]).
#[derive(Clone, Debug)]
pub struct Property {
    pub value: Value,
    pub declared_type: Option<TypeTag>,
    pub reflect: bool,
    pub observer: Option<String>,
    pub enumerable: bool,
    /// Binding this instance's property is a target of, if any. Always
    /// `None` on class-level descriptors.
    pub binding: Option<Binding>,
}

impl Property {
    /// Produces the per-instance descriptor: containers are copied so
    /// default lists/maps are never aliased between instances, and typed
    /// defaults are synthesized for properties without an explicit value.
    /// Object-typed, host-element, and function properties stay undefined
    /// until assigned.
    fn clone_for_instance(&self) -> Property {
        let mut prop = self.clone();
        if prop.value.is_undefined() {
            if let Some(ty) = &prop.declared_type {
                prop.value = ty.default_value();
            }
        }
        prop
    }
}

/// The inheritance-merged set of property descriptors for one class, and
/// the per-instance clone of that set.
#[derive(Clone, Debug, Default)]
pub struct PropertyTable {
    entries: IndexMap<String, Property>,
}

impl PropertyTable {
    /// Builds the table for a class chain, base first. Each class's
    /// declarations merge field-by-field into the accumulated descriptors.
    pub(crate) fn resolve(chain: &[&[(String, Prop)]]) -> PropertyTable {
        let mut declarations: IndexMap<String, Prop> = IndexMap::new();
        for class in chain {
            for (name, prop) in class.iter() {
                match declarations.get_mut(name) {
                    Some(existing) => existing.merge(prop),
                    None => {
                        declarations.insert(name.clone(), prop.clone());
                    }
                }
            }
        }
        PropertyTable {
            entries: declarations
                .into_iter()
                .map(|(name, prop)| (name, prop.into_property()))
                .collect(),
        }
    }

    /// The per-instance copy made at construction.
    pub(crate) fn clone_for_instance(&self) -> PropertyTable {
        PropertyTable {
            entries: self
                .entries
                .iter()
                .map(|(name, prop)| (name.clone(), prop.clone_for_instance()))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Property> {
        self.entries.get(name)
    }

    pub(crate) fn get_mut(&mut self, name: &str) -> Option<&mut Property> {
        self.entries.get_mut(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Property)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

//! Class registration.
//!
//! A component class is declared once with [`ClassDecl`] and registered on
//! the app's [`Registry`]. Registration resolves the full ancestor chain up
//! front: the merged property table, the merged listener table, the style
//! list, and the behavior factory are all computed here and cached on the
//! [`ResolvedClass`], so instance construction never walks the chain.

use crate::events::ListenerTable;
use crate::node::Behavior;
use crate::property::{is_reserved, Prop, PropertyTable};
use crate::value::TypeTag;
use indexmap::IndexMap;
use std::cell::RefCell;
use std::rc::Rc;

/// Constructs a fresh behavior for each instance of a class.
pub type BehaviorFactory = Rc<dyn Fn() -> Box<dyn Behavior>>;

#[derive(Debug, thiserror::Error)]
pub enum RegisterError {
    #[error("class {tag:?} is already registered")]
    DuplicateClass { tag: String },
    #[error("class {tag:?} extends unregistered base {base:?}")]
    UnknownBase { tag: String, base: String },
    #[error("class {tag:?} declares reserved property name {property:?}")]
    IllegalProperty { tag: String, property: String },
}

/// A component class declaration.
pub struct ClassDecl {
    tag: String,
    base: Option<String>,
    props: Vec<(String, Prop)>,
    listeners: Vec<(String, String)>,
    style: Option<String>,
    factory: Option<BehaviorFactory>,
    object: bool,
}

impl ClassDecl {
    pub fn new(tag: impl Into<String>) -> ClassDecl {
        ClassDecl {
            tag: tag.into(),
            base: None,
            props: Vec::new(),
            listeners: Vec::new(),
            style: None,
            factory: None,
            object: false,
        }
    }

    /// Extends an already-registered class.
    pub fn base(mut self, tag: impl Into<String>) -> ClassDecl {
        self.base = Some(tag.into());
        self
    }

    /// Declares a plain reactive object class: no element surface, and its
    /// flushes feed the app's mutation broadcast.
    pub fn object(mut self) -> ClassDecl {
        self.object = true;
        self
    }

    pub fn prop(mut self, name: impl Into<String>, prop: Prop) -> ClassDecl {
        self.props.push((name.into(), prop));
        self
    }

    /// Declares a static listener: `event` dispatches to the behavior
    /// method `method`.
    pub fn listen(mut self, event: impl Into<String>, method: impl Into<String>) -> ClassDecl {
        self.listeners.push((event.into(), method.into()));
        self
    }

    /// Component CSS. `:host` stands for the component's tag selector.
    pub fn style(mut self, css: impl Into<String>) -> ClassDecl {
        self.style = Some(css.into());
        self
    }

    pub fn behavior<F>(mut self, factory: F) -> ClassDecl
    where
        F: Fn() -> Box<dyn Behavior> + 'static,
    {
        self.factory = Some(Rc::new(factory));
        self
    }
}

/// A registered class with everything instance construction needs,
/// resolved once.
pub struct ResolvedClass {
    pub(crate) tag: String,
    /// Ancestor tags, base first, ending with this class's own tag.
    pub(crate) chain: Vec<String>,
    /// False for plain reactive object classes. Object-ness is inherited:
    /// a subclass of an object class is an object class.
    pub(crate) is_element: bool,
    pub(crate) properties: PropertyTable,
    pub(crate) listeners: ListenerTable,
    /// Properties whose declared type is object-like; these participate in
    /// the app's mutation broadcast.
    pub(crate) object_props: Vec<String>,
    /// Style sources in chain order, base first.
    pub(crate) styles: Vec<String>,
    pub(crate) factory: Option<BehaviorFactory>,
    /// Raw declarations, kept so subclasses can re-merge the chain.
    prop_decls: Vec<(String, Prop)>,
}

impl ResolvedClass {
    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn properties(&self) -> &PropertyTable {
        &self.properties
    }
}

#[derive(Default)]
pub struct Registry {
    classes: RefCell<IndexMap<String, Rc<ResolvedClass>>>,
}

impl Registry {
    pub fn register(&self, decl: ClassDecl) -> Result<(), RegisterError> {
        let classes = self.classes.borrow();
        if classes.contains_key(&decl.tag) {
            return Err(RegisterError::DuplicateClass { tag: decl.tag });
        }
        for (name, _) in &decl.props {
            if is_reserved(name) {
                return Err(RegisterError::IllegalProperty {
                    tag: decl.tag,
                    property: name.clone(),
                });
            }
        }

        let base = match &decl.base {
            Some(base_tag) => Some(classes.get(base_tag).cloned().ok_or_else(|| {
                RegisterError::UnknownBase {
                    tag: decl.tag.clone(),
                    base: base_tag.clone(),
                }
            })?),
            None => None,
        };
        drop(classes);

        let mut chain = base.as_ref().map(|b| b.chain.clone()).unwrap_or_default();
        chain.push(decl.tag.clone());

        // Re-merge the whole chain's raw declarations so derived classes
        // override descriptors field-by-field.
        let classes = self.classes.borrow();
        let mut decl_chain: Vec<&[(String, Prop)]> = Vec::new();
        for ancestor in &chain[..chain.len() - 1] {
            if let Some(class) = classes.get(ancestor) {
                decl_chain.push(&class.prop_decls);
            }
        }
        decl_chain.push(&decl.props);
        let properties = PropertyTable::resolve(&decl_chain);
        drop(classes);

        let mut listeners = base
            .as_ref()
            .map(|b| b.listeners.clone())
            .unwrap_or_default();
        listeners.merge(&decl.listeners);

        let object_props = properties
            .iter()
            .filter(|(_, p)| {
                p.declared_type
                    .as_ref()
                    .is_some_and(TypeTag::is_object_like)
            })
            .map(|(name, _)| name.to_string())
            .collect();

        let mut styles = base.as_ref().map(|b| b.styles.clone()).unwrap_or_default();
        if let Some(css) = &decl.style {
            styles.push(css.clone());
        }

        let factory = decl
            .factory
            .clone()
            .or_else(|| base.as_ref().and_then(|b| b.factory.clone()));

        let mut prop_decls = base
            .as_ref()
            .map(|b| b.prop_decls.clone())
            .unwrap_or_default();
        prop_decls.extend(decl.props.iter().cloned());

        let is_element = !decl.object && base.as_ref().map(|b| b.is_element).unwrap_or(true);

        let resolved = Rc::new(ResolvedClass {
            tag: decl.tag.clone(),
            chain,
            is_element,
            properties,
            listeners,
            object_props,
            styles,
            factory,
            prop_decls,
        });
        self.classes.borrow_mut().insert(decl.tag, resolved);
        Ok(())
    }

    pub fn get(&self, tag: &str) -> Option<Rc<ResolvedClass>> {
        self.classes.borrow().get(tag).cloned()
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.classes.borrow().contains_key(tag)
    }
}

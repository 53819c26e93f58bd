//! Reactive component runtime.
//!
//! # Conceptual overview
//! Perch is a small reactive UI-component core: typed inheritable
//! properties with change notification, cross-component value bindings, and
//! a declarative tree reconciler. Widget libraries are built on top of it;
//! the core itself knows nothing about buttons or sliders.
//!
//! ## Classes and nodes
//! A component class is declared once with a [`ClassDecl`] (properties,
//! static listeners, style, an optional [`Behavior`] factory, optionally a
//! base class) and registered on an [`App`]. Registration resolves the
//! whole inheritance chain into one cached descriptor table; construction
//! clones that table per instance. Instances are [`Node`]s: cheap-clone
//! handles created through [`App::create`], which falls back to a generic
//! plain element for unknown tags.
//!
//! ## Properties and flushes
//! Writing a property that actually changes its value (NaN counts as equal
//! to NaN) mutates the stored value, mirrors it to an attribute when the
//! descriptor says so, and enqueues a change. Changes coalesce per property
//! until the next flush, which runs every pending observer, one trailing
//! `changed()` render hook, and then dispatches one `{prop}-changed` event
//! per property. Nodes flush when connected; a detached subtree accumulates
//! changes silently until reconnection. Properties whose name starts with
//! an underscore are private and never notify.
//!
//! ## Bindings
//! [`Node::bind`] returns the [`Binding`] for one source property; targets
//! added to it receive the source value and mirror their own edits back.
//! The equality rule keeps relays from oscillating. A binding lives until
//! its owning node disposes.
//!
//! ## Rendering
//! A behavior's `changed()` typically calls [`Node::template`] with a tree
//! literal built by the [`node!`] and [`tree!`] macros. Reconciliation is
//! order-positional: tail surplus is trimmed and disposed, missing children
//! are appended in one batch, wrong-tag children are replaced outright, and
//! matching children are updated in place. Children with an `id` prop land
//! in the template root's `$` lookup, rebuilt every render.
//!
//! ## The host bridge
//! Everything above is single-threaded and synchronous. Platform input
//! arrives through a [`Host`]'s channel and is applied during
//! [`Host::poll`] via the ordinary `set`/dispatch re-entry points.

pub mod app;
pub mod binding;
pub mod events;
pub mod host;
mod node;
pub mod property;
pub mod registry;
mod render;
pub mod style;
pub mod value;
pub mod vdom;

pub use app::App;
pub use binding::Binding;
pub use events::{Event, EventDetail, EventHandler, Listener, PropertyChange};
pub use host::{Host, PlatformEvent};
pub use node::{Behavior, Node, NodeId};
pub use property::{Prop, Property, PropertyTable};
pub use registry::{ClassDecl, RegisterError, Registry, ResolvedClass};
pub use style::StyleSheets;
pub use value::{value_eq, TypeTag, Value};
pub use vdom::{Children, VNode};

//! Platform event bridge.
//!
//! The core is single-threaded and synchronous; the one asynchronous
//! boundary is platform input. A [`Host`] owns the app and the root node
//! and drains a channel of [`PlatformEvent`]s, applying each through the
//! ordinary re-entry points (`set` for user edits, bubbling dispatch for
//! everything else).

use crate::app::App;
use crate::events::EventDetail;
use crate::node::{Node, NodeId};
use crate::value::Value;
use crossbeam::channel::{self, Receiver, Sender, TryRecvError};

/// An input event from the platform layer, addressed by node id.
#[derive(Debug, Clone)]
pub enum PlatformEvent {
    /// A user edit of a property; dispatches `{prop}-set` on the node.
    Set {
        node: NodeId,
        property: String,
        value: Value,
    },
    /// Any other input event, dispatched with bubbling.
    Dispatch {
        node: NodeId,
        kind: String,
        detail: EventDetail,
    },
}

pub struct Host {
    app: App,
    root: Node,
    sender: Sender<PlatformEvent>,
    receiver: Receiver<PlatformEvent>,
}

impl Host {
    /// Creates a host for `root` and connects it.
    pub fn new(app: App, root: Node) -> Host {
        let (sender, receiver) = channel::unbounded();
        app.connect(&root);
        Host {
            app,
            root,
            sender,
            receiver,
        }
    }

    pub fn app(&self) -> &App {
        &self.app
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    /// A handle the platform layer uses to queue input events.
    pub fn sender(&self) -> Sender<PlatformEvent> {
        self.sender.clone()
    }

    /// Drains all pending platform events.
    pub fn poll(&mut self) {
        loop {
            let event = match self.receiver.try_recv() {
                Ok(event) => event,
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => panic!("platform event channel disconnected"),
            };
            self.apply(event);
        }
    }

    fn apply(&self, event: PlatformEvent) {
        match event {
            PlatformEvent::Set {
                node,
                property,
                value,
            } => match self.app.node_by_id(node) {
                Some(node) => node.set(&property, value),
                None => {
                    tracing::warn!(?node, property, "set for a stale node id, ignoring");
                }
            },
            PlatformEvent::Dispatch { node, kind, detail } => {
                match self.app.node_by_id(node) {
                    Some(node) => node.dispatch_event(&kind, detail, true),
                    None => {
                        tracing::warn!(?node, kind, "event for a stale node id, ignoring");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventHandler, Listener};
    use crate::property::Prop;
    use crate::registry::ClassDecl;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn poll_applies_user_edits_with_set_semantics() {
        let app = App::new();
        app.register(ClassDecl::new("x-field").prop("value", Prop::value("")))
            .unwrap();
        let root = app.create("x-field", &[]);
        let mut host = Host::new(app, root.clone());

        let set_events: Rc<Cell<usize>> = Rc::default();
        let sink = set_events.clone();
        root.add_listener(
            "value-set",
            Listener::Handler(EventHandler::new(move |_| sink.set(sink.get() + 1))),
        );

        host.sender()
            .send(PlatformEvent::Set {
                node: root.id(),
                property: "value".to_string(),
                value: Value::from("typed"),
            })
            .unwrap();
        host.poll();
        assert_eq!(root.get("value"), Value::from("typed"));
        assert_eq!(set_events.get(), 1);
    }

    #[test]
    fn events_for_stale_node_ids_are_dropped() {
        let app = App::new();
        let root = app.create("div", &[]);
        let stray = app.create("div", &[]);
        let mut host = Host::new(app, root);

        // `stray` was never connected, so the index does not know it.
        host.sender()
            .send(PlatformEvent::Dispatch {
                node: stray.id(),
                kind: "click".to_string(),
                detail: EventDetail::Empty,
            })
            .unwrap();
        host.poll();
    }

    #[test]
    fn dispatched_events_bubble_to_the_root() {
        let app = App::new();
        let root = app.create("div", &[]);
        let mut host = Host::new(app, root.clone());
        root.template(crate::tree![crate::node!("button", "go")]);
        let button = root.child(0).unwrap();

        let clicks: Rc<Cell<usize>> = Rc::default();
        let sink = clicks.clone();
        root.add_listener(
            "click",
            Listener::Handler(EventHandler::new(move |_| sink.set(sink.get() + 1))),
        );

        host.sender()
            .send(PlatformEvent::Dispatch {
                node: button.id(),
                kind: "click".to_string(),
                detail: EventDetail::Empty,
            })
            .unwrap();
        host.poll();
        assert_eq!(clicks.get(), 1);
    }
}

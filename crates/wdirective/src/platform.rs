//! Traits that a DOM host implements for the directive runtime.
//!
//! The runtime never touches a concrete DOM. It asks a [`Platform`] to
//! enumerate attributes, walk subtrees, install mutation observers and
//! dispatch events. The browser implementation lives in [`crate::web`], an
//! in-memory one in [`crate::memory`].
use std::{any::Any, rc::Rc};

use crate::{Binding, Error};

/// Read access to an element, as the runtime needs it.
///
/// Equality must be element identity.
pub trait DomElement: Clone + PartialEq + std::fmt::Debug + 'static {
    /// Attribute names in host enumeration order.
    fn attribute_names(&self) -> Vec<String>;

    /// The value of the named attribute, if present.
    fn attribute(&self, name: &str) -> Option<String>;

    /// Every descendant element in document order, not including `self`.
    fn descendants(&self) -> Vec<Self>;

    /// Descendant elements that carry an attribute named exactly `name`,
    /// in document order.
    fn select_with_attribute(&self, name: &str) -> Vec<Self>;

    /// The value kept on the element under `key`.
    fn data(&self, key: &str) -> Option<Rc<dyn Any>>;

    /// Keep `value` on the element under `key`, or drop the entry when it
    /// is `None`. Returns whether there was an entry before.
    ///
    /// Entries must not outlive the element.
    fn set_data(&self, key: &str, value: Option<Rc<dyn Any>>) -> bool;
}

/// What a mutation observer should report.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ObserveOptions {
    pub attributes: bool,
    pub attribute_old_value: bool,
    pub child_list: bool,
    pub subtree: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MutationKind {
    Attributes,
    ChildList,
}

/// One observed change.
///
/// Only elements appear in `added_nodes` and `removed_nodes`.
#[derive(Clone, Debug)]
pub struct MutationRecord<E> {
    pub kind: MutationKind,
    pub target: E,
    pub added_nodes: Vec<E>,
    pub removed_nodes: Vec<E>,
    pub attribute_name: Option<String>,
    pub old_value: Option<String>,
}

impl<E> MutationRecord<E> {
    pub fn attributes(target: E, name: impl Into<String>, old_value: Option<String>) -> Self {
        MutationRecord {
            kind: MutationKind::Attributes,
            target,
            added_nodes: vec![],
            removed_nodes: vec![],
            attribute_name: Some(name.into()),
            old_value,
        }
    }

    pub fn child_list(target: E, added_nodes: Vec<E>, removed_nodes: Vec<E>) -> Self {
        MutationRecord {
            kind: MutationKind::ChildList,
            target,
            added_nodes,
            removed_nodes,
            attribute_name: None,
            old_value: None,
        }
    }
}

/// Receives batches of mutation records.
pub type ObserverCallback<E> = Box<dyn FnMut(Vec<MutationRecord<E>>)>;

/// Options for [`Platform::add_listener`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ListenerOptions {
    pub once: bool,
    pub capture: bool,
    pub passive: bool,
}

impl ListenerOptions {
    pub fn once() -> Self {
        ListenerOptions {
            once: true,
            ..Default::default()
        }
    }
}

/// An installed mutation observer.
pub trait ObserverHandle: 'static {
    /// Stop observing and discard any undelivered records.
    fn disconnect(&self);
}

/// A registered event listener.
pub trait ListenerHandle: 'static {
    fn remove(self);
}

/// A DOM host.
pub trait Platform: Sized + 'static {
    type Element: DomElement;
    type Event: 'static;
    type Observer: ObserverHandle;
    type Listener: ListenerHandle;

    /// Start delivering mutation batches for `target` to `callback`.
    fn observe(
        target: &Self::Element,
        options: ObserveOptions,
        callback: ObserverCallback<Self::Element>,
    ) -> Result<Self::Observer, Error>;

    /// Dispatch a lifecycle event from `element` carrying `binding`.
    fn dispatch(element: &Self::Element, event_name: &str, binding: &Binding<Self>)
    -> Result<(), Error>;

    fn add_listener(
        element: &Self::Element,
        event_name: &str,
        options: ListenerOptions,
        handler: Rc<dyn Fn(&Self::Event)>,
    ) -> Result<Self::Listener, Error>;

    /// The target used when `listen` is called without one, ie the document body.
    fn default_target() -> Option<Self::Element>;
}

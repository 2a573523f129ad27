//! An in-memory DOM.
//!
//! Enough of the DOM to drive [`Directives`](crate::Directives) without a
//! browser: elements with ordered attributes and children, event listeners and
//! mutation observers that queue records the way the browser does. Queued
//! records are delivered by [`Document::flush`] (or awaiting
//! [`Document::next_tick`]), which stands in for the browser's microtask.
use std::{any::Any, cell::Cell, cell::RefCell, rc::Rc};

use crate::{
    Binding, Error,
    platform::{
        DomElement, ListenerHandle, ListenerOptions, MutationKind, MutationRecord,
        ObserveOptions, ObserverCallback, ObserverHandle, Platform,
    },
    sync::{Shared, WeakShared},
};

thread_local! {
    static CURRENT: RefCell<WeakShared<DocumentInner>> = RefCell::new(WeakShared::default());
    static NEXT_ID: Cell<usize> = const { Cell::new(0) };
}

fn next_id() -> usize {
    NEXT_ID.with(|id| {
        let next = id.get() + 1;
        id.set(next);
        next
    })
}

struct ObserverEntry {
    id: usize,
    target: Element,
    options: ObserveOptions,
    records: Vec<MutationRecord<Element>>,
    callback: Rc<RefCell<ObserverCallback<Element>>>,
}

struct DocumentInner {
    body: Element,
    /// In creation order.
    observers: Vec<ObserverEntry>,
    flushing: bool,
}

/// An in-memory document.
#[derive(Clone)]
pub struct Document {
    inner: Shared<DocumentInner>,
}

struct Flushing(Shared<DocumentInner>);

impl Drop for Flushing {
    fn drop(&mut self) {
        self.0.get_mut().flushing = false;
    }
}

impl Document {
    /// Create a document with an empty `<body>` and make it this thread's
    /// current document.
    pub fn new() -> Self {
        let body = Element::detached("body", WeakShared::default());
        let inner = Shared::new(DocumentInner {
            body: body.clone(),
            observers: vec![],
            flushing: false,
        });
        body.inner.get_mut().document = inner.downgrade();
        CURRENT.with(|current| *current.borrow_mut() = inner.downgrade());
        Document { inner }
    }

    /// The most recently created document on this thread, if still alive.
    pub fn current() -> Option<Self> {
        CURRENT.with(|current| current.borrow().upgrade().map(|inner| Document { inner }))
    }

    pub fn body(&self) -> Element {
        self.inner.get().body.clone()
    }

    pub fn create_element(&self, name: impl Into<String>) -> Element {
        Element::detached(name, self.inner.downgrade())
    }

    /// Number of connected observers.
    pub fn observer_count(&self) -> usize {
        self.inner.get().observers.len()
    }

    /// Whether any observer has undelivered records.
    pub fn has_pending_records(&self) -> bool {
        self.inner
            .get()
            .observers
            .iter()
            .any(|entry| !entry.records.is_empty())
    }

    /// Deliver queued records until none are left.
    ///
    /// Each observer with pending records receives them as one batch, in
    /// observer creation order. Callbacks that mutate the document queue more
    /// records, which are delivered in a following round. Calling this from
    /// inside an observer callback does nothing.
    pub fn flush(&self) {
        {
            let mut inner = self.inner.get_mut();
            if inner.flushing {
                return;
            }
            inner.flushing = true;
        }
        let _flushing = Flushing(self.inner.clone());

        loop {
            let pending: Vec<usize> = self
                .inner
                .get()
                .observers
                .iter()
                .filter(|entry| !entry.records.is_empty())
                .map(|entry| entry.id)
                .collect();
            if pending.is_empty() {
                break;
            }
            for id in pending {
                let batch = {
                    let mut inner = self.inner.get_mut();
                    inner
                        .observers
                        .iter_mut()
                        .find(|entry| entry.id == id)
                        .map(|entry| (std::mem::take(&mut entry.records), entry.callback.clone()))
                };
                // Disconnected by an earlier callback in this round.
                let Some((records, callback)) = batch else {
                    continue;
                };
                if records.is_empty() {
                    continue;
                }
                log::trace!("delivering {} records to observer {id}", records.len());
                let mut callback = callback.borrow_mut();
                (*callback)(records);
            }
        }
    }

    /// Deliver queued records, as the browser does at the end of a microtask.
    pub async fn next_tick(&self) {
        self.flush();
    }

    fn queue(&self, record: MutationRecord<Element>) {
        let mut inner = self.inner.get_mut();
        for entry in inner.observers.iter_mut() {
            let wanted = match record.kind {
                MutationKind::Attributes => entry.options.attributes,
                MutationKind::ChildList => entry.options.child_list,
            };
            if !wanted {
                continue;
            }
            let in_scope = entry.target == record.target
                || (entry.options.subtree && entry.target.contains(&record.target));
            if !in_scope {
                continue;
            }
            let mut record = record.clone();
            if !entry.options.attribute_old_value {
                record.old_value = None;
            }
            entry.records.push(record);
        }
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

/// A child of an element.
#[derive(Clone, Debug, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
}

struct ListenerEntry {
    id: usize,
    event_name: String,
    once: bool,
    handler: Rc<dyn Fn(&Event)>,
}

struct ElementInner {
    name: String,
    document: WeakShared<DocumentInner>,
    parent: WeakShared<ElementInner>,
    attributes: Vec<(String, String)>,
    children: Vec<Node>,
    listeners: Vec<ListenerEntry>,
    data: Vec<(String, Rc<dyn Any>)>,
}

/// An element handle. Clones refer to the same element.
#[derive(Clone)]
pub struct Element {
    inner: Shared<ElementInner>,
}

impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        self.inner.ptr_eq(&other.inner)
    }
}

impl std::fmt::Debug for Element {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.get();
        write!(f, "<{}", inner.name)?;
        for (name, value) in inner.attributes.iter() {
            write!(f, " {name}=\"{value}\"")?;
        }
        f.write_str(">")
    }
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn tag_is_voidable(tag: &str) -> bool {
    matches!(
        tag,
        "area" | "base" | "br" | "col" | "hr" | "img" | "input" | "link" | "meta" | "param"
            | "source"
    )
}

impl Element {
    fn detached(name: impl Into<String>, document: WeakShared<DocumentInner>) -> Self {
        Element {
            inner: Shared::new(ElementInner {
                name: name.into(),
                document,
                parent: WeakShared::default(),
                attributes: vec![],
                children: vec![],
                listeners: vec![],
                data: vec![],
            }),
        }
    }

    pub fn name(&self) -> String {
        self.inner.get().name.clone()
    }

    pub fn document(&self) -> Option<Document> {
        self.inner.get().document.upgrade().map(|inner| Document { inner })
    }

    fn queue(&self, record: MutationRecord<Element>) {
        if let Some(document) = self.document() {
            document.queue(record);
        }
    }

    pub fn attribute(&self, name: &str) -> Option<String> {
        self.inner
            .get()
            .attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.clone())
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }

    pub fn attribute_names(&self) -> Vec<String> {
        self.inner
            .get()
            .attributes
            .iter()
            .map(|(k, _)| k.clone())
            .collect()
    }

    pub fn set_attribute(&self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        let old_value = {
            let mut inner = self.inner.get_mut();
            let index = inner.attributes.iter().position(|(k, _)| *k == name);
            match index {
                Some(index) => Some(std::mem::replace(&mut inner.attributes[index].1, value)),
                None => {
                    inner.attributes.push((name.clone(), value));
                    None
                }
            }
        };
        self.queue(MutationRecord::attributes(self.clone(), name, old_value));
    }

    /// Returns whether the attribute was present.
    pub fn remove_attribute(&self, name: &str) -> bool {
        let old_value = {
            let mut inner = self.inner.get_mut();
            let index = inner.attributes.iter().position(|(k, _)| k == name);
            index.map(|index| inner.attributes.remove(index).1)
        };
        let removed = old_value.is_some();
        if removed {
            self.queue(MutationRecord::attributes(self.clone(), name, old_value));
        }
        removed
    }

    pub fn parent(&self) -> Option<Element> {
        self.inner.get().parent.upgrade().map(|inner| Element { inner })
    }

    /// Element children, in order.
    pub fn children(&self) -> Vec<Element> {
        self.inner
            .get()
            .children
            .iter()
            .filter_map(|node| match node {
                Node::Element(element) => Some(element.clone()),
                Node::Text(_) => None,
            })
            .collect()
    }

    pub fn child_nodes(&self) -> Vec<Node> {
        self.inner.get().children.clone()
    }

    /// Whether `other` is this element or one of its descendants.
    pub fn contains(&self, other: &Element) -> bool {
        let mut node = Some(other.clone());
        while let Some(current) = node {
            if &current == self {
                return true;
            }
            node = current.parent();
        }
        false
    }

    /// Every descendant element in document order.
    pub fn descendants(&self) -> Vec<Element> {
        let mut found = vec![];
        for child in self.children() {
            found.push(child.clone());
            found.extend(child.descendants());
        }
        found
    }

    /// Append `child`, first removing it from its current parent.
    ///
    /// Appending an element into itself or its own subtree is ignored.
    pub fn append_child(&self, child: &Element) {
        if child.contains(self) {
            log::warn!("cannot append {child:?} into its own subtree");
            return;
        }
        if let Some(parent) = child.parent() {
            parent.remove_child(child);
        }
        child.inner.get_mut().parent = self.inner.downgrade();
        self.inner
            .get_mut()
            .children
            .push(Node::Element(child.clone()));
        self.queue(MutationRecord::child_list(
            self.clone(),
            vec![child.clone()],
            vec![],
        ));
    }

    pub fn append_text(&self, text: impl Into<String>) {
        self.inner.get_mut().children.push(Node::Text(text.into()));
        self.queue(MutationRecord::child_list(self.clone(), vec![], vec![]));
    }

    /// Returns whether `child` was a child of this element.
    pub fn remove_child(&self, child: &Element) -> bool {
        let removed = {
            let mut inner = self.inner.get_mut();
            let index = inner
                .children
                .iter()
                .position(|node| matches!(node, Node::Element(el) if el == child));
            index.map(|index| inner.children.remove(index)).is_some()
        };
        if removed {
            child.inner.get_mut().parent = WeakShared::default();
            self.queue(MutationRecord::child_list(
                self.clone(),
                vec![],
                vec![child.clone()],
            ));
        }
        removed
    }

    /// Detach this element from its parent.
    pub fn remove(&self) {
        if let Some(parent) = self.parent() {
            parent.remove_child(self);
        }
    }

    pub fn with_attribute(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attribute(name, value);
        self
    }

    pub fn with_child(self, child: &Element) -> Self {
        self.append_child(child);
        self
    }

    pub fn with_text(self, text: impl Into<String>) -> Self {
        self.append_text(text);
        self
    }

    /// Concatenated text of this element and its descendants.
    pub fn text(&self) -> String {
        self.child_nodes()
            .into_iter()
            .map(|node| match node {
                Node::Element(element) => element.text(),
                Node::Text(text) => text,
            })
            .collect()
    }

    /// Replace the children with a single text node.
    pub fn set_text(&self, text: impl Into<String>) {
        let removed = {
            let mut inner = self.inner.get_mut();
            std::mem::replace(&mut inner.children, vec![Node::Text(text.into())])
        };
        let removed: Vec<Element> = removed
            .into_iter()
            .filter_map(|node| match node {
                Node::Element(element) => Some(element),
                Node::Text(_) => None,
            })
            .collect();
        for element in removed.iter() {
            element.inner.get_mut().parent = WeakShared::default();
        }
        self.queue(MutationRecord::child_list(self.clone(), vec![], removed));
    }

    pub fn html_string(&self) -> String {
        let (name, attributes, children) = {
            let inner = self.inner.get();
            (
                inner.name.clone(),
                inner.attributes.clone(),
                inner.children.clone(),
            )
        };
        let mut html = format!("<{name}");
        for (key, value) in attributes.iter() {
            if value.is_empty() {
                html.push_str(&format!(" {key}"));
            } else {
                html.push_str(&format!(r#" {key}="{}""#, escape(value)));
            }
        }
        if children.is_empty() && tag_is_voidable(&name) {
            html.push_str(" />");
            return html;
        }
        html.push('>');
        for child in children.iter() {
            match child {
                Node::Element(element) => html.push_str(&element.html_string()),
                Node::Text(text) => html.push_str(&escape(text)),
            }
        }
        html.push_str(&format!("</{name}>"));
        html
    }

    pub fn add_event_listener(
        &self,
        event_name: impl Into<String>,
        options: ListenerOptions,
        handler: impl Fn(&Event) + 'static,
    ) -> MemoryListener {
        let id = next_id();
        self.inner.get_mut().listeners.push(ListenerEntry {
            id,
            event_name: event_name.into(),
            once: options.once,
            handler: Rc::new(handler),
        });
        MemoryListener {
            element: self.inner.downgrade(),
            id,
        }
    }

    pub fn listener_count(&self, event_name: &str) -> usize {
        self.inner
            .get()
            .listeners
            .iter()
            .filter(|entry| entry.event_name == event_name)
            .count()
    }

    /// Dispatch a plain event from this element.
    pub fn dispatch_event(&self, event_name: impl Into<String>) {
        self.dispatch(Event {
            name: event_name.into(),
            target: self.clone(),
            binding: None,
        });
    }

    fn dispatch(&self, event: Event) {
        let handlers: Vec<Rc<dyn Fn(&Event)>> = {
            let mut inner = self.inner.get_mut();
            let handlers = inner
                .listeners
                .iter()
                .filter(|entry| entry.event_name == event.name)
                .map(|entry| entry.handler.clone())
                .collect();
            inner
                .listeners
                .retain(|entry| !(entry.once && entry.event_name == event.name));
            handlers
        };
        for handler in handlers {
            handler(&event);
        }
    }
}

impl DomElement for Element {
    fn attribute_names(&self) -> Vec<String> {
        Element::attribute_names(self)
    }

    fn attribute(&self, name: &str) -> Option<String> {
        Element::attribute(self, name)
    }

    fn descendants(&self) -> Vec<Self> {
        Element::descendants(self)
    }

    fn select_with_attribute(&self, name: &str) -> Vec<Self> {
        Element::descendants(self)
            .into_iter()
            .filter(|element| element.has_attribute(name))
            .collect()
    }

    fn data(&self, key: &str) -> Option<Rc<dyn Any>> {
        self.inner
            .get()
            .data
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, value)| value.clone())
    }

    fn set_data(&self, key: &str, value: Option<Rc<dyn Any>>) -> bool {
        // The old value is dropped after the element is released.
        let previous = {
            let mut inner = self.inner.get_mut();
            let index = inner.data.iter().position(|(k, _)| k == key);
            match (index, value) {
                (Some(index), Some(value)) => {
                    Some(std::mem::replace(&mut inner.data[index].1, value))
                }
                (Some(index), None) => Some(inner.data.remove(index).1),
                (None, Some(value)) => {
                    inner.data.push((key.to_owned(), value));
                    None
                }
                (None, None) => None,
            }
        };
        previous.is_some()
    }
}

/// An event delivered to in-memory listeners.
#[derive(Clone, Debug)]
pub struct Event {
    pub name: String,
    pub target: Element,
    /// Set on lifecycle events.
    pub binding: Option<Binding<Memory>>,
}

pub struct MemoryObserver {
    document: WeakShared<DocumentInner>,
    id: usize,
}

impl ObserverHandle for MemoryObserver {
    fn disconnect(&self) {
        if let Some(document) = self.document.upgrade() {
            document
                .get_mut()
                .observers
                .retain(|entry| entry.id != self.id);
        }
    }
}

impl Drop for MemoryObserver {
    fn drop(&mut self) {
        self.disconnect();
    }
}

pub struct MemoryListener {
    element: WeakShared<ElementInner>,
    id: usize,
}

impl ListenerHandle for MemoryListener {
    fn remove(self) {
        if let Some(element) = self.element.upgrade() {
            element
                .get_mut()
                .listeners
                .retain(|entry| entry.id != self.id);
        }
    }
}

/// The in-memory platform.
#[derive(Clone, Copy, Debug)]
pub struct Memory;

impl Platform for Memory {
    type Element = Element;
    type Event = Event;
    type Observer = MemoryObserver;
    type Listener = MemoryListener;

    fn observe(
        target: &Element,
        options: ObserveOptions,
        callback: ObserverCallback<Element>,
    ) -> Result<MemoryObserver, Error> {
        let document = target
            .inner
            .get()
            .document
            .upgrade()
            .ok_or_else(|| Error::Platform(format!("{target:?} has no live document")))?;
        let id = next_id();
        document.get_mut().observers.push(ObserverEntry {
            id,
            target: target.clone(),
            options,
            records: vec![],
            callback: Rc::new(RefCell::new(callback)),
        });
        Ok(MemoryObserver {
            document: document.downgrade(),
            id,
        })
    }

    fn dispatch(element: &Element, event_name: &str, binding: &Binding<Self>) -> Result<(), Error> {
        element.dispatch(Event {
            name: event_name.to_owned(),
            target: element.clone(),
            binding: Some(binding.clone()),
        });
        Ok(())
    }

    fn add_listener(
        element: &Element,
        event_name: &str,
        options: ListenerOptions,
        handler: Rc<dyn Fn(&Event)>,
    ) -> Result<MemoryListener, Error> {
        Ok(element.add_event_listener(event_name, options, move |event| handler(event)))
    }

    fn default_target() -> Option<Element> {
        Document::current().map(|document| document.body())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn record_log(doc: &Document, target: &Element, options: ObserveOptions) -> (MemoryObserver, Shared<Vec<MutationRecord<Element>>>) {
        let log = Shared::<Vec<MutationRecord<Element>>>::default();
        let observer = Memory::observe(
            target,
            options,
            Box::new({
                let log = log.clone();
                move |records| log.get_mut().extend(records)
            }),
        )
        .unwrap();
        assert!(doc.observer_count() > 0);
        (observer, log)
    }

    #[test]
    fn attribute_records_carry_old_values() {
        let doc = Document::new();
        let div = doc.create_element("div");
        doc.body().append_child(&div);
        let (_observer, log) = record_log(
            &doc,
            &doc.body(),
            ObserveOptions {
                attributes: true,
                attribute_old_value: true,
                subtree: true,
                ..Default::default()
            },
        );

        div.set_attribute("w-foo", "1");
        div.set_attribute("w-foo", "2");
        assert!(div.remove_attribute("w-foo"));
        assert!(!div.remove_attribute("w-foo"));
        assert!(log.get().is_empty());

        doc.flush();
        let log = log.get();
        let old_values: Vec<_> = log.iter().map(|r| r.old_value.clone()).collect();
        assert_eq!(old_values, vec![None, Some("1".into()), Some("2".into())]);
        assert!(log.iter().all(|r| r.target == div));
    }

    #[test]
    fn subtree_is_only_seen_when_asked_for() {
        let doc = Document::new();
        let outer = doc.create_element("div");
        let inner = doc.create_element("span");
        outer.append_child(&inner);
        doc.body().append_child(&outer);
        let (_observer, log) = record_log(
            &doc,
            &outer,
            ObserveOptions {
                attributes: true,
                ..Default::default()
            },
        );
        inner.set_attribute("a", "b");
        outer.set_attribute("a", "b");
        doc.flush();
        assert_eq!(log.get().len(), 1);
        assert_eq!(log.get()[0].target, outer);
        assert_eq!(log.get()[0].old_value, None);
    }

    #[test]
    fn moving_an_element_is_a_removal_then_an_insertion() {
        let doc = Document::new();
        let a = doc.create_element("div");
        let b = doc.create_element("div");
        let child = doc.create_element("p");
        doc.body().append_child(&a);
        doc.body().append_child(&b);
        a.append_child(&child);
        doc.flush();

        let (_observer, log) = record_log(
            &doc,
            &doc.body(),
            ObserveOptions {
                child_list: true,
                subtree: true,
                ..Default::default()
            },
        );
        b.append_child(&child);
        doc.flush();

        let log = log.get();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].target, a);
        assert_eq!(log[0].removed_nodes, vec![child.clone()]);
        assert_eq!(log[1].target, b);
        assert_eq!(log[1].added_nodes, vec![child.clone()]);
        assert_eq!(child.parent(), Some(b.clone()));
        assert!(a.children().is_empty());
    }

    #[test]
    fn disconnect_discards_queued_records() {
        let doc = Document::new();
        let (observer, log) = record_log(
            &doc,
            &doc.body(),
            ObserveOptions {
                attributes: true,
                ..Default::default()
            },
        );
        doc.body().set_attribute("x", "1");
        assert!(doc.has_pending_records());
        observer.disconnect();
        assert_eq!(doc.observer_count(), 0);
        doc.flush();
        assert!(log.get().is_empty());
    }

    #[test]
    fn flush_delivers_records_queued_by_callbacks() {
        let doc = Document::new();
        let body = doc.body();
        let calls = Shared::new(0usize);
        let _observer = Memory::observe(
            &body,
            ObserveOptions {
                attributes: true,
                ..Default::default()
            },
            Box::new({
                let body = body.clone();
                let calls = calls.clone();
                let doc = doc.clone();
                move |_records| {
                    // nested flush is a no-op
                    doc.flush();
                    let n = {
                        let mut calls = calls.get_mut();
                        *calls += 1;
                        *calls
                    };
                    if n < 3 {
                        body.set_attribute("n", n.to_string());
                    }
                }
            }),
        )
        .unwrap();
        body.set_attribute("n", "0");
        doc.flush();
        assert_eq!(*calls.get(), 3);
        assert!(!doc.has_pending_records());
    }

    #[test]
    fn once_listeners_fire_once() {
        let doc = Document::new();
        let el = doc.create_element("button");
        let count = Shared::new(0u32);
        let _always = el.add_event_listener("click", ListenerOptions::default(), {
            let count = count.clone();
            move |_| *count.get_mut() += 1
        });
        let _once = el.add_event_listener("click", ListenerOptions::once(), {
            let count = count.clone();
            move |_| *count.get_mut() += 10
        });
        el.dispatch_event("click");
        el.dispatch_event("click");
        assert_eq!(*count.get(), 12);
        assert_eq!(el.listener_count("click"), 1);
    }

    #[test]
    fn html_string_serializes_the_tree() {
        let doc = Document::new();
        let div = doc
            .create_element("div")
            .with_attribute("w-copy", "a \"b\"")
            .with_attribute("hidden", "")
            .with_child(&doc.create_element("br"))
            .with_text("1 < 2");
        assert_eq!(
            div.html_string(),
            r#"<div w-copy="a &quot;b&quot;" hidden><br />1 &lt; 2</div>"#
        );
        assert_eq!(div.text(), "1 < 2");
    }

    #[test]
    fn elements_cannot_contain_themselves() {
        let doc = Document::new();
        let outer = doc.create_element("div");
        let inner = doc.create_element("div");
        outer.append_child(&inner);
        inner.append_child(&outer);
        assert!(outer.parent().is_none());
        assert_eq!(outer.descendants(), vec![inner]);
    }
}

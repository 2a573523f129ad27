//! The browser platform (through web-sys).
use std::{any::Any, cell::RefCell, rc::Rc};

use wasm_bindgen::{JsCast, JsValue, UnwrapThrowExt, prelude::Closure};

use crate::{
    Binding, Error,
    platform::{
        DomElement, ListenerOptions, MutationKind, MutationRecord, ObserveOptions,
        ObserverCallback, ObserverHandle, Platform,
    },
};

pub mod event;

pub mod prelude {
    pub use super::{Web, body, document, event::*, next_tick, window};
    pub use crate::prelude::*;
}

fn node_list_elements(list: &web_sys::NodeList) -> Vec<web_sys::Element> {
    (0..list.length())
        .filter_map(|i| list.item(i))
        .filter_map(|node| node.dyn_into::<web_sys::Element>().ok())
        .collect()
}

/// Escape an attribute name for use in a CSS selector.
fn css_escape(name: &str) -> String {
    let mut escaped = String::with_capacity(name.len());
    for c in name.chars() {
        if !(c.is_ascii_alphanumeric() || c == '-' || c == '_' || !c.is_ascii()) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

thread_local! {
    static DATA_MAILBOX: RefCell<Option<Rc<dyn Any>>> = const { RefCell::new(None) };
}

fn data_key(key: &str) -> JsValue {
    JsValue::from_str(&format!("__wdirective:{key}"))
}

/// Wrap `value` in a JS function that hands it back through
/// [`DATA_MAILBOX`] when called.
///
/// The function is owned by the JS side, so the value is collected along
/// with the element that holds it.
fn data_function(value: Rc<dyn Any>) -> JsValue {
    Closure::wrap(Box::new(move || {
        DATA_MAILBOX.with(|mailbox| *mailbox.borrow_mut() = Some(value.clone()));
    }) as Box<dyn Fn()>)
    .into_js_value()
}

impl DomElement for web_sys::Element {
    fn attribute_names(&self) -> Vec<String> {
        self.get_attribute_names()
            .iter()
            .filter_map(|name| name.as_string())
            .collect()
    }

    fn attribute(&self, name: &str) -> Option<String> {
        self.get_attribute(name)
    }

    fn descendants(&self) -> Vec<Self> {
        match self.query_selector_all("*") {
            Ok(list) => node_list_elements(&list),
            Err(e) => {
                log::warn!("could not list descendants of {self:?}: {e:?}");
                vec![]
            }
        }
    }

    fn select_with_attribute(&self, name: &str) -> Vec<Self> {
        match self.query_selector_all(&format!("[{}]", css_escape(name))) {
            Ok(list) => node_list_elements(&list),
            Err(e) => {
                log::warn!("could not select [{name}] in {self:?}: {e:?}");
                vec![]
            }
        }
    }

    fn data(&self, key: &str) -> Option<Rc<dyn Any>> {
        let stored = js_sys::Reflect::get(self, &data_key(key)).ok()?;
        let function = stored.dyn_into::<js_sys::Function>().ok()?;
        if let Err(e) = function.call0(&JsValue::NULL) {
            log::warn!("could not read '{key}' data of {self:?}: {e:?}");
            return None;
        }
        DATA_MAILBOX.with(|mailbox| mailbox.borrow_mut().take())
    }

    fn set_data(&self, key: &str, value: Option<Rc<dyn Any>>) -> bool {
        let key_value = data_key(key);
        let existed = js_sys::Reflect::has(self, &key_value).unwrap_or(false);
        let result = match value {
            Some(value) => js_sys::Reflect::set(self, &key_value, &data_function(value)),
            None => js_sys::Reflect::delete_property(self, &key_value),
        };
        if let Err(e) = result {
            log::warn!("could not store '{key}' data on {self:?}: {e:?}");
        }
        existed
    }
}

fn mutation_record(record: web_sys::MutationRecord) -> Option<MutationRecord<web_sys::Element>> {
    let target = record.target()?.dyn_into::<web_sys::Element>().ok()?;
    Some(match record.type_().as_str() {
        "attributes" => MutationRecord {
            kind: MutationKind::Attributes,
            target,
            added_nodes: vec![],
            removed_nodes: vec![],
            attribute_name: record.attribute_name(),
            old_value: record.old_value(),
        },
        "childList" => MutationRecord::child_list(
            target,
            node_list_elements(&record.added_nodes()),
            node_list_elements(&record.removed_nodes()),
        ),
        _ => return None,
    })
}

/// A connected `MutationObserver`.
///
/// Disconnects when dropped.
pub struct WebObserver {
    observer: web_sys::MutationObserver,
    _callback: Closure<dyn FnMut(js_sys::Array, web_sys::MutationObserver)>,
}

impl ObserverHandle for WebObserver {
    fn disconnect(&self) {
        self.observer.disconnect();
    }
}

impl Drop for WebObserver {
    fn drop(&mut self) {
        self.observer.disconnect();
    }
}

fn event_detail(element: &web_sys::Element, binding: &Binding<Web>) -> Result<JsValue, Error> {
    fn optional(value: &Option<String>) -> JsValue {
        value.as_deref().map(JsValue::from_str).unwrap_or(JsValue::NULL)
    }

    let detail = js_sys::Object::new();
    let modifiers: js_sys::Array = binding.modifiers.iter().map(JsValue::from_str).collect();
    let fields: [(&str, JsValue); 8] = [
        ("element", JsValue::from(element.clone())),
        ("directive", JsValue::from_str(&binding.directive)),
        ("name", JsValue::from_str(&binding.name)),
        ("task", JsValue::from_str(binding.task.as_str())),
        ("value", optional(&binding.value)),
        ("oldValue", optional(&binding.old_value)),
        ("argument", optional(&binding.argument)),
        ("modifiers", modifiers.into()),
    ];
    for (key, value) in fields {
        js_sys::Reflect::set(&detail, &JsValue::from_str(key), &value)?;
    }
    Ok(detail.into())
}

/// The browser platform.
#[derive(Clone, Copy, Debug)]
pub struct Web;

impl Platform for Web {
    type Element = web_sys::Element;
    type Event = web_sys::Event;
    type Observer = WebObserver;
    type Listener = event::Listener;

    fn observe(
        target: &web_sys::Element,
        options: ObserveOptions,
        mut callback: ObserverCallback<web_sys::Element>,
    ) -> Result<WebObserver, Error> {
        let closure = Closure::wrap(Box::new(
            move |records: js_sys::Array, _observer: web_sys::MutationObserver| {
                let records = records
                    .iter()
                    .filter_map(|record| record.dyn_into::<web_sys::MutationRecord>().ok())
                    .filter_map(mutation_record)
                    .collect::<Vec<_>>();
                callback(records);
            },
        )
            as Box<dyn FnMut(js_sys::Array, web_sys::MutationObserver)>);
        let observer = web_sys::MutationObserver::new(closure.as_ref().unchecked_ref())?;

        let init = web_sys::MutationObserverInit::new();
        init.set_attributes(options.attributes);
        init.set_attribute_old_value(options.attribute_old_value);
        init.set_child_list(options.child_list);
        init.set_subtree(options.subtree);
        observer.observe_with_options(target, &init)?;

        Ok(WebObserver {
            observer,
            _callback: closure,
        })
    }

    fn dispatch(
        element: &web_sys::Element,
        event_name: &str,
        binding: &Binding<Self>,
    ) -> Result<(), Error> {
        let init = web_sys::CustomEventInit::new();
        init.set_detail(&event_detail(element, binding)?);
        let event = web_sys::CustomEvent::new_with_event_init_dict(event_name, &init)?;
        element.dispatch_event(&event)?;
        Ok(())
    }

    fn add_listener(
        element: &web_sys::Element,
        event_name: &str,
        options: ListenerOptions,
        handler: std::rc::Rc<dyn Fn(&web_sys::Event)>,
    ) -> Result<event::Listener, Error> {
        event::Listener::new(element, event_name, options, handler)
    }

    fn default_target() -> Option<web_sys::Element> {
        web_sys::window()?
            .document()?
            .body()
            .map(web_sys::Element::from)
    }
}

thread_local! {
    pub static WINDOW: web_sys::Window = web_sys::window().unwrap_throw();
    pub static DOCUMENT: web_sys::Document = WINDOW.with(|w| w.document().unwrap_throw());
}

/// Return the DOM [`web_sys::Window`].
/// #### Panics
/// Panics when the window cannot be returned.
pub fn window() -> web_sys::Window {
    WINDOW.with(|w| w.clone())
}

/// Return the document JsDom object [`web_sys::Document`]
/// #### Panics
/// Panics on non-wasm32 or when the document cannot be returned.
pub fn document() -> web_sys::Document {
    DOCUMENT.with(|d| d.clone())
}

/// Return the body Dom object.
///
/// ## Panics
/// Panics on wasm32 if the body cannot be returned.
pub fn body() -> web_sys::HtmlElement {
    DOCUMENT.with(|d| d.body().expect("document does not have a body"))
}

/// Resolves after the current microtask checkpoint, by which time pending
/// mutation records have been delivered.
pub async fn next_tick() {
    let promise = js_sys::Promise::resolve(&JsValue::UNDEFINED);
    if let Err(e) = wasm_bindgen_futures::JsFuture::from(promise).await {
        log::warn!("next tick was rejected: {e:?}");
    }
}

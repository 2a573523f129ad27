//! DOM event listeners.
//!
//! [`EventListener`] turns a DOM event into something that can be `.await`ed,
//! [`Listener`] calls a handler for every occurrence.
use std::{cell::RefCell, ops::DerefMut, pin::Pin, rc::Rc, task::Waker};

use wasm_bindgen::{JsCast, JsValue, prelude::Closure};

use crate::{
    Error,
    platform::{ListenerHandle, ListenerOptions},
};

type Callback = Rc<Closure<dyn FnMut(JsValue)>>;

#[derive(Clone, Default)]
struct FutureEventOccurrence {
    event: Rc<RefCell<Option<web_sys::Event>>>,
    wakers: Rc<RefCell<Vec<Waker>>>,
}

impl std::future::Future for FutureEventOccurrence {
    type Output = web_sys::Event;

    fn poll(
        self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Self::Output> {
        if let Some(event) = self.event.borrow().as_ref() {
            std::task::Poll::Ready(event.clone())
        } else {
            self.wakers.borrow_mut().push(cx.waker().clone());
            std::task::Poll::Pending
        }
    }
}

/// Awaits occurrences of one event on one target.
///
/// The JS callback is removed when the last clone is dropped.
#[derive(Clone)]
pub struct EventListener {
    target: web_sys::EventTarget,
    event_name: String,
    callback: Rc<RefCell<Option<Callback>>>,
    events: Rc<RefCell<FutureEventOccurrence>>,
}

impl Drop for EventListener {
    fn drop(&mut self) {
        if Rc::strong_count(&self.callback) != 1 {
            return;
        }
        let Some(callback) = self.callback.take().and_then(|rc| Rc::try_unwrap(rc).ok()) else {
            return;
        };
        if let Err(e) = self.target.remove_event_listener_with_callback(
            &self.event_name,
            callback.as_ref().unchecked_ref(),
        ) {
            log::warn!("could not remove '{}' listener: {e:?}", self.event_name);
        }
        log::trace!(
            "dropping listener for {} on target {:?}",
            self.event_name,
            self.target
        );
    }
}

impl EventListener {
    pub fn new(
        target: impl AsRef<web_sys::EventTarget>,
        event_name: impl Into<String>,
    ) -> Result<Self, Error> {
        let event_name = event_name.into();
        let events: Rc<RefCell<FutureEventOccurrence>> = Default::default();
        let callback = Closure::wrap({
            let events = events.clone();
            Box::new(move |val: JsValue| {
                // UNCHECKED: event callbacks only ever receive `Event`s
                let ev: web_sys::Event = val.unchecked_into();
                // Resolve the pending occurrence and leave a fresh one for the next event.
                let event = std::mem::take(events.borrow_mut().deref_mut());
                *event.event.borrow_mut() = Some(ev);
                let wakers = std::mem::take(event.wakers.borrow_mut().deref_mut());
                for waker in wakers.into_iter() {
                    waker.wake();
                }
            }) as Box<dyn FnMut(JsValue)>
        });

        let target = target.as_ref().clone();
        target.add_event_listener_with_callback(&event_name, callback.as_ref().unchecked_ref())?;

        Ok(Self {
            target,
            event_name,
            callback: Rc::new(RefCell::new(Some(Rc::new(callback)))),
            events,
        })
    }

    /// Resolves with the next occurrence of the event.
    pub fn next(&self) -> impl std::future::Future<Output = web_sys::Event> {
        self.events.borrow().clone()
    }
}

/// A callback registered with `addEventListener`.
///
/// Unlike [`EventListener`] this is removed as soon as it is dropped.
pub struct Listener {
    target: web_sys::EventTarget,
    event_name: String,
    capture: bool,
    callback: Closure<dyn FnMut(JsValue)>,
}

impl Listener {
    pub fn new(
        target: impl AsRef<web_sys::EventTarget>,
        event_name: impl Into<String>,
        options: ListenerOptions,
        handler: Rc<dyn Fn(&web_sys::Event)>,
    ) -> Result<Self, Error> {
        let event_name = event_name.into();
        let callback = Closure::wrap(Box::new(move |val: JsValue| {
            let ev: web_sys::Event = val.unchecked_into();
            handler(&ev);
        }) as Box<dyn FnMut(JsValue)>);

        let js_options = web_sys::AddEventListenerOptions::new();
        js_options.set_once(options.once);
        js_options.set_capture(options.capture);
        js_options.set_passive(options.passive);

        let target = target.as_ref().clone();
        target.add_event_listener_with_callback_and_add_event_listener_options(
            &event_name,
            callback.as_ref().unchecked_ref(),
            &js_options,
        )?;
        Ok(Listener {
            target,
            event_name,
            capture: options.capture,
            callback,
        })
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        if let Err(e) = self.target.remove_event_listener_with_callback_and_bool(
            &self.event_name,
            self.callback.as_ref().unchecked_ref(),
            self.capture,
        ) {
            log::warn!("could not remove '{}' listener: {e:?}", self.event_name);
        }
    }
}

impl ListenerHandle for Listener {
    fn remove(self) {
        drop(self);
    }
}

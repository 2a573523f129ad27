//! Helpers for directive authors.
//!
//! While a hook runs, its element and binding are the "current context".
//! Contexts form a per-thread stack so that a hook which triggers another
//! dispatch (eg by calling [`Directives::register`](crate::Directives::register))
//! sees the inner context until the inner hook returns, and its own afterwards.
use std::{any::Any, cell::RefCell, rc::Rc};

use crate::{
    Binding, Error,
    platform::{DomElement, ListenerHandle, ListenerOptions, Platform},
    sync::Shared,
};

/// The element and binding of the running hook.
pub struct Context<P: Platform> {
    pub element: P::Element,
    pub binding: Binding<P>,
}

impl<P: Platform> Clone for Context<P> {
    fn clone(&self) -> Self {
        Self {
            element: self.element.clone(),
            binding: self.binding.clone(),
        }
    }
}

thread_local! {
    static CONTEXTS: RefCell<Vec<Rc<dyn Any>>> = const { RefCell::new(Vec::new()) };
}

/// Keeps a context current until dropped.
pub(crate) struct ContextGuard {
    depth: usize,
}

impl ContextGuard {
    pub fn enter<P: Platform>(context: Context<P>) -> Self {
        let depth = CONTEXTS.with(|contexts| {
            let mut contexts = contexts.borrow_mut();
            contexts.push(Rc::new(context));
            contexts.len()
        });
        ContextGuard { depth }
    }
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        CONTEXTS.with(|contexts| contexts.borrow_mut().truncate(self.depth - 1));
    }
}

/// Returns the context of the running hook.
///
/// Fails with [`Error::MissingContext`] outside of a hook, or inside a hook
/// running on a different platform than `P`.
pub fn use_current_context<P: Platform>() -> Result<Context<P>, Error> {
    CONTEXTS.with(|contexts| {
        contexts
            .borrow()
            .last()
            .and_then(|top| top.downcast_ref::<Context<P>>())
            .cloned()
            .ok_or(Error::MissingContext)
    })
}

struct Slot<P: Platform> {
    listener: Option<P::Listener>,
    unmount_watch: Option<P::Listener>,
}

impl<P: Platform> Slot<P> {
    fn release(slot: &Shared<Self>) {
        let (listener, watch) = {
            let mut slot = slot.get_mut();
            (slot.listener.take(), slot.unmount_watch.take())
        };
        if let Some(listener) = listener {
            listener.remove();
        }
        if let Some(watch) = watch {
            watch.remove();
        }
    }
}

/// A listener registered with [`use_event_listener`].
///
/// Dropping a subscription does not remove the listener.
pub struct Subscription<P: Platform> {
    slot: Shared<Slot<P>>,
}

impl<P: Platform> Subscription<P> {
    /// Remove the listener now.
    pub fn unsubscribe(self) {
        Slot::release(&self.slot);
    }

    /// Whether the listener is still registered.
    pub fn is_active(&self) -> bool {
        self.slot.get().listener.is_some()
    }
}

/// Listen for `event_name` on `element` for as long as the running directive
/// instance stays mounted.
///
/// Must be called from inside a hook. The listener is removed when the
/// instance unmounts or when the returned [`Subscription`] is unsubscribed.
pub fn use_event_listener<P: Platform>(
    element: &P::Element,
    event_name: &str,
    handler: impl Fn(&P::Event) + 'static,
    options: ListenerOptions,
) -> Result<Subscription<P>, Error> {
    let context = use_current_context::<P>()?;
    let listener = P::add_listener(element, event_name, options, Rc::new(handler))?;
    let slot = Shared::new(Slot::<P> {
        listener: Some(listener),
        unmount_watch: None,
    });
    let unmounted = context
        .binding
        .engine
        .specific_event_name(crate::Task::Unmounted, &context.binding.directive);
    let watch = P::add_listener(
        &context.element,
        &unmounted,
        ListenerOptions::once(),
        Rc::new({
            let slot = slot.clone();
            move |_: &P::Event| {
                log::trace!("releasing listener on unmount");
                Slot::release(&slot)
            }
        }),
    );
    match watch {
        Ok(watch) => slot.get_mut().unmount_watch = Some(watch),
        Err(e) => {
            Slot::release(&slot);
            return Err(e);
        }
    }
    Ok(Subscription { slot })
}

/// Returns the value stored on `element` under `key`, creating it with
/// `factory` first if there is none (or if it has a different type).
///
/// The value is kept on the element itself, so it goes away with the element
/// or when [`delete_singleton`] is called, typically from an `unmounted` hook.
pub fn singleton<E: DomElement, T: 'static>(
    element: &E,
    key: &str,
    factory: impl FnOnce() -> T,
) -> Rc<T> {
    if let Some(existing) = get_singleton::<E, T>(element, key) {
        return existing;
    }
    let value = Rc::new(factory());
    element.set_data(key, Some(value.clone() as Rc<dyn Any>));
    value
}

/// Returns the value stored on `element` under `key`, if it has type `T`.
pub fn get_singleton<E: DomElement, T: 'static>(element: &E, key: &str) -> Option<Rc<T>> {
    element.data(key)?.downcast::<T>().ok()
}

/// Forget the value stored on `element` under `key`.
///
/// Returns whether there was one.
pub fn delete_singleton<E: DomElement>(element: &E, key: &str) -> bool {
    element.set_data(key, None)
}

#[cfg(test)]
mod test {
    use super::*;

    #[cfg(feature = "memory")]
    #[test]
    fn singleton_is_created_once_per_element_and_key() {
        use crate::memory::Document;
        use std::cell::Cell;

        let doc = Document::new();
        let a = doc.create_element("div");
        let b = doc.create_element("div");
        let first = singleton(&a, "count", || Cell::new(0u32));
        first.set(3);
        let again = singleton(&a, "count", || Cell::new(100u32));
        assert_eq!(again.get(), 3);

        let other = singleton(&b, "count", || Cell::new(7u32));
        assert_eq!(other.get(), 7);

        assert!(delete_singleton(&a, "count"));
        assert!(!delete_singleton(&a, "count"));
        assert!(get_singleton::<_, Cell<u32>>(&a, "count").is_none());
        assert!(get_singleton::<_, Cell<u32>>(&b, "count").is_some());
    }

    #[cfg(feature = "memory")]
    #[test]
    fn singleton_with_another_type_is_replaced() {
        let doc = crate::memory::Document::new();
        let a = doc.create_element("div");
        let _ = singleton(&a, "value", || 1u8);
        assert!(get_singleton::<_, String>(&a, "value").is_none());
        let s = singleton(&a, "value", || "text".to_owned());
        assert_eq!(s.as_str(), "text");
        assert!(get_singleton::<_, u8>(&a, "value").is_none());
    }

    #[cfg(feature = "memory")]
    #[test]
    fn singletons_go_away_with_their_element() {
        let doc = crate::memory::Document::new();
        let sentinel = Rc::new(());
        let el = doc.create_element("div");
        let _ = singleton(&el, "k", {
            let sentinel = sentinel.clone();
            move || sentinel
        });
        assert_eq!(Rc::strong_count(&sentinel), 2);

        let handle = el.clone();
        drop(el);
        assert_eq!(Rc::strong_count(&sentinel), 2);
        drop(handle);
        assert_eq!(Rc::strong_count(&sentinel), 1);
    }

    #[test]
    fn context_guards_nest() {
        fn depth() -> usize {
            CONTEXTS.with(|c| c.borrow().len())
        }
        assert_eq!(depth(), 0);
        {
            let _outer = ContextGuard {
                depth: CONTEXTS.with(|c| {
                    c.borrow_mut().push(Rc::new(1u8));
                    c.borrow().len()
                }),
            };
            {
                let _inner = ContextGuard {
                    depth: CONTEXTS.with(|c| {
                        c.borrow_mut().push(Rc::new(2u8));
                        c.borrow().len()
                    }),
                };
                assert_eq!(depth(), 2);
            }
            assert_eq!(depth(), 1);
        }
        assert_eq!(depth(), 0);
    }
}

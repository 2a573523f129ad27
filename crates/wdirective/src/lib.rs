//! # wdirective
//!
//! Attribute directives for plain DOM trees.
//!
//! A directive is a named bundle of lifecycle hooks. Register it with a
//! [`Directives`] engine, point the engine at a subtree with
//! [`Directives::listen`], and every element in that subtree carrying the
//! directive's attribute (`w-<name>` by default) gets its hooks called as the
//! attribute appears, changes and goes away:
//!
//! * `mounted` when the attribute shows up (or the element is inserted),
//! * `updated` when its value changes,
//! * `unmounted` when it is removed (or the element is detached),
//! * `childrenUpdated` when the element's subtree changes, if enabled in
//!   [`Options`].
//!
//! ## Platforms
//! The engine is written against the [`Platform`] trait.
//! With the `web` feature, [`web::Web`] drives real browser DOM through
//! `web-sys`. With the `memory` feature, [`memory::Memory`] drives an in-memory
//! DOM, which is what the native tests use.
//!
//! ## Attribute parameters
//! With [`Options::enable_attr_params`] set, a raw attribute like
//! `w-tooltip:top.once.fade-in` resolves to the `tooltip` directive with the
//! argument `top` and the modifiers `once` and `fadeIn`.
//!
//! ## Helpers
//! Hooks can use [`use_current_context`], [`use_event_listener`] and the
//! per-element [`singleton`] store.
mod context;
mod directive;
mod engine;
mod error;
#[cfg(feature = "memory")]
pub mod memory;
mod options;
pub mod parse;
pub mod platform;
mod registry;
pub mod sync;
pub mod utils;
#[cfg(feature = "web")]
pub mod web;

pub use context::{
    Context, Subscription, delete_singleton, get_singleton, singleton, use_current_context,
    use_event_listener,
};
pub use directive::{Binding, Directive, GlobalHook, Hook, Task};
pub use engine::{DirectiveInfo, Directives};
pub use error::Error;
pub use options::Options;
pub use parse::{Modifiers, ParsedDirective};
pub use platform::{
    DomElement, ListenerHandle, ListenerOptions, MutationKind, MutationRecord, ObserveOptions,
    ObserverHandle, Platform,
};

pub mod prelude {
    //! Re-exports for convenience.
    pub use super::{
        Binding, Directive, Directives, DomElement, Error, ListenerHandle, ListenerOptions,
        Options, Platform, Task, delete_singleton, get_singleton, singleton, use_current_context,
        use_event_listener,
    };
}

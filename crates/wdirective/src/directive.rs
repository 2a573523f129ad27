//! Directive handlers and the bindings passed to them.
use std::rc::Rc;

use crate::{
    Directives,
    parse::Modifiers,
    platform::{MutationRecord, Platform},
};

/// A lifecycle phase of one directive instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Task {
    Mounted,
    Updated,
    Unmounted,
    ChildrenUpdated,
}

impl Task {
    /// The hook name, eg `childrenUpdated`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Task::Mounted => "mounted",
            Task::Updated => "updated",
            Task::Unmounted => "unmounted",
            Task::ChildrenUpdated => "childrenUpdated",
        }
    }

    /// The event name suffix, eg `children-updated`.
    pub fn kebab(&self) -> &'static str {
        match self {
            Task::ChildrenUpdated => "children-updated",
            task => task.as_str(),
        }
    }
}

impl std::fmt::Display for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A lifecycle hook.
pub type Hook<P> =
    Rc<dyn Fn(&<P as Platform>::Element, &Binding<P>) -> anyhow::Result<()> + 'static>;

/// A hook that runs around every handler invocation of an engine.
pub type GlobalHook<P> = Rc<dyn Fn(Task, &Binding<P>) + 'static>;

/// A directive handler: up to four optional lifecycle hooks.
///
/// ```
/// # #[cfg(feature = "memory")] {
/// use wdirective::{Directive, memory::Memory};
///
/// let copy = Directive::<Memory>::new().on_mounted(|_el, binding| {
///     log::info!("copy mounted with {:?}", binding.value);
///     Ok(())
/// });
/// assert!(copy.has_hook(wdirective::Task::Mounted));
/// assert!(!copy.has_hook(wdirective::Task::Updated));
/// # }
/// ```
pub struct Directive<P: Platform> {
    mounted: Option<Hook<P>>,
    updated: Option<Hook<P>>,
    unmounted: Option<Hook<P>>,
    children_updated: Option<Hook<P>>,
}

impl<P: Platform> Default for Directive<P> {
    fn default() -> Self {
        Self {
            mounted: None,
            updated: None,
            unmounted: None,
            children_updated: None,
        }
    }
}

impl<P: Platform> Clone for Directive<P> {
    fn clone(&self) -> Self {
        Self {
            mounted: self.mounted.clone(),
            updated: self.updated.clone(),
            unmounted: self.unmounted.clone(),
            children_updated: self.children_updated.clone(),
        }
    }
}

impl<P: Platform> Directive<P> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_mounted(
        mut self,
        f: impl Fn(&P::Element, &Binding<P>) -> anyhow::Result<()> + 'static,
    ) -> Self {
        self.mounted = Some(Rc::new(f));
        self
    }

    pub fn on_updated(
        mut self,
        f: impl Fn(&P::Element, &Binding<P>) -> anyhow::Result<()> + 'static,
    ) -> Self {
        self.updated = Some(Rc::new(f));
        self
    }

    pub fn on_unmounted(
        mut self,
        f: impl Fn(&P::Element, &Binding<P>) -> anyhow::Result<()> + 'static,
    ) -> Self {
        self.unmounted = Some(Rc::new(f));
        self
    }

    pub fn on_children_updated(
        mut self,
        f: impl Fn(&P::Element, &Binding<P>) -> anyhow::Result<()> + 'static,
    ) -> Self {
        self.children_updated = Some(Rc::new(f));
        self
    }

    /// The hook for `task`, if this directive implements it.
    pub fn hook(&self, task: Task) -> Option<&Hook<P>> {
        match task {
            Task::Mounted => self.mounted.as_ref(),
            Task::Updated => self.updated.as_ref(),
            Task::Unmounted => self.unmounted.as_ref(),
            Task::ChildrenUpdated => self.children_updated.as_ref(),
        }
    }

    pub fn has_hook(&self, task: Task) -> bool {
        self.hook(task).is_some()
    }
}

/// Everything a hook gets to know about the invocation.
///
/// A binding lives for one dispatch and is not retained by the engine.
pub struct Binding<P: Platform> {
    /// Raw attribute name, eg `w-foo:bar.a`.
    pub directive: String,
    /// Prefixed base name, eg `w-foo`.
    pub name: String,
    pub task: Task,
    pub node: P::Element,
    /// Current attribute value. `None` once the attribute is gone.
    pub value: Option<String>,
    /// Previous attribute value, when the triggering mutation knows it.
    pub old_value: Option<String>,
    /// The triggering mutation. `None` for synchronous passes (listen,
    /// register, remove, disconnect).
    pub mutation: Option<MutationRecord<P::Element>>,
    pub handler: Rc<Directive<P>>,
    pub argument: Option<String>,
    pub modifiers: Modifiers,
    pub engine: Directives<P>,
}

impl<P: Platform> Clone for Binding<P> {
    fn clone(&self) -> Self {
        Self {
            directive: self.directive.clone(),
            name: self.name.clone(),
            task: self.task,
            node: self.node.clone(),
            value: self.value.clone(),
            old_value: self.old_value.clone(),
            mutation: self.mutation.clone(),
            handler: self.handler.clone(),
            argument: self.argument.clone(),
            modifiers: self.modifiers.clone(),
            engine: self.engine.clone(),
        }
    }
}

impl<P: Platform> std::fmt::Debug for Binding<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Binding")
            .field("directive", &self.directive)
            .field("name", &self.name)
            .field("task", &self.task)
            .field("node", &self.node)
            .field("value", &self.value)
            .field("old_value", &self.old_value)
            .field("argument", &self.argument)
            .field("modifiers", &self.modifiers)
            .finish_non_exhaustive()
    }
}

//! The attribute observation engine.
//!
//! [`Directives`] watches a subtree through two tiers of mutation observers:
//!
//! * one root observer on the listen target, which discovers elements and
//!   attributes as they appear (and elements as they leave), and
//! * one observer per element that has at least one mounted directive, which
//!   reports updates and removals of that element's directive attributes, and
//!   child list changes when `childrenUpdated` is enabled.
//!
//! Every (raw attribute, element) pair moves through
//! `unmounted -> mounted -> updated* -> unmounted`. The engine enforces this:
//! a transition that is not valid from the pair's current state is skipped.
use std::rc::Rc;

use crate::{
    Binding, Directive, Error, GlobalHook, Options, Task,
    context::{Context, ContextGuard},
    parse::ParsedDirective,
    platform::{DomElement, MutationKind, MutationRecord, ObserveOptions, ObserverHandle, Platform},
    registry::{Attached, AttachedMap, Registry},
    sync::Shared,
};

/// A snapshot of one registered directive.
pub struct DirectiveInfo<P: Platform> {
    /// Prefix + name, eg `w-copy`.
    pub attribute_name: String,
    pub handler: Rc<Directive<P>>,
    /// One entry per mounted instance.
    pub elements: Vec<P::Element>,
}

struct State<P: Platform> {
    options: Options,
    /// Set while listening.
    target: Option<P::Element>,
    root: Option<P::Observer>,
    registry: Registry<P>,
    attached: AttachedMap<P>,
    before: Option<GlobalHook<P>>,
    after: Option<GlobalHook<P>>,
}

impl<P: Platform> Drop for State<P> {
    fn drop(&mut self) {
        if let Some(root) = self.root.take() {
            root.disconnect();
        }
        self.attached.clear();
    }
}

fn parse_with(options: &Options, raw: &str) -> ParsedDirective {
    if options.enable_attr_params {
        ParsedDirective::parse(raw)
    } else {
        ParsedDirective::verbatim(raw)
    }
}

/// A directive engine.
///
/// Cloning gives another handle to the same engine.
///
/// ```
/// # #[cfg(feature = "memory")] {
/// use wdirective::{Directive, Directives, Options, memory::{Document, Memory}};
///
/// let doc = Document::new();
/// let button = doc.create_element("button").with_attribute("w-copy", "Hello");
/// doc.body().append_child(&button);
///
/// let directives = Directives::<Memory>::new(Options::default());
/// directives.register(
///     "copy",
///     Directive::<Memory>::new().on_mounted(|_el, binding| {
///         assert_eq!(binding.value.as_deref(), Some("Hello"));
///         Ok(())
///     }),
/// );
/// directives.listen(Some(&doc.body())).unwrap();
/// assert_eq!(directives.mounted_directives(&button), vec!["w-copy".to_owned()]);
/// # }
/// ```
pub struct Directives<P: Platform> {
    state: Shared<State<P>>,
}

impl<P: Platform> Clone for Directives<P> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }
}

impl<P: Platform> Default for Directives<P> {
    fn default() -> Self {
        Self::new(Options::default())
    }
}

impl<P: Platform> Directives<P> {
    /// Create an idle engine.
    pub fn new(options: Options) -> Self {
        Directives {
            state: Shared::new(State {
                options,
                target: None,
                root: None,
                registry: Registry::default(),
                attached: AttachedMap::default(),
                before: None,
                after: None,
            }),
        }
    }

    pub fn options(&self) -> Options {
        self.state.get().options.clone()
    }

    pub fn prefix(&self) -> String {
        self.state.get().options.prefix.clone()
    }

    pub fn is_listening(&self) -> bool {
        self.state.get().target.is_some()
    }

    /// The element being listened to.
    pub fn target(&self) -> Option<P::Element> {
        self.state.get().target.clone()
    }

    /// Look up a registered directive by its unprefixed name.
    pub fn get_directive_info(&self, name: &str) -> Option<DirectiveInfo<P>> {
        let state = self.state.get();
        let attribute_name = format!("{}{name}", state.options.prefix);
        state
            .registry
            .get(&attribute_name)
            .map(|registration| DirectiveInfo {
                attribute_name,
                handler: registration.handler.clone(),
                elements: registration.elements.clone(),
            })
    }

    /// Raw attribute names of the directive instances mounted on `element`.
    pub fn mounted_directives(&self, element: &P::Element) -> Vec<String> {
        self.state
            .get()
            .attached
            .get(element)
            .map(|record| record.directives.clone())
            .unwrap_or_default()
    }

    /// Number of elements currently carrying a mounted directive.
    pub fn attached_count(&self) -> usize {
        self.state.get().attached.len()
    }

    /// Run `f` before every hook invocation.
    pub fn set_before_hook(&self, f: impl Fn(Task, &Binding<P>) + 'static) {
        self.state.get_mut().before = Some(Rc::new(f));
    }

    /// Run `f` after every hook invocation.
    pub fn set_after_hook(&self, f: impl Fn(Task, &Binding<P>) + 'static) {
        self.state.get_mut().after = Some(Rc::new(f));
    }

    /// The event dispatched on an element for every `task` transition, eg `wd:mounted`.
    pub fn generic_event_name(&self, task: Task) -> String {
        format!("{}{}", self.state.get().options.event_prefix, task.kebab())
    }

    /// The event dispatched on an element for `task` transitions of exactly
    /// the `raw` directive attribute, eg `__wd:unmounted:w-foo`.
    pub fn specific_event_name(&self, task: Task, raw: &str) -> String {
        format!(
            "__{}{}:{raw}",
            self.state.get().options.event_prefix,
            task.kebab()
        )
    }

    /// Register `handler` under `name`, which is given without the prefix.
    ///
    /// When listening, every element in the listened subtree that already
    /// carries the directive is mounted before this returns. Registering a
    /// name twice first unmounts the instances of the previous handler.
    pub fn register(&self, name: &str, handler: Directive<P>) {
        let attribute_name = format!("{}{name}", self.prefix());
        if self.state.get().registry.contains(&attribute_name) {
            log::debug!("replacing directive '{attribute_name}'");
            self.unmount_all_of(&attribute_name);
        }
        self.state
            .get_mut()
            .registry
            .insert(attribute_name.clone(), Rc::new(handler));
        log::debug!("registered directive '{attribute_name}'");

        if let Some(target) = self.target() {
            self.run_directives_of_node(&target, Task::Mounted, Some(&attribute_name), None);
            self.find_and_run_directives_of_subtree(
                &target,
                Task::Mounted,
                Some(&attribute_name),
                None,
            );
        }
    }

    /// Unmount every instance of the directive and forget it.
    ///
    /// Does nothing for unknown names.
    pub fn remove(&self, name: &str) {
        let attribute_name = format!("{}{name}", self.prefix());
        if !self.state.get().registry.contains(&attribute_name) {
            return;
        }
        self.unmount_all_of(&attribute_name);
        self.state.get_mut().registry.remove(&attribute_name);
        log::debug!("removed directive '{attribute_name}'");
    }

    /// Mount every registered directive found in `target` (or the platform's
    /// default target) and start observing it.
    pub fn listen(&self, target: Option<&P::Element>) -> Result<(), Error> {
        if self.is_listening() {
            return Err(Error::AlreadyListening);
        }
        let target = match target {
            Some(target) => target.clone(),
            None => P::default_target().ok_or(Error::NoTarget)?,
        };
        log::debug!("listening on {target:?}");
        self.state.get_mut().target = Some(target.clone());

        self.run_directives_of_node(&target, Task::Mounted, None, None);
        self.find_and_run_directives_of_subtree(&target, Task::Mounted, None, None);

        let weak = self.state.downgrade();
        let observer = P::observe(
            &target,
            ObserveOptions {
                attributes: true,
                attribute_old_value: true,
                child_list: true,
                subtree: true,
            },
            Box::new(move |records| {
                if let Some(state) = weak.upgrade() {
                    Directives { state }.handle_root_records(records);
                }
            }),
        );
        match observer {
            Ok(observer) => {
                let mut state = self.state.get_mut();
                // A hook may have disconnected (or even re-listened) during the scan.
                if state.root.is_none() && state.target.as_ref() == Some(&target) {
                    state.root = Some(observer);
                } else {
                    observer.disconnect();
                }
                Ok(())
            }
            Err(e) => {
                log::error!("could not observe {target:?}: {e}");
                self.disconnect();
                Err(e)
            }
        }
    }

    /// Stop observing and unmount every mounted directive instance.
    ///
    /// Safe to call when idle.
    pub fn disconnect(&self) {
        let (root, target) = {
            let mut state = self.state.get_mut();
            (state.root.take(), state.target.take())
        };
        if let Some(root) = root {
            root.disconnect();
        }
        let Some(target) = target else {
            return;
        };
        log::debug!("disconnecting from {target:?}");

        let names = self.state.get().registry.attribute_names();
        for attribute_name in names {
            self.unmount_all_of(&attribute_name);
        }

        let mut state = self.state.get_mut();
        state.attached.clear();
        state.registry.clear_elements();
    }

    /// Names of the directive attributes on `node`, optionally only those of
    /// the directive `filter` (a prefixed base name).
    pub fn find_directives_from_node(&self, node: &P::Element, filter: Option<&str>) -> Vec<String> {
        let state = self.state.get();
        let options = &state.options;
        node.attribute_names()
            .into_iter()
            .filter(|name| name.starts_with(&options.prefix))
            .filter(|name| filter.is_none_or(|filter| parse_with(options, name).name == filter))
            .collect()
    }

    /// Run the `task` phase of the directive behind `raw` on `node`, if such a
    /// directive is registered and the transition is valid.
    pub fn run_directive_if_exists(
        &self,
        raw: &str,
        node: &P::Element,
        task: Task,
        mutation: Option<&MutationRecord<P::Element>>,
    ) {
        let (parsed, handler, before, after) = {
            let state = self.state.get();
            let parsed = parse_with(&state.options, raw);
            let Some(registration) = state.registry.get(&parsed.name) else {
                log::trace!("no directive registered for '{raw}'");
                return;
            };
            let handler = registration.handler.clone();
            (parsed, handler, state.before.clone(), state.after.clone())
        };

        if !self.enter(raw, &parsed.name, node, task) {
            log::trace!("skipping {task} of '{raw}' on {node:?}");
            return;
        }
        log::trace!("{task} '{raw}' on {node:?}");

        let binding = Binding {
            directive: raw.to_owned(),
            name: parsed.name,
            task,
            node: node.clone(),
            value: node.attribute(raw),
            old_value: mutation.and_then(|m| m.old_value.clone()),
            mutation: mutation.cloned(),
            handler: handler.clone(),
            argument: parsed.argument,
            modifiers: parsed.modifiers,
            engine: self.clone(),
        };

        if let Some(hook) = handler.hook(task) {
            let _context = ContextGuard::enter(Context {
                element: node.clone(),
                binding: binding.clone(),
            });
            if let Some(before) = before.as_ref() {
                before(task, &binding);
            }
            if let Err(e) = hook(node, &binding) {
                log::error!("{task} hook of '{raw}' failed on {node:?}: {e:#}");
            }
            if let Some(after) = after.as_ref() {
                after(task, &binding);
            }
        }

        if task == Task::Unmounted && self.state.get_mut().attached.prune(node) {
            log::debug!("detached observer from {node:?}");
        }

        for event_name in [
            self.generic_event_name(task),
            self.specific_event_name(task, raw),
        ] {
            if let Err(e) = P::dispatch(node, &event_name, &binding) {
                log::warn!("could not dispatch '{event_name}' on {node:?}: {e}");
            }
        }
    }

    /// Move the pair into the state `task` leads to, returning whether the
    /// transition is valid.
    fn enter(&self, raw: &str, name: &str, node: &P::Element, task: Task) -> bool {
        // Only unmounting continues once a hook has disconnected the engine.
        if task != Task::Unmounted && !self.is_listening() {
            return false;
        }
        match task {
            Task::Mounted => {
                let (mounted, has_record) = {
                    let state = self.state.get();
                    (
                        state.attached.is_mounted(node, raw),
                        state.attached.get(node).is_some(),
                    )
                };
                if mounted {
                    return false;
                }
                if !has_record {
                    let observer = match self.attach(node) {
                        Ok(observer) => observer,
                        Err(e) => {
                            log::error!("could not observe {node:?}: {e}");
                            return false;
                        }
                    };
                    self.state.get_mut().attached.insert(Attached {
                        element: node.clone(),
                        observer,
                        directives: vec![],
                    });
                    log::debug!("attached observer to {node:?}");
                }
                let mut state = self.state.get_mut();
                if let Some(registration) = state.registry.get_mut(name) {
                    registration.elements.push(node.clone());
                }
                if let Some(record) = state.attached.get_mut(node) {
                    record.directives.push(raw.to_owned());
                }
                true
            }
            Task::Unmounted => {
                let mut state = self.state.get_mut();
                let Some(record) = state.attached.get_mut(node) else {
                    return false;
                };
                let Some(index) = record.directives.iter().position(|d| d == raw) else {
                    return false;
                };
                record.directives.remove(index);
                if let Some(registration) = state.registry.get_mut(name) {
                    if let Some(index) = registration.elements.iter().position(|e| e == node) {
                        registration.elements.remove(index);
                    }
                }
                true
            }
            Task::Updated | Task::ChildrenUpdated => {
                self.state.get().attached.is_mounted(node, raw)
            }
        }
    }

    /// Install the per-element observer.
    fn attach(&self, element: &P::Element) -> Result<P::Observer, Error> {
        let children = self.state.get().options.enable_children_updated;
        let weak = self.state.downgrade();
        let observed = element.clone();
        P::observe(
            element,
            ObserveOptions {
                attributes: true,
                attribute_old_value: true,
                child_list: children,
                subtree: children,
            },
            Box::new(move |records| {
                if let Some(state) = weak.upgrade() {
                    Directives { state }.handle_attached_records(&observed, records);
                }
            }),
        )
    }

    fn run_directives_of_node(
        &self,
        node: &P::Element,
        task: Task,
        filter: Option<&str>,
        mutation: Option<&MutationRecord<P::Element>>,
    ) {
        for raw in self.find_directives_from_node(node, filter) {
            if self.scan_interrupted(task) {
                return;
            }
            self.run_directive_if_exists(&raw, node, task, mutation);
        }
    }

    /// Run `task` for the directives found below `node`.
    ///
    /// With attribute parameters every descendant is inspected, otherwise each
    /// registered (or the filtered) attribute name is selected for directly.
    fn find_and_run_directives_of_subtree(
        &self,
        node: &P::Element,
        task: Task,
        filter: Option<&str>,
        mutation: Option<&MutationRecord<P::Element>>,
    ) {
        let (attr_params, names) = {
            let state = self.state.get();
            let names = match filter {
                Some(filter) => vec![filter.to_owned()],
                None => state.registry.attribute_names(),
            };
            (state.options.enable_attr_params, names)
        };
        if attr_params {
            for element in node.descendants() {
                if self.scan_interrupted(task) {
                    return;
                }
                self.run_directives_of_node(&element, task, filter, mutation);
            }
        } else {
            for name in names {
                for element in node.select_with_attribute(&name) {
                    if self.scan_interrupted(task) {
                        return;
                    }
                    self.run_directive_if_exists(&name, &element, task, mutation);
                }
            }
        }
    }

    /// Whether a hook disconnected the engine while it was mounting or
    /// updating.
    fn scan_interrupted(&self, task: Task) -> bool {
        task != Task::Unmounted && !self.is_listening()
    }

    /// Synchronously unmount every mounted instance of a registered directive.
    fn unmount_all_of(&self, attribute_name: &str) {
        let instances = {
            let state = self.state.get();
            let Some(registration) = state.registry.get(attribute_name) else {
                return;
            };
            let mut elements: Vec<&P::Element> = vec![];
            for element in registration.elements.iter() {
                if !elements.contains(&element) {
                    elements.push(element);
                }
            }
            let mut instances = vec![];
            for element in elements {
                for raw in self.mounted_on(&state.attached, &state.options, element, attribute_name) {
                    instances.push((element.clone(), raw));
                }
            }
            instances
        };
        for (element, raw) in instances {
            self.run_directive_if_exists(&raw, &element, Task::Unmounted, None);
        }
    }

    fn mounted_on(
        &self,
        attached: &AttachedMap<P>,
        options: &Options,
        element: &P::Element,
        attribute_name: &str,
    ) -> Vec<String> {
        attached
            .get(element)
            .map(|record| {
                record
                    .directives
                    .iter()
                    .filter(|raw| parse_with(options, raw).name == attribute_name)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    fn handle_root_records(&self, records: Vec<MutationRecord<P::Element>>) {
        log::trace!("root observer got {} records", records.len());
        for record in records {
            // A hook may disconnect part way through a batch.
            if !self.is_listening() {
                return;
            }
            match record.kind {
                MutationKind::ChildList => {
                    for node in record.added_nodes.iter() {
                        if !self.is_listening() {
                            return;
                        }
                        self.run_directives_of_node(node, Task::Mounted, None, Some(&record));
                        self.find_and_run_directives_of_subtree(
                            node,
                            Task::Mounted,
                            None,
                            Some(&record),
                        );
                    }
                    for node in record.removed_nodes.iter() {
                        if !self.is_listening() {
                            return;
                        }
                        self.run_directives_of_node(node, Task::Unmounted, None, Some(&record));
                        self.find_and_run_directives_of_subtree(
                            node,
                            Task::Unmounted,
                            None,
                            Some(&record),
                        );
                    }
                }
                MutationKind::Attributes => {
                    let Some(name) = record.attribute_name.as_deref() else {
                        continue;
                    };
                    if !name.starts_with(&self.prefix()) {
                        continue;
                    }
                    // Removals are reported by the attached observer.
                    if record.target.attribute(name).is_none() {
                        continue;
                    }
                    // As are updates of pairs that are already mounted.
                    if self.state.get().attached.is_mounted(&record.target, name) {
                        continue;
                    }
                    self.run_directive_if_exists(name, &record.target, Task::Mounted, Some(&record));
                }
            }
        }
    }

    fn handle_attached_records(
        &self,
        element: &P::Element,
        records: Vec<MutationRecord<P::Element>>,
    ) {
        log::trace!("attached observer of {element:?} got {} records", records.len());
        let children_updated = self.state.get().options.enable_children_updated;
        for record in records {
            if !self.is_listening() || self.state.get().attached.get(element).is_none() {
                return;
            }
            match record.kind {
                MutationKind::Attributes if &record.target == element => {
                    let Some(name) = record.attribute_name.as_deref() else {
                        continue;
                    };
                    if !name.starts_with(&self.prefix()) {
                        continue;
                    }
                    match element.attribute(name) {
                        None => {
                            self.run_directive_if_exists(name, element, Task::Unmounted, Some(&record))
                        }
                        // A fresh attribute is mounted by the root observer.
                        Some(_) if record.old_value.is_none() => {}
                        Some(_) => {
                            self.run_directive_if_exists(name, element, Task::Updated, Some(&record))
                        }
                    }
                }
                MutationKind::ChildList if children_updated => {
                    for raw in self.find_directives_from_node(element, None) {
                        self.run_directive_if_exists(
                            &raw,
                            element,
                            Task::ChildrenUpdated,
                            Some(&record),
                        );
                    }
                }
                _ => {}
            }
        }
    }
}

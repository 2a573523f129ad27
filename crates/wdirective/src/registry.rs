//! Bookkeeping for registered directives and the elements they are mounted on.
use std::rc::Rc;

use crate::{
    Directive,
    platform::{ObserverHandle, Platform},
};

/// One registered directive.
pub(crate) struct Registration<P: Platform> {
    /// Prefix + name, eg `w-copy`.
    pub attribute_name: String,
    pub handler: Rc<Directive<P>>,
    /// One entry per mounted instance, so an element carrying `w-foo:a` and
    /// `w-foo:b` appears twice.
    pub elements: Vec<P::Element>,
}

/// Registered directives in registration order.
pub(crate) struct Registry<P: Platform> {
    entries: Vec<Registration<P>>,
}

impl<P: Platform> Default for Registry<P> {
    fn default() -> Self {
        Self { entries: vec![] }
    }
}

impl<P: Platform> Registry<P> {
    pub fn get(&self, attribute_name: &str) -> Option<&Registration<P>> {
        self.entries
            .iter()
            .find(|r| r.attribute_name == attribute_name)
    }

    pub fn get_mut(&mut self, attribute_name: &str) -> Option<&mut Registration<P>> {
        self.entries
            .iter_mut()
            .find(|r| r.attribute_name == attribute_name)
    }

    pub fn contains(&self, attribute_name: &str) -> bool {
        self.get(attribute_name).is_some()
    }

    /// Insert or replace, keeping the original position on replacement.
    pub fn insert(&mut self, attribute_name: String, handler: Rc<Directive<P>>) {
        let registration = Registration {
            attribute_name,
            handler,
            elements: vec![],
        };
        match self.get_mut(&registration.attribute_name) {
            Some(existing) => *existing = registration,
            None => self.entries.push(registration),
        }
    }

    pub fn remove(&mut self, attribute_name: &str) -> Option<Registration<P>> {
        let index = self
            .entries
            .iter()
            .position(|r| r.attribute_name == attribute_name)?;
        Some(self.entries.remove(index))
    }

    pub fn attribute_names(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|r| r.attribute_name.clone())
            .collect()
    }

    /// Forget every mounted instance, keeping the registrations.
    pub fn clear_elements(&mut self) {
        for registration in self.entries.iter_mut() {
            registration.elements.clear();
        }
    }
}

/// An element carrying at least one mounted directive instance, and the
/// observer watching it.
pub(crate) struct Attached<P: Platform> {
    pub element: P::Element,
    pub observer: P::Observer,
    /// Raw attribute names mounted on the element.
    pub directives: Vec<String>,
}

/// Attached elements, keyed by element identity.
///
/// A record is removed as soon as its last instance unmounts, so the map never
/// holds an element that has no mounted directive.
pub(crate) struct AttachedMap<P: Platform> {
    records: Vec<Attached<P>>,
}

impl<P: Platform> Default for AttachedMap<P> {
    fn default() -> Self {
        Self { records: vec![] }
    }
}

impl<P: Platform> AttachedMap<P> {
    pub fn get(&self, element: &P::Element) -> Option<&Attached<P>> {
        self.records.iter().find(|r| &r.element == element)
    }

    pub fn get_mut(&mut self, element: &P::Element) -> Option<&mut Attached<P>> {
        self.records.iter_mut().find(|r| &r.element == element)
    }

    pub fn is_mounted(&self, element: &P::Element, raw: &str) -> bool {
        self.get(element)
            .is_some_and(|r| r.directives.iter().any(|d| d == raw))
    }

    pub fn insert(&mut self, record: Attached<P>) {
        self.records.push(record);
    }

    /// Remove the record for `element` if it has no mounted instances left,
    /// disconnecting its observer.
    pub fn prune(&mut self, element: &P::Element) -> bool {
        let Some(index) = self
            .records
            .iter()
            .position(|r| &r.element == element && r.directives.is_empty())
        else {
            return false;
        };
        let record = self.records.remove(index);
        record.observer.disconnect();
        true
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Disconnect and drop every record.
    pub fn clear(&mut self) {
        for record in self.records.drain(..) {
            record.observer.disconnect();
        }
    }
}

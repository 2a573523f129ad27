//! Shared-ownership primitives.
//!
//! The directive runtime is single threaded, so these wrap [`Rc`] and
//! [`RefCell`] rather than their thread-safe counterparts.

use std::{
    cell::RefCell,
    ops::{Deref, DerefMut},
    rc::{Rc, Weak},
};

/// A "shared" value.
///
/// Equivalent to `Rc<RefCell<T>>`.
pub struct Shared<T> {
    inner: Rc<RefCell<T>>,
}

impl<T> Clone for Shared<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Default> Default for Shared<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: 'static> From<T> for Shared<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl<T> Shared<T> {
    /// Create a new shared `T`.
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(RefCell::new(value)),
        }
    }

    /// Get a reference to the inner `T`.
    ///
    /// ## Panics
    /// Panics if the value is currently mutably borrowed.
    pub fn get(&self) -> impl Deref<Target = T> + '_ {
        self.inner.borrow()
    }

    /// Get a mutable reference to the inner `T`.
    ///
    /// ## Panics
    /// Panics if the value is currently borrowed.
    pub fn get_mut(&self) -> impl DerefMut<Target = T> + '_ {
        self.inner.borrow_mut()
    }

    /// Whether both handles point at the same value.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Create a handle that does not keep the value alive.
    pub fn downgrade(&self) -> WeakShared<T> {
        WeakShared {
            inner: Rc::downgrade(&self.inner),
        }
    }
}

/// A non-owning handle to a [`Shared`] value.
pub struct WeakShared<T> {
    inner: Weak<RefCell<T>>,
}

impl<T> Clone for WeakShared<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Default for WeakShared<T> {
    fn default() -> Self {
        Self { inner: Weak::new() }
    }
}

impl<T> WeakShared<T> {
    /// Returns the shared value if it is still alive.
    pub fn upgrade(&self) -> Option<Shared<T>> {
        self.inner.upgrade().map(|inner| Shared { inner })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn weak_handle_does_not_keep_value_alive() {
        let shared = Shared::new(5u32);
        let weak = shared.downgrade();
        assert_eq!(*weak.upgrade().unwrap().get(), 5);
        drop(shared);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn clones_share_the_value() {
        let shared = Shared::new("a".to_owned());
        shared.clone().get_mut().push('b');
        assert_eq!(shared.get().as_str(), "ab");
        assert!(shared.ptr_eq(&shared.clone()));
        assert!(!shared.ptr_eq(&Shared::new("b".to_owned())));
    }
}

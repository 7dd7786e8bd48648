//! Event references
//!
//! The assembly engine never looks inside events; it only needs to clone,
//! compare and hash them. Any `E: Clone + Eq + Hash` works. [`EventRef`] is
//! the usual choice for real events: a shared pointer compared by identity,
//! so two distinct arrivals with equal payloads stay distinct join inputs.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::Arc;

/// Shared event reference with identity equality
pub struct EventRef<T>(Arc<T>);

impl<T> EventRef<T> {
    pub fn new(event: T) -> Self {
        Self(Arc::new(event))
    }

    /// Whether both references point at the same event
    #[inline]
    pub fn same(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn as_arc(&self) -> &Arc<T> {
        &self.0
    }
}

impl<T> From<Arc<T>> for EventRef<T> {
    fn from(event: Arc<T>) -> Self {
        Self(event)
    }
}

impl<T> Clone for EventRef<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T> PartialEq for EventRef<T> {
    fn eq(&self, other: &Self) -> bool {
        self.same(other)
    }
}

impl<T> Eq for EventRef<T> {}

impl<T> Hash for EventRef<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::ptr::hash(Arc::as_ptr(&self.0), state);
    }
}

impl<T> Deref for EventRef<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T: fmt::Debug> fmt::Debug for EventRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl<T: fmt::Display> fmt::Display for EventRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a [`Shared`] allocation.
///
/// Assigned once when the value is allocated and carried by every clone, so
/// the serializer can recognize a revisited object without comparing
/// addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(u64);

impl Handle {
    fn allocate() -> Self {
        Handle(NEXT_HANDLE.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A shared, mutable object with stable identity.
///
/// This is the only type whose identity survives a round trip: every clone
/// of a `Shared` is the same object, and the codec turns repeat visits into
/// references and references back into clones. Cycles built from `Shared`
/// values are not reclaimed automatically; break them by clearing the links
/// when the graph is torn down.
pub struct Shared<T> {
    inner: Arc<Slot<T>>,
}

struct Slot<T> {
    handle: Handle,
    value: RwLock<T>,
}

impl<T> Shared<T> {
    /// Allocates a new object with a fresh handle.
    pub fn new(value: T) -> Self {
        Shared {
            inner: Arc::new(Slot {
                handle: Handle::allocate(),
                value: RwLock::new(value),
            }),
        }
    }

    pub fn handle(&self) -> Handle {
        self.inner.handle
    }

    /// Locks the value for reading.
    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        self.inner.value.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Locks the value for writing.
    pub fn write(&self) -> RwLockWriteGuard<'_, T> {
        self.inner.value.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Swaps in a new value, returning the old one. All clones observe it.
    pub fn replace(&self, value: T) -> T {
        std::mem::replace(&mut *self.write(), value)
    }

    /// Returns true if both handles name the same object.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T> Clone for Shared<T> {
    fn clone(&self) -> Self {
        Shared {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Default> Default for Shared<T> {
    fn default() -> Self {
        Shared::new(T::default())
    }
}

// Only the handle: following the value could loop forever on a cycle.
impl<T> fmt::Debug for Shared<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Shared({})", self.inner.handle)
    }
}

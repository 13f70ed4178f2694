//! Shared, mutable heap cells with pointer identity

use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A heap cell shared between every value that references it.
///
/// Cloning a `Shared` clones the handle, not the contents, so two clones
/// are the same object for identity purposes.
pub struct Shared<T> {
    inner: Arc<RwLock<T>>,
}

impl<T> Shared<T> {
    /// Allocate a new cell.
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(RwLock::new(value)),
        }
    }

    /// Lock for reading.
    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        self.inner.read()
    }

    /// Lock for writing.
    pub fn write(&self) -> RwLockWriteGuard<'_, T> {
        self.inner.write()
    }

    /// Whether both handles point at the same cell.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Address of the cell, stable for as long as any handle is alive.
    pub fn identity(&self) -> usize {
        Arc::as_ptr(&self.inner) as *const () as usize
    }
}

impl<T> Clone for Shared<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Default> Default for Shared<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_identity() {
        let a = Shared::new(vec![1, 2]);
        let b = a.clone();
        assert!(a.ptr_eq(&b));
        assert_eq!(a.identity(), b.identity());

        b.write().push(3);
        assert_eq!(a.read().len(), 3);
    }

    #[test]
    fn test_distinct_cells_differ() {
        let a = Shared::new(1);
        let b = Shared::new(1);
        assert!(!a.ptr_eq(&b));
        assert_ne!(a.identity(), b.identity());
    }
}

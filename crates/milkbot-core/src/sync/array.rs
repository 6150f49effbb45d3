//! Thread-safe ordered sequence of comparable elements.
//!
//! Backs the per-route filter chains. Duplicates are allowed by `append`;
//! `add_if_not_exists` gives set-like registration on top. Iteration walks a
//! copy taken under the read lock, so visitors may mutate the array freely.

use std::fmt;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use thiserror::Error;

/// An index fell outside the valid range for the operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("index {index} out of range for length {len}")]
pub struct IndexOutOfRange {
    pub index: usize,
    pub len: usize,
}

/// Ordered, lock-protected `Vec<T>`.
pub struct ConcurrentArray<T> {
    data: RwLock<Vec<T>>,
}

impl<T> ConcurrentArray<T>
where
    T: PartialEq + Clone,
{
    pub fn new() -> Self {
        Self {
            data: RwLock::new(Vec::new()),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: RwLock::new(Vec::with_capacity(capacity)),
        }
    }

    // A panic in another holder cannot leave the Vec half-edited, so a
    // poisoned lock is still safe to use.
    fn read(&self) -> RwLockReadGuard<'_, Vec<T>> {
        self.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<T>> {
        self.data.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.read().capacity()
    }

    pub fn get(&self, index: usize) -> Result<T, IndexOutOfRange> {
        let data = self.read();
        data.get(index).cloned().ok_or(IndexOutOfRange {
            index,
            len: data.len(),
        })
    }

    pub fn set(&self, index: usize, value: T) -> Result<(), IndexOutOfRange> {
        let mut data = self.write();
        let len = data.len();
        match data.get_mut(index) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(IndexOutOfRange { index, len }),
        }
    }

    /// Append every value, in order, at the end.
    pub fn append(&self, values: impl IntoIterator<Item = T>) {
        self.write().extend(values);
    }

    /// Append `value` unless an equal element is already present.
    ///
    /// Returns `true` if the value was added.
    pub fn add_if_not_exists(&self, value: T) -> bool {
        let mut data = self.write();
        if data.contains(&value) {
            return false;
        }
        data.push(value);
        true
    }

    /// Insert at `index`, shifting later elements right. `index == len`
    /// appends.
    pub fn insert(&self, index: usize, value: T) -> Result<(), IndexOutOfRange> {
        let mut data = self.write();
        if index > data.len() {
            return Err(IndexOutOfRange {
                index,
                len: data.len(),
            });
        }
        data.insert(index, value);
        Ok(())
    }

    /// Remove and return the element at `index`.
    pub fn delete(&self, index: usize) -> Result<T, IndexOutOfRange> {
        let mut data = self.write();
        if index >= data.len() {
            return Err(IndexOutOfRange {
                index,
                len: data.len(),
            });
        }
        Ok(data.remove(index))
    }

    /// Remove the first element equal to `value`. Returns whether one was found.
    pub fn delete_by_value(&self, value: &T) -> bool {
        let mut data = self.write();
        match data.iter().position(|item| item == value) {
            Some(index) => {
                data.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, value: &T) -> bool {
        self.read().contains(value)
    }

    /// Position of the first element equal to `value`.
    pub fn index_of(&self, value: &T) -> Option<usize> {
        self.read().iter().position(|item| item == value)
    }

    /// Replace every element equal to `old` with a clone of `new`.
    ///
    /// Returns the number of replacements.
    pub fn replace(&self, old: &T, new: T) -> usize {
        let mut data = self.write();
        let mut count = 0;
        for item in data.iter_mut().filter(|item| **item == *old) {
            *item = new.clone();
            count += 1;
        }
        count
    }

    /// Visit elements in order until `visit` returns `false`.
    pub fn range(&self, mut visit: impl FnMut(usize, &T) -> bool) {
        let snapshot = self.slice();
        for (index, value) in snapshot.iter().enumerate() {
            if !visit(index, value) {
                break;
            }
        }
    }

    /// Copy of the current contents.
    pub fn slice(&self) -> Vec<T> {
        self.read().clone()
    }

    /// Remove every element, keeping the allocation.
    pub fn clear(&self) {
        self.write().clear();
    }
}

impl<T> Default for ConcurrentArray<T>
where
    T: PartialEq + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for ConcurrentArray<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let len = self
            .data
            .read()
            .map(|data| data.len())
            .unwrap_or_else(|poisoned| poisoned.into_inner().len());
        f.debug_struct("ConcurrentArray").field("len", &len).finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

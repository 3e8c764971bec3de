//! Thin helpers pairing allocation with in-place construction. These sit
//! outside the pool's core contract — a caller is free to call
//! `pool.allocate()` and write the value itself — but any real user of
//! `Pool` is expected to reach for these instead.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;

use pool_core::PoolError;

use crate::pool::Pool;

/// Either the pool failed to produce a slot, or the caller's own
/// constructor did. `E` is whatever error type the constructor returns;
/// `thiserror` can't derive a blanket bound for an open `E`, so this one is
/// hand-written.
#[derive(Debug)]
pub enum ObjectError<E> {
    Allocation(PoolError),
    Construction(E),
}

impl<E: fmt::Display> fmt::Display for ObjectError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectError::Allocation(e) => write!(f, "{e}"),
            ObjectError::Construction(e) => write!(f, "object construction failed: {e}"),
        }
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for ObjectError<E> {}

impl<E> From<PoolError> for ObjectError<E> {
    fn from(e: PoolError) -> Self {
        ObjectError::Allocation(e)
    }
}

/// Allocate a slot from `pool` and construct `T` in place via `ctor`. If
/// `ctor` fails, the slot is returned to the free list before the error is
/// re-raised — the pool is left exactly as if `allocate` had never been
/// called for it.
pub fn new_object<T, E, const B: usize>(
    pool: &mut Pool<T, B>,
    ctor: impl FnOnce() -> Result<T, E>,
) -> Result<NonNull<T>, ObjectError<E>> {
    let slot = pool.allocate()?;
    match ctor() {
        Ok(value) => {
            // SAFETY: `slot` was just allocated, uninitialized, and sized
            // and aligned for `T`.
            unsafe { slot.as_ptr().write(value) };
            Ok(slot)
        }
        Err(e) => {
            pool.deallocate(slot);
            Err(ObjectError::Construction(e))
        }
    }
}

/// Destroy the value at `slot` and return the slot to `pool`.
///
/// # Safety
/// `slot` must have come from a live `new_object`/`make_unique` call on this
/// pool (or have been imported from a pool that allocated it), and must not
/// already have been destroyed or deallocated.
pub unsafe fn delete_object<T, const B: usize>(pool: &mut Pool<T, B>, slot: NonNull<T>) {
    std::ptr::drop_in_place(slot.as_ptr());
    pool.deallocate(slot);
}

/// An RAII handle over a pool-allocated, already-constructed `T`: dropping
/// the handle destroys the value and returns its slot to the pool it came
/// from. The idiomatic Rust rendition of "a unique pointer with a deleter
/// that captures the pool" — a `Box` that happens to be backed by a pool
/// slot instead of the global allocator.
pub struct PoolBox<'p, T, const B: usize> {
    slot: NonNull<T>,
    pool: &'p mut Pool<T, B>,
}

impl<'p, T, const B: usize> PoolBox<'p, T, B> {
    fn new<E>(pool: &'p mut Pool<T, B>, ctor: impl FnOnce() -> Result<T, E>) -> Result<Self, ObjectError<E>> {
        let slot = pool.allocate()?;
        match ctor() {
            Ok(value) => {
                // SAFETY: see `new_object`.
                unsafe { slot.as_ptr().write(value) };
                Ok(Self { slot, pool })
            }
            Err(e) => {
                pool.deallocate(slot);
                Err(ObjectError::Construction(e))
            }
        }
    }
}

impl<T, const B: usize> Deref for PoolBox<'_, T, B> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: the slot was constructed in `PoolBox::new` and is only
        // ever destroyed in `Drop`, which consumes `self`.
        unsafe { self.slot.as_ref() }
    }
}

impl<T, const B: usize> DerefMut for PoolBox<'_, T, B> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: see `Deref::deref`.
        unsafe { self.slot.as_mut() }
    }
}

impl<T, const B: usize> Drop for PoolBox<'_, T, B> {
    fn drop(&mut self) {
        // SAFETY: `self.slot` is live and owned solely by this handle.
        unsafe { delete_object(self.pool, self.slot) }
    }
}

/// Allocate from `pool`, construct `T` in place via `ctor`, and wrap the
/// result in a [`PoolBox`] that destroys the value and frees the slot when
/// dropped.
pub fn make_unique<'p, T, E, const B: usize>(
    pool: &'p mut Pool<T, B>,
    ctor: impl FnOnce() -> Result<T, E>,
) -> Result<PoolBox<'p, T, B>, ObjectError<E>> {
    PoolBox::new(pool, ctor)
}

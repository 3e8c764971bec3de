//! Block ledger — owns the blocks a pool has acquired from the system
//! allocator and is responsible for releasing every one of them exactly
//! once, whether at pool destruction or via [`BlockLedger::drain`] during a
//! `transfer_all`.

use std::alloc::{self, Layout};
use std::marker::PhantomData;
use std::mem;
use std::ptr::NonNull;

/// One contiguous, `B`-byte region acquired from the system allocator and
/// aligned to at least `align_of::<T>()`. Owns that memory: dropping a
/// `Block` releases it.
pub(crate) struct Block<T> {
    ptr: NonNull<u8>,
    layout: Layout,
    _marker: PhantomData<T>,
}

impl<T> Block<T> {
    fn acquire(size: usize) -> Option<Self> {
        let layout = Layout::from_size_align(size, mem::align_of::<T>())
            .expect("block size/alignment overflow a Layout");
        // SAFETY: `layout` has nonzero size — `Pool` only ever calls this
        // with SLOTS_PER_BLOCK >= 1, so `size` is at least `size_of::<T>()`.
        let raw = unsafe { alloc::alloc(layout) };
        let ptr = NonNull::new(raw)?;
        Some(Self { ptr, layout, _marker: PhantomData })
    }

    /// The first slot of this block, i.e. where the bump cursor should start.
    pub(crate) fn start(&self) -> NonNull<T> {
        self.ptr.cast()
    }
}

impl<T> Drop for Block<T> {
    fn drop(&mut self) {
        // SAFETY: `self.ptr`/`self.layout` are exactly what `alloc::alloc`
        // was called with in `acquire`, and this runs at most once per block.
        unsafe { alloc::dealloc(self.ptr.as_ptr(), self.layout) }
    }
}

/// The ordered list of blocks a pool owns. The last entry is the current
/// block; every earlier entry is fully carved — only the current block may
/// have nonzero uncarved slots.
pub(crate) struct BlockLedger<T> {
    blocks: Vec<Block<T>>,
}

impl<T> Default for BlockLedger<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> BlockLedger<T> {
    pub(crate) fn new() -> Self {
        Self { blocks: Vec::new() }
    }

    /// Acquire a fresh `size`-byte block from the system allocator and
    /// append it as the new current block. Returns `None` on allocator
    /// failure without mutating `self`.
    pub(crate) fn acquire(&mut self, size: usize) -> Option<NonNull<T>> {
        let block = Block::acquire(size)?;
        let start = block.start();
        self.blocks.push(block);
        Some(start)
    }

    pub(crate) fn len(&self) -> usize {
        self.blocks.len()
    }

    /// `len() · block_size`, where `block_size` is the per-block byte count
    /// every block in this ledger was acquired with.
    pub(crate) fn bytes(&self, block_size: usize) -> usize {
        self.blocks.len() * block_size
    }

    /// Remove and return every block, leaving the ledger empty.
    pub(crate) fn drain(&mut self) -> Vec<Block<T>> {
        mem::take(&mut self.blocks)
    }

    /// Append ownership of every block in `other`.
    pub(crate) fn absorb(&mut self, mut other: Vec<Block<T>>) {
        self.blocks.append(&mut other);
    }
}

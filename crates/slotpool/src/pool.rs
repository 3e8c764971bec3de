//! The object pool itself: routes `allocate`/`deallocate` through the
//! free-list and bump tiers, owns the block ledger, and implements the
//! transfer protocol that moves free slots — and, for `transfer_all`, block
//! ownership — between two pools of the same `(T, B)`.

use std::mem;
use std::ptr::NonNull;

use pool_core::PoolError;

use crate::block::{Block, BlockLedger};
use crate::bump::BumpTier;
use crate::free_list::FreeListTier;

/// A fixed-size object pool for `T`, carving `B`-byte blocks into
/// `B / size_of::<T>()` slots each.
///
/// Allocation consults the free list, then the bump cursor, then acquires a
/// new block; deallocation always pushes onto the free list. A pool is
/// single-writer: no method here synchronizes, blocks, or touches an atomic.
/// Two pools of the same `(T, B)` cooperate across that boundary by handing
/// each other free slots ([`Pool::transfer_free`]) or whole blocks
/// ([`Pool::transfer_all`]), never by sharing one pool concurrently.
pub struct Pool<T, const B: usize> {
    blocks: BlockLedger<T>,
    bump: BumpTier<T>,
    free: FreeListTier<T>,
    #[cfg(feature = "tracking")]
    blocks_acquired_total: usize,
    #[cfg(feature = "tracking")]
    transfers_total: usize,
}

// SAFETY: a `Pool` exclusively owns every block and slot pointer it holds.
// Moving the whole pool to another thread is sound as long as `T` itself may
// cross threads; the pool is never *shared* across threads (no `Sync` impl),
// matching its single-writer contract (see module docs).
unsafe impl<T: Send, const B: usize> Send for Pool<T, B> {}

impl<T, const B: usize> Pool<T, B> {
    const SLOT_SIZE: usize = mem::size_of::<T>();

    /// Slots carved from each `B`-byte block.
    pub const SLOTS_PER_BLOCK: usize = B / Self::SLOT_SIZE;

    const _ASSERT_SLOTS_PER_BLOCK_NONZERO: () = assert!(
        Self::SLOTS_PER_BLOCK >= 1,
        "slotpool: block size B cannot hold a single slot of T",
    );

    /// Create an empty pool. No memory is acquired until the first
    /// `allocate`.
    pub fn new() -> Self {
        // Forces the const assert above to evaluate for this `(T, B)`.
        let () = Self::_ASSERT_SLOTS_PER_BLOCK_NONZERO;
        Self {
            blocks: BlockLedger::new(),
            bump: BumpTier::empty(),
            free: FreeListTier::new(),
            #[cfg(feature = "tracking")]
            blocks_acquired_total: 0,
            #[cfg(feature = "tracking")]
            transfers_total: 0,
        }
    }

    /// Return a pointer to an uninitialized, properly aligned slot for one
    /// `T`. Selection order: free list, then bump tier, then a freshly
    /// acquired block. Never returns a null-equivalent pointer on success;
    /// fails only if the system allocator cannot satisfy a new block, in
    /// which case no pool state is mutated.
    pub fn allocate(&mut self) -> Result<NonNull<T>, PoolError> {
        if let Some(p) = self.free.pop() {
            return Ok(p);
        }
        if let Some(p) = self.bump.allocate_one() {
            return Ok(p);
        }

        let layout = std::alloc::Layout::from_size_align(B, mem::align_of::<T>())
            .expect("slotpool: block size/alignment overflow a Layout");
        let start = self.blocks.acquire(B).ok_or_else(|| {
            log::debug!("slotpool: system allocator failed for a {}-byte block", B);
            PoolError::AllocationFailure { layout }
        })?;
        log::trace!(
            "slotpool: acquired block #{} ({} bytes, {} slots)",
            self.blocks.len(),
            B,
            Self::SLOTS_PER_BLOCK
        );
        #[cfg(feature = "tracking")]
        {
            self.blocks_acquired_total += 1;
        }
        self.bump.init(start, Self::SLOTS_PER_BLOCK);

        // SAFETY: `SLOTS_PER_BLOCK >= 1` is enforced at construction, so a
        // freshly initialized cursor always has at least one slot to hand out.
        Ok(self
            .bump
            .allocate_one()
            .expect("slotpool: freshly initialized block must hold at least one slot"))
    }

    /// Return `slot` to the free list. `slot` must have come from `allocate`
    /// on this pool, or have been imported via the transfer protocol from a
    /// pool that originally allocated it; passing any other pointer is
    /// undefined behavior at the contract level (not checked here).
    pub fn deallocate(&mut self, slot: NonNull<T>) {
        self.free.push(slot);
    }

    /// `|Blocks| · B`.
    pub fn allocated_bytes(&self) -> usize {
        self.blocks.bytes(B)
    }

    /// `|Free|`.
    pub fn num_slots_available(&self) -> usize {
        self.free.len()
    }

    /// The current block's bump remainder, or 0 if the pool owns no blocks.
    pub fn num_bump_available(&self) -> usize {
        self.bump.remaining()
    }

    /// Lifetime count of blocks acquired from the system allocator. Only
    /// present with the `tracking` feature.
    #[cfg(feature = "tracking")]
    pub fn blocks_acquired_total(&self) -> usize {
        self.blocks_acquired_total
    }

    /// Lifetime count of `transfer_free`/`transfer_all` calls this pool has
    /// taken part in, as either side. Only present with the `tracking`
    /// feature.
    #[cfg(feature = "tracking")]
    pub fn transfers_total(&self) -> usize {
        self.transfers_total
    }

    /// Move every free slot from `src` onto `dst`; block ownership stays
    /// with `src`. The caller must keep `src` alive for as long as `dst` may
    /// still hand out one of the transferred pointers — those pointers
    /// address memory `src` owns.
    ///
    /// # Panics
    /// Panics if `dst` and `src` are the same pool.
    pub fn transfer_free(dst: &mut Self, src: &mut Self) {
        assert!(!std::ptr::eq(dst, src), "slotpool: transfer_free requires distinct pools");
        let record = src.export_free();
        dst.import(record);
    }

    /// Move both free slots and block ownership from `src` to `dst`,
    /// reducing `src` to its initial (empty) state. `src` must hold no live
    /// allocations: any pointer still checked out of `src` when this is
    /// called is left dangling once its block moves to `dst`.
    ///
    /// # Panics
    /// Panics if `dst` and `src` are the same pool.
    pub fn transfer_all(dst: &mut Self, src: &mut Self) {
        assert!(!std::ptr::eq(dst, src), "slotpool: transfer_all requires distinct pools");
        let record = src.export_all();
        dst.import(record);
    }

    /// Half of the transfer protocol: produce a record carrying only this
    /// pool's free slots. `self` keeps its blocks and bump cursor untouched.
    pub fn export_free(&mut self) -> ExportRecord<T> {
        #[cfg(feature = "tracking")]
        {
            self.transfers_total += 1;
        }
        ExportRecord { free_slots: self.free.drain(), blocks: Vec::new() }
    }

    /// Half of the transfer protocol: produce a record carrying this pool's
    /// free slots, its bump remainder (converted to free slots — the
    /// destination may already be bump-carving a different block, so it
    /// cannot simultaneously carve this one), and every block it owns.
    /// `self` is left in its initial state.
    pub fn export_all(&mut self) -> ExportRecord<T> {
        self.bump.drain_into(&mut self.free);
        #[cfg(feature = "tracking")]
        {
            self.transfers_total += 1;
        }
        ExportRecord { free_slots: self.free.drain(), blocks: self.blocks.drain() }
    }

    /// Half of the transfer protocol: absorb a record into this pool. Always
    /// additive — free slots and blocks are appended, never replacing what
    /// this pool already holds — and never touches this pool's own bump
    /// cursor or the system allocator.
    pub fn import(&mut self, record: ExportRecord<T>) {
        #[cfg(feature = "tracking")]
        {
            self.transfers_total += 1;
        }
        self.free.absorb(record.free_slots);
        self.blocks.absorb(record.blocks);
    }
}

impl<T, const B: usize> Default for Pool<T, B> {
    fn default() -> Self {
        Self::new()
    }
}

/// The export record produced by [`Pool::export_free`]/[`Pool::export_all`]
/// and consumed by [`Pool::import`]. Carries free slot pointers and, for
/// `export_all`, ownership of the exported blocks — letting the protocol be
/// carried across a thread boundary or buffered between the two halves.
pub struct ExportRecord<T> {
    free_slots: Vec<NonNull<T>>,
    blocks: Vec<Block<T>>,
}

// SAFETY: an `ExportRecord` exclusively owns every slot pointer and block it
// carries (the pool that produced it gave them up in `export_free`/
// `export_all`), so moving one to another thread is sound under the same
// reasoning as `Pool`'s own `Send` impl above.
unsafe impl<T: Send> Send for ExportRecord<T> {}

#[cfg(test)]
mod tests {
    use super::*;

    type IntPool = Pool<i32, 64>;

    #[test]
    fn s1_initial_state() {
        let pool = IntPool::new();
        assert_eq!(pool.allocated_bytes(), 0);
        assert_eq!(pool.num_slots_available(), 0);
        assert_eq!(pool.num_bump_available(), 0);
    }

    #[test]
    fn s2_single_alloc_and_dealloc() {
        let mut pool = IntPool::new();
        let p = pool.allocate().unwrap();
        assert_eq!((pool.allocated_bytes(), pool.num_slots_available(), pool.num_bump_available()), (64, 0, 15));

        pool.deallocate(p);
        assert_eq!((pool.allocated_bytes(), pool.num_slots_available(), pool.num_bump_available()), (64, 1, 15));
    }

    #[test]
    fn s3_fill_two_blocks() {
        let mut pool = IntPool::new();
        for _ in 0..17 {
            pool.allocate().unwrap();
        }
        assert_eq!((pool.allocated_bytes(), pool.num_slots_available(), pool.num_bump_available()), (128, 0, 15));
    }

    #[test]
    fn s4_transfer_free() {
        let mut a = IntPool::new();
        let mut ps = Vec::new();
        for _ in 0..50 {
            ps.push(a.allocate().unwrap());
        }
        for p in ps.drain(0..20) {
            a.deallocate(p);
        }
        assert_eq!((a.allocated_bytes(), a.num_slots_available(), a.num_bump_available()), (256, 20, 14));

        let mut b = IntPool::new();
        Pool::transfer_free(&mut b, &mut a);

        assert_eq!((a.allocated_bytes(), a.num_slots_available(), a.num_bump_available()), (256, 0, 14));
        assert_eq!((b.allocated_bytes(), b.num_slots_available(), b.num_bump_available()), (0, 20, 0));

        let before = b.allocated_bytes();
        for _ in 0..20 {
            b.allocate().unwrap();
        }
        assert_eq!(b.allocated_bytes(), before);
    }

    #[test]
    fn s5_transfer_all_after_full_drain() {
        let mut a = IntPool::new();
        let mut ps = Vec::new();
        for _ in 0..100 {
            ps.push(a.allocate().unwrap());
        }
        for p in ps {
            a.deallocate(p);
        }
        assert_eq!((a.allocated_bytes(), a.num_slots_available(), a.num_bump_available()), (448, 100, 12));

        let mut b = IntPool::new();
        Pool::transfer_all(&mut b, &mut a);

        assert_eq!((a.allocated_bytes(), a.num_slots_available(), a.num_bump_available()), (0, 0, 0));
        assert_eq!((b.allocated_bytes(), b.num_slots_available(), b.num_bump_available()), (448, 112, 0));

        for _ in 0..112 {
            b.allocate().unwrap();
        }
        let before = b.allocated_bytes();
        b.allocate().unwrap();
        assert!(b.allocated_bytes() > before);
    }

    #[test]
    fn i5_distinct_allocations_are_distinct_pointers() {
        let mut pool = IntPool::new();
        let a = pool.allocate().unwrap();
        let b = pool.allocate().unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn i6_balanced_alloc_dealloc_never_releases_a_block() {
        let mut pool = IntPool::new();
        // First allocate/deallocate pair acquires the pool's only block;
        // every later pair reuses that same free slot, so no further block
        // is ever acquired.
        for _ in 0..1000 {
            let p = pool.allocate().unwrap();
            pool.deallocate(p);
        }
        assert_eq!(pool.allocated_bytes(), 64);
    }

    #[test]
    fn transfer_all_preserves_total_live_plus_available_accounting() {
        // Mirrors I4: |Blocks|*S == live + available + bump, checked across
        // a transfer_all instead of within a single pool.
        let mut a = IntPool::new();
        let mut live = Vec::new();
        for _ in 0..40 {
            live.push(a.allocate().unwrap());
        }
        for p in live.drain(0..10) {
            a.deallocate(p);
        }
        let slot_size = std::mem::size_of::<i32>();
        let total_slots_a = a.allocated_bytes() / slot_size;
        let live_a = total_slots_a - a.num_slots_available() - a.num_bump_available();

        let mut b = IntPool::new();
        Pool::transfer_all(&mut b, &mut a);

        // a is fully reset; b now owns every block a had.
        assert_eq!((a.allocated_bytes(), a.num_slots_available(), a.num_bump_available()), (0, 0, 0));
        let total_slots_b = b.allocated_bytes() / slot_size;
        // the 30 still-live slots from `a` aren't tracked by either pool
        // (the user holds those pointers), so b's accounting only has to
        // reconcile free + bump against the blocks it now owns.
        assert_eq!(total_slots_b - b.num_slots_available() - b.num_bump_available(), live_a);
    }

    #[test]
    fn s6_randomized_model_equivalence() {
        // Fixed xorshift32 seed: a reproducible mixed sequence of
        // allocate/deallocate/transfer_free/transfer_all checked against a
        // reference model tracking (blocks, free, bump) in lockstep.
        struct Xorshift32(u32);
        impl Xorshift32 {
            fn next(&mut self) -> u32 {
                let mut x = self.0;
                x ^= x << 13;
                x ^= x >> 17;
                x ^= x << 5;
                self.0 = x;
                x
            }
            fn below(&mut self, n: u32) -> u32 {
                self.next() % n
            }
        }

        #[derive(Clone, Copy, Default)]
        struct Model {
            blocks: usize,
            free: usize,
            bump: usize,
        }

        const S: usize = IntPool::SLOTS_PER_BLOCK;

        fn model_allocate(m: &mut Model) {
            if m.free > 0 {
                m.free -= 1;
            } else if m.bump > 0 {
                m.bump -= 1;
            } else {
                m.blocks += 1;
                m.bump = S - 1;
            }
        }

        fn model_deallocate(m: &mut Model) {
            m.free += 1;
        }

        fn model_transfer_free(dst: &mut Model, src: &mut Model) {
            dst.free += src.free;
            src.free = 0;
        }

        fn model_transfer_all(dst: &mut Model, src: &mut Model) {
            dst.blocks += src.blocks;
            dst.free += src.free + src.bump;
            *src = Model::default();
        }

        fn triple<T, const B: usize>(p: &Pool<T, B>) -> (usize, usize, usize) {
            (p.allocated_bytes() / B, p.num_slots_available(), p.num_bump_available())
        }

        fn model_triple(m: &Model) -> (usize, usize, usize) {
            (m.blocks, m.free, m.bump)
        }

        let mut rng = Xorshift32(0xC0FFEE);
        let mut a = IntPool::new();
        let mut b = IntPool::new();
        let mut ma = Model::default();
        let mut mb = Model::default();
        let mut live_a: Vec<NonNull<i32>> = Vec::new();
        let mut live_b: Vec<NonNull<i32>> = Vec::new();

        for _ in 0..2000 {
            match rng.below(4) {
                0 => {
                    let p = a.allocate().unwrap();
                    live_a.push(p);
                    model_allocate(&mut ma);
                }
                1 => {
                    if let Some(p) = live_a.pop() {
                        a.deallocate(p);
                        model_deallocate(&mut ma);
                    }
                }
                2 => {
                    Pool::transfer_free(&mut b, &mut a);
                    model_transfer_free(&mut mb, &mut ma);
                }
                3 => {
                    // transfer_all only when `a` has no live allocations
                    if live_a.is_empty() {
                        Pool::transfer_all(&mut b, &mut a);
                        model_transfer_all(&mut mb, &mut ma);
                    }
                }
                _ => unreachable!(),
            }
            assert_eq!(triple(&a), model_triple(&ma));
            assert_eq!(triple(&b), model_triple(&mb));

            // keep the other pool exercised too, symmetric to `a`'s pattern
            match rng.below(4) {
                0 => {
                    let p = b.allocate().unwrap();
                    live_b.push(p);
                    model_allocate(&mut mb);
                }
                1 => {
                    if let Some(p) = live_b.pop() {
                        b.deallocate(p);
                        model_deallocate(&mut mb);
                    }
                }
                _ => {}
            }
            assert_eq!(triple(&b), model_triple(&mb));
        }
    }
}

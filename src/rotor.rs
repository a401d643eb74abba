use std::marker::PhantomData;
use std::ptr::{self, NonNull};

use crate::alloc::{alloc_array, alloc_array_or_abort, dealloc_array};
use crate::invariants::{
    debug_assert_mirror_prefix, debug_assert_occupancy, debug_assert_pow2_capacity,
    debug_assert_rotation_ready,
};
use crate::HatError;

// =============================================================================
// DIRECTORY ROTOR & PRELOADING PROTOCOL
// =============================================================================
//
// Sub-block pointers live in three parallel directories of staggered
// capacity:
//
//   l (lower)   capacity max(1, m_cap / 2)   occupancy l_len
//   m (middle)  capacity m_cap               occupancy m_len
//   h (higher)  capacity 2 * m_cap           occupancy h_len
//
// Only `m` is consulted for element access. `l` and `h` hold *mirrors* of
// its leading entries so that when `m` fills (or drains to half), the
// neighbouring directory can simply be promoted in its place - a rotation
// moves three pointers and copies no entries.
//
// ## Preloading budget
//
// Between growth rotations the middle directory accepts `m_cap / 2` new
// sub-blocks while `h` must go from empty to `m_cap` mirrored entries, so
// each new block owes exactly two mirror copies. The same count holds on
// the shrink side: `m_cap / 2` retirements must refill a fresh `l` of
// `m_cap / 2` entries (the refill starts on the rotating pop itself, which
// is what makes the budget work at the smallest capacities). `preload_up`
// and `preload_down` therefore copy at most two entries each.
//
// ## Ownership
//
// The sub-blocks reachable from `m[0..m_len]` are owned through `m`; the
// copies in `l` and `h` are non-owning mirrors. When a rotation promotes
// `l` or `h` into the middle slot, ownership of the entries travels with
// it. Teardown consequently frees each sub-block exactly once, via `m`,
// and then the three directories.
//
// ## Staleness
//
// Mirror entries at indices >= m_len can refer to retired (freed) blocks.
// They are never read: h_len and l_len never exceed m_len (retirement
// clamps h_len; shrink rotation adopts the live count). A violation here
// is how a dangling pointer would get promoted into `m`.
//
// =============================================================================

/// Pointer to a sub-block's element storage.
type BlockPtr<T> = NonNull<T>;

/// The three-directory rotor.
///
/// Knows nothing about element count or block sizes - callers decide when
/// a block is needed or empty and how large it is. The rotor's job is to
/// keep the directory triple coherent under `push_block`/`retire_block`
/// while never moving more than two entries per call.
pub(crate) struct Rotor<T> {
    /// Middle directory; owns every live sub-block. Null once torn down.
    m: *mut BlockPtr<T>,
    m_cap: usize,
    m_len: usize,
    /// Higher directory; mirrors `m[..h_len]` ahead of the next growth
    /// rotation.
    h: *mut BlockPtr<T>,
    h_len: usize,
    /// Lower directory; mirrors `m[..l_len]` ahead of the next shrink
    /// rotation.
    l: *mut BlockPtr<T>,
    l_len: usize,
    /// The rotor owns the sub-blocks' storage (though not their element
    /// lifecycle, which the container drives).
    _owns: PhantomData<T>,
}

impl<T> Rotor<T> {
    /// Creates the minimum geometry: `l` of 1, `m` of 1, `h` of 2 entries,
    /// all empty. These few pointers are the only allocation a fresh
    /// container performs, so the first append never pays for a directory.
    pub(crate) fn new() -> Self {
        Self {
            m: alloc_array_or_abort::<BlockPtr<T>>(1).as_ptr(),
            m_cap: 1,
            m_len: 0,
            h: alloc_array_or_abort::<BlockPtr<T>>(2).as_ptr(),
            h_len: 0,
            l: alloc_array_or_abort::<BlockPtr<T>>(1).as_ptr(),
            l_len: 0,
            _owns: PhantomData,
        }
    }

    #[inline]
    fn l_cap(&self) -> usize {
        (self.m_cap / 2).max(1)
    }

    #[inline]
    fn h_cap(&self) -> usize {
        self.m_cap * 2
    }

    /// Number of live sub-blocks.
    #[inline]
    pub(crate) fn block_count(&self) -> usize {
        self.m_len
    }

    /// Middle-directory capacity.
    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.m_cap
    }

    #[inline]
    pub(crate) fn is_torn_down(&self) -> bool {
        self.m.is_null()
    }

    /// Pointer to sub-block `bi`.
    #[inline]
    pub(crate) fn block(&self, bi: usize) -> NonNull<T> {
        debug_assert!(bi < self.m_len, "block {} of {} requested", bi, self.m_len);
        // SAFETY: entries below m_len are initialized and live.
        unsafe { *self.m.add(bi) }
    }

    /// Allocates a sub-block of `size` slots and appends its pointer to
    /// the middle directory, rotating upward first if `m` is full.
    ///
    /// Every allocation happens before any rotor state changes, so a
    /// failure leaves the rotor (and the container) untouched.
    pub(crate) fn push_block(&mut self, size: usize) -> Result<(), HatError> {
        if self.m.is_null() {
            // First block after an explicit teardown: re-bootstrap the
            // minimum geometry.
            *self = Self::new();
        }
        let block = alloc_array::<T>(size)?;
        if self.m_len == self.m_cap {
            if let Err(err) = self.rotate_up() {
                // SAFETY: freshly allocated above, never published.
                unsafe { dealloc_array(block, size) };
                return Err(err);
            }
        }
        // SAFETY: after the rotation check, m_len < m_cap.
        unsafe { self.m.add(self.m_len).write(block) };
        self.m_len += 1;
        self.preload_up();
        debug_assert_occupancy!("middle", self.m_len, self.m_cap);
        debug_assert_mirror_prefix!("higher", self.h_len, self.m_len);
        Ok(())
    }

    /// Retires the trailing sub-block, whose `size` slots must already be
    /// dead, rotating downward when the middle directory falls to half
    /// capacity. Infallible except for the shrink rotation's replacement
    /// `l`, which is allocated before anything is released.
    pub(crate) fn retire_block(&mut self, size: usize) -> Result<(), HatError> {
        debug_assert!(self.m_len >= 2, "retiring with no spare block");
        // The popped element lives in the block below the retired one, so
        // the occupied prefix after this call is m_len - 2 blocks plus the
        // one being popped from.
        let rotate = self.m_len - 2 < self.m_cap / 2;
        let new_l = if rotate {
            Some(alloc_array::<BlockPtr<T>>((self.m_cap / 4).max(1))?)
        } else {
            None
        };

        // SAFETY: the block is owned by `m` and its slots are dead.
        unsafe { dealloc_array(*self.m.add(self.m_len - 1), size) };

        if let Some(new_l) = new_l {
            // Demote `m` to the higher directory, promote `l`. The shrink
            // mirror makes the demoted array a valid prefix mirror of the
            // promoted one, and the adopted occupancy is the *live* block
            // count - the demoted array's trailing entry now dangles and
            // must never be counted.
            debug_assert_rotation_ready!("shrink", self.l_len, self.m_cap / 2);
            // SAFETY: `h` holds only mirrors; the blocks stay owned by the
            // directory about to become `m`.
            unsafe { dealloc_array(NonNull::new_unchecked(self.h), self.h_cap()) };
            self.h = self.m;
            self.m = self.l;
            self.m_len = self.l_len;
            self.h_len = self.l_len;
            self.m_cap /= 2;
            self.l = new_l.as_ptr();
            self.l_len = 0;
        } else {
            self.m_len -= 1;
            // A future append re-allocates this block index; a mirror
            // reaching past m_len would promote the stale pointer.
            if self.h_len > self.m_len {
                self.h_len = self.m_len;
            }
        }
        self.preload_down();
        debug_assert_mirror_prefix!("higher", self.h_len, self.m_len);
        debug_assert_mirror_prefix!("lower", self.l_len, self.m_len);
        debug_assert_occupancy!("lower", self.l_len, self.l_cap());
        Ok(())
    }

    /// Promotes `h` over a full middle directory.
    fn rotate_up(&mut self) -> Result<(), HatError> {
        debug_assert_rotation_ready!("growth", self.h_len, self.m_len);
        let new_h = alloc_array::<BlockPtr<T>>(self.m_cap * 4)?;
        let old_l_cap = self.l_cap();
        // SAFETY: `l` holds only mirrors of entries owned through `m`.
        unsafe { dealloc_array(NonNull::new_unchecked(self.l), old_l_cap) };
        self.l = self.m;
        self.l_len = self.m_len;
        self.m = self.h;
        self.m_cap *= 2;
        self.h = new_h.as_ptr();
        self.h_len = 0;
        debug_assert_pow2_capacity!(self.m_cap);
        Ok(())
    }

    /// Mirrors up to two entries into the higher directory.
    #[inline]
    fn preload_up(&mut self) {
        for _ in 0..2 {
            if self.h_len >= self.m_len {
                break;
            }
            // SAFETY: h_len < m_len <= m_cap < h capacity; the source
            // entry is initialized.
            unsafe { self.h.add(self.h_len).write(*self.m.add(self.h_len)) };
            self.h_len += 1;
        }
    }

    /// Mirrors up to two entries into the lower directory.
    #[inline]
    fn preload_down(&mut self) {
        let l_cap = self.l_cap();
        for _ in 0..2 {
            if self.l_len >= l_cap || self.l_len >= self.m_len {
                break;
            }
            // SAFETY: both bounds checked above; the source entry is
            // initialized.
            unsafe { self.l.add(self.l_len).write(*self.m.add(self.l_len)) };
            self.l_len += 1;
        }
    }

    /// Releases the three directories and marks the rotor torn down.
    /// Sub-block storage must already have been released by the caller.
    /// Idempotent.
    pub(crate) fn teardown(&mut self) {
        if self.m.is_null() {
            return;
        }
        // SAFETY: the directories were allocated with exactly these
        // capacities and are not touched again; null `m` is the marker.
        unsafe {
            dealloc_array(NonNull::new_unchecked(self.l), self.l_cap());
            dealloc_array(NonNull::new_unchecked(self.h), self.h_cap());
            dealloc_array(NonNull::new_unchecked(self.m), self.m_cap);
        }
        self.m = ptr::null_mut();
        self.h = ptr::null_mut();
        self.l = ptr::null_mut();
        self.m_len = 0;
        self.h_len = 0;
        self.l_len = 0;
        self.m_cap = 1;
    }

    /// Walks every rotor invariant, panicking with a description on the
    /// first violation. Test hook; O(m_len), so not for hot paths.
    pub(crate) fn check(&self) {
        if self.is_torn_down() {
            assert!(
                self.m_len == 0 && self.h_len == 0 && self.l_len == 0,
                "torn-down rotor with live occupancy"
            );
            return;
        }
        assert!(
            self.m_cap.is_power_of_two(),
            "middle capacity {} not a power of two",
            self.m_cap
        );
        assert!(self.m_len <= self.m_cap, "middle occupancy over capacity");
        assert!(self.h_len <= self.h_cap(), "higher occupancy over capacity");
        assert!(self.l_len <= self.l_cap(), "lower occupancy over capacity");
        assert!(
            self.h_len <= self.m_len && self.l_len <= self.m_len,
            "mirror occupancy ({}, {}) reaches past live entries ({})",
            self.h_len,
            self.l_len,
            self.m_len
        );
        for i in 0..self.h_len {
            // SAFETY: indices below the occupancies just validated.
            let (mirror, live) = unsafe { (*self.h.add(i), *self.m.add(i)) };
            assert_eq!(mirror, live, "higher mirror diverges at entry {i}");
        }
        for i in 0..self.l_len {
            // SAFETY: indices below the occupancies just validated.
            let (mirror, live) = unsafe { (*self.l.add(i), *self.m.add(i)) };
            assert_eq!(mirror, live, "lower mirror diverges at entry {i}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Element liveness is the container's concern; these tests exercise the
    // rotor alone with uniform never-written blocks.
    const BLOCK: usize = 8;

    fn drain_one(rotor: &mut Rotor<u64>) {
        rotor.retire_block(BLOCK).unwrap();
        rotor.check();
    }

    #[test]
    fn test_growth_rotations_keep_mirrors() {
        let mut rotor = Rotor::<u64>::new();
        rotor.check();
        for n in 1..=64 {
            rotor.push_block(BLOCK).unwrap();
            rotor.check();
            assert_eq!(rotor.block_count(), n);
        }
        // 64 blocks force capacities 1, 2, 4, ..., 64.
        assert_eq!(rotor.capacity(), 64);
        teardown_all(&mut rotor, 64);
    }

    #[test]
    fn test_shrink_rotations_keep_mirrors() {
        let mut rotor = Rotor::<u64>::new();
        for _ in 0..64 {
            rotor.push_block(BLOCK).unwrap();
        }
        // Retirement needs a spare block below; stop at 2.
        while rotor.block_count() > 2 {
            let before = rotor.block_count();
            drain_one(&mut rotor);
            assert_eq!(rotor.block_count(), before - 1);
        }
        assert!(rotor.capacity() <= 4, "capacity {} not shrunk", rotor.capacity());
        teardown_all(&mut rotor, 2);
    }

    #[test]
    fn test_oscillation_at_rotation_boundary() {
        let mut rotor = Rotor::<u64>::new();
        for _ in 0..16 {
            rotor.push_block(BLOCK).unwrap();
        }
        // Straddle the half-full boundary repeatedly.
        for _ in 0..100 {
            drain_one(&mut rotor);
            rotor.push_block(BLOCK).unwrap();
            rotor.check();
        }
        assert_eq!(rotor.block_count(), 16);
        teardown_all(&mut rotor, 16);
    }

    #[test]
    fn test_teardown_is_idempotent() {
        let mut rotor = Rotor::<u64>::new();
        rotor.push_block(BLOCK).unwrap();
        teardown_all(&mut rotor, 1);
        assert!(rotor.is_torn_down());
        rotor.teardown();
        assert!(rotor.is_torn_down());
        // A torn-down rotor re-bootstraps on the next push.
        rotor.push_block(BLOCK).unwrap();
        assert_eq!(rotor.block_count(), 1);
        teardown_all(&mut rotor, 1);
    }

    fn teardown_all(rotor: &mut Rotor<u64>, blocks: usize) {
        for bi in 0..blocks {
            // SAFETY: blocks were allocated with BLOCK slots and hold no
            // live elements.
            unsafe { crate::alloc::dealloc_array(rotor.block(bi), BLOCK) };
        }
        rotor.teardown();
    }
}

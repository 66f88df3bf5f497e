//! Fixed-capacity projectile slot storage with split logic/compute buffers.
//!
//! Every slot owns one logic record (read by gameplay code) and one compute
//! record (read by batch numeric passes) at the same index. A permutation
//! array partitions slot indices into an active prefix and a free suffix, so
//! the live compute slots can be handed to a batch routine without compacting
//! the buffers.

use std::marker::PhantomData;

use bevy::prelude::*;
use thiserror::Error;

/// Source item that can be written into both representations of a slot.
///
/// Implementors are transient spawn descriptions; the store never keeps them.
///
/// # Example
/// ```
/// use bevy_ballistics_core::slots::DualRecord;
///
/// struct Spark { heat: f32 }
///
/// impl DualRecord for Spark {
///     type Logic = u32;
///     type Compute = f32;
///
///     fn to_logic(&self, logic: &mut u32) { *logic = 1; }
///     fn to_compute(&self, compute: &mut f32) { *compute = self.heat; }
/// }
/// ```
pub trait DualRecord {
    /// Record consumed by gameplay logic.
    type Logic: Default + Clone + Send + Sync + 'static;
    /// Minimal numeric record consumed by batch routines.
    type Compute: Default + Copy + Send + Sync + 'static;

    /// Populate the logic record of a freshly assigned slot.
    fn to_logic(&self, logic: &mut Self::Logic);

    /// Populate the compute record of a freshly assigned slot.
    fn to_compute(&self, compute: &mut Self::Compute);
}

/// Errors surfaced by [`SlotStore`] operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SlotError {
    #[error("slot {slot} is not active (double free)")]
    DoubleFree { slot: usize },
    #[error("slot {slot} is outside the store capacity {capacity}")]
    OutOfRange { slot: usize, capacity: usize },
    #[error("destination holds {actual} entries but {required} active slots must be copied")]
    BufferTooSmall { required: usize, actual: usize },
}

/// Dual-representation slot store.
///
/// Buffers are allocated once in [`SlotStore::new`] and never resized.
/// Invariant: `permutation` is a permutation of `0..capacity`; positions
/// `0..active_count` hold active slots and the rest hold free slots.
#[derive(Resource)]
pub struct SlotStore<S: DualRecord + Send + Sync + 'static> {
    logic: Box<[S::Logic]>,
    compute: Box<[S::Compute]>,
    permutation: Box<[usize]>,
    active_count: usize,
    _source: PhantomData<fn(&S)>,
}

impl<S: DualRecord + Send + Sync + 'static> SlotStore<S> {
    /// Allocates both buffers and an identity permutation for `capacity` slots.
    pub fn new(capacity: usize) -> Self {
        Self {
            logic: vec![S::Logic::default(); capacity].into_boxed_slice(),
            compute: vec![S::Compute::default(); capacity].into_boxed_slice(),
            permutation: (0..capacity).collect(),
            active_count: 0,
            _source: PhantomData,
        }
    }

    pub fn capacity(&self) -> usize {
        self.permutation.len()
    }

    pub fn active_count(&self) -> usize {
        self.active_count
    }

    pub fn free_count(&self) -> usize {
        self.capacity() - self.active_count
    }

    /// Streams `source[start..]` into free slots.
    ///
    /// Consumes at most `free_count()` items and returns the offset at which
    /// the next call should resume. When no slot is free (or `start` is
    /// already past the end) `start` is returned unchanged.
    ///
    /// # Arguments
    /// * `source` - Spawn descriptions to convert into slot records
    /// * `start` - Offset of the first unconsumed item
    ///
    /// # Returns
    /// The offset of the first item that was not consumed
    pub fn insert(&mut self, source: &[S], start: usize) -> usize {
        let pending = source.len().saturating_sub(start);
        let count = pending.min(self.free_count());
        if count == 0 {
            return start;
        }

        for item in &source[start..start + count] {
            let slot = self.permutation[self.active_count];
            item.to_logic(&mut self.logic[slot]);
            item.to_compute(&mut self.compute[slot]);
            self.active_count += 1;
        }

        start + count
    }

    /// Returns `slot` to the free region.
    ///
    /// The last active entry is swapped into the vacated position, so the
    /// active prefix stays contiguous. Freeing a slot that is not active is
    /// reported and leaves the partition untouched.
    pub fn mark_free(&mut self, slot: usize) -> Result<(), SlotError> {
        if slot >= self.capacity() {
            return Err(SlotError::OutOfRange {
                slot,
                capacity: self.capacity(),
            });
        }

        let Some(position) = self.active_indices().iter().position(|&s| s == slot) else {
            warn!("Ignoring free of inactive projectile slot {slot}");
            return Err(SlotError::DoubleFree { slot });
        };

        let last = self.active_count - 1;
        self.permutation.swap(position, last);
        self.active_count = last;
        Ok(())
    }

    /// Copies the active slot indices into `destination`.
    ///
    /// # Returns
    /// The number of indices written, which equals `active_count()`
    pub fn copy_active_indices(&self, destination: &mut [usize]) -> Result<usize, SlotError> {
        if destination.len() < self.active_count {
            return Err(SlotError::BufferTooSmall {
                required: self.active_count,
                actual: destination.len(),
            });
        }
        destination[..self.active_count].copy_from_slice(self.active_indices());
        Ok(self.active_count)
    }

    /// Active slot indices, in permutation order.
    pub fn active_indices(&self) -> &[usize] {
        &self.permutation[..self.active_count]
    }

    pub fn is_active(&self, slot: usize) -> bool {
        self.active_indices().contains(&slot)
    }

    pub fn logic(&self, slot: usize) -> Option<&S::Logic> {
        self.logic.get(slot)
    }

    pub fn logic_mut(&mut self, slot: usize) -> Option<&mut S::Logic> {
        self.logic.get_mut(slot)
    }

    pub fn compute(&self, slot: usize) -> Option<&S::Compute> {
        self.compute.get(slot)
    }

    /// Whole compute buffer, including free slots. Pair with
    /// [`SlotStore::active_indices`] to find the live entries.
    pub fn compute_buffer(&self) -> &[S::Compute] {
        &self.compute
    }

    /// Active indices together with the mutable compute buffer, for batch passes.
    pub fn active_compute_mut(&mut self) -> (&[usize], &mut [S::Compute]) {
        (&self.permutation[..self.active_count], &mut self.compute)
    }

    /// Active indices with both buffers borrowed mutably.
    pub fn active_records_mut(&mut self) -> (&[usize], &mut [S::Logic], &mut [S::Compute]) {
        (
            &self.permutation[..self.active_count],
            &mut self.logic,
            &mut self.compute,
        )
    }

    /// Releases both buffers and the permutation array.
    ///
    /// Consumes the store; it cannot be used or disposed again afterwards.
    pub fn dispose(self) {
        debug!(
            "Disposing slot store ({} of {} slots active)",
            self.active_count,
            self.capacity()
        );
        drop(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[derive(Clone, Copy)]
    struct Tag(u32);

    impl DualRecord for Tag {
        type Logic = u32;
        type Compute = f32;

        fn to_logic(&self, logic: &mut u32) {
            *logic = self.0;
        }

        fn to_compute(&self, compute: &mut f32) {
            *compute = self.0 as f32 * 0.5;
        }
    }

    fn tags(n: u32) -> Vec<Tag> {
        (0..n).map(Tag).collect()
    }

    fn assert_partition(store: &SlotStore<Tag>) {
        let mut seen = vec![false; store.capacity()];
        for &slot in store.permutation.iter() {
            assert!(!seen[slot], "slot {slot} appears twice");
            seen[slot] = true;
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn test_new_store_is_identity() {
        let store = SlotStore::<Tag>::new(4);
        assert_eq!(&*store.permutation, &[0, 1, 2, 3]);
        assert_eq!(store.active_count(), 0);
        assert_eq!(store.free_count(), 4);
    }

    #[test]
    fn test_insert_writes_both_representations() {
        let mut store = SlotStore::<Tag>::new(4);
        let next = store.insert(&tags(3), 0);

        assert_eq!(next, 3);
        assert_eq!(store.active_count(), 3);
        assert_eq!(store.logic(2), Some(&2));
        assert_eq!(store.compute(2), Some(&1.0));
    }

    #[test]
    fn test_insert_beyond_capacity_resumes() {
        let mut store = SlotStore::<Tag>::new(3);
        let source = tags(5);

        let next = store.insert(&source, 0);
        assert_eq!(next, 3);
        assert_eq!(store.free_count(), 0);

        // Full store is a no-op
        assert_eq!(store.insert(&source, next), next);

        store.mark_free(1).unwrap();
        let next = store.insert(&source, next);
        assert_eq!(next, 4);
        assert_eq!(store.logic(1), Some(&3));
    }

    #[test]
    fn test_insert_with_offset_past_end() {
        let mut store = SlotStore::<Tag>::new(3);
        assert_eq!(store.insert(&tags(2), 7), 7);
        assert_eq!(store.insert(&tags(2), 2), 2);
        assert_eq!(store.insert(&[], 1), 1);
        assert_eq!(store.active_count(), 0);
        assert_partition(&store);
    }

    #[test]
    fn test_mark_free_swaps_last_active() {
        let mut store = SlotStore::<Tag>::new(4);
        store.insert(&tags(4), 0);

        store.mark_free(1).unwrap();
        assert_eq!(store.active_indices(), &[0, 3, 2]);
        assert!(!store.is_active(1));
        assert_partition(&store);
    }

    #[test]
    fn test_double_free_is_reported() {
        let mut store = SlotStore::<Tag>::new(4);
        store.insert(&tags(2), 0);
        store.mark_free(0).unwrap();

        let before: Vec<usize> = store.permutation.to_vec();
        assert_eq!(store.mark_free(0), Err(SlotError::DoubleFree { slot: 0 }));
        assert_eq!(store.mark_free(3), Err(SlotError::DoubleFree { slot: 3 }));
        assert_eq!(
            store.mark_free(9),
            Err(SlotError::OutOfRange { slot: 9, capacity: 4 })
        );
        assert_eq!(store.permutation.to_vec(), before);
        assert_eq!(store.active_count(), 1);
    }

    #[test]
    fn test_copy_active_indices() {
        let mut store = SlotStore::<Tag>::new(4);
        store.insert(&tags(3), 0);
        store.mark_free(0).unwrap();

        let mut buffer = [usize::MAX; 4];
        let count = store.copy_active_indices(&mut buffer).unwrap();
        assert_eq!(count, 2);
        assert_eq!(&buffer[..count], store.active_indices());

        let mut small = [0usize; 1];
        assert_eq!(
            store.copy_active_indices(&mut small),
            Err(SlotError::BufferTooSmall { required: 2, actual: 1 })
        );
    }

    #[test]
    fn test_random_insert_free_keeps_partition() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut store = SlotStore::<Tag>::new(32);
        let source = tags(1000);
        let mut offset = 0;

        for _ in 0..500 {
            if rng.random_bool(0.5) {
                let before = store.active_count();
                let free = store.free_count();
                let wanted = rng.random_range(0..8usize);
                let end = (offset + wanted).min(source.len());
                let next = store.insert(&source[..end], offset);
                let consumed = (end - offset).min(free);
                assert_eq!(next, offset + consumed);
                assert_eq!(store.active_count(), before + consumed);
                offset = next;
            } else if store.active_count() > 0 {
                let pick = rng.random_range(0..store.active_count());
                let slot = store.active_indices()[pick];
                store.mark_free(slot).unwrap();
                assert!(!store.is_active(slot));
            }

            assert_partition(&store);
            let mut buffer = vec![0usize; store.capacity()];
            let count = store.copy_active_indices(&mut buffer).unwrap();
            assert_eq!(count, store.active_count());
            assert!(buffer[..count].iter().all(|&s| store.is_active(s)));
        }
    }

    #[test]
    fn test_dispose_consumes_store() {
        let mut store = SlotStore::<Tag>::new(8);
        store.insert(&tags(4), 0);
        store.dispose();
    }
}

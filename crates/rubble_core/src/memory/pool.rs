//! # Proxy Pool
//!
//! Fixed-size pool of reusable proxy objects with round-robin checkout.

/// Items stored in a [`ProxyPool`] must know how to return to a neutral state.
pub trait Poolable: Default {
    /// Clears all per-checkout state (binding, transform, physics).
    fn reset(&mut self);
}

/// One slot of the pool.
#[derive(Debug)]
struct PoolSlot<T> {
    /// The pooled object. Always present; reset on release.
    item: T,
    /// Whether the slot is currently checked out.
    active: bool,
    /// Bumped on every release so stale handles are rejected.
    generation: u32,
}

/// Handle to a checked-out slot in a pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PoolHandle {
    /// Index into the pool.
    index: u32,
    /// Generation of the slot at checkout time.
    generation: u32,
}

impl PoolHandle {
    /// Slot index of this handle.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.index as usize
    }

    /// Generation of this handle.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

/// A fixed-capacity pool of reusable objects.
///
/// Every object is constructed once up front. Checkout scans linearly for the
/// first inactive slot starting from a rotating cursor, so slots at the front
/// are not recycled more aggressively than the rest.
///
/// # Thread Safety
///
/// This pool is NOT thread-safe. It is owned by the single game-loop thread.
///
/// # Example
///
/// ```rust,ignore
/// let mut pool: ProxyPool<VisibleVoxelProxy> = ProxyPool::new(4096);
///
/// // Checkout - no heap allocation
/// if let Some((handle, proxy)) = pool.checkout() {
///     proxy.bind(owner);
///     // later...
///     pool.release(handle);
/// }
/// ```
#[derive(Debug)]
pub struct ProxyPool<T> {
    /// The storage array.
    slots: Box<[PoolSlot<T>]>,
    /// Where the next checkout scan starts.
    cursor: usize,
    /// Number of active slots.
    active_count: usize,
}

impl<T: Poolable> ProxyPool<T> {
    /// Creates a new pool with the specified capacity.
    ///
    /// All objects are constructed upfront.
    ///
    /// # Arguments
    ///
    /// * `capacity` - Maximum number of simultaneously active objects
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let slots: Vec<PoolSlot<T>> = (0..capacity)
            .map(|_| PoolSlot {
                item: T::default(),
                active: false,
                generation: 0,
            })
            .collect();

        Self {
            slots: slots.into_boxed_slice(),
            cursor: 0,
            active_count: 0,
        }
    }

    /// Returns the total capacity.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Returns the number of currently active objects.
    #[inline]
    #[must_use]
    pub const fn active_count(&self) -> usize {
        self.active_count
    }

    /// Returns the number of free slots.
    #[inline]
    #[must_use]
    pub fn free_count(&self) -> usize {
        self.capacity() - self.active_count
    }

    /// Checks out the first inactive slot at or after the cursor.
    ///
    /// Returns `None` when every slot is active. The caller binds the returned
    /// object; the pool only flips the active flag.
    pub fn checkout(&mut self) -> Option<(PoolHandle, &mut T)> {
        let capacity = self.slots.len();
        if self.active_count == capacity {
            return None;
        }

        let index = (0..capacity)
            .map(|offset| (self.cursor + offset) % capacity)
            .find(|&i| !self.slots[i].active)?;

        self.cursor = (index + 1) % capacity;
        self.active_count += 1;

        let slot = &mut self.slots[index];
        slot.active = true;
        let handle = PoolHandle {
            index: index as u32,
            generation: slot.generation,
        };
        Some((handle, &mut slot.item))
    }

    /// Returns a slot to the pool and resets its object.
    ///
    /// Returns `false` for stale or already released handles.
    pub fn release(&mut self, handle: PoolHandle) -> bool {
        let Some(slot) = self.slots.get_mut(handle.index()) else {
            return false;
        };
        if !slot.active || slot.generation != handle.generation {
            return false;
        }

        slot.item.reset();
        slot.active = false;
        slot.generation = slot.generation.wrapping_add(1);
        self.active_count -= 1;
        true
    }

    /// Returns true if `handle` refers to a live checkout.
    #[inline]
    #[must_use]
    pub fn is_live(&self, handle: PoolHandle) -> bool {
        self.slots
            .get(handle.index())
            .is_some_and(|slot| slot.active && slot.generation == handle.generation)
    }

    /// Gets a reference to a checked-out object.
    #[inline]
    #[must_use]
    pub fn get(&self, handle: PoolHandle) -> Option<&T> {
        let slot = self.slots.get(handle.index())?;
        (slot.active && slot.generation == handle.generation).then_some(&slot.item)
    }

    /// Gets a mutable reference to a checked-out object.
    #[inline]
    pub fn get_mut(&mut self, handle: PoolHandle) -> Option<&mut T> {
        let slot = self.slots.get_mut(handle.index())?;
        (slot.active && slot.generation == handle.generation).then_some(&mut slot.item)
    }

    /// Releases every active slot.
    pub fn clear(&mut self) {
        for slot in self.slots.iter_mut().filter(|slot| slot.active) {
            slot.item.reset();
            slot.active = false;
            slot.generation = slot.generation.wrapping_add(1);
        }
        self.active_count = 0;
        self.cursor = 0;
    }

    /// Iterates over all active objects.
    pub fn iter_active(&self) -> impl Iterator<Item = (PoolHandle, &T)> {
        self.slots.iter().enumerate().filter(|(_, slot)| slot.active).map(|(index, slot)| {
            let handle = PoolHandle {
                index: index as u32,
                generation: slot.generation,
            };
            (handle, &slot.item)
        })
    }

    /// Iterates mutably over all active objects.
    pub fn iter_active_mut(&mut self) -> impl Iterator<Item = (PoolHandle, &mut T)> {
        self.slots
            .iter_mut()
            .enumerate()
            .filter(|(_, slot)| slot.active)
            .map(|(index, slot)| {
                let handle = PoolHandle {
                    index: index as u32,
                    generation: slot.generation,
                };
                (handle, &mut slot.item)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default, Debug)]
    struct Tag {
        value: u32,
    }

    impl Poolable for Tag {
        fn reset(&mut self) {
            self.value = 0;
        }
    }

    #[test]
    fn test_pool_checkout_release() {
        let mut pool: ProxyPool<Tag> = ProxyPool::new(10);

        let (h1, tag) = pool.checkout().unwrap();
        tag.value = 42;
        assert_eq!(pool.get(h1).unwrap().value, 42);
        assert_eq!(pool.active_count(), 1);

        assert!(pool.release(h1));
        assert_eq!(pool.active_count(), 0);
        assert!(pool.get(h1).is_none());
    }

    #[test]
    fn test_pool_full() {
        let mut pool: ProxyPool<Tag> = ProxyPool::new(2);

        assert!(pool.checkout().is_some());
        assert!(pool.checkout().is_some());
        assert!(pool.checkout().is_none());
        assert_eq!(pool.free_count(), 0);
    }

    #[test]
    fn test_round_robin_does_not_reuse_front_slot() {
        let mut pool: ProxyPool<Tag> = ProxyPool::new(3);

        let (h0, _) = pool.checkout().unwrap();
        assert!(pool.release(h0));

        // Cursor moved past slot 0, so the next checkout lands on slot 1.
        let (h1, _) = pool.checkout().unwrap();
        assert_eq!(h1.index(), 1);
        let (h2, _) = pool.checkout().unwrap();
        assert_eq!(h2.index(), 2);
        // Wraps around to the freed front slot.
        let (h3, _) = pool.checkout().unwrap();
        assert_eq!(h3.index(), 0);
    }

    #[test]
    fn test_stale_handle_rejected() {
        let mut pool: ProxyPool<Tag> = ProxyPool::new(1);

        let (h1, _) = pool.checkout().unwrap();
        assert!(pool.release(h1));
        assert!(!pool.release(h1), "double release must be rejected");

        let (h2, tag) = pool.checkout().unwrap();
        tag.value = 7;
        assert_eq!(h1.index(), h2.index());
        assert!(!pool.is_live(h1));
        assert!(!pool.release(h1), "stale handle must not free the new checkout");
        assert_eq!(pool.get(h2).unwrap().value, 7);
    }

    #[test]
    fn test_release_resets_item() {
        let mut pool: ProxyPool<Tag> = ProxyPool::new(1);
        let (h, tag) = pool.checkout().unwrap();
        tag.value = 9;
        pool.release(h);
        let (_, tag) = pool.checkout().unwrap();
        assert_eq!(tag.value, 0);
    }

    #[test]
    fn test_zero_capacity_never_checks_out() {
        let mut pool: ProxyPool<Tag> = ProxyPool::new(0);
        assert!(pool.checkout().is_none());
    }
}

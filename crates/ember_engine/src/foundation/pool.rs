//! Generational object pool
//!
//! Dense slot storage with a FIFO free list. Every slot carries a generation
//! counter that is bumped when the slot is freed, so a [`Handle`] issued before
//! the free stops resolving even after the slot is reused.
//!
//! ```text
//! Pool<T>
//!   ├── data:        [Some(a), None, Some(c), ...]
//!   ├── generations: [0,       3,    1,       ...]
//!   └── free:        VecDeque<u16>  (front = next slot handed out)
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use thiserror::Error;

/// Largest number of slots a pool can address with a 16-bit index
pub const MAX_POOL_SLOTS: usize = u16::MAX as usize + 1;

/// Pool errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PoolError {
    /// Handle index is outside the pool
    #[error("Invalid handle: index {index} out of range (capacity {capacity})")]
    InvalidHandle {
        /// Offending index
        index: u16,
        /// Pool capacity at the time of the call
        capacity: usize,
    },

    /// Slot was freed (and possibly reused) since the handle was issued
    #[error("Stale handle: index {index}, generation {generation}")]
    StaleHandle {
        /// Slot index
        index: u16,
        /// Generation carried by the handle
        generation: u16,
    },

    /// All 65536 slots are in use
    #[error("Pool exhausted ({0} slots)")]
    Exhausted(usize),
}

/// Generational index into a [`Pool<T>`]
///
/// Equality, ordering and hashing cover both the index and the generation, so
/// two handles to different lifetimes of the same slot never compare equal.
/// Use [`Handle::index`] when an index-only key is genuinely wanted.
pub struct Handle<T> {
    index: u16,
    generation: u16,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    /// Build a handle from raw parts
    pub const fn from_raw(index: u16, generation: u16) -> Self {
        Self {
            index,
            generation,
            _marker: PhantomData,
        }
    }

    /// Slot index, ignoring the generation
    pub const fn index(self) -> u16 {
        self.index
    }

    /// Generation the handle was issued with
    pub const fn generation(self) -> u16 {
        self.generation
    }

    /// Pack index and generation into one `u32` (index in the low half)
    pub const fn to_bits(self) -> u32 {
        (self.generation as u32) << 16 | self.index as u32
    }

    /// Inverse of [`Handle::to_bits`]
    pub const fn from_bits(bits: u32) -> Self {
        Self::from_raw((bits & 0xFFFF) as u16, (bits >> 16) as u16)
    }

    /// Reinterpret as a handle of another type with the same slot identity
    pub const fn cast<U>(self) -> Handle<U> {
        Handle::from_raw(self.index, self.generation)
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.generation == other.generation
    }
}

impl<T> Eq for Handle<T> {}

impl<T> PartialOrd for Handle<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Handle<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.index, self.generation).cmp(&(other.index, other.generation))
    }
}

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.to_bits().hash(state);
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({}v{})", self.index, self.generation)
    }
}

/// Slot storage addressed by generational handles
pub struct Pool<T> {
    data: Vec<Option<T>>,
    generations: Vec<u16>,
    free: VecDeque<u16>,
    len: usize,
}

impl<T> Default for Pool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Pool<T> {
    /// Create an empty pool; the first allocation grows it
    pub fn new() -> Self {
        Self {
            data: Vec::new(),
            generations: Vec::new(),
            free: VecDeque::new(),
            len: 0,
        }
    }

    /// Create a pool with `capacity` free slots already seeded
    pub fn with_capacity(capacity: usize) -> Self {
        let mut pool = Self::new();
        pool.grow_to(capacity.min(MAX_POOL_SLOTS));
        pool
    }

    /// Store `value` in a free slot, doubling the pool when none is left
    pub fn allocate(&mut self, value: T) -> Result<Handle<T>, PoolError> {
        self.allocate_or_return(value).map_err(|(err, _)| err)
    }

    /// Like [`Pool::allocate`], but a full pool hands `value` back
    pub fn allocate_or_return(&mut self, value: T) -> Result<Handle<T>, (PoolError, T)> {
        if self.free.is_empty() {
            let capacity = self.data.len();
            if capacity >= MAX_POOL_SLOTS {
                return Err((PoolError::Exhausted(capacity), value));
            }
            self.grow_to((capacity * 2).clamp(1, MAX_POOL_SLOTS));
        }

        let Some(index) = self.free.pop_front() else {
            return Err((PoolError::Exhausted(self.data.len()), value));
        };
        let slot = index as usize;
        self.data[slot] = Some(value);
        self.len += 1;

        Ok(Handle::from_raw(index, self.generations[slot]))
    }

    /// Release the slot behind `handle`, invalidating every copy of it
    pub fn free(&mut self, handle: Handle<T>) -> Result<T, PoolError> {
        let slot = self.check(handle)?;
        let value = self.data[slot].take().ok_or(PoolError::StaleHandle {
            index: handle.index,
            generation: handle.generation,
        })?;

        self.generations[slot] = self.generations[slot].wrapping_add(1);
        self.free.push_back(handle.index);
        self.len -= 1;

        Ok(value)
    }

    /// Resolve a handle; `None` if it is out of range or stale
    pub fn get(&self, handle: Handle<T>) -> Option<&T> {
        let slot = self.check(handle).ok()?;
        self.data[slot].as_ref()
    }

    /// Resolve a handle mutably; `None` if it is out of range or stale
    pub fn get_mut(&mut self, handle: Handle<T>) -> Option<&mut T> {
        let slot = self.check(handle).ok()?;
        self.data[slot].as_mut()
    }

    /// Whether the handle still resolves
    pub fn contains(&self, handle: Handle<T>) -> bool {
        self.get(handle).is_some()
    }

    /// Number of live values
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the pool holds no live values
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether the next allocation would fail
    pub fn is_full(&self) -> bool {
        self.free.is_empty() && self.data.len() >= MAX_POOL_SLOTS
    }

    /// Number of slots, free or not
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Iterate live values in slot order
    pub fn iter(&self) -> impl Iterator<Item = (Handle<T>, &T)> {
        self.data
            .iter()
            .zip(self.generations.iter())
            .enumerate()
            .filter_map(|(index, (value, &generation))| {
                value
                    .as_ref()
                    .map(|value| (Handle::from_raw(index as u16, generation), value))
            })
    }

    /// Iterate live values mutably in slot order
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Handle<T>, &mut T)> {
        self.data
            .iter_mut()
            .zip(self.generations.iter())
            .enumerate()
            .filter_map(|(index, (value, &generation))| {
                value
                    .as_mut()
                    .map(|value| (Handle::from_raw(index as u16, generation), value))
            })
    }

    /// Free every live slot and hand the values back
    pub fn drain(&mut self) -> Vec<T> {
        let handles: Vec<Handle<T>> = self.iter().map(|(handle, _)| handle).collect();
        handles
            .into_iter()
            .filter_map(|handle| self.free(handle).ok())
            .collect()
    }

    /// Free every live slot, dropping the values
    pub fn clear(&mut self) {
        drop(self.drain());
    }

    fn check(&self, handle: Handle<T>) -> Result<usize, PoolError> {
        let slot = handle.index as usize;
        if slot >= self.data.len() {
            return Err(PoolError::InvalidHandle {
                index: handle.index,
                capacity: self.data.len(),
            });
        }
        if self.generations[slot] != handle.generation {
            return Err(PoolError::StaleHandle {
                index: handle.index,
                generation: handle.generation,
            });
        }
        Ok(slot)
    }

    fn grow_to(&mut self, new_capacity: usize) {
        let old_capacity = self.data.len();
        if new_capacity <= old_capacity {
            return;
        }
        self.data.resize_with(new_capacity, || None);
        self.generations.resize(new_capacity, 0);
        // New slots are appended behind any slots already waiting for reuse.
        self.free.extend((old_capacity..new_capacity).map(|index| index as u16));
        log::trace!("Pool grown {} -> {} slots", old_capacity, new_capacity);
    }
}

impl<T> fmt::Debug for Pool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("len", &self.len)
            .field("capacity", &self.data.len())
            .field("free", &self.free.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_and_get() {
        let mut pool = Pool::new();
        let a = pool.allocate("a").unwrap();
        let b = pool.allocate("b").unwrap();

        assert_eq!(pool.get(a), Some(&"a"));
        assert_eq!(pool.get(b), Some(&"b"));
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_free_invalidates_handle() {
        let mut pool = Pool::new();
        let a = pool.allocate(10).unwrap();

        assert_eq!(pool.free(a), Ok(10));
        assert_eq!(pool.get(a), None);
        assert!(matches!(pool.free(a), Err(PoolError::StaleHandle { .. })));
    }

    #[test]
    fn test_reused_slot_rejects_old_handle() {
        let mut pool = Pool::with_capacity(1);
        let old = pool.allocate(1).unwrap();
        pool.free(old).unwrap();

        let new = pool.allocate(2).unwrap();
        assert_eq!(old.index(), new.index());
        assert_ne!(old, new);
        assert_eq!(pool.get(old), None);
        assert_eq!(pool.get(new), Some(&2));
    }

    #[test]
    fn test_out_of_range_free_is_an_error() {
        let mut pool: Pool<u32> = Pool::with_capacity(4);
        let bogus = Handle::from_raw(100, 0);

        assert!(matches!(
            pool.free(bogus),
            Err(PoolError::InvalidHandle { index: 100, capacity: 4 })
        ));
        assert_eq!(pool.get(bogus), None);
    }

    #[test]
    fn test_growth_doubles_and_keeps_handles() {
        let mut pool = Pool::with_capacity(2);
        let handles: Vec<_> = (0..2).map(|i| pool.allocate(i).unwrap()).collect();
        assert_eq!(pool.capacity(), 2);

        let grown = pool.allocate(2).unwrap();
        assert_eq!(pool.capacity(), 4);

        for (i, handle) in handles.iter().enumerate() {
            assert_eq!(pool.get(*handle), Some(&i));
        }
        assert_eq!(pool.get(grown), Some(&2));

        // The remaining new slot is on the free list
        pool.allocate(3).unwrap();
        assert_eq!(pool.capacity(), 4);
    }

    #[test]
    fn test_free_list_is_fifo() {
        let mut pool = Pool::with_capacity(3);
        let a = pool.allocate('a').unwrap();
        let b = pool.allocate('b').unwrap();
        let c = pool.allocate('c').unwrap();
        pool.free(b).unwrap();
        pool.free(a).unwrap();

        assert_eq!(pool.allocate('x').unwrap().index(), b.index());
        assert_eq!(pool.allocate('y').unwrap().index(), a.index());
        assert!(pool.contains(c));
    }

    #[test]
    fn test_random_allocate_free_sequences() {
        use rand::{Rng, SeedableRng};

        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        let mut pool = Pool::new();
        let mut live: Vec<(Handle<u32>, u32)> = Vec::new();
        let mut dead: Vec<Handle<u32>> = Vec::new();

        for step in 0..2000u32 {
            if live.is_empty() || rng.gen_bool(0.6) {
                live.push((pool.allocate(step).unwrap(), step));
            } else {
                let (handle, value) = live.swap_remove(rng.gen_range(0..live.len()));
                assert_eq!(pool.free(handle), Ok(value));
                dead.push(handle);
            }

            for (handle, value) in &live {
                assert_eq!(pool.get(*handle), Some(value));
            }
        }

        for handle in dead {
            assert_eq!(pool.get(handle), None);
        }
        assert_eq!(pool.len(), live.len());
    }

    #[test]
    fn test_handle_bits_roundtrip_and_cast() {
        let handle: Handle<u8> = Handle::from_raw(513, 9);
        assert_eq!(Handle::<u8>::from_bits(handle.to_bits()), handle);
        assert_eq!(handle.cast::<u16>().index(), 513);
    }

    #[test]
    fn test_drain_frees_everything() {
        let mut pool = Pool::new();
        let a = pool.allocate(1).unwrap();
        pool.allocate(2).unwrap();

        let mut values = pool.drain();
        values.sort_unstable();
        assert_eq!(values, vec![1, 2]);
        assert!(pool.is_empty());
        assert!(!pool.contains(a));
    }

    #[test]
    fn test_full_pool_returns_value() {
        let mut pool = Pool::with_capacity(MAX_POOL_SLOTS);
        for i in 0..MAX_POOL_SLOTS {
            pool.allocate(i).unwrap();
        }
        assert!(pool.is_full());
        assert_eq!(pool.allocate_or_return(7), Err((PoolError::Exhausted(MAX_POOL_SLOTS), 7)));

        let first = pool.iter().next().map(|(h, _)| h).unwrap();
        pool.free(first).unwrap();
        assert!(!pool.is_full());
    }
}

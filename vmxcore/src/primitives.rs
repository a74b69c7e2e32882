//! Low-level primitives shared by every other module: a reader/writer lock, an intrusive
//! singly-linked list, and a fixed-bucket hash map keyed on `u64`.
//!
//! These sit at the same layer as [`abyss::spin_lock`] but add the data-structure shapes the
//! CORE needs that the HAL doesn't provide on its own.
use abyss::spin_lock::SpinLock;
use alloc::boxed::Box;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicUsize, Ordering};

/// Multiple-reader, single-writer lock, fair to writers.
///
/// A writer sets a "waiting" flag before spinning for exclusive access, so a steady stream of
/// readers cannot starve it indefinitely -- readers that arrive after the flag is set back off
/// and let the writer in first. Registration paths (gcpu registry, HMM map mutation, event
/// subscriber lists) write rarely and read often, which is exactly this lock's shape.
pub struct RwLock<T> {
    /// `0` = free, odd = one writer holds it, even positive = reader count.
    state: AtomicUsize,
    writer_waiting: core::sync::atomic::AtomicBool,
    inner: core::cell::UnsafeCell<T>,
}

unsafe impl<T: Send> Send for RwLock<T> {}
unsafe impl<T: Send + Sync> Sync for RwLock<T> {}

const WRITER: usize = 1;
const READER: usize = 2;

impl<T> RwLock<T> {
    /// Create a new lock wrapping `inner`.
    pub const fn new(inner: T) -> Self {
        Self {
            state: AtomicUsize::new(0),
            writer_waiting: core::sync::atomic::AtomicBool::new(false),
            inner: core::cell::UnsafeCell::new(inner),
        }
    }

    /// Acquire the lock for reading.
    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        loop {
            if self.writer_waiting.load(Ordering::Relaxed) {
                core::hint::spin_loop();
                continue;
            }
            let prev = self.state.fetch_add(READER, Ordering::Acquire);
            if prev & WRITER == 0 {
                return RwLockReadGuard { lock: self };
            }
            self.state.fetch_sub(READER, Ordering::Release);
            core::hint::spin_loop();
        }
    }

    /// Acquire the lock for writing.
    pub fn write(&self) -> RwLockWriteGuard<'_, T> {
        self.writer_waiting.store(true, Ordering::Relaxed);
        loop {
            if self
                .state
                .compare_exchange(0, WRITER, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
            {
                self.writer_waiting.store(false, Ordering::Relaxed);
                return RwLockWriteGuard { lock: self };
            }
            core::hint::spin_loop();
        }
    }
}

/// Guard returned by [`RwLock::read`].
pub struct RwLockReadGuard<'a, T> {
    lock: &'a RwLock<T>,
}

impl<'a, T> core::ops::Deref for RwLockReadGuard<'a, T> {
    type Target = T;
    fn deref(&self) -> &T {
        unsafe { &*self.lock.inner.get() }
    }
}

impl<'a, T> Drop for RwLockReadGuard<'a, T> {
    fn drop(&mut self) {
        self.lock.state.fetch_sub(READER, Ordering::Release);
    }
}

/// Guard returned by [`RwLock::write`].
pub struct RwLockWriteGuard<'a, T> {
    lock: &'a RwLock<T>,
}

impl<'a, T> core::ops::Deref for RwLockWriteGuard<'a, T> {
    type Target = T;
    fn deref(&self) -> &T {
        unsafe { &*self.lock.inner.get() }
    }
}

impl<'a, T> core::ops::DerefMut for RwLockWriteGuard<'a, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.lock.inner.get() }
    }
}

impl<'a, T> Drop for RwLockWriteGuard<'a, T> {
    fn drop(&mut self) {
        self.lock.state.store(0, Ordering::Release);
    }
}

/// A fixed-bucket hash map keyed on `u64`, chaining collisions per bucket.
///
/// Bucket count is fixed at construction (rounded up to a power of two) so lookups never
/// allocate; only inserts past the existing chain length allocate. Used for BDF-to-guest and
/// identity-to-gcpu lookups where the key space is small and known up front.
pub struct U64HashMap<V> {
    buckets: Vec<Vec<(u64, V)>>,
    mask: u64,
}

impl<V> U64HashMap<V> {
    /// Create a map with at least `capacity_hint` buckets.
    pub fn with_capacity(capacity_hint: usize) -> Self {
        let n = capacity_hint.max(1).next_power_of_two();
        let mut buckets = Vec::with_capacity(n);
        for _ in 0..n {
            buckets.push(Vec::new());
        }
        Self {
            buckets,
            mask: (n - 1) as u64,
        }
    }

    fn bucket(&self, key: u64) -> usize {
        (Self::hash(key) & self.mask) as usize
    }

    /// Fibonacci hashing of the key into a well-mixed 64-bit value.
    fn hash(key: u64) -> u64 {
        key.wrapping_mul(0x9E3779B97F4A7C15)
    }

    /// Insert `value` under `key`, returning the previous value if any.
    pub fn insert(&mut self, key: u64, value: V) -> Option<V> {
        let idx = self.bucket(key);
        let chain = &mut self.buckets[idx];
        if let Some(slot) = chain.iter_mut().find(|(k, _)| *k == key) {
            Some(core::mem::replace(&mut slot.1, value))
        } else {
            chain.push((key, value));
            None
        }
    }

    /// Look up the value stored under `key`.
    pub fn get(&self, key: u64) -> Option<&V> {
        let idx = self.bucket(key);
        self.buckets[idx].iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    /// Look up a mutable reference to the value stored under `key`.
    pub fn get_mut(&mut self, key: u64) -> Option<&mut V> {
        let idx = self.bucket(key);
        self.buckets[idx].iter_mut().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    /// Remove and return the value stored under `key`.
    pub fn remove(&mut self, key: u64) -> Option<V> {
        let idx = self.bucket(key);
        let chain = &mut self.buckets[idx];
        let pos = chain.iter().position(|(k, _)| *k == key)?;
        Some(chain.swap_remove(pos).1)
    }
}

/// Intrusive singly-linked list node. `T` embeds this as a field and hands out `Box<T>` to the
/// list; no separate allocation happens on push/pop.
pub struct ListLink<T> {
    next: Option<Box<T>>,
}

impl<T> ListLink<T> {
    /// An unlinked node.
    pub const fn empty() -> Self {
        Self { next: None }
    }
}

/// A singly linked intrusive list over nodes reachable via `link`.
pub struct IntrusiveList<T> {
    head: Option<Box<T>>,
    link: fn(&mut T) -> &mut ListLink<T>,
}

impl<T> IntrusiveList<T> {
    /// Build a list that reaches each node's link through `link`.
    pub const fn new(link: fn(&mut T) -> &mut ListLink<T>) -> Self {
        Self { head: None, link }
    }

    /// Push `node` to the front of the list.
    pub fn push_front(&mut self, mut node: Box<T>) {
        (self.link)(&mut node).next = self.head.take();
        self.head = Some(node);
    }

    /// Pop the front node off the list.
    pub fn pop_front(&mut self) -> Option<Box<T>> {
        let mut node = self.head.take()?;
        self.head = (self.link)(&mut node).next.take();
        Some(node)
    }

    /// Iterate over the list front-to-back.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        let mut cur = self.head.as_deref();
        core::iter::from_fn(move || {
            let node = cur?;
            // SAFETY: `link` only ever projects into `node`'s own fields.
            let link_ptr = node as *const T as *mut T;
            cur = unsafe { (self.link)(&mut *link_ptr).next.as_deref() };
            Some(node)
        })
    }

    /// Whether the list has no elements.
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }
}

pub use abyss::spin_lock::SpinLockGuard;

/// Thin convenience re-export so callers in this crate can write `primitives::Spin<T>`.
pub type Spin<T> = SpinLock<T>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_map_insert_get_remove() {
        let mut m = U64HashMap::with_capacity(4);
        assert_eq!(m.insert(10, "a"), None);
        assert_eq!(m.insert(26, "b"), None); // collides with 10 in a 4-bucket map on some hashes
        assert_eq!(m.get(10), Some(&"a"));
        assert_eq!(m.get(26), Some(&"b"));
        assert_eq!(m.insert(10, "c"), Some("a"));
        assert_eq!(m.remove(10), Some("c"));
        assert_eq!(m.get(10), None);
        assert_eq!(m.get(26), Some(&"b"));
    }

    #[test]
    fn rwlock_allows_concurrent_reads() {
        let lock = RwLock::new(42u32);
        let r1 = lock.read();
        let r2 = lock.read();
        assert_eq!(*r1, 42);
        assert_eq!(*r2, 42);
        drop(r1);
        drop(r2);
        *lock.write() = 7;
        assert_eq!(*lock.read(), 7);
    }
}

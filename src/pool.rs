//! Event recycling
//!
//! A bounded LIFO free-list of [`Event`]s. Acquire pops and resets; release
//! pushes without resetting, deferring the cleanup cost to the consumer side
//! where it stays off the producer's critical path.

use crate::event::Event;
use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::sync::OnceLock;

/// Snapshot of pool counters
#[derive(Debug, Clone, Copy)]
pub struct PoolStats {
    /// Events currently parked in the pool
    pub pool_size: usize,
    /// Pool capacity
    pub max_size: usize,
    /// Events allocated fresh (including warm-up)
    pub created_count: u64,
    /// Events served from the free-list
    pub reuse_count: u64,
    /// reuse / (reuse + created)
    pub reuse_ratio: f64,
}

/// Bounded LIFO stack of reusable events.
pub struct EventPool {
    events: Vec<Box<Event>>,
    max_size: usize,
    created_count: u64,
    reuse_count: u64,
}

impl EventPool {
    /// Create a pool with the given capacity
    pub fn new(max_size: usize) -> Self {
        Self {
            events: Vec::with_capacity(max_size),
            max_size,
            created_count: 0,
            reuse_count: 0,
        }
    }

    /// Take an event, recycled if one is parked.
    ///
    /// Recycled events are reset here, on the consumer side, so a fresh
    /// acquire is observationally identical to a new allocation.
    pub fn acquire(&mut self) -> Box<Event> {
        match self.events.pop() {
            Some(mut event) => {
                event.reset();
                debug_assert!(event.is_pristine());
                self.reuse_count += 1;
                event
            }
            None => {
                self.created_count += 1;
                Box::new(Event::new())
            }
        }
    }

    /// Return an event. Parked if there is room, destroyed otherwise.
    /// Reset is deferred to the next acquire; releasing a partially-used
    /// event is always safe.
    pub fn release(&mut self, event: Box<Event>) {
        if self.events.len() < self.max_size {
            self.events.push(event);
        }
        // over capacity: drop
    }

    /// Pre-allocate up to `n` events (clamped to capacity)
    pub fn warm_up(&mut self, n: usize) {
        let target = n.min(self.max_size);
        while self.events.len() < target {
            self.events.push(Box::new(Event::new()));
            self.created_count += 1;
        }
    }

    /// Destroy parked events until at most `target` remain
    pub fn shrink(&mut self, target: usize) {
        self.events.truncate(target);
    }

    /// Periodic trim: when the parked count runs well past the working-set
    /// floor, give the excess back.
    pub fn maintenance(&mut self) {
        let floor = (self.max_size / 4).max(10);
        if self.events.len() > 2 * floor {
            self.shrink(floor);
        }
    }

    /// Events currently parked
    pub fn size(&self) -> usize {
        self.events.len()
    }

    /// Pool capacity
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Counter snapshot
    pub fn stats(&self) -> PoolStats {
        let total = self.created_count + self.reuse_count;
        PoolStats {
            pool_size: self.events.len(),
            max_size: self.max_size,
            created_count: self.created_count,
            reuse_count: self.reuse_count,
            reuse_ratio: if total == 0 {
                0.0
            } else {
                self.reuse_count as f64 / total as f64
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Process-wide pool
//
// Convenience for single-worker deployments. Multi-worker setups should own
// one pool per worker (through MemoryManager) and skip the mutex.

static GLOBAL_POOL: OnceLock<Mutex<EventPool>> = OnceLock::new();

/// Initialize the process-wide pool. The first call wins; returns whether
/// this call performed the initialization.
pub fn init_global_pool(max_size: usize) -> bool {
    GLOBAL_POOL.set(Mutex::new(EventPool::new(max_size))).is_ok()
}

/// Run `f` with exclusive access to the process-wide pool.
///
/// Fails closed with [`Error::GlobalPoolNotInitialized`] before
/// [`init_global_pool`] has run.
pub fn with_global_pool<R>(f: impl FnOnce(&mut EventPool) -> R) -> Result<R> {
    let pool = GLOBAL_POOL.get().ok_or(Error::GlobalPoolNotInitialized)?;
    Ok(f(&mut pool.lock()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytestr::ByteStr;

    #[test]
    fn test_acquire_fresh_then_reuse() {
        let mut pool = EventPool::new(4);
        let ev = pool.acquire();
        assert_eq!(pool.stats().created_count, 1);

        pool.release(ev);
        assert_eq!(pool.size(), 1);

        let ev = pool.acquire();
        assert!(ev.is_pristine());
        let stats = pool.stats();
        assert_eq!(stats.reuse_count, 1);
        assert_eq!(stats.created_count, 1);
        assert_eq!(stats.reuse_ratio, 0.5);
    }

    #[test]
    fn test_release_defers_reset() {
        let mut pool = EventPool::new(4);
        let mut ev = pool.acquire();
        ev.set_context("k", ByteStr::Owned("v".into()));
        pool.release(ev);

        // Parked dirty, cleaned on the way out
        let ev = pool.acquire();
        assert!(ev.is_pristine());
    }

    #[test]
    fn test_release_over_capacity_drops() {
        let mut pool = EventPool::new(2);
        let a = pool.acquire();
        let b = pool.acquire();
        let c = pool.acquire();
        pool.release(a);
        pool.release(b);
        pool.release(c);
        assert_eq!(pool.size(), 2);
    }

    #[test]
    fn test_warm_up_clamps_to_capacity() {
        let mut pool = EventPool::new(8);
        pool.warm_up(100);
        assert_eq!(pool.size(), 8);
        assert_eq!(pool.stats().created_count, 8);
    }

    #[test]
    fn test_shrink() {
        let mut pool = EventPool::new(16);
        pool.warm_up(16);
        pool.shrink(3);
        assert_eq!(pool.size(), 3);
    }

    #[test]
    fn test_maintenance_trims_to_floor() {
        // floor = max(64 / 4, 10) = 16
        let mut pool = EventPool::new(64);
        pool.warm_up(64);
        pool.maintenance();
        assert_eq!(pool.size(), 16);

        // At or under 2x floor nothing happens
        pool.warm_up(32);
        pool.maintenance();
        assert_eq!(pool.size(), 32);
    }

    #[test]
    fn test_maintenance_floor_for_small_pools() {
        // floor = max(8 / 4, 10) = 10; 8 parked is under 2x floor
        let mut pool = EventPool::new(8);
        pool.warm_up(8);
        pool.maintenance();
        assert_eq!(pool.size(), 8);
    }
}

//! Scoped memory management
//!
//! One [`MemoryManager`] per worker owns the request and temp arenas, the
//! optional event pool and the usage counters, and decides when to run a
//! collection pass. Handlers reach the arenas through it; the surrounding
//! server calls [`reset_request_arena`](MemoryManager::reset_request_arena)
//! after each request.

use crate::arena::Arena;
use crate::event::Event;
use crate::pool::{EventPool, PoolStats};

/// Which allocator a helper should draw from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocScope {
    /// Lives until the end of the current request
    Request,
    /// Short-lived intermediate data, reset more often than request scope
    Temporary,
    /// Outlives any request; base allocator
    Persistent,
}

/// How the manager trades memory for throughput.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocationStrategy {
    /// Pre-warm the pool, collect late
    Performance,
    /// Collect early, keep the footprint small
    Memory,
    /// Neutral defaults
    Balanced,
}

/// Health-check thresholds. The constants come from the source system's
/// telemetry and are deliberately configurable.
#[derive(Debug, Clone, Copy)]
pub struct HealthThresholds {
    /// Minimum pool hit share before reuse is considered broken
    pub min_pool_efficiency: f64,
    /// Maximum current/peak usage ratio before pressure is flagged
    pub max_usage_ratio: f64,
    /// Maximum lifetime GC runs before churn is flagged
    pub max_gc_runs: u64,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            min_pool_efficiency: 0.8,
            max_usage_ratio: 0.9,
            max_gc_runs: 100,
        }
    }
}

/// Memory subsystem configuration
#[derive(Debug, Clone)]
pub struct MemoryConfig {
    /// Recycle events through a pool
    pub enable_event_pool: bool,
    /// Pool capacity
    pub event_pool_size: usize,
    /// Throughput/footprint trade-off
    pub allocation_strategy: AllocationStrategy,
    /// Arena chunk size
    pub arena_size: usize,
    /// Maintain the byte counters
    pub enable_memory_tracking: bool,
    /// Tracked live bytes that trigger a collection on arena reset
    pub gc_threshold: usize,
    /// Health-check thresholds
    pub health: HealthThresholds,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            enable_event_pool: true,
            event_pool_size: 100,
            allocation_strategy: AllocationStrategy::Balanced,
            arena_size: 64 * 1024,
            enable_memory_tracking: true,
            gc_threshold: 1024 * 1024,
            health: HealthThresholds::default(),
        }
    }
}

impl MemoryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn event_pool(mut self, enabled: bool) -> Self {
        self.enable_event_pool = enabled;
        self
    }

    pub fn event_pool_size(mut self, size: usize) -> Self {
        self.event_pool_size = size;
        self
    }

    pub fn allocation_strategy(mut self, strategy: AllocationStrategy) -> Self {
        self.allocation_strategy = strategy;
        self
    }

    pub fn arena_size(mut self, size: usize) -> Self {
        self.arena_size = size;
        self
    }

    pub fn memory_tracking(mut self, enabled: bool) -> Self {
        self.enable_memory_tracking = enabled;
        self
    }

    pub fn gc_threshold(mut self, bytes: usize) -> Self {
        self.gc_threshold = bytes;
        self
    }

    pub fn health(mut self, thresholds: HealthThresholds) -> Self {
        self.health = thresholds;
        self
    }
}

/// Running memory counters. The monotone counters never decrement;
/// `current_usage` and `peak_usage` track live tracked bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryStats {
    /// Tracked bytes allocated over the manager's lifetime
    pub total_allocated: u64,
    /// Tracked live bytes
    pub current_usage: usize,
    /// High-water mark of `current_usage`
    pub peak_usage: usize,
    /// Events served from the pool
    pub pool_hits: u64,
    /// Events allocated fresh
    pub pool_misses: u64,
    /// Request-arena resets
    pub arena_resets: u64,
    /// Collection passes
    pub gc_runs: u64,
}

/// Per-worker owner of arenas, pool and counters.
pub struct MemoryManager {
    config: MemoryConfig,
    request_arena: Arena,
    temp_arena: Arena,
    pool: Option<EventPool>,
    stats: MemoryStats,
}

impl MemoryManager {
    pub fn new(config: MemoryConfig) -> Self {
        let mut pool = config
            .enable_event_pool
            .then(|| EventPool::new(config.event_pool_size));
        if config.allocation_strategy == AllocationStrategy::Performance {
            if let Some(pool) = pool.as_mut() {
                pool.warm_up(config.event_pool_size);
            }
        }
        Self {
            request_arena: Arena::with_chunk_size(config.arena_size),
            temp_arena: Arena::with_chunk_size(config.arena_size),
            pool,
            config,
            stats: MemoryStats::default(),
        }
    }

    /// Take an event for the next request.
    pub fn acquire_event(&mut self) -> Box<Event> {
        match self.pool.as_mut() {
            Some(pool) => {
                if pool.size() > 0 {
                    self.stats.pool_hits += 1;
                } else {
                    self.stats.pool_misses += 1;
                }
                pool.acquire()
            }
            None => {
                self.stats.pool_misses += 1;
                Box::new(Event::new())
            }
        }
    }

    /// Return an event after the request, however it ended.
    pub fn release_event(&mut self, event: Box<Event>) {
        match self.pool.as_mut() {
            Some(pool) => pool.release(event),
            None => drop(event),
        }
    }

    /// Request-scoped allocator handle
    pub fn request_arena(&self) -> &Arena {
        &self.request_arena
    }

    /// Temp-scoped allocator handle
    pub fn temp_arena(&self) -> &Arena {
        &self.temp_arena
    }

    /// The arena serving a scope; `None` means the base allocator.
    pub fn arena_for(&self, scope: AllocScope) -> Option<&Arena> {
        match scope {
            AllocScope::Request => Some(&self.request_arena),
            AllocScope::Temporary => Some(&self.temp_arena),
            AllocScope::Persistent => None,
        }
    }

    /// End-of-request reset: drop the request scope retaining capacity,
    /// then collect if tracked usage has run past the threshold.
    pub fn reset_request_arena(&mut self) {
        self.request_arena.reset();
        self.stats.arena_resets += 1;
        if self.stats.current_usage > self.effective_gc_threshold() {
            self.perform_gc();
        }
    }

    /// Reset the temp scope retaining capacity.
    pub fn reset_temp_arena(&mut self) {
        self.temp_arena.reset();
    }

    /// Collection pass: both arenas give their chunks back to the OS, the
    /// pool trims down to its floor, tracked usage restarts from zero.
    pub fn perform_gc(&mut self) {
        self.request_arena.free_all();
        self.temp_arena.free_all();
        if let Some(pool) = self.pool.as_mut() {
            pool.maintenance();
        }
        self.stats.current_usage = 0;
        self.stats.gc_runs += 1;
        tracing::debug!(gc_runs = self.stats.gc_runs, "memory collection pass");
    }

    /// Adapt the pool to the observed reuse ratio and force a collection
    /// under sustained pressure. Intended to be called periodically.
    pub fn optimize(&mut self) {
        if let Some(pool) = self.pool.as_mut() {
            let stats = pool.stats();
            if stats.reuse_ratio < 0.5 && pool.size() > 10 {
                let half = pool.size() / 2;
                pool.shrink(half);
                tracing::debug!(size = half, "pool shrunk, low reuse");
            } else if stats.reuse_ratio > 0.95 && pool.size() < pool.max_size() {
                let target = (pool.size() + 10).min(pool.max_size());
                pool.warm_up(target);
            }
        }
        if self.stats.current_usage > 2 * self.config.gc_threshold {
            self.perform_gc();
        }
    }

    /// Whether the subsystem looks sound: pool reuse is effective, usage is
    /// not pinned at its peak, and collections are not churning.
    pub fn is_memory_healthy(&self) -> bool {
        let h = &self.config.health;

        let pool_total = self.stats.pool_hits + self.stats.pool_misses;
        if self.pool.is_some() && pool_total > 0 {
            let efficiency = self.stats.pool_hits as f64 / pool_total as f64;
            if efficiency <= h.min_pool_efficiency {
                return false;
            }
        }

        if self.stats.peak_usage > 0 {
            let ratio = self.stats.current_usage as f64 / self.stats.peak_usage as f64;
            if ratio >= h.max_usage_ratio {
                return false;
            }
        }

        self.stats.gc_runs < h.max_gc_runs
    }

    /// Record an allocation against the tracked counters.
    pub fn track_allocation(&mut self, bytes: usize) {
        if !self.config.enable_memory_tracking {
            return;
        }
        self.stats.total_allocated += bytes as u64;
        self.stats.current_usage += bytes;
        self.stats.peak_usage = self.stats.peak_usage.max(self.stats.current_usage);
    }

    /// Record a free against the tracked counters.
    pub fn track_free(&mut self, bytes: usize) {
        if !self.config.enable_memory_tracking {
            return;
        }
        self.stats.current_usage = self.stats.current_usage.saturating_sub(bytes);
    }

    /// Counter snapshot
    pub fn stats(&self) -> &MemoryStats {
        &self.stats
    }

    /// Pool counters, when the pool is enabled
    pub fn pool_stats(&self) -> Option<PoolStats> {
        self.pool.as_ref().map(EventPool::stats)
    }

    /// Active configuration
    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    fn effective_gc_threshold(&self) -> usize {
        match self.config.allocation_strategy {
            AllocationStrategy::Performance => self.config.gc_threshold.saturating_mul(2),
            AllocationStrategy::Memory => self.config.gc_threshold / 2,
            AllocationStrategy::Balanced => self.config.gc_threshold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager_with(gc_threshold: usize) -> MemoryManager {
        MemoryManager::new(MemoryConfig::new().gc_threshold(gc_threshold))
    }

    #[test]
    fn test_acquire_release_counts_pool_traffic() {
        let mut mgr = MemoryManager::new(MemoryConfig::default());
        let ev = mgr.acquire_event();
        assert_eq!(mgr.stats().pool_misses, 1);

        mgr.release_event(ev);
        let _ev = mgr.acquire_event();
        assert_eq!(mgr.stats().pool_hits, 1);
    }

    #[test]
    fn test_pool_disabled_allocates_directly() {
        let mut mgr = MemoryManager::new(MemoryConfig::new().event_pool(false));
        let ev = mgr.acquire_event();
        mgr.release_event(ev);
        let _ev = mgr.acquire_event();
        assert_eq!(mgr.stats().pool_hits, 0);
        assert_eq!(mgr.stats().pool_misses, 2);
        assert!(mgr.pool_stats().is_none());
    }

    #[test]
    fn test_arena_reset_counts() {
        let mut mgr = manager_with(1024 * 1024);
        mgr.request_arena().alloc_bytes(&[0u8; 128]);
        mgr.reset_request_arena();
        assert_eq!(mgr.stats().arena_resets, 1);
        assert_eq!(mgr.request_arena().bytes_used(), 0);
    }

    #[test]
    fn test_gc_triggers_past_threshold() {
        let mut mgr = manager_with(1024);
        mgr.track_allocation(2048);
        assert_eq!(mgr.stats().current_usage, 2048);

        mgr.reset_request_arena();
        assert_eq!(mgr.stats().gc_runs, 1);
        assert_eq!(mgr.stats().current_usage, 0);
        // Monotone counters survive the collection
        assert_eq!(mgr.stats().total_allocated, 2048);
        assert_eq!(mgr.stats().peak_usage, 2048);
    }

    #[test]
    fn test_no_gc_under_threshold() {
        let mut mgr = manager_with(4096);
        mgr.track_allocation(1000);
        mgr.reset_request_arena();
        assert_eq!(mgr.stats().gc_runs, 0);
        assert_eq!(mgr.stats().current_usage, 1000);
    }

    #[test]
    fn test_tracking_disabled_is_inert() {
        let mut mgr = MemoryManager::new(MemoryConfig::new().memory_tracking(false).gc_threshold(16));
        mgr.track_allocation(1 << 20);
        assert_eq!(mgr.stats().current_usage, 0);
        mgr.reset_request_arena();
        assert_eq!(mgr.stats().gc_runs, 0);
    }

    #[test]
    fn test_optimize_forces_gc_under_pressure() {
        let mut mgr = manager_with(512);
        mgr.track_allocation(2048);
        mgr.optimize();
        assert_eq!(mgr.stats().gc_runs, 1);
    }

    #[test]
    fn test_performance_strategy_prewarms() {
        let mgr = MemoryManager::new(
            MemoryConfig::new()
                .allocation_strategy(AllocationStrategy::Performance)
                .event_pool_size(12),
        );
        assert_eq!(mgr.pool_stats().unwrap().pool_size, 12);
    }

    #[test]
    fn test_memory_strategy_collects_early() {
        let mut mgr = MemoryManager::new(
            MemoryConfig::new()
                .allocation_strategy(AllocationStrategy::Memory)
                .gc_threshold(1000),
        );
        mgr.track_allocation(600);
        mgr.reset_request_arena();
        assert_eq!(mgr.stats().gc_runs, 1);
    }

    #[test]
    fn test_health_fresh_manager() {
        let mgr = MemoryManager::new(MemoryConfig::default());
        assert!(mgr.is_memory_healthy());
    }

    #[test]
    fn test_health_flags_poor_reuse() {
        let mut mgr = MemoryManager::new(MemoryConfig::default());
        // Every acquire below misses: the pool never has anything parked
        for _ in 0..10 {
            let ev = mgr.acquire_event();
            drop(ev);
        }
        assert!(!mgr.is_memory_healthy());
    }

    #[test]
    fn test_health_flags_pinned_usage() {
        let mut mgr = MemoryManager::new(MemoryConfig::default());
        mgr.track_allocation(1000);
        // current == peak, ratio 1.0 >= 0.9
        assert!(!mgr.is_memory_healthy());

        mgr.track_free(500);
        // Give the pool a clean record so only the ratio is judged
        let ev = mgr.acquire_event();
        mgr.release_event(ev);
        for _ in 0..10 {
            let ev = mgr.acquire_event();
            mgr.release_event(ev);
        }
        assert!(mgr.is_memory_healthy());
    }

    #[test]
    fn test_arena_for_scopes() {
        let mgr = MemoryManager::new(MemoryConfig::default());
        assert!(mgr.arena_for(AllocScope::Request).is_some());
        assert!(mgr.arena_for(AllocScope::Temporary).is_some());
        assert!(mgr.arena_for(AllocScope::Persistent).is_none());
    }
}

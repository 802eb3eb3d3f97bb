//! Route-match LRU cache
//!
//! Maps (method, path) to a previously matched handler and its captured
//! parameters, so repeated requests skip the trie walk. Bounded, O(1) on
//! both lookup and eviction.
//!
//! Layout: entries live in a slab with an internal free list; the recency
//! list is doubly linked through slab indices (`prev`/`next` as
//! `Option<usize>`, head = MRU, tail = LRU); per-method hash maps index the
//! slab by path. Lookups probe with a borrowed `&str`, so a lookup key never
//! allocates and can never end up stored.

use crate::event::Method;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

/// Captured route parameters, owned key/value pairs
pub type Params = SmallVec<[(String, String); 4]>;

/// Default cache capacity
pub const DEFAULT_CACHE_SIZE: usize = 1000;

/// One cached route match
#[derive(Debug)]
pub struct CacheEntry<T> {
    /// The matched handler/value
    pub handler: T,
    /// Captured path parameters
    pub params: Params,
    /// Logical tick of the most recent access
    pub last_access: u64,
}

/// Snapshot of cache counters
#[derive(Debug, Clone, Copy)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    /// hits / (hits + misses)
    pub hit_ratio: f64,
    pub size: usize,
    pub max_size: usize,
}

struct Node<T> {
    method: Method,
    path: Box<str>,
    entry: CacheEntry<T>,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Bounded LRU cache over (method, path).
pub struct RouteCache<T> {
    // One index map per method: probe with &str, store owned Box<str>
    maps: [FxHashMap<Box<str>, usize>; Method::COUNT],
    nodes: Vec<Option<Node<T>>>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    max_size: usize,
    tick: u64,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl<T> RouteCache<T> {
    /// Create a cache with the default capacity
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CACHE_SIZE)
    }

    /// Create a cache with an explicit capacity. Zero is legal and
    /// degenerates to always-miss.
    pub fn with_capacity(max_size: usize) -> Self {
        Self {
            maps: std::array::from_fn(|_| FxHashMap::default()),
            nodes: Vec::with_capacity(max_size.min(1024)),
            free: Vec::new(),
            head: None,
            tail: None,
            max_size,
            tick: 0,
            hits: 0,
            misses: 0,
            evictions: 0,
        }
    }

    /// Look up a cached match. Hits refresh recency; the borrowed `path`
    /// never allocates and never enters the map.
    pub fn get(&mut self, method: Method, path: &str) -> Option<&CacheEntry<T>> {
        let Some(&idx) = self.maps[method.index()].get(path) else {
            self.misses += 1;
            return None;
        };
        self.hits += 1;
        self.tick += 1;
        let tick = self.tick;
        self.node_mut(idx).entry.last_access = tick;
        self.move_to_head(idx);
        Some(&self.node(idx).entry)
    }

    /// Insert or refresh a match. The path and params are copied into owned
    /// storage; evicts the least recently used entry when full.
    pub fn put(&mut self, method: Method, path: &str, handler: T, params: Params) {
        if self.max_size == 0 {
            return;
        }
        self.tick += 1;

        if let Some(&idx) = self.maps[method.index()].get(path) {
            let tick = self.tick;
            let node = self.node_mut(idx);
            node.entry.handler = handler;
            node.entry.params = params;
            node.entry.last_access = tick;
            self.move_to_head(idx);
            return;
        }

        if self.len() >= self.max_size {
            self.evict_tail();
        }

        let node = Node {
            method,
            path: Box::from(path),
            entry: CacheEntry {
                handler,
                params,
                last_access: self.tick,
            },
            prev: None,
            next: None,
        };
        let idx = match self.free.pop() {
            Some(slot) => {
                self.nodes[slot] = Some(node);
                slot
            }
            None => {
                self.nodes.push(Some(node));
                self.nodes.len() - 1
            }
        };
        self.attach_head(idx);
        self.maps[method.index()].insert(Box::from(path), idx);
    }

    /// Drop every entry and reset the counters.
    pub fn clear(&mut self) {
        for map in &mut self.maps {
            map.clear();
        }
        self.nodes.clear();
        self.free.clear();
        self.head = None;
        self.tail = None;
        self.tick = 0;
        self.hits = 0;
        self.misses = 0;
        self.evictions = 0;
    }

    /// Live entry count
    pub fn len(&self) -> usize {
        self.nodes.len() - self.free.len()
    }

    /// True when no entries are cached
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Counter snapshot
    pub fn stats(&self) -> CacheStats {
        let total = self.hits + self.misses;
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            evictions: self.evictions,
            hit_ratio: if total == 0 {
                0.0
            } else {
                self.hits as f64 / total as f64
            },
            size: self.len(),
            max_size: self.max_size,
        }
    }

    /// Path of the least recently used entry, if any (telemetry/tests)
    pub fn lru_path(&self) -> Option<&str> {
        self.tail.map(|idx| &*self.node(idx).path)
    }

    fn node(&self, idx: usize) -> &Node<T> {
        self.nodes[idx].as_ref().expect("linked slot is live")
    }

    fn node_mut(&mut self, idx: usize) -> &mut Node<T> {
        self.nodes[idx].as_mut().expect("linked slot is live")
    }

    fn evict_tail(&mut self) {
        let Some(idx) = self.tail else { return };
        self.detach(idx);
        // Take the node out so its owned key, entry and params drop now,
        // not when the slot is next reused.
        let node = self.nodes[idx].take().expect("linked slot is live");
        self.maps[node.method.index()].remove(&*node.path);
        self.free.push(idx);
        self.evictions += 1;
    }

    fn move_to_head(&mut self, idx: usize) {
        if self.head == Some(idx) {
            return;
        }
        self.detach(idx);
        self.attach_head(idx);
    }

    fn detach(&mut self, idx: usize) {
        let (prev, next) = {
            let node = self.node(idx);
            (node.prev, node.next)
        };
        match prev {
            Some(p) => self.node_mut(p).next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.node_mut(n).prev = prev,
            None => self.tail = prev,
        }
        let node = self.node_mut(idx);
        node.prev = None;
        node.next = None;
    }

    fn attach_head(&mut self, idx: usize) {
        let old_head = self.head;
        {
            let node = self.node_mut(idx);
            node.prev = None;
            node.next = old_head;
        }
        if let Some(old) = old_head {
            self.node_mut(old).prev = Some(idx);
        }
        self.head = Some(idx);
        if self.tail.is_none() {
            self.tail = Some(idx);
        }
    }

    #[cfg(test)]
    fn recency_order(&self) -> Vec<&str> {
        let mut order = Vec::new();
        let mut cursor = self.head;
        while let Some(idx) = cursor {
            let node = self.node(idx);
            order.push(&*node.path);
            cursor = node.next;
        }
        order
    }
}

impl<T> Default for RouteCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

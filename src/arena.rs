//! Scoped bump allocator
//!
//! Handlers and middlewares allocate request-lifetime scratch here instead of
//! the global allocator; everything is freed in one shot when the scope ends.
//! The [`MemoryManager`](crate::MemoryManager) keeps two of these, one reset
//! per request and one reset more often.
//!
//! Not thread-safe: one arena belongs to one worker.

use std::cell::RefCell;

/// Default chunk size (64 KiB)
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Monotonic bump allocator backed by a list of fixed-size chunks.
///
/// `alloc_*` hands out slices that borrow the arena; [`reset`](Arena::reset)
/// and [`free_all`](Arena::free_all) take `&mut self`, so the borrow checker
/// guarantees no allocation outlives its scope.
pub struct Arena {
    chunks: RefCell<Vec<Vec<u8>>>,
    // Allocations larger than a chunk; always dropped in full on reset so
    // one outlier request cannot pin its capacity forever
    oversized: RefCell<Vec<Vec<u8>>>,
    chunk_size: usize,
}

impl Arena {
    /// Create an arena with the default chunk size
    pub fn new() -> Self {
        Self::with_chunk_size(DEFAULT_CHUNK_SIZE)
    }

    /// Create an arena with a custom chunk size
    pub fn with_chunk_size(chunk_size: usize) -> Self {
        let chunk_size = chunk_size.max(64);
        Self {
            chunks: RefCell::new(vec![Vec::with_capacity(chunk_size)]),
            oversized: RefCell::new(Vec::new()),
            chunk_size,
        }
    }

    /// Copy `data` into the arena and return the arena-owned slice.
    pub fn alloc_bytes(&self, data: &[u8]) -> &[u8] {
        if data.is_empty() {
            return &[];
        }

        // Oversized allocations get a dedicated buffer on the side; the
        // bump chunks stay reserved for the common small case.
        if data.len() > self.chunk_size {
            let mut big = Vec::with_capacity(data.len());
            big.extend_from_slice(data);
            // SAFETY: `big` has exact capacity and is never appended to
            // again, so its buffer never moves; the arena keeps it alive
            // until a `&mut self` reset invalidates all loans.
            let slice = unsafe { std::slice::from_raw_parts(big.as_ptr(), data.len()) };
            self.oversized.borrow_mut().push(big);
            return slice;
        }

        let mut chunks = self.chunks.borrow_mut();
        let need_new = match chunks.last() {
            Some(cur) => cur.capacity() - cur.len() < data.len(),
            None => true,
        };
        if need_new {
            chunks.push(Vec::with_capacity(self.chunk_size));
        }

        let cur = chunks.last_mut().expect("arena chunk list never empty here");
        let start = cur.len();
        cur.extend_from_slice(data);
        // SAFETY: capacity was checked above, so extend_from_slice cannot
        // reallocate and the buffer address is stable. The region
        // [start, start+len) is initialized and never mutated again until
        // a `&mut self` reset, which invalidates all outstanding loans.
        unsafe { std::slice::from_raw_parts(cur.as_ptr().add(start), data.len()) }
    }

    /// Copy a string into the arena.
    pub fn alloc_str(&self, s: &str) -> &str {
        let bytes = self.alloc_bytes(s.as_bytes());
        // SAFETY: the bytes were copied from a valid &str
        unsafe { std::str::from_utf8_unchecked(bytes) }
    }

    /// Drop everything allocated this scope. The first bump chunk keeps its
    /// capacity for the next scope; oversized buffers are always released.
    pub fn reset(&mut self) {
        let chunks = self.chunks.get_mut();
        chunks.truncate(1);
        if let Some(first) = chunks.first_mut() {
            first.clear();
        }
        self.oversized.get_mut().clear();
    }

    /// Release every buffer back to the OS.
    pub fn free_all(&mut self) {
        self.chunks.get_mut().clear();
        self.oversized.get_mut().clear();
    }

    /// Bytes handed out since the last reset
    pub fn bytes_used(&self) -> usize {
        let chunks: usize = self.chunks.borrow().iter().map(Vec::len).sum();
        let oversized: usize = self.oversized.borrow().iter().map(Vec::len).sum();
        chunks + oversized
    }

    /// Bytes held from the OS, used or not
    pub fn bytes_reserved(&self) -> usize {
        let chunks: usize = self.chunks.borrow().iter().map(Vec::capacity).sum();
        let oversized: usize = self.oversized.borrow().iter().map(Vec::capacity).sum();
        chunks + oversized
    }

    /// Number of live buffers, bump chunks and oversized alike
    pub fn chunk_count(&self) -> usize {
        self.chunks.borrow().len() + self.oversized.borrow().len()
    }
}

impl Default for Arena {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Arena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Arena")
            .field("chunk_size", &self.chunk_size)
            .field("chunks", &self.chunk_count())
            .field("bytes_used", &self.bytes_used())
            .finish()
    }
}

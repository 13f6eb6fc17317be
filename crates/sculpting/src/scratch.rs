//! Reusable scratch buffers for per-tick mesh passes.
//!
//! Local-edit extraction needs index buffers sized to the whole mesh (a
//! unique-face list and a vertex remap table) on every redraw. Allocating
//! them each tick churns the allocator on large meshes, so they are checked
//! out of a pool keyed by `(kind, capacity)` and checked back in when the
//! pass finishes. Contents of a checked-out buffer are stale and must be
//! guarded by the caller (the mesh uses generation tags for that).

use std::collections::HashMap;
use std::ops::{Deref, DerefMut};

use tracing::trace;

/// What a scratch buffer is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScratchKind {
    /// De-duplicated touched face ids
    UniqueFaces,
    /// Old vertex id -> compact vertex id
    VertexRemap,
}

/// A buffer checked out of a [`ScratchPool`].
#[derive(Debug)]
pub struct ScratchBuffer {
    kind: ScratchKind,
    data: Vec<u32>,
}

impl ScratchBuffer {
    pub fn kind(&self) -> ScratchKind {
        self.kind
    }
}

impl Deref for ScratchBuffer {
    type Target = [u32];

    fn deref(&self) -> &[u32] {
        &self.data
    }
}

impl DerefMut for ScratchBuffer {
    fn deref_mut(&mut self) -> &mut [u32] {
        &mut self.data
    }
}

/// Pool of `u32` scratch buffers keyed by kind and capacity.
#[derive(Debug, Default)]
pub struct ScratchPool {
    free: HashMap<(ScratchKind, usize), Vec<Vec<u32>>>,
    outstanding: usize,
}

impl ScratchPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check out a buffer of exactly `capacity` entries with unspecified contents.
    pub fn checkout(&mut self, kind: ScratchKind, capacity: usize) -> ScratchBuffer {
        self.outstanding += 1;
        let data = match self.free.get_mut(&(kind, capacity)).and_then(Vec::pop) {
            Some(data) => data,
            None => {
                trace!("scratch pool: allocating {:?} x{}", kind, capacity);
                vec![0; capacity]
            }
        };
        ScratchBuffer { kind, data }
    }

    /// Return a buffer to the pool.
    pub fn checkin(&mut self, buffer: ScratchBuffer) {
        debug_assert!(self.outstanding > 0, "scratch buffer returned twice");
        self.outstanding = self.outstanding.saturating_sub(1);
        let key = (buffer.kind, buffer.data.len());
        self.free.entry(key).or_default().push(buffer.data);
    }

    /// Buffers currently checked out.
    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    /// Buffers idle in the pool.
    pub fn idle(&self) -> usize {
        self.free.values().map(Vec::len).sum()
    }

    /// Drop every idle buffer (e.g. after the mesh shrinks).
    pub fn clear(&mut self) {
        self.free.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkout_reuses_returned_buffer() {
        let mut pool = ScratchPool::new();
        let mut buf = pool.checkout(ScratchKind::VertexRemap, 8);
        assert_eq!(buf.len(), 8);
        buf[3] = 42;
        assert_eq!(pool.outstanding(), 1);
        pool.checkin(buf);
        assert_eq!(pool.outstanding(), 0);
        assert_eq!(pool.idle(), 1);

        let again = pool.checkout(ScratchKind::VertexRemap, 8);
        assert_eq!(again[3], 42);
        assert_eq!(pool.idle(), 0);
        pool.checkin(again);
    }

    #[test]
    fn test_pool_is_keyed_by_kind_and_capacity() {
        let mut pool = ScratchPool::new();
        let faces = pool.checkout(ScratchKind::UniqueFaces, 4);
        pool.checkin(faces);

        let remap = pool.checkout(ScratchKind::VertexRemap, 4);
        assert_eq!(pool.idle(), 1);
        let bigger = pool.checkout(ScratchKind::UniqueFaces, 16);
        assert_eq!(bigger.len(), 16);
        assert_eq!(pool.idle(), 1);
        pool.checkin(remap);
        pool.checkin(bigger);
        assert_eq!(pool.idle(), 3);
    }
}

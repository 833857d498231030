//! Node identity and id generation.
//!
//! Ids are unique within a document and stable across in-place edits; new
//! ids are minted only for newly created nodes (the right half of a split,
//! the pieces of a mark-range split). The generator is injectable so tests
//! can produce deterministic ids; production code uses the process-wide
//! [`global_ids`] instance.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

use rand::Rng;

/// Stable identity of a node within a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Source of fresh node ids.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> NodeId;
}

/// Deterministic counter, for tests and reproducible imports.
pub struct SequentialIdGenerator {
    next: AtomicU64,
}

impl SequentialIdGenerator {
    pub fn new(start: u64) -> Self {
        Self {
            next: AtomicU64::new(start),
        }
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn next_id(&self) -> NodeId {
        NodeId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

/// Process-wide generator: a random session prefix in the high bits plus an
/// atomic counter, so ids minted by different processes editing the same
/// document do not collide.
pub struct SessionIdGenerator {
    session: u64,
    counter: AtomicU64,
}

impl SessionIdGenerator {
    pub fn new() -> Self {
        let session = rand::thread_rng().gen_range(1..=0xFFFFu64);
        Self {
            session,
            counter: AtomicU64::new(1),
        }
    }
}

impl Default for SessionIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdGenerator for SessionIdGenerator {
    fn next_id(&self) -> NodeId {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        NodeId(self.session << 48 | n)
    }
}

/// The process-lifetime generator used when no generator is injected.
pub fn global_ids() -> &'static SessionIdGenerator {
    static IDS: OnceLock<SessionIdGenerator> = OnceLock::new();
    IDS.get_or_init(SessionIdGenerator::new)
}

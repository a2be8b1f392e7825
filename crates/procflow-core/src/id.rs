//! Injectable identifier allocation for graphs and nodes.

use std::sync::atomic::{AtomicU64, Ordering};

use procflow_types::graph::GraphId;
use uuid::Uuid;

pub trait IdAllocator: Send + Sync {
    fn graph_id(&self) -> GraphId;

    fn node_id(&self) -> String;
}

/// Production allocator: UUID v7 graph ids, `node-<uuid>` node ids.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidIdAllocator;

impl IdAllocator for UuidIdAllocator {
    fn graph_id(&self) -> GraphId {
        GraphId::new()
    }

    fn node_id(&self) -> String {
        format!("node-{}", Uuid::now_v7().simple())
    }
}

/// Deterministic allocator: `node-1`, `node-2`, ... and graph ids built from
/// the same counter.
#[derive(Debug, Default)]
pub struct SequentialIdAllocator {
    next: AtomicU64,
}

impl SequentialIdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    fn bump(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed) + 1
    }
}

impl IdAllocator for SequentialIdAllocator {
    fn graph_id(&self) -> GraphId {
        GraphId::from_uuid(Uuid::from_u128(u128::from(self.bump())))
    }

    fn node_id(&self) -> String {
        format!("node-{}", self.bump())
    }
}

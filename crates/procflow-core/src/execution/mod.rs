//! Run engine: the per-run [`executor::GraphExecutor`] and the
//! [`coordinator::ExecutionService`] that deduplicates and routes runs.

pub mod coordinator;
pub mod executor;

#[cfg(test)]
pub(crate) mod testing;

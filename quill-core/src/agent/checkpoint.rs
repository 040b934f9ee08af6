//! Checkpoint hook invoked before mutating tools.
//!
//! The store is pluggable: an external version store can snapshot files and
//! conversation so a later restore can revert both. Failures are logged and
//! never block the tool call.

use async_trait::async_trait;

/// External version store contract.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Record a checkpoint labelled with the tool about to run.
    async fn checkpoint(&self, label: &str) -> anyhow::Result<()>;
}

/// No-op store used when checkpointing is not configured.
pub struct NoCheckpoints;

#[async_trait]
impl CheckpointStore for NoCheckpoints {
    async fn checkpoint(&self, _label: &str) -> anyhow::Result<()> {
        Ok(())
    }
}

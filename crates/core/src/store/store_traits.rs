//! Store trait implemented by storage backends.

use async_trait::async_trait;

use super::{Pipeline, StoreCommand, StoreReply};
use crate::errors::StoreError;

/// A key-value store offering sets and score-ordered sets.
///
/// Implementations must serialise each pipeline against other callers: commands from two
/// concurrent pipelines never interleave. Nothing stronger is promised for non-atomic pipelines.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Execute one command.
    async fn execute(&self, command: StoreCommand) -> Result<StoreReply, StoreError>;

    /// Execute a batch in one round-trip, returning one reply per command in order.
    async fn execute_pipeline(&self, pipeline: Pipeline) -> Result<Vec<StoreReply>, StoreError>;
}

//! Remote command execution seam
//!
//! Every endpoint operation reduces to one call of [`RemoteExecutor::execute`].

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use super::error::CommandExecutionError;

/// A place shell commands can run, typically a VM.
///
/// Implementations run `commands` in order and fail on the first non-zero
/// exit, transport error or when `timeout` elapses.
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    /// Diagnostic name of the target
    fn name(&self) -> &str;

    /// Run commands on the target
    async fn execute(
        &self,
        commands: &[String],
        timeout: Duration,
    ) -> Result<(), CommandExecutionError>;
}

/// Shared, non-owning handle to a target
pub type RemoteTarget = Arc<dyn RemoteExecutor>;

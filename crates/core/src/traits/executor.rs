//! Domain action execution

use async_trait::async_trait;

use crate::action::{Action, ActionResult, ExecutionError};
use crate::conversation::ExecutionContext;

/// Executes resolved actions against the farm's records.
///
/// Implementations must deduplicate on `action.idempotency_key`: the retry
/// queue replays an action after an ambiguous failure such as a timeout.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    async fn execute(
        &self,
        action: &Action,
        context: &ExecutionContext,
    ) -> Result<ActionResult, ExecutionError>;
}

/// Connectivity check consulted before each retry pass
#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    async fn is_online(&self) -> bool;
}

/// Probe for deployments where the executor is always reachable
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysOnline;

#[async_trait]
impl ConnectivityProbe for AlwaysOnline {
    async fn is_online(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_always_online_behind_trait_object() {
        let probe: Arc<dyn ConnectivityProbe> = Arc::new(AlwaysOnline);
        assert!(probe.is_online().await);
    }
}

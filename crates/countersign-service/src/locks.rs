use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

/// One async mutex per workflow id.
///
/// Commands on the same workflow run one at a time; different workflows
/// never wait on each other. Idle entries are dropped on the next lookup.
#[derive(Debug, Default)]
pub(crate) struct WorkflowLocks {
  locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl WorkflowLocks {
  pub(crate) async fn lock(&self, workflow_id: &str) -> OwnedMutexGuard<()> {
    let lock = {
      let mut locks = self.locks.lock().await;
      // Only the map holds an idle lock; guards and waiters hold clones.
      locks.retain(|_, lock| Arc::strong_count(lock) > 1);
      locks.entry(workflow_id.to_string()).or_default().clone()
    };
    lock.lock_owned().await
  }

  #[cfg(test)]
  async fn len(&self) -> usize {
    self.locks.lock().await.len()
  }
}

use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};

/// Exclusive guard serialising robot start-up across all queues.
///
/// Clones share the same underlying mutex. Create one per process and
/// hand clones to every component that spawns robots.
#[derive(Debug, Clone, Default)]
pub struct SpawnLock {
    inner: Arc<Mutex<()>>,
}

impl SpawnLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access. Released when the guard is dropped.
    pub async fn acquire(&self) -> MutexGuard<'_, ()> {
        self.inner.lock().await
    }
}

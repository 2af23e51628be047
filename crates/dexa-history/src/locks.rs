use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, Weak};

use tokio::sync::{Mutex, OwnedMutexGuard};

/// Per-session mutual exclusion.
///
/// One async mutex per session id. The table keeps only weak references:
/// a mutex lives exactly as long as some turn holds or waits on it, and
/// dead entries are pruned on the next acquire.
#[derive(Default)]
pub struct SessionLocks {
    live: StdMutex<HashMap<String, Weak<Mutex<()>>>>,
}

impl SessionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to a session. Released when the guard drops.
    pub async fn acquire(&self, session_id: &str) -> OwnedMutexGuard<()> {
        self.lock_for(session_id).lock_owned().await
    }

    /// Sessions with a turn running or queued.
    pub fn active_sessions(&self) -> usize {
        let mut live = self.live.lock().unwrap_or_else(|e| e.into_inner());
        live.retain(|_, lock| lock.strong_count() > 0);
        live.len()
    }

    fn lock_for(&self, session_id: &str) -> Arc<Mutex<()>> {
        // Never held across an await; a poisoned table is still consistent.
        let mut live = self.live.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(lock) = live.get(session_id).and_then(Weak::upgrade) {
            return lock;
        }

        live.retain(|_, lock| lock.strong_count() > 0);
        let lock = Arc::new(Mutex::new(()));
        live.insert(session_id.to_string(), Arc::downgrade(&lock));
        lock
    }
}

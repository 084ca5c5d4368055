//! Cancellation side-channel.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// How long a cancellation signal is retained. Long enough for any agent's
/// watch poll cycle to observe it.
const PURGE_AFTER: Duration = Duration::from_secs(300);

/// Records cancelled builds so long-pollers on any of the build's stages
/// can observe the signal.
pub(crate) struct Canceller {
    cancelled: Mutex<HashMap<i64, Instant>>,
}

impl Canceller {
    pub fn new() -> Self {
        Self {
            cancelled: Mutex::new(HashMap::new()),
        }
    }

    pub fn cancel(&self, build_id: i64) {
        let mut cancelled = self.cancelled.lock();
        let now = Instant::now();
        cancelled.retain(|_, at| now.duration_since(*at) < PURGE_AFTER);
        cancelled.insert(build_id, now);
    }

    pub fn cancelled(&self, build_id: i64) -> bool {
        self.cancelled.lock().contains_key(&build_id)
    }
}

//! In-memory archive of completed step logs.

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::HashMap;

use conveyor_core::service::LogStore;
use conveyor_core::{Error, Result};

/// Write-once archive keyed by step id, populated when the agent uploads
/// the full logs at step completion.
#[derive(Default)]
pub struct MemLogStore {
    data: Mutex<HashMap<i64, Bytes>>,
}

impl MemLogStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LogStore for MemLogStore {
    async fn find(&self, step_id: i64) -> Result<Bytes> {
        self.data
            .lock()
            .get(&step_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("logs for step {step_id}")))
    }

    async fn create(&self, step_id: i64, data: Bytes) -> Result<()> {
        self.data.lock().insert(step_id, data);
        Ok(())
    }
}

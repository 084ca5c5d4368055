//! User table.

use async_trait::async_trait;

use conveyor_core::store::UserStore;
use conveyor_core::user::User;
use conveyor_core::{Error, Result};

use crate::MemStore;

#[async_trait]
impl UserStore for MemStore {
    async fn find(&self, id: i64) -> Result<User> {
        self.tables
            .lock()
            .users
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("user {id}")))
    }
}

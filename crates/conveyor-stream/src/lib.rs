//! In-process event and log streaming for the Conveyor CI server.
//!
//! This crate contains:
//! - The pub/sub hub that fans build events out to UI sessions
//! - The live log streamer that buffers in-flight step output
//! - The in-memory archive for completed step logs

mod hub;
mod livelog;
mod logstore;

pub use hub::Hub;
pub use livelog::LiveLogs;
pub use logstore::MemLogStore;

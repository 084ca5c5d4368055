//! Build manager for the Conveyor CI server.
//!
//! The manager is the façade agents talk to: it composes the stores, the
//! scheduler and the notification collaborators into the operations of the
//! stage lifecycle — request, accept, details, step and stage boundaries,
//! log streaming, watch and cancel. It owns no state of its own.

mod canceler;
mod manager;
mod setup;
mod teardown;
mod updater;

pub use manager::{BuildManager, Context, Manager};

#[cfg(test)]
pub(crate) mod testutil;

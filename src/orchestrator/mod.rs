//! Container group orchestration.
//!
//! [`Provisioner`] owns the create workflow and passes get, delete, logs
//! and exec through to the backend. `hosts` builds the sibling
//! registration script run inside the first container.

pub mod hosts;
pub mod provisioner;

pub use provisioner::Provisioner;

//! Domain model module declarations.

pub mod group;
pub mod progress;

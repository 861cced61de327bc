//! Audit events describing every mutation and view of the tag index.

mod audit_event;
mod audit_sink;

pub use audit_event::*;
pub use audit_sink::*;

//! Destination for audit events emitted after index operations.

use async_trait::async_trait;

use super::AuditEvent;
use crate::errors::Result;

/// Receives audit events once the store has acknowledged the operation they describe.
///
/// Runtime wiring decides where events go: the broker channel in production, a recorder in
/// tests, nowhere with [`NoOpAuditSink`].
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn emit(&self, event: AuditEvent) -> Result<()>;
}

/// Sink that discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpAuditSink;

#[async_trait]
impl AuditSink for NoOpAuditSink {
    async fn emit(&self, _event: AuditEvent) -> Result<()> {
        Ok(())
    }
}

/// What the index does when an audit event cannot be emitted after a successful mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuditFailurePolicy {
    /// Log the lost event and report the mutation as successful.
    #[default]
    LogAndContinue,
    /// Report the operation as failed even though the store applied it.
    Fail,
}

impl std::str::FromStr for AuditFailurePolicy {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "log" | "log_and_continue" => Ok(Self::LogAndContinue),
            "fail" => Ok(Self::Fail),
            other => Err(format!("unknown audit failure policy '{}'", other)),
        }
    }
}

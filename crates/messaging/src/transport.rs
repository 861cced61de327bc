//! Transport seam between the channel and a concrete broker.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::BrokerError;

/// Whether the broker must keep a message across its own restarts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    Transient,
    Persistent,
}

/// Per-message publish metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishProperties {
    pub message_id: String,
    pub content_type: &'static str,
    pub delivery_mode: DeliveryMode,
}

impl PublishProperties {
    pub fn new(delivery_mode: DeliveryMode) -> Self {
        Self {
            message_id: Uuid::new_v4().to_string(),
            content_type: "application/json",
            delivery_mode,
        }
    }

    pub fn persistent() -> Self {
        Self::new(DeliveryMode::Persistent)
    }

    pub fn transient() -> Self {
        Self::new(DeliveryMode::Transient)
    }
}

/// Opens connections to a broker.
#[async_trait]
pub trait BrokerTransport: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn BrokerConnection>, BrokerError>;
}

/// A live broker connection.
#[async_trait]
pub trait BrokerConnection: Send + Sync {
    /// Declare a point-to-point queue; `durable` queues survive broker restarts.
    async fn declare_queue(&self, name: &str, durable: bool) -> Result<(), BrokerError>;

    /// Declare an exchange copying every message to all bound consumers.
    async fn declare_fanout_exchange(&self, name: &str) -> Result<(), BrokerError>;

    /// Publish `body`. An empty `exchange` routes directly to the queue named `routing_key`.
    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        body: Vec<u8>,
        properties: PublishProperties,
    ) -> Result<(), BrokerError>;

    fn is_open(&self) -> bool;

    async fn close(&self) -> Result<(), BrokerError>;
}

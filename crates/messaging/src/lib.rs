//! # linktag-messaging
//!
//! Publishing side of the link tagging service's message broker:
//! - [`ResilientChannel`]: reconnecting publisher for work items and audit events
//! - [`BrokerTransport`] / [`BrokerConnection`]: the seam a concrete broker client plugs into
//! - [`AmqpTransport`]: AMQP 0-9-1 transport for RabbitMQ
//! - [`MemoryBroker`]: in-process broker for local runs and tests

mod amqp;
mod channel;
mod error;
mod memory;
mod state;
mod transport;

pub use amqp::{AmqpConnection, AmqpTransport};
pub use channel::{ChannelConfig, ResilientChannel, AUDIT_EXCHANGE, EVENT_TIME_FIELD, WORK_QUEUE};
pub use error::{BrokerError, ChannelError, Result};
pub use memory::{Delivery, MemoryBroker};
pub use state::ConnectionState;
pub use transport::{BrokerConnection, BrokerTransport, DeliveryMode, PublishProperties};

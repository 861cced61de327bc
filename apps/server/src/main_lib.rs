//! Wiring of the index, store and broker behind the HTTP API.

use std::sync::Arc;

use anyhow::Context;
use linktag_core::{KeyValueStore, TagIndex, TagIndexServiceTrait};
use linktag_messaging::{
    AmqpTransport, BrokerTransport, ChannelConfig, MemoryBroker, ResilientChannel, AUDIT_EXCHANGE,
};
use linktag_storage_memory::MemoryStore;
use linktag_storage_redis::RedisStore;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::{BrokerBackend, Config, StoreBackend};

/// State shared by every request handler.
pub struct AppState {
    pub tag_index: Arc<dyn TagIndexServiceTrait>,
    pub listing_per_page: u64,
}

/// Long-lived services owned by the process.
pub struct Services {
    pub state: Arc<AppState>,
    pub channel: Arc<ResilientChannel>,
    /// Set when the in-process broker is in use
    pub broker: Option<MemoryBroker>,
}

/// Connect the store and broker channel and build the index on top of them.
///
/// Fails when the broker cannot be reached within the configured retries, or when
/// Redis refuses the first connection.
pub async fn init(config: &Config) -> anyhow::Result<Services> {
    let (transport, broker): (Arc<dyn BrokerTransport>, Option<MemoryBroker>) =
        match &config.broker {
            BrokerBackend::Amqp(url) => (Arc::new(AmqpTransport::new(url.as_str())), None),
            BrokerBackend::Memory => {
                warn!("LINKAPP_RABBIT_URL not set, publishing to an in-process broker");
                let broker = MemoryBroker::new();
                (Arc::new(broker.clone()), Some(broker))
            }
        };
    let channel_config = ChannelConfig::default().with_retry_policy(config.broker_retry);
    let channel = Arc::new(
        ResilientChannel::connect(transport, channel_config)
            .await
            .context("Failed to connect to the message broker")?,
    );
    info!(broker = config.broker.kind(), "Broker channel connected");

    let store: Arc<dyn KeyValueStore> = match &config.store {
        StoreBackend::Redis(url) => Arc::new(
            RedisStore::connect(url)
                .await
                .context("Failed to connect to Redis")?,
        ),
        StoreBackend::Memory => {
            warn!("LINKAPP_REDIS_URL not set, keeping the index in memory");
            Arc::new(MemoryStore::new())
        }
    };
    info!(store = config.store.kind(), "Store ready");

    let tag_index = TagIndex::new(store)
        .with_audit_sink(channel.clone())
        .with_audit_failure_policy(config.audit_failure);

    let state = Arc::new(AppState {
        tag_index: Arc::new(tag_index),
        listing_per_page: config.listing_per_page,
    });

    Ok(Services {
        state,
        channel,
        broker,
    })
}

/// Log every event published to the audit exchange until the broker goes away.
pub fn spawn_audit_logger(broker: &MemoryBroker) -> JoinHandle<()> {
    let mut events = broker.subscribe(AUDIT_EXCHANGE);
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(delivery) => {
                    let body = String::from_utf8_lossy(&delivery.body);
                    info!(target: "audit", message_id = %delivery.properties.message_id, "{}", body);
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Audit logger fell behind, events skipped");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

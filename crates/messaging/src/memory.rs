//! In-process broker used for local runs and tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use log::debug;
use tokio::sync::broadcast;

use crate::error::BrokerError;
use crate::transport::{BrokerConnection, BrokerTransport, PublishProperties};

const FANOUT_CAPACITY: usize = 1024;

/// A message as handed to a consumer.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub exchange: String,
    pub routing_key: String,
    pub body: Vec<u8>,
    pub properties: PublishProperties,
}

impl Delivery {
    pub fn json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::from_slice(&self.body)
    }
}

#[derive(Default)]
struct Topology {
    queues: HashMap<String, VecDeque<Delivery>>,
    exchanges: HashMap<String, broadcast::Sender<Delivery>>,
}

#[derive(Default)]
struct BrokerState {
    topology: Mutex<Topology>,
    /// Bumped by `drop_connections`; connections from older epochs are dead.
    epoch: AtomicU64,
    connect_attempts: AtomicU32,
    refuse_connects: AtomicU32,
    fail_publishes: AtomicU32,
}

impl BrokerState {
    fn topology(&self) -> MutexGuard<'_, Topology> {
        // A poisoned lock only means a test panicked mid-publish; the map is still usable.
        self.topology.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Broker holding durable queues and fanout exchanges in memory.
///
/// Cloning yields another handle to the same broker. Fault injection hooks let tests
/// refuse connects, fail publishes and drop every open connection.
#[derive(Clone, Default)]
pub struct MemoryBroker {
    state: Arc<BrokerState>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse the next `count` connection attempts.
    pub fn refuse_next_connects(&self, count: u32) {
        self.state.refuse_connects.store(count, Ordering::SeqCst);
    }

    /// Make the next `count` publishes fail as if the connection had dropped mid-call.
    pub fn fail_next_publishes(&self, count: u32) {
        self.state.fail_publishes.store(count, Ordering::SeqCst);
    }

    /// Close every connection opened so far.
    pub fn drop_connections(&self) {
        self.state.epoch.fetch_add(1, Ordering::SeqCst);
    }

    /// Connection attempts seen, refused ones included.
    pub fn connect_attempts(&self) -> u32 {
        self.state.connect_attempts.load(Ordering::SeqCst)
    }

    pub fn has_queue(&self, name: &str) -> bool {
        self.state.topology().queues.contains_key(name)
    }

    pub fn has_exchange(&self, name: &str) -> bool {
        self.state.topology().exchanges.contains_key(name)
    }

    /// Snapshot of the messages waiting on `queue`, oldest first.
    pub fn queued(&self, queue: &str) -> Vec<Delivery> {
        self.state
            .topology()
            .queues
            .get(queue)
            .map(|messages| messages.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Take the oldest message from `queue`.
    pub fn pop(&self, queue: &str) -> Option<Delivery> {
        self.state
            .topology()
            .queues
            .get_mut(queue)
            .and_then(VecDeque::pop_front)
    }

    /// Bind a new consumer to the fanout `exchange`, declaring it if needed.
    pub fn subscribe(&self, exchange: &str) -> broadcast::Receiver<Delivery> {
        self.state
            .topology()
            .exchanges
            .entry(exchange.to_string())
            .or_insert_with(|| broadcast::channel(FANOUT_CAPACITY).0)
            .subscribe()
    }

    fn take_fault(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl BrokerTransport for MemoryBroker {
    async fn connect(&self) -> Result<Box<dyn BrokerConnection>, BrokerError> {
        let attempt = self.state.connect_attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if Self::take_fault(&self.state.refuse_connects) {
            debug!("MemoryBroker refusing connection attempt {}", attempt);
            return Err(BrokerError::refused("broker is not accepting connections"));
        }
        Ok(Box::new(MemoryConnection {
            state: Arc::clone(&self.state),
            epoch: self.state.epoch.load(Ordering::SeqCst),
            closed: AtomicBool::new(false),
        }))
    }
}

struct MemoryConnection {
    state: Arc<BrokerState>,
    epoch: u64,
    closed: AtomicBool,
}

impl MemoryConnection {
    fn ensure_open(&self) -> Result<(), BrokerError> {
        if self.is_open() {
            Ok(())
        } else {
            Err(BrokerError::ConnectionClosed)
        }
    }
}

#[async_trait]
impl BrokerConnection for MemoryConnection {
    async fn declare_queue(&self, name: &str, _durable: bool) -> Result<(), BrokerError> {
        self.ensure_open()?;
        self.state
            .topology()
            .queues
            .entry(name.to_string())
            .or_default();
        Ok(())
    }

    async fn declare_fanout_exchange(&self, name: &str) -> Result<(), BrokerError> {
        self.ensure_open()?;
        self.state
            .topology()
            .exchanges
            .entry(name.to_string())
            .or_insert_with(|| broadcast::channel(FANOUT_CAPACITY).0);
        Ok(())
    }

    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        body: Vec<u8>,
        properties: PublishProperties,
    ) -> Result<(), BrokerError> {
        self.ensure_open()?;
        if MemoryBroker::take_fault(&self.state.fail_publishes) {
            self.closed.store(true, Ordering::SeqCst);
            return Err(BrokerError::ConnectionClosed);
        }

        let delivery = Delivery {
            exchange: exchange.to_string(),
            routing_key: routing_key.to_string(),
            body,
            properties,
        };
        let mut topology = self.state.topology();
        if exchange.is_empty() {
            match topology.queues.get_mut(routing_key) {
                Some(queue) => queue.push_back(delivery),
                None => debug!("MemoryBroker dropping unroutable message for '{}'", routing_key),
            }
            return Ok(());
        }

        let sender = topology
            .exchanges
            .get(exchange)
            .ok_or_else(|| BrokerError::channel(format!("no exchange '{}'", exchange)))?;
        // No bound consumers is not an error for a fanout exchange.
        let _ = sender.send(delivery);
        Ok(())
    }

    fn is_open(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
            && self.epoch == self.state.epoch.load(Ordering::SeqCst)
    }

    async fn close(&self) -> Result<(), BrokerError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn open(broker: &MemoryBroker) -> Box<dyn BrokerConnection> {
        broker.connect().await.unwrap()
    }

    #[tokio::test]
    async fn durable_queue_keeps_messages_until_popped() {
        let broker = MemoryBroker::new();
        let conn = open(&broker).await;
        conn.declare_queue("jobs", true).await.unwrap();

        for body in [b"1".to_vec(), b"2".to_vec()] {
            conn.publish("", "jobs", body, PublishProperties::persistent())
                .await
                .unwrap();
        }

        assert_eq!(broker.queued("jobs").len(), 2);
        assert_eq!(broker.pop("jobs").unwrap().body, b"1");
        assert_eq!(broker.pop("jobs").unwrap().body, b"2");
        assert!(broker.pop("jobs").is_none());
    }

    #[tokio::test]
    async fn publishing_to_an_undeclared_exchange_fails() {
        let broker = MemoryBroker::new();
        let conn = open(&broker).await;

        let err = conn
            .publish("missing", "", b"{}".to_vec(), PublishProperties::transient())
            .await
            .unwrap_err();
        assert!(matches!(err, BrokerError::Channel(_)));
    }

    #[tokio::test]
    async fn dropped_connections_report_closed() {
        let broker = MemoryBroker::new();
        let conn = open(&broker).await;
        broker.drop_connections();

        assert!(!conn.is_open());
        let err = conn.declare_queue("jobs", true).await.unwrap_err();
        assert!(err.is_connection_closed());
        assert!(open(&broker).await.is_open());
    }

    #[tokio::test]
    async fn refused_connects_are_counted() {
        let broker = MemoryBroker::new();
        broker.refuse_next_connects(2);

        assert!(broker.connect().await.is_err());
        assert!(broker.connect().await.is_err());
        assert!(broker.connect().await.is_ok());
        assert_eq!(broker.connect_attempts(), 3);
    }
}

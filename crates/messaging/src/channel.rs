//! Broker channel that survives dropped connections.
//!
//! The channel owns one connection at a time. Connecting retries under a
//! [`RetryPolicy`]; a publish that finds the connection closed reconnects and is
//! retried exactly once. Each successful connect bumps a generation counter so
//! that concurrent publishers failing on the same dead connection trigger a
//! single reconnect between them. Likewise, publishers queued behind a reconnect
//! that exhausts the policy share its failure instead of starting their own.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use linktag_core::events::{AuditEvent, AuditSink};
use linktag_core::utils::time::{now_rfc3339, Clock, SystemClock};
use linktag_core::RetryPolicy;
use log::{debug, info, warn};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::time::sleep;

use crate::error::{BrokerError, ChannelError, Result};
use crate::state::ConnectionState;
use crate::transport::{BrokerConnection, BrokerTransport, PublishProperties};

/// Durable point-to-point queue for background work items.
pub const WORK_QUEUE: &str = "tag_jobs";

/// Fanout exchange for audit events.
pub const AUDIT_EXCHANGE: &str = "tag_logs";

/// Field stamped onto every audit event at publish time.
pub const EVENT_TIME_FIELD: &str = "time";

/// Names and retry behaviour of a [`ResilientChannel`].
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    pub retry_policy: RetryPolicy,
    pub work_queue: String,
    pub audit_exchange: String,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            retry_policy: RetryPolicy::default(),
            work_queue: WORK_QUEUE.to_string(),
            audit_exchange: AUDIT_EXCHANGE.to_string(),
        }
    }
}

impl ChannelConfig {
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }
}

struct Inner {
    state: ConnectionState,
    connection: Option<Arc<dyn BrokerConnection>>,
    generation: u64,
    /// Outcome of the most recent reconnect that exhausted the retry policy.
    last_failure: Option<(u32, BrokerError)>,
}

impl Inner {
    fn transition(&mut self, next: ConnectionState) {
        if !self.state.can_transition_to(&next) {
            warn!(
                "[ResilientChannel] Unexpected transition {:?} -> {:?}",
                self.state, next
            );
        }
        debug!("[ResilientChannel] {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    fn live_connection(&self) -> Option<Arc<dyn BrokerConnection>> {
        match (&self.state, &self.connection) {
            (ConnectionState::Connected, Some(conn)) if conn.is_open() => Some(Arc::clone(conn)),
            _ => None,
        }
    }
}

/// Publishes work items and audit events over a self-healing broker connection.
pub struct ResilientChannel {
    transport: Arc<dyn BrokerTransport>,
    config: ChannelConfig,
    clock: Arc<dyn Clock>,
    inner: Mutex<Inner>,
    /// Bumped each time a reconnect gives up; read without holding `inner`.
    failed_rounds: AtomicU64,
}

impl ResilientChannel {
    /// Connect to the broker and declare the work queue and audit exchange.
    ///
    /// Fails with [`ChannelError::RetryExhausted`] once every attempt the policy
    /// allows has failed.
    pub async fn connect(
        transport: Arc<dyn BrokerTransport>,
        config: ChannelConfig,
    ) -> Result<Self> {
        Self::connect_with_clock(transport, config, Arc::new(SystemClock)).await
    }

    /// Like [`ResilientChannel::connect`], stamping event times from `clock`.
    pub async fn connect_with_clock(
        transport: Arc<dyn BrokerTransport>,
        config: ChannelConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let channel = Self {
            transport,
            config,
            clock,
            inner: Mutex::new(Inner {
                state: ConnectionState::Disconnected,
                connection: None,
                generation: 0,
                last_failure: None,
            }),
            failed_rounds: AtomicU64::new(0),
        };
        {
            let mut inner = channel.inner.lock().await;
            channel.establish(&mut inner).await?;
        }
        Ok(channel)
    }

    pub async fn state(&self) -> ConnectionState {
        self.inner.lock().await.state
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// Publish a work item to the durable work queue as a persistent message.
    pub async fn publish_work_item<T: Serialize + ?Sized>(&self, payload: &T) -> Result<()> {
        let body = serde_json::to_vec(payload)?;
        self.publish(
            "",
            &self.config.work_queue,
            body,
            PublishProperties::persistent(),
        )
        .await
    }

    /// Publish an audit event to every subscriber of the audit exchange.
    ///
    /// The payload must serialize to a JSON object; it is stamped with the
    /// current time under [`EVENT_TIME_FIELD`].
    pub async fn publish_event<T: Serialize + ?Sized>(&self, payload: &T) -> Result<()> {
        let body = self.stamp_event(payload)?;
        self.publish(
            &self.config.audit_exchange,
            "",
            body,
            PublishProperties::transient(),
        )
        .await
    }

    /// Close the connection. Later publishes fail with [`ChannelError::Closed`].
    pub async fn close(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.state == ConnectionState::Closed {
            return Ok(());
        }
        let connection = inner.connection.take();
        inner.transition(ConnectionState::Closed);
        drop(inner);

        if let Some(conn) = connection {
            conn.close().await?;
        }
        info!("[ResilientChannel] Closed");
        Ok(())
    }

    fn stamp_event<T: Serialize + ?Sized>(&self, payload: &T) -> Result<Vec<u8>> {
        let mut value = serde_json::to_value(payload)?;
        let Value::Object(fields) = &mut value else {
            return Err(ChannelError::invalid_payload(
                "audit events must serialize to a JSON object",
            ));
        };
        fields.insert(
            EVENT_TIME_FIELD.to_string(),
            Value::String(now_rfc3339(self.clock.as_ref())),
        );
        Ok(serde_json::to_vec(&value)?)
    }

    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        body: Vec<u8>,
        properties: PublishProperties,
    ) -> Result<()> {
        let (conn, generation) = self.current().await?;
        match conn
            .publish(exchange, routing_key, body.clone(), properties.clone())
            .await
        {
            Ok(()) => Ok(()),
            Err(err) if err.is_connection_closed() => {
                warn!(
                    "[ResilientChannel] Connection lost while publishing to '{}{}', reconnecting",
                    exchange, routing_key
                );
                let conn = self.reconnect_after(generation).await?;
                conn.publish(exchange, routing_key, body, properties)
                    .await
                    .map_err(ChannelError::from)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// The live connection, reconnecting first if there is none.
    async fn current(&self) -> Result<(Arc<dyn BrokerConnection>, u64)> {
        let failed_rounds = self.failed_rounds.load(Ordering::Acquire);
        let mut inner = self.inner.lock().await;
        if inner.state == ConnectionState::Closed {
            return Err(ChannelError::Closed);
        }
        if let Some(conn) = inner.live_connection() {
            return Ok((conn, inner.generation));
        }
        if let Some(err) = self.failed_while_queued(&inner, failed_rounds) {
            return Err(err);
        }
        let conn = self.establish(&mut inner).await?;
        Ok((conn, inner.generation))
    }

    /// Reconnect unless another publisher already replaced the connection that
    /// was current at `generation`.
    async fn reconnect_after(&self, generation: u64) -> Result<Arc<dyn BrokerConnection>> {
        let failed_rounds = self.failed_rounds.load(Ordering::Acquire);
        let mut inner = self.inner.lock().await;
        if inner.state == ConnectionState::Closed {
            return Err(ChannelError::Closed);
        }
        if inner.generation != generation {
            if let Some(conn) = inner.live_connection() {
                return Ok(conn);
            }
        }
        if let Some(err) = self.failed_while_queued(&inner, failed_rounds) {
            return Err(err);
        }
        self.establish(&mut inner).await
    }

    /// The failure of a reconnect that gave up after `failed_rounds` was observed.
    fn failed_while_queued(&self, inner: &Inner, failed_rounds: u64) -> Option<ChannelError> {
        if self.failed_rounds.load(Ordering::Acquire) == failed_rounds {
            return None;
        }
        let (attempts, last_error) = inner.last_failure.clone()?;
        debug!(
            "[ResilientChannel] Reconnect failed while waiting, not retrying: {}",
            last_error
        );
        Some(ChannelError::RetryExhausted {
            attempts,
            last_error,
        })
    }

    async fn establish(&self, inner: &mut Inner) -> Result<Arc<dyn BrokerConnection>> {
        if let Some(stale) = inner.connection.take() {
            if let Err(err) = stale.close().await {
                debug!("[ResilientChannel] Ignoring error closing stale connection: {}", err);
            }
        }

        let policy = &self.config.retry_policy;
        let mut attempt = 1;
        inner.transition(ConnectionState::Connecting { attempt });
        loop {
            match self.provision().await {
                Ok(conn) => {
                    inner.connection = Some(Arc::clone(&conn));
                    inner.generation += 1;
                    inner.last_failure = None;
                    inner.transition(ConnectionState::Connected);
                    info!(
                        "[ResilientChannel] Connected after {} attempt(s) (generation {})",
                        attempt, inner.generation
                    );
                    return Ok(conn);
                }
                Err(err) => {
                    if policy.is_exhausted(attempt) {
                        inner.transition(ConnectionState::Disconnected);
                        inner.last_failure = Some((attempt, err.clone()));
                        self.failed_rounds.fetch_add(1, Ordering::Release);
                        warn!(
                            "[ResilientChannel] Giving up after {} attempt(s): {}",
                            attempt, err
                        );
                        return Err(ChannelError::RetryExhausted {
                            attempts: attempt,
                            last_error: err,
                        });
                    }
                    let wait = policy.wait_before(attempt);
                    warn!(
                        "[ResilientChannel] Connect attempt {}/{} failed: {}. Retrying in {:?}",
                        attempt,
                        policy.max_attempts(),
                        err,
                        wait
                    );
                    sleep(wait).await;
                    attempt += 1;
                    inner.transition(ConnectionState::Connecting { attempt });
                }
            }
        }
    }

    async fn provision(&self) -> std::result::Result<Arc<dyn BrokerConnection>, BrokerError> {
        let conn: Arc<dyn BrokerConnection> = Arc::from(self.transport.connect().await?);
        conn.declare_queue(&self.config.work_queue, true).await?;
        conn.declare_fanout_exchange(&self.config.audit_exchange)
            .await?;
        Ok(conn)
    }
}

#[async_trait]
impl AuditSink for ResilientChannel {
    async fn emit(&self, event: AuditEvent) -> linktag_core::Result<()> {
        self.publish_event(&event)
            .await
            .map_err(|e| linktag_core::Error::audit(e.to_string()))
    }
}

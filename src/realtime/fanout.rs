//! Cross-process fan-out.
//!
//! One logical topic carries `{target_user_id, origin, event}` JSON envelopes;
//! any process may publish and every process subscribes. Delivery is
//! at-least-once and best-effort: with no live connection anywhere the event
//! is dropped after broadcast; offline delivery belongs to the external push
//! collaborator.

use crate::error::{AppError, AppResult};
use crate::realtime::events::{ClientEvent, EventEnvelope};
use crate::realtime::SessionDirectory;
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use redis::AsyncCommands;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};
use uuid::Uuid;

pub const FANOUT_TOPIC: &str = "fanout:events";

/// Minimal publish/subscribe seam so the concrete transport stays swappable;
/// [`RedisEventBus`] is the production transport, [`LocalEventBus`] the
/// in-process one used by tests.
#[async_trait]
pub trait EventBus: Send + Sync {
    async fn publish(&self, envelope: &EventEnvelope) -> AppResult<()>;
    async fn subscribe(&self) -> AppResult<BoxStream<'static, EventEnvelope>>;
}

pub struct RedisEventBus {
    client: redis::Client,
    topic: String,
}

impl RedisEventBus {
    pub fn new(redis_url: &str) -> AppResult<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| AppError::Config(format!("invalid redis url: {e}")))?;
        Ok(Self {
            client,
            topic: FANOUT_TOPIC.to_string(),
        })
    }
}

#[async_trait]
impl EventBus for RedisEventBus {
    async fn publish(&self, envelope: &EventEnvelope) -> AppResult<()> {
        let payload =
            serde_json::to_string(envelope).map_err(|e| AppError::Bus(e.to_string()))?;
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AppError::Bus(e.to_string()))?;
        conn.publish::<_, _, ()>(&self.topic, payload)
            .await
            .map_err(|e| AppError::Bus(e.to_string()))
    }

    async fn subscribe(&self) -> AppResult<BoxStream<'static, EventEnvelope>> {
        // Pub/sub needs a dedicated connection, not the multiplexed one.
        let conn = self
            .client
            .get_async_connection()
            .await
            .map_err(|e| AppError::Bus(e.to_string()))?;
        let mut pubsub = conn.into_pubsub();
        pubsub
            .subscribe(&self.topic)
            .await
            .map_err(|e| AppError::Bus(e.to_string()))?;

        let stream = pubsub
            .into_on_message()
            .filter_map(|msg| async move {
                let payload: String = msg.get_payload().ok()?;
                match serde_json::from_str::<EventEnvelope>(&payload) {
                    Ok(envelope) => Some(envelope),
                    Err(e) => {
                        warn!(error = %e, "dropping malformed fanout envelope");
                        None
                    }
                }
            })
            .boxed();
        Ok(stream)
    }
}

/// In-process bus over a broadcast channel. Publishing never blocks and never
/// fails on an absent subscriber.
pub struct LocalEventBus {
    tx: broadcast::Sender<EventEnvelope>,
}

impl LocalEventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }
}

impl Default for LocalEventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl EventBus for LocalEventBus {
    async fn publish(&self, envelope: &EventEnvelope) -> AppResult<()> {
        // A send error only means nobody is subscribed, which is fine.
        let _ = self.tx.send(envelope.clone());
        Ok(())
    }

    async fn subscribe(&self) -> AppResult<BoxStream<'static, EventEnvelope>> {
        let rx = self.tx.subscribe();
        let stream = futures_util::stream::unfold(rx, |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(envelope) => return Some((envelope, rx)),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "fanout subscriber lagged, events dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        })
        .boxed();
        Ok(stream)
    }
}

/// Delivers events to target users: local connections first (cheapest path),
/// then a bus broadcast so other processes holding a connection for the user
/// deliver too.
pub struct FanoutService {
    directory: SessionDirectory,
    bus: Arc<dyn EventBus>,
    origin: String,
}

impl FanoutService {
    pub fn new(directory: SessionDirectory, bus: Arc<dyn EventBus>, origin: impl Into<String>) -> Self {
        Self {
            directory,
            bus,
            origin: origin.into(),
        }
    }

    /// Fire-and-forget. Bus failures are logged, never propagated: the
    /// triggering write already succeeded and must not roll back.
    pub async fn publish(&self, event: ClientEvent, targets: &[Uuid]) {
        for target in targets {
            let delivered = self.directory.push_to_user(*target, &event).await;
            debug!(target_user_id = %target, delivered, event_type = event.event_type(),
                conversation_id = %event.conversation_id(), "local fanout");

            let envelope = EventEnvelope {
                target_user_id: *target,
                origin: self.origin.clone(),
                event: event.clone(),
            };
            if let Err(e) = self.bus.publish(&envelope).await {
                warn!(target_user_id = %target, error = %e,
                    "fanout bus publish failed, realtime delivery degraded");
            }
        }
    }

    /// Subscribes to the bus and delivers foreign envelopes to local
    /// connections. Envelopes from this instance are skipped; their targets
    /// were already pushed locally at publish time.
    pub async fn start_listener(&self) -> AppResult<JoinHandle<()>> {
        let mut stream = self.bus.subscribe().await?;
        let directory = self.directory.clone();
        let origin = self.origin.clone();

        Ok(tokio::spawn(async move {
            while let Some(envelope) = stream.next().await {
                if envelope.origin == origin {
                    continue;
                }
                let delivered = directory
                    .push_to_user(envelope.target_user_id, &envelope.event)
                    .await;
                debug!(target_user_id = %envelope.target_user_id, delivered,
                    event_type = envelope.event.event_type(),
                    conversation_id = %envelope.event.conversation_id(), "bus fanout");
            }
            error!("fanout bus subscription ended");
        }))
    }
}

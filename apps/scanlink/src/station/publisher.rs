//! # Publisher
//!
//! Delivers new identifiers and links to the downstream consumer.
//!
//! The engine calls [`ChannelPublisher::publish`] from its submission path,
//! which only enqueues. [`run_publisher`] drains the queue on its own task
//! and POSTs each message as JSON:
//!
//! ```json
//! {"topic": "studenten", "payload": "150032;04A3F21B"}
//! ```
//!
//! Delivery is at-least-once and best effort: a message is retried with
//! linear backoff up to `max_attempts`, then dropped with an error log.
//!
//! The publisher has no shutdown signal of its own. It runs until every
//! [`ChannelPublisher`] is dropped and the queue is empty, so nothing the
//! engine recorded during shutdown is left unpublished.

use crate::config::PublishConfig;
use scanlink_core::{PublishSink, Published, ScanlinkError};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;

// =============================================================================
// QUEUE
// =============================================================================

/// [`PublishSink`] that hands messages to the publisher task.
#[derive(Debug, Clone)]
pub struct ChannelPublisher {
    queue: mpsc::UnboundedSender<Published>,
}

impl ChannelPublisher {
    /// Create the sink and the receiving end for [`run_publisher`].
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Published>) {
        let (queue, rx) = mpsc::unbounded_channel();
        (Self { queue }, rx)
    }
}

impl PublishSink for ChannelPublisher {
    fn publish(&self, topic: &str, payload: &str) {
        let message = Published {
            topic: topic.to_string(),
            payload: payload.to_string(),
        };
        if self.queue.send(message).is_err() {
            tracing::error!(payload, "Publisher stopped; message dropped");
        }
    }
}

// =============================================================================
// DELIVERY
// =============================================================================

/// JSON body of one published message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishBody {
    pub topic: String,
    pub payload: String,
}

/// Where and how messages are delivered.
#[derive(Debug, Clone)]
pub struct PublishTarget {
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub max_attempts: u32,
    pub retry_backoff: Duration,
    pub timeout: Duration,
}

impl From<&PublishConfig> for PublishTarget {
    fn from(config: &PublishConfig) -> Self {
        Self {
            url: config.url.clone(),
            api_key: config.api_key.clone(),
            max_attempts: config.max_attempts,
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
            timeout: Duration::from_millis(config.timeout_ms),
        }
    }
}

/// Counters reported when the publisher stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublisherStats {
    /// Accepted by the endpoint (or logged, without an endpoint).
    pub delivered: u64,
    /// Given up on after all attempts.
    pub dropped: u64,
}

struct Deliverer {
    client: reqwest::Client,
    target: PublishTarget,
}

impl Deliverer {
    fn new(target: PublishTarget) -> Result<Self, ScanlinkError> {
        let client = reqwest::Client::builder()
            .timeout(target.timeout)
            .build()
            .map_err(|e| ScanlinkError::Config(format!("Cannot build HTTP client: {}", e)))?;
        Ok(Self { client, target })
    }

    async fn deliver(&self, message: Published) -> bool {
        let Some(url) = self.target.url.as_deref() else {
            tracing::info!(
                topic = %message.topic,
                payload = %message.payload,
                "Publish (no endpoint configured)"
            );
            return true;
        };

        let body = PublishBody {
            topic: message.topic,
            payload: message.payload,
        };

        for attempt in 1..=self.target.max_attempts {
            let mut request = self.client.post(url).json(&body);
            if let Some(key) = &self.target.api_key {
                request = request.bearer_auth(key);
            }

            match request.send().await.and_then(|r| r.error_for_status()) {
                Ok(_) => {
                    tracing::info!(topic = %body.topic, payload = %body.payload, attempt, "Published");
                    return true;
                }
                Err(e) => {
                    tracing::warn!(payload = %body.payload, attempt, "Publish failed: {}", e);
                    if attempt < self.target.max_attempts {
                        tokio::time::sleep(self.target.retry_backoff.saturating_mul(attempt)).await;
                    }
                }
            }
        }

        tracing::error!(
            payload = %body.payload,
            attempts = self.target.max_attempts,
            "Giving up on message"
        );
        false
    }
}

/// Deliver queued messages until every sender is gone.
pub async fn run_publisher(
    mut queue: mpsc::UnboundedReceiver<Published>,
    target: PublishTarget,
) -> Result<PublisherStats, ScanlinkError> {
    let deliverer = Deliverer::new(target)?;
    let mut stats = PublisherStats::default();

    while let Some(message) = queue.recv().await {
        record(&mut stats, deliverer.deliver(message).await);
    }

    tracing::info!(
        delivered = stats.delivered,
        dropped = stats.dropped,
        "Publisher stopped"
    );
    Ok(stats)
}

fn record(stats: &mut PublisherStats, delivered: bool) {
    if delivered {
        stats.delivered += 1;
    } else {
        stats.dropped += 1;
    }
}

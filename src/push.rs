/// Push notification capability
///
/// Delivery transport is an external collaborator; this implementation logs
/// deliveries, which is what the capability boundary looks like from the
/// rest of the system: `send(token, payload) -> delivery result`.
use serde::Serialize;
use tracing::{info, warn};

/// Payload handed to the transport
#[derive(Debug, Clone, Serialize)]
pub struct PushPayload {
    pub title: String,
    pub body: String,
}

/// Result of one delivery attempt
#[derive(Debug, Clone)]
pub struct PushDelivery {
    pub token: String,
    pub delivered: bool,
}

/// Fan-out summary
#[derive(Debug, Clone, Default)]
pub struct PushSummary {
    pub sent: usize,
    pub failed: usize,
}

/// Push sender
#[derive(Clone, Default)]
pub struct Pusher;

impl Pusher {
    pub fn new() -> Self {
        Self
    }

    /// Send one payload to one token
    pub async fn send(&self, token: &str, payload: &PushPayload) -> PushDelivery {
        info!("push delivery: token={} title=\"{}\"", token, payload.title);
        PushDelivery {
            token: token.to_string(),
            delivered: true,
        }
    }

    /// Best-effort fan-out; failures are logged and counted, never fatal
    pub async fn broadcast(&self, tokens: &[String], payload: &PushPayload) -> PushSummary {
        let mut summary = PushSummary::default();
        for token in tokens {
            let delivery = self.send(token, payload).await;
            if delivery.delivered {
                summary.sent += 1;
            } else {
                warn!("push delivery failed: token={}", token);
                summary.failed += 1;
            }
        }
        summary
    }
}

//! Forwarding of attributed conversions to the ad-attribution API.
//!
//! Conversions are handed to a bounded queue and delivered by a single
//! background worker. Enqueueing never blocks a request: when the queue is
//! full the event is dropped with a warning. Delivery failures are retried
//! with exponential backoff and then logged; they never reach an HTTP caller.
//!
//! # Payload
//!
//! Events use the Conversions API shape (`POST {api_url}/{pixel_id}/events`):
//!
//! ```json
//! {
//!   "data": [{
//!     "event_name": "Purchase",
//!     "event_time": 1700000000,
//!     "action_source": "website",
//!     "user_data": { "client_ip_address": "...", "client_user_agent": "...", "fbc": "...", "fbp": "..." },
//!     "custom_data": { "value": 99.99, "currency": "USD", "campaign_id": "...", "click_id": "..." }
//!   }],
//!   "access_token": "..."
//! }
//! ```

use std::time::Duration;

use anyhow::{Context, anyhow};
use rand::Rng;
use serde_json::{Map, Value, json};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::model::Conversion;

/// Default Graph API base URL.
pub const DEFAULT_API_URL: &str = "https://graph.facebook.com/v13.0";

/// Events buffered before new ones are dropped.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Delivery settings.
#[derive(Debug, Clone)]
pub struct ForwarderConfig {
    pub api_url: String,
    pub access_token: String,
    pub pixel_id: String,
    /// Delivery attempts per event, including the first.
    pub attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl ForwarderConfig {
    pub fn new(api_url: &str, access_token: &str, pixel_id: &str) -> Self {
        Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            access_token: access_token.to_string(),
            pixel_id: pixel_id.to_string(),
            attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        }
    }

    fn events_url(&self) -> String {
        format!(
            "{}/{}/events",
            self.api_url,
            urlencoding::encode(&self.pixel_id)
        )
    }
}

/// One conversion queued for delivery, with the client signals it needs.
#[derive(Debug, Clone, PartialEq)]
pub struct ForwardEvent {
    pub conversion: Conversion,
    pub ip_address: String,
    pub user_agent: String,
    /// `_fbc` cookie of the postback request, if present.
    pub fbc: Option<String>,
    /// `_fbp` cookie of the postback request, if present.
    pub fbp: Option<String>,
}

/// Handle used by request handlers to queue conversions.
#[derive(Debug, Clone)]
pub struct ConversionForwarder {
    sender: mpsc::Sender<ForwardEvent>,
}

impl ConversionForwarder {
    /// A forwarder and the receiving end of its queue, without a worker.
    pub fn with_channel(capacity: usize) -> (Self, mpsc::Receiver<ForwardEvent>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }

    /// A forwarder whose queue is drained by a spawned delivery worker.
    ///
    /// The worker stops once every forwarder handle is dropped and the queue
    /// is empty. Fails if the HTTP client cannot be built.
    pub fn spawn(
        config: ForwarderConfig,
        capacity: usize,
    ) -> anyhow::Result<(Self, JoinHandle<()>)> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("building forwarder HTTP client")?;

        let (forwarder, receiver) = Self::with_channel(capacity);
        let worker = tokio::spawn(run_worker(client, config, receiver));
        Ok((forwarder, worker))
    }

    /// Queue an event without waiting. Returns false if it was dropped.
    pub fn enqueue(&self, event: ForwardEvent) -> bool {
        let conversion_id = event.conversion.id;
        match self.sender.try_send(event) {
            Ok(()) => {
                debug!(conversion_id, "Conversion queued for forwarding");
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(conversion_id, "Forwarding queue full, dropping conversion event");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!(conversion_id, "Forwarding worker stopped, dropping conversion event");
                false
            }
        }
    }
}

/// Deliver queued events until the channel closes.
pub async fn run_worker(
    client: reqwest::Client,
    config: ForwarderConfig,
    mut receiver: mpsc::Receiver<ForwardEvent>,
) {
    info!(pixel_id = %config.pixel_id, "Conversion forwarder started");

    while let Some(event) = receiver.recv().await {
        let conversion_id = event.conversion.id;
        if let Err(e) = deliver_with_retry(&client, &config, &event).await {
            warn!(conversion_id, error = %e, "Giving up on forwarding conversion");
        }
    }

    info!("Conversion forwarder stopped");
}

async fn deliver_with_retry(
    client: &reqwest::Client,
    config: &ForwarderConfig,
    event: &ForwardEvent,
) -> anyhow::Result<()> {
    let attempts = config.attempts.max(1);
    let mut attempt = 1;

    loop {
        match deliver(client, config, event).await {
            Ok(()) => {
                info!(
                    conversion_id = event.conversion.id,
                    attempt, "Conversion forwarded"
                );
                return Ok(());
            }
            Err(e) if attempt < attempts => {
                let delay = backoff_delay(attempt, config.base_delay, config.max_delay);
                warn!(
                    conversion_id = event.conversion.id,
                    attempt,
                    max_attempts = attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Forwarding failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

async fn deliver(
    client: &reqwest::Client,
    config: &ForwarderConfig,
    event: &ForwardEvent,
) -> anyhow::Result<()> {
    let payload = build_payload(event, &config.access_token);

    let response = client
        .post(config.events_url())
        .json(&payload)
        .send()
        .await
        .context("sending conversion event")?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(anyhow!("attribution API returned {status}: {body}"));
    }

    Ok(())
}

/// Exponential delay for the retry after `attempt`, capped, with up to 25%
/// jitter.
fn backoff_delay(attempt: u32, base: Duration, max: Duration) -> Duration {
    let base_ms = base.as_millis() as u64;
    let exp = base_ms.saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)));
    let capped = exp.min(max.as_millis() as u64);
    let jitter = rand::thread_rng().gen_range(0..=capped / 4);
    Duration::from_millis(capped.saturating_add(jitter))
}

/// Build the Conversions API request body for one event.
pub fn build_payload(event: &ForwardEvent, access_token: &str) -> Value {
    let conversion = &event.conversion;

    let mut user_data = Map::new();
    user_data.insert("client_ip_address".into(), json!(event.ip_address));
    user_data.insert("client_user_agent".into(), json!(event.user_agent));
    if let Some(fbc) = event.fbc.as_deref().filter(|v| !v.is_empty()) {
        user_data.insert("fbc".into(), json!(fbc));
    }
    if let Some(fbp) = event.fbp.as_deref().filter(|v| !v.is_empty()) {
        user_data.insert("fbp".into(), json!(fbp));
    }

    json!({
        "data": [{
            "event_name": "Purchase",
            "event_time": conversion.created_at.timestamp(),
            "action_source": "website",
            "user_data": user_data,
            "custom_data": {
                "value": conversion.amount,
                "currency": "USD",
                "campaign_id": conversion.campaign_id,
                "click_id": conversion.click_id,
            },
        }],
        "access_token": access_token,
    })
}

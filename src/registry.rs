//! Campaign registry: issuing, resolving and retiring campaigns.
//!
//! The registry owns token assignment. Callers never supply a token; a
//! generated token that collides with an issued one surfaces as `Conflict`
//! and [`create_campaign_with_retry`] draws a fresh one.

use chrono::Utc;
use tracing::{info, warn};
use url::Url;

use crate::error::{Result, TrackerError};
use crate::ids::{self, IdGenerator};
use crate::model::{Campaign, CampaignRequest, CampaignStats};
use crate::storage::Storage;

/// Token draws attempted before giving up on campaign creation.
pub const TOKEN_ATTEMPTS: u32 = 5;

/// Check a creation request. Returns the trimmed request.
pub fn validate_request(request: &CampaignRequest) -> Result<CampaignRequest> {
    let trimmed = CampaignRequest {
        name: request.name.trim().to_string(),
        landing_page: request.landing_page.trim().to_string(),
        traffic_source: request.traffic_source.trim().to_string(),
        offer_url: request.offer_url.trim().to_string(),
    };

    let mut missing = Vec::new();
    if trimmed.name.is_empty() {
        missing.push("name");
    }
    if trimmed.landing_page.is_empty() {
        missing.push("landing_page");
    }
    if trimmed.traffic_source.is_empty() {
        missing.push("traffic_source");
    }
    if !missing.is_empty() {
        return Err(TrackerError::Invalid(format!(
            "missing required fields: {}",
            missing.join(", ")
        )));
    }

    if !trimmed.offer_url.is_empty() && Url::parse(&trimmed.offer_url).is_err() {
        return Err(TrackerError::Invalid(format!(
            "offer_url is not an absolute URL: {}",
            trimmed.offer_url
        )));
    }

    Ok(trimmed)
}

/// Create a campaign with one freshly generated token.
///
/// Fails with `Conflict` if the token is already issued.
pub async fn create_campaign(
    storage: &Storage,
    ids: &dyn IdGenerator,
    request: &CampaignRequest,
) -> Result<Campaign> {
    let request = validate_request(request)?;

    let mut campaign = Campaign {
        id: 0,
        campaign_id: ids.campaign_id(),
        campaign_token: ids.campaign_token(),
        name: request.name,
        offer_url: request.offer_url,
        landing_page: request.landing_page,
        traffic_source: request.traffic_source,
        created_at: Utc::now(),
    };

    campaign.id = storage.insert_campaign(&campaign).await?;

    info!(
        campaign_id = %campaign.campaign_id,
        campaign_token = %campaign.campaign_token,
        "Campaign created"
    );

    Ok(campaign)
}

/// Create a campaign, redrawing the token on collision up to `attempts` times.
pub async fn create_campaign_with_retry(
    storage: &Storage,
    ids: &dyn IdGenerator,
    request: &CampaignRequest,
    attempts: u32,
) -> Result<Campaign> {
    let mut last_conflict = None;

    for attempt in 1..=attempts.max(1) {
        match create_campaign(storage, ids, request).await {
            Err(TrackerError::Conflict(message)) => {
                warn!(attempt, %message, "Campaign token collision, retrying");
                last_conflict = Some(message);
            }
            other => return other,
        }
    }

    Err(TrackerError::Conflict(last_conflict.unwrap_or_else(|| {
        "could not issue a unique campaign token".to_string()
    })))
}

/// Resolve the campaign behind a public token.
///
/// This is the only gate deciding whether a click is attributable.
pub async fn resolve_by_token(storage: &Storage, token: &str) -> Result<Campaign> {
    let token = token.trim();
    if token.is_empty() {
        return Err(TrackerError::Invalid("missing campaign token".to_string()));
    }
    if !ids::is_campaign_token(token) {
        return Err(TrackerError::Invalid(format!("malformed campaign token {token}")));
    }

    storage
        .find_campaign_by_token(token)
        .await?
        .ok_or_else(|| TrackerError::NotFound(format!("campaign token {token}")))
}

/// Delete a campaign no visit references.
pub async fn delete_campaign(storage: &Storage, campaign_id: &str) -> Result<()> {
    let campaign_id = campaign_id.trim();
    if campaign_id.is_empty() {
        return Err(TrackerError::Invalid("missing campaign ID".to_string()));
    }

    storage.delete_campaign(campaign_id).await?;
    info!(campaign_id = %campaign_id, "Campaign deleted");
    Ok(())
}

/// Per-campaign visit, conversion and revenue totals, newest campaign first.
pub async fn stats(storage: &Storage) -> Result<Vec<CampaignStats>> {
    storage.campaign_stats().await
}

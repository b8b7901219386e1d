//! Click recording and offer redirection.
//!
//! A click is only accepted for a token the registry resolves. Persisting the
//! click row is best-effort: a storage failure is logged and the visitor is
//! still redirected.

use chrono::Utc;
use tracing::{info, warn};
use url::{Url, form_urlencoded};

use crate::error::{Result, TrackerError};
use crate::ids::IdGenerator;
use crate::model::{Campaign, Click};
use crate::registry;
use crate::storage::Storage;

/// Request details captured at click time.
#[derive(Debug, Clone, Default)]
pub struct ClickContext {
    /// Visitor identity presented by the client (cookie), if any.
    pub visitor_id: Option<String>,
    pub ip_address: String,
    pub user_agent: String,
    pub referrer: String,
}

/// Result of an accepted click.
#[derive(Debug, Clone)]
pub struct ClickOutcome {
    pub click_id: String,
    pub visitor_id: String,
    pub campaign_id: String,
    pub redirect_url: String,
    /// Whether the click row was written.
    pub persisted: bool,
}

/// Record a click for `token` and compute the redirect target.
///
/// # Errors
///
/// - `Invalid` if the token is empty or the campaign has no usable target URL
/// - `NotFound` if no campaign has the token
///
/// Storage failures while writing the click row are swallowed.
pub async fn record_click(
    storage: &Storage,
    ids: &dyn IdGenerator,
    affiliate_id: Option<&str>,
    token: &str,
    context: ClickContext,
) -> Result<ClickOutcome> {
    let campaign = registry::resolve_by_token(storage, token).await?;

    let click_id = ids.click_id();
    let visitor_id = context
        .visitor_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| ids.visitor_id());

    let redirect_url = build_redirect_url(
        redirect_target(&campaign)?,
        &click_id,
        &campaign.campaign_id,
        affiliate_id,
    )?;

    let click = Click {
        click_id: click_id.clone(),
        visitor_id: visitor_id.clone(),
        campaign_token: campaign.campaign_token.clone(),
        campaign_id: campaign.campaign_id.clone(),
        ip_address: context.ip_address,
        user_agent: context.user_agent,
        referrer: context.referrer,
        created_at: Utc::now(),
    };

    let persisted = match storage.insert_click(&click).await {
        Ok(()) => {
            info!(
                click_id = %click.click_id,
                campaign_id = %click.campaign_id,
                "Click recorded"
            );
            true
        }
        Err(e) => {
            warn!(
                click_id = %click.click_id,
                campaign_id = %click.campaign_id,
                error = %e,
                "Failed to record click, redirecting anyway"
            );
            false
        }
    };

    Ok(ClickOutcome {
        click_id,
        visitor_id,
        campaign_id: campaign.campaign_id,
        redirect_url,
        persisted,
    })
}

/// The URL a click for `campaign` lands on: the offer, else the landing page.
fn redirect_target(campaign: &Campaign) -> Result<&str> {
    [&campaign.offer_url, &campaign.landing_page]
        .into_iter()
        .map(|url| url.trim())
        .find(|url| !url.is_empty())
        .ok_or_else(|| {
            TrackerError::Invalid(format!(
                "campaign {} has no offer URL",
                campaign.campaign_id
            ))
        })
}

/// Append the click marker parameters to `base`.
///
/// Sets `clickid`, `source` and, when given, `aff_id`. Parameters with those
/// names are replaced; every other existing parameter is kept verbatim and
/// in order.
pub fn build_redirect_url(
    base: &str,
    click_id: &str,
    campaign_id: &str,
    affiliate_id: Option<&str>,
) -> Result<String> {
    let mut url = Url::parse(base)
        .map_err(|e| TrackerError::Invalid(format!("invalid offer URL {base}: {e}")))?;

    let mut markers = vec![("clickid", click_id)];
    if let Some(aff) = affiliate_id.filter(|a| !a.is_empty()) {
        markers.push(("aff_id", aff));
    }
    markers.push(("source", campaign_id));

    let appended = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(markers.iter())
        .finish();

    let existing = url.query().unwrap_or_default().to_string();
    let query = existing
        .split('&')
        .filter(|segment| !segment.is_empty())
        .filter(|segment| {
            form_urlencoded::parse(segment.as_bytes())
                .next()
                .is_none_or(|(key, _)| {
                    !markers.iter().any(|(name, _)| key.as_ref() == *name)
                })
        })
        .chain(std::iter::once(appended.as_str()))
        .collect::<Vec<_>>()
        .join("&");

    url.set_query(Some(&query));
    Ok(url.to_string())
}

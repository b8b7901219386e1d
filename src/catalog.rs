//! Offer and landing-page catalogs.
//!
//! Offers are unique per `(name, network)`, landing pages per URL. Both are
//! reference data for building campaigns; clicks and visits never read them.

use chrono::Utc;
use tracing::info;
use url::Url;

use crate::error::{Result, TrackerError};
use crate::model::{LandingPage, LandingPageRequest, Offer, OfferRequest};
use crate::storage::Storage;

fn missing_fields(fields: &[(&'static str, &str)]) -> Result<()> {
    let missing: Vec<&str> = fields
        .iter()
        .filter(|(_, value)| value.is_empty())
        .map(|(name, _)| *name)
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(TrackerError::Invalid(format!(
            "missing required fields: {}",
            missing.join(", ")
        )))
    }
}

fn absolute_url(field: &str, value: &str) -> Result<()> {
    Url::parse(value)
        .map(|_| ())
        .map_err(|_| TrackerError::Invalid(format!("{field} is not an absolute URL: {value}")))
}

/// Add an offer. `name`, `network` and `offer_url` are required.
pub async fn create_offer(storage: &Storage, request: &OfferRequest) -> Result<Offer> {
    let name = request.name.trim();
    let network = request.network.trim();
    let offer_url = request.offer_url.trim();

    missing_fields(&[
        ("name", name),
        ("network", network),
        ("offer_url", offer_url),
    ])?;
    absolute_url("offer_url", offer_url)?;

    let mut offer = Offer {
        id: 0,
        name: name.to_string(),
        network: network.to_string(),
        offer_url: offer_url.to_string(),
        created_at: Utc::now(),
    };
    offer.id = storage.insert_offer(&offer).await?;

    info!(offer_id = offer.id, network = %offer.network, "Offer created");
    Ok(offer)
}

pub async fn list_offers(storage: &Storage) -> Result<Vec<Offer>> {
    storage.list_offers().await
}

/// Add a landing page. `name` and an absolute `url` are required.
pub async fn create_landing_page(
    storage: &Storage,
    request: &LandingPageRequest,
) -> Result<LandingPage> {
    let name = request.name.trim();
    let url = request.url.trim();

    missing_fields(&[("name", name), ("url", url)])?;
    absolute_url("url", url)?;

    let mut page = LandingPage {
        id: 0,
        name: name.to_string(),
        url: url.to_string(),
        created_at: Utc::now(),
    };
    page.id = storage.insert_landing_page(&page).await?;

    info!(landing_page_id = page.id, url = %page.url, "Landing page created");
    Ok(page)
}

pub async fn list_landing_pages(storage: &Storage) -> Result<Vec<LandingPage>> {
    storage.list_landing_pages().await
}

/// Replace the name and URL of the landing page named by `request.id`.
pub async fn update_landing_page(
    storage: &Storage,
    request: &LandingPageRequest,
) -> Result<LandingPage> {
    let id = request
        .id
        .ok_or_else(|| TrackerError::Invalid("missing landing page id".to_string()))?;
    let name = request.name.trim();
    let url = request.url.trim();

    missing_fields(&[("name", name), ("url", url)])?;
    absolute_url("url", url)?;

    storage.update_landing_page(id, name, url).await?;
    let page = storage
        .find_landing_page(id)
        .await?
        .ok_or_else(|| TrackerError::NotFound(format!("landing page {id}")))?;

    info!(landing_page_id = id, url = %page.url, "Landing page updated");
    Ok(page)
}

/// Delete a landing page by its numeric ID, given as query text.
pub async fn delete_landing_page(storage: &Storage, id: &str) -> Result<()> {
    let id: i64 = id
        .trim()
        .parse()
        .map_err(|_| TrackerError::Invalid(format!("invalid landing page id {id:?}")))?;

    storage.delete_landing_page(id).await?;
    info!(landing_page_id = id, "Landing page deleted");
    Ok(())
}

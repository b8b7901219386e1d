//! Idempotent visit recording.
//!
//! A beacon for a click that already has a visit returns the existing visitor
//! ID and writes nothing. Only the first beacon creates a visitor identity.
//! Concurrent first beacons are settled by `UNIQUE(click_id)` in the store,
//! see [`Storage::insert_visit`].

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::error::{Result, TrackerError};
use crate::geo::Locator;
use crate::ids::IdGenerator;
use crate::model::{Visit, VisitRequest};
use crate::storage::Storage;

/// Network-level details of the beacon request.
#[derive(Debug, Clone, Default)]
pub struct BeaconContext {
    pub ip_address: String,
    /// `User-Agent` header, used when the beacon body carries none.
    pub user_agent: String,
}

/// Result of a beacon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisitOutcome {
    pub visitor_id: String,
    /// False when the click already had a visit.
    pub created: bool,
}

/// Record a visit for the beacon's click ID, or return the existing one.
///
/// The campaign comes from the stored click when the click ID is known and
/// from the beacon otherwise; it must name an existing campaign.
pub async fn record_visit(
    storage: &Storage,
    ids: &dyn IdGenerator,
    locator: &dyn Locator,
    request: VisitRequest,
    context: BeaconContext,
) -> Result<VisitOutcome> {
    let click_id = Some(request.click_id.trim().to_string()).filter(|id| !id.is_empty());

    if let Some(click_id) = &click_id {
        if let Some(existing) = storage.find_visit_by_click_id(click_id).await? {
            debug!(
                click_id = %click_id,
                visitor_id = %existing.visitor_id,
                "Visit already tracked"
            );
            return Ok(VisitOutcome {
                visitor_id: existing.visitor_id,
                created: false,
            });
        }
    }

    let campaign_id = resolve_campaign(storage, click_id.as_deref(), &request.campaign_id).await?;

    let location = match locator.locate(&context.ip_address).await {
        Ok(location) => location,
        Err(e) => {
            warn!(error = %e, "Geolocation failed, storing visit without location");
            Default::default()
        }
    };

    let user_agent = if request.user_agent.trim().is_empty() {
        context.user_agent
    } else {
        request.user_agent
    };

    let visit = Visit {
        id: 0,
        visitor_id: ids.visitor_id(),
        click_id: click_id.clone(),
        campaign_id,
        ip_address: context.ip_address,
        user_agent,
        browser: request.browser,
        browser_version: request.browser_version,
        os: request.os,
        device_type: request.device_type,
        screen_resolution: request.screen_resolution,
        viewport_size: request.viewport_size,
        language: request.language,
        timezone: request.timezone,
        landing_page: request.landing_page,
        referrer: request.referrer,
        utm_source: request.utm_source,
        utm_medium: request.utm_medium,
        utm_campaign: request.utm_campaign,
        utm_content: request.utm_content,
        utm_term: request.utm_term,
        country: location.country,
        region: location.region,
        city: location.city,
        created_at: Utc::now(),
    };

    let (visitor_id, created) = storage.insert_visit(&visit).await?;

    if created {
        info!(
            click_id = ?visit.click_id,
            visitor_id = %visitor_id,
            campaign_id = %visit.campaign_id,
            "Visit recorded"
        );
    } else {
        info!(
            click_id = ?visit.click_id,
            visitor_id = %visitor_id,
            "Concurrent beacon lost the race, returning existing visit"
        );
    }

    Ok(VisitOutcome {
        visitor_id,
        created,
    })
}

async fn resolve_campaign(
    storage: &Storage,
    click_id: Option<&str>,
    claimed_campaign_id: &str,
) -> Result<String> {
    let from_click = match click_id {
        Some(click_id) => storage.find_click(click_id).await?.map(|click| click.campaign_id),
        None => None,
    };

    // Clicks outlive a deleted campaign, so the click's campaign is checked too.
    let campaign_id = from_click.as_deref().unwrap_or(claimed_campaign_id).trim();
    if campaign_id.is_empty() {
        return Err(TrackerError::Invalid(
            "beacon has neither a known click_id nor a campaign_id".to_string(),
        ));
    }

    match storage.find_campaign(campaign_id).await? {
        Some(campaign) => Ok(campaign.campaign_id),
        None => Err(TrackerError::Invalid(format!("unknown campaign {campaign_id}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clicks::{self, ClickContext};
    use crate::geo::NullLocator;
    use crate::ids::SequentialIdGenerator;
    use crate::model::{Campaign, CampaignRequest, Location};
    use crate::registry;
    use async_trait::async_trait;

    struct FailingLocator;

    #[async_trait]
    impl Locator for FailingLocator {
        async fn locate(&self, _ip: &str) -> anyhow::Result<Location> {
            anyhow::bail!("geolocation service unavailable")
        }
    }

    struct FixedLocator;

    #[async_trait]
    impl Locator for FixedLocator {
        async fn locate(&self, _ip: &str) -> anyhow::Result<Location> {
            Ok(Location {
                country: "DE".to_string(),
                region: "Berlin".to_string(),
                city: "Berlin".to_string(),
            })
        }
    }

    async fn setup() -> (Storage, SequentialIdGenerator, Campaign) {
        let storage = Storage::new("sqlite::memory:").await.unwrap();
        let ids = SequentialIdGenerator::new();
        let campaign = registry::create_campaign(
            &storage,
            &ids,
            &CampaignRequest {
                name: "Spring".to_string(),
                landing_page: "https://lp.example.com".to_string(),
                traffic_source: "social".to_string(),
                offer_url: "https://offers.example.com/go".to_string(),
            },
        )
        .await
        .unwrap();
        (storage, ids, campaign)
    }

    fn beacon(click_id: &str, campaign_id: &str) -> VisitRequest {
        VisitRequest {
            click_id: click_id.to_string(),
            campaign_id: campaign_id.to_string(),
            browser: "Firefox".to_string(),
            ..VisitRequest::default()
        }
    }

    #[tokio::test]
    async fn test_repeated_beacon_is_idempotent() {
        let (storage, ids, campaign) = setup().await;

        let first = record_visit(
            &storage,
            &ids,
            &NullLocator,
            beacon("click-a", &campaign.campaign_id),
            BeaconContext::default(),
        )
        .await
        .unwrap();
        let second = record_visit(
            &storage,
            &ids,
            &NullLocator,
            VisitRequest {
                browser: "Chrome".to_string(),
                ..beacon("click-a", &campaign.campaign_id)
            },
            BeaconContext::default(),
        )
        .await
        .unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.visitor_id, second.visitor_id);

        let stats = registry::stats(&storage).await.unwrap();
        assert_eq!(stats[0].stats.visits, 1);

        let stored = storage.find_visit_by_click_id("click-a").await.unwrap().unwrap();
        assert_eq!(stored.browser, "Firefox");
    }

    #[tokio::test]
    async fn test_campaign_taken_from_recorded_click() {
        let (storage, ids, campaign) = setup().await;
        let click = clicks::record_click(
            &storage,
            &ids,
            None,
            &campaign.campaign_token,
            ClickContext::default(),
        )
        .await
        .unwrap();

        // The beacon claims no campaign; the click row supplies it.
        record_visit(
            &storage,
            &ids,
            &NullLocator,
            beacon(&click.click_id, ""),
            BeaconContext::default(),
        )
        .await
        .unwrap();

        let visit = storage
            .find_visit_by_click_id(&click.click_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(visit.campaign_id, campaign.campaign_id);
    }

    #[tokio::test]
    async fn test_unknown_campaign_rejected() {
        let (storage, ids, _) = setup().await;

        let err = record_visit(
            &storage,
            &ids,
            &NullLocator,
            beacon("click-a", "no-such-campaign"),
            BeaconContext::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, TrackerError::Invalid(_)));

        let err = record_visit(
            &storage,
            &ids,
            &NullLocator,
            beacon("click-b", ""),
            BeaconContext::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, TrackerError::Invalid(_)));
    }

    #[tokio::test]
    async fn test_click_of_deleted_campaign_rejected() {
        let (storage, ids, campaign) = setup().await;
        let click = clicks::record_click(
            &storage,
            &ids,
            None,
            &campaign.campaign_token,
            ClickContext::default(),
        )
        .await
        .unwrap();

        registry::delete_campaign(&storage, &campaign.campaign_id)
            .await
            .unwrap();
        assert!(storage.find_click(&click.click_id).await.unwrap().is_some());

        let err = record_visit(
            &storage,
            &ids,
            &NullLocator,
            beacon(&click.click_id, ""),
            BeaconContext::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, TrackerError::Invalid(_)));
    }

    #[tokio::test]
    async fn test_geolocation_failure_is_not_fatal() {
        let (storage, ids, campaign) = setup().await;

        let outcome = record_visit(
            &storage,
            &ids,
            &FailingLocator,
            beacon("click-a", &campaign.campaign_id),
            BeaconContext {
                ip_address: "8.8.8.8".to_string(),
                user_agent: "curl/8".to_string(),
            },
        )
        .await
        .unwrap();
        assert!(outcome.created);

        let visit = storage
            .find_visit_by_visitor_id(&outcome.visitor_id)
            .await
            .unwrap()
            .unwrap();
        assert!(visit.country.is_empty());
        assert!(visit.city.is_empty());
        assert_eq!(visit.user_agent, "curl/8");
    }

    #[tokio::test]
    async fn test_location_stored() {
        let (storage, ids, campaign) = setup().await;

        let outcome = record_visit(
            &storage,
            &ids,
            &FixedLocator,
            beacon("click-a", &campaign.campaign_id),
            BeaconContext::default(),
        )
        .await
        .unwrap();

        let visit = storage
            .find_visit_by_visitor_id(&outcome.visitor_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(visit.country, "DE");
        assert_eq!(visit.city, "Berlin");
    }

    #[tokio::test]
    async fn test_concurrent_beacons_share_one_identity() {
        let (storage, ids, campaign) = setup().await;

        let (a, b) = tokio::join!(
            record_visit(
                &storage,
                &ids,
                &NullLocator,
                beacon("click-race", &campaign.campaign_id),
                BeaconContext::default(),
            ),
            record_visit(
                &storage,
                &ids,
                &NullLocator,
                beacon("click-race", &campaign.campaign_id),
                BeaconContext::default(),
            ),
        );

        let (a, b) = (a.unwrap(), b.unwrap());
        assert_eq!(a.visitor_id, b.visitor_id);
        assert!(a.created ^ b.created);
    }
}

//! Data models for the attribution pipeline.
//!
//! Records mirror the persisted tables (`campaign`, `click`, `visit`,
//! `conversion`, and the `offer` and `landing_page` catalogs). Request types are the JSON bodies accepted by the HTTP
//! surface; every field is defaulted so that missing values are reported by
//! validation rather than by the JSON extractor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default status of a conversion reported by an ad network.
pub const STATUS_COMPLETED: &str = "completed";

/// An advertising campaign.
///
/// `campaign_id` is the internal identity; `campaign_token` is the short
/// public identifier embedded in click URLs. Both are unique and immutable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Campaign {
    pub id: i64,
    pub campaign_id: String,
    pub campaign_token: String,
    pub name: String,
    pub offer_url: String,
    pub landing_page: String,
    pub traffic_source: String,
    pub created_at: DateTime<Utc>,
}

/// Request body for `POST /api/campaigns`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CampaignRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub landing_page: String,
    #[serde(default)]
    pub traffic_source: String,
    #[serde(default)]
    pub offer_url: String,
}

/// An offer in the catalog. `(name, network)` is unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    pub id: i64,
    pub name: String,
    pub network: String,
    pub offer_url: String,
    pub created_at: DateTime<Utc>,
}

/// Request body for `POST /api/offers`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OfferRequest {
    pub name: String,
    pub network: String,
    pub offer_url: String,
}

/// A landing page in the catalog. The URL is unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandingPage {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub created_at: DateTime<Utc>,
}

/// Request body for `POST` and `PUT /api/landing-pages`.
///
/// `id` is only read by `PUT`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LandingPageRequest {
    pub id: Option<i64>,
    pub name: String,
    pub url: String,
}

/// One followed advertising link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Click {
    pub click_id: String,
    pub visitor_id: String,
    pub campaign_token: String,
    pub campaign_id: String,
    pub ip_address: String,
    pub user_agent: String,
    pub referrer: String,
    pub created_at: DateTime<Utc>,
}

/// Coarse location resolved from an IP address.
///
/// Empty fields mean the lookup failed or was skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub country: String,
    pub region: String,
    pub city: String,
}

/// Request body for `POST /track`, sent by the client-side beacon.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct VisitRequest {
    pub click_id: String,
    pub campaign_id: String,
    pub user_agent: String,
    pub browser: String,
    pub browser_version: String,
    pub os: String,
    pub device_type: String,
    pub screen_resolution: String,
    pub viewport_size: String,
    pub language: String,
    pub timezone: String,
    pub landing_page: String,
    pub referrer: String,
    pub utm_source: String,
    pub utm_medium: String,
    pub utm_campaign: String,
    pub utm_content: String,
    pub utm_term: String,
}

/// A deduplicated landing of a click on the tracked page.
///
/// At most one visit exists per click ID; `visitor_id` is the identity that
/// conversions attach to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Visit {
    pub id: i64,
    pub visitor_id: String,
    pub click_id: Option<String>,
    pub campaign_id: String,
    pub ip_address: String,
    pub user_agent: String,
    pub browser: String,
    pub browser_version: String,
    pub os: String,
    pub device_type: String,
    pub screen_resolution: String,
    pub viewport_size: String,
    pub language: String,
    pub timezone: String,
    pub landing_page: String,
    pub referrer: String,
    pub utm_source: String,
    pub utm_medium: String,
    pub utm_campaign: String,
    pub utm_content: String,
    pub utm_term: String,
    pub country: String,
    pub region: String,
    pub city: String,
    pub created_at: DateTime<Utc>,
}

/// A monetizable event attributed to a visit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversion {
    pub id: i64,
    pub visitor_id: String,
    pub click_id: Option<String>,
    pub campaign_id: String,
    pub amount: f64,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// Request body for `POST /postback`.
///
/// `campaign_id` is accepted for compatibility but never trusted; the
/// campaign is always taken from the resolved visit.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConversionRequest {
    pub visitor_id: String,
    pub click_id: String,
    pub campaign_id: String,
    pub amount: f64,
}

/// Visit, conversion and revenue totals of one campaign.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CampaignTotals {
    pub visits: i64,
    pub conversions: i64,
    pub revenue: f64,
}

/// A campaign together with its totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignStats {
    #[serde(flatten)]
    pub campaign: Campaign,
    pub stats: CampaignTotals,
}

/// Device details of the visit behind a conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisitorInfo {
    pub browser: String,
    pub os: String,
    pub device_type: String,
    pub ip_address: String,
}

/// A conversion joined with its campaign name and visitor device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionRecord {
    #[serde(flatten)]
    pub conversion: Conversion,
    pub campaign_name: String,
    pub visitor_info: VisitorInfo,
}

/// Device group of a dashboard visit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceInfo {
    #[serde(rename = "type")]
    pub device_type: String,
    pub os: String,
    /// Browser name and version.
    pub browser: String,
    pub screen: String,
    pub viewport: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisitLocation {
    pub ip: String,
    pub country: String,
    pub region: String,
    pub city: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageInfo {
    pub url: String,
    pub referrer: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UtmInfo {
    pub source: String,
    pub medium: String,
    pub campaign: String,
    pub content: String,
    pub term: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisitMeta {
    pub language: String,
    pub timezone: String,
    pub created_at: DateTime<Utc>,
}

/// Conversion as listed under a dashboard visit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversionSummary {
    pub id: i64,
    pub amount: f64,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// A recent visit grouped for display, with its conversions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecentVisit {
    pub id: i64,
    pub visitor_id: String,
    pub campaign_id: String,
    pub device: DeviceInfo,
    pub location: VisitLocation,
    pub page: PageInfo,
    pub utm: UtmInfo,
    pub meta: VisitMeta,
    pub conversions: Vec<ConversionSummary>,
}

/// Response for `GET /api/dashboard/stats`.
///
/// `total_visits`, `total_conversions` and `revenue` cover the recent-visit
/// window only; `today_visits` counts every visit since UTC midnight.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardStats {
    pub today_visits: i64,
    pub total_visits: i64,
    pub total_conversions: i64,
    pub revenue: f64,
    pub recent_visits: Vec<RecentVisit>,
    pub campaigns: Vec<CampaignStats>,
}

/// Totals over every recorded conversion.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConversionTotals {
    pub total_conversions: i64,
    pub total_revenue: f64,
    pub average_amount: f64,
}

/// Response for `GET /stats`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversionReport {
    pub conversions: Vec<ConversionRecord>,
    pub summary: ConversionTotals,
}

/// Response for `POST /track`.
#[derive(Debug, Clone, Serialize)]
pub struct TrackResponse {
    pub status: &'static str,
    pub visitor_id: String,
    pub created: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
}

/// Response for `POST /postback`.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionResponse {
    pub status: &'static str,
    pub conversion_id: i64,
    pub amount: f64,
    pub created_at: DateTime<Utc>,
    pub visitor_id: String,
    pub campaign_id: String,
}

/// Response for `GET|POST /network/postback`.
#[derive(Debug, Clone, Serialize)]
pub struct NetworkPostbackResponse {
    pub status: &'static str,
    pub conversion_id: i64,
    pub amount: f64,
    pub click_id: String,
    pub network: String,
}

/// Response for `POST /api/campaigns`.
#[derive(Debug, Clone, Serialize)]
pub struct CampaignCreatedResponse {
    pub status: &'static str,
    pub campaign_id: String,
    pub campaign_token: String,
}

/// Query parameters for `GET /click`.
#[derive(Debug, Deserialize)]
pub struct ClickQuery {
    /// The public campaign token.
    pub rtkck: Option<String>,
}

/// Query parameters for `DELETE /api/campaigns` and `DELETE /api/landing-pages`.
#[derive(Debug, Deserialize)]
pub struct DeleteQuery {
    pub id: Option<String>,
}

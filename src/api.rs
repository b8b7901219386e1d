//! HTTP API handlers for clickpath.
//!
//! Handlers extract request details, hand them to the pipeline modules and
//! render the outcome. Every tracking write (click, visit, conversion) runs on
//! a spawned task that the handler awaits, so a client hanging up mid-request
//! does not abort a write in flight.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{ConnectInfo, Query, RawQuery, State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use chrono::Utc;
use serde_json::{Value, json};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{info, instrument, warn};
use url::form_urlencoded;

use crate::aggregation::{self, DEFAULT_RECENT_LIMIT};
use crate::attribution::{self, ForwardContext};
use crate::catalog;
use crate::clicks::{self, ClickContext};
use crate::error::{Result, TrackerError};
use crate::forwarder::ConversionForwarder;
use crate::geo::{Locator, NullLocator};
use crate::ids::{IdGenerator, RandomIdGenerator};
use crate::model::{
    CampaignCreatedResponse, CampaignRequest, CampaignStats, ClickQuery, ConversionReport,
    ConversionRequest, ConversionResponse, DashboardStats, DeleteQuery, LandingPage,
    LandingPageRequest, NetworkPostbackResponse, Offer, OfferRequest, TrackResponse,
    VisitRequest,
};
use crate::postback;
use crate::registry::{self, TOKEN_ATTEMPTS};
use crate::storage::Storage;
use crate::visits::{self, BeaconContext};

/// Cookie carrying the visitor identity between click and beacon.
pub const VISITOR_COOKIE: &str = "visitor_id";

/// Visitor cookie lifetime in seconds: 30 days.
pub const VISITOR_COOKIE_MAX_AGE: i64 = 30 * 24 * 60 * 60;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub storage: Storage,
    pub ids: Arc<dyn IdGenerator>,
    pub locator: Arc<dyn Locator>,
    pub forwarder: Option<ConversionForwarder>,
    pub affiliate_id: Option<String>,
    pub recent_limit: u32,
}

impl AppState {
    /// State with random identifiers, no geolocation and no forwarding.
    pub fn new(storage: Storage) -> Self {
        Self {
            storage,
            ids: Arc::new(RandomIdGenerator),
            locator: Arc::new(NullLocator),
            forwarder: None,
            affiliate_id: None,
            recent_limit: DEFAULT_RECENT_LIMIT,
        }
    }

    pub fn with_ids(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn with_locator(mut self, locator: Arc<dyn Locator>) -> Self {
        self.locator = locator;
        self
    }

    pub fn with_forwarder(mut self, forwarder: ConversionForwarder) -> Self {
        self.forwarder = Some(forwarder);
        self
    }

    pub fn with_affiliate_id(mut self, affiliate_id: Option<String>) -> Self {
        self.affiliate_id = affiliate_id;
        self
    }

    pub fn with_recent_limit(mut self, recent_limit: u32) -> Self {
        self.recent_limit = recent_limit;
        self
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/click", get(get_click))
        .route("/track", post(post_track))
        .route("/postback", post(post_postback))
        .route(
            "/network/postback",
            get(network_postback).post(network_postback),
        )
        .route(
            "/api/campaigns",
            get(list_campaigns)
                .post(create_campaign)
                .delete(delete_campaign),
        )
        .route("/api/offers", get(list_offers).post(create_offer))
        .route(
            "/api/landing-pages",
            get(list_landing_pages)
                .post(create_landing_page)
                .put(update_landing_page)
                .delete(delete_landing_page),
        )
        .route("/api/dashboard/stats", get(get_dashboard_stats))
        .route("/stats", get(get_all_stats))
        .route("/health", get(health_check))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

/// GET /click?rtkck=<token> - Record a click and redirect to the offer.
///
/// Responds `302 Found` with the offer URL (carrying `clickid` and `source`)
/// and sets the visitor cookie. A missing or unknown token is a `400`; a
/// click is never redirected without a resolved campaign.
#[instrument(skip(state, headers, jar))]
pub async fn get_click(
    State(state): State<AppState>,
    connect: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    jar: CookieJar,
    Query(query): Query<ClickQuery>,
) -> Result<Response> {
    let token = query.rtkck.unwrap_or_default();
    let context = ClickContext {
        visitor_id: jar_value(&jar, VISITOR_COOKIE),
        ip_address: client_ip(&headers, connect.map(|ConnectInfo(addr)| addr)),
        user_agent: header_str(&headers, header::USER_AGENT),
        referrer: header_str(&headers, header::REFERER),
    };

    let outcome = run_detached(async move {
        clicks::record_click(
            &state.storage,
            state.ids.as_ref(),
            state.affiliate_id.as_deref(),
            &token,
            context,
        )
        .await
    })
    .await
    .map_err(|e| match e {
        TrackerError::NotFound(message) => TrackerError::Invalid(message),
        other => other,
    })
    .inspect_err(|e| warn!(error = %e, "Click rejected"))?;

    let cookie = Cookie::build((VISITOR_COOKIE, outcome.visitor_id))
        .path("/")
        .max_age(time::Duration::seconds(VISITOR_COOKIE_MAX_AGE));

    Ok((
        StatusCode::FOUND,
        jar.add(cookie),
        [(header::LOCATION, outcome.redirect_url)],
    )
        .into_response())
}

/// POST /track - Record the beacon for a click.
///
/// Idempotent by `click_id`: repeated beacons return the visitor ID of the
/// first one with `created: false`.
///
/// # Response
///
/// ```json
/// { "status": "success", "visitor_id": "...", "created": true }
/// ```
#[instrument(skip(state, headers, payload))]
pub async fn post_track(
    State(state): State<AppState>,
    connect: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    payload: std::result::Result<Json<VisitRequest>, JsonRejection>,
) -> Result<Json<TrackResponse>> {
    let Json(request) = payload.map_err(invalid_body)?;
    let context = BeaconContext {
        ip_address: client_ip(&headers, connect.map(|ConnectInfo(addr)| addr)),
        user_agent: header_str(&headers, header::USER_AGENT),
    };

    let outcome = run_detached(async move {
        visits::record_visit(
            &state.storage,
            state.ids.as_ref(),
            state.locator.as_ref(),
            request,
            context,
        )
        .await
    })
    .await
    .inspect_err(|e| warn!(error = %e, "Beacon rejected"))?;

    Ok(Json(TrackResponse {
        status: "success",
        visitor_id: outcome.visitor_id,
        created: outcome.created,
        message: (!outcome.created).then_some("Visit already tracked"),
    }))
}

/// POST /postback - Record a conversion reported for a visitor.
///
/// The campaign is taken from the visitor's visit; a `campaign_id` in the
/// body is ignored.
#[instrument(skip(state, jar, payload))]
pub async fn post_postback(
    State(state): State<AppState>,
    jar: CookieJar,
    payload: std::result::Result<Json<ConversionRequest>, JsonRejection>,
) -> Result<Json<ConversionResponse>> {
    let Json(request) = payload.map_err(invalid_body)?;
    let context = forward_context(&jar);

    let conversion = run_detached(async move {
        attribution::record_direct_conversion(
            &state.storage,
            state.forwarder.as_ref(),
            &request.visitor_id,
            request.amount,
            context,
        )
        .await
    })
    .await
    .inspect_err(|e| warn!(error = %e, "Conversion rejected"))?;

    Ok(Json(ConversionResponse {
        status: "success",
        conversion_id: conversion.id,
        amount: conversion.amount,
        created_at: conversion.created_at,
        visitor_id: conversion.visitor_id,
        campaign_id: conversion.campaign_id,
    }))
}

/// GET|POST /network/postback - Record a conversion reported by an ad network.
///
/// Parameters are read from the query string and, for POST, from a
/// form-encoded body. The first value of a repeated parameter wins, and query
/// parameters win over body parameters.
///
/// Responds `400` without a click identifier and `404` when the click has no
/// visit.
#[instrument(skip(state, jar, body))]
pub async fn network_postback(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
    jar: CookieJar,
    body: String,
) -> Result<Json<NetworkPostbackResponse>> {
    let query = query.unwrap_or_default();
    let params = postback::collect_params(
        form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .chain(form_urlencoded::parse(body.as_bytes()).into_owned()),
    );
    let intent = postback::parse(&params);
    let context = forward_context(&jar);

    let network = intent.network.clone();
    let conversion = run_detached(async move {
        attribution::attribute(
            &state.storage,
            state.forwarder.as_ref(),
            &intent,
            context,
        )
        .await
    })
    .await
    .inspect_err(|e| warn!(network = %network, error = %e, "Network postback rejected"))?;

    Ok(Json(NetworkPostbackResponse {
        status: "success",
        conversion_id: conversion.id,
        amount: conversion.amount,
        click_id: conversion.click_id.unwrap_or_default(),
        network,
    }))
}

/// GET /api/campaigns - Every campaign with its totals, newest first.
#[instrument(skip(state))]
pub async fn list_campaigns(State(state): State<AppState>) -> Result<Json<Vec<CampaignStats>>> {
    let stats = registry::stats(&state.storage)
        .await
        .inspect_err(|e| warn!(error = %e, "Failed to list campaigns"))?;

    info!(campaign_count = stats.len(), "Campaigns listed");
    Ok(Json(stats))
}

/// POST /api/campaigns - Create a campaign.
///
/// # Request Body
///
/// ```json
/// {
///     "name": "Spring Sale",
///     "landing_page": "https://lp.example.com",
///     "traffic_source": "social",
///     "offer_url": "https://offers.example.com/go"
/// }
/// ```
///
/// `offer_url` is optional; the other fields are required.
#[instrument(skip(state, payload))]
pub async fn create_campaign(
    State(state): State<AppState>,
    payload: std::result::Result<Json<CampaignRequest>, JsonRejection>,
) -> Result<Json<CampaignCreatedResponse>> {
    let Json(request) = payload.map_err(invalid_body)?;

    let campaign = registry::create_campaign_with_retry(
        &state.storage,
        state.ids.as_ref(),
        &request,
        TOKEN_ATTEMPTS,
    )
    .await
    .inspect_err(|e| warn!(error = %e, "Campaign creation failed"))?;

    Ok(Json(CampaignCreatedResponse {
        status: "success",
        campaign_id: campaign.campaign_id,
        campaign_token: campaign.campaign_token,
    }))
}

/// DELETE /api/campaigns?id=<campaign_id> - Delete a campaign without visits.
#[instrument(skip(state))]
pub async fn delete_campaign(
    State(state): State<AppState>,
    Query(query): Query<DeleteQuery>,
) -> Result<Json<Value>> {
    let campaign_id = query.id.unwrap_or_default();

    registry::delete_campaign(&state.storage, &campaign_id)
        .await
        .inspect_err(|e| warn!(campaign_id = %campaign_id, error = %e, "Campaign delete failed"))?;

    Ok(Json(json!({ "status": "success" })))
}

/// GET /api/offers - Every offer, newest first.
#[instrument(skip(state))]
pub async fn list_offers(State(state): State<AppState>) -> Result<Json<Vec<Offer>>> {
    let offers = catalog::list_offers(&state.storage)
        .await
        .inspect_err(|e| warn!(error = %e, "Failed to list offers"))?;

    Ok(Json(offers))
}

/// POST /api/offers - Add an offer.
///
/// # Request Body
///
/// ```json
/// { "name": "Spring Bundle", "network": "maxbounty", "offer_url": "https://offers.example.com/go" }
/// ```
///
/// Every field is required. A second offer with the same name on the same
/// network is a `409`.
#[instrument(skip(state, payload))]
pub async fn create_offer(
    State(state): State<AppState>,
    payload: std::result::Result<Json<OfferRequest>, JsonRejection>,
) -> Result<Json<Offer>> {
    let Json(request) = payload.map_err(invalid_body)?;

    let offer = catalog::create_offer(&state.storage, &request)
        .await
        .inspect_err(|e| warn!(error = %e, "Offer creation failed"))?;

    Ok(Json(offer))
}

/// GET /api/landing-pages - Every landing page, newest first.
#[instrument(skip(state))]
pub async fn list_landing_pages(State(state): State<AppState>) -> Result<Json<Vec<LandingPage>>> {
    let pages = catalog::list_landing_pages(&state.storage)
        .await
        .inspect_err(|e| warn!(error = %e, "Failed to list landing pages"))?;

    Ok(Json(pages))
}

/// POST /api/landing-pages - Add a landing page. A known URL is a `409`.
#[instrument(skip(state, payload))]
pub async fn create_landing_page(
    State(state): State<AppState>,
    payload: std::result::Result<Json<LandingPageRequest>, JsonRejection>,
) -> Result<Json<LandingPage>> {
    let Json(request) = payload.map_err(invalid_body)?;

    let page = catalog::create_landing_page(&state.storage, &request)
        .await
        .inspect_err(|e| warn!(error = %e, "Landing page creation failed"))?;

    Ok(Json(page))
}

/// PUT /api/landing-pages - Replace the name and URL of the page `id`.
#[instrument(skip(state, payload))]
pub async fn update_landing_page(
    State(state): State<AppState>,
    payload: std::result::Result<Json<LandingPageRequest>, JsonRejection>,
) -> Result<Json<LandingPage>> {
    let Json(request) = payload.map_err(invalid_body)?;

    let page = catalog::update_landing_page(&state.storage, &request)
        .await
        .inspect_err(|e| warn!(error = %e, "Landing page update failed"))?;

    Ok(Json(page))
}

/// DELETE /api/landing-pages?id=<id> - Remove a landing page.
#[instrument(skip(state))]
pub async fn delete_landing_page(
    State(state): State<AppState>,
    Query(query): Query<DeleteQuery>,
) -> Result<Json<Value>> {
    let id = query.id.unwrap_or_default();

    catalog::delete_landing_page(&state.storage, &id)
        .await
        .inspect_err(|e| warn!(landing_page_id = %id, error = %e, "Landing page delete failed"))?;

    Ok(Json(json!({ "status": "success" })))
}

/// GET /api/dashboard/stats - Visits today, recent visits and campaign totals.
#[instrument(skip(state))]
pub async fn get_dashboard_stats(State(state): State<AppState>) -> Result<Json<DashboardStats>> {
    let window_start = aggregation::start_of_day(Utc::now());

    let stats = aggregation::dashboard_stats(&state.storage, window_start, state.recent_limit)
        .await
        .inspect_err(|e| warn!(error = %e, "Failed to compute dashboard stats"))?;

    info!(
        today_visits = stats.today_visits,
        recent_visits = stats.total_visits,
        revenue = stats.revenue,
        "Dashboard queried"
    );
    Ok(Json(stats))
}

/// GET /stats - Every conversion with campaign and visitor details.
#[instrument(skip(state))]
pub async fn get_all_stats(State(state): State<AppState>) -> Result<Json<ConversionReport>> {
    let report = aggregation::all_stats(&state.storage)
        .await
        .inspect_err(|e| warn!(error = %e, "Failed to build conversion report"))?;

    Ok(Json(report))
}

/// GET /health - Simple health check endpoint.
pub async fn health_check() -> impl IntoResponse {
    StatusCode::OK
}

/// Run a tracking write on its own task and wait for it.
async fn run_detached<T, F>(task: F) -> Result<T>
where
    F: Future<Output = Result<T>> + Send + 'static,
    T: Send + 'static,
{
    tokio::spawn(task)
        .await
        .map_err(|e| TrackerError::Internal(format!("tracking task failed: {e}")))?
}

fn invalid_body(rejection: JsonRejection) -> TrackerError {
    TrackerError::Invalid(rejection.body_text())
}

fn forward_context(jar: &CookieJar) -> ForwardContext {
    ForwardContext {
        fbc: jar_value(jar, "_fbc"),
        fbp: jar_value(jar, "_fbp"),
    }
}

/// Value of the cookie called `name`, if non-empty.
fn jar_value(jar: &CookieJar, name: &str) -> Option<String> {
    jar.get(name)
        .map(|cookie| cookie.value().trim().to_string())
        .filter(|value| !value.is_empty())
}

fn header_str(headers: &HeaderMap, name: header::HeaderName) -> String {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

/// The first `X-Forwarded-For` entry, else the peer address.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_default()
}

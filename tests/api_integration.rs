//! Integration tests for the clickpath API endpoints.
//!
//! These tests drive the full click -> beacon -> postback cycle through the
//! HTTP router.

use std::sync::Arc;

use axum::http::{HeaderName, HeaderValue, StatusCode, header};
use axum_test::TestServer;
use serde_json::{Value, json};
use url::Url;

use clickpath::api::{AppState, router};
use clickpath::forwarder::ConversionForwarder;
use clickpath::ids::SequentialIdGenerator;
use clickpath::storage::Storage;

async fn create_test_state() -> AppState {
    let storage = Storage::new("sqlite::memory:").await.unwrap();
    AppState::new(storage).with_ids(Arc::new(SequentialIdGenerator::new()))
}

async fn create_test_server() -> TestServer {
    TestServer::new(router(create_test_state().await)).unwrap()
}

/// Create a campaign and return `(campaign_id, campaign_token)`.
async fn create_campaign(server: &TestServer) -> (String, String) {
    let response = server
        .post("/api/campaigns")
        .json(&json!({
            "name": "Spring Sale",
            "landing_page": "https://lp.example.com",
            "traffic_source": "social",
            "offer_url": "https://offers.example.com/go?sub=1"
        }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "success");
    (
        body["campaign_id"].as_str().unwrap().to_string(),
        body["campaign_token"].as_str().unwrap().to_string(),
    )
}

/// Follow a campaign link and return `(click_id, redirect_url)`.
async fn click(server: &TestServer, token: &str) -> (String, Url) {
    let response = server.get("/click").add_query_param("rtkck", token).await;

    response.assert_status(StatusCode::FOUND);
    let location = response
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    let url = Url::parse(&location).unwrap();
    let click_id = url
        .query_pairs()
        .find(|(key, _)| key == "clickid")
        .map(|(_, value)| value.into_owned())
        .unwrap();
    (click_id, url)
}

async fn track(server: &TestServer, click_id: &str, campaign_id: &str) -> Value {
    let response = server
        .post("/track")
        .json(&json!({
            "click_id": click_id,
            "campaign_id": campaign_id,
            "browser": "Firefox",
            "browser_version": "128",
            "os": "Linux",
            "device_type": "desktop",
            "utm_source": "news"
        }))
        .await;

    response.assert_status_ok();
    response.json()
}

#[tokio::test]
async fn test_health_endpoint() {
    let server = create_test_server().await;

    let response = server.get("/health").await;

    response.assert_status_ok();
}

#[tokio::test]
async fn test_end_to_end_attribution() {
    let server = create_test_server().await;

    let (campaign_id, token) = create_campaign(&server).await;
    let (click_id, redirect) = click(&server, &token).await;

    assert_eq!(redirect.host_str(), Some("offers.example.com"));
    assert!(redirect.query_pairs().any(|(k, v)| k == "sub" && v == "1"));
    assert!(
        redirect
            .query_pairs()
            .any(|(k, v)| k == "source" && v == campaign_id.as_str())
    );

    let tracked = track(&server, &click_id, &campaign_id).await;
    assert_eq!(tracked["status"], "success");
    assert_eq!(tracked["created"], true);

    let response = server
        .get("/network/postback")
        .add_query_param("clickid", &click_id)
        .add_query_param("payout", "99.99")
        .add_query_param("network", "maxbounty")
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["click_id"], click_id.as_str());
    assert_eq!(body["amount"], 99.99);
    assert_eq!(body["network"], "maxbounty");

    let response = server.get("/api/campaigns").await;
    response.assert_status_ok();
    let campaigns: Value = response.json();
    let stats = &campaigns[0]["stats"];
    assert_eq!(campaigns[0]["campaign_id"], campaign_id.as_str());
    assert_eq!(stats["visits"], 1);
    assert_eq!(stats["conversions"], 1);
    assert!((stats["revenue"].as_f64().unwrap() - 99.99).abs() < 1e-9);
}

#[tokio::test]
async fn test_click_sets_visitor_cookie() {
    let server = create_test_server().await;
    let (_, token) = create_campaign(&server).await;

    let response = server.get("/click").add_query_param("rtkck", &token).await;

    response.assert_status(StatusCode::FOUND);
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(cookie.starts_with("visitor_id="));
    assert!(cookie.contains("Max-Age=2592000"));
    assert!(cookie.contains("Path=/"));
}

#[tokio::test]
async fn test_click_reuses_visitor_cookie() {
    let server = create_test_server().await;
    let (_, token) = create_campaign(&server).await;

    let response = server
        .get("/click")
        .add_query_param("rtkck", &token)
        .add_header(header::COOKIE, HeaderValue::from_static("visitor_id=returning"))
        .await;

    let cookie = response.headers().get(header::SET_COOKIE).unwrap();
    assert!(cookie.to_str().unwrap().starts_with("visitor_id=returning;"));
}

#[tokio::test]
async fn test_click_with_missing_or_unknown_token_is_bad_request() {
    let server = create_test_server().await;
    create_campaign(&server).await;

    let response = server.get("/click").await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let response = server
        .get("/click")
        .add_query_param("rtkck", "0000000000")
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert!(response.headers().get(header::LOCATION).is_none());
}

#[tokio::test]
async fn test_repeated_beacon_returns_same_visitor() {
    let server = create_test_server().await;
    let (campaign_id, token) = create_campaign(&server).await;
    let (click_id, _) = click(&server, &token).await;

    let first = track(&server, &click_id, &campaign_id).await;
    let second = track(&server, &click_id, &campaign_id).await;

    assert_eq!(first["visitor_id"], second["visitor_id"]);
    assert_eq!(second["created"], false);
    assert_eq!(second["message"], "Visit already tracked");

    let campaigns: Value = server.get("/api/campaigns").await.json();
    assert_eq!(campaigns[0]["stats"]["visits"], 1);
}

#[tokio::test]
async fn test_beacon_for_unknown_campaign_is_bad_request() {
    let server = create_test_server().await;

    let response = server
        .post("/track")
        .json(&json!({ "click_id": "stray", "campaign_id": "nope" }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["status"], "error");
}

#[tokio::test]
async fn test_network_postback_errors() {
    let server = create_test_server().await;

    let response = server
        .get("/network/postback")
        .add_query_param("payout", "5")
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let response = server
        .get("/network/postback")
        .add_query_param("clickid", "unknown")
        .add_query_param("payout", "5")
        .await;
    response.assert_status(StatusCode::NOT_FOUND);

    let report: Value = server.get("/stats").await.json();
    assert_eq!(report["summary"]["total_conversions"], 0);
}

#[tokio::test]
async fn test_network_postback_accepts_form_body() {
    let server = create_test_server().await;
    let (campaign_id, token) = create_campaign(&server).await;
    let (click_id, _) = click(&server, &token).await;
    track(&server, &click_id, &campaign_id).await;

    let response = server
        .post("/network/postback")
        .text(format!("click={click_id}&amount=abc&revenue=7.5"))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["amount"], 7.5);
    assert_eq!(body["network"], "unknown");
}

#[tokio::test]
async fn test_direct_postback() {
    let server = create_test_server().await;
    let (campaign_id, token) = create_campaign(&server).await;
    let (click_id, _) = click(&server, &token).await;
    let tracked = track(&server, &click_id, &campaign_id).await;

    let response = server
        .post("/postback")
        .json(&json!({
            "visitor_id": tracked["visitor_id"],
            "campaign_id": "spoofed",
            "amount": 12.5
        }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "success");
    assert_eq!(body["campaign_id"], campaign_id.as_str());
    assert_eq!(body["amount"], 12.5);

    let response = server
        .post("/postback")
        .json(&json!({ "amount": 1.0 }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let response = server
        .post("/postback")
        .json(&json!({ "visitor_id": "ghost", "amount": 1.0 }))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_create_campaign_requires_fields() {
    let server = create_test_server().await;

    let response = server
        .post("/api/campaigns")
        .json(&json!({ "name": "No landing page" }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_delete_campaign() {
    let server = create_test_server().await;
    let (visited_id, token) = create_campaign(&server).await;
    let (idle_id, _) = create_campaign(&server).await;
    let (click_id, _) = click(&server, &token).await;
    track(&server, &click_id, &visited_id).await;

    let response = server
        .delete("/api/campaigns")
        .add_query_param("id", &visited_id)
        .await;
    response.assert_status(StatusCode::CONFLICT);

    let response = server
        .delete("/api/campaigns")
        .add_query_param("id", &idle_id)
        .await;
    response.assert_status_ok();

    let response = server
        .delete("/api/campaigns")
        .add_query_param("id", &idle_id)
        .await;
    response.assert_status(StatusCode::NOT_FOUND);

    let campaigns: Value = server.get("/api/campaigns").await.json();
    assert_eq!(campaigns.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_beacon_for_click_of_deleted_campaign() {
    let server = create_test_server().await;
    let (campaign_id, token) = create_campaign(&server).await;
    let (click_id, _) = click(&server, &token).await;

    server
        .delete("/api/campaigns")
        .add_query_param("id", &campaign_id)
        .await
        .assert_status_ok();

    let response = server
        .post("/track")
        .json(&json!({ "click_id": click_id }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_offers() {
    let server = create_test_server().await;
    let offer = json!({
        "name": "Spring Bundle",
        "network": "maxbounty",
        "offer_url": "https://offers.example.com/go"
    });

    let response = server.post("/api/offers").json(&offer).await;
    response.assert_status_ok();
    let created: Value = response.json();
    assert!(created["id"].as_i64().unwrap() > 0);
    assert_eq!(created["network"], "maxbounty");

    server
        .post("/api/offers")
        .json(&offer)
        .await
        .assert_status(StatusCode::CONFLICT);

    server
        .post("/api/offers")
        .json(&json!({ "name": "Spring Bundle", "network": "clickbank" }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    let offers: Value = server.get("/api/offers").await.json();
    assert_eq!(offers.as_array().unwrap().len(), 1);
    assert_eq!(offers[0]["name"], "Spring Bundle");
}

#[tokio::test]
async fn test_landing_pages() {
    let server = create_test_server().await;

    let response = server
        .post("/api/landing-pages")
        .json(&json!({ "name": "Welcome", "url": "https://lp.example.com/welcome" }))
        .await;
    response.assert_status_ok();
    let page: Value = response.json();
    let id = page["id"].as_i64().unwrap();

    server
        .post("/api/landing-pages")
        .json(&json!({ "name": "Copy", "url": "https://lp.example.com/welcome" }))
        .await
        .assert_status(StatusCode::CONFLICT);

    let response = server
        .put("/api/landing-pages")
        .json(&json!({ "id": id, "name": "Welcome v2", "url": "https://lp.example.com/v2" }))
        .await;
    response.assert_status_ok();
    let updated: Value = response.json();
    assert_eq!(updated["name"], "Welcome v2");

    server
        .put("/api/landing-pages")
        .json(&json!({ "id": id + 100, "name": "Missing", "url": "https://lp.example.com/x" }))
        .await
        .assert_status(StatusCode::NOT_FOUND);

    server
        .delete("/api/landing-pages")
        .add_query_param("id", "not-a-number")
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    server
        .delete("/api/landing-pages")
        .add_query_param("id", id)
        .await
        .assert_status_ok();

    let pages: Value = server.get("/api/landing-pages").await.json();
    assert!(pages.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_dashboard_stats() {
    let server = create_test_server().await;
    let (campaign_id, token) = create_campaign(&server).await;
    let (converted, _) = click(&server, &token).await;
    let (unconverted, _) = click(&server, &token).await;
    track(&server, &converted, &campaign_id).await;
    track(&server, &unconverted, &campaign_id).await;

    server
        .get("/network/postback")
        .add_query_param("click_id", &converted)
        .add_query_param("amount", "40")
        .await
        .assert_status_ok();

    let response = server.get("/api/dashboard/stats").await;
    response.assert_status_ok();
    let stats: Value = response.json();

    assert_eq!(stats["today_visits"], 2);
    assert_eq!(stats["total_visits"], 2);
    assert_eq!(stats["total_conversions"], 1);
    assert_eq!(stats["revenue"], 40.0);
    assert_eq!(stats["campaigns"].as_array().unwrap().len(), 1);

    let recent = stats["recent_visits"].as_array().unwrap();
    assert_eq!(recent.len(), 2);
    let total: usize = recent
        .iter()
        .map(|visit| visit["conversions"].as_array().unwrap().len())
        .sum();
    assert_eq!(total, 1);
    assert_eq!(recent[0]["device"]["browser"], "Firefox 128");
    assert_eq!(recent[0]["utm"]["source"], "news");
}

#[tokio::test]
async fn test_conversion_report() {
    let server = create_test_server().await;
    let (campaign_id, token) = create_campaign(&server).await;
    let (click_id, _) = click(&server, &token).await;
    track(&server, &click_id, &campaign_id).await;

    for amount in ["10", "30"] {
        server
            .get("/network/postback")
            .add_query_param("clickid", &click_id)
            .add_query_param("amount", amount)
            .await
            .assert_status_ok();
    }

    let report: Value = server.get("/stats").await.json();
    assert_eq!(report["summary"]["total_conversions"], 2);
    assert_eq!(report["summary"]["total_revenue"], 40.0);
    assert_eq!(report["summary"]["average_amount"], 20.0);
    assert_eq!(report["conversions"][0]["campaign_name"], "Spring Sale");
    assert_eq!(report["conversions"][0]["visitor_info"]["browser"], "Firefox");
}

#[tokio::test]
async fn test_conversion_is_queued_for_forwarding() {
    let (forwarder, mut receiver) = ConversionForwarder::with_channel(8);
    let state = create_test_state().await.with_forwarder(forwarder);
    let server = TestServer::new(router(state)).unwrap();

    let (campaign_id, token) = create_campaign(&server).await;
    let (click_id, _) = click(&server, &token).await;
    track(&server, &click_id, &campaign_id).await;

    server
        .get("/network/postback")
        .add_query_param("clickid", &click_id)
        .add_query_param("amount", "15")
        .add_header(
            header::COOKIE,
            HeaderValue::from_static("_fbc=fb.1.1.abc; _fbp=fb.1.1.def"),
        )
        .await
        .assert_status_ok();

    let event = receiver.recv().await.unwrap();
    assert_eq!(event.conversion.amount, 15.0);
    assert_eq!(event.conversion.campaign_id, campaign_id);
    assert_eq!(event.fbc.as_deref(), Some("fb.1.1.abc"));
    assert_eq!(event.fbp.as_deref(), Some("fb.1.1.def"));
}

#[tokio::test]
async fn test_beacon_records_forwarded_client_ip() {
    let server = create_test_server().await;
    let (campaign_id, token) = create_campaign(&server).await;
    let (click_id, _) = click(&server, &token).await;

    server
        .post("/track")
        .add_header(
            HeaderName::from_static("x-forwarded-for"),
            HeaderValue::from_static("203.0.113.9, 10.0.0.1"),
        )
        .json(&json!({ "click_id": click_id, "campaign_id": campaign_id }))
        .await
        .assert_status_ok();

    let stats: Value = server.get("/api/dashboard/stats").await.json();
    assert_eq!(stats["recent_visits"][0]["location"]["ip"], "203.0.113.9");
}

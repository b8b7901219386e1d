//! Clickpath - click, visit and conversion attribution for paid traffic.
//!
//! # API Endpoints
//!
//! - `GET /click?rtkck=<token>` - Record a click and redirect to the offer
//! - `POST /track` - Record the landing-page beacon for a click
//! - `POST /postback` - Record a conversion for a visitor
//! - `GET|POST /network/postback` - Record a conversion reported by an ad network
//! - `GET|POST|DELETE /api/campaigns` - List, create and delete campaigns
//! - `GET|POST /api/offers` - List and create offers
//! - `GET|POST|PUT|DELETE /api/landing-pages` - Manage landing pages
//! - `GET /api/dashboard/stats` - Dashboard payload
//! - `GET /stats` - Every conversion with campaign and visitor details
//! - `GET /health` - Health check

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use clickpath::api::{self, AppState};
use clickpath::config::Config;
use clickpath::forwarder::{ConversionForwarder, DEFAULT_QUEUE_CAPACITY};
use clickpath::geo::IpApiLocator;
use clickpath::storage::Storage;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Seed the environment before the filter reads RUST_LOG.
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("clickpath=info".parse()?))
        .init();

    let config = Config::from_env();

    info!(port = config.port, db_url = %config.database_url, "Starting clickpath server");

    let storage = Storage::new(&config.database_url).await?;
    info!("Database initialized");

    let mut state = AppState::new(storage)
        .with_affiliate_id(config.affiliate_id.clone())
        .with_recent_limit(config.recent_limit);

    if config.geoip_enabled {
        state = state.with_locator(Arc::new(IpApiLocator::new(&config.geoip_api_url)?));
        info!(api_url = %config.geoip_api_url, "Geolocation enabled");
    }

    if let Some(forwarder_config) = config.forwarder.clone() {
        let (forwarder, _worker) =
            ConversionForwarder::spawn(forwarder_config, DEFAULT_QUEUE_CAPACITY)?;
        state = state.with_forwarder(forwarder);
        info!("Conversion forwarding enabled");
    }

    let app = api::router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;

    info!(%addr, "Clickpath is listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

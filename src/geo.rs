//! IP geolocation used to enrich visits.
//!
//! Lookups are best-effort: callers treat any error as "location unknown"
//! and store empty fields. Private, loopback and link-local addresses never
//! leave the process and resolve to a fixed local marker.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use serde::Deserialize;

use crate::model::Location;

/// Default ip-api.com endpoint (free tier, no key required).
pub const IP_API_BASE: &str = "http://ip-api.com/json";

/// Upper bound for a single lookup.
const LOOKUP_TIMEOUT: Duration = Duration::from_secs(2);

/// Resolves an IP address to a coarse location.
#[async_trait]
pub trait Locator: Send + Sync {
    async fn locate(&self, ip: &str) -> anyhow::Result<Location>;
}

/// Locator that never resolves anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullLocator;

#[async_trait]
impl Locator for NullLocator {
    async fn locate(&self, _ip: &str) -> anyhow::Result<Location> {
        Ok(Location::default())
    }
}

/// Client for the ip-api.com JSON endpoint.
#[derive(Clone)]
pub struct IpApiLocator {
    client: reqwest::Client,
    base_url: String,
}

impl IpApiLocator {
    /// Locator querying `base_url`. Fails if the HTTP client cannot be built.
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(LOOKUP_TIMEOUT)
            .build()
            .context("building geolocation HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IpApiResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    country_code: String,
    #[serde(default)]
    region: String,
    #[serde(default)]
    city: String,
}

#[async_trait]
impl Locator for IpApiLocator {
    async fn locate(&self, ip: &str) -> anyhow::Result<Location> {
        let addr = parse_ip(ip).with_context(|| format!("invalid IP address: {ip}"))?;

        if is_local(&addr) {
            return Ok(local_location());
        }

        let url = format!(
            "{}/{}?fields=status,message,countryCode,region,city",
            self.base_url, addr
        );

        let response = self.client.get(&url).send().await?.error_for_status()?;
        let data = response.json::<IpApiResponse>().await?;

        if data.status != "success" {
            return Err(anyhow!("ip-api lookup failed: {}", data.message));
        }

        Ok(Location {
            country: data.country_code,
            region: data.region,
            city: data.city,
        })
    }
}

/// Parse a bare IP or an `ip:port` / `[ipv6]:port` peer address.
pub fn parse_ip(raw: &str) -> Option<IpAddr> {
    let raw = raw.trim();
    raw.parse::<IpAddr>()
        .ok()
        .or_else(|| raw.parse::<SocketAddr>().ok().map(|s| s.ip()))
}

/// Addresses that have no public geolocation.
pub fn is_local(addr: &IpAddr) -> bool {
    match addr {
        IpAddr::V4(v4) => {
            v4.is_private() || v4.is_loopback() || v4.is_link_local() || v4.is_unspecified()
        }
        IpAddr::V6(v6) => {
            v6.is_loopback()
                || v6.is_unspecified()
                || v6.is_unique_local()
                || v6.is_unicast_link_local()
        }
    }
}

fn local_location() -> Location {
    Location {
        country: "LO".to_string(),
        region: "Local".to_string(),
        city: "Local".to_string(),
    }
}

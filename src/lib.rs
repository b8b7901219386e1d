//! Clickpath - click, visit and conversion attribution for paid traffic.
//!
//! # Overview
//!
//! Clickpath follows a visitor from an advertising click to a conversion
//! reported by an ad network:
//!
//! 1. A click on a campaign link (`/click?rtkck=<token>`) is recorded and
//!    redirected to the offer with a `clickid` appended.
//! 2. A beacon on the landing page (`/track`) records one visit per click ID
//!    and hands the visitor a stable identity.
//! 3. A network postback (`/network/postback`) names the click ID; the
//!    conversion is attributed to the visit and its campaign.
//!
//! # Modules
//!
//! - [`model`]: Records, request bodies and response payloads
//! - [`storage`]: SQLite storage layer
//! - [`registry`]: Campaign creation, token resolution and deletion
//! - [`catalog`]: Offer and landing-page catalogs
//! - [`clicks`]: Click recording and redirect building
//! - [`visits`]: Idempotent visit recording
//! - [`postback`]: Normalization of network postback parameters
//! - [`attribution`]: Conversion attribution
//! - [`forwarder`]: Background forwarding of conversions to the ad-attribution API
//! - [`aggregation`]: Dashboard and conversion reports
//! - [`geo`]: IP geolocation
//! - [`ids`]: Identifier generation
//! - [`config`]: Environment configuration
//! - [`api`]: HTTP API handlers

pub mod aggregation;
pub mod api;
pub mod attribution;
pub mod catalog;
pub mod clicks;
pub mod config;
pub mod error;
pub mod forwarder;
pub mod geo;
pub mod ids;
pub mod model;
pub mod postback;
pub mod registry;
pub mod storage;
pub mod visits;

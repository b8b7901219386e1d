//! Conversion attribution.
//!
//! A conversion is always attached to a stored visit, and its campaign is
//! taken from that visit. Campaign IDs supplied by a postback are ignored.

use chrono::Utc;
use tracing::{info, warn};

use crate::error::{Result, TrackerError};
use crate::forwarder::{ConversionForwarder, ForwardEvent};
use crate::model::{Conversion, STATUS_COMPLETED, Visit};
use crate::postback::PostbackIntent;
use crate::storage::Storage;

/// Client signals passed through to the forwarded event.
#[derive(Debug, Clone, Default)]
pub struct ForwardContext {
    pub fbc: Option<String>,
    pub fbp: Option<String>,
}

/// Attribute a network postback to the visit of its click.
///
/// # Errors
///
/// - `Invalid` if the postback carries no click identifier
/// - `NotFound` if no visit exists for the click; nothing is written
pub async fn attribute(
    storage: &Storage,
    forwarder: Option<&ConversionForwarder>,
    intent: &PostbackIntent,
    context: ForwardContext,
) -> Result<Conversion> {
    let click_id = intent
        .click_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| TrackerError::Invalid("missing click ID".to_string()))?;

    let visit = storage
        .find_visit_by_click_id(click_id)
        .await?
        .ok_or_else(|| TrackerError::NotFound(format!("no visit for click {click_id}")))?;

    let conversion = persist(
        storage,
        &visit,
        Some(click_id.to_string()),
        intent.amount,
        &intent.status,
    )
    .await?;

    info!(
        conversion_id = conversion.id,
        click_id = %click_id,
        visitor_id = %conversion.visitor_id,
        campaign_id = %conversion.campaign_id,
        amount = conversion.amount,
        network = %intent.network,
        "Network conversion attributed"
    );

    schedule_forward(forwarder, &visit, &conversion, context);
    Ok(conversion)
}

/// Record a conversion reported directly for a visitor.
///
/// # Errors
///
/// - `Invalid` if `visitor_id` is empty or `amount` is negative or not finite
/// - `NotFound` if the visitor has no visit
pub async fn record_direct_conversion(
    storage: &Storage,
    forwarder: Option<&ConversionForwarder>,
    visitor_id: &str,
    amount: f64,
    context: ForwardContext,
) -> Result<Conversion> {
    let visitor_id = visitor_id.trim();
    if visitor_id.is_empty() {
        return Err(TrackerError::Invalid("missing visitor_id".to_string()));
    }
    if !amount.is_finite() || amount < 0.0 {
        return Err(TrackerError::Invalid(format!("invalid amount {amount}")));
    }

    let visit = storage
        .find_visit_by_visitor_id(visitor_id)
        .await?
        .ok_or_else(|| TrackerError::NotFound(format!("visitor {visitor_id}")))?;

    let conversion = persist(
        storage,
        &visit,
        visit.click_id.clone(),
        amount,
        STATUS_COMPLETED,
    )
    .await?;

    info!(
        conversion_id = conversion.id,
        visitor_id = %conversion.visitor_id,
        campaign_id = %conversion.campaign_id,
        amount = conversion.amount,
        "Direct conversion recorded"
    );

    schedule_forward(forwarder, &visit, &conversion, context);
    Ok(conversion)
}

async fn persist(
    storage: &Storage,
    visit: &Visit,
    click_id: Option<String>,
    amount: f64,
    status: &str,
) -> Result<Conversion> {
    let mut conversion = Conversion {
        id: 0,
        visitor_id: visit.visitor_id.clone(),
        click_id,
        campaign_id: visit.campaign_id.clone(),
        amount,
        status: status.to_string(),
        created_at: Utc::now(),
    };

    conversion.id = storage.insert_conversion(&conversion).await?;
    Ok(conversion)
}

fn schedule_forward(
    forwarder: Option<&ConversionForwarder>,
    visit: &Visit,
    conversion: &Conversion,
    context: ForwardContext,
) {
    let Some(forwarder) = forwarder else {
        return;
    };

    let queued = forwarder.enqueue(ForwardEvent {
        conversion: conversion.clone(),
        ip_address: visit.ip_address.clone(),
        user_agent: visit.user_agent.clone(),
        fbc: context.fbc,
        fbp: context.fbp,
    });

    if !queued {
        warn!(conversion_id = conversion.id, "Conversion not forwarded");
    }
}

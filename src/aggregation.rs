//! Aggregation of visits and conversions for reporting.
//!
//! Sums are computed over joined conversions only: a visit without
//! conversions contributes `0.0` revenue and no conversion count.

use chrono::{DateTime, NaiveTime, Utc};

use crate::error::Result;
use crate::model::{
    Conversion, ConversionReport, ConversionSummary, ConversionTotals, DashboardStats, DeviceInfo,
    PageInfo, RecentVisit, UtmInfo, Visit, VisitLocation, VisitMeta,
};
use crate::storage::Storage;

/// Default number of recent visits shown on the dashboard.
pub const DEFAULT_RECENT_LIMIT: u32 = 50;

/// Compute the dashboard payload.
///
/// # Arguments
///
/// * `storage` - Database connection
/// * `window_start` - Visits at or after this instant count as `today_visits`
/// * `recent_limit` - Number of most recent visits to join with conversions
pub async fn dashboard_stats(
    storage: &Storage,
    window_start: DateTime<Utc>,
    recent_limit: u32,
) -> Result<DashboardStats> {
    let today_visits = storage.count_visits_since(window_start).await?;
    let recent = storage.recent_visits_with_conversions(recent_limit).await?;
    let campaigns = storage.campaign_stats().await?;

    let total_visits = recent.len() as i64;
    let total_conversions = recent
        .iter()
        .map(|(_, conversions)| conversions.len() as i64)
        .sum();
    let revenue = recent
        .iter()
        .flat_map(|(_, conversions)| conversions.iter())
        .map(|conversion| conversion.amount)
        .sum();

    let recent_visits = recent
        .into_iter()
        .map(|(visit, conversions)| recent_visit(visit, conversions))
        .collect();

    Ok(DashboardStats {
        today_visits,
        total_visits,
        total_conversions,
        revenue,
        recent_visits,
        campaigns,
    })
}

/// Every conversion with campaign and visitor details, plus totals.
pub async fn all_stats(storage: &Storage) -> Result<ConversionReport> {
    let conversions = storage.conversion_records().await?;

    let total_conversions = conversions.len() as i64;
    let total_revenue: f64 = conversions.iter().map(|r| r.conversion.amount).sum();
    let average_amount = if total_conversions > 0 {
        total_revenue / total_conversions as f64
    } else {
        0.0
    };

    Ok(ConversionReport {
        conversions,
        summary: ConversionTotals {
            total_conversions,
            total_revenue,
            average_amount,
        },
    })
}

/// Midnight UTC of the day containing `now`.
pub fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive().and_time(NaiveTime::MIN).and_utc()
}

fn recent_visit(visit: Visit, conversions: Vec<Conversion>) -> RecentVisit {
    let browser = format!("{} {}", visit.browser, visit.browser_version)
        .trim()
        .to_string();

    RecentVisit {
        id: visit.id,
        visitor_id: visit.visitor_id,
        campaign_id: visit.campaign_id,
        device: DeviceInfo {
            device_type: visit.device_type,
            os: visit.os,
            browser,
            screen: visit.screen_resolution,
            viewport: visit.viewport_size,
        },
        location: VisitLocation {
            ip: visit.ip_address,
            country: visit.country,
            region: visit.region,
            city: visit.city,
        },
        page: PageInfo {
            url: visit.landing_page,
            referrer: visit.referrer,
        },
        utm: UtmInfo {
            source: visit.utm_source,
            medium: visit.utm_medium,
            campaign: visit.utm_campaign,
            content: visit.utm_content,
            term: visit.utm_term,
        },
        meta: VisitMeta {
            language: visit.language,
            timezone: visit.timezone,
            created_at: visit.created_at,
        },
        conversions: conversions
            .into_iter()
            .map(|conversion| ConversionSummary {
                id: conversion.id,
                amount: conversion.amount,
                status: conversion.status,
                created_at: conversion.created_at,
            })
            .collect(),
    }
}

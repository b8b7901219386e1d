//! SQLite storage layer for the attribution pipeline.
//!
//! All SQL lives here. The schema holds six tables:
//!
//! - `campaign`: registry of campaigns, unique ID and unique public token
//! - `click`: one row per redirect, written best-effort; soft reference to
//!   its campaign, so rows survive a campaign delete
//! - `visit`: one row per click ID (`UNIQUE(click_id)`), the dedup anchor
//! - `conversion`: append-only attributed conversions
//! - `offer`: offer catalog, unique per `(name, network)`
//! - `landing_page`: landing-page catalog, unique per URL
//!
//! Timestamps are stored as unix seconds.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};

use crate::error::{Result, TrackerError};
use crate::model::{
    Campaign, CampaignStats, CampaignTotals, Click, Conversion, ConversionRecord, LandingPage,
    Offer, Visit, VisitorInfo,
};

/// Schema statements, executed in order at startup.
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS campaign (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        campaign_id TEXT NOT NULL UNIQUE,
        campaign_token TEXT NOT NULL UNIQUE,
        name TEXT NOT NULL,
        offer_url TEXT NOT NULL DEFAULT '',
        landing_page TEXT NOT NULL DEFAULT '',
        traffic_source TEXT NOT NULL DEFAULT '',
        created_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS click (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        click_id TEXT NOT NULL UNIQUE,
        visitor_id TEXT NOT NULL,
        campaign_token TEXT NOT NULL,
        campaign_id TEXT NOT NULL,
        ip_address TEXT NOT NULL DEFAULT '',
        user_agent TEXT NOT NULL DEFAULT '',
        referrer TEXT NOT NULL DEFAULT '',
        created_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS visit (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        visitor_id TEXT NOT NULL UNIQUE,
        click_id TEXT UNIQUE,
        campaign_id TEXT NOT NULL REFERENCES campaign(campaign_id),
        ip_address TEXT NOT NULL DEFAULT '',
        user_agent TEXT NOT NULL DEFAULT '',
        browser TEXT NOT NULL DEFAULT '',
        browser_version TEXT NOT NULL DEFAULT '',
        os TEXT NOT NULL DEFAULT '',
        device_type TEXT NOT NULL DEFAULT '',
        screen_resolution TEXT NOT NULL DEFAULT '',
        viewport_size TEXT NOT NULL DEFAULT '',
        language TEXT NOT NULL DEFAULT '',
        timezone TEXT NOT NULL DEFAULT '',
        landing_page TEXT NOT NULL DEFAULT '',
        referrer TEXT NOT NULL DEFAULT '',
        utm_source TEXT NOT NULL DEFAULT '',
        utm_medium TEXT NOT NULL DEFAULT '',
        utm_campaign TEXT NOT NULL DEFAULT '',
        utm_content TEXT NOT NULL DEFAULT '',
        utm_term TEXT NOT NULL DEFAULT '',
        country TEXT NOT NULL DEFAULT '',
        region TEXT NOT NULL DEFAULT '',
        city TEXT NOT NULL DEFAULT '',
        created_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS conversion (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        visitor_id TEXT NOT NULL REFERENCES visit(visitor_id),
        click_id TEXT,
        campaign_id TEXT NOT NULL REFERENCES campaign(campaign_id),
        amount REAL NOT NULL CHECK (amount >= 0),
        status TEXT NOT NULL DEFAULT 'pending',
        created_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS offer (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        network TEXT NOT NULL,
        offer_url TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        UNIQUE(name, network)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS landing_page (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        url TEXT NOT NULL UNIQUE,
        created_at INTEGER NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_click_campaign ON click(campaign_id)",
    "CREATE INDEX IF NOT EXISTS idx_visit_campaign ON visit(campaign_id)",
    "CREATE INDEX IF NOT EXISTS idx_visit_created ON visit(created_at)",
    "CREATE INDEX IF NOT EXISTS idx_conversion_visitor ON conversion(visitor_id)",
];

const VISIT_COLUMNS: &str = "id, visitor_id, click_id, campaign_id, ip_address, user_agent, \
    browser, browser_version, os, device_type, screen_resolution, viewport_size, language, \
    timezone, landing_page, referrer, utm_source, utm_medium, utm_campaign, utm_content, \
    utm_term, country, region, city, created_at";

const CAMPAIGN_COLUMNS: &str = "id, campaign_id, campaign_token, name, offer_url, \
    landing_page, traffic_source, created_at";

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Storage {
    pool: SqlitePool,
}

impl Storage {
    /// Create a new storage instance and initialize the schema.
    ///
    /// # Arguments
    ///
    /// * `database_url` - SQLite connection string (e.g., "sqlite:clickpath.db" or "sqlite::memory:")
    ///
    /// In-memory databases get a single long-lived connection so every
    /// caller sees the same data.
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool_options = if database_url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };

        let pool = pool_options.connect_with(options).await?;

        let storage = Self { pool };
        storage.initialize_schema().await?;

        Ok(storage)
    }

    async fn initialize_schema(&self) -> anyhow::Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Campaigns
    // ------------------------------------------------------------------

    /// Insert a campaign and return its row ID.
    ///
    /// Fails with `Conflict` when the token or campaign ID is already taken.
    pub async fn insert_campaign(&self, campaign: &Campaign) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO campaign (
                campaign_id, campaign_token, name, offer_url,
                landing_page, traffic_source, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&campaign.campaign_id)
        .bind(&campaign.campaign_token)
        .bind(&campaign.name)
        .bind(&campaign.offer_url)
        .bind(&campaign.landing_page)
        .bind(&campaign.traffic_source)
        .bind(campaign.created_at.timestamp())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            unique_to_conflict(
                e,
                format!(
                    "campaign token {} is already issued",
                    campaign.campaign_token
                ),
            )
        })?;

        Ok(result.last_insert_rowid())
    }

    /// Look up a campaign by its public token.
    pub async fn find_campaign_by_token(&self, token: &str) -> Result<Option<Campaign>> {
        let sql = format!("SELECT {CAMPAIGN_COLUMNS} FROM campaign WHERE campaign_token = ?");
        let row = sqlx::query(&sql)
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(campaign_from_row))
    }

    /// Look up a campaign by its internal ID.
    pub async fn find_campaign(&self, campaign_id: &str) -> Result<Option<Campaign>> {
        let sql = format!("SELECT {CAMPAIGN_COLUMNS} FROM campaign WHERE campaign_id = ?");
        let row = sqlx::query(&sql)
            .bind(campaign_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(campaign_from_row))
    }

    /// Delete a campaign that no visit references.
    ///
    /// The visit count and the delete run in one transaction. The restrictive
    /// foreign key from `visit` backs the check if a visit lands in between.
    /// Click rows of the campaign are kept; a later beacon for one of them is
    /// rejected because its campaign no longer resolves.
    pub async fn delete_campaign(&self, campaign_id: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let visits: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM visit WHERE campaign_id = ?")
            .bind(campaign_id)
            .fetch_one(&mut *tx)
            .await?;

        if visits > 0 {
            return Err(TrackerError::Conflict(format!(
                "campaign {campaign_id} has {visits} visit(s) and cannot be deleted"
            )));
        }

        let result = sqlx::query("DELETE FROM campaign WHERE campaign_id = ?")
            .bind(campaign_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                let err = TrackerError::from(e);
                if err.is_foreign_key_violation() {
                    TrackerError::Conflict(format!("campaign {campaign_id} is still referenced"))
                } else {
                    err
                }
            })?;

        if result.rows_affected() == 0 {
            return Err(TrackerError::NotFound(format!("campaign {campaign_id}")));
        }

        tx.commit().await?;
        Ok(())
    }

    /// Every campaign with its visit, conversion and revenue totals.
    ///
    /// Left joins keep campaigns without visits; revenue of a campaign
    /// without conversions is `0.0`, never NULL.
    pub async fn campaign_stats(&self) -> Result<Vec<CampaignStats>> {
        let rows = sqlx::query(
            r#"
            SELECT
                c.id, c.campaign_id, c.campaign_token, c.name, c.offer_url,
                c.landing_page, c.traffic_source, c.created_at,
                COUNT(DISTINCT v.id) AS visits,
                COUNT(DISTINCT conv.id) AS conversions,
                COALESCE(SUM(conv.amount), 0.0) AS revenue
            FROM campaign c
            LEFT JOIN visit v ON v.campaign_id = c.campaign_id
            LEFT JOIN conversion conv ON conv.visitor_id = v.visitor_id
            GROUP BY c.id
            ORDER BY c.created_at DESC, c.id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| CampaignStats {
                campaign: campaign_from_row(row),
                stats: CampaignTotals {
                    visits: row.get("visits"),
                    conversions: row.get("conversions"),
                    revenue: row.get("revenue"),
                },
            })
            .collect())
    }

    // ------------------------------------------------------------------
    // Catalog
    // ------------------------------------------------------------------

    /// Insert an offer and return its row ID.
    ///
    /// Fails with `Conflict` when the network already lists an offer of
    /// that name.
    pub async fn insert_offer(&self, offer: &Offer) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO offer (name, network, offer_url, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&offer.name)
        .bind(&offer.network)
        .bind(&offer.offer_url)
        .bind(offer.created_at.timestamp())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            unique_to_conflict(
                e,
                format!(
                    "offer {} already exists for network {}",
                    offer.name, offer.network
                ),
            )
        })?;

        Ok(result.last_insert_rowid())
    }

    /// Every offer, newest first.
    pub async fn list_offers(&self) -> Result<Vec<Offer>> {
        let rows = sqlx::query(
            "SELECT id, name, network, offer_url, created_at FROM offer \
             ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| Offer {
                id: row.get("id"),
                name: row.get("name"),
                network: row.get("network"),
                offer_url: row.get("offer_url"),
                created_at: from_unix(row.get("created_at")),
            })
            .collect())
    }

    /// Insert a landing page and return its row ID.
    ///
    /// Fails with `Conflict` when the URL is already listed.
    pub async fn insert_landing_page(&self, page: &LandingPage) -> Result<i64> {
        let result =
            sqlx::query("INSERT INTO landing_page (name, url, created_at) VALUES (?, ?, ?)")
                .bind(&page.name)
                .bind(&page.url)
                .bind(page.created_at.timestamp())
                .execute(&self.pool)
                .await
                .map_err(|e| unique_to_conflict(e, format!("URL {} already exists", page.url)))?;

        Ok(result.last_insert_rowid())
    }

    pub async fn find_landing_page(&self, id: i64) -> Result<Option<LandingPage>> {
        let row = sqlx::query("SELECT id, name, url, created_at FROM landing_page WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(landing_page_from_row))
    }

    /// Every landing page, newest first.
    pub async fn list_landing_pages(&self) -> Result<Vec<LandingPage>> {
        let rows = sqlx::query(
            "SELECT id, name, url, created_at FROM landing_page ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(landing_page_from_row).collect())
    }

    /// Rename or re-point a landing page. The creation time is kept.
    pub async fn update_landing_page(&self, id: i64, name: &str, url: &str) -> Result<()> {
        let result = sqlx::query("UPDATE landing_page SET name = ?, url = ? WHERE id = ?")
            .bind(name)
            .bind(url)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| unique_to_conflict(e, format!("URL {url} already exists")))?;

        if result.rows_affected() == 0 {
            return Err(TrackerError::NotFound(format!("landing page {id}")));
        }
        Ok(())
    }

    pub async fn delete_landing_page(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM landing_page WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(TrackerError::NotFound(format!("landing page {id}")));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Clicks
    // ------------------------------------------------------------------

    pub async fn insert_click(&self, click: &Click) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO click (
                click_id, visitor_id, campaign_token, campaign_id,
                ip_address, user_agent, referrer, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&click.click_id)
        .bind(&click.visitor_id)
        .bind(&click.campaign_token)
        .bind(&click.campaign_id)
        .bind(&click.ip_address)
        .bind(&click.user_agent)
        .bind(&click.referrer)
        .bind(click.created_at.timestamp())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn find_click(&self, click_id: &str) -> Result<Option<Click>> {
        let row = sqlx::query(
            r#"
            SELECT click_id, visitor_id, campaign_token, campaign_id,
                   ip_address, user_agent, referrer, created_at
            FROM click
            WHERE click_id = ?
            "#,
        )
        .bind(click_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| Click {
            click_id: row.get("click_id"),
            visitor_id: row.get("visitor_id"),
            campaign_token: row.get("campaign_token"),
            campaign_id: row.get("campaign_id"),
            ip_address: row.get("ip_address"),
            user_agent: row.get("user_agent"),
            referrer: row.get("referrer"),
            created_at: from_unix(row.get("created_at")),
        }))
    }

    // ------------------------------------------------------------------
    // Visits
    // ------------------------------------------------------------------

    /// The latest visit recorded for a click ID.
    pub async fn find_visit_by_click_id(&self, click_id: &str) -> Result<Option<Visit>> {
        let sql = format!(
            "SELECT {VISIT_COLUMNS} FROM visit WHERE click_id = ? \
             ORDER BY created_at DESC, id DESC LIMIT 1"
        );
        let row = sqlx::query(&sql)
            .bind(click_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(visit_from_row))
    }

    pub async fn find_visit_by_visitor_id(&self, visitor_id: &str) -> Result<Option<Visit>> {
        let sql = format!("SELECT {VISIT_COLUMNS} FROM visit WHERE visitor_id = ?");
        let row = sqlx::query(&sql)
            .bind(visitor_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(visit_from_row))
    }

    /// Insert a visit unless one already exists for its click ID.
    ///
    /// Returns the visitor ID that owns the click and whether this call
    /// created it. A losing concurrent insert hits `UNIQUE(click_id)`, is
    /// ignored by the store, and resolves to the winning row.
    pub async fn insert_visit(&self, visit: &Visit) -> Result<(String, bool)> {
        let result = sqlx::query(
            r#"
            INSERT INTO visit (
                visitor_id, click_id, campaign_id, ip_address, user_agent,
                browser, browser_version, os, device_type, screen_resolution,
                viewport_size, language, timezone, landing_page, referrer,
                utm_source, utm_medium, utm_campaign, utm_content, utm_term,
                country, region, city, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(click_id) DO NOTHING
            "#,
        )
        .bind(&visit.visitor_id)
        .bind(&visit.click_id)
        .bind(&visit.campaign_id)
        .bind(&visit.ip_address)
        .bind(&visit.user_agent)
        .bind(&visit.browser)
        .bind(&visit.browser_version)
        .bind(&visit.os)
        .bind(&visit.device_type)
        .bind(&visit.screen_resolution)
        .bind(&visit.viewport_size)
        .bind(&visit.language)
        .bind(&visit.timezone)
        .bind(&visit.landing_page)
        .bind(&visit.referrer)
        .bind(&visit.utm_source)
        .bind(&visit.utm_medium)
        .bind(&visit.utm_campaign)
        .bind(&visit.utm_content)
        .bind(&visit.utm_term)
        .bind(&visit.country)
        .bind(&visit.region)
        .bind(&visit.city)
        .bind(visit.created_at.timestamp())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok((visit.visitor_id.clone(), true));
        }

        let click_id = visit.click_id.as_deref().ok_or_else(|| {
            TrackerError::Internal("visit insert ignored without a click ID".to_string())
        })?;

        match self.find_visit_by_click_id(click_id).await? {
            Some(existing) => Ok((existing.visitor_id, false)),
            None => Err(TrackerError::Internal(format!(
                "visit for click {click_id} conflicted but could not be read back"
            ))),
        }
    }

    /// Number of visits created at or after `since`.
    pub async fn count_visits_since(&self, since: DateTime<Utc>) -> Result<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM visit WHERE created_at >= ?")
            .bind(since.timestamp())
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// The most recent `limit` visits, newest first, each with its conversions.
    pub async fn recent_visits_with_conversions(
        &self,
        limit: u32,
    ) -> Result<Vec<(Visit, Vec<Conversion>)>> {
        let sql = format!(
            r#"
            SELECT v.*,
                   conv.id AS conversion_id,
                   conv.click_id AS conversion_click_id,
                   conv.campaign_id AS conversion_campaign_id,
                   conv.amount AS conversion_amount,
                   conv.status AS conversion_status,
                   conv.created_at AS conversion_created_at
            FROM (
                SELECT {VISIT_COLUMNS} FROM visit
                ORDER BY created_at DESC, id DESC
                LIMIT ?
            ) v
            LEFT JOIN conversion conv ON conv.visitor_id = v.visitor_id
            ORDER BY v.created_at DESC, v.id DESC, conv.id ASC
            "#
        );

        let rows = sqlx::query(&sql)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;

        let mut visits: Vec<(Visit, Vec<Conversion>)> = Vec::new();
        for row in &rows {
            let visit_id: i64 = row.get("id");
            if visits.last().is_none_or(|(last, _)| last.id != visit_id) {
                visits.push((visit_from_row(row), Vec::new()));
            }

            let conversion_id: Option<i64> = row.get("conversion_id");
            if let (Some(id), Some((visit, conversions))) = (conversion_id, visits.last_mut()) {
                conversions.push(Conversion {
                    id,
                    visitor_id: visit.visitor_id.clone(),
                    click_id: row.get("conversion_click_id"),
                    campaign_id: row.get("conversion_campaign_id"),
                    amount: row.get("conversion_amount"),
                    status: row.get("conversion_status"),
                    created_at: from_unix(row.get("conversion_created_at")),
                });
            }
        }

        Ok(visits)
    }

    // ------------------------------------------------------------------
    // Conversions
    // ------------------------------------------------------------------

    /// Insert a conversion and return its auto-incremented ID.
    pub async fn insert_conversion(&self, conversion: &Conversion) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO conversion (
                visitor_id, click_id, campaign_id, amount, status, created_at
            ) VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&conversion.visitor_id)
        .bind(&conversion.click_id)
        .bind(&conversion.campaign_id)
        .bind(conversion.amount)
        .bind(&conversion.status)
        .bind(conversion.created_at.timestamp())
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    pub async fn count_conversions(&self) -> Result<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM conversion")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// Every conversion, newest first, with campaign name and visitor device.
    pub async fn conversion_records(&self) -> Result<Vec<ConversionRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT
                conv.id, conv.visitor_id, conv.click_id, conv.campaign_id,
                conv.amount, conv.status, conv.created_at,
                COALESCE(camp.name, 'Unknown') AS campaign_name,
                COALESCE(v.browser, 'Unknown') AS browser,
                COALESCE(v.os, 'Unknown') AS os,
                COALESCE(v.device_type, 'Unknown') AS device_type,
                COALESCE(v.ip_address, 'Unknown') AS ip_address
            FROM conversion conv
            LEFT JOIN visit v ON v.visitor_id = conv.visitor_id
            LEFT JOIN campaign camp ON camp.campaign_id = conv.campaign_id
            ORDER BY conv.created_at DESC, conv.id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| ConversionRecord {
                conversion: conversion_from_row(row),
                campaign_name: row.get("campaign_name"),
                visitor_info: VisitorInfo {
                    browser: row.get("browser"),
                    os: row.get("os"),
                    device_type: row.get("device_type"),
                    ip_address: row.get("ip_address"),
                },
            })
            .collect())
    }
}

fn from_unix(ts: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(ts, 0).unwrap_or_default()
}

/// Map a UNIQUE violation to `Conflict` with `message`; pass anything else on.
fn unique_to_conflict(e: sqlx::Error, message: String) -> TrackerError {
    let err = TrackerError::from(e);
    if err.is_unique_violation() {
        TrackerError::Conflict(message)
    } else {
        err
    }
}

fn landing_page_from_row(row: &SqliteRow) -> LandingPage {
    LandingPage {
        id: row.get("id"),
        name: row.get("name"),
        url: row.get("url"),
        created_at: from_unix(row.get("created_at")),
    }
}

fn campaign_from_row(row: &SqliteRow) -> Campaign {
    Campaign {
        id: row.get("id"),
        campaign_id: row.get("campaign_id"),
        campaign_token: row.get("campaign_token"),
        name: row.get("name"),
        offer_url: row.get("offer_url"),
        landing_page: row.get("landing_page"),
        traffic_source: row.get("traffic_source"),
        created_at: from_unix(row.get("created_at")),
    }
}

fn visit_from_row(row: &SqliteRow) -> Visit {
    Visit {
        id: row.get("id"),
        visitor_id: row.get("visitor_id"),
        click_id: row.get("click_id"),
        campaign_id: row.get("campaign_id"),
        ip_address: row.get("ip_address"),
        user_agent: row.get("user_agent"),
        browser: row.get("browser"),
        browser_version: row.get("browser_version"),
        os: row.get("os"),
        device_type: row.get("device_type"),
        screen_resolution: row.get("screen_resolution"),
        viewport_size: row.get("viewport_size"),
        language: row.get("language"),
        timezone: row.get("timezone"),
        landing_page: row.get("landing_page"),
        referrer: row.get("referrer"),
        utm_source: row.get("utm_source"),
        utm_medium: row.get("utm_medium"),
        utm_campaign: row.get("utm_campaign"),
        utm_content: row.get("utm_content"),
        utm_term: row.get("utm_term"),
        country: row.get("country"),
        region: row.get("region"),
        city: row.get("city"),
        created_at: from_unix(row.get("created_at")),
    }
}

fn conversion_from_row(row: &SqliteRow) -> Conversion {
    Conversion {
        id: row.get("id"),
        visitor_id: row.get("visitor_id"),
        click_id: row.get("click_id"),
        campaign_id: row.get("campaign_id"),
        amount: row.get("amount"),
        status: row.get("status"),
        created_at: from_unix(row.get("created_at")),
    }
}

//! Identifier generation for clicks, visitors and campaigns.
//!
//! Generation is injected through [`IdGenerator`] so handlers never reach for a
//! global random source and tests can supply deterministic sequences.
//!
//! # Formats
//!
//! - Click ID: 8 hex digits of unix seconds followed by 16 hex digits of
//!   random bytes (24 characters, fixed width)
//! - Visitor ID: random (v4) UUID
//! - Campaign ID: random (v4) UUID
//! - Campaign token: 10 decimal digits, zero padded

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use rand::{Rng, RngCore};
use uuid::Uuid;

/// Length of a campaign token in digits.
pub const CAMPAIGN_TOKEN_LEN: usize = 10;

/// Exclusive upper bound for numeric campaign tokens.
const CAMPAIGN_TOKEN_SPACE: u64 = 10_000_000_000;

/// Number of random bytes in a click ID.
const CLICK_ID_RANDOM_BYTES: usize = 8;

/// Source of fresh identifiers.
///
/// Uniqueness of campaign tokens is enforced by the store, not the generator;
/// callers retry with a new token on collision.
pub trait IdGenerator: Send + Sync {
    /// A new click ID.
    fn click_id(&self) -> String;

    /// A new visitor identity.
    fn visitor_id(&self) -> String;

    /// A new internal campaign ID.
    fn campaign_id(&self) -> String;

    /// A new public campaign token.
    fn campaign_token(&self) -> String;
}

/// Production generator backed by the thread-local CSPRNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomIdGenerator;

impl IdGenerator for RandomIdGenerator {
    fn click_id(&self) -> String {
        let seconds = Utc::now().timestamp().max(0) as u64 & 0xffff_ffff;
        let mut random = [0u8; CLICK_ID_RANDOM_BYTES];
        rand::thread_rng().fill_bytes(&mut random);
        format!("{:08x}{}", seconds, hex::encode(random))
    }

    fn visitor_id(&self) -> String {
        Uuid::new_v4().to_string()
    }

    fn campaign_id(&self) -> String {
        Uuid::new_v4().to_string()
    }

    fn campaign_token(&self) -> String {
        let value = rand::thread_rng().gen_range(0..CAMPAIGN_TOKEN_SPACE);
        format!("{:0width$}", value, width = CAMPAIGN_TOKEN_LEN)
    }
}

/// Deterministic generator producing numbered identifiers.
///
/// Every call draws from one shared counter, so IDs never repeat across kinds.
/// A pinned token makes every `campaign_token()` call return the same value,
/// which forces token collisions.
#[derive(Debug, Default)]
pub struct SequentialIdGenerator {
    next: AtomicU64,
    pinned_token: Option<String>,
}

impl SequentialIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Always hand out `token` as the campaign token.
    pub fn with_pinned_token(token: &str) -> Self {
        Self {
            next: AtomicU64::new(0),
            pinned_token: Some(token.to_string()),
        }
    }

    fn bump(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed) + 1
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn click_id(&self) -> String {
        format!("{:024x}", self.bump())
    }

    fn visitor_id(&self) -> String {
        format!("visitor-{:06}", self.bump())
    }

    fn campaign_id(&self) -> String {
        format!("campaign-{:06}", self.bump())
    }

    fn campaign_token(&self) -> String {
        match &self.pinned_token {
            Some(token) => token.clone(),
            None => format!("{:0width$}", self.bump(), width = CAMPAIGN_TOKEN_LEN),
        }
    }
}

/// True when `token` has the shape of a campaign token.
pub fn is_campaign_token(token: &str) -> bool {
    token.len() == CAMPAIGN_TOKEN_LEN && token.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_click_id_is_fixed_width_hex() {
        let ids = RandomIdGenerator;
        for _ in 0..100 {
            let id = ids.click_id();
            assert_eq!(id.len(), 24);
            assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        }
    }

    #[test]
    fn test_click_ids_do_not_repeat() {
        let ids = RandomIdGenerator;
        let mut seen = std::collections::HashSet::new();
        for _ in 0..1000 {
            assert!(seen.insert(ids.click_id()));
        }
    }

    #[test]
    fn test_visitor_id_is_uuid() {
        let id = RandomIdGenerator.visitor_id();
        assert!(Uuid::parse_str(&id).is_ok());
    }

    #[test]
    fn test_campaign_token_shape() {
        let ids = RandomIdGenerator;
        for _ in 0..100 {
            assert!(is_campaign_token(&ids.campaign_token()));
        }
    }

    #[test]
    fn test_sequential_generator_is_deterministic() {
        let a = SequentialIdGenerator::new();
        let b = SequentialIdGenerator::new();
        assert_eq!(a.click_id(), b.click_id());
        assert_eq!(a.visitor_id(), b.visitor_id());
        assert_eq!(a.campaign_token(), "0000000003");
    }

    #[test]
    fn test_pinned_token_repeats() {
        let ids = SequentialIdGenerator::with_pinned_token("1234567890");
        assert_eq!(ids.campaign_token(), "1234567890");
        assert_eq!(ids.campaign_token(), "1234567890");
    }

    #[test]
    fn test_is_campaign_token() {
        assert!(is_campaign_token("0000000001"));
        assert!(!is_campaign_token("123"));
        assert!(!is_campaign_token("12345abcde"));
        assert!(!is_campaign_token(""));
    }
}

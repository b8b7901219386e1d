//! Postback normalization.
//!
//! Ad networks report conversions with their own parameter names. Parsing
//! maps any of them onto one [`PostbackIntent`] by a fixed priority order, so
//! the result only depends on which names are present, never on their order
//! in the request.

use std::collections::HashMap;

use crate::model::STATUS_COMPLETED;

/// Click identifier parameter names, highest priority first.
pub const CLICK_ID_PARAMS: &[&str] = &["click_id", "clickid", "click", "id"];

/// Payout parameter names, highest priority first.
pub const AMOUNT_PARAMS: &[&str] = &["amount", "payout", "revenue"];

/// Network label used when the postback does not name one.
pub const UNKNOWN_NETWORK: &str = "unknown";

/// What a network postback asks to record.
#[derive(Debug, Clone, PartialEq)]
pub struct PostbackIntent {
    pub click_id: Option<String>,
    pub amount: f64,
    pub status: String,
    pub network: String,
}

/// Normalize raw postback parameters.
///
/// Never fails: a missing click identifier is reported as `None` and left to
/// the attributor to reject.
pub fn parse(params: &HashMap<String, String>) -> PostbackIntent {
    let click_id = CLICK_ID_PARAMS
        .iter()
        .filter_map(|name| non_empty(params, name))
        .next()
        .map(str::to_string);

    let amount = AMOUNT_PARAMS
        .iter()
        .filter_map(|name| non_empty(params, name))
        .find_map(parse_amount)
        .unwrap_or(0.0);

    let status = non_empty(params, "status")
        .unwrap_or(STATUS_COMPLETED)
        .to_string();

    let network = non_empty(params, "network")
        .unwrap_or(UNKNOWN_NETWORK)
        .to_string();

    PostbackIntent {
        click_id,
        amount,
        status,
        network,
    }
}

/// Collect `key=value` pairs into a map, keeping the first value of a
/// repeated key.
pub fn collect_params<I, K, V>(pairs: I) -> HashMap<String, String>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    let mut params = HashMap::new();
    for (key, value) in pairs {
        params.entry(key.into()).or_insert_with(|| value.into());
    }
    params
}

/// Parse an `application/x-www-form-urlencoded` string, first value wins.
pub fn parse_query(raw: &str) -> HashMap<String, String> {
    collect_params(url::form_urlencoded::parse(raw.as_bytes()).into_owned())
}

fn non_empty<'a>(params: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    params
        .get(name)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
}

fn parse_amount(raw: &str) -> Option<f64> {
    raw.parse::<f64>()
        .ok()
        .filter(|amount| amount.is_finite() && *amount >= 0.0)
}

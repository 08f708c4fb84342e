//! Magnet URI normalization, tracker augmentation and construction.
//!
//! Every function here fails soft: malformed input yields an empty string
//! (or `None`), which callers treat as "cannot be represented as a stream".

use std::collections::HashSet;

use super::InfoHash;

const MAGNET_PREFIX: &str = "magnet:?";
const BTIH_PREFIX: &str = "urn:btih:";

/// Splits a magnet URI into raw `key=value` parameters.
///
/// HTML-escaped separators (`&amp;`) are treated as plain `&`.
fn raw_params(magnet: &str) -> Option<Vec<String>> {
    let query = magnet
        .trim()
        .strip_prefix(MAGNET_PREFIX)?
        .replace("&amp;", "&");
    Some(
        query
            .split('&')
            .filter(|part| !part.is_empty())
            .map(str::to_string)
            .collect(),
    )
}

fn param_key(param: &str) -> &str {
    param.split_once('=').map_or(param, |(key, _)| key)
}

fn param_value(param: &str) -> &str {
    param.split_once('=').map_or("", |(_, value)| value)
}

fn decode(value: &str) -> String {
    urlencoding::decode(value)
        .map(|v| v.into_owned())
        .unwrap_or_else(|_| value.to_string())
}

/// Canonical dedup key for a magnet URI.
///
/// Drops every `tr=` parameter so two magnets differing only in attached
/// trackers compare equal. Returns an empty string for non-magnet input or a
/// magnet with nothing left after stripping.
pub fn normalize(magnet: &str) -> String {
    let Some(params) = raw_params(magnet) else {
        return String::new();
    };

    let kept: Vec<String> = params
        .into_iter()
        .filter(|param| !param_key(param).eq_ignore_ascii_case("tr"))
        .collect();

    if kept.is_empty() {
        return String::new();
    }

    format!("{MAGNET_PREFIX}{}", kept.join("&"))
}

/// Appends `trackers` to `magnet` as `tr=` parameters.
///
/// Existing trackers are preserved; a tracker is skipped when the exact same
/// string is already attached (or appears earlier in `trackers`). Non-magnet
/// input is returned unchanged.
pub fn append_trackers<S: AsRef<str>>(magnet: &str, trackers: &[S]) -> String {
    let Some(params) = raw_params(magnet) else {
        return magnet.to_string();
    };

    let mut seen: HashSet<String> = params
        .iter()
        .filter(|param| param_key(param).eq_ignore_ascii_case("tr"))
        .map(|param| decode(param_value(param)))
        .collect();

    let mut out = format!("{MAGNET_PREFIX}{}", params.join("&"));
    for tracker in trackers {
        let tracker = tracker.as_ref().trim();
        if tracker.is_empty() || !seen.insert(tracker.to_string()) {
            continue;
        }
        if out.len() > MAGNET_PREFIX.len() {
            out.push('&');
        }
        out.push_str("tr=");
        out.push_str(&urlencoding::encode(tracker));
    }
    out
}

/// Builds `magnet:?xt=urn:btih:<hash>&dn=<name>&tr=...`.
///
/// Trackers are de-duplicated in append order. Returns an empty string when
/// `info_hash` is neither 40 hex nor 32 base32 characters.
pub fn build<S: AsRef<str>>(info_hash: &str, name: &str, trackers: &[S]) -> String {
    let hash = info_hash.trim();
    if InfoHash::parse(hash).is_err() {
        return String::new();
    }

    let mut magnet = format!("{MAGNET_PREFIX}xt={BTIH_PREFIX}{hash}");
    let name = name.trim();
    if !name.is_empty() {
        magnet.push_str("&dn=");
        magnet.push_str(&urlencoding::encode(name));
    }
    append_trackers(&magnet, trackers)
}

/// Extracts the info hash from the `xt=urn:btih:` parameter as lowercase hex.
pub fn info_hash_from_magnet(magnet: &str) -> Option<String> {
    raw_params(magnet)?
        .into_iter()
        .filter(|param| param_key(param).eq_ignore_ascii_case("xt"))
        .find_map(|param| {
            let value = decode(param_value(&param));
            let hash = value
                .get(..BTIH_PREFIX.len())
                .filter(|prefix| prefix.eq_ignore_ascii_case(BTIH_PREFIX))
                .map(|_| &value[BTIH_PREFIX.len()..])?;
            InfoHash::parse(hash).ok().map(|h| h.to_hex())
        })
}

/// Decoded `tr=` values in the order they appear.
pub fn trackers_from_magnet(magnet: &str) -> Vec<String> {
    raw_params(magnet)
        .unwrap_or_default()
        .into_iter()
        .filter(|param| param_key(param).eq_ignore_ascii_case("tr"))
        .map(|param| decode(param_value(&param)))
        .filter(|tracker| !tracker.is_empty())
        .collect()
}

/// Decoded `dn=` display name, if present.
pub fn display_name_from_magnet(magnet: &str) -> Option<String> {
    raw_params(magnet)?
        .into_iter()
        .find(|param| param_key(param).eq_ignore_ascii_case("dn"))
        .map(|param| decode(&param_value(&param).replace('+', " ")))
        .filter(|name| !name.is_empty())
}

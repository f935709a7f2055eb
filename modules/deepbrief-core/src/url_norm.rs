//! URL normalization for the dedup ledger.
//!
//! Two candidates pointing at the same document must normalize to the same
//! string, or the ledger leaks duplicates across loops. Normalization:
//! https/http collapse, lowercase host, fragment drop, tracking-parameter
//! strip, query-pair sort, trailing-slash strip.

/// Tracking parameters that vary per visitor and break dedup.
const TRACKING_PARAMS: &[&str] = &[
    "_dt", "fbclid", "gclid", "utm_source", "utm_medium", "utm_campaign",
    "utm_term", "utm_content", "modal", "ref", "mc_cid", "mc_eid",
];

/// Normalize a URL for dedup-ledger comparison.
///
/// Unparseable input falls back to trimmed, lowercased text so the ledger
/// still catches byte-identical repeats.
pub fn normalize_url(raw: &str) -> String {
    let Ok(mut parsed) = url::Url::parse(raw.trim()) else {
        return raw.trim().trim_end_matches('/').to_lowercase();
    };

    // http and https are the same document for dedup purposes
    if parsed.scheme() == "http" {
        let _ = parsed.set_scheme("https");
    }

    parsed.set_fragment(None);

    let mut pairs: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(key, _)| !TRACKING_PARAMS.contains(&key.as_ref()))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    pairs.sort();

    if pairs.is_empty() {
        parsed.set_query(None);
    } else {
        parsed.query_pairs_mut().clear().extend_pairs(pairs);
    }

    let mut out = parsed.to_string();
    while out.ends_with('/') {
        out.pop();
    }
    out
}

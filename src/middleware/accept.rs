//! Media type negotiation.
//!
//! Small, deliberately incomplete reading of RFC 9110 `Accept` handling:
//! quality-ordered matching against a caller-supplied offer list, plus the
//! content-type pattern test used by the request surface and the content
//! guard. A missing `Accept` header accepts everything, so the first offer
//! wins.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

struct AcceptEntry {
    kind: String,
    subtype: String,
    quality: f32,
    order: usize,
}

fn parse_accept(raw: &str) -> Vec<AcceptEntry> {
    let mut entries: Vec<AcceptEntry> = raw
        .split(',')
        .enumerate()
        .filter_map(|(order, part)| {
            let mut pieces = part.trim().split(';');
            let media = pieces.next()?.trim();
            let (kind, subtype) = media.split_once('/')?;
            let mut quality = 1.0f32;
            for param in pieces {
                if let Some((name, value)) = param.trim().split_once('=') {
                    if name.trim() == "q" {
                        quality = value.trim().parse().unwrap_or(0.0);
                    }
                }
            }
            Some(AcceptEntry {
                kind: kind.trim().to_ascii_lowercase(),
                subtype: subtype.trim().to_ascii_lowercase(),
                quality,
                order,
            })
        })
        .filter(|entry| entry.quality > 0.0)
        .collect();
    entries.sort_by(|a, b| {
        b.quality
            .partial_cmp(&a.quality)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.order.cmp(&b.order))
    });
    entries
}

fn entry_matches(entry: &AcceptEntry, offer: &str) -> bool {
    let Some((kind, subtype)) = offer.split_once('/') else {
        return false;
    };
    (entry.kind == "*" || entry.kind.eq_ignore_ascii_case(kind))
        && (entry.subtype == "*" || entry.subtype.eq_ignore_ascii_case(subtype))
}

/// The offer the client prefers, or `None` when nothing is acceptable.
/// Ties (including a bare `*/*`) resolve to the earliest offer.
pub fn preferred<'a>(accept: Option<&str>, offers: &[&'a str]) -> Option<&'a str> {
    let raw = accept.map(str::trim).filter(|raw| !raw.is_empty());
    let Some(raw) = raw else {
        return offers.first().copied();
    };
    for entry in parse_accept(raw) {
        if let Some(offer) = offers.iter().find(|offer| entry_matches(&entry, offer)) {
            return Some(offer);
        }
    }
    None
}

/// Whether a content type matches any of the given patterns. Patterns may be
/// full types (`application/json`), wildcards (`application/*`, `*/json`),
/// bare subtypes (`json`), or suffixes (`+json`).
pub fn type_is(content_type: Option<&str>, patterns: &[&str]) -> bool {
    let Some(raw) = content_type else {
        return false;
    };
    let media = raw.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
    let Some((kind, subtype)) = media.split_once('/') else {
        return false;
    };
    patterns.iter().any(|pattern| {
        let pattern = pattern.to_ascii_lowercase();
        if let Some(suffix) = pattern.strip_prefix('+') {
            return subtype.ends_with(&format!("+{suffix}"));
        }
        match pattern.split_once('/') {
            Some((pk, ps)) => {
                (pk == "*" || pk == kind) && (ps == "*" || ps == subtype)
            }
            None => subtype == pattern || subtype.ends_with(&format!("+{pattern}")),
        }
    })
}

/// Guard that rejects request bodies whose content type is not in the
/// accepted list with `415 Unsupported Media Type`. Requests without a body
/// pass through.
pub async fn acceptable_content(
    accepted: Vec<String>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let has_body = request
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .map(|len| len > 0)
        .unwrap_or_else(|| request.headers().contains_key(header::TRANSFER_ENCODING));
    if has_body {
        let content_type = request
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok());
        let patterns: Vec<&str> = accepted.iter().map(String::as_str).collect();
        if !type_is(content_type, &patterns) {
            return StatusCode::UNSUPPORTED_MEDIA_TYPE.into_response();
        }
    }
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    const OFFERS: &[&str] = &["text/html", "application/ld+json", "application/json"];

    #[test]
    fn missing_accept_takes_the_first_offer() {
        assert_eq!(preferred(None, OFFERS), Some("text/html"));
        assert_eq!(preferred(Some("*/*"), OFFERS), Some("text/html"));
    }

    #[test]
    fn quality_ordering_wins_over_header_order() {
        let accept = "text/html;q=0.2, application/json";
        assert_eq!(preferred(Some(accept), OFFERS), Some("application/json"));
    }

    #[test]
    fn unacceptable_returns_none() {
        assert_eq!(preferred(Some("image/png"), OFFERS), None);
        assert_eq!(preferred(Some("text/html;q=0"), &["text/html"]), None);
    }

    #[test]
    fn type_patterns() {
        let json = Some("application/json; charset=utf-8");
        assert!(type_is(json, &["json"]));
        assert!(type_is(json, &["application/*"]));
        assert!(type_is(json, &["application/json"]));
        assert!(!type_is(json, &["text/*"]));
        assert!(type_is(Some("application/ld+json"), &["+json"]));
        assert!(type_is(Some("application/ld+json"), &["json"]));
        assert!(!type_is(None, &["json"]));
    }
}

//! Header rewriting for proxied requests.

use axum::http::header::{HeaderMap, HeaderName, HeaderValue, CONNECTION};

/// Headers meaningful only for a single connection leg; stripped from both
/// inbound and outbound sides.
pub const HOP_BY_HOP_HEADERS: [&str; 9] = [
    "connection",
    "proxy-connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Remove hop-by-hop headers, including any header names listed inside a
/// `Connection` header value (those are per-hop too).
pub fn strip_hop_headers(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get(CONNECTION)
        .and_then(|value| value.to_str().ok())
        .map(|value| {
            value
                .split(',')
                .filter_map(|name| name.trim().parse::<HeaderName>().ok())
                .collect()
        })
        .unwrap_or_default();

    for name in HOP_BY_HOP_HEADERS {
        headers.remove(name);
    }
    for name in listed {
        headers.remove(&name);
    }
}

/// Join a backend base path and an inbound path with exactly one slash.
pub fn single_joining_slash(a: &str, b: &str) -> String {
    match (a.ends_with('/'), b.starts_with('/')) {
        (true, true) => format!("{}{}", a, &b[1..]),
        (false, false) => format!("{}/{}", a, b),
        _ => format!("{}{}", a, b),
    }
}

/// Append the client address to `X-Forwarded-For`, comma-joined when the
/// header already carries earlier hops.
pub fn append_forwarded_for(headers: &mut HeaderMap, client_ip: &str) {
    let value = match headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
    {
        Some(prior) if !prior.is_empty() => format!("{prior}, {client_ip}"),
        _ => client_ip.to_string(),
    };

    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert("x-forwarded-for", value);
    }
}

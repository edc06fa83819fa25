//! Request routing and header extraction.
//!
//! The surface is fixed:
//!
//! | Method | Path | |
//! |---|---|---|
//! | `POST` | `/v1/tenant/{tenant}/stream/{stream}/message` | ingest one message |
//! | `GET` | `/health` | liveness |
//! | `GET` | `/ready` | readiness |

use conduit_core::Credential;
use http::header::{AUTHORIZATION, CONTENT_TYPE};
use http::{HeaderMap, Method};

/// Header carrying the tenant API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Header echoing the request id on every response.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// What a request resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route<'a> {
    /// Message ingestion. Segments are not yet validated.
    Ingest {
        /// Raw tenant segment.
        tenant: &'a str,
        /// Raw stream segment.
        stream: &'a str,
    },
    /// Liveness probe.
    Health,
    /// Readiness probe.
    Ready,
    /// Known path, wrong method.
    MethodNotAllowed {
        /// Value for the `Allow` header.
        allow: &'static str,
    },
    /// Unknown path.
    NotFound,
}

/// Resolves `method` and `path` to a [`Route`].
pub fn match_route<'a>(method: &Method, path: &'a str) -> Route<'a> {
    let (route, allow) = match path {
        "/health" => (Route::Health, "GET"),
        "/ready" => (Route::Ready, "GET"),
        _ => match ingest_segments(path) {
            Some((tenant, stream)) => (Route::Ingest { tenant, stream }, "POST"),
            None => return Route::NotFound,
        },
    };

    let expected = if matches!(route, Route::Ingest { .. }) {
        Method::POST
    } else {
        Method::GET
    };
    if *method == expected || (*method == Method::HEAD && expected == Method::GET) {
        route
    } else {
        Route::MethodNotAllowed { allow }
    }
}

fn ingest_segments(path: &str) -> Option<(&str, &str)> {
    let rest = path.strip_prefix("/v1/tenant/")?;
    let mut parts = rest.split('/');
    let tenant = parts.next()?;
    if parts.next()? != "stream" {
        return None;
    }
    let stream = parts.next()?;
    if parts.next()? != "message" || parts.next().is_some() {
        return None;
    }
    Some((tenant, stream))
}

/// Extracts the caller credential: `x-api-key` first, then a bearer token.
pub fn credential(headers: &HeaderMap) -> Option<Credential> {
    if let Some(key) = headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return Some(Credential::new(key));
    }

    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| {
            let (scheme, token) = v.trim().split_once(' ')?;
            scheme.eq_ignore_ascii_case("bearer").then(|| token.trim())
        })
        .filter(|token| !token.is_empty())
        .map(Credential::new)
}

/// Returns the declared content type, if any.
pub fn content_type(headers: &HeaderMap) -> Option<String> {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    #[test]
    fn test_ingest_route() {
        assert_eq!(
            match_route(&Method::POST, "/v1/tenant/acme/stream/clicks/message"),
            Route::Ingest {
                tenant: "acme",
                stream: "clicks"
            }
        );
    }

    #[test]
    fn test_ingest_wrong_method() {
        assert_eq!(
            match_route(&Method::GET, "/v1/tenant/acme/stream/clicks/message"),
            Route::MethodNotAllowed { allow: "POST" }
        );
        assert_eq!(
            match_route(&Method::POST, "/health"),
            Route::MethodNotAllowed { allow: "GET" }
        );
    }

    #[test]
    fn test_probes() {
        assert_eq!(match_route(&Method::GET, "/health"), Route::Health);
        assert_eq!(match_route(&Method::HEAD, "/ready"), Route::Ready);
    }

    #[test]
    fn test_unknown_paths() {
        for path in [
            "/",
            "/v1/tenant/acme",
            "/v1/tenant/acme/stream/clicks",
            "/v1/tenant/acme/streams/clicks/message",
            "/v1/tenant/acme/stream/clicks/message/extra",
            "/v2/tenant/acme/stream/clicks/message",
        ] {
            assert_eq!(match_route(&Method::POST, path), Route::NotFound, "{path}");
        }
    }

    #[test]
    fn test_empty_segments_still_route() {
        // Identifier validation happens in the handler and yields 400.
        assert_eq!(
            match_route(&Method::POST, "/v1/tenant//stream/clicks/message"),
            Route::Ingest {
                tenant: "",
                stream: "clicks"
            }
        );
    }

    #[test]
    fn test_api_key_preferred_over_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer from-bearer"));
        assert_eq!(credential(&headers).unwrap().expose(), "from-bearer");

        headers.insert(API_KEY_HEADER, HeaderValue::from_static("from-header"));
        assert_eq!(credential(&headers).unwrap().expose(), "from-header");
    }

    #[test]
    fn test_non_bearer_authorization_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwYXNz"));
        assert!(credential(&headers).is_none());

        headers.insert(AUTHORIZATION, HeaderValue::from_static("bearer   "));
        assert!(credential(&headers).is_none());
    }

    #[test]
    fn test_content_type() {
        let mut headers = HeaderMap::new();
        assert_eq!(content_type(&headers), None);

        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json; charset=utf-8"));
        assert_eq!(
            content_type(&headers).as_deref(),
            Some("application/json; charset=utf-8")
        );
    }
}

//! Hardening headers added to every API response.

use axum::http::header::{
    CONTENT_SECURITY_POLICY, REFERRER_POLICY, STRICT_TRANSPORT_SECURITY, X_CONTENT_TYPE_OPTIONS,
    X_FRAME_OPTIONS, X_XSS_PROTECTION,
};
use axum::http::{HeaderName, HeaderValue};
use tower_http::set_header::SetResponseHeaderLayer;

const PERMISSIONS_POLICY: HeaderName = HeaderName::from_static("permissions-policy");

const NOSNIFF: &str = "nosniff";
const DENY: &str = "DENY";
const XSS_BLOCK: &str = "1; mode=block";
const HSTS_VALUE: &str = "max-age=31536000; includeSubDomains";
const CSP_API_VALUE: &str = "default-src 'none'; frame-ancestors 'none'";
const REFERRER_POLICY_VALUE: &str = "strict-origin-when-cross-origin";
const PERMISSIONS_POLICY_VALUE: &str = "geolocation=(), microphone=(), camera=()";

/// One layer per header. HSTS is only sent when the service sits behind
/// HTTPS, i.e. in production.
pub fn security_header_layers(include_hsts: bool) -> Vec<SetResponseHeaderLayer<HeaderValue>> {
    let mut headers = vec![
        (X_CONTENT_TYPE_OPTIONS, NOSNIFF),
        (X_FRAME_OPTIONS, DENY),
        (X_XSS_PROTECTION, XSS_BLOCK),
        (CONTENT_SECURITY_POLICY, CSP_API_VALUE),
        (REFERRER_POLICY, REFERRER_POLICY_VALUE),
        (PERMISSIONS_POLICY, PERMISSIONS_POLICY_VALUE),
    ];
    if include_hsts {
        headers.push((STRICT_TRANSPORT_SECURITY, HSTS_VALUE));
    }

    headers
        .into_iter()
        .map(|(name, value)| {
            SetResponseHeaderLayer::overriding(name, HeaderValue::from_static(value))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt;

    fn app(include_hsts: bool) -> Router {
        security_header_layers(include_hsts)
            .into_iter()
            .fold(Router::new().route("/", get(|| async { "ok" })), |router, layer| {
                router.layer(layer)
            })
    }

    #[tokio::test]
    async fn test_headers_are_set() {
        let response = app(false)
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let headers = response.headers();

        assert_eq!(headers[X_CONTENT_TYPE_OPTIONS], NOSNIFF);
        assert_eq!(headers[X_FRAME_OPTIONS], DENY);
        assert_eq!(headers["permissions-policy"], PERMISSIONS_POLICY_VALUE);
        assert!(headers.get(STRICT_TRANSPORT_SECURITY).is_none());
    }

    #[tokio::test]
    async fn test_hsts_only_when_requested() {
        assert_eq!(security_header_layers(false).len(), 6);
        assert_eq!(security_header_layers(true).len(), 7);

        let response = app(true)
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.headers()[STRICT_TRANSPORT_SECURITY], HSTS_VALUE);
    }
}

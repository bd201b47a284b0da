//! Security headers middleware.
//!
//! JSON API responses get the tightest policy: nothing may load, nothing may
//! frame them and nothing is cached. The single-page app needs its own
//! scripts and styles plus Stripe's payment element, so it gets a policy
//! that allows exactly those.

use axum::{
    extract::Request,
    http::{
        HeaderName, HeaderValue,
        header::{
            CACHE_CONTROL, CONTENT_SECURITY_POLICY, REFERRER_POLICY, X_CONTENT_TYPE_OPTIONS,
            X_FRAME_OPTIONS,
        },
    },
    middleware::Next,
    response::Response,
};

const API_CSP: &str = "default-src 'none'; frame-ancestors 'none'; base-uri 'none'";

const APP_CSP: &str = "default-src 'self'; \
     script-src 'self' https://js.stripe.com; \
     style-src 'self'; \
     img-src 'self' data: https:; \
     connect-src 'self' https://api.stripe.com; \
     frame-src https://js.stripe.com https://hooks.stripe.com; \
     object-src 'none'; \
     base-uri 'self'; \
     form-action 'self'; \
     frame-ancestors 'none'";

const PERMISSIONS_POLICY: &str = "camera=(), geolocation=(), microphone=(), usb=(), \
     payment=(self \"https://js.stripe.com\")";

/// Add security headers to all responses.
///
/// Headers applied everywhere:
/// - `X-Frame-Options: DENY`
/// - `X-Content-Type-Options: nosniff`
/// - `Referrer-Policy: strict-origin-when-cross-origin`
/// - `Permissions-Policy` (only Stripe may request payment)
/// - `Content-Security-Policy` (API or app variant)
///
/// API responses also get `Cache-Control: no-store`.
pub async fn security_headers_middleware(request: Request, next: Next) -> Response {
    let is_api = is_api_path(request.uri().path());
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert(X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    headers.insert(
        REFERRER_POLICY,
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    headers.insert(
        HeaderName::from_static("permissions-policy"),
        HeaderValue::from_static(PERMISSIONS_POLICY),
    );
    headers.insert(
        CONTENT_SECURITY_POLICY,
        HeaderValue::from_static(content_security_policy(is_api)),
    );

    if is_api {
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store, max-age=0"));
    }

    response
}

fn is_api_path(path: &str) -> bool {
    path == "/api" || path.starts_with("/api/") || path.starts_with("/health")
}

const fn content_security_policy(is_api: bool) -> &'static str {
    if is_api { API_CSP } else { APP_CSP }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_paths() {
        assert!(is_api_path("/api/products"));
        assert!(is_api_path("/health/ready"));
        assert!(!is_api_path("/products/blue-mug"));
        assert!(!is_api_path("/apiary"));
    }

    #[test]
    fn test_api_policy_blocks_everything() {
        let csp = content_security_policy(true);
        assert!(csp.starts_with("default-src 'none'"));
    }

    #[test]
    fn test_app_policy_allows_stripe() {
        let csp = content_security_policy(false);
        assert!(csp.contains("script-src 'self' https://js.stripe.com"));
        assert!(csp.contains("frame-ancestors 'none'"));
    }
}

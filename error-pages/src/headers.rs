//! HTTP header values used by the error responses.

/// Content type of the custom error pages.
pub const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";
/// Content type of the fallback and diagnostic bodies.
pub const PLAIN_TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";
/// Value of the `X-Content-Type-Options` header sent with plain text bodies.
pub const NOSNIFF: &str = "nosniff";

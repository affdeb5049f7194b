//! The response sink handlers write into.
//!
//! A [`ResponseWriter`] buffers the status, headers and body produced while a
//! request travels down the handler chain. The status is fixed by the first
//! call to [`ResponseWriter::write_status`] or [`ResponseWriter::write`];
//! later attempts to change it are ignored, like on a real connection where
//! the status line has already been sent.

use bytes::{Bytes, BytesMut};
use http::header::{CONTENT_TYPE, HeaderMap, HeaderValue, X_CONTENT_TYPE_OPTIONS};
use tracing::warn;

use crate::StatusCode;
use crate::headers::{NOSNIFF, PLAIN_TEXT_CONTENT_TYPE};

/// A buffered HTTP response sink.
///
/// # Examples
///
/// ```
/// use error_pages::{ResponseWriter, StatusCode};
///
/// let mut response = ResponseWriter::new();
/// response.write(b"hello");
///
/// assert_eq!(response.status(), StatusCode::OK);
/// assert_eq!(response.body(), b"hello");
/// ```
#[derive(Debug, Default)]
pub struct ResponseWriter {
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: BytesMut,
}

impl ResponseWriter {
    /// Creates an empty response sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the response headers for modification.
    ///
    /// Headers should be set before the status is written.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Returns the response headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Sets the response status.
    ///
    /// Only the first status written sticks; a superfluous write is logged and
    /// ignored.
    ///
    /// # Examples
    ///
    /// ```
    /// use error_pages::{ResponseWriter, StatusCode};
    ///
    /// let mut response = ResponseWriter::new();
    /// response.write_status(StatusCode::NOT_FOUND);
    /// response.write_status(StatusCode::OK);
    ///
    /// assert_eq!(response.status(), StatusCode::NOT_FOUND);
    /// ```
    pub fn write_status(&mut self, status: StatusCode) {
        match self.status {
            Some(current) => {
                warn!(
                    current = current.as_u16(),
                    ignored = status.as_u16(),
                    "Superfluous response status write"
                );
            }
            None => self.status = Some(status),
        }
    }

    /// Appends `data` to the response body.
    ///
    /// Writing the body commits the response with a `200 OK` status if no
    /// status has been written yet.
    pub fn write(&mut self, data: &[u8]) {
        if self.status.is_none() {
            self.status = Some(StatusCode::OK);
        }
        self.body.extend_from_slice(data);
    }

    /// Writes a complete plain text response.
    ///
    /// If `status` is `None`, the status already written (or the default
    /// `200 OK`) applies.
    pub fn write_text(&mut self, status: Option<StatusCode>, text: &str) {
        self.headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static(PLAIN_TEXT_CONTENT_TYPE),
        );
        self.headers
            .insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static(NOSNIFF));
        if let Some(status) = status {
            self.write_status(status);
        }
        self.write(text.as_bytes());
    }

    /// Returns `true` if the status has been written.
    #[must_use]
    pub fn is_committed(&self) -> bool {
        self.status.is_some()
    }

    /// Returns the response status, `200 OK` if none has been written.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::OK)
    }

    /// Returns the body written so far.
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Discards everything written so far.
    pub fn reset(&mut self) {
        self.status = None;
        self.headers.clear();
        self.body.clear();
    }

    /// Converts the buffered data into an [`http::Response`].
    #[must_use]
    pub fn into_response(self) -> http::Response<Bytes> {
        let mut response = http::Response::new(self.body.freeze());
        *response.status_mut() = self.status.unwrap_or(StatusCode::OK);
        *response.headers_mut() = self.headers;
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_status_is_ok() {
        let response = ResponseWriter::new();

        assert!(!response.is_committed());
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.body().is_empty());
    }

    #[test]
    fn write_commits_status() {
        let mut response = ResponseWriter::new();
        response.write(b"normal");
        response.write_status(StatusCode::BAD_REQUEST);

        assert!(response.is_committed());
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.body(), b"normal");
    }

    #[test]
    fn write_text_sets_headers() {
        let mut response = ResponseWriter::new();
        response.write_text(Some(StatusCode::FORBIDDEN), "403 Forbidden\n");

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            PLAIN_TEXT_CONTENT_TYPE
        );
        assert_eq!(
            response.headers().get(X_CONTENT_TYPE_OPTIONS).unwrap(),
            NOSNIFF
        );
        assert_eq!(response.body(), b"403 Forbidden\n");
    }

    #[test]
    fn reset_discards_everything() {
        let mut response = ResponseWriter::new();
        response.write_text(Some(StatusCode::NOT_FOUND), "partial");
        response.reset();

        assert!(!response.is_committed());
        assert!(response.headers().is_empty());
        assert!(response.body().is_empty());
    }

    #[test]
    fn into_response() {
        let mut response = ResponseWriter::new();
        response.write_text(Some(StatusCode::NOT_FOUND), "404 Not Found\n");

        let response = response.into_response();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers().get(CONTENT_TYPE).unwrap(), PLAIN_TEXT_CONTENT_TYPE);
        assert_eq!(response.body(), &Bytes::from_static(b"404 Not Found\n"));
    }
}

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use derive_more::with_trait::Debug;
use futures_util::FutureExt;
use http::header::{CONTENT_TYPE, HeaderValue};
use percent_encoding::percent_decode_str;
use tracing::debug;

use crate::config::ErrorHandlerConfig;
use crate::error::ConfigError;
use crate::handler::{Handler, Outcome};
use crate::headers::HTML_CONTENT_TYPE;
use crate::log::{LogRecord, LogSink};
use crate::page::{FsPageSource, PageSource};
use crate::panic::{PanicReport, register_panic_hook};
use crate::response::ResponseWriter;
use crate::{Request, StatusCode};

/// A [`tower::Layer`] wrapping handlers in an [`ErrorHandler`].
///
/// The layer owns the configuration and the opened log sink; every handler it
/// wraps shares them.
///
/// # Examples
///
/// ```
/// use error_pages::config::ErrorHandlerConfig;
/// use error_pages::handler::handler_fn;
/// use error_pages::{ErrorHandlerLayer, Outcome, StatusCode};
/// use tower::Layer;
///
/// let layer = ErrorHandlerLayer::new(ErrorHandlerConfig::default())?;
/// let api = layer.layer(handler_fn(|_, _| Outcome::forward(StatusCode::NOT_FOUND)));
/// let admin = layer.layer(handler_fn(|_, _| Outcome::forward(StatusCode::FORBIDDEN)));
/// # Ok::<(), error_pages::error::ConfigError>(())
/// ```
#[derive(Debug, Clone)]
pub struct ErrorHandlerLayer {
    config: Arc<ErrorHandlerConfig>,
    #[debug("..")]
    log: Arc<dyn LogSink>,
}

impl ErrorHandlerLayer {
    /// Creates a new layer from a configuration.
    ///
    /// This opens the configured log destination and, unless disabled in the
    /// configuration, registers the panic hook.
    ///
    /// # Errors
    ///
    /// Returns an error if the log destination cannot be opened.
    pub fn new(config: ErrorHandlerConfig) -> Result<Self, ConfigError> {
        let log = config.log.open()?;
        if config.register_panic_hook {
            register_panic_hook();
        }

        Ok(Self {
            config: Arc::new(config),
            log,
        })
    }

    /// Replaces the log sink opened from the configuration.
    #[must_use]
    pub fn with_log(mut self, log: Arc<dyn LogSink>) -> Self {
        self.log = log;
        self
    }
}

impl<N> tower::Layer<N> for ErrorHandlerLayer {
    type Service = ErrorHandler<N>;

    fn layer(&self, next: N) -> Self::Service {
        ErrorHandler {
            next,
            config: Arc::clone(&self.config),
            log: Arc::clone(&self.log),
            pages: FsPageSource,
        }
    }
}

/// Middleware replacing error responses with custom error pages.
///
/// See the [crate documentation](crate) for an overview of what it does with
/// each outcome of the next handler.
///
/// # Examples
///
/// ```
/// use error_pages::config::ErrorHandlerConfig;
/// use error_pages::handler::handler_fn;
/// use error_pages::{ErrorHandler, Outcome, Request, ResponseWriter, StatusCode};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), error_pages::error::ConfigError> {
/// let handler = ErrorHandler::new(
///     handler_fn(|_, _| Outcome::forward(StatusCode::BAD_REQUEST)),
///     ErrorHandlerConfig::default(),
/// )?;
///
/// let mut response = ResponseWriter::new();
/// let outcome = handler.serve(&mut response, &Request::default()).await;
///
/// assert!(outcome.is_finalized());
/// assert_eq!(response.status(), StatusCode::BAD_REQUEST);
/// assert_eq!(response.body(), b"400 Bad Request\n");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ErrorHandler<N, S = FsPageSource> {
    next: N,
    config: Arc<ErrorHandlerConfig>,
    #[debug("..")]
    log: Arc<dyn LogSink>,
    pages: S,
}

impl<N: Handler> ErrorHandler<N> {
    /// Wraps `next` in a new error handler.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured log destination cannot be opened.
    pub fn new(next: N, config: ErrorHandlerConfig) -> Result<Self, ConfigError> {
        Ok(tower::Layer::layer(&ErrorHandlerLayer::new(config)?, next))
    }
}

impl<N: Handler, S: PageSource> ErrorHandler<N, S> {
    /// Replaces the log sink opened from the configuration.
    #[must_use]
    pub fn with_log(mut self, log: Arc<dyn LogSink>) -> Self {
        self.log = log;
        self
    }

    /// Replaces the source error pages are read from.
    #[must_use]
    pub fn with_page_source<P: PageSource>(self, pages: P) -> ErrorHandler<N, P> {
        ErrorHandler {
            next: self.next,
            config: self.config,
            log: self.log,
            pages,
        }
    }

    /// Returns the configuration of this handler.
    #[must_use]
    pub fn config(&self) -> &ErrorHandlerConfig {
        &self.config
    }

    /// Serves the request through the next handler.
    ///
    /// Returns the next handler's outcome unchanged when it passes through or
    /// carries an error, and [`Outcome::Finalized`] once an error page, a
    /// fallback body or a panic report has been written.
    ///
    /// Log records name the percent-decoded request path.
    pub async fn serve(&self, response: &mut ResponseWriter, request: &Request) -> Outcome {
        let decoded_path = percent_decode_str(request.uri().path()).decode_utf8_lossy();
        let path: &str = &decoded_path;
        let result = AssertUnwindSafe(self.next.serve(response, request))
            .catch_unwind()
            .await;

        match result {
            Ok(Outcome::Forward {
                status,
                error: Some(error),
            }) => {
                self.log.log(&LogRecord::Error {
                    status,
                    path,
                    error: &error,
                });
                debug!(status = status.as_u16(), path, "Propagating handler error");
                Outcome::with_error(status, error)
            }
            Ok(Outcome::Forward {
                status,
                error: None,
            }) if is_visible_error(status) => {
                response.reset();
                self.write_error_page(response, path, status).await;
                Outcome::Finalized
            }
            Ok(outcome) => outcome,
            Err(payload) => {
                let report = PanicReport::capture(&*payload);
                drop(payload);
                response.reset();
                self.recover(response, path, &report).await;
                Outcome::Finalized
            }
        }
    }

    async fn write_error_page(&self, response: &mut ResponseWriter, path: &str, status: StatusCode) {
        if let Some(page) = self.config.error_page(status) {
            match self.pages.read(&page).await {
                Ok(content) => {
                    debug!(status = status.as_u16(), path, page = %page.display(), "Serving error page");
                    response
                        .headers_mut()
                        .insert(CONTENT_TYPE, HeaderValue::from_static(HTML_CONTENT_TYPE));
                    response.write_status(status);
                    response.write(&content);
                    return;
                }
                Err(load_error) => {
                    self.log.log(&LogRecord::Notice {
                        status,
                        path,
                        load_error: &load_error,
                    });
                }
            }
        }

        write_fallback(response, status);
    }

    async fn recover(&self, response: &mut ResponseWriter, path: &str, report: &PanicReport) {
        let record = LogRecord::Panic {
            path,
            location: report.location(),
            message: report.message(),
        };
        self.log.log(&record);

        if self.config.debug {
            let body = report.render(&record.to_string());
            response.write_text(None, &body);
        } else if let Some(message) = &self.config.panic_message {
            response.write_text(Some(self.config.panic_status), message);
        } else {
            self.write_error_page(response, path, self.config.panic_status)
                .await;
        }
    }
}

impl<N: Handler, S: PageSource> Handler for ErrorHandler<N, S> {
    async fn serve(&self, response: &mut ResponseWriter, request: &Request) -> Outcome {
        Self::serve(self, response, request).await
    }
}

/// Returns `true` for the statuses replaced by an error page: 400 and above.
fn is_visible_error(status: StatusCode) -> bool {
    status.as_u16() >= 400
}

/// Writes the `"<code> <reason>"` body used when there is no error page.
fn write_fallback(response: &mut ResponseWriter, status: StatusCode) {
    let reason = status.canonical_reason().unwrap_or_default();
    response.write_text(Some(status), &format!("{} {reason}\n", status.as_u16()));
}

//! Middleware that turns error responses into custom error pages.
//!
//! [`ErrorHandler`] sits in a chain of request handlers. It forwards every
//! request to the next [`Handler`], then looks at what came back:
//!
//! * an error returned by the next handler is logged and handed back
//!   unchanged, so the outer chain decides what to do with it,
//! * a client or server error status (400 and above) is replaced by the
//!   error page configured for that status, or by a short `"<code> <reason>"`
//!   line when there is no page or it cannot be read,
//! * a panic in the next handler is caught and turned into a diagnostic
//!   response (in debug mode) or a generic failure page,
//! * anything else passes through untouched.
//!
//! Every noteworthy event is written to a [`LogSink`](log::LogSink) as a
//! single line tagged `ERROR`, `NOTICE` or `PANIC`.
//!
//! # Examples
//!
//! ```
//! use error_pages::config::ErrorHandlerConfig;
//! use error_pages::handler::{Outcome, handler_fn};
//! use error_pages::page::ErrorPages;
//! use error_pages::{ErrorHandler, StatusCode};
//!
//! let config = ErrorHandlerConfig::builder()
//!     .pages(ErrorPages::new().with_page(StatusCode::NOT_FOUND, "404.html"))
//!     .build();
//! let _handler = ErrorHandler::new(
//!     handler_fn(|_response, _request| Outcome::forward(StatusCode::NOT_FOUND)),
//!     config,
//! )?;
//! # Ok::<(), error_pages::error::ConfigError>(())
//! ```

#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

pub mod config;
pub mod error;
mod error_handler;
pub mod handler;
pub mod headers;
pub mod log;
pub mod page;
mod panic;
pub mod response;

pub use error::Error;
pub use error_handler::{ErrorHandler, ErrorHandlerLayer};
pub use handler::{Handler, Outcome};
pub use panic::register_panic_hook;
pub use response::ResponseWriter;
pub use {bytes, http};

/// A type alias for the requests passed down the handler chain.
pub type Request = http::Request<bytes::Bytes>;

/// A type alias for an HTTP status code.
pub type StatusCode = http::StatusCode;

/// A type alias for a result that can return an [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

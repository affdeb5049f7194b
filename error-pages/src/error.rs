//! Error types.
//!
//! [`Error`] is what the next handler in the chain hands back when it fails
//! to serve a request. [`ConfigError`] is returned when an
//! [`ErrorHandlerConfig`](crate::config::ErrorHandlerConfig) cannot be loaded
//! or applied.

pub(crate) mod backtrace;

use std::error::Error as StdError;
use std::fmt::Display;
use std::path::PathBuf;
use std::sync::Arc;

use derive_more::with_trait::Debug;
use thiserror::Error;

/// An error returned by a request handler.
///
/// This is a cheap, cloneable handle to the underlying error. The
/// [`ErrorHandler`](crate::ErrorHandler) logs it and passes it back to its
/// caller as-is, which can be verified with [`Error::ptr_eq`].
#[derive(Debug, Clone)]
#[debug("{inner:?}")]
pub struct Error {
    inner: Arc<dyn StdError + Send + Sync + 'static>,
}

impl Error {
    /// Wraps an error message or an error type.
    ///
    /// # Examples
    ///
    /// ```
    /// use error_pages::Error;
    ///
    /// let error = Error::wrap("test error");
    /// assert_eq!(error.to_string(), "test error");
    ///
    /// let error = Error::wrap(std::io::Error::other("disk on fire"));
    /// assert!(error.downcast_ref::<std::io::Error>().is_some());
    /// ```
    #[must_use]
    pub fn wrap<E>(error: E) -> Self
    where
        E: Into<Box<dyn StdError + Send + Sync + 'static>>,
    {
        Self {
            inner: Arc::from(error.into()),
        }
    }

    /// Returns a reference to the wrapped error if it is of type `E`.
    #[must_use]
    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        self.inner.downcast_ref::<E>()
    }

    /// Returns `true` if both handles point to the same underlying error.
    ///
    /// # Examples
    ///
    /// ```
    /// use error_pages::Error;
    ///
    /// let error = Error::wrap("test error");
    /// assert!(Error::ptr_eq(&error, &error.clone()));
    /// assert!(!Error::ptr_eq(&error, &Error::wrap("test error")));
    /// ```
    #[must_use]
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        Arc::ptr_eq(&this.inner, &other.inner)
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.inner, f)
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.inner.source()
    }
}

/// An error that can occur while loading or applying the error handler
/// configuration.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// The configuration is not valid TOML or does not match the expected
    /// structure.
    #[error("could not parse the error handler configuration: {0}")]
    Toml(#[from] toml::de::Error),
    /// A key of the error pages table is not a valid HTTP status code.
    #[error("invalid status code `{0}` in the error pages table")]
    InvalidStatusCode(String),
    /// The log file could not be opened for appending.
    #[error("could not open log file `{}`: {source}", path.display())]
    LogFile {
        /// The path of the log file.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },
}

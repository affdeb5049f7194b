//! Error log records and the sinks they are written to.
//!
//! Every event the [`ErrorHandler`](crate::ErrorHandler) reports is a
//! [`LogRecord`], rendered as a single line:
//!
//! ```text
//! [ERROR 502 /api] upstream is down
//! [NOTICE 404 /missing] could not load error page: No such file or directory (os error 2)
//! [PANIC /boom] src/handlers.rs:12:5: index out of bounds
//! ```
//!
//! Records go to a [`LogSink`]. By default this is [`TracingLog`], which emits
//! them as `tracing` events; [`WriterLog`] appends them to any
//! [`Write`](std::io::Write) implementation instead.

use std::fmt::Display;
use std::io::Write;
use std::sync::{Mutex, PoisonError};

use derive_more::with_trait::Debug;
use tracing::{error, warn};

use crate::{Error, StatusCode};

/// The severity tag of a [`LogRecord`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum Severity {
    /// The next handler returned an error.
    #[display("ERROR")]
    Error,
    /// Something unexpected but harmless happened, such as an error page that
    /// could not be read.
    #[display("NOTICE")]
    Notice,
    /// The next handler panicked.
    #[display("PANIC")]
    Panic,
}

/// A single event reported by the error handler.
#[derive(Debug, Copy, Clone)]
pub enum LogRecord<'a> {
    /// The next handler returned an error.
    Error {
        /// The status returned alongside the error.
        status: StatusCode,
        /// The path of the request.
        path: &'a str,
        /// The error.
        error: &'a Error,
    },
    /// The error page configured for a status could not be read.
    Notice {
        /// The status the page was looked up for.
        status: StatusCode,
        /// The path of the request.
        path: &'a str,
        /// Why the page could not be read.
        load_error: &'a std::io::Error,
    },
    /// The next handler panicked.
    Panic {
        /// The path of the request.
        path: &'a str,
        /// The `file:line:column` of the panic site.
        location: &'a str,
        /// The panic message.
        message: &'a str,
    },
}

impl LogRecord<'_> {
    /// Returns the severity tag of this record.
    ///
    /// # Examples
    ///
    /// ```
    /// use error_pages::log::{LogRecord, Severity};
    ///
    /// let record = LogRecord::Panic {
    ///     path: "/",
    ///     location: "src/main.rs:1:1",
    ///     message: "oops",
    /// };
    /// assert_eq!(record.severity(), Severity::Panic);
    /// ```
    #[must_use]
    pub fn severity(&self) -> Severity {
        match self {
            Self::Error { .. } => Severity::Error,
            Self::Notice { .. } => Severity::Notice,
            Self::Panic { .. } => Severity::Panic,
        }
    }
}

impl Display for LogRecord<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let severity = self.severity();
        match self {
            Self::Error {
                status,
                path,
                error,
            } => write!(f, "[{severity} {} {path}] {error}", status.as_u16()),
            Self::Notice {
                status,
                path,
                load_error,
            } => write!(
                f,
                "[{severity} {} {path}] could not load error page: {load_error}",
                status.as_u16()
            ),
            Self::Panic {
                path,
                location,
                message,
            } => write!(f, "[{severity} {path}] {location}: {message}"),
        }
    }
}

/// A destination for [`LogRecord`]s.
///
/// Sinks are shared by all requests served concurrently, so implementations
/// must make each [`LogSink::log`] call atomic on their own.
pub trait LogSink: Send + Sync {
    /// Writes a single record.
    fn log(&self, record: &LogRecord<'_>);
}

/// A [`LogSink`] that emits records as `tracing` events.
///
/// `ERROR` and `PANIC` records are emitted at the error level, `NOTICE` records
/// at the warning level.
#[derive(Debug, Copy, Clone, Default)]
pub struct TracingLog;

impl LogSink for TracingLog {
    fn log(&self, record: &LogRecord<'_>) {
        match record.severity() {
            Severity::Error | Severity::Panic => error!("{record}"),
            Severity::Notice => warn!("{record}"),
        }
    }
}

/// A [`LogSink`] that appends one line per record to a writer.
///
/// # Examples
///
/// ```
/// use error_pages::log::{LogRecord, LogSink, WriterLog};
/// use error_pages::{Error, StatusCode};
///
/// let log = WriterLog::new(Vec::new());
/// log.log(&LogRecord::Error {
///     status: StatusCode::MOVED_PERMANENTLY,
///     path: "/",
///     error: &Error::wrap("test error"),
/// });
///
/// assert_eq!(log.into_inner(), b"[ERROR 301 /] test error\n");
/// ```
#[derive(Debug)]
pub struct WriterLog<W> {
    #[debug("..")]
    writer: Mutex<W>,
}

impl<W: Write + Send> WriterLog<W> {
    /// Creates a sink appending to `writer`.
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Consumes the sink, returning the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl<W: Write + Send> LogSink for WriterLog<W> {
    fn log(&self, record: &LogRecord<'_>) {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let result = writeln!(writer, "{record}").and_then(|()| writer.flush());
        if let Err(io_error) = result {
            error!(%io_error, %record, "Failed to write to the error log");
        }
    }
}

#[cfg(test)]
mod tests {
    use tracing_test::traced_test;

    use super::*;

    #[test]
    fn error_record_display() {
        let error = Error::wrap("test error");
        let record = LogRecord::Error {
            status: StatusCode::MOVED_PERMANENTLY,
            path: "/",
            error: &error,
        };

        assert_eq!(record.severity(), Severity::Error);
        assert_eq!(record.to_string(), "[ERROR 301 /] test error");
    }

    #[test]
    fn notice_record_display() {
        let load_error = std::io::Error::other("not_exist_file is missing");
        let record = LogRecord::Notice {
            status: StatusCode::FORBIDDEN,
            path: "/secret",
            load_error: &load_error,
        };

        assert_eq!(record.severity(), Severity::Notice);
        assert_eq!(
            record.to_string(),
            "[NOTICE 403 /secret] could not load error page: not_exist_file is missing"
        );
    }

    #[test]
    fn panic_record_display() {
        let record = LogRecord::Panic {
            path: "/",
            location: "src/lib.rs:10:5",
            message: "I'm a panic",
        };

        assert_eq!(record.severity(), Severity::Panic);
        assert_eq!(record.to_string(), "[PANIC /] src/lib.rs:10:5: I'm a panic");
    }

    #[test]
    fn writer_log_appends_lines() {
        let log = WriterLog::new(Vec::new());
        let error = Error::wrap("first");

        log.log(&LogRecord::Error {
            status: StatusCode::BAD_GATEWAY,
            path: "/a",
            error: &error,
        });
        log.log(&LogRecord::Panic {
            path: "/b",
            location: "<unknown>",
            message: "second",
        });

        assert_eq!(
            String::from_utf8(log.into_inner()).unwrap(),
            "[ERROR 502 /a] first\n[PANIC /b] <unknown>: second\n"
        );
    }

    #[test]
    #[traced_test]
    fn tracing_log_error() {
        let error = Error::wrap("test error");

        TracingLog.log(&LogRecord::Error {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            path: "/test",
            error: &error,
        });

        assert!(logs_contain("ERROR"));
        assert!(logs_contain("[ERROR 500 /test] test error"));
    }

    #[test]
    #[traced_test]
    fn tracing_log_notice() {
        let load_error = std::io::Error::other("gone");

        TracingLog.log(&LogRecord::Notice {
            status: StatusCode::NOT_FOUND,
            path: "/test",
            load_error: &load_error,
        });

        assert!(logs_contain("WARN"));
        assert!(logs_contain(
            "[NOTICE 404 /test] could not load error page: gone"
        ));
    }
}

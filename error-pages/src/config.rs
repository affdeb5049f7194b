//! Configuration of the error handler.
//!
//! The main struct in this module is [`ErrorHandlerConfig`]. After creating
//! an instance using [`ErrorHandlerConfig::from_toml`] or
//! [`ErrorHandlerConfigBuilder`], it can be passed to
//! [`ErrorHandler::new`](crate::ErrorHandler::new).

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use derive_builder::Builder;
use derive_more::with_trait::Debug;
use serde::{Deserialize, Serialize};

use crate::StatusCode;
use crate::error::ConfigError;
use crate::log::{LogSink, TracingLog, WriterLog};
use crate::page::ErrorPages;

/// The configuration of an [`ErrorHandler`](crate::ErrorHandler).
///
/// # Examples
///
/// ```
/// use error_pages::StatusCode;
/// use error_pages::config::{ErrorHandlerConfig, LogDestination};
///
/// let config = ErrorHandlerConfig::from_toml(
///     r#"
/// debug = false
/// root = "/srv/www"
///
/// [pages]
/// 404 = "errors/404.html"
/// "*" = "errors/generic.html"
///
/// [log]
/// type = "stderr"
/// "#,
/// )?;
///
/// assert_eq!(config.log, LogDestination::Stderr);
/// assert_eq!(
///     config.error_page(StatusCode::NOT_FOUND).unwrap(),
///     std::path::Path::new("/srv/www/errors/404.html")
/// );
/// # Ok::<(), error_pages::error::ConfigError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Builder, Serialize, Deserialize)]
#[builder(build_fn(skip, error = std::convert::Infallible))]
#[serde(default)]
pub struct ErrorHandlerConfig {
    /// Debug mode flag.
    ///
    /// When enabled, a panic in the next handler produces a response
    /// containing the panic message and a full stack trace. This must never
    /// be enabled where responses reach untrusted clients.
    ///
    /// `ErrorHandlerConfig::default()` returns `true` here when compiled in
    /// debug mode, and `false` when compiled in release mode.
    pub debug: bool,
    /// Whether to register the panic hook (see
    /// [`register_panic_hook`](crate::register_panic_hook)).
    ///
    /// Without the hook, panics are still caught, but their location is
    /// reported as `<unknown>` and the stack trace is taken after unwinding.
    pub register_panic_hook: bool,
    /// Directory relative page paths are resolved against.
    ///
    /// If not set, relative paths are resolved against the working directory
    /// of the process.
    #[builder(setter(into, strip_option))]
    pub root: Option<PathBuf>,
    /// The status used for the generic response to a panic when debug mode is
    /// disabled.
    #[serde(with = "status_code")]
    pub panic_status: StatusCode,
    /// The body of the generic response to a panic when debug mode is
    /// disabled.
    ///
    /// If not set, the response is the error page for
    /// [`panic_status`](Self::panic_status), or its `"<code> <reason>"` line
    /// if there is no page.
    #[builder(setter(into, strip_option))]
    pub panic_message: Option<String>,
    /// Error pages to serve, by status code.
    pub pages: ErrorPages,
    /// Where log records go.
    pub log: LogDestination,
}

const fn default_debug() -> bool {
    cfg!(debug_assertions)
}

impl Default for ErrorHandlerConfig {
    fn default() -> Self {
        ErrorHandlerConfig::builder().build()
    }
}

impl ErrorHandlerConfig {
    /// Create a new [`ErrorHandlerConfigBuilder`] to build an
    /// [`ErrorHandlerConfig`].
    ///
    /// # Examples
    ///
    /// ```
    /// use error_pages::config::ErrorHandlerConfig;
    ///
    /// let config = ErrorHandlerConfig::builder().debug(true).build();
    /// assert!(config.debug);
    /// ```
    #[must_use]
    pub fn builder() -> ErrorHandlerConfigBuilder {
        ErrorHandlerConfigBuilder::default()
    }

    /// Create a new [`ErrorHandlerConfig`] from a TOML string.
    ///
    /// # Errors
    ///
    /// This function will return an error if the TOML fails to parse as an
    /// [`ErrorHandlerConfig`], including when a key of the `pages` table is
    /// not a valid status code.
    pub fn from_toml(toml_content: &str) -> Result<ErrorHandlerConfig, ConfigError> {
        let config: ErrorHandlerConfig = toml::from_str(toml_content)?;
        Ok(config)
    }

    /// Returns the path of the error page for `status`, resolved against
    /// [`root`](Self::root).
    #[must_use]
    pub fn error_page(&self, status: StatusCode) -> Option<PathBuf> {
        let page = self.pages.get(status)?;
        Some(match &self.root {
            Some(root) if page.is_relative() => root.join(page),
            _ => page.to_path_buf(),
        })
    }
}

impl ErrorHandlerConfigBuilder {
    /// Builds the error handler configuration.
    ///
    /// # Examples
    ///
    /// ```
    /// use error_pages::StatusCode;
    /// use error_pages::config::ErrorHandlerConfig;
    ///
    /// let config = ErrorHandlerConfig::builder().build();
    /// assert!(config.register_panic_hook);
    /// assert_eq!(config.panic_status, StatusCode::INTERNAL_SERVER_ERROR);
    /// ```
    #[must_use]
    pub fn build(&self) -> ErrorHandlerConfig {
        ErrorHandlerConfig {
            debug: self.debug.unwrap_or(default_debug()),
            register_panic_hook: self.register_panic_hook.unwrap_or(true),
            root: self.root.clone().flatten(),
            panic_status: self
                .panic_status
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            panic_message: self.panic_message.clone().flatten(),
            pages: self.pages.clone().unwrap_or_default(),
            log: self.log.clone().unwrap_or_default(),
        }
    }
}

/// Where the error handler writes its log records.
///
/// # Examples
///
/// ```
/// use error_pages::config::{ErrorHandlerConfig, LogDestination};
///
/// let config = ErrorHandlerConfig::from_toml(
///     r#"
/// [log]
/// type = "file"
/// path = "/var/log/errors.log"
/// "#,
/// )?;
///
/// assert_eq!(
///     config.log,
///     LogDestination::File {
///         path: "/var/log/errors.log".into()
///     }
/// );
/// # Ok::<(), error_pages::error::ConfigError>(())
/// ```
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum LogDestination {
    /// Emit records as `tracing` events.
    #[default]
    Tracing,
    /// Append records to the standard output.
    Stdout,
    /// Append records to the standard error.
    Stderr,
    /// Append records to a file, creating it if needed.
    File {
        /// The path of the log file.
        path: PathBuf,
    },
}

impl LogDestination {
    /// Opens the log sink for this destination.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::LogFile`] if the log file cannot be opened.
    pub fn open(&self) -> Result<Arc<dyn LogSink>, ConfigError> {
        let sink: Arc<dyn LogSink> = match self {
            Self::Tracing => Arc::new(TracingLog),
            Self::Stdout => Arc::new(WriterLog::new(std::io::stdout())),
            Self::Stderr => Arc::new(WriterLog::new(std::io::stderr())),
            Self::File { path } => Arc::new(WriterLog::new(open_log_file(path)?)),
        };
        Ok(sink)
    }
}

fn open_log_file(path: &Path) -> Result<std::fs::File, ConfigError> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| ConfigError::LogFile {
            path: path.to_path_buf(),
            source,
        })
}

mod status_code {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::StatusCode;

    pub(super) fn serialize<S: Serializer>(
        status: &StatusCode,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_u16(status.as_u16())
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<StatusCode, D::Error> {
        let code = u16::deserialize(deserializer)?;
        StatusCode::from_u16(code).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::LogRecord;

    #[test]
    fn default_config() {
        let config = ErrorHandlerConfig::default();

        assert_eq!(config.debug, cfg!(debug_assertions));
        assert!(config.register_panic_hook);
        assert_eq!(config.root, None);
        assert!(config.pages.is_empty());
        assert_eq!(config.log, LogDestination::Tracing);
        assert_eq!(config.panic_status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(config.panic_message, None);
    }

    #[test]
    fn builder() {
        let config = ErrorHandlerConfig::builder()
            .debug(true)
            .register_panic_hook(false)
            .root("/srv/www")
            .pages(ErrorPages::new().with_page(StatusCode::NOT_FOUND, "404.html"))
            .log(LogDestination::Stdout)
            .panic_status(StatusCode::SERVICE_UNAVAILABLE)
            .panic_message("Something went wrong")
            .build();

        assert!(config.debug);
        assert!(!config.register_panic_hook);
        assert_eq!(config.root, Some(PathBuf::from("/srv/www")));
        assert_eq!(config.log, LogDestination::Stdout);
        assert_eq!(config.panic_status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(config.panic_message.as_deref(), Some("Something went wrong"));
    }

    #[test]
    fn from_toml_full() {
        let toml_content = r#"
            debug = true
            register_panic_hook = false
            root = "/srv/www"
            panic_status = 503
            panic_message = "We'll be right back"

            [pages]
            404 = "errors/404.html"
            403 = "/etc/errors/403.html"
            "*" = "errors/generic.html"

            [log]
            type = "file"
            path = "/var/log/errors.log"
        "#;

        let config = ErrorHandlerConfig::from_toml(toml_content).unwrap();

        assert!(config.debug);
        assert!(!config.register_panic_hook);
        assert_eq!(config.panic_status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(config.panic_message.as_deref(), Some("We'll be right back"));
        assert_eq!(
            config.log,
            LogDestination::File {
                path: PathBuf::from("/var/log/errors.log")
            }
        );
        assert_eq!(
            config.error_page(StatusCode::NOT_FOUND),
            Some(PathBuf::from("/srv/www/errors/404.html"))
        );
        assert_eq!(
            config.error_page(StatusCode::FORBIDDEN),
            Some(PathBuf::from("/etc/errors/403.html"))
        );
        assert_eq!(
            config.error_page(StatusCode::BAD_GATEWAY),
            Some(PathBuf::from("/srv/www/errors/generic.html"))
        );
    }

    #[test]
    fn from_toml_empty() {
        let config = ErrorHandlerConfig::from_toml("").unwrap();

        assert_eq!(config, ErrorHandlerConfig::default());
    }

    #[test]
    fn from_toml_invalid_status_key() {
        let toml_content = r#"
            [pages]
            4o4 = "404.html"
        "#;

        let error = ErrorHandlerConfig::from_toml(toml_content).unwrap_err();

        assert!(matches!(error, ConfigError::Toml(_)));
        assert!(error.to_string().contains("invalid status code `4o4`"));
    }

    #[test]
    fn from_toml_invalid_panic_status() {
        let error = ErrorHandlerConfig::from_toml("panic_status = 42").unwrap_err();

        assert!(matches!(error, ConfigError::Toml(_)));
    }

    #[test]
    fn toml_roundtrip() {
        let config = ErrorHandlerConfig::builder()
            .debug(false)
            .root("/srv/www")
            .pages(
                ErrorPages::new()
                    .with_page(StatusCode::NOT_FOUND, "404.html")
                    .with_generic_page("error.html"),
            )
            .log(LogDestination::Stderr)
            .build();

        let serialized = toml::to_string(&config).unwrap();

        assert_eq!(ErrorHandlerConfig::from_toml(&serialized).unwrap(), config);
    }

    #[test]
    fn error_page_without_root() {
        let config = ErrorHandlerConfig::builder()
            .pages(ErrorPages::new().with_page(StatusCode::FORBIDDEN, "not_exist_file"))
            .build();

        assert_eq!(
            config.error_page(StatusCode::FORBIDDEN),
            Some(PathBuf::from("not_exist_file"))
        );
        assert_eq!(config.error_page(StatusCode::BAD_REQUEST), None);
    }

    #[test]
    fn open_file_destination() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("errors.log");
        let destination = LogDestination::File { path: path.clone() };

        let sink = destination.open().unwrap();
        sink.log(&LogRecord::Panic {
            path: "/",
            location: "src/lib.rs:1:1",
            message: "logged",
        });

        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "[PANIC /] src/lib.rs:1:1: logged\n"
        );
    }

    #[test]
    fn open_file_destination_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("errors.log");
        let destination = LogDestination::File { path: path.clone() };

        let error = destination.open().err().unwrap();

        assert!(
            matches!(&error, ConfigError::LogFile { path: error_path, .. } if *error_path == path)
        );
    }
}

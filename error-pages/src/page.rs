//! Error page lookup and loading.
//!
//! [`ErrorPages`] maps status codes to the files served in their place, and a
//! [`PageSource`] reads those files. Pages are read again for every response;
//! nothing is cached.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::StatusCode;
use crate::error::ConfigError;

const GENERIC_PAGE_KEY: &str = "*";

/// Reads error pages.
pub trait PageSource: Send + Sync {
    /// Returns the full content of the page at `path`.
    fn read(&self, path: &Path) -> impl Future<Output = io::Result<Bytes>> + Send;
}

/// A [`PageSource`] reading pages from the file system.
#[derive(Debug, Copy, Clone, Default)]
pub struct FsPageSource;

impl PageSource for FsPageSource {
    async fn read(&self, path: &Path) -> io::Result<Bytes> {
        tokio::fs::read(path).await.map(Bytes::from)
    }
}

/// Error pages to serve, by status code.
///
/// Besides the pages for specific status codes, a generic page can be set. It
/// is used for every visible error status that does not have a page of its
/// own.
///
/// In TOML, this is a table keyed by status code, with `"*"` for the generic
/// page:
///
/// ```toml
/// [pages]
/// 404 = "errors/404.html"
/// 500 = "errors/500.html"
/// "*" = "errors/generic.html"
/// ```
///
/// # Examples
///
/// ```
/// use std::path::Path;
///
/// use error_pages::StatusCode;
/// use error_pages::page::ErrorPages;
///
/// let pages = ErrorPages::new()
///     .with_page(StatusCode::NOT_FOUND, "404.html")
///     .with_generic_page("error.html");
///
/// assert_eq!(pages.get(StatusCode::NOT_FOUND), Some(Path::new("404.html")));
/// assert_eq!(pages.get(StatusCode::FORBIDDEN), Some(Path::new("error.html")));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorPages {
    pages: HashMap<StatusCode, PathBuf>,
    generic: Option<PathBuf>,
}

impl ErrorPages {
    /// Creates an empty mapping.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the page served for `status`.
    #[must_use]
    pub fn with_page<P: Into<PathBuf>>(mut self, status: StatusCode, path: P) -> Self {
        self.pages.insert(status, path.into());
        self
    }

    /// Sets the page served for statuses without a page of their own.
    #[must_use]
    pub fn with_generic_page<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.generic = Some(path.into());
        self
    }

    /// Returns the page configured for `status`, falling back to the generic
    /// page.
    #[must_use]
    pub fn get(&self, status: StatusCode) -> Option<&Path> {
        self.pages
            .get(&status)
            .or(self.generic.as_ref())
            .map(PathBuf::as_path)
    }

    /// Returns `true` if no page is configured at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty() && self.generic.is_none()
    }

    fn from_table(table: BTreeMap<String, PathBuf>) -> Result<Self, ConfigError> {
        let mut pages = Self::new();
        for (key, path) in table {
            if key == GENERIC_PAGE_KEY {
                pages.generic = Some(path);
                continue;
            }

            let status = key
                .parse::<u16>()
                .ok()
                .and_then(|code| StatusCode::from_u16(code).ok())
                .ok_or_else(|| ConfigError::InvalidStatusCode(key.clone()))?;
            pages.pages.insert(status, path);
        }

        Ok(pages)
    }

    fn to_table(&self) -> BTreeMap<String, &Path> {
        let mut table: BTreeMap<String, &Path> = self
            .pages
            .iter()
            .map(|(status, path)| (status.as_u16().to_string(), path.as_path()))
            .collect();
        if let Some(generic) = &self.generic {
            table.insert(GENERIC_PAGE_KEY.to_owned(), generic);
        }
        table
    }
}

impl FromIterator<(StatusCode, PathBuf)> for ErrorPages {
    fn from_iter<T: IntoIterator<Item = (StatusCode, PathBuf)>>(iter: T) -> Self {
        Self {
            pages: iter.into_iter().collect(),
            generic: None,
        }
    }
}

impl Serialize for ErrorPages {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_table().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ErrorPages {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let table = BTreeMap::<String, PathBuf>::deserialize(deserializer)?;
        Self::from_table(table).map_err(D::Error::custom)
    }
}

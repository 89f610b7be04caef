//! API credentials and connection settings.
//!
//! The api_id/api_hash pair from my.telegram.org is persisted as a small
//! JSON file so it only has to be entered once. Everything the client needs
//! is gathered into a [`Config`] built at startup and handed to
//! [`Client::connect`](crate::resolve::Client::connect).

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Where credentials are stored unless told otherwise.
pub const DEFAULT_CREDENTIALS_FILE: &str = "tg-avail.json";

/// Where the signed-in Telegram session is kept unless told otherwise.
pub const DEFAULT_SESSION_FILE: &str = "tg-avail.session";

/// Timeout for connecting and for each lookup.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors loading, saving or parsing configuration.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// The API id is not a positive number.
    #[error("API id must be a positive number")]
    MalformedApiId,
    /// The API hash is not 32 hex digits.
    #[error("API hash must be 32 hexadecimal characters")]
    MalformedApiHash,
    /// No credentials were given and none could be asked for.
    #[error("no API credentials: pass --api-id/--api-hash or create {}", path.display())]
    Missing {
        /// The credentials file that was looked for.
        path: PathBuf,
    },
    /// Asking the operator for credentials failed.
    #[error("reading credentials: {0}")]
    Prompt(io::Error),
    /// The credentials file exists but could not be read.
    #[error("reading {}: {source}", path.display())]
    Read {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        source: io::Error,
    },
    /// The credentials file is not valid JSON of the expected shape.
    #[error("parsing {}: {source}", path.display())]
    Parse {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        source: serde_json::Error,
    },
    /// The credentials file could not be written.
    #[error("writing {}: {source}", path.display())]
    Write {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        source: io::Error,
    },
}

/// The api_hash half of the credentials.
///
/// `Debug` never prints it.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ApiHash(String);

impl ApiHash {
    /// The raw hash, for handing to the MTProto client.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiHash(<redacted>)")
    }
}

impl FromStr for ApiHash {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.len() == 32 && s.chars().all(|c| c.is_ascii_hexdigit()) {
            Ok(Self(s.to_ascii_lowercase()))
        } else {
            Err(ConfigError::MalformedApiHash)
        }
    }
}

impl TryFrom<String> for ApiHash {
    type Error = ConfigError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ApiHash> for String {
    fn from(hash: ApiHash) -> Self {
        hash.0
    }
}

/// Application credentials issued at my.telegram.org. Also the contents of
/// the credentials file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiCredentials {
    /// Numeric application id.
    pub api_id: i32,
    /// Application hash.
    pub api_hash: ApiHash,
}

impl ApiCredentials {
    /// Parse credentials as typed by an operator.
    ///
    /// ```
    /// use tg_avail::config::ApiCredentials;
    /// assert!(ApiCredentials::parse("12345", "0123456789abcdef0123456789abcdef").is_ok());
    /// assert!(ApiCredentials::parse("abc", "0123456789abcdef0123456789abcdef").is_err());
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MalformedApiId`] or
    /// [`ConfigError::MalformedApiHash`].
    pub fn parse(api_id: &str, api_hash: &str) -> Result<Self, ConfigError> {
        let api_id = api_id
            .trim()
            .parse::<i32>()
            .ok()
            .filter(|id| *id > 0)
            .ok_or(ConfigError::MalformedApiId)?;
        Ok(Self {
            api_id,
            api_hash: api_hash.parse()?,
        })
    }

    /// Load credentials from `path`. A missing file is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] if the file exists but cannot be read
    /// and [`ConfigError::Parse`] if its contents are malformed.
    pub fn load(path: &Path) -> Result<Option<Self>, ConfigError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.into(),
                    source,
                });
            }
        };
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|source| ConfigError::Parse {
                path: path.into(),
                source,
            })
    }

    /// Write credentials to `path`. On unix the file is created readable
    /// by the owner only.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Write`] if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let write_err = |source| ConfigError::Write {
            path: path.into(),
            source,
        };
        let mut json = serde_json::to_string_pretty(self)
            .map_err(io::Error::from)
            .map_err(write_err)?;
        json.push('\n');

        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(path).map_err(write_err)?;

        // mode() only applies to new files.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(fs::Permissions::from_mode(0o600))
                .map_err(write_err)?;
        }

        file.write_all(json.as_bytes()).map_err(write_err)?;
        Ok(())
    }
}

/// Pick credentials: `explicit` first, then the file at `path`, then
/// `prompt`.
///
/// `prompt` returns `None` when nobody can be asked, and otherwise the raw
/// api_id and api_hash. Prompted credentials are saved to `path`.
///
/// # Errors
///
/// Returns [`ConfigError::Missing`] when every source comes up empty, and
/// any load, parse, prompt or save failure along the way.
pub fn resolve_credentials<F>(
    explicit: Option<ApiCredentials>,
    path: &Path,
    prompt: F,
) -> Result<ApiCredentials, ConfigError>
where
    F: FnOnce() -> Option<io::Result<(String, String)>>,
{
    if let Some(credentials) = explicit {
        return Ok(credentials);
    }
    if let Some(credentials) = ApiCredentials::load(path)? {
        return Ok(credentials);
    }

    let (api_id, api_hash) = prompt()
        .ok_or_else(|| ConfigError::Missing { path: path.into() })?
        .map_err(ConfigError::Prompt)?;
    let credentials = ApiCredentials::parse(&api_id, &api_hash)?;
    credentials.save(path)?;
    Ok(credentials)
}

/// Everything needed to open a Telegram session.
#[derive(Debug, Clone)]
pub struct Config {
    /// Application credentials.
    pub credentials: ApiCredentials,
    /// File holding the signed-in session.
    pub session_path: PathBuf,
    /// Timeout for connecting and for each lookup.
    pub timeout: Duration,
}

impl Config {
    /// Settings with the default session file and timeout.
    #[must_use]
    pub fn new(credentials: ApiCredentials) -> Self {
        Self {
            credentials,
            session_path: PathBuf::from(DEFAULT_SESSION_FILE),
            timeout: REQUEST_TIMEOUT,
        }
    }

    /// Keep the session somewhere else.
    #[must_use]
    pub fn with_session_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.session_path = path.into();
        self
    }

    /// Override the timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

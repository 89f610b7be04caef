//! Availability checking for a single username.
//!
//! [`check`] validates a candidate locally, asks the remote service about it
//! exactly once and folds every possible outcome into a [`Verdict`]. Failures
//! never escape: a broken connection is a [`Classification::Error`], not a
//! reason to stop the batch.

use std::fmt;
use std::time::Duration;

use log::{debug, warn};
use thiserror::Error;

use crate::validate::{strip_marker, validate_handle};

/// A user, group or channel the remote service resolved a username to.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct Entity {
    /// Numeric peer id.
    pub id: i64,
    /// `user`, `group` or `channel`.
    pub kind: String,
    /// The public username, when the service reports it.
    pub username: Option<String>,
    /// Display name of the user, group or channel.
    pub title: Option<String>,
}

impl Entity {
    /// Build an entity by hand, e.g. for a [`Lookup`] that is not backed by
    /// a live Telegram session.
    #[must_use]
    pub fn new(id: i64, kind: impl Into<String>) -> Self {
        Self {
            id,
            kind: kind.into(),
            username: None,
            title: None,
        }
    }
}

/// Why a lookup did not resolve to an [`Entity`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum LookupError {
    /// Nobody holds the username.
    #[error("username is not occupied")]
    NotOccupied,
    /// The service refuses the username under its own rules.
    #[error("username is invalid")]
    InvalidIdentifier,
    /// The service asks the caller to back off for `wait`.
    #[error("rate limited, retry after {}s", .wait.as_secs())]
    RateLimited {
        /// How long the service wants callers to wait.
        wait: Duration,
    },
    /// Transport faults and responses nobody anticipated.
    #[error("{0}")]
    Other(String),
}

/// A connection able to resolve usernames.
///
/// Implementations take `&self`; the checker never mutates the connection
/// and never issues two lookups at once.
pub trait Lookup {
    /// Resolve `handle` (without the `@` marker) to the peer holding it.
    ///
    /// # Errors
    ///
    /// Returns a [`LookupError`] whenever the handle does not resolve.
    fn lookup(&self, handle: &str) -> Result<Entity, LookupError>;
}

impl<L: Lookup + ?Sized> Lookup for &L {
    fn lookup(&self, handle: &str) -> Result<Entity, LookupError> {
        (**self).lookup(handle)
    }
}

/// Something that can suspend the current flow for a while.
pub trait Pause {
    /// Block for `duration`.
    fn pause(&self, duration: Duration);
}

impl<P: Pause + ?Sized> Pause for &P {
    fn pause(&self, duration: Duration) {
        (**self).pause(duration);
    }
}

/// [`Pause`] that puts the current thread to sleep.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleep;

impl Pause for ThreadSleep {
    fn pause(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

/// Outcome of checking one username.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Classification {
    /// The username belongs to an existing chat.
    Taken,
    /// The username can be claimed.
    Available,
    /// The username fails the local naming policy; no lookup was made.
    InvalidFormat,
    /// The service rejected the username under its own rules.
    InvalidRemote,
    /// The service rate-limited the lookup; the checker waited `wait`.
    RateLimited {
        /// The wait the service demanded.
        wait: Duration,
    },
    /// The lookup failed for another reason.
    Error(String),
}

impl Classification {
    /// Short machine-friendly label.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Taken => "taken",
            Self::Available => "available",
            Self::InvalidFormat => "invalid_format",
            Self::InvalidRemote => "invalid_remote",
            Self::RateLimited { .. } => "rate_limited",
            Self::Error(_) => "error",
        }
    }

    /// Diagnostic payload, if the classification carries one.
    #[must_use]
    pub fn detail(&self) -> Option<String> {
        match self {
            Self::RateLimited { wait } => Some(format!("waited {}s", wait.as_secs())),
            Self::Error(msg) => Some(msg.clone()),
            _ => None,
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.detail() {
            Some(detail) => write!(f, "{}: {detail}", self.label()),
            None => f.write_str(self.label()),
        }
    }
}

impl From<LookupError> for Classification {
    fn from(e: LookupError) -> Self {
        match e {
            LookupError::NotOccupied => Self::Available,
            LookupError::InvalidIdentifier => Self::InvalidRemote,
            LookupError::RateLimited { wait } => Self::RateLimited { wait },
            LookupError::Other(msg) => Self::Error(msg),
        }
    }
}

/// The classified result for one candidate. Never changes once built.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[must_use]
pub struct Verdict {
    handle: String,
    classification: Classification,
}

impl Verdict {
    pub(crate) fn new(handle: impl Into<String>, classification: Classification) -> Self {
        Self {
            handle: handle.into(),
            classification,
        }
    }

    /// The username with the marker stripped.
    #[must_use]
    pub fn handle(&self) -> &str {
        &self.handle
    }

    /// What the check concluded.
    #[must_use]
    pub fn classification(&self) -> &Classification {
        &self.classification
    }

    /// Whether the username can be claimed.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.classification == Classification::Available
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t{}", self.handle, self.classification)
    }
}

/// Check one candidate, sleeping on the current thread if rate-limited.
///
/// See [`check_with`].
///
/// ```no_run
/// use tg_avail::check::{check, Classification};
/// use tg_avail::config::{ApiCredentials, Config};
/// use tg_avail::resolve::Client;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let credentials = ApiCredentials::parse("12345", "0123456789abcdef0123456789abcdef")?;
/// let client = Client::connect(&Config::new(credentials), None)?;
/// match check(&client, "@some_name").classification() {
///     Classification::Available => println!("go grab it!"),
///     other => println!("{other}"),
/// }
/// # Ok(())
/// # }
/// ```
pub fn check<L: Lookup + ?Sized>(connection: &L, candidate: &str) -> Verdict {
    check_with(connection, &ThreadSleep, candidate)
}

/// Check one candidate against the naming policy and the remote service.
///
/// 1. Strips the `@` marker.
/// 2. Rejects the handle as [`Classification::InvalidFormat`] without any
///    lookup if it fails the naming policy.
/// 3. Looks the handle up exactly once and classifies the outcome.
///
/// When the service rate-limits the lookup, `pause` is asked to wait for the
/// full duration the service demanded before the verdict is returned. The
/// lookup is not repeated afterwards.
pub fn check_with<L, P>(connection: &L, pause: &P, candidate: &str) -> Verdict
where
    L: Lookup + ?Sized,
    P: Pause + ?Sized,
{
    let handle = strip_marker(candidate);

    if let Err(e) = validate_handle(candidate) {
        debug!("{handle}: rejected locally: {e}");
        return Verdict::new(handle, Classification::InvalidFormat);
    }

    let classification = match connection.lookup(handle) {
        Ok(entity) => {
            debug!("{handle}: held by {} {}", entity.kind, entity.id);
            Classification::Taken
        }
        Err(LookupError::RateLimited { wait }) => {
            warn!("{handle}: rate limited, waiting {}s", wait.as_secs());
            pause.pause(wait);
            Classification::RateLimited { wait }
        }
        Err(e) => {
            debug!("{handle}: {e}");
            e.into()
        }
    };

    Verdict::new(handle, classification)
}

#[cfg(test)]
pub(crate) mod testing {
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::time::Duration;

    use super::{Entity, Lookup, LookupError, Pause};

    /// Answers lookups from a table and remembers every handle it was asked.
    #[derive(Debug, Default)]
    pub struct ScriptedLookup {
        answers: HashMap<String, Result<Entity, LookupError>>,
        pub calls: RefCell<Vec<String>>,
    }

    impl ScriptedLookup {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn answer(mut self, handle: &str, outcome: Result<Entity, LookupError>) -> Self {
            self.answers.insert(handle.to_string(), outcome);
            self
        }

        pub fn call_count(&self) -> usize {
            self.calls.borrow().len()
        }
    }

    impl Lookup for ScriptedLookup {
        fn lookup(&self, handle: &str) -> Result<Entity, LookupError> {
            self.calls.borrow_mut().push(handle.to_string());
            self.answers
                .get(handle)
                .cloned()
                .unwrap_or(Err(LookupError::NotOccupied))
        }
    }

    /// Records requested pauses instead of sleeping.
    #[derive(Debug, Default)]
    pub struct RecordingPause {
        pub pauses: RefCell<Vec<Duration>>,
    }

    impl Pause for RecordingPause {
        fn pause(&self, duration: Duration) {
            self.pauses.borrow_mut().push(duration);
        }
    }

    pub fn taken() -> Result<Entity, LookupError> {
        Ok(Entity::new(42, "user"))
    }
}

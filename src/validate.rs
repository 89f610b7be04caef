//! Local naming policy for Telegram usernames.
//!
//! A username starts with an ASCII letter, continues with ASCII letters,
//! digits or underscores, ends with a letter or digit, and is 5 to 32
//! characters long. The remote service enforces further rules of its own
//! (reported as [`Classification::InvalidRemote`](crate::check::Classification)).

use thiserror::Error;

/// Marker character users commonly put in front of a username.
pub const MARKER: char = '@';

/// Shortest username the policy accepts.
pub const MIN_HANDLE_LENGTH: usize = 5;

/// Longest username the policy accepts.
pub const MAX_HANDLE_LENGTH: usize = 32;

/// Why a candidate failed the local naming policy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum InvalidHandle {
    /// Fewer than [`MIN_HANDLE_LENGTH`] characters.
    #[error("username `{handle}` is too short ({len} characters, min {MIN_HANDLE_LENGTH})")]
    TooShort {
        /// The offending username.
        handle: String,
        /// Its length in characters.
        len: usize,
    },
    /// More than [`MAX_HANDLE_LENGTH`] characters.
    #[error("username `{handle}` is too long ({len} characters, max {MAX_HANDLE_LENGTH})")]
    TooLong {
        /// The offending username.
        handle: String,
        /// Its length in characters.
        len: usize,
    },
    /// The first character is not an ASCII letter.
    #[error("username `{handle}` must start with an ASCII letter, found `{first_char}`")]
    Start {
        /// The offending first character.
        first_char: char,
        /// The offending username.
        handle: String,
    },
    /// A character outside `[A-Za-z0-9_]`.
    #[error(
        "invalid character `{ch}` in username `{handle}`, \
         characters must be ASCII alphanumeric or `_`"
    )]
    Char {
        /// The offending character.
        ch: char,
        /// The offending username.
        handle: String,
    },
    /// The last character is not an ASCII letter or digit.
    #[error("username `{handle}` must end with an ASCII letter or digit, found `{last_char}`")]
    End {
        /// The offending last character.
        last_char: char,
        /// The offending username.
        handle: String,
    },
}

/// Remove one leading [`MARKER`], if present.
///
/// ```
/// use tg_avail::validate::strip_marker;
/// assert_eq!(strip_marker("@durov"), "durov");
/// assert_eq!(strip_marker("durov"), "durov");
/// assert_eq!(strip_marker("@@durov"), "@durov");
/// ```
#[must_use]
pub fn strip_marker(candidate: &str) -> &str {
    candidate.strip_prefix(MARKER).unwrap_or(candidate)
}

/// Check a candidate against the naming policy, reporting the first rule it
/// breaks. The marker is stripped first.
///
/// # Errors
///
/// Returns the [`InvalidHandle`] describing the first violated rule.
pub fn validate_handle(candidate: &str) -> Result<(), InvalidHandle> {
    let handle = strip_marker(candidate);
    let len = handle.chars().count();

    if len < MIN_HANDLE_LENGTH {
        return Err(InvalidHandle::TooShort {
            handle: handle.into(),
            len,
        });
    }
    if len > MAX_HANDLE_LENGTH {
        return Err(InvalidHandle::TooLong {
            handle: handle.into(),
            len,
        });
    }

    let mut chars = handle.chars();
    // Length was checked above, so both ends exist.
    let (Some(first), Some(last)) = (chars.next(), chars.next_back()) else {
        return Err(InvalidHandle::TooShort {
            handle: handle.into(),
            len,
        });
    };

    if !first.is_ascii_alphabetic() {
        return Err(InvalidHandle::Start {
            first_char: first,
            handle: handle.into(),
        });
    }

    for ch in chars {
        if !(ch.is_ascii_alphanumeric() || ch == '_') {
            return Err(InvalidHandle::Char {
                ch,
                handle: handle.into(),
            });
        }
    }

    if !last.is_ascii_alphanumeric() {
        return Err(InvalidHandle::End {
            last_char: last,
            handle: handle.into(),
        });
    }

    Ok(())
}

/// Whether a candidate satisfies the naming policy.
///
/// ```
/// use tg_avail::validate::validate;
/// assert!(validate("abcde"));
/// assert!(validate("@Some_Name42"));
/// assert!(!validate("@ab"));
/// assert!(!validate("name_"));
/// ```
#[must_use]
pub fn validate(candidate: &str) -> bool {
    validate_handle(candidate).is_ok()
}

//! Telegram MTProto client used as the [`Lookup`] connection.
//!
//! Lookups go through `contacts.resolveUsername`, which resolves users as
//! well as groups and channels. The async client runs on a private
//! single-threaded runtime so callers stay blocking and sequential.
//! RPC failures are mapped onto [`LookupError`] by [`classify_rpc`].

use std::fmt;
use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use grammers_client::types::Chat;
use grammers_client::{Client as TgClient, Config as TgConfig, InitParams, SignInError};
use grammers_mtsender::InvocationError;
use grammers_session::Session;
use log::{debug, info};
use thiserror::Error;
use tokio::runtime::{Builder, Runtime};

use crate::check::{Entity, Lookup, LookupError};
use crate::config::Config;

/// Failures while opening a session. Fatal for the run.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConnectError {
    /// The async runtime could not be started.
    #[error("starting runtime: {0}")]
    Runtime(io::Error),
    /// The session file could not be read or written.
    #[error("session file {}: {source}", path.display())]
    Session {
        /// The session file.
        path: PathBuf,
        /// Underlying error.
        source: io::Error,
    },
    /// Telegram could not be reached in time.
    #[error("cannot reach Telegram: {0}")]
    Unreachable(String),
    /// The session is not signed in and nobody can be asked to sign in.
    #[error("session is not signed in; run once from a terminal to log in")]
    NotSignedIn,
    /// Signing in failed.
    #[error("sign-in failed: {0}")]
    SignIn(String),
    /// Asking the operator for sign-in details failed.
    #[error("reading sign-in details: {0}")]
    Prompt(io::Error),
}

/// Asks the operator for what a first sign-in needs.
pub trait SignInPrompt {
    /// Phone number of the account, in international format.
    fn phone(&self) -> io::Result<String>;
    /// The login code Telegram just sent.
    fn code(&self) -> io::Result<String>;
    /// The two-step verification password.
    fn password(&self, hint: Option<&str>) -> io::Result<String>;
}

/// A connected, signed-in Telegram client.
///
/// Blocking; one request at a time.
pub struct Client {
    runtime: Runtime,
    inner: TgClient,
    timeout: Duration,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Connect with the session stored at `config.session_path`, signing in
    /// through `prompt` if the session is new.
    ///
    /// Flood waits are never slept through silently: every one of them is
    /// reported to the caller as [`LookupError::RateLimited`].
    ///
    /// # Errors
    ///
    /// Returns [`ConnectError::NotSignedIn`] if the session needs a sign-in
    /// and `prompt` is `None`, and the matching [`ConnectError`] for every
    /// other setup failure.
    pub fn connect(
        config: &Config,
        prompt: Option<&dyn SignInPrompt>,
    ) -> Result<Self, ConnectError> {
        let session_err = |source| ConnectError::Session {
            path: config.session_path.clone(),
            source,
        };

        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(ConnectError::Runtime)?;
        let session = Session::load_file_or_create(&config.session_path).map_err(session_err)?;

        let tg_config = TgConfig {
            session,
            api_id: config.credentials.api_id,
            api_hash: config.credentials.api_hash.expose().to_string(),
            params: InitParams {
                flood_sleep_threshold: 0,
                ..Default::default()
            },
        };
        let inner = within(&runtime, config.timeout, TgClient::connect(tg_config))?
            .map_err(|e| ConnectError::Unreachable(e.to_string()))?;

        let authorized = within(&runtime, config.timeout, inner.is_authorized())?
            .map_err(|e| ConnectError::SignIn(e.to_string()))?;
        if !authorized {
            let prompt = prompt.ok_or(ConnectError::NotSignedIn)?;
            runtime.block_on(sign_in(&inner, prompt))?;
            info!("signed in");
        }
        inner
            .session()
            .save_to_file(&config.session_path)
            .map_err(session_err)?;
        info!("connected to Telegram");

        Ok(Self {
            runtime,
            inner,
            timeout: config.timeout,
        })
    }
}

impl Lookup for Client {
    fn lookup(&self, handle: &str) -> Result<Entity, LookupError> {
        let resolved = self.runtime.block_on(async {
            tokio::time::timeout(self.timeout, self.inner.resolve_username(handle)).await
        });
        match resolved {
            Err(_) => Err(LookupError::Other(format!(
                "no answer within {}s",
                self.timeout.as_secs()
            ))),
            Ok(Ok(Some(chat))) => Ok(entity(&chat)),
            Ok(Ok(None)) => Err(LookupError::NotOccupied),
            Ok(Err(InvocationError::Rpc(rpc))) => {
                debug!("resolveUsername {handle}: {} {}", rpc.code, rpc.name);
                Err(classify_rpc(rpc.code, &rpc.name, rpc.value))
            }
            Ok(Err(e)) => Err(LookupError::Other(e.to_string())),
        }
    }
}

fn within<F: Future>(
    runtime: &Runtime,
    timeout: Duration,
    fut: F,
) -> Result<F::Output, ConnectError> {
    runtime
        .block_on(async { tokio::time::timeout(timeout, fut).await })
        .map_err(|_| {
            ConnectError::Unreachable(format!("no answer within {}s", timeout.as_secs()))
        })
}

async fn sign_in(client: &TgClient, prompt: &dyn SignInPrompt) -> Result<(), ConnectError> {
    let phone = prompt.phone().map_err(ConnectError::Prompt)?;
    let token = client
        .request_login_code(phone.trim())
        .await
        .map_err(|e| ConnectError::SignIn(e.to_string()))?;
    let code = prompt.code().map_err(ConnectError::Prompt)?;

    match client.sign_in(&token, code.trim()).await {
        Ok(_) => Ok(()),
        Err(SignInError::PasswordRequired(password_token)) => {
            let password = prompt
                .password(password_token.hint())
                .map_err(ConnectError::Prompt)?;
            client
                .check_password(password_token, password.trim())
                .await
                .map(drop)
                .map_err(|e| ConnectError::SignIn(e.to_string()))
        }
        Err(e) => Err(ConnectError::SignIn(e.to_string())),
    }
}

fn entity(chat: &Chat) -> Entity {
    let kind = match chat {
        Chat::User(_) => "user",
        Chat::Group(_) => "group",
        _ => "channel",
    };
    Entity {
        id: chat.id(),
        kind: kind.to_string(),
        username: chat.username().map(str::to_string),
        title: Some(chat.name().to_string()),
    }
}

/// Map an MTProto RPC error from `contacts.resolveUsername` onto the lookup
/// outcome.
///
/// - `USERNAME_NOT_OCCUPIED`: nobody holds the username.
/// - `USERNAME_INVALID`: Telegram refuses the username under its own rules.
/// - `FLOOD_WAIT` (also `FLOOD_PREMIUM_WAIT`): rate limit, `value` seconds.
///   When the name was not split from its number, as in `FLOOD_WAIT_30`,
///   the wait is read from the name.
/// - Anything else is [`LookupError::Other`].
#[must_use]
pub fn classify_rpc(code: i32, name: &str, value: Option<u32>) -> LookupError {
    match name {
        "USERNAME_NOT_OCCUPIED" => LookupError::NotOccupied,
        "USERNAME_INVALID" => LookupError::InvalidIdentifier,
        n if n.starts_with("FLOOD_WAIT") || n.starts_with("FLOOD_PREMIUM_WAIT") => {
            match value.map(u64::from).or_else(|| trailing_seconds(n)) {
                Some(seconds) => LookupError::RateLimited {
                    wait: Duration::from_secs(seconds),
                },
                None => LookupError::Other(format!("{code} {name}: rate limited without a wait")),
            }
        }
        _ => LookupError::Other(format!("{code} {name}")),
    }
}

/// Last run of digits in `name`, as in `FLOOD_WAIT_30`.
fn trailing_seconds(name: &str) -> Option<u64> {
    let end = name.rfind(|c: char| c.is_ascii_digit())? + 1;
    let start = name[..end]
        .char_indices()
        .rev()
        .find(|(_, c)| !c.is_ascii_digit())
        .map_or(0, |(i, c)| i + c.len_utf8());
    name[start..end].parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::testing::RecordingPause;
    use crate::check::{Classification, check_with};

    /// Lookup that answers every handle with one RPC error.
    struct RpcFailure(i32, &'static str, Option<u32>);

    impl Lookup for RpcFailure {
        fn lookup(&self, _handle: &str) -> Result<Entity, LookupError> {
            Err(classify_rpc(self.0, self.1, self.2))
        }
    }

    #[test]
    fn not_occupied_is_not_occupied() {
        assert_eq!(
            classify_rpc(400, "USERNAME_NOT_OCCUPIED", None),
            LookupError::NotOccupied
        );
    }

    #[test]
    fn username_invalid_is_remote_rejection() {
        assert_eq!(
            classify_rpc(400, "USERNAME_INVALID", None),
            LookupError::InvalidIdentifier
        );
    }

    #[test]
    fn flood_wait_uses_value() {
        assert_eq!(
            classify_rpc(420, "FLOOD_WAIT", Some(30)),
            LookupError::RateLimited {
                wait: Duration::from_secs(30)
            }
        );
        assert_eq!(
            classify_rpc(420, "FLOOD_PREMIUM_WAIT", Some(5)),
            LookupError::RateLimited {
                wait: Duration::from_secs(5)
            }
        );
    }

    #[test]
    fn flood_wait_falls_back_to_name() {
        assert_eq!(
            classify_rpc(420, "FLOOD_WAIT_7", None),
            LookupError::RateLimited {
                wait: Duration::from_secs(7)
            }
        );
    }

    #[test]
    fn flood_wait_without_number_is_other() {
        assert!(matches!(
            classify_rpc(420, "FLOOD_WAIT", None),
            LookupError::Other(msg) if msg.contains("without a wait")
        ));
    }

    #[test]
    fn unknown_rpc_error_is_other() {
        assert_eq!(
            classify_rpc(401, "AUTH_KEY_UNREGISTERED", None),
            LookupError::Other("401 AUTH_KEY_UNREGISTERED".into())
        );
    }

    #[test]
    fn held_username_is_never_reported_available() {
        // A user-held username resolves; only USERNAME_NOT_OCCUPIED frees it.
        let invalid = check_with(
            &RpcFailure(400, "USERNAME_INVALID", None),
            &RecordingPause::default(),
            "@durov",
        );
        assert_eq!(invalid.classification(), &Classification::InvalidRemote);

        let unknown = check_with(
            &RpcFailure(500, "INTERNAL", None),
            &RecordingPause::default(),
            "@durov",
        );
        assert!(!unknown.is_available());

        let free = check_with(
            &RpcFailure(400, "USERNAME_NOT_OCCUPIED", None),
            &RecordingPause::default(),
            "@durov",
        );
        assert!(free.is_available());
    }

    #[test]
    fn flood_wait_suspends_the_check() {
        let pause = RecordingPause::default();
        let verdict = check_with(&RpcFailure(420, "FLOOD_WAIT", Some(30)), &pause, "busyname");
        assert_eq!(*pause.pauses.borrow(), vec![Duration::from_secs(30)]);
        assert_eq!(verdict.classification().label(), "rate_limited");
    }

    #[test]
    fn trailing_seconds_picks_last_number() {
        assert_eq!(trailing_seconds("FLOOD_WAIT_30"), Some(30));
        assert_eq!(trailing_seconds("FLOOD_WAIT_5"), Some(5));
        assert_eq!(trailing_seconds("FLOOD_WAIT"), None);
    }

    #[test]
    #[ignore = "requires network access and a signed-in session; set TG_API_ID/TG_API_HASH"]
    fn live_lookup_of_a_user_account() {
        let credentials = crate::config::ApiCredentials::parse(
            &std::env::var("TG_API_ID").expect("TG_API_ID"),
            &std::env::var("TG_API_HASH").expect("TG_API_HASH"),
        )
        .unwrap();
        let client = Client::connect(&Config::new(credentials), None).expect("connect");
        let entity = client.lookup("durov").expect("durov resolves");
        assert_eq!(entity.kind, "user");
    }
}

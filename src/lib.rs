#![warn(missing_docs, missing_debug_implementations)]

//! Check whether Telegram usernames are free to claim.
//!
//! Each candidate is first held against the local naming policy (5 to 32
//! characters, letter first, letters/digits/underscores, no trailing
//! underscore). Candidates that pass are looked up once over Telegram's
//! MTProto API, signed in as a user account, so usernames held by people
//! are seen as well as groups and channels. The outcome is classified as
//! taken, available, rejected by the service, rate-limited or failed. Rate
//! limits are honoured by waiting out the duration the service demands.
//!
//! # Example
//!
//! ```no_run
//! use tg_avail::check::{check, Classification};
//! use tg_avail::config::{ApiCredentials, Config};
//! use tg_avail::resolve::Client;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let credentials = ApiCredentials::parse("12345", "0123456789abcdef0123456789abcdef")?;
//! // The session must already be signed in; pass a `SignInPrompt` otherwise.
//! let client = Client::connect(&Config::new(credentials), None)?;
//! for name in ["@durov", "some_free_name"] {
//!     let verdict = check(&client, name);
//!     match verdict.classification() {
//!         Classification::Available => println!("{} is free", verdict.handle()),
//!         other => println!("{}: {other}", verdict.handle()),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod check;
pub mod config;
pub mod list;
pub mod logging;
pub mod resolve;
pub mod run;
pub mod validate;

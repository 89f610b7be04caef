use std::io::{self, BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::{ArgAction, Parser};
use log::info;
use thiserror::Error;

use tg_avail::check::{ThreadSleep, Verdict};
use tg_avail::config::{
    ApiCredentials, Config, ConfigError, DEFAULT_CREDENTIALS_FILE, DEFAULT_SESSION_FILE,
    resolve_credentials,
};
use tg_avail::list::{ListError, STDIN_PATH, read_candidates, write_available};
use tg_avail::logging;
use tg_avail::resolve::{Client, ConnectError, SignInPrompt};
use tg_avail::run::{Progress, Summary, available, check_all};
use tg_avail::validate::{strip_marker, validate_handle};

#[derive(Parser)]
#[command(
    name = "tg-avail",
    version,
    about = "Check whether Telegram usernames are free to claim",
    after_help = "Usernames are checked one at a time, in order, with a pause after \
                  each one. When Telegram rate-limits a lookup the checker waits as \
                  long as asked and moves on; that username is reported as \
                  rate_limited and is not retried.\n\n\
                  API credentials come from https://my.telegram.org. The first run \
                  from a terminal asks for them and signs in with a phone number; \
                  the login is kept in the session file."
)]
struct Cli {
    /// Usernames to check (default: read from --input)
    names: Vec<String>,

    /// File with one username per line, `-` for stdin
    #[arg(short, long, default_value = "usernames.txt")]
    input: PathBuf,

    /// Where available usernames are written
    #[arg(short, long, default_value = "available.txt")]
    output: PathBuf,

    /// Credentials file holding the API id and hash
    #[arg(long, default_value = DEFAULT_CREDENTIALS_FILE)]
    credentials: PathBuf,

    /// API id (overrides the credentials file; not saved)
    #[arg(long, env = "TG_API_ID", requires = "api_hash")]
    api_id: Option<String>,

    /// API hash (overrides the credentials file; not saved)
    #[arg(long, env = "TG_API_HASH", hide_env_values = true, requires = "api_id")]
    api_hash: Option<String>,

    /// Session file keeping the login
    #[arg(long, default_value = DEFAULT_SESSION_FILE)]
    session: PathBuf,

    /// Pause after each username, in milliseconds
    #[arg(long, default_value_t = 1000)]
    delay_ms: u64,

    /// Per-request timeout, in seconds
    #[arg(long, default_value_t = 10)]
    timeout_secs: u64,

    /// Only apply the local naming rules; no network
    #[arg(long)]
    validate_only: bool,

    /// Suppress per-username output
    #[arg(short, long)]
    quiet: bool,

    /// Only print available usernames (valid ones with --validate-only)
    #[arg(short, long)]
    available_only: bool,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    /// Whether the username list is read from stdin.
    fn reads_stdin(&self) -> bool {
        self.names.is_empty() && self.input == Path::new(STDIN_PATH)
    }
}

/// Problems that stop the run before any username is checked.
#[derive(Debug, Error)]
enum SetupError {
    #[error("no usernames provided")]
    NoCandidates,
    #[error(transparent)]
    List(#[from] ListError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Connect(#[from] ConnectError),
}

fn main() -> ExitCode {
    #[cfg(unix)]
    reset_sigpipe();

    let cli = Cli::parse();
    logging::initialize(logging::level_for(cli.verbose, cli.quiet));

    if cli.validate_only {
        return match load_candidates(&cli) {
            Ok(candidates) => validate_only(&cli, &candidates),
            Err(e) => fail(&e),
        };
    }

    // A list on stdin is read only once credentials and sign-in, which may
    // prompt on the same stdin, are done.
    let early = if cli.reads_stdin() {
        None
    } else {
        match load_candidates(&cli) {
            Ok(candidates) => Some(candidates),
            Err(e) => return fail(&e),
        }
    };

    let client = match connect(&cli) {
        Ok(client) => client,
        Err(e) => return fail(&e),
    };

    let candidates = match early.map_or_else(|| load_candidates(&cli), Ok) {
        Ok(candidates) => candidates,
        Err(e) => return fail(&e),
    };

    let delay = Duration::from_millis(cli.delay_ms);
    let verdicts = check_all(&client, &ThreadSleep, delay, &candidates, |progress, verdict| {
        print_verdict(&cli, progress, verdict);
    });

    if let Err(e) = write_available(&cli.output, available(&verdicts)) {
        return fail(&SetupError::from(e));
    }

    let summary = Summary::of(&verdicts);
    info!(
        "done: {} available, {} taken, {} invalid, {} rate limited, {} errors; saved to {}",
        summary.available,
        summary.taken,
        summary.invalid,
        summary.rate_limited,
        summary.errors,
        cli.output.display()
    );

    ExitCode::SUCCESS
}

fn fail(e: &SetupError) -> ExitCode {
    eprintln!("error: {e}");
    ExitCode::from(2)
}

fn load_candidates(cli: &Cli) -> Result<Vec<String>, SetupError> {
    let candidates = if cli.names.is_empty() {
        read_candidates(&cli.input)?
    } else {
        cli.names.clone()
    };
    if candidates.is_empty() {
        return Err(SetupError::NoCandidates);
    }
    Ok(candidates)
}

fn connect(cli: &Cli) -> Result<Client, SetupError> {
    let explicit = match (&cli.api_id, &cli.api_hash) {
        (Some(id), Some(hash)) => Some(ApiCredentials::parse(id, hash)?),
        _ => None,
    };
    let interactive = io::stdin().is_terminal();

    let credentials = resolve_credentials(explicit, &cli.credentials, || {
        interactive.then(|| {
            let api_id = ask("API id: ")?;
            let api_hash = ask("API hash: ")?;
            Ok::<_, io::Error>((api_id, api_hash))
        })
    })?;

    let config = Config::new(credentials)
        .with_session_path(cli.session.as_path())
        .with_timeout(Duration::from_secs(cli.timeout_secs));
    let prompt = interactive.then_some(&TerminalPrompt as &dyn SignInPrompt);
    Ok(Client::connect(&config, prompt)?)
}

/// Sign-in questions asked on the terminal.
struct TerminalPrompt;

impl SignInPrompt for TerminalPrompt {
    fn phone(&self) -> io::Result<String> {
        ask("Phone number (international format): ")
    }

    fn code(&self) -> io::Result<String> {
        ask("Login code: ")
    }

    fn password(&self, hint: Option<&str>) -> io::Result<String> {
        match hint {
            Some(hint) => ask(&format!("Two-step verification password (hint: {hint}): ")),
            None => ask("Two-step verification password: "),
        }
    }
}

fn ask(question: &str) -> io::Result<String> {
    eprint!("{question}");
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn print_verdict(cli: &Cli, progress: Progress, verdict: &Verdict) {
    if cli.quiet || (cli.available_only && !verdict.is_available()) {
        return;
    }
    println!("{}/{}\t{verdict}", progress.index, progress.total);
}

fn validate_only(cli: &Cli, candidates: &[String]) -> ExitCode {
    let mut all_valid = true;

    for candidate in candidates {
        let handle = strip_marker(candidate);
        let (label, detail) = match validate_handle(candidate) {
            Ok(()) => ("valid", String::new()),
            Err(e) => {
                all_valid = false;
                ("invalid_format", format!(": {e}"))
            }
        };

        if cli.quiet || (cli.available_only && label != "valid") {
            continue;
        }
        println!("{handle}\t{label}{detail}");
    }

    if all_valid {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}

#[cfg(unix)]
fn reset_sigpipe() {
    // SAFETY: runs first thing in main, before any other thread exists.
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_DFL);
    }
}

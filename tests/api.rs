use std::cell::Cell;
use std::time::Duration;

use tg_avail::check::{
    Classification, Entity, Lookup, LookupError, Pause, check, check_with,
};
use tg_avail::run::{Summary, available, check_all};
use tg_avail::validate::{InvalidHandle, validate, validate_handle};

/// Answers every lookup the same way and counts calls.
struct Fixed {
    outcome: Result<Entity, LookupError>,
    calls: Cell<usize>,
}

impl Fixed {
    fn new(outcome: Result<Entity, LookupError>) -> Self {
        Self {
            outcome,
            calls: Cell::new(0),
        }
    }
}

impl Lookup for Fixed {
    fn lookup(&self, _handle: &str) -> Result<Entity, LookupError> {
        self.calls.set(self.calls.get() + 1);
        self.outcome.clone()
    }
}

#[derive(Default)]
struct Waited(Cell<Duration>);

impl Pause for Waited {
    fn pause(&self, duration: Duration) {
        self.0.set(self.0.get() + duration);
    }
}

#[test]
fn public_api_validate() {
    assert!(validate("abcde"));
    assert!(!validate("@ab"));
    assert!(matches!(
        validate_handle("9lives"),
        Err(InvalidHandle::Start { first_char: '9', .. })
    ));
}

#[test]
fn short_candidate_is_rejected_without_lookup() {
    let lookup = Fixed::new(Err(LookupError::NotOccupied));
    let verdict = check(&lookup, "@ab");
    assert_eq!(verdict.handle(), "ab");
    assert_eq!(verdict.classification(), &Classification::InvalidFormat);
    assert_eq!(lookup.calls.get(), 0);
}

#[test]
fn not_occupied_is_available() {
    let lookup = Fixed::new(Err(LookupError::NotOccupied));
    let verdict = check(&lookup, "freehandle123");
    assert!(verdict.is_available());
    assert_eq!(lookup.calls.get(), 1);
}

#[test]
fn found_is_taken() {
    let lookup = Fixed::new(Ok(Entity::new(1, "user")));
    assert_eq!(
        check(&lookup, "@durov").classification(),
        &Classification::Taken
    );
}

#[test]
fn rate_limit_suspends_for_the_demanded_wait() {
    let wait = Duration::from_secs(30);
    let lookup = Fixed::new(Err(LookupError::RateLimited { wait }));
    let waited = Waited::default();

    let verdict = check_with(&lookup, &waited, "busyname");

    assert!(waited.0.get() >= wait);
    assert_eq!(
        verdict.classification(),
        &Classification::RateLimited { wait }
    );
    assert_eq!(lookup.calls.get(), 1);
}

#[test]
fn unmodelled_failure_is_error() {
    let lookup = Fixed::new(Err(LookupError::Other("Timeout".into())));
    match check(&lookup, "slowhost").classification() {
        Classification::Error(msg) => assert!(msg.contains("Timeout")),
        other => panic!("expected Error, got {other:?}"),
    }
}

#[test]
fn batch_keeps_order_and_collects_available() {
    let lookup = Fixed::new(Err(LookupError::NotOccupied));
    let input: Vec<String> = ["zeta_name", "@xy", "alpha_name"]
        .iter()
        .map(|s| s.to_string())
        .collect();

    let verdicts = check_all(&lookup, &Waited::default(), Duration::ZERO, &input, |_, _| {});

    let handles: Vec<&str> = verdicts.iter().map(|v| v.handle()).collect();
    assert_eq!(handles, vec!["zeta_name", "xy", "alpha_name"]);
    assert_eq!(
        available(&verdicts).collect::<Vec<_>>(),
        vec!["zeta_name", "alpha_name"]
    );
    assert_eq!(Summary::of(&verdicts).invalid, 1);
    assert_eq!(lookup.calls.get(), 2);
}

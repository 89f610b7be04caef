//! Sequential batch driver.
//!
//! Checks candidates one after another in input order, idling for a fixed
//! delay after each one so the remote service is not hammered.

use std::time::Duration;

use log::info;

use crate::check::{Classification, Lookup, Pause, Verdict, check_with};

/// Idle time after every candidate unless configured otherwise.
pub const DEFAULT_DELAY: Duration = Duration::from_secs(1);

/// Position of a verdict within the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// 1-based index of the candidate.
    pub index: usize,
    /// Number of candidates in the batch.
    pub total: usize,
}

/// Check every candidate in order, calling `report` as each verdict lands.
///
/// After each candidate, whatever its classification, `pause` idles for
/// `delay`. Returns one verdict per candidate, in input order.
pub fn check_all<L, P, F>(
    connection: &L,
    pause: &P,
    delay: Duration,
    candidates: &[String],
    mut report: F,
) -> Vec<Verdict>
where
    L: Lookup + ?Sized,
    P: Pause + ?Sized,
    F: FnMut(Progress, &Verdict),
{
    let total = candidates.len();
    info!("checking {total} usernames");

    let mut verdicts = Vec::with_capacity(total);
    for (i, candidate) in candidates.iter().enumerate() {
        let verdict = check_with(connection, pause, candidate);
        report(Progress { index: i + 1, total }, &verdict);
        verdicts.push(verdict);
        pause.pause(delay);
    }
    verdicts
}

/// Handles classified as available, in input order.
pub fn available(verdicts: &[Verdict]) -> impl Iterator<Item = &str> {
    verdicts
        .iter()
        .filter(|v| v.is_available())
        .map(Verdict::handle)
}

/// Per-classification counts for a finished batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    /// Verdicts classified taken.
    pub taken: usize,
    /// Verdicts classified available.
    pub available: usize,
    /// Local or remote naming rejections.
    pub invalid: usize,
    /// Verdicts that hit a rate limit.
    pub rate_limited: usize,
    /// Lookups that failed.
    pub errors: usize,
}

impl Summary {
    /// Tally `verdicts`.
    #[must_use]
    pub fn of(verdicts: &[Verdict]) -> Self {
        let mut summary = Self::default();
        for verdict in verdicts {
            match verdict.classification() {
                Classification::Taken => summary.taken += 1,
                Classification::Available => summary.available += 1,
                Classification::InvalidFormat | Classification::InvalidRemote => {
                    summary.invalid += 1;
                }
                Classification::RateLimited { .. } => summary.rate_limited += 1,
                Classification::Error(_) => summary.errors += 1,
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::LookupError;
    use crate::check::testing::{RecordingPause, ScriptedLookup, taken};

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn verdicts_follow_input_order() {
        let lookup = ScriptedLookup::new()
            .answer("taken_one", taken())
            .answer("free_two", Err(LookupError::NotOccupied))
            .answer("broken3", Err(LookupError::Other("Timeout".into())));
        let pause = RecordingPause::default();
        let input = names(&["taken_one", "@ab", "free_two", "broken3"]);

        let verdicts = check_all(&lookup, &pause, Duration::ZERO, &input, |_, _| {});

        let labels: Vec<_> = verdicts
            .iter()
            .map(|v| (v.handle(), v.classification().label()))
            .collect();
        assert_eq!(
            labels,
            vec![
                ("taken_one", "taken"),
                ("ab", "invalid_format"),
                ("free_two", "available"),
                ("broken3", "error"),
            ]
        );
        assert_eq!(
            *lookup.calls.borrow(),
            names(&["taken_one", "free_two", "broken3"])
        );
    }

    #[test]
    fn delay_follows_every_candidate() {
        let lookup = ScriptedLookup::new();
        let pause = RecordingPause::default();
        let delay = Duration::from_millis(1000);
        let input = names(&["@ab", "valid_one", "valid_two"]);

        check_all(&lookup, &pause, delay, &input, |_, _| {});

        assert_eq!(*pause.pauses.borrow(), vec![delay; 3]);
    }

    #[test]
    fn rate_limit_wait_precedes_the_regular_delay() {
        let wait = Duration::from_secs(30);
        let delay = Duration::from_secs(1);
        let lookup =
            ScriptedLookup::new().answer("busy_name", Err(LookupError::RateLimited { wait }));
        let pause = RecordingPause::default();

        let input = names(&["busy_name", "next_one"]);

        let verdicts = check_all(&lookup, &pause, delay, &input, |_, _| {});

        assert_eq!(*pause.pauses.borrow(), vec![wait, delay, delay]);
        assert_eq!(verdicts[0].classification().label(), "rate_limited");
        assert_eq!(verdicts[1].classification().label(), "available");
        // The rate-limited handle is not looked up a second time.
        assert_eq!(lookup.call_count(), 2);
    }

    #[test]
    fn report_sees_progress_in_order() {
        let lookup = ScriptedLookup::new();
        let mut seen = Vec::new();

        check_all(
            &lookup,
            &RecordingPause::default(),
            Duration::ZERO,
            &names(&["first_one", "second_one"]),
            |progress, verdict| seen.push((progress, verdict.handle().to_string())),
        );

        assert_eq!(
            seen,
            vec![
                (Progress { index: 1, total: 2 }, "first_one".to_string()),
                (Progress { index: 2, total: 2 }, "second_one".to_string()),
            ]
        );
    }

    #[test]
    fn only_available_handles_are_collected() {
        let lookup = ScriptedLookup::new()
            .answer("taken_one", taken())
            .answer("refused1", Err(LookupError::InvalidIdentifier));
        let input = names(&["@free_one", "taken_one", "refused1", "@xy", "free_two"]);

        let verdicts = check_all(
            &lookup,
            &RecordingPause::default(),
            Duration::ZERO,
            &input,
            |_, _| {},
        );

        let free: Vec<_> = available(&verdicts).collect();
        assert_eq!(free, vec!["free_one", "free_two"]);
        assert_eq!(
            Summary::of(&verdicts),
            Summary {
                taken: 1,
                available: 2,
                invalid: 2,
                rate_limited: 0,
                errors: 0,
            }
        );
    }

    #[test]
    fn empty_batch_yields_nothing() {
        let lookup = ScriptedLookup::new();
        let pause = RecordingPause::default();
        let verdicts = check_all(&lookup, &pause, DEFAULT_DELAY, &[], |_, _| {});
        assert!(verdicts.is_empty());
        assert!(pause.pauses.borrow().is_empty());
        assert_eq!(lookup.call_count(), 0);
    }
}

//! Scheduling-confirmation detection and confirmed-time resolution
//!
//! Replies to a proposed meeting rarely restate a full datetime, so the
//! classifier is deliberately broad (a stray match costs one harmless
//! booking attempt) and the resolver works through a fixed priority:
//! an explicit datetime in the reply, then flexibility wording, then an
//! ordinal pick from previously suggested times, then the first
//! suggestion.

use chrono::{DateTime, Duration, Timelike};
use chrono_tz::Tz;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::extractor::extract_datetime_at;

/// Phrases that signal a reply is confirming a meeting.
const CONFIRMATION_KEYWORDS: &[&str] = &[
    "anytime is fine",
    "anytime is ok",
    "anytime works",
    "any time is fine",
    "first option",
    "second option",
    "third option",
    "yes, that works",
    "sounds good",
    "perfect",
    "confirmed",
    "i'll take",
    "let's go with",
    "book it",
    "schedule it",
];

/// Phrases that leave slot choice to us.
const FLEXIBILITY_KEYWORDS: &[&str] = &["anytime", "any time", "flexible", "whatever works"];

/// Ordinal references to previously suggested options, scanned in order.
const ORDINAL_PATTERNS: &[(&[&str], usize)] = &[
    (&["first", "1st"], 0),
    (&["second", "2nd"], 1),
    (&["third", "3rd"], 2),
];

static CLOCK_WITH_MINUTES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d{1,2}:\d{2}\s*[ap]m").unwrap());

static CLOCK_HOUR_ONLY: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{1,2}\s*[ap]m").unwrap());

/// Patterns pulled out of a thread when hunting for suggested times: a bare
/// clock time, and the long form the assistant itself writes into replies.
static SUGGESTED_TIME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\d{1,2}:\d{2}\s*[AP]M").unwrap());

static SUGGESTED_LONG_FORM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\w+\s+\d{1,2},\s+\d{4}\s+at\s+\d{1,2}:\d{2}\s*[AP]M").unwrap()
});

/// Check if an email body reads like a meeting confirmation reply.
pub fn is_confirmation_reply(body: &str) -> bool {
    let lower = body.to_lowercase();

    if CONFIRMATION_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return true;
    }

    CLOCK_WITH_MINUTES.is_match(&lower) || CLOCK_HOUR_ONLY.is_match(&lower)
}

/// Extract previously suggested meeting times from a thread, in order of
/// first occurrence, deduplicated by resolved instant.
pub fn extract_suggested_times(
    body: &str,
    zone: Tz,
    reference: DateTime<Tz>,
) -> Vec<DateTime<Tz>> {
    let mut times = Vec::new();

    for pattern in [&*SUGGESTED_TIME, &*SUGGESTED_LONG_FORM] {
        for m in pattern.find_iter(body) {
            if let Some(dt) = extract_datetime_at(m.as_str(), zone, reference) {
                if !times.contains(&dt) {
                    times.push(dt);
                }
            }
        }
    }

    times
}

/// Resolve the meeting time a confirmation reply selects.
///
/// Priority: an explicit datetime in the reply wins outright; flexibility
/// wording takes the first suggestion (or synthesizes a near-term slot);
/// an ordinal reference picks from the suggestions; otherwise the first
/// suggestion stands. Returns `None` when nothing resolves.
pub fn resolve_confirmed_time(
    body: &str,
    zone: Tz,
    now: DateTime<Tz>,
) -> Option<DateTime<Tz>> {
    if let Some(dt) = extract_datetime_at(body, zone, now) {
        return Some(dt);
    }

    let suggested = extract_suggested_times(body, zone, now);
    let lower = body.to_lowercase();

    if FLEXIBILITY_KEYWORDS.iter().any(|k| lower.contains(k)) {
        if let Some(first) = suggested.first() {
            return Some(*first);
        }
        return Some(fallback_slot(now));
    }

    for (words, index) in ORDINAL_PATTERNS {
        if words.iter().any(|w| lower.contains(w)) {
            if let Some(dt) = suggested.get(*index) {
                return Some(*dt);
            }
            break;
        }
    }

    suggested.first().copied()
}

/// Next sensible business slot when the reply says "anytime" but nothing
/// was ever suggested: tomorrow 09:00 after hours, else the next whole
/// hour.
fn fallback_slot(now: DateTime<Tz>) -> DateTime<Tz> {
    let top_of_hour = now
        .with_minute(0)
        .and_then(|dt| dt.with_second(0))
        .and_then(|dt| dt.with_nanosecond(0))
        .unwrap_or(now);

    if now.hour() >= 17 {
        top_of_hour + Duration::hours((24 - now.hour() + 9) as i64)
    } else {
        top_of_hour + Duration::hours(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveTime, TimeZone};

    const KATHMANDU: Tz = chrono_tz::Asia::Kathmandu;

    fn noon() -> DateTime<Tz> {
        KATHMANDU.with_ymd_and_hms(2026, 8, 6, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_keyword_confirmations() {
        assert!(is_confirmation_reply("Sounds good, see you then!"));
        assert!(is_confirmation_reply("Let's go with the second option"));
        assert!(is_confirmation_reply("Book it."));
        assert!(is_confirmation_reply("CONFIRMED"));
    }

    #[test]
    fn test_clock_time_confirmations() {
        assert!(is_confirmation_reply("4:58 pm works for me"));
        assert!(is_confirmation_reply("how about 5 pm"));
        assert!(!is_confirmation_reply("thanks for the documents"));
    }

    #[test]
    fn test_suggested_times_deduplicated() {
        let body = "Option A: 4:58 PM. Option B: 5:13 PM. I repeat, 4:58 PM.";
        let times = extract_suggested_times(body, KATHMANDU, noon());
        assert_eq!(times.len(), 2);
        assert_eq!(times[0].time(), NaiveTime::from_hms_opt(16, 58, 0).unwrap());
        assert_eq!(times[1].time(), NaiveTime::from_hms_opt(17, 13, 0).unwrap());
    }

    #[test]
    fn test_long_form_suggestions_parse() {
        let body = "I proposed August 21, 2026 at 4:58 PM earlier in this thread.";
        let times = extract_suggested_times(body, KATHMANDU, noon());
        // the bare clock-time scan lands on today, the long form on the
        // dated instant; both are kept as distinct suggestions
        assert_eq!(times.len(), 2);
        assert_eq!(times[0].date_naive(), noon().date_naive());
        assert_eq!(times[1].date_naive().to_string(), "2026-08-21");
    }

    #[test]
    fn test_explicit_time_beats_ordinal() {
        let body = "Neither the first option nor the second works, \
                    let's do August 25 at 3:00 PM instead.";
        let resolved = resolve_confirmed_time(body, KATHMANDU, noon()).unwrap();
        assert_eq!(resolved.date_naive().to_string(), "2026-08-25");
        assert_eq!(resolved.time(), NaiveTime::from_hms_opt(15, 0, 0).unwrap());
    }

    #[test]
    fn test_flexibility_takes_first_suggestion_over_ordinal() {
        // "anytime" is checked before ordinals, so the first suggested time
        // wins even with "second option" in the reply
        let body = "anytime works, but maybe the second option? \
                    You offered 4:58 PM and 5:13 PM.";
        let resolved = resolve_confirmed_time(body, KATHMANDU, noon()).unwrap();
        assert_eq!(resolved.time(), NaiveTime::from_hms_opt(16, 58, 0).unwrap());
    }

    #[test]
    fn test_ordinal_selection() {
        let body = "I'll take the second option. (You offered 4:58 PM and 5:13 PM.)";
        let resolved = resolve_confirmed_time(body, KATHMANDU, noon()).unwrap();
        assert_eq!(resolved.time(), NaiveTime::from_hms_opt(17, 13, 0).unwrap());
    }

    #[test]
    fn test_ordinal_out_of_range_falls_through_to_first() {
        let body = "the third one please, out of the 4:58 PM and 5:13 PM you offered";
        let resolved = resolve_confirmed_time(body, KATHMANDU, noon()).unwrap();
        // only two suggestions exist; the out-of-range ordinal falls back
        // to the first of them
        assert_eq!(resolved.time(), NaiveTime::from_hms_opt(16, 58, 0).unwrap());
    }

    #[test]
    fn test_flexible_with_no_suggestions_synthesizes_next_hour() {
        let resolved = resolve_confirmed_time("I'm flexible", KATHMANDU, noon()).unwrap();
        assert_eq!(resolved.time(), NaiveTime::from_hms_opt(13, 0, 0).unwrap());
        assert_eq!(resolved.date_naive(), noon().date_naive());
    }

    #[test]
    fn test_flexible_after_hours_synthesizes_next_morning() {
        let evening = KATHMANDU.with_ymd_and_hms(2026, 8, 6, 18, 20, 0).unwrap();
        let resolved = resolve_confirmed_time("whatever works", KATHMANDU, evening).unwrap();
        assert_eq!(resolved.time(), NaiveTime::from_hms_opt(9, 0, 0).unwrap());
        assert_eq!(resolved.date_naive().to_string(), "2026-08-07");
    }

    #[test]
    fn test_nothing_resolves() {
        assert!(resolve_confirmed_time("thanks, talk soon", KATHMANDU, noon()).is_none());
    }
}

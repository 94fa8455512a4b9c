//! Temporal extraction from free-form email text
//!
//! Fuzzy scan for date and time fragments: month-name and numeric dates,
//! relative day words, weekday references, 12- and 24-hour clock times,
//! and a fixed table of timezone abbreviations. Parsing is seeded with
//! "today at midnight" in the caller's zone so a bare time-of-day lands on
//! the current date rather than whatever instant parsing runs at.

use chrono::{
    DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc, Weekday,
};
use chrono_tz::Tz;
use once_cell::sync::Lazy;
use regex::Regex;

/// Timezone abbreviations mapped to fixed UTC offsets.
///
/// Abbreviations are inherently ambiguous (CST, IST); this table pins the
/// readings the assistant's correspondents actually use.
static TZ_ABBREVIATIONS: Lazy<Vec<(&'static str, FixedOffset)>> = Lazy::new(|| {
    let east = |secs: i32| FixedOffset::east_opt(secs).unwrap();
    let west = |secs: i32| FixedOffset::west_opt(secs).unwrap();
    vec![
        // Australia
        ("AEST", east(10 * 3600)),
        ("AEDT", east(11 * 3600)),
        ("ACST", east(9 * 3600 + 1800)),
        ("ACDT", east(10 * 3600 + 1800)),
        ("AWST", east(8 * 3600)),
        // US
        ("PST", west(8 * 3600)),
        ("PDT", west(7 * 3600)),
        ("MST", west(7 * 3600)),
        ("MDT", west(6 * 3600)),
        ("CST", west(6 * 3600)),
        ("CDT", west(5 * 3600)),
        ("EST", west(5 * 3600)),
        ("EDT", west(4 * 3600)),
        // Other commons
        ("NPT", east(5 * 3600 + 2700)), // Nepal
        ("IST", east(5 * 3600 + 1800)), // India
        ("BST", east(3600)),            // British Summer Time
        ("GMT", east(0)),
        ("UTC", east(0)),
    ]
});

static TZ_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(AEST|AEDT|ACST|ACDT|AWST|PST|PDT|MST|MDT|CST|CDT|EST|EDT|NPT|IST|BST|GMT|UTC)\b")
        .unwrap()
});

static TIME_MERIDIEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,2})(?::(\d{2}))?\s*(AM|PM)\b").unwrap());

static TIME_24H: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d{1,2}):(\d{2})\b").unwrap());

const MONTHS: &str = "jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|jun(?:e)?|jul(?:y)?|aug(?:ust)?|sep(?:tember)?|sept|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?";

static MONTH_FIRST_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)\b({MONTHS})\.?\s+(\d{{1,2}})(?:st|nd|rd|th)?(?:,?\s*(\d{{4}}))?\b"
    ))
    .unwrap()
});

static DAY_FIRST_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)\b(\d{{1,2}})(?:st|nd|rd|th)?\s+(?:of\s+)?({MONTHS})\b\.?(?:,?\s*(\d{{4}}))?"
    ))
    .unwrap()
});

static NUMERIC_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,2})/(\d{1,2})(?:/(\d{2,4}))?\b").unwrap());

static WEEKDAY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:(next)\s+)?(monday|tuesday|wednesday|thursday|friday|saturday|sunday)\b")
        .unwrap()
});

/// Uppercase every am/pm substring before parsing.
///
/// The replacement is a blunt substring rewrite: unrelated words get hit
/// too ("sample" becomes "sAMple"). Downstream patterns only accept a
/// meridiem after a digit, so the collateral rewrites stay inert.
pub fn normalize_meridiem(text: &str) -> String {
    text.replace("am", "AM").replace("pm", "PM")
}

fn month_number(name: &str) -> Option<u32> {
    let prefix: String = name.to_lowercase().chars().take(3).collect();
    match prefix.as_str() {
        "jan" => Some(1),
        "feb" => Some(2),
        "mar" => Some(3),
        "apr" => Some(4),
        "may" => Some(5),
        "jun" => Some(6),
        "jul" => Some(7),
        "aug" => Some(8),
        "sep" => Some(9),
        "oct" => Some(10),
        "nov" => Some(11),
        "dec" => Some(12),
        _ => None,
    }
}

fn weekday_number(name: &str) -> Option<Weekday> {
    match name.to_lowercase().as_str() {
        "monday" => Some(Weekday::Mon),
        "tuesday" => Some(Weekday::Tue),
        "wednesday" => Some(Weekday::Wed),
        "thursday" => Some(Weekday::Thu),
        "friday" => Some(Weekday::Fri),
        "saturday" => Some(Weekday::Sat),
        "sunday" => Some(Weekday::Sun),
        _ => None,
    }
}

fn expand_year(raw: i32) -> i32 {
    if raw < 100 {
        2000 + raw
    } else {
        raw
    }
}

/// What a fuzzy scan found for one component.
enum Scan<T> {
    NoSignal,
    Found(T),
    /// Several distinct readings; the whole extraction must miss rather
    /// than guess between them
    Ambiguous,
}

fn collapse<T: PartialEq>(values: Vec<T>) -> Scan<T> {
    let mut distinct: Vec<T> = Vec::new();
    for value in values {
        if !distinct.contains(&value) {
            distinct.push(value);
        }
    }
    match distinct.len() {
        0 => Scan::NoSignal,
        1 => Scan::Found(distinct.remove(0)),
        _ => Scan::Ambiguous,
    }
}

fn ranges_overlap(a: &std::ops::Range<usize>, b: &std::ops::Range<usize>) -> bool {
    a.start < b.end && b.start < a.end
}

/// Scan the text for clock times.
fn find_time(text: &str) -> Scan<NaiveTime> {
    let mut times = Vec::new();
    let mut meridiem_spans: Vec<std::ops::Range<usize>> = Vec::new();

    for caps in TIME_MERIDIEM.captures_iter(text) {
        let Ok(hour) = caps[1].parse::<u32>() else { continue };
        if !(1..=12).contains(&hour) {
            continue;
        }
        let minute: u32 = caps
            .get(2)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0);
        if minute > 59 {
            continue;
        }
        let hour = match (&caps[3], hour) {
            ("AM", 12) => 0,
            ("AM", h) => h,
            ("PM", 12) => 12,
            (_, h) => h + 12,
        };
        if let Some(time) = NaiveTime::from_hms_opt(hour, minute, 0) {
            meridiem_spans.push(caps.get(0).map(|m| m.range()).unwrap_or(0..0));
            times.push(time);
        }
    }

    for caps in TIME_24H.captures_iter(text) {
        let span = caps.get(0).map(|m| m.range()).unwrap_or(0..0);
        if meridiem_spans.iter().any(|s| ranges_overlap(s, &span)) {
            continue;
        }
        let (Ok(hour), Ok(minute)) = (caps[1].parse::<u32>(), caps[2].parse::<u32>()) else {
            continue;
        };
        if hour <= 23 && minute <= 59 {
            if let Some(time) = NaiveTime::from_hms_opt(hour, minute, 0) {
                times.push(time);
            }
        }
    }

    collapse(times)
}

fn captured_date(
    caps: &regex::Captures<'_>,
    month_group: usize,
    day_group: usize,
    reference: NaiveDate,
) -> Option<NaiveDate> {
    let month = month_number(&caps[month_group])?;
    let day: u32 = caps[day_group].parse().ok()?;
    let year = caps
        .get(3)
        .and_then(|y| y.as_str().parse::<i32>().ok())
        .map(expand_year)
        .unwrap_or(reference.year());
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Scan the text for calendar dates, relative to `reference` for year
/// defaults and relative expressions.
///
/// Absolute dates take precedence over relative words, which take
/// precedence over weekday names; within a tier, several distinct
/// readings are ambiguous.
fn find_date(text: &str, reference: NaiveDate) -> Scan<NaiveDate> {
    let mut absolute = Vec::new();
    let mut claimed: Vec<std::ops::Range<usize>> = Vec::new();

    for caps in MONTH_FIRST_DATE.captures_iter(text) {
        if let Some(date) = captured_date(&caps, 1, 2, reference) {
            claimed.push(caps.get(0).map(|m| m.range()).unwrap_or(0..0));
            absolute.push(date);
        }
    }

    for caps in DAY_FIRST_DATE.captures_iter(text) {
        let span = caps.get(0).map(|m| m.range()).unwrap_or(0..0);
        if claimed.iter().any(|s| ranges_overlap(s, &span)) {
            continue;
        }
        if let Some(date) = captured_date(&caps, 2, 1, reference) {
            claimed.push(span);
            absolute.push(date);
        }
    }

    for caps in NUMERIC_DATE.captures_iter(text) {
        let span = caps.get(0).map(|m| m.range()).unwrap_or(0..0);
        if claimed.iter().any(|s| ranges_overlap(s, &span)) {
            continue;
        }
        let (Ok(month), Ok(day)) = (caps[1].parse::<u32>(), caps[2].parse::<u32>()) else {
            continue;
        };
        let year = caps
            .get(3)
            .and_then(|y| y.as_str().parse::<i32>().ok())
            .map(expand_year)
            .unwrap_or(reference.year());
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            absolute.push(date);
        }
    }

    match collapse(absolute) {
        Scan::Found(date) => return Scan::Found(date),
        Scan::Ambiguous => return Scan::Ambiguous,
        Scan::NoSignal => {}
    }

    let lower = text.to_lowercase();
    if lower.contains("day after tomorrow") {
        return Scan::Found(reference + Duration::days(2));
    }
    if lower.contains("tomorrow") {
        return Scan::Found(reference + Duration::days(1));
    }
    if lower.contains("today") || lower.contains("tonight") {
        return Scan::Found(reference);
    }

    let mut weekday_dates = Vec::new();
    for caps in WEEKDAY.captures_iter(text) {
        let Some(target) = weekday_number(&caps[2]) else { continue };
        let current = reference.weekday();
        let mut ahead = (target.num_days_from_monday() as i64
            - current.num_days_from_monday() as i64)
            .rem_euclid(7);
        if ahead == 0 && caps.get(1).is_some() {
            ahead = 7;
        }
        weekday_dates.push(reference + Duration::days(ahead));
    }

    collapse(weekday_dates)
}

/// Explicit timezone abbreviation in the text, if any.
fn find_zone(text: &str) -> Option<FixedOffset> {
    let token = TZ_TOKEN.find(text)?.as_str();
    TZ_ABBREVIATIONS
        .iter()
        .find(|(abbr, _)| *abbr == token)
        .map(|(_, offset)| *offset)
}

/// Extract the datetime a text refers to, resolved into `zone`.
///
/// Returns `None` when the text carries no discernible date or time, and
/// also when it names several distinct ones (the scan refuses to guess; a
/// reply quoting multiple proposed slots is handled by the suggestion
/// machinery instead). A bare time resolves to today in `zone`; a bare
/// date resolves to local midnight; an explicit abbreviation is read at
/// its fixed offset and then converted into `zone`.
pub fn extract_datetime(text: &str, zone: Tz) -> Option<DateTime<Tz>> {
    extract_datetime_at(text, zone, Utc::now().with_timezone(&zone))
}

/// As [`extract_datetime`] with an explicit reference instant, so "today"
/// and year defaults are deterministic under test.
pub fn extract_datetime_at(
    text: &str,
    zone: Tz,
    reference: DateTime<Tz>,
) -> Option<DateTime<Tz>> {
    let normalized = normalize_meridiem(text);

    let time = match find_time(&normalized) {
        Scan::Ambiguous => return None,
        Scan::Found(time) => Some(time),
        Scan::NoSignal => None,
    };
    let date = match find_date(&normalized, reference.date_naive()) {
        Scan::Ambiguous => return None,
        Scan::Found(date) => Some(date),
        Scan::NoSignal => None,
    };
    if time.is_none() && date.is_none() {
        return None;
    }

    let naive = date
        .unwrap_or_else(|| reference.date_naive())
        .and_time(time.unwrap_or(NaiveTime::MIN));

    match find_zone(&normalized) {
        Some(offset) => {
            let at_offset = offset.from_local_datetime(&naive).single()?;
            Some(at_offset.with_timezone(&zone))
        }
        None => zone.from_local_datetime(&naive).earliest(),
    }
}

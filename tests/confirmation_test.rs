//! Confirmed-time resolution priority laws

use chrono::{NaiveTime, TimeZone};
use chrono_tz::Tz;
use inbox_pilot::confirmation::{
    extract_suggested_times, is_confirmation_reply, resolve_confirmed_time,
};

const KATHMANDU: Tz = chrono_tz::Asia::Kathmandu;

fn noon() -> chrono::DateTime<Tz> {
    KATHMANDU.with_ymd_and_hms(2026, 8, 6, 12, 0, 0).unwrap()
}

#[test]
fn explicit_datetime_beats_ordinal_reference() {
    let body = "Neither the first nor the second option works for me, \
                how about August 28 at 11:00 AM?";
    let resolved = resolve_confirmed_time(body, KATHMANDU, noon()).unwrap();
    assert_eq!(resolved.date_naive().to_string(), "2026-08-28");
    assert_eq!(resolved.time(), NaiveTime::from_hms_opt(11, 0, 0).unwrap());
}

#[test]
fn flexibility_keyword_wins_over_ordinal_reference() {
    // documented step order: flexibility is checked before ordinals, so
    // the first suggested time wins even though "first option" also
    // appears (here they agree by construction)
    let body = "anytime works, let's go with the first option\n\
                \n\
                > I can offer August 21, 2026 at 4:58 PM\n\
                > or August 22, 2026 at 5:13 PM";
    let suggested = extract_suggested_times(body, KATHMANDU, noon());
    let resolved = resolve_confirmed_time(body, KATHMANDU, noon()).unwrap();
    assert_eq!(resolved, suggested[0]);
}

#[test]
fn suggested_times_have_no_duplicates() {
    let body = "4:58 PM, I said 4:58 PM, definitely 4:58 PM";
    let times = extract_suggested_times(body, KATHMANDU, noon());
    assert_eq!(times.len(), 1);
}

#[test]
fn ordinal_picks_the_matching_suggestion() {
    let body = "I'll take the second option please. \
                (Offered: 4:58 PM and 5:13 PM.)";
    let resolved = resolve_confirmed_time(body, KATHMANDU, noon()).unwrap();
    assert_eq!(resolved.time(), NaiveTime::from_hms_opt(17, 13, 0).unwrap());
}

#[test]
fn classifier_is_broad_but_stable() {
    assert!(is_confirmation_reply("sounds good!"));
    assert!(is_confirmation_reply("let's meet at 3 pm"));
    assert!(!is_confirmation_reply("please find the report attached"));

    // idempotent over the same input
    let body = "book it";
    assert_eq!(is_confirmation_reply(body), is_confirmation_reply(body));
}

#[test]
fn unresolvable_reply_yields_nothing() {
    assert!(resolve_confirmed_time("thanks, speak soon", KATHMANDU, noon()).is_none());
}

//! Availability resolution and forward slot search
//!
//! Given a candidate meeting time, decide between booking it, proposing
//! alternatives, or reporting a creation error. The slot search walks
//! forward in 15-minute steps for at most a week, jumping straight past
//! conflicting events rather than re-probing every sub-interval of a
//! known-busy block.

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::calendar::{BusyEvent, CalendarService, EventDraft};
use crate::composer::{self, ReplyComposer};
use crate::error::Result;
use crate::models::{BookingOutcome, CalendarSlot, Email, EventRecord, UserZone};

/// Step between probed slot starts, and the buffer left after a
/// conflicting event before the next probe.
const SLOT_STEP_MINUTES: i64 = 15;

/// One week of 15-minute steps; bounds the forward search.
const SEARCH_BUDGET: usize = 672;

/// A candidate meeting to resolve against the calendar.
#[derive(Debug, Clone)]
pub struct MeetingRequest<'a> {
    pub start: DateTime<Tz>,
    pub title: &'a str,
    pub attendee: Option<&'a str>,
    /// Original email for reply generation; without it only templated
    /// replies are produced.
    pub context: Option<&'a Email>,
}

/// Calendar-aware booking engine.
pub struct Scheduler {
    calendar: Arc<dyn CalendarService>,
    composer: ReplyComposer,
    duration: Duration,
    num_suggestions: usize,
}

impl Scheduler {
    pub fn new(
        calendar: Arc<dyn CalendarService>,
        composer: ReplyComposer,
        duration_minutes: i64,
        num_suggestions: usize,
    ) -> Self {
        Self {
            calendar,
            composer,
            duration: Duration::minutes(duration_minutes),
            num_suggestions,
        }
    }

    /// Events overlapping `[start, start + duration)`.
    async fn conflicts(&self, start: DateTime<Tz>) -> Result<Vec<BusyEvent>> {
        let start_utc = start.with_timezone(&Utc);
        self.calendar
            .events_between(start_utc, start_utc + self.duration)
            .await
    }

    /// Candidate slot at `start` with the scheduler's meeting duration.
    pub fn candidate(&self, start: DateTime<Tz>, title: &str, attendee: Option<&str>) -> CalendarSlot {
        CalendarSlot {
            start,
            duration: self.duration,
            title: Some(title.to_string()),
            attendee: attendee.map(str::to_string),
        }
    }

    /// Create the event remotely with the user's zone attached to both
    /// endpoints.
    pub async fn book(
        &self,
        start: DateTime<Tz>,
        title: &str,
        attendee: Option<&str>,
        zone: &UserZone,
    ) -> Result<EventRecord> {
        let slot = self.candidate(start, title, attendee);
        let draft = EventDraft {
            summary: slot.title.clone().unwrap_or_else(|| "Meeting".to_string()),
            start: slot.start.with_timezone(&Utc),
            end: slot.end().with_timezone(&Utc),
            time_zone: zone.name.clone(),
            attendee: slot.attendee.clone(),
        };
        self.calendar.insert_event(&draft).await
    }

    /// Find up to `num_suggestions` free slots at or after `requested`.
    ///
    /// A free window is accepted as-is; a conflict moves the probe to the
    /// conflicting event's end plus a 15-minute buffer. The search gives
    /// up after a week's worth of steps.
    pub async fn find_next_available_slots(
        &self,
        requested: DateTime<Tz>,
        zone: Tz,
    ) -> Result<Vec<DateTime<Tz>>> {
        let mut slots = Vec::new();
        let mut current = requested;

        for _ in 0..SEARCH_BUDGET {
            let events = self.conflicts(current).await?;

            if events.is_empty() {
                slots.push(current);
                if slots.len() >= self.num_suggestions {
                    break;
                }
            } else {
                current = match events.iter().find_map(|e| e.end) {
                    Some(end) => end.with_timezone(&zone) + Duration::minutes(SLOT_STEP_MINUTES),
                    // all-day conflicts carry no end instant; step normally
                    None => current + Duration::minutes(SLOT_STEP_MINUTES),
                };
                continue;
            }

            current = current + Duration::minutes(SLOT_STEP_MINUTES);
        }

        debug!(found = slots.len(), "slot search finished");
        Ok(slots)
    }

    /// Check the requested slot and either book it or propose alternatives.
    ///
    /// Returns the reply body to send plus the outcome tag. Calendar read
    /// failures propagate; an event-creation failure is reported as
    /// [`BookingOutcome::Error`] with an apology reply.
    pub async fn resolve(
        &self,
        request: &MeetingRequest<'_>,
        zone: &UserZone,
    ) -> Result<(String, BookingOutcome)> {
        let conflicts = self.conflicts(request.start).await?;

        if !conflicts.is_empty() {
            let Some(email) = request.context else {
                return Ok((composer::busy_fallback(), BookingOutcome::Suggested));
            };
            let alternatives = self
                .find_next_available_slots(request.start, zone.tz)
                .await?;
            if alternatives.is_empty() {
                return Ok((composer::no_alternatives_apology(), BookingOutcome::Suggested));
            }
            let reply = self
                .composer
                .alternative_times(email, request.start, &alternatives, request.title)
                .await?;
            return Ok((reply, BookingOutcome::Suggested));
        }

        match self
            .book(request.start, request.title, request.attendee, zone)
            .await
        {
            Ok(event) => {
                let reply = match request.context {
                    Some(email) => {
                        self.composer
                            .booking_confirmation(email, &event.html_link, request.start, request.title)
                            .await?
                    }
                    None => composer::booked_fallback(request.start, &event.html_link),
                };
                Ok((reply, BookingOutcome::Booked))
            }
            Err(e) => {
                warn!("calendar event creation failed: {}", e);
                Ok((composer::creation_error_apology(), BookingOutcome::Error))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::Completion;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::sync::Mutex;

    struct CannedCompletion;

    #[async_trait]
    impl Completion for CannedCompletion {
        async fn complete(&self, _system: &str, _prompt: &str) -> Result<String> {
            Ok("generated reply".to_string())
        }
    }

    /// Calendar fake with fixed busy intervals; records insertions.
    struct BusyCalendar {
        busy: Vec<(DateTime<Utc>, DateTime<Utc>)>,
        inserted: Mutex<Vec<EventDraft>>,
        fail_insert: bool,
    }

    impl BusyCalendar {
        fn free() -> Self {
            Self::with_busy(vec![])
        }

        fn with_busy(busy: Vec<(DateTime<Utc>, DateTime<Utc>)>) -> Self {
            Self {
                busy,
                inserted: Mutex::new(vec![]),
                fail_insert: false,
            }
        }
    }

    #[async_trait]
    impl CalendarService for BusyCalendar {
        async fn user_timezone(&self) -> Result<String> {
            Ok("UTC".to_string())
        }

        async fn events_between(
            &self,
            start: DateTime<Utc>,
            end: DateTime<Utc>,
        ) -> Result<Vec<BusyEvent>> {
            Ok(self
                .busy
                .iter()
                .filter(|(busy_start, busy_end)| start < *busy_end && *busy_start < end)
                .map(|(busy_start, busy_end)| BusyEvent {
                    start: Some(*busy_start),
                    end: Some(*busy_end),
                    summary: Some("Existing Meeting".to_string()),
                })
                .collect())
        }

        async fn insert_event(&self, draft: &EventDraft) -> Result<EventRecord> {
            if self.fail_insert {
                return Err(crate::error::AssistantError::Calendar(
                    "insert rejected".to_string(),
                ));
            }
            self.inserted.lock().unwrap().push(draft.clone());
            Ok(EventRecord {
                id: "event123".to_string(),
                html_link: "https://calendar.example/event123".to_string(),
            })
        }
    }

    fn scheduler(calendar: Arc<BusyCalendar>) -> Scheduler {
        Scheduler::new(
            calendar,
            ReplyComposer::new(Arc::new(CannedCompletion)),
            60,
            3,
        )
    }

    fn zone() -> UserZone {
        UserZone::new("UTC", chrono_tz::UTC)
    }

    fn at(h: u32, m: u32) -> DateTime<Tz> {
        chrono_tz::UTC.with_ymd_and_hms(2026, 8, 10, h, m, 0).unwrap()
    }

    fn email() -> Email {
        Email {
            id: "m1".to_string(),
            thread_id: "t1".to_string(),
            subject: "Meeting Request".to_string(),
            from: "client@example.com".to_string(),
            body: "Can we meet at 9 AM?".to_string(),
        }
    }

    #[tokio::test]
    async fn test_free_slot_books_exact_interval() {
        let calendar = Arc::new(BusyCalendar::free());
        let scheduler = scheduler(Arc::clone(&calendar));
        let request_email = email();
        let request = MeetingRequest {
            start: at(9, 0),
            title: "Meeting Request",
            attendee: Some("client@example.com"),
            context: Some(&request_email),
        };

        let (reply, outcome) = scheduler.resolve(&request, &zone()).await.unwrap();
        assert_eq!(outcome, BookingOutcome::Booked);
        assert_eq!(reply, "generated reply");

        let inserted = calendar.inserted.lock().unwrap();
        assert_eq!(inserted.len(), 1);
        assert_eq!(inserted[0].start, at(9, 0).with_timezone(&Utc));
        assert_eq!(
            inserted[0].end - inserted[0].start,
            Duration::minutes(60)
        );
        assert_eq!(inserted[0].time_zone, "UTC");
        assert_eq!(inserted[0].attendee.as_deref(), Some("client@example.com"));
    }

    #[tokio::test]
    async fn test_conflict_suggests_and_never_books() {
        let calendar = Arc::new(BusyCalendar::with_busy(vec![(
            at(9, 0).with_timezone(&Utc),
            at(10, 0).with_timezone(&Utc),
        )]));
        let scheduler = scheduler(Arc::clone(&calendar));
        let request_email = email();
        let request = MeetingRequest {
            start: at(9, 0),
            title: "Meeting Request",
            attendee: None,
            context: Some(&request_email),
        };

        let (_, outcome) = scheduler.resolve(&request, &zone()).await.unwrap();
        assert_eq!(outcome, BookingOutcome::Suggested);
        assert!(calendar.inserted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_insert_failure_is_error_outcome() {
        let mut calendar = BusyCalendar::free();
        calendar.fail_insert = true;
        let scheduler = scheduler(Arc::new(calendar));
        let request_email = email();
        let request = MeetingRequest {
            start: at(9, 0),
            title: "Meeting Request",
            attendee: None,
            context: Some(&request_email),
        };

        let (reply, outcome) = scheduler.resolve(&request, &zone()).await.unwrap();
        assert_eq!(outcome, BookingOutcome::Error);
        assert!(reply.contains("trouble creating"));
    }

    #[tokio::test]
    async fn test_slot_search_accepts_requested_time_when_free() {
        // busy block two hours out does not touch [t, t+1h)
        let calendar = Arc::new(BusyCalendar::with_busy(vec![(
            at(11, 0).with_timezone(&Utc),
            at(12, 0).with_timezone(&Utc),
        )]));
        let scheduler = scheduler(calendar);

        let slots = scheduler
            .find_next_available_slots(at(9, 0), chrono_tz::UTC)
            .await
            .unwrap();
        assert_eq!(slots[0], at(9, 0));
    }

    #[tokio::test]
    async fn test_slot_search_jumps_past_busy_block() {
        let calendar = Arc::new(BusyCalendar::with_busy(vec![(
            at(9, 0).with_timezone(&Utc),
            at(10, 0).with_timezone(&Utc),
        )]));
        let scheduler = scheduler(calendar);

        let slots = scheduler
            .find_next_available_slots(at(9, 0), chrono_tz::UTC)
            .await
            .unwrap();
        assert_eq!(slots.len(), 3);
        // first free probe is the busy block's end + 15-minute buffer
        assert_eq!(slots[0], at(10, 15));
        assert!(slots.iter().all(|s| *s >= at(10, 0)));
    }

    #[tokio::test]
    async fn test_slot_search_is_deterministic() {
        let busy = vec![(
            at(9, 30).with_timezone(&Utc),
            at(10, 30).with_timezone(&Utc),
        )];
        let first = scheduler(Arc::new(BusyCalendar::with_busy(busy.clone())))
            .find_next_available_slots(at(9, 0), chrono_tz::UTC)
            .await
            .unwrap();
        let second = scheduler(Arc::new(BusyCalendar::with_busy(busy)))
            .find_next_available_slots(at(9, 0), chrono_tz::UTC)
            .await
            .unwrap();
        assert_eq!(first, second);
    }
}

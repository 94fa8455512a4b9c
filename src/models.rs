use chrono::{DateTime, Duration};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// An unread email pulled from the mailbox.
///
/// Immutable input to the workflow; the body is truncated at ingestion so
/// prompts stay within a sane size.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Email {
    pub id: String,
    pub thread_id: String,
    pub subject: String,
    pub from: String,
    pub body: String,
}

impl Email {
    /// Meeting title derived from the subject, or a generic default when
    /// the email had none.
    pub fn meeting_title(&self) -> &str {
        if self.subject == "No Subject" {
            "Meeting"
        } else {
            &self.subject
        }
    }
}

/// The user's resolved calendar timezone, fetched once per run and shared
/// across every email in the batch.
#[derive(Debug, Clone)]
pub struct UserZone {
    pub name: String,
    pub tz: Tz,
}

impl UserZone {
    pub fn new(name: impl Into<String>, tz: Tz) -> Self {
        Self { name: name.into(), tz }
    }
}

/// Action tag recorded by workflow stages.
///
/// Routing is a pure function of this tag (plus the urgency result); the
/// transition table in `workflow` decides which values are terminal after
/// each stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    /// No stage has claimed the email yet
    Pending,
    /// Sender matched the no-reply heuristic; nothing was sent
    IgnoredNoReply,
    /// Calendar stage sent a reply (booked, suggested or errored) and
    /// labeled the email
    BookingCompleted,
    /// Calendar stage computed a reply but failed to deliver it
    BookingFailed,
    /// Multi-agent calendar stage proposed alternatives instead of booking
    Suggested,
    /// Multi-agent calendar stage hit an event-creation error
    BookingError,
    /// Confirmation stage booked the confirmed slot and replied
    MeetingConfirmed,
    /// Confirmation stage failed to deliver its reply
    ConfirmationFailed,
    /// Triage decided the email is not urgent; it was labeled and dropped
    NotUrgentProcessed,
    /// A draft reply was stored for an urgent email
    DraftCreated,
    /// Draft generation or storage failed
    DraftFailed,
}

impl Action {
    /// Stable string form used in log events.
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Pending => "pending",
            Action::IgnoredNoReply => "ignored_no_reply",
            Action::BookingCompleted => "calendar_booking_completed",
            Action::BookingFailed => "calendar_booking_failed",
            Action::Suggested => "calendar_suggested",
            Action::BookingError => "calendar_error",
            Action::MeetingConfirmed => "meeting_confirmed",
            Action::ConfirmationFailed => "meeting_confirmation_failed",
            Action::NotUrgentProcessed => "not_urgent_processed",
            Action::DraftCreated => "draft_created",
            Action::DraftFailed => "draft_creation_failed",
        }
    }
}

/// How an availability resolution concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingOutcome {
    /// The slot was free and the event was created
    Booked,
    /// The slot conflicted; alternatives were proposed (or apologized for)
    Suggested,
    /// The slot was free but event creation failed remotely
    Error,
}

/// A time interval considered for scheduling a meeting.
#[derive(Debug, Clone)]
pub struct CalendarSlot {
    pub start: DateTime<Tz>,
    pub duration: Duration,
    pub title: Option<String>,
    pub attendee: Option<String>,
}

impl CalendarSlot {
    pub fn new(start: DateTime<Tz>, duration_minutes: i64) -> Self {
        Self {
            start,
            duration: Duration::minutes(duration_minutes),
            title: None,
            attendee: None,
        }
    }

    pub fn end(&self) -> DateTime<Tz> {
        self.start + self.duration
    }
}

/// Remote record of a created calendar event.
#[derive(Debug, Clone)]
pub struct EventRecord {
    pub id: String,
    pub html_link: String,
}

/// Per-run event counters, threaded through every email's context.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Counters {
    pub processed: u32,
    pub booked: u32,
    pub suggested: u32,
    pub drafted: u32,
}

impl Counters {
    /// Bump the counter matching a log event name, if any.
    pub fn bump(&mut self, event: &str) {
        match event {
            "processed" => self.processed += 1,
            "booked" => self.booked += 1,
            "suggested" => self.suggested += 1,
            "drafted" => self.drafted += 1,
            _ => {}
        }
    }
}

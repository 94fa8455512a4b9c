//! Calendar service abstraction and Google Calendar implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use google_calendar3::api::{Event, EventAttendee, EventDateTime};
use tracing::{debug, warn};

use crate::auth::GoogleCalendarHub;
use crate::error::{AssistantError, Result};
use crate::models::{EventRecord, UserZone};

/// An existing event overlapping a queried window
#[derive(Debug, Clone)]
pub struct BusyEvent {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub summary: Option<String>,
}

/// Everything needed to create one event remotely
#[derive(Debug, Clone)]
pub struct EventDraft {
    pub summary: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// IANA zone attached to both endpoints so the provider renders the
    /// intended wall-clock time
    pub time_zone: String,
    pub attendee: Option<String>,
}

/// Trait defining calendar operations for easier testing
#[async_trait]
pub trait CalendarService: Send + Sync {
    /// Read the user's configured calendar timezone (IANA name)
    async fn user_timezone(&self) -> Result<String>;

    /// List events overlapping `[start, end)` on the primary calendar
    async fn events_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<BusyEvent>>;

    /// Insert an event on the primary calendar
    async fn insert_event(&self, draft: &EventDraft) -> Result<EventRecord>;
}

/// Production calendar client backed by the Google Calendar API
pub struct GoogleCalendar {
    hub: GoogleCalendarHub,
}

impl GoogleCalendar {
    pub fn new(hub: GoogleCalendarHub) -> Self {
        Self { hub }
    }
}

#[async_trait]
impl CalendarService for GoogleCalendar {
    async fn user_timezone(&self) -> Result<String> {
        let (_, setting) = self
            .hub
            .settings()
            .get("timezone")
            .doit()
            .await
            .map_err(AssistantError::from_calendar)?;
        setting
            .value
            .ok_or_else(|| AssistantError::Calendar("timezone setting has no value".to_string()))
    }

    async fn events_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<BusyEvent>> {
        let (_, response) = self
            .hub
            .events()
            .list("primary")
            .time_min(start)
            .time_max(end)
            .single_events(true)
            .order_by("startTime")
            .doit()
            .await
            .map_err(AssistantError::from_calendar)?;

        let events = response
            .items
            .unwrap_or_default()
            .into_iter()
            .map(|event| BusyEvent {
                start: event.start.as_ref().and_then(|s| s.date_time),
                end: event.end.as_ref().and_then(|e| e.date_time),
                summary: event.summary,
            })
            .collect();

        Ok(events)
    }

    async fn insert_event(&self, draft: &EventDraft) -> Result<EventRecord> {
        let event = Event {
            summary: Some(draft.summary.clone()),
            start: Some(EventDateTime {
                date_time: Some(draft.start),
                time_zone: Some(draft.time_zone.clone()),
                ..Default::default()
            }),
            end: Some(EventDateTime {
                date_time: Some(draft.end),
                time_zone: Some(draft.time_zone.clone()),
                ..Default::default()
            }),
            attendees: draft.attendee.as_ref().map(|email| {
                vec![EventAttendee {
                    email: Some(email.clone()),
                    ..Default::default()
                }]
            }),
            ..Default::default()
        };

        let (_, created) = self
            .hub
            .events()
            .insert(event, "primary")
            .doit()
            .await
            .map_err(AssistantError::from_calendar)?;

        debug!(event_id = ?created.id, "calendar event created");

        Ok(EventRecord {
            id: created.id.unwrap_or_default(),
            html_link: created.html_link.unwrap_or_default(),
        })
    }
}

/// Resolve the user's timezone, fetching it from the calendar once per run.
///
/// Fallback order:
///   1) Calendar settings 'timezone'
///   2) USER_TZ env var (e.g. 'Australia/Sydney')
///   3) the configured fallback zone
pub async fn resolve_user_timezone(
    calendar: &dyn CalendarService,
    fallback: &str,
) -> Result<UserZone> {
    let mut name = match calendar.user_timezone().await {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("could not read calendar timezone setting: {}", e);
            None
        }
    };

    if name.is_none() {
        name = std::env::var("USER_TZ").ok().filter(|v| !v.is_empty());
    }

    let name = name.unwrap_or_else(|| fallback.to_string());

    match name.parse::<Tz>() {
        Ok(tz) => Ok(UserZone::new(name, tz)),
        Err(_) => {
            warn!(zone = %name, "unrecognized timezone, using fallback");
            let tz = fallback
                .parse::<Tz>()
                .map_err(|_| AssistantError::Timezone(fallback.to_string()))?;
            Ok(UserZone::new(fallback, tz))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedZoneCalendar {
        zone: Option<String>,
    }

    #[async_trait]
    impl CalendarService for FixedZoneCalendar {
        async fn user_timezone(&self) -> Result<String> {
            self.zone
                .clone()
                .ok_or_else(|| AssistantError::Calendar("unavailable".to_string()))
        }

        async fn events_between(
            &self,
            _start: DateTime<Utc>,
            _end: DateTime<Utc>,
        ) -> Result<Vec<BusyEvent>> {
            Ok(vec![])
        }

        async fn insert_event(&self, _draft: &EventDraft) -> Result<EventRecord> {
            Err(AssistantError::Calendar("not supported".to_string()))
        }
    }

    #[tokio::test]
    async fn test_resolve_timezone_from_calendar() {
        let calendar = FixedZoneCalendar {
            zone: Some("Australia/Sydney".to_string()),
        };
        let zone = resolve_user_timezone(&calendar, "Asia/Kathmandu")
            .await
            .unwrap();
        assert_eq!(zone.name, "Australia/Sydney");
        assert_eq!(zone.tz, chrono_tz::Australia::Sydney);
    }

    #[tokio::test]
    async fn test_resolve_timezone_falls_back() {
        std::env::remove_var("USER_TZ");
        let calendar = FixedZoneCalendar { zone: None };
        let zone = resolve_user_timezone(&calendar, "Asia/Kathmandu")
            .await
            .unwrap();
        assert_eq!(zone.name, "Asia/Kathmandu");
    }

    #[tokio::test]
    async fn test_resolve_timezone_rejects_garbage_value() {
        let calendar = FixedZoneCalendar {
            zone: Some("Not/AZone".to_string()),
        };
        let zone = resolve_user_timezone(&calendar, "Asia/Kathmandu")
            .await
            .unwrap();
        assert_eq!(zone.name, "Asia/Kathmandu");
    }
}

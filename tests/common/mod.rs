//! Common test utilities and fixtures

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use inbox_pilot::calendar::{BusyEvent, CalendarService, EventDraft};
use inbox_pilot::completion::Completion;
use inbox_pilot::error::{AssistantError, Result};
use inbox_pilot::mail::MailService;
use inbox_pilot::models::{Email, EventRecord, UserZone};
use inbox_pilot::policy::PolicyRetriever;
use mockall::mock;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Create a test email with default values
pub fn create_test_email(id: &str, from: &str, subject: &str, body: &str) -> Email {
    Email {
        id: id.to_string(),
        thread_id: format!("thread_{}", id),
        subject: subject.to_string(),
        from: from.to_string(),
        body: body.to_string(),
    }
}

/// A meeting-request email with an unambiguous date and time
pub fn meeting_request_email(id: &str) -> Email {
    create_test_email(
        id,
        "client@example.com",
        "Meeting Request",
        "Can we schedule a meeting on August 30th at 2:30 PM?",
    )
}

/// UTC+5:45 user zone used across the scenario tests
pub fn kathmandu_zone() -> UserZone {
    UserZone::new("Asia/Kathmandu", chrono_tz::Asia::Kathmandu)
}

/// Mail fake recording every delivery and label application.
///
/// Deliberately does not suppress no-reply recipients; tests use that to
/// prove the workflow stages short-circuit before reaching the transport.
#[derive(Default)]
pub struct FakeMail {
    pub sent: Mutex<Vec<(String, String)>>,
    pub drafts: Mutex<Vec<(String, String)>>,
    pub labeled: Mutex<Vec<String>>,
    pub fail_send: bool,
    pub fail_draft: bool,
}

impl FakeMail {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_send() -> Self {
        Self {
            fail_send: true,
            ..Self::default()
        }
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn draft_count(&self) -> usize {
        self.drafts.lock().unwrap().len()
    }

    pub fn labeled_ids(&self) -> Vec<String> {
        self.labeled.lock().unwrap().clone()
    }
}

#[async_trait]
impl MailService for FakeMail {
    async fn list_unprocessed(&self) -> Result<Vec<Email>> {
        Ok(vec![])
    }

    async fn mark_processed(&self, email_id: &str) -> Result<()> {
        self.labeled.lock().unwrap().push(email_id.to_string());
        Ok(())
    }

    async fn send_reply(&self, email_id: &str, reply_body: &str) -> Result<()> {
        if self.fail_send {
            return Err(AssistantError::Mail("send rejected".to_string()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((email_id.to_string(), reply_body.to_string()));
        Ok(())
    }

    async fn create_draft(&self, email_id: &str, draft_body: &str) -> Result<()> {
        if self.fail_draft {
            return Err(AssistantError::Mail("draft rejected".to_string()));
        }
        self.drafts
            .lock()
            .unwrap()
            .push((email_id.to_string(), draft_body.to_string()));
        Ok(())
    }
}

/// Calendar fake with fixed busy intervals; records insertions.
pub struct FakeCalendar {
    pub busy: Vec<(DateTime<Utc>, DateTime<Utc>)>,
    pub inserted: Mutex<Vec<EventDraft>>,
    pub fail_insert: bool,
}

impl FakeCalendar {
    pub fn free() -> Self {
        Self::with_busy(vec![])
    }

    pub fn with_busy(busy: Vec<(DateTime<Utc>, DateTime<Utc>)>) -> Self {
        Self {
            busy,
            inserted: Mutex::new(vec![]),
            fail_insert: false,
        }
    }

    pub fn inserted_count(&self) -> usize {
        self.inserted.lock().unwrap().len()
    }
}

#[async_trait]
impl CalendarService for FakeCalendar {
    async fn user_timezone(&self) -> Result<String> {
        Ok("Asia/Kathmandu".to_string())
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
            return Err(AssistantError::Calendar("insert rejected".to_string()));
        }
        self.inserted.lock().unwrap().push(draft.clone());
        Ok(EventRecord {
            id: "event123".to_string(),
            html_link: "https://calendar.example/event123".to_string(),
        })
    }
}

/// Completion fake replaying a script of responses, then a default.
pub struct ScriptedCompletion {
    script: Mutex<VecDeque<String>>,
    default: String,
    pub prompts: Mutex<Vec<(String, String)>>,
}

impl ScriptedCompletion {
    pub fn new(script: Vec<&str>, default: &str) -> Self {
        Self {
            script: Mutex::new(script.into_iter().map(String::from).collect()),
            default: default.to_string(),
            prompts: Mutex::new(vec![]),
        }
    }

    pub fn always(reply: &str) -> Self {
        Self::new(vec![], reply)
    }

    pub fn recorded_prompts(&self) -> Vec<(String, String)> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Completion for ScriptedCompletion {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String> {
        self.prompts
            .lock()
            .unwrap()
            .push((system.to_string(), prompt.to_string()));
        let reply = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.default.clone());
        Ok(reply)
    }
}

/// Policy retriever fake returning fixed snippets.
pub struct FixedPolicy {
    pub snippets: Vec<String>,
}

impl FixedPolicy {
    pub fn empty() -> Self {
        Self { snippets: vec![] }
    }

    pub fn with(snippets: Vec<&str>) -> Self {
        Self {
            snippets: snippets.into_iter().map(String::from).collect(),
        }
    }
}

#[async_trait]
impl PolicyRetriever for FixedPolicy {
    async fn retrieve(&self, _query: &str) -> Result<Vec<String>> {
        Ok(self.snippets.clone())
    }
}

// Mock implementation of MailService for expectation-based tests
mock! {
    pub Mail {}

    #[async_trait]
    impl MailService for Mail {
        async fn list_unprocessed(&self) -> Result<Vec<Email>>;
        async fn mark_processed(&self, email_id: &str) -> Result<()>;
        async fn send_reply(&self, email_id: &str, reply_body: &str) -> Result<()>;
        async fn create_draft(&self, email_id: &str, draft_body: &str) -> Result<()>;
    }
}

//! Mail service abstraction and Gmail implementation
//!
//! The production client reads unread mail, labels handled messages, and
//! delivers replies and drafts. Replies to no-reply style senders are
//! suppressed here as well as in the workflow stages, so a routing mistake
//! can never mail an automated sender.

use async_trait::async_trait;
use google_gmail1::api::{Draft, Label, Message, ModifyMessageRequest};
use std::io::Cursor;
use tracing::{debug, warn};

use crate::auth::GmailHub;
use crate::error::{AssistantError, Result};
use crate::models::Email;

/// Local-part fragments that identify automated senders
const NO_REPLY_PATTERNS: &[&str] = &[
    "no-reply",
    "noreply",
    "no_reply",
    "do-not-reply",
    "donotreply",
    "do_not_reply",
];

/// Extract the addr-spec from a "Name <email@example.com>" style header.
///
/// Returns the bare address for headers without angle brackets.
pub fn parse_mailbox(header: &str) -> Option<String> {
    let header = header.trim();
    if header.is_empty() {
        return None;
    }
    match header.find('<') {
        Some(start) => {
            let end = header.rfind('>')?;
            if start >= end {
                return None;
            }
            let addr = header[start + 1..end].trim();
            (!addr.is_empty()).then(|| addr.to_string())
        }
        None => Some(header.to_string()),
    }
}

/// Return true if the sender appears to be a no-reply style address.
pub fn is_no_reply(from_header: &str) -> bool {
    let Some(addr) = parse_mailbox(from_header) else {
        return false;
    };
    let local = addr.split('@').next().unwrap_or("").to_lowercase();
    NO_REPLY_PATTERNS.iter().any(|p| local.contains(p))
}

/// Trait defining mail operations for easier testing
#[async_trait]
pub trait MailService: Send + Sync {
    /// List unread inbox emails not yet carrying the processed label
    async fn list_unprocessed(&self) -> Result<Vec<Email>>;

    /// Apply the processed label to a message, creating the label on first use
    async fn mark_processed(&self, email_id: &str) -> Result<()>;

    /// Send a reply on the message's thread; silently skipped for no-reply
    /// recipients
    async fn send_reply(&self, email_id: &str, reply_body: &str) -> Result<()>;

    /// Store a draft reply on the message's thread; never auto-sent
    async fn create_draft(&self, email_id: &str, draft_body: &str) -> Result<()>;
}

/// Production Gmail mail service
pub struct GmailMailer {
    hub: GmailHub,
    processed_label: String,
    max_results: Option<u32>,
    body_limit: usize,
}

impl GmailMailer {
    pub fn new(
        hub: GmailHub,
        processed_label: impl Into<String>,
        max_results: Option<u32>,
        body_limit: usize,
    ) -> Self {
        Self {
            hub,
            processed_label: processed_label.into(),
            max_results,
            body_limit,
        }
    }

    /// Fetch the reply target (recipient + subject + thread) for a message.
    async fn reply_target(&self, email_id: &str) -> Result<(String, String, String)> {
        let (_, message) = self
            .hub
            .users()
            .messages_get("me", email_id)
            .format("metadata")
            .add_metadata_headers("From")
            .add_metadata_headers("Subject")
            .doit()
            .await?;

        let thread_id = message
            .thread_id
            .clone()
            .ok_or_else(|| AssistantError::InvalidMessage("missing thread id".to_string()))?;

        let mut subject = String::new();
        let mut from = String::new();
        if let Some(headers) = message.payload.as_ref().and_then(|p| p.headers.as_ref()) {
            for header in headers {
                match (header.name.as_deref(), header.value.as_deref()) {
                    (Some("Subject"), Some(value)) => subject = value.to_string(),
                    (Some("From"), Some(value)) => from = value.to_string(),
                    _ => {}
                }
            }
        }

        Ok((from, subject, thread_id))
    }

    /// Look up the processed label's id, if it exists.
    async fn processed_label_id(&self) -> Result<Option<String>> {
        let (_, response) = self.hub.users().labels_list("me").doit().await?;
        let id = response.labels.unwrap_or_default().into_iter().find_map(|label| {
            (label.name.as_deref() == Some(self.processed_label.as_str()))
                .then_some(label.id)
                .flatten()
        });
        Ok(id)
    }
}

/// Compose an RFC 2822 reply body for upload.
fn reply_mime(recipient: &str, subject: &str, body: &str) -> String {
    format!(
        "To: {}\r\nSubject: Re: {}\r\nContent-Type: text/plain; charset=\"UTF-8\"\r\n\r\n{}",
        recipient, subject, body
    )
}

/// Pull the plain-text body out of a message payload.
///
/// Prefers the top-level body; otherwise takes the first text/plain part.
fn extract_body(message: &Message) -> String {
    let Some(payload) = message.payload.as_ref() else {
        return String::new();
    };

    if let Some(data) = payload.body.as_ref().and_then(|b| b.data.as_ref()) {
        if !data.is_empty() {
            return String::from_utf8_lossy(data).into_owned();
        }
    }

    if let Some(parts) = payload.parts.as_ref() {
        for part in parts {
            if part.mime_type.as_deref() == Some("text/plain") {
                if let Some(data) = part.body.as_ref().and_then(|b| b.data.as_ref()) {
                    return String::from_utf8_lossy(data).into_owned();
                }
            }
        }
    }

    String::new()
}

/// Truncate on a char boundary so prompts stay bounded.
fn truncate_body(body: String, limit: usize) -> String {
    if body.chars().count() <= limit {
        body
    } else {
        body.chars().take(limit).collect()
    }
}

#[async_trait]
impl MailService for GmailMailer {
    async fn list_unprocessed(&self) -> Result<Vec<Email>> {
        let query = format!("-label:{}", self.processed_label);
        let mut call = self
            .hub
            .users()
            .messages_list("me")
            .add_label_ids("INBOX")
            .add_label_ids("UNREAD")
            .q(&query);
        if let Some(max) = self.max_results {
            call = call.max_results(max);
        }
        let (_, response) = call.doit().await?;

        let refs = response.messages.unwrap_or_default();
        let mut emails = Vec::with_capacity(refs.len());

        for msg_ref in refs {
            let Some(id) = msg_ref.id else { continue };

            let (_, message) = self
                .hub
                .users()
                .messages_get("me", &id)
                .format("full")
                .doit()
                .await?;

            let thread_id = message.thread_id.clone().unwrap_or_else(|| id.clone());

            let mut subject = "No Subject".to_string();
            let mut from = String::new();
            if let Some(headers) = message.payload.as_ref().and_then(|p| p.headers.as_ref()) {
                for header in headers {
                    match (header.name.as_deref(), header.value.as_deref()) {
                        (Some("Subject"), Some(value)) => subject = value.to_string(),
                        (Some("From"), Some(value)) => from = value.to_string(),
                        _ => {}
                    }
                }
            }

            let body = truncate_body(extract_body(&message), self.body_limit);

            emails.push(Email {
                id,
                thread_id,
                subject,
                from,
                body,
            });
        }

        debug!(count = emails.len(), "fetched unprocessed emails");
        Ok(emails)
    }

    async fn mark_processed(&self, email_id: &str) -> Result<()> {
        // Create the hidden label on first use; an "already exists" failure
        // is expected on every later call
        let label = Label {
            name: Some(self.processed_label.clone()),
            label_list_visibility: Some("labelHide".to_string()),
            message_list_visibility: Some("hide".to_string()),
            ..Default::default()
        };
        if let Err(e) = self.hub.users().labels_create(label, "me").doit().await {
            debug!("labels_create skipped: {}", e);
        }

        let label_id = self.processed_label_id().await?.ok_or_else(|| {
            AssistantError::Mail(format!("label '{}' not found", self.processed_label))
        })?;

        let request = ModifyMessageRequest {
            add_label_ids: Some(vec![label_id]),
            remove_label_ids: None,
        };
        self.hub
            .users()
            .messages_modify(request, "me", email_id)
            .doit()
            .await?;
        Ok(())
    }

    async fn send_reply(&self, email_id: &str, reply_body: &str) -> Result<()> {
        let (from, subject, thread_id) = self.reply_target(email_id).await?;

        let Some(recipient) = parse_mailbox(&from) else {
            return Err(AssistantError::InvalidMessage(format!(
                "unparseable From header: {}",
                from
            )));
        };
        // Fail-safe: never reply to no-reply style addresses
        if is_no_reply(&recipient) {
            warn!(recipient = %recipient, "skipping reply to no-reply address");
            return Ok(());
        }

        let raw = reply_mime(&recipient, &subject, reply_body);
        let message = Message {
            thread_id: Some(thread_id),
            ..Default::default()
        };
        self.hub
            .users()
            .messages_send(message, "me")
            .upload(
                Cursor::new(raw.into_bytes()),
                "message/rfc822".parse().unwrap(),
            )
            .await?;
        Ok(())
    }

    async fn create_draft(&self, email_id: &str, draft_body: &str) -> Result<()> {
        let (from, subject, thread_id) = self.reply_target(email_id).await?;

        let Some(recipient) = parse_mailbox(&from) else {
            return Err(AssistantError::InvalidMessage(format!(
                "unparseable From header: {}",
                from
            )));
        };
        // Fail-safe: never reply to no-reply style addresses
        if is_no_reply(&recipient) {
            warn!(recipient = %recipient, "skipping draft for no-reply address");
            return Ok(());
        }

        let raw = reply_mime(&recipient, &subject, draft_body);
        let draft = Draft {
            message: Some(Message {
                thread_id: Some(thread_id),
                ..Default::default()
            }),
            ..Default::default()
        };
        self.hub
            .users()
            .drafts_create(draft, "me")
            .upload(
                Cursor::new(raw.into_bytes()),
                "message/rfc822".parse().unwrap(),
            )
            .await?;
        Ok(())
    }
}

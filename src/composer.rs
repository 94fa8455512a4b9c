//! Reply composition: model prompts and templated fallbacks
//!
//! Model-generated replies get structured facts plus fixed authorial
//! guidelines; the completion output is trimmed and used as-is. The
//! templated variants cover paths where generation has nothing useful to
//! add (canned apologies, confirmation acknowledgements).

use chrono::DateTime;
use chrono_tz::Tz;
use std::sync::Arc;

use crate::completion::Completion;
use crate::error::Result;
use crate::models::Email;

const COORDINATOR_ROLE: &str =
    "You are a calendar & meeting coordinator expert at scheduling and confirming meetings (body only).";

const COMMUNICATIONS_ROLE: &str =
    "You are an executive communications specialist who crafts executive-level communications (body only)";

const ANALYST_ROLE: &str = "You are a senior email analyst expert at triaging urgent matters.";

const TRIAGE_ROLE: &str =
    "You are an assistant that classifies email urgency as 'urgent' or 'not urgent' succinctly.";

/// Human-facing timestamp form used in every reply and notification.
pub fn format_long(dt: DateTime<Tz>) -> String {
    dt.format("%B %d, %Y at %I:%M %p").to_string()
}

/// Prompt-backed reply generator.
pub struct ReplyComposer {
    completion: Arc<dyn Completion>,
}

impl ReplyComposer {
    pub fn new(completion: Arc<dyn Completion>) -> Self {
        Self { completion }
    }

    /// Confirmation email for a freshly booked meeting.
    pub async fn booking_confirmation(
        &self,
        email: &Email,
        event_link: &str,
        start: DateTime<Tz>,
        title: &str,
    ) -> Result<String> {
        let prompt = format!(
            "Write a professional calendar confirmation email based on this meeting request:\n\
             \n\
             ORIGINAL EMAIL:\n\
             FROM: {}\n\
             SUBJECT: {}\n\
             CONTENT: {}\n\
             \n\
             MEETING DETAILS:\n\
             Title: {}\n\
             Date & Time: {}\n\
             Calendar Link: {}\n\
             \n\
             Guidelines:\n\
             - Confirm the meeting is scheduled\n\
             - Reference the original request context\n\
             - Include all meeting details\n\
             - Provide the calendar link\n\
             - Keep professional and friendly tone\n\
             - Keep under 4 sentences",
            email.from,
            email.subject,
            email.body,
            title,
            format_long(start),
            event_link,
        );

        let reply = self.completion.complete(COORDINATOR_ROLE, &prompt).await?;
        Ok(reply.trim().to_string())
    }

    /// Proposal email listing alternative slots for a busy request.
    pub async fn alternative_times(
        &self,
        email: &Email,
        requested: DateTime<Tz>,
        alternatives: &[DateTime<Tz>],
        title: &str,
    ) -> Result<String> {
        let alternatives_text = alternatives
            .iter()
            .map(|slot| format!("- {}", format_long(*slot)))
            .collect::<Vec<_>>()
            .join("\n");

        let prompt = format!(
            "Write a professional email suggesting alternative meeting times:\n\
             \n\
             ORIGINAL EMAIL:\n\
             FROM: {}\n\
             SUBJECT: {}\n\
             CONTENT: {}\n\
             \n\
             SITUATION:\n\
             Requested time: {} is not available\n\
             Meeting title: {}\n\
             \n\
             ALTERNATIVE TIME OPTIONS:\n\
             {}\n\
             \n\
             Guidelines:\n\
             - Apologize that requested time is not available\n\
             - Reference the original request context\n\
             - Suggest the alternative times clearly\n\
             - Ask them to confirm preferred time\n\
             - Keep professional and helpful tone\n\
             - Keep under 5 sentences",
            email.from,
            email.subject,
            email.body,
            format_long(requested),
            title,
            alternatives_text,
        );

        let reply = self.completion.complete(COORDINATOR_ROLE, &prompt).await?;
        Ok(reply.trim().to_string())
    }

    /// Single-word urgency classification ("urgent" / "not urgent").
    pub async fn urgency_analysis(&self, email: &Email) -> Result<String> {
        let prompt = format!(
            "Analyze this email for urgency:\n\
             \n\
             FROM: {}\n\
             SUBJECT: {}\n\
             CONTENT:\n\
             {}\n\
             \n\
             Respond with exactly one word: either 'urgent' or 'not urgent'.",
            email.from, email.subject, email.body,
        );

        let response = self.completion.complete(ANALYST_ROLE, &prompt).await?;
        Ok(response.trim().to_lowercase())
    }

    /// Urgency classification with the terser multi-agent wording.
    pub async fn triage_classification(&self, email: &Email) -> Result<String> {
        let prompt = format!(
            "Email subject: {}\n\nEmail body:\n{}\n\nReply with exactly 'urgent' or 'not urgent'.",
            email.subject, email.body,
        );

        let response = self.completion.complete(TRIAGE_ROLE, &prompt).await?;
        Ok(response.trim().to_lowercase())
    }

    /// Draft reply for an urgent email; with policy snippets the prompt
    /// switches to the policy-compliant variant.
    pub async fn urgent_draft(
        &self,
        email: &Email,
        policies: Option<&[String]>,
    ) -> Result<String> {
        let prompt = match policies {
            None => format!(
                "Write a professional draft response for this urgent email:\n\
                 \n\
                 Original email content:\n\
                 {}\n\
                 \n\
                 Guidelines:\n\
                 - Acknowledge receipt and show empathy\n\
                 - Keep response under 3 sentences\n\
                 - Offer immediate next steps if needed\n\
                 - Maintain professional tone",
                email.body,
            ),
            Some(snippets) => {
                let policy_context = if snippets.is_empty() {
                    "(No policy context retrieved; follow brevity, professional tone, no sensitive info.)"
                        .to_string()
                } else {
                    snippets.join("\n\n")
                };
                format!(
                    "Write a professional, policy-compliant draft response for this urgent email.\n\
                     \n\
                     POLICY CONTEXT (follow strictly):\n\
                     {}\n\
                     \n\
                     ORIGINAL EMAIL CONTENT:\n\
                     {}\n\
                     \n\
                     Guidelines:\n\
                     - Acknowledge receipt and show empathy\n\
                     - Keep response under 3 sentences\n\
                     - Offer immediate next steps if needed\n\
                     - Maintain professional tone\n\
                     - Do not include sensitive information or commitments you cannot verify\n\
                     - If scheduling is referenced, propose clear next steps without overcommitting",
                    policy_context, email.body,
                )
            }
        };

        let draft = self.completion.complete(COMMUNICATIONS_ROLE, &prompt).await?;
        Ok(draft.trim().to_string())
    }
}

/// Templated confirmation for a booked slot when no generation context
/// exists.
pub fn booked_fallback(start: DateTime<Tz>, event_link: &str) -> String {
    format!(
        "Perfect! I've booked that time in my calendar. Meeting scheduled for {}. Calendar link: {}",
        format_long(start),
        event_link,
    )
}

/// Apology when the requested slot is busy and the week-long search found
/// nothing.
pub fn no_alternatives_apology() -> String {
    "That time seems to be booked in my calendar. I couldn't find alternative slots in the \
     next week, but I will get back to you with other options asap."
        .to_string()
}

/// Apology when the requested slot is busy and no request context exists
/// to build alternatives from.
pub fn busy_fallback() -> String {
    "That time seems to be booked in my calendar, but I will get back to you with \
     confirmation asap."
        .to_string()
}

/// Apology when the slot was free but event creation failed remotely.
pub fn creation_error_apology() -> String {
    "That time is available, but I had trouble creating the calendar event. I'll get back \
     to you with confirmation asap."
        .to_string()
}

/// Acknowledgement for a confirmed meeting, with or without an event link.
pub fn confirmation_ack(confirmed: DateTime<Tz>, event_link: Option<&str>) -> String {
    match event_link {
        Some(link) => format!(
            "Thank you for confirming! I've scheduled our meeting for {}. Calendar invite sent. Link: {}",
            format_long(confirmed),
            link,
        ),
        None => "Thank you for confirming. I'll send you a calendar invite shortly.".to_string(),
    }
}

//! Inbox Pilot
//!
//! An email assistant that triages unread mail, detects meeting-time
//! references, books or negotiates calendar slots, classifies urgency,
//! and drafts replies, one email at a time through a forward-only
//! workflow over abstract mail, calendar, and text-completion services.
//!
//! # Overview
//!
//! - **Authentication**: one OAuth2 grant shared by Gmail and Calendar,
//!   with token caching
//! - **Temporal extraction**: fuzzy date/time parsing with timezone
//!   abbreviation handling
//! - **Slot negotiation**: conflict detection and forward slot search
//!   with booked/suggested/error outcomes
//! - **Triage and drafting**: model-backed urgency classification and
//!   reply/draft generation
//! - **Workflow**: an explicit state machine routing each email to a
//!   terminal action
//!
//! # Example Usage
//!
//! ```no_run
//! use inbox_pilot::{auth, calendar::GoogleCalendar, config::Config, mail::GmailMailer};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml".as_ref()).await?;
//!
//!     let (gmail_hub, calendar_hub) = auth::initialize_hubs(
//!         "credentials.json".as_ref(),
//!         "token.json".as_ref(),
//!     )
//!     .await?;
//!
//!     let mail = GmailMailer::new(
//!         gmail_hub,
//!         config.mail.processed_label.clone(),
//!         config.mail.max_results,
//!         config.mail.body_limit,
//!     );
//!     let calendar = GoogleCalendar::new(calendar_hub);
//!
//!     // Wire mail + calendar + a completion client into a Workflow
//!     // ...
//!
//!     Ok(())
//! }
//! ```
//!
//! # Module Organization
//!
//! - [`auth`] - OAuth2 authentication and API hub construction
//! - [`availability`] - Conflict checking, booking, and slot search
//! - [`calendar`] - Calendar service trait and Google implementation
//! - [`cli`] - Command-line interface and batch orchestration
//! - [`completion`] - Text-completion trait and OpenAI implementation
//! - [`composer`] - Reply prompts and templated fallbacks
//! - [`config`] - Configuration management
//! - [`confirmation`] - Confirmation detection and confirmed-time resolution
//! - [`error`] - Error types and result alias
//! - [`extractor`] - Temporal extraction from free text
//! - [`mail`] - Mail service trait and Gmail implementation
//! - [`models`] - Core data structures
//! - [`notify`] - Outbound webhook notifications
//! - [`policy`] - Policy-context retrieval for drafting
//! - [`workflow`] - The per-email state machine

pub mod auth;
pub mod availability;
pub mod calendar;
pub mod cli;
pub mod completion;
pub mod composer;
pub mod config;
pub mod confirmation;
pub mod error;
pub mod extractor;
pub mod mail;
pub mod models;
pub mod notify;
pub mod policy;
pub mod workflow;

// Re-export commonly used types for convenience
pub use error::{AssistantError, Result};

// Core data models
pub use models::{Action, BookingOutcome, CalendarSlot, Counters, Email, EventRecord, UserZone};

// Service traits
pub use calendar::CalendarService;
pub use completion::Completion;
pub use mail::MailService;
pub use policy::PolicyRetriever;

// Decision components
pub use availability::{MeetingRequest, Scheduler};
pub use composer::ReplyComposer;
pub use confirmation::{extract_suggested_times, is_confirmation_reply, resolve_confirmed_time};
pub use extractor::{extract_datetime, extract_datetime_at};

// Workflow types
pub use workflow::{
    next_agent_state, next_state, AgentState, MultiAgentWorkflow, ProcessingContext, State,
    Workflow,
};

// Config types
pub use config::{Config, MailConfig, MeetingConfig, ModelConfig, NotifyConfig, PolicyConfig};

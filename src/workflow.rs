//! Workflow state machine over a single email
//!
//! Four stages in fixed topological order: datetime detection, meeting
//! confirmation, urgency analysis, draft creation. Routing after each
//! stage is a pure function of the recorded action tag (and the urgency
//! result), so the pipeline only ever moves forward and a terminal action
//! can never be overwritten by a later stage.
//!
//! Two pipelines share the stage logic: the single-agent [`Workflow`]
//! drives every completion through one model, while the
//! [`MultiAgentWorkflow`] reorders the stages (calendar first), gives each
//! stage its own model, and grounds urgent drafts in retrieved policy
//! context.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::availability::{MeetingRequest, Scheduler};
use crate::calendar::CalendarService;
use crate::completion::Completion;
use crate::composer::{self, ReplyComposer};
use crate::confirmation::{is_confirmation_reply, resolve_confirmed_time};
use crate::error::Result;
use crate::extractor::extract_datetime;
use crate::mail::{is_no_reply, parse_mailbox, MailService};
use crate::models::{Action, BookingOutcome, Counters, Email, UserZone};
use crate::notify::Notifier;
use crate::policy::PolicyRetriever;

/// Single-agent pipeline states, in topological order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    DatetimeDetection,
    MeetingConfirmation,
    UrgencyAnalysis,
    DraftCreation,
    End,
}

/// Per-email mutable context threaded through the stages.
///
/// Every nullable field is explicit: a component reading a field it did
/// not populate treats `None` as a first-class answer.
#[derive(Debug)]
pub struct ProcessingContext {
    pub email: Email,
    pub zone: UserZone,
    pub datetime_detected: Option<DateTime<Tz>>,
    pub action: Action,
    pub urgency: Option<String>,
    pub reply: Option<String>,
    pub draft: Option<String>,
    pub log_seq: u32,
    pub counters: Counters,
}

impl ProcessingContext {
    pub fn new(email: Email, zone: UserZone, counters: Counters) -> Self {
        Self {
            email,
            zone,
            datetime_detected: None,
            action: Action::Pending,
            urgency: None,
            reply: None,
            draft: None,
            log_seq: 0,
            counters,
        }
    }

    /// Emit a structured workflow event, bumping the log sequence and any
    /// matching run counter.
    fn record(&mut self, node: &'static str, event: &str) {
        self.log_seq += 1;
        self.counters.bump(event);
        info!(
            node,
            event,
            msg_id = %format!("{}-{}", node, self.log_seq),
            email_id = %self.email.id,
            processed = self.counters.processed,
            booked = self.counters.booked,
            suggested = self.counters.suggested,
            drafted = self.counters.drafted,
            "workflow event"
        );
    }

    pub fn is_urgent(&self) -> bool {
        self.urgency
            .as_deref()
            .map_or(false, |u| u.starts_with("urgent"))
    }
}

/// Transition table for the single-agent pipeline.
///
/// A booking delivery failure is deliberately not terminal after the
/// first stage; the email still gets a confirmation/triage pass.
pub fn next_state(state: State, ctx: &ProcessingContext) -> State {
    match state {
        State::DatetimeDetection => match ctx.action {
            Action::BookingCompleted | Action::IgnoredNoReply | Action::NotUrgentProcessed => {
                State::End
            }
            _ => State::MeetingConfirmation,
        },
        State::MeetingConfirmation => match ctx.action {
            Action::MeetingConfirmed | Action::IgnoredNoReply | Action::NotUrgentProcessed => {
                State::End
            }
            _ => State::UrgencyAnalysis,
        },
        State::UrgencyAnalysis => {
            if ctx.is_urgent() {
                State::DraftCreation
            } else {
                State::End
            }
        }
        State::DraftCreation | State::End => State::End,
    }
}

/// Single-agent pipeline: one completion model across all stages.
pub struct Workflow {
    mail: Arc<dyn MailService>,
    scheduler: Scheduler,
    composer: ReplyComposer,
    notifier: Notifier,
}

impl Workflow {
    pub fn new(
        mail: Arc<dyn MailService>,
        calendar: Arc<dyn CalendarService>,
        completion: Arc<dyn Completion>,
        notifier: Notifier,
        duration_minutes: i64,
        num_suggestions: usize,
    ) -> Self {
        let scheduler = Scheduler::new(
            calendar,
            ReplyComposer::new(Arc::clone(&completion)),
            duration_minutes,
            num_suggestions,
        );
        Self {
            mail,
            scheduler,
            composer: ReplyComposer::new(completion),
            notifier,
        }
    }

    /// Run the state machine to completion for one email.
    pub async fn process(
        &self,
        email: Email,
        zone: &UserZone,
        counters: Counters,
    ) -> Result<ProcessingContext> {
        let mut ctx = ProcessingContext::new(email, zone.clone(), counters);
        let mut state = State::DatetimeDetection;

        while state != State::End {
            match state {
                State::DatetimeDetection => self.detect_datetime(&mut ctx).await?,
                State::MeetingConfirmation => self.confirm_meeting(&mut ctx).await?,
                State::UrgencyAnalysis => self.analyze_urgency(&mut ctx).await?,
                State::DraftCreation => self.create_draft(&mut ctx).await?,
                State::End => {}
            }
            state = next_state(state, &ctx);
        }

        Ok(ctx)
    }

    async fn detect_datetime(&self, ctx: &mut ProcessingContext) -> Result<()> {
        const NODE: &str = "datetime_detection";

        if is_no_reply(&ctx.email.from) {
            ignore_no_reply(self.mail.as_ref(), ctx, NODE).await;
            return Ok(());
        }

        let Some(detected) = extract_datetime(&ctx.email.body, ctx.zone.tz) else {
            return Ok(());
        };
        ctx.datetime_detected = Some(detected);
        ctx.record(NODE, "datetime_detected");

        let attendee = parse_mailbox(&ctx.email.from);
        let title = ctx.email.meeting_title().to_string();

        let (reply, outcome) = {
            let request = MeetingRequest {
                start: detected,
                title: &title,
                attendee: attendee.as_deref(),
                context: Some(&ctx.email),
            };
            self.scheduler.resolve(&request, &ctx.zone).await?
        };

        match self.mail.send_reply(&ctx.email.id, &reply).await {
            Ok(()) => {
                match outcome {
                    BookingOutcome::Booked => {
                        ctx.record(NODE, "booked");
                        self.notifier
                            .post(&format!(
                                "Booked: {} on {} for {}.",
                                title,
                                composer::format_long(detected),
                                ctx.email.from
                            ))
                            .await;
                    }
                    BookingOutcome::Suggested => ctx.record(NODE, "suggested"),
                    BookingOutcome::Error => ctx.record(NODE, "error"),
                }
                mark_processed_best_effort(self.mail.as_ref(), ctx, NODE).await;
                ctx.record(NODE, "processed");
                ctx.action = Action::BookingCompleted;
                ctx.reply = Some(reply);
            }
            Err(e) => {
                error!(node = NODE, email_id = %ctx.email.id, "failed to deliver reply: {}", e);
                ctx.action = Action::BookingFailed;
            }
        }

        Ok(())
    }

    async fn confirm_meeting(&self, ctx: &mut ProcessingContext) -> Result<()> {
        const NODE: &str = "meeting_confirmation";

        if is_no_reply(&ctx.email.from) {
            ignore_no_reply(self.mail.as_ref(), ctx, NODE).await;
            return Ok(());
        }

        if !is_confirmation_reply(&ctx.email.body) {
            return Ok(());
        }
        ctx.record(NODE, "confirmation_detected");

        let now = Utc::now().with_timezone(&ctx.zone.tz);
        let Some(confirmed) = resolve_confirmed_time(&ctx.email.body, ctx.zone.tz, now) else {
            return Ok(());
        };

        let attendee = parse_mailbox(&ctx.email.from);
        let title = ctx.email.meeting_title().to_string();

        // A confirmed time is booked directly; the negotiation already
        // happened earlier in the thread
        let created = self
            .scheduler
            .book(confirmed, &title, attendee.as_deref(), &ctx.zone)
            .await;
        let reply = match &created {
            Ok(event) => composer::confirmation_ack(confirmed, Some(event.html_link.as_str())),
            Err(e) => {
                warn!(node = NODE, "event creation failed: {}", e);
                composer::confirmation_ack(confirmed, None)
            }
        };

        match self.mail.send_reply(&ctx.email.id, &reply).await {
            Ok(()) => {
                if created.is_ok() {
                    ctx.record(NODE, "booked");
                } else {
                    ctx.record(NODE, "error");
                }
                mark_processed_best_effort(self.mail.as_ref(), ctx, NODE).await;
                ctx.record(NODE, "processed");
                ctx.action = Action::MeetingConfirmed;
                ctx.reply = Some(reply);
                self.notifier
                    .post(&format!(
                        "Confirmed: {} on {} for {}.",
                        title,
                        composer::format_long(confirmed),
                        ctx.email.from
                    ))
                    .await;
            }
            Err(e) => {
                error!(node = NODE, email_id = %ctx.email.id, "failed to deliver reply: {}", e);
                ctx.action = Action::ConfirmationFailed;
            }
        }

        Ok(())
    }

    async fn analyze_urgency(&self, ctx: &mut ProcessingContext) -> Result<()> {
        const NODE: &str = "urgency_analysis";

        // No-reply senders are not urgent by definition
        if is_no_reply(&ctx.email.from) {
            ctx.urgency = Some("not urgent".to_string());
            mark_processed_best_effort(self.mail.as_ref(), ctx, NODE).await;
            ctx.action = Action::NotUrgentProcessed;
            return Ok(());
        }

        let urgency = self.composer.urgency_analysis(&ctx.email).await?;
        ctx.urgency = Some(urgency.clone());

        if !urgency.starts_with("urgent") {
            mark_processed_best_effort(self.mail.as_ref(), ctx, NODE).await;
            ctx.record(NODE, "processed");
            ctx.action = Action::NotUrgentProcessed;
        }

        Ok(())
    }

    async fn create_draft(&self, ctx: &mut ProcessingContext) -> Result<()> {
        const NODE: &str = "draft_creation";

        if !ctx.is_urgent() {
            // routing only enters this stage for urgent email; anything
            // else is labeled and dropped
            ctx.record(NODE, "skipped");
            mark_processed_best_effort(self.mail.as_ref(), ctx, NODE).await;
            ctx.action = Action::NotUrgentProcessed;
            return Ok(());
        }
        ctx.record(NODE, "urgent_detected");

        let draft = self.composer.urgent_draft(&ctx.email, None).await?;

        match self.mail.create_draft(&ctx.email.id, &draft).await {
            Ok(()) => {
                ctx.record(NODE, "drafted");
                mark_processed_best_effort(self.mail.as_ref(), ctx, NODE).await;
                ctx.record(NODE, "processed");
                ctx.action = Action::DraftCreated;
                self.notifier
                    .post(&format!(
                        "Draft created for: {} from {}.",
                        ctx.email.subject, ctx.email.from
                    ))
                    .await;
                ctx.draft = Some(draft);
            }
            Err(e) => {
                error!(node = NODE, email_id = %ctx.email.id, "draft creation failed: {}", e);
                ctx.action = Action::DraftFailed;
            }
        }

        Ok(())
    }
}

/// Multi-agent pipeline states: calendar booking is tried before
/// confirmation handling, then triage, then drafting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    CalendarAgent,
    ConfirmationAgent,
    TriageAgent,
    DraftAgent,
    End,
}

/// Transition table for the multi-agent pipeline. Suggested and errored
/// calendar outcomes still fall through to the confirmation agent.
pub fn next_agent_state(state: AgentState, ctx: &ProcessingContext) -> AgentState {
    match state {
        AgentState::CalendarAgent => match ctx.action {
            Action::BookingCompleted | Action::IgnoredNoReply | Action::NotUrgentProcessed => {
                AgentState::End
            }
            _ => AgentState::ConfirmationAgent,
        },
        AgentState::ConfirmationAgent => match ctx.action {
            Action::MeetingConfirmed | Action::IgnoredNoReply | Action::NotUrgentProcessed => {
                AgentState::End
            }
            _ => AgentState::TriageAgent,
        },
        AgentState::TriageAgent => {
            if ctx.is_urgent() {
                AgentState::DraftAgent
            } else {
                AgentState::End
            }
        }
        AgentState::DraftAgent | AgentState::End => AgentState::End,
    }
}

/// Multi-agent pipeline with independently configured models per stage
/// and policy-grounded drafting.
pub struct MultiAgentWorkflow {
    mail: Arc<dyn MailService>,
    scheduler: Scheduler,
    triage: ReplyComposer,
    drafter: ReplyComposer,
    policy: Arc<dyn PolicyRetriever>,
    notifier: Notifier,
}

impl MultiAgentWorkflow {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        mail: Arc<dyn MailService>,
        calendar: Arc<dyn CalendarService>,
        calendar_completion: Arc<dyn Completion>,
        triage_completion: Arc<dyn Completion>,
        draft_completion: Arc<dyn Completion>,
        policy: Arc<dyn PolicyRetriever>,
        notifier: Notifier,
        duration_minutes: i64,
        num_suggestions: usize,
    ) -> Self {
        let scheduler = Scheduler::new(
            calendar,
            ReplyComposer::new(calendar_completion),
            duration_minutes,
            num_suggestions,
        );
        Self {
            mail,
            scheduler,
            triage: ReplyComposer::new(triage_completion),
            drafter: ReplyComposer::new(draft_completion),
            policy,
            notifier,
        }
    }

    /// Run the agent pipeline to completion for one email.
    pub async fn process(
        &self,
        email: Email,
        zone: &UserZone,
        counters: Counters,
    ) -> Result<ProcessingContext> {
        let mut ctx = ProcessingContext::new(email, zone.clone(), counters);
        let mut state = AgentState::CalendarAgent;

        while state != AgentState::End {
            match state {
                AgentState::CalendarAgent => self.calendar_agent(&mut ctx).await?,
                AgentState::ConfirmationAgent => self.confirmation_agent(&mut ctx).await?,
                AgentState::TriageAgent => self.triage_agent(&mut ctx).await,
                AgentState::DraftAgent => self.draft_agent(&mut ctx).await?,
                AgentState::End => {}
            }
            state = next_agent_state(state, &ctx);
        }

        Ok(ctx)
    }

    async fn calendar_agent(&self, ctx: &mut ProcessingContext) -> Result<()> {
        const NODE: &str = "calendar_agent";

        if is_no_reply(&ctx.email.from) {
            ignore_no_reply(self.mail.as_ref(), ctx, NODE).await;
            return Ok(());
        }

        let Some(detected) = extract_datetime(&ctx.email.body, ctx.zone.tz) else {
            return Ok(());
        };
        ctx.datetime_detected = Some(detected);
        ctx.record(NODE, "datetime_detected");

        let attendee = parse_mailbox(&ctx.email.from);
        let title = ctx.email.meeting_title().to_string();

        let (reply, outcome) = {
            let request = MeetingRequest {
                start: detected,
                title: &title,
                attendee: attendee.as_deref(),
                context: Some(&ctx.email),
            };
            self.scheduler.resolve(&request, &ctx.zone).await?
        };

        match self.mail.send_reply(&ctx.email.id, &reply).await {
            Ok(()) => {
                match outcome {
                    BookingOutcome::Booked => {
                        ctx.record(NODE, "booked");
                        self.notifier
                            .post(&format!(
                                "Booked: {} on {} for {}.",
                                title,
                                composer::format_long(detected),
                                ctx.email.from
                            ))
                            .await;
                    }
                    BookingOutcome::Suggested => ctx.record(NODE, "suggested"),
                    BookingOutcome::Error => ctx.record(NODE, "error"),
                }
                mark_processed_best_effort(self.mail.as_ref(), ctx, NODE).await;
                ctx.record(NODE, "processed");
                ctx.action = match outcome {
                    BookingOutcome::Booked => Action::BookingCompleted,
                    BookingOutcome::Suggested => Action::Suggested,
                    BookingOutcome::Error => Action::BookingError,
                };
                ctx.reply = Some(reply);
            }
            Err(e) => {
                error!(node = NODE, email_id = %ctx.email.id, "failed to deliver reply: {}", e);
                ctx.action = Action::BookingFailed;
            }
        }

        Ok(())
    }

    async fn confirmation_agent(&self, ctx: &mut ProcessingContext) -> Result<()> {
        const NODE: &str = "confirmation_agent";

        if is_no_reply(&ctx.email.from) {
            ignore_no_reply(self.mail.as_ref(), ctx, NODE).await;
            return Ok(());
        }

        if !is_confirmation_reply(&ctx.email.body) {
            return Ok(());
        }
        ctx.record(NODE, "confirmation_detected");

        let now = Utc::now().with_timezone(&ctx.zone.tz);
        let Some(confirmed) = resolve_confirmed_time(&ctx.email.body, ctx.zone.tz, now) else {
            return Ok(());
        };

        let attendee = parse_mailbox(&ctx.email.from);
        let title = ctx.email.meeting_title().to_string();

        // Unlike the single-agent flow, the confirmed time is re-checked
        // against the calendar before booking
        let (reply, outcome) = {
            let request = MeetingRequest {
                start: confirmed,
                title: &title,
                attendee: attendee.as_deref(),
                context: Some(&ctx.email),
            };
            self.scheduler.resolve(&request, &ctx.zone).await?
        };

        match self.mail.send_reply(&ctx.email.id, &reply).await {
            Ok(()) => {
                if outcome == BookingOutcome::Booked {
                    ctx.record(NODE, "booked");
                } else {
                    ctx.record(NODE, "error");
                }
                mark_processed_best_effort(self.mail.as_ref(), ctx, NODE).await;
                ctx.record(NODE, "processed");
                ctx.action = if outcome == BookingOutcome::Booked {
                    Action::MeetingConfirmed
                } else {
                    Action::ConfirmationFailed
                };
                ctx.reply = Some(reply);
                if outcome == BookingOutcome::Booked {
                    self.notifier
                        .post(&format!(
                            "Confirmed: {} on {} for {}.",
                            title,
                            composer::format_long(confirmed),
                            ctx.email.from
                        ))
                        .await;
                }
            }
            Err(e) => {
                error!(node = NODE, email_id = %ctx.email.id, "failed to deliver reply: {}", e);
                ctx.action = Action::ConfirmationFailed;
            }
        }

        Ok(())
    }

    /// Classification failures are non-fatal here: an unclassified email
    /// simply ends the pipeline unprocessed and is retried next run.
    async fn triage_agent(&self, ctx: &mut ProcessingContext) {
        const NODE: &str = "triage_agent";

        match self.triage.triage_classification(&ctx.email).await {
            Ok(result) => {
                // out-of-vocabulary model output defaults to not urgent
                let result = if result == "urgent" || result == "not urgent" {
                    result
                } else {
                    "not urgent".to_string()
                };
                ctx.urgency = Some(result);
                ctx.record(NODE, "classified");
            }
            Err(e) => {
                error!(node = NODE, email_id = %ctx.email.id, "triage failed: {}", e);
            }
        }
    }

    async fn draft_agent(&self, ctx: &mut ProcessingContext) -> Result<()> {
        const NODE: &str = "draft_agent";

        if !ctx.is_urgent() {
            mark_processed_best_effort(self.mail.as_ref(), ctx, NODE).await;
            ctx.record(NODE, "processed");
            ctx.action = Action::NotUrgentProcessed;
            return Ok(());
        }

        let query = format!(
            "Urgent reply policy for subject: {}. Body: {}",
            ctx.email.subject,
            ctx.email.body.chars().take(800).collect::<String>(),
        );
        let policies = match self.policy.retrieve(&query).await {
            Ok(snippets) => snippets,
            Err(e) => {
                warn!(node = NODE, "policy retrieval failed: {}", e);
                vec![]
            }
        };

        let draft = self.drafter.urgent_draft(&ctx.email, Some(&policies)).await?;

        match self.mail.create_draft(&ctx.email.id, &draft).await {
            Ok(()) => {
                ctx.record(NODE, "drafted");
                if !policies.is_empty() {
                    ctx.record(NODE, "policy_used");
                }
                ctx.action = Action::DraftCreated;
                self.notifier
                    .post(&format!(
                        "Draft created for: {} from {}.",
                        ctx.email.subject, ctx.email.from
                    ))
                    .await;
                ctx.draft = Some(draft);
            }
            Err(e) => {
                error!(node = NODE, email_id = %ctx.email.id, "draft creation failed: {}", e);
                ctx.action = Action::DraftFailed;
            }
        }

        Ok(())
    }
}

/// Shared no-reply short-circuit: label the email and stop the pipeline.
async fn ignore_no_reply(mail: &dyn MailService, ctx: &mut ProcessingContext, node: &'static str) {
    if let Err(e) = mail.mark_processed(&ctx.email.id).await {
        warn!(node, email_id = %ctx.email.id, "could not mark no-reply email: {}", e);
    }
    ctx.action = Action::IgnoredNoReply;
    ctx.record(node, "ignored_no_reply");
}

/// Labeling failures are logged, never fatal; the action tag still gets
/// recorded so the run's outcome is visible.
async fn mark_processed_best_effort(
    mail: &dyn MailService,
    ctx: &ProcessingContext,
    node: &'static str,
) {
    if let Err(e) = mail.mark_processed(&ctx.email.id).await {
        warn!(node, email_id = %ctx.email.id, "could not mark email as processed: {}", e);
    }
}

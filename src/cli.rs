//! Command-line interface and batch orchestration

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use crate::auth;
use crate::calendar::{resolve_user_timezone, CalendarService, GoogleCalendar};
use crate::completion::OpenAiCompletion;
use crate::config::Config;
use crate::error::Result;
use crate::mail::{GmailMailer, MailService};
use crate::models::{Counters, Email, UserZone};
use crate::notify::Notifier;
use crate::policy::DirectoryPolicyStore;
use crate::workflow::{MultiAgentWorkflow, ProcessingContext, Workflow};

#[derive(Parser, Debug)]
#[command(
    name = "inbox-pilot",
    about = "Email triage and meeting-scheduling assistant",
    version
)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, default_value = "config.toml", global = true)]
    pub config: PathBuf,

    /// Path to OAuth2 credentials JSON
    #[arg(long, default_value = "credentials.json", global = true)]
    pub credentials: PathBuf,

    /// Path to the cached OAuth token
    #[arg(long, default_value = "token.json", global = true)]
    pub token_cache: PathBuf,

    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Authenticate with Google and cache the OAuth token
    Auth {
        /// Delete any cached token and re-authenticate
        #[arg(long)]
        force: bool,
    },
    /// Process unread email through the workflow
    Run {
        /// Use the multi-agent pipeline with per-stage models
        #[arg(long)]
        multi_agent: bool,
        /// Override the configured cap on emails per run
        #[arg(long)]
        max_results: Option<u32>,
    },
}

/// Either pipeline, selected per run.
enum Pipeline {
    Single(Workflow),
    Multi(MultiAgentWorkflow),
}

impl Pipeline {
    async fn process(
        &self,
        email: Email,
        zone: &UserZone,
        counters: Counters,
    ) -> Result<ProcessingContext> {
        match self {
            Pipeline::Single(workflow) => workflow.process(email, zone, counters).await,
            Pipeline::Multi(workflow) => workflow.process(email, zone, counters).await,
        }
    }
}

/// Dispatch a parsed command line.
pub async fn execute(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Auth { force } => {
            if force && cli.token_cache.exists() {
                tokio::fs::remove_file(&cli.token_cache).await?;
                info!("Removed existing token cache");
            }
            auth::initialize_hubs(&cli.credentials, &cli.token_cache).await?;
            auth::secure_token_file(&cli.token_cache).await?;
            info!("Authentication successful, token cached");
            Ok(())
        }
        Commands::Run {
            multi_agent,
            max_results,
        } => {
            let config = Config::load(&cli.config).await?;
            run_batch(&cli, &config, multi_agent, max_results).await
        }
    }
}

/// Build the production services and process the unread inbox.
async fn run_batch(
    cli: &Cli,
    config: &Config,
    multi_agent: bool,
    max_results: Option<u32>,
) -> Result<()> {
    let (gmail_hub, calendar_hub) =
        auth::initialize_hubs(&cli.credentials, &cli.token_cache).await?;

    let mail: Arc<dyn MailService> = Arc::new(GmailMailer::new(
        gmail_hub,
        config.mail.processed_label.clone(),
        max_results.or(config.mail.max_results),
        config.mail.body_limit,
    ));
    let calendar: Arc<dyn CalendarService> = Arc::new(GoogleCalendar::new(calendar_hub));
    let notifier = Notifier::new(config.webhook_url(), config.notify.enabled);

    let pipeline = if multi_agent {
        Pipeline::Multi(MultiAgentWorkflow::new(
            Arc::clone(&mail),
            Arc::clone(&calendar),
            Arc::new(OpenAiCompletion::new(
                config.models.calendar_model.clone(),
                config.models.temperature,
            )),
            Arc::new(OpenAiCompletion::new(
                config.models.triage_model.clone(),
                config.models.temperature,
            )),
            Arc::new(OpenAiCompletion::new(
                config.models.draft_model.clone(),
                config.models.temperature,
            )),
            Arc::new(DirectoryPolicyStore::new(
                config.policy.dir.clone(),
                config.policy.top_k,
            )),
            notifier,
            config.meeting.duration_minutes,
            config.meeting.num_suggestions,
        ))
    } else {
        Pipeline::Single(Workflow::new(
            Arc::clone(&mail),
            Arc::clone(&calendar),
            Arc::new(OpenAiCompletion::new(
                config.models.model.clone(),
                config.models.temperature,
            )),
            notifier,
            config.meeting.duration_minutes,
            config.meeting.num_suggestions,
        ))
    };

    // The timezone is fetched once and shared by every email in the batch
    let zone = resolve_user_timezone(calendar.as_ref(), &config.meeting.fallback_timezone).await?;
    info!(zone = %zone.name, "resolved user timezone");

    let emails = mail.list_unprocessed().await?;
    info!(node = "main", event = "start", count = emails.len(), "batch starting");

    let mut counters = Counters::default();
    for email in emails {
        let email_id = email.id.clone();
        info!(
            node = "main",
            event = "processing_email",
            email_id = %email_id,
            subject = %email.subject,
            "processing"
        );

        // One bad email never aborts the batch
        match pipeline.process(email, &zone, counters).await {
            Ok(ctx) => {
                counters = ctx.counters;
                info!(
                    node = "main",
                    event = "final_action",
                    email_id = %email_id,
                    action = ctx.action.as_str(),
                    "email handled"
                );
            }
            Err(e) => {
                error!(
                    node = "main",
                    event = "error",
                    email_id = %email_id,
                    "processing failed: {}",
                    e
                );
            }
        }
    }

    info!(
        node = "main",
        event = "done",
        processed = counters.processed,
        booked = counters.booked,
        suggested = counters.suggested,
        drafted = counters.drafted,
        "batch finished"
    );
    Ok(())
}

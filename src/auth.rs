//! OAuth2 authentication and Google API hub construction
//!
//! Gmail and Calendar share one authenticator and token cache; the cached
//! token is the only local state the assistant persists.

use google_calendar3::CalendarHub;
use google_gmail1::{hyper_rustls, hyper_util, yup_oauth2, Gmail};
use std::path::Path;

use crate::error::{AssistantError, Result};

/// Scopes required for the full workflow
///
/// These scopes provide:
/// - gmail.readonly: listing and fetching unread mail
/// - gmail.compose: draft creation
/// - gmail.modify: sending replies and applying the processed label
/// - calendar: reading availability and creating events
pub const REQUIRED_SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/gmail.readonly",
    "https://www.googleapis.com/auth/gmail.compose",
    "https://www.googleapis.com/auth/gmail.modify",
    "https://www.googleapis.com/auth/calendar",
];

/// Type alias for the HTTPS connector shared by both hubs
pub type Connector = hyper_rustls::HttpsConnector<hyper_util::client::legacy::connect::HttpConnector>;

/// Type alias for Gmail Hub to simplify type signatures
pub type GmailHub = Gmail<Connector>;

/// Type alias for Calendar Hub to simplify type signatures
pub type GoogleCalendarHub = CalendarHub<Connector>;

/// Authenticate once and build both API hubs
///
/// Sets up OAuth2 with InstalledFlow (desktop app flow), persists tokens to
/// disk for automatic refresh, and pre-fetches a token for all required
/// scopes so both hubs reuse the same grant.
///
/// # Arguments
/// * `credentials_path` - Path to the OAuth2 credentials JSON file
/// * `token_cache_path` - Path where access tokens will be cached
///
/// # Returns
/// A (Gmail, Calendar) hub pair ready for API calls
pub async fn initialize_hubs(
    credentials_path: &Path,
    token_cache_path: &Path,
) -> Result<(GmailHub, GoogleCalendarHub)> {
    // Read OAuth2 credentials
    let secret = yup_oauth2::read_application_secret(credentials_path)
        .await
        .map_err(|e| AssistantError::Auth(format!("Failed to read credentials: {}", e)))?;

    // Build authenticator with token persistence
    // HTTPRedirect opens a browser for user authorization
    let auth = yup_oauth2::InstalledFlowAuthenticator::builder(
        secret,
        yup_oauth2::InstalledFlowReturnMethod::HTTPRedirect,
    )
    .persist_tokens_to_disk(token_cache_path)
    .build()
    .await
    .map_err(|e| AssistantError::Auth(format!("Failed to build authenticator: {}", e)))?;

    // Pre-authenticate with every scope the run needs so the cached token
    // covers both services
    let _token = auth
        .token(REQUIRED_SCOPES)
        .await
        .map_err(|e| AssistantError::Auth(format!("Failed to obtain token: {}", e)))?;

    let gmail_client =
        hyper_util::client::legacy::Client::builder(hyper_util::rt::TokioExecutor::new())
            .build(build_connector()?);
    let calendar_client =
        hyper_util::client::legacy::Client::builder(hyper_util::rt::TokioExecutor::new())
            .build(build_connector()?);

    Ok((
        Gmail::new(gmail_client, auth.clone()),
        CalendarHub::new(calendar_client, auth),
    ))
}

/// Configure an HTTPS connector with TLS
///
/// HTTP/1 only for compatibility with the generated google-* clients.
fn build_connector() -> Result<Connector> {
    Ok(hyper_rustls::HttpsConnectorBuilder::new()
        .with_native_roots()
        .map_err(|e| AssistantError::Auth(format!("Failed to load TLS roots: {}", e)))?
        .https_or_http()
        .enable_http1()
        .build())
}

/// Secure token file permissions on Unix systems
///
/// Sets file permissions to 0600 (read/write for owner only)
/// to prevent unauthorized access to OAuth2 tokens
#[cfg(unix)]
pub async fn secure_token_file(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = tokio::fs::metadata(path).await?.permissions();
    perms.set_mode(0o600); // Read/write for owner only
    tokio::fs::set_permissions(path, perms).await?;
    Ok(())
}

/// Secure token file on Windows (stub implementation)
///
/// Windows uses ACLs instead of Unix permissions
#[cfg(windows)]
pub async fn secure_token_file(_path: &Path) -> Result<()> {
    Ok(())
}

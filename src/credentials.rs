//! Credential acquisition and proactive refresh.
//!
//! The manager owns the credential for the life of a run: construction
//! acquires and publishes a bearer token, `shutdown()` or dropping the
//! manager stops the background refresher and clears the published token.
//! The token itself lives in a shared [`TokenSlot`] injected into the
//! transport. Single writer, last write wins.

use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{IndexError, Result};

/// Refresh this long before the token expires.
const REFRESH_MARGIN: Duration = Duration::from_secs(60);
/// Assumed lifetime for tokens that arrive without one.
const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(3600);
/// Wait between attempts after a failed refresh.
const RETRY_DELAY: Duration = Duration::from_secs(30);
/// Hard ceiling on how long one acquired authorization may keep refreshing.
const AUTHORIZATION_LIMIT: Duration = Duration::from_secs(7 * 24 * 3600);

/// A fetched bearer token and its remaining lifetime, if the source knows it.
#[derive(Debug)]
pub struct Token {
    pub secret: String,
    pub expires_in: Option<Duration>,
}

/// Where tokens come from. Implementations cover the supported credential
/// kinds; the manager does not care which one it drives.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn fetch(&self) -> Result<Token>;
}

/// The published token, shared between the refresher and the transport.
#[derive(Default)]
pub struct TokenSlot {
    current: RwLock<Option<String>>,
}

impl TokenSlot {
    pub fn publish(&self, secret: &str) {
        let mut slot = self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *slot = Some(secret.to_owned());
    }

    pub fn clear(&self) {
        let mut slot = self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *slot = None;
    }

    pub fn bearer(&self) -> Option<String> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Read side of a [`CredentialManager`]: current bearer plus an on-demand
/// refresh for the expired-credential recovery path.
#[derive(Clone)]
pub struct CredentialHandle {
    slot: Arc<TokenSlot>,
    source: Arc<dyn TokenSource>,
}

impl CredentialHandle {
    pub fn bearer(&self) -> Option<String> {
        self.slot.bearer()
    }

    pub async fn force_refresh(&self) -> Result<()> {
        let token = self.source.fetch().await?;
        self.slot.publish(&token.secret);
        Ok(())
    }
}

/// Owns one acquired credential. Service credentials are published once and
/// never touched again; refreshable credentials get a background task that
/// re-publishes shortly before each expiry until the authorization limit or
/// a stop signal.
pub struct CredentialManager {
    slot: Arc<TokenSlot>,
    source: Arc<dyn TokenSource>,
    stop: watch::Sender<bool>,
    refresher: Option<JoinHandle<()>>,
}

impl CredentialManager {
    /// Acquires a non-expiring service credential. No background task.
    pub async fn service(source: impl TokenSource + 'static) -> Result<Self> {
        let source: Arc<dyn TokenSource> = Arc::new(source);
        let slot = Arc::new(TokenSlot::default());
        let token = source.fetch().await?;
        slot.publish(&token.secret);
        info!("published service credential");
        Ok(Self {
            slot,
            source,
            stop: watch::channel(false).0,
            refresher: None,
        })
    }

    /// Acquires a refreshable credential and starts the proactive refresher.
    pub async fn refreshing(source: impl TokenSource + 'static) -> Result<Self> {
        let source: Arc<dyn TokenSource> = Arc::new(source);
        let slot = Arc::new(TokenSlot::default());
        let token = source.fetch().await?;
        slot.publish(&token.secret);
        info!("published refreshable credential");

        let (stop, stop_rx) = watch::channel(false);
        let refresher = tokio::spawn(refresh_loop(
            Arc::clone(&source),
            Arc::clone(&slot),
            token.expires_in,
            stop_rx,
        ));
        Ok(Self {
            slot,
            source,
            stop,
            refresher: Some(refresher),
        })
    }

    pub fn handle(&self) -> CredentialHandle {
        CredentialHandle {
            slot: Arc::clone(&self.slot),
            source: Arc::clone(&self.source),
        }
    }

    /// Stops the refresher and clears the published token.
    pub async fn shutdown(mut self) {
        let _ = self.stop.send(true);
        if let Some(refresher) = self.refresher.take() {
            let _ = refresher.await;
        }
        self.slot.clear();
        debug!("credential manager shut down");
    }
}

impl Drop for CredentialManager {
    fn drop(&mut self) {
        let _ = self.stop.send(true);
        if let Some(refresher) = self.refresher.take() {
            refresher.abort();
        }
        self.slot.clear();
    }
}

fn refresh_wait(ttl: Option<Duration>) -> Duration {
    ttl.unwrap_or(DEFAULT_TOKEN_TTL)
        .saturating_sub(REFRESH_MARGIN)
        .max(Duration::from_secs(1))
}

async fn refresh_loop(
    source: Arc<dyn TokenSource>,
    slot: Arc<TokenSlot>,
    initial_ttl: Option<Duration>,
    mut stop: watch::Receiver<bool>,
) {
    let deadline = tokio::time::Instant::now() + AUTHORIZATION_LIMIT;
    let mut next_wait = refresh_wait(initial_ttl);
    loop {
        tokio::select! {
            _ = stop.changed() => break,
            _ = tokio::time::sleep(next_wait) => {}
        }
        if tokio::time::Instant::now() >= deadline {
            warn!("authorization limit reached, stopping proactive refresh");
            break;
        }
        match source.fetch().await {
            Ok(token) => {
                slot.publish(&token.secret);
                debug!("published refreshed token");
                next_wait = refresh_wait(token.expires_in);
            }
            Err(error) => {
                warn!(error = %error, "token refresh failed, keeping last token");
                next_wait = RETRY_DELAY;
            }
        }
    }
}

/// Service-account credential: a long-lived bearer token stored in a key
/// file. Fetch re-reads the file, so a rotated key is picked up on the next
/// forced refresh.
pub struct StaticTokenFile {
    path: PathBuf,
}

impl StaticTokenFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[derive(Deserialize)]
struct ServiceKey {
    token: String,
}

#[async_trait]
impl TokenSource for StaticTokenFile {
    async fn fetch(&self) -> Result<Token> {
        let raw = tokio::fs::read_to_string(&self.path).await.map_err(|err| {
            IndexError::MissingCredentials(format!("{}: {err}", self.path.display()))
        })?;
        let key: ServiceKey = serde_json::from_str(&raw).map_err(|err| {
            IndexError::MissingCredentials(format!("{}: {err}", self.path.display()))
        })?;
        Ok(Token {
            secret: key.token,
            expires_in: None,
        })
    }
}

/// User credential: an OAuth2 refresh grant against the token endpoint,
/// driven by a stored authorized-user file.
pub struct RefreshGrant {
    http: reqwest::Client,
    token_uri: String,
    client_id: String,
    client_secret: String,
    refresh_token: String,
}

#[derive(Deserialize)]
struct AuthorizedUser {
    client_id: String,
    client_secret: String,
    refresh_token: String,
    token_uri: Option<String>,
}

#[derive(Deserialize)]
struct GrantResponse {
    access_token: String,
    expires_in: Option<u64>,
}

impl RefreshGrant {
    pub fn from_file(path: &Path, default_token_uri: &str) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|err| IndexError::MissingCredentials(format!("{}: {err}", path.display())))?;
        let user: AuthorizedUser = serde_json::from_str(&raw)
            .map_err(|err| IndexError::MissingCredentials(format!("{}: {err}", path.display())))?;
        Ok(Self {
            http: reqwest::Client::new(),
            token_uri: user
                .token_uri
                .unwrap_or_else(|| default_token_uri.to_owned()),
            client_id: user.client_id,
            client_secret: user.client_secret,
            refresh_token: user.refresh_token,
        })
    }
}

#[async_trait]
impl TokenSource for RefreshGrant {
    async fn fetch(&self) -> Result<Token> {
        let response = self
            .http
            .post(&self.token_uri)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", self.refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(IndexError::TokenRefresh(format!("{status}: {detail}")));
        }
        let grant: GrantResponse = response.json().await?;
        Ok(Token {
            secret: grant.access_token,
            expires_in: grant.expires_in.map(Duration::from_secs),
        })
    }
}

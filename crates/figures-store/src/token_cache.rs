//! Bearer tokens for Firestore requests.
//!
//! The emulator accepts a fixed token. Against real Firestore a service
//! account mints OAuth tokens; one is reused until shortly before it expires,
//! and concurrent callers that find it stale wait for a single refresh.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use gcp_auth::TokenProvider;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{StoreError, StoreResult};

/// Stop handing out a minted token this long before it expires.
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

pub const FIRESTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";

/// Bearer token the Firestore emulator treats as an admin, bypassing rules.
pub const EMULATOR_TOKEN: &str = "owner";

/// A service-account token and the instant it stops being handed out.
pub struct MintedToken {
    value: String,
    refresh_at: Instant,
}

/// How long a token expiring at `expires_at` may still be handed out.
fn usable_for(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (expires_at - now)
        .to_std()
        .map(|ttl| ttl.saturating_sub(REFRESH_MARGIN))
        .unwrap_or(Duration::ZERO)
}

pub enum TokenSource {
    Emulator,
    ServiceAccount {
        provider: Arc<dyn TokenProvider>,
        current: RwLock<Option<MintedToken>>,
    },
}

impl TokenSource {
    pub fn service_account(provider: Arc<dyn TokenProvider>) -> Self {
        TokenSource::ServiceAccount {
            provider,
            current: RwLock::new(None),
        }
    }

    pub async fn get_token(&self) -> StoreResult<String> {
        let (provider, current) = match self {
            TokenSource::Emulator => return Ok(EMULATOR_TOKEN.to_string()),
            TokenSource::ServiceAccount { provider, current } => (provider, current),
        };

        if let Some(token) = fresh(&*current.read().await) {
            return Ok(token);
        }

        let mut slot = current.write().await;
        // Another caller may have refreshed while we waited.
        if let Some(token) = fresh(&slot) {
            return Ok(token);
        }

        let minted = provider
            .token(&[FIRESTORE_SCOPE])
            .await
            .map_err(|e| StoreError::auth_error(format!("Failed to obtain auth token: {}", e)))?;
        let value = minted.as_str().to_string();
        let ttl = usable_for(minted.expires_at(), Utc::now());
        debug!(usable_secs = ttl.as_secs(), "Minted Firestore auth token");

        *slot = Some(MintedToken {
            value: value.clone(),
            refresh_at: Instant::now() + ttl,
        });
        Ok(value)
    }

    /// Forget the minted token, e.g. after the server rejected it as expired.
    pub async fn invalidate(&self) {
        if let TokenSource::ServiceAccount { current, .. } = self {
            *current.write().await = None;
        }
    }
}

fn fresh(slot: &Option<MintedToken>) -> Option<String> {
    slot.as_ref()
        .filter(|token| Instant::now() < token.refresh_at)
        .map(|token| token.value.clone())
}

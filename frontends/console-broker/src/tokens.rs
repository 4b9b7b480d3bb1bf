use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// What a console token opens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenTarget {
    Server { server_id: String },
    Application { application_id: String, server_id: String },
}

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub request_id: String,
    pub token: String,
}

struct Entry {
    token: String,
    target: TokenTarget,
    expires_at: Instant,
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("unknown request or token")]
    Invalid,
    #[error("token expired")]
    Expired,
}

/// Single-use console tokens, keyed by request id.
#[derive(Clone)]
pub struct TokenStore {
    entries: Arc<DashMap<String, Entry>>,
    ttl: Duration,
}

impl TokenStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            ttl,
        }
    }

    pub fn issue(&self, target: TokenTarget) -> IssuedToken {
        let request_id = Uuid::new_v4().to_string();
        // 64 hex characters
        let token = format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());

        self.entries.insert(
            request_id.clone(),
            Entry {
                token: token.clone(),
                target,
                expires_at: Instant::now() + self.ttl,
            },
        );
        tracing::info!("Issued console token {request_id}");

        IssuedToken { request_id, token }
    }

    /// Redeem a token. A matching pair is removed whether or not it has expired.
    pub fn consume(&self, request_id: &str, token: &str) -> Result<TokenTarget, TokenError> {
        let (_, entry) = self
            .entries
            .remove_if(request_id, |_, entry| entry.token == token)
            .ok_or(TokenError::Invalid)?;

        if entry.expires_at <= Instant::now() {
            tracing::info!("Console token {request_id} presented after expiry");
            return Err(TokenError::Expired);
        }
        Ok(entry.target)
    }

    pub fn reap_expired(&self) {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        let reaped = before.saturating_sub(self.entries.len());
        if reaped > 0 {
            tracing::debug!("Reaped {reaped} expired console token(s)");
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.len()
    }
}

//! Agent card discovery via the well-known URL convention.

use tracing::debug;

use crate::error::{A2AError, A2AResult};
use crate::types::AgentCard;
use crate::utils::constants::{AGENT_CARD_WELL_KNOWN_PATH, PREV_AGENT_CARD_WELL_KNOWN_PATH};

/// Fetches [`AgentCard`]s from agent base URLs.
///
/// Tries `/.well-known/agent-card.json` first and falls back to the
/// deprecated `/.well-known/agent.json` on a 404.
#[derive(Debug, Clone)]
pub struct CardResolver {
    client: reqwest::Client,
    card_path: Option<String>,
}

impl CardResolver {
    /// Resolver with a fresh HTTP client.
    pub fn new() -> Self {
        CardResolver {
            client: reqwest::Client::new(),
            card_path: None,
        }
    }

    /// Resolver reusing an existing HTTP client.
    pub fn with_client(client: reqwest::Client) -> Self {
        CardResolver {
            client,
            card_path: None,
        }
    }

    /// Overrides the card path; disables the deprecated-path fallback.
    pub fn with_card_path(mut self, path: impl Into<String>) -> Self {
        self.card_path = Some(path.into());
        self
    }

    /// Fetches and parses the card served under `base_url`.
    ///
    /// # Errors
    ///
    /// `Transport` on connection failures, `Http` on non-2xx responses,
    /// `InvalidJson` on parse failures.
    pub async fn resolve(&self, base_url: &str) -> A2AResult<AgentCard> {
        let base = base_url.trim_end_matches('/');

        if let Some(ref path) = self.card_path {
            return self.fetch_card(base, path).await;
        }

        match self.fetch_card(base, AGENT_CARD_WELL_KNOWN_PATH).await {
            Ok(card) => Ok(card),
            Err(A2AError::Http { status: 404, .. }) => {
                debug!(
                    "agent card not found at {base}{AGENT_CARD_WELL_KNOWN_PATH}; \
                     trying fallback path {PREV_AGENT_CARD_WELL_KNOWN_PATH}"
                );
                self.fetch_card(base, PREV_AGENT_CARD_WELL_KNOWN_PATH).await
            }
            Err(e) => Err(e),
        }
    }

    async fn fetch_card(&self, base: &str, path: &str) -> A2AResult<AgentCard> {
        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        };
        let url = format!("{base}{path}");
        debug!(url = %url, "Resolving agent card");

        let response = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    A2AError::Transport(format!("failed to connect to agent at {url}: {e}"))
                } else if e.is_timeout() {
                    A2AError::Timeout(format!("timed out fetching agent card from {url}: {e}"))
                } else {
                    A2AError::Transport(format!("failed to fetch agent card from {url}: {e}"))
                }
            })?;

        if !response.status().is_success() {
            return Err(super::transport::http_error_from_response(response).await);
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| A2AError::Transport(format!("failed to read agent card response: {e}")))?;
        let card: AgentCard = serde_json::from_slice(&bytes)
            .map_err(|e| A2AError::InvalidJson(format!("failed to parse agent card: {e}")))?;

        debug!(name = %card.name, version = %card.version, "Resolved agent card");
        Ok(card)
    }
}

impl Default for CardResolver {
    fn default() -> Self {
        Self::new()
    }
}

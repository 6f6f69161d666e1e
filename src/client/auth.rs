//! Credential storage and the auth interceptor that applies an agent's
//! declared security schemes to outbound requests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::A2AResult;
use crate::types::{AgentCard, ApiKeyLocation, SecurityScheme};

use super::transport::{ClientCallContext, ClientCallInterceptor};

/// Looks up a credential for a `(scheme, session)` pair.
#[async_trait]
pub trait CredentialService: Send + Sync {
    /// The credential for the named scheme in the context's session, if
    /// one is stored.
    async fn get_credentials(
        &self,
        security_scheme_name: &str,
        context: Option<&ClientCallContext>,
    ) -> Option<String>;
}

/// In-memory [`CredentialService`] keyed by `(session_id, scheme_name)`.
///
/// The session id is read from the call context's `state["sessionId"]`.
#[derive(Default)]
pub struct InMemoryContextCredentialStore {
    credentials: RwLock<HashMap<(String, String), String>>,
}

impl InMemoryContextCredentialStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a credential for a session and scheme.
    pub async fn set_credentials(
        &self,
        session_id: impl Into<String>,
        security_scheme_name: impl Into<String>,
        credential: impl Into<String>,
    ) {
        self.credentials.write().await.insert(
            (session_id.into(), security_scheme_name.into()),
            credential.into(),
        );
    }
}

#[async_trait]
impl CredentialService for InMemoryContextCredentialStore {
    async fn get_credentials(
        &self,
        security_scheme_name: &str,
        context: Option<&ClientCallContext>,
    ) -> Option<String> {
        let session_id = context?
            .state
            .get("sessionId")
            .and_then(|v| v.as_str())?
            .to_string();
        self.credentials
            .read()
            .await
            .get(&(session_id, security_scheme_name.to_string()))
            .cloned()
    }
}

/// Attaches credentials to outbound requests based on the agent card's
/// security requirements.
///
/// Requirements are walked in declaration order; the first scheme with an
/// available credential and a supported binding is applied and the rest
/// are skipped:
///
/// - HTTP bearer, OAuth2, OpenID Connect → `Authorization: Bearer <cred>`
/// - API key in a header → `<scheme.name>: <cred>`
/// - API key in query or cookie → skipped (unsupported)
pub struct AuthInterceptor {
    credential_service: Arc<dyn CredentialService>,
}

impl AuthInterceptor {
    /// Interceptor resolving credentials from the given service.
    pub fn new(credential_service: Arc<dyn CredentialService>) -> Self {
        AuthInterceptor { credential_service }
    }
}

#[async_trait]
impl ClientCallInterceptor for AuthInterceptor {
    async fn intercept(
        &self,
        _method_name: &str,
        _request_payload: &serde_json::Value,
        headers: &mut HashMap<String, String>,
        agent_card: Option<&AgentCard>,
        context: Option<&ClientCallContext>,
    ) -> A2AResult<()> {
        let Some(card) = agent_card else {
            return Ok(());
        };
        let (Some(requirements), Some(schemes)) = (&card.security, &card.security_schemes) else {
            return Ok(());
        };

        for requirement in requirements {
            for scheme_name in requirement.keys() {
                let Some(credential) = self
                    .credential_service
                    .get_credentials(scheme_name, context)
                    .await
                else {
                    continue;
                };
                let Some(scheme) = schemes.get(scheme_name) else {
                    continue;
                };

                match scheme {
                    SecurityScheme::Http { scheme, .. }
                        if scheme.eq_ignore_ascii_case("bearer") =>
                    {
                        headers.insert(
                            "Authorization".to_string(),
                            format!("Bearer {credential}"),
                        );
                        debug!(scheme = %scheme_name, "Added bearer token");
                        return Ok(());
                    }
                    SecurityScheme::OAuth2 { .. } | SecurityScheme::OpenIdConnect { .. } => {
                        headers.insert(
                            "Authorization".to_string(),
                            format!("Bearer {credential}"),
                        );
                        debug!(scheme = %scheme_name, "Added bearer token");
                        return Ok(());
                    }
                    SecurityScheme::ApiKey {
                        location: ApiKeyLocation::Header,
                        name,
                        ..
                    } => {
                        headers.insert(name.clone(), credential);
                        debug!(scheme = %scheme_name, "Added API key header");
                        return Ok(());
                    }
                    // Query/cookie API keys and other bindings are not
                    // supported; fall through to the next scheme.
                    _ => {}
                }
            }
        }

        Ok(())
    }
}

//! Per-request server-side context: the authenticated caller, arbitrary
//! request state, and extension negotiation.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use serde_json::Value;

/// The caller identity attached to a request by the transport adapter.
#[derive(Debug, Clone, Default)]
pub struct User {
    /// Whether the transport authenticated the caller.
    pub is_authenticated: bool,

    /// The caller's user name; empty when unauthenticated.
    pub user_name: String,
}

/// Per-request envelope built by the transport adapter and threaded through
/// the request handler.
///
/// Clones share the activated-extension set, so extensions activated deep in
/// an agent execution are visible to the adapter that echoes them back.
#[derive(Debug, Clone, Default)]
pub struct ServerCallContext {
    /// The caller, when the transport authenticated one.
    pub user: Option<User>,

    /// Arbitrary per-request state (e.g. raw headers, session ids).
    pub state: HashMap<String, Value>,

    /// Extension URIs the client asked to activate.
    pub requested_extensions: HashSet<String>,

    pub(crate) activated_extensions: Arc<Mutex<HashSet<String>>>,
}

impl ServerCallContext {
    /// Context for the given user with no state or extensions.
    pub fn for_user(user: User) -> Self {
        ServerCallContext {
            user: Some(user),
            ..Default::default()
        }
    }

    /// Marks an extension as activated for this request.
    pub fn add_activated_extension(&self, uri: String) {
        self.activated_extensions
            .lock()
            .expect("activated extensions lock poisoned")
            .insert(uri);
    }

    /// The extensions activated so far.
    pub fn activated_extensions(&self) -> HashSet<String> {
        self.activated_extensions
            .lock()
            .expect("activated extensions lock poisoned")
            .clone()
    }
}

/// Maps a call context to the owner scope used for push notification
/// configs and other per-owner storage.
pub type OwnerResolver = Arc<dyn Fn(Option<&ServerCallContext>) -> String + Send + Sync>;

/// The default owner resolution: the authenticated user's name, or
/// `"unknown"`.
pub fn resolve_user_scope(context: Option<&ServerCallContext>) -> String {
    context
        .and_then(|ctx| ctx.user.as_ref())
        .filter(|user| !user.user_name.is_empty())
        .map(|user| user.user_name.clone())
        .unwrap_or_else(|| "unknown".to_string())
}

/// The [`OwnerResolver`] wrapping [`resolve_user_scope`].
pub fn default_owner_resolver() -> OwnerResolver {
    Arc::new(|ctx| resolve_user_scope(ctx))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_user_name() {
        let ctx = ServerCallContext::for_user(User {
            is_authenticated: true,
            user_name: "alice".to_string(),
        });
        assert_eq!(resolve_user_scope(Some(&ctx)), "alice");
    }

    #[test]
    fn falls_back_to_unknown() {
        assert_eq!(resolve_user_scope(None), "unknown");
        let ctx = ServerCallContext::default();
        assert_eq!(resolve_user_scope(Some(&ctx)), "unknown");
        let ctx = ServerCallContext::for_user(User::default());
        assert_eq!(resolve_user_scope(Some(&ctx)), "unknown");
    }

    #[test]
    fn clones_share_activated_extensions() {
        let ctx = ServerCallContext::default();
        let clone = ctx.clone();
        clone.add_activated_extension("https://ext.example/a".to_string());
        assert!(ctx
            .activated_extensions()
            .contains("https://ext.example/a"));
    }
}

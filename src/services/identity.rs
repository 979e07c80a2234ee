//! Identity collaborator used to attach optional user ids to joins.

use std::collections::HashMap;

use futures::future::BoxFuture;
use uuid::Uuid;

/// Resolved identity of an authenticated caller.
#[derive(Debug, Clone)]
pub struct Identity {
    /// Stable user identifier.
    pub user_id: Uuid,
    /// Role granted to the user.
    pub role: String,
}

/// External token check yielding a user id and role.
///
/// Sprint play never requires authentication; an invalid or absent token just
/// means the player participates anonymously.
pub trait IdentityResolver: Send + Sync {
    /// Resolve a bearer token, `None` when the token is invalid.
    fn resolve(&self, token: &str) -> BoxFuture<'static, Option<Identity>>;
}

/// Resolver backed by a fixed token table, used in tests and single-tenant
/// deployments.
#[derive(Default)]
pub struct StaticIdentityResolver {
    tokens: HashMap<String, Identity>,
}

impl StaticIdentityResolver {
    /// Create an empty resolver that treats every token as invalid.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a token for the given identity.
    pub fn with_token(mut self, token: impl Into<String>, identity: Identity) -> Self {
        self.tokens.insert(token.into(), identity);
        self
    }
}

impl IdentityResolver for StaticIdentityResolver {
    fn resolve(&self, token: &str) -> BoxFuture<'static, Option<Identity>> {
        let identity = self.tokens.get(token).cloned();
        Box::pin(async move { identity })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolves_known_tokens_only() {
        let user_id = Uuid::new_v4();
        let resolver = StaticIdentityResolver::new().with_token(
            "tok-alice",
            Identity {
                user_id,
                role: "player".into(),
            },
        );

        let identity = resolver.resolve("tok-alice").await.unwrap();
        assert_eq!(identity.user_id, user_id);
        assert!(resolver.resolve("tok-unknown").await.is_none());
    }
}

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::engine::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

/// Who is acting, as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    pub role: Role,
}

impl Identity {
    pub fn user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            role: Role::User,
        }
    }

    pub fn admin(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            role: Role::Admin,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Yields the identity of the current requester.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn current_identity(&self) -> Result<Identity, EngineError>;
}

/// Provider that always answers with the same identity.
#[derive(Debug, Clone)]
pub struct StaticIdentity {
    identity: Identity,
}

impl StaticIdentity {
    pub fn new(identity: Identity) -> Self {
        Self { identity }
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentity {
    async fn current_identity(&self) -> Result<Identity, EngineError> {
        Ok(self.identity.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_provider_returns_identity() {
        let provider = StaticIdentity::new(Identity::admin("root"));
        let identity = provider.current_identity().await.unwrap();
        assert!(identity.is_admin());
        assert_eq!(identity.user_id, "root");
        assert!(!Identity::user("guest").is_admin());
    }
}

//! Identity Resolver (component A): maps an incoming `auth` payload to a
//! stable [`PlayerId`].
//!
//! Credential validation itself is delegated to an auth collaborator via
//! [`CredentialValidator`] — this module only implements the resolution
//! policy: registered vs. guest, name trimming, role coercion.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier for the duration of a play session: either a
/// registered account id or a per-browser-tab guest id. The two kinds
/// never merge — the resolver does not attempt to reconcile a guest id
/// with a later-authenticated account.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerId(pub String);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for PlayerId {
    fn from(value: String) -> Self {
        PlayerId(value)
    }
}

impl From<&str> for PlayerId {
    fn from(value: &str) -> Self {
        PlayerId(value.to_string())
    }
}

/// Role a session requests (or is coerced into).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Player,
    Spectator,
}

const MAX_NAME_LEN: usize = 20;

/// Raw payload carried by an `auth` client message.
#[derive(Debug, Clone)]
pub struct AuthPayload {
    pub token: Option<String>,
    pub guest_id: Option<String>,
    pub name: String,
    pub requested_role: Option<Role>,
}

/// The stamped identity the resolver produces. Every later message on the
/// session is processed under this identity; any field in a later message
/// that contradicts it is ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedIdentity {
    pub player_id: PlayerId,
    pub name: String,
    pub role: Role,
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("auth_invalid")]
    Invalid,
}

/// Validates a bearer credential against the external auth collaborator
/// and returns the registered user's stable id.
///
/// Implemented outside this crate (HTTP client, test double, etc.) — the
/// resolver never creates or looks up accounts itself.
pub trait CredentialValidator {
    fn validate(&self, token: &str) -> Option<PlayerId>;
}

/// A validator that accepts no bearer credentials; every `auth` falls
/// through to the guest-id path. Useful as a default when no auth
/// collaborator is configured, and in tests.
pub struct NoCredentials;

impl CredentialValidator for NoCredentials {
    fn validate(&self, _token: &str) -> Option<PlayerId> {
        None
    }
}

/// Resolve an `auth` payload to a stamped identity.
pub fn resolve_identity(
    payload: &AuthPayload,
    validator: &dyn CredentialValidator,
) -> Result<ResolvedIdentity, AuthError> {
    let player_id = if let Some(token) = payload.token.as_deref().filter(|t| !t.is_empty())
        && let Some(id) = validator.validate(token)
    {
        id
    } else if let Some(guest_id) = payload.guest_id.as_deref()
        && !guest_id.trim().is_empty()
    {
        PlayerId(guest_id.to_string())
    } else {
        return Err(AuthError::Invalid);
    };

    let name = payload.name.trim().chars().take(MAX_NAME_LEN).collect();
    let role = match payload.requested_role {
        Some(Role::Spectator) => Role::Spectator,
        _ => Role::Player,
    };

    Ok(ResolvedIdentity {
        player_id,
        name,
        role,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(token: Option<&str>, guest: Option<&str>, name: &str, role: Option<Role>) -> AuthPayload {
        AuthPayload {
            token: token.map(str::to_string),
            guest_id: guest.map(str::to_string),
            name: name.to_string(),
            requested_role: role,
        }
    }

    struct AlwaysUser;
    impl CredentialValidator for AlwaysUser {
        fn validate(&self, token: &str) -> Option<PlayerId> {
            Some(PlayerId(format!("user:{token}")))
        }
    }

    #[test]
    fn registered_credential_wins_over_guest_id() {
        let p = payload(Some("tok"), Some("guest-1"), "Alice", None);
        let resolved = resolve_identity(&p, &AlwaysUser).unwrap();
        assert_eq!(resolved.player_id, PlayerId("user:tok".into()));
        assert_eq!(resolved.role, Role::Player);
    }

    #[test]
    fn falls_back_to_guest_id_when_no_credential() {
        let p = payload(None, Some("guest-1"), "Bob", None);
        let resolved = resolve_identity(&p, &NoCredentials).unwrap();
        assert_eq!(resolved.player_id, PlayerId("guest-1".into()));
    }

    #[test]
    fn blank_guest_id_is_auth_invalid() {
        let p = payload(None, Some("   "), "Eve", None);
        assert_eq!(resolve_identity(&p, &NoCredentials), Err(AuthError::Invalid));
    }

    #[test]
    fn missing_everything_is_auth_invalid() {
        let p = payload(None, None, "Eve", None);
        assert_eq!(resolve_identity(&p, &NoCredentials), Err(AuthError::Invalid));
    }

    #[test]
    fn name_is_trimmed_and_capped() {
        let long = "x".repeat(40);
        let p = payload(None, Some("g"), &format!("  {long}  "), None);
        let resolved = resolve_identity(&p, &NoCredentials).unwrap();
        assert_eq!(resolved.name.len(), MAX_NAME_LEN);
    }

    #[test]
    fn spectator_role_is_honored_player_otherwise_coerced() {
        let p = payload(None, Some("g"), "Alice", Some(Role::Spectator));
        assert_eq!(resolve_identity(&p, &NoCredentials).unwrap().role, Role::Spectator);

        let p2 = payload(None, Some("g"), "Alice", None);
        assert_eq!(resolve_identity(&p2, &NoCredentials).unwrap().role, Role::Player);
    }
}

//! Session token encoding
//!
//! Cookie value is `<session uuid>.<base64 hmac>`, signed with the
//! configured session secret.

use kernel::id::SessionId;
use platform::crypto::{sign, verify};
use uuid::Uuid;

use crate::application::config::DashboardConfig;
use crate::error::{DashboardError, DashboardResult};

pub fn issue_session_token(
    config: &DashboardConfig,
    session_id: &SessionId,
) -> DashboardResult<String> {
    sign(&config.session_secret, &session_id.to_string())
        .map_err(|e| DashboardError::Internal(format!("Session signing failed: {e}")))
}

/// Verify signature and parse the session id
pub fn parse_session_token(config: &DashboardConfig, token: &str) -> DashboardResult<SessionId> {
    let value = verify(&config.session_secret, token)?;
    value
        .parse::<Uuid>()
        .map(SessionId::from_uuid)
        .map_err(|_| DashboardError::SessionInvalid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_roundtrip() {
        let config = DashboardConfig::with_random_secret();
        let id = SessionId::new();
        let token = issue_session_token(&config, &id).unwrap();
        assert_eq!(parse_session_token(&config, &token).unwrap(), id);
    }

    #[test]
    fn test_token_from_other_secret_is_rejected() {
        let issuer = DashboardConfig::with_random_secret();
        let verifier = DashboardConfig::with_random_secret();
        let token = issue_session_token(&issuer, &SessionId::new()).unwrap();
        assert!(matches!(
            parse_session_token(&verifier, &token),
            Err(DashboardError::SessionInvalid)
        ));
    }

    #[test]
    fn test_signed_garbage_is_rejected() {
        let config = DashboardConfig::with_random_secret();
        let token = sign(&config.session_secret, "not-a-uuid").unwrap();
        assert!(matches!(
            parse_session_token(&config, &token),
            Err(DashboardError::SessionInvalid)
        ));
    }
}

use lambda_http::{Request, RequestExt};

use crate::error::ApiError;
use crate::store::ProfileStore;
use crate::types::Role;

/// The caller's session identity, as established by the platform. The JWT
/// itself is validated upstream by API Gateway; the `X-User-Id` header is a
/// local-development override.
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: String,
}

/// Access tier an operation demands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequiredRole {
    Public,
    Authenticated,
    Admin,
}

/// Pull the session out of the request, if there is one. No fallback
/// identity: an unauthenticated request simply has no session, and gated
/// operations deny it.
pub fn extract_session(event: &Request) -> Option<Session> {
    let user_id = event
        .headers()
        .get("X-User-Id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .or_else(|| {
            event
                .request_context_ref()
                .and_then(|ctx| ctx.authorizer())
                .and_then(|auth| auth.jwt.as_ref())
                .and_then(|jwt| jwt.claims.get("sub"))
                .map(|s| s.to_string())
        })?;

    if user_id.is_empty() {
        return None;
    }
    Some(Session { user_id })
}

/// The gate every mutating handler runs before touching state. Pure read:
/// it looks up the caller's profile and never mutates the session.
pub async fn authorize(
    profiles: &impl ProfileStore,
    session: Option<&Session>,
    required: RequiredRole,
) -> Result<(), ApiError> {
    match required {
        RequiredRole::Public => Ok(()),
        RequiredRole::Authenticated => match session {
            Some(_) => Ok(()),
            None => Err(ApiError::NotAuthenticated),
        },
        RequiredRole::Admin => {
            let session = session.ok_or(ApiError::NotAuthenticated)?;
            match profiles.get(&session.user_id).await? {
                Some(profile) if profile.role == Role::Admin => Ok(()),
                Some(profile) => {
                    tracing::info!(
                        "denied admin operation for user {} with role {}",
                        session.user_id,
                        profile.role.as_str()
                    );
                    Err(ApiError::Forbidden)
                }
                None => {
                    tracing::info!("denied admin operation for unknown user {}", session.user_id);
                    Err(ApiError::Forbidden)
                }
            }
        }
    }
}

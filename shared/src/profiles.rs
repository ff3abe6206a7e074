use lambda_http::{http::StatusCode, Body, Error, Response};

use crate::authz::{authorize, RequiredRole, Session};
use crate::error::ApiError;
use crate::store::ProfileStore;
use crate::types::{Profile, Role, UpdateProfileRequest};

/// Create the profile row for a freshly signed-up user. Always `lector`:
/// there is no wire-level way to ask for any other role, promotion to admin
/// is an out-of-band table edit.
pub async fn create_profile(
    profiles: &impl ProfileStore,
    user_id: &str,
    email: &str,
    username: Option<&str>,
) -> Result<Profile, ApiError> {
    let username = match username {
        Some(u) if !u.trim().is_empty() => u.to_string(),
        _ => email.split('@').next().unwrap_or(email).to_string(),
    };

    let profile = Profile {
        id: user_id.to_string(),
        username,
        email: email.to_string(),
        role: Role::Lector,
        created_at: chrono::Utc::now().to_rfc3339(),
    };
    profiles.insert(&profile).await?;
    tracing::info!("created profile for {} with role lector", user_id);
    Ok(profile)
}

/// GET /profiles/me — the caller's own profile.
pub async fn get_profile(
    profiles: &impl ProfileStore,
    session: Option<&Session>,
) -> Result<Response<Body>, Error> {
    let session = match session {
        Some(s) => s,
        None => return ApiError::NotAuthenticated.into_response(),
    };
    if let Err(e) = authorize(profiles, Some(session), RequiredRole::Authenticated).await {
        return e.into_response();
    }

    match profiles.get(&session.user_id).await {
        Ok(Some(profile)) => Ok(Response::builder()
            .status(StatusCode::OK)
            .header("Content-Type", "application/json")
            .header("Access-Control-Allow-Origin", "*")
            .body(serde_json::to_string(&profile)?.into())
            .map_err(Box::new)?),
        Ok(None) => ApiError::NotFound("profile").into_response(),
        Err(e) => e.into_response(),
    }
}

/// PATCH /profiles/me — username only. A `role` key in the body is ignored
/// by deserialization on purpose.
pub async fn update_profile(
    profiles: &impl ProfileStore,
    session: Option<&Session>,
    body: &[u8],
) -> Result<Response<Body>, Error> {
    let session = match session {
        Some(s) => s,
        None => return ApiError::NotAuthenticated.into_response(),
    };
    if let Err(e) = authorize(profiles, Some(session), RequiredRole::Authenticated).await {
        return e.into_response();
    }

    let req: UpdateProfileRequest = match serde_json::from_slice(body) {
        Ok(v) => v,
        Err(e) => {
            return ApiError::Validation(format!("invalid request body: {}", e)).into_response()
        }
    };

    if let Some(username) = req.username {
        if username.trim().is_empty() {
            return ApiError::Validation("username must not be empty".to_string()).into_response();
        }
        if let Err(e) = profiles.set_username(&session.user_id, &username).await {
            return e.into_response();
        }
    }

    get_profile(profiles, Some(session)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;

    #[tokio::test]
    async fn new_profiles_are_lectors() {
        let store = MemoryStore::new();
        let profile = create_profile(&store, "u1", "reader@test.dev", None)
            .await
            .unwrap();
        assert_eq!(profile.role, Role::Lector);
        // Username falls back to the email local-part.
        assert_eq!(profile.username, "reader");
    }

    #[tokio::test]
    async fn explicit_username_wins() {
        let store = MemoryStore::new();
        let profile = create_profile(&store, "u2", "x@test.dev", Some("shadow"))
            .await
            .unwrap();
        assert_eq!(profile.username, "shadow");
    }

    #[tokio::test]
    async fn update_changes_username_but_never_role() {
        let store = MemoryStore::new();
        create_profile(&store, "u1", "reader@test.dev", None)
            .await
            .unwrap();
        let session = Session {
            user_id: "u1".into(),
        };

        // A role key in the body is simply not part of the request shape.
        let resp = update_profile(
            &store,
            Some(&session),
            br#"{"username": "renamed", "role": "admin"}"#,
        )
        .await
        .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let profile: Profile = serde_json::from_slice(&resp.body().to_vec()).unwrap();
        assert_eq!(profile.username, "renamed");
        assert_eq!(profile.role, Role::Lector);
    }

    #[tokio::test]
    async fn profile_routes_require_a_session() {
        let store = MemoryStore::new();
        let resp = get_profile(&store, None).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }
}

use aws_sdk_cognitoidentityprovider::Client as CognitoClient;
use base64::{engine::general_purpose, Engine as _};
use hmac::{Hmac, Mac};
use lambda_http::{http::StatusCode, Body, Error, Response};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::ApiError;
use crate::profiles;
use crate::store::ProfileStore;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub username: Option<String>,
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub email: String,
    pub refresh_token: String,
}

#[derive(Deserialize)]
pub struct LogoutRequest {
    pub access_token: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub id_token: String,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i32,
}

type HmacSha256 = Hmac<Sha256>;

/// Compute the SECRET_HASH for Cognito authentication
fn compute_secret_hash(username: &str, client_id: &str, client_secret: &str) -> String {
    let message = format!("{}{}", username, client_id);
    let mut mac = HmacSha256::new_from_slice(client_secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(message.as_bytes());
    let result = mac.finalize();
    general_purpose::STANDARD.encode(result.into_bytes())
}

fn parse_body<T: serde::de::DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body)
        .map_err(|e| ApiError::Validation(format!("invalid request body: {}", e)))
}

fn token_response(
    auth_result: &aws_sdk_cognitoidentityprovider::types::AuthenticationResultType,
    fallback_refresh: Option<&str>,
) -> LoginResponse {
    LoginResponse {
        id_token: auth_result.id_token().unwrap_or_default().to_string(),
        access_token: auth_result.access_token().unwrap_or_default().to_string(),
        // Cognito omits the refresh token on REFRESH_TOKEN_AUTH; echo the
        // one the caller presented so the client keeps a full token set.
        refresh_token: auth_result
            .refresh_token()
            .or(fallback_refresh)
            .unwrap_or_default()
            .to_string(),
        expires_in: auth_result.expires_in(),
    }
}

fn ok_json(body: String) -> Result<Response<Body>, Error> {
    Ok(Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(body.into())
        .map_err(Box::new)?)
}

/// Handle user login with Cognito
pub async fn login(
    cognito_client: &CognitoClient,
    client_id: &str,
    client_secret: &str,
    body: &[u8],
) -> Result<Response<Body>, Error> {
    tracing::info!("Login request received");

    let login_request: LoginRequest = match parse_body(body) {
        Ok(req) => req,
        Err(e) => return e.into_response(),
    };

    tracing::info!("Authenticating user: {}", login_request.email);

    let secret_hash = compute_secret_hash(&login_request.email, client_id, client_secret);

    let auth_result = cognito_client
        .initiate_auth()
        .auth_flow(aws_sdk_cognitoidentityprovider::types::AuthFlowType::UserPasswordAuth)
        .client_id(client_id)
        .auth_parameters("USERNAME", &login_request.email)
        .auth_parameters("PASSWORD", &login_request.password)
        .auth_parameters("SECRET_HASH", &secret_hash)
        .send()
        .await;

    match auth_result {
        Ok(response) => {
            if let Some(auth_result) = response.authentication_result() {
                tracing::info!("Authentication successful for user: {}", login_request.email);
                ok_json(serde_json::to_string(&token_response(auth_result, None))?)
            } else {
                tracing::error!("No authentication result returned");
                ApiError::Auth("no authentication result returned".to_string()).into_response()
            }
        }
        Err(e) => {
            let error_message = format!("{:?}", e);
            tracing::error!("Cognito authentication error: {}", error_message);

            // Extract user-friendly error message
            let user_message = if error_message.contains("NotAuthorizedException") {
                "Incorrect email or password"
            } else if error_message.contains("UserNotConfirmedException") {
                "Please verify your email before logging in"
            } else if error_message.contains("UserNotFoundException") {
                "No account found with this email"
            } else if error_message.contains("PasswordResetRequiredException") {
                "Password reset required"
            } else if error_message.contains("TooManyRequestsException") {
                "Too many login attempts. Please try again later"
            } else {
                "Login failed. Please check your credentials"
            };

            ApiError::Auth(user_message.to_string()).into_response()
        }
    }
}

/// Handle user signup with Cognito. The profile row is created here with
/// role `lector`; registration can never mint an admin.
pub async fn signup(
    cognito_client: &CognitoClient,
    profiles_store: &impl ProfileStore,
    client_id: &str,
    client_secret: &str,
    body: &[u8],
) -> Result<Response<Body>, Error> {
    tracing::info!("Signup request received");

    let signup_request: SignupRequest = match parse_body(body) {
        Ok(req) => req,
        Err(e) => return e.into_response(),
    };

    tracing::info!("Signing up user: {}", signup_request.email);

    let secret_hash = compute_secret_hash(&signup_request.email, client_id, client_secret);

    let signup_result = cognito_client
        .sign_up()
        .client_id(client_id)
        .username(&signup_request.email)
        .password(&signup_request.password)
        .secret_hash(&secret_hash)
        .user_attributes(
            aws_sdk_cognitoidentityprovider::types::AttributeType::builder()
                .name("email")
                .value(&signup_request.email)
                .build()?,
        )
        .send()
        .await;

    match signup_result {
        Ok(response) => {
            let user_id = response.user_sub().to_string();
            tracing::info!("Signup successful for user: {}", signup_request.email);

            match profiles::create_profile(
                profiles_store,
                &user_id,
                &signup_request.email,
                signup_request.username.as_deref(),
            )
            .await
            {
                Ok(profile) => ok_json(serde_json::to_string(&profile)?),
                Err(e) => {
                    // The Cognito account exists but the profile row does
                    // not; surface the storage failure so the user retries.
                    tracing::error!("failed to create profile for {}: {}", user_id, e);
                    e.into_response()
                }
            }
        }
        Err(e) => {
            let error_message = format!("{:?}", e);
            tracing::error!("Cognito signup error: {}", error_message);

            // Extract user-friendly error message (only send this to frontend)
            let user_message = if error_message.contains("InvalidPasswordException") {
                "Password must contain at least 8 characters with uppercase, lowercase, number, and special character"
            } else if error_message.contains("UsernameExistsException") {
                "An account with this email already exists"
            } else if error_message.contains("InvalidParameterException") {
                "Invalid email or password format"
            } else {
                "Signup failed. Please check your credentials and try again."
            };

            ApiError::Validation(user_message.to_string()).into_response()
        }
    }
}

/// Exchange a refresh token for fresh id/access tokens.
pub async fn refresh_token(
    cognito_client: &CognitoClient,
    client_id: &str,
    client_secret: &str,
    body: &[u8],
) -> Result<Response<Body>, Error> {
    let refresh_request: RefreshRequest = match parse_body(body) {
        Ok(req) => req,
        Err(e) => return e.into_response(),
    };

    let secret_hash = compute_secret_hash(&refresh_request.email, client_id, client_secret);

    let auth_result = cognito_client
        .initiate_auth()
        .auth_flow(aws_sdk_cognitoidentityprovider::types::AuthFlowType::RefreshTokenAuth)
        .client_id(client_id)
        .auth_parameters("REFRESH_TOKEN", &refresh_request.refresh_token)
        .auth_parameters("SECRET_HASH", &secret_hash)
        .send()
        .await;

    match auth_result {
        Ok(response) => match response.authentication_result() {
            Some(result) => ok_json(serde_json::to_string(&token_response(
                result,
                Some(&refresh_request.refresh_token),
            ))?),
            None => ApiError::Auth("no authentication result returned".to_string()).into_response(),
        },
        Err(e) => {
            tracing::error!("Cognito refresh error: {:?}", e);
            ApiError::Auth("Session expired. Please log in again".to_string()).into_response()
        }
    }
}

/// Sign the caller out everywhere by revoking the access token.
pub async fn logout(
    cognito_client: &CognitoClient,
    body: &[u8],
) -> Result<Response<Body>, Error> {
    let logout_request: LogoutRequest = match parse_body(body) {
        Ok(req) => req,
        Err(e) => return e.into_response(),
    };

    match cognito_client
        .global_sign_out()
        .access_token(&logout_request.access_token)
        .send()
        .await
    {
        Ok(_) => ok_json(serde_json::json!({"message": "signed out"}).to_string()),
        Err(e) => {
            tracing::error!("Cognito sign-out error: {:?}", e);
            ApiError::Auth("Sign-out failed".to_string()).into_response()
        }
    }
}

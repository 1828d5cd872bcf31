//! Login, signup and logout

use crate::error::{ClientError, error_detail};
use crate::gateway::{ApiRequest, Gateway};
use crate::session::TokenPair;
use crate::types::SignupRequest;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Path of the login endpoint
pub const LOGIN_PATH: &str = "/api/token/";

/// Path of the signup endpoint
pub const SIGNUP_PATH: &str = "/api/user/";

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    access: Option<String>,
    refresh: Option<String>,
}

impl Gateway {
    /// Exchange username and password for a token pair and start the session
    pub async fn login(&self, username: &str, password: &str) -> Result<(), ClientError> {
        if username.trim().is_empty() || password.is_empty() {
            return Err(ClientError::InvalidCredentials(
                "Username and password are required.".into(),
            ));
        }

        let request = ApiRequest::post(LOGIN_PATH).json(&LoginRequest {
            username: username.trim(),
            password,
        })?;
        let response = self.send_public(&request).await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(ClientError::InvalidCredentials(
                error_detail(&body).unwrap_or_else(|| "Invalid credentials.".into()),
            ));
        }

        let tokens: TokenResponse = serde_json::from_str(&body)?;
        let access = tokens
            .access
            .filter(|a| !a.is_empty())
            .ok_or_else(|| ClientError::InvalidCredentials("No access token in response.".into()))?;

        self.session().begin(&TokenPair {
            access,
            refresh: tokens.refresh.filter(|r| !r.is_empty()),
        })?;
        info!(username = username.trim(), "Logged in");
        Ok(())
    }

    /// Create an account; does not log in
    pub async fn signup(&self, request: &SignupRequest) -> Result<(), ClientError> {
        if request.username.trim().is_empty() || request.password.is_empty() {
            return Err(ClientError::InvalidCredentials(
                "Username and password are required.".into(),
            ));
        }

        let response = self
            .send_public(&ApiRequest::post(SIGNUP_PATH).json(request)?)
            .await?;
        let status = response.status();
        if status.is_success() {
            info!(username = %request.username, "Account created");
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_else(|_| status.to_string());
            Err(ClientError::from_status(status, body))
        }
    }

    /// Clear stored credentials and end the session
    pub fn logout(&self) -> Result<(), ClientError> {
        self.session().end()
    }
}

//! Strava OAuth2 session and API calls.
//!
//! [`AuthSession`] owns one browser session's credentials. Every exchange
//! goes through an injected [`StravaClient`], so the host can be pointed at
//! a mock server.

use reqwest::multipart::{Form, Part};
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::StravaError;

pub const UPLOAD_DATA_TYPE: &str = "fit";
pub const UPLOAD_FILE_NAME: &str = "activity.fit";
const AUTHORIZE_SCOPE: &str = "activity:write,read";

#[derive(Debug, Clone)]
pub struct StravaClient {
    http: reqwest::Client,
    base_url: String,
    client_id: String,
    client_secret: String,
}

/// Body of a successful `/oauth/token` response.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
}

impl StravaClient {
    pub fn new(
        base_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    /// `None` unless both client credentials are configured.
    pub fn from_config(config: &Config) -> Option<Self> {
        let client_id = config.strava_client_id.as_deref()?;
        let client_secret = config.strava_client_secret.as_deref()?;
        Some(Self::new(&config.strava_base_url, client_id, client_secret))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn authorize_url(&self, redirect_uri: &str, state: &str) -> Result<String, StravaError> {
        let mut url = Url::parse(&self.url("/oauth/authorize"))
            .map_err(|err| StravaError::InvalidResponse(format!("Bad Strava base URL: {}", err)))?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("response_type", "code")
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("approval_prompt", "force")
            .append_pair("scope", AUTHORIZE_SCOPE)
            .append_pair("state", state);
        Ok(url.to_string())
    }

    async fn request_token(&self, form: &[(&str, &str)]) -> Result<TokenResponse, StravaError> {
        let response = self
            .http
            .post(self.url("/oauth/token"))
            .form(form)
            .send()
            .await?;

        let status = response.status();
        tracing::info!("Strava token endpoint responded {}", status);
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(StravaError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(|err| StravaError::InvalidResponse(err.to_string()))
    }

    pub async fn exchange_code(&self, code: &str) -> Result<TokenResponse, StravaError> {
        self.request_token(&[
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("code", code),
            ("grant_type", "authorization_code"),
        ])
        .await
    }

    pub async fn refresh_token(&self, refresh_token: &str) -> Result<TokenResponse, StravaError> {
        self.request_token(&[
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ])
        .await
    }

    /// First name of the athlete owning `access_token`.
    pub async fn athlete_name(&self, access_token: &str) -> Result<String, StravaError> {
        let response = self
            .http
            .get(self.url("/api/v3/athlete"))
            .bearer_auth(access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(StravaError::Status { status, body });
        }

        let athlete: serde_json::Value = response
            .json()
            .await
            .map_err(|err| StravaError::InvalidResponse(err.to_string()))?;
        athlete
            .get("firstname")
            .and_then(serde_json::Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| StravaError::InvalidResponse("athlete missing firstname".to_string()))
    }

    /// Posts a FIT file to the uploads endpoint and hands back the raw response.
    pub async fn upload(
        &self,
        access_token: &str,
        name: &str,
        file: Vec<u8>,
    ) -> Result<reqwest::Response, StravaError> {
        let part = Part::bytes(file)
            .file_name(UPLOAD_FILE_NAME)
            .mime_str("application/octet-stream")?;
        let form = Form::new()
            .part("file", part)
            .text("name", name.to_string())
            .text("data_type", UPLOAD_DATA_TYPE);

        Ok(self
            .http
            .post(self.url("/api/v3/uploads"))
            .bearer_auth(access_token)
            .multipart(form)
            .send()
            .await?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthState {
    #[default]
    LoggedOut,
    ExchangingCode,
    Refreshing,
    LoggedIn,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub access_token: String,
    pub refresh_token: String,
    /// Epoch seconds; zero when unknown.
    pub expires_at: i64,
}

impl Credentials {
    pub fn is_empty(&self) -> bool {
        self.access_token.is_empty() && self.refresh_token.is_empty() && self.expires_at == 0
    }
}

impl From<TokenResponse> for Credentials {
    fn from(token: TokenResponse) -> Self {
        Self {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_at: token.expires_at,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AuthSession {
    pub credentials: Credentials,
    pub display_name: String,
    pub state: AuthState,
}

impl AuthSession {
    pub fn is_logged_in(&self) -> bool {
        self.state == AuthState::LoggedIn && !self.credentials.access_token.is_empty()
    }

    pub fn clear(&mut self) {
        self.credentials = Credentials::default();
        self.display_name.clear();
        self.state = AuthState::LoggedOut;
    }

    /// Restores the session when a page loads: trade a fresh authorization
    /// code, else refresh stored credentials, else re-check a bare access token.
    pub async fn on_load(&mut self, client: &StravaClient, code: Option<&str>) {
        if let Some(code) = code.filter(|code| !code.is_empty()) {
            self.exchange_code(client, code).await;
        } else if !self.credentials.refresh_token.is_empty() && self.credentials.expires_at != 0 {
            self.refresh(client).await;
        } else if !self.credentials.access_token.is_empty() {
            self.sync_display_name(client).await;
        } else {
            self.state = AuthState::LoggedOut;
        }
    }

    pub async fn exchange_code(&mut self, client: &StravaClient, code: &str) {
        self.state = AuthState::ExchangingCode;
        let result = client.exchange_code(code).await;
        self.apply_token_result(client, result).await;
    }

    pub async fn refresh(&mut self, client: &StravaClient) {
        self.state = AuthState::Refreshing;
        let result = client.refresh_token(&self.credentials.refresh_token).await;
        self.apply_token_result(client, result).await;
    }

    async fn apply_token_result(
        &mut self,
        client: &StravaClient,
        result: Result<TokenResponse, StravaError>,
    ) {
        match result {
            Ok(token) => {
                self.credentials = token.into();
                self.sync_display_name(client).await;
            }
            Err(err) => {
                tracing::warn!("Strava token exchange failed, clearing credentials: {}", err);
                self.clear();
            }
        }
    }

    pub async fn sync_display_name(&mut self, client: &StravaClient) {
        if self.credentials.access_token.is_empty() {
            self.display_name.clear();
            self.state = AuthState::LoggedOut;
            return;
        }

        match client.athlete_name(&self.credentials.access_token).await {
            Ok(name) => {
                self.display_name = name;
                self.state = AuthState::LoggedIn;
            }
            Err(err) => {
                tracing::warn!("Failed to fetch Strava athlete: {}", err);
                self.display_name.clear();
                self.state = AuthState::LoggedOut;
            }
        }
    }

    pub async fn upload_activity(
        &self,
        client: &StravaClient,
        name: &str,
        file: Vec<u8>,
    ) -> Result<reqwest::Response, StravaError> {
        if self.credentials.access_token.is_empty() {
            return Err(StravaError::NotLoggedIn);
        }
        client
            .upload(&self.credentials.access_token, name, file)
            .await
    }
}

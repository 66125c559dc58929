//! Google sign-in (OAuth 2.0 authorization-code flow).

use serde::Deserialize;
use url::Url;

use crate::config::Config;
use crate::error::AppError;

const AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";
const SCOPES: &str = "openid email profile";

/// Identity providers reachable under `/api/v1/auth/oauth/{provider}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OAuthProvider {
    Google,
}

impl std::str::FromStr for OAuthProvider {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "google" => Ok(OAuthProvider::Google),
            _ => Err(AppError::NotFound("OAuth provider")),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// OpenID Connect userinfo.
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleUser {
    pub sub: String,
    pub email: String,
    #[serde(default)]
    pub email_verified: bool,
    pub name: Option<String>,
    pub picture: Option<String>,
}

#[derive(Clone)]
pub struct GoogleOAuth {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
}

impl GoogleOAuth {
    pub fn from_config(config: &Config, http: reqwest::Client) -> Option<Self> {
        Some(Self {
            http,
            client_id: config.google_client_id.clone()?,
            client_secret: config.google_client_secret.clone()?,
            redirect_uri: format!(
                "{}/api/v1/auth/oauth/google/callback",
                config.site_origin()
            ),
        })
    }

    pub fn authorize_url(&self, state: &str) -> Result<String, AppError> {
        let mut url = Url::parse(AUTHORIZE_URL)
            .map_err(|e| AppError::Internal(format!("bad authorize URL: {e}")))?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", SCOPES)
            .append_pair("state", state)
            .append_pair("prompt", "select_account");
        Ok(url.into())
    }

    /// Exchange the authorization code and fetch the signed-in user.
    pub async fn fetch_user(&self, code: &str) -> Result<GoogleUser, AppError> {
        let token: TokenResponse = self
            .http
            .post(TOKEN_URL)
            .form(&[
                ("code", code),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| AppError::Upstream(format!("OAuth token exchange failed: {e}")))?
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("OAuth token response invalid: {e}")))?;

        self.http
            .get(USERINFO_URL)
            .bearer_auth(&token.access_token)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| AppError::Upstream(format!("OAuth userinfo failed: {e}")))?
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("OAuth userinfo invalid: {e}")))
    }
}

/// Random value for the `state` parameter.
pub fn generate_state() -> String {
    let bytes: [u8; 16] = rand::random();
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> GoogleOAuth {
        let config = Config::from_pairs([
            ("DATABASE_URL", "postgres://localhost/studio"),
            ("JWT_SECRET", "secret"),
            ("SITE_URL", "https://studio.example.com"),
            ("GOOGLE_CLIENT_ID", "cid"),
            ("GOOGLE_CLIENT_SECRET", "csecret"),
        ])
        .unwrap();
        GoogleOAuth::from_config(&config, reqwest::Client::new()).unwrap()
    }

    #[test]
    fn authorize_url_carries_state_and_redirect() {
        let url = Url::parse(&client().authorize_url("abc123").unwrap()).unwrap();
        let pairs: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs["client_id"], "cid");
        assert_eq!(pairs["state"], "abc123");
        assert_eq!(pairs["scope"], "openid email profile");
        assert_eq!(
            pairs["redirect_uri"],
            "https://studio.example.com/api/v1/auth/oauth/google/callback"
        );
    }

    #[test]
    fn only_google_is_known() {
        assert_eq!("google".parse::<OAuthProvider>().unwrap(), OAuthProvider::Google);
        assert!("myspace".parse::<OAuthProvider>().is_err());
    }

    #[test]
    fn states_are_random_hex() {
        let a = generate_state();
        assert_eq!(a.len(), 32);
        assert_ne!(a, generate_state());
    }
}

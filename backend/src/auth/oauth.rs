use reqwest::Client;
use serde::Deserialize;
use url::Url;

use rolegate_common::User;

use crate::config::OAuthConfig;
use crate::error::AuthFlowError;

/// Scopes requested at login. `guilds.join` lets the bot add the user to a guild.
pub const SCOPES: &str = "identify email guilds.join";

/// Token endpoint response.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

/// OAuth2 authorization-code client.
pub struct OAuthClient {
    http_client: Client,
    config: OAuthConfig,
}

impl OAuthClient {
    pub fn new(config: OAuthConfig) -> Self {
        Self {
            http_client: Client::new(),
            config,
        }
    }

    /// URL the browser is redirected to at login.
    pub fn authorize_url(&self) -> Result<Url, url::ParseError> {
        Url::parse_with_params(
            &self.config.authorize_url,
            &[
                ("client_id", self.config.client_id.as_str()),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", SCOPES),
            ],
        )
    }

    /// Exchange an authorization code for an access token.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenResponse, AuthFlowError> {
        let form = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
        ];

        let response = self
            .http_client
            .post(&self.config.token_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| AuthFlowError::TokenExchange(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, "Token exchange rejected: {}", body);
            return Err(AuthFlowError::TokenExchange(format!("status {}", status)));
        }

        response
            .json()
            .await
            .map_err(|e| AuthFlowError::TokenExchange(e.to_string()))
    }

    /// Fetch the authenticated user's profile.
    pub async fn fetch_profile(&self, access_token: &str) -> Result<User, AuthFlowError> {
        let url = format!("{}/users/@me", self.config.api_base.trim_end_matches('/'));
        let response = self
            .http_client
            .get(&url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AuthFlowError::ProfileFetch(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            tracing::warn!(status = %status, "Profile fetch rejected");
            return Err(AuthFlowError::ProfileFetch(format!("status {}", status)));
        }

        response
            .json()
            .await
            .map_err(|e| AuthFlowError::ProfileFetch(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(base: &str) -> OAuthConfig {
        OAuthConfig {
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
            redirect_uri: "https://example.com/callback".to_string(),
            authorize_url: "https://auth.example.com/oauth2/authorize".to_string(),
            token_url: format!("{}/oauth2/token", base),
            api_base: base.to_string(),
        }
    }

    #[test]
    fn test_authorize_url() {
        let client = OAuthClient::new(config("http://localhost:1"));
        let url = client.authorize_url().unwrap();
        let params: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        assert_eq!(url.path(), "/oauth2/authorize");
        assert!(params.contains(&("client_id".to_string(), "client".to_string())));
        assert!(params.contains(&(
            "redirect_uri".to_string(),
            "https://example.com/callback".to_string()
        )));
        assert!(params.contains(&("response_type".to_string(), "code".to_string())));
        assert!(params.contains(&("scope".to_string(), SCOPES.to_string())));
    }

    #[tokio::test]
    async fn test_exchange_code() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("code=abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "user-token",
                "token_type": "Bearer",
                "expires_in": 604800,
                "scope": "identify email guilds.join"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = OAuthClient::new(config(&server.uri()));
        let token = client.exchange_code("abc").await.unwrap();
        assert_eq!(token.access_token, "user-token");
    }

    #[tokio::test]
    async fn test_exchange_code_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({"error": "invalid_grant"})))
            .mount(&server)
            .await;

        let client = OAuthClient::new(config(&server.uri()));
        let err = client.exchange_code("stale").await.unwrap_err();
        assert!(matches!(err, AuthFlowError::TokenExchange(_)));
    }

    #[tokio::test]
    async fn test_fetch_profile() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/@me"))
            .and(header("authorization", "Bearer user-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "123",
                "username": "alice",
                "discriminator": "0",
                "email": "a@b.com"
            })))
            .mount(&server)
            .await;

        let client = OAuthClient::new(config(&server.uri()));
        let profile = client.fetch_profile("user-token").await.unwrap();
        assert_eq!(profile.id.to_string(), "123");
        assert_eq!(profile.email.as_deref(), Some("a@b.com"));
    }

    #[tokio::test]
    async fn test_fetch_profile_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/@me"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let client = OAuthClient::new(config(&server.uri()));
        let err = client.fetch_profile("bad").await.unwrap_err();
        assert!(matches!(err, AuthFlowError::ProfileFetch(_)));
    }
}

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

use rolegate_common::{CreateMessage, Guild, InteractionResponse, Member, Snowflake};

use super::PlatformError;

/// Result of `PUT /guilds/{guild}/members/{user}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberJoin {
    Joined,
    AlreadyMember,
}

#[derive(Debug, Serialize)]
struct AddGuildMemberRequest<'a> {
    access_token: &'a str,
}

/// Client for the platform REST API, authenticated as the bot.
pub struct DiscordHttp {
    http_client: Client,
    api_base: String,
    bot_token: Option<String>,
}

impl DiscordHttp {
    pub fn new(api_base: &str, bot_token: Option<&str>) -> Self {
        Self {
            http_client: Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            bot_token: bot_token
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(String::from),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    fn bot_request(&self, method: reqwest::Method, path: &str) -> Result<RequestBuilder, PlatformError> {
        let token = self.bot_token.as_ref().ok_or(PlatformError::NotConfigured)?;
        Ok(self
            .http_client
            .request(method, self.url(path))
            .header(reqwest::header::AUTHORIZATION, format!("Bot {}", token)))
    }

    /// Send a request and map error statuses onto `PlatformError`.
    async fn send(&self, request: RequestBuilder) -> Result<Response, PlatformError> {
        let response = request
            .send()
            .await
            .map_err(|e| PlatformError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(match status {
            StatusCode::FORBIDDEN => PlatformError::Forbidden(body),
            StatusCode::NOT_FOUND => PlatformError::NotFound(body),
            _ => PlatformError::Status {
                status: status.as_u16(),
                body,
            },
        })
    }

    async fn json<T: DeserializeOwned>(response: Response) -> Result<T, PlatformError> {
        response
            .json()
            .await
            .map_err(|e| PlatformError::InvalidResponse(e.to_string()))
    }

    /// GET /guilds/{guild}
    pub async fn guild(&self, guild_id: Snowflake) -> Result<Guild, PlatformError> {
        let request = self
            .bot_request(reqwest::Method::GET, &format!("/guilds/{}", guild_id))?
            .query(&[("with_counts", "true")]);
        Self::json(self.send(request).await?).await
    }

    /// GET /guilds/{guild}/members/{user}; `None` when the user is not a member.
    pub async fn guild_member(
        &self,
        guild_id: Snowflake,
        user_id: Snowflake,
    ) -> Result<Option<Member>, PlatformError> {
        let request = self.bot_request(
            reqwest::Method::GET,
            &format!("/guilds/{}/members/{}", guild_id, user_id),
        )?;
        match self.send(request).await {
            Ok(response) => Self::json(response).await.map(Some),
            Err(PlatformError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// PUT /guilds/{guild}/members/{user}
    ///
    /// Requires the `guilds.join` scope on `access_token`. The platform answers
    /// 201 when the user joined and 204 when they were already a member.
    pub async fn add_guild_member(
        &self,
        guild_id: Snowflake,
        user_id: Snowflake,
        access_token: &str,
    ) -> Result<MemberJoin, PlatformError> {
        let request = self
            .bot_request(
                reqwest::Method::PUT,
                &format!("/guilds/{}/members/{}", guild_id, user_id),
            )?
            .json(&AddGuildMemberRequest { access_token });
        let response = self.send(request).await?;
        Ok(if response.status() == StatusCode::NO_CONTENT {
            MemberJoin::AlreadyMember
        } else {
            MemberJoin::Joined
        })
    }

    /// PUT /guilds/{guild}/members/{user}/roles/{role}
    pub async fn add_member_role(
        &self,
        guild_id: Snowflake,
        user_id: Snowflake,
        role_id: Snowflake,
    ) -> Result<(), PlatformError> {
        let request = self.bot_request(
            reqwest::Method::PUT,
            &format!("/guilds/{}/members/{}/roles/{}", guild_id, user_id, role_id),
        )?;
        self.send(request).await?;
        Ok(())
    }

    /// POST /channels/{channel}/messages
    pub async fn create_message(
        &self,
        channel_id: Snowflake,
        message: &CreateMessage,
    ) -> Result<(), PlatformError> {
        let request = self
            .bot_request(
                reqwest::Method::POST,
                &format!("/channels/{}/messages", channel_id),
            )?
            .json(message);
        self.send(request).await?;
        Ok(())
    }

    /// DELETE /channels/{channel}/messages/{message}
    pub async fn delete_message(
        &self,
        channel_id: Snowflake,
        message_id: Snowflake,
    ) -> Result<(), PlatformError> {
        let request = self.bot_request(
            reqwest::Method::DELETE,
            &format!("/channels/{}/messages/{}", channel_id, message_id),
        )?;
        self.send(request).await?;
        Ok(())
    }

    /// POST /interactions/{id}/{token}/callback
    ///
    /// Authenticated by the interaction token in the path, not the bot token.
    pub async fn create_interaction_response(
        &self,
        interaction_id: Snowflake,
        interaction_token: &str,
        response: &InteractionResponse,
    ) -> Result<(), PlatformError> {
        let request = self
            .http_client
            .post(self.url(&format!(
                "/interactions/{}/{}/callback",
                interaction_id, interaction_token
            )))
            .json(response);
        self.send(request).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_add_guild_member_distinguishes_join_from_existing() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/guilds/1/members/2"))
            .and(header("authorization", "Bot bot-token"))
            .and(body_json(json!({"access_token": "user-token"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"roles": []})))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/guilds/1/members/3"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let http = DiscordHttp::new(&server.uri(), Some("bot-token"));
        let joined = http
            .add_guild_member(Snowflake(1), Snowflake(2), "user-token")
            .await
            .unwrap();
        let existing = http
            .add_guild_member(Snowflake(1), Snowflake(3), "user-token")
            .await
            .unwrap();

        assert_eq!(joined, MemberJoin::Joined);
        assert_eq!(existing, MemberJoin::AlreadyMember);
    }

    #[tokio::test]
    async fn test_guild_member_not_found_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/guilds/1/members/2"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"code": 10007})))
            .mount(&server)
            .await;

        let http = DiscordHttp::new(&server.uri(), Some("bot-token"));
        let member = http.guild_member(Snowflake(1), Snowflake(2)).await.unwrap();
        assert!(member.is_none());
    }

    #[tokio::test]
    async fn test_forbidden_maps_to_forbidden() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/guilds/1/members/2/roles/3"))
            .respond_with(ResponseTemplate::new(403).set_body_string("Missing Permissions"))
            .mount(&server)
            .await;

        let http = DiscordHttp::new(&server.uri(), Some("bot-token"));
        let err = http
            .add_member_role(Snowflake(1), Snowflake(2), Snowflake(3))
            .await
            .unwrap_err();
        assert!(err.is_forbidden());
    }

    #[tokio::test]
    async fn test_missing_token_is_not_configured() {
        let http = DiscordHttp::new("http://localhost:1", None);
        let err = http.guild(Snowflake(1)).await.unwrap_err();
        assert!(matches!(err, PlatformError::NotConfigured));
    }

    #[tokio::test]
    async fn test_interaction_callback_has_no_bot_auth() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/interactions/9/tok/callback"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let http = DiscordHttp::new(&server.uri(), None);
        http.create_interaction_response(
            Snowflake(9),
            "tok",
            &InteractionResponse::message(CreateMessage::text("hi").ephemeral()),
        )
        .await
        .unwrap();
    }
}

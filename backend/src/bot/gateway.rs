//! WebSocket client for the platform gateway.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{interval, timeout};
use tokio_tungstenite::{connect_async, tungstenite::Message};

use rolegate_common::protocol::{intents, is_fatal_close_code, opcode};
use rolegate_common::{DispatchEvent, GatewayPayload, Hello, Identify};

use crate::platform::GuildCache;

use super::commands::CommandHandler;
use super::grant::RoleAssigner;

const HELLO_TIMEOUT: Duration = Duration::from_secs(30);

/// Intents the bot identifies with.
pub const BOT_INTENTS: u64 =
    intents::GUILDS | intents::GUILD_MEMBERS | intents::GUILD_MESSAGES | intents::MESSAGE_CONTENT;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("Invalid payload: {0}")]
    Payload(#[from] serde_json::Error),
    #[error("Handshake failed: {0}")]
    Handshake(String),
    #[error("Gateway closed the connection ({code}): {reason}")]
    Closed { code: u16, reason: String },
    #[error("Gateway requested a reconnect")]
    Reconnect,
    #[error("Gateway invalidated the session")]
    InvalidSession,
    #[error("Outbound queue closed")]
    QueueClosed,
}

impl GatewayError {
    /// Whether reconnecting is pointless (e.g. the token was rejected).
    pub fn is_fatal(&self) -> bool {
        matches!(self, GatewayError::Closed { code, .. } if is_fatal_close_code(*code))
    }
}

/// Gateway WebSocket client.
///
/// Keeps the guild cache in sync and forwards messages and interactions to
/// the command handler.
pub struct GatewayClient {
    gateway_url: String,
    token: String,
    reconnect_delay: Duration,
    cache: Arc<GuildCache>,
    assigner: RoleAssigner,
    commands: Arc<CommandHandler>,
    /// Last dispatch sequence, 0 until the first dispatch.
    sequence: Arc<AtomicU64>,
}

impl GatewayClient {
    pub fn new(
        gateway_url: String,
        token: String,
        reconnect_delay: Duration,
        cache: Arc<GuildCache>,
        assigner: RoleAssigner,
        commands: Arc<CommandHandler>,
    ) -> Self {
        Self {
            gateway_url,
            token,
            reconnect_delay,
            cache,
            assigner,
            commands,
            sequence: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Run with automatic reconnection until a fatal close code is received.
    pub async fn run(&self) {
        loop {
            tracing::info!("Connecting to gateway at {}", self.gateway_url);

            match self.connect_and_run().await {
                Ok(()) => {
                    tracing::info!("Gateway connection closed normally");
                }
                Err(e) if e.is_fatal() => {
                    tracing::error!("Bot stopped: {}. Check bot.token", e);
                    self.cache.on_disconnect().await;
                    return;
                }
                Err(e) => {
                    tracing::warn!("Gateway connection error: {}", e);
                }
            }

            self.cache.on_disconnect().await;
            tracing::info!(
                "Reconnecting in {} seconds...",
                self.reconnect_delay.as_secs()
            );
            tokio::time::sleep(self.reconnect_delay).await;
        }
    }

    fn last_sequence(&self) -> Option<u64> {
        match self.sequence.load(Ordering::Relaxed) {
            0 => None,
            s => Some(s),
        }
    }

    async fn connect_and_run(&self) -> Result<(), GatewayError> {
        let (ws_stream, _) = connect_async(self.gateway_url.as_str()).await?;
        let (mut write, mut read) = ws_stream.split();
        self.sequence.store(0, Ordering::Relaxed);

        let hello = match timeout(HELLO_TIMEOUT, read.next()).await {
            Ok(Some(Ok(Message::Text(text)))) => {
                let payload: GatewayPayload = serde_json::from_str(&text)?;
                if payload.op != opcode::HELLO {
                    return Err(GatewayError::Handshake(format!(
                        "expected Hello, got op {}",
                        payload.op
                    )));
                }
                serde_json::from_value::<Hello>(payload.d)?
            }
            Ok(Some(Ok(Message::Close(frame)))) => return Err(closed(frame)),
            Ok(Some(Ok(_))) => {
                return Err(GatewayError::Handshake("expected text frame".to_string()));
            }
            Ok(Some(Err(e))) => return Err(e.into()),
            Ok(None) => {
                return Err(GatewayError::Handshake(
                    "connection closed before Hello".to_string(),
                ));
            }
            Err(_) => return Err(GatewayError::Handshake("Hello timeout".to_string())),
        };

        let identify = GatewayPayload::identify(&Identify::new(self.token.clone(), BOT_INTENTS));
        write
            .send(Message::Text(serde_json::to_string(&identify)?))
            .await?;
        tracing::debug!(
            heartbeat_interval_ms = hello.heartbeat_interval,
            "Sent identify"
        );

        let (tx, mut rx) = mpsc::channel::<GatewayPayload>(32);

        let heartbeat_interval = Duration::from_millis(hello.heartbeat_interval.max(1));
        let heartbeat_tx = tx.clone();
        let sequence = self.sequence.clone();
        let heartbeat_handle = tokio::spawn(async move {
            let mut ticker = interval(heartbeat_interval);
            loop {
                ticker.tick().await;
                let last = match sequence.load(Ordering::Relaxed) {
                    0 => None,
                    s => Some(s),
                };
                if heartbeat_tx.send(GatewayPayload::heartbeat(last)).await.is_err() {
                    break;
                }
            }
        });

        let result = self.message_loop(&mut write, &mut read, &mut rx, &tx).await;

        heartbeat_handle.abort();

        result
    }

    async fn message_loop<S, R>(
        &self,
        write: &mut S,
        read: &mut R,
        rx: &mut mpsc::Receiver<GatewayPayload>,
        tx: &mpsc::Sender<GatewayPayload>,
    ) -> Result<(), GatewayError>
    where
        S: SinkExt<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
        R: StreamExt<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
    {
        loop {
            tokio::select! {
                Some(payload) = rx.recv() => {
                    write.send(Message::Text(serde_json::to_string(&payload)?)).await?;
                    tracing::trace!(op = payload.op, "Sent gateway payload");
                }

                Some(result) = read.next() => {
                    match result {
                        Ok(Message::Text(text)) => self.handle_payload(&text, tx).await?,
                        Ok(Message::Ping(data)) => {
                            write.send(Message::Pong(data)).await?;
                        }
                        Ok(Message::Close(frame)) => return Err(closed(frame)),
                        Ok(_) => {}
                        Err(e) => return Err(e.into()),
                    }
                }

                else => {
                    return Ok(());
                }
            }
        }
    }

    /// Handle one inbound frame. Errors end the connection.
    async fn handle_payload(
        &self,
        text: &str,
        tx: &mpsc::Sender<GatewayPayload>,
    ) -> Result<(), GatewayError> {
        let payload: GatewayPayload = match serde_json::from_str(text) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!("Ignoring malformed gateway frame: {}", e);
                return Ok(());
            }
        };
        if let Some(s) = payload.s {
            self.sequence.store(s, Ordering::Relaxed);
        }

        match payload.op {
            opcode::DISPATCH => {
                let Some(name) = payload.t else {
                    return Ok(());
                };
                match DispatchEvent::parse(&name, payload.d) {
                    Ok(event) => self.handle_event(event).await,
                    Err(e) => tracing::warn!(event = %name, "Failed to decode dispatch: {}", e),
                }
            }
            opcode::HEARTBEAT => {
                tx.send(GatewayPayload::heartbeat(self.last_sequence()))
                    .await
                    .map_err(|_| GatewayError::QueueClosed)?;
            }
            opcode::RECONNECT => return Err(GatewayError::Reconnect),
            opcode::INVALID_SESSION => return Err(GatewayError::InvalidSession),
            opcode::HEARTBEAT_ACK => tracing::trace!("Heartbeat acknowledged"),
            other => tracing::debug!(op = other, "Ignoring gateway opcode"),
        }
        Ok(())
    }

    async fn handle_event(&self, event: DispatchEvent) {
        match event {
            DispatchEvent::Ready(ready) => {
                tracing::info!(
                    "Logged in as {} (ID: {}), {} guild(s) pending",
                    ready.user.tag(),
                    ready.user.id,
                    ready.guilds.len()
                );
                if self.cache.on_ready(&ready).await {
                    self.log_ready().await;
                }
            }
            DispatchEvent::GuildCreate(guild) | DispatchEvent::GuildUpdate(guild) => {
                tracing::debug!(guild_id = %guild.id, "Guild available: {}", guild.name);
                if self.cache.upsert_guild(guild).await {
                    self.log_ready().await;
                }
            }
            DispatchEvent::GuildDelete(guild) => {
                if guild.unavailable {
                    tracing::warn!(guild_id = %guild.id, "Guild became unavailable");
                } else if let Some(removed) = self.cache.remove_guild(guild.id).await {
                    tracing::info!(guild_id = %guild.id, "Removed from guild {}", removed.name);
                }
            }
            DispatchEvent::GuildRoleCreate(event) | DispatchEvent::GuildRoleUpdate(event) => {
                self.cache.upsert_role(event.guild_id, event.role).await;
            }
            DispatchEvent::GuildRoleDelete(event) => {
                self.cache.remove_role(event.guild_id, event.role_id).await;
            }
            DispatchEvent::GuildMemberAdd(event) => {
                let name = event
                    .member
                    .user
                    .as_ref()
                    .map(|u| u.tag())
                    .unwrap_or_default();
                tracing::info!(guild_id = %event.guild_id, "{} joined the guild", name);
            }
            DispatchEvent::MessageCreate(message) => {
                let commands = self.commands.clone();
                tokio::spawn(async move { commands.handle_message(message).await });
            }
            DispatchEvent::InteractionCreate(interaction) => {
                let commands = self.commands.clone();
                tokio::spawn(async move { commands.handle_interaction(interaction).await });
            }
            DispatchEvent::Other(name) => {
                tracing::trace!(event = %name, "Unhandled dispatch");
            }
        }
    }

    /// Log the guild list and the auto-detected defaults once the cache is complete.
    async fn log_ready(&self) {
        let guilds = self.cache.guilds().await;
        let name = self
            .cache
            .bot_user()
            .await
            .map(|u| u.tag())
            .unwrap_or_default();
        tracing::info!("{} is ready in {} guild(s)", name, guilds.len());
        for guild in &guilds {
            tracing::info!(
                "  - {} (ID: {}, members: {})",
                guild.name,
                guild.id,
                guild
                    .member_count
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "?".to_string())
            );
        }

        match self.assigner.detect().await {
            Some(target) => {
                let guild = guilds.iter().find(|g| g.id == target.guild_id);
                let guild_name = guild.map(|g| g.name.as_str()).unwrap_or_default();
                tracing::info!(
                    "Auto-detected default guild \"{}\" (ID: {})",
                    guild_name,
                    target.guild_id
                );
                match target.role_id.and_then(|id| guild.and_then(|g| g.role(id))) {
                    Some(role) => tracing::info!(
                        "Auto-detected default role \"{}\" (ID: {})",
                        role.name,
                        role.id
                    ),
                    None => tracing::info!("No grantable role auto-detected"),
                }
            }
            None => tracing::info!("No guild auto-detected"),
        }
    }
}

fn closed(
    frame: Option<tokio_tungstenite::tungstenite::protocol::CloseFrame<'static>>,
) -> GatewayError {
    match frame {
        Some(frame) => GatewayError::Closed {
            code: u16::from(frame.code),
            reason: frame.reason.to_string(),
        },
        None => GatewayError::Closed {
            code: 1005,
            reason: String::new(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::bot::grant::TargetDefaults;
    use crate::directory::UserDirectory;
    use crate::platform::{DiscordHttp, DiscordPlatform};

    fn client() -> (GatewayClient, Arc<GuildCache>) {
        let cache = Arc::new(GuildCache::new());
        let http = Arc::new(DiscordHttp::new("http://localhost:1", Some("bot-token")));
        let platform = Arc::new(DiscordPlatform::new(http.clone(), cache.clone()));
        let assigner = RoleAssigner::new(platform, TargetDefaults::default(), Duration::ZERO);
        let commands = Arc::new(CommandHandler::new(
            http,
            assigner.clone(),
            Arc::new(UserDirectory::new()),
            "!".to_string(),
            "http://localhost:8080/login".to_string(),
        ));
        let client = GatewayClient::new(
            "ws://localhost:1".to_string(),
            "bot-token".to_string(),
            Duration::from_secs(5),
            cache.clone(),
            assigner,
            commands,
        );
        (client, cache)
    }

    fn frame(value: serde_json::Value) -> String {
        value.to_string()
    }

    #[test]
    fn test_fatal_close_codes() {
        let auth_failed = GatewayError::Closed {
            code: rolegate_common::protocol::CLOSE_AUTHENTICATION_FAILED,
            reason: "Authentication failed.".to_string(),
        };
        assert!(auth_failed.is_fatal());

        let resumable = GatewayError::Closed {
            code: 4000,
            reason: String::new(),
        };
        assert!(!resumable.is_fatal());
        assert!(!GatewayError::Reconnect.is_fatal());
    }

    #[test]
    fn test_intents_include_message_content() {
        assert_ne!(BOT_INTENTS & intents::MESSAGE_CONTENT, 0);
        assert_ne!(BOT_INTENTS & intents::GUILD_MEMBERS, 0);
    }

    #[tokio::test]
    async fn test_dispatch_populates_cache() {
        let (client, cache) = client();
        let (tx, _rx) = mpsc::channel(4);

        let ready = frame(json!({
            "op": 0, "s": 1, "t": "READY",
            "d": {
                "user": {"id": "1", "username": "rolegate", "bot": true},
                "guilds": [{"id": "10", "unavailable": true}],
                "session_id": "abc"
            }
        }));
        client.handle_payload(&ready, &tx).await.unwrap();
        assert!(!cache.is_ready().await);

        let guild_create = frame(json!({
            "op": 0, "s": 2, "t": "GUILD_CREATE",
            "d": {
                "id": "10", "name": "Test Guild", "owner_id": "5", "member_count": 3,
                "roles": [
                    {"id": "10", "name": "@everyone", "position": 0, "permissions": "0"},
                    {"id": "11", "name": "Member", "position": 1, "permissions": "0"}
                ]
            }
        }));
        client.handle_payload(&guild_create, &tx).await.unwrap();

        assert!(cache.is_ready().await);
        assert_eq!(client.last_sequence(), Some(2));
        let guild = cache.guild(rolegate_common::Snowflake(10)).await.unwrap();
        assert_eq!(guild.roles.len(), 2);

        let role_delete = frame(json!({
            "op": 0, "s": 3, "t": "GUILD_ROLE_DELETE",
            "d": {"guild_id": "10", "role_id": "11"}
        }));
        client.handle_payload(&role_delete, &tx).await.unwrap();
        let guild = cache.guild(rolegate_common::Snowflake(10)).await.unwrap();
        assert_eq!(guild.roles.len(), 1);
    }

    #[tokio::test]
    async fn test_heartbeat_request_echoes_sequence() {
        let (client, _cache) = client();
        let (tx, mut rx) = mpsc::channel(4);

        client
            .handle_payload(&frame(json!({"op": 0, "s": 7, "t": "TYPING_START", "d": {}})), &tx)
            .await
            .unwrap();
        client
            .handle_payload(&frame(json!({"op": 1, "d": null})), &tx)
            .await
            .unwrap();

        let heartbeat = rx.recv().await.unwrap();
        assert_eq!(heartbeat.op, opcode::HEARTBEAT);
        assert_eq!(heartbeat.d, json!(7));
    }

    #[tokio::test]
    async fn test_reconnect_and_invalid_session_end_connection() {
        let (client, _cache) = client();
        let (tx, _rx) = mpsc::channel(4);

        let err = client
            .handle_payload(&frame(json!({"op": 7, "d": null})), &tx)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Reconnect));

        let err = client
            .handle_payload(&frame(json!({"op": 9, "d": false})), &tx)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::InvalidSession));
    }

    #[tokio::test]
    async fn test_malformed_frame_is_ignored() {
        let (client, _cache) = client();
        let (tx, _rx) = mpsc::channel(4);
        assert!(client.handle_payload("not json", &tx).await.is_ok());
    }
}

//! Discord Gateway (websocket) intake.
//!
//! Maintains the persistent session the relay feeds from: identify or
//! resume, heartbeats with ACK tracking, and dispatch of the few events
//! Herald consumes (`READY`, `MESSAGE_CREATE`, `INTERACTION_CREATE`).
//! Normalized events are forwarded over an mpsc channel to the relay loop;
//! everything else is protocol plumbing handled here.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, trace, warn};

use herald_core::secrets::BotToken;
use herald_core::types::UserId;

use crate::discord::{DISCORD_API_BASE, DiscordInteraction, DiscordMessage};
use crate::discord::{normalize_interaction, normalize_message};
use crate::events::GatewayEvent;
use crate::traits::PlatformError;

/// Gateway intents: GUILDS | GUILD_MEMBERS | GUILD_MESSAGES | MESSAGE_CONTENT.
pub const INTENTS: u32 = (1 << 0) | (1 << 1) | (1 << 9) | (1 << 15);

const HELLO_TIMEOUT: Duration = Duration::from_secs(30);
const BACKOFF_BASE: Duration = Duration::from_secs(1);
const BACKOFF_MAX: Duration = Duration::from_secs(60);

/// Gateway opcodes.
mod opcode {
    /// Event dispatch (receive only).
    pub(super) const DISPATCH: u8 = 0;
    /// Heartbeat (bidirectional).
    pub(super) const HEARTBEAT: u8 = 1;
    /// Identify (send only).
    pub(super) const IDENTIFY: u8 = 2;
    /// Resume (send only).
    pub(super) const RESUME: u8 = 6;
    /// Server requests reconnect (receive only).
    pub(super) const RECONNECT: u8 = 7;
    /// Invalid session (receive only).
    pub(super) const INVALID_SESSION: u8 = 9;
    /// Hello, carries the heartbeat interval (receive only).
    pub(super) const HELLO: u8 = 10;
    /// Heartbeat ACK (receive only).
    pub(super) const HEARTBEAT_ACK: u8 = 11;
}

/// Close codes that cannot be recovered by reconnecting.
mod close_code {
    /// Bad token.
    pub(super) const AUTHENTICATION_FAILED: u16 = 4004;
    /// Invalid intents bitmask.
    pub(super) const INVALID_INTENTS: u16 = 4013;
    /// Intents not enabled in the developer portal.
    pub(super) const DISALLOWED_INTENTS: u16 = 4014;
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWriter = futures::stream::SplitSink<WsStream, WsMessage>;
type WsReader = futures::stream::SplitStream<WsStream>;

/// Raw Gateway payload.
#[derive(Debug, Clone, serde::Serialize, Deserialize)]
struct Payload {
    op: u8,
    #[serde(default)]
    d: Option<serde_json::Value>,
    #[serde(default)]
    s: Option<u64>,
    #[serde(default)]
    t: Option<String>,
}

/// Hello payload (`op=10`).
#[derive(Debug, Deserialize)]
struct Hello {
    heartbeat_interval: u64,
}

/// Ready event data (`t="READY"`).
#[derive(Debug, Deserialize)]
struct Ready {
    session_id: String,
    resume_gateway_url: String,
    user: ReadyUser,
}

/// Bot user object from READY.
#[derive(Debug, Deserialize)]
struct ReadyUser {
    id: String,
    username: String,
}

/// Response from `GET /gateway/bot`.
#[derive(Debug, Deserialize)]
struct GatewayBot {
    url: String,
}

fn identify_payload(token: &BotToken, intents: u32) -> Payload {
    Payload {
        op: opcode::IDENTIFY,
        d: Some(serde_json::json!({
            "token": token.expose(),
            "intents": intents,
            "properties": {
                "os": std::env::consts::OS,
                "browser": "herald",
                "device": "herald",
            },
        })),
        s: None,
        t: None,
    }
}

fn resume_payload(token: &BotToken, session_id: &str, sequence: u64) -> Payload {
    Payload {
        op: opcode::RESUME,
        d: Some(serde_json::json!({
            "token": token.expose(),
            "session_id": session_id,
            "seq": sequence,
        })),
        s: None,
        t: None,
    }
}

fn heartbeat_payload(sequence: Option<u64>) -> Payload {
    Payload {
        op: opcode::HEARTBEAT,
        d: sequence.map(serde_json::Value::from),
        s: None,
        t: None,
    }
}

/// Session state carried across reconnections.
#[derive(Debug, Default)]
struct Session {
    session_id: Option<String>,
    resume_url: Option<String>,
    sequence: Option<u64>,
    bot_user_id: Option<String>,
}

impl Session {
    fn can_resume(&self) -> bool {
        self.session_id.is_some() && self.resume_url.is_some()
    }

    /// Drop the session for a full re-identify; the sequence and bot id
    /// survive.
    fn clear(&mut self) {
        self.session_id = None;
        self.resume_url = None;
    }
}

/// What the outer reconnection loop should do next.
enum LoopOutcome {
    /// Reconnect and resume the session.
    Resume,
    /// Reconnect and identify from scratch.
    Reconnect,
    /// The event receiver is gone; stop entirely.
    Shutdown,
}

/// Discord Gateway intake task.
pub struct DiscordGateway {
    token: BotToken,
    intents: u32,
    http: reqwest::Client,
    session: Session,
}

impl DiscordGateway {
    /// Create a new Gateway intake with the default intents.
    #[must_use]
    pub fn new(token: BotToken) -> Self {
        Self {
            token,
            intents: INTENTS,
            http: reqwest::Client::new(),
            session: Session::default(),
        }
    }

    /// Run the intake until shutdown or a fatal error.
    ///
    /// Transient failures reconnect with exponential backoff (reset once a
    /// session is established). Returns `Ok(())` when the event receiver
    /// is dropped.
    ///
    /// # Errors
    ///
    /// Returns error on rejected authentication or disallowed intents.
    pub async fn run(mut self, events: mpsc::Sender<GatewayEvent>) -> Result<(), PlatformError> {
        let mut backoff = BACKOFF_BASE;

        loop {
            let outcome = match self.connect_once(&events).await {
                Ok(outcome) => outcome,
                Err(
                    e @ (PlatformError::AuthFailed(_) | PlatformError::Config(_)),
                ) => return Err(e),
                Err(e) => {
                    warn!(error = %e, "gateway connection error");
                    LoopOutcome::Reconnect
                }
            };

            match outcome {
                LoopOutcome::Shutdown => return Ok(()),
                LoopOutcome::Resume => {
                    info!("reconnecting to resume gateway session");
                    tokio::time::sleep(BACKOFF_BASE).await;
                }
                LoopOutcome::Reconnect => {
                    self.session.clear();
                    info!(delay_secs = backoff.as_secs(), "reconnecting to gateway");
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(BACKOFF_MAX);
                }
            }

            // A held session means the last connection reached READY.
            if self.session.can_resume() {
                backoff = BACKOFF_BASE;
            }
        }
    }

    /// Single connection attempt: connect, handshake, run the read loop.
    async fn connect_once(
        &mut self,
        events: &mpsc::Sender<GatewayEvent>,
    ) -> Result<LoopOutcome, PlatformError> {
        let base_url = match self.session.resume_url.clone() {
            Some(url) if self.session.can_resume() => url,
            _ => self.fetch_gateway_url().await?,
        };
        let ws_url = format!("{base_url}/?v=10&encoding=json");

        debug!(url = %ws_url, "connecting to gateway");
        let (ws, _response) = connect_async(&ws_url)
            .await
            .map_err(|e| PlatformError::Network(e.to_string()))?;
        let (mut writer, mut reader) = ws.split();

        let hello = wait_for_hello(&mut reader).await?;
        let interval = Duration::from_millis(hello.heartbeat_interval);

        // First beat is jittered across the interval so reconnecting bots
        // don't stampede.
        let first_beat =
            tokio::time::Instant::now() + interval.mul_f64(rand::random::<f64>());
        let mut heartbeat = tokio::time::interval_at(first_beat, interval);
        let mut acked = true;

        let auth = if self.session.can_resume() {
            let session_id = self.session.session_id.as_deref().unwrap_or_default();
            resume_payload(&self.token, session_id, self.session.sequence.unwrap_or(0))
        } else {
            identify_payload(&self.token, self.intents)
        };
        send(&mut writer, &auth).await?;

        loop {
            tokio::select! {
                _ = heartbeat.tick() => {
                    if !acked {
                        warn!("heartbeat ACK missed, dropping zombie connection");
                        return Ok(self.resume_or_reconnect());
                    }
                    acked = false;
                    send(&mut writer, &heartbeat_payload(self.session.sequence)).await?;
                }

                msg = reader.next() => match msg {
                    Some(Ok(WsMessage::Text(text))) => {
                        let payload: Payload = match serde_json::from_str(&text) {
                            Ok(p) => p,
                            Err(e) => {
                                warn!(error = %e, "unparseable gateway payload");
                                continue;
                            }
                        };

                        if let Some(outcome) = self
                            .handle_payload(payload, &mut writer, &mut acked, events)
                            .await?
                        {
                            return Ok(outcome);
                        }
                    }
                    Some(Ok(WsMessage::Close(frame))) => {
                        let code = frame.as_ref().map_or(1000, |f| f.code.into());
                        return self.classify_close(code);
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(error = %e, "gateway read error");
                        return Ok(self.resume_or_reconnect());
                    }
                    None => {
                        warn!("gateway stream ended");
                        return Ok(self.resume_or_reconnect());
                    }
                }
            }
        }
    }

    /// Handle one parsed payload; `Some(outcome)` breaks the read loop.
    async fn handle_payload(
        &mut self,
        payload: Payload,
        writer: &mut WsWriter,
        acked: &mut bool,
        events: &mpsc::Sender<GatewayEvent>,
    ) -> Result<Option<LoopOutcome>, PlatformError> {
        match payload.op {
            opcode::DISPATCH => Ok(self.handle_dispatch(payload, events).await),
            opcode::HEARTBEAT => {
                send(writer, &heartbeat_payload(self.session.sequence)).await?;
                Ok(None)
            }
            opcode::HEARTBEAT_ACK => {
                trace!("heartbeat ACK");
                *acked = true;
                Ok(None)
            }
            opcode::RECONNECT => {
                info!("gateway requested reconnect");
                Ok(Some(self.resume_or_reconnect()))
            }
            opcode::INVALID_SESSION => {
                let resumable = payload
                    .d
                    .as_ref()
                    .and_then(serde_json::Value::as_bool)
                    .unwrap_or(false);
                if resumable {
                    info!("invalid session, resuming");
                    Ok(Some(LoopOutcome::Resume))
                } else {
                    info!("invalid session, re-identifying");
                    self.session.clear();
                    Ok(Some(LoopOutcome::Reconnect))
                }
            }
            opcode::HELLO => {
                warn!("unexpected hello mid-session");
                Ok(None)
            }
            other => {
                debug!(op = other, "unknown gateway opcode");
                Ok(None)
            }
        }
    }

    /// Handle a dispatch event; `Some(outcome)` breaks the read loop.
    async fn handle_dispatch(
        &mut self,
        payload: Payload,
        events: &mpsc::Sender<GatewayEvent>,
    ) -> Option<LoopOutcome> {
        if let Some(seq) = payload.s {
            self.session.sequence = Some(seq);
        }

        match payload.t.as_deref().unwrap_or_default() {
            "READY" => {
                let Some(data) = payload.d else {
                    warn!("READY without data");
                    return None;
                };
                match serde_json::from_value::<Ready>(data) {
                    Ok(ready) => {
                        info!(bot = %ready.user.username, "gateway session established");
                        self.session.session_id = Some(ready.session_id);
                        self.session.resume_url = Some(ready.resume_gateway_url);
                        self.session.bot_user_id = Some(ready.user.id.clone());

                        let event = GatewayEvent::Ready {
                            bot_user_id: UserId::new(ready.user.id),
                            bot_name: ready.user.username,
                        };
                        if events.send(event).await.is_err() {
                            return Some(LoopOutcome::Shutdown);
                        }
                    }
                    Err(e) => warn!(error = %e, "unparseable READY payload"),
                }
                None
            }
            "RESUMED" => {
                info!("gateway session resumed");
                None
            }
            "MESSAGE_CREATE" => {
                let message = payload
                    .d
                    .and_then(|d| serde_json::from_value::<DiscordMessage>(d).ok())?;

                // The bot's own posts (the prompts) come straight back as
                // MESSAGE_CREATE; drop them here.
                if message.author.as_ref().is_some_and(|a| {
                    Some(a.id.as_str()) == self.session.bot_user_id.as_deref()
                }) {
                    trace!("dropping self message");
                    return None;
                }

                match normalize_message(message) {
                    Ok(normalized) => {
                        if events
                            .send(GatewayEvent::MessageCreated(normalized))
                            .await
                            .is_err()
                        {
                            return Some(LoopOutcome::Shutdown);
                        }
                    }
                    Err(e) => debug!(error = %e, "skipping message"),
                }
                None
            }
            "INTERACTION_CREATE" => {
                let interaction = payload
                    .d
                    .and_then(|d| serde_json::from_value::<DiscordInteraction>(d).ok())?;

                if let Some(activation) = normalize_interaction(interaction) {
                    if events
                        .send(GatewayEvent::ControlActivated(activation))
                        .await
                        .is_err()
                    {
                        return Some(LoopOutcome::Shutdown);
                    }
                }
                None
            }
            other => {
                trace!(event = other, "ignoring gateway dispatch");
                None
            }
        }
    }

    /// Classify a close code into the next loop action.
    fn classify_close(&mut self, code: u16) -> Result<LoopOutcome, PlatformError> {
        match code {
            close_code::AUTHENTICATION_FAILED => Err(PlatformError::AuthFailed(format!(
                "gateway rejected the bot token (close {code})"
            ))),
            close_code::INVALID_INTENTS | close_code::DISALLOWED_INTENTS => {
                Err(PlatformError::Config(format!(
                    "gateway rejected the configured intents (close {code})"
                )))
            }
            1000 | 1001 => {
                info!(code, "gateway closed normally");
                self.session.clear();
                Ok(LoopOutcome::Reconnect)
            }
            _ => {
                warn!(code, "gateway closed");
                Ok(self.resume_or_reconnect())
            }
        }
    }

    fn resume_or_reconnect(&self) -> LoopOutcome {
        if self.session.can_resume() {
            LoopOutcome::Resume
        } else {
            LoopOutcome::Reconnect
        }
    }

    /// Fetch the websocket URL from the REST API.
    async fn fetch_gateway_url(&self) -> Result<String, PlatformError> {
        let response = self
            .http
            .get(format!("{DISCORD_API_BASE}/gateway/bot"))
            .header("Authorization", format!("Bot {}", self.token.expose()))
            .send()
            .await
            .map_err(|e| PlatformError::Network(e.to_string()))?;

        if response.status().as_u16() == 401 {
            return Err(PlatformError::AuthFailed(
                "gateway URL fetch rejected the bot token".to_string(),
            ));
        }
        if !response.status().is_success() {
            return Err(PlatformError::Network(format!(
                "{} on /gateway/bot",
                response.status()
            )));
        }

        let body: GatewayBot = response
            .json()
            .await
            .map_err(|e| PlatformError::Network(e.to_string()))?;
        Ok(body.url)
    }
}

/// Send a payload as JSON text.
async fn send(writer: &mut WsWriter, payload: &Payload) -> Result<(), PlatformError> {
    let json =
        serde_json::to_string(payload).map_err(|e| PlatformError::Protocol(e.to_string()))?;
    writer
        .send(WsMessage::Text(json.into()))
        .await
        .map_err(|e| PlatformError::Network(e.to_string()))
}

/// Read frames until the Hello payload arrives.
async fn wait_for_hello(reader: &mut WsReader) -> Result<Hello, PlatformError> {
    let hello_fut = async {
        loop {
            match reader.next().await {
                Some(Ok(WsMessage::Text(text))) => {
                    let payload: Payload = serde_json::from_str(&text)
                        .map_err(|e| PlatformError::Protocol(e.to_string()))?;
                    if payload.op == opcode::HELLO {
                        let data = payload.d.ok_or_else(|| {
                            PlatformError::Protocol("hello without data".to_string())
                        })?;
                        return serde_json::from_value::<Hello>(data)
                            .map_err(|e| PlatformError::Protocol(e.to_string()));
                    }
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(PlatformError::Network(e.to_string())),
                None => {
                    return Err(PlatformError::Network(
                        "connection closed before hello".to_string(),
                    ));
                }
            }
        }
    };

    tokio::time::timeout(HELLO_TIMEOUT, hello_fut)
        .await
        .map_err(|_| PlatformError::Network("timed out waiting for gateway hello".to_string()))?
}

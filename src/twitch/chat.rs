use crate::error::{BotError, BotResult};
use crate::event::BotEvent;
use crate::twitch::irc::{self, Inbound};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

pub const TWITCH_IRC_WS: &str = "wss://irc-ws.chat.twitch.tv:443";
const OUTGOING_BUFFER: usize = 64;

/// Where the bot's chat replies go.
#[async_trait]
pub trait ChatSink: Send + Sync {
    /// Sends `text` to the joined channel. Failures are logged, not returned.
    async fn say(&self, text: &str);
}

/// Cloneable handle for writing into the joined channel.
#[derive(Clone)]
pub struct ChatHandle {
    channel: String,
    outgoing: mpsc::Sender<String>,
}

#[async_trait]
impl ChatSink for ChatHandle {
    async fn say(&self, text: &str) {
        info!("[chat] {}", text);
        if self.outgoing.send(irc::privmsg(&self.channel, text)).await.is_err() {
            error!("Cannot send message, the chat connection is closed");
        }
    }
}

/// Opens the chat connection, logs in, and joins `channel`.
///
/// Incoming viewer messages are forwarded to `events`; `ChatClosed` is sent
/// once the connection ends for any reason.
pub async fn connect(
    login: &str,
    access_token: &str,
    channel: &str,
    events: mpsc::Sender<BotEvent>,
) -> BotResult<ChatHandle> {
    let (ws, _response) = connect_async(TWITCH_IRC_WS)
        .await
        .map_err(|e| BotError::Chat(format!("WebSocket connect failed: {}", e)))?;
    info!("Connected to {}", TWITCH_IRC_WS);

    let (mut write, mut read) = ws.split();
    let (out_tx, mut out_rx) = mpsc::channel::<String>(OUTGOING_BUFFER);

    for line in [
        "CAP REQ :twitch.tv/tags twitch.tv/commands".to_string(),
        format!("PASS oauth:{}", access_token),
        format!("NICK {}", login),
        format!("JOIN #{}", channel),
    ] {
        write
            .send(Message::Text(line))
            .await
            .map_err(|e| BotError::Chat(format!("login failed: {}", e)))?;
    }

    // Writer: everything outgoing funnels through one task
    tokio::spawn(async move {
        while let Some(line) = out_rx.recv().await {
            debug!("> {}", line);
            if let Err(e) = write.send(Message::Text(line)).await {
                error!("Chat write failed: {}", e);
                break;
            }
        }
    });

    // Reader
    let own_login = login.to_string();
    let pong_tx = out_tx.clone();
    tokio::spawn(async move {
        while let Some(frame) = read.next().await {
            let text = match frame {
                Ok(Message::Text(text)) => text,
                Ok(Message::Close(frame)) => {
                    warn!("Chat connection closed by server: {:?}", frame);
                    break;
                }
                Ok(_) => continue,
                Err(e) => {
                    error!("Chat read failed: {}", e);
                    break;
                }
            };

            let mut keep_going = true;
            for line in text.split("\r\n").filter(|l| !l.is_empty()) {
                debug!("< {}", line);
                match irc::classify(line, &own_login) {
                    Inbound::Pong(reply) => {
                        let _ = pong_tx.send(reply).await;
                    }
                    Inbound::Chat(msg) => {
                        if events.send(BotEvent::Chat(msg)).await.is_err() {
                            keep_going = false;
                        }
                    }
                    Inbound::Joined(channel) => {
                        let _ = events.send(BotEvent::Joined(channel)).await;
                    }
                    Inbound::AuthFailed(reason) => {
                        error!("Chat login rejected: {}", reason);
                        keep_going = false;
                    }
                    Inbound::Reconnect => {
                        warn!("Chat server requested a reconnect");
                        keep_going = false;
                    }
                    Inbound::Ignore => {}
                }
            }
            if !keep_going {
                break;
            }
        }
        let _ = events.send(BotEvent::ChatClosed).await;
    });

    Ok(ChatHandle {
        channel: channel.to_string(),
        outgoing: out_tx,
    })
}

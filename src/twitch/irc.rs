use crate::models::ChatMessage;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // [@tags ][:prefix ]COMMAND[ params]
    static ref IRC_LINE: Regex =
        Regex::new(r"^(?:@(?P<tags>\S+) +)?(?::(?P<prefix>\S+) +)?(?P<command>[A-Za-z]+|\d{3})(?P<rest>.*)$")
            .expect("IRC line pattern is valid");
}

/// A parsed IRC line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrcMessage {
    pub tags: Option<String>,
    pub prefix: Option<String>,
    pub command: String,
    pub params: Vec<String>,
}

impl IrcMessage {
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        let caps = IRC_LINE.captures(line)?;

        let mut params = Vec::new();
        let mut rest = caps.name("rest").map_or("", |m| m.as_str());
        loop {
            rest = rest.trim_start_matches(' ');
            if rest.is_empty() {
                break;
            }
            if let Some(trailing) = rest.strip_prefix(':') {
                params.push(trailing.to_string());
                break;
            }
            match rest.split_once(' ') {
                Some((param, tail)) => {
                    params.push(param.to_string());
                    rest = tail;
                }
                None => {
                    params.push(rest.to_string());
                    break;
                }
            }
        }

        Some(Self {
            tags: caps.name("tags").map(|m| m.as_str().to_string()),
            prefix: caps.name("prefix").map(|m| m.as_str().to_string()),
            command: caps["command"].to_uppercase(),
            params,
        })
    }

    /// Nickname part of `nick!user@host`.
    pub fn nick(&self) -> Option<&str> {
        self.prefix
            .as_deref()
            .and_then(|prefix| prefix.split(['!', '@']).next())
            .filter(|nick| !nick.is_empty())
    }

    pub fn tag(&self, name: &str) -> Option<&str> {
        self.tags
            .as_deref()?
            .split(';')
            .filter_map(|pair| pair.split_once('='))
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value)
    }

    /// Converts a `PRIVMSG #channel :text` into a chat message.
    pub fn to_chat_message(&self) -> Option<ChatMessage> {
        if self.command != "PRIVMSG" || self.params.len() < 2 {
            return None;
        }
        let user = self.nick()?.to_lowercase();
        Some(ChatMessage {
            display_name: self.tag("display-name").filter(|n| !n.is_empty()).unwrap_or(&user).to_string(),
            user,
            channel: self.params[0].trim_start_matches('#').to_string(),
            text: self.params[1].clone(),
        })
    }
}

/// What the connection should do with an incoming line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// Reply with this line.
    Pong(String),
    Chat(ChatMessage),
    /// Our own JOIN was acknowledged.
    Joined(String),
    /// The server refused our credentials.
    AuthFailed(String),
    /// The server asked us to reconnect.
    Reconnect,
    Ignore,
}

pub fn classify(line: &str, own_login: &str) -> Inbound {
    let Some(msg) = IrcMessage::parse(line) else {
        return Inbound::Ignore;
    };

    match msg.command.as_str() {
        "PING" => {
            let token = msg.params.first().map(String::as_str).unwrap_or("tmi.twitch.tv");
            Inbound::Pong(format!("PONG :{}", token))
        }
        "PRIVMSG" => match msg.to_chat_message() {
            // Own messages are never counted
            Some(chat) if !chat.user.eq_ignore_ascii_case(own_login) => Inbound::Chat(chat),
            _ => Inbound::Ignore,
        },
        "JOIN" if msg.nick().is_some_and(|n| n.eq_ignore_ascii_case(own_login)) => {
            let channel = msg.params.first().cloned().unwrap_or_default();
            Inbound::Joined(channel.trim_start_matches('#').to_string())
        }
        "NOTICE" => {
            let text = msg.params.last().cloned().unwrap_or_default();
            if text.contains("authentication failed") || text.contains("Improperly formatted auth") {
                Inbound::AuthFailed(text)
            } else {
                Inbound::Ignore
            }
        }
        "RECONNECT" => Inbound::Reconnect,
        _ => Inbound::Ignore,
    }
}

/// Builds a PRIVMSG line. IRC lines cannot carry newlines, so they are flattened.
pub fn privmsg(channel: &str, text: &str) -> String {
    let flat: String = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" | ");
    format!("PRIVMSG #{} :{}", channel, flat)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_privmsg_with_tags() {
        let line = "@badge-info=;display-name=Alice;mod=0 :alice!alice@alice.tmi.twitch.tv PRIVMSG #chan :hello there\r\n";
        let msg = IrcMessage::parse(line).unwrap();

        assert_eq!(msg.command, "PRIVMSG");
        assert_eq!(msg.nick(), Some("alice"));
        assert_eq!(msg.tag("display-name"), Some("Alice"));
        assert_eq!(msg.tag("missing"), None);
        assert_eq!(msg.params, vec!["#chan", "hello there"]);

        let chat = msg.to_chat_message().unwrap();
        assert_eq!(chat.user, "alice");
        assert_eq!(chat.display_name, "Alice");
        assert_eq!(chat.channel, "chan");
        assert_eq!(chat.text, "hello there");
    }

    #[test]
    fn parses_numeric_and_middle_params() {
        let msg = IrcMessage::parse(":tmi.twitch.tv 001 botname :Welcome, GLHF!").unwrap();
        assert_eq!(msg.command, "001");
        assert_eq!(msg.params, vec!["botname", "Welcome, GLHF!"]);
        assert!(IrcMessage::parse("").is_none());
    }

    #[test]
    fn classify_ping_and_own_messages() {
        assert_eq!(classify("PING :tmi.twitch.tv", "bot"), Inbound::Pong("PONG :tmi.twitch.tv".to_string()));
        assert_eq!(classify(":bot!bot@bot.tmi.twitch.tv PRIVMSG #chan :A", "bot"), Inbound::Ignore);
        assert!(matches!(
            classify(":viewer!viewer@viewer.tmi.twitch.tv PRIVMSG #chan :A", "bot"),
            Inbound::Chat(ChatMessage { ref user, .. }) if user == "viewer"
        ));
    }

    #[test]
    fn classify_join_and_auth_failure() {
        assert_eq!(
            classify(":bot!bot@bot.tmi.twitch.tv JOIN #chan", "bot"),
            Inbound::Joined("chan".to_string())
        );
        assert_eq!(classify(":other!other@other.tmi.twitch.tv JOIN #chan", "bot"), Inbound::Ignore);
        assert!(matches!(
            classify(":tmi.twitch.tv NOTICE * :Login authentication failed", "bot"),
            Inbound::AuthFailed(_)
        ));
        assert_eq!(classify(":tmi.twitch.tv RECONNECT", "bot"), Inbound::Reconnect);
    }

    #[test]
    fn privmsg_flattens_newlines() {
        assert_eq!(privmsg("chan", "Queue:\n1. a\n2. b"), "PRIVMSG #chan :Queue: | 1. a | 2. b");
    }
}

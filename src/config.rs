use std::env;
use std::path::PathBuf;

use crate::error::ConfigError;

pub const DEFAULT_VOTE_SECONDS: u32 = 60;
pub const DEFAULT_WARNING_SECONDS: u32 = 10;
pub const DEFAULT_REDIRECT_PORT: u16 = 3000;
pub const DEFAULT_TOKEN_FILE: &str = "tokens.json";
pub const DEFAULT_RESULTS_FILE: &str = "vote_results.txt";
pub const DEFAULT_GROUPED_FILE: &str = "vote_results_by_choice.txt";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFlow {
    /// Device-code grant: the operator types a short code on twitch.tv/activate.
    Device,
    /// Implicit grant with a loopback redirect listener.
    Implicit,
}

/// Settings for one bot process, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub channel: String,
    pub client_id: String,
    pub client_secret: Option<String>,
    pub access_token: Option<String>,
    pub auth_flow: AuthFlow,
    pub redirect_port: u16,
    pub token_file: PathBuf,
    pub vote_choices: Vec<String>,
    pub queue_keywords: Vec<String>,
    pub vote_seconds: u32,
    pub warning_seconds: u32,
    pub results_file: PathBuf,
    pub grouped_file: PathBuf,
    pub subscriber_bonus: bool,
    pub greeting: Option<String>,
}

impl Config {
    /// Reads the configuration from the process environment.
    /// Call `dotenvy::dotenv()` first if a `.env` file should be honoured.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Empty values count as unset
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let channel = get("TWITCH_CHANNEL")
            .map(|c| c.trim_start_matches('#').to_lowercase())
            .ok_or(ConfigError::Missing("TWITCH_CHANNEL"))?;
        let client_id = get("TWITCH_CLIENT_ID").ok_or(ConfigError::Missing("TWITCH_CLIENT_ID"))?;

        let auth_flow = match get("VOTEBOT_AUTH_FLOW").as_deref() {
            None | Some("device") => AuthFlow::Device,
            Some("implicit") => AuthFlow::Implicit,
            Some(other) => {
                return Err(ConfigError::Unsupported {
                    name: "VOTEBOT_AUTH_FLOW",
                    value: other.to_string(),
                });
            }
        };

        let subscriber_bonus = match get("VOTEBOT_SUBSCRIBER_BONUS").as_deref() {
            None => true,
            Some(v) => match v.to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => {
                    return Err(ConfigError::Unsupported {
                        name: "VOTEBOT_SUBSCRIBER_BONUS",
                        value: v.to_string(),
                    });
                }
            },
        };

        Ok(Self {
            channel,
            client_id,
            client_secret: get("TWITCH_CLIENT_SECRET"),
            access_token: get("TWITCH_ACCESS_TOKEN"),
            auth_flow,
            redirect_port: parse_number(get("VOTEBOT_REDIRECT_PORT"), "VOTEBOT_REDIRECT_PORT", DEFAULT_REDIRECT_PORT)?,
            token_file: PathBuf::from(get("VOTEBOT_TOKEN_FILE").unwrap_or_else(|| DEFAULT_TOKEN_FILE.to_string())),
            vote_choices: get("VOTEBOT_VOTE_CHOICES").map(|s| parse_list(&s)).unwrap_or_default(),
            queue_keywords: get("VOTEBOT_QUEUE_KEYWORDS").map(|s| parse_list(&s)).unwrap_or_default(),
            vote_seconds: parse_number(get("VOTEBOT_VOTE_SECONDS"), "VOTEBOT_VOTE_SECONDS", DEFAULT_VOTE_SECONDS)?,
            warning_seconds: parse_number(get("VOTEBOT_WARNING_SECONDS"), "VOTEBOT_WARNING_SECONDS", DEFAULT_WARNING_SECONDS)?,
            results_file: PathBuf::from(get("VOTEBOT_RESULTS_FILE").unwrap_or_else(|| DEFAULT_RESULTS_FILE.to_string())),
            grouped_file: PathBuf::from(get("VOTEBOT_GROUPED_FILE").unwrap_or_else(|| DEFAULT_GROUPED_FILE.to_string())),
            subscriber_bonus,
            greeting: get("VOTEBOT_GREETING"),
        })
    }
}

fn parse_number<T: std::str::FromStr>(
    raw: Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::NotAnInteger { name, value }),
    }
}

/// Splits a comma-separated list of choices or keywords. Entries are trimmed,
/// upper-cased, and empty entries dropped, so " a, b ,," becomes ["A", "B"].
pub fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|item| item.trim().to_uppercase())
        .filter(|item| !item.is_empty())
        .collect()
}

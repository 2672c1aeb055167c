use crate::config::{AuthFlow, Config};
use crate::error::{AuthError, BotError, BotResult};
use crate::twitch::loopback;
use log::{debug, error, info, warn};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};
use url::Url;
use uuid::Uuid;

pub const AUTH_ENDPOINT: &str = "https://id.twitch.tv/oauth2";
pub const SCOPES: &str = "channel:read:subscriptions chat:read chat:edit";
const DEVICE_GRANT: &str = "urn:ietf:params:oauth:grant-type:device_code";
const SLOW_DOWN_STEP_SECS: u64 = 5;

/// Response of `POST /oauth2/device`.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceCode {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: String,
    pub expires_in: u64,
    pub interval: u64,
}

/// Tokens as cached on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tokens {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    message: String,
}

/// Response of `GET /oauth2/validate`.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenInfo {
    pub client_id: String,
    #[serde(default)]
    pub login: Option<String>,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub expires_in: u64,
}

/// What one device-code poll told us.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStep {
    Pending,
    SlowDown,
    Granted(Tokens),
}

/// Maps the `message` of a 400 from the token endpoint.
pub fn classify_poll_error(message: &str) -> Result<PollStep, AuthError> {
    match message {
        "authorization_pending" => Ok(PollStep::Pending),
        "slow_down" => Ok(PollStep::SlowDown),
        "authorization_declined" | "access_denied" => Err(AuthError::Declined),
        "expired_token" => Err(AuthError::Expired),
        other => Err(AuthError::Rejected(other.to_string())),
    }
}

/// A usable token and the account it belongs to.
#[derive(Debug, Clone)]
pub struct Session {
    pub tokens: Tokens,
    pub login: String,
}

pub struct TwitchAuth {
    client: Client,
    endpoint: String,
    client_id: String,
    client_secret: Option<String>,
}

impl TwitchAuth {
    pub fn new(client_id: &str, client_secret: Option<&str>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            endpoint: AUTH_ENDPOINT.to_string(),
            client_id: client_id.to_string(),
            client_secret: client_secret.map(str::to_string),
        }
    }

    fn token_form<'a>(&'a self, extra: &[(&'a str, &'a str)]) -> Vec<(&'a str, &'a str)> {
        let mut form = vec![("client_id", self.client_id.as_str())];
        if let Some(secret) = &self.client_secret {
            form.push(("client_secret", secret.as_str()));
        }
        form.extend_from_slice(extra);
        form
    }

    pub async fn request_device_code(&self) -> BotResult<DeviceCode> {
        let response = self
            .client
            .post(format!("{}/device", self.endpoint))
            .form(&[("client_id", self.client_id.as_str()), ("scopes", SCOPES)])
            .send()
            .await?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Rejected(body).into());
        }
        Ok(response.json().await?)
    }

    /// Asks the token endpoint once whether the device code has been approved.
    pub async fn poll_once(&self, device_code: &str) -> BotResult<PollStep> {
        let form = self.token_form(&[
            ("device_code", device_code),
            ("grant_type", DEVICE_GRANT),
            ("scopes", SCOPES),
        ]);
        let response = self
            .client
            .post(format!("{}/token", self.endpoint))
            .form(&form)
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => {
                let token: TokenResponse = response.json().await?;
                Ok(PollStep::Granted(Tokens {
                    access_token: token.access_token,
                    refresh_token: token.refresh_token,
                }))
            }
            StatusCode::BAD_REQUEST => {
                let body: ErrorResponse = response.json().await?;
                Ok(classify_poll_error(&body.message)?)
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(AuthError::Rejected(format!("HTTP {}: {}", status, body)).into())
            }
        }
    }

    /// Polls until the user approves, declines, or the code expires.
    pub async fn poll_for_token(&self, device: &DeviceCode) -> BotResult<Tokens> {
        let deadline = Instant::now() + Duration::from_secs(device.expires_in);
        let mut interval = device.interval.max(1);

        loop {
            tokio::time::sleep(Duration::from_secs(interval)).await;
            if Instant::now() >= deadline {
                return Err(AuthError::Expired.into());
            }

            match self.poll_once(&device.device_code).await? {
                PollStep::Granted(tokens) => return Ok(tokens),
                PollStep::Pending => debug!("Authorization pending"),
                PollStep::SlowDown => {
                    interval += SLOW_DOWN_STEP_SECS;
                    debug!("Asked to slow down, polling every {}s", interval);
                }
            }
        }
    }

    pub async fn device_flow(&self) -> BotResult<Tokens> {
        let device = self.request_device_code().await?;
        println!("To sign in, open {} and enter the code {}", device.verification_uri, device.user_code);
        println!("The code expires in {} seconds.", device.expires_in);
        self.poll_for_token(&device).await
    }

    pub fn authorize_url(&self, redirect_uri: &str, state: &str) -> BotResult<Url> {
        let url = Url::parse_with_params(
            &format!("{}/authorize", self.endpoint),
            &[
                ("response_type", "token"),
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", redirect_uri),
                ("scope", SCOPES),
                ("state", state),
            ],
        )
        .map_err(|e| AuthError::Rejected(format!("bad authorize URL: {}", e)))?;
        Ok(url)
    }

    /// Browser-redirect flow. The token comes back through a loopback listener.
    pub async fn implicit_flow(&self, port: u16) -> BotResult<Tokens> {
        let state = Uuid::new_v4().to_string();
        let redirect_uri = format!("http://localhost:{}", port);
        let url = self.authorize_url(&redirect_uri, &state)?;
        println!("To sign in, open this URL in your browser:\n{}", url);

        let access_token = loopback::wait_for_token(port, &state).await?;
        Ok(Tokens {
            access_token,
            refresh_token: None,
        })
    }

    pub async fn refresh(&self, refresh_token: &str) -> BotResult<Tokens> {
        let form = self.token_form(&[
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ]);
        let response = self
            .client
            .post(format!("{}/token", self.endpoint))
            .form(&form)
            .send()
            .await?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Rejected(body).into());
        }
        let token: TokenResponse = response.json().await?;
        Ok(Tokens {
            access_token: token.access_token,
            // Twitch may omit a new refresh token; keep using the old one
            refresh_token: token.refresh_token.or_else(|| Some(refresh_token.to_string())),
        })
    }

    /// `Ok(None)` means the token is no longer valid.
    pub async fn validate(&self, access_token: &str) -> BotResult<Option<TokenInfo>> {
        let response = self
            .client
            .get(format!("{}/validate", self.endpoint))
            .header("Authorization", format!("OAuth {}", access_token))
            .send()
            .await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            return Ok(None);
        }
        Ok(Some(response.error_for_status()?.json().await?))
    }

    /// Finds a working token: the configured one, the cached one, a refreshed
    /// one, or finally a fresh interactive sign-in. Anything obtained through
    /// OAuth is written back to the token cache.
    pub async fn resolve(&self, config: &Config) -> BotResult<Session> {
        if let Some(token) = &config.access_token {
            let tokens = Tokens {
                access_token: token.trim_start_matches("oauth:").to_string(),
                refresh_token: None,
            };
            return self.session_for(tokens).await;
        }

        if let Some(cached) = load_tokens(&config.token_file) {
            match self.validate(&cached.access_token).await {
                Ok(Some(info)) => {
                    info!("Using cached token");
                    return Ok(session_from(cached, info));
                }
                Ok(None) => info!("Cached token is no longer valid"),
                Err(e) => warn!("Could not validate cached token: {}", e),
            }

            if let Some(refresh_token) = &cached.refresh_token {
                match self.refresh(refresh_token).await {
                    Ok(tokens) => {
                        info!("Refreshed access token");
                        self.store(config, &tokens);
                        return self.session_for(tokens).await;
                    }
                    Err(e) => warn!("Token refresh failed: {}", e),
                }
            }
        }

        let tokens = match config.auth_flow {
            AuthFlow::Device => self.device_flow().await?,
            AuthFlow::Implicit => self.implicit_flow(config.redirect_port).await?,
        };
        info!("Signed in");
        self.store(config, &tokens);
        self.session_for(tokens).await
    }

    async fn session_for(&self, tokens: Tokens) -> BotResult<Session> {
        match self.validate(&tokens.access_token).await? {
            Some(info) => Ok(session_from(tokens, info)),
            None => Err(AuthError::Expired.into()),
        }
    }

    fn store(&self, config: &Config, tokens: &Tokens) {
        if let Err(e) = save_tokens(&config.token_file, tokens) {
            error!("Could not save tokens to {}: {}", config.token_file.display(), e);
        }
    }
}

/// Scopes the token must carry for the bot to read and write chat.
pub fn missing_scopes(info: &TokenInfo) -> Vec<&'static str> {
    SCOPES
        .split(' ')
        .filter(|scope| !info.scopes.iter().any(|s| s == scope))
        .collect()
}

fn session_from(tokens: Tokens, info: TokenInfo) -> Session {
    info!("Token issued to client {} expires in {}s", info.client_id, info.expires_in);
    let missing = missing_scopes(&info);
    if !missing.is_empty() {
        warn!("Token is missing scope(s) {:?}; some features will not work", missing);
    }
    let login = info.login.unwrap_or_default().to_lowercase();
    Session { tokens, login }
}

/// Returns the cached tokens, or `None` if the file is missing or unreadable.
pub fn load_tokens(path: &Path) -> Option<Tokens> {
    let raw = fs::read_to_string(path).ok()?;
    match serde_json::from_str(&raw) {
        Ok(tokens) => Some(tokens),
        Err(e) => {
            warn!("Ignoring malformed token file {}: {}", path.display(), e);
            None
        }
    }
}

pub fn save_tokens(path: &Path, tokens: &Tokens) -> BotResult<()> {
    let raw = serde_json::to_string_pretty(tokens)?;
    fs::write(path, raw).map_err(BotError::from)
}

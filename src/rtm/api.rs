//! RTM HTTP API client - session start, channel/user lookups, message fetch.

use serde::{Deserialize, Serialize};
use tracing::info;

pub struct RtmApi {
    api_base: String,
    token: String,
    http: reqwest::Client,
}

/// The bot's own identity, as reported by `rtm.start`.
#[derive(Debug, Clone)]
pub struct BotIdentity {
    pub uid: String,
    pub name: String,
}

/// Identity plus the websocket host to connect the event stream to.
#[derive(Debug, Clone)]
pub struct RtmSession {
    pub me: BotIdentity,
    pub ws_host: String,
}

/// A historical message fetched by channel + refer key.
#[derive(Debug, Clone)]
pub struct ReferencedMessage {
    pub text: String,
    pub created_ts: f64,
}

#[derive(Serialize)]
struct TokenBody<'a> {
    token: &'a str,
}

#[derive(Serialize)]
struct P2pCreateBody<'a> {
    token: &'a str,
    user_id: &'a str,
}

#[derive(Serialize)]
struct UserInfoBody<'a> {
    token: &'a str,
    user_id: &'a str,
}

#[derive(Serialize)]
struct MessageInfoBody<'a> {
    token: &'a str,
    vchannel_id: &'a str,
    message_key: &'a str,
}

#[derive(Deserialize)]
struct StartResponse {
    user: StartUser,
    ws_host: String,
}

#[derive(Deserialize)]
struct StartUser {
    id: String,
    name: String,
}

#[derive(Deserialize)]
struct P2pCreateResponse {
    vchannel_id: String,
}

#[derive(Deserialize)]
struct UserInfoResponse {
    name: String,
}

#[derive(Deserialize)]
struct MessageInfoResponse {
    text: String,
    created_ts: f64,
}

impl RtmApi {
    pub fn new(api_base: &str, token: &str) -> Self {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .expect("Failed to build HTTP client");
        Self {
            api_base: api_base.to_string(),
            token: token.to_string(),
            http,
        }
    }

    async fn post<B: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        method: &str,
        body: &B,
    ) -> Result<R, RtmError> {
        let url = format!("{}/{}", self.api_base, method);
        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| RtmError::Http(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(RtmError::Api(format!("{method}: {status}: {text}")));
        }

        response
            .json()
            .await
            .map_err(|e| RtmError::Parse(format!("{method}: {e}")))
    }

    /// Authenticate and obtain the bot identity plus the websocket host.
    pub async fn start(&self) -> Result<RtmSession, RtmError> {
        let response: StartResponse = self
            .post("rtm.start", &TokenBody { token: &self.token })
            .await?;
        info!("RTM session started as {} ({})", response.user.name, response.user.id);
        Ok(RtmSession {
            me: BotIdentity {
                uid: response.user.id,
                name: response.user.name,
            },
            ws_host: response.ws_host,
        })
    }

    /// Open (or look up) the private channel with `user_id`.
    pub async fn p2p_create(&self, user_id: &str) -> Result<String, RtmError> {
        let response: P2pCreateResponse = self
            .post("p2p.create", &P2pCreateBody { token: &self.token, user_id })
            .await?;
        Ok(response.vchannel_id)
    }

    /// Resolve a user's display name.
    pub async fn user_name(&self, user_id: &str) -> Result<String, RtmError> {
        let response: UserInfoResponse = self
            .post("user.info", &UserInfoBody { token: &self.token, user_id })
            .await?;
        Ok(response.name)
    }

    /// Fetch a historical message by channel + refer key.
    pub async fn message_info(
        &self,
        vchannel_id: &str,
        message_key: &str,
    ) -> Result<ReferencedMessage, RtmError> {
        let response: MessageInfoResponse = self
            .post(
                "message.info",
                &MessageInfoBody { token: &self.token, vchannel_id, message_key },
            )
            .await?;
        Ok(ReferencedMessage {
            text: response.text,
            created_ts: response.created_ts,
        })
    }
}

#[derive(Debug)]
pub enum RtmError {
    Http(String),
    Api(String),
    Parse(String),
    /// The websocket connection ended.
    Closed(String),
}

impl std::fmt::Display for RtmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RtmError::Http(e) => write!(f, "HTTP error: {e}"),
            RtmError::Api(e) => write!(f, "API error: {e}"),
            RtmError::Parse(e) => write!(f, "Parse error: {e}"),
            RtmError::Closed(e) => write!(f, "Connection closed: {e}"),
        }
    }
}

impl std::error::Error for RtmError {}

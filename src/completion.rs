//! Client for the external conversational completion service.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Wire status code meaning "a reply is available".
const CODE_OK: i64 = 100_000;

pub struct CompletionClient {
    api_base: String,
    api_key: String,
    http: reqwest::Client,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    key: &'a str,
    info: &'a str,
    userid: &'a str,
}

#[derive(Deserialize)]
struct CompletionResponse {
    // The service encodes the status code as a JSON float.
    code: f64,
    #[serde(default)]
    text: String,
}

impl CompletionClient {
    pub fn new(api_base: String, api_key: String) -> Self {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .expect("Failed to build HTTP client");
        Self { api_base, api_key, http }
    }

    /// Ask the completion service for a reply to `text` on behalf of `user_id`.
    ///
    /// Returns `None` on transport failure, decode failure, or a non-success
    /// status code. Callers treat `None` as "no answer", never as fatal.
    pub async fn complete(&self, text: &str, user_id: &str) -> Option<String> {
        let request = CompletionRequest {
            key: &self.api_key,
            info: text,
            userid: user_id,
        };

        let response = match self.http.post(&self.api_base).json(&request).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!("Completion request failed: {e}");
                return None;
            }
        };

        let body: CompletionResponse = match response.json().await {
            Ok(b) => b,
            Err(e) => {
                warn!("Completion response decode failed: {e}");
                return None;
            }
        };

        parse_reply(body)
    }
}

/// Success iff the floating-point status code equals [`CODE_OK`] as an integer.
fn parse_reply(body: CompletionResponse) -> Option<String> {
    if body.code as i64 == CODE_OK {
        Some(body.text)
    } else {
        debug!("Completion service returned code {}", body.code);
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(json: &str) -> Option<String> {
        let body: CompletionResponse = serde_json::from_str(json).unwrap();
        parse_reply(body)
    }

    #[test]
    fn test_success_code_yields_reply() {
        assert_eq!(decode(r#"{"code": 100000.0, "text": "ok"}"#), Some("ok".to_string()));
    }

    #[test]
    fn test_integer_success_code_accepted() {
        assert_eq!(decode(r#"{"code": 100000, "text": "ok"}"#), Some("ok".to_string()));
    }

    #[test]
    fn test_error_code_yields_no_answer() {
        assert_eq!(decode(r#"{"code": 40001.0, "text": ""}"#), None);
    }

    #[test]
    fn test_missing_text_defaults_empty() {
        assert_eq!(decode(r#"{"code": 100000.0}"#), Some(String::new()));
    }

    #[test]
    fn test_request_body_shape() {
        let request = CompletionRequest {
            key: "k",
            info: "hello",
            userid: "=bwQQQ",
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["key"], "k");
        assert_eq!(json["info"], "hello");
        assert_eq!(json["userid"], "=bwQQQ");
    }
}

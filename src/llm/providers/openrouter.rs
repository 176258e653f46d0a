//! OpenRouter chat completions provider (`/api/v1/chat/completions`).
//!
//! OpenRouter speaks the OpenAI wire format plus two optional attribution
//! headers (`HTTP-Referer`, `X-Title`). All wire types are private to this
//! module.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, trace};

use crate::config::OpenRouterConfig;
use crate::llm::{ChatMessage, ChatRequest, ProviderError};

// ── Public provider ───────────────────────────────────────────────────────────

/// Constructed once per job, then cheaply cloned because `reqwest::Client`
/// is an `Arc` internally.
#[derive(Debug, Clone)]
pub struct OpenRouterProvider {
    client: Client,
    api_base_url: String,
    model: String,
    temperature: Option<f32>,
    api_key: String,
    app_title: Option<String>,
    site_url: Option<String>,
}

impl OpenRouterProvider {
    pub fn new(cfg: &OpenRouterConfig, api_key: String) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(cfg.timeout_seconds))
            .build()
            .map_err(|e| ProviderError::Request(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_base_url: cfg.api_base_url.clone(),
            model: cfg.model.clone(),
            temperature: cfg.temperature,
            api_key,
            app_title: cfg.app_title.clone(),
            site_url: cfg.site_url.clone(),
        })
    }

    /// One round trip. The request's temperature wins over the configured
    /// one; with neither, the field is left out of the body.
    pub async fn complete(&self, request: &ChatRequest) -> Result<String, ProviderError> {
        let payload = ChatCompletionRequest {
            model: &self.model,
            messages: &request.messages,
            temperature: request.temperature.or(self.temperature),
            max_tokens: request.max_tokens,
        };

        debug!(
            model = %payload.model,
            temperature = ?payload.temperature,
            max_tokens = ?payload.max_tokens,
            messages = payload.messages.len(),
            "sending LLM request"
        );
        if tracing::enabled!(tracing::Level::TRACE) {
            let json = serde_json::to_string_pretty(&payload)
                .unwrap_or_else(|e| format!("<serialization failed: {e}>"));
            trace!(payload = %json, "full LLM request payload");
        }

        let mut req = self
            .client
            .post(&self.api_base_url)
            .bearer_auth(&self.api_key)
            .json(&payload);
        if let Some(site) = &self.site_url {
            req = req.header("HTTP-Referer", site);
        }
        if let Some(title) = &self.app_title {
            req = req.header("X-Title", title);
        }

        let response = req.send().await.map_err(|e| {
            error!(url = %self.api_base_url, error = %e, "LLM HTTP request failed (transport)");
            ProviderError::Request(e.to_string())
        })?;

        let response = check_status(response).await?;

        let parsed = response.json::<ChatCompletionResponse>().await.map_err(|e| {
            error!(error = %e, "failed to deserialize LLM response");
            ProviderError::Request(format!("failed to parse response body: {e}"))
        })?;

        debug!(choices = parsed.choices.len(), "received LLM response");
        first_content(parsed)
    }
}

// ── Private wire types ────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

// Error envelope used by OpenAI-style APIs.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
    #[serde(default)]
    code: Option<serde_json::Value>,
}

fn first_content(parsed: ChatCompletionResponse) -> Result<String, ProviderError> {
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ProviderError::Request("empty or missing content in response".into()))
}

fn error_message(status: reqwest::StatusCode, body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(env) => {
            let code = env
                .error
                .code
                .map(|v| match v {
                    serde_json::Value::String(s) => format!(" [code={s}]"),
                    other => format!(" [code={other}]"),
                })
                .unwrap_or_default();
            format!("HTTP {status}{code}: {}", env.error.message)
        }
        Err(_) => format!("HTTP {status}: {body}"),
    }
}

/// Pass a successful response through, or turn it into a structured error.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<failed to read error body>".to_string());
    let message = error_message(status, &body);

    error!(%status, %message, "LLM request returned HTTP error");
    Err(ProviderError::Request(message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn payload_skips_unset_fields() {
        let messages = vec![ChatMessage::user("你好")];
        let payload = ChatCompletionRequest {
            model: "m",
            messages: &messages,
            temperature: None,
            max_tokens: None,
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json, serde_json::json!({
            "model": "m",
            "messages": [{ "role": "user", "content": "你好" }]
        }));
    }

    #[test]
    fn payload_carries_max_tokens() {
        let messages = vec![ChatMessage::system("s"), ChatMessage::user("u")];
        let payload = ChatCompletionRequest {
            model: "m",
            messages: &messages,
            temperature: Some(0.7),
            max_tokens: Some(200),
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["max_tokens"], 200);
        assert_eq!(json["messages"][0]["role"], "system");
    }

    #[test]
    fn first_choice_is_trimmed() {
        let parsed: ChatCompletionResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":"  {是}\n"}}]}"#,
        )
        .unwrap();
        assert_eq!(first_content(parsed).unwrap(), "{是}");
    }

    #[test]
    fn empty_choices_is_an_error() {
        let parsed: ChatCompletionResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(first_content(parsed).is_err());

        let parsed: ChatCompletionResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":null}}]}"#).unwrap();
        assert!(first_content(parsed).is_err());
    }

    #[test]
    fn error_envelope_is_unwrapped() {
        let body = r#"{"error":{"message":"No auth credentials found","code":401}}"#;
        let msg = error_message(StatusCode::UNAUTHORIZED, body);
        assert!(msg.contains("401"));
        assert!(msg.contains("[code=401]"));
        assert!(msg.ends_with("No auth credentials found"));
    }

    #[test]
    fn plain_error_body_is_kept() {
        let msg = error_message(StatusCode::BAD_GATEWAY, "upstream down");
        assert!(msg.starts_with("HTTP 502"));
        assert!(msg.ends_with("upstream down"));
    }

    // ── Over the wire ─────────────────────────────────────────────────────────

    /// Serve one chat completion on a loopback port and hand back the raw
    /// request body.
    fn serve_once() -> (String, std::sync::mpsc::Receiver<String>) {
        use std::io::{BufRead, BufReader, Read, Write};

        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = std::sync::mpsc::channel();
        std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream);
            let mut content_length = 0usize;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                let line = line.trim_end();
                if line.is_empty() {
                    break;
                }
                if let Some((name, value)) = line.split_once(':') {
                    if name.eq_ignore_ascii_case("content-length") {
                        content_length = value.trim().parse().unwrap();
                    }
                }
            }
            let mut body = vec![0u8; content_length];
            reader.read_exact(&mut body).unwrap();
            tx.send(String::from_utf8(body).unwrap()).unwrap();

            let reply = r#"{"choices":[{"message":{"content":"ok"}}]}"#;
            let mut stream = reader.into_inner();
            write!(
                stream,
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{reply}",
                reply.len()
            )
            .unwrap();
        });
        (format!("http://{addr}/api/v1/chat/completions"), rx)
    }

    fn provider_at(url: String, temperature: Option<f32>) -> OpenRouterProvider {
        let cfg = OpenRouterConfig {
            api_base_url: url,
            model: "m".into(),
            temperature,
            timeout_seconds: 5,
            max_retries: 0,
            request_delay_ms: 0,
            app_title: None,
            site_url: None,
        };
        OpenRouterProvider::new(&cfg, "sk-test".into()).unwrap()
    }

    #[tokio::test]
    async fn unset_temperature_is_left_to_the_provider() {
        let (url, body) = serve_once();
        let llm = provider_at(url, None);
        let reply = llm.complete(&ChatRequest::user("q").with_max_tokens(200)).await.unwrap();
        assert_eq!(reply, "ok");

        let body = body.recv().unwrap();
        assert!(!body.contains("temperature"), "unexpected temperature in {body}");
        assert!(body.contains(r#""max_tokens":200"#));
    }

    #[tokio::test]
    async fn request_temperature_is_sent() {
        let (url, body) = serve_once();
        let llm = provider_at(url, None);
        llm.complete(&ChatRequest::user("q").with_temperature(0.7)).await.unwrap();

        let json: serde_json::Value = serde_json::from_str(&body.recv().unwrap()).unwrap();
        assert!((json["temperature"].as_f64().unwrap() - 0.7).abs() < 1e-6);
    }

    #[tokio::test]
    async fn configured_temperature_fills_in_when_the_request_has_none() {
        let (url, body) = serve_once();
        let llm = provider_at(url, Some(0.2));
        llm.complete(&ChatRequest::user("q")).await.unwrap();

        let json: serde_json::Value = serde_json::from_str(&body.recv().unwrap()).unwrap();
        assert!((json["temperature"].as_f64().unwrap() - 0.2).abs() < 1e-6);
    }
}

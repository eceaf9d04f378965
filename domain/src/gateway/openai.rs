//! OpenAI client for drafting replies, scoring sentiment and moderating output.

use async_trait::async_trait;
use log::*;
use review_ai::traits::moderation::Moderator;
use review_ai::traits::reply::Generator;
use review_ai::types::reply::{parse_sentiment, Request, SENTIMENT_SYSTEM_PROMPT};
use review_ai::Error as AiError;
use review_auth::http::AuthenticatedClient;
use serde::{Deserialize, Serialize};

const REPLY_MAX_TOKENS: u32 = 150;
const REPLY_TEMPERATURE: f32 = 0.7;
const SENTIMENT_MAX_TOKENS: u32 = 10;

#[derive(Clone)]
pub struct OpenAiClient {
    http_client: AuthenticatedClient,
    base_url: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
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

#[derive(Debug, Serialize)]
struct ModerationRequest<'a> {
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct ModerationResponse {
    #[serde(default)]
    results: Vec<ModerationResult>,
}

#[derive(Debug, Deserialize)]
struct ModerationResult {
    flagged: bool,
}

impl OpenAiClient {
    /// `http_client` must already carry the API key as a bearer token.
    pub fn new(http_client: AuthenticatedClient, base_url: &str, model: &str) -> Self {
        Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, AiError>
    where
        B: Serialize + Sync,
        T: for<'de> Deserialize<'de>,
    {
        let url = format!("{}{path}", self.base_url);
        let response = self
            .http_client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let retry_after_seconds = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            let body = response.text().await.unwrap_or_default();
            warn!("OpenAI {path} returned {status}: {body}");
            return Err(match status.as_u16() {
                401 | 403 => AiError::Authentication(body),
                429 => AiError::RateLimited {
                    retry_after_seconds: retry_after_seconds.unwrap_or(0),
                },
                _ => AiError::Provider(format!("{status}: {body}")),
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| AiError::Deserialization(e.to_string()))
    }

    async fn complete(
        &self,
        system: &str,
        user: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, AiError> {
        let request = ChatCompletionRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            max_tokens,
            temperature,
        };

        let response: ChatCompletionResponse = self.post("/chat/completions", &request).await?;
        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| AiError::Provider("completion returned no choices".to_string()))
    }
}

fn map_transport_error(err: reqwest_middleware::Error) -> AiError {
    match &err {
        reqwest_middleware::Error::Reqwest(e) if e.is_timeout() => AiError::Timeout(e.to_string()),
        _ => AiError::Network(err.to_string()),
    }
}

#[async_trait]
impl Generator for OpenAiClient {
    async fn generate_reply(&self, request: &Request) -> Result<String, AiError> {
        debug!("Drafting reply for a {}-star review", request.rating);
        self.complete(
            &request.system_prompt(),
            &request.user_prompt(),
            REPLY_MAX_TOKENS,
            REPLY_TEMPERATURE,
        )
        .await
    }

    async fn score_sentiment(&self, text: &str) -> f64 {
        match self
            .complete(SENTIMENT_SYSTEM_PROMPT, text, SENTIMENT_MAX_TOKENS, 0.0)
            .await
        {
            Ok(raw) => parse_sentiment(&raw),
            Err(e) => {
                warn!("Sentiment scoring failed, using neutral: {e}");
                0.0
            }
        }
    }

    fn provider_id(&self) -> &str {
        "openai"
    }
}

#[async_trait]
impl Moderator for OpenAiClient {
    async fn is_flagged(&self, text: &str) -> Result<bool, AiError> {
        let response: ModerationResponse = self
            .post("/moderations", &ModerationRequest { input: text })
            .await?;
        Ok(response.results.iter().any(|result| result.flagged))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use review_ai::types::tone;
    use review_auth::http::AuthenticatedClientBuilder;
    use secrecy::SecretString;

    fn client(server_url: &str) -> OpenAiClient {
        let http = AuthenticatedClientBuilder::new()
            .with_bearer_token(SecretString::new("sk-test".to_string()))
            .with_max_retries(0)
            .build()
            .unwrap();
        OpenAiClient::new(http, server_url, "gpt-4o-mini")
    }

    fn completion(content: &str) -> String {
        serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": content } }]
        })
        .to_string()
    }

    #[tokio::test]
    async fn generate_reply_sends_tone_prompt() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "model": "gpt-4o-mini",
                "max_tokens": 150
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(completion("Thanks for visiting!"))
            .create_async()
            .await;

        let request = Request::new("Great coffee", 5, tone::Config::default());
        let reply = client(&server.url())
            .generate_reply(&request)
            .await
            .unwrap();

        assert_eq!(reply, "Thanks for visiting!");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn rejected_key_is_authentication_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(401)
            .with_body(r#"{"error":{"message":"bad key"}}"#)
            .create_async()
            .await;

        let request = Request::new("Great coffee", 5, tone::Config::default());
        let err = client(&server.url())
            .generate_reply(&request)
            .await
            .unwrap_err();

        assert!(matches!(err, AiError::Authentication(_)));
    }

    #[tokio::test]
    async fn sentiment_parses_and_clamps() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(completion("1.7"))
            .create_async()
            .await;

        assert_eq!(client(&server.url()).score_sentiment("Amazing").await, 1.0);
    }

    #[tokio::test]
    async fn sentiment_failure_is_neutral() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(500)
            .create_async()
            .await;

        assert_eq!(client(&server.url()).score_sentiment("Meh").await, 0.0);
    }

    #[tokio::test]
    async fn moderation_reports_flagged_output() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/moderations")
            .match_body(mockito::Matcher::Json(serde_json::json!({ "input": "reply" })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"results":[{"flagged":true}]}"#)
            .create_async()
            .await;

        assert!(client(&server.url()).is_flagged("reply").await.unwrap());
    }
}

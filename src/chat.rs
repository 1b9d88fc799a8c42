//! Chat completion against an OpenAI-compatible endpoint (Perplexity by default)
//!
//! Every request is stateless: one system persona message and one user
//! message, no history.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

use crate::config::ChatConfig;
use crate::error::ChatError;
use crate::{Error, Result};

/// Persona instruction sent as the system message of every request
pub const PERSONA_INSTRUCTION: &str = "You are an AI assistant. You are located in Twinsburg, \
Ohio. All answers must be relevant to Cleveland, Ohio unless asked for differently by the user.  \
You MUST answer all questions in a single and VERY concise sentence. Do not elaborate. Do not ask \
follow-up questions. If a question is complex, provide the most direct and simple summary \
possible in one sentence. For conversational greetings, respond simply. For example, if asked \
'how are you?', respond 'I am always fine.'";

/// Request timeout for the chat service
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Produces a reply for one user utterance
#[async_trait(?Send)]
pub trait Responder {
    /// Ask the chat service for a reply
    ///
    /// # Errors
    ///
    /// `ChatError::Service` when the service errors or is unreachable,
    /// `ChatError::Unknown` for anything else
    async fn complete(&self, persona: &str, user_text: &str)
    -> std::result::Result<String, ChatError>;
}

/// A role-tagged chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// "system", "user" or "assistant"
    pub role: String,
    /// Message text
    pub content: String,
}

impl Message {
    /// System message
    #[must_use]
    pub fn system(content: &str) -> Self {
        Self {
            role: "system".to_string(),
            content: content.to_string(),
        }
    }

    /// User message
    #[must_use]
    pub fn user(content: &str) -> Self {
        Self {
            role: "user".to_string(),
            content: content.to_string(),
        }
    }
}

/// Chat completion request body
#[derive(Debug, Serialize)]
pub struct ChatRequest {
    /// Model identifier
    pub model: String,
    /// Ordered messages
    pub messages: Vec<Message>,
}

impl ChatRequest {
    /// Build the two-message request for one turn
    #[must_use]
    pub fn turn(model: &str, persona: &str, user_text: &str) -> Self {
        Self {
            model: model.to_string(),
            messages: vec![Message::system(persona), Message::user(user_text)],
        }
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Client for the chat completion service
pub struct ChatClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl ChatClient {
    /// Create a chat client
    ///
    /// # Errors
    ///
    /// Returns error if the API key is missing or the HTTP client cannot be built
    pub fn new(api_key: String, base_url: &str, model: String) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config("Perplexity API key required".to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::Chat(format!("could not initialize chat client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
        })
    }

    /// Create a chat client from configuration
    ///
    /// # Errors
    ///
    /// Returns error if the API key is missing
    pub fn from_config(config: &ChatConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .as_ref()
            .map(|k| k.expose_secret().to_string())
            .unwrap_or_default();
        Self::new(api_key, &config.base_url, config.model.clone())
    }

    /// Model identifier used for requests
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait(?Send)]
impl Responder for ChatClient {
    async fn complete(
        &self,
        persona: &str,
        user_text: &str,
    ) -> std::result::Result<String, ChatError> {
        let request = ChatRequest::turn(&self.model, persona, user_text);
        tracing::debug!(model = %self.model, "sending chat request");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "chat request failed");
                ChatError::Service(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "chat API error");
            return Err(ChatError::Service(format!("chat API error {status}: {body}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ChatError::Service(e.to_string()))?;
        let reply = parse_reply(&body)?;

        tracing::debug!(response_len = reply.len(), "chat service responded");
        Ok(reply)
    }
}

/// Extract the first choice's text, trimmed
fn parse_reply(body: &str) -> std::result::Result<String, ChatError> {
    let response: ChatResponse =
        serde_json::from_str(body).map_err(|e| ChatError::Unknown(e.to_string()))?;

    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|text| text.trim().to_string())
        .ok_or_else(|| ChatError::Service("response contained no choices".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turn_is_stateless_pair() {
        let request = ChatRequest::turn("sonar", PERSONA_INSTRUCTION, "what time is it");
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["model"], "sonar");
        let messages = json["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[0]["content"], PERSONA_INSTRUCTION);
        assert_eq!(messages[1]["role"], "user");
        assert_eq!(messages[1]["content"], "what time is it");
    }

    #[test]
    fn test_persona_rules() {
        assert!(PERSONA_INSTRUCTION.contains("single and VERY concise sentence"));
        assert!(PERSONA_INSTRUCTION.contains("Do not ask follow-up questions"));
        assert!(PERSONA_INSTRUCTION.contains("Cleveland, Ohio"));
        assert!(PERSONA_INSTRUCTION.contains("'I am always fine.'"));
    }

    #[test]
    fn test_parse_reply_trims() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"  It is noon. \n"}}]}"#;
        assert_eq!(parse_reply(body).unwrap(), "It is noon.");
    }

    #[test]
    fn test_parse_reply_errors() {
        assert!(matches!(
            parse_reply(r#"{"choices":[]}"#),
            Err(ChatError::Service(_))
        ));
        assert!(matches!(parse_reply("not json"), Err(ChatError::Unknown(_))));
    }

    #[test]
    fn test_missing_key_rejected() {
        assert!(ChatClient::new(String::new(), "https://api.perplexity.ai", "sonar".into()).is_err());
    }

    #[tokio::test]
    async fn test_unreachable_service_is_service_error() {
        let client = ChatClient::new(
            "pplx-test".to_string(),
            "http://127.0.0.1:9",
            "sonar".to_string(),
        )
        .unwrap();

        assert!(matches!(
            client.complete(PERSONA_INSTRUCTION, "hello").await,
            Err(ChatError::Service(_))
        ));
    }
}

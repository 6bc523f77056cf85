use crate::error::GenerationError;
use crate::traits::ChatModel;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

pub const ANSWER_TEMPERATURE: f32 = 0.2;

/// Chat-completions client for OpenAI and API-compatible servers.
pub struct OpenAiChatModel {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [Message<'a>; 2],
    temperature: f32,
    n: u8,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

impl OpenAiChatModel {
    pub fn new(api_key: &str, model: &str, base_url: &str) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    fn model_id(&self) -> String {
        format!("openai:{}", self.model)
    }

    async fn complete(&self, system: &str, prompt: &str) -> Result<String, GenerationError> {
        let request = ChatRequest {
            model: &self.model,
            messages: [
                Message {
                    role: "system",
                    content: system,
                },
                Message {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: ANSWER_TEMPERATURE,
            n: 1,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Api { status, body });
        }

        let parsed: ChatResponse = response.json().await?;
        first_content(parsed)
    }
}

/// Text of the first choice. A choice without content reads as empty text.
fn first_content(response: ChatResponse) -> Result<String, GenerationError> {
    response
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message.content.unwrap_or_default())
        .ok_or(GenerationError::NoChoices)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_id_is_prefixed_with_provider() {
        let model = OpenAiChatModel::new("sk-test", "gpt-4o-mini", "https://api.openai.com/v1/");
        assert_eq!(model.model_id(), "openai:gpt-4o-mini");
        assert_eq!(model.base_url, "https://api.openai.com/v1");
    }

    #[test]
    fn request_uses_low_temperature_single_completion() {
        let request = ChatRequest {
            model: "gpt-4o-mini",
            messages: [
                Message {
                    role: "system",
                    content: "sys",
                },
                Message {
                    role: "user",
                    content: "prompt",
                },
            ],
            temperature: ANSWER_TEMPERATURE,
            n: 1,
        };
        let value = serde_json::to_value(&request).expect("request should serialize");
        assert_eq!(value["n"], 1);
        assert!((value["temperature"].as_f64().unwrap_or_default() - 0.2).abs() < 1e-6);
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["messages"][1]["content"], "prompt");
    }

    #[test]
    fn missing_choices_is_an_error_but_missing_content_is_empty_text() {
        let parsed: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(matches!(first_content(parsed), Err(GenerationError::NoChoices)));

        let parsed: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":null}}]}"#).unwrap();
        assert_eq!(first_content(parsed).unwrap(), "");

        let parsed: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":"42"}}]}"#).unwrap();
        assert_eq!(first_content(parsed).unwrap(), "42");
    }
}

//! LLM title classifier.
//!
//! One chat-completions request per batch. The answer is constrained to the
//! schema `{ "titles": [string] }`; the classifier may only pick titles that
//! occur verbatim in the batch, which the orchestrator re-checks against its
//! own mapping anyway.

use serde::{Deserialize, Serialize};

use crate::db::BackendFuture;
use crate::orchestrator::MAX_BATCH_SIZE;
use crate::{ClassificationError, Config};

/// A classifier that picks the titles relevant to a keyword query.
pub trait TitleClassifier: Send + Sync {
    fn name(&self) -> &str;

    /// Return the titles of `batch` judged relevant to `keywords`.
    /// `batch` holds at most [`MAX_BATCH_SIZE`] titles.
    fn match_titles<'a>(
        &'a self,
        keywords: &'a str,
        batch: &'a [String],
        client: &'a reqwest::Client,
    ) -> BackendFuture<'a, Vec<String>, ClassificationError>;
}

const SYSTEM_PROMPT: &str = "You select publications related to a set of keywords from a given list of publication titles. \
Only select titles that occur verbatim in the supplied list and copy them exactly. \
Never create new publications and never create new keywords. \
Answer with a JSON object matching this schema: {\"titles\": [string]}. \
If no publication is related, answer {\"titles\": []}.";

/// OpenAI-compatible chat-completions classifier.
pub struct OpenAiClassifier {
    api_key: String,
    model: String,
    endpoint: String,
    temperature: f32,
}

impl OpenAiClassifier {
    pub fn new(api_key: impl Into<String>) -> Self {
        let defaults = Config::default();
        Self {
            api_key: api_key.into(),
            model: defaults.model,
            endpoint: defaults.chat_endpoint,
            temperature: defaults.temperature,
        }
    }

    /// Build from a [`Config`]. Fails if no API key is configured.
    pub fn from_config(config: &Config) -> Result<Self, crate::CoreError> {
        let api_key = config
            .openai_api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| crate::CoreError::Config("OPENAI_API_KEY is not set".into()))?;
        Ok(Self::new(api_key)
            .with_model(config.model.clone())
            .with_endpoint(config.chat_endpoint.clone())
            .with_temperature(config.temperature))
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Custom endpoint (e.g. a local proxy or another OpenAI-compatible server).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    fn request_body<'a>(&'a self, keywords: &str, batch: &[String]) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            temperature: self.temperature,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt(keywords, batch),
                },
            ],
            response_format: titles_response_format(),
        }
    }
}

impl TitleClassifier for OpenAiClassifier {
    fn name(&self) -> &str {
        "OpenAI"
    }

    fn match_titles<'a>(
        &'a self,
        keywords: &'a str,
        batch: &'a [String],
        client: &'a reqwest::Client,
    ) -> BackendFuture<'a, Vec<String>, ClassificationError> {
        Box::pin(async move {
            if batch.len() > MAX_BATCH_SIZE {
                return Err(ClassificationError::BatchTooLarge {
                    size: batch.len(),
                    max: MAX_BATCH_SIZE,
                });
            }
            if batch.is_empty() {
                return Ok(vec![]);
            }

            let body = self.request_body(keywords, batch);
            tracing::debug!(model = %self.model, titles = batch.len(), "classifying batch");

            let resp = client
                .post(&self.endpoint)
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await?;

            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                return Err(ClassificationError::Status { status, body });
            }

            let response: ChatResponse = resp.json().await?;
            let content = response
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.message.content)
                .ok_or(ClassificationError::MissingContent)?;

            parse_titles(&content)
        })
    }
}

/// User message: keywords followed by the bulleted title list.
pub fn user_prompt(keywords: &str, batch: &[String]) -> String {
    let mut titles = String::new();
    for title in batch {
        titles.push_str("- ");
        titles.push_str(title);
        titles.push('\n');
    }
    format!("Keywords:\n{}\n\nPublications:\n{}", keywords.trim(), titles)
}

/// Decode the classifier's answer into a list of titles.
pub fn parse_titles(content: &str) -> Result<Vec<String>, ClassificationError> {
    let answer: TitlesAnswer = serde_json::from_str(content.trim())?;
    Ok(answer.titles.into_vec())
}

#[derive(Debug, Deserialize)]
struct TitlesAnswer {
    titles: TitlesField,
}

/// Some models answer a lone match as a bare string instead of a list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TitlesField {
    One(String),
    Many(Vec<String>),
}

impl TitlesField {
    fn into_vec(self) -> Vec<String> {
        match self {
            TitlesField::One(title) => vec![title],
            TitlesField::Many(titles) => titles,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage>,
    response_format: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

fn titles_response_format() -> serde_json::Value {
    serde_json::json!({
        "type": "json_schema",
        "json_schema": {
            "name": "matching_titles",
            "strict": true,
            "schema": {
                "type": "object",
                "properties": {
                    "titles": {
                        "type": "array",
                        "items": { "type": "string" }
                    }
                },
                "required": ["titles"],
                "additionalProperties": false
            }
        }
    })
}

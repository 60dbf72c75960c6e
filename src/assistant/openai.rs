//! OpenAI-compatible chat completions client

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use super::{split_candidates, AssistantError, AssistantResult, AssistantService};
use crate::config::AssistantConfig;

const SUGGESTION_SYSTEM_PROMPT: &str = "You are an expert at generating cool and memorable patterns for Solana wallet addresses using Base58 characters. Generate 5-10 patterns between 1 and 5 characters long. Prioritize patterns that are 1-2 character long. Do not have any intro text, just give the pattern separated by commas.";

const HELP_SYSTEM_PROMPT: &str = "You are an expert assistant for a Solana vanity wallet generator. Provide clear, accurate, and user-friendly guidance.

Wallets are generated locally with the official Solana CLI. Users choose whether a pattern must appear at the start, the end, or both ends of the address. Patterns use Base58 characters (1-9, A-Z, a-z, excluding 0, I, O and l) and may be up to 8 characters long. Case sensitivity can be toggled. Generation time grows quickly with pattern length.

Always remind users to keep private keys and mnemonic phrases secret and never to share them. Be concise.";

/// Sampling settings for one kind of request
#[derive(Debug, Clone, Copy)]
struct Sampling {
    temperature: f64,
    max_tokens: u32,
}

const SUGGESTION_SAMPLING: Sampling = Sampling {
    temperature: 0.9,
    max_tokens: 200,
};

const ANSWER_SAMPLING: Sampling = Sampling {
    temperature: 0.7,
    max_tokens: 250,
};

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f64,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Chat completions client
pub struct OpenAiAssistant {
    client: Client,
    endpoint: Url,
    api_key: String,
    model: String,
}

impl OpenAiAssistant {
    pub fn new(config: &AssistantConfig) -> AssistantResult<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or(AssistantError::NotConfigured)?;

        let endpoint = completions_url(&config.api_base)?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AssistantError::InvalidConfig(e.to_string()))?;

        Ok(Self {
            client,
            endpoint,
            api_key,
            model: config.model.clone(),
        })
    }

    async fn complete(&self, system: &str, user: &str, sampling: Sampling) -> AssistantResult<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: sampling.temperature,
            max_tokens: sampling.max_tokens,
        };

        debug!("Assistant request: model={}", self.model);

        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            warn!("Assistant API returned {}: {}", status, message);
            return Err(AssistantError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.text().await?;
        extract_content(&body)
    }
}

#[async_trait]
impl AssistantService for OpenAiAssistant {
    async fn suggest_patterns(&self, prompt: &str) -> AssistantResult<Vec<String>> {
        let reply = self
            .complete(SUGGESTION_SYSTEM_PROMPT, prompt, SUGGESTION_SAMPLING)
            .await?;
        Ok(split_candidates(&reply))
    }

    async fn answer(&self, question: &str) -> AssistantResult<String> {
        self.complete(HELP_SYSTEM_PROMPT, question, ANSWER_SAMPLING)
            .await
    }
}

/// `<api_base>/chat/completions`, keeping any path on the base
fn completions_url(api_base: &str) -> AssistantResult<Url> {
    let mut base = Url::parse(api_base.trim())?;
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    Ok(base.join("chat/completions")?)
}

/// First choice's text from a chat completions response body
fn extract_content(body: &str) -> AssistantResult<String> {
    let response: ChatResponse = serde_json::from_str(body)?;
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AssistantError::InvalidResponse("no content in response".to_string()))
}

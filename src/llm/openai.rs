//! OpenAI chat-completions generator.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Value, json};

use super::{PrepKitDraft, TextGenerator, context_language};
use crate::config::LlmSettings;
use crate::error::LlmError;

const PROVIDER: &str = "openai";

/// System prompt shared by every call; the language instruction is appended.
const SYSTEM_PROMPT: &str = "You are a legal operations assistant for a platform in Mexico/LATAM. \
You NEVER provide legal advice. You produce operational summaries, \
document checklists, and preparation guides. All outputs require \
review by a licensed professional (abogado con cédula). ";

pub struct OpenAiGenerator {
    api_key: SecretString,
    model: String,
    base_url: String,
    temperature: f32,
    max_tokens: u32,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

impl OpenAiGenerator {
    pub fn new(api_key: SecretString, settings: &LlmSettings) -> Self {
        Self {
            api_key,
            model: settings.model.clone(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            client: reqwest::Client::new(),
        }
    }

    fn system_message(language: &str) -> String {
        let instruction = if language == "es" {
            "Responde en español."
        } else {
            "Respond in English."
        };
        format!("{SYSTEM_PROMPT}{instruction}")
    }

    async fn chat(&self, system: &str, user: &str, json_mode: bool) -> Result<String, LlmError> {
        let mut body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        });
        if json_mode {
            body["response_format"] = json!({"type": "json_object"});
        }

        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed {
                provider: PROVIDER.to_string(),
                reason: e.to_string(),
            })?;

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(LlmError::AuthFailed {
                provider: PROVIDER.to_string(),
            });
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = resp
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(std::time::Duration::from_secs);
            return Err(LlmError::RateLimited {
                provider: PROVIDER.to_string(),
                retry_after,
            });
        }
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(LlmError::RequestFailed {
                provider: PROVIDER.to_string(),
                reason: format!("HTTP {status}: {text}"),
            });
        }

        let parsed: ChatResponse = resp.json().await.map_err(|e| LlmError::InvalidResponse {
            provider: PROVIDER.to_string(),
            reason: e.to_string(),
        })?;
        Ok(parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default())
    }
}

fn prep_kit_prompt(case_type: &str, description: &str) -> String {
    format!(
        "Case type: {case_type}\n\
         Situation described by the person: {description}\n\n\
         Return a JSON object with keys \"checklist_docs\" (array of document names \
         the person should gather), \"questions_for_lawyer\" (array of questions to \
         ask a licensed professional), \"summary\" (one neutral paragraph) and \
         \"disclaimer\" (one sentence stating this is not legal advice). \
         Do not recommend any legal action or predict outcomes."
    )
}

#[async_trait]
impl TextGenerator for OpenAiGenerator {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn generate(
        &self,
        _agent: &str,
        prompt: &str,
        context: &Value,
    ) -> Result<String, LlmError> {
        let system = Self::system_message(context_language(context));
        self.chat(&system, prompt, false).await
    }

    async fn generate_structured(
        &self,
        case_type: &str,
        description: &str,
        language: &str,
    ) -> Result<PrepKitDraft, LlmError> {
        let system = Self::system_message(language);
        let raw = self
            .chat(&system, &prep_kit_prompt(case_type, description), true)
            .await?;
        let draft: PrepKitDraft = serde_json::from_str(&raw)?;
        if draft.checklist_docs.is_empty() && draft.questions_for_lawyer.is_empty() {
            return Err(LlmError::InvalidResponse {
                provider: PROVIDER.to_string(),
                reason: "empty prep kit".to_string(),
            });
        }
        Ok(draft)
    }
}

use crate::config::LlmConfig;
use crate::error::{NlqError, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Generative backend turning a prompt into candidate SQL text.
/// Output is untrusted and must go through the validator.
#[async_trait]
pub trait SqlGenerator: Send + Sync {
    async fn generate_sql(&self, prompt: &str) -> Result<String>;
}

pub struct LlmClient {
    api_key: String,
    model: String,
    base_url: String,
    http: reqwest::Client,
}

impl LlmClient {
    pub fn new(api_key: String, model: String) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| NlqError::Llm(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_key,
            model,
            base_url: GEMINI_BASE_URL.to_string(),
            http,
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        Self::new(config.api_key.clone(), config.model.clone())
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn call_llm(&self, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "contents": [
                {"role": "user", "parts": [{"text": prompt}]}
            ],
            "generationConfig": {
                "temperature": 0
            }
        });

        let response = self
            .http
            .post(format!("{}/models/{}:generateContent", self.base_url, self.model))
            .query(&[("key", self.api_key.as_str())])
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| NlqError::Llm(format!("LLM API call failed: {}", e)))?;

        let status = response.status();
        let response_json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| NlqError::Llm(format!("Failed to parse LLM response: {}", e)))?;

        if !status.is_success() {
            let message = response_json["error"]["message"]
                .as_str()
                .unwrap_or("no error message");
            return Err(NlqError::Llm(format!("LLM API returned {}: {}", status, message)));
        }

        extract_text(&response_json)
    }
}

#[async_trait]
impl SqlGenerator for LlmClient {
    async fn generate_sql(&self, prompt: &str) -> Result<String> {
        debug!(model = %self.model, prompt_chars = prompt.len(), "Requesting SQL from LLM");
        let raw = self.call_llm(prompt).await?;
        let sql = strip_code_fences(&raw);
        if sql.is_empty() {
            return Err(NlqError::Llm("LLM returned an empty response".to_string()));
        }
        Ok(sql)
    }
}

/// Concatenate the text parts of the first candidate.
fn extract_text(response: &serde_json::Value) -> Result<String> {
    let parts = response["candidates"][0]["content"]["parts"]
        .as_array()
        .ok_or_else(|| NlqError::Llm("No content in LLM response".to_string()))?;

    Ok(parts
        .iter()
        .filter_map(|part| part["text"].as_str())
        .collect::<String>())
}

/// Strip a surrounding markdown fence (```sql ... ```) and whitespace.
pub fn strip_code_fences(raw: &str) -> String {
    let trimmed = raw.trim();
    let inner = if let Some(rest) = trimmed.strip_prefix("```sql") {
        rest
    } else if let Some(rest) = trimmed.strip_prefix("```SQL") {
        rest
    } else if let Some(rest) = trimmed.strip_prefix("```") {
        rest
    } else {
        trimmed
    };
    inner.strip_suffix("```").unwrap_or(inner).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_text_joins_parts() {
        let response = serde_json::json!({
            "candidates": [{
                "content": {"parts": [{"text": "SELECT c.college "}, {"text": "FROM college_profiles c"}]}
            }]
        });
        assert_eq!(
            extract_text(&response).unwrap(),
            "SELECT c.college FROM college_profiles c"
        );
    }

    #[test]
    fn test_extract_text_without_candidates() {
        let response = serde_json::json!({"promptFeedback": {"blockReason": "SAFETY"}});
        assert!(matches!(extract_text(&response), Err(NlqError::Llm(_))));
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```sql\nSELECT 1\n```"), "SELECT 1");
        assert_eq!(strip_code_fences("```\nSELECT 1\n```\n"), "SELECT 1");
        assert_eq!(strip_code_fences("  SELECT 1  "), "SELECT 1");
        assert_eq!(strip_code_fences("SELECT 1; DROP TABLE t"), "SELECT 1; DROP TABLE t");
    }
}

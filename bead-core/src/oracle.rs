//! The outbound language-model collaborator.
//!
//! The model is stateless between calls: every request carries the full
//! history with the Glass Bead Game system prompt prepended here, never
//! stored in the session.

use crate::trajectory::{Message, Role};
use async_trait::async_trait;
use openrouter::OpenRouter;
use thiserror::Error;

/// The bundled system prompt.
pub const SYSTEM_PROMPT: &str = include_str!("prompts/glass_bead_game.txt");

const DEFAULT_SITE_URL: &str = "http://localhost:3000";
const APP_TITLE: &str = "Glass Bead Game";

/// Errors from the model call.
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("model API error: {0}")]
    Api(#[from] openrouter::Error),

    #[error("No response from AI")]
    EmptyResponse,
}

/// Something that turns a message history into raw assistant text.
#[async_trait]
pub trait Oracle: Send + Sync {
    async fn complete(&self, messages: &[Message]) -> Result<String, OracleError>;
}

/// Configuration for the OpenRouter-backed oracle.
#[derive(Debug, Clone)]
pub struct OracleConfig {
    /// Model identifier; the client default when `None`.
    pub model: Option<String>,

    /// Maximum tokens for responses.
    pub max_tokens: usize,

    /// Temperature for generation.
    pub temperature: Option<f32>,

    /// Replaces the bundled system prompt.
    pub system_prompt: Option<String>,

    /// Sent as the `HTTP-Referer` attribution header.
    pub site_url: String,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            model: None,
            max_tokens: 2000,
            temperature: Some(0.7),
            system_prompt: None,
            site_url: DEFAULT_SITE_URL.to_string(),
        }
    }
}

impl OracleConfig {
    /// Read `OPENROUTER_MODEL` and `SITE_URL` over the defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(model) = std::env::var("OPENROUTER_MODEL") {
            if !model.trim().is_empty() {
                config.model = Some(model);
            }
        }
        if let Ok(site_url) = std::env::var("SITE_URL") {
            if !site_url.trim().is_empty() {
                config.site_url = site_url;
            }
        }
        config
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    fn system_prompt(&self) -> &str {
        self.system_prompt.as_deref().unwrap_or(SYSTEM_PROMPT)
    }
}

/// [`Oracle`] backed by the OpenRouter chat completions API.
#[derive(Clone)]
pub struct OpenRouterOracle {
    client: OpenRouter,
    config: OracleConfig,
}

impl OpenRouterOracle {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_client(OpenRouter::new(api_key), OracleConfig::default())
    }

    /// Build from `OPENROUTER_API_KEY` plus [`OracleConfig::from_env`].
    pub fn from_env() -> Result<Self, OracleError> {
        let client = OpenRouter::from_env()?;
        Ok(Self::with_client(client, OracleConfig::from_env()))
    }

    pub fn with_client(client: OpenRouter, config: OracleConfig) -> Self {
        let client = client
            .with_referer(config.site_url.clone())
            .with_title(APP_TITLE);
        Self { client, config }
    }

    pub fn config(&self) -> &OracleConfig {
        &self.config
    }

    fn build_request(&self, messages: &[Message]) -> openrouter::Request {
        let history = messages
            .iter()
            .map(|m| match m.role {
                Role::User => openrouter::Message::user(&m.content),
                Role::Assistant => openrouter::Message::assistant(&m.content),
            })
            .collect();

        let mut request = openrouter::Request::new(history)
            .with_system(self.config.system_prompt())
            .with_max_tokens(self.config.max_tokens);

        if let Some(ref model) = self.config.model {
            request = request.with_model(model);
        }

        if let Some(temp) = self.config.temperature {
            request = request.with_temperature(temp);
        }

        request
    }
}

#[async_trait]
impl Oracle for OpenRouterOracle {
    async fn complete(&self, messages: &[Message]) -> Result<String, OracleError> {
        let request = self.build_request(messages);
        let response = self.client.complete(request).await?;

        if let Some(usage) = &response.usage {
            tracing::debug!(
                model = %response.model,
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "model call finished"
            );
        }

        response
            .text()
            .map(str::to_string)
            .ok_or(OracleError::EmptyResponse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_prompt_lists_every_connector() {
        for connector in crate::grammar::CONNECTORS {
            assert!(
                SYSTEM_PROMPT.contains(connector.symbol),
                "prompt is missing {}",
                connector.symbol
            );
        }
        assert!(SYSTEM_PROMPT.contains("trajectory_state"));
    }

    #[test]
    fn test_request_prepends_system_prompt() {
        let oracle = OpenRouterOracle::new("test-key");
        let request = oracle.build_request(&[
            Message::user("Let's explore time and memory"),
            Message::assistant("Gladly"),
        ]);

        assert_eq!(request.messages.len(), 3);
        assert_eq!(request.messages[0].role, openrouter::Role::System);
        assert_eq!(request.messages[0].content, SYSTEM_PROMPT);
        assert_eq!(request.messages[1].role, openrouter::Role::User);
        assert_eq!(request.messages[2].role, openrouter::Role::Assistant);
        assert_eq!(request.temperature, Some(0.7));
        assert_eq!(request.max_tokens, 2000);
        assert!(request.model.is_none());
    }

    #[test]
    fn test_config_overrides() {
        let config = OracleConfig::default()
            .with_model("openai/gpt-4o")
            .with_temperature(0.2)
            .with_max_tokens(512)
            .with_system_prompt("Be brief.");
        let oracle = OpenRouterOracle::with_client(OpenRouter::new("k"), config);
        let request = oracle.build_request(&[Message::user("hi")]);

        assert_eq!(request.model.as_deref(), Some("openai/gpt-4o"));
        assert_eq!(request.messages[0].content, "Be brief.");
        assert_eq!(request.max_tokens, 512);
    }
}

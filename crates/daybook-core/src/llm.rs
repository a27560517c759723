use std::future::Future;

use serde_json::{json, Value};

use crate::config::LlmConfig;
use crate::error::{DaybookError, Result};

/// Anything that turns a prompt into text. Implemented by [`LlmService`];
/// tests substitute a canned generator.
pub trait TextGenerator: Send + Sync {
    fn generate(
        &self,
        prompt: &str,
        system: Option<&str>,
    ) -> impl Future<Output = Result<String>> + Send;
}

/// Text generation over one of the hosted chat APIs (or a local Ollama).
/// One request per call: no retry, no streaming.
pub struct LlmService {
    provider: LlmProvider,
    config: LlmConfig,
    client: reqwest::Client,
}

impl std::fmt::Debug for LlmService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmService")
            .field("provider", &self.provider)
            .field("model", &self.config.model)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LlmProvider {
    Ollama,
    OpenAI,
    Gemini,
    Anthropic,
}

impl LlmProvider {
    fn label(self) -> &'static str {
        match self {
            Self::Ollama => "Ollama",
            Self::OpenAI => "OpenAI",
            Self::Gemini => "Gemini",
            Self::Anthropic => "Anthropic",
        }
    }

    fn key_env_var(self) -> Option<&'static str> {
        match self {
            Self::Ollama => None,
            Self::OpenAI => Some("OPENAI_API_KEY"),
            Self::Gemini => Some("GEMINI_API_KEY"),
            Self::Anthropic => Some("ANTHROPIC_API_KEY"),
        }
    }
}

impl LlmService {
    /// Create a text generation service from configuration. Fails early when
    /// the provider is unknown or its API key cannot be resolved.
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let provider = match config.provider.as_str() {
            "ollama" => LlmProvider::Ollama,
            "openai" => LlmProvider::OpenAI,
            "gemini" => LlmProvider::Gemini,
            "anthropic" | "claude" => LlmProvider::Anthropic,
            other => {
                return Err(DaybookError::Config(format!(
                    "unknown LLM provider: '{other}' (expected 'gemini', 'openai', 'anthropic', or 'ollama')"
                )));
            }
        };

        if let Some(env_var) = provider.key_env_var() {
            resolve_api_key(config, env_var)?;
        }

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .map_err(|e| DaybookError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            provider,
            config: config.clone(),
            client,
        })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn base_url(&self, default: &str) -> String {
        self.config
            .base_url
            .as_deref()
            .unwrap_or(default)
            .trim_end_matches('/')
            .to_string()
    }

    fn api_key(&self) -> Result<String> {
        match self.provider.key_env_var() {
            Some(env_var) => resolve_api_key(&self.config, env_var),
            None => Ok(String::new()),
        }
    }

    /// POST a JSON body and return the parsed JSON reply.
    async fn post_json(&self, request: reqwest::RequestBuilder, body: &Value) -> Result<Value> {
        let label = self.provider.label();
        let resp = request
            .json(body)
            .send()
            .await
            .map_err(|e| DaybookError::Llm(format!("{label} request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(DaybookError::Llm(format!("{label} error {status}: {text}")));
        }

        resp.json()
            .await
            .map_err(|e| DaybookError::Llm(format!("{label} response parse error: {e}")))
    }

    /// Ollama: POST {base_url}/api/generate
    async fn generate_ollama(&self, prompt: &str, system: Option<&str>) -> Result<Value> {
        let url = format!("{}/api/generate", self.base_url("http://localhost:11434"));
        let mut body = json!({
            "model": self.config.model,
            "prompt": prompt,
            "stream": false,
            "options": { "num_predict": self.config.max_tokens },
        });
        if let Some(sys) = system {
            body["system"] = Value::String(sys.to_string());
        }
        self.post_json(self.client.post(url), &body).await
    }

    /// OpenAI: POST {base_url}/v1/chat/completions
    async fn generate_openai(&self, prompt: &str, system: Option<&str>) -> Result<Value> {
        let url = format!(
            "{}/v1/chat/completions",
            self.base_url("https://api.openai.com")
        );
        let mut messages = Vec::new();
        if let Some(sys) = system {
            messages.push(json!({"role": "system", "content": sys}));
        }
        messages.push(json!({"role": "user", "content": prompt}));
        let body = json!({
            "model": self.config.model,
            "messages": messages,
            "max_tokens": self.config.max_tokens,
        });
        let request = self.client.post(url).bearer_auth(self.api_key()?);
        self.post_json(request, &body).await
    }

    /// Anthropic: POST {base_url}/v1/messages
    async fn generate_anthropic(&self, prompt: &str, system: Option<&str>) -> Result<Value> {
        let url = format!("{}/v1/messages", self.base_url("https://api.anthropic.com"));
        let mut body = json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "messages": [{"role": "user", "content": prompt}],
        });
        if let Some(sys) = system {
            body["system"] = Value::String(sys.to_string());
        }
        let request = self
            .client
            .post(url)
            .header("x-api-key", self.api_key()?)
            .header("anthropic-version", "2023-06-01");
        self.post_json(request, &body).await
    }

    /// Gemini: POST {base_url}/v1beta/models/{model}:generateContent
    async fn generate_gemini(&self, prompt: &str, system: Option<&str>) -> Result<Value> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url("https://generativelanguage.googleapis.com"),
            self.config.model,
        );
        let mut body = json!({
            "contents": [{"parts": [{"text": prompt}]}],
            "generationConfig": { "maxOutputTokens": self.config.max_tokens },
        });
        if let Some(sys) = system {
            body["systemInstruction"] = json!({"parts": [{"text": sys}]});
        }
        let request = self.client.post(url).header("x-goog-api-key", self.api_key()?);
        self.post_json(request, &body).await
    }
}

impl TextGenerator for LlmService {
    async fn generate(&self, prompt: &str, system: Option<&str>) -> Result<String> {
        tracing::debug!(provider = self.provider.label(), model = %self.config.model, "generating text");
        let reply = match self.provider {
            LlmProvider::Ollama => self.generate_ollama(prompt, system).await?,
            LlmProvider::OpenAI => self.generate_openai(prompt, system).await?,
            LlmProvider::Gemini => self.generate_gemini(prompt, system).await?,
            LlmProvider::Anthropic => self.generate_anthropic(prompt, system).await?,
        };
        extract_text(self.provider, &reply)
    }
}

/// Pull the generated text out of a provider's JSON reply.
fn extract_text(provider: LlmProvider, reply: &Value) -> Result<String> {
    let text = match provider {
        LlmProvider::Ollama => &reply["response"],
        LlmProvider::OpenAI => &reply["choices"][0]["message"]["content"],
        // {"content": [{"type": "text", "text": "..."}]}
        LlmProvider::Anthropic => &reply["content"][0]["text"],
        LlmProvider::Gemini => &reply["candidates"][0]["content"]["parts"][0]["text"],
    };
    text.as_str()
        .map(|s| s.to_string())
        .ok_or_else(|| {
            DaybookError::Llm(format!(
                "{} response missing generated text",
                provider.label()
            ))
        })
}

/// Resolve an API key from config, a custom env var, or a default env var.
fn resolve_api_key(config: &LlmConfig, default_env_var: &str) -> Result<String> {
    if let Some(ref key) = config.api_key {
        if !key.is_empty() {
            return Ok(key.clone());
        }
    }

    let env_var_name = config.env_var.as_deref().unwrap_or(default_env_var);

    std::env::var(env_var_name).map_err(|_| {
        DaybookError::Config(format!(
            "{} LLM provider requires an API key (set llm.api_key or {})",
            config.provider, env_var_name
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_ollama_needs_no_key() {
        let config = LlmConfig {
            enabled: true,
            provider: "ollama".into(),
            model: "llama3.2".into(),
            ..Default::default()
        };
        let service = LlmService::from_config(&config).unwrap();
        assert_eq!(service.model(), "llama3.2");
    }

    #[test]
    fn test_from_config_unknown_provider() {
        let config = LlmConfig {
            provider: "banana".into(),
            ..Default::default()
        };
        let err = LlmService::from_config(&config).unwrap_err();
        assert!(err.to_string().contains("unknown LLM provider"));
    }

    #[test]
    fn test_from_config_gemini_without_key_errors() {
        let saved = std::env::var("GEMINI_API_KEY").ok();
        std::env::remove_var("GEMINI_API_KEY");

        let config = LlmConfig {
            provider: "gemini".into(),
            api_key: None,
            ..Default::default()
        };
        let result = LlmService::from_config(&config);
        assert!(result.unwrap_err().to_string().contains("API key"));

        if let Some(key) = saved {
            std::env::set_var("GEMINI_API_KEY", key);
        }
    }

    #[test]
    fn test_from_config_with_key() {
        for provider in ["gemini", "openai", "anthropic", "claude"] {
            let config = LlmConfig {
                provider: provider.into(),
                api_key: Some("test-key".into()),
                ..Default::default()
            };
            assert!(LlmService::from_config(&config).is_ok(), "{provider}");
        }
    }

    #[test]
    fn test_resolve_api_key_custom_env_var() {
        std::env::set_var("DAYBOOK_TEST_LLM_KEY", "env-llm-key");
        let config = LlmConfig {
            provider: "openai".into(),
            api_key: None,
            env_var: Some("DAYBOOK_TEST_LLM_KEY".into()),
            ..Default::default()
        };
        let key = resolve_api_key(&config, "OPENAI_API_KEY").unwrap();
        assert_eq!(key, "env-llm-key");
        std::env::remove_var("DAYBOOK_TEST_LLM_KEY");
    }

    #[test]
    fn test_extract_text_per_provider() {
        let gemini = json!({"candidates": [{"content": {"parts": [{"text": "hi"}]}}]});
        assert_eq!(extract_text(LlmProvider::Gemini, &gemini).unwrap(), "hi");

        let openai = json!({"choices": [{"message": {"content": "yo"}}]});
        assert_eq!(extract_text(LlmProvider::OpenAI, &openai).unwrap(), "yo");

        let anthropic = json!({"content": [{"type": "text", "text": "hey"}]});
        assert_eq!(extract_text(LlmProvider::Anthropic, &anthropic).unwrap(), "hey");

        let ollama = json!({"response": "ok"});
        assert_eq!(extract_text(LlmProvider::Ollama, &ollama).unwrap(), "ok");
    }

    #[test]
    fn test_extract_text_missing_is_llm_error() {
        let err = extract_text(LlmProvider::Gemini, &json!({"candidates": []})).unwrap_err();
        assert!(matches!(err, DaybookError::Llm(_)));
    }

    #[tokio::test]
    async fn test_unreachable_provider_is_llm_error() {
        let config = LlmConfig {
            provider: "ollama".into(),
            base_url: Some("http://127.0.0.1:1".into()),
            ..Default::default()
        };
        let service = LlmService::from_config(&config).unwrap();
        let err = service.generate("hello", None).await.unwrap_err();
        assert!(matches!(err, DaybookError::Llm(_)));
    }
}

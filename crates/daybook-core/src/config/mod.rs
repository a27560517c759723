use crate::error::{DaybookError, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaybookConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub avatars: AvatarConfig,
    #[serde(default)]
    pub web: WebConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub stats: StatsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_backend")]
    pub backend: String,
    /// Custom path for SQLite database. Defaults to `~/.config/daybook/daybook.db`.
    #[serde(default)]
    pub path: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
            path: None,
        }
    }
}

/// Hosted backend: database REST endpoint, identity service, and bucket
/// storage all live under one project URL.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub env_var: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_auth_provider")]
    pub provider: String,
    /// Identity used by the `local` provider.
    #[serde(default = "default_local_user_id")]
    pub local_user_id: String,
    #[serde(default = "default_local_email")]
    pub local_email: String,
    /// When unset the `local` provider accepts any password.
    #[serde(default)]
    pub local_password: Option<String>,
    #[serde(default = "default_session_hours")]
    pub session_hours: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            provider: default_auth_provider(),
            local_user_id: default_local_user_id(),
            local_email: default_local_email(),
            local_password: None,
            session_hours: default_session_hours(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvatarConfig {
    #[serde(default = "default_avatar_backend")]
    pub backend: String,
    /// Directory for the `local` backend. Defaults to `~/.config/daybook/uploads`.
    #[serde(default)]
    pub dir: Option<String>,
    #[serde(default = "default_avatar_bucket")]
    pub bucket: String,
    #[serde(default = "default_max_upload_bytes")]
    pub max_bytes: usize,
}

impl Default for AvatarConfig {
    fn default() -> Self {
        Self {
            backend: default_avatar_backend(),
            dir: None,
            bucket: default_avatar_bucket(),
            max_bytes: default_max_upload_bytes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    #[serde(default = "default_web_port")]
    pub port: u16,
    #[serde(default = "default_web_host")]
    pub host: String,
    /// Base URL used to build public links to locally stored uploads.
    #[serde(default)]
    pub public_url: Option<String>,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            port: default_web_port(),
            host: default_web_host(),
            public_url: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_llm_provider")]
    pub provider: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub env_var: Option<String>,
    #[serde(default = "default_llm_max_tokens")]
    pub max_tokens: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: default_llm_provider(),
            model: default_llm_model(),
            api_key: None,
            base_url: None,
            env_var: None,
            max_tokens: default_llm_max_tokens(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryConfig {
    pub name: String,
    /// A colour name (`blue`, `teal`, ...) or a `#RRGGBB` code.
    pub color: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsConfig {
    #[serde(default = "default_range_days")]
    pub default_range_days: u32,
    /// Overrides the built-in category palette when non-empty.
    #[serde(default)]
    pub categories: Vec<CategoryConfig>,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            default_range_days: default_range_days(),
            categories: Vec::new(),
        }
    }
}

/// Valid storage backend names.
pub const VALID_STORAGE_BACKENDS: &[&str] = &["sqlite", "remote"];

/// Valid identity provider names.
pub const VALID_AUTH_PROVIDERS: &[&str] = &["local", "remote"];

/// Valid avatar storage backend names.
pub const VALID_AVATAR_BACKENDS: &[&str] = &["local", "remote"];

/// Valid LLM provider names.
pub const VALID_LLM_PROVIDERS: &[&str] = &["gemini", "openai", "anthropic", "ollama"];

// -- Defaults --

fn default_storage_backend() -> String {
    "sqlite".to_string()
}
fn default_auth_provider() -> String {
    "local".to_string()
}
fn default_local_user_id() -> String {
    "local-user".to_string()
}
fn default_local_email() -> String {
    "me@localhost".to_string()
}
fn default_session_hours() -> u64 {
    24 * 7
}
fn default_avatar_backend() -> String {
    "local".to_string()
}
fn default_avatar_bucket() -> String {
    "avatars".to_string()
}
fn default_max_upload_bytes() -> usize {
    5 * 1024 * 1024
}
fn default_web_port() -> u16 {
    37738
}
fn default_web_host() -> String {
    "127.0.0.1".to_string()
}
fn default_llm_provider() -> String {
    "gemini".to_string()
}
fn default_llm_model() -> String {
    "gemini-2.0-flash".to_string()
}
fn default_llm_max_tokens() -> usize {
    2048
}
fn default_range_days() -> u32 {
    7
}

impl DaybookConfig {
    /// Load configuration with layered merge:
    /// 1. ~/.config/daybook/config.toml (global)
    /// 2. .daybook/config.toml (project)
    /// 3. .daybook/config.local.toml (local, gitignored)
    /// 4. `DAYBOOK__SECTION__KEY` environment variables
    pub fn load(project_dir: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        // Layer 1: Global config
        if let Some(global_path) = global_config_path() {
            if global_path.exists() {
                builder = builder.add_source(File::from(global_path).required(false));
            }
        }

        // Layer 2: Project config
        if let Some(dir) = project_dir {
            let project_config = dir.join(".daybook").join("config.toml");
            if project_config.exists() {
                builder = builder.add_source(File::from(project_config).required(false));
            }

            // Layer 3: Local config (gitignored)
            let local_config = dir.join(".daybook").join("config.local.toml");
            if local_config.exists() {
                builder = builder.add_source(File::from(local_config).required(false));
            }
        }

        // Layer 4: Environment
        builder = builder.add_source(
            Environment::with_prefix("DAYBOOK")
                .prefix_separator("__")
                .separator("__"),
        );

        let config = builder
            .build()
            .map_err(|e| DaybookError::Config(e.to_string()))?;

        let mut cfg: Self = config
            .try_deserialize()
            .map_err(|e| DaybookError::Config(e.to_string()))?;

        cfg.validate();
        Ok(cfg)
    }

    /// Load with defaults only (no files).
    pub fn default_config() -> Self {
        Self {
            storage: StorageConfig::default(),
            remote: RemoteConfig::default(),
            auth: AuthConfig::default(),
            avatars: AvatarConfig::default(),
            web: WebConfig::default(),
            llm: LlmConfig::default(),
            stats: StatsConfig::default(),
        }
    }

    /// Validate config values, fixing out-of-range values and logging warnings.
    /// This is lenient: it repairs values rather than rejecting the config.
    pub fn validate(&mut self) -> Vec<String> {
        let mut warnings = Vec::new();

        let name_checks: [(&str, &str, &[&str]); 3] = [
            ("storage.backend", self.storage.backend.as_str(), VALID_STORAGE_BACKENDS),
            ("auth.provider", self.auth.provider.as_str(), VALID_AUTH_PROVIDERS),
            ("avatars.backend", self.avatars.backend.as_str(), VALID_AVATAR_BACKENDS),
        ];
        for (name, value, valid) in name_checks {
            if !valid.contains(&value) {
                warnings.push(format!("unknown {name} '{value}', valid: {}", valid.join(", ")));
            }
        }

        let wants_remote = self.storage.backend == "remote"
            || self.auth.provider == "remote"
            || self.avatars.backend == "remote";
        if wants_remote && self.remote.url.as_deref().unwrap_or("").is_empty() {
            warnings.push("a remote backend is selected but remote.url is not set".to_string());
        }

        // LLM provider (only validate if enabled)
        if self.llm.enabled && !VALID_LLM_PROVIDERS.contains(&self.llm.provider.as_str()) {
            warnings.push(format!(
                "unknown LLM provider '{}', valid: {}",
                self.llm.provider,
                VALID_LLM_PROVIDERS.join(", ")
            ));
        }

        if self.llm.max_tokens == 0 {
            warnings.push("llm.max_tokens = 0, setting to 256".to_string());
            self.llm.max_tokens = 256;
        }

        if self.stats.default_range_days == 0 {
            warnings.push("stats.default_range_days = 0, setting to 1".to_string());
            self.stats.default_range_days = 1;
        }
        if self.auth.session_hours == 0 {
            warnings.push("auth.session_hours = 0, setting to 1".to_string());
            self.auth.session_hours = 1;
        }
        if self.avatars.max_bytes == 0 {
            warnings.push(format!(
                "avatars.max_bytes = 0, setting to {}",
                default_max_upload_bytes()
            ));
            self.avatars.max_bytes = default_max_upload_bytes();
        }

        for w in &warnings {
            tracing::warn!("config: {}", w);
        }

        warnings
    }
}

/// `~/.config/daybook`, where the default database and uploads live.
pub fn data_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|p| p.join("daybook"))
        .ok_or_else(|| DaybookError::Config("cannot determine config directory".to_string()))
}

fn global_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("daybook").join("config.toml"))
}

/// Resolve the hosted backend's URL and key. The key comes from config, a
/// custom env var, or `DAYBOOK_REMOTE_KEY`.
pub fn resolve_remote(config: &RemoteConfig) -> Result<(String, String)> {
    let url = config
        .url
        .as_deref()
        .filter(|u| !u.is_empty())
        .ok_or_else(|| DaybookError::Config("remote.url is not set".to_string()))?
        .trim_end_matches('/')
        .to_string();

    if let Some(ref key) = config.api_key {
        if !key.is_empty() {
            return Ok((url, key.clone()));
        }
    }

    let env_var_name = config.env_var.as_deref().unwrap_or("DAYBOOK_REMOTE_KEY");
    let key = std::env::var(env_var_name).map_err(|_| {
        DaybookError::Config(format!(
            "remote backend requires an API key (set remote.api_key or {env_var_name})"
        ))
    })?;
    Ok((url, key))
}

use serde::Deserialize;

use crate::session::{DEFAULT_COMPLETION_TIMEOUT, DEFAULT_MAX_FRAME_BYTES};

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub path: String,
    /// Directory of `<name>.sql` overrides for the built-in query templates.
    #[serde(default)]
    pub queries_dir: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    /// When empty, any non-empty bearer token is accepted and forwarded.
    #[serde(default)]
    pub allowed_tokens: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    /// `openai` or `fake`.
    pub provider: String,
    pub api_base: String,
    pub model: String,
    pub temperature: f32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatConfig {
    pub max_history_messages: usize,
    pub completion_timeout_secs: u64,
    /// Largest websocket frame accepted or sent, after reassembling fragments.
    pub max_frame_bytes: usize,
    #[serde(default)]
    pub system_prompt: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub llm: LlmConfig,
    pub chat: ChatConfig,
}

impl AppConfig {
    pub fn load(path: &str) -> Result<Self, config::ConfigError> {
        dotenv::dotenv().ok();

        let settings = config::Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("database.path", "data/chat.db")?
            .set_default("auth.allowed_tokens", Vec::<String>::new())?
            .set_default("llm.provider", "openai")?
            .set_default("llm.api_base", "https://api.openai.com/v1")?
            .set_default("llm.model", "gpt-3.5-turbo")?
            .set_default("llm.temperature", 0.7)?
            .set_default("chat.max_history_messages", 50)?
            .set_default(
                "chat.completion_timeout_secs",
                DEFAULT_COMPLETION_TIMEOUT.as_secs(),
            )?
            .set_default("chat.max_frame_bytes", DEFAULT_MAX_FRAME_BYTES as u64)?
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("CHATRELAY").separator("__"))
            .build()?;

        let mut app_config: AppConfig = settings.try_deserialize()?;

        // Expand environment variables if present like ${OPENAI_API_BASE}
        app_config.server.host = expand_env(&app_config.server.host);
        app_config.database.path = expand_env(&app_config.database.path);
        app_config.llm.api_base = expand_env(&app_config.llm.api_base);
        app_config.auth.allowed_tokens = app_config
            .auth
            .allowed_tokens
            .iter()
            .map(|t| expand_env(t))
            .filter(|t| !t.is_empty())
            .collect();

        Ok(app_config)
    }
}

fn expand_env(val: &str) -> String {
    match val.strip_prefix("${").and_then(|v| v.strip_suffix('}')) {
        Some(var_name) => std::env::var(var_name).unwrap_or_default(),
        None => val.to_string(),
    }
}

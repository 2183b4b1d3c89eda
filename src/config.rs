//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::llm::LlmBackend;

/// Default EXPERTS.AI edumatch opportunity endpoint.
pub const DEFAULT_OPPORTUNITY_API_URL: &str =
    "https://experts.ai/ai.unico.platform.rest/api/common/edumatch/318923/opportunity";

/// System prompt used for free-form `ask` questions.
pub const DEFAULT_ASK_PROMPT: &str = "\
You are the EXPERTS.AI career assistant on a student community server. \
Answer questions about internships, jobs, theses, CVs and interviews concisely and kindly.";

/// Bot configuration, resolved from environment variables.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Telegram Bot API token. `None` disables the Telegram channel.
    pub telegram_token: Option<String>,
    /// Usernames or numeric ids allowed to run admin commands.
    pub admin_users: Vec<String>,
    /// Whether to attach the stdin REPL channel.
    pub cli_enabled: bool,
    /// Chat-completion credentials. `None` disables `ask` and resume backfill.
    pub llm_api_key: Option<SecretString>,
    pub llm_backend: LlmBackend,
    pub model: String,
    pub db_path: PathBuf,
    pub http_port: u16,
    /// Upper bound on every external adapter call.
    pub adapter_timeout: Duration,
    pub opportunity_api_url: String,
    /// Results requested per search keyword.
    pub search_limit: u32,
    pub log_dir: Option<PathBuf>,
    pub ask_prompt: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            telegram_token: None,
            admin_users: Vec::new(),
            cli_enabled: true,
            llm_api_key: None,
            llm_backend: LlmBackend::OpenAi,
            model: "gpt-4o-mini".to_string(),
            db_path: PathBuf::from("./data/jobify.db"),
            http_port: 8080,
            adapter_timeout: Duration::from_secs(20),
            opportunity_api_url: DEFAULT_OPPORTUNITY_API_URL.to_string(),
            search_limit: 5,
            log_dir: None,
            ask_prompt: DEFAULT_ASK_PROMPT.to_string(),
        }
    }
}

impl BotConfig {
    /// Build a config from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup (testable without
    /// touching the process environment).
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let telegram_token = lookup("TELEGRAM_BOT_TOKEN").filter(|t| !t.trim().is_empty());

        let admin_users: Vec<String> = lookup("TELEGRAM_ADMIN_USERS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let cli_enabled = lookup("JOBIFY_CLI")
            .and_then(|s| parse_bool(&s))
            .unwrap_or(telegram_token.is_none());

        let llm_api_key = lookup("OPENAI_API_KEY")
            .filter(|k| !k.trim().is_empty())
            .map(SecretString::from);

        let llm_backend = match lookup("JOBIFY_LLM_BACKEND").as_deref() {
            Some("anthropic") => LlmBackend::Anthropic,
            _ => LlmBackend::OpenAi,
        };

        let model = lookup("JOBIFY_MODEL").unwrap_or(defaults.model);

        let db_path = lookup("JOBIFY_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.db_path);

        let http_port: u16 = lookup("JOBIFY_HTTP_PORT")
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.http_port);

        let adapter_timeout = lookup("JOBIFY_ADAPTER_TIMEOUT_SECS")
            .and_then(|s| s.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(defaults.adapter_timeout);

        let opportunity_api_url =
            lookup("JOBIFY_OPPORTUNITY_API_URL").unwrap_or(defaults.opportunity_api_url);

        let search_limit: u32 = lookup("JOBIFY_SEARCH_LIMIT")
            .and_then(|s| s.parse().ok())
            .filter(|n| *n > 0)
            .unwrap_or(defaults.search_limit);

        let log_dir = lookup("JOBIFY_LOG_DIR").map(PathBuf::from);

        Self {
            telegram_token,
            admin_users,
            cli_enabled,
            llm_api_key,
            llm_backend,
            model,
            db_path,
            http_port,
            adapter_timeout,
            opportunity_api_url,
            search_limit,
            log_dir,
            ask_prompt: defaults.ask_prompt,
        }
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

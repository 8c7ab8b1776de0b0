use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use thiserror::Error;

use crate::cache::{MatchColumn, SchemaVariant};
use crate::prompts::{EmptyContentMode, Persona};

// CLI argument structure
#[derive(Parser, Debug, Clone)]
#[command(name = "monk-gateway")]
#[command(about = "Chat proxy for a hosted LLM with a cached web-content layer")]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    // Port to run the server on
    #[arg(short, long, env = "MONK_PORT", default_value_t = 5000)]
    pub port: u16,

    // LLM provider key, GOOGLE_API_KEY is read when this is unset
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    #[arg(long, default_value = "gemini-1.5-flash")]
    pub model: String,

    #[arg(long, default_value = "https://generativelanguage.googleapis.com/v1beta")]
    pub llm_base_url: String,

    // LLM request timeout in seconds
    #[arg(long, default_value_t = 60)]
    pub llm_timeout: u64,

    // Upper bound on a provider-suggested retry delay, in seconds
    #[arg(long, default_value_t = 30)]
    pub max_retry_delay: u64,

    // Delay used when the provider does not suggest one, in milliseconds
    #[arg(long, default_value_t = 1000)]
    pub default_retry_delay_ms: u64,

    #[arg(long, value_enum, default_value_t = CacheBackend::Auto)]
    pub cache_backend: CacheBackend,

    #[arg(long, env = "DB_HOST", default_value = "localhost")]
    pub db_host: String,

    #[arg(long, env = "DB_PORT", default_value_t = 5432)]
    pub db_port: u16,

    #[arg(long, env = "DB_NAME", default_value = "cyberpunk_monk")]
    pub db_name: String,

    #[arg(long, env = "DB_USER", default_value = "postgres")]
    pub db_user: String,

    #[arg(long, env = "DB_PASSWORD", hide_env_values = true)]
    pub db_password: Option<String>,

    // Embedded store used when PostgreSQL is unreachable
    #[arg(long, env = "MONK_SQLITE_PATH", default_value = "data_cache.db")]
    pub sqlite_path: PathBuf,

    #[arg(long, value_enum, default_value_t = SchemaVariant::Surrogate)]
    pub schema: SchemaVariant,

    #[arg(long, value_enum, default_value_t = MatchColumn::Content)]
    pub match_column: MatchColumn,

    #[arg(long, value_enum, default_value_t = Persona::Monk)]
    pub persona: Persona,

    // What to do when the cache has nothing for a query
    #[arg(long, value_enum, default_value_t = EmptyContentMode::Direct)]
    pub empty_content: EmptyContentMode,

    // Overrides the canned reply used when the cache has nothing
    #[arg(long)]
    pub fallback_reply: Option<String>,

    // Fixed seed for link selection, random per call when unset
    #[arg(long)]
    pub prompt_seed: Option<u64>,

    // Prepend the operating rules preamble to recruiter prompts
    #[arg(long, default_value_t = false)]
    pub operating_rules: bool,

    #[arg(long, default_value_t = 4000)]
    pub max_context_chars: usize,

    #[arg(long, default_value = "static")]
    pub static_dir: PathBuf,

    #[arg(long, default_value = "chat.html")]
    pub index_file: String,

    // Per-URL fetch timeout in seconds
    #[arg(long, default_value_t = 5)]
    pub fetch_timeout: u64,

    // Background refresh interval in seconds, 0 disables it
    #[arg(long, default_value_t = 0)]
    pub refresh_interval: u64,

    #[arg(long, env = "MONK_LOG", default_value = "info")]
    pub log_level: String,

    #[arg(long, default_value_t = false)]
    pub log_json: bool,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Serve the chat API and static UI (default)
    Serve,
    /// Fetch every redirect URL once into the content cache and exit
    Fetch,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackend {
    /// PostgreSQL, falling back to the SQLite file
    Auto,
    Postgres,
    Sqlite,
    /// Process-local map, lost on exit
    Memory,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("GEMINI_API_KEY (or GOOGLE_API_KEY) is not set")]
    MissingApiKey,

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Provider credential. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey([REDACTED])")
    }
}

#[derive(Clone)]
pub struct DatabaseConfig {
    pub backend: CacheBackend,
    pub host: String,
    pub port: u16,
    pub name: String,
    pub user: String,
    pub password: Option<String>,
    pub sqlite_path: PathBuf,
    pub schema: SchemaVariant,
    pub match_column: MatchColumn,
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("backend", &self.backend)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("name", &self.name)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("sqlite_path", &self.sqlite_path)
            .field("schema", &self.schema)
            .field("match_column", &self.match_column)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: ApiKey,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
    pub default_retry_delay: Duration,
    pub max_retry_delay: Duration,
}

#[derive(Debug, Clone)]
pub struct PromptConfig {
    pub persona: Persona,
    pub empty_content: EmptyContentMode,
    pub fallback_reply: Option<String>,
    pub seed: Option<u64>,
    pub operating_rules: bool,
    pub max_context_chars: usize,
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub timeout: Duration,
    // None when background refresh is disabled
    pub refresh_interval: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub static_dir: PathBuf,
    pub index_file: String,
}

/// Process configuration, built once at startup and shared read-only.
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    // Absent only for commands that never call the provider
    pub llm: Option<LlmConfig>,
    pub prompt: PromptConfig,
    pub fetch: FetchConfig,
}

impl Config {
    /// Validate parsed arguments. `require_llm` makes a missing API key fatal.
    pub fn from_args(args: &Args, require_llm: bool) -> Result<Self, ConfigError> {
        let google_env = std::env::var("GOOGLE_API_KEY").ok();
        Self::build(args, google_env.as_deref(), require_llm)
    }

    // Everything except the GOOGLE_API_KEY lookup, which the caller passes in.
    fn build(args: &Args, google_env: Option<&str>, require_llm: bool) -> Result<Self, ConfigError> {
        let api_key = resolve_api_key(args.api_key.as_deref(), google_env);

        let llm = match api_key {
            Some(api_key) => Some(LlmConfig {
                api_key,
                model: args.model.clone(),
                base_url: args.llm_base_url.trim_end_matches('/').to_string(),
                timeout: Duration::from_secs(args.llm_timeout),
                default_retry_delay: Duration::from_millis(args.default_retry_delay_ms),
                max_retry_delay: Duration::from_secs(args.max_retry_delay),
            }),
            None if require_llm => return Err(ConfigError::MissingApiKey),
            None => None,
        };

        if args.llm_timeout == 0 {
            return Err(ConfigError::Invalid("--llm-timeout must be positive".into()));
        }
        if args.fetch_timeout == 0 {
            return Err(ConfigError::Invalid("--fetch-timeout must be positive".into()));
        }
        if args.index_file.contains('/') || args.index_file.contains("..") {
            return Err(ConfigError::Invalid(format!(
                "--index-file must be a bare file name, got {:?}",
                args.index_file
            )));
        }

        Ok(Self {
            server: ServerConfig {
                port: args.port,
                static_dir: args.static_dir.clone(),
                index_file: args.index_file.clone(),
            },
            database: DatabaseConfig {
                backend: args.cache_backend,
                host: args.db_host.clone(),
                port: args.db_port,
                name: args.db_name.clone(),
                user: args.db_user.clone(),
                password: args.db_password.clone().filter(|p| !p.is_empty()),
                sqlite_path: args.sqlite_path.clone(),
                schema: args.schema,
                match_column: args.match_column,
            },
            llm,
            prompt: PromptConfig {
                persona: args.persona,
                empty_content: args.empty_content,
                fallback_reply: args.fallback_reply.clone().filter(|r| !r.trim().is_empty()),
                seed: args.prompt_seed,
                operating_rules: args.operating_rules,
                max_context_chars: args.max_context_chars,
            },
            fetch: FetchConfig {
                timeout: Duration::from_secs(args.fetch_timeout),
                refresh_interval: (args.refresh_interval > 0)
                    .then(|| Duration::from_secs(args.refresh_interval)),
            },
        })
    }
}

// Explicit flag / GEMINI_API_KEY first, then GOOGLE_API_KEY. Blank values count as unset.
fn resolve_api_key(explicit: Option<&str>, google_env: Option<&str>) -> Option<ApiKey> {
    explicit
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .or_else(|| google_env.map(str::trim).filter(|k| !k.is_empty()))
        .map(ApiKey::new)
}

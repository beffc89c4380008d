use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use std::ops::{Deref, DerefMut};
use std::path::PathBuf;
use std::sync::Arc;

/// Top-level API configuration shared across services.
#[derive(Default, Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfigInner {
    pub server: ServerConfig,
    pub security: SecurityConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub links: LinksConfig,
    pub tasks: TasksConfig,
    pub chat: ChatConfig,
    pub mail: MailConfig,
    pub assistant: AssistantConfig,
}

/// Thin Arc-wrapped config for inexpensive cloning into subsystems.
#[derive(Default, Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(flatten, default)]
    inner: Arc<ApiConfigInner>,
}

impl Deref for ApiConfig {
    type Target = ApiConfigInner;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl DerefMut for ApiConfig {
    fn deref_mut(&mut self) -> &mut ApiConfigInner {
        Arc::make_mut(&mut self.inner)
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub address: IpAddr,
    pub port: u16,
    /// Browser origins allowed to call the API with credentials.
    pub cors_origins: Vec<String>,
    pub ssl: Option<SslConfig>,
}

/// TLS certificate/key paths.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SslConfig {
    pub cert: PathBuf,
    pub key: PathBuf,
}

/// `SurrealDB` connection configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub namespace: String,
    pub database: String,
    pub credentials: Option<DatabaseCredentials>,
}

/// `SurrealDB` root credentials (optional when using unauthenticated engines like mem://).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseCredentials {
    pub username: String,
    pub password: String,
}

#[derive(Default, Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    pub jwt: JwtConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct JwtConfig {
    pub secret: String,
    /// One of `HS256`, `HS384`, `HS512`.
    pub algorithm: String,
    pub issuer: String,
    pub ttl_minutes: u64,
    /// Upper bound on tracked revoked tokens.
    pub revocation_capacity: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// Directory for rolling files; console only when unset.
    pub dir: Option<PathBuf>,
    pub json: bool,
    pub error_file: bool,
    pub max_files: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LinksConfig {
    /// Public prefix of short URLs, `{base_url}/short.ly/{code}`.
    pub base_url: String,
    pub slug_length: usize,
    pub retention_days: u32,
    pub expire_batch_size: u32,
    pub cache_capacity: u64,
    pub cache_ttl_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TasksConfig {
    pub workers: usize,
    pub queue_capacity: usize,
    pub result_ttl_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub last_seen_ttl_days: u64,
    pub user_list_cache_seconds: u64,
    pub message_list_cache_seconds: u64,
    /// Largest accepted attachment after base64 decoding.
    pub max_file_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    /// Messages fetched per mailbox and run.
    pub max_results: u32,
    pub gmail: GmailConfig,
    pub outlook: OutlookConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GmailConfig {
    pub api_base: String,
    pub token_url: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutlookConfig {
    pub authority: String,
    pub graph_base: String,
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
}

/// OpenAI-compatible chat-completions endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
    pub reasoning_effort: String,
    pub timeout_seconds: u64,
}

// --- Default ---

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 8000,
            cors_origins: vec!["http://localhost:3000".to_owned()],
            ssl: None,
        }
    }
}

impl Default for SslConfig {
    fn default() -> Self {
        Self { cert: PathBuf::from("cert.pem"), key: PathBuf::from("key.pem") }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "mem://".to_owned(),
            namespace: "shortly".to_owned(),
            database: "core".to_owned(),
            credentials: None,
        }
    }
}

impl Default for DatabaseCredentials {
    fn default() -> Self {
        Self { username: "root".to_owned(), password: "root".to_owned() }
    }
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            algorithm: "HS256".to_owned(),
            issuer: "shortly".to_owned(),
            ttl_minutes: 30,
            revocation_capacity: 100_000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            dir: Some(PathBuf::from("logs")),
            json: false,
            error_file: true,
            max_files: 5,
        }
    }
}

impl Default for LinksConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/api".to_owned(),
            slug_length: 6,
            retention_days: 30,
            expire_batch_size: 1000,
            cache_capacity: 10_000,
            cache_ttl_seconds: 300,
        }
    }
}

impl Default for TasksConfig {
    fn default() -> Self {
        Self { workers: 4, queue_capacity: 1024, result_ttl_seconds: 3600 }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            last_seen_ttl_days: 30,
            user_list_cache_seconds: 60,
            message_list_cache_seconds: 30,
            max_file_bytes: 10 * 1024 * 1024,
        }
    }
}

impl Default for MailConfig {
    fn default() -> Self {
        Self { max_results: 5, gmail: GmailConfig::default(), outlook: OutlookConfig::default() }
    }
}

impl Default for GmailConfig {
    fn default() -> Self {
        Self {
            api_base: "https://gmail.googleapis.com/gmail/v1".to_owned(),
            token_url: "https://oauth2.googleapis.com/token".to_owned(),
        }
    }
}

impl Default for OutlookConfig {
    fn default() -> Self {
        Self {
            authority: "https://login.microsoftonline.com".to_owned(),
            graph_base: "https://graph.microsoft.com/v1.0".to_owned(),
            tenant_id: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
        }
    }
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.groq.com/openai/v1".to_owned(),
            api_key: String::new(),
            model: "openai/gpt-oss-120b".to_owned(),
            temperature: 1.0,
            top_p: 1.0,
            max_tokens: 8192,
            reasoning_effort: "medium".to_owned(),
            timeout_seconds: 60,
        }
    }
}

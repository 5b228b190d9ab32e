use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub gemini: GeminiConfig,
    pub chroma: ChromaConfig,
    pub rag: RagConfig,
    pub redis_url: String,
    pub conversation_ttl_seconds: u64,
    pub rate_limit: RateLimitConfig,
    pub cors_allowed_origins: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout_seconds: u64,
}

impl GeminiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

#[derive(Debug, Clone)]
pub struct ChromaConfig {
    pub url: String,
    pub collection: String,
    pub timeout_seconds: u64,
}

impl ChromaConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

#[derive(Debug, Clone)]
pub struct RagConfig {
    pub similarity_threshold: f32,
    pub max_context_docs: usize,
    pub system_prompt: String,
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub max_requests: usize,
    pub window_seconds: u64,
}

const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant. Use the provided context \
to answer questions accurately. If the context doesn't contain relevant information, say so \
and provide a general answer.";

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            server: ServerConfig {
                host: env_or("SERVER_HOST", "0.0.0.0"),
                port: env_parse_or("SERVER_PORT", 8080),
            },
            gemini: GeminiConfig {
                api_key: env_or("GEMINI_API_KEY", ""),
                model: env_or("GEMINI_MODEL", "gemini-2.5-flash"),
                base_url: env_or(
                    "GEMINI_BASE_URL",
                    "https://generativelanguage.googleapis.com",
                ),
                timeout_seconds: env_parse_or("REQUEST_TIMEOUT_SECONDS", 30),
            },
            chroma: ChromaConfig {
                url: env_or("CHROMA_URL", "http://localhost:8000"),
                collection: env_or("CHROMA_COLLECTION", "documents"),
                timeout_seconds: env_parse_or("REQUEST_TIMEOUT_SECONDS", 30),
            },
            rag: RagConfig {
                similarity_threshold: env_parse_or("SIMILARITY_THRESHOLD", 0.2),
                max_context_docs: env_parse_or("RAG_MAX_CONTEXT_DOCS", 3),
                system_prompt: env_or("RAG_SYSTEM_PROMPT", DEFAULT_SYSTEM_PROMPT),
            },
            redis_url: env_or("REDIS_URL", "redis://localhost:6379"),
            conversation_ttl_seconds: env_parse_or("CONVERSATION_TTL_SECONDS", 86_400),
            rate_limit: RateLimitConfig {
                max_requests: env_parse_or("RATE_LIMIT_MAX_REQUESTS", 100),
                window_seconds: env_parse_or("RATE_LIMIT_WINDOW_SECONDS", 60),
            },
            cors_allowed_origins: env_or("CORS_ALLOWED_ORIGINS", "*")
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_parse_or_falls_back() {
        assert_eq!(env_parse_or("RAG_GATEWAY_MISSING_VAR", 42u16), 42);
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_env();
        assert!(config.rag.similarity_threshold > 0.0);
        assert!(config.rag.max_context_docs > 0);
        assert!(!config.rag.system_prompt.is_empty());
    }
}

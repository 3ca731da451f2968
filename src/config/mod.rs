use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub session: SessionConfig,
    pub localization: LocalizationConfig,
    pub routing: RoutingConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Primary connection; in-memory stores are used when unset
    #[serde(skip_serializing)]
    pub url: Option<String>,
    pub max_connections: u32,
    pub connection_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub ttl_secs: i64,
    pub cookie_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalizationConfig {
    pub supported_languages: Vec<String>,
    /// Used when the settings store has no default language
    pub default_language: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    pub route_file: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub enable_request_logging: bool,
    pub max_request_size_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub cors_origins: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // environment preset first, individual variables win
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        if let Some(port) = env_value("ORANGE_PORT")
            .or_else(|| env_value("PORT"))
            .and_then(|s| s.parse::<u16>().ok())
        {
            self.server.port = port;
        }

        if let Some(url) = env_value("DATABASE_URL") {
            self.database.url = Some(url);
        }
        parse_into("DATABASE_MAX_CONNECTIONS", &mut self.database.max_connections);
        parse_into("DATABASE_CONNECTION_TIMEOUT", &mut self.database.connection_timeout);

        parse_into("SESSION_TTL_SECS", &mut self.session.ttl_secs);
        if let Some(name) = env_value("SESSION_COOKIE_NAME") {
            self.session.cookie_name = name;
        }

        if let Some(list) = env_value("L11N_SUPPORTED_LANGUAGES") {
            self.localization.supported_languages = split_list(&list);
        }
        if let Some(lang) = env_value("L11N_DEFAULT_LANGUAGE") {
            self.localization.default_language = lang.to_lowercase();
        }

        if let Some(file) = env_value("ROUTE_FILE") {
            self.routing.route_file = file;
        }

        parse_into("API_ENABLE_REQUEST_LOGGING", &mut self.api.enable_request_logging);
        parse_into("API_MAX_REQUEST_SIZE_BYTES", &mut self.api.max_request_size_bytes);

        if let Some(list) = env_value("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = split_list(&list);
        }

        self
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig { port: 3000 },
            database: DatabaseConfig {
                url: None,
                max_connections: 10,
                connection_timeout: 30,
            },
            session: SessionConfig {
                ttl_secs: 36000,
                cookie_name: "sid".to_string(),
            },
            localization: LocalizationConfig {
                supported_languages: vec!["en".to_string(), "de".to_string()],
                default_language: "en".to_string(),
            },
            routing: RoutingConfig {
                route_file: "config/routes.yml".to_string(),
            },
            api: ApiConfig {
                enable_request_logging: true,
                max_request_size_bytes: 10 << 20,
            },
            security: SecurityConfig {
                cors_origins: vec!["http://localhost:3000".to_string(), "http://localhost:5173".to_string()],
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            database: DatabaseConfig {
                url: None,
                max_connections: 20,
                connection_timeout: 10,
            },
            api: ApiConfig {
                enable_request_logging: true,
                max_request_size_bytes: 5 << 20,
            },
            security: SecurityConfig {
                cors_origins: vec!["https://staging.example.com".to_string()],
            },
            ..Self::development()
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            database: DatabaseConfig {
                url: None,
                max_connections: 50,
                connection_timeout: 5,
            },
            api: ApiConfig {
                enable_request_logging: false,
                max_request_size_bytes: 2 << 20,
            },
            security: SecurityConfig {
                cors_origins: vec!["https://app.example.com".to_string()],
            },
            ..Self::development()
        }
    }

    pub fn is_development(&self) -> bool {
        self.environment == Environment::Development
    }
}

/// Trimmed, non-empty value of `key`
fn env_value(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Overwrite `slot` when `key` is set and parses; bad values keep the preset
fn parse_into<T: std::str::FromStr>(key: &str, slot: &mut T) {
    if let Some(parsed) = env_value(key).and_then(|v| v.parse().ok()) {
        *slot = parsed;
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Process-wide configuration, read from the environment on first use
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn development_preset_uses_memory_stores() {
        let config = AppConfig::development();
        assert_eq!(config.session.ttl_secs, 36000);
        assert_eq!(config.localization.default_language, "en");
        assert!(config.database.url.is_none());
        assert!(config.is_development());
    }

    #[test]
    fn production_preset_is_quiet() {
        let config = AppConfig::production();
        assert_eq!(config.database.max_connections, 50);
        assert!(!config.api.enable_request_logging);
        assert_eq!(config.session.cookie_name, "sid");
    }

    #[test]
    fn language_lists_are_normalized() {
        assert_eq!(split_list(" EN, de ,,fr"), vec!["en", "de", "fr"]);
    }
}

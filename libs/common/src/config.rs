//! HTTP server configuration

use config::{Config, ConfigError, Environment};
use serde::Deserialize;

/// Address a service binds to
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    /// Load the server configuration for a service
    ///
    /// `<PREFIX>_HOST` and `<PREFIX>_PORT` override the given defaults, e.g.
    /// `API_PORT=8080` for the prefix `API`.
    pub fn from_env(prefix: &str, default_port: u16) -> Result<Self, ConfigError> {
        Config::builder()
            .set_default("host", "0.0.0.0")?
            .set_default("port", i64::from(default_port))?
            .add_source(Environment::with_prefix(prefix))
            .build()?
            .try_deserialize()
    }

    /// Socket address to bind
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_server_config_defaults() {
        unsafe {
            std::env::remove_var("QUIZTEST_HOST");
            std::env::remove_var("QUIZTEST_PORT");
        }

        let config = ServerConfig::from_env("QUIZTEST", 3001).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3001);
        assert_eq!(config.bind_address(), "0.0.0.0:3001");
    }

    #[test]
    #[serial]
    fn test_server_config_env_override() {
        unsafe {
            std::env::set_var("QUIZTEST_HOST", "127.0.0.1");
            std::env::set_var("QUIZTEST_PORT", "8088");
        }

        let config = ServerConfig::from_env("QUIZTEST", 3001).unwrap();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8088);

        unsafe {
            std::env::remove_var("QUIZTEST_HOST");
            std::env::remove_var("QUIZTEST_PORT");
        }
    }
}

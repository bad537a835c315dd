// Configuration module entry point
// Manages application configuration and shared runtime state

mod state;
mod types;

use std::net::SocketAddr;

// Re-export public types
pub use state::AppState;
pub use types::{
    Config, HealthConfig, HttpConfig, LoggingConfig, PerformanceConfig, ProxyConfig, ServerConfig,
    SiteConfig,
};

impl Config {
    /// Load configuration from `config.toml` plus environment overrides
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from specified file path (without extension)
    ///
    /// Precedence, lowest to highest: built-in defaults, the config file,
    /// `EDGE_`-prefixed environment variables, and finally a plain `PORT`
    /// variable (what the hosting platform sets for us).
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(config::Environment::with_prefix("EDGE").separator("__"))
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("site.root", "dist")?
            .set_default("site.entry", "index.html")?
            .set_default(
                "proxy.upstream",
                "http://1ea6ea7c-3f41-45f9-a433-3201ac93c384.brazilsouth.azurecontainer.io",
            )?
            .set_default("proxy.api_prefix", "/api")?
            .set_default("proxy.timeout", 30)?
            .set_default("http.server_name", "Tasador-Edge/0.1")?
            .set_default("http.enable_cors", false)?
            .set_default("http.max_body_size", 1_048_576)? // 1MB, scoring payloads are tiny
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .set_default("logging.show_headers", false)?
            .set_default("performance.keep_alive_timeout", 75)?
            .set_default("performance.read_timeout", 30)?
            .set_default("performance.write_timeout", 30)?;

        // Hosting platforms hand the listen port over as plain PORT
        if let Ok(port) = std::env::var("PORT") {
            builder = builder.set_override("server.port", port)?;
        }

        builder.build()?.try_deserialize()
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_config_file() {
        let cfg = Config::load_from("does-not-exist").expect("defaults should deserialize");
        assert_eq!(cfg.server.host, "0.0.0.0");
        assert_eq!(cfg.site.root, "dist");
        assert_eq!(cfg.site.entry, "index.html");
        assert_eq!(cfg.proxy.api_prefix, "/api");
        assert_eq!(cfg.proxy.timeout, 30);
        assert!(cfg.health.enabled);
        assert_eq!(cfg.health.liveness_path, "/healthz");
    }

    #[test]
    fn test_socket_addr() {
        let mut cfg = Config::load_from("does-not-exist").unwrap();
        cfg.server.host = "127.0.0.1".to_string();
        cfg.server.port = 8080;
        let addr = cfg.get_socket_addr().unwrap();
        assert_eq!(addr.to_string(), "127.0.0.1:8080");
    }
}

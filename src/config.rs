use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("HOST must not be empty")]
    EmptyHost,
    #[error("invalid PORT {value:?}")]
    InvalidPort {
        value: String,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("invalid {name} {value:?}: expected 0/1/true/false")]
    InvalidFlag { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub model_path: PathBuf,
    pub encoders_path: PathBuf,
    pub static_dir: PathBuf,
    pub templates_dir: PathBuf,
    /// Opt-in only. When artifacts fail to load the process exits unless this
    /// is set, in which case it serves with `model_loaded: false`.
    pub allow_missing_model: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            model_path: PathBuf::from("model/traffic_model.json"),
            encoders_path: PathBuf::from("model/label_encoders.json"),
            static_dir: PathBuf::from("static"),
            templates_dir: PathBuf::from("templates"),
            allow_missing_model: false,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; unset keys keep their defaults.
    pub fn from_lookup<F>(get: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(host) = get("HOST") {
            let host = host.trim();
            if host.is_empty() {
                return Err(ConfigError::EmptyHost);
            }
            cfg.host = host.to_string();
        }
        if let Some(port) = get("PORT") {
            cfg.port = port
                .trim()
                .parse()
                .map_err(|source| ConfigError::InvalidPort { value: port.clone(), source })?;
        }
        if let Some(p) = get("MODEL_PATH") {
            cfg.model_path = PathBuf::from(p);
        }
        if let Some(p) = get("ENCODERS_PATH") {
            cfg.encoders_path = PathBuf::from(p);
        }
        if let Some(p) = get("STATIC_DIR") {
            cfg.static_dir = PathBuf::from(p);
        }
        if let Some(p) = get("TEMPLATES_DIR") {
            cfg.templates_dir = PathBuf::from(p);
        }
        if let Some(v) = get("ALLOW_MISSING_MODEL") {
            cfg.allow_missing_model = match v.trim() {
                "1" | "true" => true,
                "0" | "false" | "" => false,
                _ => {
                    return Err(ConfigError::InvalidFlag {
                        name: "ALLOW_MISSING_MODEL",
                        value: v,
                    })
                }
            };
        }

        Ok(cfg)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

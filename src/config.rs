use std::env;
use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::{AppError, Result};

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-preview-09-2025";
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_SECRETS_FILE: &str = "secrets.toml";
pub const API_KEY_NAME: &str = "GOOGLE_API_KEY";

/// Contents of the local, git-ignored secrets file.
#[derive(Debug, Default, Deserialize)]
pub struct Secrets {
    #[serde(rename = "GOOGLE_API_KEY")]
    pub google_api_key: Option<String>,
}

#[derive(Clone)]
pub struct Config {
    pub server_addr: SocketAddr,
    pub google_api_key: String,
    pub gemini_model: String,
    pub gemini_api_base: String,
}

impl Config {
    pub fn load() -> Result<Self> {
        // Load environment variables from .env file if it exists
        dotenv::dotenv().ok();

        let secrets_path =
            env::var("SECRETS_FILE").unwrap_or_else(|_| DEFAULT_SECRETS_FILE.to_string());
        let secrets = Secrets::load(Path::new(&secrets_path))?;
        let google_api_key = resolve_api_key(env::var(API_KEY_NAME).ok(), secrets, &secrets_path)?;

        // Load server configuration with defaults
        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("PORT").unwrap_or_else(|_| "3000".to_string());
        let server_addr = parse_server_addr(&host, &port)?;

        let gemini_model = env::var("GEMINI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let gemini_api_base = env::var("GEMINI_API_BASE")
            .unwrap_or_else(|_| DEFAULT_API_BASE.to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Config {
            server_addr,
            google_api_key,
            gemini_model,
            gemini_api_base,
        })
    }
}

impl Secrets {
    /// A missing file yields empty secrets; a file that exists but is not
    /// valid TOML is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No secrets file at {}", path.display());
            return Ok(Secrets::default());
        }

        let raw = fs::read_to_string(path).map_err(|e| {
            AppError::ConfigError(format!("Cannot read {}: {}", path.display(), e))
        })?;

        toml::from_str(&raw).map_err(|e| {
            AppError::ConfigError(format!("Invalid TOML in {}: {}", path.display(), e))
        })
    }
}

/// The environment wins over the secrets file. Blank values count as missing.
pub fn resolve_api_key(from_env: Option<String>, secrets: Secrets, secrets_path: &str) -> Result<String> {
    from_env
        .into_iter()
        .chain(secrets.google_api_key)
        .map(|key| key.trim().to_string())
        .find(|key| !key.is_empty())
        .ok_or_else(|| {
            AppError::ConfigError(format!(
                "{} is not set. Create `{}` next to the binary containing `{} = \"YOUR_API_KEY\"` \
                 or export {} in the environment.",
                API_KEY_NAME, secrets_path, API_KEY_NAME, API_KEY_NAME
            ))
        })
}

pub fn parse_server_addr(host: &str, port: &str) -> Result<SocketAddr> {
    let port = port
        .parse::<u16>()
        .map_err(|e| AppError::ConfigError(format!("Invalid port: {}", e)))?;
    let ip = IpAddr::from_str(host)
        .map_err(|e| AppError::ConfigError(format!("Invalid host address: {}", e)))?;

    Ok(SocketAddr::new(ip, port))
}

//! Configuration for civic
//!
//! Read from `$CIVIC_CONFIG` or `./civic.toml`; deploy-time values can be
//! overridden from the environment.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::access::Role;

pub const CONFIG_ENV: &str = "CIVIC_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "civic.toml";

/// civic configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Issue ID prefix (e.g., "iss")
    pub prefix: String,

    /// Directory holding issues.jsonl (and disk media, unless media.dir is set)
    pub data_dir: PathBuf,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub media: MediaConfig,

    #[serde(default)]
    pub geocode: GeocodeConfig,

    #[serde(default)]
    pub auth: AuthConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            prefix: "iss".to_string(),
            data_dir: default_data_dir(),
            server: ServerConfig::default(),
            media: MediaConfig::default(),
            geocode: GeocodeConfig::default(),
            auth: AuthConfig::default(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("civic"))
        .unwrap_or_else(|| PathBuf::from(".civic"))
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,

    /// Path prefix the issue routes are mounted under
    pub api_prefix: String,

    /// Allow any origin (the SPA is usually served from another port)
    pub cors_allow_any: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            api_prefix: "/api".to_string(),
            cors_allow_any: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MediaBackend {
    /// Image uploads are rejected
    #[default]
    Disabled,
    /// Files are written under `media.dir` and served at /media
    Disk,
    /// Signed uploads to Cloudinary
    Cloudinary,
}

/// Image upload settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    pub backend: MediaBackend,

    /// Largest accepted upload in bytes
    pub max_bytes: usize,

    /// Accepted file extensions, lowercase
    pub allowed_formats: Vec<String>,

    /// Cloudinary folder
    pub folder: String,

    /// Base URL used to build links to disk-stored media
    pub public_base_url: String,

    /// Disk backend directory (defaults to <data_dir>/media)
    pub dir: Option<PathBuf>,

    pub cloudinary: CloudinaryConfig,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            backend: MediaBackend::Disabled,
            max_bytes: 5 * 1024 * 1024,
            allowed_formats: vec!["jpg".into(), "jpeg".into(), "png".into()],
            folder: "issue-tracker".to_string(),
            public_base_url: "http://127.0.0.1:5000".to_string(),
            dir: None,
            cloudinary: CloudinaryConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
}

impl CloudinaryConfig {
    pub fn is_complete(&self) -> bool {
        !self.cloud_name.is_empty() && !self.api_key.is_empty() && !self.api_secret.is_empty()
    }
}

/// Address lookup proxy settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocodeConfig {
    pub enabled: bool,

    /// Nominatim search endpoint
    pub endpoint: String,

    /// Comma separated ISO country codes results are restricted to
    pub country_codes: String,

    /// Appended to every query ("<address>, India")
    pub country_suffix: String,

    /// Nominatim rejects requests without an identifying User-Agent
    pub user_agent: String,
}

impl Default for GeocodeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "https://nominatim.openstreetmap.org/search".to_string(),
            country_codes: "in".to_string(),
            country_suffix: "India".to_string(),
            user_agent: format!("civic/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Bearer tokens accepted by the API
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AuthConfig {
    pub tokens: Vec<TokenEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenEntry {
    pub token: String,
    pub user_id: String,
    #[serde(default)]
    pub role: Role,
}

impl Config {
    /// Path of the config file: `$CIVIC_CONFIG`, else ./civic.toml
    pub fn default_path() -> PathBuf {
        std::env::var(CONFIG_ENV)
            .ok()
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
    }

    /// Load config from a TOML file
    pub fn load(path: &Path) -> crate::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> crate::Result<Self> {
        toml::from_str(content).map_err(|e| crate::Error::Config(e.to_string()))
    }

    /// Load from the default path, then apply environment overrides
    pub fn load_default() -> crate::Result<Self> {
        let mut config = Self::load(&Self::default_path())?;
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Override deploy-time values from the environment
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> crate::Result<()> {
        let get = |key: &str| var(key).filter(|v| !v.is_empty());

        if let Some(host) = get("CIVIC_HOST") {
            self.server.host = host;
        }
        if let Some(port) = get("CIVIC_PORT") {
            self.server.port = port
                .parse()
                .map_err(|e| crate::Error::Config(format!("CIVIC_PORT={port}: {e}")))?;
        }
        if let Some(dir) = get("CIVIC_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(name) = get("CLOUDINARY_CLOUD_NAME") {
            self.media.cloudinary.cloud_name = name;
        }
        if let Some(key) = get("CLOUDINARY_API_KEY") {
            self.media.cloudinary.api_key = key;
        }
        if let Some(secret) = get("CLOUDINARY_API_SECRET") {
            self.media.cloudinary.api_secret = secret;
        }
        Ok(())
    }

    /// Check settings that only fail at first use otherwise
    pub fn validate(&self) -> crate::Result<()> {
        if self.prefix.is_empty() || self.prefix.contains('-') {
            return Err(crate::Error::Config(format!(
                "prefix must be non-empty and contain no '-': {:?}",
                self.prefix
            )));
        }
        if self.media.backend == MediaBackend::Cloudinary && !self.media.cloudinary.is_complete() {
            return Err(crate::Error::Config(
                "media.backend = \"cloudinary\" needs cloud_name, api_key and api_secret".into(),
            ));
        }
        if let Some(entry) = self.auth.tokens.iter().find(|t| t.token.is_empty()) {
            return Err(crate::Error::Config(format!(
                "empty token for user {}",
                entry.user_id
            )));
        }
        Ok(())
    }

    /// Directory the disk media backend writes to
    pub fn media_dir(&self) -> PathBuf {
        self.media
            .dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("media"))
    }

    /// Save config to a TOML file
    pub fn save(&self, path: &Path) -> crate::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Generate a default config file with comments
    pub fn default_with_comments() -> String {
        r#"# civic configuration

# Issue ID prefix
prefix = "iss"

# Where issues.jsonl lives (defaults to the platform data dir)
# data_dir = "/var/lib/civic"

[server]
host = "127.0.0.1"
port = 5000
api_prefix = "/api"
cors_allow_any = true

[media]
# disabled | disk | cloudinary
backend = "disabled"
max_bytes = 5242880
allowed_formats = ["jpg", "jpeg", "png"]
folder = "issue-tracker"
# Base URL for links to disk-stored media
public_base_url = "http://127.0.0.1:5000"
# dir = "/var/lib/civic/media"

[media.cloudinary]
# Prefer CLOUDINARY_CLOUD_NAME / CLOUDINARY_API_KEY / CLOUDINARY_API_SECRET
cloud_name = ""
api_key = ""
api_secret = ""

[geocode]
enabled = true
endpoint = "https://nominatim.openstreetmap.org/search"
country_codes = "in"
country_suffix = "India"
# Nominatim requires an identifying User-Agent, ideally with a contact address
# user_agent = "civic (ops@example.org)"

# One entry per session token
# [[auth.tokens]]
# token = "change-me"
# user_id = "u1"
# role = "user"
#
# [[auth.tokens]]
# token = "change-me-too"
# user_id = "admin"
# role = "admin"
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_commented_default_parses() {
        let config = Config::parse(&Config::default_with_comments()).unwrap();
        assert_eq!(config.prefix, "iss");
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.media.backend, MediaBackend::Disabled);
        assert!(config.auth.tokens.is_empty());
        config.validate().unwrap();
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(config.server.api_prefix, "/api");
    }

    #[test]
    fn test_tokens_and_media() {
        let config = Config::parse(
            r#"
            prefix = "pmc"
            [media]
            backend = "disk"
            dir = "/tmp/media"
            [[auth.tokens]]
            token = "t1"
            user_id = "u1"
            [[auth.tokens]]
            token = "t2"
            user_id = "boss"
            role = "admin"
            "#,
        )
        .unwrap();
        assert_eq!(config.prefix, "pmc");
        assert_eq!(config.media.backend, MediaBackend::Disk);
        assert_eq!(config.media_dir(), PathBuf::from("/tmp/media"));
        assert_eq!(config.auth.tokens[0].role, Role::User);
        assert_eq!(config.auth.tokens[1].role, Role::Admin);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("CIVIC_PORT", "8080"),
            ("CIVIC_DATA_DIR", "/srv/civic"),
            ("CLOUDINARY_API_KEY", "key"),
            ("CIVIC_HOST", ""),
        ]
        .into_iter()
        .collect();
        let mut config = Config::default();
        config
            .apply_env(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.data_dir, PathBuf::from("/srv/civic"));
        assert_eq!(config.media.cloudinary.api_key, "key");

        let mut config = Config::default();
        assert!(matches!(
            config.apply_env(|k| (k == "CIVIC_PORT").then(|| "http".to_string())),
            Err(crate::Error::Config(_))
        ));
    }

    #[test]
    fn test_validate() {
        let mut config = Config::default();
        config.prefix = "a-b".into();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.media.backend = MediaBackend::Cloudinary;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("civic.toml");
        let mut config = Config::default();
        config.server.port = 9000;
        config.save(&path).unwrap();
        assert_eq!(Config::load(&path).unwrap().server.port, 9000);
    }
}

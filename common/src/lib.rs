/*!
common/src/lib.rs

Shared configuration types and helpers for Vibe Digest.

This file provides:
- Config data structures (deserialized from TOML), every section optional
- An async loader merging a default file with an override file
- Credential helpers that treat placeholder secrets as absent
*/

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// HTTP server section (Rocket bind address, port and CORS origins)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ServerConfig {
    pub bind: Option<String>,
    pub port: Option<u16>,
    /// Origins allowed by the CORS fairing; "*" allows any origin
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

/// Content extraction configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ExtractionConfig {
    /// Backend names in preference order (direct, reader, readability, microlink, mirror)
    pub backends: Option<Vec<String>>,
    pub timeout_seconds: Option<u64>,
    /// Minimum number of characters for extracted text to count as an article
    pub min_chars: Option<usize>,
    pub user_agent: Option<String>,
    pub reader_url: Option<String>,
    /// Env var holding the reader proxy key (optional, free tier without it)
    pub reader_api_key_env: Option<String>,
    pub microlink_url: Option<String>,
    /// Mirror URL prefix, the article URL is appended verbatim
    pub mirror_url: Option<String>,
}

/// Generation provider configuration (Gemini API)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LlmConfig {
    pub api_url: Option<String>,
    pub api_key_env: Option<String>,
    /// Preferred model tokens, most preferred first
    pub preferred_models: Option<Vec<String>>,
    /// Substrings marking unstable or zero-quota model identifiers
    pub excluded_patterns: Option<Vec<String>>,
    /// Floor used when neither discovery nor preferences yield a model
    pub default_model: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub discovery_timeout_seconds: Option<u64>,
    /// 0 disables the discovered model list cache
    pub model_cache_ttl_seconds: Option<u64>,
}

/// Summary output configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SummaryConfig {
    /// "source" keeps the language of the article; anything else names a fixed language
    pub language: Option<String>,
    /// Hard cap (in characters) applied to the article before prompting
    pub max_input_chars: Option<usize>,
}

/// Top-level application configuration (deserialized from config.toml)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub summary: SummaryConfig,
}

impl Config {
    /// Load configuration from a TOML file asynchronously.
    ///
    /// Example:
    ///   let cfg = Config::from_file("config.toml").await?;
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = tokio::fs::read_to_string(path.as_ref())
            .await
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        let cfg: Config = toml::from_str(&data).context("Failed to parse TOML configuration")?;
        Ok(cfg)
    }

    /// Load configuration with an optional default file and an optional override file.
    /// If both are present, they are merged (override takes precedence).
    /// With neither present the built-in defaults apply.
    pub async fn load_with_defaults(default_path: Option<&Path>, override_path: Option<&Path>) -> Result<Self> {
        let mut config_value = toml::Value::Table(toml::map::Map::new());

        for (path, label) in [(default_path, "default"), (override_path, "override")] {
            let Some(path) = path else { continue };
            if !path.exists() {
                continue;
            }
            let data = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read {} config: {}", label, path.display()))?;
            let val: toml::Value = toml::from_str(&data)
                .with_context(|| format!("Failed to parse {} configuration", label))?;
            merge_toml(&mut config_value, val);
        }

        let cfg: Config = config_value.try_into().context("Failed to parse merged configuration")?;
        Ok(cfg)
    }
}

fn merge_toml(a: &mut toml::Value, b: toml::Value) {
    match (a, b) {
        (toml::Value::Table(a_map), toml::Value::Table(b_map)) => {
            for (k, v) in b_map {
                if let Some(a_val) = a_map.get_mut(&k) {
                    merge_toml(a_val, v);
                } else {
                    a_map.insert(k, v);
                }
            }
        }
        (a_val, b_val) => *a_val = b_val,
    }
}

/// Values people leave in `.env` files instead of a real key.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "changeme",
    "change_me",
    "none",
    "null",
    "undefined",
    "todo",
    "your_api_key",
    "your_api_key_here",
    "api_key_here",
    "insert_key_here",
];

/// Returns the credential if it looks usable, `None` for absent or placeholder values.
///
/// Missing credentials are never a configuration error: callers fall back to the
/// unauthenticated path.
pub fn usable_credential(raw: Option<&str>) -> Option<String> {
    let value = raw?.trim().trim_matches(|c| c == '"' || c == '\'').trim();
    if value.is_empty() {
        return None;
    }

    let lower = value.to_ascii_lowercase();
    if PLACEHOLDER_SECRETS.contains(&lower.as_str())
        || lower.starts_with("your-")
        || lower.starts_with("your_")
        || (lower.starts_with('<') && lower.ends_with('>'))
        || lower.chars().all(|c| c == 'x' || c == '*' || c == '.')
    {
        return None;
    }

    Some(value.to_string())
}

/// Reads a credential from the named environment variable, see [`usable_credential`].
pub fn credential_from_env(var: &str) -> Option<String> {
    usable_credential(std::env::var(var).ok().as_deref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn config_from_string() {
        let toml = r#"
            [server]
            port = 8000
            cors_origins = ["http://localhost:3000", "*"]

            [extraction]
            backends = ["reader", "direct"]
            min_chars = 300

            [summary]
            language = "Korean"
        "#;

        let cfg: Config = toml::from_str(toml).expect("parse config");
        assert_eq!(cfg.server.port, Some(8000));
        assert_eq!(cfg.server.cors_origins.len(), 2);
        assert_eq!(cfg.extraction.backends.as_deref(), Some(&["reader".to_string(), "direct".to_string()][..]));
        assert_eq!(cfg.extraction.min_chars, Some(300));
        assert_eq!(cfg.summary.language.as_deref(), Some("Korean"));
        assert!(cfg.llm.api_key_env.is_none());
    }

    #[test]
    fn empty_config_uses_defaults() {
        let cfg: Config = toml::from_str("").expect("parse empty config");
        assert!(cfg.server.cors_origins.is_empty());
        assert!(cfg.extraction.backends.is_none());
    }

    #[tokio::test]
    async fn override_file_takes_precedence() {
        let mut default_file = tempfile::NamedTempFile::new().expect("tmp");
        writeln!(
            default_file,
            "[llm]\ntimeout_seconds = 30\ndefault_model = \"gemini-1.5-flash\"\n[summary]\nlanguage = \"source\""
        )
        .unwrap();
        let mut override_file = tempfile::NamedTempFile::new().expect("tmp");
        writeln!(override_file, "[llm]\ntimeout_seconds = 60").unwrap();

        let cfg = Config::load_with_defaults(Some(default_file.path()), Some(override_file.path()))
            .await
            .expect("load");
        assert_eq!(cfg.llm.timeout_seconds, Some(60));
        assert_eq!(cfg.llm.default_model.as_deref(), Some("gemini-1.5-flash"));
        assert_eq!(cfg.summary.language.as_deref(), Some("source"));
    }

    #[tokio::test]
    async fn missing_files_are_skipped() {
        let cfg = Config::load_with_defaults(Some(Path::new("/nonexistent/default.toml")), None)
            .await
            .expect("load");
        assert!(cfg.llm.api_url.is_none());
    }

    #[test]
    fn placeholder_credentials_are_absent() {
        assert_eq!(usable_credential(None), None);
        assert_eq!(usable_credential(Some("")), None);
        assert_eq!(usable_credential(Some("   ")), None);
        assert_eq!(usable_credential(Some("your_api_key_here")), None);
        assert_eq!(usable_credential(Some("YOUR-GEMINI-KEY")), None);
        assert_eq!(usable_credential(Some("<api key>")), None);
        assert_eq!(usable_credential(Some("xxxxxxxx")), None);
        assert_eq!(usable_credential(Some("\"\"")), None);
    }

    #[test]
    fn real_credentials_are_kept() {
        assert_eq!(usable_credential(Some(" AIzaSyD-example ")), Some("AIzaSyD-example".to_string()));
        assert_eq!(usable_credential(Some("\"jina_abc123\"")), Some("jina_abc123".to_string()));
    }
}

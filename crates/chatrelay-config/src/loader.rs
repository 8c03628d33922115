use std::path::{Path, PathBuf};

use chatrelay_common::{Error, Result};
use tracing::{debug, info};

use crate::model::{AppConfig, CredentialConfig};

pub const ENV_API_URL: &str = "OPENAI_API_URL";
pub const ENV_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_MODEL: &str = "OPENAI_MODEL";
pub const ENV_TEMPERATURE: &str = "OPENAI_TEMPERATURE";
pub const ENV_BOT_NAME: &str = "CHATRELAY_BOT_NAME";

/// Loads [`AppConfig`] from an optional file plus environment overrides.
pub struct ConfigLoader;

impl ConfigLoader {
    /// `~/.chatrelay/config.yml`, if a home directory is known.
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".chatrelay").join("config.yml"))
    }

    /// Full startup load: file (explicit path, or the default path when it
    /// exists), then `.env`, then process environment, then validation.
    pub fn load(path: Option<&Path>) -> Result<AppConfig> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => match Self::default_path().filter(|p| p.is_file()) {
                Some(p) => Self::from_file(&p)?,
                None => {
                    debug!("no config file found, using defaults");
                    AppConfig::default()
                }
            },
        };

        if let Ok(path) = dotenvy::dotenv() {
            debug!("loaded environment from {}", path.display());
        }
        Self::apply_env(&mut config, |key| std::env::var(key).ok());
        Self::validate(&config)?;

        info!(
            "configuration loaded: model={}, credentials={}",
            config.openai.model,
            config.credentials().len()
        );
        Ok(config)
    }

    /// Parse a YAML (`.yml`/`.yaml`) or TOML (`.toml`) file.
    pub fn from_file(path: &Path) -> Result<AppConfig> {
        info!("loading config from {}", path.display());
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;

        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml(&contents),
            Some("yml") | Some("yaml") => Self::from_yaml(&contents),
            other => Err(Error::Config(format!(
                "unsupported config format {:?} for {}",
                other.unwrap_or(""),
                path.display()
            ))),
        }
    }

    pub fn from_yaml(contents: &str) -> Result<AppConfig> {
        serde_yaml::from_str(contents).map_err(|e| Error::Config(format!("invalid YAML config: {e}")))
    }

    pub fn from_toml(contents: &str) -> Result<AppConfig> {
        toml::from_str(contents).map_err(|e| Error::Config(format!("invalid TOML config: {e}")))
    }

    /// Apply environment overrides through `lookup`. `OPENAI_API_KEY` may hold
    /// several comma-separated keys; they replace `openai.api_keys`.
    pub fn apply_env(config: &mut AppConfig, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = non_empty(ENV_API_URL) {
            config.openai.base_url = Some(url.trim().to_string());
        }
        if let Some(keys) = non_empty(ENV_API_KEY) {
            config.openai.api_keys = keys
                .split(',')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(model) = non_empty(ENV_MODEL) {
            config.openai.model = model.trim().to_string();
        }
        if let Some(temperature) = non_empty(ENV_TEMPERATURE) {
            match temperature.trim().parse::<f64>() {
                Ok(t) => config.openai.temperature = t,
                Err(_) => debug!("ignoring unparsable {}={}", ENV_TEMPERATURE, temperature),
            }
        }
        if let Some(name) = non_empty(ENV_BOT_NAME) {
            config.bot.name = name.trim().to_string();
        }
    }

    pub fn validate(config: &AppConfig) -> Result<()> {
        let credentials = config.credentials();
        if credentials.is_empty() {
            return Err(Error::Config(format!(
                "no API credentials configured: set {ENV_API_KEY} or openai.api_keys"
            )));
        }
        for credential in &credentials {
            if credential.api_key.trim().is_empty() {
                return Err(Error::Config("empty API key in openai.credentials".into()));
            }
            if let Some(base_url) = &credential.base_url {
                validate_url(base_url)?;
            }
        }
        if !(0.0..=2.0).contains(&config.openai.temperature) {
            return Err(Error::Config(format!(
                "openai.temperature must be between 0 and 2, got {}",
                config.openai.temperature
            )));
        }
        if config.context.max_tokens == 0 {
            return Err(Error::Config("context.max_tokens must be positive".into()));
        }
        if config.context.chars_per_token == 0 {
            return Err(Error::Config("context.chars_per_token must be positive".into()));
        }
        if config.bot.max_message_chars == 0 {
            return Err(Error::Config("bot.max_message_chars must be positive".into()));
        }
        Ok(())
    }
}

impl AppConfig {
    /// Every configured credential in pool order: shared-endpoint keys first,
    /// then per-endpoint credentials.
    pub fn credentials(&self) -> Vec<CredentialConfig> {
        self.openai
            .api_keys
            .iter()
            .map(|key| CredentialConfig {
                api_key: key.clone(),
                base_url: self.openai.base_url.clone(),
            })
            .chain(self.openai.credentials.iter().map(|c| CredentialConfig {
                api_key: c.api_key.clone(),
                base_url: c.base_url.clone().or_else(|| self.openai.base_url.clone()),
            }))
            .collect()
    }
}

fn validate_url(raw: &str) -> Result<()> {
    let parsed =
        url::Url::parse(raw).map_err(|e| Error::Config(format!("invalid base URL '{raw}': {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(Error::Config(format!(
            "base URL '{raw}' must use http or https, not {scheme}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_match_reference_behavior() {
        let config = AppConfig::default();
        assert_eq!(config.openai.model, "gpt-3.5-turbo");
        assert_eq!(config.openai.temperature, 0.6);
        assert_eq!(config.rate_limit.cooldown_secs, 30);
        assert_eq!(config.bot.max_message_chars, 1000);
        assert!(config.credentials().is_empty());
    }

    #[test]
    fn yaml_config_parses_with_defaults() {
        let config = ConfigLoader::from_yaml(
            "openai:\n  api_keys: [sk-one, sk-two]\n  base_url: https://proxy.example/v1\nbot:\n  name: helper\n",
        )
        .expect("should parse");
        assert_eq!(config.openai.api_keys, vec!["sk-one", "sk-two"]);
        assert_eq!(config.bot.name, "helper");
        assert_eq!(config.context.max_tokens, 4000);
        assert_eq!(config.openai.image_size, "512x512");
    }

    #[test]
    fn toml_config_supports_per_endpoint_credentials() {
        let config = ConfigLoader::from_toml(
            r#"
            [openai]
            api_keys = ["sk-shared"]
            base_url = "https://shared.example/v1"

            [[openai.credentials]]
            api_key = "sk-own"
            base_url = "https://own.example/v1"

            [[openai.credentials]]
            api_key = "sk-inherit"
            "#,
        )
        .expect("should parse");

        let credentials = config.credentials();
        assert_eq!(credentials.len(), 3);
        assert_eq!(credentials[0].base_url.as_deref(), Some("https://shared.example/v1"));
        assert_eq!(credentials[1].base_url.as_deref(), Some("https://own.example/v1"));
        assert_eq!(credentials[2].base_url.as_deref(), Some("https://shared.example/v1"));
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config = ConfigLoader::from_yaml("openai:\n  api_keys: [sk-file]\n").unwrap();
        let vars = env(&[
            (ENV_API_KEY, "sk-a, sk-b,,"),
            (ENV_API_URL, "http://localhost:8080/v1"),
            (ENV_MODEL, "gpt-4o-mini"),
            (ENV_TEMPERATURE, "0.2"),
            (ENV_BOT_NAME, "relay"),
        ]);
        ConfigLoader::apply_env(&mut config, |k| vars.get(k).cloned());

        assert_eq!(config.openai.api_keys, vec!["sk-a", "sk-b"]);
        assert_eq!(config.openai.base_url.as_deref(), Some("http://localhost:8080/v1"));
        assert_eq!(config.openai.model, "gpt-4o-mini");
        assert_eq!(config.openai.temperature, 0.2);
        assert_eq!(config.bot.name, "relay");
    }

    #[test]
    fn blank_or_invalid_env_values_are_ignored() {
        let mut config = AppConfig::default();
        let vars = env(&[(ENV_MODEL, "  "), (ENV_TEMPERATURE, "warm")]);
        ConfigLoader::apply_env(&mut config, |k| vars.get(k).cloned());
        assert_eq!(config.openai.model, "gpt-3.5-turbo");
        assert_eq!(config.openai.temperature, 0.6);
    }

    #[test]
    fn missing_credentials_fail_validation() {
        let err = ConfigLoader::validate(&AppConfig::default()).expect_err("should fail");
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains(ENV_API_KEY));
    }

    #[test]
    fn bad_base_url_fails_validation() {
        let config =
            ConfigLoader::from_yaml("openai:\n  api_keys: [sk-x]\n  base_url: ftp://nope\n").unwrap();
        let err = ConfigLoader::validate(&config).expect_err("should fail");
        assert!(err.to_string().contains("http"));
    }

    #[test]
    fn out_of_range_temperature_fails_validation() {
        let config =
            ConfigLoader::from_yaml("openai:\n  api_keys: [sk-x]\n  temperature: 3.5\n").unwrap();
        assert!(ConfigLoader::validate(&config).is_err());
    }

    #[test]
    fn from_file_picks_format_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "[openai]\napi_keys = [\"sk-file\"]").unwrap();

        let config = ConfigLoader::from_file(&path).unwrap();
        assert_eq!(config.openai.api_keys, vec!["sk-file"]);

        let bad = dir.path().join("config.ini");
        std::fs::write(&bad, "x=1").unwrap();
        assert!(ConfigLoader::from_file(&bad).is_err());
    }
}

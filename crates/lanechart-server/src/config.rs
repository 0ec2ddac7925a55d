use std::net::SocketAddr;

use lanechart_generate::AzureSettings;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variables: {}", .0.join(", "))]
    Missing(Vec<&'static str>),
    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Process-wide settings, read once at start-up.
#[derive(Debug, Clone)]
pub struct Config {
    pub openai: AzureSettings,
    pub storage_connection_string: String,
    pub share_name: String,
    pub lucid: LucidConfig,
    pub search: SearchConfig,
    pub bind: SocketAddr,
}

#[derive(Debug, Clone)]
pub struct LucidConfig {
    pub api_key: String,
    pub user: String,
    pub base_url: String,
    pub document_title: String,
}

#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub endpoint: String,
    pub index_name: String,
    pub api_key: String,
}

// --- Defaults ---

const DEFAULT_API_VERSION: &str = "2024-08-01-preview";
const DEFAULT_SHARE_NAME: &str = "lucid-files";
const DEFAULT_LUCID_BASE_URL: &str = "https://api.lucid.co";
const DEFAULT_DOCUMENT_TITLE: &str = "Generated Process Chart";
const DEFAULT_BIND: &str = "0.0.0.0:7071";

/// Collects required values so every missing one is reported together.
struct Reader<F> {
    lookup: F,
    missing: Vec<&'static str>,
}

impl<F: Fn(&str) -> Option<String>> Reader<F> {
    fn get(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.trim().is_empty())
    }

    fn required(&mut self, name: &'static str) -> String {
        self.get(name).unwrap_or_else(|| {
            self.missing.push(name);
            String::new()
        })
    }

    fn optional(&self, name: &str, default: &str) -> String {
        self.get(name).unwrap_or_else(|| default.to_string())
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut env = Reader {
            lookup,
            missing: Vec::new(),
        };

        let openai = AzureSettings {
            endpoint: env.required("AZURE_OPENAI_ENDPOINT"),
            api_key: env.required("AZURE_OPENAI_API_KEY"),
            completions_deployment: env.required("AZURE_OPENAI_COMPLETIONS_DEPLOYMENT"),
            embedding_deployment: env.required("AZURE_OPENAI_EMBEDDING_DEPLOYMENT"),
            api_version: env.optional("AZURE_OPENAI_API_VERSION", DEFAULT_API_VERSION),
        };
        let storage_connection_string = env.required("AZURE_STORAGE_CONNECTION_STRING");
        let lucid = LucidConfig {
            api_key: env.required("LUCID_API_KEY"),
            user: env.required("LUCID_USER"),
            base_url: env.optional("LUCID_API_BASE_URL", DEFAULT_LUCID_BASE_URL),
            document_title: env.optional("LUCID_DOCUMENT_TITLE", DEFAULT_DOCUMENT_TITLE),
        };
        let search = SearchConfig {
            endpoint: env.required("SEARCH_ENDPOINT"),
            index_name: env.required("SEARCH_INDEX_NAME"),
            api_key: env.required("SEARCH_API_KEY"),
        };
        let share_name = env.optional("AZURE_STORAGE_SHARE_NAME", DEFAULT_SHARE_NAME);
        let bind = env.optional("LANECHART_BIND", DEFAULT_BIND);

        if !env.missing.is_empty() {
            return Err(ConfigError::Missing(env.missing));
        }

        let bind = bind.parse().map_err(|e| ConfigError::Invalid {
            name: "LANECHART_BIND",
            reason: format!("{e}"),
        })?;

        Ok(Config {
            openai,
            storage_connection_string,
            share_name,
            lucid,
            search,
            bind,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    const REQUIRED: [&str; 10] = [
        "AZURE_OPENAI_ENDPOINT",
        "AZURE_OPENAI_API_KEY",
        "AZURE_OPENAI_COMPLETIONS_DEPLOYMENT",
        "AZURE_OPENAI_EMBEDDING_DEPLOYMENT",
        "AZURE_STORAGE_CONNECTION_STRING",
        "LUCID_API_KEY",
        "LUCID_USER",
        "SEARCH_ENDPOINT",
        "SEARCH_INDEX_NAME",
        "SEARCH_API_KEY",
    ];

    fn full_env() -> HashMap<String, String> {
        REQUIRED
            .iter()
            .map(|name| (name.to_string(), format!("{}-value", name.to_lowercase())))
            .collect()
    }

    fn load(env: &HashMap<String, String>) -> Result<Config, ConfigError> {
        Config::from_lookup(|name| env.get(name).cloned())
    }

    #[test]
    fn defaults_fill_optional_values() {
        let config = load(&full_env()).unwrap();
        assert_eq!(config.openai.api_version, "2024-08-01-preview");
        assert_eq!(config.share_name, "lucid-files");
        assert_eq!(config.lucid.base_url, "https://api.lucid.co");
        assert_eq!(config.lucid.document_title, "Generated Process Chart");
        assert_eq!(config.bind.port(), 7071);
        assert_eq!(config.lucid.user, "lucid_user-value");
    }

    #[test]
    fn every_missing_variable_is_reported() {
        let mut env = full_env();
        env.remove("LUCID_USER");
        env.insert("SEARCH_API_KEY".to_string(), "   ".to_string());
        let Err(ConfigError::Missing(missing)) = load(&env) else {
            panic!("expected missing variables");
        };
        assert_eq!(missing, vec!["LUCID_USER", "SEARCH_API_KEY"]);
    }

    #[test]
    fn empty_environment_lists_all_required() {
        let err = Config::from_lookup(|_| None).unwrap_err();
        let message = err.to_string();
        for name in REQUIRED {
            assert!(message.contains(name), "{name} not in {message}");
        }
    }

    #[test]
    fn overrides_replace_defaults() {
        let mut env = full_env();
        env.insert("LANECHART_BIND".to_string(), "127.0.0.1:9000".to_string());
        env.insert("AZURE_STORAGE_SHARE_NAME".to_string(), "charts".to_string());
        let config = load(&env).unwrap();
        assert_eq!(config.bind.to_string(), "127.0.0.1:9000");
        assert_eq!(config.share_name, "charts");
    }

    #[test]
    fn bad_bind_address_is_invalid() {
        let mut env = full_env();
        env.insert("LANECHART_BIND".to_string(), "not-an-address".to_string());
        assert!(matches!(
            load(&env),
            Err(ConfigError::Invalid { name: "LANECHART_BIND", .. })
        ));
    }
}

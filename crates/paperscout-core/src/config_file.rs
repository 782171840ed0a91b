use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::Config;

/// On-disk TOML configuration structure.
/// All fields are optional so partial configs work (merge with defaults).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    pub api_keys: Option<ApiKeysConfig>,
    pub classifier: Option<ClassifierConfig>,
    pub sources: Option<SourcesConfig>,
    pub enrichment: Option<EnrichmentConfig>,
    pub network: Option<NetworkConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiKeysConfig {
    pub openai_api_key: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassifierConfig {
    pub model: Option<String>,
    pub endpoint: Option<String>,
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourcesConfig {
    pub dblp_base_url: Option<String>,
    pub doi_base_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnrichmentConfig {
    pub enabled: Option<bool>,
    pub publisher_hosts: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub timeout_secs: Option<u64>,
}

/// Platform config directory path: `<config_dir>/paperscout/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("paperscout").join("config.toml"))
}

/// Load config by cascading CWD `.paperscout.toml` over platform config.
/// CWD values override platform values.
pub fn load_config() -> ConfigFile {
    let platform = config_path().and_then(|p| load_from_path(&p));
    let cwd = load_from_path(Path::new(".paperscout.toml"));

    match (platform, cwd) {
        (None, None) => ConfigFile::default(),
        (Some(p), None) => p,
        (None, Some(c)) => c,
        (Some(p), Some(c)) => merge(p, c),
    }
}

/// Load a config from a specific path. Returns `None` if the file doesn't
/// exist or can't be parsed.
pub fn load_from_path(path: &Path) -> Option<ConfigFile> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(config) => Some(config),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unparsable config file");
            None
        }
    }
}

/// Merge two configs: `overlay` values take precedence over `base`.
pub fn merge(base: ConfigFile, overlay: ConfigFile) -> ConfigFile {
    let base_keys = base.api_keys.unwrap_or_default();
    let base_classifier = base.classifier.unwrap_or_default();
    let base_sources = base.sources.unwrap_or_default();
    let base_enrichment = base.enrichment.unwrap_or_default();
    let base_network = base.network.unwrap_or_default();

    let keys = overlay.api_keys.unwrap_or_default();
    let classifier = overlay.classifier.unwrap_or_default();
    let sources = overlay.sources.unwrap_or_default();
    let enrichment = overlay.enrichment.unwrap_or_default();
    let network = overlay.network.unwrap_or_default();

    ConfigFile {
        api_keys: Some(ApiKeysConfig {
            openai_api_key: keys.openai_api_key.or(base_keys.openai_api_key),
        }),
        classifier: Some(ClassifierConfig {
            model: classifier.model.or(base_classifier.model),
            endpoint: classifier.endpoint.or(base_classifier.endpoint),
            temperature: classifier.temperature.or(base_classifier.temperature),
        }),
        sources: Some(SourcesConfig {
            dblp_base_url: sources.dblp_base_url.or(base_sources.dblp_base_url),
            doi_base_url: sources.doi_base_url.or(base_sources.doi_base_url),
        }),
        enrichment: Some(EnrichmentConfig {
            enabled: enrichment.enabled.or(base_enrichment.enabled),
            publisher_hosts: enrichment.publisher_hosts.or(base_enrichment.publisher_hosts),
        }),
        network: Some(NetworkConfig {
            timeout_secs: network.timeout_secs.or(base_network.timeout_secs),
        }),
    }
}

impl ConfigFile {
    /// Overwrite the fields of `config` that this file sets.
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(keys) = &self.api_keys
            && let Some(key) = &keys.openai_api_key
        {
            config.openai_api_key = Some(key.clone());
        }
        if let Some(classifier) = &self.classifier {
            if let Some(model) = &classifier.model {
                config.model = model.clone();
            }
            if let Some(endpoint) = &classifier.endpoint {
                config.chat_endpoint = endpoint.clone();
            }
            if let Some(temperature) = classifier.temperature {
                config.temperature = temperature;
            }
        }
        if let Some(sources) = &self.sources {
            if let Some(url) = &sources.dblp_base_url {
                config.dblp_base_url = url.clone();
            }
            if let Some(url) = &sources.doi_base_url {
                config.doi_base_url = url.clone();
            }
        }
        if let Some(enrichment) = &self.enrichment {
            if let Some(enabled) = enrichment.enabled {
                config.fetch_abstracts = enabled;
            }
            if let Some(hosts) = &enrichment.publisher_hosts {
                config.publisher_hosts = hosts.clone();
            }
        }
        if let Some(network) = &self.network
            && let Some(secs) = network.timeout_secs
        {
            if secs == 0 {
                tracing::warn!("ignoring timeout_secs = 0 in config file");
            } else {
                config.timeout_secs = secs;
            }
        }
    }
}

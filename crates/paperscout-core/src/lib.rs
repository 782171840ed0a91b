use std::time::Duration;
use thiserror::Error;

pub mod accumulator;
pub mod classifier;
pub mod config_file;
pub mod db;
pub mod doi;
pub mod matching;
pub mod mock;
pub mod orchestrator;

// Re-export for convenience
pub use accumulator::{MarkOutcome, MatchAccumulator};
pub use classifier::{OpenAiClassifier, TitleClassifier};
pub use db::BibliographyBackend;
pub use db::dblp::Dblp;
pub use doi::{ABSTRACT_NOT_FOUND, AbstractSource, DoiAbstractResolver};
pub use orchestrator::{BatchOutcome, MAX_BATCH_SIZE, Pipeline, RunReport, VenueReport, partition};

/// A conference returned by the venue search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VenueDescriptor {
    /// Lowercased acronym, used to address the venue's publication stream.
    pub acronym: String,
    pub url: String,
}

/// A single publication of a venue, keyed by its title for the whole run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicationRecord {
    pub title: String,
    pub doi: Option<String>,
    /// External link (DBLP `ee`), usually the publisher page.
    pub link: Option<String>,
    pub matching: bool,
    pub abstract_text: Option<String>,
}

impl PublicationRecord {
    pub fn new(title: impl Into<String>, doi: Option<String>, link: Option<String>) -> Self {
        Self {
            title: title.into(),
            doi,
            link,
            matching: false,
            abstract_text: None,
        }
    }

    /// The DOI, if present and not blank.
    pub fn doi(&self) -> Option<&str> {
        self.doi.as_deref().map(str::trim).filter(|d| !d.is_empty())
    }
}

/// A publication the classifier judged relevant to the keywords.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    pub title: String,
    pub link: Option<String>,
    pub abstract_text: Option<String>,
}

impl From<&PublicationRecord> for MatchResult {
    fn from(record: &PublicationRecord) -> Self {
        Self {
            title: record.title.clone(),
            link: record.link.clone(),
            abstract_text: record.abstract_text.clone(),
        }
    }
}

/// Failure talking to the bibliographic service.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{url} returned HTTP {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
    #[error("malformed response from {url}: {message}")]
    Malformed { url: String, message: String },
    #[error("invalid query: {0}")]
    InvalidQuery(String),
}

/// Failure running the LLM title classifier.
#[derive(Error, Debug)]
pub enum ClassificationError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("classifier returned HTTP {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("batch of {size} titles exceeds the limit of {max}")]
    BatchTooLarge { size: usize, max: usize },
    #[error("classifier response has no message content")]
    MissingContent,
    #[error("classifier answer is not valid JSON for the titles schema: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),
    #[error("classification error: {0}")]
    Classification(#[from] ClassificationError),
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("configuration error: {0}")]
    Config(String),
}

/// Progress events emitted during a run.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    VenuesResolved {
        query: String,
        count: usize,
    },
    VenueStarted {
        index: usize,
        total: usize,
        venue: VenueDescriptor,
    },
    PublicationsFetched {
        acronym: String,
        count: usize,
        batches: usize,
    },
    BatchMatched {
        acronym: String,
        batch_index: usize,
        total_batches: usize,
        batch_size: usize,
        matched: usize,
        /// Titles the classifier returned that are not known publications.
        ignored: usize,
    },
    AbstractResolved {
        title: String,
        found: bool,
    },
    VenueFinished {
        report: Box<VenueReport>,
    },
}

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_CHAT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_DBLP_BASE_URL: &str = "https://dblp.org";
pub const DEFAULT_DOI_BASE_URL: &str = "https://doi.org";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const USER_AGENT: &str = concat!("paperscout/", env!("CARGO_PKG_VERSION"));

/// Configuration for a paperscout run.
#[derive(Clone)]
pub struct Config {
    pub openai_api_key: Option<String>,
    pub model: String,
    pub chat_endpoint: String,
    pub temperature: f32,
    pub dblp_base_url: String,
    pub doi_base_url: String,
    /// Hosts whose landing pages carry an abstract we know how to extract.
    pub publisher_hosts: Vec<String>,
    pub fetch_abstracts: bool,
    pub timeout_secs: u64,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("openai_api_key", &self.openai_api_key.as_ref().map(|_| "***"))
            .field("model", &self.model)
            .field("chat_endpoint", &self.chat_endpoint)
            .field("temperature", &self.temperature)
            .field("dblp_base_url", &self.dblp_base_url)
            .field("doi_base_url", &self.doi_base_url)
            .field("publisher_hosts", &self.publisher_hosts)
            .field("fetch_abstracts", &self.fetch_abstracts)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            model: DEFAULT_MODEL.to_string(),
            chat_endpoint: DEFAULT_CHAT_ENDPOINT.to_string(),
            temperature: 0.0,
            dblp_base_url: DEFAULT_DBLP_BASE_URL.to_string(),
            doi_base_url: DEFAULT_DOI_BASE_URL.to_string(),
            publisher_hosts: vec!["dl.acm.org".to_string()],
            fetch_abstracts: true,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl Config {
    /// Per-request timeout. Zero means "unset" and falls back to the default.
    pub fn timeout(&self) -> Duration {
        match self.timeout_secs {
            0 => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            secs => Duration::from_secs(secs),
        }
    }
}

/// Build the HTTP client shared by every backend of a run.
pub fn build_client(config: &Config) -> Result<reqwest::Client, CoreError> {
    reqwest::Client::builder()
        .timeout(config.timeout())
        .user_agent(USER_AGENT)
        .build()
        .map_err(CoreError::Client)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_api_key() {
        let config = Config {
            openai_api_key: Some("sk-secret".into()),
            ..Config::default()
        };
        let dbg = format!("{:?}", config);
        assert!(dbg.contains("***"));
        assert!(!dbg.contains("sk-secret"));
    }

    #[test]
    fn blank_doi_is_treated_as_absent() {
        let record = PublicationRecord::new("T", Some("  ".into()), None);
        assert_eq!(record.doi(), None);
        let record = PublicationRecord::new("T", Some(" 10.1145/1 ".into()), None);
        assert_eq!(record.doi(), Some("10.1145/1"));
    }

    #[test]
    fn default_timeout_is_thirty_seconds() {
        assert_eq!(Config::default().timeout(), Duration::from_secs(30));
    }

    #[test]
    fn zero_timeout_uses_default() {
        let config = Config {
            timeout_secs: 0,
            ..Config::default()
        };
        assert_eq!(config.timeout(), Duration::from_secs(DEFAULT_TIMEOUT_SECS));
    }
}

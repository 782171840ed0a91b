use once_cell::sync::Lazy;
use regex::Regex;

use std::future::Future;
use std::pin::Pin;

use crate::{Config, DEFAULT_DOI_BASE_URL};

/// Returned whenever no abstract could be extracted.
pub const ABSTRACT_NOT_FOUND: &str = "Not found";

/// A source of abstracts keyed by DOI.
///
/// Lookups are best-effort: implementations report [`ABSTRACT_NOT_FOUND`]
/// instead of failing.
pub trait AbstractSource: Send + Sync {
    fn name(&self) -> &str;

    fn retrieve_abstract<'a>(
        &'a self,
        doi: &'a str,
        client: &'a reqwest::Client,
    ) -> Pin<Box<dyn Future<Output = String> + Send + 'a>>;
}

/// Strip URL/`doi:` prefixes and check the remainder looks like a DOI.
///
/// Accepted forms:
/// - `10.1145/3317550.3321435`
/// - `doi:10.1145/3317550.3321435`
/// - `https://doi.org/10.1145/3317550.3321435`
/// - `http://dx.doi.org/10.1145/3317550.3321435`
pub fn normalize_doi(raw: &str) -> Option<String> {
    static PREFIX_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(?i)^(?:https?://(?:dx\.)?doi\.org/|doi:\s*)").unwrap());
    static DOI_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^10\.\d{4,9}/\S+$").unwrap());

    let trimmed = raw.trim();
    let stripped = PREFIX_RE.replace(trimmed, "");
    let doi = stripped.trim();
    DOI_RE.is_match(doi).then(|| doi.to_string())
}

/// Resolves a DOI through doi.org and scrapes the abstract from the
/// landing page of a known publisher.
pub struct DoiAbstractResolver {
    base_url: String,
    publisher_hosts: Vec<String>,
}

impl DoiAbstractResolver {
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_DOI_BASE_URL.to_string(),
            publisher_hosts: Config::default().publisher_hosts,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new()
            .with_base_url(config.doi_base_url.clone())
            .with_publisher_hosts(config.publisher_hosts.clone())
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_publisher_hosts(mut self, hosts: Vec<String>) -> Self {
        self.publisher_hosts = hosts;
        self
    }

    /// A host is known if it equals a publisher host or is a subdomain of one.
    fn is_known_publisher(&self, host: &str) -> bool {
        let host = host.to_ascii_lowercase();
        self.publisher_hosts.iter().any(|known| {
            let known = known.to_ascii_lowercase();
            host == known || host.ends_with(&format!(".{}", known))
        })
    }

    async fn lookup(&self, doi: &str, client: &reqwest::Client) -> Option<String> {
        let Some(doi) = normalize_doi(doi) else {
            tracing::debug!(doi, "not a DOI, skipping abstract lookup");
            return None;
        };

        let url = format!("{}/{}", self.base_url, doi);
        let resp = match client.get(&url).send().await {
            Ok(resp) => resp,
            Err(e) => {
                tracing::warn!(doi = %doi, error = %e, "abstract lookup failed");
                return None;
            }
        };

        let landing = resp.url().clone();
        let host = landing.host_str().unwrap_or_default();
        if !self.is_known_publisher(host) {
            tracing::debug!(doi = %doi, host, "landing page is not a known publisher");
            return None;
        }

        if !resp.status().is_success() {
            tracing::warn!(doi = %doi, status = %resp.status(), url = %landing, "publisher page returned an error");
            return None;
        }

        let html = match resp.text().await {
            Ok(html) => html,
            Err(e) => {
                tracing::warn!(doi = %doi, error = %e, "failed to read publisher page");
                return None;
            }
        };

        let abstract_text = extract_abstract(&html);
        if abstract_text.is_none() {
            tracing::warn!(doi = %doi, url = %landing, "publisher page has no abstract section");
        }
        abstract_text
    }
}

impl Default for DoiAbstractResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl AbstractSource for DoiAbstractResolver {
    fn name(&self) -> &str {
        "DOI"
    }

    fn retrieve_abstract<'a>(
        &'a self,
        doi: &'a str,
        client: &'a reqwest::Client,
    ) -> Pin<Box<dyn Future<Output = String> + Send + 'a>> {
        Box::pin(async move {
            self.lookup(doi, client)
                .await
                .unwrap_or_else(|| ABSTRACT_NOT_FOUND.to_string())
        })
    }
}

/// Extract the abstract from an ACM Digital Library landing page.
///
/// The abstract lives in `section#abstract`: a heading followed by one or
/// more `div[role=paragraph]` (older pages use `<p>`). Falls back to the
/// section text without its heading.
pub fn extract_abstract(html: &str) -> Option<String> {
    let document = scraper::Html::parse_document(html);
    let section_sel = scraper::Selector::parse("section#abstract").unwrap();
    let para_sel = scraper::Selector::parse("div[role=\"paragraph\"], p").unwrap();
    let heading_sel = scraper::Selector::parse("h1, h2, h3, h4").unwrap();

    let section = document.select(&section_sel).next()?;

    let paragraphs: Vec<String> = section
        .select(&para_sel)
        .map(|p| collapse_whitespace(&p.text().collect::<String>()))
        .filter(|p| !p.is_empty())
        .collect();
    if !paragraphs.is_empty() {
        return Some(paragraphs.join("\n\n"));
    }

    let heading: String = section
        .select(&heading_sel)
        .flat_map(|h| h.text())
        .collect();
    let full: String = section.text().collect();
    let body = full.replacen(heading.as_str(), "", 1);
    let body = collapse_whitespace(&body);
    (!body.is_empty()).then_some(body)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

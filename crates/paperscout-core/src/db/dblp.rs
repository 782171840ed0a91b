use super::{BackendFuture, BibliographyBackend};
use crate::{DEFAULT_DBLP_BASE_URL, FetchError, PublicationRecord, VenueDescriptor};
use serde::Deserialize;
use serde::de::DeserializeOwned;

/// Page size of the publication search; DBLP refuses anything larger, so
/// venues with more publications are truncated.
pub const PUBLICATION_CAP: usize = 1000;

/// Online DBLP search API.
pub struct Dblp {
    base_url: String,
}

impl Dblp {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_DBLP_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn venue_search_url(&self, name: &str) -> String {
        format!(
            "{}/search/venue/api?q={}&format=json",
            self.base_url,
            urlencoding::encode(name)
        )
    }

    fn publication_search_url(&self, acronym: &str) -> String {
        let query = format!("stream:streams/conf/{}:", acronym);
        format!(
            "{}/search/publ/api?q={}&h={}&format=json",
            self.base_url,
            urlencoding::encode(&query),
            PUBLICATION_CAP
        )
    }
}

impl Default for Dblp {
    fn default() -> Self {
        Self::new()
    }
}

impl BibliographyBackend for Dblp {
    fn name(&self) -> &str {
        "DBLP"
    }

    fn find_conferences<'a>(
        &'a self,
        name: &'a str,
        client: &'a reqwest::Client,
    ) -> BackendFuture<'a, Vec<VenueDescriptor>, FetchError> {
        Box::pin(async move {
            let name = name.trim();
            if name.is_empty() {
                return Err(FetchError::InvalidQuery("conference name is empty".into()));
            }

            let url = self.venue_search_url(name);
            let response: SearchResponse<VenueInfo> = get_json(client, &url).await?;
            let venues = venues_from_response(response)
                .map_err(|message| FetchError::Malformed { url, message })?;

            tracing::debug!(query = name, count = venues.len(), "venue search complete");
            Ok(venues)
        })
    }

    fn find_publications<'a>(
        &'a self,
        acronym: &'a str,
        client: &'a reqwest::Client,
    ) -> BackendFuture<'a, Vec<PublicationRecord>, FetchError> {
        Box::pin(async move {
            let acronym = acronym.trim().to_lowercase();
            if acronym.is_empty() {
                return Err(FetchError::InvalidQuery("venue acronym is empty".into()));
            }

            let url = self.publication_search_url(&acronym);
            let response: SearchResponse<PublicationInfo> = get_json(client, &url).await?;
            let total = response.result.hits.total();
            let publications = publications_from_response(response)
                .map_err(|message| FetchError::Malformed { url, message })?;

            if let Some(total) = total
                && total > publications.len()
            {
                tracing::warn!(
                    venue = %acronym,
                    total,
                    received = publications.len(),
                    "venue has more publications than one search page returns; the rest are skipped"
                );
            }

            tracing::debug!(venue = %acronym, count = publications.len(), "publication search complete");
            Ok(publications)
        })
    }
}

async fn get_json<T: DeserializeOwned>(client: &reqwest::Client, url: &str) -> Result<T, FetchError> {
    tracing::debug!(url, "querying DBLP");
    let resp = client.get(url).send().await?;

    let status = resp.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            url: url.to_string(),
            status,
        });
    }

    let body = resp.text().await?;
    serde_json::from_str(&body).map_err(|e| FetchError::Malformed {
        url: url.to_string(),
        message: e.to_string(),
    })
}

// DBLP search responses all share the `result.hits.hit[].info` envelope.

#[derive(Debug, Deserialize)]
struct SearchResponse<T> {
    result: SearchResult<T>,
}

#[derive(Debug, Deserialize)]
struct SearchResult<T> {
    hits: Hits<T>,
}

#[derive(Debug, Deserialize)]
struct Hits<T> {
    /// DBLP encodes counters as strings.
    #[serde(rename = "@total", default)]
    total: Option<String>,
    /// Absent when nothing matched.
    #[serde(default = "Vec::new")]
    hit: Vec<Hit<T>>,
}

impl<T> Hits<T> {
    fn total(&self) -> Option<usize> {
        self.total.as_deref().and_then(|t| t.parse().ok())
    }
}

#[derive(Debug, Deserialize)]
struct Hit<T> {
    info: T,
}

#[derive(Debug, Deserialize)]
struct VenueInfo {
    acronym: Option<String>,
    url: Option<String>,
    venue: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PublicationInfo {
    title: Option<String>,
    doi: Option<String>,
    ee: Option<OneOrMany>,
}

/// `ee` is a plain string for most records and a list when a paper has
/// several electronic editions.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    fn into_first(self) -> Option<String> {
        match self {
            OneOrMany::One(s) => Some(s),
            OneOrMany::Many(v) => v.into_iter().next(),
        }
    }
}

fn venues_from_response(response: SearchResponse<VenueInfo>) -> Result<Vec<VenueDescriptor>, String> {
    response
        .result
        .hits
        .hit
        .into_iter()
        .enumerate()
        .map(|(i, hit)| {
            let info = hit.info;
            let label = info.venue.as_deref().unwrap_or("<unnamed>").to_string();
            let acronym = info
                .acronym
                .filter(|a| !a.trim().is_empty())
                .ok_or_else(|| format!("venue hit {} ({}) has no acronym", i, label))?;
            let url = info
                .url
                .ok_or_else(|| format!("venue hit {} ({}) has no url", i, label))?;
            Ok(VenueDescriptor {
                acronym: acronym.trim().to_lowercase(),
                url,
            })
        })
        .collect()
}

fn publications_from_response(
    response: SearchResponse<PublicationInfo>,
) -> Result<Vec<PublicationRecord>, String> {
    response
        .result
        .hits
        .hit
        .into_iter()
        .enumerate()
        .map(|(i, hit)| {
            let info = hit.info;
            let title = info
                .title
                .filter(|t| !t.trim().is_empty())
                .ok_or_else(|| format!("publication hit {} has no title", i))?;
            Ok(PublicationRecord::new(
                title,
                info.doi,
                info.ee.and_then(OneOrMany::into_first),
            ))
        })
        .collect()
}

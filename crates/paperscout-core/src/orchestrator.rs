use std::sync::Arc;

use crate::accumulator::{MarkOutcome, MatchAccumulator};
use crate::classifier::{OpenAiClassifier, TitleClassifier};
use crate::db::BibliographyBackend;
use crate::db::dblp::Dblp;
use crate::doi::{ABSTRACT_NOT_FOUND, AbstractSource, DoiAbstractResolver};
use crate::{
    Config, CoreError, MatchResult, ProgressEvent, PublicationRecord, VenueDescriptor, build_client,
};

/// Largest number of titles sent to the classifier in one request.
pub const MAX_BATCH_SIZE: usize = 50;

/// Outcome of one venue of a run.
#[derive(Debug, Clone)]
pub struct VenueReport {
    pub venue: VenueDescriptor,
    pub publication_count: usize,
    pub batch_count: usize,
    /// Every matching record of the run so far, not only this venue's.
    pub matches: Vec<MatchResult>,
}

/// Outcome of a complete run.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// One entry per resolved venue, in resolver order. Empty if the
    /// conference search found nothing.
    pub venues: Vec<VenueReport>,
    /// Final matching records of the whole run.
    pub matches: Vec<MatchResult>,
}

impl RunReport {
    pub fn no_venues(&self) -> bool {
        self.venues.is_empty()
    }
}

/// Split publications into consecutive batches of at most `size`, preserving order.
pub fn partition(publications: Vec<PublicationRecord>, size: usize) -> Vec<Vec<PublicationRecord>> {
    assert!(size > 0, "batch size must be positive");
    let mut batches = Vec::with_capacity(publications.len().div_ceil(size));
    let mut iter = publications.into_iter().peekable();
    while iter.peek().is_some() {
        batches.push(iter.by_ref().take(size).collect());
    }
    batches
}

/// Ties venue lookup, publication listing, title classification and
/// abstract enrichment together. Every external call is awaited in turn.
pub struct Pipeline {
    client: reqwest::Client,
    bibliography: Arc<dyn BibliographyBackend>,
    classifier: Arc<dyn TitleClassifier>,
    /// `None` disables abstract enrichment.
    abstracts: Option<Arc<dyn AbstractSource>>,
}

impl Pipeline {
    pub fn new(
        client: reqwest::Client,
        bibliography: Arc<dyn BibliographyBackend>,
        classifier: Arc<dyn TitleClassifier>,
        abstracts: Option<Arc<dyn AbstractSource>>,
    ) -> Self {
        Self {
            client,
            bibliography,
            classifier,
            abstracts,
        }
    }

    /// Build the production pipeline: DBLP, OpenAI, and doi.org.
    pub fn from_config(config: &Config) -> Result<Self, CoreError> {
        let client = build_client(config)?;
        let classifier = OpenAiClassifier::from_config(config)?;
        let abstracts: Option<Arc<dyn AbstractSource>> = if config.fetch_abstracts {
            Some(Arc::new(DoiAbstractResolver::from_config(config)))
        } else {
            None
        };
        Ok(Self::new(
            client,
            Arc::new(Dblp::with_base_url(config.dblp_base_url.clone())),
            Arc::new(classifier),
            abstracts,
        ))
    }

    /// Resolve `conference`, then fetch, classify and enrich every venue found.
    ///
    /// The first fetch or classification error aborts the run.
    pub async fn run(
        &self,
        conference: &str,
        keywords: &str,
        progress: &(dyn Fn(ProgressEvent) + Send + Sync),
    ) -> Result<RunReport, CoreError> {
        let venues = self
            .bibliography
            .find_conferences(conference, &self.client)
            .await?;

        progress(ProgressEvent::VenuesResolved {
            query: conference.to_string(),
            count: venues.len(),
        });

        if venues.is_empty() {
            tracing::info!(query = conference, "no venues found");
            return Ok(RunReport::default());
        }

        let mut accumulator = MatchAccumulator::new();
        let mut report = RunReport::default();
        let total = venues.len();

        for (index, venue) in venues.into_iter().enumerate() {
            progress(ProgressEvent::VenueStarted {
                index,
                total,
                venue: venue.clone(),
            });
            let venue_report = self
                .process_venue(venue, keywords, &mut accumulator, progress)
                .await?;
            progress(ProgressEvent::VenueFinished {
                report: Box::new(venue_report.clone()),
            });
            report.venues.push(venue_report);
        }

        report.matches = accumulator.matches();
        Ok(report)
    }

    async fn process_venue(
        &self,
        venue: VenueDescriptor,
        keywords: &str,
        accumulator: &mut MatchAccumulator,
        progress: &(dyn Fn(ProgressEvent) + Send + Sync),
    ) -> Result<VenueReport, CoreError> {
        let publications = self
            .bibliography
            .find_publications(&venue.acronym, &self.client)
            .await?;
        let publication_count = publications.len();

        let batches = partition(publications, MAX_BATCH_SIZE);
        let batch_count = batches.len();
        tracing::info!(
            venue = %venue.acronym,
            publications = publication_count,
            batches = batch_count,
            "fetched publications"
        );
        progress(ProgressEvent::PublicationsFetched {
            acronym: venue.acronym.clone(),
            count: publication_count,
            batches: batch_count,
        });

        for (batch_index, batch) in batches.iter().enumerate() {
            let outcome = self.match_batch(keywords, batch, accumulator).await?;
            progress(ProgressEvent::BatchMatched {
                acronym: venue.acronym.clone(),
                batch_index,
                total_batches: batch_count,
                batch_size: batch.len(),
                matched: outcome.matched.len(),
                ignored: outcome.ignored.len(),
            });
            self.enrich(accumulator, progress).await;
        }

        Ok(VenueReport {
            venue,
            publication_count,
            batch_count,
            matches: accumulator.matches(),
        })
    }

    /// Merge one batch into the accumulator and mark the titles the
    /// classifier selects. Titles that are not known publications are
    /// ignored.
    pub async fn match_batch(
        &self,
        keywords: &str,
        batch: &[PublicationRecord],
        accumulator: &mut MatchAccumulator,
    ) -> Result<BatchOutcome, CoreError> {
        accumulator.merge(batch);

        let titles: Vec<String> = batch.iter().map(|p| p.title.clone()).collect();
        let selected = self
            .classifier
            .match_titles(keywords, &titles, &self.client)
            .await?;

        let mut outcome = BatchOutcome::default();
        for returned in selected {
            match accumulator.mark_matching(&returned) {
                MarkOutcome::Newly(title) | MarkOutcome::Already(title) => {
                    if !outcome.matched.contains(&title) {
                        outcome.matched.push(title);
                    }
                }
                MarkOutcome::Unknown => {
                    tracing::debug!(title = %returned, "classifier returned an unknown title, ignoring");
                    outcome.ignored.push(returned);
                }
            }
        }
        Ok(outcome)
    }

    /// Fetch abstracts for matching records that have a DOI and no abstract yet.
    async fn enrich(
        &self,
        accumulator: &mut MatchAccumulator,
        progress: &(dyn Fn(ProgressEvent) + Send + Sync),
    ) {
        let Some(abstracts) = &self.abstracts else {
            return;
        };
        for (title, doi) in accumulator.pending_abstracts() {
            let text = abstracts.retrieve_abstract(&doi, &self.client).await;
            let found = text != ABSTRACT_NOT_FOUND;
            accumulator.set_abstract(&title, text);
            progress(ProgressEvent::AbstractResolved { title, found });
        }
    }
}

/// Titles a batch's classification resolved, and those it had to ignore.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Stored titles now matching, in classifier order.
    pub matched: Vec<String>,
    /// Returned titles that matched no known publication.
    pub ignored: Vec<String>,
}

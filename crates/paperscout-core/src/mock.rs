//! Hand-rolled mocks of the external collaborators, for tests.
//!
//! Each mock counts its calls and records its inputs so tests can assert
//! which requests a run made.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::classifier::TitleClassifier;
use crate::db::{BackendFuture, BibliographyBackend};
use crate::doi::{ABSTRACT_NOT_FOUND, AbstractSource};
use crate::{ClassificationError, FetchError, PublicationRecord, VenueDescriptor};

/// Scripted bibliography: a fixed venue list and publications per acronym.
pub struct MockBibliography {
    venues: Vec<VenueDescriptor>,
    publications: HashMap<String, Vec<PublicationRecord>>,
    /// Acronyms whose publication fetch fails.
    failing: Vec<String>,
    conference_calls: AtomicUsize,
    publication_calls: Mutex<Vec<String>>,
}

impl MockBibliography {
    pub fn new(venues: Vec<VenueDescriptor>) -> Self {
        Self {
            venues,
            publications: HashMap::new(),
            failing: Vec::new(),
            conference_calls: AtomicUsize::new(0),
            publication_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_publications(mut self, acronym: &str, publications: Vec<PublicationRecord>) -> Self {
        self.publications.insert(acronym.to_string(), publications);
        self
    }

    pub fn with_failing_venue(mut self, acronym: &str) -> Self {
        self.failing.push(acronym.to_string());
        self
    }

    pub fn conference_calls(&self) -> usize {
        self.conference_calls.load(Ordering::SeqCst)
    }

    /// Acronyms passed to `find_publications`, in call order.
    pub fn publication_calls(&self) -> Vec<String> {
        self.publication_calls.lock().unwrap().clone()
    }
}

impl BibliographyBackend for MockBibliography {
    fn name(&self) -> &str {
        "MockBibliography"
    }

    fn find_conferences<'a>(
        &'a self,
        _name: &'a str,
        _client: &'a reqwest::Client,
    ) -> BackendFuture<'a, Vec<VenueDescriptor>, FetchError> {
        self.conference_calls.fetch_add(1, Ordering::SeqCst);
        let venues = self.venues.clone();
        Box::pin(async move { Ok(venues) })
    }

    fn find_publications<'a>(
        &'a self,
        acronym: &'a str,
        _client: &'a reqwest::Client,
    ) -> BackendFuture<'a, Vec<PublicationRecord>, FetchError> {
        self.publication_calls.lock().unwrap().push(acronym.to_string());
        let result = if self.failing.iter().any(|a| a == acronym) {
            Err(FetchError::Malformed {
                url: format!("mock://{}", acronym),
                message: "scripted failure".into(),
            })
        } else {
            Ok(self.publications.get(acronym).cloned().unwrap_or_default())
        };
        Box::pin(async move { result })
    }
}

/// A configurable answer for [`MockClassifier`].
#[derive(Clone, Debug)]
pub enum MockAnswer {
    /// Return these titles verbatim.
    Titles(Vec<String>),
    /// Return every title of the batch that contains this substring.
    Containing(String),
    /// Fail the classification.
    Error(String),
}

/// Scripted classifier.
///
/// Answers come from a sequence (one per call, the last repeated once the
/// sequence is exhausted).
pub struct MockClassifier {
    responses: Mutex<Vec<MockAnswer>>,
    fallback: MockAnswer,
    batches: Mutex<Vec<Vec<String>>>,
}

impl MockClassifier {
    /// Always give `answer`.
    pub fn new(answer: MockAnswer) -> Self {
        Self {
            responses: Mutex::new(Vec::new()),
            fallback: answer,
            batches: Mutex::new(Vec::new()),
        }
    }

    /// Give answers in order, repeating the last one.
    pub fn with_sequence(mut answers: Vec<MockAnswer>) -> Self {
        assert!(!answers.is_empty(), "sequence must have at least one answer");
        // Reverse so we can pop() from the front cheaply.
        answers.reverse();
        let fallback = answers[0].clone();
        Self {
            responses: Mutex::new(answers),
            fallback,
            batches: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.batches.lock().unwrap().len()
    }

    /// Every batch received, in call order.
    pub fn batches(&self) -> Vec<Vec<String>> {
        self.batches.lock().unwrap().clone()
    }

    fn next_answer(&self) -> MockAnswer {
        let mut seq = self.responses.lock().unwrap();
        seq.pop().unwrap_or_else(|| self.fallback.clone())
    }
}

impl TitleClassifier for MockClassifier {
    fn name(&self) -> &str {
        "MockClassifier"
    }

    fn match_titles<'a>(
        &'a self,
        _keywords: &'a str,
        batch: &'a [String],
        _client: &'a reqwest::Client,
    ) -> BackendFuture<'a, Vec<String>, ClassificationError> {
        self.batches.lock().unwrap().push(batch.to_vec());
        let result = match self.next_answer() {
            MockAnswer::Titles(titles) => Ok(titles),
            MockAnswer::Containing(needle) => Ok(batch
                .iter()
                .filter(|t| t.contains(needle.as_str()))
                .cloned()
                .collect()),
            MockAnswer::Error(msg) => Err(ClassificationError::Status {
                status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
                body: msg,
            }),
        };
        Box::pin(async move { result })
    }
}

/// Abstracts by DOI; unknown DOIs yield [`ABSTRACT_NOT_FOUND`].
#[derive(Default)]
pub struct MockAbstracts {
    abstracts: HashMap<String, String>,
    requested: Mutex<Vec<String>>,
}

impl MockAbstracts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_abstract(mut self, doi: &str, text: &str) -> Self {
        self.abstracts.insert(doi.to_string(), text.to_string());
        self
    }

    /// DOIs looked up, in call order.
    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

impl AbstractSource for MockAbstracts {
    fn name(&self) -> &str {
        "MockAbstracts"
    }

    fn retrieve_abstract<'a>(
        &'a self,
        doi: &'a str,
        _client: &'a reqwest::Client,
    ) -> Pin<Box<dyn Future<Output = String> + Send + 'a>> {
        self.requested.lock().unwrap().push(doi.to_string());
        let text = self
            .abstracts
            .get(doi)
            .cloned()
            .unwrap_or_else(|| ABSTRACT_NOT_FOUND.to_string());
        Box::pin(async move { text })
    }
}

//! Per-run title → publication mapping.
//!
//! The accumulator is the only place a publication's matching state lives.
//! It is owned by one [`Pipeline::run`](crate::Pipeline::run) call and
//! threaded through every step by `&mut`, so titles from different venues of
//! the same run share one entry.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use crate::matching::{clean_returned_title, normalize_title};
use crate::{MatchResult, PublicationRecord};

/// Outcome of marking a classifier-returned title as matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkOutcome {
    /// The title was known and just became matching. Carries the stored title.
    Newly(String),
    /// The title was already matching.
    Already(String),
    /// No known publication has this title; nothing changed.
    Unknown,
}

#[derive(Debug, Default)]
pub struct MatchAccumulator {
    /// Records in first-insertion order.
    records: Vec<PublicationRecord>,
    by_title: HashMap<String, usize>,
    /// Normalized key to record. `None` marks a key shared by several titles.
    by_key: HashMap<String, Option<usize>>,
}

impl MatchAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, title: &str) -> Option<&PublicationRecord> {
        self.by_title.get(title).map(|&i| &self.records[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &PublicationRecord> {
        self.records.iter()
    }

    /// Insert a batch of records, overwriting DOI and link of titles already
    /// present. A record that is already matching stays matching.
    pub fn merge(&mut self, batch: &[PublicationRecord]) {
        for incoming in batch {
            match self.by_title.get(&incoming.title) {
                Some(&i) => {
                    let existing = &mut self.records[i];
                    if existing.doi() != incoming.doi() {
                        existing.abstract_text = None;
                    }
                    existing.doi = incoming.doi.clone();
                    existing.link = incoming.link.clone();
                }
                None => {
                    let i = self.records.len();
                    let mut record = incoming.clone();
                    record.matching = false;
                    record.abstract_text = None;
                    self.by_title.insert(record.title.clone(), i);
                    match self.by_key.entry(normalize_title(&record.title)) {
                        Entry::Vacant(slot) => {
                            slot.insert(Some(i));
                        }
                        Entry::Occupied(mut slot) => {
                            slot.insert(None);
                        }
                    }
                    self.records.push(record);
                }
            }
        }
    }

    /// Map a title as returned by the classifier to a stored title.
    ///
    /// Exact text wins; otherwise the normalized key is tried, but only when
    /// exactly one stored title has that key. Titles that resolve to nothing
    /// are never invented into the mapping.
    pub fn resolve(&self, returned: &str) -> Option<&str> {
        let cleaned = clean_returned_title(returned);
        let index = self.by_title.get(cleaned).copied().or_else(|| {
            let key = normalize_title(cleaned);
            if key.is_empty() {
                return None;
            }
            match self.by_key.get(&key) {
                Some(Some(i)) => Some(*i),
                Some(None) => {
                    tracing::debug!(title = returned, "normalized title is ambiguous, ignoring");
                    None
                }
                None => None,
            }
        })?;
        Some(self.records[index].title.as_str())
    }

    pub fn mark_matching(&mut self, returned: &str) -> MarkOutcome {
        let Some(title) = self.resolve(returned).map(str::to_string) else {
            return MarkOutcome::Unknown;
        };
        let i = self.by_title[&title];
        let record = &mut self.records[i];
        if record.matching {
            MarkOutcome::Already(title)
        } else {
            record.matching = true;
            MarkOutcome::Newly(title)
        }
    }

    /// Store an abstract for a known title. Returns `false` if the title is unknown.
    pub fn set_abstract(&mut self, title: &str, abstract_text: String) -> bool {
        match self.by_title.get(title) {
            Some(&i) => {
                self.records[i].abstract_text = Some(abstract_text);
                true
            }
            None => false,
        }
    }

    /// Titles that are matching, carry a DOI, and have no abstract yet.
    pub fn pending_abstracts(&self) -> Vec<(String, String)> {
        self.records
            .iter()
            .filter(|r| r.matching && r.abstract_text.is_none())
            .filter_map(|r| r.doi().map(|doi| (r.title.clone(), doi.to_string())))
            .collect()
    }

    /// Every matching record, in first-insertion order.
    pub fn matches(&self) -> Vec<MatchResult> {
        self.records
            .iter()
            .filter(|r| r.matching)
            .map(MatchResult::from)
            .collect()
    }
}

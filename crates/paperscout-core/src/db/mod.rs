//! Bibliographic backend trait and the DBLP implementation.

pub mod dblp;

use std::future::Future;
use std::pin::Pin;

use crate::{FetchError, PublicationRecord, VenueDescriptor};

/// Boxed future returned by the collaborator traits, so they stay object safe.
pub type BackendFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

/// A bibliographic service that can list conferences and their publications.
pub trait BibliographyBackend: Send + Sync {
    /// The canonical name of this service (e.g., "DBLP").
    fn name(&self) -> &str;

    /// Search conferences by free-text name. Upstream order is preserved.
    fn find_conferences<'a>(
        &'a self,
        name: &'a str,
        client: &'a reqwest::Client,
    ) -> BackendFuture<'a, Vec<VenueDescriptor>, FetchError>;

    /// List the publications of a venue, identified by its lowercase acronym.
    fn find_publications<'a>(
        &'a self,
        acronym: &'a str,
        client: &'a reqwest::Client,
    ) -> BackendFuture<'a, Vec<PublicationRecord>, FetchError>;
}

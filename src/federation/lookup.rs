//! Cross-repository single-item lookup

use crate::federation::backend::SearchBackend;
use crate::federation::catalog;
use crate::federation::error::FederationResult;
use crate::federation::filter::SecurityFilter;
use crate::federation::hit::{Hit, Links};
use crate::federation::repository::RepositoryId;
use crate::federation::resolver::{self, RepoSelector};
use crate::metrics::LOOKUP_PROBES_TOTAL;
use std::sync::Arc;
use tracing::debug;

/// Finds one document by id across repositories, in priority order
#[derive(Clone)]
pub struct CrossRepositoryLookup {
    backend: Arc<dyn SearchBackend>,
    known: Vec<RepositoryId>,
}

impl CrossRepositoryLookup {
    pub fn new(backend: Arc<dyn SearchBackend>, known: Vec<RepositoryId>) -> Self {
        Self { backend, known }
    }

    /// Probe each selected repository in turn and return the first match.
    ///
    /// Probing stops at the first hit. Every probe is restricted to the
    /// repository's base security filter.
    pub async fn find_one(
        &self,
        id: &str,
        selector: &RepoSelector,
        private_content: Option<&SecurityFilter>,
    ) -> FederationResult<Option<Hit>> {
        let repos = resolver::resolve(selector, &self.known)?;

        for repo in repos {
            let filter = catalog::filter_for(repo, private_content)
                .and_also(SecurityFilter::term(repo.id_field(), id));

            let found = self.backend.find_first(repo, &filter).await?;

            LOOKUP_PROBES_TOTAL
                .with_label_values(&[repo.as_str(), if found.is_some() { "hit" } else { "miss" }])
                .inc();

            if let Some(raw) = found {
                debug!(id = %id, repository = %repo, "Lookup matched");
                let mut hit = Hit::new(repo, raw.id, 0, raw.document);
                hit.links = Some(Links::self_for(repo, &hit.id));
                return Ok(Some(hit));
            }
        }

        debug!(id = %id, "Lookup exhausted all repositories");
        Ok(None)
    }
}

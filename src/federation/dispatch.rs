//! Per-repository fan-out of federated results

use crate::federation::hit::{Hit, Links};
use crate::federation::repository::RepositoryId;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use strum::IntoEnumIterator;
use tracing::trace;

/// Post-fetch hook run over one repository's bucket of hits
pub trait FetchHook: Send + Sync {
    fn on_fetched(&self, repo: RepositoryId, items: &mut Vec<Hit>);
}

impl<F> FetchHook for F
where
    F: Fn(RepositoryId, &mut Vec<Hit>) + Send + Sync,
{
    fn on_fetched(&self, repo: RepositoryId, items: &mut Vec<Hit>) {
        self(repo, items)
    }
}

/// Hook that leaves buckets alone
#[derive(Debug, Clone, Default)]
pub struct NoopHook;

impl FetchHook for NoopHook {
    fn on_fetched(&self, _repo: RepositoryId, _items: &mut Vec<Hit>) {}
}

/// The generic hook and one specific hook for every repository.
///
/// The registry is complete by construction: there is no repository without a
/// specific hook to fall through to.
#[derive(Clone)]
pub struct HookRegistry {
    generic: Arc<dyn FetchHook>,
    specific: HashMap<RepositoryId, Arc<dyn FetchHook>>,
}

impl HookRegistry {
    /// Build the registry, asking `specific` for each repository's hook
    pub fn new<F>(generic: Arc<dyn FetchHook>, mut specific: F) -> Self
    where
        F: FnMut(RepositoryId) -> Arc<dyn FetchHook>,
    {
        let specific = RepositoryId::iter().map(|repo| (repo, specific(repo))).collect();
        Self { generic, specific }
    }

    /// Registry whose hooks do nothing
    pub fn noop() -> Self {
        Self::new(Arc::new(NoopHook), |_| Arc::new(NoopHook))
    }

    /// Hooks for `repo`, generic first
    pub fn hooks_for(&self, repo: RepositoryId) -> [&Arc<dyn FetchHook>; 2] {
        // Every variant was inserted in `new`
        let specific = &self.specific[&repo];
        [&self.generic, specific]
    }
}

impl Default for HookRegistry {
    fn default() -> Self {
        Self::noop()
    }
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookRegistry")
            .field("repositories", &self.specific.len())
            .finish()
    }
}

/// Hits of one repository, in backend order
#[derive(Debug, Clone, PartialEq)]
pub struct RepositoryBucket {
    pub repo: RepositoryId,
    pub items: Vec<Hit>,
}

/// Results grouped by repository
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupedResults {
    pub buckets: Vec<RepositoryBucket>,
}

impl GroupedResults {
    pub fn bucket(&self, repo: RepositoryId) -> Option<&RepositoryBucket> {
        self.buckets.iter().find(|b| b.repo == repo)
    }

    pub fn total_items(&self) -> usize {
        self.buckets.iter().map(|b| b.items.len()).sum()
    }

    /// Flatten back into backend order
    pub fn into_ordered(self) -> Vec<Hit> {
        let mut hits: Vec<Hit> = self.buckets.into_iter().flat_map(|b| b.items).collect();
        hits.sort_by_key(|hit| hit.rank);
        hits
    }
}

/// Fans results out to per-repository hooks
#[derive(Debug, Clone, Default)]
pub struct ResultDispatcher {
    hooks: HookRegistry,
}

impl ResultDispatcher {
    pub fn new(hooks: HookRegistry) -> Self {
        Self { hooks }
    }

    /// Partition `hits` into one bucket per repository in `repos`.
    ///
    /// Every hit gets its self link first. Then each bucket, empty or not, is
    /// passed to the generic hook and then to its repository's hook.
    pub fn dispatch(&self, hits: Vec<Hit>, repos: &[RepositoryId]) -> GroupedResults {
        let mut buckets: Vec<RepositoryBucket> = repos
            .iter()
            .map(|repo| RepositoryBucket {
                repo: *repo,
                items: Vec::new(),
            })
            .collect();

        for mut hit in hits {
            hit.links = Some(Links::self_for(hit.repo, &hit.id));
            if let Some(bucket) = buckets.iter_mut().find(|b| b.repo == hit.repo) {
                bucket.items.push(hit);
            }
        }

        for bucket in &mut buckets {
            for hook in self.hooks.hooks_for(bucket.repo) {
                hook.on_fetched(bucket.repo, &mut bucket.items);
            }
            trace!(repository = %bucket.repo, items = bucket.items.len(), "Dispatched bucket");
        }

        GroupedResults { buckets }
    }
}

//! Per-repository base security filters

use crate::federation::filter::SecurityFilter;
use crate::federation::repository::RepositoryId;
use crate::federation::visibility::UserContext;

/// Type discriminator field
pub const TYPE_FIELD: &str = "_type";

/// Primary identifier field
pub const ID_FIELD: &str = "_id";

/// Workflow state field
pub const STATE_FIELD: &str = "state";

/// Workflow stage field
pub const STAGE_FIELD: &str = "task.stage";

/// Owner of a draft
pub const CREATOR_FIELD: &str = "original_creator";

/// Workflow state of an unsaved draft
pub const DRAFT_STATE: &str = "draft";

/// States a published copy may be returned in
pub const PUBLISHED_STATES: [&str; 7] = [
    "scheduled",
    "published",
    "killed",
    "recalled",
    "corrected",
    "unpublished",
    "being_corrected",
];

/// Base security filter for a repository.
///
/// `private_content` is the working repository's draft-privacy clause. It is
/// only used for [`RepositoryId::Archive`].
pub fn filter_for(repo: RepositoryId, private_content: Option<&SecurityFilter>) -> SecurityFilter {
    let type_clause = SecurityFilter::term(TYPE_FIELD, repo.as_str());

    match repo {
        RepositoryId::Ingest => SecurityFilter::and(vec![type_clause]),
        RepositoryId::Archive => {
            let mut clauses = vec![type_clause];
            if let Some(private) = private_content {
                clauses.push(private.clone());
            }
            SecurityFilter::and(clauses)
        }
        RepositoryId::Published => SecurityFilter::and(vec![
            type_clause,
            SecurityFilter::terms(STATE_FIELD, PUBLISHED_STATES),
        ]),
        RepositoryId::Archived => SecurityFilter::and(vec![type_clause]),
    }
}

/// Source of the working repository's private-content clause
pub trait PrivateContentFilter: Send + Sync {
    /// Clause restricting private content for `user`, or `None` for no restriction
    fn private_filter(&self, user: &UserContext) -> Option<SecurityFilter>;
}

/// Drafts are visible only to the user who created them.
///
/// Anonymous callers see no drafts at all.
#[derive(Debug, Clone, Default)]
pub struct DraftOwnershipFilter;

impl PrivateContentFilter for DraftOwnershipFilter {
    fn private_filter(&self, user: &UserContext) -> Option<SecurityFilter> {
        let not_draft = SecurityFilter::not(SecurityFilter::term(STATE_FIELD, DRAFT_STATE));

        Some(match user.user_id() {
            Some(id) => SecurityFilter::or(vec![not_draft, SecurityFilter::term(CREATOR_FIELD, id)]),
            None => not_draft,
        })
    }
}

/// Applies no private-content restriction
#[derive(Debug, Clone, Default)]
pub struct NoPrivateContent;

impl PrivateContentFilter for NoPrivateContent {
    fn private_filter(&self, _user: &UserContext) -> Option<SecurityFilter> {
        None
    }
}

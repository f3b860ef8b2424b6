//! Repository identifiers

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

/// A logical partition of documents by lifecycle role.
///
/// All repositories live in the same search index and are told apart by the
/// `_type` discriminator, which carries the wire name of the variant.
/// Declaration order is the default search and lookup priority.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RepositoryId {
    /// Inbound feed items, not yet taken into the newsroom workflow
    Ingest,
    /// Working copies and drafts
    Archive,
    /// Published copies, versioned under their own key
    Published,
    /// Items moved out of the working set after publication
    Archived,
}

impl RepositoryId {
    /// Every repository in declaration order
    pub const ALL: [RepositoryId; 4] = [
        RepositoryId::Ingest,
        RepositoryId::Archive,
        RepositoryId::Published,
        RepositoryId::Archived,
    ];

    /// Wire name, as stored in the `_type` discriminator
    pub fn as_str(&self) -> &'static str {
        match self {
            RepositoryId::Ingest => "ingest",
            RepositoryId::Archive => "archive",
            RepositoryId::Published => "published",
            RepositoryId::Archived => "archived",
        }
    }

    /// Field that holds the identifier callers look documents up by.
    ///
    /// Published copies keep the originating item's id in `item_id`; their own
    /// `_id` is a per-version key.
    pub fn id_field(&self) -> &'static str {
        match self {
            RepositoryId::Published => "item_id",
            _ => "_id",
        }
    }

    /// Whether workflow-stage visibility rules apply to this repository.
    ///
    /// Inbound items are not in any desk stage yet.
    pub fn is_stage_scoped(&self) -> bool {
        !matches!(self, RepositoryId::Ingest)
    }
}

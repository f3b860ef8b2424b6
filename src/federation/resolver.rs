//! Repository selection

use crate::federation::error::{FederationError, FederationResult};
use crate::federation::repository::RepositoryId;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Which repositories a request wants to search
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RepoSelector {
    /// Every known repository
    #[default]
    All,
    /// Named repositories, in whatever order the caller gave them
    Named(Vec<String>),
}

impl RepoSelector {
    /// Parse the comma-separated wire form (`"ingest,published"`).
    ///
    /// `None` or a string with no names selects all repositories.
    pub fn parse(raw: Option<&str>) -> Self {
        let names: Vec<String> = raw
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect();

        if names.is_empty() {
            RepoSelector::All
        } else {
            RepoSelector::Named(names)
        }
    }

    pub fn named<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        RepoSelector::Named(names.into_iter().map(Into::into).collect())
    }
}

/// Resolve a selector against the known repositories.
///
/// The result follows the declaration order of `known`, never the caller's
/// order, and contains each repository once. Names that are not in `known`
/// are rejected rather than dropped.
pub fn resolve(selector: &RepoSelector, known: &[RepositoryId]) -> FederationResult<Vec<RepositoryId>> {
    let names = match selector {
        RepoSelector::Named(names) if names.iter().any(|n| !n.trim().is_empty()) => names,
        _ => {
            if known.is_empty() {
                return Err(FederationError::validation("no repositories are configured", ""));
            }
            return Ok(known.to_vec());
        }
    };

    let mut requested = Vec::with_capacity(names.len());
    for name in names.iter().map(|n| n.trim()).filter(|n| !n.is_empty()) {
        let repo = RepositoryId::from_str(name)
            .ok()
            .filter(|repo| known.contains(repo))
            .ok_or_else(|| FederationError::validation("unknown repository", name))?;
        requested.push(repo);
    }

    Ok(known
        .iter()
        .copied()
        .filter(|repo| requested.contains(repo))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use RepositoryId::*;

    #[test]
    fn test_empty_selector_resolves_to_all_known() {
        let known = [Ingest, Archive, Published];
        assert_eq!(resolve(&RepoSelector::All, &known).unwrap(), known.to_vec());
        assert_eq!(
            resolve(&RepoSelector::Named(vec![]), &known).unwrap(),
            known.to_vec()
        );
    }

    #[test]
    fn test_declaration_order_wins() {
        let known = [Ingest, Archive, Published, Archived];
        let selector = RepoSelector::named(["archived", "ingest", "published"]);
        assert_eq!(
            resolve(&selector, &known).unwrap(),
            vec![Ingest, Published, Archived]
        );

        let reordered_known = [Archived, Published, Ingest];
        assert_eq!(
            resolve(&selector, &reordered_known).unwrap(),
            vec![Archived, Published, Ingest]
        );
    }

    #[test]
    fn test_unknown_repository_is_rejected() {
        let known = [Ingest, Archive, Published];
        let err = resolve(&RepoSelector::named(["published", "Z"]), &known).unwrap_err();
        match err {
            FederationError::Validation { value, .. } => assert_eq!(value, "Z"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_repository_outside_known_set_is_rejected() {
        let known = [Ingest, Published];
        assert!(resolve(&RepoSelector::named(["archive"]), &known).is_err());
    }

    #[test]
    fn test_duplicates_collapse() {
        let known = [Ingest, Published];
        let selector = RepoSelector::named(["published", "published"]);
        assert_eq!(resolve(&selector, &known).unwrap(), vec![Published]);
    }

    #[test]
    fn test_parse_wire_form() {
        assert_eq!(RepoSelector::parse(None), RepoSelector::All);
        assert_eq!(RepoSelector::parse(Some(" , ")), RepoSelector::All);
        assert_eq!(
            RepoSelector::parse(Some("ingest, published,,")),
            RepoSelector::named(["ingest", "published"])
        );
    }

    #[test]
    fn test_no_known_repositories() {
        assert!(resolve(&RepoSelector::All, &[]).is_err());
    }
}

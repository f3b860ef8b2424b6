//! Federated, security-filtered search across content repositories
//!
//! Several logical repositories (inbound feeds, the working repository,
//! published output and the archive) live in one search backend. A single
//! request searches any subset of them with one backend call, and every
//! repository contributes its own security filter so no caller ever sees a
//! document its repository or its workflow stage hides.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │         FederatedSearchService                   │
//! ├─────────────────────────────────────────────────┤
//! │  - search()          - find_one()               │
//! └─────────────────────────────────────────────────┘
//!          │                            │
//!          ▼                            ▼
//! ┌──────────────────────┐   ┌──────────────────────┐
//! │ Repository Resolver  │   │ Cross-Repository     │
//! │ Visibility Resolver  │   │ Lookup               │
//! │ Filter Catalog       │   │  (sequential probes) │
//! │ Query Composer       │   └──────────────────────┘
//! └──────────────────────┘              │
//!          │                            │
//!          ▼                            │
//! ┌──────────────────────┐              │
//! │ Search Executor      │──────────────┤
//! │  (one backend call)  │              │
//! └──────────────────────┘              ▼
//!          │                 ┌──────────────────────┐
//!          ▼                 │ SearchBackend        │
//! ┌──────────────────────┐   │  - ElasticBackend    │
//! │ Result Dispatcher    │   │  - InMemoryBackend   │
//! │  (hooks, self links) │   └──────────────────────┘
//! └──────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use federated_search::federation::{
//!     FederatedSearchService, FederationConfig, InMemoryBackend, RepoSelector,
//!     SearchRequest, StaticUserDirectory, UserContext,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = FederatedSearchService::new(
//!         FederationConfig::default(),
//!         Arc::new(InMemoryBackend::new()),
//!         Arc::new(StaticUserDirectory::default()),
//!     )?;
//!
//!     let request = SearchRequest::new()
//!         .with_repo(RepoSelector::parse(Some("ingest,published")))
//!         .with_source(r#"{"query": {"filtered": {"query": {"query_string": {"query": "flood"}}}}}"#);
//!
//!     let response = service.search(&request, &UserContext::identified("u1")).await?;
//!     println!("{} of {} hits", response.items.len(), response.total());
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod catalog;
pub mod composer;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod executor;
pub mod filter;
pub mod hit;
pub mod lookup;
pub mod repository;
pub mod request;
pub mod resolver;
pub mod service;
pub mod visibility;

pub use backend::{
    BackendResponse, ElasticBackend, ElasticConfig, InMemoryBackend, RawHit, SearchBackend,
};
pub use catalog::{filter_for, DraftOwnershipFilter, NoPrivateContent, PrivateContentFilter};
pub use composer::{security_filter, ComposedQuery, QueryComposer};
pub use config::{FederationConfig, FederationConfigBuilder, SearchDepth};
pub use dispatch::{
    FetchHook, GroupedResults, HookRegistry, NoopHook, RepositoryBucket, ResultDispatcher,
};
pub use error::{FederationError, FederationResult};
pub use executor::{SearchExecutor, SearchOutcome};
pub use filter::SecurityFilter;
pub use hit::{Hit, Link, Links};
pub use lookup::CrossRepositoryLookup;
pub use repository::RepositoryId;
pub use request::SearchRequest;
pub use resolver::{resolve, RepoSelector};
pub use service::{FederatedSearchService, ResponseMeta, SearchResponse};
pub use visibility::{
    CachedUserDirectory, StageId, StaticUserDirectory, UnavailableDirectory, UserContext,
    UserDirectory, VisibilityResolver,
};

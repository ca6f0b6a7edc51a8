pub mod fetcher;
pub mod logging;
pub mod providers;
pub mod query;
pub mod registry;

pub use fetcher::{FetchConfig, FetchCoordinator, FetchOutcome, LeafReport};
pub use providers::ProviderKind;
pub use query::{detect_headline_intent, EndpointKind, QueryContext, SourceRequest};
pub use registry::{DateDialect, KeywordDialect, SourceCredentials, SourceDescriptor, SourceRegistry};

pub mod prelude {
    pub use super::{FetchCoordinator, QueryContext, SourceDescriptor, SourceRegistry};
    pub use nb_core::{ArticleRecord, Category, CategoryTerm, Error, Result};
}

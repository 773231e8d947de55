//! comic-fetch - a source-agnostic fetch/parse pipeline for comic metadata.
//!
//! One [`SourceParser`] implementation per remote source builds requests and
//! parses responses; everything else is uniform:
//! - [`FetchPipeline`] drives the fixed chains (search, series info, recent
//!   listing, chapter images, streaming lazy resolution)
//! - [`UpdateChecker`] probes a whole tracked collection with per-item
//!   isolation and progress reporting
//! - [`LazyLinkResolver`] serves background downloads that want direct calls
//!   instead of streams

pub mod cancel;
pub mod config;
pub mod error;
pub mod http;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod resolver;
pub mod source;
pub mod update;

pub use cancel::CancelFlag;
pub use config::FetchConfig;
pub use error::FetchError;
pub use http::HttpExecutor;
pub use model::Chapter;
pub use model::PageImage;
pub use model::Series;
pub use model::SeriesSummary;
pub use model::SourceId;
pub use model::UpdateProbe;
pub use pipeline::FetchPipeline;
pub use pipeline::SearchStream;
pub use resolver::LazyLinkResolver;
pub use source::SourceInfo;
pub use source::SourceParser;
pub use source::registry::SourceRegistry;
pub use update::UpdateChecker;
pub use update::UpdateStream;

//! The per-source parser contract and its implementations.

pub mod madara;
pub mod mangadex;
pub mod registry;

use reqwest::Method;
use reqwest::Request;
use url::Url;

use crate::error::FetchError;
use crate::model::Chapter;
use crate::model::PageImage;
use crate::model::Series;
use crate::model::SeriesSummary;
use crate::model::SourceId;

/// Identity of a remote source.
#[derive(Clone, Debug)]
pub struct SourceInfo {
    pub id: SourceId,
    /// Human readable name, e.g. "MangaDex".
    pub name: String,
    /// Scheme-qualified root every request URL is built from.
    pub base_url: String,
}

/// Lazy, finite, non-restartable sequence of search hits.
pub type SearchIter = Box<dyn Iterator<Item = SeriesSummary> + Send>;

/// Builds a plain GET request for `url`.
pub fn get(url: &str) -> Result<Request, FetchError> {
    Ok(Request::new(Method::GET, Url::parse(url)?))
}

/// Request construction and response parsing for one remote source.
///
/// Implementations perform no network I/O; the pipeline owns every request it
/// is handed back. All methods are pure functions of their inputs except
/// [`parse_image_server`](SourceParser::parse_image_server), which may cache
/// session data (guard it with a lock — a parser is shared across concurrent
/// operations).
///
/// Methods with defaults cover phases a source may not have: a missing second
/// chapter round-trip, a missing image-server concept, a source without lazy
/// links.
pub trait SourceParser: Send + Sync {
    fn info(&self) -> &SourceInfo;

    fn search_request(&self, keyword: &str, page: u32) -> Result<Request, FetchError>;

    /// `Ok(None)` and an empty iterator both mean the source has no matches;
    /// `Err` means the response structure was not recognized.
    fn parse_search(&self, body: &str, page: u32) -> Result<Option<SearchIter>, FetchError>;

    fn info_request(&self, id: &str) -> Result<Request, FetchError>;

    /// Applies series metadata from `body` onto `series` in place.
    fn parse_info(&self, body: &str, series: &mut Series) -> Result<(), FetchError>;

    /// Second round-trip for sources whose chapter list lives on another
    /// endpoint. `None` means [`parse_chapters`](SourceParser::parse_chapters)
    /// reads the info body itself.
    fn chapter_request(&self, info_body: &str, id: &str) -> Result<Option<Request>, FetchError> {
        let _ = (info_body, id);
        Ok(None)
    }

    /// Chapters in source order. Ordinals are assigned by the pipeline.
    fn parse_chapters(&self, body: &str) -> Result<Vec<Chapter>, FetchError>;

    fn recent_request(&self, page: u32) -> Result<Request, FetchError>;

    fn parse_recent(&self, body: &str, page: u32) -> Result<Vec<Series>, FetchError>;

    /// `None` skips the image-server phase entirely.
    fn image_server_request(&self) -> Result<Option<Request>, FetchError> {
        Ok(None)
    }

    /// Caches session data (e.g. a CDN host) discovered mid-pipeline. The
    /// only method allowed to mutate parser state.
    fn parse_image_server(&self, body: &str) -> Result<(), FetchError> {
        let _ = body;
        Ok(())
    }

    fn images_request(&self, id: &str, chapter_path: &str) -> Result<Request, FetchError>;

    /// Page images in reading order.
    fn parse_images(&self, body: &str) -> Result<Vec<PageImage>, FetchError>;

    fn lazy_request(&self, url: &str) -> Result<Request, FetchError> {
        get(url)
    }

    /// Resolves a lazy link to a direct URL; `Ok(None)` keeps the original.
    fn parse_lazy(&self, body: &str, original: &str) -> Result<Option<String>, FetchError> {
        let _ = (body, original);
        Ok(None)
    }

    fn check_request(&self, id: &str) -> Result<Request, FetchError>;

    /// Extracts the opaque update token used for change detection.
    fn parse_check(&self, body: &str) -> Result<Option<String>, FetchError>;
}

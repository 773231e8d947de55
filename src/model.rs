//! Data model shared by the fetch pipeline and its consumers.

use serde::Deserialize;
use serde::Serialize;

/// Numeric identifier of a remote source.
///
/// Ids at or above [`crate::config::FetchConfig::local_source_min`] belong to
/// purely-local entries and are never probed for updates.
pub type SourceId = i32;

/// One search listing entry, in the source's natural result order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesSummary {
    pub source: SourceId,
    /// Remote identifier of the series on its source.
    pub id: String,
    pub title: String,
    pub cover: Option<String>,
    pub author: Option<String>,
    pub status: Option<String>,
}

/// A tracked series.
///
/// Metadata fields are updated in place by the info chain; `update_token` and
/// `highlight` by the update checker. `chapters` is wholesale-replaced when an
/// info fetch completes and is never partially populated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Series {
    pub source: SourceId,
    pub id: String,
    pub title: String,
    pub cover: Option<String>,
    pub author: Option<String>,
    pub status: Option<String>,
    pub chapters: Vec<Chapter>,
    /// Opaque freshness marker from the last successful update check.
    pub update_token: Option<String>,
    /// Set when the update checker saw the token change.
    pub highlight: bool,
}

impl Series {
    pub fn new(source: SourceId, id: impl Into<String>) -> Self {
        Self {
            source,
            id: id.into(),
            title: String::new(),
            cover: None,
            author: None,
            status: None,
            chapters: Vec::new(),
            update_token: None,
            highlight: false,
        }
    }
}

impl From<SeriesSummary> for Series {
    fn from(hit: SeriesSummary) -> Self {
        let mut series = Series::new(hit.source, hit.id);
        series.title = hit.title;
        series.cover = hit.cover;
        series.author = hit.author;
        series.status = hit.status;
        series
    }
}

/// One chapter of a series.
///
/// `ordinal` is assigned by the pipeline from parse order, so identical
/// responses always yield identical chapter sequences.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    pub title: String,
    /// Remote chapter id or path, as the source addresses it.
    pub path: String,
    pub ordinal: u32,
}

impl Chapter {
    pub fn new(title: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            path: path.into(),
            ordinal: 0,
        }
    }
}

/// One page image of a chapter, in reading order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageImage {
    /// Directly fetchable URL.
    Direct(String),
    /// Needs one more round-trip through the lazy resolver before it is
    /// fetchable.
    Lazy(String),
}

impl PageImage {
    pub fn url(&self) -> &str {
        match self {
            PageImage::Direct(url) | PageImage::Lazy(url) => url,
        }
    }

    pub fn is_lazy(&self) -> bool {
        matches!(self, PageImage::Lazy(_))
    }
}

/// Progress report for one item of a batch update check.
///
/// Exactly one probe is emitted per input item, in input order. `series`
/// carries the updated item when its token changed and is `None` otherwise
/// (unchanged, skipped local entry, or failed probe).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UpdateProbe {
    pub series: Option<Series>,
    /// 1-based position within the batch.
    pub position: usize,
    pub total: usize,
}

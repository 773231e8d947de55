//! MangaDex parser (JSON API).

use chrono::DateTime;
use reqwest::Method;
use reqwest::Request;
use serde_json::Map;
use serde_json::Value;
use url::Url;

use crate::error::FetchError;
use crate::model::Chapter;
use crate::model::PageImage;
use crate::model::Series;
use crate::model::SeriesSummary;
use crate::source::SearchIter;
use crate::source::SourceInfo;
use crate::source::SourceParser;
use crate::source::get;

/// Languages tried, in order, when picking a display title.
const TITLE_LANGS: [&str; 3] = ["en", "ja-ro", "ja"];
const PAGE_SIZE: u32 = 20;
/// Covers are served from a fixed host, not the API host.
const COVER_HOST: &str = "https://uploads.mangadex.org";

type Json<'a> = &'a Map<String, Value>;

pub struct MangaDexSource {
    info: SourceInfo,
}

impl MangaDexSource {
    pub fn new() -> Self {
        Self::with_base_url("https://api.mangadex.org")
    }

    /// Points the parser at a different API root; used by tests against a
    /// mock server.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            info: SourceInfo {
                id: 1,
                name: "MangaDex".to_string(),
                base_url: base_url.into(),
            },
        }
    }

    fn get_with(&self, path: &str, params: &[(&str, &str)]) -> Result<Request, FetchError> {
        let url = Url::parse_with_params(&format!("{}{path}", self.info.base_url), params)?;
        Ok(Request::new(Method::GET, url))
    }

    fn validate_id(id: &str) -> Result<(), FetchError> {
        uuid::Uuid::parse_str(id)
            .map_err(|_| FetchError::parse(format!("invalid series id `{id}`")))?;
        Ok(())
    }

    fn check_resp_errors(resp: &Value) -> Result<(), FetchError> {
        if let Some(errors) = resp.get("errors")
            && let Some(first) = errors.as_array().and_then(|a| a.first())
        {
            let message = first
                .get("detail")
                .and_then(|v| v.as_str())
                .or_else(|| first.get("title").and_then(|v| v.as_str()))
                .unwrap_or("unknown API error");
            return Err(FetchError::parse(format!("API error: {message}")));
        }
        Ok(())
    }

    fn entries(resp: &Value) -> Result<&Vec<Value>, FetchError> {
        resp.get("data")
            .and_then(|v| v.as_array())
            .ok_or_else(|| FetchError::missing_field("data"))
    }

    fn attributes(entry: &Value) -> Result<Json<'_>, FetchError> {
        entry
            .get("attributes")
            .and_then(|v| v.as_object())
            .ok_or_else(|| FetchError::missing_field("attributes"))
    }

    /// Priority: title in en > ja-ro > ja, then the same walk over altTitles
    /// (a list of single-language maps).
    fn title_from_attr(attr: Json) -> Result<String, FetchError> {
        for lang in TITLE_LANGS {
            if let Some(title) = attr
                .get("title")
                .and_then(|t| t.get(lang))
                .and_then(|v| v.as_str())
            {
                return Ok(title.to_string());
            }
        }
        if let Some(alts) = attr.get("altTitles").and_then(|v| v.as_array()) {
            for lang in TITLE_LANGS {
                for alt in alts {
                    if let Some(title) = alt.get(lang).and_then(|v| v.as_str()) {
                        return Ok(title.to_string());
                    }
                }
            }
        }
        Err(FetchError::missing_field("title"))
    }

    fn relationship_attr<'a>(entry: &'a Value, kind: &str) -> Option<&'a Value> {
        entry
            .get("relationships")?
            .as_array()?
            .iter()
            .find(|r| r.get("type").and_then(|v| v.as_str()) == Some(kind))?
            .get("attributes")
    }

    fn cover_from(entry: &Value, manga_id: &str) -> Option<String> {
        let file = Self::relationship_attr(entry, "cover_art")?
            .get("fileName")?
            .as_str()?;
        Some(format!("{COVER_HOST}/covers/{manga_id}/{file}.256.jpg"))
    }

    fn author_from(entry: &Value) -> Option<String> {
        Self::relationship_attr(entry, "author")?
            .get("name")?
            .as_str()
            .map(String::from)
    }

    fn summary_from(&self, entry: &Value) -> Result<SeriesSummary, FetchError> {
        let id = entry
            .get("id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| FetchError::missing_field("id"))?;
        let attr = Self::attributes(entry)?;
        Ok(SeriesSummary {
            source: self.info.id,
            id: id.to_string(),
            title: Self::title_from_attr(attr)?,
            cover: Self::cover_from(entry, id),
            author: Self::author_from(entry),
            status: attr.get("status").and_then(|v| v.as_str()).map(String::from),
        })
    }
}

impl SourceParser for MangaDexSource {
    fn info(&self) -> &SourceInfo {
        &self.info
    }

    fn search_request(&self, keyword: &str, page: u32) -> Result<Request, FetchError> {
        let offset = page.saturating_sub(1) * PAGE_SIZE;
        self.get_with(
            "/manga",
            &[
                ("title", keyword),
                ("limit", &PAGE_SIZE.to_string()),
                ("offset", &offset.to_string()),
                ("includes[]", "cover_art"),
            ],
        )
    }

    fn parse_search(&self, body: &str, _page: u32) -> Result<Option<SearchIter>, FetchError> {
        let resp: Value = serde_json::from_str(body)?;
        Self::check_resp_errors(&resp)?;
        let hits = Self::entries(&resp)?
            .iter()
            .map(|entry| self.summary_from(entry))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Some(Box::new(hits.into_iter())))
    }

    fn info_request(&self, id: &str) -> Result<Request, FetchError> {
        Self::validate_id(id)?;
        self.get_with(
            &format!("/manga/{id}"),
            &[("includes[]", "cover_art"), ("includes[]", "author")],
        )
    }

    fn parse_info(&self, body: &str, series: &mut Series) -> Result<(), FetchError> {
        let resp: Value = serde_json::from_str(body)?;
        Self::check_resp_errors(&resp)?;
        let entry = resp
            .get("data")
            .ok_or_else(|| FetchError::missing_field("data"))?;
        let attr = Self::attributes(entry)?;

        series.title = Self::title_from_attr(attr)?;
        series.status = attr.get("status").and_then(|v| v.as_str()).map(String::from);
        if let Some(cover) = Self::cover_from(entry, &series.id) {
            series.cover = Some(cover);
        }
        if let Some(author) = Self::author_from(entry) {
            series.author = Some(author);
        }
        Ok(())
    }

    fn chapter_request(&self, _info_body: &str, id: &str) -> Result<Option<Request>, FetchError> {
        self.get_with(
            &format!("/manga/{id}/feed"),
            &[
                ("order[chapter]", "asc"),
                ("limit", "500"),
                ("translatedLanguage[]", "en"),
            ],
        )
        .map(Some)
    }

    fn parse_chapters(&self, body: &str) -> Result<Vec<Chapter>, FetchError> {
        let resp: Value = serde_json::from_str(body)?;
        Self::check_resp_errors(&resp)?;
        let mut chapters = Vec::new();
        for entry in Self::entries(&resp)? {
            let id = entry
                .get("id")
                .and_then(|v| v.as_str())
                .ok_or_else(|| FetchError::missing_field("id"))?;
            let attr = Self::attributes(entry)?;
            let number = attr.get("chapter").and_then(|v| v.as_str()).unwrap_or("0");
            let title = match attr.get("title").and_then(|v| v.as_str()) {
                Some(title) if !title.is_empty() => title.to_string(),
                _ => format!("Chapter {number}"),
            };
            chapters.push(Chapter::new(title, id));
        }
        Ok(chapters)
    }

    fn recent_request(&self, page: u32) -> Result<Request, FetchError> {
        let offset = page.saturating_sub(1) * PAGE_SIZE;
        self.get_with(
            "/manga",
            &[
                ("order[latestUploadedChapter]", "desc"),
                ("limit", &PAGE_SIZE.to_string()),
                ("offset", &offset.to_string()),
                ("includes[]", "cover_art"),
            ],
        )
    }

    fn parse_recent(&self, body: &str, _page: u32) -> Result<Vec<Series>, FetchError> {
        let resp: Value = serde_json::from_str(body)?;
        Self::check_resp_errors(&resp)?;
        let mut list = Vec::new();
        for entry in Self::entries(&resp)? {
            list.push(Series::from(self.summary_from(entry)?));
        }
        Ok(list)
    }

    fn images_request(&self, _id: &str, chapter_path: &str) -> Result<Request, FetchError> {
        get(&format!(
            "{}/at-home/server/{chapter_path}",
            self.info.base_url
        ))
    }

    fn parse_images(&self, body: &str) -> Result<Vec<PageImage>, FetchError> {
        let resp: Value = serde_json::from_str(body)?;
        Self::check_resp_errors(&resp)?;
        let base = resp
            .get("baseUrl")
            .and_then(|v| v.as_str())
            .ok_or_else(|| FetchError::missing_field("baseUrl"))?;
        let chapter = resp
            .get("chapter")
            .ok_or_else(|| FetchError::missing_field("chapter"))?;
        let hash = chapter
            .get("hash")
            .and_then(|v| v.as_str())
            .ok_or_else(|| FetchError::missing_field("chapter.hash"))?;
        let files = chapter
            .get("data")
            .and_then(|v| v.as_array())
            .ok_or_else(|| FetchError::missing_field("chapter.data"))?;

        let mut images = Vec::new();
        for file in files {
            let file = file
                .as_str()
                .ok_or_else(|| FetchError::parse("non-string page entry"))?;
            images.push(PageImage::Direct(format!("{base}/data/{hash}/{file}")));
        }
        Ok(images)
    }

    fn check_request(&self, id: &str) -> Result<Request, FetchError> {
        Self::validate_id(id)?;
        self.get_with(
            &format!("/manga/{id}/feed"),
            &[("order[publishAt]", "desc"), ("limit", "1")],
        )
    }

    fn parse_check(&self, body: &str) -> Result<Option<String>, FetchError> {
        let resp: Value = serde_json::from_str(body)?;
        Self::check_resp_errors(&resp)?;
        let Some(entry) = Self::entries(&resp)?.first() else {
            return Ok(None);
        };
        let attr = Self::attributes(entry)?;
        let published = attr
            .get("publishAt")
            .and_then(|v| v.as_str())
            .ok_or_else(|| FetchError::missing_field("publishAt"))?;
        DateTime::parse_from_rfc3339(published)
            .map_err(|_| FetchError::parse(format!("invalid time `{published}`")))?;
        Ok(Some(published.to_string()))
    }
}

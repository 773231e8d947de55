//! Generic parser for sites built on the WordPress "Madara" comic theme.
//!
//! One instance per site; the layout is shared, only the root URL differs.
//! Sites fronting their images with a rotating CDN expose a small JSON
//! endpoint naming the current host; its value is the parser's only session
//! state.

use std::sync::RwLock;

use reqwest::Request;
use scraper::Html;
use scraper::Selector;

use crate::error::FetchError;
use crate::model::Chapter;
use crate::model::PageImage;
use crate::model::Series;
use crate::model::SeriesSummary;
use crate::model::SourceId;
use crate::source::SearchIter;
use crate::source::SourceInfo;
use crate::source::SourceParser;
use crate::source::get;

pub struct MadaraSource {
    info: SourceInfo,
    /// Site-relative path of the CDN discovery endpoint, when the site has
    /// one.
    image_server_path: Option<String>,
    /// CDN host cached by `parse_image_server`. Single writer at a time;
    /// last write wins.
    image_server: RwLock<Option<String>>,
}

impl MadaraSource {
    pub fn new(id: SourceId, name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            info: SourceInfo {
                id,
                name: name.into(),
                base_url: base_url.into(),
            },
            image_server_path: None,
            image_server: RwLock::new(None),
        }
    }

    /// Enables image-server discovery via a JSON endpoint under the site
    /// root, e.g. `/ajax/image-server`.
    pub fn with_image_server(mut self, path: impl Into<String>) -> Self {
        self.image_server_path = Some(path.into());
        self
    }

    fn selector(css: &str) -> Result<Selector, FetchError> {
        Selector::parse(css).map_err(|e| FetchError::parse(format!("bad selector `{css}`: {e}")))
    }

    /// Last non-empty path segment of a link, which Madara uses as the slug.
    fn last_segment(href: &str) -> Option<String> {
        let path = href.split(['?', '#']).next().unwrap_or(href);
        path.rsplit('/').find(|s| !s.is_empty()).map(String::from)
    }

    fn absolutize(&self, src: &str) -> String {
        let src = src.trim();
        if src.starts_with("http://") || src.starts_with("https://") {
            return src.to_string();
        }
        let host = self
            .image_server
            .read()
            .unwrap()
            .clone()
            .unwrap_or_else(|| self.info.base_url.clone());
        format!("{}/{}", host.trim_end_matches('/'), src.trim_start_matches('/'))
    }

    /// Series cards as they appear on search result and archive pages.
    fn parse_cards(&self, doc: &Html, container_css: &str) -> Result<Vec<SeriesSummary>, FetchError> {
        let card_sel = Self::selector(container_css)?;
        let title_sel = Self::selector(".post-title a")?;
        let cover_sel = Self::selector("img")?;
        let author_sel = Self::selector(".mg_author .summary-content")?;
        let status_sel = Self::selector(".mg_status .summary-content")?;

        let mut hits = Vec::new();
        for card in doc.select(&card_sel) {
            let Some(link) = card.select(&title_sel).next() else {
                continue;
            };
            let title = link.text().collect::<String>().trim().to_string();
            let Some(id) = link.value().attr("href").and_then(Self::last_segment) else {
                continue;
            };
            if title.is_empty() {
                continue;
            }

            let cover = card.select(&cover_sel).next().and_then(|img| {
                img.value()
                    .attr("data-src")
                    .or_else(|| img.value().attr("src"))
                    .map(|src| self.absolutize(src))
            });
            let author = card
                .select(&author_sel)
                .next()
                .map(|el| el.text().collect::<String>().trim().to_string())
                .filter(|s| !s.is_empty());
            let status = card
                .select(&status_sel)
                .next()
                .map(|el| el.text().collect::<String>().trim().to_string())
                .filter(|s| !s.is_empty());

            hits.push(SeriesSummary {
                source: self.info.id,
                id,
                title,
                cover,
                author,
                status,
            });
        }
        Ok(hits)
    }
}

impl SourceParser for MadaraSource {
    fn info(&self) -> &SourceInfo {
        &self.info
    }

    fn search_request(&self, keyword: &str, page: u32) -> Result<Request, FetchError> {
        let url = url::Url::parse_with_params(
            &format!("{}/", self.info.base_url),
            &[
                ("s", keyword),
                ("post_type", "wp-manga"),
                ("paged", &page.to_string()),
            ],
        )?;
        Ok(Request::new(reqwest::Method::GET, url))
    }

    fn parse_search(&self, body: &str, _page: u32) -> Result<Option<SearchIter>, FetchError> {
        let doc = Html::parse_document(body);
        let hits = self.parse_cards(&doc, "div.c-tabs-item__content")?;
        Ok(Some(Box::new(hits.into_iter())))
    }

    fn info_request(&self, id: &str) -> Result<Request, FetchError> {
        get(&format!("{}/manga/{id}/", self.info.base_url))
    }

    fn parse_info(&self, body: &str, series: &mut Series) -> Result<(), FetchError> {
        let doc = Html::parse_document(body);

        let title_sel = Self::selector("div.post-title h1")?;
        let title = doc
            .select(&title_sel)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| FetchError::missing_field("title"))?;
        series.title = title;

        let cover_sel = Self::selector("div.summary_image img")?;
        if let Some(img) = doc.select(&cover_sel).next()
            && let Some(src) = img.value().attr("data-src").or_else(|| img.value().attr("src"))
        {
            series.cover = Some(self.absolutize(src));
        }

        let author_sel = Self::selector("div.author-content a")?;
        if let Some(el) = doc.select(&author_sel).next() {
            let author = el.text().collect::<String>().trim().to_string();
            if !author.is_empty() {
                series.author = Some(author);
            }
        }

        let status_sel = Self::selector("div.post-status div.summary-content")?;
        if let Some(el) = doc.select(&status_sel).next() {
            let status = el.text().collect::<String>().trim().to_string();
            if !status.is_empty() {
                series.status = Some(status);
            }
        }
        Ok(())
    }

    // Chapter list lives on the info page; no second round-trip.

    fn parse_chapters(&self, body: &str) -> Result<Vec<Chapter>, FetchError> {
        let doc = Html::parse_document(body);
        let link_sel = Self::selector("li.wp-manga-chapter a")?;

        let mut chapters = Vec::new();
        for link in doc.select(&link_sel) {
            let title = link.text().collect::<String>().trim().to_string();
            let Some(path) = link.value().attr("href").and_then(Self::last_segment) else {
                continue;
            };
            if title.is_empty() {
                continue;
            }
            chapters.push(Chapter::new(title, path));
        }
        Ok(chapters)
    }

    fn recent_request(&self, page: u32) -> Result<Request, FetchError> {
        let url = url::Url::parse_with_params(
            &format!("{}/manga/", self.info.base_url),
            &[("m_orderby", "latest"), ("paged", &page.to_string())],
        )?;
        Ok(Request::new(reqwest::Method::GET, url))
    }

    fn parse_recent(&self, body: &str, _page: u32) -> Result<Vec<Series>, FetchError> {
        let doc = Html::parse_document(body);
        let hits = self.parse_cards(&doc, "div.page-item-detail")?;
        Ok(hits.into_iter().map(Series::from).collect())
    }

    fn image_server_request(&self) -> Result<Option<Request>, FetchError> {
        match &self.image_server_path {
            Some(path) => get(&format!("{}{path}", self.info.base_url)).map(Some),
            None => Ok(None),
        }
    }

    fn parse_image_server(&self, body: &str) -> Result<(), FetchError> {
        let resp: serde_json::Value = serde_json::from_str(body)?;
        let server = resp
            .get("server")
            .and_then(|v| v.as_str())
            .ok_or_else(|| FetchError::missing_field("server"))?;
        *self.image_server.write().unwrap() = Some(server.trim_end_matches('/').to_string());
        Ok(())
    }

    fn images_request(&self, id: &str, chapter_path: &str) -> Result<Request, FetchError> {
        get(&format!(
            "{}/manga/{id}/{chapter_path}/?style=list",
            self.info.base_url
        ))
    }

    fn parse_images(&self, body: &str) -> Result<Vec<PageImage>, FetchError> {
        let doc = Html::parse_document(body);

        let img_sel = Self::selector("img.wp-manga-chapter-img")?;
        let mut images = Vec::new();
        for img in doc.select(&img_sel) {
            if let Some(src) = img.value().attr("data-src").or_else(|| img.value().attr("src")) {
                images.push(PageImage::Direct(self.absolutize(src)));
            }
        }
        if !images.is_empty() {
            return Ok(images);
        }

        // Paged reader: one image per page, reachable only through the page
        // URL itself.
        let pager_sel = Self::selector("select.single-pager option")?;
        for option in doc.select(&pager_sel) {
            if let Some(value) = option.value().attr("value")
                && !value.trim().is_empty()
            {
                images.push(PageImage::Lazy(self.absolutize(value)));
            }
        }
        Ok(images)
    }

    fn parse_lazy(&self, body: &str, _original: &str) -> Result<Option<String>, FetchError> {
        let doc = Html::parse_document(body);
        let img_sel = Self::selector("img.wp-manga-chapter-img")?;
        let resolved = doc.select(&img_sel).next().and_then(|img| {
            img.value()
                .attr("data-src")
                .or_else(|| img.value().attr("src"))
                .map(|src| self.absolutize(src))
        });
        Ok(resolved)
    }

    fn check_request(&self, id: &str) -> Result<Request, FetchError> {
        get(&format!("{}/manga/{id}/", self.info.base_url))
    }

    /// The newest chapter's release date (falling back to its slug) is as
    /// close to a freshness marker as the theme exposes.
    fn parse_check(&self, body: &str) -> Result<Option<String>, FetchError> {
        let doc = Html::parse_document(body);

        let date_sel = Self::selector("li.wp-manga-chapter .chapter-release-date")?;
        if let Some(el) = doc.select(&date_sel).next() {
            let date = el.text().collect::<String>().trim().to_string();
            if !date.is_empty() {
                return Ok(Some(date));
            }
        }

        let link_sel = Self::selector("li.wp-manga-chapter a")?;
        Ok(doc
            .select(&link_sel)
            .next()
            .and_then(|link| link.value().attr("href"))
            .and_then(Self::last_segment))
    }
}

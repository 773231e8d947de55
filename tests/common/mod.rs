//! Shared test support: a scripted parser driven by a line protocol, so each
//! test states the remote's behavior in its mock body.
#![allow(dead_code)]

use std::sync::Arc;
use std::sync::RwLock;
use std::time::Duration;

use comic_fetch::FetchConfig;
use comic_fetch::FetchError;
use comic_fetch::SourceRegistry;
use comic_fetch::model::Chapter;
use comic_fetch::model::PageImage;
use comic_fetch::model::Series;
use comic_fetch::model::SeriesSummary;
use comic_fetch::model::SourceId;
use comic_fetch::source::SearchIter;
use comic_fetch::source::SourceInfo;
use comic_fetch::source::SourceParser;
use comic_fetch::source::get;
use reqwest::Request;

/// Body conventions:
/// - `ERROR` anywhere a parse happens → scripted parse failure
/// - search/recent: one `id|title` per line; `NONE` → absent iterator
/// - info: `key=value` lines (title/author/status); chapter lines may follow
/// - chapters: `path|title` per line
/// - images: one URL per line, `lazy:` prefix for lazy links; leading-slash
///   URLs get the discovered image-server host prepended
/// - image server: the body is the host
/// - lazy: `img=URL` line carries the resolved URL
/// - check: the trimmed body is the token; empty body → no token
pub struct ScriptedSource {
    info: SourceInfo,
    two_step_chapters: bool,
    has_image_server: bool,
    image_server: RwLock<Option<String>>,
}

impl ScriptedSource {
    pub fn new(id: SourceId, base_url: impl Into<String>) -> Self {
        Self {
            info: SourceInfo {
                id,
                name: "Scripted".to_string(),
                base_url: base_url.into(),
            },
            two_step_chapters: false,
            has_image_server: false,
            image_server: RwLock::new(None),
        }
    }

    /// Chapter list comes from a second request to `/chapters/{id}`.
    pub fn two_step_chapters(mut self) -> Self {
        self.two_step_chapters = true;
        self
    }

    /// Enables the image-server phase against `/imgserver`.
    pub fn with_image_server(mut self) -> Self {
        self.has_image_server = true;
        self
    }
}

fn lines(body: &str) -> impl Iterator<Item = &str> {
    body.lines().map(str::trim).filter(|l| !l.is_empty())
}

fn check_scripted_error(body: &str) -> Result<(), FetchError> {
    if body.trim() == "ERROR" {
        Err(FetchError::parse("scripted parse failure"))
    } else {
        Ok(())
    }
}

impl SourceParser for ScriptedSource {
    fn info(&self) -> &SourceInfo {
        &self.info
    }

    fn search_request(&self, keyword: &str, page: u32) -> Result<Request, FetchError> {
        get(&format!(
            "{}/search?q={keyword}&page={page}",
            self.info.base_url
        ))
    }

    fn parse_search(&self, body: &str, _page: u32) -> Result<Option<SearchIter>, FetchError> {
        check_scripted_error(body)?;
        if body.trim() == "NONE" {
            return Ok(None);
        }
        let source = self.info.id;
        let hits: Vec<SeriesSummary> = lines(body)
            .filter_map(|line| line.split_once('|'))
            .map(|(id, title)| SeriesSummary {
                source,
                id: id.to_string(),
                title: title.to_string(),
                cover: None,
                author: None,
                status: None,
            })
            .collect();
        Ok(Some(Box::new(hits.into_iter())))
    }

    fn info_request(&self, id: &str) -> Result<Request, FetchError> {
        get(&format!("{}/info/{id}", self.info.base_url))
    }

    fn parse_info(&self, body: &str, series: &mut Series) -> Result<(), FetchError> {
        check_scripted_error(body)?;
        for line in lines(body) {
            if let Some((key, value)) = line.split_once('=') {
                match key {
                    "title" => series.title = value.to_string(),
                    "author" => series.author = Some(value.to_string()),
                    "status" => series.status = Some(value.to_string()),
                    _ => {}
                }
            }
        }
        Ok(())
    }

    fn chapter_request(&self, _info_body: &str, id: &str) -> Result<Option<Request>, FetchError> {
        if self.two_step_chapters {
            get(&format!("{}/chapters/{id}", self.info.base_url)).map(Some)
        } else {
            Ok(None)
        }
    }

    fn parse_chapters(&self, body: &str) -> Result<Vec<Chapter>, FetchError> {
        check_scripted_error(body)?;
        Ok(lines(body)
            .filter(|line| !line.contains('='))
            .filter_map(|line| line.split_once('|'))
            .map(|(path, title)| Chapter::new(title, path))
            .collect())
    }

    fn recent_request(&self, page: u32) -> Result<Request, FetchError> {
        get(&format!("{}/recent/{page}", self.info.base_url))
    }

    fn parse_recent(&self, body: &str, page: u32) -> Result<Vec<Series>, FetchError> {
        let hits = match self.parse_search(body, page)? {
            Some(iter) => iter,
            None => return Ok(Vec::new()),
        };
        Ok(hits.map(Series::from).collect())
    }

    fn image_server_request(&self) -> Result<Option<Request>, FetchError> {
        if self.has_image_server {
            get(&format!("{}/imgserver", self.info.base_url)).map(Some)
        } else {
            Ok(None)
        }
    }

    fn parse_image_server(&self, body: &str) -> Result<(), FetchError> {
        check_scripted_error(body)?;
        *self.image_server.write().unwrap() = Some(body.trim().to_string());
        Ok(())
    }

    fn images_request(&self, id: &str, chapter_path: &str) -> Result<Request, FetchError> {
        get(&format!(
            "{}/images/{id}/{chapter_path}",
            self.info.base_url
        ))
    }

    fn parse_images(&self, body: &str) -> Result<Vec<PageImage>, FetchError> {
        check_scripted_error(body)?;
        let host = self.image_server.read().unwrap().clone();
        let mut images = Vec::new();
        for line in lines(body) {
            if let Some(url) = line.strip_prefix("lazy:") {
                images.push(PageImage::Lazy(url.to_string()));
            } else if let Some(host) = &host
                && line.starts_with('/')
            {
                images.push(PageImage::Direct(format!("{host}{line}")));
            } else {
                images.push(PageImage::Direct(line.to_string()));
            }
        }
        Ok(images)
    }

    fn parse_lazy(&self, body: &str, _original: &str) -> Result<Option<String>, FetchError> {
        check_scripted_error(body)?;
        Ok(lines(body)
            .find_map(|line| line.strip_prefix("img="))
            .map(String::from))
    }

    fn check_request(&self, id: &str) -> Result<Request, FetchError> {
        get(&format!("{}/check/{id}", self.info.base_url))
    }

    fn parse_check(&self, body: &str) -> Result<Option<String>, FetchError> {
        check_scripted_error(body)?;
        let token = body.trim();
        Ok((!token.is_empty()).then(|| token.to_string()))
    }
}

/// Default config with the jitter turned down so streaming tests stay quick.
pub fn fast_config() -> FetchConfig {
    comic_fetch::logging::init();
    let mut config = FetchConfig::new();
    config.search_jitter_max = Duration::from_millis(5);
    config
}

pub fn registry_with(parser: impl SourceParser + 'static) -> Arc<SourceRegistry> {
    let mut registry = SourceRegistry::new();
    registry.register(Arc::new(parser));
    Arc::new(registry)
}

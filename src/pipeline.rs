//! The operation chains: search, series info, recent listing, chapter images
//! and streaming lazy resolution.
//!
//! Each chain runs its steps strictly in sequence. Errors are terminal for
//! the chain that raised them; nothing is retried here.

use std::pin::Pin;
use std::sync::Arc;
use std::task::Context;
use std::task::Poll;
use std::time::Duration;

use futures::Stream;
use rand::Rng;
use tokio::sync::mpsc;
use tracing::warn;

use crate::config::FetchConfig;
use crate::error::FetchError;
use crate::http::HttpExecutor;
use crate::model::PageImage;
use crate::model::Series;
use crate::model::SeriesSummary;
use crate::model::SourceId;
use crate::source::SourceParser;
use crate::source::registry::SourceRegistry;

/// Orchestrates the fixed request→execute→parse chains over a shared
/// [`SourceRegistry`].
///
/// The batch operations are plain async fns: dropping the returned future
/// cancels the chain at its current suspension point and no further step
/// starts.
pub struct FetchPipeline {
    registry: Arc<SourceRegistry>,
    http: HttpExecutor,
    config: FetchConfig,
}

impl FetchPipeline {
    pub fn new(registry: Arc<SourceRegistry>, config: FetchConfig) -> Self {
        let http = HttpExecutor::new(&config);
        Self {
            registry,
            http,
            config,
        }
    }

    fn parser(&self, source: SourceId) -> Result<Arc<dyn SourceParser>, FetchError> {
        self.registry
            .parser(source)
            .ok_or(FetchError::UnknownSource { id: source })
    }

    /// Starts a search and returns the stream of hits.
    ///
    /// Hits arrive in source order with a random pause below
    /// [`FetchConfig::search_jitter_max`] between them, throttling scrape
    /// cadence. A terminal [`FetchError`] is delivered once through the
    /// stream; an absent or empty result set is [`FetchError::Empty`].
    /// Dropping the stream stops the producer at its next emission.
    pub fn search(&self, source: SourceId, keyword: &str, page: u32) -> SearchStream {
        let (tx, rx) = mpsc::channel(16);
        let registry = self.registry.clone();
        let http = self.http.clone();
        let jitter_max = self.config.search_jitter_max;
        let keyword = keyword.to_string();

        tokio::spawn(async move {
            let parser = match registry.parser(source) {
                Some(parser) => parser,
                None => {
                    let _ = tx.send(Err(FetchError::UnknownSource { id: source })).await;
                    return;
                }
            };
            if let Err(e) = run_search(&*parser, &http, &tx, &keyword, page, jitter_max).await {
                let _ = tx.send(Err(e)).await;
            }
        });

        SearchStream { rx }
    }

    /// Runs the info chain, mutating `series` in place.
    ///
    /// Metadata applied by the parser survives even when the chapter list
    /// turns out empty and the chain fails with a parse error; the stored
    /// chapter list is only replaced on success.
    pub async fn series_info(&self, series: &mut Series) -> Result<(), FetchError> {
        let parser = self.parser(series.source)?;
        let request = parser.info_request(&series.id)?;
        let mut body = self.http.execute(request).await?;
        parser.parse_info(&body, series)?;

        if let Some(request) = parser.chapter_request(&body, &series.id)? {
            body = self.http.execute(request).await?;
        }
        let mut chapters = parser.parse_chapters(&body)?;
        if chapters.is_empty() {
            return Err(FetchError::parse("chapter list is empty"));
        }
        for (i, chapter) in chapters.iter_mut().enumerate() {
            chapter.ordinal = i as u32;
        }
        series.chapters = chapters;
        Ok(())
    }

    /// Fetches one page of the source's recent-updates listing.
    pub async fn recent(&self, source: SourceId, page: u32) -> Result<Vec<Series>, FetchError> {
        let parser = self.parser(source)?;
        let request = parser.recent_request(page)?;
        let body = self.http.execute(request).await?;
        let list = parser.parse_recent(&body, page)?;
        if list.is_empty() {
            return Err(FetchError::Empty);
        }
        Ok(list)
    }

    /// Fetches the page images of one chapter, in reading order.
    ///
    /// A failed image-server phase is fatal here, unlike the blocking
    /// resolver path: without the session data the page URLs would be wrong.
    pub async fn chapter_images(
        &self,
        source: SourceId,
        id: &str,
        chapter_path: &str,
    ) -> Result<Vec<PageImage>, FetchError> {
        let parser = self.parser(source)?;
        if let Some(request) = parser.image_server_request()? {
            let body = self.http.execute(request).await?;
            parser.parse_image_server(&body)?;
        }
        let request = parser.images_request(id, chapter_path)?;
        let body = self.http.execute(request).await?;
        let images = parser.parse_images(&body)?;
        if images.is_empty() {
            return Err(FetchError::parse("no page images in chapter"));
        }
        Ok(images)
    }

    /// Streaming-context lazy resolution.
    ///
    /// Failures are logged and swallowed; `None` tells the caller to keep the
    /// original URL.
    pub async fn resolve_lazy(&self, source: SourceId, url: &str) -> Option<String> {
        match self.try_resolve_lazy(source, url).await {
            Ok(resolved) => resolved,
            Err(e) => {
                warn!("Lazy resolution of {url} failed: {e}");
                None
            }
        }
    }

    async fn try_resolve_lazy(
        &self,
        source: SourceId,
        url: &str,
    ) -> Result<Option<String>, FetchError> {
        let parser = self.parser(source)?;
        let request = parser.lazy_request(url)?;
        let body = self.http.execute(request).await?;
        parser.parse_lazy(&body, url)
    }
}

async fn run_search(
    parser: &dyn SourceParser,
    http: &HttpExecutor,
    tx: &mpsc::Sender<Result<SeriesSummary, FetchError>>,
    keyword: &str,
    page: u32,
    jitter_max: Duration,
) -> Result<(), FetchError> {
    let request = parser.search_request(keyword, page)?;
    let body = http.execute(request).await?;
    let mut hits = match parser.parse_search(&body, page)? {
        Some(iter) => iter.peekable(),
        None => return Err(FetchError::Empty),
    };
    if hits.peek().is_none() {
        return Err(FetchError::Empty);
    }

    while let Some(hit) = hits.next() {
        if tx.send(Ok(hit)).await.is_err() {
            // Consumer went away; nothing left to deliver to.
            return Ok(());
        }
        if hits.peek().is_some() {
            sleep_jitter(jitter_max).await;
        }
    }
    Ok(())
}

async fn sleep_jitter(max: Duration) {
    let max_ms = max.as_millis() as u64;
    if max_ms == 0 {
        return;
    }
    let ms = rand::thread_rng().gen_range(0..max_ms);
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

/// Ordered stream of search hits produced by [`FetchPipeline::search`].
pub struct SearchStream {
    rx: mpsc::Receiver<Result<SeriesSummary, FetchError>>,
}

impl SearchStream {
    /// Next hit or terminal error; `None` once the search completed.
    pub async fn next(&mut self) -> Option<Result<SeriesSummary, FetchError>> {
        self.rx.recv().await
    }
}

impl Stream for SearchStream {
    type Item = Result<SeriesSummary, FetchError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

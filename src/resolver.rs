//! Direct-call image and lazy-link resolution for background downloads.

use std::sync::Arc;

use tracing::debug;
use tracing::warn;

use crate::cancel::CancelFlag;
use crate::error::FetchError;
use crate::http::HttpExecutor;
use crate::model::PageImage;
use crate::model::SourceId;
use crate::source::SourceParser;
use crate::source::registry::SourceRegistry;

/// The blocking-variant resolver used by the download worker, which wants a
/// plain call instead of a stream.
///
/// Error policy differs from [`crate::pipeline::FetchPipeline`]: cancellation
/// propagates as [`FetchError::Canceled`] so a controllable job can stop
/// promptly, while every other failure is logged and collapses to "no
/// result". The worker supplies its own [`HttpExecutor`].
pub struct LazyLinkResolver {
    registry: Arc<SourceRegistry>,
    http: HttpExecutor,
}

impl LazyLinkResolver {
    pub fn new(registry: Arc<SourceRegistry>, http: HttpExecutor) -> Self {
        Self { registry, http }
    }

    /// Fetches a chapter's page images; failures other than cancellation
    /// yield an empty list.
    pub async fn chapter_images(
        &self,
        source: SourceId,
        id: &str,
        chapter_path: &str,
        cancel: &CancelFlag,
    ) -> Result<Vec<PageImage>, FetchError> {
        match self.fetch_images(source, id, chapter_path, cancel).await {
            Ok(images) => Ok(images),
            Err(FetchError::Canceled) => Err(FetchError::Canceled),
            Err(e) => {
                warn!("Image resolution for chapter {chapter_path} failed: {e}");
                Ok(Vec::new())
            }
        }
    }

    /// Resolves one lazy link; failures other than cancellation yield `None`,
    /// telling the caller to keep the original URL.
    pub async fn lazy_url(
        &self,
        source: SourceId,
        url: &str,
        cancel: &CancelFlag,
    ) -> Result<Option<String>, FetchError> {
        match self.fetch_lazy(source, url, cancel).await {
            Ok(resolved) => Ok(resolved),
            Err(FetchError::Canceled) => Err(FetchError::Canceled),
            Err(e) => {
                warn!("Lazy resolution of {url} failed: {e}");
                Ok(None)
            }
        }
    }

    async fn fetch_images(
        &self,
        source: SourceId,
        id: &str,
        chapter_path: &str,
        cancel: &CancelFlag,
    ) -> Result<Vec<PageImage>, FetchError> {
        let parser = self.parser(source)?;
        if cancel.is_canceled() {
            return Err(FetchError::Canceled);
        }
        // Best-effort phase: stale or absent session data still lets most
        // sources produce usable URLs.
        if let Err(e) = self.discover_image_server(&*parser).await {
            debug!("Image server discovery failed, continuing: {e}");
        }
        if cancel.is_canceled() {
            return Err(FetchError::Canceled);
        }
        let request = parser.images_request(id, chapter_path)?;
        let body = self.http.execute(request).await?;
        parser.parse_images(&body)
    }

    async fn discover_image_server(&self, parser: &dyn SourceParser) -> Result<(), FetchError> {
        if let Some(request) = parser.image_server_request()? {
            let body = self.http.execute(request).await?;
            parser.parse_image_server(&body)?;
        }
        Ok(())
    }

    async fn fetch_lazy(
        &self,
        source: SourceId,
        url: &str,
        cancel: &CancelFlag,
    ) -> Result<Option<String>, FetchError> {
        let parser = self.parser(source)?;
        if cancel.is_canceled() {
            return Err(FetchError::Canceled);
        }
        let request = parser.lazy_request(url)?;
        let body = self.http.execute(request).await?;
        parser.parse_lazy(&body, url)
    }

    fn parser(&self, source: SourceId) -> Result<Arc<dyn SourceParser>, FetchError> {
        self.registry
            .parser(source)
            .ok_or(FetchError::UnknownSource { id: source })
    }
}

//! Batch update checking across a tracked collection.

use std::pin::Pin;
use std::sync::Arc;
use std::task::Context;
use std::task::Poll;

use futures::Stream;
use tokio::sync::mpsc;
use tracing::debug;

use crate::config::FetchConfig;
use crate::error::FetchError;
use crate::http::HttpExecutor;
use crate::model::Series;
use crate::model::UpdateProbe;
use crate::source::registry::SourceRegistry;

/// Probes a whole collection for remote changes, one short-timeout request
/// per item.
///
/// Every input item yields exactly one [`UpdateProbe`], in input order,
/// whatever happens to the individual check: local entries are skipped
/// without network traffic, failed probes are logged and report "no change",
/// and only a genuine token change carries the item in its probe.
pub struct UpdateChecker {
    registry: Arc<SourceRegistry>,
    config: FetchConfig,
    http: HttpExecutor,
}

impl UpdateChecker {
    pub fn new(registry: Arc<SourceRegistry>, config: FetchConfig) -> Self {
        // Probes get their own client: one request per tracked item, each
        // capped well below the regular transport timeout so a single
        // unreachable source cannot stall the batch.
        let client = reqwest::Client::builder()
            .timeout(config.check_timeout)
            .connect_timeout(config.check_timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .expect("Failed to create update-check client");
        Self {
            registry,
            config,
            http: HttpExecutor::with_client(client),
        }
    }

    /// Starts checking `items` and returns the stream of probes. Dropping
    /// the stream stops the batch at its next emission.
    pub fn check(&self, items: Vec<Series>) -> UpdateStream {
        let (tx, rx) = mpsc::channel(16);
        let registry = self.registry.clone();
        let http = self.http.clone();
        let local_min = self.config.local_source_min;

        tokio::spawn(async move {
            let total = items.len();
            for (idx, mut series) in items.into_iter().enumerate() {
                let position = idx + 1;
                let changed = if series.source < local_min {
                    match probe(&registry, &http, &mut series).await {
                        Ok(changed) => changed,
                        Err(e) => {
                            debug!(
                                "Update probe {position}/{total} for source {} id {} failed: {e}",
                                series.source, series.id
                            );
                            false
                        }
                    }
                } else {
                    false
                };

                let probe = UpdateProbe {
                    series: changed.then_some(series),
                    position,
                    total,
                };
                if tx.send(probe).await.is_err() {
                    debug!("Update consumer dropped, stopping batch");
                    return;
                }
            }
        });

        UpdateStream { rx }
    }
}

async fn probe(
    registry: &SourceRegistry,
    http: &HttpExecutor,
    series: &mut Series,
) -> Result<bool, FetchError> {
    let parser = registry
        .parser(series.source)
        .ok_or(FetchError::UnknownSource {
            id: series.source,
        })?;
    let request = parser.check_request(&series.id)?;
    let body = http.execute(request).await?;
    let fresh = parser.parse_check(&body)?;

    if token_changed(&series.update_token, &fresh) {
        series.update_token = fresh;
        series.highlight = true;
        return Ok(true);
    }
    Ok(false)
}

/// A change only counts against a non-empty stored token; the first probe of
/// an item records nothing.
fn token_changed(stored: &Option<String>, fresh: &Option<String>) -> bool {
    match (stored, fresh) {
        (Some(stored), Some(fresh)) => !stored.is_empty() && stored != fresh,
        _ => false,
    }
}

/// Ordered stream of per-item probes produced by [`UpdateChecker::check`].
pub struct UpdateStream {
    rx: mpsc::Receiver<UpdateProbe>,
}

impl UpdateStream {
    /// Next probe; `None` once every item has reported.
    pub async fn next(&mut self) -> Option<UpdateProbe> {
        self.rx.recv().await
    }
}

impl Stream for UpdateStream {
    type Item = UpdateProbe;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

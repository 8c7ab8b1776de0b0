use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::interval;
use tracing::{error, info};

use crate::cache::ContentCache;
use crate::metrics::{FETCH_FAILURES, FETCH_SUCCESS};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FetchReport {
    pub cached: usize,
    pub failed: usize,
}

// Pulls a fixed list of URLs into the content cache
pub struct UrlFetcher {
    client: reqwest::Client,
    urls: Vec<String>,
    timeout: Duration,
}

impl UrlFetcher {
    pub fn new(urls: impl IntoIterator<Item = impl Into<String>>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            urls: urls.into_iter().map(Into::into).collect(),
            timeout,
        }
    }

    /// Fetch every URL in order. A failing URL is logged and skipped.
    pub async fn run(&self, cache: &dyn ContentCache) -> FetchReport {
        let mut report = FetchReport::default();
        let total = self.urls.len();

        for (i, url) in self.urls.iter().enumerate() {
            match self.fetch_one(url).await {
                Ok(body) => match cache.upsert(url, &body, Some(Utc::now())).await {
                    Ok(()) => {
                        FETCH_SUCCESS.inc();
                        report.cached += 1;
                        info!(url = %url, bytes = body.len(), progress = %format!("{}/{}", i + 1, total), "cached");
                    }
                    Err(e) => {
                        FETCH_FAILURES.inc();
                        report.failed += 1;
                        error!(url = %url, error = %e, "failed to store fetched content");
                    }
                },
                Err(e) => {
                    FETCH_FAILURES.inc();
                    report.failed += 1;
                    error!(url = %url, error = %e, "failed to fetch");
                }
            }
        }

        info!(cached = report.cached, failed = report.failed, "fetch run completed");
        report
    }

    async fn fetch_one(&self, url: &str) -> Result<String, reqwest::Error> {
        self.client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await
    }
}

// Background refresh - reruns the batch every `every`
pub async fn refresh_loop(fetcher: Arc<UrlFetcher>, cache: Arc<dyn ContentCache>, every: Duration) {
    let mut interval = interval(every);

    info!(interval_secs = every.as_secs(), "content refresh started");

    loop {
        interval.tick().await;
        fetcher.run(cache.as_ref()).await;
    }
}

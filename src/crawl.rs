use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::error::StoreResult;
use crate::schedule::Job;
use crate::scrape::{ParsedPage, ScrapeClient, Selectors};
use crate::store::{PersistenceManager, Persisted};
use crate::types::Batch;

#[derive(Debug, PartialEq, Eq)]
pub enum RunOutcome {
    /// Fetch failed or the page had no usable items; nothing was persisted.
    NoData,
    Persisted(Persisted),
}

/// One fetch → parse → persist pipeline over a single page.
pub struct Crawler {
    sc: ScrapeClient,
    url: String,
    selectors: Selectors,
    store: PersistenceManager,
}

impl Crawler {
    pub fn new(
        sc: ScrapeClient,
        url: impl Into<String>,
        selectors: Selectors,
        store: PersistenceManager,
    ) -> Self {
        Self {
            sc,
            url: url.into(),
            selectors,
            store,
        }
    }

    pub async fn run_once(&self) -> StoreResult<RunOutcome> {
        info!(url = %self.url, "scraping");
        let doc = match self.sc.fetch(&self.url).await {
            Ok(doc) => doc,
            Err(e) => {
                error!(error = %e, url = %self.url, "scrape failed");
                return Ok(RunOutcome::NoData);
            }
        };

        debug!(
            status = doc.http_status,
            content_type = doc.content_type.as_deref().unwrap_or(""),
            bytes = doc.body.len(),
            fetched_at = %doc.fetched_at,
            "page fetched"
        );

        // The parsed page is dropped before the next await.
        let batch: Batch = ParsedPage::parse(&doc, &self.selectors).records().collect();
        if batch.is_empty() {
            warn!(url = %self.url, "no data was scraped");
            return Ok(RunOutcome::NoData);
        }

        let count = batch.len();
        let persisted = self.store.persist(batch).await?;
        info!(count, "successfully scraped items");
        Ok(RunOutcome::Persisted(persisted))
    }
}

#[async_trait]
impl Job for Crawler {
    fn name(&self) -> &str {
        "scrape"
    }

    /// Every failure ends here; the schedule keeps going.
    async fn run(&self) {
        match self.run_once().await {
            Ok(RunOutcome::NoData) => {}
            Ok(RunOutcome::Persisted(Persisted::Remote { inserted })) => {
                info!(inserted, "run stored remotely");
            }
            Ok(RunOutcome::Persisted(Persisted::Local { path, records, reason })) => {
                info!(path = %path.display(), records, ?reason, "run stored locally");
            }
            Err(e) => {
                // Local fallback failed too: the batch is dropped.
                error!(error = %e, url = %self.url, "batch lost, local write failed");
            }
        }
    }
}

use std::future::Future;

use log::{debug, error, info, warn};

use crate::{
    parse::Row,
    query::{Query, ReferenceData},
    transport::{FetchError, Transport},
    Catalog,
};

/// Runs `attempt` once, then again immediately for every retryable failure
/// while `budget` lasts. Anything else is returned as is.
pub(crate) async fn with_retry<T, F, Fut>(
    what: &str,
    budget: u32,
    mut attempt: F,
) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let mut left = budget;

    loop {
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && left > 0 => {
                warn!("{what}: {e}, retrying, {left} attempts left");
                left -= 1;
            }
            Err(e) => return Err(e),
        }
    }
}

impl<T: Transport> Catalog<T> {
    /// Fetches one page, absorbing transport failures up to `budget` extra
    /// attempts. A malformed body gives up at once: the next round re-issues it.
    pub async fn fetch_page_with_retry(
        &self,
        query: &Query,
        start_row: usize,
        budget: u32,
    ) -> Option<Vec<Row>> {
        let what = format!("page at row {start_row}");

        match with_retry(&what, budget, || self.transport.fetch_page(query, start_row)).await {
            Ok(rows) => {
                debug!(
                    "got rows {}-{}",
                    start_row,
                    start_row + self.config.page_size - 1
                );
                Some(rows)
            }
            Err(e) => {
                error!("failed to fetch {what}: {e}");
                None
            }
        }
    }

    pub(crate) async fn fetch_count(&self, query: &Query, budget: u32) -> Result<usize, FetchError> {
        let count = with_retry("course count", budget, || self.transport.fetch_count(query)).await?;
        info!("got course count {count}");
        Ok(count)
    }

    pub(crate) async fn fetch_reference_data(&self, budget: u32) -> Result<ReferenceData, FetchError> {
        with_retry("reference data", budget, || {
            self.transport.fetch_reference_data()
        })
        .await
    }
}

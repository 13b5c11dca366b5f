use futures::{stream, StreamExt};
use log::{debug, error, info};
use thiserror::Error;

use crate::{
    parse::Row,
    query::Query,
    transport::{FetchError, Transport},
    Catalog,
};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("could not fetch the course count: {source}")]
    CountUnavailable { source: FetchError },
}

#[derive(Debug)]
pub enum Outcome {
    /// The backend reported zero matching courses.
    NoResults,
    Fetched(Report),
}

/// Rows of every page that arrived, in page order, plus the pages that did not.
#[derive(Debug, PartialEq, Eq)]
pub struct Report {
    pub total: usize,
    pub rows: Vec<Row>,
    /// `startrow` of each page that failed every round.
    pub failed: Vec<usize>,
}

impl Report {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

fn page_count(total: usize, page_size: usize) -> usize {
    total.div_ceil(page_size)
}

// owned by fetch_all and handed through each round by value; workers only
// return results, the slots are written once the whole round is back

struct FetchState {
    page_size: usize,
    total: usize,
    slots: Vec<Option<Vec<Row>>>,
    rounds_left: u32,
}

impl FetchState {
    fn new(total: usize, page_size: usize, rounds: u32) -> Self {
        Self {
            page_size,
            total,
            slots: (0..page_count(total, page_size)).map(|_| None).collect(),
            rounds_left: rounds,
        }
    }

    fn pending(&self) -> Vec<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_none())
            .map(|(index, _)| index)
            .collect()
    }

    fn is_done(&self) -> bool {
        self.rounds_left == 0 || self.slots.iter().all(Option::is_some)
    }

    fn fill(&mut self, index: usize, rows: Vec<Row>) {
        let slot = &mut self.slots[index];
        if slot.is_none() {
            *slot = Some(rows);
        }
    }

    fn into_report(self) -> Report {
        let page_size = self.page_size;
        let mut rows = Vec::with_capacity(self.total);
        let mut failed = Vec::new();

        for (index, slot) in self.slots.into_iter().enumerate() {
            match slot {
                Some(page) => rows.extend(page),
                None => failed.push(index * page_size),
            }
        }

        Report {
            total: self.total,
            rows,
            failed,
        }
    }
}

impl<T: Transport> Catalog<T> {
    /// Fetches every page matching `query`.
    ///
    /// Pages are fetched concurrently in rounds; each round re-issues only the
    /// pages still missing, with a fresh `retry` budget per page, for at most
    /// `retry` rounds (one round when `retry` is zero). Pages missing after the
    /// last round are listed in [`Report::failed`] rather than failing the run.
    pub async fn fetch_all(&self, query: &Query, retry: u32) -> Result<Outcome, CatalogError> {
        let total = self
            .fetch_count(query, retry)
            .await
            .map_err(|source| CatalogError::CountUnavailable { source })?;

        if total == 0 {
            info!("got 0 matching courses");
            return Ok(Outcome::NoResults);
        }

        let mut state = FetchState::new(total, self.config.page_size, retry.max(1));
        info!("got {} courses, {} pages to fetch", total, state.slots.len());

        while !state.is_done() {
            state = self.run_round(query, state, retry).await;
        }

        let report = state.into_report();
        if report.is_complete() {
            info!("fetched all pages");
        } else {
            error!(
                "failed to fetch {} pages: {:?}",
                report.failed.len(),
                report.failed
            );
        }

        Ok(Outcome::Fetched(report))
    }

    async fn run_round(&self, query: &Query, mut state: FetchState, retry: u32) -> FetchState {
        let pending = state.pending();
        let page_size = state.page_size;

        debug!(
            "fetching {} pages, {} rounds left",
            pending.len(),
            state.rounds_left
        );

        let results: Vec<(usize, Option<Vec<Row>>)> = stream::iter(pending)
            .map(|index| async move {
                let rows = self
                    .fetch_page_with_retry(query, index * page_size, retry)
                    .await;
                (index, rows)
            })
            .buffer_unordered(self.config.workers.max(1))
            .collect()
            .await;

        for (index, rows) in results {
            if let Some(rows) = rows {
                state.fill(index, rows);
            }
        }

        state.rounds_left -= 1;
        state
    }
}

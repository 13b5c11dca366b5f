use std::{num::NonZeroUsize, time::Duration};

mod fetch;
mod pagination;
mod parse;
mod query;
mod transport;

#[cfg(test)]
mod testing;

pub use pagination::{CatalogError, Outcome, Report};
pub use parse::{strip_tags, ParseError, Row, COLUMNS};
pub use query::{Query, ReferenceData, Semester, Term, ValidationError};
pub use transport::{Dean, FetchError, Transport};

const SEARCH_URL: &str = "http://www.dean.pku.edu.cn/service/web/courseSearch_do.php";
const OPTIONS_URL: &str = "http://www.dean.pku.edu.cn/service/web/courseSearch.php";
const ORIGIN: &str = "http://www.dean.pku.edu.cn";

/// Rows returned by the backend for a single `startrow`.
pub const PAGE_SIZE: usize = 10;

pub const DEFAULT_RETRY: u32 = 3;

/// Everything the transport and the engine need to know about where and how
/// to fetch. Nothing is read from globals, so several catalogs with
/// different settings can run side by side.
#[derive(Clone, Debug)]
pub struct Config {
    pub search_url: String,
    pub options_url: String,
    pub origin: String,
    pub page_size: usize,
    pub retry: u32,
    /// Upper bound on page fetches in flight during one round.
    pub workers: usize,
    pub timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            search_url: SEARCH_URL.to_owned(),
            options_url: OPTIONS_URL.to_owned(),
            origin: ORIGIN.to_owned(),
            page_size: PAGE_SIZE,
            retry: DEFAULT_RETRY,
            workers: std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1),
            timeout: Duration::from_secs(30),
        }
    }
}

// the catalog owns no per-run state: every fetch_all builds its own FetchState,
// so a single Catalog can serve concurrent queries

pub struct Catalog<T> {
    transport: T,
    config: Config,
}

impl<T: Transport> Catalog<T> {
    pub fn new(transport: T, config: Config) -> Self {
        Self { transport, config }
    }

    /// Checks the query against the backend's reference data. The query is
    /// never modified; invalid terms carry a suggestion instead.
    pub async fn validate(&self, query: &Query, retry: u32) -> Result<(), ValidationError> {
        let reference = self
            .fetch_reference_data(retry)
            .await
            .map_err(|source| ValidationError::ReferenceUnavailable { source })?;

        query.validate(&reference)
    }
}

impl Catalog<Dean> {
    /// Catalog talking to the real backend described by `config`.
    pub fn dean(config: Config) -> Result<Self, FetchError> {
        let transport = Dean::new(&config)?;
        Ok(Self::new(transport, config))
    }
}

use async_trait::async_trait;
use log::debug;
use reqwest::{
    header::{HeaderMap, HeaderValue, InvalidHeaderValue, ORIGIN, REFERER},
    Client, Response, StatusCode,
};
use thiserror::Error;

use crate::{
    parse::{self, ParseError, Row},
    query::{Query, ReferenceData},
    Config,
};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("server returned {0}")]
    Status(StatusCode),
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("malformed response: {0}")]
    Parse(#[from] ParseError),
    #[error("invalid header value: {0}")]
    Header(#[from] InvalidHeaderValue),
}

impl FetchError {
    /// Whether another attempt over the same channel could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Status(_) | Self::Network(_))
    }
}

/// One round-trip against the backend per call. Implementations keep no
/// state between calls and never retry on their own.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch_count(&self, query: &Query) -> Result<usize, FetchError>;

    async fn fetch_page(&self, query: &Query, start_row: usize) -> Result<Vec<Row>, FetchError>;

    async fn fetch_reference_data(&self) -> Result<ReferenceData, FetchError>;
}

/// HTTP client for the dean's office course search.
pub struct Dean {
    client: Client,
    search_url: String,
    options_url: String,
}

impl Dean {
    pub fn new(config: &Config) -> Result<Self, FetchError> {
        // the backend rejects searches that do not look like they came from its own page
        let mut headers = HeaderMap::new();
        headers.insert(ORIGIN, HeaderValue::from_str(&config.origin)?);
        headers.insert(REFERER, HeaderValue::from_str(&config.options_url)?);

        let client = Client::builder()
            .cookie_store(true)
            .default_headers(headers)
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            client,
            search_url: config.search_url.clone(),
            options_url: config.options_url.clone(),
        })
    }

    async fn search(&self, query: &Query, start_row: usize) -> Result<String, FetchError> {
        let start_row = start_row.to_string();
        let mut form = query.form().to_vec();
        form.push(("startrow", start_row.as_str()));

        debug!("POST {} with {:?}", self.search_url, form);

        let response = self.client.post(&self.search_url).form(&form).send().await?;
        body(response).await
    }
}

async fn body(response: Response) -> Result<String, FetchError> {
    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status(status));
    }

    Ok(response.text().await?)
}

#[async_trait]
impl Transport for Dean {
    async fn fetch_count(&self, query: &Query) -> Result<usize, FetchError> {
        let contents = self.search(query, 0).await?;
        Ok(parse::count_from_json(&contents)?)
    }

    async fn fetch_page(&self, query: &Query, start_row: usize) -> Result<Vec<Row>, FetchError> {
        let contents = self.search(query, start_row).await?;
        Ok(parse::rows_from_json(&contents)?)
    }

    async fn fetch_reference_data(&self) -> Result<ReferenceData, FetchError> {
        debug!("GET {}", self.options_url);

        let response = self.client.get(&self.options_url).send().await?;
        let contents = body(response).await?;
        Ok(parse::reference_from_html(&contents)?)
    }
}

//! PubMed E-utilities client.
//!
//! Fault-tolerant by contract: `fetch_abstracts` never raises, it returns
//! whatever batches succeeded. `esearch` does raise since Scout treats an
//! esearch failure for one query variant as that variant's contribution being
//! empty, not the whole request failing.

use aesop_common::sandbox::SandboxClient;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::models::Paper;
use crate::xml::parse_pubmed_xml;

const ESEARCH_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/esearch.fcgi";
const EFETCH_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/efetch.fcgi";

#[derive(Debug, Error)]
pub enum PubMedError {
    #[error(transparent)]
    Common(#[from] aesop_common::AesopError),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

pub struct PubMedClient {
    client: SandboxClient,
    api_key: Option<String>,
}

impl PubMedClient {
    pub fn new(api_key: Option<String>) -> Result<Self, PubMedError> {
        Ok(Self { client: SandboxClient::new()?, api_key })
    }

    fn base_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![("retmode", "json".to_string())];
        if let Some(key) = &self.api_key {
            params.push(("api_key", key.clone()));
        }
        params
    }

    /// Searches PubMed and returns up to `max` PMIDs.
    #[instrument(skip(self))]
    pub async fn esearch(&self, query: &str, max: usize) -> Result<Vec<String>, PubMedError> {
        let mut params = self.base_params();
        params.push(("db", "pubmed".to_string()));
        params.push(("term", query.to_string()));
        params.push(("retmax", max.to_string()));
        params.push(("usehistory", "n".to_string()));

        let resp: serde_json::Value =
            self.client.get(ESEARCH_URL)?.query(&params).send().await?.json().await?;

        let ids = resp["esearchresult"]["idlist"]
            .as_array()
            .unwrap_or(&vec![])
            .iter()
            .filter_map(|v| v.as_str().map(String::from))
            .collect();

        debug!(?ids, "esearch returned PMIDs");
        Ok(ids)
    }

    /// Fetches abstracts for `pmids` in batches of `batch_size`. A failing
    /// batch is swallowed and contributes nothing; the union of successful
    /// batches is returned. Never returns an error.
    #[instrument(skip(self))]
    pub async fn fetch_abstracts(&self, pmids: &[String], batch_size: usize) -> Vec<Paper> {
        if pmids.is_empty() {
            return vec![];
        }
        let batch_size = batch_size.max(1);
        let mut papers = Vec::new();

        for chunk in pmids.chunks(batch_size) {
            match self.efetch_batch(chunk).await {
                Ok(mut batch) => papers.append(&mut batch),
                Err(e) => warn!(error = %e, "efetch batch failed, skipping"),
            }
        }
        papers
    }

    async fn efetch_batch(&self, pmids: &[String]) -> Result<Vec<Paper>, PubMedError> {
        let mut params = vec![
            ("db", "pubmed".to_string()),
            ("id", pmids.join(",")),
            ("rettype", "abstract".to_string()),
            ("retmode", "xml".to_string()),
        ];
        if let Some(key) = &self.api_key {
            params.push(("api_key", key.clone()));
        }

        let xml = self.client.get(EFETCH_URL)?.query(&params).send().await?.text().await?;
        Ok(parse_pubmed_xml(&xml))
    }
}

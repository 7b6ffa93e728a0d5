use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::HeaderMap;
use serde_json::Value;

use crate::efetch::parse_pubmed_articles;
use crate::error::SyncError;
use crate::http::{build_client, error_message, send_with_retries};
use crate::normalize::RawArticle;

const EUTILS_BASE: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";
const DATABASE: &str = "pubmed";
const TOOL: &str = "pubmed-sync";

/// Who is calling E-utilities. NCBI asks for a contact email on every call; an
/// API key raises the allowed request rate but is not required.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntrezIdentity {
    pub email: String,
    pub api_key: Option<String>,
}

pub trait PubmedClient: Send + Sync {
    /// Identifiers matching `term`, most relevant first, at most `max_results`.
    fn search(&self, term: &str, max_results: usize) -> Result<Vec<String>, SyncError>;
    /// Full article records for `ids`.
    fn fetch_full(&self, ids: &[String]) -> Result<Vec<RawArticle>, SyncError>;
}

impl<T: PubmedClient + ?Sized> PubmedClient for &T {
    fn search(&self, term: &str, max_results: usize) -> Result<Vec<String>, SyncError> {
        (**self).search(term, max_results)
    }

    fn fetch_full(&self, ids: &[String]) -> Result<Vec<RawArticle>, SyncError> {
        (**self).fetch_full(ids)
    }
}

#[derive(Clone)]
pub struct EutilsHttpClient {
    client: Client,
    base_url: String,
    identity: EntrezIdentity,
}

impl EutilsHttpClient {
    pub fn new(identity: EntrezIdentity) -> Result<Self, SyncError> {
        Self::with_base_url(identity, EUTILS_BASE)
    }

    pub fn with_base_url(identity: EntrezIdentity, base_url: &str) -> Result<Self, SyncError> {
        let client = build_client(Duration::from_secs(60), HeaderMap::new())
            .map_err(|err| SyncError::EutilsHttp(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            identity,
        })
    }

    fn identity_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![("tool", TOOL.to_string()), ("email", self.identity.email.clone())];
        if let Some(key) = &self.identity.api_key {
            params.push(("api_key", key.clone()));
        }
        params
    }

    fn get_text(&self, endpoint: &str, params: &[(&str, String)]) -> Result<String, SyncError> {
        let url = format!("{}/{endpoint}", self.base_url);
        let identity = self.identity_params();
        tracing::debug!(%url, "eutils request");
        let response = send_with_retries(|| self.client.get(&url).query(params).query(&identity))
            .map_err(|err| SyncError::EutilsHttp(err.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = error_message(response, "E-utilities request failed");
            return Err(SyncError::EutilsStatus { status, message });
        }
        response
            .text()
            .map_err(|err| SyncError::EutilsHttp(err.to_string()))
    }
}

impl PubmedClient for EutilsHttpClient {
    fn search(&self, term: &str, max_results: usize) -> Result<Vec<String>, SyncError> {
        let body = self.get_text(
            "esearch.fcgi",
            &[
                ("db", DATABASE.to_string()),
                ("term", term.to_string()),
                ("retmax", max_results.to_string()),
                ("sort", "relevance".to_string()),
                ("retmode", "json".to_string()),
            ],
        )?;
        parse_search_ids(&body)
    }

    fn fetch_full(&self, ids: &[String]) -> Result<Vec<RawArticle>, SyncError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let body = self.get_text(
            "efetch.fcgi",
            &[
                ("db", DATABASE.to_string()),
                ("id", ids.join(",")),
                ("rettype", "medline".to_string()),
                ("retmode", "xml".to_string()),
            ],
        )?;
        parse_pubmed_articles(&body)
    }
}

pub fn parse_search_ids(body: &str) -> Result<Vec<String>, SyncError> {
    let payload: Value =
        serde_json::from_str(body).map_err(|err| SyncError::EutilsParse(err.to_string()))?;
    let result = &payload["esearchresult"];
    if let Some(message) = result["ERROR"].as_str().or(payload["error"].as_str()) {
        return Err(SyncError::EutilsParse(message.to_string()));
    }
    let ids = result["idlist"]
        .as_array()
        .map(|list| {
            list.iter()
                .filter_map(|v| v.as_str().map(|s| s.to_string()))
                .collect()
        })
        .unwrap_or_default();
    Ok(ids)
}

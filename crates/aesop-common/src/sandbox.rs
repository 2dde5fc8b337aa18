use reqwest::{Client, ClientBuilder};
use std::collections::HashSet;
use std::time::Duration;
use url::Url;

use crate::error::AesopError;

/// A sandbox-capped HTTP client that only allows requests to an approved set of
/// domains. Every external call this system makes (PubMed, the LLM backend, the
/// embedding backend) goes through one of these so an operator can audit exactly
/// what the process is allowed to reach.
#[derive(Debug, Clone)]
pub struct SandboxClient {
    client: Client,
    allowlist: HashSet<String>,
}

impl SandboxClient {
    /// Creates a client allowlisted for PubMed E-utilities plus local LLM/embedding
    /// backends. Callers add their configured remote LLM/embedding host with
    /// `allow_domain`.
    pub fn new() -> Result<Self, AesopError> {
        let mut allowlist = HashSet::new();
        let domains = [
            "eutils.ncbi.nlm.nih.gov", // PubMed esearch/efetch
            "localhost",               // local LLM/embedding backend (e.g. Ollama)
            "127.0.0.1",
            "api.openai.com",
            "api.anthropic.com",
        ];
        for d in domains {
            allowlist.insert(d.to_string());
        }

        let client = ClientBuilder::new()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| AesopError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, allowlist })
    }

    /// Appends an exact hostname to the allowlist (e.g. a configured remote LLM host).
    pub fn allow_domain(&mut self, domain: &str) {
        self.allowlist.insert(domain.to_string());
    }

    /// True if `url`'s host is allowlisted exactly or as a subdomain of an allowed entry.
    pub fn is_allowed(&self, url: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else { return false };
        let Some(host) = parsed.host_str() else { return false };
        self.allowlist
            .iter()
            .any(|allowed| host == allowed || host.ends_with(&format!(".{allowed}")))
    }

    pub fn get(&self, url: &str) -> Result<reqwest::RequestBuilder, AesopError> {
        self.checked(url)?;
        Ok(self.client.get(url))
    }

    pub fn post(&self, url: &str) -> Result<reqwest::RequestBuilder, AesopError> {
        self.checked(url)?;
        Ok(self.client.post(url))
    }

    fn checked(&self, url: &str) -> Result<(), AesopError> {
        if !self.is_allowed(url) {
            return Err(AesopError::PolicyBlocked(format!(
                "domain not in allowlist for URL {url}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_pubmed_host() {
        let c = SandboxClient::new().unwrap();
        assert!(c.is_allowed("https://eutils.ncbi.nlm.nih.gov/entrez/eutils/esearch.fcgi"));
    }

    #[test]
    fn rejects_unlisted_host() {
        let c = SandboxClient::new().unwrap();
        assert!(!c.is_allowed("https://evil.example.com/steal"));
    }

    #[test]
    fn allow_domain_extends_allowlist() {
        let mut c = SandboxClient::new().unwrap();
        assert!(!c.is_allowed("https://my-llm.internal/v1/chat"));
        c.allow_domain("my-llm.internal");
        assert!(c.is_allowed("https://my-llm.internal/v1/chat"));
    }
}

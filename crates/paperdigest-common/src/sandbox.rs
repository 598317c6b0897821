use reqwest::{Client, ClientBuilder};
use std::collections::HashSet;
use std::time::Duration;
use url::Url;
use crate::error::DigestError;

const USER_AGENT: &str = concat!("paperdigest/", env!("CARGO_PKG_VERSION"), " (research digest)");

/// An HTTP client that only talks to approved hosts.
///
/// Every ingestion request (search queries, PDF downloads) goes through this
/// wrapper so a malformed record cannot make the pipeline fetch arbitrary URLs.
#[derive(Debug, Clone)]
pub struct SandboxClient {
    client: Client,
    allowlist: HashSet<String>,
}

impl SandboxClient {
    /// Creates a client with the default allowlist (arXiv and loopback hosts).
    pub fn new() -> Result<Self, DigestError> {
        Self::with_timeout(Duration::from_secs(60))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, DigestError> {
        let domains = [
            "arxiv.org",        // abs / pdf pages, subdomains included
            "export.arxiv.org", // Atom query API
            "localhost",
            "127.0.0.1",
        ];
        let allowlist = domains.iter().map(|d| d.to_string()).collect();

        let client = ClientBuilder::new()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| DigestError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, allowlist })
    }

    /// Appends an exact hostname to the allowlist.
    pub fn allow_domain(&mut self, domain: &str) {
        self.allowlist.insert(domain.to_string());
    }

    /// Validates if a URL is permitted under the current sandbox policy.
    pub fn is_allowed(&self, url: &str) -> bool {
        if let Ok(parsed) = Url::parse(url) {
            if let Some(host) = parsed.host_str() {
                // Exact match or subdomain of an allowed domain
                for allowed in &self.allowlist {
                    if host == allowed || host.ends_with(&format!(".{}", allowed)) {
                        return true;
                    }
                }
            }
        }
        false
    }

    pub fn get(&self, url: &str) -> Result<reqwest::RequestBuilder, DigestError> {
        if !self.is_allowed(url) {
            return Err(DigestError::SecurityError(format!(
                "Network capabilities capped: domain not in allowlist for URL {}",
                url
            )));
        }

        Ok(self.client.get(url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arxiv_hosts_allowed() {
        let c = SandboxClient::new().unwrap();
        assert!(c.is_allowed("https://arxiv.org/pdf/2512.08343v1"));
        assert!(c.is_allowed("http://export.arxiv.org/api/query?search_query=cat:cs.CL"));
        assert!(c.is_allowed("http://127.0.0.1:8080/paper.pdf"));
    }

    #[test]
    fn test_foreign_host_refused() {
        let c = SandboxClient::new().unwrap();
        assert!(!c.is_allowed("https://evil.example.com/arxiv.org.pdf"));
        assert!(!c.is_allowed("not a url"));
        assert!(matches!(
            c.get("https://example.com/x.pdf"),
            Err(DigestError::SecurityError(_))
        ));
    }

    #[test]
    fn test_allow_domain_extends_policy() {
        let mut c = SandboxClient::new().unwrap();
        assert!(!c.is_allowed("https://mirror.example.org/a.pdf"));
        c.allow_domain("mirror.example.org");
        assert!(c.is_allowed("https://mirror.example.org/a.pdf"));
    }
}

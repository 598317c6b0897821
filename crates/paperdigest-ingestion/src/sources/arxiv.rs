//! arXiv Atom API client.
//!
//! Endpoint: http://export.arxiv.org/api/query
//! Query:    `(cat:A OR cat:B) AND submittedDate:[YYYYMMDD0000 TO YYYYMMDD0000]`
//!
//! Results are sorted by submission date, newest first, and fetched in pages.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Days, NaiveDate};
use paperdigest_common::sandbox::SandboxClient;
use serde::Deserialize;
use tracing::{debug, info, instrument};

use super::{PaperSearch, SearchQuery};
use crate::models::PaperRecord;

const QUERY_URL: &str = "http://export.arxiv.org/api/query";

pub const DEFAULT_CATEGORIES: &[&str] = &["cs.CL", "cs.AI", "cs.LG", "cs.IR", "cs.CV"];
pub const DEFAULT_MAX_RESULTS: usize = 1000;
pub const DEFAULT_PAGE_SIZE: usize = 100;

#[derive(Debug, Deserialize)]
struct Feed {
    #[serde(rename = "entry", default)]
    entries: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
struct Entry {
    id: String,
    title: String,
    #[serde(default)]
    summary: String,
    published: String,
    #[serde(rename = "author", default)]
    authors: Vec<AtomAuthor>,
    #[serde(rename = "link", default)]
    links: Vec<Link>,
    #[serde(rename = "category", default)]
    categories: Vec<Category>,
}

#[derive(Debug, Deserialize)]
struct AtomAuthor {
    name: String,
}

#[derive(Debug, Deserialize)]
struct Link {
    #[serde(rename = "@href")]
    href: String,
    #[serde(rename = "@title", default)]
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Category {
    #[serde(rename = "@term")]
    term: String,
}

pub struct ArxivSearch {
    client: SandboxClient,
    page_size: usize,
    /// Pause between page requests, as the API terms ask for.
    page_delay: Duration,
}

impl ArxivSearch {
    pub fn new(client: SandboxClient) -> Self {
        Self {
            client,
            page_size: DEFAULT_PAGE_SIZE,
            page_delay: Duration::from_secs(3),
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_page_delay(mut self, delay: Duration) -> Self {
        self.page_delay = delay;
        self
    }

    #[instrument(skip(self))]
    async fn fetch_page(&self, search_query: &str, start: usize, max: usize) -> anyhow::Result<Vec<PaperRecord>> {
        let params = [
            ("search_query", search_query.to_string()),
            ("start", start.to_string()),
            ("max_results", max.to_string()),
            ("sortBy", "submittedDate".to_string()),
            ("sortOrder", "descending".to_string()),
        ];

        let xml = self.client
            .get(QUERY_URL)?
            .query(&params)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        parse_feed(&xml)
    }
}

#[async_trait]
impl PaperSearch for ArxivSearch {
    async fn search(&self, query: &SearchQuery) -> anyhow::Result<Vec<PaperRecord>> {
        let search_query = build_search_query(&query.categories, query.start_date, query.end_date);
        info!(%search_query, max_results = query.max_results, "Searching arXiv");

        let mut papers: Vec<PaperRecord> = Vec::new();
        while papers.len() < query.max_results {
            if !papers.is_empty() {
                tokio::time::sleep(self.page_delay).await;
            }
            let want = self.page_size.min(query.max_results - papers.len());
            let page = self.fetch_page(&search_query, papers.len(), want).await?;
            let page_len = page.len();

            for paper in page {
                papers.push(paper);
                if papers.len() % 10 == 0 {
                    info!(fetched = papers.len(), "arXiv search progress");
                }
            }
            if page_len < want {
                break;
            }
        }

        info!(count = papers.len(), "arXiv search complete");
        Ok(papers)
    }
}

/// Build the `search_query` parameter. The end bound is exclusive, so the
/// end date is advanced by one day.
pub fn build_search_query(categories: &[String], start: NaiveDate, end: NaiveDate) -> String {
    let cats = categories
        .iter()
        .map(|c| format!("cat:{}", c))
        .collect::<Vec<_>>()
        .join(" OR ");
    let end = end.checked_add_days(Days::new(1)).unwrap_or(end);
    format!(
        "({}) AND submittedDate:[{}0000 TO {}0000]",
        cats,
        start.format("%Y%m%d"),
        end.format("%Y%m%d"),
    )
}

/// Parse an Atom feed returned by the query API.
pub fn parse_feed(xml: &str) -> anyhow::Result<Vec<PaperRecord>> {
    let feed: Feed = quick_xml::de::from_str(xml)?;
    let mut papers = Vec::with_capacity(feed.entries.len());

    for entry in feed.entries {
        // The API reports bad queries as a single pseudo-entry.
        if entry.id.contains("/api/errors") {
            anyhow::bail!("arXiv API error: {}", collapse_whitespace(&entry.summary));
        }

        let arxiv_id = entry.id.rsplit('/').next().unwrap_or(&entry.id).to_string();
        let published_date = DateTime::parse_from_rfc3339(entry.published.trim())?.date_naive();
        let pdf_url = entry
            .links
            .iter()
            .find(|l| l.title.as_deref() == Some("pdf"))
            .map(|l| l.href.clone())
            .unwrap_or_else(|| entry.id.replace("/abs/", "/pdf/"));

        debug!(%arxiv_id, "Parsed arXiv entry");
        papers.push(PaperRecord {
            arxiv_id,
            title: collapse_whitespace(&entry.title),
            authors: entry.authors.into_iter().map(|a| collapse_whitespace(&a.name)).collect(),
            categories: entry.categories.into_iter().map(|c| c.term).collect(),
            published_date,
            pdf_url,
            summary: collapse_whitespace(&entry.summary),
        });
    }

    Ok(papers)
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xmlns:arxiv="http://arxiv.org/schemas/atom">
  <title type="html">ArXiv Query</title>
  <id>http://arxiv.org/api/abc</id>
  <updated>2025-12-10T00:00:00-05:00</updated>
  <entry>
    <id>http://arxiv.org/abs/2512.08343v1</id>
    <updated>2025-12-09T08:00:00Z</updated>
    <published>2025-12-09T08:00:00Z</published>
    <title>Scaling Laws for
      Data-Constrained Pretraining</title>
    <summary>  We study how pretraining
      data repetition affects loss.  </summary>
    <author><name>Ada Lovelace</name></author>
    <author><name>Alan Turing</name></author>
    <arxiv:primary_category term="cs.CL" scheme="http://arxiv.org/schemas/atom"/>
    <link href="http://arxiv.org/abs/2512.08343v1" rel="alternate" type="text/html"/>
    <link title="pdf" href="http://arxiv.org/pdf/2512.08343v1" rel="related" type="application/pdf"/>
    <category term="cs.CL" scheme="http://arxiv.org/schemas/atom"/>
    <category term="cs.AI" scheme="http://arxiv.org/schemas/atom"/>
  </entry>
  <entry>
    <id>http://arxiv.org/abs/2512.09999v2</id>
    <published>2025-12-09T09:30:00Z</published>
    <title>No PDF Link</title>
    <summary>Abstract.</summary>
    <author><name>Grace Hopper</name></author>
    <category term="cs.LG" scheme="http://arxiv.org/schemas/atom"/>
  </entry>
</feed>"#;

    #[test]
    fn test_build_search_query() {
        let q = build_search_query(
            &["cs.CL".to_string(), "cs.AI".to_string()],
            NaiveDate::from_ymd_opt(2025, 12, 31).unwrap(),
            NaiveDate::from_ymd_opt(2025, 12, 31).unwrap(),
        );
        assert_eq!(q, "(cat:cs.CL OR cat:cs.AI) AND submittedDate:[202512310000 TO 202601010000]");
    }

    #[test]
    fn test_parse_feed() {
        let papers = parse_feed(FEED).unwrap();
        assert_eq!(papers.len(), 2);

        let p = &papers[0];
        assert_eq!(p.arxiv_id, "2512.08343v1");
        assert_eq!(p.title, "Scaling Laws for Data-Constrained Pretraining");
        assert_eq!(p.summary, "We study how pretraining data repetition affects loss.");
        assert_eq!(p.authors, vec!["Ada Lovelace", "Alan Turing"]);
        assert_eq!(p.categories, vec!["cs.CL", "cs.AI"]);
        assert_eq!(p.published_date, NaiveDate::from_ymd_opt(2025, 12, 9).unwrap());
        assert_eq!(p.pdf_url, "http://arxiv.org/pdf/2512.08343v1");

        assert_eq!(papers[1].pdf_url, "http://arxiv.org/pdf/2512.09999v2");
    }

    #[test]
    fn test_parse_empty_feed() {
        let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom"><title>ArXiv Query</title></feed>"#;
        assert!(parse_feed(xml).unwrap().is_empty());
    }

    #[test]
    fn test_api_error_entry_is_an_error() {
        let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom">
          <entry>
            <id>http://arxiv.org/api/errors#incorrect_id_format</id>
            <published>2025-12-09T00:00:00Z</published>
            <title>Error</title>
            <summary>malformed query</summary>
          </entry>
        </feed>"#;
        let err = parse_feed(xml).unwrap_err();
        assert!(err.to_string().contains("malformed query"));
    }
}

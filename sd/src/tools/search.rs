//! Web search tool
//!
//! Keyless search built on DuckDuckGo's instant-answer API, with the
//! Wikipedia REST summary endpoint for factual queries. Every failure mode
//! (network error, non-success status, empty results) is reported through
//! `ToolResult::error` - this tool never raises to the caller.

use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use crate::config::SearchConfig;

use super::{ToolKind, ToolResult};

const DDG_API: &str = "https://api.duckduckgo.com/";
const WIKIPEDIA_API: &str = "https://en.wikipedia.org/api/rest_v1/page/summary/";

/// Keyless web search
pub struct WebSearch {
    config: SearchConfig,
    http: reqwest::Client,
}

impl WebSearch {
    pub fn new(config: SearchConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .unwrap_or_default();

        Self { config, http }
    }

    /// Execute a search query
    ///
    /// Factual queries go to Wikipedia first, everything else to
    /// DuckDuckGo; a Wikipedia miss falls back to DuckDuckGo.
    pub async fn execute(&self, query: &str) -> ToolResult {
        let query = query.trim();
        if query.is_empty() {
            return ToolResult::failure(ToolKind::Search, "Empty search query");
        }

        if is_factual_query(query) {
            debug!(%query, "execute: routing factual query to wikipedia");
            match self.search_wikipedia(query).await {
                Ok(Some(summary)) => return ToolResult::success(ToolKind::Search, summary),
                Ok(None) => debug!("execute: wikipedia miss, falling back"),
                Err(e) => debug!(error = %e, "execute: wikipedia failed, falling back"),
            }
        }

        match self.search_duckduckgo(query).await {
            Ok(Some(summary)) => ToolResult::success(ToolKind::Search, summary),
            Ok(None) => ToolResult::failure(ToolKind::Search, format!("No results found for \"{}\"", query)),
            Err(e) => ToolResult::failure(ToolKind::Search, format!("Search failed: {}", e)),
        }
    }

    /// DuckDuckGo instant answer lookup
    async fn search_duckduckgo(&self, query: &str) -> Result<Option<String>, reqwest::Error> {
        let response = self
            .http
            .get(DDG_API)
            .query(&[
                ("q", query),
                ("format", "json"),
                ("no_html", "1"),
                ("skip_disambig", "1"),
            ])
            .send()
            .await?
            .error_for_status()?;

        let data: Value = response.json().await?;

        let heading = data["Heading"].as_str().unwrap_or("");
        let abstract_text = data["Abstract"].as_str().unwrap_or("");
        let url = data["AbstractURL"].as_str().unwrap_or("");

        let related: Vec<&str> = data["RelatedTopics"]
            .as_array()
            .map(|topics| {
                topics
                    .iter()
                    .filter_map(|t| t["Text"].as_str())
                    .take(self.config.max_related_topics)
                    .collect()
            })
            .unwrap_or_default();

        if abstract_text.is_empty() && related.is_empty() {
            return Ok(None);
        }

        let mut output = String::new();
        if !heading.is_empty() {
            output.push_str(heading);
            output.push('\n');
        }
        if !abstract_text.is_empty() {
            output.push_str(abstract_text);
        } else {
            // No direct answer; promote the first related topic
            output.push_str(related[0]);
        }
        if !url.is_empty() {
            output.push_str(&format!("\n{}", url));
        }
        for topic in related.iter().skip(if abstract_text.is_empty() { 1 } else { 0 }) {
            output.push_str(&format!("\n- {}", topic));
        }

        Ok(Some(output))
    }

    /// Wikipedia page summary lookup
    ///
    /// Returns Ok(None) on a 404 so the caller can fall back.
    async fn search_wikipedia(&self, query: &str) -> Result<Option<String>, reqwest::Error> {
        let title = query.replace(' ', "_");
        let url = format!("{}{}", WIKIPEDIA_API, title);

        let response = self.http.get(&url).send().await?;
        if response.status().as_u16() == 404 {
            return Ok(None);
        }
        let response = response.error_for_status()?;
        let data: Value = response.json().await?;

        let title = data["title"].as_str().unwrap_or("");
        let extract = data["extract"].as_str().unwrap_or("");
        if extract.is_empty() {
            return Ok(None);
        }

        let page_url = data["content_urls"]["desktop"]["page"].as_str().unwrap_or("");

        let mut output = format!("{}\n{}", title, extract);
        if !page_url.is_empty() {
            output.push_str(&format!("\n{}", page_url));
        }

        Ok(Some(output))
    }
}

/// Determine if a query is likely factual (better served by Wikipedia)
fn is_factual_query(query: &str) -> bool {
    const FACTUAL_KEYWORDS: &[&str] = &[
        "what is",
        "who is",
        "when was",
        "where is",
        "define",
        "history of",
        "explain",
        "meaning of",
        "biography",
    ];

    let lower = query.to_lowercase();
    FACTUAL_KEYWORDS.iter().any(|kw| lower.contains(kw))
}

/// Extract up to `max_points` key sentences from a summary
///
/// Used to turn a prose summary into study notes.
pub fn key_points(text: &str, max_points: usize) -> Vec<String> {
    text.split(". ")
        .filter(|sentence| sentence.trim().len() > 20)
        .take(max_points)
        .map(|sentence| {
            let clean = sentence.trim();
            if clean.ends_with('.') {
                clean.to_string()
            } else {
                format!("{}.", clean)
            }
        })
        .collect()
}

//! GitHub repository search decoding
//!
//! Turns a `search/repositories` response into the list of [`Item`]s that
//! carry the add-on topic marker and enough stars to be listed.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::{Item, ParseError, NO_DESCRIPTION};

/// Which search results are kept
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryFilter {
    /// Topic every listed repository must carry
    pub topic: String,
    /// Minimum `stargazers_count`
    pub min_stars: u32,
}

impl Default for DiscoveryFilter {
    fn default() -> Self {
        Self {
            topic: "mindustry-mod".to_string(),
            min_stars: 1,
        }
    }
}

impl DiscoveryFilter {
    fn accepts(&self, topics: &[String], stars: u32) -> bool {
        stars >= self.min_stars && topics.iter().any(|t| t == &self.topic)
    }
}

/// Builds the search URL for the discovery query
pub fn discovery_url(base_url: &str, filter: &DiscoveryFilter, per_page: u32) -> String {
    format!(
        "{}/search/repositories?q=topic:{}+fork:false+stars:>={}&sort=updated&order=desc&per_page={}",
        base_url.trim_end_matches('/'),
        filter.topic,
        filter.min_stars,
        per_page
    )
}

/// Search API response structure
#[derive(Debug, Deserialize)]
struct SearchResponse {
    items: Vec<SearchItem>,
}

/// A single repository in the search response
#[derive(Debug, Deserialize)]
struct SearchItem {
    owner: Option<SearchOwner>,
    name: Option<String>,
    description: Option<String>,
    #[serde(default)]
    stargazers_count: i64,
    html_url: Option<String>,
    topics: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct SearchOwner {
    login: Option<String>,
}

/// Parses a search response body into filtered items
///
/// A body without an `items` array is an error. Individual entries without
/// an owner login or a name are skipped, as are entries rejected by the
/// filter.
pub fn parse_discovery(
    body: &str,
    filter: &DiscoveryFilter,
    now: DateTime<Utc>,
) -> Result<Vec<Item>, ParseError> {
    let response: SearchResponse = serde_json::from_str(body)?;

    let items = response
        .items
        .into_iter()
        .filter_map(|raw| {
            let owner = raw.owner.and_then(|o| o.login).filter(|s| !s.is_empty())?;
            let name = raw.name.filter(|s| !s.is_empty())?;
            let stars = u32::try_from(raw.stargazers_count.max(0)).unwrap_or(u32::MAX);
            let topics = raw.topics.unwrap_or_default();

            if !filter.accepts(&topics, stars) {
                return None;
            }

            let url = raw
                .html_url
                .unwrap_or_else(|| format!("https://github.com/{}/{}", owner, name));

            Some(Item {
                owner,
                repo: name.clone(),
                name,
                description: raw.description.unwrap_or_else(|| NO_DESCRIPTION.to_string()),
                stars,
                url,
                discovered_at: now,
            })
        })
        .collect();

    Ok(items)
}

//! GitHub releases decoding
//!
//! Aggregates a `repos/{owner}/{repo}/releases` response into [`Stats`].

use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::{ItemKey, ParseError, Stats};

/// Builds the releases URL for an item
pub fn releases_url(base_url: &str, key: &ItemKey) -> String {
    format!(
        "{}/repos/{}/{}/releases",
        base_url.trim_end_matches('/'),
        key.owner,
        key.repo
    )
}

#[derive(Debug, Deserialize)]
struct Release {
    published_at: Option<String>,
    assets: Option<Vec<Asset>>,
}

#[derive(Debug, Deserialize)]
struct Asset {
    #[serde(default)]
    download_count: i64,
}

/// Parses a releases response body into stats
///
/// Releases are taken in response order, which the upstream API sorts
/// newest first: the first parseable `published_at` becomes
/// `latest_release` and the last one becomes `first_release`.
pub fn parse_releases(body: &str, now: DateTime<Utc>) -> Result<Stats, ParseError> {
    let releases: Vec<Release> = serde_json::from_str(body)?;

    let mut downloads: i64 = 0;
    let mut latest_release = None;
    let mut first_release = None;

    for release in &releases {
        if let Some(published) = release.published_at.as_deref().and_then(parse_timestamp) {
            if latest_release.is_none() {
                latest_release = Some(published);
            }
            first_release = Some(published);
        }

        for asset in release.assets.iter().flatten() {
            downloads = downloads.saturating_add(asset.download_count.max(0));
        }
    }

    Ok(Stats {
        downloads,
        releases: u32::try_from(releases.len()).unwrap_or(u32::MAX),
        latest_release,
        first_release,
        cached_at: now,
        error: false,
    })
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
